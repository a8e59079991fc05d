// src/io/cif/value.rs

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// `1.234e-5(6)`
static SCI_SU: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)(\d+\.?\d*|\.\d+)[eE]([+-]?\d+)\((\d+)\)$").expect("valid regex")
});
/// `1.234e-5`
static SCI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)[eE][+-]?\d+$").expect("valid regex"));
/// `1.234(5)`
static DECIMAL_SU: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)(\d+\.?\d*|\.\d+)\((\d+)\)$").expect("valid regex")
});
static PLAIN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)$").expect("valid regex"));
static ESCAPED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\(.)").expect("valid regex"));

/// A single CIF value after type detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// `?` (unknown) or `.` (inapplicable).
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Value::Text(s) if s == "?" || s == ".")
    }

    /// String form used for labels and symmetry codes, numbers included.
    pub fn to_label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// A value plus its standard uncertainty, if the token carried one.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    pub value: Value,
    pub su: Option<f64>,
}

impl ParsedValue {
    fn text(s: impl Into<String>) -> Self {
        Self {
            value: Value::Text(s.into()),
            su: None,
        }
    }

    /// The uncertainty as stored in generated `_su` columns.
    pub fn su_or_nan(&self) -> f64 {
        self.su.unwrap_or(f64::NAN)
    }
}

fn round_to(v: f64, decimals: i32) -> f64 {
    if !(0..=100).contains(&decimals) {
        return v;
    }
    format!("{:.*}", decimals as usize, v).parse().unwrap_or(v)
}

fn fraction_digits(number: &str) -> i32 {
    number.split_once('.').map_or(0, |(_, f)| f.len() as i32)
}

fn unescape(s: &str) -> String {
    ESCAPED.replace_all(s, "$1").into_owned()
}

fn unquote(token: &str) -> Option<&str> {
    let first = token.chars().next()?;
    if token.len() >= 2 && (first == '\'' || first == '"') && token.ends_with(first) {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}

/// Parse one CIF token into a typed value and optional standard uncertainty.
///
/// With `split_su` disabled, tokens carrying parenthesised uncertainties are kept as
/// raw text.
pub fn parse_value(token: &str, split_su: bool) -> ParsedValue {
    if let Some(caps) = SCI_SU.captures(token) {
        if !split_su {
            return ParsedValue::text(token);
        }
        let (sign, mantissa, exponent, su_digits) = (&caps[1], &caps[2], &caps[3], &caps[4]);
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let decimals = fraction_digits(mantissa);
        let value: f64 = format!("{sign}{mantissa}e{exponent}")
            .parse()
            .unwrap_or(f64::NAN);
        let su: f64 = format!("{su_digits}e{}", exponent - decimals)
            .parse()
            .unwrap_or(f64::NAN);
        let precision = decimals - exponent;
        return ParsedValue {
            value: Value::Float(round_to(value, precision)),
            su: Some(round_to(su, precision)),
        };
    }

    if SCI.is_match(token) {
        if let Ok(v) = token.parse::<f64>() {
            return ParsedValue {
                value: Value::Float(v),
                su: None,
            };
        }
    }

    if let Some(caps) = DECIMAL_SU.captures(token) {
        if !split_su {
            return ParsedValue::text(token);
        }
        let (sign, number, su_digits) = (&caps[1], &caps[2], &caps[3]);
        let decimals = fraction_digits(number);
        let su: f64 = format!("{su_digits}e-{decimals}").parse().unwrap_or(f64::NAN);
        let value = if number.contains('.') {
            Value::Float(format!("{sign}{number}").parse().unwrap_or(f64::NAN))
        } else {
            match format!("{sign}{number}").parse::<i64>() {
                Ok(v) => Value::Int(v),
                Err(_) => Value::Float(format!("{sign}{number}").parse().unwrap_or(f64::NAN)),
            }
        };
        return ParsedValue {
            value,
            su: Some(su),
        };
    }

    if let Some(inner) = unquote(token) {
        return ParsedValue::text(unescape(inner));
    }

    if PLAIN_NUMBER.is_match(token) {
        let value = if token.contains('.') {
            token.parse::<f64>().map(Value::Float)
        } else {
            token
                .parse::<i64>()
                .map(Value::Int)
                .or_else(|_| token.parse::<f64>().map(Value::Float))
        };
        if let Ok(value) = value {
            return ParsedValue { value, su: None };
        }
    }

    ParsedValue::text(unescape(token))
}

/// Format a value with its uncertainty in CIF parenthesis notation, e.g. `1.234(5)`.
///
/// Uncertainties with a leading digit of 1 keep two significant digits. Without a usable
/// uncertainty the value is printed with `default_digits` decimals.
pub fn format_value_esd(value: f64, su: f64, default_digits: usize) -> String {
    if !su.is_finite() || su <= 0.0 {
        return format!("{value:.default_digits$}");
    }

    let mut order = su.log10().floor() as i32;
    if su / 10f64.powi(order) < 2.0 {
        order -= 1;
    }

    if order >= 0 {
        let su_int = su.round();
        return format!("{:.0}({:.0})", value, su_int);
    }

    let decimals = (-order) as usize;
    let su_digits = (su * 10f64.powi(-order)).round() as i64;
    format!("{value:.decimals$}({su_digits})")
}
