// src/model/symmetry.rs

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use nalgebra::{Matrix3, Vector3};
use regex::Regex;

use super::adp::{Adp, UAnisoAdp};
use super::atom::Atom;
use super::position::Position;
use crate::error::{CifError, Result};
use crate::utils::linalg::{components_from_symmetric, symmetric_from_components};

/// `-x`, `+2y`, `1/2z`, `0.5*x`
static AXIS_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([+-]?)(\d*\.?\d+(?:/\d*\.?\d+)?)?\*?([xyz])").expect("valid regex")
});
/// `+1/2`, `-0.25`
static NUMBER_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-]?)(\d*\.?\d+)(?:/(\d*\.?\d+))?").expect("valid regex"));

const FRACTION_TOLERANCE: f64 = 2.1e-3;
const FRACTION_DENOMINATORS: [i64; 4] = [2, 3, 4, 6];
const AXES: [char; 3] = ['x', 'y', 'z'];

fn parse_number(number: &str, denominator: Option<&str>) -> Result<f64> {
    let bad = || CifError::Symmetry(format!("cannot read number '{number}'"));
    let num: f64 = number.parse().map_err(|_| bad())?;
    match denominator {
        Some(d) => {
            let den: f64 = d.parse().map_err(|_| bad())?;
            if den == 0.0 {
                return Err(bad());
            }
            Ok(num / den)
        }
        None => Ok(num),
    }
}

/// Parse one component of an instruction, e.g. `-x+y+1/2`, into (row, translation).
fn parse_component(component: &str) -> Result<([f64; 3], f64)> {
    let mut row = [0.0; 3];
    for caps in AXIS_TERM.captures_iter(component) {
        let sign = if &caps[1] == "-" { -1.0 } else { 1.0 };
        let coefficient = match caps.get(2) {
            Some(c) => match c.as_str().split_once('/') {
                Some((n, d)) => parse_number(n, Some(d))?,
                None => parse_number(c.as_str(), None)?,
            },
            None => 1.0,
        };
        let axis = match &caps[3] {
            "x" => 0,
            "y" => 1,
            _ => 2,
        };
        row[axis] += sign * coefficient;
    }

    let rest = AXIS_TERM.replace_all(component, "");
    let mut translation = 0.0;
    for caps in NUMBER_TERM.captures_iter(&rest) {
        let sign = if &caps[1] == "-" { -1.0 } else { 1.0 };
        translation += sign * parse_number(&caps[2], caps.get(3).map(|m| m.as_str()))?;
    }

    let leftover = NUMBER_TERM.replace_all(&rest, "");
    if leftover.chars().any(|c| c != '+' && c != '-') {
        return Err(CifError::Symmetry(format!(
            "unexpected '{leftover}' in component '{component}'"
        )));
    }
    Ok((row, translation))
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 { a.abs() } else { gcd(b, a % b) }
}

/// Render a value as a reduced fraction over 2, 3, 4 or 6 where close enough,
/// otherwise as a decimal. The sign is not included.
fn format_fraction(value: f64) -> String {
    let v = value.abs();
    if (v - v.round()).abs() < FRACTION_TOLERANCE {
        return format!("{}", v.round() as i64);
    }
    for den in FRACTION_DENOMINATORS {
        let num = (v * den as f64).round() as i64;
        if (v - num as f64 / den as f64).abs() < FRACTION_TOLERANCE {
            let g = gcd(num, den);
            return format!("{}/{}", num / g, den / g);
        }
    }
    let s = format!("{v:.6}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// A crystallographic symmetry operation `p' = R p + t` in fractional space.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryOperation {
    pub rot_matrix: Matrix3<f64>,
    pub trans_vector: Vector3<f64>,
}

impl SymmetryOperation {
    /// Parse an instruction such as `-x+1/2, y, -z`.
    pub fn new(instruction: &str) -> Result<Self> {
        let cleaned: String = instruction
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '"')
            .collect::<String>()
            .to_lowercase();
        let components: Vec<&str> = cleaned.split(',').collect();
        if components.len() != 3 {
            return Err(CifError::Symmetry(format!(
                "'{instruction}' must have three comma separated components"
            )));
        }

        let mut rot = Matrix3::zeros();
        let mut trans = Vector3::zeros();
        for (i, component) in components.iter().enumerate() {
            let (row, t) = parse_component(component).map_err(|e| match e {
                CifError::Symmetry(msg) => CifError::Symmetry(format!("{instruction}: {msg}")),
                other => other,
            })?;
            for (j, v) in row.iter().enumerate() {
                rot[(i, j)] = *v;
            }
            trans[i] = t;
        }
        Ok(Self::from_parts(rot, trans))
    }

    pub fn from_parts(rot_matrix: Matrix3<f64>, trans_vector: Vector3<f64>) -> Self {
        Self {
            rot_matrix,
            trans_vector,
        }
    }

    pub fn identity() -> Self {
        Self::from_parts(Matrix3::identity(), Vector3::zeros())
    }

    pub fn is_identity(&self) -> bool {
        (self.rot_matrix - Matrix3::identity()).abs().max() < 1e-10
            && self.trans_vector.abs().max() < 1e-10
    }

    pub fn apply_to_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rot_matrix * point + self.trans_vector
    }

    /// Transform an atom. Anisotropic tensors become `R U R^T`; label, type and
    /// disorder group are kept.
    pub fn apply_to_atom(&self, atom: &Atom) -> Result<Atom> {
        let Position::Fractional(p) = atom.position else {
            return Err(CifError::Symmetry(format!(
                "atom '{}' has Cartesian coordinates, symmetry needs fractional ones",
                atom.label
            )));
        };

        let adp = atom.adp.map(|adp| match adp {
            Adp::Aniso(u) => {
                let m = symmetric_from_components(&u.components());
                let rotated = self.rot_matrix * m * self.rot_matrix.transpose();
                Adp::Aniso(UAnisoAdp::from_components(components_from_symmetric(&rotated)))
            }
            iso => iso,
        });

        Ok(Atom {
            position: Position::Fractional(self.apply_to_point(&p)),
            adp,
            ..atom.clone()
        })
    }

    pub fn apply_to_atoms(&self, atoms: &[Atom]) -> Result<Vec<Atom>> {
        atoms.iter().map(|a| self.apply_to_atom(a)).collect()
    }

    /// Render the operation in `x,y,z` notation, adding `additional` to the translation.
    pub fn to_symmetry_string(&self, additional: Option<&Vector3<f64>>) -> String {
        let trans = match additional {
            Some(extra) => self.trans_vector + extra,
            None => self.trans_vector,
        };

        (0..3)
            .map(|i| {
                let mut out = String::new();
                for (j, axis) in AXES.iter().enumerate() {
                    let c = self.rot_matrix[(i, j)];
                    if c.abs() < 1e-10 {
                        continue;
                    }
                    out.push(if c < 0.0 { '-' } else { '+' });
                    if (c.abs() - 1.0).abs() >= 1e-10 {
                        out.push_str(&format_fraction(c));
                    }
                    out.push(*axis);
                }
                let t = trans[i];
                if t.abs() >= 1e-10 {
                    out.push(if t < 0.0 { '-' } else { '+' });
                    out.push_str(&format_fraction(t));
                }
                match out.strip_prefix('+') {
                    Some(s) => s.to_string(),
                    None if out.is_empty() => "0".to_string(),
                    None => out,
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for SymmetryOperation {
    type Err = CifError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for SymmetryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_symmetry_string(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTRUCTIONS: [&str; 10] = [
        "x, y, z",
        "-x, -y, -z",
        "-x+1/2, y+1/2, -z+1/2",
        "z, -x+1/4, -y+1/4",
        "y+3/4, x+1/4, -z+1/2",
        "x-y, x, z+1/6",
        "-x+y, y, -z+2/3",
        "1/2-x, 1/2+y, z",
        "x+0.5, 2y, -z",
        "X, Y-1/3, Z+1",
    ];

    #[test]
    fn parse_identity() {
        let op: SymmetryOperation = "x,y,z".parse().unwrap();
        assert!(op.is_identity());
        assert_eq!(op.to_symmetry_string(None), "x,y,z");
    }

    #[test]
    fn parse_general() {
        let op = SymmetryOperation::new("-x+1/2, x-y, -z+3/4").unwrap();
        let rot = Matrix3::new(
            -1.0, 0.0, 0.0,
            1.0, -1.0, 0.0,
            0.0, 0.0, -1.0,
        );
        assert_eq!(op.rot_matrix, rot);
        assert!((op.trans_vector - Vector3::new(0.5, 0.0, 0.75)).norm() < 1e-12);
    }

    #[test]
    fn invalid_instructions() {
        assert!(SymmetryOperation::new("x,y").is_err());
        assert!(SymmetryOperation::new("x,y,z,x").is_err());
        assert!(SymmetryOperation::new("x,y,q").is_err());
        assert!(SymmetryOperation::new("x,y,z+1/0").is_err());
    }

    #[test]
    fn string_round_trip() {
        for s in INSTRUCTIONS {
            let op = SymmetryOperation::new(s).unwrap();
            let rendered = op.to_symmetry_string(None);
            let back = SymmetryOperation::new(&rendered).unwrap();
            assert!((op.rot_matrix - back.rot_matrix).abs().max() < 1e-12, "{s} -> {rendered}");
            assert!((op.trans_vector - back.trans_vector).abs().max() < 1e-12, "{s} -> {rendered}");
        }
    }

    #[test]
    fn rendering_with_extra_translation() {
        let op = SymmetryOperation::new("-x+1/2, y, -z").unwrap();
        assert_eq!(op.to_symmetry_string(None), "-x+1/2,y,-z");
        let shifted = op.to_symmetry_string(Some(&Vector3::new(1.0, 0.0, -1.0)));
        assert_eq!(shifted, "-x+3/2,y,-z-1");
        assert_eq!(format_fraction(0.3333), "1/3");
        assert_eq!(format_fraction(0.1), "0.1");
    }

    #[test]
    fn identity_is_a_no_op() {
        let op = SymmetryOperation::identity();
        for p in [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.123, -4.5, 7.25),
            Vector3::new(1e3, 1e-3, -0.5),
        ] {
            assert!((op.apply_to_point(&p) - p).norm() < 1e-12);
        }
    }

    #[test]
    fn atom_transformation() {
        let atom = Atom::new(
            "C1",
            "C",
            Position::fract(0.1, 0.2, 0.3),
            Some(Adp::Aniso(UAnisoAdp::new(0.01, 0.02, 0.03, 0.001, 0.002, 0.003))),
            1,
        );
        let op = SymmetryOperation::new("-x, y+1/2, -z").unwrap();
        let moved = op.apply_to_atom(&atom).unwrap();
        assert!((moved.position.coords() - Vector3::new(-0.1, 0.7, -0.3)).norm() < 1e-12);
        assert_eq!(moved.label, "C1");
        assert_eq!(moved.disorder_group, 1);
        let Some(Adp::Aniso(u)) = moved.adp else {
            panic!("expected anisotropic ADP");
        };
        assert!((u.u12 + 0.001).abs() < 1e-12);
        assert!((u.u13 - 0.002).abs() < 1e-12);
        assert!((u.u23 + 0.003).abs() < 1e-12);
        assert!((u.u22 - 0.02).abs() < 1e-12);

        let cart = Atom::new("X", "C", Position::cart(0.0, 0.0, 0.0), None, 0);
        assert!(op.apply_to_atom(&cart).is_err());
    }
}
