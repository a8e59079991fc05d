// src/io/cif/cif_loop.rs

use std::cell::OnceCell;
use std::collections::HashMap;

use super::text::{parse_multiline_string, tokenize_line};
use super::value::{parse_value, ParsedValue, Value};
use crate::error::{CifError, Result};

/// Category prefixes that name a loop whenever at least half of its headers use them.
/// More specific prefixes come before the prefixes they extend.
const PRIORITY_PREFIXES: [&str; 30] = [
    "_atom_site_aniso",
    "_atom_site",
    "_atom_type_scat",
    "_atom_type",
    "_geom_bond",
    "_geom_angle",
    "_geom_torsion",
    "_geom_hbond",
    "_geom_contact",
    "_space_group_symop",
    "_symmetry_equiv_pos",
    "_symmetry_equiv",
    "_platon_squeeze_void",
    "_smtbx_masks_void",
    "_diffrn_standard_refln",
    "_diffrn_refln",
    "_diffrn_radiation",
    "_diffrn_scale_group",
    "_exptl_crystal_face",
    "_refine_ls_class",
    "_reflns_class",
    "_refln",
    "_pd_peak",
    "_pd_data",
    "_publ_author",
    "_citation_author",
    "_citation",
    "_audit_author",
    "_chemical_conn_atom",
    "_chemical_conn_bond",
];

/// Split a header like `_atom_site.fract_x` into `["atom", "site", "fract", "x"]`.
pub fn header_tokens(header: &str) -> Vec<&str> {
    header
        .split(['_', '.'])
        .filter(|t| !t.is_empty())
        .collect()
}

/// Build a name from the first `count` tokens of a header.
pub fn name_from_tokens(header: &str, count: usize) -> String {
    let tokens = header_tokens(header);
    format!("_{}", tokens[..count.min(tokens.len())].join("_"))
}

fn starts_with_category(header: &str, prefix: &str) -> bool {
    header.starts_with(prefix)
        && header[prefix.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == '_' || c == '.')
}

/// Derive the category name shared by a set of loop headers.
///
/// With `use_priority`, well known CIF categories win as soon as half of the headers
/// belong to them. Otherwise the name comes from dot notation or from the longest
/// run of leading `_`/`.` separated tokens that a majority of headers share.
pub fn find_common_start(headers: &[String], use_priority: bool) -> String {
    let n = headers.len();
    if n == 0 {
        return String::new();
    }
    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();

    if use_priority {
        for prefix in PRIORITY_PREFIXES {
            let count = lower
                .iter()
                .filter(|h| starts_with_category(h, prefix))
                .count();
            if count * 2 >= n {
                return prefix.to_string();
            }
        }
    }

    // _category.item
    let mut dot_counts: Vec<(&str, usize)> = Vec::new();
    for header in headers {
        if let Some((category, _)) = header.split_once('.') {
            match dot_counts.iter_mut().find(|(c, _)| *c == category) {
                Some((_, count)) => *count += 1,
                None => dot_counts.push((category, 1)),
            }
        }
    }
    if let Some((category, count)) = dot_counts.iter().max_by_key(|(_, count)| *count) {
        if count * 2 >= n {
            return category.to_string();
        }
    }

    let tokenized: Vec<Vec<&str>> = headers.iter().map(|h| header_tokens(h)).collect();
    let mut candidates: Vec<&Vec<&str>> = tokenized.iter().collect();
    let mut common: Vec<&str> = Vec::new();
    let mut pos = 0;
    loop {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for tokens in &candidates {
            if let Some(&token) = tokens.get(pos) {
                match counts.iter_mut().find(|(t, _)| *t == token) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((token, 1)),
                }
            }
        }
        let Some(&(token, count)) = counts.iter().max_by_key(|(_, count)| *count) else {
            break;
        };
        let majority = if n == 2 { count == 2 } else { count * 2 >= n };
        if !majority {
            break;
        }
        common.push(token);
        candidates.retain(|tokens| tokens.get(pos) == Some(&token));
        pos += 1;
    }

    if common.is_empty() {
        return headers[0].clone();
    }
    format!("_{}", common.join("_"))
}

#[derive(Debug, Clone)]
struct LoopData {
    headers: Vec<String>,
    columns: HashMap<String, Vec<Value>>,
    row_count: usize,
}

/// A `loop_` table. Header and data lines are captured on construction; the values
/// are tokenized on first access and cached.
#[derive(Debug, Clone)]
pub struct CifLoop {
    headers: Vec<String>,
    data_lines: Vec<String>,
    split_su: bool,
    name: String,
    data: OnceCell<Result<LoopData>>,
}

impl CifLoop {
    /// Read the loop starting at `lines[start]` (the `loop_` line).
    ///
    /// Returns the loop and the index of the first line after it.
    pub fn from_lines(lines: &[&str], start: usize, split_su: bool) -> (CifLoop, usize) {
        let mut i = start + 1;
        let mut headers = Vec::new();
        while i < lines.len() {
            let line = lines[i].trim();
            if line.is_empty() {
                i += 1;
                continue;
            }
            if !line.starts_with('_') {
                break;
            }
            if let Some(header) = line.split_whitespace().next() {
                headers.push(header.to_string());
            }
            i += 1;
        }

        let mut data_lines = Vec::new();
        let mut in_text = false;
        while i < lines.len() {
            let line = lines[i];
            if line.starts_with(';') {
                in_text = !in_text;
            } else if !in_text {
                let trimmed = line.trim_start();
                if trimmed.starts_with('_') || trimmed.to_lowercase().starts_with("loop_") {
                    break;
                }
            }
            data_lines.push(line.to_string());
            i += 1;
        }

        (CifLoop::new(headers, data_lines, split_su), i)
    }

    pub fn new(headers: Vec<String>, data_lines: Vec<String>, split_su: bool) -> Self {
        let name = find_common_start(&headers, true);
        Self {
            headers,
            data_lines,
            split_su,
            name,
            data: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Headers as written in the file, without generated `_su` columns.
    pub fn raw_headers(&self) -> &[String] {
        &self.headers
    }

    /// Name derivation without the category priority list.
    pub fn find_common_start(&self, use_priority: bool) -> String {
        find_common_start(&self.headers, use_priority)
    }

    fn parse_data(&self) -> Result<LoopData> {
        let lines: Vec<&str> = self.data_lines.iter().map(String::as_str).collect();
        let mut values: Vec<ParsedValue> = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            if lines[i].starts_with(';') {
                let (text, next) = parse_multiline_string(&lines, i)?;
                values.push(ParsedValue {
                    value: Value::Text(text),
                    su: None,
                });
                i = next;
                continue;
            }
            values.extend(
                tokenize_line(lines[i])
                    .iter()
                    .map(|token| parse_value(token, self.split_su)),
            );
            i += 1;
        }

        let n_cols = self.headers.len();
        if values.is_empty() || n_cols == 0 {
            return Err(CifError::EmptyLoop {
                name: self.name.clone(),
            });
        }
        if values.len() % n_cols != 0 {
            let dump = values
                .iter()
                .map(|v| format!("{}({})", v.value, v.su_or_nan()))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CifError::UnevenLoop {
                name: self.name.clone(),
                columns: n_cols,
                values: values.len(),
                dump,
            });
        }

        let row_count = values.len() / n_cols;
        let mut headers = self.headers.clone();
        let mut columns = HashMap::with_capacity(n_cols * 2);
        for (col, header) in self.headers.iter().enumerate() {
            let column: Vec<&ParsedValue> = values.iter().skip(col).step_by(n_cols).collect();
            if column.iter().any(|v| v.su.is_some()) {
                let su_header = format!("{header}_su");
                let sus = column.iter().map(|v| Value::Float(v.su_or_nan())).collect();
                headers.push(su_header.clone());
                columns.insert(su_header, sus);
            }
            columns.insert(header.clone(), column.into_iter().map(|v| v.value.clone()).collect());
        }

        Ok(LoopData {
            headers,
            columns,
            row_count,
        })
    }

    fn parsed(&self) -> Result<&LoopData> {
        self.data
            .get_or_init(|| self.parse_data())
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Force parsing; repeated calls reuse the first result.
    pub fn parse(&self) -> Result<()> {
        self.parsed().map(|_| ())
    }

    /// All headers including generated `_su` columns.
    pub fn headers(&self) -> Result<&[String]> {
        Ok(&self.parsed()?.headers)
    }

    pub fn row_count(&self) -> Result<usize> {
        Ok(self.parsed()?.row_count)
    }

    /// The first candidate key present in this loop, as spelled in the loop.
    pub fn find_key(&self, keys: &[&str]) -> Result<Option<String>> {
        let data = self.parsed()?;
        for key in keys {
            if data.columns.contains_key(*key) {
                return Ok(Some(key.to_string()));
            }
        }
        for key in keys {
            if let Some(h) = data.headers.iter().find(|h| h.eq_ignore_ascii_case(key)) {
                return Ok(Some(h.clone()));
            }
        }
        Ok(None)
    }

    pub fn try_get(&self, keys: &[&str]) -> Result<Option<&[Value]>> {
        let data = self.parsed()?;
        Ok(self
            .find_key(keys)?
            .and_then(|k| data.columns.get(&k))
            .map(Vec::as_slice))
    }

    /// Column of the first present key. Fails naming every candidate key.
    pub fn get(&self, keys: &[&str]) -> Result<&[Value]> {
        self.try_get(keys)?
            .ok_or_else(|| CifError::missing_key(keys, format!("loop '{}'", self.name)))
    }

    pub fn get_index(&self, keys: &[&str], row: usize) -> Result<&Value> {
        let column = self.get(keys)?;
        column.get(row).ok_or_else(|| {
            CifError::missing_key(keys, format!("row {row} of loop '{}'", self.name))
        })
    }

    /// Like [`get_index`](Self::get_index) but a missing column yields `default`.
    pub fn get_index_or<'a>(
        &'a self,
        keys: &[&str],
        row: usize,
        default: &'a Value,
    ) -> Result<&'a Value> {
        match self.try_get(keys)? {
            Some(column) => Ok(column.get(row).unwrap_or(default)),
            None => Ok(default),
        }
    }

    /// Replace the values of an existing column. Used by the repair heuristics.
    pub fn set_column(&mut self, header: &str, values: Vec<Value>) -> Result<()> {
        self.parse()?;
        let name = self.name.clone();
        let Some(Ok(data)) = self.data.get_mut() else {
            return Err(CifError::EmptyLoop { name });
        };
        if values.len() != data.row_count {
            return Err(CifError::UnevenLoop {
                name,
                columns: data.headers.len(),
                values: values.len(),
                dump: format!("replacement for '{header}' has wrong length"),
            });
        }
        match data.columns.get_mut(header) {
            Some(column) => {
                *column = values;
                Ok(())
            }
            None => Err(CifError::missing_key(&[header], format!("loop '{name}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loop_from(text: &str) -> CifLoop {
        let lines: Vec<&str> = text.lines().collect();
        CifLoop::from_lines(&lines, 0, true).0
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn basic_columns() {
        let lp = loop_from("loop_\n_atom_site_label\n_atom_site_type_symbol\nC1 C\nO1 O\n");
        assert_eq!(lp.name(), "_atom_site");
        assert_eq!(
            lp.get(&["_atom_site_label"]).unwrap(),
            &[Value::from("C1"), Value::from("O1")]
        );
        assert_eq!(
            lp.get(&["_atom_site.type_symbol", "_atom_site_type_symbol"])
                .unwrap(),
            &[Value::from("C"), Value::from("O")]
        );
    }

    #[test]
    fn su_columns_are_generated() {
        let lp = loop_from("loop_\n_a_x\n_a_y\n1.5(2) 3\n2.5 4\n");
        let headers = lp.headers().unwrap();
        assert_eq!(headers, &strings(&["_a_x", "_a_y", "_a_x_su"]));
        let su = lp.get(&["_a_x_su"]).unwrap();
        assert_eq!(su.len(), 2);
        assert_eq!(su[0], Value::Float(0.2));
        assert!(su[1].as_f64().unwrap().is_nan());
        for h in headers {
            assert_eq!(lp.get(&[h.as_str()]).unwrap().len(), lp.row_count().unwrap());
        }
    }

    #[test]
    fn values_across_lines_and_text_fields() {
        let lp = loop_from("loop_\n_t_a\n_t_b\n_t_c\n1 2\n3 4 5\n6 7\n;\nlong text\n;\n8\n");
        assert_eq!(lp.row_count().unwrap(), 3);
        assert_eq!(lp.get(&["_t_c"]).unwrap()[0], Value::Int(3));
        assert_eq!(lp.get(&["_t_b"]).unwrap()[2], Value::from("long text"));
        assert_eq!(lp.get(&["_t_c"]).unwrap()[2], Value::Int(8));
    }

    #[test]
    fn loop_ends_at_next_key() {
        let lines: Vec<&str> = "loop_\n_x_a\n1\n2\n_next 3\n".lines().collect();
        let (lp, next) = CifLoop::from_lines(&lines, 0, true);
        assert_eq!(next, 4);
        assert_eq!(lp.row_count().unwrap(), 2);
    }

    #[test]
    fn uneven_loop_is_an_error() {
        let lp = loop_from("loop_\n_x_a\n_x_b\n1 2 3\n");
        match lp.parse() {
            Err(CifError::UnevenLoop {
                columns, values, ..
            }) => {
                assert_eq!(columns, 2);
                assert_eq!(values, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        // memoized error is returned again
        assert!(lp.row_count().is_err());
    }

    #[test]
    fn empty_loop_is_an_error() {
        let lp = loop_from("loop_\n_x_a\n_x_b\n");
        assert!(matches!(lp.parse(), Err(CifError::EmptyLoop { .. })));
    }

    #[test]
    fn missing_key_lists_candidates() {
        let lp = loop_from("loop_\n_x_a\n1\n");
        let err = lp.get(&["_x.b", "_x_b"]).unwrap_err().to_string();
        assert!(err.contains("_x.b") && err.contains("_x_b") && err.contains("_x_a"));
        let default = Value::from("?");
        assert_eq!(lp.get_index_or(&["_x_b"], 0, &default).unwrap(), &default);
    }

    #[test]
    fn case_insensitive_fallback() {
        let lp = loop_from("loop_\n_atom_site_U_iso_or_equiv\n0.01\n");
        assert!(lp.get(&["_atom_site_u_iso_or_equiv"]).is_ok());
    }

    #[test]
    fn common_start_priority_and_tokens() {
        let h = strings(&["_geom_bond_atom_site_label_1", "_geom_bond_distance"]);
        assert_eq!(find_common_start(&h, true), "_geom_bond");

        let h = strings(&["_atom_site_oxford_label", "_atom_site_oxford_type"]);
        assert_eq!(find_common_start(&h, true), "_atom_site");
        assert_eq!(find_common_start(&h, false), "_atom_site_oxford");

        let h = strings(&["_foo_bar_a", "_foo_bar_b", "_foo_baz_c"]);
        assert_eq!(find_common_start(&h, true), "_foo_bar");

        let h = strings(&["_cat.one", "_cat.two", "_other.three"]);
        assert_eq!(find_common_start(&h, true), "_cat");

        let h = strings(&["_atom_sites_fract_tran_matrix_11", "_atom_sites_fract_tran_matrix_12"]);
        assert_eq!(find_common_start(&h, true), "_atom_sites_fract_tran_matrix");
    }

    #[test]
    fn set_column_rewrites_values() {
        let mut lp = loop_from("loop_\n_x_a\n_x_b\n1 c1\n2 c2\n");
        lp.set_column("_x_b", vec![Value::from("C1"), Value::from("C2")])
            .unwrap();
        assert_eq!(lp.get(&["_x_b"]).unwrap()[1], Value::from("C2"));
        assert!(lp.set_column("_x_b", vec![]).is_err());
    }
}
