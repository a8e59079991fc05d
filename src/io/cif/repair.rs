// src/io/cif/repair.rs
//
// Best effort fixes for CIF files written by tools that disagree on how atom labels
// and symmetry codes are spelled. Nothing here fails: anything that cannot be resolved
// is logged and left as it was.

use std::collections::HashMap;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;

use super::block::CifBlock;
use super::value::Value;

static LABEL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(_\$\d+|\^[^_^]*|_[^_^]*)$").expect("valid regex"));
static CANONICAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+_\d{3}$").expect("valid regex"));
static SEPARATED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[ .\-](\d{3})$").expect("valid regex"));
static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5,6}$").expect("valid regex"));

const ATOM_LABEL_KEYS: [&str; 2] = ["_atom_site_label", "_atom_site.label"];
const ANISO_LABEL_KEYS: [&str; 2] = ["_atom_site_aniso_label", "_atom_site_aniso.label"];

const BOND_LABEL_KEYS: [[&str; 2]; 2] = [
    ["_geom_bond_atom_site_label_1", "_geom_bond.atom_site_label_1"],
    ["_geom_bond_atom_site_label_2", "_geom_bond.atom_site_label_2"],
];
const HBOND_LABEL_KEYS: [[&str; 2]; 3] = [
    ["_geom_hbond_atom_site_label_D", "_geom_hbond.atom_site_label_d"],
    ["_geom_hbond_atom_site_label_H", "_geom_hbond.atom_site_label_h"],
    ["_geom_hbond_atom_site_label_A", "_geom_hbond.atom_site_label_a"],
];
const BOND_SYMMETRY_KEYS: [&str; 2] = ["_geom_bond_site_symmetry_2", "_geom_bond.site_symmetry_2"];
const HBOND_SYMMETRY_KEYS: [&str; 2] = [
    "_geom_hbond_site_symmetry_A",
    "_geom_hbond.site_symmetry_a",
];

/// Uppercase, drop brackets and optionally a trailing `^a`, `_a` or `_$1` annotation.
pub fn normalize_label(label: &str, strip_suffix: bool) -> String {
    let cleaned: String = label
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '[' | ']' | '{' | '}'))
        .collect::<String>()
        .to_uppercase();
    if strip_suffix {
        LABEL_SUFFIX.replace(&cleaned, "").into_owned()
    } else {
        cleaned
    }
}

/// Map normalized labels to their canonical spelling. Keys that several distinct
/// labels collapse onto are dropped.
fn build_label_map(reference: &[String], strip_suffix: bool) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    let mut ambiguous: Vec<String> = Vec::new();
    for label in reference {
        let key = normalize_label(label, strip_suffix);
        match map.get(&key) {
            Some(existing) if existing != label => ambiguous.push(key),
            _ => {
                map.insert(key, label.clone());
            }
        }
    }
    for key in ambiguous {
        if map.remove(&key).is_some() {
            warn!("label form '{key}' matches several atoms, it will not be corrected");
        }
    }
    map
}

/// Rewrite every value of a label column to the reference label it unambiguously
/// matches. Values without a match are returned unchanged.
pub fn reconcile_atom_labels(column: &[Value], reference: &[String]) -> Vec<Value> {
    let exact = build_label_map(reference, false);
    let stripped = build_label_map(reference, true);

    column
        .iter()
        .map(|value| {
            if value.is_placeholder() {
                return value.clone();
            }
            let label = value.to_label();
            let hit = exact
                .get(&normalize_label(&label, false))
                .or_else(|| stripped.get(&normalize_label(&label, true)));
            match hit {
                Some(canonical) if *canonical != label => {
                    debug!("label '{label}' reconciled to '{canonical}'");
                    Value::Text(canonical.clone())
                }
                _ => value.clone(),
            }
        })
        .collect()
}

fn distance_from_555(digits: &str) -> u32 {
    digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d.abs_diff(5))
        .sum()
}

/// Bring a symmetry code into `<id>_<abc>` form where its intent is recognisable.
pub fn guess_symmetry_operation(code: &str) -> String {
    let code = code.trim();
    if code == "." || CANONICAL_CODE.is_match(code) {
        return code.to_string();
    }
    if let Some(caps) = SEPARATED_CODE.captures(code) {
        return format!("{}_{}", &caps[1], &caps[2]);
    }
    if DIGIT_RUN.is_match(code) {
        let (lead_translation, lead_id) = code.split_at(3);
        let (trail_id, trail_translation) = code.split_at(code.len() - 3);
        // ties go to the trailing block, the usual order
        if distance_from_555(lead_translation) < distance_from_555(trail_translation) {
            return format!("{lead_id}_{lead_translation}");
        }
        return format!("{trail_id}_{trail_translation}");
    }
    debug!("symmetry code '{code}' left unchanged");
    code.to_string()
}

/// Text of a symmetry code cell. `3.550` is read as the float 3.55, so the
/// translation digits are padded back to three.
fn symmetry_code_text(value: &Value) -> String {
    match value {
        Value::Float(f) => {
            let text = f.to_string();
            match text.split_once('.') {
                Some((id, digits)) if digits.len() <= 3 => format!("{id}.{digits:0<3}"),
                None if f.fract() == 0.0 => format!("{text}.000"),
                _ => text,
            }
        }
        other => other.to_label(),
    }
}

fn rewrite_column(
    block: &mut CifBlock,
    loop_keys: &[&str],
    column_keys: &[&str],
    rewrite: impl Fn(&[Value]) -> Vec<Value>,
) -> usize {
    let Some(lp) = block.get_loop_mut(loop_keys) else {
        return 0;
    };
    let header = match lp.find_key(column_keys) {
        Ok(Some(h)) => h,
        Ok(None) => return 0,
        Err(e) => {
            warn!("cannot repair loop '{}': {e}", lp.name());
            return 0;
        }
    };
    let (updated, changed) = match lp.get(&[header.as_str()]) {
        Ok(old) => {
            let new = rewrite(old);
            let changed = old.iter().zip(&new).filter(|(a, b)| a != b).count();
            (new, changed)
        }
        Err(e) => {
            warn!("cannot repair column '{header}': {e}");
            return 0;
        }
    };
    if changed == 0 {
        return 0;
    }
    match lp.set_column(&header, updated) {
        Ok(()) => changed,
        Err(e) => {
            warn!("cannot repair column '{header}': {e}");
            0
        }
    }
}

/// Repair label and symmetry code spellings in place so that a structure can be
/// built from the block. Returns the number of values changed.
pub fn try_to_fix_cif_block(
    block: &mut CifBlock,
    fix_adp_labels: bool,
    fix_bond_labels: bool,
    fix_bond_symmetry: bool,
) -> usize {
    let reference: Vec<String> = match block
        .get_loop_opt(&["_atom_site"])
        .map(|lp| lp.get(&ATOM_LABEL_KEYS))
    {
        Some(Ok(labels)) => labels.iter().map(Value::to_label).collect(),
        Some(Err(e)) => {
            warn!("no atom labels to repair against: {e}");
            return 0;
        }
        None => {
            warn!("block '{}' has no atom site loop, nothing to repair", block.name());
            return 0;
        }
    };

    let mut changed = 0;
    let relabel = |column: &[Value]| reconcile_atom_labels(column, &reference);

    if fix_adp_labels {
        changed += rewrite_column(block, &["_atom_site_aniso"], &ANISO_LABEL_KEYS, relabel);
    }

    if fix_bond_labels {
        for keys in &BOND_LABEL_KEYS {
            changed += rewrite_column(block, &["_geom_bond"], keys, relabel);
        }
        for keys in &HBOND_LABEL_KEYS {
            changed += rewrite_column(block, &["_geom_hbond"], keys, relabel);
        }
    }

    if fix_bond_symmetry {
        let guess = |column: &[Value]| -> Vec<Value> {
            column
                .iter()
                .map(|v| {
                    if v.is_placeholder() {
                        return v.clone();
                    }
                    let text = symmetry_code_text(v);
                    let guessed = guess_symmetry_operation(&text);
                    if guessed == text {
                        v.clone()
                    } else {
                        Value::Text(guessed)
                    }
                })
                .collect()
        };
        changed += rewrite_column(block, &["_geom_bond"], &BOND_SYMMETRY_KEYS, guess);
        changed += rewrite_column(block, &["_geom_hbond"], &HBOND_SYMMETRY_KEYS, guess);
    }

    if changed > 0 {
        warn!("repaired {changed} values in block '{}'", block.name());
    }
    changed
}
