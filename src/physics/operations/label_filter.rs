// src/physics/operations/label_filter.rs

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use log::warn;

use super::{parse_mode, Modifier, ModifierMode};
use crate::error::{CifError, Result};
use crate::model::CrystalStructure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFilterMode {
    On,
    Off,
}

impl ModifierMode for LabelFilterMode {
    const ALL: &'static [Self] = &[Self::On, Self::Off];
}

impl fmt::Display for LabelFilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
        })
    }
}

impl FromStr for LabelFilterMode {
    type Err = CifError;

    fn from_str(s: &str) -> Result<Self> {
        parse_mode(AtomLabelFilter::NAME, s)
    }
}

/// Hides atoms by label.
///
/// Each entry is a label, a comma separated list of labels, or a range `C3>C7`
/// covering every atom from `C3` to `C7` in the order of the structure.
#[derive(Debug, Clone)]
pub struct AtomLabelFilter {
    filtered_labels: Vec<String>,
    mode: LabelFilterMode,
}

impl AtomLabelFilter {
    pub fn new(filtered_labels: Vec<String>, mode: LabelFilterMode) -> Self {
        Self {
            filtered_labels,
            mode,
        }
    }

    pub fn filtered_labels(&self) -> &[String] {
        &self.filtered_labels
    }

    pub fn set_filtered_labels(&mut self, labels: Vec<String>) {
        self.filtered_labels = labels;
    }

    /// Every label the entries name, with ranges expanded against `structure`.
    pub fn resolve_labels(&self, structure: &CrystalStructure) -> HashSet<String> {
        let mut resolved = HashSet::new();
        let pieces = self
            .filtered_labels
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|p| !p.is_empty());

        for piece in pieces {
            let Some((start, end)) = piece.split_once('>') else {
                resolved.insert(piece.to_string());
                continue;
            };
            let (start, end) = (start.trim(), end.trim());
            match (structure.atom_index(start), structure.atom_index(end)) {
                (Some(i), Some(j)) => {
                    let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
                    resolved.extend(structure.atoms()[lo..=hi].iter().map(|a| a.label.clone()));
                }
                _ => warn!("label range '{piece}' names atoms that are not in the structure"),
            }
        }
        resolved
    }
}

impl Default for AtomLabelFilter {
    fn default() -> Self {
        Self::new(Vec::new(), LabelFilterMode::Off)
    }
}

impl Modifier for AtomLabelFilter {
    type Mode = LabelFilterMode;

    const NAME: &'static str = "AtomLabelFilter";
    const FALLBACK: &'static [LabelFilterMode] = &[LabelFilterMode::Off];

    fn mode(&self) -> LabelFilterMode {
        self.mode
    }

    fn set_mode(&mut self, mode: LabelFilterMode) {
        self.mode = mode;
    }

    fn applicable_modes(&self, _structure: &CrystalStructure) -> Vec<LabelFilterMode> {
        LabelFilterMode::ALL.to_vec()
    }

    fn apply_mode(&self, structure: &CrystalStructure) -> Result<CrystalStructure> {
        let removed = match self.mode {
            LabelFilterMode::On => self.resolve_labels(structure),
            LabelFilterMode::Off => HashSet::new(),
        };
        let kept = |label: &String| !removed.contains(label);

        Ok(CrystalStructure::new(
            structure.cell().clone(),
            structure
                .atoms()
                .iter()
                .filter(|a| kept(&a.label))
                .cloned()
                .collect(),
            structure
                .bonds()
                .iter()
                .filter(|b| kept(&b.atom1_label) && kept(&b.atom2_label))
                .cloned()
                .collect(),
            structure
                .h_bonds()
                .iter()
                .filter(|h| {
                    kept(&h.donor_atom_label)
                        && kept(&h.hydrogen_atom_label)
                        && kept(&h.acceptor_atom_label)
                })
                .cloned()
                .collect(),
            structure.symmetry().clone(),
        ))
    }
}
