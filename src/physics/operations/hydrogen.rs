// src/physics/operations/hydrogen.rs

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::{parse_mode, Modifier, ModifierMode};
use crate::error::{CifError, Result};
use crate::model::CrystalStructure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrogenMode {
    /// Drop hydrogens, their bonds and all H-bonds.
    None,
    /// Keep hydrogens but without displacement parameters.
    Constant,
    Anisotropic,
}

impl ModifierMode for HydrogenMode {
    const ALL: &'static [Self] = &[Self::None, Self::Constant, Self::Anisotropic];
}

impl fmt::Display for HydrogenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Constant => "constant",
            Self::Anisotropic => "anisotropic",
        })
    }
}

impl FromStr for HydrogenMode {
    type Err = CifError;

    fn from_str(s: &str) -> Result<Self> {
        parse_mode(HydrogenFilter::NAME, s)
    }
}

#[derive(Debug, Clone)]
pub struct HydrogenFilter {
    mode: HydrogenMode,
}

impl HydrogenFilter {
    pub fn new(mode: HydrogenMode) -> Self {
        Self { mode }
    }
}

impl Default for HydrogenFilter {
    fn default() -> Self {
        Self::new(HydrogenMode::None)
    }
}

impl Modifier for HydrogenFilter {
    type Mode = HydrogenMode;

    const NAME: &'static str = "HydrogenFilter";
    const FALLBACK: &'static [HydrogenMode] = &[
        HydrogenMode::Anisotropic,
        HydrogenMode::Constant,
        HydrogenMode::None,
    ];

    fn mode(&self) -> HydrogenMode {
        self.mode
    }

    fn set_mode(&mut self, mode: HydrogenMode) {
        self.mode = mode;
    }

    fn applicable_modes(&self, structure: &CrystalStructure) -> Vec<HydrogenMode> {
        let mut modes = vec![HydrogenMode::None];
        let hydrogens: Vec<_> = structure.atoms().iter().filter(|a| a.is_hydrogen()).collect();
        if hydrogens.is_empty() {
            return modes;
        }
        modes.push(HydrogenMode::Constant);
        if hydrogens.iter().any(|a| a.is_anisotropic()) {
            modes.push(HydrogenMode::Anisotropic);
        }
        modes
    }

    fn apply_mode(&self, structure: &CrystalStructure) -> Result<CrystalStructure> {
        let hydrogens: HashSet<&str> = structure
            .atoms()
            .iter()
            .filter(|a| a.is_hydrogen())
            .map(|a| a.label.as_str())
            .collect();

        let (atoms, bonds, h_bonds) = match self.mode {
            HydrogenMode::None => (
                structure
                    .atoms()
                    .iter()
                    .filter(|a| !a.is_hydrogen())
                    .cloned()
                    .collect(),
                structure
                    .bonds()
                    .iter()
                    .filter(|b| {
                        !hydrogens.contains(b.atom1_label.as_str())
                            && !hydrogens.contains(b.atom2_label.as_str())
                    })
                    .cloned()
                    .collect(),
                Vec::new(),
            ),
            HydrogenMode::Constant => (
                structure
                    .atoms()
                    .iter()
                    .map(|a| {
                        let mut atom = a.clone();
                        if atom.is_hydrogen() {
                            atom.adp = None;
                        }
                        atom
                    })
                    .collect(),
                structure.bonds().to_vec(),
                structure.h_bonds().to_vec(),
            ),
            HydrogenMode::Anisotropic => (
                structure.atoms().to_vec(),
                structure.bonds().to_vec(),
                structure.h_bonds().to_vec(),
            ),
        };

        Ok(CrystalStructure::new(
            structure.cell().clone(),
            atoms,
            bonds,
            h_bonds,
            structure.symmetry().clone(),
        ))
    }
}
