// src/physics/operations/mod.rs
//
// Structure modifiers. Each one takes a structure and returns a new one; the input
// is never touched. Modes are plain enums, validated when parsed from text.

pub mod bond_generator;
pub mod disorder;
pub mod grow;
pub mod hydrogen;
pub mod label_filter;

use std::fmt;
use std::str::FromStr;

use log::warn;

use crate::config::Config;
use crate::error::{CifError, Result};
use crate::model::elements::default_element_properties;
use crate::model::CrystalStructure;

pub use bond_generator::{BondGenerator, BondGeneratorMode};
pub use disorder::{DisorderFilter, DisorderMode};
pub use grow::{combine_sym_op_label, GrowState, SymmetryGrower, SymmetryMode};
pub use hydrogen::{HydrogenFilter, HydrogenMode};
pub use label_filter::{AtomLabelFilter, LabelFilterMode};

/// Lowercase with `_` and spaces turned into `-`, the form every mode prints as.
pub fn normalize_mode(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect()
}

/// A closed set of modes with a canonical text form.
pub trait ModifierMode: Copy + PartialEq + fmt::Debug + fmt::Display + 'static {
    const ALL: &'static [Self];
}

/// Parse a mode by its normalized name; used by every mode's `FromStr`.
pub fn parse_mode<M: ModifierMode>(modifier: &'static str, text: &str) -> Result<M> {
    let wanted = normalize_mode(text);
    M::ALL
        .iter()
        .copied()
        .find(|m| m.to_string() == wanted)
        .ok_or_else(|| CifError::InvalidMode {
            modifier,
            mode: text.to_string(),
            valid: M::ALL.iter().map(|m| m.to_string()).collect(),
        })
}

pub trait Modifier {
    type Mode: ModifierMode + FromStr<Err = CifError>;

    const NAME: &'static str;

    /// Modes tried in order when the current one does not fit a structure.
    const FALLBACK: &'static [Self::Mode];

    /// Applying this modifier can change the extent of the structure.
    const REQUIRES_CAMERA_UPDATE: bool = false;

    fn mode(&self) -> Self::Mode;

    fn set_mode(&mut self, mode: Self::Mode);

    fn applicable_modes(&self, structure: &CrystalStructure) -> Vec<Self::Mode>;

    /// Apply the current mode. Callers go through [`Modifier::apply`].
    fn apply_mode(&self, structure: &CrystalStructure) -> Result<CrystalStructure>;

    fn set_mode_str(&mut self, mode: &str) -> Result<()> {
        self.set_mode(mode.parse()?);
        Ok(())
    }

    /// Switch to a mode that fits `structure` if the current one does not.
    fn ensure_valid_mode(&mut self, structure: &CrystalStructure) -> Self::Mode {
        let applicable = self.applicable_modes(structure);
        if applicable.contains(&self.mode()) {
            return self.mode();
        }
        let replacement = Self::FALLBACK
            .iter()
            .copied()
            .find(|m| applicable.contains(m))
            .or_else(|| applicable.first().copied());
        if let Some(mode) = replacement {
            warn!(
                "{} mode '{}' does not apply to this structure, using '{}'",
                Self::NAME,
                self.mode(),
                mode
            );
            self.set_mode(mode);
        }
        self.mode()
    }

    /// Advance to the next applicable mode, wrapping around.
    fn cycle_mode(&mut self, structure: &CrystalStructure) -> Self::Mode {
        self.ensure_valid_mode(structure);
        let applicable = self.applicable_modes(structure);
        if let Some(pos) = applicable.iter().position(|m| *m == self.mode()) {
            self.set_mode(applicable[(pos + 1) % applicable.len()]);
        }
        self.mode()
    }

    fn apply(&mut self, structure: &CrystalStructure) -> Result<CrystalStructure> {
        self.ensure_valid_mode(structure);
        self.apply_mode(structure)
    }
}

/// The modifiers in the order a viewer applies them.
pub struct ModifierPipeline {
    pub label_filter: AtomLabelFilter,
    pub disorder: DisorderFilter,
    pub hydrogen: HydrogenFilter,
    pub bond_generator: BondGenerator,
    pub grower: SymmetryGrower,
}

impl ModifierPipeline {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            label_filter: AtomLabelFilter::new(
                config.filtered_labels.clone(),
                config.label_filter_mode.parse()?,
            ),
            disorder: DisorderFilter::new(config.disorder_mode.parse()?),
            hydrogen: HydrogenFilter::new(config.hydrogen_mode.parse()?),
            bond_generator: BondGenerator::new(
                default_element_properties(),
                config.bond_tolerance,
                config.bond_mode.parse()?,
            ),
            grower: SymmetryGrower::new(config.symmetry_mode.parse()?),
        })
    }

    pub fn apply(&mut self, structure: &CrystalStructure) -> Result<CrystalStructure> {
        let filtered = self.label_filter.apply(structure)?;
        let ordered = self.disorder.apply(&filtered)?;
        let hydrogens = self.hydrogen.apply(&ordered)?;
        let bonded = self.bond_generator.apply(&hydrogens)?;
        self.grower.apply(&bonded)
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::model::{Atom, Bond, CellSymmetry, CrystalStructure, Position, UnitCell};

    pub fn cubic() -> UnitCell {
        UnitCell::new(10.0, 10.0, 10.0, 90.0, 90.0, 90.0).unwrap()
    }

    pub fn atom(label: &str, element: &str, xyz: (f64, f64, f64)) -> Atom {
        Atom::new(label, element, Position::fract(xyz.0, xyz.1, xyz.2), None, 0)
    }

    pub fn structure(atoms: Vec<Atom>, bonds: Vec<Bond>) -> CrystalStructure {
        CrystalStructure::new(cubic(), atoms, bonds, vec![], CellSymmetry::p1())
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::model::Bond;

    #[test]
    fn mode_names_are_normalized() {
        assert_eq!("CONSTANT".parse::<HydrogenMode>().unwrap(), HydrogenMode::Constant);
        assert_eq!(
            "bonds_yes_hbonds_no".parse::<SymmetryMode>().unwrap(),
            SymmetryMode::new(GrowState::Yes, GrowState::No)
        );
        match "sometimes".parse::<DisorderMode>() {
            Err(CifError::InvalidMode { valid, .. }) => {
                assert_eq!(valid, vec!["all", "group1", "group2"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fallback_and_cycling() {
        let s = structure(
            vec![atom("C1", "C", (0.0, 0.0, 0.0)), atom("H1", "H", (0.1, 0.0, 0.0))],
            vec![Bond::new("C1", "H1", 1.0, None, ".")],
        );
        let mut filter = HydrogenFilter::new(HydrogenMode::Anisotropic);
        // no anisotropic hydrogens, so the next preference is used
        assert_eq!(filter.ensure_valid_mode(&s), HydrogenMode::Constant);
        assert_eq!(filter.cycle_mode(&s), HydrogenMode::None);
        assert_eq!(filter.cycle_mode(&s), HydrogenMode::Constant);
    }

    #[test]
    fn pipeline_from_default_config() {
        let s = structure(
            vec![atom("C1", "C", (0.0, 0.0, 0.0)), atom("C2", "C", (0.15, 0.0, 0.0))],
            vec![],
        );
        let mut pipeline = ModifierPipeline::from_config(&Config::default()).unwrap();
        let out = pipeline.apply(&s).unwrap();
        assert_eq!(out.atoms().len(), 2);
        assert_eq!(out.bonds().len(), 1);
        assert!(SymmetryGrower::REQUIRES_CAMERA_UPDATE);
        assert!(!HydrogenFilter::REQUIRES_CAMERA_UPDATE);
    }
}
