// src/physics/operations/bond_generator.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use log::debug;

use super::{parse_mode, Modifier, ModifierMode};
use crate::error::{CifError, Result};
use crate::model::bonds::NO_SYMMETRY;
use crate::model::elements::{element_for, ElementProperties};
use crate::model::{Bond, CrystalStructure};

/// Shorter contacts are treated as overlapping atoms, not bonds.
const MIN_BOND_LENGTH: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondGeneratorMode {
    Keep,
    Add,
    Replace,
    Create,
    Ignore,
}

impl ModifierMode for BondGeneratorMode {
    const ALL: &'static [Self] = &[
        Self::Keep,
        Self::Add,
        Self::Replace,
        Self::Create,
        Self::Ignore,
    ];
}

impl fmt::Display for BondGeneratorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keep => "keep",
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Create => "create",
            Self::Ignore => "ignore",
        })
    }
}

impl FromStr for BondGeneratorMode {
    type Err = CifError;

    fn from_str(s: &str) -> Result<Self> {
        parse_mode(BondGenerator::NAME, s)
    }
}

/// Distance based bonds from covalent radii.
#[derive(Debug, Clone)]
pub struct BondGenerator {
    element_properties: HashMap<String, ElementProperties>,
    tolerance_factor: f64,
    mode: BondGeneratorMode,
}

impl BondGenerator {
    pub fn new(
        element_properties: HashMap<String, ElementProperties>,
        tolerance_factor: f64,
        mode: BondGeneratorMode,
    ) -> Self {
        Self {
            element_properties,
            tolerance_factor,
            mode,
        }
    }

    pub fn tolerance_factor(&self) -> f64 {
        self.tolerance_factor
    }

    fn radius(&self, atom_type: &str, label: &str) -> Option<f64> {
        let element = element_for(atom_type, label, &self.element_properties)?;
        self.element_properties.get(&element).map(|p| p.radius)
    }

    /// Bonds between every pair closer than the scaled sum of their radii.
    ///
    /// A pair with a hydrogen is skipped when neither atom has a bond yet.
    pub fn generate_bonds(&self, structure: &CrystalStructure) -> Vec<Bond> {
        let bonded: HashSet<&str> = structure
            .bonds()
            .iter()
            .flat_map(|b| [b.atom1_label.as_str(), b.atom2_label.as_str()])
            .collect();

        let atoms = structure.atoms();
        let cell = structure.cell();
        let sites: Vec<_> = atoms
            .iter()
            .map(|a| {
                let radius = self.radius(&a.atom_type, &a.label);
                if radius.is_none() {
                    debug!("no radius for atom '{}' ({}), not bonding it", a.label, a.atom_type);
                }
                (a, a.cartesian(cell), radius)
            })
            .collect();

        let mut bonds = Vec::new();
        for (i, (a1, p1, r1)) in sites.iter().enumerate() {
            let Some(r1) = r1 else { continue };
            for (a2, p2, r2) in &sites[i + 1..] {
                let Some(r2) = r2 else { continue };
                let unbonded = !bonded.contains(a1.label.as_str())
                    && !bonded.contains(a2.label.as_str());
                if unbonded && (a1.is_hydrogen() || a2.is_hydrogen()) {
                    continue;
                }

                let distance = (p1 - p2).norm();
                if distance > MIN_BOND_LENGTH && distance <= (r1 + r2) * self.tolerance_factor {
                    bonds.push(Bond::new(
                        a1.label.clone(),
                        a2.label.clone(),
                        distance,
                        None,
                        NO_SYMMETRY,
                    ));
                }
            }
        }
        bonds
    }
}

impl Modifier for BondGenerator {
    type Mode = BondGeneratorMode;

    const NAME: &'static str = "BondGenerator";
    const FALLBACK: &'static [BondGeneratorMode] =
        &[BondGeneratorMode::Keep, BondGeneratorMode::Create];

    fn mode(&self) -> BondGeneratorMode {
        self.mode
    }

    fn set_mode(&mut self, mode: BondGeneratorMode) {
        self.mode = mode;
    }

    fn applicable_modes(&self, structure: &CrystalStructure) -> Vec<BondGeneratorMode> {
        if structure.bonds().is_empty() {
            vec![BondGeneratorMode::Create, BondGeneratorMode::Ignore]
        } else {
            vec![
                BondGeneratorMode::Keep,
                BondGeneratorMode::Add,
                BondGeneratorMode::Replace,
            ]
        }
    }

    fn apply_mode(&self, structure: &CrystalStructure) -> Result<CrystalStructure> {
        let bonds = match self.mode {
            BondGeneratorMode::Keep | BondGeneratorMode::Ignore => structure.bonds().to_vec(),
            BondGeneratorMode::Replace | BondGeneratorMode::Create => {
                self.generate_bonds(structure)
            }
            BondGeneratorMode::Add => {
                let existing: HashSet<(&str, &str)> = structure
                    .bonds()
                    .iter()
                    .filter(|b| !b.has_symmetry())
                    .flat_map(|b| {
                        let (a, c) = (b.atom1_label.as_str(), b.atom2_label.as_str());
                        [(a, c), (c, a)]
                    })
                    .collect();
                let mut bonds = structure.bonds().to_vec();
                bonds.extend(self.generate_bonds(structure).into_iter().filter(|b| {
                    !existing.contains(&(b.atom1_label.as_str(), b.atom2_label.as_str()))
                }));
                bonds
            }
        };

        Ok(CrystalStructure::new(
            structure.cell().clone(),
            structure.atoms().to_vec(),
            bonds,
            structure.h_bonds().to_vec(),
            structure.symmetry().clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use crate::model::elements::default_element_properties;

    fn generator(mode: BondGeneratorMode) -> BondGenerator {
        BondGenerator::new(default_element_properties(), 1.1, mode)
    }

    #[test]
    fn creates_bonds_within_tolerance() {
        // 1.5 A apart, then 3.0 A, then on top of each other
        let s = structure(
            vec![
                atom("C1", "C", (0.0, 0.0, 0.0)),
                atom("C2", "C", (0.15, 0.0, 0.0)),
                atom("C3", "C", (0.45, 0.0, 0.0)),
                atom("C4", "C", (0.45, 0.0, 0.0)),
            ],
            vec![],
        );
        let mut gen = generator(BondGeneratorMode::Keep);
        let out = gen.apply(&s).unwrap();
        assert_eq!(gen.mode(), BondGeneratorMode::Create);
        assert_eq!(out.bonds().len(), 1);
        let bond = &out.bonds()[0];
        assert_eq!((bond.atom1_label.as_str(), bond.atom2_label.as_str()), ("C1", "C2"));
        assert!((bond.bond_length - 1.5).abs() < 1e-9);
        assert_eq!(bond.bond_length_su, None);
    }

    #[test]
    fn hydrogens_need_an_existing_bond() {
        let atoms = vec![
            atom("C1", "C", (0.0, 0.0, 0.0)),
            atom("H1", "H", (0.1, 0.0, 0.0)),
            atom("O1", "O", (0.5, 0.5, 0.5)),
            atom("H2", "H", (0.5, 0.59, 0.5)),
            atom("C9", "C", (0.0, 0.15, 0.0)),
        ];
        let s = structure(atoms, vec![Bond::new("C1", "C9", 1.5, Some(0.002), ".")]);

        let added = generator(BondGeneratorMode::Add).apply(&s).unwrap();
        let pairs: Vec<(&str, &str)> = added
            .bonds()
            .iter()
            .map(|b| (b.atom1_label.as_str(), b.atom2_label.as_str()))
            .collect();
        // O1-H2 is skipped, C1-C9 is not duplicated
        assert_eq!(pairs, vec![("C1", "C9"), ("C1", "H1")]);

        let replaced = generator(BondGeneratorMode::Replace).apply(&s).unwrap();
        assert_eq!(replaced.bonds().len(), 2);
        assert!(replaced.bonds().iter().all(|b| b.bond_length_su.is_none()));

        let kept = generator(BondGeneratorMode::Keep).apply(&s).unwrap();
        assert_eq!(kept.bonds(), s.bonds());
    }

    #[test]
    fn label_fallback_for_unknown_types() {
        let s = structure(
            vec![atom("Cl1", "Cl1-", (0.0, 0.0, 0.0)), atom("C1", "?", (0.17, 0.0, 0.0))],
            vec![],
        );
        let out = generator(BondGeneratorMode::Create).apply(&s).unwrap();
        assert_eq!(out.bonds().len(), 1);
    }
}
