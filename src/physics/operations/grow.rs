// src/physics/operations/grow.rs
//
// Completes molecules cut by the asymmetric unit. Every bond or H-bond that points at
// a symmetry equivalent atom pulls in the whole connected group of that atom under the
// named operation, relabelled `label@code`.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::{parse_mode, Modifier, ModifierMode};
use crate::error::{CifError, Result};
use crate::model::bonds::NO_SYMMETRY;
use crate::model::{Atom, Bond, CrystalStructure, HBond};

/// Label of an atom generated by the symmetry code `code`.
pub fn combine_sym_op_label(label: &str, code: &str) -> String {
    let code = code.trim();
    if code.is_empty() || code == NO_SYMMETRY {
        label.to_string()
    } else {
        format!("{label}@{code}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowState {
    Yes,
    No,
    /// Nothing of this kind to grow.
    None,
}

impl GrowState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetryMode {
    pub bonds: GrowState,
    pub hbonds: GrowState,
}

impl SymmetryMode {
    pub const fn new(bonds: GrowState, hbonds: GrowState) -> Self {
        Self { bonds, hbonds }
    }
}

impl ModifierMode for SymmetryMode {
    const ALL: &'static [Self] = &[
        Self::new(GrowState::Yes, GrowState::Yes),
        Self::new(GrowState::Yes, GrowState::No),
        Self::new(GrowState::Yes, GrowState::None),
        Self::new(GrowState::No, GrowState::Yes),
        Self::new(GrowState::No, GrowState::No),
        Self::new(GrowState::No, GrowState::None),
        Self::new(GrowState::None, GrowState::Yes),
        Self::new(GrowState::None, GrowState::No),
        Self::new(GrowState::None, GrowState::None),
    ];
}

impl fmt::Display for SymmetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bonds-{}-hbonds-{}", self.bonds.as_str(), self.hbonds.as_str())
    }
}

impl FromStr for SymmetryMode {
    type Err = CifError;

    fn from_str(s: &str) -> Result<Self> {
        parse_mode(SymmetryGrower::NAME, s)
    }
}

/// Atoms and bonds accumulated while growing one structure.
#[derive(Debug, Default)]
pub struct GrowthState {
    atoms: Vec<Atom>,
    labels: HashSet<String>,
    bonds: Vec<Bond>,
    h_bonds: Vec<HBond>,
    /// (label, code) pairs already generated
    grown: HashSet<(String, String)>,
}

impl GrowthState {
    /// Start from the original atoms and the symmetry free bonds and H-bonds.
    pub fn new(structure: &CrystalStructure) -> Self {
        Self {
            atoms: structure.atoms().to_vec(),
            labels: structure.atoms().iter().map(|a| a.label.clone()).collect(),
            bonds: structure
                .bonds()
                .iter()
                .filter(|b| !b.has_symmetry())
                .cloned()
                .collect(),
            h_bonds: structure
                .h_bonds()
                .iter()
                .filter(|h| !h.has_symmetry())
                .cloned()
                .collect(),
            grown: HashSet::new(),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Add the image of the group containing `label` under `code`, with its internal bonds.
    pub fn grow(&mut self, structure: &CrystalStructure, label: &str, code: &str) -> Result<()> {
        if self.grown.contains(&(label.to_string(), code.to_string())) {
            return Ok(());
        }
        let Some(group) = structure.group_of(label) else {
            return Ok(());
        };

        let members: Vec<Atom> = group
            .atoms
            .iter()
            .map(|&i| structure.atoms()[i].clone())
            .collect();
        let member_labels: HashSet<&str> = members.iter().map(|a| a.label.as_str()).collect();

        let images = structure.symmetry().apply_symmetry_to_atoms(code, &members)?;
        for (original, mut image) in members.iter().zip(images) {
            self.grown.insert((original.label.clone(), code.to_string()));
            image.label = combine_sym_op_label(&original.label, code);
            if self.labels.insert(image.label.clone()) {
                self.atoms.push(image);
            }
        }

        for &i in &group.bonds {
            let bond = &structure.bonds()[i];
            self.bonds.push(Bond {
                atom1_label: combine_sym_op_label(&bond.atom1_label, code),
                atom2_label: combine_sym_op_label(&bond.atom2_label, code),
                ..bond.clone()
            });
        }

        for &i in &group.h_bonds {
            let hbond = &structure.h_bonds()[i];
            let internal = !hbond.has_symmetry()
                && member_labels.contains(hbond.donor_atom_label.as_str())
                && member_labels.contains(hbond.hydrogen_atom_label.as_str())
                && member_labels.contains(hbond.acceptor_atom_label.as_str());
            if internal {
                self.h_bonds.push(HBond {
                    donor_atom_label: combine_sym_op_label(&hbond.donor_atom_label, code),
                    hydrogen_atom_label: combine_sym_op_label(&hbond.hydrogen_atom_label, code),
                    acceptor_atom_label: combine_sym_op_label(&hbond.acceptor_atom_label, code),
                    ..hbond.clone()
                });
            }
        }
        Ok(())
    }

    /// Link every symmetry bond and H-bond whose target now exists, then build the structure.
    pub fn finish(mut self, structure: &CrystalStructure) -> CrystalStructure {
        for bond in structure.bonds().iter().filter(|b| b.has_symmetry()) {
            let target = combine_sym_op_label(&bond.atom2_label, &bond.atom2_site_symmetry);
            if self.contains(&target) {
                self.bonds.push(Bond {
                    atom2_label: target,
                    atom2_site_symmetry: NO_SYMMETRY.to_string(),
                    ..bond.clone()
                });
            }
        }
        for hbond in structure.h_bonds().iter().filter(|h| h.has_symmetry()) {
            let target =
                combine_sym_op_label(&hbond.acceptor_atom_label, &hbond.acceptor_atom_symmetry);
            if self.contains(&target) {
                self.h_bonds.push(HBond {
                    acceptor_atom_label: target,
                    acceptor_atom_symmetry: NO_SYMMETRY.to_string(),
                    ..hbond.clone()
                });
            }
        }

        let labels = &self.labels;
        self.h_bonds.retain(|h| {
            labels.contains(&h.donor_atom_label)
                && labels.contains(&h.hydrogen_atom_label)
                && labels.contains(&h.acceptor_atom_label)
        });

        CrystalStructure::new(
            structure.cell().clone(),
            self.atoms,
            self.bonds,
            self.h_bonds,
            structure.symmetry().clone(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct SymmetryGrower {
    mode: SymmetryMode,
}

impl SymmetryGrower {
    pub fn new(mode: SymmetryMode) -> Self {
        Self { mode }
    }
}

impl Default for SymmetryGrower {
    fn default() -> Self {
        Self::new(SymmetryMode::new(GrowState::Yes, GrowState::No))
    }
}

impl Modifier for SymmetryGrower {
    type Mode = SymmetryMode;

    const NAME: &'static str = "SymmetryGrower";
    const FALLBACK: &'static [SymmetryMode] = &[
        SymmetryMode::new(GrowState::Yes, GrowState::No),
        SymmetryMode::new(GrowState::Yes, GrowState::None),
        SymmetryMode::new(GrowState::None, GrowState::No),
        SymmetryMode::new(GrowState::None, GrowState::None),
    ];
    const REQUIRES_CAMERA_UPDATE: bool = true;

    fn mode(&self) -> SymmetryMode {
        self.mode
    }

    fn set_mode(&mut self, mode: SymmetryMode) {
        self.mode = mode;
    }

    fn applicable_modes(&self, structure: &CrystalStructure) -> Vec<SymmetryMode> {
        let states = |growable: bool| {
            if growable {
                vec![GrowState::Yes, GrowState::No]
            } else {
                vec![GrowState::None]
            }
        };
        let bond_states = states(structure.bonds().iter().any(Bond::has_symmetry));
        let hbond_states = states(structure.h_bonds().iter().any(HBond::has_symmetry));

        bond_states
            .iter()
            .flat_map(|&b| hbond_states.iter().map(move |&h| SymmetryMode::new(b, h)))
            .collect()
    }

    fn apply_mode(&self, structure: &CrystalStructure) -> Result<CrystalStructure> {
        let mut state = GrowthState::new(structure);

        if self.mode.bonds == GrowState::Yes {
            for bond in structure.bonds().iter().filter(|b| b.has_symmetry()) {
                state.grow(structure, &bond.atom2_label, &bond.atom2_site_symmetry)?;
            }
        }
        if self.mode.hbonds == GrowState::Yes {
            for hbond in structure.h_bonds().iter().filter(|h| h.has_symmetry()) {
                state.grow(structure, &hbond.acceptor_atom_label, &hbond.acceptor_atom_symmetry)?;
            }
        }

        Ok(state.finish(structure))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use crate::model::{CellSymmetry, SymmetryOperation};
    use nalgebra::Vector3;

    fn inversion() -> CellSymmetry {
        let ops = vec![
            SymmetryOperation::new("x,y,z").unwrap(),
            SymmetryOperation::new("-x,-y,-z").unwrap(),
        ];
        CellSymmetry::new("P -1", 2, ops, None).unwrap()
    }

    fn dimer() -> CrystalStructure {
        CrystalStructure::new(
            cubic(),
            vec![
                atom("C1", "C", (0.05, 0.0, 0.0)),
                atom("C2", "C", (0.2, 0.0, 0.0)),
                atom("O1", "O", (0.4, 0.3, 0.0)),
                atom("H1", "H", (0.45, 0.35, 0.0)),
            ],
            vec![
                Bond::new("C1", "C2", 1.5, None, "."),
                Bond::new("C1", "C1", 1.0, None, "2_555"),
                Bond::new("C2", "C2", 4.0, None, "2_555"),
                Bond::new("O1", "H1", 0.8, None, "."),
            ],
            vec![HBond::between("O1", "H1", "C2", "2_655")],
            inversion(),
        )
    }

    fn labels(s: &CrystalStructure) -> Vec<&str> {
        s.atoms().iter().map(|a| a.label.as_str()).collect()
    }

    #[test]
    fn combined_labels() {
        assert_eq!(combine_sym_op_label("C1", "2_555"), "C1@2_555");
        assert_eq!(combine_sym_op_label("C1", "."), "C1");
    }

    #[test]
    fn grows_bonded_groups_once() {
        let s = dimer();
        let mode = SymmetryMode::new(GrowState::Yes, GrowState::No);
        let out = SymmetryGrower::new(mode).apply(&s).unwrap();

        assert_eq!(labels(&out), vec!["C1", "C2", "O1", "H1", "C1@2_555", "C2@2_555"]);
        let grown = out.get_atom_by_label("C2@2_555").unwrap();
        assert!((grown.position.coords() - Vector3::new(-0.2, 0.0, 0.0)).norm() < 1e-12);

        let pairs: Vec<(&str, &str)> = out
            .bonds()
            .iter()
            .map(|b| (b.atom1_label.as_str(), b.atom2_label.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("C1", "C2"),
                ("O1", "H1"),
                ("C1@2_555", "C2@2_555"),
                ("C1", "C1@2_555"),
                ("C2", "C2@2_555"),
            ]
        );
        assert!(out.bonds().iter().all(|b| !b.has_symmetry()));
        // the acceptor image was not grown
        assert!(out.h_bonds().is_empty());
        assert_eq!(out.connected_groups().len(), 2);
    }

    #[test]
    fn no_mode_drops_symmetry_bonds() {
        let s = dimer();
        let mode = SymmetryMode::new(GrowState::No, GrowState::No);
        let out = SymmetryGrower::new(mode).apply(&s).unwrap();
        assert_eq!(out.atoms().len(), 4);
        assert_eq!(out.bonds().len(), 2);
    }

    #[test]
    fn hbond_growth_links_acceptor_image() {
        let s = dimer();
        let mode = SymmetryMode::new(GrowState::No, GrowState::Yes);
        let out = SymmetryGrower::new(mode).apply(&s).unwrap();

        assert!(out.get_atom_by_label("C2@2_655").is_ok());
        assert!(out.get_atom_by_label("C1@2_655").is_ok());
        assert_eq!(out.h_bonds().len(), 1);
        assert_eq!(out.h_bonds()[0].acceptor_atom_label, "C2@2_655");
        assert_eq!(out.h_bonds()[0].acceptor_atom_symmetry, ".");
        // input untouched
        assert_eq!(s.atoms().len(), 4);
        assert_eq!(s.h_bonds().len(), 1);
    }

    #[test]
    fn applicable_modes_follow_symmetry_references() {
        let grower = SymmetryGrower::default();
        assert_eq!(grower.applicable_modes(&dimer()).len(), 4);

        let plain = structure(vec![atom("C1", "C", (0.0, 0.0, 0.0))], vec![]);
        assert_eq!(
            grower.applicable_modes(&plain),
            vec![SymmetryMode::new(GrowState::None, GrowState::None)]
        );
        assert_eq!(
            "bonds-none-hbonds-none".parse::<SymmetryMode>().unwrap(),
            SymmetryMode::new(GrowState::None, GrowState::None)
        );
    }
}
