// src/model/structure.rs

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::Serialize;

use super::atom::{Atom, ATOM_SITE_LOOP};
use super::bonds::{Bond, HBond, BOND_LOOP, HBOND_LOOP};
use super::cell::UnitCell;
use super::cell_symmetry::CellSymmetry;
use crate::error::{CifError, Result};
use crate::io::cif::CifBlock;

/// Labels of ring centroids and similar pseudo atoms used in geometry tables.
static CENTROID_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(cg|cnt)").expect("valid regex"));

/// Atoms joined by bonds without symmetry, as indices into the structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectedGroup {
    pub atoms: Vec<usize>,
    pub bonds: Vec<usize>,
    pub h_bonds: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrystalStructure {
    cell: UnitCell,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    h_bonds: Vec<HBond>,
    #[serde(skip)]
    symmetry: CellSymmetry,
    #[serde(skip)]
    connected_groups: Vec<ConnectedGroup>,
}

impl CrystalStructure {
    pub fn new(
        cell: UnitCell,
        atoms: Vec<Atom>,
        bonds: Vec<Bond>,
        h_bonds: Vec<HBond>,
        symmetry: CellSymmetry,
    ) -> Self {
        let mut structure = Self {
            cell,
            atoms,
            bonds,
            h_bonds,
            symmetry,
            connected_groups: Vec::new(),
        };
        structure.recalculate_connected_groups();
        structure
    }

    /// Build a structure from a parsed data block.
    ///
    /// Dummy atom rows are skipped. Bonds and H-bonds to centroids or `?` labels are
    /// dropped; every remaining one must reference known atoms and symmetry codes.
    pub fn from_cif(block: &CifBlock) -> Result<Self> {
        let cell = UnitCell::from_cif(block)?;

        let sites = block.get_loop(&ATOM_SITE_LOOP)?;
        let mut atoms = Vec::with_capacity(sites.row_count()?);
        for i in 0..sites.row_count()? {
            match Atom::from_cif(block, i, &cell) {
                Ok(atom) => atoms.push(atom),
                Err(e) if e.is_dummy_atom() => debug!("skipping row {i}: {e}"),
                Err(e) => return Err(e),
            }
        }
        if atoms.is_empty() {
            return Err(CifError::NoAtoms);
        }

        let symmetry = CellSymmetry::from_cif(block)?;
        let labels: HashSet<&str> = atoms.iter().map(|a| a.label.as_str()).collect();
        let keep = |label: &str| {
            label != "?" && (labels.contains(label) || !CENTROID_LABEL.is_match(label))
        };

        let mut bonds = Vec::new();
        if let Some(lp) = block.get_loop_opt(&BOND_LOOP) {
            for i in 0..lp.row_count()? {
                let bond = Bond::from_cif(block, i)?;
                if keep(&bond.atom1_label) && keep(&bond.atom2_label) {
                    bonds.push(bond);
                }
            }
        }

        let mut h_bonds = Vec::new();
        if let Some(lp) = block.get_loop_opt(&HBOND_LOOP) {
            for i in 0..lp.row_count()? {
                let hbond = HBond::from_cif(block, i)?;
                if keep(&hbond.donor_atom_label)
                    && keep(&hbond.hydrogen_atom_label)
                    && keep(&hbond.acceptor_atom_label)
                {
                    h_bonds.push(hbond);
                }
            }
        }

        let mut problems = Vec::new();
        let mut check_label = |what: &str, label: &str| {
            if !labels.contains(label) {
                problems.push(format!("{what} references unknown atom '{label}'"));
            }
        };
        for b in &bonds {
            let what = format!("bond {}-{}", b.atom1_label, b.atom2_label);
            check_label(&what, &b.atom1_label);
            check_label(&what, &b.atom2_label);
        }
        for h in &h_bonds {
            let what = format!(
                "H-bond {}-{}...{}",
                h.donor_atom_label, h.hydrogen_atom_label, h.acceptor_atom_label
            );
            check_label(&what, &h.donor_atom_label);
            check_label(&what, &h.hydrogen_atom_label);
            check_label(&what, &h.acceptor_atom_label);
        }
        for b in bonds.iter().filter(|b| b.has_symmetry()) {
            if let Err(e) = symmetry.parse_position_code(&b.atom2_site_symmetry) {
                problems.push(format!("bond {}-{}: {e}", b.atom1_label, b.atom2_label));
            }
        }
        for h in h_bonds.iter().filter(|h| h.has_symmetry()) {
            if let Err(e) = symmetry.parse_position_code(&h.acceptor_atom_symmetry) {
                problems.push(format!(
                    "H-bond {}...{}: {e}",
                    h.donor_atom_label, h.acceptor_atom_label
                ));
            }
        }
        if !problems.is_empty() {
            return Err(CifError::Validation(problems.join("\n")));
        }

        Ok(Self::new(cell, atoms, bonds, h_bonds, symmetry))
    }

    pub fn cell(&self) -> &UnitCell {
        &self.cell
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn h_bonds(&self) -> &[HBond] {
        &self.h_bonds
    }

    pub fn symmetry(&self) -> &CellSymmetry {
        &self.symmetry
    }

    pub fn connected_groups(&self) -> &[ConnectedGroup] {
        &self.connected_groups
    }

    pub fn atom_index(&self, label: &str) -> Option<usize> {
        self.atoms.iter().position(|a| a.label == label)
    }

    /// Exact match first, then case-insensitive.
    pub fn get_atom_by_label(&self, label: &str) -> Result<&Atom> {
        self.atoms
            .iter()
            .find(|a| a.label == label)
            .or_else(|| self.atoms.iter().find(|a| a.label.eq_ignore_ascii_case(label)))
            .ok_or_else(|| CifError::AtomNotFound {
                label: label.to_string(),
                available: self.atoms.iter().map(|a| a.label.clone()).collect(),
            })
    }

    /// Group containing the atom with this label.
    pub fn group_of(&self, label: &str) -> Option<&ConnectedGroup> {
        let index = self.atom_index(label)?;
        self.connected_groups.iter().find(|g| g.atoms.contains(&index))
    }

    /// Partition the atoms by symmetry free bonds.
    ///
    /// H-bonds join the group of their donor and, if it differs, the group of an
    /// already grouped acceptor, but never create or merge groups.
    pub fn recalculate_connected_groups(&mut self) {
        let index: HashMap<&str, usize> = self
            .atoms
            .iter()
            .enumerate()
            .map(|(i, a)| (a.label.as_str(), i))
            .collect();
        let mut groups: Vec<Option<ConnectedGroup>> = Vec::new();
        let mut group_of: Vec<Option<usize>> = vec![None; self.atoms.len()];

        for (bond_index, bond) in self.bonds.iter().enumerate() {
            if bond.has_symmetry() {
                continue;
            }
            let (Some(&a1), Some(&a2)) = (
                index.get(bond.atom1_label.as_str()),
                index.get(bond.atom2_label.as_str()),
            ) else {
                continue;
            };

            let target = match (group_of[a1], group_of[a2]) {
                (None, None) => {
                    let mut atoms = vec![a1];
                    if a2 != a1 {
                        atoms.push(a2);
                    }
                    groups.push(Some(ConnectedGroup {
                        atoms,
                        ..Default::default()
                    }));
                    let g = groups.len() - 1;
                    group_of[a1] = Some(g);
                    group_of[a2] = Some(g);
                    g
                }
                (Some(g), None) | (None, Some(g)) => {
                    let new_atom = if group_of[a1].is_none() { a1 } else { a2 };
                    if let Some(group) = groups[g].as_mut() {
                        group.atoms.push(new_atom);
                    }
                    group_of[new_atom] = Some(g);
                    g
                }
                (Some(g1), Some(g2)) if g1 == g2 => g1,
                (Some(g1), Some(g2)) => {
                    if let Some(absorbed) = groups[g2].take() {
                        for &a in &absorbed.atoms {
                            group_of[a] = Some(g1);
                        }
                        if let Some(group) = groups[g1].as_mut() {
                            group.atoms.extend(absorbed.atoms);
                            group.bonds.extend(absorbed.bonds);
                            group.h_bonds.extend(absorbed.h_bonds);
                        }
                    }
                    g1
                }
            };
            if let Some(group) = groups[target].as_mut() {
                group.bonds.push(bond_index);
            }
        }

        for (hbond_index, hbond) in self.h_bonds.iter().enumerate() {
            if hbond.has_symmetry() {
                continue;
            }
            let donor_group = index
                .get(hbond.donor_atom_label.as_str())
                .and_then(|&i| group_of[i]);
            let acceptor_group = index
                .get(hbond.acceptor_atom_label.as_str())
                .and_then(|&i| group_of[i]);

            if let Some(g) = donor_group {
                if let Some(group) = groups[g].as_mut() {
                    group.h_bonds.push(hbond_index);
                }
            }
            if let Some(g) = acceptor_group.filter(|g| Some(*g) != donor_group) {
                if let Some(group) = groups[g].as_mut() {
                    group.h_bonds.push(hbond_index);
                }
            }
        }

        let mut result: Vec<ConnectedGroup> = groups.into_iter().flatten().collect();
        for (i, g) in group_of.iter().enumerate() {
            if g.is_none() {
                result.push(ConnectedGroup {
                    atoms: vec![i],
                    ..Default::default()
                });
            }
        }
        self.connected_groups = result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::position::Position;

    fn cubic() -> UnitCell {
        UnitCell::new(10.0, 10.0, 10.0, 90.0, 90.0, 90.0).unwrap()
    }

    fn atom(label: &str, element: &str) -> Atom {
        Atom::new(label, element, Position::fract(0.0, 0.0, 0.0), None, 0)
    }

    fn bond(a: &str, b: &str, sym: &str) -> Bond {
        Bond::new(a, b, 1.5, None, sym)
    }

    fn assert_partition(s: &CrystalStructure) {
        let mut seen: Vec<usize> = s
            .connected_groups()
            .iter()
            .flat_map(|g| g.atoms.iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..s.atoms().len()).collect::<Vec<_>>());
    }

    #[test]
    fn groups_merge_through_bonds() {
        let atoms = ["C1", "C2", "C3", "C4", "O1", "Na1"]
            .iter()
            .map(|l| atom(l, "C"))
            .collect();
        let bonds = vec![
            bond("C1", "C2", "."),
            bond("C3", "C4", "."),
            bond("C2", "C3", "."),
            bond("O1", "C1", "2_555"),
        ];
        let h_bonds = vec![HBond::between("C1", "C2", "O1", ".")];
        let s = CrystalStructure::new(cubic(), atoms, bonds, h_bonds, CellSymmetry::p1());

        assert_partition(&s);
        assert_eq!(s.connected_groups().len(), 3);
        let big = s.group_of("C4").unwrap();
        assert_eq!(big.atoms.len(), 4);
        assert_eq!(big.bonds.len(), 3);
        assert_eq!(big.h_bonds, vec![0]);
        // the acceptor has no group, so the H-bond does not give it one
        assert_eq!(s.group_of("O1").unwrap().h_bonds.len(), 0);
        assert_eq!(s.group_of("Na1").unwrap().atoms.len(), 1);
    }

    #[test]
    fn hbond_attaches_to_both_groups() {
        let atoms = vec![atom("O1", "O"), atom("H1", "H"), atom("O2", "O"), atom("C2", "C")];
        let bonds = vec![bond("O1", "H1", "."), bond("O2", "C2", ".")];
        let h_bonds = vec![HBond::between("O1", "H1", "O2", ".")];
        let s = CrystalStructure::new(cubic(), atoms, bonds, h_bonds, CellSymmetry::p1());
        assert_partition(&s);
        assert_eq!(s.group_of("O1").unwrap().h_bonds, vec![0]);
        assert_eq!(s.group_of("O2").unwrap().h_bonds, vec![0]);
    }

    #[test]
    fn label_lookup() {
        let s = CrystalStructure::new(
            cubic(),
            vec![atom("C1", "C"), atom("c1a", "C")],
            vec![],
            vec![],
            CellSymmetry::p1(),
        );
        assert_eq!(s.get_atom_by_label("C1").unwrap().label, "C1");
        assert_eq!(s.get_atom_by_label("C1A").unwrap().label, "c1a");
        match s.get_atom_by_label("N1") {
            Err(CifError::AtomNotFound { available, .. }) => assert_eq!(available, vec!["C1", "c1a"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    const BLOCK: &str = "data_s
_cell_length_a 10
_cell_length_b 10
_cell_length_c 10
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
loop_
_symmetry_equiv_pos_as_xyz
x,y,z
-x,-y,-z
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
_atom_site_calc_flag
C1 C 0.1 0.1 0.1 .
O1 O 0.2 0.1 0.1 .
Q1 C 0.3 0.3 0.3 dum
loop_
_geom_bond_atom_site_label_1
_geom_bond_atom_site_label_2
_geom_bond_distance
_geom_bond_site_symmetry_2
C1 O1 1.0 .
C1 Cg1 2.5 .
C1 ? 1.0 .
O1 O1 2.0 2_555
";

    #[test]
    fn from_block() {
        let block = CifBlock::parse(BLOCK, true).unwrap();
        let s = CrystalStructure::from_cif(&block).unwrap();
        assert_eq!(s.atoms().len(), 2);
        assert_eq!(s.bonds().len(), 2);
        assert_eq!(s.symmetry().symmetry_operations.len(), 2);
        assert_eq!(s.connected_groups().len(), 1);
    }

    #[test]
    fn validation_errors_are_combined() {
        let text = BLOCK.replace("C1 O1 1.0 .", "C1 N9 1.0 .").replace("2_555", "7_555");
        let block = CifBlock::parse(&text, true).unwrap();
        match CrystalStructure::from_cif(&block) {
            Err(CifError::Validation(msg)) => {
                assert!(msg.contains("N9"));
                assert!(msg.contains("7"));
                assert_eq!(msg.lines().count(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn all_dummy_atoms_is_an_error() {
        let text = BLOCK
            .replace("C1 C 0.1 0.1 0.1 .", "C1 C 0.1 0.1 0.1 dum")
            .replace("O1 O 0.2 0.1 0.1 .", "O1 O ? ? ? .");
        let block = CifBlock::parse(&text, true).unwrap();
        assert!(matches!(CrystalStructure::from_cif(&block), Err(CifError::NoAtoms)));
    }
}
