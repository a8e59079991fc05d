// src/physics/operations/disorder.rs

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::{parse_mode, Modifier, ModifierMode};
use crate::error::{CifError, Result};
use crate::model::{Atom, CrystalStructure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisorderMode {
    All,
    /// Hide parts numbered above one.
    Group1,
    /// Hide part one.
    Group2,
}

impl ModifierMode for DisorderMode {
    const ALL: &'static [Self] = &[Self::All, Self::Group1, Self::Group2];
}

impl fmt::Display for DisorderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Group1 => "group1",
            Self::Group2 => "group2",
        })
    }
}

impl FromStr for DisorderMode {
    type Err = CifError;

    fn from_str(s: &str) -> Result<Self> {
        parse_mode(DisorderFilter::NAME, s)
    }
}

impl DisorderMode {
    /// Whether an atom is hidden in this mode. Ordered atoms (group 0) never are.
    fn excludes(self, atom: &Atom) -> bool {
        match self {
            Self::All => false,
            Self::Group1 => atom.disorder_group > 1,
            Self::Group2 => atom.disorder_group == 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisorderFilter {
    mode: DisorderMode,
}

impl DisorderFilter {
    pub fn new(mode: DisorderMode) -> Self {
        Self { mode }
    }
}

impl Default for DisorderFilter {
    fn default() -> Self {
        Self::new(DisorderMode::All)
    }
}

impl Modifier for DisorderFilter {
    type Mode = DisorderMode;

    const NAME: &'static str = "DisorderFilter";
    const FALLBACK: &'static [DisorderMode] = &[DisorderMode::All];

    fn mode(&self) -> DisorderMode {
        self.mode
    }

    fn set_mode(&mut self, mode: DisorderMode) {
        self.mode = mode;
    }

    fn applicable_modes(&self, structure: &CrystalStructure) -> Vec<DisorderMode> {
        let atoms = structure.atoms();
        let mut modes = vec![DisorderMode::All];
        if atoms.iter().any(|a| a.disorder_group == 1) {
            modes.push(DisorderMode::Group1);
        }
        if atoms.iter().any(|a| a.disorder_group > 1) {
            modes.push(DisorderMode::Group2);
        }
        modes
    }

    fn apply_mode(&self, structure: &CrystalStructure) -> Result<CrystalStructure> {
        let excluded: HashSet<&str> = structure
            .atoms()
            .iter()
            .filter(|a| self.mode.excludes(a))
            .map(|a| a.label.as_str())
            .collect();
        let kept = |label: &str| !excluded.contains(label);

        let atoms = structure
            .atoms()
            .iter()
            .filter(|a| kept(&a.label))
            .cloned()
            .collect();
        let bonds = structure
            .bonds()
            .iter()
            .filter(|b| kept(&b.atom1_label) && kept(&b.atom2_label))
            .cloned()
            .collect();
        let h_bonds = structure
            .h_bonds()
            .iter()
            .filter(|h| {
                kept(&h.donor_atom_label)
                    && kept(&h.hydrogen_atom_label)
                    && kept(&h.acceptor_atom_label)
            })
            .cloned()
            .collect();

        Ok(CrystalStructure::new(
            structure.cell().clone(),
            atoms,
            bonds,
            h_bonds,
            structure.symmetry().clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use crate::model::Bond;

    fn disordered() -> CrystalStructure {
        let mut a = atom("C2A", "C", (0.1, 0.0, 0.0));
        a.disorder_group = 1;
        let mut b = atom("C2B", "C", (0.1, 0.01, 0.0));
        b.disorder_group = 2;
        structure(
            vec![atom("C1", "C", (0.0, 0.0, 0.0)), a, b],
            vec![
                Bond::new("C1", "C2A", 1.0, None, "."),
                Bond::new("C1", "C2B", 1.0, None, "."),
            ],
        )
    }

    fn labels(s: &CrystalStructure) -> Vec<&str> {
        s.atoms().iter().map(|a| a.label.as_str()).collect()
    }

    #[test]
    fn groups_are_filtered() {
        let s = disordered();
        let one = DisorderFilter::new(DisorderMode::Group1).apply(&s).unwrap();
        assert_eq!(labels(&one), vec!["C1", "C2A"]);
        assert_eq!(one.bonds().len(), 1);

        let two = DisorderFilter::new(DisorderMode::Group2).apply(&s).unwrap();
        assert_eq!(labels(&two), vec!["C1", "C2B"]);
        assert_eq!(two.bonds()[0].atom2_label, "C2B");

        let all = DisorderFilter::default().apply(&s).unwrap();
        assert_eq!(all.atoms().len(), 3);
    }

    #[test]
    fn ordered_structure_falls_back_to_all() {
        let s = structure(vec![atom("C1", "C", (0.0, 0.0, 0.0))], vec![]);
        let mut filter = DisorderFilter::new(DisorderMode::Group2);
        assert_eq!(filter.applicable_modes(&s), vec![DisorderMode::All]);
        filter.apply(&s).unwrap();
        assert_eq!(filter.mode(), DisorderMode::All);
    }
}
