// src/model/cell_symmetry.rs

use std::collections::HashMap;

use log::warn;
use nalgebra::Vector3;

use super::atom::Atom;
use super::position::Position;
use super::symmetry::SymmetryOperation;
use crate::error::{CifError, Result};
use crate::io::cif::{CifBlock, CifLoop};

const NAME_KEYS: [&str; 6] = [
    "_space_group_name_H-M_alt",
    "_space_group.name_H-M_alt",
    "_symmetry_space_group_name_H-M",
    "_symmetry.space_group_name_H-M",
    "_space_group_name_Hall",
    "_symmetry_space_group_name_Hall",
];
const NUMBER_KEYS: [&str; 4] = [
    "_space_group_IT_number",
    "_space_group.IT_number",
    "_symmetry_Int_Tables_number",
    "_symmetry.Int_Tables_number",
];
const OPERATION_LOOPS: [&str; 3] = ["_space_group_symop", "_symmetry_equiv_pos", "_symmetry_equiv"];
const OPERATION_KEYS: [&str; 4] = [
    "_space_group_symop_operation_xyz",
    "_space_group_symop.operation_xyz",
    "_symmetry_equiv_pos_as_xyz",
    "_symmetry_equiv.pos_as_xyz",
];
const ID_KEYS: [&str; 4] = [
    "_space_group_symop_id",
    "_space_group_symop.id",
    "_symmetry_equiv_pos_site_id",
    "_symmetry_equiv.id",
];

/// The symmetry operations of a space group and the ids used to refer to them
/// in symmetry codes such as `2_655`.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSymmetry {
    pub space_group_name: String,
    pub space_group_number: i64,
    pub symmetry_operations: Vec<SymmetryOperation>,
    ids: Vec<String>,
    operation_ids: HashMap<String, usize>,
    identity_sym_op_id: Option<String>,
}

impl CellSymmetry {
    /// `ids` default to `1..=n` when not given.
    pub fn new(
        space_group_name: impl Into<String>,
        space_group_number: i64,
        symmetry_operations: Vec<SymmetryOperation>,
        ids: Option<Vec<String>>,
    ) -> Result<Self> {
        let ids = ids.unwrap_or_else(|| {
            (1..=symmetry_operations.len())
                .map(|i| i.to_string())
                .collect()
        });
        if ids.len() != symmetry_operations.len() {
            return Err(CifError::Symmetry(format!(
                "{} ids given for {} operations",
                ids.len(),
                symmetry_operations.len()
            )));
        }
        let operation_ids: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let identity_sym_op_id = symmetry_operations
            .iter()
            .position(SymmetryOperation::is_identity)
            .map(|i| ids[i].clone());

        Ok(Self {
            space_group_name: space_group_name.into(),
            space_group_number,
            symmetry_operations,
            ids,
            operation_ids,
            identity_sym_op_id,
        })
    }

    pub fn p1() -> Self {
        Self {
            space_group_name: "P 1".to_string(),
            space_group_number: 1,
            symmetry_operations: vec![SymmetryOperation::identity()],
            ids: vec!["1".to_string()],
            operation_ids: HashMap::from([("1".to_string(), 0)]),
            identity_sym_op_id: Some("1".to_string()),
        }
    }

    pub fn from_cif(block: &CifBlock) -> Result<Self> {
        let name = block
            .get_value_opt(&NAME_KEYS)
            .filter(|v| !v.is_placeholder())
            .map(|v| v.to_label().trim().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let number = block
            .get_value_opt(&NUMBER_KEYS)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let op_loop = block
            .get_loop_opt(&OPERATION_LOOPS)
            .filter(|lp| matches!(lp.find_key(&OPERATION_KEYS), Ok(Some(_))))
            .or_else(|| block.find_loop_with_column(&OPERATION_KEYS));

        if let Some(lp) = op_loop {
            return Self::from_loop(name, number, lp);
        }

        if let Some(value) = block.get_value_opt(&OPERATION_KEYS) {
            let op = SymmetryOperation::new(&value.to_label())?;
            return Self::new(name, number, vec![op], None);
        }

        warn!(
            "block '{}' has no symmetry operations, assuming P1",
            block.name()
        );
        Ok(Self {
            space_group_name: name,
            space_group_number: number,
            ..Self::p1()
        })
    }

    fn from_loop(name: String, number: i64, lp: &CifLoop) -> Result<Self> {
        let operations = lp
            .get(&OPERATION_KEYS)?
            .iter()
            .map(|v| SymmetryOperation::new(&v.to_label()))
            .collect::<Result<Vec<_>>>()?;
        let ids = lp
            .try_get(&ID_KEYS)?
            .map(|column| column.iter().map(|v| v.to_label()).collect());
        Self::new(name, number, operations, ids)
    }

    /// Operation ids in the order of the operations.
    pub fn operation_ids(&self) -> &[String] {
        &self.ids
    }

    pub fn identity_sym_op_id(&self) -> Option<&str> {
        self.identity_sym_op_id.as_deref()
    }

    pub fn operation(&self, id: &str) -> Result<&SymmetryOperation> {
        self.operation_ids
            .get(id)
            .map(|&i| &self.symmetry_operations[i])
            .ok_or_else(|| CifError::UnknownSymmetryId {
                id: id.to_string(),
                valid: self.ids.clone(),
            })
    }

    /// Resolve a code like `2_655` into the operation and the lattice translation
    /// (each digit minus 5). `.` is the identity; codes without a three digit
    /// translation are looked up whole with no translation.
    pub fn parse_position_code(&self, code: &str) -> Result<(SymmetryOperation, Vector3<f64>)> {
        let code = code.trim();
        if code == "." {
            return Ok((SymmetryOperation::identity(), Vector3::zeros()));
        }

        if let Some((id, digits)) = code.split_once('_') {
            if digits.len() == 3 && digits.chars().all(|c| c.is_ascii_digit()) {
                let translation: Vec<f64> = digits
                    .chars()
                    .filter_map(|c| c.to_digit(10))
                    .map(|d| d as f64 - 5.0)
                    .collect();
                let op = self.operation(id)?.clone();
                return Ok((op, Vector3::from_column_slice(&translation)));
            }
        }

        Ok((self.operation(code)?.clone(), Vector3::zeros()))
    }

    /// Apply the operation and translation named by `code` to an atom.
    pub fn apply_symmetry(&self, code: &str, atom: &Atom) -> Result<Atom> {
        let (op, translation) = self.parse_position_code(code)?;
        let mut moved = op.apply_to_atom(atom)?;
        if let Position::Fractional(p) = &mut moved.position {
            *p += translation;
        }
        Ok(moved)
    }

    pub fn apply_symmetry_to_atoms(&self, code: &str, atoms: &[Atom]) -> Result<Vec<Atom>> {
        let (op, translation) = self.parse_position_code(code)?;
        atoms
            .iter()
            .map(|atom| {
                let mut moved = op.apply_to_atom(atom)?;
                if let Position::Fractional(p) = &mut moved.position {
                    *p += translation;
                }
                Ok(moved)
            })
            .collect()
    }
}
