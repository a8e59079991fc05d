// src/model/bonds.rs

use serde::Serialize;

use crate::error::Result;
use crate::io::cif::{CifBlock, CifLoop, Value};

pub const BOND_LOOP: [&str; 1] = ["_geom_bond"];
pub const HBOND_LOOP: [&str; 1] = ["_geom_hbond"];

const BOND_LABEL_1: [&str; 2] = ["_geom_bond_atom_site_label_1", "_geom_bond.atom_site_label_1"];
const BOND_LABEL_2: [&str; 2] = ["_geom_bond_atom_site_label_2", "_geom_bond.atom_site_label_2"];
const BOND_DISTANCE: [&str; 2] = ["_geom_bond_distance", "_geom_bond.distance"];
const BOND_DISTANCE_SU: [&str; 2] = ["_geom_bond_distance_su", "_geom_bond.distance_su"];
const BOND_SYMMETRY: [&str; 2] = ["_geom_bond_site_symmetry_2", "_geom_bond.site_symmetry_2"];

const HBOND_DONOR: [&str; 2] = ["_geom_hbond_atom_site_label_D", "_geom_hbond.atom_site_label_d"];
const HBOND_HYDROGEN: [&str; 2] = ["_geom_hbond_atom_site_label_H", "_geom_hbond.atom_site_label_h"];
const HBOND_ACCEPTOR: [&str; 2] = ["_geom_hbond_atom_site_label_A", "_geom_hbond.atom_site_label_a"];
const HBOND_DH: [&str; 2] = ["_geom_hbond_distance_DH", "_geom_hbond.distance_dh"];
const HBOND_DH_SU: [&str; 2] = ["_geom_hbond_distance_DH_su", "_geom_hbond.distance_dh_su"];
const HBOND_HA: [&str; 2] = ["_geom_hbond_distance_HA", "_geom_hbond.distance_ha"];
const HBOND_HA_SU: [&str; 2] = ["_geom_hbond_distance_HA_su", "_geom_hbond.distance_ha_su"];
const HBOND_DA: [&str; 2] = ["_geom_hbond_distance_DA", "_geom_hbond.distance_da"];
const HBOND_DA_SU: [&str; 2] = ["_geom_hbond_distance_DA_su", "_geom_hbond.distance_da_su"];
const HBOND_ANGLE: [&str; 2] = ["_geom_hbond_angle_DHA", "_geom_hbond.angle_dha"];
const HBOND_ANGLE_SU: [&str; 2] = ["_geom_hbond_angle_DHA_su", "_geom_hbond.angle_dha_su"];
const HBOND_SYMMETRY: [&str; 2] = ["_geom_hbond_site_symmetry_A", "_geom_hbond.site_symmetry_a"];

/// Symmetry code meaning "no transformation".
pub const NO_SYMMETRY: &str = ".";

/// `?` and empty codes mean the same as `.`.
fn symmetry_code(value: &Value) -> String {
    match value.to_label().as_str() {
        "?" | "" => NO_SYMMETRY.to_string(),
        code => code.to_string(),
    }
}

fn float_or_nan(lp: &CifLoop, keys: &[&str], row: usize) -> Result<f64> {
    let missing = Value::Float(f64::NAN);
    Ok(lp.get_index_or(keys, row, &missing)?.as_f64().unwrap_or(f64::NAN))
}

fn su(lp: &CifLoop, keys: &[&str], row: usize) -> Result<Option<f64>> {
    Ok(Some(float_or_nan(lp, keys, row)?).filter(|v| v.is_finite()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bond {
    pub atom1_label: String,
    pub atom2_label: String,
    /// NaN when not given
    pub bond_length: f64,
    pub bond_length_su: Option<f64>,
    /// Symmetry code applied to atom 2, `.` for none.
    pub atom2_site_symmetry: String,
}

impl Bond {
    pub fn new(
        atom1_label: impl Into<String>,
        atom2_label: impl Into<String>,
        bond_length: f64,
        bond_length_su: Option<f64>,
        atom2_site_symmetry: impl Into<String>,
    ) -> Self {
        Self {
            atom1_label: atom1_label.into(),
            atom2_label: atom2_label.into(),
            bond_length,
            bond_length_su,
            atom2_site_symmetry: atom2_site_symmetry.into(),
        }
    }

    pub fn from_cif(block: &CifBlock, index: usize) -> Result<Self> {
        let lp = block.get_loop(&BOND_LOOP)?;
        let dot = Value::from(NO_SYMMETRY);
        Ok(Self {
            atom1_label: lp.get_index(&BOND_LABEL_1, index)?.to_label(),
            atom2_label: lp.get_index(&BOND_LABEL_2, index)?.to_label(),
            bond_length: float_or_nan(lp, &BOND_DISTANCE, index)?,
            bond_length_su: su(lp, &BOND_DISTANCE_SU, index)?,
            atom2_site_symmetry: symmetry_code(lp.get_index_or(&BOND_SYMMETRY, index, &dot)?),
        })
    }

    pub fn has_symmetry(&self) -> bool {
        self.atom2_site_symmetry != NO_SYMMETRY
    }

    pub fn involves(&self, label: &str) -> bool {
        self.atom1_label == label || self.atom2_label == label
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HBond {
    pub donor_atom_label: String,
    pub hydrogen_atom_label: String,
    pub acceptor_atom_label: String,
    pub donor_hydrogen_distance: f64,
    pub donor_hydrogen_distance_su: Option<f64>,
    pub acceptor_hydrogen_distance: f64,
    pub acceptor_hydrogen_distance_su: Option<f64>,
    pub donor_acceptor_distance: f64,
    pub donor_acceptor_distance_su: Option<f64>,
    pub hbond_angle: f64,
    pub hbond_angle_su: Option<f64>,
    /// Symmetry code applied to the acceptor, `.` for none.
    pub acceptor_atom_symmetry: String,
}

impl HBond {
    /// An H-bond with unknown geometry.
    pub fn between(
        donor: impl Into<String>,
        hydrogen: impl Into<String>,
        acceptor: impl Into<String>,
        acceptor_atom_symmetry: impl Into<String>,
    ) -> Self {
        Self {
            donor_atom_label: donor.into(),
            hydrogen_atom_label: hydrogen.into(),
            acceptor_atom_label: acceptor.into(),
            donor_hydrogen_distance: f64::NAN,
            donor_hydrogen_distance_su: None,
            acceptor_hydrogen_distance: f64::NAN,
            acceptor_hydrogen_distance_su: None,
            donor_acceptor_distance: f64::NAN,
            donor_acceptor_distance_su: None,
            hbond_angle: f64::NAN,
            hbond_angle_su: None,
            acceptor_atom_symmetry: acceptor_atom_symmetry.into(),
        }
    }

    pub fn from_cif(block: &CifBlock, index: usize) -> Result<Self> {
        let lp = block.get_loop(&HBOND_LOOP)?;
        let dot = Value::from(NO_SYMMETRY);
        Ok(Self {
            donor_atom_label: lp.get_index(&HBOND_DONOR, index)?.to_label(),
            hydrogen_atom_label: lp.get_index(&HBOND_HYDROGEN, index)?.to_label(),
            acceptor_atom_label: lp.get_index(&HBOND_ACCEPTOR, index)?.to_label(),
            donor_hydrogen_distance: float_or_nan(lp, &HBOND_DH, index)?,
            donor_hydrogen_distance_su: su(lp, &HBOND_DH_SU, index)?,
            acceptor_hydrogen_distance: float_or_nan(lp, &HBOND_HA, index)?,
            acceptor_hydrogen_distance_su: su(lp, &HBOND_HA_SU, index)?,
            donor_acceptor_distance: float_or_nan(lp, &HBOND_DA, index)?,
            donor_acceptor_distance_su: su(lp, &HBOND_DA_SU, index)?,
            hbond_angle: float_or_nan(lp, &HBOND_ANGLE, index)?,
            hbond_angle_su: su(lp, &HBOND_ANGLE_SU, index)?,
            acceptor_atom_symmetry: symmetry_code(lp.get_index_or(&HBOND_SYMMETRY, index, &dot)?),
        })
    }

    pub fn has_symmetry(&self) -> bool {
        self.acceptor_atom_symmetry != NO_SYMMETRY
    }

    pub fn involves(&self, label: &str) -> bool {
        self.donor_atom_label == label
            || self.hydrogen_atom_label == label
            || self.acceptor_atom_label == label
    }
}
