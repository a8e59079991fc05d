// src/model/atom.rs

use nalgebra::Vector3;
use serde::Serialize;

use super::adp::{Adp, UAnisoAdp, UIsoAdp};
use super::cell::UnitCell;
use super::elements::{default_element_properties, infer_element};
use super::position::Position;
use crate::error::{CifError, Result};
use crate::io::cif::{CifBlock, CifLoop, Value};
use crate::utils::linalg::cart_to_frac;

pub const ATOM_SITE_LOOP: [&str; 1] = ["_atom_site"];
pub const ANISO_LOOP: [&str; 1] = ["_atom_site_aniso"];

pub const LABEL_KEYS: [&str; 2] = ["_atom_site_label", "_atom_site.label"];
const TYPE_KEYS: [&str; 2] = ["_atom_site_type_symbol", "_atom_site.type_symbol"];
const FRACT_KEYS: [[&str; 2]; 3] = [
    ["_atom_site_fract_x", "_atom_site.fract_x"],
    ["_atom_site_fract_y", "_atom_site.fract_y"],
    ["_atom_site_fract_z", "_atom_site.fract_z"],
];
const CARTN_KEYS: [[&str; 2]; 3] = [
    ["_atom_site_Cartn_x", "_atom_site.cartn_x"],
    ["_atom_site_Cartn_y", "_atom_site.cartn_y"],
    ["_atom_site_Cartn_z", "_atom_site.cartn_z"],
];
const DISORDER_KEYS: [&str; 2] = ["_atom_site_disorder_group", "_atom_site.disorder_group"];
const CALC_FLAG_KEYS: [&str; 2] = ["_atom_site_calc_flag", "_atom_site.calc_flag"];
const POSN_FLAG_KEYS: [&str; 2] = [
    "_atom_site_refinement_flags_posn",
    "_atom_site.refinement_flags_posn",
];
const ADP_TYPE_KEYS: [&str; 4] = [
    "_atom_site_adp_type",
    "_atom_site.adp_type",
    "_atom_site_thermal_displace_type",
    "_atom_site.thermal_displace_type",
];
const UISO_KEYS: [&str; 2] = ["_atom_site_U_iso_or_equiv", "_atom_site.u_iso_or_equiv"];
const BISO_KEYS: [&str; 2] = ["_atom_site_B_iso_or_equiv", "_atom_site.b_iso_or_equiv"];

pub const ANISO_LABEL_KEYS: [&str; 2] = ["_atom_site_aniso_label", "_atom_site_aniso.label"];
const ANISO_U_KEYS: [[&str; 2]; 6] = [
    ["_atom_site_aniso_U_11", "_atom_site_aniso.u_11"],
    ["_atom_site_aniso_U_22", "_atom_site_aniso.u_22"],
    ["_atom_site_aniso_U_33", "_atom_site_aniso.u_33"],
    ["_atom_site_aniso_U_12", "_atom_site_aniso.u_12"],
    ["_atom_site_aniso_U_13", "_atom_site_aniso.u_13"],
    ["_atom_site_aniso_U_23", "_atom_site_aniso.u_23"],
];
const ANISO_B_KEYS: [[&str; 2]; 6] = [
    ["_atom_site_aniso_B_11", "_atom_site_aniso.b_11"],
    ["_atom_site_aniso_B_22", "_atom_site_aniso.b_22"],
    ["_atom_site_aniso_B_33", "_atom_site_aniso.b_33"],
    ["_atom_site_aniso_B_12", "_atom_site_aniso.b_12"],
    ["_atom_site_aniso_B_13", "_atom_site_aniso.b_13"],
    ["_atom_site_aniso_B_23", "_atom_site_aniso.b_23"],
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Atom {
    pub label: String,
    pub atom_type: String,
    pub position: Position,
    pub adp: Option<Adp>,
    /// 0 means not disordered
    pub disorder_group: i64,
}

enum AdpKind {
    UAniso,
    BAniso,
    UIso,
    BIso,
    Undeclared,
}

impl Atom {
    pub fn new(
        label: impl Into<String>,
        atom_type: impl Into<String>,
        position: Position,
        adp: Option<Adp>,
        disorder_group: i64,
    ) -> Self {
        Self {
            label: label.into(),
            atom_type: atom_type.into(),
            position,
            adp,
            disorder_group,
        }
    }

    /// Hydrogen or deuterium.
    pub fn is_hydrogen(&self) -> bool {
        matches!(self.atom_type.as_str(), "H" | "D")
    }

    pub fn is_anisotropic(&self) -> bool {
        self.adp.as_ref().is_some_and(Adp::is_anisotropic)
    }

    pub fn cartesian(&self, cell: &UnitCell) -> Vector3<f64> {
        self.position.to_cartesian(cell)
    }

    /// Build the atom in row `index` of the `_atom_site` loop.
    ///
    /// Placeholder rows fail with [`CifError::DummyAtom`]. Cartesian coordinates are
    /// converted to fractional ones with `cell`.
    pub fn from_cif(block: &CifBlock, index: usize, cell: &UnitCell) -> Result<Atom> {
        let sites = block.get_loop(&ATOM_SITE_LOOP)?;
        let label = sites.get_index(&LABEL_KEYS, index)?.to_label();

        let placeholder = Value::from("?");
        let calc_flag = sites.get_index_or(&CALC_FLAG_KEYS, index, &placeholder)?;
        if calc_flag.to_label().eq_ignore_ascii_case("dum") {
            return Err(CifError::dummy_atom(&label, "calc flag is 'dum'"));
        }
        let posn_flag = sites.get_index_or(&POSN_FLAG_KEYS, index, &placeholder)?;
        if posn_flag.to_label().to_lowercase().contains("dum") {
            return Err(CifError::dummy_atom(&label, "refinement flag marks a dummy position"));
        }

        let position = read_position(sites, index, &label, cell)?;

        let atom_type = match sites.get_index_or(&TYPE_KEYS, index, &placeholder)? {
            v if v.is_placeholder() => {
                infer_element(&label, &default_element_properties()).unwrap_or_else(|| label.clone())
            }
            v => v.to_label(),
        };

        let disorder_group = match sites.get_index_or(&DISORDER_KEYS, index, &placeholder)? {
            v if v.is_placeholder() => 0,
            v => v.as_i64().ok_or_else(|| {
                CifError::Validation(format!("atom '{label}': disorder group '{v}' is not an integer"))
            })?,
        };

        let adp = read_adp(block, sites, index, &label)?;

        Ok(Atom {
            label,
            atom_type,
            position,
            adp,
            disorder_group,
        })
    }
}

fn read_position(sites: &CifLoop, index: usize, label: &str, cell: &UnitCell) -> Result<Position> {
    let (keys, fractional) = if sites.find_key(&FRACT_KEYS[0])?.is_some() {
        (&FRACT_KEYS, true)
    } else if sites.find_key(&CARTN_KEYS[0])?.is_some() {
        (&CARTN_KEYS, false)
    } else {
        return Err(CifError::missing_key(
            &[FRACT_KEYS[0][0], FRACT_KEYS[0][1], CARTN_KEYS[0][0], CARTN_KEYS[0][1]],
            format!("loop '{}'", sites.name()),
        ));
    };

    let mut xyz = [0.0; 3];
    for (slot, k) in xyz.iter_mut().zip(keys.iter()) {
        let value = sites.get_index(k, index)?;
        *slot = value
            .as_f64()
            .ok_or_else(|| CifError::dummy_atom(label, format!("coordinate '{value}' is not a number")))?;
    }

    let v = Vector3::from(xyz);
    if fractional {
        Ok(Position::Fractional(v))
    } else {
        cart_to_frac(&v, cell.fract_to_cart_matrix())
            .map(Position::Fractional)
            .ok_or_else(|| CifError::InvalidCell("singular cell matrix".to_string()))
    }
}

fn numeric(value: &Value, label: &str, what: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| CifError::adp(label, format!("{what} '{value}' is not a number")))
}

/// Row of `label` in the anisotropic loop, if the loop lists it.
fn aniso_row(aniso: &CifLoop, label: &str) -> Result<Option<usize>> {
    let labels = aniso.get(&ANISO_LABEL_KEYS)?;
    Ok(labels.iter().position(|l| l.to_label() == label))
}

fn read_aniso(aniso: &CifLoop, row: usize, label: &str, b_values: bool) -> Result<Adp> {
    let keys = if b_values { &ANISO_B_KEYS } else { &ANISO_U_KEYS };
    let mut u = [0.0; 6];
    for (slot, k) in u.iter_mut().zip(keys.iter()) {
        let value = aniso.get_index(k, row).map_err(|e| CifError::adp(label, e.to_string()))?;
        *slot = numeric(value, label, k[0])?;
    }
    let [u11, u22, u33, u12, u13, u23] = u;
    Ok(Adp::Aniso(if b_values {
        UAnisoAdp::from_bani(u11, u22, u33, u12, u13, u23)
    } else {
        UAnisoAdp::new(u11, u22, u33, u12, u13, u23)
    }))
}

fn read_iso(sites: &CifLoop, index: usize, label: &str, b_value: bool) -> Result<Option<Adp>> {
    let keys = if b_value { &BISO_KEYS } else { &UISO_KEYS };
    let value = sites.get_index(keys, index)?;
    if value.is_placeholder() {
        return Ok(None);
    }
    let v = numeric(value, label, keys[0])?;
    Ok(Some(Adp::Iso(if b_value {
        UIsoAdp::from_biso(v)
    } else {
        UIsoAdp::new(v)
    })))
}

/// Infer the displacement parameters for one atom.
///
/// A declared type must be backed by data; without a declaration the anisotropic
/// loop wins over `U_iso`, which wins over `B_iso`.
fn read_adp(block: &CifBlock, sites: &CifLoop, index: usize, label: &str) -> Result<Option<Adp>> {
    let placeholder = Value::from("?");
    let declared = sites.get_index_or(&ADP_TYPE_KEYS, index, &placeholder)?.to_label();
    let kind = match declared.to_lowercase().as_str() {
        "uani" | "aniso" => AdpKind::UAniso,
        "bani" => AdpKind::BAniso,
        "uiso" => AdpKind::UIso,
        "biso" => AdpKind::BIso,
        _ => AdpKind::Undeclared,
    };
    let aniso = block.get_loop_opt(&ANISO_LOOP);

    match kind {
        AdpKind::UAniso | AdpKind::BAniso => {
            let b_values = matches!(kind, AdpKind::BAniso);
            let aniso = aniso.ok_or_else(|| {
                CifError::adp(label, format!("declared '{declared}' but the block has no anisotropic loop"))
            })?;
            let row = aniso_row(aniso, label)?.ok_or_else(|| {
                CifError::adp(label, format!("declared '{declared}' but missing from the anisotropic loop"))
            })?;
            read_aniso(aniso, row, label, b_values).map(Some)
        }
        AdpKind::UIso => read_iso(sites, index, label, false)
            .map_err(|e| CifError::adp(label, format!("declared 'Uiso': {e}"))),
        AdpKind::BIso => read_iso(sites, index, label, true)
            .map_err(|e| CifError::adp(label, format!("declared 'Biso': {e}"))),
        AdpKind::Undeclared => {
            if let Some(aniso) = aniso {
                if let Some(row) = aniso_row(aniso, label)? {
                    let has_u = aniso.find_key(&ANISO_U_KEYS[0])?.is_some();
                    return read_aniso(aniso, row, label, !has_u).map(Some);
                }
            }
            if sites.find_key(&UISO_KEYS)?.is_some() {
                return read_iso(sites, index, label, false);
            }
            if sites.find_key(&BISO_KEYS)?.is_some() {
                return read_iso(sites, index, label, true);
            }
            Ok(None)
        }
    }
}
