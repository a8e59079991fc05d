// src/utils/report.rs

use std::collections::BTreeMap;

use crate::io::cif::format_value_esd;
use crate::model::{Bond, CrystalStructure, HBond};
use crate::utils::geometry;

const MAX_ROWS: usize = 50;

fn esd(value: f64, su: Option<f64>) -> String {
    if value.is_nan() {
        return "?".to_string();
    }
    format_value_esd(value, su.unwrap_or(f64::NAN), 4)
}

/// Bond length from the file, or measured when the file has none and both atoms
/// are in the asymmetric unit.
fn bond_length(structure: &CrystalStructure, bond: &Bond) -> (f64, Option<f64>) {
    if !bond.bond_length.is_nan() || bond.has_symmetry() {
        return (bond.bond_length, bond.bond_length_su);
    }
    let cell = structure.cell();
    match (
        structure.get_atom_by_label(&bond.atom1_label),
        structure.get_atom_by_label(&bond.atom2_label),
    ) {
        (Ok(a1), Ok(a2)) => (
            geometry::calculate_distance(&a1.cartesian(cell), &a2.cartesian(cell)),
            None,
        ),
        _ => (f64::NAN, None),
    }
}

fn hbond_angle(structure: &CrystalStructure, hbond: &HBond) -> (f64, Option<f64>) {
    if !hbond.hbond_angle.is_nan() || hbond.has_symmetry() {
        return (hbond.hbond_angle, hbond.hbond_angle_su);
    }
    let cell = structure.cell();
    let find = |label: &str| structure.get_atom_by_label(label).ok().map(|a| a.cartesian(cell));
    match (
        find(&hbond.donor_atom_label),
        find(&hbond.hydrogen_atom_label),
        find(&hbond.acceptor_atom_label),
    ) {
        (Some(d), Some(h), Some(a)) => (geometry::calculate_angle(&d, &h, &a), None),
        _ => (f64::NAN, None),
    }
}

pub fn formula(structure: &CrystalStructure) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for atom in structure.atoms() {
        *counts.entry(atom.atom_type.as_str()).or_insert(0) += 1;
    }
    counts
        .iter()
        .map(|(el, count)| format!("{}{}", el, count))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text overview of a loaded structure.
pub fn structure_summary(structure: &CrystalStructure, block_name: &str) -> String {
    let cell = structure.cell();
    let symmetry = structure.symmetry();

    let mut out = String::new();
    out.push_str(&format!("Block: {}\n", block_name));
    out.push_str(&format!("Formula (asymmetric unit): {}\n", formula(structure)));
    out.push_str(&format!(
        "Space group: {} ({}), {} operations\n",
        symmetry.space_group_name,
        symmetry.space_group_number,
        symmetry.symmetry_operations.len()
    ));
    out.push_str(&format!(
        "Cell: a={:.4} b={:.4} c={:.4} alpha={:.3} beta={:.3} gamma={:.3} V={:.2}\n",
        cell.a(),
        cell.b(),
        cell.c(),
        cell.alpha(),
        cell.beta(),
        cell.gamma(),
        cell.volume()
    ));
    out.push_str("--------------------------------------------------\n");
    out.push_str(&format!(
        "{:<8} {:<6} {:<10} {:<10} {:<10} {:<10} {:<4}\n",
        "Label", "Type", "X", "Y", "Z", "Uiso/eq", "Part"
    ));
    out.push_str("--------------------------------------------------\n");

    for atom in structure.atoms().iter().take(MAX_ROWS) {
        let p = atom.position.to_fractional(cell);
        let u = atom
            .adp
            .as_ref()
            .and_then(|adp| adp.u_iso(cell).ok())
            .map(|u| format!("{u:.4}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<8} {:<6} {:<10.4} {:<10.4} {:<10.4} {:<10} {:<4}\n",
            atom.label, atom.atom_type, p.x, p.y, p.z, u, atom.disorder_group
        ));
    }
    if structure.atoms().len() > MAX_ROWS {
        out.push_str(&format!(
            "... and {} more atoms.\n",
            structure.atoms().len() - MAX_ROWS
        ));
    }

    if !structure.bonds().is_empty() {
        out.push_str(&format!("\nBonds ({}):\n", structure.bonds().len()));
        for bond in structure.bonds().iter().take(MAX_ROWS) {
            let (length, su) = bond_length(structure, bond);
            out.push_str(&format!(
                "  {}-{} {} [{}]\n",
                bond.atom1_label,
                bond.atom2_label,
                esd(length, su),
                bond.atom2_site_symmetry
            ));
        }
    }

    if !structure.h_bonds().is_empty() {
        out.push_str(&format!("\nHydrogen bonds ({}):\n", structure.h_bonds().len()));
        for hbond in structure.h_bonds().iter().take(MAX_ROWS) {
            let (angle, angle_su) = hbond_angle(structure, hbond);
            out.push_str(&format!(
                "  {}-{}...{} D-A {} angle {} [{}]\n",
                hbond.donor_atom_label,
                hbond.hydrogen_atom_label,
                hbond.acceptor_atom_label,
                esd(hbond.donor_acceptor_distance, hbond.donor_acceptor_distance_su),
                esd(angle, angle_su),
                hbond.acceptor_atom_symmetry
            ));
        }
    }

    out.push_str(&format!(
        "\nConnected groups: {}\n",
        structure.connected_groups().len()
    ));
    out
}
