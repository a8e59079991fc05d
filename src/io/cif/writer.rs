// src/io/cif/writer.rs
//
// Export a structure as a single CIF data block. Coordinates are written fractional,
// ADPs as U values, and bonds keep their symmetry codes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::model::{Adp, CrystalStructure};

/// Quote a token when the CIF tokenizer would otherwise split or misread it.
fn quote(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.chars().any(char::is_whitespace)
        || text.starts_with(['_', '#', '$', '\'', '"', ';', '['])
        || text.eq_ignore_ascii_case("loop_")
        || text.to_ascii_lowercase().starts_with("data_");
    if !needs_quotes {
        text.to_string()
    } else if text.contains('\'') {
        format!("\"{}\"", text)
    } else {
        format!("'{}'", text)
    }
}

/// `?` for unknown values.
fn number(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}")
    } else {
        "?".to_string()
    }
}

fn number_su(value: f64, su: Option<f64>, decimals: usize) -> String {
    match su {
        Some(su) if value.is_finite() && su.is_finite() && su > 0.0 => {
            super::format_value_esd(value, su, decimals)
        }
        _ => number(value, decimals),
    }
}

pub fn write_cif<W: Write>(
    out: &mut W,
    structure: &CrystalStructure,
    block_name: &str,
) -> io::Result<()> {
    let cell = structure.cell();
    let symmetry = structure.symmetry();
    let name: String = block_name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    writeln!(out, "data_{}", if name.is_empty() { "cifvis" } else { &name })?;
    writeln!(out, "_space_group_name_H-M_alt {}", quote(&symmetry.space_group_name))?;
    writeln!(out, "_space_group_IT_number {}", symmetry.space_group_number)?;
    writeln!(out, "_cell_length_a    {:.6}", cell.a())?;
    writeln!(out, "_cell_length_b    {:.6}", cell.b())?;
    writeln!(out, "_cell_length_c    {:.6}", cell.c())?;
    writeln!(out, "_cell_angle_alpha {:.6}", cell.alpha())?;
    writeln!(out, "_cell_angle_beta  {:.6}", cell.beta())?;
    writeln!(out, "_cell_angle_gamma {:.6}", cell.gamma())?;
    writeln!(out)?;

    writeln!(out, "loop_")?;
    writeln!(out, " _space_group_symop_id")?;
    writeln!(out, " _space_group_symop_operation_xyz")?;
    for (id, op) in symmetry
        .operation_ids()
        .iter()
        .zip(&symmetry.symmetry_operations)
    {
        writeln!(out, " {} '{}'", quote(id), op.to_symmetry_string(None))?;
    }
    writeln!(out)?;

    writeln!(out, "loop_")?;
    for header in [
        "label",
        "type_symbol",
        "fract_x",
        "fract_y",
        "fract_z",
        "U_iso_or_equiv",
        "adp_type",
        "disorder_group",
    ] {
        writeln!(out, " _atom_site_{}", header)?;
    }
    for atom in structure.atoms() {
        let p = atom.position.to_fractional(cell);
        let (u, adp_type) = match &atom.adp {
            Some(adp @ Adp::Aniso(_)) => (adp.u_iso(cell).unwrap_or(f64::NAN), "Uani"),
            Some(adp @ Adp::Iso(_)) => (adp.u_iso(cell).unwrap_or(f64::NAN), "Uiso"),
            None => (f64::NAN, "."),
        };
        let group = match atom.disorder_group {
            0 => ".".to_string(),
            g => g.to_string(),
        };
        writeln!(
            out,
            " {} {} {} {} {} {} {} {}",
            quote(&atom.label),
            quote(&atom.atom_type),
            number(p.x, 6),
            number(p.y, 6),
            number(p.z, 6),
            number(u, 5),
            adp_type,
            group
        )?;
    }

    let aniso: Vec<_> = structure
        .atoms()
        .iter()
        .filter_map(|a| match &a.adp {
            Some(Adp::Aniso(u)) => Some((a, u)),
            _ => None,
        })
        .collect();
    if !aniso.is_empty() {
        writeln!(out)?;
        writeln!(out, "loop_")?;
        writeln!(out, " _atom_site_aniso_label")?;
        for ij in ["11", "22", "33", "12", "13", "23"] {
            writeln!(out, " _atom_site_aniso_U_{}", ij)?;
        }
        for (atom, u) in aniso {
            let values: Vec<String> = u.components().iter().map(|v| number(*v, 5)).collect();
            writeln!(out, " {} {}", quote(&atom.label), values.join(" "))?;
        }
    }

    if !structure.bonds().is_empty() {
        writeln!(out)?;
        writeln!(out, "loop_")?;
        writeln!(out, " _geom_bond_atom_site_label_1")?;
        writeln!(out, " _geom_bond_atom_site_label_2")?;
        writeln!(out, " _geom_bond_distance")?;
        writeln!(out, " _geom_bond_site_symmetry_2")?;
        for bond in structure.bonds() {
            writeln!(
                out,
                " {} {} {} {}",
                quote(&bond.atom1_label),
                quote(&bond.atom2_label),
                number_su(bond.bond_length, bond.bond_length_su, 4),
                quote(&bond.atom2_site_symmetry)
            )?;
        }
    }

    if !structure.h_bonds().is_empty() {
        writeln!(out)?;
        writeln!(out, "loop_")?;
        for header in [
            "atom_site_label_D",
            "atom_site_label_H",
            "atom_site_label_A",
            "distance_DH",
            "distance_HA",
            "distance_DA",
            "angle_DHA",
            "site_symmetry_A",
        ] {
            writeln!(out, " _geom_hbond_{}", header)?;
        }
        for h in structure.h_bonds() {
            writeln!(
                out,
                " {} {} {} {} {} {} {} {}",
                quote(&h.donor_atom_label),
                quote(&h.hydrogen_atom_label),
                quote(&h.acceptor_atom_label),
                number_su(h.donor_hydrogen_distance, h.donor_hydrogen_distance_su, 3),
                number_su(h.acceptor_hydrogen_distance, h.acceptor_hydrogen_distance_su, 3),
                number_su(h.donor_acceptor_distance, h.donor_acceptor_distance_su, 3),
                number_su(h.hbond_angle, h.hbond_angle_su, 1),
                quote(&h.acceptor_atom_symmetry)
            )?;
        }
    }

    Ok(())
}

pub fn to_cif_string(structure: &CrystalStructure, block_name: &str) -> String {
    let mut buffer = Vec::new();
    // writing into a Vec cannot fail
    let _ = write_cif(&mut buffer, structure, block_name);
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn save_cif(path: &Path, structure: &CrystalStructure, block_name: &str) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write_cif(&mut file, structure, block_name)?;
    file.flush()
}
