// src/io/mod.rs
pub mod cif;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{info, warn};

use crate::config::RepairConfig;
use crate::error::{CifError, Result};
use crate::model::CrystalStructure;
use cif::{try_to_fix_cif_block, Cif};

pub fn read_cif(path: &Path, split_su: bool) -> Result<Cif> {
    let text = fs::read_to_string(path)?;
    Ok(Cif::new(&text, split_su))
}

/// Build the structure of one block. A block that fails is repaired in place
/// and tried once more; the first error is reported if the retry fails too.
pub fn structure_from_block(
    cif: &mut Cif,
    index: usize,
    repair: &RepairConfig,
) -> Result<CrystalStructure> {
    let first_error = match CrystalStructure::from_cif(cif.get_block(index)?) {
        Ok(structure) => return Ok(structure),
        Err(e) => e,
    };
    warn!("{first_error}");

    let block = cif.get_block_mut(index)?;
    let changes = try_to_fix_cif_block(
        block,
        repair.fix_adp_labels,
        repair.fix_bond_labels,
        repair.fix_bond_symmetry,
    );
    if changes == 0 {
        return Err(first_error);
    }
    info!("repaired {changes} entries in block '{}', retrying", block.name());
    CrystalStructure::from_cif(block).map_err(|_| first_error)
}

/// Load the structure of the block named or numbered by `selector`, or the first block.
pub fn load_structure(
    path: &Path,
    selector: Option<&str>,
    split_su: bool,
    repair: &RepairConfig,
) -> Result<(String, CrystalStructure)> {
    let mut cif = read_cif(path, split_su)?;
    if cif.block_count() == 0 {
        return Err(CifError::BlockIndex { index: 0, count: 0 });
    }
    let index = match selector {
        Some(s) => cif.resolve_block(s)?,
        None => 0,
    };
    let name = cif.get_block_names()[index].clone();
    info!("loading block '{}' from {:?}", name, path);
    let structure = structure_from_block(&mut cif, index, repair)?;
    Ok((name, structure))
}

/// Write a structure as CIF, or as JSON when the file name ends in `.json`.
pub fn save_structure(path: &Path, structure: &CrystalStructure, block_name: &str) -> Result<()> {
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, structure)?;
        writer.flush()?;
    } else {
        cif::save_cif(path, structure, block_name)?;
    }
    Ok(())
}
