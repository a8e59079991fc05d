// src/io/cif/mod.rs
//
// CIF reading: value and line level parsing, loops, data blocks and the document
// that splits raw text into blocks.

pub mod block;
pub mod cif_loop;
pub mod repair;
pub mod text;
pub mod value;
pub mod writer;

pub use block::{BlockEntry, CifBlock};
pub use cif_loop::CifLoop;
pub use repair::{guess_symmetry_operation, reconcile_atom_labels, try_to_fix_cif_block};
pub use value::{format_value_esd, parse_value, ParsedValue, Value};
pub use writer::{save_cif, to_cif_string, write_cif};

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{CifError, Result};

static BLOCK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+[\w.-]*)").expect("valid regex"));

/// Split raw CIF text into the text of each data block, without the `data_` prefix.
///
/// A `data_` at the start of a line inside a `;` text field does not start a block:
/// while a fragment holds an odd number of text field delimiters it is joined with
/// the next one.
pub fn split_blocks(text: &str) -> Vec<String> {
    let normalized = format!("\n{}", text.replace("\r\n", "\n"));
    let mut parts = normalized.split("\ndata_");
    // everything before the first data_ is not part of any block
    parts.next();

    let mut fragments: Vec<String> = Vec::new();
    let mut open = false;
    for part in parts {
        match fragments.last_mut() {
            Some(last) if open => {
                last.push_str("\ndata_");
                last.push_str(part);
            }
            _ => fragments.push(part.to_string()),
        }
        open = fragments
            .last()
            .is_some_and(|f| format!("\n{f}").matches("\n;").count() % 2 == 1);
    }
    fragments
}

/// A parsed CIF document. Blocks are parsed the first time they are requested.
#[derive(Debug, Clone)]
pub struct Cif {
    fragments: Vec<String>,
    blocks: Vec<Option<CifBlock>>,
    names: Option<Vec<String>>,
    split_su: bool,
}

impl Cif {
    pub fn new(text: &str, split_su: bool) -> Self {
        let fragments = split_blocks(text);
        let blocks = vec![None; fragments.len()];
        Self {
            fragments,
            blocks,
            names: None,
            split_su,
        }
    }

    pub fn block_count(&self) -> usize {
        self.fragments.len()
    }

    fn ensure_parsed(&mut self, index: usize) -> Result<()> {
        if index >= self.fragments.len() {
            return Err(CifError::BlockIndex {
                index,
                count: self.fragments.len(),
            });
        }
        if self.blocks[index].is_none() {
            let block = CifBlock::parse(&self.fragments[index], self.split_su)?;
            self.blocks[index] = Some(block);
        }
        Ok(())
    }

    pub fn get_block(&mut self, index: usize) -> Result<&CifBlock> {
        self.get_block_mut(index).map(|b| &*b)
    }

    /// Mutable access, used to repair a block in place before building a structure.
    pub fn get_block_mut(&mut self, index: usize) -> Result<&mut CifBlock> {
        self.ensure_parsed(index)?;
        let count = self.fragments.len();
        self.blocks[index]
            .as_mut()
            .ok_or(CifError::BlockIndex { index, count })
    }

    /// Parse every block. Fails on the first block that does not parse.
    pub fn get_all_blocks(&mut self) -> Result<Vec<&CifBlock>> {
        for i in 0..self.fragments.len() {
            self.ensure_parsed(i)?;
        }
        Ok(self.blocks.iter().flatten().collect())
    }

    /// Block names from a scan of each fragment's first line, without parsing.
    pub fn get_block_names(&mut self) -> &[String] {
        let fragments = &self.fragments;
        self.names.get_or_insert_with(|| {
            fragments
                .iter()
                .map(|f| {
                    BLOCK_NAME
                        .captures(f)
                        .map(|c| c[1].to_string())
                        .unwrap_or_else(|| f.lines().next().unwrap_or_default().trim().to_string())
                })
                .collect()
        })
    }

    pub fn get_block_by_name(&mut self, name: &str) -> Result<&CifBlock> {
        let names = self.get_block_names().to_vec();
        let index = names
            .iter()
            .position(|n| n == name)
            .or_else(|| names.iter().position(|n| n.eq_ignore_ascii_case(name)))
            .ok_or_else(|| CifError::BlockName {
                name: name.to_string(),
                available: names.clone(),
            })?;
        self.get_block(index)
    }

    /// Index of a block given either its position or its name.
    pub fn resolve_block(&mut self, selector: &str) -> Result<usize> {
        if let Ok(index) = selector.parse::<usize>() {
            if index < self.block_count() {
                return Ok(index);
            }
        }
        let names = self.get_block_names().to_vec();
        names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(selector))
            .ok_or(CifError::BlockName {
                name: selector.to_string(),
                available: names,
            })
    }
}
