// src/io/cif/block.rs

use std::collections::HashMap;

use log::{debug, warn};

use super::cif_loop::{header_tokens, name_from_tokens, CifLoop};
use super::text::{parse_multiline_string, strip_comments};
use super::value::{parse_value, Value};
use crate::error::{CifError, Result};

/// One entry of a data block: a scalar value or a loop.
#[derive(Debug, Clone)]
pub enum BlockEntry {
    Value(Value),
    Loop(CifLoop),
}

impl BlockEntry {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            BlockEntry::Value(v) => Some(v),
            BlockEntry::Loop(_) => None,
        }
    }

    pub fn as_loop(&self) -> Option<&CifLoop> {
        match self {
            BlockEntry::Loop(l) => Some(l),
            BlockEntry::Value(_) => None,
        }
    }
}

/// A single `data_` section.
#[derive(Debug, Clone)]
pub struct CifBlock {
    name: String,
    entries: HashMap<String, BlockEntry>,
    order: Vec<String>,
}

fn is_loop_start(line: &str) -> bool {
    line.trim_start()
        .get(..5)
        .is_some_and(|s| s.eq_ignore_ascii_case("loop_"))
}

impl CifBlock {
    /// Parse the text of one data block. The first line holds the block name,
    /// with or without its `data_` prefix.
    pub fn parse(text: &str, split_su: bool) -> Result<Self> {
        let raw: Vec<&str> = text.lines().collect();
        let lines = strip_comments(&raw);

        let first = lines.first().map(|l| l.trim()).unwrap_or_default();
        let name = first.strip_prefix("data_").unwrap_or(first).to_string();

        let mut block = CifBlock {
            name,
            entries: HashMap::new(),
            order: Vec::new(),
        };

        let mut i = 1;
        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();

            if trimmed.is_empty() {
                i += 1;
                continue;
            }

            if is_loop_start(line) {
                let (lp, next) = CifLoop::from_lines(&lines, i, split_su);
                block.insert_loop(lp);
                i = next;
                continue;
            }

            if !trimmed.starts_with('_') {
                return Err(CifError::Grammar {
                    line: i + 1,
                    content: line.to_string(),
                });
            }

            let key = trimmed.split_whitespace().next().unwrap_or(trimmed);
            let rest = trimmed[key.len()..].trim();

            // 1. value on the same line
            if !rest.is_empty() {
                block.insert_scalar(key, rest, split_su);
                i += 1;
                continue;
            }

            // 2. value on the following line, either a text field or a single token line
            let Some(offset) = lines[i + 1..].iter().position(|l| !l.trim().is_empty()) else {
                return Err(CifError::Grammar {
                    line: i + 1,
                    content: line.to_string(),
                });
            };
            let next = i + 1 + offset;
            let next_line = lines[next];
            if next_line.starts_with(';') {
                let (text, after) = parse_multiline_string(&lines, next)?;
                block.insert_entry(key.to_string(), BlockEntry::Value(Value::Text(text)));
                i = after;
            } else if next_line.trim_start().starts_with('_') || is_loop_start(next_line) {
                return Err(CifError::Grammar {
                    line: i + 1,
                    content: line.to_string(),
                });
            } else {
                block.insert_scalar(key, next_line.trim(), split_su);
                i = next + 1;
            }
        }

        Ok(block)
    }

    fn insert_scalar(&mut self, key: &str, token: &str, split_su: bool) {
        let parsed = parse_value(token, split_su);
        if let Some(su) = parsed.su {
            self.insert_entry(format!("{key}_su"), BlockEntry::Value(Value::Float(su)));
        }
        self.insert_entry(key.to_string(), BlockEntry::Value(parsed.value));
    }

    fn insert_entry(&mut self, key: String, entry: BlockEntry) {
        if self.entries.insert(key.clone(), entry).is_some() {
            warn!("block '{}': duplicate key '{}' overwrites earlier value", self.name, key);
        } else {
            self.order.push(key);
        }
    }

    fn unique_name(&self, name: String) -> String {
        if !self.entries.contains_key(&name) {
            return name;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{name}_{n}");
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Insert a loop under its derived name, renaming on collision.
    fn insert_loop(&mut self, mut lp: CifLoop) {
        let name = lp.name().to_string();

        let collides_with_loop = self
            .entries
            .get(&name)
            .map(|e| matches!(e, BlockEntry::Loop(_)));

        match collides_with_loop {
            None => {
                self.insert_entry(name, BlockEntry::Loop(lp));
            }
            Some(false) => {
                let key_tokens = header_tokens(&name).len();
                let extended = lp
                    .raw_headers()
                    .first()
                    .map(|h| name_from_tokens(h, key_tokens + 1))
                    .unwrap_or_else(|| name.clone());
                let new_name = self.unique_name(extended);
                debug!("loop '{name}' collides with a scalar, renamed to '{new_name}'");
                lp.set_name(new_name.clone());
                self.insert_entry(new_name, BlockEntry::Loop(lp));
            }
            Some(true) => {
                let Some(BlockEntry::Loop(mut existing)) = self.entries.remove(&name) else {
                    return;
                };
                let position = self.order.iter().position(|k| *k == name);
                if let Some(p) = position {
                    self.order.remove(p);
                }

                let (existing_name, new_name) = resolve_loop_names(&name, &existing, &lp);
                debug!("loop name conflict on '{name}': '{existing_name}' and '{new_name}'");

                let existing_name = self.unique_name(existing_name);
                existing.set_name(existing_name.clone());
                self.entries
                    .insert(existing_name.clone(), BlockEntry::Loop(existing));
                match position {
                    Some(p) => self.order.insert(p, existing_name.clone()),
                    None => self.order.push(existing_name.clone()),
                }

                let new_name = self.unique_name(new_name);
                lp.set_name(new_name.clone());
                self.insert_entry(new_name, BlockEntry::Loop(lp));
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    fn find_key(&self, keys: &[&str]) -> Option<String> {
        if let Some(k) = keys.iter().find(|k| self.entries.contains_key(**k)) {
            return Some(k.to_string());
        }
        keys.iter()
            .find_map(|key| self.order.iter().find(|k| k.eq_ignore_ascii_case(key)).cloned())
    }

    pub fn get_opt(&self, keys: &[&str]) -> Option<&BlockEntry> {
        self.find_key(keys).and_then(|k| self.entries.get(&k))
    }

    pub fn get(&self, keys: &[&str]) -> Result<&BlockEntry> {
        self.get_opt(keys)
            .ok_or_else(|| CifError::missing_key(keys, format!("block '{}'", self.name)))
    }

    pub fn get_value_opt(&self, keys: &[&str]) -> Option<&Value> {
        self.get_opt(keys).and_then(BlockEntry::as_value)
    }

    pub fn get_value(&self, keys: &[&str]) -> Result<&Value> {
        self.get_value_opt(keys)
            .ok_or_else(|| CifError::missing_key(keys, format!("block '{}'", self.name)))
    }

    pub fn get_loop_opt(&self, keys: &[&str]) -> Option<&CifLoop> {
        self.get_opt(keys).and_then(BlockEntry::as_loop)
    }

    pub fn get_loop(&self, keys: &[&str]) -> Result<&CifLoop> {
        self.get_loop_opt(keys).ok_or_else(|| {
            CifError::missing_key(keys, format!("loops of block '{}'", self.name))
        })
    }

    pub(crate) fn get_loop_mut(&mut self, keys: &[&str]) -> Option<&mut CifLoop> {
        let key = self.find_key(keys)?;
        match self.entries.get_mut(&key) {
            Some(BlockEntry::Loop(lp)) => Some(lp),
            _ => None,
        }
    }

    /// The first loop carrying one of the given column headers, whatever it is named.
    pub fn find_loop_with_column(&self, headers: &[&str]) -> Option<&CifLoop> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).and_then(BlockEntry::as_loop))
            .find(|lp| {
                lp.raw_headers()
                    .iter()
                    .any(|h| headers.iter().any(|c| h.eq_ignore_ascii_case(c)))
            })
    }
}

/// Pick names for two loops that derived the same name.
///
/// Returns `(existing, incoming)`.
fn resolve_loop_names(shared: &str, existing: &CifLoop, incoming: &CifLoop) -> (String, String) {
    let plain_existing = existing.find_common_start(false);
    let plain_incoming = incoming.find_common_start(false);
    if plain_existing.len() != plain_incoming.len() {
        return (plain_existing, plain_incoming);
    }

    let shared_tokens = header_tokens(shared).len();
    let first_len = |lp: &CifLoop| {
        lp.raw_headers()
            .first()
            .map_or(0, |h| header_tokens(h).len())
    };
    let extend = |lp: &CifLoop| {
        lp.raw_headers()
            .first()
            .map_or_else(|| shared.to_string(), |h| name_from_tokens(h, shared_tokens + 1))
    };

    if first_len(incoming) > first_len(existing) {
        (shared.to_string(), extend(incoming))
    } else if first_len(existing) > first_len(incoming) {
        (extend(existing), shared.to_string())
    } else {
        (shared.to_string(), extend(incoming))
    }
}
