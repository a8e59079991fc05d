// src/error.rs

use std::sync::Arc;

use thiserror::Error;

/// Everything that can go wrong while reading a CIF file or building a structure from it.
///
/// Parsing and validation errors are all-or-nothing per block: callers catch them at
/// the [`CrystalStructure::from_cif`](crate::model::CrystalStructure::from_cif) boundary
/// and may retry after [`try_to_fix_cif_block`](crate::io::cif::try_to_fix_cif_block).
#[derive(Debug, Clone, Error)]
pub enum CifError {
    /// A line that is not a key/value pair, loop or text field.
    #[error("could not parse line {line}: '{content}'")]
    Grammar { line: usize, content: String },

    #[error("multi-line string starting at line {line} is never terminated")]
    UnterminatedText { line: usize },

    #[error("loop '{name}' contains no values")]
    EmptyLoop { name: String },

    #[error(
        "loop '{name}': {values} values cannot be distributed over {columns} columns. Parsed values: {dump}"
    )]
    UnevenLoop {
        name: String,
        columns: usize,
        values: usize,
        dump: String,
    },

    #[error("none of the keys [{}] found in {context}", keys.join(", "))]
    MissingKey { keys: Vec<String>, context: String },

    /// Placeholder rows of the atom site loop. Filtered silently while building a structure.
    #[error("Dummy atom '{label}': {reason}")]
    DummyAtom { label: String, reason: String },

    #[error("missing unit cell parameter: {0}")]
    MissingCell(String),

    #[error("invalid unit cell: {0}")]
    InvalidCell(String),

    #[error("no valid atoms found in block")]
    NoAtoms,

    /// Combined report of every bond and hydrogen bond that failed validation.
    #[error("structure validation failed:\n{0}")]
    Validation(String),

    #[error("invalid displacement parameters for atom '{label}': {detail}")]
    Adp { label: String, detail: String },

    #[error("invalid symmetry operation: {0}")]
    Symmetry(String),

    #[error("unknown symmetry operation id '{id}', valid ids are: {}", valid.join(", "))]
    UnknownSymmetryId { id: String, valid: Vec<String> },

    #[error("atom '{label}' not found, available labels: {}", available.join(", "))]
    AtomNotFound {
        label: String,
        available: Vec<String>,
    },

    #[error("invalid mode '{mode}' for {modifier}, valid modes are: {}", valid.join(", "))]
    InvalidMode {
        modifier: &'static str,
        mode: String,
        valid: Vec<String>,
    },

    #[error("block index {index} out of range, document has {count} blocks")]
    BlockIndex { index: usize, count: usize },

    #[error("no block named '{name}', available blocks: {}", available.join(", "))]
    BlockName {
        name: String,
        available: Vec<String>,
    },

    /// Source errors sit behind an `Arc` so that parse results can be cached and cloned.
    #[error("I/O operation failed: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("JSON serialization failed: {0}")]
    Json(#[source] Arc<serde_json::Error>),
}

impl From<std::io::Error> for CifError {
    fn from(e: std::io::Error) -> Self {
        CifError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for CifError {
    fn from(e: serde_json::Error) -> Self {
        CifError::Json(Arc::new(e))
    }
}

impl CifError {
    pub fn missing_key(keys: &[&str], context: impl Into<String>) -> Self {
        Self::MissingKey {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            context: context.into(),
        }
    }

    pub fn dummy_atom(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DummyAtom {
            label: label.into(),
            reason: reason.into(),
        }
    }

    pub fn adp(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Adp {
            label: label.into(),
            detail: detail.into(),
        }
    }

    pub fn is_dummy_atom(&self) -> bool {
        matches!(self, CifError::DummyAtom { .. })
    }
}

pub type Result<T> = std::result::Result<T, CifError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn json_errors_convert_with_source() {
        let err: CifError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, CifError::Json(_)));
        assert!(err.to_string().starts_with("JSON serialization failed"));
        assert!(err.source().is_some());
        // cached parse results hand out clones
        assert!(matches!(err.clone(), CifError::Json(_)));
    }
}
