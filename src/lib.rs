// src/lib.rs
//
// Reading CIF files into a typed crystal structure, and the modifiers that prepare
// such a structure for an ORTEP style drawing.

pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod physics;
pub mod utils;

pub use config::{Config, RepairConfig};
pub use error::{CifError, Result};
pub use io::cif::{
    format_value_esd, try_to_fix_cif_block, Cif, CifBlock, CifLoop, ParsedValue, Value,
};
pub use model::{
    Adp, Atom, Bond, CellSymmetry, ConnectedGroup, CrystalStructure, HBond, Position,
    SymmetryOperation, UAnisoAdp, UIsoAdp, UnitCell,
};
pub use physics::operations::{
    combine_sym_op_label, AtomLabelFilter, BondGenerator, DisorderFilter, HydrogenFilter,
    Modifier, ModifierPipeline, SymmetryGrower,
};
