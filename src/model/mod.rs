//src/model/mod.rs
pub mod adp;
pub mod atom;
pub mod bonds;
pub mod cell;
pub mod cell_symmetry;
pub mod elements;
pub mod position;
pub mod structure;
pub mod symmetry;

// Re-exports for cleaner imports
pub use adp::{Adp, UAnisoAdp, UIsoAdp};
pub use atom::Atom;
pub use bonds::{Bond, HBond};
pub use cell::UnitCell;
pub use cell_symmetry::CellSymmetry;
pub use elements::{get_atom_properties, ElementProperties};
pub use position::Position;
pub use structure::{ConnectedGroup, CrystalStructure};
pub use symmetry::SymmetryOperation;
