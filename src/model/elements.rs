// src/model/elements.rs

use serde::Serialize;
use std::collections::HashMap;

/// Per element data consumed by bond generation (radius) and by renderers (colours).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElementProperties {
    /// Covalent radius in Angstrom
    pub radius: f64,
    pub atom_color: (f64, f64, f64),
    pub ring_color: (f64, f64, f64),
}

/// Symbols covered by [`get_atom_properties`].
pub const ELEMENT_SYMBOLS: [&str; 57] = [
    "H", "D", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Mo", "Ru", "Rh", "Pd", "Ag", "Cd", "Sn", "Sb",
    "Te", "I", "Xe", "Cs", "Ba", "Pt", "Au", "Hg",
];

/// Returns (radius_in_angstroms, (r, g, b)) or None for unknown symbols.
/// Radii are covalent radii. Colors are standard CPK.
fn covalent_radius_and_color(element: &str) -> Option<(f64, (f64, f64, f64))> {
    let props = match element {
        // --- Period 1 ---
        "H"  => (0.37, (1.00, 1.00, 1.00)), // White
        "D"  => (0.37, (1.00, 1.00, 0.75)), // Pale Yellow
        "He" => (0.32, (0.85, 1.00, 1.00)), // Cyan-White

        // --- Period 2 ---
        "Li" => (1.34, (0.80, 0.50, 1.00)), // Violet
        "Be" => (0.90, (0.76, 1.00, 0.00)), // Yellow-Green
        "B"  => (0.82, (1.00, 0.70, 0.70)), // Pink-Salmon
        "C"  => (0.77, (0.20, 0.20, 0.20)), // Dark Grey
        "N"  => (0.75, (0.19, 0.31, 0.97)), // Blue
        "O"  => (0.73, (1.00, 0.05, 0.05)), // Red
        "F"  => (0.71, (0.56, 0.88, 0.31)), // Green
        "Ne" => (0.69, (0.70, 0.89, 0.96)), // Light Cyan

        // --- Period 3 ---
        "Na" => (1.54, (0.67, 0.36, 0.95)), // Violet
        "Mg" => (1.30, (0.54, 1.00, 0.00)), // Forest Green
        "Al" => (1.18, (0.75, 0.65, 0.65)), // Silver-Grey
        "Si" => (1.11, (0.94, 0.78, 0.63)), // Tan
        "P"  => (1.06, (1.00, 0.50, 0.00)), // Orange
        "S"  => (1.02, (1.00, 1.00, 0.19)), // Yellow
        "Cl" => (0.99, (0.12, 0.94, 0.12)), // Bright Green
        "Ar" => (0.97, (0.50, 0.82, 0.89)), // Cyan

        // --- Period 4 ---
        "K"  => (1.96, (0.56, 0.25, 0.83)), // Purple
        "Ca" => (1.74, (0.24, 1.00, 0.00)), // Dark Green
        "Sc" => (1.44, (0.90, 0.90, 0.90)), // Light Grey
        "Ti" => (1.36, (0.75, 0.76, 0.78)), // Silver
        "V"  => (1.25, (0.65, 0.65, 0.67)), // Grey
        "Cr" => (1.27, (0.54, 0.60, 0.78)), // Blue-Grey
        "Mn" => (1.39, (0.61, 0.48, 0.78)), // Purple-Grey
        "Fe" => (1.25, (0.88, 0.40, 0.20)), // Rust / Orange
        "Co" => (1.26, (0.94, 0.56, 0.63)), // Pink-ish
        "Ni" => (1.21, (0.31, 0.82, 0.31)), // Green
        "Cu" => (1.38, (0.78, 0.50, 0.20)), // Copper
        "Zn" => (1.31, (0.49, 0.50, 0.69)), // Slate
        "Ga" => (1.26, (0.76, 0.56, 0.56)), // Dark Pink
        "Ge" => (1.22, (0.40, 0.56, 0.56)), // Grey-Teal
        "As" => (1.19, (0.74, 0.50, 0.89)), // Violet
        "Se" => (1.16, (1.00, 0.63, 0.00)), // Orange
        "Br" => (1.14, (0.65, 0.16, 0.16)), // Brown
        "Kr" => (1.10, (0.36, 0.72, 0.82)), // Blue-Green

        // --- Period 5 ---
        "Rb" => (2.11, (0.44, 0.18, 0.69)), // Deep Purple
        "Sr" => (1.92, (0.00, 1.00, 0.00)), // Green
        "Y"  => (1.62, (0.58, 1.00, 1.00)), // Cyan
        "Zr" => (1.48, (0.58, 0.88, 0.88)), // Teal
        "Mo" => (1.45, (0.33, 0.71, 0.71)), // Dark Teal
        "Ru" => (1.26, (0.14, 0.56, 0.56)), // Petrol
        "Rh" => (1.35, (0.04, 0.49, 0.55)), // Petrol
        "Pd" => (1.31, (0.00, 0.41, 0.52)), // Deep Teal
        "Ag" => (1.53, (0.75, 0.75, 0.75)), // Silver
        "Cd" => (1.48, (1.00, 0.85, 0.56)), // Sand
        "Sn" => (1.41, (0.40, 0.50, 0.50)), // Grey-Teal
        "Sb" => (1.38, (0.62, 0.39, 0.71)), // Violet
        "Te" => (1.35, (0.83, 0.48, 0.00)), // Ochre
        "I"  => (1.33, (0.58, 0.00, 0.58)), // Purple
        "Xe" => (1.30, (0.26, 0.62, 0.69)), // Blue-Green

        // --- Period 6 (Selected) ---
        "Cs" => (2.25, (0.34, 0.09, 0.56)), // Deep Violet
        "Ba" => (1.98, (0.00, 0.79, 0.00)), // Green
        "Pt" => (1.28, (0.82, 0.82, 0.88)), // Platinum
        "Au" => (1.44, (1.00, 0.82, 0.14)), // Gold
        "Hg" => (1.49, (0.72, 0.72, 0.82)), // Mercury

        _ => return None,
    };
    Some(props)
}

/// Outline colour with enough contrast against the atom colour.
fn ring_color_for(atom_color: (f64, f64, f64)) -> (f64, f64, f64) {
    let (r, g, b) = atom_color;
    let luminance = 0.299 * r + 0.587 * g + 0.114 * b;
    if luminance < 0.5 {
        (1.0, 1.0, 1.0)
    } else {
        (0.0, 0.0, 0.0)
    }
}

pub fn get_atom_properties(element: &str) -> Option<ElementProperties> {
    covalent_radius_and_color(element).map(|(radius, atom_color)| ElementProperties {
        radius,
        atom_color,
        ring_color: ring_color_for(atom_color),
    })
}

/// The full element table keyed by symbol.
pub fn default_element_properties() -> HashMap<String, ElementProperties> {
    ELEMENT_SYMBOLS
        .iter()
        .filter_map(|s| get_atom_properties(s).map(|p| (s.to_string(), p)))
        .collect()
}

/// Guess the element from an atom label such as `C12A` or `CL1`.
///
/// Two letter symbols win over one letter symbols when both are in the table.
pub fn infer_element(label: &str, table: &HashMap<String, ElementProperties>) -> Option<String> {
    let letters: Vec<char> = label.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let first = letters.first()?.to_ascii_uppercase();

    if let Some(second) = letters.get(1) {
        let two = format!("{first}{}", second.to_ascii_lowercase());
        if table.contains_key(&two) {
            return Some(two);
        }
    }
    let one = first.to_string();
    table.contains_key(&one).then_some(one)
}

/// Element symbol for an atom: its type if that is a table key, otherwise inferred from the label.
pub fn element_for(
    atom_type: &str,
    label: &str,
    table: &HashMap<String, ElementProperties>,
) -> Option<String> {
    if table.contains_key(atom_type) {
        return Some(atom_type.to_string());
    }
    infer_element(atom_type, table).or_else(|| infer_element(label, table))
}
