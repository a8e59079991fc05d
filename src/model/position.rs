// src/model/position.rs

use nalgebra::Vector3;
use serde::Serialize;

use super::cell::UnitCell;
use crate::utils::linalg::frac_to_cart;

/// An atom position, either in fractional cell coordinates or in Angstrom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "coords", rename_all = "lowercase")]
pub enum Position {
    Fractional(Vector3<f64>),
    Cartesian(Vector3<f64>),
}

impl Position {
    pub fn fract(x: f64, y: f64, z: f64) -> Self {
        Position::Fractional(Vector3::new(x, y, z))
    }

    pub fn cart(x: f64, y: f64, z: f64) -> Self {
        Position::Cartesian(Vector3::new(x, y, z))
    }

    /// Raw coordinates in whichever frame this position uses.
    pub fn coords(&self) -> &Vector3<f64> {
        match self {
            Position::Fractional(v) | Position::Cartesian(v) => v,
        }
    }

    pub fn is_fractional(&self) -> bool {
        matches!(self, Position::Fractional(_))
    }

    pub fn to_cartesian(&self, cell: &UnitCell) -> Vector3<f64> {
        match self {
            Position::Fractional(v) => frac_to_cart(v, cell.fract_to_cart_matrix()),
            Position::Cartesian(v) => *v,
        }
    }

    pub fn to_fractional(&self, cell: &UnitCell) -> Vector3<f64> {
        match self {
            Position::Fractional(v) => *v,
            Position::Cartesian(v) => cell.cart_to_fract_matrix() * v,
        }
    }
}
