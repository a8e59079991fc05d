// src/model/adp.rs

use std::f64::consts::PI;

use nalgebra::Matrix3;
use serde::Serialize;

use super::cell::{u_cif_to_u_cart, UnitCell};
use crate::error::{CifError, Result};
use crate::utils::linalg::symmetric_from_components;

/// B = 8 pi^2 U
fn b_to_u(b: f64) -> f64 {
    b / (8.0 * PI * PI)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UIsoAdp {
    pub uiso: f64,
}

impl UIsoAdp {
    pub fn new(uiso: f64) -> Self {
        Self { uiso }
    }

    pub fn from_biso(biso: f64) -> Self {
        Self { uiso: b_to_u(biso) }
    }
}

/// Anisotropic displacement tensor in the CIF (fractional) convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UAnisoAdp {
    pub u11: f64,
    pub u22: f64,
    pub u33: f64,
    pub u12: f64,
    pub u13: f64,
    pub u23: f64,
}

impl UAnisoAdp {
    pub fn new(u11: f64, u22: f64, u33: f64, u12: f64, u13: f64, u23: f64) -> Self {
        Self { u11, u22, u33, u12, u13, u23 }
    }

    pub fn from_components(u: [f64; 6]) -> Self {
        Self::new(u[0], u[1], u[2], u[3], u[4], u[5])
    }

    pub fn from_bani(b11: f64, b22: f64, b33: f64, b12: f64, b13: f64, b23: f64) -> Self {
        Self::new(
            b_to_u(b11),
            b_to_u(b22),
            b_to_u(b33),
            b_to_u(b12),
            b_to_u(b13),
            b_to_u(b23),
        )
    }

    /// `[U11, U22, U33, U12, U13, U23]`
    pub fn components(&self) -> [f64; 6] {
        [self.u11, self.u22, self.u33, self.u12, self.u13, self.u23]
    }

    pub fn u_cart(&self, cell: &UnitCell) -> Result<[f64; 6]> {
        u_cif_to_u_cart(cell.fract_to_cart_matrix(), &self.components())
            .ok_or_else(|| {
                CifError::InvalidCell(
                    "singular matrix, displacement parameters cannot be converted".to_string(),
                )
            })
    }

    /// Equivalent isotropic displacement, a third of the trace of the Cartesian tensor.
    pub fn u_equiv(&self, cell: &UnitCell) -> Result<f64> {
        let u = self.u_cart(cell)?;
        Ok((u[0] + u[1] + u[2]) / 3.0)
    }

    /// Matrix mapping the unit sphere onto the displacement ellipsoid.
    ///
    /// Columns are the principal axes scaled by the square roots of the eigenvalues.
    /// A non positive definite tensor yields NaN entries. The axes are oriented so
    /// that the transform never mirrors.
    pub fn ellipsoid_matrix(&self, cell: &UnitCell) -> Result<Matrix3<f64>> {
        let u_cart = symmetric_from_components(&self.u_cart(cell)?);
        let eigen = u_cart.symmetric_eigen();

        let scales = eigen
            .eigenvalues
            .map(|l| if l.is_finite() && l >= 0.0 { l.sqrt() } else { f64::NAN });
        let vectors = eigen.eigenvectors;
        let mut transform = vectors * Matrix3::from_diagonal(&scales);

        let det = vectors.determinant();
        if (det - 1.0).abs() > 1e-10 {
            transform /= det;
        }
        Ok(transform)
    }
}

/// Displacement parameters of one atom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Adp {
    #[serde(rename = "Uiso")]
    Iso(UIsoAdp),
    #[serde(rename = "Uani")]
    Aniso(UAnisoAdp),
}

impl Adp {
    pub fn is_anisotropic(&self) -> bool {
        matches!(self, Adp::Aniso(_))
    }

    /// Isotropic displacement, the equivalent value for anisotropic tensors.
    pub fn u_iso(&self, cell: &UnitCell) -> Result<f64> {
        match self {
            Adp::Iso(u) => Ok(u.uiso),
            Adp::Aniso(u) => u.u_equiv(cell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic() -> UnitCell {
        UnitCell::new(10.0, 10.0, 10.0, 90.0, 90.0, 90.0).unwrap()
    }

    #[test]
    fn b_conversion() {
        let b = 8.0 * PI * PI * 0.025;
        assert!((UIsoAdp::from_biso(b).uiso - 0.025).abs() < 1e-15);
        let aniso = UAnisoAdp::from_bani(b, b, b, 0.0, 0.0, 0.0);
        assert!((aniso.u22 - 0.025).abs() < 1e-15);
    }

    #[test]
    fn ellipsoid_of_diagonal_tensor() {
        let adp = UAnisoAdp::new(0.04, 0.09, 0.01, 0.0, 0.0, 0.0);
        let m = adp.ellipsoid_matrix(&cubic()).unwrap();
        assert!(m.determinant() > 0.0);
        // column lengths are the semi axes
        let mut lengths: Vec<f64> = (0..3).map(|i| m.column(i).norm()).collect();
        lengths.sort_by(|a, b| a.total_cmp(b));
        for (l, e) in lengths.iter().zip([0.1, 0.2, 0.3]) {
            assert!((l - e).abs() < 1e-10);
        }
        // M M^T reproduces the tensor
        let u = m * m.transpose();
        assert!((u[(1, 1)] - 0.09).abs() < 1e-10);
    }

    #[test]
    fn ellipsoid_of_rotated_tensor_is_proper() {
        let adp = UAnisoAdp::new(0.03, 0.02, 0.025, 0.005, -0.004, 0.002);
        let m = adp.ellipsoid_matrix(&cubic()).unwrap();
        assert!(m.determinant() > 0.0);
        let u = m * m.transpose();
        let expected = symmetric_from_components(&adp.components());
        assert!((u - expected).abs().max() < 1e-10);
    }

    #[test]
    fn non_positive_definite_gives_nan() {
        let adp = UAnisoAdp::new(-0.01, 0.02, 0.03, 0.0, 0.0, 0.0);
        let m = adp.ellipsoid_matrix(&cubic()).unwrap();
        assert!(m.iter().any(|v| v.is_nan()));
    }

    #[test]
    fn equivalent_isotropic() {
        let adp = Adp::Aniso(UAnisoAdp::new(0.01, 0.02, 0.03, 0.0, 0.0, 0.0));
        assert!((adp.u_iso(&cubic()).unwrap() - 0.02).abs() < 1e-12);
        assert!(adp.is_anisotropic());
        assert!(!Adp::Iso(UIsoAdp::new(0.01)).is_anisotropic());
    }
}
