// src/model/cell.rs

use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

use crate::error::{CifError, Result};
use crate::io::cif::{CifBlock, Value};
use crate::utils::linalg::{components_from_symmetric, symmetric_from_components};

const CELL_KEYS: [[&str; 2]; 6] = [
    ["_cell_length_a", "_cell.length_a"],
    ["_cell_length_b", "_cell.length_b"],
    ["_cell_length_c", "_cell.length_c"],
    ["_cell_angle_alpha", "_cell.angle_alpha"],
    ["_cell_angle_beta", "_cell.angle_beta"],
    ["_cell_angle_gamma", "_cell.angle_gamma"],
];

/// Fractional to Cartesian matrix for cell parameters in Angstrom and degrees.
///
/// a lies along x, b in the xy-plane. The columns of the result are the cell vectors.
pub fn calculate_fract_to_cart_matrix(
    a: f64,
    b: f64,
    c: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
) -> Matrix3<f64> {
    let (ca, cb, cg) = (
        alpha.to_radians().cos(),
        beta.to_radians().cos(),
        gamma.to_radians().cos(),
    );
    let sg = gamma.to_radians().sin();
    let v = (1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg).sqrt();

    Matrix3::new(
        a, b * cg, c * cb,
        0.0, b * sg, c * (ca - cb * cg) / sg,
        0.0, 0.0, c * v / sg,
    )
}

/// Convert CIF displacement parameters `[U11, U22, U33, U12, U13, U23]` to a
/// Cartesian tensor with the same component order.
///
/// Returns None for a singular matrix.
pub fn u_cif_to_u_cart(fract_to_cart: &Matrix3<f64>, adp: &[f64; 6]) -> Option<[f64; 6]> {
    let inv = fract_to_cart.try_inverse()?;
    // reciprocal lengths a*, b*, c* are the row norms of M^-1
    let n = Matrix3::from_diagonal(&Vector3::new(
        inv.row(0).norm(),
        inv.row(1).norm(),
        inv.row(2).norm(),
    ));
    let u = symmetric_from_components(adp);
    let u_star = n * u * n.transpose();
    let u_cart = fract_to_cart * u_star * fract_to_cart.transpose();
    Some(components_from_symmetric(&u_cart))
}

fn check_length(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(CifError::InvalidCell(format!("{name} must be positive, got {v}")))
    }
}

fn check_angle(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 && v < 180.0 {
        Ok(())
    } else {
        Err(CifError::InvalidCell(format!(
            "{name} must lie between 0 and 180 degrees, got {v}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitCell {
    a: f64,
    b: f64,
    c: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
    #[serde(skip)]
    fract_to_cart: Matrix3<f64>,
    #[serde(skip)]
    cart_to_fract: Matrix3<f64>,
}

impl UnitCell {
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        let mut cell = Self {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
            fract_to_cart: Matrix3::identity(),
            cart_to_fract: Matrix3::identity(),
        };
        cell.update()?;
        Ok(cell)
    }

    /// Read `_cell_length_*` and `_cell_angle_*` from a block.
    pub fn from_cif(block: &CifBlock) -> Result<Self> {
        let mut params = [0.0; 6];
        let mut missing = Vec::new();
        for (slot, keys) in params.iter_mut().zip(CELL_KEYS.iter()) {
            match block.get_value_opt(keys) {
                Some(Value::Text(t)) => {
                    return Err(CifError::InvalidCell(format!(
                        "{} is not a number: '{t}'",
                        keys[0]
                    )))
                }
                Some(v) => *slot = v.as_f64().unwrap_or(f64::NAN),
                None => missing.push(keys[0]),
            }
        }
        if !missing.is_empty() {
            return Err(CifError::MissingCell(missing.join(", ")));
        }
        let [a, b, c, alpha, beta, gamma] = params;
        Self::new(a, b, c, alpha, beta, gamma)
    }

    fn update(&mut self) -> Result<()> {
        check_length("a", self.a)?;
        check_length("b", self.b)?;
        check_length("c", self.c)?;
        check_angle("alpha", self.alpha)?;
        check_angle("beta", self.beta)?;
        check_angle("gamma", self.gamma)?;

        let m = calculate_fract_to_cart_matrix(
            self.a, self.b, self.c, self.alpha, self.beta, self.gamma,
        );
        let det = m.determinant();
        if !det.is_finite() || det <= 0.0 {
            return Err(CifError::InvalidCell(format!(
                "angles {}/{}/{} do not describe a cell",
                self.alpha, self.beta, self.gamma
            )));
        }
        self.cart_to_fract = m
            .try_inverse()
            .ok_or_else(|| CifError::InvalidCell("singular cell matrix".to_string()))?;
        self.fract_to_cart = m;
        Ok(())
    }

    /// Apply a change and roll it back if the new cell is invalid.
    fn set_with(&mut self, change: impl FnOnce(&mut Self)) -> Result<()> {
        let previous = self.clone();
        change(self);
        if let Err(e) = self.update() {
            *self = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn a(&self) -> f64 { self.a }
    pub fn b(&self) -> f64 { self.b }
    pub fn c(&self) -> f64 { self.c }
    pub fn alpha(&self) -> f64 { self.alpha }
    pub fn beta(&self) -> f64 { self.beta }
    pub fn gamma(&self) -> f64 { self.gamma }

    pub fn set_a(&mut self, v: f64) -> Result<()> { self.set_with(|c| c.a = v) }
    pub fn set_b(&mut self, v: f64) -> Result<()> { self.set_with(|c| c.b = v) }
    pub fn set_c(&mut self, v: f64) -> Result<()> { self.set_with(|c| c.c = v) }
    pub fn set_alpha(&mut self, v: f64) -> Result<()> { self.set_with(|c| c.alpha = v) }
    pub fn set_beta(&mut self, v: f64) -> Result<()> { self.set_with(|c| c.beta = v) }
    pub fn set_gamma(&mut self, v: f64) -> Result<()> { self.set_with(|c| c.gamma = v) }

    pub fn fract_to_cart_matrix(&self) -> &Matrix3<f64> {
        &self.fract_to_cart
    }

    pub fn cart_to_fract_matrix(&self) -> &Matrix3<f64> {
        &self.cart_to_fract
    }

    /// Cell volume in cubic Angstrom.
    pub fn volume(&self) -> f64 {
        self.fract_to_cart.determinant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adp_conversion_on_singular_matrix_is_a_cell_error() {
        let singular = UnitCell {
            a: 1.0,
            b: 1.0,
            c: 1.0,
            alpha: 90.0,
            beta: 90.0,
            gamma: 90.0,
            fract_to_cart: Matrix3::zeros(),
            cart_to_fract: Matrix3::zeros(),
        };
        let u = crate::model::UAnisoAdp::new(0.01, 0.01, 0.01, 0.0, 0.0, 0.0);
        match u.u_cart(&singular) {
            Err(CifError::InvalidCell(msg)) => assert!(msg.contains("displacement")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cubic_cell_is_scaled_identity() {
        let cell = UnitCell::new(10.0, 10.0, 10.0, 90.0, 90.0, 90.0).unwrap();
        let expected = Matrix3::from_diagonal_element(10.0);
        assert!((cell.fract_to_cart_matrix() - expected).abs().max() < 1e-12);
        assert!((cell.volume() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn monoclinic_matrix() {
        let cell = UnitCell::new(5.0, 6.0, 7.0, 90.0, 110.0, 90.0).unwrap();
        let m = cell.fract_to_cart_matrix();
        let beta = 110.0_f64.to_radians();
        assert!((m[(0, 2)] - 7.0 * beta.cos()).abs() < 1e-12);
        assert!((m[(2, 2)] - 7.0 * beta.sin()).abs() < 1e-12);
        let product = m * cell.cart_to_fract_matrix();
        assert!((product - Matrix3::identity()).abs().max() < 1e-12);
        assert!((cell.volume() - 5.0 * 6.0 * 7.0 * beta.sin()).abs() < 1e-9);
    }

    #[test]
    fn invalid_parameters() {
        assert!(UnitCell::new(0.0, 1.0, 1.0, 90.0, 90.0, 90.0).is_err());
        assert!(UnitCell::new(1.0, 1.0, 1.0, 180.0, 90.0, 90.0).is_err());
        // angles that cannot close a cell
        assert!(UnitCell::new(1.0, 1.0, 1.0, 150.0, 150.0, 150.0).is_err());
    }

    #[test]
    fn setters_validate_and_recompute() {
        let mut cell = UnitCell::new(10.0, 10.0, 10.0, 90.0, 90.0, 90.0).unwrap();
        cell.set_a(5.0).unwrap();
        assert!((cell.fract_to_cart_matrix()[(0, 0)] - 5.0).abs() < 1e-12);
        assert!(cell.set_gamma(-4.0).is_err());
        assert_eq!(cell.gamma(), 90.0);
        assert!((cell.volume() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_adp_is_unchanged() {
        let cell = UnitCell::new(4.0, 5.0, 6.0, 90.0, 90.0, 90.0).unwrap();
        let u = [0.01, 0.02, 0.03, 0.0, 0.0, 0.0];
        let cart = u_cif_to_u_cart(cell.fract_to_cart_matrix(), &u).unwrap();
        for (a, b) in cart.iter().zip(u.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn isotropic_equivalent_in_monoclinic_cell() {
        // U(ij) = Uiso * cos(beta*) off the diagonal describes a sphere
        let beta = 110.0_f64;
        let cell = UnitCell::new(5.0, 6.0, 7.0, 90.0, beta, 90.0).unwrap();
        let uiso = 0.02;
        let u13 = -uiso * beta.to_radians().cos();
        let cart = u_cif_to_u_cart(cell.fract_to_cart_matrix(), &[uiso, uiso, uiso, 0.0, u13, 0.0])
            .unwrap();
        let expected = [uiso, uiso, uiso, 0.0, 0.0, 0.0];
        for (a, b) in cart.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12, "{cart:?}");
        }
    }

    #[test]
    fn cell_from_block() {
        let block = CifBlock::parse(
            "data_c\n_cell_length_a 5.0(1)\n_cell_length_b 6\n_cell_length_c 7\n_cell_angle_alpha 90\n_cell_angle_beta 90\n_cell_angle_gamma 120\n",
            true,
        )
        .unwrap();
        let cell = UnitCell::from_cif(&block).unwrap();
        assert_eq!(cell.a(), 5.0);
        assert_eq!(cell.gamma(), 120.0);

        let block = CifBlock::parse("data_c\n_cell_length_a 5.0\n", true).unwrap();
        match UnitCell::from_cif(&block) {
            Err(CifError::MissingCell(msg)) => assert!(msg.contains("_cell_angle_gamma")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
