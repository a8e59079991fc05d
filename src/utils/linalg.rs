// src/utils/linalg.rs

use nalgebra::{Matrix3, Vector3};

/// Convert fractional coordinates to Cartesian
///
/// # Arguments
/// * `frac` - Fractional coordinates
/// * `fract_to_cart` - Matrix whose columns are the cell vectors a, b, c
///
/// # Formula
/// ```text
/// Cartesian = M × Fractional
/// ```
pub fn frac_to_cart(frac: &Vector3<f64>, fract_to_cart: &Matrix3<f64>) -> Vector3<f64> {
  fract_to_cart * frac
}

/// Convert Cartesian coordinates to fractional
///
/// Returns None if the matrix is singular.
///
/// # Formula
/// ```text
/// Fractional = M^-1 × Cartesian
/// ```
pub fn cart_to_frac(cart: &Vector3<f64>, fract_to_cart: &Matrix3<f64>) -> Option<Vector3<f64>> {
  let inv = fract_to_cart.try_inverse()?;
  Some(inv * cart)
}

/// Build the symmetric tensor from `[U11, U22, U33, U12, U13, U23]`.
pub fn symmetric_from_components(u: &[f64; 6]) -> Matrix3<f64> {
  Matrix3::new(
    u[0], u[3], u[4],
    u[3], u[1], u[5],
    u[4], u[5], u[2],
  )
}

/// Inverse of [`symmetric_from_components`], reading the upper triangle.
pub fn components_from_symmetric(m: &Matrix3<f64>) -> [f64; 6] {
  [m[(0, 0)], m[(1, 1)], m[(2, 2)], m[(0, 1)], m[(0, 2)], m[(1, 2)]]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cubic_cell() {
    let m = Matrix3::from_diagonal_element(5.0);

    let cart = frac_to_cart(&Vector3::new(0.5, 0.5, 0.5), &m);

    assert!((cart[0] - 2.5).abs() < 1e-10);
    assert!((cart[1] - 2.5).abs() < 1e-10);
    assert!((cart[2] - 2.5).abs() < 1e-10);
  }

  #[test]
  fn test_roundtrip() {
    // Non-orthogonal cell, columns are the cell vectors
    let m = Matrix3::new(
      4.0, 2.0, 0.0,
      0.0, 3.46, 0.0,
      0.0, 0.0, 5.0,
    );

    let frac_orig = Vector3::new(0.333, 0.667, 0.25);
    let cart = frac_to_cart(&frac_orig, &m);
    let frac_back = cart_to_frac(&cart, &m).unwrap();

    assert!((frac_back - frac_orig).norm() < 1e-10);
  }

  #[test]
  fn test_singular() {
    let m = Matrix3::new(
      1.0, 2.0, 3.0,
      2.0, 4.0, 6.0,
      0.0, 0.0, 1.0,
    );
    assert!(cart_to_frac(&Vector3::new(1.0, 1.0, 1.0), &m).is_none());
  }

  #[test]
  fn test_tensor_components() {
    let u = [0.01, 0.02, 0.03, 0.004, 0.005, 0.006];
    let m = symmetric_from_components(&u);
    assert_eq!(m, m.transpose());
    assert_eq!(components_from_symmetric(&m), u);
  }
}
