// src/utils/geometry.rs

use nalgebra::Vector3;

type Point3 = Vector3<f64>;

/// Calculates distance between two points (Angstroms)
pub fn calculate_distance(p1: &Point3, p2: &Point3) -> f64 {
    (p1 - p2).norm()
}

/// Calculates angle P1-P2-P3 in degrees
pub fn calculate_angle(p1: &Point3, center: &Point3, p3: &Point3) -> f64 {
    let v1 = (p1 - center).normalize();
    let v2 = (p3 - center).normalize();
    v1.dot(&v2).clamp(-1.0, 1.0).acos().to_degrees()
}
