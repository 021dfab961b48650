//! Math primitives shared by the unionview crates.

mod aabb;
mod color;
mod ray;

pub use aabb::Aabb;
pub use color::RgbaColor;
pub use ray::Ray;

/// Tolerance used for float comparisons throughout the workspace.
pub const EPSILON: f32 = 1e-6;
