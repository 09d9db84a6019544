//! Bounds, frustum and picking math

pub mod aabb;
pub mod frustum;
pub mod ray;

pub use aabb::Aabb;
pub use frustum::{Frustum, Plane};
pub use ray::Ray;
