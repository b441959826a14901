//! Geometry primitives: triangles, boxes, rays and hit records.

mod aabb;
mod ray;
mod triangle;

pub use aabb::Aabb;
pub use ray::{intersect_triangle, make_hit, Hit, Ray, EPSILON, ORIGIN_OFFSET};
pub use triangle::{Triangle, Vertex};
