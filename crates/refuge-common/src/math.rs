//! Ground-plane math helpers.
//!
//! The simulation is 3D but characters walk on a flat ground plane at
//! [`GROUND_LEVEL`]. Yaw angles follow the `atan2(x, z)` convention: a yaw of
//! zero faces +Z, a yaw of `PI` faces -Z.

use glam::{Quat, Vec3};

/// Height of the walkable ground plane.
pub const GROUND_LEVEL: f32 = 0.0;

/// Returns `pos` with its vertical component forced onto the ground.
#[must_use]
pub fn pin_to_ground(pos: Vec3) -> Vec3 {
    Vec3::new(pos.x, GROUND_LEVEL, pos.z)
}

/// Yaw (rotation about +Y) that faces along `dir`.
#[must_use]
pub fn yaw_from_direction(dir: Vec3) -> f32 {
    dir.x.atan2(dir.z)
}

/// Rotation about the vertical axis by `yaw` radians.
#[must_use]
pub fn yaw_rotation(yaw: f32) -> Quat {
    Quat::from_axis_angle(Vec3::Y, yaw)
}

/// Unit vector in the ground plane pointing at `yaw`.
#[must_use]
pub fn horizontal_unit(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Average of a set of points, or `None` when the set is empty.
pub fn centroid<I>(points: I) -> Option<Vec3>
where
    I: IntoIterator<Item = Vec3>,
{
    let (sum, count) = points
        .into_iter()
        .fold((Vec3::ZERO, 0_u32), |(sum, count), p| (sum + p, count + 1));
    (count > 0).then(|| sum / count as f32)
}

/// Whether `pos` lies outside the square `[-half_extent, half_extent]` on
/// either horizontal axis.
#[must_use]
pub fn exceeds_horizontal_bounds(pos: Vec3, half_extent: f32) -> bool {
    pos.x.abs() > half_extent || pos.z.abs() > half_extent
}

/// Horizontal unit vector from `pos` toward the origin, zero at the origin.
#[must_use]
pub fn heading_to_origin(pos: Vec3) -> Vec3 {
    Vec3::new(-pos.x, 0.0, -pos.z).normalize_or_zero()
}
