//! Core geometric types shared by the wayfinder crates.
//!
//! The world is a right-handed 3D space with `y` pointing up. Navigation happens
//! on the horizontal `x`/`z` plane; the `y` component only carries terrain height.
//!
//! # Coordinate Systems
//!
//! - **World Frame**: continuous `f32` positions, wrapped as nalgebra vectors
//! - **Grid Frame**: discrete integer `(x, z)` cell coordinates centered on a grid origin

#![warn(missing_docs)]

use std::fmt;
use std::ops::{Add, Sub};

// Re-export nalgebra types for direct use where appropriate
pub use nalgebra::UnitQuaternion;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A position or direction in world coordinates.
pub type Vector3 = nalgebra::Vector3<f32>;

/// A discrete cell address on the navigation grid.
///
/// Coordinates are signed: the grid is conceptually centered on its origin and
/// extends `half_extent` cells in each direction.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridCoordinate {
    /// Column index along the world x axis.
    pub x: i32,
    /// Row index along the world z axis.
    pub z: i32,
}

impl GridCoordinate {
    /// Creates a new `GridCoordinate`.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Returns this coordinate shifted by `(dx, dz)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// Manhattan distance between two coordinates, in cells.
    pub fn manhattan_distance(&self, other: &GridCoordinate) -> u32 {
        self.x.abs_diff(other.x) + self.z.abs_diff(other.z)
    }

    /// Squared Euclidean distance between two coordinates, in cells².
    pub fn distance_squared(&self, other: &GridCoordinate) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dz * dz
    }

    /// Returns true when `other` is one of the 8 cells surrounding `self`.
    pub fn is_adjacent(&self, other: &GridCoordinate) -> bool {
        self != other && self.x.abs_diff(other.x) <= 1 && self.z.abs_diff(other.z) <= 1
    }
}

impl Add for GridCoordinate {
    type Output = GridCoordinate;

    fn add(self, rhs: Self) -> Self::Output {
        GridCoordinate::new(self.x + rhs.x, self.z + rhs.z)
    }
}

impl Sub for GridCoordinate {
    type Output = GridCoordinate;

    fn sub(self, rhs: Self) -> Self::Output {
        GridCoordinate::new(self.x - rhs.x, self.z - rhs.z)
    }
}

impl From<(i32, i32)> for GridCoordinate {
    fn from((x, z): (i32, i32)) -> Self {
        GridCoordinate::new(x, z)
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Horizontal-plane helpers for world vectors.
pub trait WorldPointExt {
    /// Returns the vector with its `y` component set to zero.
    fn flattened(&self) -> Vector3;

    /// Squared distance to `other`, ignoring height.
    fn horizontal_distance_squared(&self, other: &Vector3) -> f32;

    /// Distance to `other`, ignoring height.
    fn horizontal_distance(&self, other: &Vector3) -> f32 {
        self.horizontal_distance_squared(other).sqrt()
    }

    /// Length of the `x`/`z` part of the vector.
    fn horizontal_norm(&self) -> f32;
}

impl WorldPointExt for Vector3 {
    fn flattened(&self) -> Vector3 {
        Vector3::new(self.x, 0.0, self.z)
    }

    fn horizontal_distance_squared(&self, other: &Vector3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    fn horizontal_norm(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan_distance() {
        let a = GridCoordinate::new(0, 0);
        let b = GridCoordinate::new(3, -4);
        assert_eq!(a.manhattan_distance(&b), 7);
        assert_eq!(b.manhattan_distance(&a), 7);
    }

    #[test]
    fn test_distance_squared() {
        let a = GridCoordinate::new(-1, 2);
        let b = GridCoordinate::new(2, -2);
        assert_eq!(a.distance_squared(&b), 25);
    }

    #[test]
    fn test_adjacency() {
        let c = GridCoordinate::new(4, 4);
        assert!(c.is_adjacent(&c.offset(1, 1)));
        assert!(c.is_adjacent(&c.offset(-1, 0)));
        assert!(!c.is_adjacent(&c));
        assert!(!c.is_adjacent(&c.offset(2, 0)));
    }

    #[test]
    fn test_horizontal_helpers() {
        let a = Vector3::new(1.0, 5.0, 1.0);
        let b = Vector3::new(4.0, -2.0, 5.0);
        assert_eq!(a.flattened(), Vector3::new(1.0, 0.0, 1.0));
        assert!((a.horizontal_distance(&b) - 5.0).abs() < 1e-6);
        assert!((Vector3::new(3.0, 9.0, 4.0).horizontal_norm() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", GridCoordinate::new(-2, 7)), "[-2, 7]");
    }
}
