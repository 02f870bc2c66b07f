//! Common types and traits for container geometry.
//!
//! The container frame used throughout the crate has its origin at the center
//! of the container floor: `x` runs along the container length, `y` points up
//! and `z` runs along the container width.

use std::ops::{Add, Mul, Sub};

/// Numerical tolerance for boundary comparisons in meters.
pub const EPSILON_GENERAL: f64 = 1e-9;

/// Smallest extent a placed box may have, in meters.
///
/// Keeps rendered geometry from collapsing to zero thickness.
pub const MIN_EXTENT: f64 = 0.0001;

/// Represents a 3D vector in the container frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - Component along the container length
    /// * `y` - Vertical component
    /// * `z` - Component along the container width
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Calculates the volume (product of all components).
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Checks if all components are positive and finite.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.x > 0.0
            && self.y > 0.0
            && self.z > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
    }

    /// Raises every component to at least `floor`.
    #[inline]
    pub fn at_least(&self, floor: f64) -> Self {
        Self::new(self.x.max(floor), self.y.max(floor), self.z.max(floor))
    }

    /// Half of every component.
    #[inline]
    pub fn half(&self) -> Self {
        *self * 0.5
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }
}

impl From<Vec3> for (f64, f64, f64) {
    #[inline]
    fn from(vec: Vec3) -> Self {
        vec.as_tuple()
    }
}

/// Trait for objects with a spatial extent in the container frame.
pub trait Dimensional {
    /// Returns the extents (x, y, z) in meters.
    fn dimensions(&self) -> Vec3;

    /// Calculates the volume in cubic meters.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}
