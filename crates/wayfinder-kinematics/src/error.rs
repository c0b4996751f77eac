//! Error types for the kinematics library.
//!
//! This module defines error types that can occur while building or stepping
//! motion primitives.

#![warn(missing_docs)]

use core::fmt;

/// Errors that can occur in kinematic calculations.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for an invalid smoothing time constant.
    /// This variant is returned when a smoothing time is provided that is not positive.
    InvalidSmoothTime(&'static str),
    /// Error for an invalid speed.
    /// This variant is returned when a maximum speed is not positive.
    InvalidSpeed(&'static str),
    /// Error for an invalid deceleration factor.
    /// This variant is returned when an approach deceleration factor is negative.
    InvalidDeceleration(&'static str),
    /// Error for negative time delta.
    /// This variant is returned when a negative time delta is used for a smoothing step.
    NegativeTimeDelta(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidSmoothTime(msg) => write!(f, "Invalid smooth time: {}", msg),
            KinematicsError::InvalidSpeed(msg) => write!(f, "Invalid speed: {}", msg),
            KinematicsError::InvalidDeceleration(msg) => {
                write!(f, "Invalid deceleration: {}", msg)
            }
            KinematicsError::NegativeTimeDelta(msg) => write!(f, "Negative time delta: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
