#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library of motion primitives for navigation agents."]
#![doc = ""]
#![doc = "This crate provides critically-damped smoothing, approach deceleration profiles"]
#![doc = "and heading helpers. Vectors are plain `[x, y, z]` arrays so the crate stays"]
#![doc = "independent from any linear algebra library."]

use core::f32::consts::PI;
use core::fmt;
use libm::{atan2f, sqrtf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::KinematicsError;

/// A 3-component vector `[x, y, z]`.
pub type Vec3 = [f32; 3];

/// Smallest smoothing time accepted by the damping functions (s).
pub const MIN_SMOOTH_TIME: f32 = 1e-4;

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale(a: Vec3, s: f32) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Exponential decay factor of a critically damped spring, using the usual
/// polynomial approximation of `exp(-omega * dt)`.
fn damping_factor(omega: f32, dt: f32) -> f32 {
    let x = omega * dt;
    1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x)
}

/// Moves a scalar towards `target` with a critically damped spring.
///
/// # Arguments
///
/// * `current`: The current value.
/// * `target`: The value to approach.
/// * `velocity`: The spring velocity, carried between calls.
/// * `smooth_time`: Approximate time to reach the target (s).
/// * `max_speed`: Upper bound on the rate of change; use `f32::INFINITY` for none.
/// * `dt`: Time step (s).
///
/// # Returns
///
/// The new value. The spring never overshoots `target`.
pub fn smooth_damp(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> f32 {
    let smooth_time = smooth_time.max(MIN_SMOOTH_TIME);
    let omega = 2.0 / smooth_time;
    let decay = damping_factor(omega, dt);

    let max_change = max_speed * smooth_time;
    let change = (current - target).clamp(-max_change, max_change);
    let clamped_target = current - change;

    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * decay;
    let mut output = clamped_target + (change + temp) * decay;

    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    output
}

/// Vector form of [`smooth_damp`], damping the whole vector at once so the
/// direction of travel stays consistent.
pub fn smooth_damp_vector(
    current: Vec3,
    target: Vec3,
    velocity: &mut Vec3,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> Vec3 {
    let smooth_time = smooth_time.max(MIN_SMOOTH_TIME);
    let omega = 2.0 / smooth_time;
    let decay = damping_factor(omega, dt);

    let mut change = sub(current, target);
    let max_change = max_speed * smooth_time;
    let change_sq = dot(change, change);
    if change_sq > max_change * max_change {
        change = scale(change, max_change / sqrtf(change_sq));
    }
    let clamped_target = sub(current, change);

    let temp = scale(add(*velocity, scale(change, omega)), dt);
    *velocity = scale(sub(*velocity, scale(temp, omega)), decay);
    let mut output = add(clamped_target, scale(add(change, temp), decay));

    // Snap to the target instead of overshooting it.
    if dot(sub(target, current), sub(output, target)) > 0.0 {
        output = target;
        *velocity = [0.0; 3];
    }
    output
}

/// Critically damped smoothing of a direction vector.
///
/// This struct owns the spring velocity between frames, so one instance must be
/// used per smoothed quantity.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnSmoother {
    /// Smoothing time constant (s).
    smooth_time: f32,
    /// Spring velocity carried between steps.
    velocity: Vec3,
}

impl TurnSmoother {
    /// Construct a new smoother.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidSmoothTime)` if `smooth_time` is not positive.
    pub const fn new(smooth_time: f32) -> Result<Self, KinematicsError> {
        if !(smooth_time > 0.0) {
            return Err(KinematicsError::InvalidSmoothTime("must be positive"));
        }
        Ok(TurnSmoother {
            smooth_time,
            velocity: [0.0; 3],
        })
    }

    /// Returns the smoothing time constant.
    pub fn smooth_time(&self) -> f32 {
        self.smooth_time
    }

    /// Returns the current spring velocity.
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Clears the spring velocity.
    pub fn reset(&mut self) {
        self.velocity = [0.0; 3];
    }

    /// Advances the smoothed value from `current` towards `target` by `dt` seconds.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn step(&mut self, current: Vec3, target: Vec3, dt: f32) -> Result<Vec3, KinematicsError> {
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }
        if dt == 0.0 {
            return Ok(current);
        }
        Ok(smooth_damp_vector(
            current,
            target,
            &mut self.velocity,
            self.smooth_time,
            f32::INFINITY,
            dt,
        ))
    }
}

impl fmt::Display for TurnSmoother {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TurnSmoother (t: {:.2} s)", self.smooth_time)
    }
}

/// Deceleration profile used while closing in on a destination.
///
/// Speed decays hyperbolically with the time spent approaching,
/// `max_speed / (1 + timer * deceleration)`, and never reaches zero.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachProfile {
    /// Cruise speed (m/s).
    max_speed: f32,
    /// Decay factor `K` (1/s).
    deceleration: f32,
}

impl ApproachProfile {
    /// Construct a new approach profile.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidSpeed)` if `max_speed` is not positive.
    /// Returns `Err(KinematicsError::InvalidDeceleration)` if `deceleration` is negative.
    pub const fn new(max_speed: f32, deceleration: f32) -> Result<Self, KinematicsError> {
        if !(max_speed > 0.0) {
            return Err(KinematicsError::InvalidSpeed("must be positive"));
        }
        if !(deceleration >= 0.0) {
            return Err(KinematicsError::InvalidDeceleration("must be non-negative"));
        }
        Ok(ApproachProfile {
            max_speed,
            deceleration,
        })
    }

    /// Returns the cruise speed.
    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    /// Speed after `approach_timer` seconds in approach mode. A `None` timer
    /// means the agent is cruising.
    pub fn speed(&self, approach_timer: Option<f32>) -> f32 {
        match approach_timer {
            Some(timer) => self.max_speed / (1.0 + timer.max(0.0) * self.deceleration),
            None => self.max_speed,
        }
    }
}

impl fmt::Display for ApproachProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ApproachProfile (v: {:.2} m/s, K: {:.2})",
            self.max_speed, self.deceleration
        )
    }
}

/// Normalize an angle to be within `[-PI, PI)`.
pub fn normalize_angle(angle: f32) -> f32 {
    let a = angle % (2.0 * PI);
    if a >= PI {
        a - 2.0 * PI
    } else if a < -PI {
        a + 2.0 * PI
    } else {
        a
    }
}

/// Yaw (rad) of a horizontal direction, measured from the +z axis towards +x.
///
/// Returns `None` for a zero-length direction.
pub fn yaw_towards(dx: f32, dz: f32) -> Option<f32> {
    if dx == 0.0 && dz == 0.0 {
        return None;
    }
    Some(normalize_angle(atan2f(dx, dz)))
}

/// Length of the horizontal (`x`, `z`) part of a vector.
pub fn horizontal_magnitude(v: Vec3) -> f32 {
    sqrtf(v[0] * v[0] + v[2] * v[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_smooth_damp_converges_without_overshoot() {
        let mut value = 0.0;
        let mut velocity = 0.0;
        for _ in 0..500 {
            value = smooth_damp(value, 1.0, &mut velocity, 0.3, f32::INFINITY, 0.02);
            assert!(value <= 1.0 + EPSILON, "overshot to {}", value);
        }
        assert!((value - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_smooth_damp_respects_max_speed() {
        let mut velocity = 0.0;
        let value = smooth_damp(0.0, 100.0, &mut velocity, 0.1, 1.0, 0.1);
        // max_change = 0.1, so a single step can't move further than the clamped target
        assert!(value <= 0.1 + EPSILON);
    }

    #[test]
    fn test_smooth_damp_vector_moves_towards_target() {
        let mut velocity = [0.0; 3];
        let current = [0.0, 0.0, 1.0];
        let target = [1.0, 0.0, 0.0];
        let next = smooth_damp_vector(current, target, &mut velocity, 0.3, f32::INFINITY, 0.02);
        assert!(next[0] > 0.0 && next[0] < 1.0);
        assert!(next[2] < 1.0 && next[2] > 0.0);
    }

    #[test]
    fn test_smooth_damp_vector_reaches_target() {
        let mut velocity = [0.0; 3];
        let mut value = [0.0, 0.0, 1.0];
        let target = [1.0, 0.0, 0.0];
        for _ in 0..1000 {
            value = smooth_damp_vector(value, target, &mut velocity, 0.3, f32::INFINITY, 0.02);
        }
        assert!((value[0] - 1.0).abs() < 1e-3);
        assert!(value[2].abs() < 1e-3);
    }

    #[test]
    fn test_turn_smoother_constructor() {
        let smoother = TurnSmoother::new(0.3).unwrap();
        assert_eq!(smoother.smooth_time(), 0.3);
        assert_eq!(smoother.velocity(), [0.0; 3]);
        assert!(matches!(
            TurnSmoother::new(0.0),
            Err(KinematicsError::InvalidSmoothTime("must be positive"))
        ));
        assert!(matches!(
            TurnSmoother::new(f32::NAN),
            Err(KinematicsError::InvalidSmoothTime(_))
        ));
    }

    #[test]
    fn test_turn_smoother_negative_dt() {
        let mut smoother = TurnSmoother::new(0.3).unwrap();
        let result = smoother.step([0.0; 3], [1.0, 0.0, 0.0], -0.1);
        assert!(matches!(
            result,
            Err(KinematicsError::NegativeTimeDelta("must be non-negative"))
        ));
    }

    #[test]
    fn test_turn_smoother_zero_dt_is_identity() {
        let mut smoother = TurnSmoother::new(0.3).unwrap();
        let out = smoother.step([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], 0.0).unwrap();
        assert_eq!(out, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_turn_smoother_reset() {
        let mut smoother = TurnSmoother::new(0.3).unwrap();
        smoother.step([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], 0.02).unwrap();
        assert_ne!(smoother.velocity(), [0.0; 3]);
        smoother.reset();
        assert_eq!(smoother.velocity(), [0.0; 3]);
    }

    #[test]
    fn test_approach_profile_speed() {
        let profile = ApproachProfile::new(3.0, 2.0).unwrap();
        assert_eq!(profile.speed(None), 3.0);
        assert!((profile.speed(Some(0.0)) - 3.0).abs() < EPSILON);
        // 3 / (1 + 0.5 * 2) = 1.5
        assert!((profile.speed(Some(0.5)) - 1.5).abs() < EPSILON);
        assert!(profile.speed(Some(100.0)) > 0.0);
    }

    #[test]
    fn test_approach_profile_invalid() {
        assert!(matches!(
            ApproachProfile::new(0.0, 1.0),
            Err(KinematicsError::InvalidSpeed(_))
        ));
        assert!(matches!(
            ApproachProfile::new(1.0, -1.0),
            Err(KinematicsError::InvalidDeceleration(_))
        ));
    }

    #[test]
    fn test_angle_normalization() {
        assert!((normalize_angle(0.0) - 0.0).abs() < EPSILON);
        assert!((normalize_angle(PI) - (-PI)).abs() < EPSILON);
        assert!((normalize_angle(2.5 * PI) - 0.5 * PI).abs() < 1e-4);
        assert!((normalize_angle(-2.5 * PI) - -0.5 * PI).abs() < 1e-4);
    }

    #[test]
    fn test_yaw_towards() {
        assert!((yaw_towards(0.0, 1.0).unwrap() - 0.0).abs() < EPSILON);
        assert!((yaw_towards(1.0, 0.0).unwrap() - PI / 2.0).abs() < EPSILON);
        assert!((yaw_towards(-1.0, 0.0).unwrap() - (-PI / 2.0)).abs() < EPSILON);
        assert!(yaw_towards(0.0, 0.0).is_none());
    }

    #[test]
    fn test_horizontal_magnitude() {
        assert!((horizontal_magnitude([3.0, 100.0, 4.0]) - 5.0).abs() < EPSILON);
    }
}
