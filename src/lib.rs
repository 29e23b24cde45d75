//! Deepfield - collision core of a 2D space-combat game
//!
//! Core modules:
//! - `sim`: Deterministic frame-stepped simulation (spatial bins, swept
//!   collisions, resolution, integration)
//! - `config`: Data-driven world, pool and entity tuning
//! - `error`: Error taxonomy for the simulation and config loading

pub mod config;
pub mod error;
pub mod sim;

pub use config::SimConfig;
pub use error::{ConfigError, SimError};

use glam::Vec2;

/// Simulation constants
pub mod consts {
    /// Fixed frame duration driven by the host timer (milliseconds)
    pub const FRAME_MS: f32 = 20.0;
    /// Maximum frames per host update to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Half of the world's side length (world spans [-H, H] on both axes)
    pub const WORLD_HALF_EXTENT: f32 = 4096.0;
    /// Bins along one side of the square grid
    pub const BINS_PER_SIDE: usize = 32;

    /// Below this squared length a vector is treated as zero
    pub const GEOM_EPSILON: f32 = 1e-6;
    /// Smallest mass collision math will divide by
    pub const MIN_MASS: f32 = 1e-4;
}

/// Normalize angle to (-π, π]
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Unit vector pointing along `theta`
#[inline]
pub fn heading(theta: f32) -> Vec2 {
    Vec2::new(theta.cos(), theta.sin())
}

/// Angle of the vector from `from` to `to`
#[inline]
pub fn bearing(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}

/// Signed smallest rotation taking `current` onto `target`, in (-π, π]
#[inline]
pub fn angle_error(current: f32, target: f32) -> f32 {
    normalize_angle(target - current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::PI;

    #[test]
    fn test_normalize_branch_cut() {
        assert_eq!(normalize_angle(PI), PI);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-5);
        assert!((normalize_angle(3.0 * PI).abs() - PI).abs() < 1e-4);
        assert!((normalize_angle(-PI / 2.0 - 2.0 * PI) + PI / 2.0).abs() < 1e-4);
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_angle_error_wraps() {
        // 170° to -170° is a +20° turn, not -340°
        let err = angle_error(170.0_f32.to_radians(), -170.0_f32.to_radians());
        assert!((err - 20.0_f32.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn test_bearing() {
        let b = bearing(Vec2::ZERO, Vec2::new(0.0, 5.0));
        assert!((b - PI / 2.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn normalized_angle_in_range(angle in -1000.0f32..1000.0) {
            let n = normalize_angle(angle);
            prop_assert!(n > -PI - 1e-4 && n <= PI + 1e-4);
            // Same direction before and after
            prop_assert!((n.cos() - angle.cos()).abs() < 1e-2);
            prop_assert!((n.sin() - angle.sin()).abs() < 1e-2);
        }
    }
}
