//! Simulation configuration
//!
//! Plain data with serde defaults, so a JSON file only needs the fields it
//! overrides. Units: world pixels, milliseconds, px/ms for speeds.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;

/// Entity pool sizes and per-frame scratch limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacities {
    pub ships: usize,
    pub debris: usize,
    pub weapons: usize,
    pub gates: usize,
    /// Cover entries across all bins in one frame
    pub max_covers: usize,
    /// Collision records in one frame
    pub max_collisions: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            ships: 64,
            debris: 512,
            weapons: 512,
            gates: 8,
            max_covers: 8192,
            max_collisions: 1024,
        }
    }
}

/// Ship stats shared by human and AI ships
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipConfig {
    pub radius: f32,
    pub mass: f32,
    /// Shield points
    pub max_hit: f32,
    /// Shield points regained per ms once recharge is ready
    pub recharge_rate: f32,
    /// Recharge pauses this long after taking damage
    pub recharge_delay_ms: f32,
    /// rad/ms
    pub max_turn_rate: f32,
    /// px/ms²
    pub thrust: f32,
    /// px/ms
    pub max_speed: f32,
    pub weapon_cooldown_ms: f32,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            radius: 16.0,
            mass: 10.0,
            max_hit: 300.0,
            recharge_rate: 0.01,
            recharge_delay_ms: 2000.0,
            max_turn_rate: 0.005,
            thrust: 0.0005,
            max_speed: 0.5,
            weapon_cooldown_ms: 250.0,
        }
    }
}

/// Shots and missiles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    pub radius: f32,
    pub mass: f32,
    pub damage: f32,
    /// Muzzle speed added to the firing ship's velocity
    pub speed: f32,
    pub lifetime_ms: f32,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            radius: 3.0,
            mass: 0.1,
            damage: 32.0,
            speed: 0.8,
            lifetime_ms: 1500.0,
        }
    }
}

/// Rocks and wreckage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebrisConfig {
    /// mass = density * radius²
    pub density: f32,
    /// hit = hit_per_radius * radius
    pub hit_per_radius: f32,
    /// Relative normal impact speed that shatters debris
    pub break_speed: f32,
    pub fragment_count: usize,
    pub min_fragment_radius: f32,
    /// Random speed added to each fragment (px/ms)
    pub fragment_spread: f32,
}

impl Default for DebrisConfig {
    fn default() -> Self {
        Self {
            density: 0.01,
            hit_per_radius: 4.0,
            break_speed: 3.0,
            fragment_count: 3,
            min_fragment_radius: 4.0,
            fragment_spread: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub radius: f32,
    /// Only used to keep mass positive; gates never move
    pub mass: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            radius: 48.0,
            mass: 1.0e6,
        }
    }
}

/// AI pilot tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Turn command per radian of bearing error
    pub aim_gain: f32,
    /// Fire only when bearing error is below this (rad)
    pub aim_tolerance: f32,
    /// Thrust only when bearing error is below this (rad)
    pub thrust_tolerance: f32,
    pub fire_min_distance: f32,
    pub fire_max_distance: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            aim_gain: 2.0,
            aim_tolerance: 0.15,
            thrust_tolerance: 0.6,
            fire_min_distance: 40.0,
            fire_max_distance: 600.0,
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub half_extent: f32,
    pub bins_per_side: usize,
    pub frame_ms: f32,
    /// Seed for fragment scatter
    pub seed: u64,
    pub capacities: Capacities,
    pub ship: ShipConfig,
    pub weapon: WeaponConfig,
    pub debris: DebrisConfig,
    pub gate: GateConfig,
    pub ai: AiConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            half_extent: WORLD_HALF_EXTENT,
            bins_per_side: BINS_PER_SIDE,
            frame_ms: FRAME_MS,
            seed: 0x5eed,
            capacities: Capacities::default(),
            ship: ShipConfig::default(),
            weapon: WeaponConfig::default(),
            debris: DebrisConfig::default(),
            gate: GateConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values the core cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, value: f32) -> Result<(), ConfigError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        }

        positive("half_extent", self.half_extent)?;
        positive("frame_ms", self.frame_ms)?;
        positive("ship.radius", self.ship.radius)?;
        positive("ship.mass", self.ship.mass)?;
        positive("ship.max_hit", self.ship.max_hit)?;
        positive("weapon.radius", self.weapon.radius)?;
        positive("weapon.mass", self.weapon.mass)?;
        positive("debris.density", self.debris.density)?;
        positive("gate.radius", self.gate.radius)?;
        positive("gate.mass", self.gate.mass)?;

        if self.bins_per_side == 0 {
            return Err(ConfigError::Invalid("bins_per_side must be at least 1".into()));
        }
        let caps = &self.capacities;
        if caps.max_covers == 0 || caps.max_collisions == 0 {
            return Err(ConfigError::Invalid(
                "cover and collision capacities must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Bin span in world units
    pub fn bin_span(&self) -> f32 {
        2.0 * self.half_extent / self.bins_per_side as f32
    }
}
