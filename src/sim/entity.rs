//! Entity data: the shared `Item` base and the four kinds built on it
//!
//! Kinds form a closed sum type; per-kind behavior is a `match` on `Kind`
//! and type-pair collision responses are indexed by `Class`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::layer::BinIndex;
use super::store::Handle;
use crate::config::{DebrisConfig, GateConfig, ShipConfig, WeaponConfig};
use crate::consts::MIN_MASS;

/// Destination of a gate
pub type ZoneId = u32;

/// Entity class tag, used to index the collision response table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Class {
    Ship,
    Debris,
    Weapon,
    Gate,
}

impl Class {
    pub const COUNT: usize = 4;
    pub const ALL: [Class; Class::COUNT] = [Class::Ship, Class::Debris, Class::Weapon, Class::Gate];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Physical state shared by every entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub pos: Vec2,
    /// Orientation in (-π, π]
    pub theta: f32,
    /// px/ms
    pub vel: Vec2,
    /// rad/ms
    pub omega: f32,
    /// Fixed at creation
    pub radius: f32,
    /// Strictly positive
    pub mass: f32,
    /// Bin whose list owns this item; resynced at the end of every frame
    pub bin: BinIndex,
    /// Active marker for the frame in progress
    #[serde(skip)]
    pub(crate) active: Option<u32>,
}

impl Item {
    pub fn new(pos: Vec2, vel: Vec2, radius: f32, mass: f32) -> Self {
        Self {
            pos,
            theta: 0.0,
            vel,
            omega: 0.0,
            radius,
            mass,
            bin: 0,
            active: None,
        }
    }

    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.vel.length_squared()
    }
}

/// Who flies a ship
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Controller {
    /// Reads the externally polled `InputState`
    Human,
    /// Chases `target`, or the player when unset
    Ai { target: Option<Handle> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ship {
    /// Shield points; the ship is destroyed at zero
    pub hit: f32,
    pub max_hit: f32,
    /// Points per ms
    pub recharge_rate: f32,
    pub recharge_delay_ms: f32,
    /// Game time (ms) at which recharge resumes
    pub recharge_ready_at: f64,
    pub max_turn_rate: f32,
    pub thrust: f32,
    pub max_speed: f32,
    pub weapon_cooldown_ms: f32,
    /// Game time (ms) at which the weapon can fire again
    pub weapon_ready_at: f64,
    pub controller: Controller,
}

impl Ship {
    pub fn new(config: &ShipConfig, controller: Controller) -> Self {
        Self {
            hit: config.max_hit,
            max_hit: config.max_hit,
            recharge_rate: config.recharge_rate,
            recharge_delay_ms: config.recharge_delay_ms,
            recharge_ready_at: 0.0,
            max_turn_rate: config.max_turn_rate,
            thrust: config.thrust,
            max_speed: config.max_speed,
            weapon_cooldown_ms: config.weapon_cooldown_ms,
            weapon_ready_at: 0.0,
            controller,
        }
    }

    pub fn is_player(&self) -> bool {
        self.controller == Controller::Human
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debris {
    pub hit: f32,
    pub max_hit: f32,
    /// Damage absorbed so far
    pub damage_taken: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weapon {
    pub damage: f32,
    /// Game time (ms) at which the effect expires
    pub expires_at: f64,
    /// Firing ship, for attribution; not owned
    pub owner: Option<Handle>,
}

/// A one-way event horizon. Its plane passes through the item position with
/// normal `heading(item.theta)`; the normal side is "outside".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub destination: ZoneId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Kind {
    Ship(Ship),
    Debris(Debris),
    Weapon(Weapon),
    Gate(Gate),
}

/// Result of `Entity::put_damage`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    Absorbed,
    Destroyed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub item: Item,
    pub kind: Kind,
}

impl Entity {
    pub fn ship(pos: Vec2, theta: f32, config: &ShipConfig, controller: Controller) -> Self {
        let mut item = Item::new(pos, Vec2::ZERO, config.radius, config.mass);
        item.theta = crate::normalize_angle(theta);
        Self {
            item,
            kind: Kind::Ship(Ship::new(config, controller)),
        }
    }

    pub fn debris(pos: Vec2, vel: Vec2, radius: f32, mass: f32, hit: f32) -> Self {
        Self {
            item: Item::new(pos, vel, radius, mass),
            kind: Kind::Debris(Debris {
                hit,
                max_hit: hit,
                damage_taken: 0.0,
            }),
        }
    }

    /// Debris with mass and hit points derived from its radius
    pub fn debris_sized(pos: Vec2, vel: Vec2, radius: f32, config: &DebrisConfig) -> Self {
        Self::debris(
            pos,
            vel,
            radius,
            config.density * radius * radius,
            config.hit_per_radius * radius,
        )
    }

    pub fn weapon(
        pos: Vec2,
        vel: Vec2,
        config: &WeaponConfig,
        expires_at: f64,
        owner: Option<Handle>,
    ) -> Self {
        let mut item = Item::new(pos, vel, config.radius, config.mass);
        item.theta = vel.y.atan2(vel.x);
        Self {
            item,
            kind: Kind::Weapon(Weapon {
                damage: config.damage,
                expires_at,
                owner,
            }),
        }
    }

    pub fn gate(pos: Vec2, theta: f32, config: &GateConfig, destination: ZoneId) -> Self {
        let mut item = Item::new(pos, Vec2::ZERO, config.radius, config.mass);
        item.theta = crate::normalize_angle(theta);
        Self {
            item,
            kind: Kind::Gate(Gate { destination }),
        }
    }

    pub fn class(&self) -> Class {
        match self.kind {
            Kind::Ship(_) => Class::Ship,
            Kind::Debris(_) => Class::Debris,
            Kind::Weapon(_) => Class::Weapon,
            Kind::Gate(_) => Class::Gate,
        }
    }

    /// Mass as seen by collision math, never below `MIN_MASS`
    pub fn mass(&self) -> f32 {
        let mass = self.item.mass;
        if mass >= MIN_MASS {
            mass
        } else {
            log::warn!("{:?} reported mass {mass}, clamping to {MIN_MASS}", self.class());
            MIN_MASS
        }
    }

    /// Damage dealt to whatever this entity hits
    pub fn damage(&self) -> f32 {
        match &self.kind {
            Kind::Weapon(w) => w.damage,
            _ => 0.0,
        }
    }

    /// Subtract `amount` from hit points at game time `now`
    pub fn put_damage(&mut self, amount: f32, now: f64) -> DamageOutcome {
        if amount <= 0.0 {
            return DamageOutcome::Absorbed;
        }
        match &mut self.kind {
            Kind::Ship(ship) => {
                ship.hit -= amount;
                ship.recharge_ready_at = now + ship.recharge_delay_ms as f64;
                if ship.hit <= 0.0 {
                    DamageOutcome::Destroyed
                } else {
                    DamageOutcome::Absorbed
                }
            }
            Kind::Debris(debris) => {
                debris.hit -= amount;
                debris.damage_taken += amount;
                if debris.hit <= 0.0 {
                    DamageOutcome::Destroyed
                } else {
                    DamageOutcome::Absorbed
                }
            }
            Kind::Weapon(_) => DamageOutcome::Destroyed,
            Kind::Gate(_) => DamageOutcome::Absorbed,
        }
    }

    /// Gates never move and take no impulse
    pub fn is_immovable(&self) -> bool {
        matches!(self.kind, Kind::Gate(_))
    }

    pub fn as_ship(&self) -> Option<&Ship> {
        match &self.kind {
            Kind::Ship(ship) => Some(ship),
            _ => None,
        }
    }

    pub fn as_ship_mut(&mut self) -> Option<&mut Ship> {
        match &mut self.kind {
            Kind::Ship(ship) => Some(ship),
            _ => None,
        }
    }

    pub fn as_weapon(&self) -> Option<&Weapon> {
        match &self.kind {
            Kind::Weapon(weapon) => Some(weapon),
            _ => None,
        }
    }

    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            Kind::Gate(gate) => Some(gate),
            _ => None,
        }
    }

    pub fn as_debris(&self) -> Option<&Debris> {
        match &self.kind {
            Kind::Debris(debris) => Some(debris),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ship_damage_and_destroy() {
        let config = ShipConfig::default();
        let mut ship = Entity::ship(Vec2::ZERO, 0.0, &config, Controller::Human);
        assert_eq!(ship.put_damage(32.0, 100.0), DamageOutcome::Absorbed);
        let s = ship.as_ship().unwrap();
        assert_eq!(s.hit, 268.0);
        assert_eq!(s.recharge_ready_at, 100.0 + config.recharge_delay_ms as f64);
        assert_eq!(ship.put_damage(268.0, 200.0), DamageOutcome::Destroyed);
    }

    #[test]
    fn test_zero_damage_is_absorbed() {
        let mut rock = Entity::debris(Vec2::ZERO, Vec2::ZERO, 10.0, 1.0, 5.0);
        assert_eq!(rock.put_damage(0.0, 0.0), DamageOutcome::Absorbed);
        assert_eq!(rock.put_damage(5.0, 0.0), DamageOutcome::Destroyed);
        assert_eq!(rock.as_debris().unwrap().damage_taken, 5.0);
    }

    #[test]
    fn test_gate_absorbs_everything() {
        let mut gate = Entity::gate(Vec2::ZERO, 0.0, &GateConfig::default(), 2);
        assert_eq!(gate.put_damage(1.0e9, 0.0), DamageOutcome::Absorbed);
        assert!(gate.is_immovable());
        assert_eq!(gate.as_gate().unwrap().destination, 2);
    }

    #[test]
    fn test_mass_is_clamped() {
        let mut rock = Entity::debris(Vec2::ZERO, Vec2::ZERO, 10.0, 1.0, 5.0);
        rock.item.mass = 0.0;
        assert_eq!(rock.mass(), MIN_MASS);
        rock.item.mass = -3.0;
        assert!(rock.mass() > 0.0);
    }

    #[test]
    fn test_sized_debris() {
        let config = DebrisConfig::default();
        let rock = Entity::debris_sized(Vec2::ZERO, Vec2::ZERO, 10.0, &config);
        assert!((rock.item.mass - 1.0).abs() < 1e-5);
        assert_eq!(rock.class(), Class::Debris);
        assert_eq!(rock.damage(), 0.0);
    }

    #[test]
    fn test_class_indices_are_dense() {
        for (i, class) in Class::ALL.iter().enumerate() {
            assert_eq!(class.index(), i);
        }
    }
}
