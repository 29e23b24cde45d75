//! Per-frame entity behavior, run once for each entity before its motion is
//! planned
//!
//! Ships turn a `ShipCommand` into motion and weapon fire; the command comes
//! from polled input or from the chase AI depending on the controller.
//! Weapons expire here.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::{Controller, Entity, Item, Kind, Ship};
use super::state::{Deferred, Simulation};
use super::store::Handle;
use crate::config::{AiConfig, WeaponConfig};
use crate::{angle_error, bearing, heading};

/// Externally polled player input
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    /// -1 (clockwise) to 1 (counter-clockwise)
    pub turn: f32,
    /// 0 to 1
    pub thrust: f32,
    pub fire: bool,
}

/// What a ship wants to do this frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShipCommand {
    pub turn: f32,
    pub thrust: f32,
    pub fire: bool,
}

impl From<InputState> for ShipCommand {
    fn from(input: InputState) -> Self {
        Self {
            turn: input.turn,
            thrust: input.thrust,
            fire: input.fire,
        }
    }
}

/// Whether the entity survived its update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Continue,
    Removed,
}

pub(crate) fn update(sim: &mut Simulation, handle: Handle) -> Update {
    let Some(entity) = sim.store.get(handle) else {
        return Update::Removed;
    };
    match &entity.kind {
        Kind::Ship(ship) => {
            let command = match ship.controller {
                Controller::Human => ShipCommand::from(sim.input),
                Controller::Ai { target } => {
                    let target = target
                        .filter(|t| sim.store.contains(*t))
                        .or(sim.player)
                        .filter(|t| *t != handle)
                        .and_then(|t| sim.store.get(t));
                    match target {
                        Some(target) => ai_command(&sim.config.ai, &entity.item, &target.item),
                        None => ShipCommand::default(),
                    }
                }
            };
            fly(sim, handle, command);
            Update::Continue
        }
        Kind::Weapon(weapon) => {
            if sim.now >= weapon.expires_at {
                sim.destroy(handle);
                Update::Removed
            } else {
                Update::Continue
            }
        }
        Kind::Debris(_) | Kind::Gate(_) => Update::Continue,
    }
}

fn fly(sim: &mut Simulation, handle: Handle, command: ShipCommand) {
    let now = sim.now;
    let duration = sim.frame.duration;
    let weapon = sim.config.weapon.clone();
    let Some(Entity {
        item,
        kind: Kind::Ship(ship),
    }) = sim.store.get_mut(handle)
    else {
        return;
    };
    if let Some((pos, vel)) = apply_command(item, ship, command, now, duration, &weapon) {
        let expires_at = now + weapon.lifetime_ms as f64;
        let shot = Entity::weapon(pos, vel, &weapon, expires_at, Some(handle));
        sim.deferred.push(Deferred::Spawn(Box::new(shot)));
    }
}

/// Apply one frame of a command to a ship: turn rate, thrust, speed limit,
/// shield recharge, and weapon cooldown. Returns the muzzle position and
/// velocity of a shot if one leaves this frame.
pub fn apply_command(
    item: &mut Item,
    ship: &mut Ship,
    command: ShipCommand,
    now: f64,
    duration: f32,
    weapon: &WeaponConfig,
) -> Option<(Vec2, Vec2)> {
    let turn = command.turn.clamp(-1.0, 1.0);
    item.omega = turn * ship.max_turn_rate;

    let thrust = command.thrust.clamp(0.0, 1.0);
    if thrust > 0.0 {
        item.vel += heading(item.theta) * (ship.thrust * thrust * duration);
        // Only thrust is capped; collisions may still fling a ship faster
        item.vel = item.vel.clamp_length_max(ship.max_speed);
    }

    if now >= ship.recharge_ready_at && ship.hit < ship.max_hit {
        ship.hit = (ship.hit + ship.recharge_rate * duration).min(ship.max_hit);
    }

    if !command.fire || now < ship.weapon_ready_at {
        return None;
    }
    ship.weapon_ready_at = now + ship.weapon_cooldown_ms as f64;
    let dir = heading(item.theta);
    let muzzle = item.pos + dir * (item.radius + weapon.radius + 1.0);
    Some((muzzle, item.vel + dir * weapon.speed))
}

/// Chase steering: turn toward the target, thrust when roughly facing it,
/// fire when lined up and in range
pub fn ai_command(config: &AiConfig, own: &Item, target: &Item) -> ShipCommand {
    let error = angle_error(own.theta, bearing(own.pos, target.pos));
    let distance = own.pos.distance(target.pos);
    ShipCommand {
        turn: (error * config.aim_gain).clamp(-1.0, 1.0),
        thrust: if error.abs() < config.thrust_tolerance && distance > config.fire_min_distance {
            1.0
        } else {
            0.0
        },
        fire: error.abs() < config.aim_tolerance
            && (config.fire_min_distance..=config.fire_max_distance).contains(&distance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ShipConfig, SimConfig};
    use std::f32::consts::FRAC_PI_2;

    fn ship() -> (Item, Ship) {
        let entity = Entity::ship(Vec2::ZERO, 0.0, &ShipConfig::default(), Controller::Human);
        let Entity {
            item,
            kind: Kind::Ship(ship),
        } = entity
        else {
            unreachable!()
        };
        (item, ship)
    }

    #[test]
    fn test_turn_is_bounded() {
        let (mut item, mut ship) = ship();
        let cmd = ShipCommand {
            turn: 5.0,
            ..Default::default()
        };
        apply_command(&mut item, &mut ship, cmd, 0.0, 20.0, &WeaponConfig::default());
        assert_eq!(item.omega, ship.max_turn_rate);
    }

    #[test]
    fn test_thrust_caps_speed() {
        let (mut item, mut ship) = ship();
        let cmd = ShipCommand {
            thrust: 1.0,
            ..Default::default()
        };
        for _ in 0..200 {
            apply_command(&mut item, &mut ship, cmd, 0.0, 20.0, &WeaponConfig::default());
        }
        assert!(item.vel.length() <= ship.max_speed + 1e-5);
        assert!(item.vel.x > 0.0);
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let (mut item, mut ship) = ship();
        let weapon = WeaponConfig::default();
        let cmd = ShipCommand {
            fire: true,
            ..Default::default()
        };
        let (muzzle, vel) = apply_command(&mut item, &mut ship, cmd, 0.0, 20.0, &weapon).unwrap();
        assert!(muzzle.x > item.radius + weapon.radius);
        assert!((vel.x - weapon.speed).abs() < 1e-6);
        assert!(apply_command(&mut item, &mut ship, cmd, 20.0, 20.0, &weapon).is_none());
        let ready = ship.weapon_ready_at;
        assert!(apply_command(&mut item, &mut ship, cmd, ready, 20.0, &weapon).is_some());
    }

    #[test]
    fn test_recharge_waits_for_delay() {
        let (mut item, mut ship) = ship();
        ship.hit = 100.0;
        ship.recharge_ready_at = 1000.0;
        let weapon = WeaponConfig::default();
        apply_command(&mut item, &mut ship, ShipCommand::default(), 500.0, 20.0, &weapon);
        assert_eq!(ship.hit, 100.0);
        apply_command(&mut item, &mut ship, ShipCommand::default(), 1000.0, 20.0, &weapon);
        assert!(ship.hit > 100.0);
        ship.hit = ship.max_hit - 0.01;
        apply_command(&mut item, &mut ship, ShipCommand::default(), 1020.0, 20.0, &weapon);
        assert_eq!(ship.hit, ship.max_hit);
    }

    #[test]
    fn test_ai_turns_toward_target() {
        let config = AiConfig::default();
        let own = Item::new(Vec2::ZERO, Vec2::ZERO, 16.0, 10.0);
        let above = Item::new(Vec2::new(0.0, 300.0), Vec2::ZERO, 16.0, 10.0);
        let cmd = ai_command(&config, &own, &above);
        assert!(cmd.turn > 0.0);
        assert_eq!(cmd.thrust, 0.0);
        assert!(!cmd.fire);

        let mut facing = own.clone();
        facing.theta = FRAC_PI_2;
        let cmd = ai_command(&config, &facing, &above);
        assert!(cmd.turn.abs() < 1e-3);
        assert_eq!(cmd.thrust, 1.0);
        assert!(cmd.fire);
    }

    #[test]
    fn test_ai_holds_fire_out_of_range() {
        let config = AiConfig::default();
        let own = Item::new(Vec2::ZERO, Vec2::ZERO, 16.0, 10.0);
        let far = Item::new(Vec2::new(config.fire_max_distance + 100.0, 0.0), Vec2::ZERO, 16.0, 10.0);
        let cmd = ai_command(&config, &own, &far);
        assert!(!cmd.fire);
        assert_eq!(cmd.thrust, 1.0);
    }

    #[test]
    fn test_expired_weapon_is_removed() {
        let mut sim = Simulation::new(SimConfig::default());
        let shot = sim.spawn_weapon(Vec2::ZERO, Vec2::X, None).unwrap();
        assert_eq!(update(&mut sim, shot), Update::Continue);
        sim.now = sim.config.weapon.lifetime_ms as f64;
        assert_eq!(update(&mut sim, shot), Update::Removed);
        assert!(!sim.store.contains(shot));
    }

    #[test]
    fn test_ai_without_target_idles() {
        let mut sim = Simulation::new(SimConfig::default());
        let ai = sim.spawn_ship(Vec2::ZERO, 0.0, Controller::Ai { target: None }).unwrap();
        sim.frame.duration = 20.0;
        assert_eq!(update(&mut sim, ai), Update::Continue);
        let item = sim.item(ai).unwrap();
        assert_eq!(item.vel, Vec2::ZERO);
        assert_eq!(item.omega, 0.0);
        assert!(sim.deferred.is_empty());
    }
}
