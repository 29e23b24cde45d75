//! Type-pair collision responses
//!
//! Responses are looked up by the canonical (lower class, higher class)
//! pair, so every handler receives its arguments in class order: for
//! Ship×Weapon the weapon is always `b`, for Ship×Gate the gate is.
//! Handlers never touch velocities directly; they fold their outcome into
//! the frame's collision records and integration applies it.

use glam::Vec2;

use super::collision::{
    closing_speed, elastic, gate_crossing, impact_normal, inelastic, penetration, reflect,
};
use super::entity::{Class, DamageOutcome, Entity, Kind};
use super::state::{Deferred, SimEvent, Simulation};
use super::store::Handle;
use crate::heading;

/// Resolves a collision first found at `t0` ms into the frame
pub(crate) type CollideFn = fn(&mut Simulation, Handle, Handle, f32);

/// Separates a pair found interpenetrating at frame start
pub(crate) type SeparateFn = fn(&mut Simulation, Handle, Handle);

#[derive(Clone, Copy)]
pub(crate) struct Response {
    pub collide: CollideFn,
    /// Without one, an overlapping pair is resolved at `t0 = 0`
    pub separate: Option<SeparateFn>,
}

const BOUNCE: Option<Response> = Some(Response {
    collide: bounce,
    separate: Some(push_apart),
});

const STICK: Option<Response> = Some(Response {
    collide: stick,
    separate: None,
});

const DEFLECT: Option<Response> = Some(Response {
    collide: deflect,
    separate: Some(push_off),
});

const ABSORB: Option<Response> = Some(Response {
    collide: absorb,
    separate: None,
});

/// Upper triangle only; `[a][b]` with `a <= b`
static RESPONSES: [[Option<Response>; Class::COUNT]; Class::COUNT] = [
    // Ship: Ship, Debris, Weapon, Gate
    [BOUNCE, BOUNCE, STICK, DEFLECT],
    // Debris
    [None, BOUNCE, STICK, DEFLECT],
    // Weapon
    [None, None, None, ABSORB],
    // Gate
    [None, None, None, None],
];

/// Response for a canonical class pair, `None` when the pair never interacts
pub(crate) fn lookup(a: Class, b: Class) -> Option<Response> {
    debug_assert!(a <= b);
    RESPONSES[a.index()][b.index()]
}

/// Weapons pass through the ship that fired them
pub(crate) fn exempt(a: (Handle, &Entity), b: (Handle, &Entity)) -> bool {
    let fired_by = |weapon: &Entity, other: Handle| {
        weapon.as_weapon().is_some_and(|w| w.owner == Some(other))
    };
    fired_by(a.1, b.0) || fired_by(b.1, a.0)
}

/// Elastic bounce; hard enough impacts break debris apart
fn bounce(sim: &mut Simulation, a: Handle, b: Handle, t0: f32) {
    let (Some(ea), Some(eb)) = (sim.store.get(a), sim.store.get(b)) else {
        return;
    };
    let (va, vb) = (ea.item.vel, eb.item.vel);
    let n = impact_normal(ea.item.pos + va * t0, eb.item.pos + vb * t0);
    let (va_after, vb_after) = elastic(va, vb, ea.mass(), eb.mass(), n);
    let closing = closing_speed(va, vb, n);
    let fragile = [(a, ea.class()), (b, eb.class())];

    sim.record_collision(a, va_after, t0);
    sim.record_collision(b, vb_after, t0);

    if closing > sim.config.debris.break_speed {
        for (handle, class) in fragile {
            if class == Class::Debris {
                log::debug!("Debris {handle:?} broke on impact at {closing:.2} px/ms");
                sim.shatter(handle);
            }
        }
    }
}

/// Perfectly inelastic hit by a weapon (`b`), which is consumed
fn stick(sim: &mut Simulation, victim: Handle, weapon: Handle, t0: f32) {
    let (Some(ev), Some(ew)) = (sim.store.get(victim), sim.store.get(weapon)) else {
        return;
    };
    let common = inelastic(ev.item.vel, ew.item.vel, ev.mass(), ew.mass());
    let damage = ew.damage();
    let now = sim.now;

    sim.record_collision(victim, common, t0);
    sim.destroy(weapon);

    let outcome = sim
        .store
        .get_mut(victim)
        .map(|e| e.put_damage(damage, now));
    if outcome == Some(DamageOutcome::Destroyed) {
        sim.kill(victim);
    }
}

/// Face of a gate's plane that `mover` meets at `pos`, as a unit normal
/// pointing into the plane. `None` for a ship in front of the mouth: the
/// horizon lets it through and `cross_gate` decides what happens.
fn gate_face(mover: &Entity, gate: &Entity, pos: Vec2) -> Option<Vec2> {
    let n = heading(gate.item.theta);
    let rel = pos - gate.item.pos;
    let in_front = rel.dot(n) > 0.0;
    let in_mouth = rel.dot(n.perp()).abs() <= gate.item.radius;
    if in_front && in_mouth && mover.class() == Class::Ship {
        return None;
    }
    Some(if in_front { -n } else { n })
}

/// Mover (`a`) rebounds off the plane of an immovable gate (`b`)
fn deflect(sim: &mut Simulation, mover: Handle, gate: Handle, t0: f32) {
    let (Some(em), Some(eg)) = (sim.store.get(mover), sim.store.get(gate)) else {
        return;
    };
    let vel = em.item.vel;
    let Some(face) = gate_face(em, eg, em.item.pos + vel * t0) else {
        return;
    };
    if vel.dot(face) > 0.0 {
        sim.record_collision(mover, reflect(vel, face), t0);
    }
}

/// Weapon (`a`) vanishes into a gate
fn absorb(sim: &mut Simulation, weapon: Handle, _gate: Handle, _t0: f32) {
    sim.destroy(weapon);
}

/// Split the overlap evenly between both bodies
fn push_apart(sim: &mut Simulation, a: Handle, b: Handle) {
    let (Some(ea), Some(eb)) = (sim.store.get(a), sim.store.get(b)) else {
        return;
    };
    let radius_sum = ea.item.radius + eb.item.radius;
    let Some((n, depth)) = penetration(ea.item.pos, eb.item.pos, radius_sum) else {
        return;
    };
    let shift = n * (depth * 0.5);
    if let Some(e) = sim.store.get_mut(a) {
        e.item.pos -= shift;
    }
    if let Some(e) = sim.store.get_mut(b) {
        e.item.pos += shift;
    }
    log::debug!("Separated overlapping {a:?} and {b:?} by {depth:.3}");
}

/// Move only the mover (`a`) clear of the gate (`b`) plane, back the way
/// it came
fn push_off(sim: &mut Simulation, mover: Handle, gate: Handle) {
    let (Some(em), Some(eg)) = (sim.store.get(mover), sim.store.get(gate)) else {
        return;
    };
    let Some(face) = gate_face(em, eg, em.item.pos) else {
        return;
    };
    let distance = (em.item.pos - eg.item.pos).dot(face).abs();
    let depth = em.item.radius - distance;
    if depth <= 0.0 {
        return;
    }
    if let Some(e) = sim.store.get_mut(mover) {
        e.item.pos -= face * depth;
    }
    log::debug!("Pushed {mover:?} off gate {gate:?} by {depth:.3}");
}

/// Test a ship's planned path against a gate plane. Runs before, and
/// independently of, the circle sweep: the player crossing queues a zone
/// change for frame end, anyone else leaves the simulation at once.
pub(crate) fn cross_gate(sim: &mut Simulation, ship: Handle, gate: Handle) {
    let (Some(es), Some(eg)) = (sim.store.get(ship), sim.store.get(gate)) else {
        return;
    };
    let (Kind::Ship(s), Kind::Gate(g)) = (&es.kind, &eg.kind) else {
        return;
    };
    let displacement = sim.displacement(ship);
    if gate_crossing(
        es.item.pos,
        displacement,
        eg.item.pos,
        eg.item.theta,
        eg.item.radius,
    )
    .is_none()
    {
        return;
    }

    let destination = g.destination;
    if s.is_player() {
        log::debug!("Player {ship:?} crossed gate {gate:?} to zone {destination}");
        sim.deferred.push(Deferred::ZoneChange {
            player: ship,
            destination,
        });
    } else {
        log::debug!("Ship {ship:?} left through gate {gate:?}");
        sim.events.push(SimEvent::RemovedAtGate { ship });
        sim.destroy(ship);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::sim::entity::Controller;
    use glam::Vec2;

    #[test]
    fn test_table_covers_expected_pairs() {
        for a in Class::ALL {
            for b in Class::ALL {
                if a > b {
                    continue;
                }
                let expected = !matches!(
                    (a, b),
                    (Class::Weapon, Class::Weapon) | (Class::Gate, Class::Gate)
                );
                assert_eq!(lookup(a, b).is_some(), expected, "{a:?} x {b:?}");
            }
        }
    }

    #[test]
    fn test_weapon_hits_have_no_separation() {
        assert!(lookup(Class::Ship, Class::Weapon).unwrap().separate.is_none());
        assert!(lookup(Class::Debris, Class::Weapon).unwrap().separate.is_none());
        assert!(lookup(Class::Debris, Class::Debris).unwrap().separate.is_some());
    }

    #[test]
    fn test_owner_exemption() {
        let config = SimConfig::default();
        let mut sim = Simulation::new(config);
        let ship = sim.spawn_ship(Vec2::ZERO, 0.0, Controller::Human).unwrap();
        let other = sim.spawn_ship(Vec2::new(100.0, 0.0), 0.0, Controller::Ai { target: None }).unwrap();
        let shot = sim.spawn_weapon(Vec2::new(20.0, 0.0), Vec2::X, Some(ship)).unwrap();

        let es = sim.store.get(ship).unwrap();
        let eo = sim.store.get(other).unwrap();
        let ew = sim.store.get(shot).unwrap();
        assert!(exempt((ship, es), (shot, ew)));
        assert!(exempt((shot, ew), (ship, es)));
        assert!(!exempt((other, eo), (shot, ew)));
    }

    #[test]
    fn test_push_apart_is_symmetric() {
        let mut sim = Simulation::new(SimConfig::default());
        let a = sim.spawn_debris(Vec2::new(-5.0, 0.0), Vec2::ZERO, 10.0).unwrap();
        let b = sim.spawn_debris(Vec2::new(5.0, 0.0), Vec2::ZERO, 10.0).unwrap();
        push_apart(&mut sim, a, b);
        let pa = sim.item(a).unwrap().pos;
        let pb = sim.item(b).unwrap().pos;
        assert!((pa.x + 10.0).abs() < 1e-4);
        assert!((pb.x - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_push_off_moves_only_the_mover() {
        let mut sim = Simulation::new(SimConfig::default());
        let ship = sim.spawn_ship(Vec2::new(-10.0, 5.0), 0.0, Controller::Ai { target: None }).unwrap();
        let gate = sim.spawn_gate(Vec2::ZERO, 0.0, 1).unwrap();
        push_off(&mut sim, ship, gate);
        assert_eq!(sim.item(gate).unwrap().pos, Vec2::ZERO);
        // Straight back from the plane, not radially from the gate centre
        let pos = sim.item(ship).unwrap().pos;
        assert!(pos.distance(Vec2::new(-16.0, 5.0)) < 1e-4, "{pos:?}");
    }

    #[test]
    fn test_ship_in_front_of_mouth_is_not_pushed() {
        let mut sim = Simulation::new(SimConfig::default());
        let ship = sim.spawn_ship(Vec2::new(10.0, 5.0), 0.0, Controller::Ai { target: None }).unwrap();
        let gate = sim.spawn_gate(Vec2::ZERO, 0.0, 1).unwrap();
        push_off(&mut sim, ship, gate);
        assert_eq!(sim.item(ship).unwrap().pos, Vec2::new(10.0, 5.0));
    }

    #[test]
    fn test_gate_face() {
        let mut sim = Simulation::new(SimConfig::default());
        let gate = sim.spawn_gate(Vec2::ZERO, std::f32::consts::FRAC_PI_2, 1).unwrap();
        let ship = sim.spawn_ship(Vec2::ZERO, 0.0, Controller::Ai { target: None }).unwrap();
        let rock = sim.spawn_debris(Vec2::new(0.0, 300.0), Vec2::ZERO, 10.0).unwrap();
        let eg = sim.store.get(gate).unwrap();
        let es = sim.store.get(ship).unwrap();
        let ed = sim.store.get(rock).unwrap();

        // This gate faces +Y
        assert_eq!(gate_face(es, eg, Vec2::new(10.0, 30.0)), None);
        let beside = gate_face(es, eg, Vec2::new(60.0, 30.0)).unwrap();
        assert!(beside.distance(Vec2::new(0.0, -1.0)) < 1e-6);
        let behind = gate_face(es, eg, Vec2::new(10.0, -30.0)).unwrap();
        assert!(behind.distance(Vec2::new(0.0, 1.0)) < 1e-6);
        // Only ships may enter
        let front = gate_face(ed, eg, Vec2::new(10.0, 30.0)).unwrap();
        assert!(front.distance(Vec2::new(0.0, -1.0)) < 1e-6);
    }
}
