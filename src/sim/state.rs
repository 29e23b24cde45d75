//! Simulation context and frame-scoped scratch state
//!
//! Everything the frame step touches lives in one explicitly constructed
//! `Simulation`, so independent simulations can run side by side.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::behavior::InputState;
use super::entity::{Class, Controller, Entity, Item, Kind, ZoneId};
use super::geom::Rect;
use super::layer::{BinRect, Layer};
use super::store::{Handle, Store};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::heading;

/// Something that happened during a frame, reported after it completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    Destroyed { handle: Handle, class: Class },
    /// Debris broke up; fragments spawn at the end of the frame
    Shattered { handle: Handle, fragments: usize },
    /// The player crossed a gate and the zone change went through
    GateCrossed { ship: Handle, destination: ZoneId },
    /// A non-player ship crossed a gate and left the simulation
    RemovedAtGate { ship: Handle },
    ZoneEntered { zone: ZoneId },
    /// A deferred spawn found its pool full
    SpawnDropped { class: Class },
}

/// Per-frame counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    /// Entities extrapolated this frame
    pub active: usize,
    pub covers: usize,
    pub covers_dropped: usize,
    /// Pairs owned by the bin that examined them
    pub candidate_pairs: usize,
    /// Pairs that reached the exact circle sweep
    pub narrow_tests: usize,
    /// Pairs found interpenetrating at frame start
    pub degenerate: usize,
    /// Collision handler invocations
    pub handler_calls: usize,
    pub records_dropped: usize,
}

/// Result of one `simulate` call
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub events: Vec<SimEvent>,
    pub stats: FrameStats,
}

/// Receives the player's gate crossing once the frame has fully completed
pub trait GateListener {
    fn on_gate_crossed(&mut self, sim: &mut Simulation, player: Handle, destination: ZoneId);
}

impl<F> GateListener for F
where
    F: FnMut(&mut Simulation, Handle, ZoneId),
{
    fn on_gate_crossed(&mut self, sim: &mut Simulation, player: Handle, destination: ZoneId) {
        self(sim, player, destination)
    }
}

/// Actions that could invalidate the active set; applied after integration
#[derive(Debug, Clone)]
pub(crate) enum Deferred {
    Spawn(Box<Entity>),
    ZoneChange { player: Handle, destination: ZoneId },
}

/// Frame-scoped state for one extrapolated entity
#[derive(Debug, Clone, Copy)]
pub(crate) struct Active {
    /// `None` once the entity is destroyed mid-frame
    pub handle: Option<Handle>,
    pub displacement: Vec2,
    pub swept: Rect,
    pub area: Option<BinRect>,
    pub record: Option<usize>,
}

/// Reference from a bin to an active entity
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cover {
    pub marker: u32,
    /// First bin of the entity's covered rectangle
    pub is_corner: bool,
}

/// Accumulated outcome of every collision one entity took this frame
#[derive(Debug, Clone, Copy)]
pub(crate) struct CollisionRecord {
    pub vel_sum: Vec2,
    pub count: u32,
    /// Earliest contact time
    pub t0: f32,
}

impl CollisionRecord {
    /// Average of the candidate velocities. Not physical, but order-free
    /// for two contacts and cheap.
    pub fn velocity(&self) -> Vec2 {
        self.vel_sum / self.count.max(1) as f32
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FrameScratch {
    pub duration: f32,
    pub active: Vec<Active>,
    /// Cover stack per bin
    pub covers: Vec<Vec<Cover>>,
    pub cover_count: usize,
    pub records: Vec<CollisionRecord>,
}

impl FrameScratch {
    pub fn reset(&mut self, duration: f32, bin_count: usize) {
        self.duration = duration;
        self.active.clear();
        self.records.clear();
        self.cover_count = 0;
        self.covers.resize_with(bin_count, Vec::new);
        self.covers.iter_mut().for_each(Vec::clear);
    }
}

/// The whole simulation: layer, store, and the frame in progress
#[derive(Debug, Clone)]
pub struct Simulation {
    pub(crate) config: SimConfig,
    pub(crate) layer: Layer,
    pub(crate) store: Store,
    pub(crate) frame: FrameScratch,
    pub(crate) rng: Pcg32,
    /// Game time at the start of the current frame (ms)
    pub(crate) now: f64,
    pub(crate) frame_index: u64,
    pub(crate) zone: ZoneId,
    pub(crate) player: Option<Handle>,
    pub(crate) input: InputState,
    pub(crate) view: Rect,
    pub(crate) deferred: Vec<Deferred>,
    pub(crate) events: Vec<SimEvent>,
    pub(crate) stats: FrameStats,
}

impl Simulation {
    /// Create an empty simulation. The view starts out covering the world.
    pub fn new(config: SimConfig) -> Self {
        let layer = Layer::from_config(&config);
        let store = Store::new(&config.capacities, layer.bin_count());
        let h = layer.half_extent();
        log::info!(
            "Simulation created: {}x{} bins of {:.0} units, seed {}",
            layer.bins_per_side(),
            layer.bins_per_side(),
            layer.bin_span(),
            config.seed
        );
        Self {
            rng: Pcg32::seed_from_u64(config.seed),
            view: Rect::new(Vec2::splat(-h), Vec2::splat(h)),
            config,
            layer,
            store,
            frame: FrameScratch::default(),
            now: 0.0,
            frame_index: 0,
            zone: 0,
            player: None,
            input: InputState::default(),
            deferred: Vec::new(),
            events: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Game time in ms
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn zone(&self) -> ZoneId {
        self.zone
    }

    pub fn player(&self) -> Option<Handle> {
        self.player
    }

    /// Camera rectangle; only entities in bins it touches are simulated
    pub fn set_view(&mut self, view: Rect) {
        self.view = view;
    }

    pub fn view(&self) -> Rect {
        self.view
    }

    /// Latest polled player input, read by human-controlled ships
    pub fn set_input(&mut self, input: InputState) {
        self.input = input;
    }

    pub fn entity(&self, handle: Handle) -> Result<&Entity, SimError> {
        self.store.get(handle).ok_or(SimError::InvalidHandle(handle))
    }

    pub fn item(&self, handle: Handle) -> Result<&Item, SimError> {
        self.entity(handle).map(|e| &e.item)
    }

    /// Add an entity, filing it under the bin of its position
    pub fn insert(&mut self, mut entity: Entity) -> Result<Handle, SimError> {
        entity.item.bin = self.layer.bin_of(entity.item.pos);
        entity.item.active = None;
        let is_player = entity.as_ship().is_some_and(|s| s.is_player());
        let handle = self.store.create(entity)?;
        if is_player {
            self.player = Some(handle);
        }
        Ok(handle)
    }

    pub fn spawn_ship(
        &mut self,
        pos: Vec2,
        theta: f32,
        controller: Controller,
    ) -> Result<Handle, SimError> {
        let ship = Entity::ship(pos, theta, &self.config.ship, controller);
        self.insert(ship)
    }

    pub fn spawn_debris(&mut self, pos: Vec2, vel: Vec2, radius: f32) -> Result<Handle, SimError> {
        let rock = Entity::debris_sized(pos, vel, radius, &self.config.debris);
        self.insert(rock)
    }

    pub fn spawn_weapon(
        &mut self,
        pos: Vec2,
        vel: Vec2,
        owner: Option<Handle>,
    ) -> Result<Handle, SimError> {
        let expires_at = self.now + self.config.weapon.lifetime_ms as f64;
        let shot = Entity::weapon(pos, vel, &self.config.weapon, expires_at, owner);
        self.insert(shot)
    }

    pub fn spawn_gate(
        &mut self,
        pos: Vec2,
        theta: f32,
        destination: ZoneId,
    ) -> Result<Handle, SimError> {
        let gate = Entity::gate(pos, theta, &self.config.gate, destination);
        self.insert(gate)
    }

    /// Move an entity, keeping its bin in step
    pub fn teleport(&mut self, handle: Handle, pos: Vec2) -> Result<(), SimError> {
        let bin = self.layer.bin_of(pos);
        let entity = self
            .store
            .get_mut(handle)
            .ok_or(SimError::InvalidHandle(handle))?;
        entity.item.pos = pos;
        self.store.move_to_bin(handle, bin);
        Ok(())
    }

    pub fn set_velocity(&mut self, handle: Handle, vel: Vec2) -> Result<(), SimError> {
        let entity = self
            .store
            .get_mut(handle)
            .ok_or(SimError::InvalidHandle(handle))?;
        if !entity.is_immovable() {
            entity.item.vel = vel;
        }
        Ok(())
    }

    /// Remove an entity. A second call with the same handle is a no-op.
    ///
    /// If the entity is active in the current frame its marker becomes a
    /// tombstone, so covers still pointing at it resolve to nothing.
    pub fn destroy(&mut self, handle: Handle) -> bool {
        let Some(entity) = self.store.destroy(handle) else {
            return false;
        };
        if let Some(active) = entity
            .item
            .active
            .and_then(|m| self.frame.active.get_mut(m as usize))
        {
            active.handle = None;
        }
        if self.player == Some(handle) {
            self.player = None;
        }
        let class = entity.class();
        log::debug!("{class:?} {handle:?} destroyed");
        self.events.push(SimEvent::Destroyed { handle, class });
        true
    }

    /// Destroy an entity whose hit points ran out; debris breaks up
    pub(crate) fn kill(&mut self, handle: Handle) {
        match self.store.get(handle).map(Entity::class) {
            Some(Class::Debris) => self.shatter(handle),
            Some(_) => {
                self.destroy(handle);
            }
            None => {}
        }
    }

    /// Break debris into smaller pieces queued for end of frame
    pub(crate) fn shatter(&mut self, handle: Handle) {
        let Some(parent) = self.store.get(handle).map(|e| e.item.clone()) else {
            return;
        };
        let debris = &self.config.debris;
        let radius = parent.radius * 0.5;
        let count = if radius >= debris.min_fragment_radius {
            debris.fragment_count
        } else {
            0
        };
        let spread = debris.fragment_spread;

        if count > 0 {
            // Fragment centers on a ring wide enough that neighbors don't touch
            let ring = if count > 1 {
                radius / (std::f32::consts::PI / count as f32).sin() * 1.05
            } else {
                0.0
            };
            let base = self.rng.random_range(0.0..std::f32::consts::TAU);
            for i in 0..count {
                let dir = heading(base + std::f32::consts::TAU * i as f32 / count as f32);
                let kick = if spread > 0.0 {
                    self.rng.random_range(0.0..spread)
                } else {
                    0.0
                };
                let fragment = Entity::debris_sized(
                    parent.pos + dir * ring,
                    parent.vel + dir * kick,
                    radius,
                    &self.config.debris,
                );
                self.deferred.push(Deferred::Spawn(Box::new(fragment)));
            }
        }

        log::debug!("Debris {handle:?} shattered into {count} fragments");
        self.events.push(SimEvent::Shattered {
            handle,
            fragments: count,
        });
        self.destroy(handle);
    }

    /// Fold one collision outcome into the entity's record for this frame
    pub(crate) fn record_collision(&mut self, handle: Handle, vel: Vec2, t0: f32) {
        let Some(marker) = self.store.get(handle).and_then(|e| e.item.active) else {
            return;
        };
        let Some(active) = self.frame.active.get_mut(marker as usize) else {
            return;
        };
        match active.record {
            Some(index) => {
                let record = &mut self.frame.records[index];
                record.vel_sum += vel;
                record.count += 1;
                record.t0 = record.t0.min(t0);
            }
            None if self.frame.records.len() < self.config.capacities.max_collisions => {
                active.record = Some(self.frame.records.len());
                self.frame.records.push(CollisionRecord {
                    vel_sum: vel,
                    count: 1,
                    t0,
                });
            }
            None => {
                if self.stats.records_dropped == 0 {
                    log::warn!(
                        "Collision pool full ({}), dropping collisions this frame",
                        self.config.capacities.max_collisions
                    );
                }
                self.stats.records_dropped += 1;
            }
        }
    }

    /// Displacement planned for an active entity, or its unconstrained one
    pub(crate) fn displacement(&self, handle: Handle) -> Vec2 {
        let Some(entity) = self.store.get(handle) else {
            return Vec2::ZERO;
        };
        entity
            .item
            .active
            .and_then(|m| self.frame.active.get(m as usize))
            .map(|a| a.displacement)
            .unwrap_or(entity.item.vel * self.frame.duration)
    }

    /// Switch to another zone: everything but the player goes, the player
    /// is re-centered keeping its velocity. Fails if the player died after
    /// crossing.
    pub(crate) fn enter_zone(&mut self, player: Handle, destination: ZoneId) -> bool {
        if !self.store.contains(player) {
            log::debug!("Zone change to {destination} dropped, player {player:?} is gone");
            return false;
        }
        self.events.push(SimEvent::GateCrossed {
            ship: player,
            destination,
        });
        for handle in self.store.handles() {
            if handle != player {
                self.store.destroy(handle);
            }
        }
        let center = self.layer.bin_of(Vec2::ZERO);
        if let Some(entity) = self.store.get_mut(player) {
            entity.item.pos = Vec2::ZERO;
        }
        self.store.move_to_bin(player, center);
        self.zone = destination;
        log::info!("Entered zone {destination}");
        self.events.push(SimEvent::ZoneEntered { zone: destination });
        true
    }

    /// True if every entity is filed under the bin its position maps to
    pub fn bins_consistent(&self) -> bool {
        self.store.iter().all(|(handle, entity)| {
            let bin = self.layer.bin_of(entity.item.pos);
            entity.item.bin == bin && self.store.handles_in_bin(bin).contains(&handle)
        })
    }

    /// Handles of ships flown by AI
    pub fn ai_ships(&self) -> Vec<Handle> {
        self.store
            .iter()
            .filter(|(_, e)| matches!(&e.kind, Kind::Ship(s) if !s.is_player()))
            .map(|(h, _)| h)
            .collect()
    }
}
