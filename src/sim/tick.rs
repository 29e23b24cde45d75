//! Frame step
//!
//! One `simulate` call advances game time by one frame in four phases:
//! extrapolate every entity in the mask and post covers to the bins its
//! sweep touches, detect and resolve collisions bin by bin, integrate
//! motion, then apply deferred spawns and zone changes. Nothing created
//! during a frame takes part in it.

use std::mem;

use super::behavior::{self, Update};
use super::collision::{Sweep, collide_circles};
use super::entity::Class;
use super::geom::Rect;
use super::response;
use super::state::{Active, Cover, Deferred, FrameReport, GateListener, SimEvent, Simulation};
use super::store::Handle;
use crate::normalize_angle;

/// Source of frame durations
pub trait Clock {
    fn frame_duration_ms(&self) -> f32;
}

/// Clock with a constant frame length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedClock {
    pub frame_ms: f32,
}

impl Default for FixedClock {
    fn default() -> Self {
        Self {
            frame_ms: crate::consts::FRAME_MS,
        }
    }
}

impl Clock for FixedClock {
    fn frame_duration_ms(&self) -> f32 {
        self.frame_ms
    }
}

impl Simulation {
    /// Advance one frame as long as `clock` says
    pub fn step(&mut self, clock: &impl Clock) -> FrameReport {
        self.simulate(clock.frame_duration_ms())
    }

    /// Advance one frame of `duration` ms
    pub fn simulate(&mut self, duration: f32) -> FrameReport {
        self.simulate_with(duration, &mut |_: &mut Simulation, _: Handle, _: u32| {})
    }

    /// Advance one frame; `listener` hears about a player gate crossing
    /// after the zone change has been applied
    pub fn simulate_with<L: GateListener + ?Sized>(
        &mut self,
        duration: f32,
        listener: &mut L,
    ) -> FrameReport {
        if !(duration > 0.0 && duration.is_finite()) {
            log::warn!("Ignoring frame of {duration} ms");
            return FrameReport {
                frame: self.frame_index,
                ..Default::default()
            };
        }

        self.frame.reset(duration, self.layer.bin_count());
        let view = self.view;
        self.layer.set_mask(&view);

        self.extrapolate();
        self.detect();
        self.integrate();
        let crossing = self.apply_deferred();

        self.now += duration as f64;
        self.frame_index += 1;

        if let Some((player, destination)) = crossing {
            listener.on_gate_crossed(self, player, destination);
        }

        let stats = mem::take(&mut self.stats);
        log::trace!("Frame {}: {stats:?}", self.frame_index);
        FrameReport {
            frame: self.frame_index,
            events: mem::take(&mut self.events),
            stats,
        }
    }

    /// Run behaviors, plan displacements and post covers for every entity
    /// whose bin is in the mask
    fn extrapolate(&mut self) {
        let duration = self.frame.duration;
        let bins: Vec<_> = self.layer.mask_bins().collect();
        for bin in bins {
            for handle in self.store.handles_in_bin(bin) {
                match self.store.get(handle) {
                    Some(e) if e.item.active.is_none() => {}
                    _ => continue,
                }
                if behavior::update(self, handle) == Update::Removed {
                    continue;
                }
                let Some(entity) = self.store.get(handle) else {
                    continue;
                };

                let item = &entity.item;
                let displacement = item.vel * duration;
                let swept = Rect::swept_circle(item.pos, displacement, item.radius);
                let area = self.layer.set_area(&swept);
                let marker = self.frame.active.len() as u32;
                self.frame.active.push(Active {
                    handle: Some(handle),
                    displacement,
                    swept,
                    area,
                    record: None,
                });
                if let Some(entity) = self.store.get_mut(handle) {
                    entity.item.active = Some(marker);
                }
                self.stats.active += 1;
                self.post_covers(marker);
            }
        }
    }

    /// Push one cover per bin of the current area; the first is the corner
    fn post_covers(&mut self, marker: u32) {
        let max_covers = self.config.capacities.max_covers;
        let frame = &mut self.frame;
        let stats = &mut self.stats;
        let mut is_corner = true;
        self.layer.for_each_in_area(|bin| {
            if frame.cover_count >= max_covers {
                if stats.covers_dropped == 0 {
                    log::warn!("Cover stack full ({max_covers}), dropping covers this frame");
                }
                stats.covers_dropped += 1;
            } else {
                frame.covers[bin].push(Cover { marker, is_corner });
                frame.cover_count += 1;
                stats.covers += 1;
            }
            is_corner = false;
        });
    }

    /// Test every pair of covers sharing a bin
    fn detect(&mut self) {
        let bins: Vec<_> = self.layer.mask_bins().collect();
        for bin in bins {
            let mut stack = mem::take(&mut self.frame.covers[bin]);
            while let Some(a) = stack.pop() {
                for &b in &stack {
                    self.test_pair(bin, a, b);
                }
            }
            self.frame.covers[bin] = stack;
        }
    }

    /// A pair is owned by exactly one bin: the first bin of the overlap of
    /// the two covered rectangles. When either cover is its entity's corner
    /// that bin is necessarily the one we are in.
    fn owns_pair(&self, bin: usize, a: Cover, b: Cover) -> bool {
        if a.is_corner || b.is_corner {
            return true;
        }
        let area_a = self.frame.active[a.marker as usize].area;
        let area_b = self.frame.active[b.marker as usize].area;
        let Some(shared) = area_a.zip(area_b).and_then(|(ra, rb)| ra.intersect(&rb)) else {
            return false;
        };
        let (x, y) = shared.corner();
        self.layer.index(x, y) == bin
    }

    fn test_pair(&mut self, bin: usize, a: Cover, b: Cover) {
        if !self.owns_pair(bin, a, b) {
            return;
        }
        self.stats.candidate_pairs += 1;

        let active_a = self.frame.active[a.marker as usize];
        let active_b = self.frame.active[b.marker as usize];
        let (Some(ha), Some(hb)) = (active_a.handle, active_b.handle) else {
            return;
        };
        let (Some(ea), Some(eb)) = (self.store.get(ha), self.store.get(hb)) else {
            return;
        };
        let (ha, hb, ea, eb) = if ea.class() <= eb.class() {
            (ha, hb, ea, eb)
        } else {
            (hb, ha, eb, ea)
        };
        let Some(response) = response::lookup(ea.class(), eb.class()) else {
            return;
        };
        if response::exempt((ha, ea), (hb, eb)) {
            return;
        }
        if !active_a.swept.overlaps(&active_b.swept) {
            return;
        }
        if ea.class() == Class::Ship && eb.class() == Class::Gate {
            response::cross_gate(self, ha, hb);
        }

        self.stats.narrow_tests += 1;
        let t0 = match self.sweep(ha, hb) {
            Sweep::Miss => return,
            Sweep::Hit(t0) => t0,
            Sweep::Overlapping => {
                self.stats.degenerate += 1;
                match response.separate {
                    Some(separate) => {
                        separate(self, ha, hb);
                        // One retry; a pair still stuck resolves immediately
                        match self.sweep(ha, hb) {
                            Sweep::Miss => return,
                            Sweep::Hit(t0) => t0,
                            Sweep::Overlapping => 0.0,
                        }
                    }
                    None => 0.0,
                }
            }
        };

        self.stats.handler_calls += 1;
        (response.collide)(self, ha, hb, t0);
    }

    fn sweep(&self, a: Handle, b: Handle) -> Sweep {
        let (Some(ea), Some(eb)) = (self.store.get(a), self.store.get(b)) else {
            return Sweep::Miss;
        };
        collide_circles(
            ea.item.pos,
            ea.item.vel,
            eb.item.pos,
            eb.item.vel,
            ea.item.radius + eb.item.radius,
            self.frame.duration,
        )
    }

    /// Move every surviving active entity to its end-of-frame state and
    /// refile it under its new bin
    fn integrate(&mut self) {
        let duration = self.frame.duration;
        for index in 0..self.frame.active.len() {
            let active = self.frame.active[index];
            let Some(handle) = active.handle else {
                continue;
            };
            let record = active.record.map(|r| self.frame.records[r]);
            let Some(entity) = self.store.get_mut(handle) else {
                continue;
            };

            let item = &mut entity.item;
            match record {
                Some(record) => {
                    let after = record.velocity();
                    item.pos += item.vel * record.t0 + after * (duration - record.t0);
                    item.vel = after;
                }
                None => item.pos += item.vel * duration,
            }
            item.theta = normalize_angle(item.theta + item.omega * duration);
            item.active = None;

            let bin = self.layer.bin_of(item.pos);
            if bin != item.bin {
                self.store.move_to_bin(handle, bin);
            }
        }
    }

    /// Apply spawns and at most one zone change queued during the frame
    fn apply_deferred(&mut self) -> Option<(Handle, u32)> {
        let mut zone_change = None;
        for action in mem::take(&mut self.deferred) {
            match action {
                Deferred::Spawn(entity) => {
                    let class = entity.class();
                    if let Err(err) = self.insert(*entity) {
                        log::warn!("Dropped {class:?} spawn: {err}");
                        self.events.push(SimEvent::SpawnDropped { class });
                    }
                }
                Deferred::ZoneChange {
                    player,
                    destination,
                } => {
                    zone_change.get_or_insert((player, destination));
                }
            }
        }
        zone_change.filter(|&(player, destination)| self.enter_zone(player, destination))
    }
}
