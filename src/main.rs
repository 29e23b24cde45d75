//! Deepfield headless driver
//!
//! Runs a scripted skirmish through the collision core: a player ship, a
//! few AI pursuers, a debris field and a gate. The host loop feeds variable
//! frame times into a fixed-step accumulator the same way a windowed client
//! would, logs what happens and prints a JSON summary at the end.
//!
//! Usage: `deepfield [config.json] [seconds]`

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::f32::consts::TAU;

    use glam::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;
    use serde::Serialize;

    use deepfield::consts::{FRAME_MS, MAX_SUBSTEPS};
    use deepfield::sim::{
        Class, Clock, Controller, FixedClock, Handle, InputState, Rect, SimEvent, Simulation,
        ZoneId,
    };
    use deepfield::{SimConfig, SimError};

    /// Counters gathered over the whole run
    #[derive(Debug, Default, Serialize)]
    struct Summary {
        frames: u64,
        game_time_ms: f64,
        zone: ZoneId,
        zones_visited: u32,
        player_alive: bool,
        player_hit: Option<f32>,
        entities: usize,
        destroyed: usize,
        shattered: usize,
        removed_at_gate: usize,
        spawns_dropped: usize,
        handler_calls: usize,
        degenerate: usize,
        covers_dropped: usize,
        records_dropped: usize,
    }

    struct Skirmish {
        sim: Simulation,
        clock: FixedClock,
        accumulator: f32,
        rng: Pcg32,
        summary: Summary,
    }

    impl Skirmish {
        fn new(config: SimConfig) -> Result<Self, SimError> {
            let clock = FixedClock {
                frame_ms: config.frame_ms,
            };
            let rng = Pcg32::seed_from_u64(config.seed ^ 0x9e37_79b9);
            let mut skirmish = Self {
                sim: Simulation::new(config),
                clock,
                accumulator: 0.0,
                rng,
                summary: Summary::default(),
            };
            skirmish.sim.spawn_ship(Vec2::ZERO, 0.0, Controller::Human)?;
            skirmish.populate()?;
            Ok(skirmish)
        }

        /// Fill the current zone with pursuers, a debris field and an exit
        fn populate(&mut self) -> Result<(), SimError> {
            populate_zone(&mut self.sim, &mut self.rng)
        }

        /// Scripted pilot: sweep the nose back and forth, thrust in bursts,
        /// hold the trigger
        fn input_at(&self, frame: u64) -> InputState {
            let t = frame as f32 * 0.02;
            InputState {
                turn: (t * 0.7).sin(),
                thrust: if (frame / 50) % 3 == 0 { 1.0 } else { 0.0 },
                fire: true,
            }
        }

        /// Advance by one host frame of `dt` ms
        fn update(&mut self, dt: f32) {
            let step = self.clock.frame_duration_ms();
            self.accumulator += dt.min(step * MAX_SUBSTEPS as f32);

            let mut substeps = 0;
            while self.accumulator >= step && substeps < MAX_SUBSTEPS {
                let input = self.input_at(self.sim.frame_index());
                self.sim.set_input(input);
                // Camera follows the player; after death the view stays put
                let focus = self.sim.player().and_then(|p| self.sim.item(p).ok()).map(|i| i.pos);
                if let Some(focus) = focus {
                    self.sim.set_view(Rect::centered(focus, Vec2::new(1600.0, 1200.0)));
                }

                let rng = &mut self.rng;
                let report = self
                    .sim
                    .simulate_with(step, &mut |sim: &mut Simulation, _: Handle, zone: ZoneId| {
                        log::info!("Arrived in zone {zone}, repopulating");
                        if let Err(err) = populate_zone(sim, rng) {
                            log::warn!("Zone {zone} only partly populated: {err}");
                        }
                    });
                self.record(&report.events);
                let stats = &report.stats;
                self.summary.handler_calls += stats.handler_calls;
                self.summary.degenerate += stats.degenerate;
                self.summary.covers_dropped += stats.covers_dropped;
                self.summary.records_dropped += stats.records_dropped;
                if report.frame % 250 == 0 {
                    log::info!(
                        "Frame {}: {} entities, {} active, {} contacts",
                        report.frame,
                        self.sim.store().len(),
                        stats.active,
                        stats.handler_calls
                    );
                }

                self.accumulator -= step;
                substeps += 1;
            }
        }

        fn record(&mut self, events: &[SimEvent]) {
            for event in events {
                match event {
                    SimEvent::Destroyed { class, .. } => {
                        self.summary.destroyed += 1;
                        if *class == Class::Ship {
                            log::info!("{event:?}");
                        }
                    }
                    SimEvent::Shattered { .. } => self.summary.shattered += 1,
                    SimEvent::RemovedAtGate { .. } => self.summary.removed_at_gate += 1,
                    SimEvent::SpawnDropped { .. } => self.summary.spawns_dropped += 1,
                    SimEvent::ZoneEntered { .. } => self.summary.zones_visited += 1,
                    SimEvent::GateCrossed { .. } => log::info!("{event:?}"),
                }
            }
        }

        fn finish(mut self) -> Summary {
            let player = self.sim.player().and_then(|p| self.sim.entity(p).ok());
            self.summary.player_alive = player.is_some();
            self.summary.player_hit = player.and_then(|e| e.as_ship()).map(|s| s.hit);
            self.summary.frames = self.sim.frame_index();
            self.summary.game_time_ms = self.sim.now();
            self.summary.zone = self.sim.zone();
            self.summary.entities = self.sim.store().len();
            self.summary
        }
    }

    fn populate_zone(sim: &mut Simulation, rng: &mut Pcg32) -> Result<(), SimError> {
        let center = sim
            .player()
            .and_then(|p| sim.item(p).ok())
            .map(|item| item.pos)
            .unwrap_or(Vec2::ZERO);

        for i in 0..4 {
            let angle = TAU * i as f32 / 4.0;
            let pos = center + Vec2::from_angle(angle) * 700.0;
            sim.spawn_ship(pos, angle + std::f32::consts::PI, Controller::Ai { target: None })?;
        }

        for _ in 0..60 {
            let pos = center
                + Vec2::new(rng.random_range(-1400.0..1400.0), rng.random_range(-1000.0..1000.0));
            if pos.distance(center) < 120.0 {
                continue;
            }
            let vel = Vec2::new(rng.random_range(-0.08..0.08), rng.random_range(-0.08..0.08));
            let radius = rng.random_range(8.0..40.0);
            sim.spawn_debris(pos, vel, radius)?;
        }

        // Mouth faces back toward the arrival point
        let exit = center + Vec2::new(1100.0, 0.0);
        let destination = sim.zone() + 1;
        sim.spawn_gate(exit, std::f32::consts::PI, destination)?;
        Ok(())
    }

    pub fn run() -> i32 {
        env_logger::init();
        log::info!("Deepfield (headless) starting...");

        let mut args = std::env::args().skip(1);
        let config = match args.next() {
            Some(path) => match SimConfig::load(&path) {
                Ok(config) => config,
                Err(err) => {
                    log::error!("Failed to load {path}: {err}");
                    return 1;
                }
            },
            None => SimConfig::default(),
        };
        let seconds: f32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(30.0);

        let mut skirmish = match Skirmish::new(config) {
            Ok(skirmish) => skirmish,
            Err(err) => {
                log::error!("Failed to set up skirmish: {err}");
                return 1;
            }
        };

        // Host frames at a jittery ~60 Hz, decoupled from the sim step
        let mut jitter = Pcg32::seed_from_u64(7);
        let mut elapsed = 0.0;
        while elapsed < seconds * 1000.0 {
            let dt = FRAME_MS * 0.8 + jitter.random_range(-4.0..4.0);
            skirmish.update(dt);
            elapsed += dt;
        }

        let summary = skirmish.finish();
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                log::error!("Failed to serialize summary: {err}");
                return 1;
            }
        }
        0
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    std::process::exit(headless::run());
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The core is a library on wasm; there is no headless driver
}
