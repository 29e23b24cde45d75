//! Deterministic collision core
//!
//! All simulation logic lives here and runs without rendering or platform
//! dependencies:
//! - Entities live in a generational store, filed under one spatial bin each
//! - Frames are stepped with a caller-supplied duration
//! - Randomness comes from one seeded RNG owned by the simulation
//! - Iteration order is fixed (bin order, then bin membership order)

pub mod behavior;
pub mod collision;
pub mod entity;
pub mod geom;
pub mod layer;
mod response;
pub mod state;
pub mod store;
pub mod tick;

pub use behavior::{InputState, ShipCommand, ai_command, apply_command};
pub use collision::{Sweep, collide_circles};
pub use entity::{
    Class, Controller, DamageOutcome, Debris, Entity, Gate, Item, Kind, Ship, Weapon, ZoneId,
};
pub use geom::Rect;
pub use layer::{BinIndex, BinRect, Layer};
pub use state::{FrameReport, FrameStats, GateListener, SimEvent, Simulation};
pub use store::{Handle, Store};
pub use tick::{Clock, FixedClock};
