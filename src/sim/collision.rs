//! Swept-circle collision math and impact formulas
//!
//! Pure functions with no simulation state. Times are in the same unit as
//! the frame duration (ms), velocities in world units per ms.

use glam::Vec2;

use crate::consts::GEOM_EPSILON;
use crate::heading;

/// Outcome of a swept-circle test over one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sweep {
    /// No contact within `[0, duration)`
    Miss,
    /// First contact at this time
    Hit(f32),
    /// Circles already interpenetrate at t = 0
    Overlapping,
}

/// Swept test of two moving circles over `[0, duration)`.
///
/// Symmetric in its arguments: swapping A and B negates both the relative
/// position and velocity, which leaves every coefficient unchanged.
pub fn collide_circles(
    pos_a: Vec2,
    vel_a: Vec2,
    pos_b: Vec2,
    vel_b: Vec2,
    radius_sum: f32,
    duration: f32,
) -> Sweep {
    sweep_relative(pos_b - pos_a, vel_b - vel_a, radius_sum, duration)
}

/// Swept test on relative position `z` and relative velocity `v`.
///
/// Squared distance is `|z + v t|²`. Contact is the earliest root of
/// `|z + v t|² = r²`, which only exists if the closest approach on the
/// frame interval is within `r`.
pub fn sweep_relative(z: Vec2, v: Vec2, radius_sum: f32, duration: f32) -> Sweep {
    let r2 = radius_sum * radius_sum;
    let c = z.length_squared() - r2;
    if c < 0.0 {
        return Sweep::Overlapping;
    }

    let zv = z.dot(v);
    // Not closing: distance never shrinks
    if zv >= 0.0 {
        return Sweep::Miss;
    }
    let a = v.length_squared();
    if a < GEOM_EPSILON {
        return Sweep::Miss;
    }

    let t_min = (-zv / a).clamp(0.0, duration);
    if (z + v * t_min).length_squared() > r2 {
        return Sweep::Miss;
    }

    // Earliest root of a t² + 2 zv t + c = 0, written as c / (larger root's
    // numerator) to avoid cancellation when c is small.
    let disc = (zv * zv - a * c).max(0.0);
    let t0 = (c / (-zv + disc.sqrt())).max(0.0);
    if t0 < duration { Sweep::Hit(t0) } else { Sweep::Miss }
}

/// Unit vector from `a` to `b`, or +X when they coincide
pub fn impact_normal(a: Vec2, b: Vec2) -> Vec2 {
    let d = b - a;
    if d.length_squared() < GEOM_EPSILON {
        Vec2::X
    } else {
        d.normalize()
    }
}

/// 2D elastic collision resolved along the impact normal `n` (pointing from
/// A to B). Tangential components are untouched. Returns the inputs unchanged
/// if the bodies are already separating along `n`.
pub fn elastic(va: Vec2, vb: Vec2, ma: f32, mb: f32, n: Vec2) -> (Vec2, Vec2) {
    let ua = va.dot(n);
    let ub = vb.dot(n);
    if ub - ua >= 0.0 {
        return (va, vb);
    }
    let total = ma + mb;
    let ua_after = ((ma - mb) * ua + 2.0 * mb * ub) / total;
    let ub_after = ((mb - ma) * ub + 2.0 * ma * ua) / total;
    (va + n * (ua_after - ua), vb + n * (ub_after - ub))
}

/// Perfectly inelastic common velocity
pub fn inelastic(va: Vec2, vb: Vec2, ma: f32, mb: f32) -> Vec2 {
    (va * ma + vb * mb) / (ma + mb)
}

/// Reflect `v` off a surface with normal `n` pointing into the surface.
/// Velocities already leaving the surface pass through unchanged.
pub fn reflect(v: Vec2, n: Vec2) -> Vec2 {
    let into = v.dot(n);
    if into <= 0.0 { v } else { v - 2.0 * into * n }
}

/// Normal component of closing speed, positive when approaching
pub fn closing_speed(va: Vec2, vb: Vec2, n: Vec2) -> f32 {
    (va - vb).dot(n)
}

/// Interpenetration of two circles: normal from A to B and depth, or `None`
/// when they do not overlap
pub fn penetration(pos_a: Vec2, pos_b: Vec2, radius_sum: f32) -> Option<(Vec2, f32)> {
    let d = pos_b - pos_a;
    let depth = radius_sum - d.length();
    (depth > 0.0).then(|| (impact_normal(pos_a, pos_b), depth))
}

/// Fraction of `displacement` at which a mover crosses a gate plane from the
/// outside (normal side) to the inside, if it does so within the gate's
/// radius. A signed-projection test, independent of the circle sweep.
pub fn gate_crossing(
    pos: Vec2,
    displacement: Vec2,
    gate_pos: Vec2,
    gate_theta: f32,
    gate_radius: f32,
) -> Option<f32> {
    let n = heading(gate_theta);
    let before = (pos - gate_pos).dot(n);
    let after = (pos + displacement - gate_pos).dot(n);
    if before <= 0.0 || after > 0.0 {
        return None;
    }
    let s = before / (before - after);
    let at = pos + displacement * s;
    let lateral = (at - gate_pos).dot(n.perp());
    (lateral.abs() <= gate_radius).then_some(s)
}
