//! Procedural outline and tendril shapes
//!
//! Pure functions of (time, seed) so rendering never mutates simulation state.

use glam::Vec2;
use std::f32::consts::{PI, TAU};

/// Breathing scale applied to a blob's radius
#[inline]
pub fn pulse(phase: f32) -> f32 {
    phase.sin() * 0.1 + 1.0
}

/// Marker breathing: unique per marker position, 0.7..=1.0
#[inline]
pub fn marker_pulse(time: f32, anchor: Vec2) -> f32 {
    (time * 2.0 + anchor.x * 10.0 + anchor.y * 10.0).sin() * 0.15 + 0.85
}

/// Outline radius at `angle`.
///
/// Sum of sinusoids at increasing angular frequency and decreasing amplitude;
/// `seed` shifts every term so blobs don't wobble in lockstep.
pub fn outline_radius(base: f32, angle: f32, time: f32, seed: f32, harmonics: u32) -> f32 {
    let mut r = base;
    for k in 1..=harmonics {
        let kf = k as f32;
        let freq = kf + 2.0;
        let amp = base * 0.08 / kf;
        r += (angle * freq + time * (0.8 + 0.45 * kf) + seed * kf).sin() * amp;
    }
    r.max(1.0)
}

/// Closed outline around `center`
pub fn outline_points(
    center: Vec2,
    base: f32,
    time: f32,
    seed: f32,
    harmonics: u32,
    samples: usize,
) -> Vec<Vec2> {
    let samples = samples.max(3);
    (0..samples)
        .map(|i| {
            let angle = i as f32 / samples as f32 * TAU;
            let r = outline_radius(base, angle, time, seed, harmonics);
            center + Vec2::new(angle.cos(), angle.sin()) * r
        })
        .collect()
}

/// Sideways offset of a tendril at parameter `t` in [0, 1].
///
/// Pinned to zero at both ends; the constant bow keeps the stroke from ever
/// lying flat even when the oscillating terms cancel.
pub fn tendril_offset(t: f32, length: f32, time: f32, seed: f32, sway: f32) -> f32 {
    let envelope = (t * PI).sin();
    let bow = (length * 0.06).clamp(4.0, 40.0);
    let wave = (time * 1.3 + t * 6.0 + seed).sin() * 14.0
        + (time * 2.9 + t * 13.0 + seed * 2.0).sin() * 5.0;
    envelope * (bow + wave * sway)
}

/// Polyline from `from` to `to` with organic sway
pub fn tendril_points(
    from: Vec2,
    to: Vec2,
    time: f32,
    seed: f32,
    sway: f32,
    segments: usize,
) -> Vec<Vec2> {
    let segments = segments.max(2);
    let delta = to - from;
    let length = delta.length();
    let normal = if length > f32::EPSILON {
        Vec2::new(-delta.y, delta.x) / length
    } else {
        Vec2::ZERO
    };

    (0..=segments)
        .map(|i| {
            let t = i as f32 / segments as f32;
            from + delta * t + normal * tendril_offset(t, length, time, seed, sway)
        })
        .collect()
}
