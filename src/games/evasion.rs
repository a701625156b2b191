//! Evasion module: keep out of the falling marker's way
//!
//! The marker drops from the top of the mirrored camera frame. Every time it
//! lands inside a detected body the module counts a strike and sends the
//! marker back to the top. Five strikes end the run; survival time picks the
//! destination band.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::{BandTable, Completion, Device, Lifecycle, MiniGame, ModuleKind, Sample};
use crate::detect::{BoundingBox, people};

/// Camera frame the detector reports boxes in
pub const FRAME_SIZE: Vec2 = Vec2::new(640.0, 480.0);
pub const STRIKE_LIMIT: u32 = 5;
/// Minimum seconds between two counted strikes
pub const STRIKE_COOLDOWN: f32 = 0.6;
/// Seconds the marker waits at the top after a strike
pub const RESPAWN_PAUSE: f32 = 0.4;
pub const DETECTION_INTERVAL: f32 = 0.15;
const MIN_SCORE: f32 = 0.5;
/// Body boxes grow by this many pixels on each side
const HIT_PADDING: f32 = 10.0;
/// Marker x range, as a fraction of frame width
const SPAWN_X: (f32, f32) = (0.1, 0.9);
/// Fall speed range in frame heights per second
const SPEED: (f32, f32) = (0.24, 0.54);

/// The falling marker, normalized to the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub pos: Vec2,
    pub speed: f32,
    /// Seconds left before it starts falling
    pub pause: f32,
}

impl Marker {
    pub fn pixel(&self) -> Vec2 {
        self.pos * FRAME_SIZE
    }
}

/// Marker center within any padded box
pub fn hits(point: Vec2, bodies: &[BoundingBox]) -> bool {
    bodies.iter().any(|b| b.padded(HIT_PADDING).contains(point))
}

pub struct EvasionGame {
    life: Lifecycle,
    rng: Pcg32,
    bands: BandTable,
    elapsed: f32,
    marker: Marker,
    /// Mirrored to match the mirrored camera feed
    bodies: Vec<BoundingBox>,
    strikes: u32,
    last_strike: Option<f32>,
}

impl EvasionGame {
    pub fn new(seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let marker = spawn(&mut rng, 0.0);
        Self {
            life: Lifecycle::default(),
            rng,
            bands: BandTable::evasion(),
            elapsed: 0.0,
            marker,
            bodies: Vec::new(),
            strikes: 0,
            last_strike: None,
        }
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn bodies(&self) -> &[BoundingBox] {
        &self.bodies
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    fn in_cooldown(&self) -> bool {
        self.last_strike
            .is_some_and(|at| self.elapsed - at < STRIKE_COOLDOWN)
    }
}

fn spawn<R: Rng>(rng: &mut R, pause: f32) -> Marker {
    Marker {
        pos: Vec2::new(rng.random_range(SPAWN_X.0..=SPAWN_X.1), 0.0),
        speed: rng.random_range(SPEED.0..=SPEED.1),
        pause,
    }
}

impl MiniGame for EvasionGame {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Evasion
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.life
    }

    fn device(&self) -> Device {
        Device::Camera
    }

    fn uses_model(&self) -> bool {
        true
    }

    fn detection_interval(&self) -> Option<f32> {
        Some(DETECTION_INTERVAL)
    }

    fn observe(&mut self, sample: &Sample) {
        if let Sample::Detections(detections) = sample {
            self.bodies = people(detections, MIN_SCORE)
                .iter()
                .map(|b| b.mirrored(FRAME_SIZE.x))
                .collect();
        }
    }

    fn step(&mut self, dt: f32) -> Option<Completion> {
        self.elapsed += dt;

        if self.marker.pause > 0.0 {
            self.marker.pause = (self.marker.pause - dt).max(0.0);
        } else {
            self.marker.pos.y += self.marker.speed * dt;
            if self.marker.pos.y > 1.0 {
                // Missed everyone
                self.marker = spawn(&mut self.rng, 0.0);
            }
        }

        if self.in_cooldown() || !hits(self.marker.pixel(), &self.bodies) {
            return None;
        }

        self.strikes += 1;
        self.last_strike = Some(self.elapsed);
        log::debug!("Strike {} at {:.2}s", self.strikes, self.elapsed);

        if self.strikes >= STRIKE_LIMIT {
            let index = self.bands.select(self.elapsed, &mut self.rng);
            return Some(Completion::new(index, self.elapsed));
        }
        self.marker = spawn(&mut self.rng, RESPAWN_PAUSE);
        None
    }

    fn clear(&mut self) {
        self.elapsed = 0.0;
        self.marker = spawn(&mut self.rng, 0.0);
        self.bodies.clear();
        self.strikes = 0;
        self.last_strike = None;
    }

    fn status(&self) -> Vec<String> {
        if let Some(result) = self.result() {
            return vec![
                format!("survived: {:.1}s", result.elapsed),
                format!("vector: {}", result.destination),
            ];
        }
        vec![
            format!("strikes: {}/{}", self.strikes, STRIKE_LIMIT),
            format!("bodies: {}", self.bodies.len()),
            format!("elapsed: {:.1}s", self.elapsed),
        ]
    }

    fn explanation(&self) -> Option<String> {
        let result = self.result()?;
        let text = if result.elapsed > 20.0 {
            "Exceptional evasion. The organism demonstrated remarkable collective awareness..."
        } else if result.elapsed > 10.0 {
            "Solid coordination. The collective moved as one for a time..."
        } else {
            "Brief contact. The signal found its mark quickly..."
        };
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::games::GamePhase;

    const DT: f32 = 1.0 / 60.0;

    fn active(seed: u64) -> EvasionGame {
        let mut game = EvasionGame::new(seed);
        game.start();
        game.ready();
        game
    }

    /// A person filling the whole frame
    fn everywhere() -> Sample {
        Sample::Detections(vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(0.0, 0.0, FRAME_SIZE.x, FRAME_SIZE.y),
        )])
    }

    #[test]
    fn test_missed_marker_respawns_without_strike() {
        let mut game = active(1);
        for _ in 0..60 * 12 {
            assert!(game.tick(DT).is_none());
            let m = game.marker();
            assert!((0.0..=1.0).contains(&m.pos.y));
            assert!((SPAWN_X.0..=SPAWN_X.1).contains(&m.pos.x));
        }
        assert_eq!(game.strikes(), 0);
    }

    #[test]
    fn test_overlap_within_cooldown_counts_once() {
        let mut game = active(2);
        game.observe(&everywhere());
        game.tick(DT);
        assert_eq!(game.strikes(), 1);
        // Still overlapping for half a second
        for _ in 0..30 {
            game.tick(DT);
        }
        assert_eq!(game.strikes(), 1);
    }

    #[test]
    fn test_exactly_five_strikes_complete() {
        let mut game = active(3);
        game.observe(&everywhere());
        let mut completion = None;
        let mut strikes_at_completion = 0;
        for _ in 0..60 * 10 {
            if let Some(c) = game.tick(DT) {
                strikes_at_completion = game.strikes();
                completion = Some(c);
                break;
            }
            assert!(game.strikes() < STRIKE_LIMIT);
        }
        let done = completion.expect("never completed");
        assert_eq!(strikes_at_completion, 5);
        assert_eq!(game.phase(), GamePhase::Complete);
        // Strikes spaced by the cooldown: done in under five seconds
        assert!(done.elapsed < 5.0);
        assert!((1..=2).contains(&done.index));

        // No sixth strike after completion
        for _ in 0..120 {
            assert!(game.tick(DT).is_none());
        }
        assert_eq!(game.strikes(), 5);
    }

    #[test]
    fn test_marker_pauses_after_strike() {
        let mut game = active(4);
        game.observe(&everywhere());
        game.tick(DT);
        assert_eq!(game.strikes(), 1);
        let m = *game.marker();
        assert_eq!(m.pos.y, 0.0);
        assert!(m.pause > 0.0);
        for _ in 0..20 {
            game.tick(DT);
        }
        assert_eq!(game.marker().pos.y, 0.0);
    }

    #[test]
    fn test_low_scores_and_other_labels_ignored() {
        let mut game = active(5);
        game.observe(&Sample::Detections(vec![
            Detection::new("person", 0.3, BoundingBox::new(0.0, 0.0, 640.0, 480.0)),
            Detection::new("chair", 0.99, BoundingBox::new(0.0, 0.0, 640.0, 480.0)),
        ]));
        assert!(game.bodies().is_empty());
        for _ in 0..120 {
            game.tick(DT);
        }
        assert_eq!(game.strikes(), 0);
    }

    #[test]
    fn test_boxes_are_mirrored() {
        let mut game = active(6);
        game.observe(&Sample::Detections(vec![Detection::new(
            "person",
            0.8,
            BoundingBox::new(0.0, 0.0, 100.0, 480.0),
        )]));
        assert_eq!(game.bodies()[0].x, 540.0);
    }

    #[test]
    fn test_padding_extends_hit_area() {
        let body = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
        assert!(hits(Vec2::new(95.0, 120.0), &[body]));
        assert!(!hits(Vec2::new(85.0, 120.0), &[body]));
    }
}
