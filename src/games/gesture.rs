//! Gesture-count module: raise as many hands as you can for ten seconds

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::{Completion, Device, Lifecycle, MiniGame, ModuleKind, Sample};
use crate::consts::MAX_MODAL_INDEX;

pub const COUNTDOWN: f32 = 10.0;
pub const DETECTION_INTERVAL: f32 = 0.1;
const SYNC_LOG_LEN: usize = 16;
/// Lines of the sync log shown in the panel
const SYNC_LOG_SHOWN: usize = 8;
const SAMPLING_CELLS: usize = 6;

/// One hand-tracker reading as logged in the panel
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEntry {
    pub at: f32,
    pub hands: u32,
    pub confidence: f32,
    /// 14 base-36 characters
    pub sync_id: String,
}

/// Destination index for a peak hand count: uniform over `1..=clamp(max, 1, 8)`
pub fn pick_index<R: Rng>(max_seen: u32, rng: &mut R) -> u32 {
    let upper = max_seen.clamp(1, MAX_MODAL_INDEX);
    rng.random_range(1..=upper)
}

pub struct GestureGame {
    life: Lifecycle,
    rng: Pcg32,
    elapsed: f32,
    hands: u32,
    confidence: f32,
    max_seen: u32,
    sync_log: VecDeque<SyncEntry>,
}

impl GestureGame {
    pub fn new(seed: u64) -> Self {
        Self {
            life: Lifecycle::default(),
            rng: Pcg32::seed_from_u64(seed),
            elapsed: 0.0,
            hands: 0,
            confidence: 0.0,
            max_seen: 0,
            sync_log: VecDeque::with_capacity(SYNC_LOG_LEN),
        }
    }

    pub fn time_left(&self) -> f32 {
        (COUNTDOWN - self.elapsed).max(0.0)
    }

    /// Countdown progress, 0.0 to 1.0
    pub fn progress(&self) -> f32 {
        (self.elapsed / COUNTDOWN).clamp(0.0, 1.0)
    }

    pub fn hands(&self) -> u32 {
        self.hands
    }

    pub fn max_seen(&self) -> u32 {
        self.max_seen
    }

    pub fn sync_log(&self) -> impl Iterator<Item = &SyncEntry> {
        self.sync_log.iter()
    }

    fn sync_id(&mut self) -> String {
        const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        (0..14)
            .map(|_| DIGITS[self.rng.random_range(0..DIGITS.len())] as char)
            .collect()
    }
}

impl MiniGame for GestureGame {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Gesture
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

    fn uses_page_tracker(&self) -> bool {
        true
    }

    fn detection_interval(&self) -> Option<f32> {
        Some(DETECTION_INTERVAL)
    }

    fn observe(&mut self, sample: &Sample) {
        let Sample::Hands { count, confidence } = *sample else {
            return;
        };
        self.hands = count;
        self.confidence = if count > 0 { confidence.clamp(0.0, 1.0) } else { 0.0 };
        self.max_seen = self.max_seen.max(count);

        let sync_id = self.sync_id();
        if self.sync_log.len() == SYNC_LOG_LEN {
            self.sync_log.pop_front();
        }
        self.sync_log.push_back(SyncEntry {
            at: self.elapsed,
            hands: count,
            confidence: self.confidence,
            sync_id,
        });
    }

    fn step(&mut self, dt: f32) -> Option<Completion> {
        self.elapsed += dt;
        if self.elapsed < COUNTDOWN {
            return None;
        }
        let index = pick_index(self.max_seen, &mut self.rng);
        Some(Completion::new(index, self.elapsed))
    }

    fn clear(&mut self) {
        self.elapsed = 0.0;
        self.hands = 0;
        self.confidence = 0.0;
        self.max_seen = 0;
        self.sync_log.clear();
    }

    fn status(&self) -> Vec<String> {
        if let Some(result) = self.result() {
            return vec![
                format!("total hands: {}", self.max_seen),
                format!("vector: {}", result.destination),
            ];
        }
        let filled = (self.hands as usize).min(SAMPLING_CELLS);
        let mut lines = vec![
            format!("time: {}s", self.time_left().ceil() as u32),
            format!("hands: {}", self.hands),
            format!("confidence: {:.2}", self.confidence),
            format!(
                "sampling: {}{}",
                "█".repeat(filled),
                "░".repeat(SAMPLING_CELLS - filled)
            ),
        ];
        let skip = self.sync_log.len().saturating_sub(SYNC_LOG_SHOWN);
        lines.extend(
            self.sync_log
                .iter()
                .skip(skip)
                .map(|e| format!("sync_{}... h:{}", &e.sync_id[..8], e.hands)),
        );
        lines
    }

    fn explanation(&self) -> Option<String> {
        let result = self.result()?;
        Some(format!(
            "The collective signal has been processed. The organism will now expand toward vector {}...",
            result.index
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GamePhase;
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn active(seed: u64) -> GestureGame {
        let mut game = GestureGame::new(seed);
        game.start();
        game.ready();
        game
    }

    fn run_to_end(game: &mut GestureGame) -> Completion {
        for _ in 0..(COUNTDOWN / DT) as usize + 2 {
            if let Some(c) = game.tick(DT) {
                return c;
            }
        }
        panic!("countdown never ended");
    }

    #[test]
    fn test_no_hands_picks_first_modal() {
        let mut game = active(1);
        let done = run_to_end(&mut game);
        assert_eq!(done.index, 1);
        assert_eq!(done.destination, "modal1");
        assert!(done.elapsed >= COUNTDOWN);
        assert_eq!(game.phase(), GamePhase::Complete);
    }

    #[test]
    fn test_completes_once() {
        let mut game = active(2);
        run_to_end(&mut game);
        for _ in 0..600 {
            assert!(game.tick(DT).is_none());
        }
    }

    #[test]
    fn test_peak_count_bounds_index() {
        let mut game = active(3);
        game.observe(&Sample::Hands { count: 3, confidence: 0.9 });
        game.observe(&Sample::Hands { count: 0, confidence: 0.0 });
        assert_eq!(game.max_seen(), 3);
        let done = run_to_end(&mut game);
        assert!((1..=3).contains(&done.index));
    }

    #[test]
    fn test_sync_log_rolls() {
        let mut game = active(4);
        for i in 0..40 {
            game.observe(&Sample::Hands { count: i % 4, confidence: 0.7 });
        }
        let log: Vec<_> = game.sync_log().collect();
        assert_eq!(log.len(), SYNC_LOG_LEN);
        assert_eq!(log.last().unwrap().hands, 39 % 4);
        assert!(log.iter().all(|e| e.sync_id.len() == 14));
        assert!(log.iter().all(|e| e.sync_id.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())));
    }

    #[test]
    fn test_ignores_other_samples() {
        let mut game = active(5);
        game.observe(&Sample::Spectrum(vec![255; 32]));
        assert_eq!(game.max_seen(), 0);
        assert_eq!(game.sync_log().count(), 0);
    }

    #[test]
    fn test_explanation_names_vector() {
        let mut game = active(6);
        game.observe(&Sample::Hands { count: 1, confidence: 0.8 });
        run_to_end(&mut game);
        assert!(game.explanation().unwrap().ends_with("toward vector 1..."));
    }

    proptest! {
        #[test]
        fn index_within_clamped_peak(max_seen in 0u32..40, seed in any::<u64>()) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let index = pick_index(max_seen, &mut rng);
            prop_assert!(index >= 1);
            prop_assert!(index <= max_seen.clamp(1, 8));
        }
    }
}
