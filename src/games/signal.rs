//! Signal-accumulation module: sustain sound until the accumulator fills

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::{BandTable, Completion, Device, Lifecycle, MiniGame, ModuleKind, Sample};

pub const THRESHOLD: f32 = 100.0;
/// Accumulator may overshoot the threshold by this much
const HEADROOM: f32 = 10.0;
/// Loss per 60 Hz frame
pub const DECAY: f32 = 0.03;
/// Gain per 60 Hz frame at loudness 1.0
pub const GAIN: f32 = 0.75;
const FRAME_RATE: f32 = 60.0;

/// RMS of the frequency bins, normalized so 128 reads as 1.0
pub fn loudness(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: f32 = bins.iter().map(|&b| (b as f32) * (b as f32)).sum();
    (sum / bins.len() as f32).sqrt() / 128.0
}

/// One frame of accumulation, clamped to `[0, THRESHOLD + HEADROOM]`
pub fn accumulate(level: f32, loudness: f32, frames: f32) -> f32 {
    (level + (loudness * GAIN - DECAY) * frames).clamp(0.0, THRESHOLD + HEADROOM)
}

pub struct SignalGame {
    life: Lifecycle,
    rng: Pcg32,
    bands: BandTable,
    elapsed: f32,
    level: f32,
    /// Latest reading; held until the next spectrum arrives
    loudness: f32,
}

impl SignalGame {
    pub fn new(seed: u64) -> Self {
        Self {
            life: Lifecycle::default(),
            rng: Pcg32::seed_from_u64(seed),
            bands: BandTable::signal(),
            elapsed: 0.0,
            level: 0.0,
            loudness: 0.0,
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn loudness(&self) -> f32 {
        self.loudness
    }

    /// Fill percentage, capped at 100
    pub fn progress(&self) -> f32 {
        (self.level / THRESHOLD * 100.0).min(100.0)
    }
}

impl MiniGame for SignalGame {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Signal
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.life
    }

    fn device(&self) -> Device {
        Device::Microphone
    }

    fn observe(&mut self, sample: &Sample) {
        if let Sample::Spectrum(bins) = sample {
            self.loudness = loudness(bins);
        }
    }

    fn step(&mut self, dt: f32) -> Option<Completion> {
        self.elapsed += dt;
        self.level = accumulate(self.level, self.loudness, dt * FRAME_RATE);
        if self.level < THRESHOLD {
            return None;
        }
        let index = self.bands.select(self.elapsed, &mut self.rng);
        log::debug!("Signal threshold crossed at {:.2}s", self.elapsed);
        Some(Completion::new(index, self.elapsed))
    }

    fn clear(&mut self) {
        self.elapsed = 0.0;
        self.level = 0.0;
        self.loudness = 0.0;
    }

    fn status(&self) -> Vec<String> {
        if let Some(result) = self.result() {
            return vec![
                format!("time taken: {:.1}s", result.elapsed),
                format!("vector: {}", result.destination),
            ];
        }
        vec![
            format!("{}%", self.progress().floor() as u32),
            format!("accumulation: {:.1}", self.level),
            format!("target: {}", THRESHOLD as u32),
            format!("elapsed: {:.1}s", self.elapsed),
        ]
    }

    fn explanation(&self) -> Option<String> {
        let result = self.result()?;
        let text = if result.elapsed < 5.0 {
            "Rapid collective response detected. The organism surges toward a distant vector..."
        } else if result.elapsed < 10.0 {
            "Steady accumulation complete. The organism extends toward a new territory..."
        } else {
            "Patient gathering achieved. The organism creeps toward a nearby vector..."
        };
        Some(text.to_string())
    }
}
