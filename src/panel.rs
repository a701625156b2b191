//! Modal detail panels
//!
//! Opened by id from a revealed label. Content kinds come from the catalog.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::config::{ModalConfig, PanelKind};

/// Samples kept in the heartbeat trace
pub const TRACE_LENGTH: usize = 200;
/// Seconds between heart-rate updates
const HEARTBEAT_UPDATE: f32 = 0.5;
const BPM_MIN: f32 = 60.0;
const BPM_MAX: f32 = 120.0;
/// Chance per update that the monitor freezes
const STUCK_CHANCE: f64 = 0.05;

/// Paged image viewer
#[derive(Debug, Clone, PartialEq)]
pub struct Gallery {
    images: Vec<String>,
    index: usize,
}

impl Gallery {
    pub fn new(images: Vec<String>) -> Self {
        Self { images, index: 0 }
    }

    pub fn current(&self) -> Option<&str> {
        self.images.get(self.index).map(String::as_str)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn next(&mut self) {
        if !self.images.is_empty() {
            self.index = (self.index + 1) % self.images.len();
        }
    }

    pub fn prev(&mut self) {
        if !self.images.is_empty() {
            self.index = self.index.checked_sub(1).unwrap_or(self.images.len() - 1);
        }
    }
}

/// Wandering heart-rate display that occasionally freezes
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    pub bpm: f32,
    /// Remaining seconds frozen
    stuck_for: f32,
    since_update: f32,
    /// Seconds into the current beat
    beat_clock: f32,
    trace: Vec<f32>,
    rng: Pcg32,
}

impl HeartbeatMonitor {
    pub fn new(seed: u64) -> Self {
        Self {
            bpm: 80.0,
            stuck_for: 0.0,
            since_update: 0.0,
            beat_clock: 0.0,
            trace: vec![0.5; TRACE_LENGTH],
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn is_stuck(&self) -> bool {
        self.stuck_for > 0.0
    }

    /// Newest sample last, values in [0, 1]
    pub fn trace(&self) -> &[f32] {
        &self.trace
    }

    pub fn tick(&mut self, dt: f32) {
        if self.stuck_for > 0.0 {
            self.stuck_for = (self.stuck_for - dt).max(0.0);
        }

        self.since_update += dt;
        while self.since_update >= HEARTBEAT_UPDATE {
            self.since_update -= HEARTBEAT_UPDATE;
            if self.rng.random_bool(STUCK_CHANCE) {
                self.stuck_for = self.rng.random_range(1.0..3.0);
            }
            if !self.is_stuck() {
                let change = (self.rng.random::<f32>() - 0.5) * 20.0;
                self.bpm = (self.bpm + change).clamp(BPM_MIN, BPM_MAX);
            }
        }

        let sample = if self.is_stuck() {
            // Flatline while frozen
            0.5
        } else {
            let period = 60.0 / self.bpm;
            self.beat_clock = (self.beat_clock + dt) % period;
            let t = self.beat_clock / period;
            // Sharp QRS spike early in the beat, small T wave after
            if t < 0.04 {
                0.5 - t / 0.04 * 0.4
            } else if t < 0.08 {
                0.1 + (t - 0.04) / 0.04 * 0.6
            } else if t < 0.3 {
                0.5 + ((t - 0.08) / 0.22 * std::f32::consts::PI).sin() * 0.08
            } else {
                0.5
            }
        };
        self.trace.remove(0);
        self.trace.push(sample);
    }
}

#[derive(Debug, Clone)]
pub enum PanelContent {
    Text,
    Gallery(Gallery),
    /// Monitor with an image strip paged beside it
    Heartbeat {
        monitor: HeartbeatMonitor,
        strip: Gallery,
    },
}

/// An open detail view
#[derive(Debug, Clone)]
pub struct ModalPanel {
    pub id: String,
    pub name: String,
    pub content: PanelContent,
}

impl ModalPanel {
    pub fn open(modal: &ModalConfig) -> Self {
        let content = match modal.panel {
            PanelKind::Text => PanelContent::Text,
            PanelKind::Gallery => PanelContent::Gallery(Gallery::new(modal.images.clone())),
            PanelKind::Heartbeat => PanelContent::Heartbeat {
                monitor: HeartbeatMonitor::new(seed_for(&modal.id)),
                strip: Gallery::new(modal.images.clone()),
            },
        };
        log::info!("Opened panel {} ({})", modal.id, modal.name);
        Self {
            id: modal.id.clone(),
            name: modal.name.clone(),
            content,
        }
    }

    pub fn tick(&mut self, dt: f32) {
        if let PanelContent::Heartbeat { monitor, .. } = &mut self.content {
            monitor.tick(dt);
        }
    }

    fn pages(&mut self) -> Option<&mut Gallery> {
        match &mut self.content {
            PanelContent::Text => None,
            PanelContent::Gallery(gallery) => Some(gallery),
            PanelContent::Heartbeat { strip, .. } => Some(strip),
        }
    }

    pub fn next_page(&mut self) {
        if let Some(gallery) = self.pages() {
            gallery.next();
        }
    }

    pub fn prev_page(&mut self) {
        if let Some(gallery) = self.pages() {
            gallery.prev();
        }
    }
}

/// Stable per-id seed (FNV-1a)
fn seed_for(id: &str) -> u64 {
    id.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gallery_wraps() {
        let mut g = Gallery::new(vec!["a".into(), "b".into(), "c".into()]);
        g.prev();
        assert_eq!(g.current(), Some("c"));
        g.next();
        assert_eq!(g.current(), Some("a"));
        g.next();
        g.next();
        g.next();
        assert_eq!(g.index(), 0);
    }

    #[test]
    fn test_empty_gallery_is_noop() {
        let mut g = Gallery::new(Vec::new());
        g.next();
        g.prev();
        assert_eq!(g.current(), None);
        assert_eq!(g.index(), 0);
    }

    #[test]
    fn test_heartbeat_stays_in_range() {
        let mut monitor = HeartbeatMonitor::new(11);
        let mut saw_stuck = false;
        for _ in 0..60 * 120 {
            monitor.tick(1.0 / 60.0);
            assert!((BPM_MIN..=BPM_MAX).contains(&monitor.bpm));
            saw_stuck |= monitor.is_stuck();
        }
        assert!(saw_stuck, "two minutes without a freeze");
        assert_eq!(monitor.trace().len(), TRACE_LENGTH);
    }

    #[test]
    fn test_bpm_frozen_while_stuck() {
        let mut monitor = HeartbeatMonitor::new(3);
        monitor.stuck_for = 2.0;
        let bpm = monitor.bpm;
        for _ in 0..60 {
            monitor.tick(1.0 / 60.0);
        }
        // One second in, still frozen
        assert_eq!(monitor.bpm, bpm);
    }

    #[test]
    fn test_open_uses_catalog_kind() {
        let catalog = crate::config::ModalCatalog::builtin().unwrap();
        let gallery = ModalPanel::open(catalog.get("modal5").unwrap());
        assert!(matches!(gallery.content, PanelContent::Gallery(ref g) if g.len() == 3));
        let heart = ModalPanel::open(catalog.get("modal1").unwrap());
        assert!(matches!(heart.content, PanelContent::Heartbeat { ref strip, .. } if strip.len() == 3));
        let sleeper = ModalPanel::open(catalog.get("modal2").unwrap());
        assert!(matches!(sleeper.content, PanelContent::Gallery(_)));
        let text = ModalPanel::open(catalog.get("modal3").unwrap());
        assert!(matches!(text.content, PanelContent::Text));
    }

    #[test]
    fn test_heartbeat_strip_pages() {
        let catalog = crate::config::ModalCatalog::builtin().unwrap();
        let mut panel = ModalPanel::open(catalog.get("modal1").unwrap());
        panel.prev_page();
        panel.tick(0.6);
        let PanelContent::Heartbeat { strip, monitor } = &panel.content else {
            panic!("modal1 is a heartbeat panel");
        };
        assert_eq!(strip.current(), Some("/iron/3.jpg"));
        assert_eq!(monitor.trace().len(), TRACE_LENGTH);
    }
}
