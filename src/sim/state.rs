//! Organism state and target acceptance
//!
//! The first blob is the permanent center. Every accepted target spawns a new
//! traveler at the center's position; travelers are never reused or removed.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::config::{ConfigError, ModalCatalog};
use crate::consts::*;
use crate::to_pixels;

/// Lifecycle of a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobState {
    /// The permanent center organism
    Center,
    /// Moving toward its target anchor
    Traveling,
    /// Reached its target; stationary and decorative from now on
    Arrived,
}

/// A renderable, possibly-moving circular region of the organism
#[derive(Debug, Clone)]
pub struct Blob {
    pub id: u32,
    pub pos: Vec2,
    pub radius: f32,
    /// Animation clock driving the pulse
    pub phase: f32,
    /// Per-blob offset so outlines don't pulse in lockstep
    pub seed: f32,
    pub state: BlobState,
    /// Modal this blob grows toward (travelers only)
    pub target_id: Option<String>,
    /// Normalized destination; scaled by the current viewport each tick
    pub anchor: Option<Vec2>,
}

impl Blob {
    pub fn is_moving(&self) -> bool {
        self.state == BlobState::Traveling
    }

    /// Destination in pixels for the given viewport
    pub fn target(&self, viewport: Vec2) -> Option<Vec2> {
        self.anchor.map(|a| to_pixels(a, viewport))
    }
}

/// Reveal scheduled after arrival
#[derive(Debug, Clone)]
pub struct PendingReveal {
    pub modal_id: String,
    pub remaining: f32,
}

/// Events produced by the simulation, drained by the owner
#[derive(Debug, Clone, PartialEq)]
pub enum OrganismEvent {
    /// A traveler spawned toward this modal
    TargetAccepted(String),
    /// A traveler came within the arrival radius
    Arrived(String),
    /// The reveal delay elapsed; the modal should be marked revealed
    Reveal(String),
}

/// Complete organism state
#[derive(Debug, Clone)]
pub struct Organism {
    pub viewport: Vec2,
    /// blobs[0] is the center; the list only grows
    pub blobs: Vec<Blob>,
    pub pending_reveals: Vec<PendingReveal>,
    /// Seconds of simulated time
    pub time: f32,
    pub time_ticks: u64,
    pub(crate) rng: Pcg32,
    /// Last id handed to `set_target`
    last_target: Option<String>,
    /// Accepted while the viewport was unmeasured
    deferred: Option<(String, Vec2)>,
    /// Whether the center has been placed against a real viewport
    measured: bool,
    events: Vec<OrganismEvent>,
    next_id: u32,
}

impl Organism {
    pub fn new(seed: u64, viewport: Vec2) -> Self {
        let mut organism = Self {
            viewport,
            blobs: Vec::new(),
            pending_reveals: Vec::new(),
            time: 0.0,
            time_ticks: 0,
            rng: Pcg32::seed_from_u64(seed),
            last_target: None,
            deferred: None,
            measured: has_area(viewport),
            events: Vec::new(),
            next_id: 0,
        };

        let id = organism.next_blob_id();
        let seed = organism.rng.random_range(0.0..std::f32::consts::TAU);
        organism.blobs.push(Blob {
            id,
            pos: viewport / 2.0,
            radius: CENTER_RADIUS,
            phase: 0.0,
            seed,
            state: BlobState::Center,
            target_id: None,
            anchor: None,
        });

        organism
    }

    fn next_blob_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn center(&self) -> &Blob {
        &self.blobs[0]
    }

    pub fn travelers(&self) -> impl Iterator<Item = &Blob> {
        self.blobs.iter().skip(1)
    }

    /// Id currently being traveled toward, if any traveler is underway
    pub fn active_target(&self) -> Option<&str> {
        self.blobs
            .iter()
            .rev()
            .find(|b| b.is_moving())
            .and_then(|b| b.target_id.as_deref())
    }

    /// Update viewport dimensions.
    ///
    /// The first non-empty measurement re-centers the center blob and
    /// releases any target deferred while the viewport was unknown.
    pub fn set_viewport(&mut self, viewport: Vec2) {
        self.viewport = viewport;
        if !has_area(viewport) {
            return;
        }
        if !self.measured {
            self.measured = true;
            self.blobs[0].pos = viewport / 2.0;
        }
        if let Some((id, anchor)) = self.deferred.take() {
            self.spawn_traveler(id, anchor);
        }
    }

    /// Point the organism at a modal.
    ///
    /// No-op for `None` or for the same id as the previous call. Returns
    /// whether a new target was accepted (spawned now or deferred until the
    /// viewport is measured).
    pub fn set_target(
        &mut self,
        id: Option<&str>,
        catalog: &ModalCatalog,
    ) -> Result<bool, ConfigError> {
        let Some(id) = id else {
            return Ok(false);
        };
        if self.last_target.as_deref() == Some(id) {
            return Ok(false);
        }

        let modal = catalog.require(id)?;
        let anchor = modal.anchor();
        self.last_target = Some(id.to_string());

        if has_area(self.viewport) {
            self.spawn_traveler(id.to_string(), anchor);
        } else {
            log::info!("Viewport not measured yet, deferring target {}", id);
            self.deferred = Some((id.to_string(), anchor));
        }
        Ok(true)
    }

    fn spawn_traveler(&mut self, id: String, anchor: Vec2) {
        let blob_id = self.next_blob_id();
        let seed = self.rng.random_range(0.0..std::f32::consts::TAU);
        let origin = self.blobs[0].pos;

        log::info!(
            "Organism extending toward {} at ({:.0}, {:.0})",
            id,
            anchor.x * self.viewport.x,
            anchor.y * self.viewport.y
        );

        self.blobs.push(Blob {
            id: blob_id,
            pos: origin,
            radius: TRAVELER_RADIUS,
            phase: 0.0,
            seed,
            state: BlobState::Traveling,
            target_id: Some(id.clone()),
            anchor: Some(anchor),
        });
        self.events.push(OrganismEvent::TargetAccepted(id));
    }

    pub(crate) fn push_event(&mut self, event: OrganismEvent) {
        self.events.push(event);
    }

    /// Take all events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<OrganismEvent> {
        std::mem::take(&mut self.events)
    }
}

fn has_area(viewport: Vec2) -> bool {
    viewport.x > 0.0 && viewport.y > 0.0
}
