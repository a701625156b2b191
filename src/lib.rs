//! Physarum - a generative organism that grows toward hidden panels
//!
//! Core modules:
//! - `sim`: Deterministic organism simulation (blobs, travel, reveal timing)
//! - `games`: Mini-game state machines fed by camera/microphone samples
//! - `session`: Root page state (revealed set, pending target, open panel)
//! - `render`: Renderer-agnostic draw list plus the canvas painter
//! - `proxy`: Choreographer prompt proxy (native only)

pub mod config;
pub mod detect;
pub mod games;
pub mod installation;
pub mod panel;
#[cfg(not(target_arch = "wasm32"))]
pub mod proxy;
pub mod render;
pub mod schedule;
pub mod session;
pub mod settings;
pub mod sim;

pub use config::{ConfigError, ModalCatalog, ModalConfig};
pub use installation::Installation;
pub use session::{RevealedSet, Session, SessionError};
pub use settings::{QualityPreset, Settings};

use glam::Vec2;

/// Animation and game constants
pub mod consts {
    /// Simulation step (one animation frame at 60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Center organism radius (pixels)
    pub const CENTER_RADIUS: f32 = 80.0;
    /// Radius of a blob spawned toward a target
    pub const TRAVELER_RADIUS: f32 = 32.0;
    /// Distance advanced per frame while traveling
    pub const TRAVEL_STEP: f32 = 2.5;
    /// Below this distance a traveler stops advancing
    pub const TRAVEL_EPSILON: f32 = 5.0;
    /// Distance at which a traveler counts as arrived
    pub const ARRIVAL_RADIUS: f32 = 30.0;
    /// Sideways wobble amplitude while traveling (pixels/frame)
    pub const TRAVEL_JITTER: f32 = 0.6;
    /// Delay between arrival and the reveal callback (seconds)
    pub const REVEAL_DELAY: f32 = 0.5;
    /// Pulse phase advance per frame
    pub const PHASE_STEP: f32 = 0.02;

    /// Modal marker base radius
    pub const MARKER_RADIUS: f32 = 6.0;
    /// Pending target marker scale
    pub const MARKER_EMPHASIS: f32 = 1.5;

    /// Module result is shown this long before the explanation appears
    pub const EXPLANATION_DELAY: f32 = 0.5;
    /// Module result is shown this long before completion is delivered
    pub const COMPLETION_DELAY: f32 = 3.0;

    /// Highest modal index a mini-game may select
    pub const MAX_MODAL_INDEX: u32 = 8;
}

/// Build the configured id for a modal index (`modal1`..`modal8`)
#[inline]
pub fn modal_id(index: u32) -> String {
    format!("modal{}", index)
}

/// Scale a normalized [0,1] anchor to viewport pixels
#[inline]
pub fn to_pixels(anchor: Vec2, viewport: Vec2) -> Vec2 {
    anchor * viewport
}
