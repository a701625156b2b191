//! Deterministic organism simulation
//!
//! Owns all blob state and drives travel-then-reveal. Must stay pure:
//! - Fixed timestep only
//! - Seeded RNG only
//! - No rendering or platform dependencies

pub mod noise;
pub mod state;
pub mod tick;

pub use state::{Blob, BlobState, Organism, OrganismEvent};
pub use tick::tick;
