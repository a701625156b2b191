//! Fixed timestep organism tick
//!
//! Advances travelers, flags arrivals and counts down reveal delays.

use glam::Vec2;

use super::state::{BlobState, Organism, OrganismEvent, PendingReveal};
use crate::consts::*;

/// Advance the organism by one fixed timestep.
///
/// `jitter` is the sideways wobble amplitude per frame (0 for straight travel).
pub fn tick(organism: &mut Organism, dt: f32, jitter: f32) {
    organism.time_ticks += 1;
    organism.time += dt;

    // Frames represented by this step (1.0 at SIM_DT)
    let frames = dt / SIM_DT;
    let time = organism.time;
    let viewport = organism.viewport;
    let mut arrivals: Vec<String> = Vec::new();

    for blob in &mut organism.blobs {
        blob.phase += PHASE_STEP * frames;

        if blob.state != BlobState::Traveling {
            continue;
        }
        let Some(target) = blob.target(viewport) else {
            continue;
        };

        let delta = target - blob.pos;
        let dist = delta.length();
        if dist > TRAVEL_EPSILON {
            let dir = delta / dist;
            let sideways = Vec2::new(-dir.y, dir.x);
            let wobble = (time * 3.0 + blob.seed).sin() * jitter;
            let step = (TRAVEL_STEP * frames).min(dist);
            blob.pos += dir * step + sideways * wobble * frames;
        }

        if blob.pos.distance(target) < ARRIVAL_RADIUS {
            // One-way: an arrived blob never travels again
            blob.state = BlobState::Arrived;
            if let Some(id) = blob.target_id.clone() {
                arrivals.push(id);
            }
        }
    }

    for id in arrivals {
        log::info!("Organism reached {}", id);
        organism.pending_reveals.push(PendingReveal {
            modal_id: id.clone(),
            remaining: REVEAL_DELAY,
        });
        organism.push_event(OrganismEvent::Arrived(id));
    }

    let mut due: Vec<String> = Vec::new();
    organism.pending_reveals.retain_mut(|reveal| {
        reveal.remaining -= dt;
        if reveal.remaining <= 0.0 {
            due.push(reveal.modal_id.clone());
            false
        } else {
            true
        }
    });
    for id in due {
        organism.push_event(OrganismEvent::Reveal(id));
    }
}
