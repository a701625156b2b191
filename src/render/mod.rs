//! Renderer-agnostic draw list
//!
//! `build_scene` turns simulation state into a flat list of shapes; painters
//! (the browser canvas, or tests) consume it without touching the simulation.

#[cfg(target_arch = "wasm32")]
pub mod canvas;

use glam::Vec2;

use crate::config::ModalCatalog;
use crate::consts::{MARKER_EMPHASIS, MARKER_RADIUS};
use crate::session::RevealedSet;
use crate::settings::Settings;
use crate::sim::noise::{marker_pulse, outline_points, pulse, tendril_points};
use crate::sim::Organism;
use crate::to_pixels;

/// Straight-alpha color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// CSS `rgba(...)` string for canvas styles
    pub fn to_css(&self) -> String {
        format!("rgba({}, {}, {}, {:.3})", self.r, self.g, self.b, self.a)
    }
}

/// Organism accent (#FFE600)
pub const ACCENT: Rgba = Rgba::new(255, 230, 0, 1.0);
/// Unrevealed marker gray
pub const NEUTRAL: Rgba = Rgba::new(150, 150, 150, 0.8);
/// Page background (#0A0A0A)
pub const BACKGROUND: Rgba = Rgba::new(10, 10, 10, 1.0);

/// A single drawing primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Radial gradient from `color` at the center to transparent at `radius`
    Glow { center: Vec2, radius: f32, color: Rgba },
    /// Solid circle
    Disc { center: Vec2, radius: f32, color: Rgba },
    /// Solid closed polygon
    Fill { points: Vec<Vec2>, color: Rgba },
    /// Open polyline with round caps
    Stroke { points: Vec<Vec2>, width: f32, color: Rgba },
}

/// Everything to draw for one frame, back to front
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub size: Vec2,
    pub shapes: Vec<Shape>,
}

impl Scene {
    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }
}

/// Build the frame: tendrils, then blobs, then modal markers on top
pub fn build_scene(
    organism: &Organism,
    catalog: &ModalCatalog,
    revealed: &RevealedSet,
    pending: Option<&str>,
    settings: &Settings,
) -> Scene {
    let mut scene = Scene {
        size: organism.viewport,
        shapes: Vec::new(),
    };
    let time = organism.time;
    let quality = settings.quality;
    let center = organism.center();

    // Tissue between the center and every traveler
    for blob in organism.travelers() {
        if blob.pos.distance(center.pos) <= center.radius * 0.5 {
            continue;
        }
        let points = tendril_points(
            center.pos,
            blob.pos,
            time,
            blob.seed,
            settings.sway_scale(),
            quality.tendril_segments(),
        );
        scene.push(Shape::Stroke {
            points: points.clone(),
            width: 10.0,
            color: ACCENT.with_alpha(0.25),
        });
        scene.push(Shape::Stroke {
            points,
            width: 4.0,
            color: ACCENT.with_alpha(0.8),
        });
    }

    for blob in &organism.blobs {
        let radius = (blob.radius * pulse(blob.phase)).max(1.0);
        scene.push(Shape::Glow {
            center: blob.pos,
            radius: radius * 2.0,
            color: ACCENT.with_alpha(0.9),
        });
        scene.push(Shape::Fill {
            points: outline_points(
                blob.pos,
                radius * 0.6,
                time,
                blob.seed,
                quality.outline_harmonics(),
                quality.outline_samples(),
            ),
            color: ACCENT,
        });
    }

    for modal in catalog.iter() {
        let pos = to_pixels(modal.anchor(), organism.viewport);
        let is_revealed = revealed.contains(&modal.id);
        let is_pending = pending == Some(modal.id.as_str());

        let mut radius = MARKER_RADIUS * marker_pulse(time, modal.anchor());
        if is_pending {
            radius *= MARKER_EMPHASIS;
        }
        let (glow, core) = if is_revealed {
            (ACCENT.with_alpha(0.6), ACCENT)
        } else if is_pending {
            (NEUTRAL.with_alpha(0.75), NEUTRAL.with_alpha(1.0))
        } else {
            (NEUTRAL.with_alpha(0.5), NEUTRAL)
        };

        scene.push(Shape::Glow {
            center: pos,
            radius: (radius * 3.0).max(1.0),
            color: glow,
        });
        scene.push(Shape::Disc {
            center: pos,
            radius: radius.max(1.0),
            color: core,
        });
    }

    scene
}
