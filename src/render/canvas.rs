//! Browser 2D canvas painter

use std::f64::consts::TAU;

use glam::Vec2;
use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::{BACKGROUND, Rgba, Scene, Shape};

/// Paints a `Scene` onto a 2D context sized to the viewport
pub struct CanvasPainter {
    ctx: CanvasRenderingContext2d,
}

impl CanvasPainter {
    pub fn new(ctx: CanvasRenderingContext2d) -> Self {
        Self { ctx }
    }

    pub fn paint(&self, scene: &Scene) -> Result<(), JsValue> {
        let ctx = &self.ctx;
        ctx.set_fill_style_str(&BACKGROUND.to_css());
        ctx.fill_rect(0.0, 0.0, scene.size.x as f64, scene.size.y as f64);

        for shape in &scene.shapes {
            match shape {
                Shape::Glow {
                    center,
                    radius,
                    color,
                } => self.glow(*center, *radius, *color)?,
                Shape::Disc {
                    center,
                    radius,
                    color,
                } => {
                    ctx.set_fill_style_str(&color.to_css());
                    ctx.begin_path();
                    ctx.arc(center.x as f64, center.y as f64, *radius as f64, 0.0, TAU)?;
                    ctx.fill();
                }
                Shape::Fill { points, color } => {
                    if self.trace(points) {
                        ctx.close_path();
                        ctx.set_fill_style_str(&color.to_css());
                        ctx.fill();
                    }
                }
                Shape::Stroke {
                    points,
                    width,
                    color,
                } => {
                    if self.trace(points) {
                        ctx.set_line_cap("round");
                        ctx.set_line_join("round");
                        ctx.set_line_width(*width as f64);
                        ctx.set_stroke_style_str(&color.to_css());
                        ctx.stroke();
                    }
                }
            }
        }
        Ok(())
    }

    fn glow(&self, center: Vec2, radius: f32, color: Rgba) -> Result<(), JsValue> {
        let ctx = &self.ctx;
        let (x, y, r) = (center.x as f64, center.y as f64, radius.max(1.0) as f64);
        let gradient = ctx.create_radial_gradient(x, y, 0.0, x, y, r)?;
        gradient.add_color_stop(0.0, &color.to_css())?;
        gradient.add_color_stop(0.4, &color.with_alpha(color.a * 0.45).to_css())?;
        gradient.add_color_stop(1.0, &color.with_alpha(0.0).to_css())?;
        ctx.set_fill_style_canvas_gradient(&gradient);
        ctx.begin_path();
        ctx.arc(x, y, r, 0.0, TAU)?;
        ctx.fill();
        Ok(())
    }

    /// Begin a path through `points`; false when there is nothing to draw
    fn trace(&self, points: &[Vec2]) -> bool {
        let Some((first, rest)) = points.split_first() else {
            return false;
        };
        self.ctx.begin_path();
        self.ctx.move_to(first.x as f64, first.y as f64);
        for p in rest {
            self.ctx.line_to(p.x as f64, p.y as f64);
        }
        true
    }
}
