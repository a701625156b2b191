//! Object detection records and the shared model service
//!
//! The model itself runs outside the simulation (in the browser, an async
//! JS inference call). Modules only ever see `Detection` lists pushed back
//! in, and ask the service for another pass at their own cadence.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::games::GameError;

/// Axis-aligned box in camera-frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f32; 4]) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Flip horizontally within a frame `frame_width` wide
    pub fn mirrored(&self, frame_width: f32) -> Self {
        Self {
            x: frame_width - self.x - self.width,
            ..*self
        }
    }

    /// Grow on every side by `pad`
    pub fn padded(&self, pad: f32) -> Self {
        Self {
            x: self.x - pad,
            y: self.y - pad,
            width: self.width + pad * 2.0,
            height: self.height + pad * 2.0,
        }
    }

    /// Inclusive on all edges
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// One labelled box from the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub label: String,
    pub score: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: &str, score: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.to_string(),
            score,
            bbox,
        }
    }
}

/// Boxes labelled `person` scoring strictly above `min_score`
pub fn people(detections: &[Detection], min_score: f32) -> Vec<BoundingBox> {
    detections
        .iter()
        .filter(|d| d.label == "person" && d.score > min_score)
        .map(|d| d.bbox)
        .collect()
}

/// Parse a detector result list (`[{class, score, bbox: [x, y, w, h]}]`)
pub fn parse_detections(json: &str) -> Result<Vec<Detection>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Backend that can run one inference pass on the current camera frame
pub trait DetectionModel {
    fn name(&self) -> &str;

    /// Start one pass. Results come back through the installation.
    fn request(&mut self);

    /// Whether inference can run yet. Backends that load asynchronously
    /// report false until their weights arrive.
    fn is_ready(&self) -> bool {
        true
    }

    fn dispose(&mut self) {}
}

pub type ModelLoader = Box<dyn FnMut() -> Result<Box<dyn DetectionModel>, GameError>>;

/// Lazily loaded detection model, shared by every module that needs one.
///
/// Created on first use and disposed explicitly at teardown; modules borrow
/// it from their owner instead of reaching for global state.
pub struct ModelService {
    loader: ModelLoader,
    model: Option<Box<dyn DetectionModel>>,
    loads: u32,
}

impl ModelService {
    pub fn new(loader: ModelLoader) -> Self {
        Self {
            loader,
            model: None,
            loads: 0,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Number of successful loads over the service's lifetime
    pub fn loads(&self) -> u32 {
        self.loads
    }

    pub fn get_or_load(&mut self) -> Result<&mut dyn DetectionModel, GameError> {
        if self.model.is_none() {
            let model = (self.loader)().inspect_err(|e| {
                log::warn!("Detection model failed to load: {}", e);
            })?;
            log::info!("Detection model {} loaded", model.name());
            self.loads += 1;
            self.model = Some(model);
        }
        match self.model.as_deref_mut() {
            Some(model) => Ok(model),
            None => Err(GameError::ModelLoad("model missing after load".into())),
        }
    }

    pub fn dispose(&mut self) {
        if let Some(mut model) = self.model.take() {
            log::info!("Disposing detection model {}", model.name());
            model.dispose();
        }
    }
}

impl Drop for ModelService {
    fn drop(&mut self) {
        self.dispose();
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coco_shape() {
        let json = r#"[
            {"class": "person", "score": 0.91, "bbox": [10, 20, 100, 200]},
            {"class": "cup", "score": 0.99, "bbox": [0, 0, 5, 5]},
            {"class": "person", "score": 0.4, "bbox": [300, 0, 50, 50]}
        ]"#;
        let dets = parse_detections(json).unwrap();
        assert_eq!(dets.len(), 3);
        assert_eq!(dets[0].bbox, BoundingBox::new(10.0, 20.0, 100.0, 200.0));

        let bodies = people(&dets, 0.5);
        assert_eq!(bodies, vec![BoundingBox::new(10.0, 20.0, 100.0, 200.0)]);
    }

    #[test]
    fn test_score_threshold_is_exclusive() {
        let dets = vec![Detection::new("person", 0.5, BoundingBox::new(0.0, 0.0, 1.0, 1.0))];
        assert!(people(&dets, 0.5).is_empty());
    }

    #[test]
    fn test_mirror_and_pad() {
        let b = BoundingBox::new(40.0, 10.0, 100.0, 50.0);
        let m = b.mirrored(640.0);
        assert_eq!(m.x, 500.0);
        assert_eq!(m.mirrored(640.0), b);

        let p = b.padded(10.0);
        assert!(p.contains(Vec2::new(31.0, 5.0)));
        assert!(!b.contains(Vec2::new(31.0, 5.0)));
    }

    #[test]
    fn test_service_loads_once() {
        let (mut service, requests, disposed) = fake::service();
        assert!(!service.is_loaded());
        service.get_or_load().unwrap().request();
        service.get_or_load().unwrap().request();
        assert_eq!(service.loads(), 1);
        assert_eq!(requests.get(), 2);

        service.dispose();
        assert!(!service.is_loaded());
        assert_eq!(disposed.get(), 1);

        // Recreated on next use
        service.get_or_load().unwrap();
        assert_eq!(service.loads(), 2);
        drop(service);
        assert_eq!(disposed.get(), 2);
    }

    #[test]
    fn test_load_failure_surfaces() {
        let mut service = fake::failing();
        assert!(matches!(service.get_or_load(), Err(GameError::ModelLoad(_))));
        assert!(!service.is_loaded());
    }
}
