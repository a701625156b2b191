//! Static modal catalog
//!
//! Loaded once at startup and immutable for the session. Positions are
//! normalized and scaled against the viewport at render time.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog shipped with the installation
const DEFAULT_CATALOG: &str = include_str!("../assets/modals.json");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid modal catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("modal catalog is empty")]
    Empty,
    #[error("duplicate modal id `{0}`")]
    DuplicateId(String),
    #[error("modal `{id}` position ({x}, {y}) is outside [0, 1]")]
    OutOfRange { id: String, x: f32, y: f32 },
    #[error("unknown modal id `{0}`")]
    UnknownModal(String),
}

/// Content kind of a modal's detail panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    #[default]
    Text,
    Gallery,
    Heartbeat,
}

/// A named, positioned point of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalConfig {
    pub id: String,
    pub name: String,
    /// Normalized horizontal position
    pub x: f32,
    /// Normalized vertical position
    pub y: f32,
    #[serde(default)]
    pub panel: PanelKind,
    /// Asset paths shown by gallery panels
    #[serde(default)]
    pub images: Vec<String>,
}

impl ModalConfig {
    pub fn anchor(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    modals: Vec<ModalConfig>,
}

/// Ordered list of modal descriptors
#[derive(Debug, Clone, PartialEq)]
pub struct ModalCatalog {
    modals: Vec<ModalConfig>,
}

impl ModalCatalog {
    /// Validate and wrap a list of descriptors
    pub fn new(modals: Vec<ModalConfig>) -> Result<Self, ConfigError> {
        if modals.is_empty() {
            return Err(ConfigError::Empty);
        }
        for (i, modal) in modals.iter().enumerate() {
            if modals[..i].iter().any(|m| m.id == modal.id) {
                return Err(ConfigError::DuplicateId(modal.id.clone()));
            }
            let in_range = |v: f32| (0.0..=1.0).contains(&v);
            if !in_range(modal.x) || !in_range(modal.y) {
                return Err(ConfigError::OutOfRange {
                    id: modal.id.clone(),
                    x: modal.x,
                    y: modal.y,
                });
            }
        }
        Ok(Self { modals })
    }

    /// Parse `{ "modals": [...] }`
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.modals)
    }

    /// The catalog bundled with the crate
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(DEFAULT_CATALOG)
    }

    pub fn get(&self, id: &str) -> Option<&ModalConfig> {
        self.modals.iter().find(|m| m.id == id)
    }

    /// Like `get`, but an unknown id is an error
    pub fn require(&self, id: &str) -> Result<&ModalConfig, ConfigError> {
        self.get(id)
            .ok_or_else(|| ConfigError::UnknownModal(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModalConfig> {
        self.modals.iter()
    }

    pub fn len(&self) -> usize {
        self.modals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modals.is_empty()
    }
}
