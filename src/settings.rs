//! Installation settings and preferences
//!
//! Persisted in LocalStorage on the web; defaults natively.

use serde::{Deserialize, Serialize};

use crate::consts::TRAVEL_JITTER;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    /// Cycle Low -> Medium -> High -> Low
    pub fn next(self) -> Self {
        match self {
            QualityPreset::Low => QualityPreset::Medium,
            QualityPreset::Medium => QualityPreset::High,
            QualityPreset::High => QualityPreset::Low,
        }
    }

    /// Points sampled around each blob outline
    pub fn outline_samples(&self) -> usize {
        match self {
            QualityPreset::Low => 32,
            QualityPreset::Medium => 64,
            QualityPreset::High => 96,
        }
    }

    /// Sinusoid terms summed into the outline noise
    pub fn outline_harmonics(&self) -> u32 {
        match self {
            QualityPreset::Low => 2,
            QualityPreset::Medium => 3,
            QualityPreset::High => 4,
        }
    }

    /// Segments per tendril stroke
    pub fn tendril_segments(&self) -> usize {
        match self {
            QualityPreset::Low => 12,
            QualityPreset::Medium => 24,
            QualityPreset::High => 36,
        }
    }
}

/// Installation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Outline/tendril detail
    pub quality: QualityPreset,
    /// Straight travel, calmer tendrils
    pub reduced_motion: bool,
    /// Show the key hints overlay
    pub show_dev_controls: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,
            reduced_motion: false,
            show_dev_controls: true,
        }
    }
}

impl Settings {
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Sideways wobble per frame while traveling (respects reduced_motion)
    pub fn travel_jitter(&self) -> f32 {
        if self.reduced_motion { 0.0 } else { TRAVEL_JITTER }
    }

    /// Tendril sway multiplier (respects reduced_motion)
    pub fn sway_scale(&self) -> f32 {
        if self.reduced_motion { 0.5 } else { 1.0 }
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "physarum_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match serde_json::from_str(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
