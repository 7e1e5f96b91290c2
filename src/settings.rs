//! Generation settings and the shared settings store
//!
//! The settings travel with every remote call. Their serde shape is the
//! wire format the proxy endpoint expects (`aspectRatio`, `globalColorPalette`).

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Settings parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown aspect ratio: {0}")]
    UnknownAspectRatio(String),
}

/// Image model tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelType {
    #[default]
    #[serde(rename = "gemini-2.5-flash-image")]
    Flash,
    #[serde(rename = "gemini-3-pro-image-preview")]
    Pro,
}

impl ModelType {
    /// Remote model identifier
    pub fn id(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash-image",
            Self::Pro => "gemini-3-pro-image-preview",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for ModelType {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flash" | "fast" | "gemini-2.5-flash-image" => Ok(Self::Flash),
            "pro" | "gemini-3-pro-image-preview" => Ok(Self::Pro),
            _ => Err(SettingsError::UnknownModel(s.to_string())),
        }
    }
}

/// Target aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "21:9")]
    Cinematic,
    #[serde(rename = "4:3")]
    Classic,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Cinematic => "21:9",
            Self::Classic => "4:3",
        }
    }

    /// Ratio actually requested from the image service.
    /// The service has no 21:9 output, so cinematic falls back to 16:9.
    pub fn effective(&self) -> AspectRatio {
        match self {
            Self::Cinematic => Self::Landscape,
            other => *other,
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1:1" | "square" => Ok(Self::Square),
            "16:9" | "landscape" => Ok(Self::Landscape),
            "9:16" | "portrait" => Ok(Self::Portrait),
            "21:9" | "cinematic" => Ok(Self::Cinematic),
            "4:3" | "classic" => Ok(Self::Classic),
            _ => Err(SettingsError::UnknownAspectRatio(s.to_string())),
        }
    }
}

/// Generation configuration applied to every frame of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    #[serde(default)]
    pub model: ModelType,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Theme / mood, free text
    #[serde(default)]
    pub theme: String,
    /// Genre / context, free text
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub global_color_palette: String,
}

/// Shared container for the current settings.
///
/// Clones share the same underlying value. A run reads one snapshot at
/// start and is unaffected by later `set`/`update` calls.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    inner: Arc<RwLock<GenerationSettings>>,
}

impl SettingsStore {
    pub fn new(settings: GenerationSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Snapshot of the current settings
    pub fn get(&self) -> GenerationSettings {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set(&self, settings: GenerationSettings) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut GenerationSettings),
    {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }
}
