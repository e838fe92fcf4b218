//! Detector selection persisted as JSON.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::detector::DetectorKind;
use crate::error::Result;

/// Settings value that turns a detector kind off.
pub const DISABLED: &str = "disabled";

pub const DEFAULT_PUPIL_DETECTOR: &str = "Pupil Core";

const SETTINGS_FILE: &str = "settings.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetectorChoice {
    Disabled,
    Named(String),
}

impl DetectorChoice {
    fn from_setting(value: &str) -> Self {
        if value == DISABLED {
            DetectorChoice::Disabled
        } else {
            DetectorChoice::Named(value.to_owned())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pupil_detector: String,
    pub iris_detector: String,
    pub eyelid_detector: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pupil_detector: DEFAULT_PUPIL_DETECTOR.to_owned(),
            iris_detector: DISABLED.to_owned(),
            eyelid_detector: DISABLED.to_owned(),
        }
    }
}

impl Settings {
    /// Missing file means defaults; missing keys fall back individually.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("saved settings to {}", path.display());
        Ok(())
    }

    /// `<config dir>/eye-annotate/settings.json`, or the working directory
    /// when the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join(env!("CARGO_PKG_NAME")).join(SETTINGS_FILE))
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
    }

    pub fn detector(&self, kind: DetectorKind) -> DetectorChoice {
        DetectorChoice::from_setting(self.value(kind))
    }

    pub fn value(&self, kind: DetectorKind) -> &str {
        match kind {
            DetectorKind::Pupil => &self.pupil_detector,
            DetectorKind::Iris => &self.iris_detector,
            DetectorKind::Eyelid => &self.eyelid_detector,
        }
    }

    pub fn set_detector(&mut self, kind: DetectorKind, choice: DetectorChoice) {
        let value = match choice {
            DetectorChoice::Disabled => DISABLED.to_owned(),
            DetectorChoice::Named(name) => name,
        };
        match kind {
            DetectorKind::Pupil => self.pupil_detector = value,
            DetectorKind::Iris => self.iris_detector = value,
            DetectorKind::Eyelid => self.eyelid_detector = value,
        }
    }
}
