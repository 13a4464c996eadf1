use std::{fs, path::Path};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{error::Result, model::ChannelStyle};

const KNOWN_FORMATS: [&str; 2] = ["mcd", "txt"];

/// Settings of the controller. Every field is optional when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Style given to a channel when it is first registered
    pub default_style: ChannelStyle,
    /// Opacity of panorama overlays
    pub panorama_opacity: f32,
    /// List panoramas of type `Default`, which usually carry no image
    pub include_default_panoramas: bool,
    /// Enabled formats, highest priority first
    pub formats: Vec<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            default_style: ChannelStyle::default(),
            panorama_opacity: 0.5,
            include_default_panoramas: false,
            formats: KNOWN_FORMATS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl ViewerConfig {
    /// Load the configuration from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;

        ViewerConfig::from_json(&json)
    }

    /// Parse the configuration from JSON. Out of range values are replaced by valid ones.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ViewerConfig = serde_json::from_str(json)?;

        Ok(config.sanitize())
    }

    /// Clamp values into their valid ranges and drop unknown formats
    pub fn sanitize(mut self) -> Self {
        self.default_style = self.default_style.sanitize();

        self.panorama_opacity = if self.panorama_opacity.is_finite() {
            self.panorama_opacity.clamp(0.0, 1.0)
        } else {
            0.5
        };

        self.formats.retain(|name| {
            let known = KNOWN_FORMATS.contains(&name.as_str());
            if !known {
                warn!("Ignoring unknown format `{}` in configuration", name);
            }
            known
        });
        self.formats.dedup();

        self
    }
}
