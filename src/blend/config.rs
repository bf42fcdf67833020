use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::AudioFeature;

/// Which selection policy runs after the always-include stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendStyle {
    /// Only tracks both users already have
    Classic,
    /// Shared recents, then heavy discovery, then anything left
    Wild,
    /// Shared recents, shared artists, discovery, capped diversity fill
    #[default]
    Creative,
}

/// Configuration for a single blend run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlendConfig {
    pub blend_style: BlendStyle,
    pub discovery_percent: u32, // 0..=100, share of the playlist requested as recommendations
    pub playlist_length: usize,
    pub sources: Sources,
    pub weighting: Weighting,
    pub audio_features: AudioFeatureMatch,
}

/// Which pools feed the aggregated candidate list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sources {
    pub short_term: bool,
    pub medium_term: bool,
    pub long_term: bool,
    pub liked_songs: bool,
    pub saved_album_tracks: bool,
    pub playlist_tracks: bool,
    pub new_release_tracks: bool,
}

/// Optional reordering of candidates before selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Weighting {
    pub play_count: bool,
    pub recency: bool,
}

/// Optional narrowing of candidates to the typical audio profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFeatureMatch {
    pub enabled: bool,
    #[serde(rename = "match")]
    pub features: Vec<AudioFeature>,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            short_term: true,
            medium_term: true,
            long_term: true,
            liked_songs: true,
            saved_album_tracks: true,
            playlist_tracks: true,
            new_release_tracks: true,
        }
    }
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            blend_style: BlendStyle::Creative,
            discovery_percent: 20,
            playlist_length: 50,
            sources: Sources::default(),
            weighting: Weighting::default(),
            audio_features: AudioFeatureMatch::default(),
        }
    }
}

impl Weighting {
    pub fn is_enabled(&self) -> bool {
        self.play_count || self.recency
    }
}

impl AudioFeatureMatch {
    pub fn is_active(&self) -> bool {
        self.enabled && !self.features.is_empty()
    }
}

impl BlendConfig {
    /// Load a blend configuration from a JSON file
    pub fn load_from_file(path: &str) -> Result<BlendConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read blend configuration '{path}'"))?;
        let config: BlendConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse blend configuration '{path}'"))?;
        Ok(config.normalized())
    }

    /// Load a blend configuration, using the defaults when the file does not exist.
    /// An unreadable or malformed file is still an error.
    pub fn load_or_default(path: &str) -> Result<BlendConfig> {
        if !Path::new(path).exists() {
            warn!("Blend configuration '{path}' not found, using defaults");
            return Ok(BlendConfig::default());
        }
        Self::load_from_file(path)
    }

    /// Clamp out-of-range values
    pub fn normalized(mut self) -> Self {
        self.discovery_percent = self.discovery_percent.min(100);
        self
    }

    /// Number of recommendations requested by the discovery stage
    pub fn discovery_limit(&self) -> usize {
        self.playlist_length.saturating_mul(self.discovery_percent as usize) / 100
    }

    /// Upper bound on tracks re-used from recent blends
    pub fn repeat_allowance(&self) -> usize {
        self.playlist_length / 10
    }

    /// Fraction of the playlist, as a bound on the accumulator's length
    pub fn share(&self, fraction: f64) -> f64 {
        self.playlist_length as f64 * fraction
    }
}
