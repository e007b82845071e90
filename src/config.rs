//! Run configuration
//!
//! A run file holds the global parameters, the trader profiles and an
//! optional concurrency limit. Numeric fields are read leniently: numbers or
//! strings with a numeric prefix are accepted and anything else becomes 0, so
//! a half-filled form still produces a runnable configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::types::{GlobalParams, TraderProfile};

/// Worker count used when the host cannot report its parallelism
pub const FALLBACK_CONCURRENCY: usize = 4;

/// Host parallelism, or [`FALLBACK_CONCURRENCY`] if unavailable
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_CONCURRENCY)
}

/// Settings for the run orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum tasks in flight per batch
    pub concurrency_limit: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency(),
        }
    }
}

impl RunnerConfig {
    pub fn with_limit(concurrency_limit: usize) -> Self {
        Self { concurrency_limit }
    }

    /// Batch size actually used; a limit of 0 still makes progress one task at a time
    pub fn batch_size(&self) -> usize {
        self.concurrency_limit.max(1)
    }
}

/// Everything needed to start a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub global: GlobalParams,
    pub profiles: Vec<TraderProfile>,
    #[serde(rename = "concurrencyLimit", skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            global: GlobalParams::default(),
            profiles: vec![TraderProfile::default()],
            concurrency_limit: None,
        }
    }
}

impl SimulationConfig {
    /// Parse a run file from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid run configuration")
    }

    /// Load a run file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config = Self::from_json_str(&json)?;
        info!(
            "Loaded {:?}: {} profiles, {} trades per path",
            path,
            config.profiles.len(),
            config.global.number_of_trades
        );
        Ok(config)
    }

    /// Write this configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config {:?}", path))?;
        Ok(())
    }

    /// Append a default profile with a fresh id, returning its id
    pub fn add_profile(&mut self) -> String {
        let profile = TraderProfile::with_position(self.profiles.len() + 1);
        let id = profile.id.clone();
        self.profiles.push(profile);
        id
    }

    /// Remove every profile with the given id, returning whether any matched
    pub fn remove_profile(&mut self, id: &str) -> bool {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.id != id);
        self.profiles.len() != before
    }

    /// Total paths this configuration will simulate
    pub fn total_paths(&self) -> usize {
        self.profiles
            .iter()
            .fold(0usize, |acc, p| acc.saturating_add(p.path_count))
    }

    pub fn runner_config(&self) -> RunnerConfig {
        match self.concurrency_limit {
            Some(limit) => RunnerConfig::with_limit(limit),
            None => RunnerConfig::default(),
        }
    }
}

/// Serde helpers that coerce malformed numeric input to zero
pub mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    fn parse(raw: Raw) -> f64 {
        match raw {
            Raw::Number(n) => n,
            Raw::Text(s) => leading_number(&s).filter(|n| n.is_finite()).unwrap_or(0.0),
            Raw::Other(_) => 0.0,
        }
    }

    /// Longest numeric prefix after leading whitespace, so `"12abc"` reads as 12
    fn leading_number(text: &str) -> Option<f64> {
        let text = text.trim_start();
        text.char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .rev()
            .find_map(|end| text[..end].parse::<f64>().ok())
    }

    /// Real-valued field; non-numeric input becomes 0
    pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(parse(Raw::deserialize(deserializer)?))
    }

    /// Largest count accepted from a run file
    pub const MAX_COUNT: usize = u32::MAX as usize;

    /// Count field; non-numeric or negative input becomes 0. A fraction
    /// rounds up, since `i < 2.7` admits three iterations. Capped at
    /// [`MAX_COUNT`].
    pub fn count<'de, D>(deserializer: D) -> Result<usize, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = parse(Raw::deserialize(deserializer)?);
        if value > 0.0 {
            Ok((value.ceil() as usize).min(MAX_COUNT))
        } else {
            Ok(0)
        }
    }
}
