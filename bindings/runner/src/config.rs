use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

/// A named backend deployment: the coordination API and the object storage that belongs to it.
///
/// Exactly one group is bound per scenario execution, for its entire lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointGroup {
    pub name: String,
    pub api_base_url: Url,
    pub storage_base_url: Url,
}

/// The fixed location sent with every prepare request. Defaults match the deployment the
/// engine was first written against.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub geohash_level: u8,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            lat: 34.70011159734301,
            lon: 137.73557007483018,
            geohash_level: 8,
        }
    }
}

/// Relative weights for picking a flow per iteration in the combined scenario.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioWeights {
    pub upload: u32,
    pub fetch: u32,
}

impl Default for ScenarioWeights {
    fn default() -> Self {
        Self {
            upload: 1,
            fetch: 1,
        }
    }
}

/// The run configuration shared by all pointcloud scenarios.
///
/// Loaded once at process start, validated, then frozen into the runner context. Nothing in
/// here changes for the lifetime of a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    /// The backend deployments to spread load over.
    pub targets: Vec<EndpointGroup>,
    /// Path to the binary sample payload uploaded by the upload flow.
    pub payload: PathBuf,
    /// Geohash keys for the fetch flow to request. Both previously uploaded and never-uploaded
    /// keys are valid candidates.
    #[serde(default)]
    pub geohash_candidates: Vec<String>,
    /// User ids are derived from virtual client identities by rotating over `1..=users`.
    #[serde(default = "default_users")]
    pub users: u32,
    #[serde(default)]
    pub position: Position,
    /// Pause at the end of every scenario execution, in milliseconds. 0 disables the pause.
    #[serde(default)]
    pub cooldown_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub weights: ScenarioWeights,
}

fn default_users() -> u32 {
    3
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            payload: PathBuf::new(),
            geohash_candidates: Vec::new(),
            users: default_users(),
            position: Position::default(),
            cooldown_ms: 0,
            request_timeout_ms: default_request_timeout_ms(),
            weights: ScenarioWeights::default(),
        }
    }
}

impl LoadConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read the load configuration from {}", path.display())
        })?;
        let config: LoadConfig =
            toml::from_str(&raw).context("Failed to parse the load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration problems are fatal, the run must not start with a half-usable setup.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.targets.is_empty() {
            bail!("At least one target must be configured");
        }
        for target in &self.targets {
            if target.name.is_empty() {
                bail!("Every target needs a name");
            }
            if target.api_base_url.cannot_be_a_base() {
                bail!(
                    "api_base_url for target [{}] cannot be used as a base URL",
                    target.name
                );
            }
            if target.storage_base_url.cannot_be_a_base() {
                bail!(
                    "storage_base_url for target [{}] cannot be used as a base URL",
                    target.name
                );
            }
        }
        if self.users == 0 {
            bail!("users must be at least 1");
        }
        if self.weights.upload == 0 && self.weights.fetch == 0 {
            bail!("At least one scenario weight must be non-zero");
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
