//! Gate roster loaded from TOML.
//!
//! ```toml
//! [network]
//! frame_ms = 50
//! max_link_secs = 2280
//!
//! [[gates]]
//! name = "earth"
//! address = "26-6-14-31-11-29-0"
//! size = 7
//! glyphs = 39
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gate_core::address::{Address, AddressError, DEFAULT_GLYPH_COUNT, GateSize};
use gate_core::effects::GateEffects;
use gate_core::gate::GateConfig;
use gate_core::network::{GateNetwork, NetworkError};
use gate_core::ring::{DEFAULT_RING_PROFILE, RingProfile};
use serde::Deserialize;
use thiserror::Error;

/// Roster used when no `--config` is given.
pub const DEFAULT_ROSTER: &str = r#"
[network]
frame_ms = 50
max_link_secs = 2280

[[gates]]
name = "earth"
address = "28-26-5-36-11-29-0"
size = 7

[[gates]]
name = "abydos"
address = "26-6-14-31-11-29-0"
size = 7

[[gates]]
name = "chulak"
address = "8-1-22-14-36-19-0"
size = 7
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read roster {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("roster is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("roster lists no gates")]
    Empty,
    #[error("gate `{gate}` has an invalid address: {source}")]
    Address { gate: String, source: AddressError },
    #[error("gate `{gate}` has {size} chevrons; sizes 7, 8 and 9 are supported")]
    Size { gate: String, size: usize },
    #[error("frame_ms must be at least 1")]
    Frame,
    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Roster {
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub gates: Vec<GateEntry>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSettings {
    /// Tick length used when `advance` runs the clock.
    pub frame_ms: u64,
    /// Auto-close deadline for every link; `0` keeps links open.
    pub max_link_secs: Option<u64>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            frame_ms: 50,
            max_link_secs: Some(2280),
        }
    }
}

impl NetworkSettings {
    #[must_use]
    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    #[must_use]
    pub fn max_link(&self) -> Option<Duration> {
        self.max_link_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GateEntry {
    pub name: String,
    pub address: String,
    pub size: usize,
    #[serde(default = "default_glyphs")]
    pub glyphs: u8,
}

fn default_glyphs() -> u8 {
    DEFAULT_GLYPH_COUNT
}

impl GateEntry {
    fn to_config(&self, max_link: Option<Duration>) -> Result<GateConfig, ConfigError> {
        let address = Address::parse(&self.address).map_err(|source| ConfigError::Address {
            gate: self.name.clone(),
            source,
        })?;
        let size = GateSize::from_symbols(self.size).ok_or_else(|| ConfigError::Size {
            gate: self.name.clone(),
            size: self.size,
        })?;
        let ring = RingProfile {
            glyph_count: self.glyphs,
            ..DEFAULT_RING_PROFILE
        };
        Ok(GateConfig::new(self.name.clone(), address, size)
            .with_ring(ring)
            .with_max_link(max_link))
    }
}

impl Roster {
    /// Parses roster text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let roster: Self = toml::from_str(text)?;
        if roster.gates.is_empty() {
            return Err(ConfigError::Empty);
        }
        if roster.network.frame_ms == 0 {
            return Err(ConfigError::Frame);
        }
        Ok(roster)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// The built-in three-gate roster.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_ROSTER)
    }

    /// Registers every gate on a fresh network.
    pub fn build_network<E: GateEffects>(&self, effects: E) -> Result<GateNetwork<E>, ConfigError> {
        let max_link = self.network.max_link();
        let mut network = GateNetwork::new(effects);
        for entry in &self.gates {
            network.add_gate(entry.to_config(max_link)?)?;
        }
        log_roster(self);
        Ok(network)
    }

    /// Gate names in roster order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.gates.iter().map(|gate| gate.name.as_str()).collect()
    }
}

fn log_roster(roster: &Roster) {
    tracing::info!(
        gates = roster.gates.len(),
        frame_ms = roster.network.frame_ms,
        max_link_secs = ?roster.network.max_link_secs,
        "roster loaded"
    );
}
