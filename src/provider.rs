use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Tag selecting which [`crate::adapters::Adapter`] handles a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProviderKind {
    GeoFarm,
    Chain,
    TomTom,
    OpenCage,
}

impl TryFrom<u8> for ProviderKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(ProviderKind::GeoFarm),
            2 => Ok(ProviderKind::Chain),
            3 => Ok(ProviderKind::TomTom),
            4 => Ok(ProviderKind::OpenCage),
            other => Err(other),
        }
    }
}

impl From<ProviderKind> for u8 {
    fn from(value: ProviderKind) -> Self {
        match value {
            ProviderKind::GeoFarm => 1,
            ProviderKind::Chain => 2,
            ProviderKind::TomTom => 3,
            ProviderKind::OpenCage => 4,
        }
    }
}

/// Operator-set configuration for one upstream, as read from `Providers.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind_code: u8,
    pub uri: String,
    #[serde(default)]
    pub key1: String,
    #[serde(default)]
    pub key2: String,
    #[serde(default)]
    pub key3: String,
    #[serde(default)]
    pub key4: String,
    pub interval_size_in_days: u32,
    pub time_between_requests: u64,
    pub priority: i32,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub chaining_forbidden: bool,
    #[serde(default)]
    pub max_requests_per_user_and_day: u32,
}

impl ProviderConfig {
    pub fn kind(&self) -> Result<ProviderKind, u8> {
        ProviderKind::try_from(self.kind_code)
    }
}

/// Counters mutated by the core as requests are served. Matched onto the
/// static config by `name` when loading `AutoSavedProviders.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRuntime {
    pub name: String,
    #[serde(default)]
    pub max_requests_per_interval: u32,
    #[serde(default)]
    pub cur_interval_requests: u32,
    #[serde(default)]
    pub first_interval_request: u64,
    #[serde(default)]
    pub last_request_time: u64,
    #[serde(default)]
    pub next_allowed_request_time: u64,
    #[serde(default)]
    pub users_to_req_count: HashMap<String, u32>,
}

/// One upstream geocoder: immutable identity + config, mutable runtime state
/// behind its own lock so the autosave ticker and `reparseChain` can read it
/// without blocking a request in flight.
pub struct Provider {
    pub name: String,
    pub config: ProviderConfig,
    pub runtime: Mutex<ProviderRuntime>,
}

impl Provider {
    pub fn new(config: ProviderConfig, runtime: ProviderRuntime) -> Self {
        Self {
            name: config.name.clone(),
            config,
            runtime: Mutex::new(runtime),
        }
    }

    pub fn interval_nanos(&self) -> u64 {
        let days = self.config.interval_size_in_days.max(1) as u64;
        days * 24 * 60 * 60 * 1_000_000_000
    }
}

/// Wall-clock nanoseconds since the epoch, as the spec's pseudocode assumes.
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_nanos() as u64
}
