mod chain;
mod geofarm;
mod opencage;
mod tomtom;

use crate::address::Address;
use crate::error::DispatchError;
use crate::provider::{Provider, ProviderKind};

/// Which public operation is being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Forward,
    Reverse,
}

/// Caller-supplied input for the operation in progress.
#[derive(Debug, Clone)]
pub enum GeoInput {
    Forward { query: String },
    Reverse { lat: f64, lng: f64 },
}

/// A pair of pure-ish functions keyed by [`ProviderKind`]: `build_request`
/// shapes the outbound URL; `parse_response` extracts an [`Address`] and, as
/// the one component allowed to, folds quota feedback back onto the
/// provider's runtime counters.
pub trait Adapter: Send + Sync {
    /// `user_id` is only consumed by the Chain adapter (its URL template
    /// embeds the caller's id so the peer can attribute quota correctly);
    /// every other adapter ignores it.
    fn build_request(
        &self,
        op: Operation,
        input: &GeoInput,
        provider: &Provider,
        user_id: &str,
    ) -> String;

    fn parse_response(
        &self,
        body: &str,
        op: Operation,
        provider: &Provider,
        user_id: &str,
    ) -> Result<Address, DispatchError>;
}

pub fn adapter_for(kind: ProviderKind) -> &'static dyn Adapter {
    match kind {
        ProviderKind::GeoFarm => &geofarm::GeoFarmAdapter,
        ProviderKind::Chain => &chain::ChainAdapter,
        ProviderKind::TomTom => &tomtom::TomTomAdapter,
        ProviderKind::OpenCage => &opencage::OpenCageAdapter,
    }
}

/// Generic top-level quota feedback fields a response body may carry,
/// shared by the GeoFarm and OpenCage adapters. The spec leaves individual
/// vendor schemas out of scope beyond "the fields the adapter must extract";
/// this is the minimal shape that satisfies that contract.
pub(crate) fn apply_generic_quota_feedback(value: &serde_json::Value, provider: &Provider) {
    let mut rt = provider.runtime.lock();
    if let Some(max) = value.get("max_requests_per_interval").and_then(|v| v.as_u64()) {
        rt.max_requests_per_interval = max as u32;
    }
    if let Some(cur) = value.get("cur_interval_requests").and_then(|v| v.as_u64()) {
        rt.cur_interval_requests = cur as u32;
    }
}
