use std::path::PathBuf;
use std::sync::Arc;

use crate::address::Address;
use crate::adapters::{GeoInput, Operation};
use crate::dispatcher::{self, DispatchOutcome};
use crate::error::{ApiError, PersistenceError};
use crate::persistence;
use crate::provider::Provider;
use crate::registry::{QuotaSnapshot, RegistryState};
use crate::upstream::UpstreamClient;

/// The crate's single public entry point: owns the registry and the
/// upstream HTTP client, and exposes Forward/Reverse (C7).
pub struct GeoRouter {
    state: Arc<RegistryState>,
    upstream: UpstreamClient,
    data_dir: PathBuf,
}

pub struct GeoResult {
    pub address: Address,
    pub provider_name: Option<String>,
    pub error: Option<ApiError>,
    pub quota: QuotaSnapshot,
}

impl From<DispatchOutcome> for GeoResult {
    fn from(o: DispatchOutcome) -> Self {
        Self {
            address: o.address,
            provider_name: o.provider_name,
            error: o.error,
            quota: o.quota,
        }
    }
}

impl GeoRouter {
    pub fn load(data_dir: PathBuf) -> Result<Self, PersistenceError> {
        let providers = persistence::load(&data_dir)?;
        Ok(Self {
            state: Arc::new(RegistryState::new(providers)),
            upstream: UpstreamClient::new(),
            data_dir,
        })
    }

    pub fn registry(&self) -> Arc<RegistryState> {
        Arc::clone(&self.state)
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub async fn forward(&self, query: String, user_id: &str, dont_chain: bool) -> GeoResult {
        let outcome = dispatcher::dispatch(
            &self.state,
            &self.upstream,
            Operation::Forward,
            GeoInput::Forward { query },
            user_id,
            dont_chain,
        )
        .await;
        outcome.into()
    }

    pub async fn reverse(
        &self,
        lat: f64,
        lng: f64,
        user_id: &str,
        dont_chain: bool,
    ) -> GeoResult {
        let outcome = dispatcher::dispatch(
            &self.state,
            &self.upstream,
            Operation::Reverse,
            GeoInput::Reverse { lat, lng },
            user_id,
            dont_chain,
        )
        .await;
        outcome.into()
    }

    /// Forced save followed by a full reload from `Providers.json` +
    /// `AutoSavedProviders.json`.
    pub async fn reparse_chain(&mut self) -> Result<(), PersistenceError> {
        let _guard = self.state.dispatch_lock.lock().await;
        persistence::save(&self.data_dir, &self.state, true)?;
        let providers: Vec<Arc<Provider>> = persistence::reparse_chain(&self.data_dir)?;
        self.state = Arc::new(RegistryState::new(providers));
        Ok(())
    }

    /// Force-saves on shutdown, per spec.md §4.6.
    pub fn shutdown_save(&self) -> Result<(), PersistenceError> {
        persistence::save(&self.data_dir, &self.state, true)?;
        Ok(())
    }

    pub fn spawn_autosave_ticker(&self) -> tokio::task::JoinHandle<()> {
        let dir = self.data_dir.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(persistence::run_autosave_ticker(dir, state))
    }
}
