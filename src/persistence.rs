use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::PersistenceError;
use crate::provider::{Provider, ProviderConfig, ProviderRuntime};
use crate::registry::RegistryState;

const PROVIDERS_FILE: &str = "Providers.json";
const AUTOSAVE_FILE: &str = "AutoSavedProviders.json";
const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(15);

/// Reads `Providers.json` and, if present, grafts `AutoSavedProviders.json`
/// counters onto the matching static record by `name`. A duplicate name in
/// the autosave file is fatal, per spec.md §4.6.
pub fn load(dir: &Path) -> Result<Vec<Arc<Provider>>, PersistenceError> {
    let static_path = dir.join(PROVIDERS_FILE);
    let raw = std::fs::read_to_string(&static_path)?;
    let configs: Vec<ProviderConfig> = serde_json::from_str(&raw)?;

    let autosave_path = dir.join(AUTOSAVE_FILE);
    let mut saved: HashMap<String, ProviderRuntime> = HashMap::new();
    if autosave_path.exists() {
        let raw = std::fs::read_to_string(&autosave_path)?;
        let runtimes: Vec<ProviderRuntime> = serde_json::from_str(&raw)?;
        for rt in runtimes {
            if saved.insert(rt.name.clone(), rt).is_some() {
                return Err(PersistenceError::DuplicateName(
                    saved.keys().last().cloned().unwrap_or_default(),
                ));
            }
        }
    }

    let providers = configs
        .into_iter()
        .map(|config| {
            let runtime = saved
                .remove(&config.name)
                .unwrap_or_else(|| ProviderRuntime {
                    name: config.name.clone(),
                    ..Default::default()
                });
            Arc::new(Provider::new(config, runtime))
        })
        .collect();

    Ok(providers)
}

/// Atomically replaces `AutoSavedProviders.json`: write to a sibling temp
/// file, then rename over the target. Grounded on the orchestrator's
/// `maintain_store_dir` rename-swap idiom, simplified from a directory swap
/// to a single-file swap since persistence here is plain JSON, not sled.
fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp_path, &body)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o777))?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Saves `AutoSavedProviders.json` if `changes_since_last_save` is set, or
/// unconditionally when `force` is true.
pub fn save(dir: &Path, state: &RegistryState, force: bool) -> Result<bool, PersistenceError> {
    if !force && !state.changes_since_last_save.load(Ordering::SeqCst) {
        return Ok(false);
    }

    let runtimes: Vec<ProviderRuntime> = state
        .all
        .iter()
        .map(|p| {
            let mut rt = p.runtime.lock().clone();
            rt.name = p.name.clone();
            rt
        })
        .collect();

    atomic_write_json(&dir.join(AUTOSAVE_FILE), &runtimes)?;
    state.changes_since_last_save.store(false, Ordering::SeqCst);
    debug!("autosaved {} provider runtime records", runtimes.len());
    Ok(true)
}

/// "reparseChain": forced save, then full reload from disk.
pub fn reparse_chain(dir: &Path) -> Result<Vec<Arc<Provider>>, PersistenceError> {
    load(dir)
}

/// Background autosave ticker, grounded on the orchestrator's
/// `run_quota_scheduler` periodic-wake shape.
pub async fn run_autosave_ticker(dir: PathBuf, state: Arc<RegistryState>) {
    let mut interval = tokio::time::interval(AUTOSAVE_INTERVAL);
    loop {
        interval.tick().await;
        match save(&dir, &state, false) {
            Ok(true) => info!("autosave: providers.json written"),
            Ok(false) => {}
            Err(err) => warn!("autosave failed: {err}"),
        }
    }
}
