use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::provider::Provider;

/// The single owner of provider state (spec.md §5, §9 "no hidden globals").
/// `dispatch_lock` serializes whole dispatch passes per the spec's preferred
/// single-owner-serialization concurrency discipline; individual providers
/// are additionally guarded by their own `parking_lot::Mutex` so autosave and
/// `reparseChain` don't need to wait on it.
pub struct RegistryState {
    pub all: Vec<Arc<Provider>>,
    pub changes_since_last_save: AtomicBool,
    pub dispatch_lock: tokio::sync::Mutex<()>,
}

impl RegistryState {
    pub fn new(all: Vec<Arc<Provider>>) -> Self {
        Self {
            all,
            changes_since_last_save: AtomicBool::new(false),
            dispatch_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn mark_changed(&self) {
        self.changes_since_last_save.store(true, Ordering::SeqCst);
    }

    /// Enabled providers, excludes `disabled == true`.
    pub fn chain_providers(&self) -> Vec<Arc<Provider>> {
        self.all
            .iter()
            .filter(|p| !p.config.disabled)
            .cloned()
            .collect()
    }

    /// Enabled providers with `chaining_forbidden == false`. A plain filtered
    /// set, per spec.md §9's resolution of the "appears twice" bug.
    pub fn non_chain_providers(&self) -> Vec<Arc<Provider>> {
        self.all
            .iter()
            .filter(|p| !p.config.disabled && !p.config.chaining_forbidden)
            .cloned()
            .collect()
    }
}

/// §3.4 aggregate counters, recomputed after each dispatch over whichever
/// candidate list was active.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuotaSnapshot {
    pub max_requests_per_day: u64,
    pub max_requests_per_user: u64,
    pub cur_daily_requests_used: u64,
    pub cur_requests_by_user_used: u64,
}

pub fn aggregate_snapshot(list: &[Arc<Provider>], user_id: &str) -> QuotaSnapshot {
    let mut snap = QuotaSnapshot::default();
    for p in list {
        let rt = p.runtime.lock();
        let days = p.config.interval_size_in_days.max(1) as u64;
        snap.max_requests_per_day += rt.max_requests_per_interval as u64 / days;
        snap.max_requests_per_user += p.config.max_requests_per_user_and_day as u64;
        snap.cur_daily_requests_used += rt.cur_interval_requests as u64;
        snap.cur_requests_by_user_used +=
            rt.users_to_req_count.get(user_id).copied().unwrap_or(0) as u64;
    }
    snap
}
