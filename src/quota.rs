use std::time::Duration;

use crate::provider::{now_nanos, Provider, ProviderRuntime};

/// Outcome of [`check_and_reserve`]. `NeedsFixBeforeRetry` is not produced by
/// the quota engine itself — it is raised by adapters on malformed upstream
/// responses and handled by the dispatcher the same way a quota veto is, but
/// the quota engine only ever returns the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Ok,
    SkipProvider,
}

const ONE_SECOND_NANOS: u64 = 1_000_000_000;

/// §4.3 "has requests left" predicate. Takes `&mut` because it has the
/// documented side effect of stamping `first_interval_request` when it was
/// still zero.
pub fn has_requests_left(runtime: &mut ProviderRuntime, interval_nanos: u64, now: u64) -> bool {
    if runtime.first_interval_request == 0 {
        runtime.first_interval_request = now;
    }

    let max = runtime.max_requests_per_interval;
    let cur = runtime.cur_interval_requests;

    // Deliberately `> 1`, not `>= 1`: the last request of an interval is
    // reserved for a forced retry that confirms the interval rolled over.
    max.saturating_sub(cur) > 1
        || cur == 0
        || max == 0
        || runtime.first_interval_request + interval_nanos < now
}

fn interval_elapsed(runtime: &ProviderRuntime, interval_nanos: u64, now: u64) -> bool {
    now.saturating_sub(runtime.first_interval_request) > interval_nanos
}

/// §4.2 `checkAndReserve`. Mutates `provider.runtime` per the five rules.
/// A `< 1s` wait is slept out inline; anything longer returns `SkipProvider`.
pub async fn check_and_reserve(provider: &Provider, user_id: &str) -> QuotaDecision {
    let interval_nanos = provider.interval_nanos();
    let now = now_nanos();

    {
        let mut rt = provider.runtime.lock();
        if rt.cur_interval_requests == 0 || interval_elapsed(&rt, interval_nanos, now) {
            rt.users_to_req_count.clear();
            rt.cur_interval_requests = 0;
        }
    }

    {
        let mut rt = provider.runtime.lock();
        if !has_requests_left(&mut rt, interval_nanos, now) {
            rt.next_allowed_request_time = rt.first_interval_request + interval_nanos;
            if rt.next_allowed_request_time > now {
                return QuotaDecision::SkipProvider;
            }
        }
    }

    {
        let rt = provider.runtime.lock();
        let cap = provider.config.max_requests_per_user_and_day;
        if cap > 0 {
            let used = rt.users_to_req_count.get(user_id).copied().unwrap_or(0);
            if used >= cap {
                return QuotaDecision::SkipProvider;
            }
        }
    }

    let wait = {
        let rt = provider.runtime.lock();
        rt.next_allowed_request_time.saturating_sub(now)
    };
    if wait > 0 {
        if wait < ONE_SECOND_NANOS {
            tokio::time::sleep(Duration::from_nanos(wait)).await;
        } else {
            return QuotaDecision::SkipProvider;
        }
    }

    QuotaDecision::Ok
}

/// Called after a successful HTTP round-trip, before parsing the body.
pub fn mark_request_sent(runtime: &mut ProviderRuntime, now: u64, time_between_requests: u64) {
    runtime.last_request_time = now;
    runtime.next_allowed_request_time = now + time_between_requests;
}

/// Called after parsing, when upstream reports the interval is over quota.
pub fn apply_overquota_cooldown(runtime: &mut ProviderRuntime, now: u64) {
    const TEN_MINUTES_NANOS: u64 = 10 * 60 * 1_000_000_000;
    runtime.next_allowed_request_time = now + TEN_MINUTES_NANOS;
}
