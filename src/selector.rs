use std::cmp::Ordering;
use std::sync::Arc;

use crate::provider::{now_nanos, Provider};

/// §4.4 Selector. A provider "has headroom" per the same predicate as the
/// quota engine (§4.3), but ordering must not mutate state, so this takes a
/// read-only snapshot of the fields the predicate inspects instead of
/// calling `has_requests_left` (which stamps `first_interval_request`).
fn has_headroom_readonly(p: &Provider) -> bool {
    let rt = p.runtime.lock();
    let interval_nanos = p.interval_nanos();
    let now = now_nanos();
    let max = rt.max_requests_per_interval;
    let cur = rt.cur_interval_requests;
    max.saturating_sub(cur) > 1
        || cur == 0
        || max == 0
        || rt.first_interval_request + interval_nanos < now
}

fn next_allowed(p: &Provider) -> u64 {
    p.runtime.lock().next_allowed_request_time
}

/// Orders candidates by headroom (primary), priority (secondary), and
/// `next_allowed_request_time` (tertiary). Equivalent to three stable sorts
/// applied in sequence; implemented here as one multi-key comparator, which
/// the spec calls out as the preferred equivalent.
pub fn order(mut candidates: Vec<Arc<Provider>>) -> Vec<Arc<Provider>> {
    candidates.sort_by(|a, b| {
        let headroom_a = has_headroom_readonly(a);
        let headroom_b = has_headroom_readonly(b);
        // headroom providers first
        match headroom_b.cmp(&headroom_a) {
            Ordering::Equal => {}
            other => return other,
        }
        // higher priority first
        match b.config.priority.cmp(&a.config.priority) {
            Ordering::Equal => {}
            other => return other,
        }
        // lower next_allowed_request_time first
        next_allowed(a).cmp(&next_allowed(b))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderConfig, ProviderRuntime};

    fn provider(name: &str, priority: i32, cur: u32, max: u32, next_allowed: u64) -> Arc<Provider> {
        let config = ProviderConfig {
            name: name.to_string(),
            kind_code: 1,
            uri: "http://x".into(),
            key1: String::new(),
            key2: String::new(),
            key3: String::new(),
            key4: String::new(),
            interval_size_in_days: 1,
            time_between_requests: 0,
            priority,
            disabled: false,
            chaining_forbidden: false,
            max_requests_per_user_and_day: 0,
        };
        let runtime = ProviderRuntime {
            max_requests_per_interval: max,
            cur_interval_requests: cur,
            next_allowed_request_time: next_allowed,
            first_interval_request: 1_000_000_000_000,
            ..Default::default()
        };
        Arc::new(Provider::new(config, runtime))
    }

    #[test]
    fn scenario_1_headroom_beats_priority() {
        let p1 = provider("P1", 10, 100, 100, 0);
        let p2 = provider("P2", 1, 0, 100, 0);
        let ordered = order(vec![p1, p2]);
        assert_eq!(ordered[0].name, "P2");
        assert_eq!(ordered[1].name, "P1");
    }

    #[test]
    fn same_headroom_orders_by_priority() {
        let low = provider("low", 1, 0, 100, 0);
        let high = provider("high", 10, 0, 100, 0);
        let ordered = order(vec![low, high]);
        assert_eq!(ordered[0].name, "high");
    }

    #[test]
    fn equal_priority_and_headroom_orders_by_next_allowed() {
        let later = provider("later", 5, 0, 100, 2000);
        let earlier = provider("earlier", 5, 0, 100, 1000);
        let ordered = order(vec![later, earlier]);
        assert_eq!(ordered[0].name, "earlier");
    }
}
