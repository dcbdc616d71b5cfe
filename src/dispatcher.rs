use std::sync::Arc;

use log::{debug, error, warn};

use crate::address::Address;
use crate::adapters::{adapter_for, GeoInput, Operation};
use crate::error::{ApiError, DispatchError};
use crate::provider::{now_nanos, Provider, ProviderKind};
use crate::quota::{self, QuotaDecision};
use crate::registry::{aggregate_snapshot, QuotaSnapshot, RegistryState};
use crate::selector;
use crate::upstream::UpstreamClient;

const ONE_HOUR_NANOS: u64 = 60 * 60 * 1_000_000_000;
const REVERSE_COOLDOWN_NANOS: u64 = 5 * 1_000_000_000;
const FORWARD_COOLDOWN_NANOS: u64 = 60 * 1_000_000_000;

pub struct DispatchOutcome {
    pub address: Address,
    pub provider_name: Option<String>,
    pub error: Option<ApiError>,
    pub quota: QuotaSnapshot,
}

fn cooldown_nanos(op: Operation) -> u64 {
    match op {
        Operation::Reverse => REVERSE_COOLDOWN_NANOS,
        Operation::Forward => FORWARD_COOLDOWN_NANOS,
    }
}

fn is_chain(provider: &Provider) -> bool {
    matches!(provider.config.kind(), Ok(ProviderKind::Chain))
}

/// §4.5 Dispatcher main algorithm.
pub async fn dispatch(
    state: &RegistryState,
    upstream: &UpstreamClient,
    op: Operation,
    input: GeoInput,
    user_id: &str,
    dont_chain: bool,
) -> DispatchOutcome {
    let _guard = state.dispatch_lock.lock().await;

    let list = if dont_chain {
        state.non_chain_providers()
    } else {
        state.chain_providers()
    };
    let order = selector::order(list.clone());

    let mut best = Address::default();
    let mut used_provider: Option<String> = None;
    let mut success = false;
    let mut saw_empty_result = false;

    for p in &order {
        match quota::check_and_reserve(p, user_id).await {
            QuotaDecision::SkipProvider => continue,
            QuotaDecision::Ok => {}
        }

        let now = now_nanos();
        {
            let mut rt = p.runtime.lock();
            quota::mark_request_sent(&mut rt, now, p.config.time_between_requests);
        }

        let outcome = run_one(upstream, op, &input, p, user_id).await;

        {
            let mut rt = p.runtime.lock();
            if rt.cur_interval_requests == 1 {
                rt.first_interval_request = now;
            }
        }

        match outcome {
            Err(DispatchError::NeedsFixBeforeRetry) => {
                p.runtime.lock().next_allowed_request_time = now + ONE_HOUR_NANOS;
                state.mark_changed();
                warn!("provider {} needs fix before retry, sidelined 1h", p.name);
                continue;
            }
            Err(DispatchError::SkipProvider) => {
                continue;
            }
            Err(DispatchError::EmptyResult) => {
                saw_empty_result = true;
                debug!("provider {} returned empty result", p.name);
                if is_chain(p) {
                    break;
                }
                continue;
            }
            Err(DispatchError::ProviderNotSupported(code)) => {
                error!("provider {} has unsupported type {}", p.name, code);
                p.runtime.lock().next_allowed_request_time = now + cooldown_nanos(op);
                state.mark_changed();
                continue;
            }
            Err(DispatchError::Transport(msg)) => {
                warn!("provider {} transport error: {}", p.name, msg);
                p.runtime.lock().next_allowed_request_time = now + cooldown_nanos(op);
                state.mark_changed();
                continue;
            }
            Ok(tmp) => {
                used_provider = Some(p.name.clone());
                success = true;

                {
                    let mut rt = p.runtime.lock();
                    let max = rt.max_requests_per_interval as i64;
                    let cur = rt.cur_interval_requests as i64;
                    if max - cur < 0 {
                        quota::apply_overquota_cooldown(&mut rt, now);
                    }
                }

                if !is_chain(p) {
                    let mut rt = p.runtime.lock();
                    *rt.users_to_req_count.entry(user_id.to_string()).or_insert(0) += 1;
                }
                state.mark_changed();

                if tmp.is_full() {
                    best = tmp;
                    break;
                }

                if best.city.is_empty() && !tmp.city.is_empty() {
                    best.city = tmp.city;
                } else if best.street.is_empty() && !tmp.street.is_empty() {
                    best.street = tmp.street;
                }

                if is_chain(p) {
                    break;
                }
                continue;
            }
        }
    }

    let error = if !success {
        Some(if saw_empty_result {
            ApiError::EmptyResult
        } else {
            ApiError::NoRequestsLeft
        })
    } else {
        None
    };

    let quota = aggregate_snapshot(&list, user_id);

    DispatchOutcome {
        address: best,
        provider_name: used_provider,
        error,
        quota,
    }
}

async fn run_one(
    upstream: &UpstreamClient,
    op: Operation,
    input: &GeoInput,
    provider: &Arc<Provider>,
    user_id: &str,
) -> Result<Address, DispatchError> {
    let kind = provider
        .config
        .kind()
        .map_err(DispatchError::ProviderNotSupported)?;
    let adapter = adapter_for(kind);
    let url = adapter.build_request(op, input, provider, user_id);
    let body = upstream.get(&url).await?;
    adapter.parse_response(&body, op, provider, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderConfig, ProviderRuntime};

    fn chain_config(name: &str, priority: i32, kind_code: u8) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            kind_code,
            uri: "http://127.0.0.1:1".into(),
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
        }
    }

    #[tokio::test]
    async fn all_skip_provider_yields_no_requests_left() {
        let now = now_nanos();
        let provider = Arc::new(Provider::new(
            chain_config("p1", 1, 1),
            ProviderRuntime {
                max_requests_per_interval: 10,
                cur_interval_requests: 10,
                first_interval_request: now,
                next_allowed_request_time: now + 2_000_000_000,
                ..Default::default()
            },
        ));
        let state = RegistryState::new(vec![provider]);
        let upstream = UpstreamClient::new();

        let outcome = dispatch(
            &state,
            &upstream,
            Operation::Forward,
            GeoInput::Forward { query: "x".into() },
            "u",
            false,
        )
        .await;

        assert_eq!(outcome.error, Some(ApiError::NoRequestsLeft));
        assert!(outcome.provider_name.is_none());
    }

    /// Binds an axum server on an ephemeral port that answers every request
    /// with the same JSON body, grounded on the orchestrator test tree's
    /// `start_mock_server` helpers in `orchestrator::quota::tests`.
    async fn spawn_mock_json_server(body: &'static str) -> String {
        let app = axum::Router::new().fallback(move || async move { body });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }

    fn geofarm_config(name: &str, priority: i32, uri: String) -> ProviderConfig {
        let mut cfg = chain_config(name, priority, 1);
        cfg.uri = uri;
        cfg
    }

    /// Scenario 5: only City then Street get filled; HouseNumber stays empty
    /// because the merge rule only ever fills those two dimensions.
    #[tokio::test]
    async fn scenario_5_quality_merge_is_asymmetric() {
        let p1_body = r#"{"results":[{"city":"Berlin"}]}"#;
        let p2_body = r#"{"results":[{"street":"Main","house_number":"1"}]}"#;
        let p1_uri = spawn_mock_json_server(p1_body).await;
        let p2_uri = spawn_mock_json_server(p2_body).await;

        let p1 = Arc::new(Provider::new(
            geofarm_config("P1", 10, p1_uri),
            ProviderRuntime::default(),
        ));
        let p2 = Arc::new(Provider::new(
            geofarm_config("P2", 9, p2_uri),
            ProviderRuntime::default(),
        ));
        let state = RegistryState::new(vec![p1, p2]);
        let upstream = UpstreamClient::new();

        let outcome = dispatch(
            &state,
            &upstream,
            Operation::Forward,
            GeoInput::Forward { query: "x".into() },
            "u",
            false,
        )
        .await;

        assert_eq!(outcome.address.city, "Berlin");
        assert_eq!(outcome.address.street, "Main");
        assert_eq!(outcome.address.house_number, "");
        assert!(outcome.error.is_none());
    }

    /// Non-Chain success increments `UsersToReqCount` by exactly one per
    /// dispatch; a Chain success overwrites it with the peer's reported count
    /// instead (see `adapters::chain::ChainAdapter::parse_response`).
    #[tokio::test]
    async fn non_chain_success_increments_user_count_by_one() {
        // `cur_interval_requests` is fed back non-zero so the quota engine's
        // rollover reset (triggered whenever it reads as zero) doesn't wipe
        // `users_to_req_count` back out between the two dispatches below.
        let uri = spawn_mock_json_server(
            r#"{"results":[{"city":"Berlin","street":"Main","house_number":"1"}],"cur_interval_requests":1}"#,
        )
        .await;
        let provider = Arc::new(Provider::new(
            geofarm_config("P1", 1, uri),
            ProviderRuntime::default(),
        ));
        let state = RegistryState::new(vec![provider.clone()]);
        let upstream = UpstreamClient::new();

        dispatch(&state, &upstream, Operation::Forward, GeoInput::Forward { query: "x".into() }, "u", false).await;
        assert_eq!(provider.runtime.lock().users_to_req_count.get("u"), Some(&1));

        dispatch(&state, &upstream, Operation::Forward, GeoInput::Forward { query: "x".into() }, "u", false).await;
        assert_eq!(provider.runtime.lock().users_to_req_count.get("u"), Some(&2));
    }

    #[tokio::test]
    async fn chain_success_overwrites_user_count_instead_of_incrementing() {
        let chain_body = r#"{"Address":{"city":"Berlin","street":"Main","HouseNumber":"1"},"CurUserRequestsUsed":7,"Error":""}"#;
        let uri = spawn_mock_json_server(chain_body).await;
        let mut chain_cfg = geofarm_config("chain", 1, uri);
        chain_cfg.kind_code = 2;
        let provider = Arc::new(Provider::new(chain_cfg, ProviderRuntime::default()));
        provider.runtime.lock().users_to_req_count.insert("u".to_string(), 40);
        let state = RegistryState::new(vec![provider.clone()]);
        let upstream = UpstreamClient::new();

        dispatch(&state, &upstream, Operation::Forward, GeoInput::Forward { query: "x".into() }, "u", false).await;

        assert_eq!(provider.runtime.lock().users_to_req_count.get("u"), Some(&7));
    }

    /// Scenario 6: a Chain EmptyResult terminates iteration even though a
    /// non-chain candidate follows it in the order.
    #[tokio::test]
    async fn scenario_6_chain_empty_result_terminates() {
        let chain_body = r#"{"Address":{"street":"Unbekannt","city":"Unbekannt"},"Error":""}"#;
        let chain_uri = spawn_mock_json_server(chain_body).await;
        let geofarm_uri = spawn_mock_json_server(r#"{"results":[{"city":"Berlin","street":"Main","house_number":"1"}]}"#).await;

        let mut chain_cfg = geofarm_config("chain", 10, chain_uri);
        chain_cfg.kind_code = 2;
        let chain = Arc::new(Provider::new(chain_cfg, ProviderRuntime::default()));
        let geofarm = Arc::new(Provider::new(
            geofarm_config("geofarm", 9, geofarm_uri),
            ProviderRuntime::default(),
        ));
        let state = RegistryState::new(vec![chain, geofarm]);
        let upstream = UpstreamClient::new();

        let outcome = dispatch(
            &state,
            &upstream,
            Operation::Forward,
            GeoInput::Forward { query: "x".into() },
            "u",
            false,
        )
        .await;

        assert_eq!(outcome.error, Some(ApiError::EmptyResult));
        assert!(outcome.provider_name.is_none());
    }
}
