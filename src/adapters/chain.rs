use serde::Deserialize;

use super::{Adapter, GeoInput, Operation};
use crate::address::Address;
use crate::error::DispatchError;
use crate::provider::Provider;

/// Recursive adapter: the upstream is another instance of this same service.
/// Its response already reflects the peer's own aggregated per-user count,
/// so this is the one adapter that overwrites `users_to_req_count` instead
/// of letting the dispatcher increment it.
pub struct ChainAdapter;

#[derive(Deserialize)]
struct ChainAddress {
    #[serde(default)]
    street: String,
    #[serde(default)]
    postal: String,
    #[serde(default)]
    city: String,
    #[serde(rename = "HouseNumber", alias = "house_number", default)]
    house_number: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lng: f64,
}

#[derive(Deserialize)]
struct ChainResponse {
    #[serde(rename = "Address")]
    address: ChainAddress,
    #[serde(rename = "CurUserRequestsUsed", default)]
    cur_user_requests_used: u32,
    #[serde(rename = "Error", default)]
    error: String,
}

impl Adapter for ChainAdapter {
    fn build_request(
        &self,
        op: Operation,
        input: &GeoInput,
        provider: &Provider,
        user_id: &str,
    ) -> String {
        let uri = &provider.config.uri;
        match (op, input) {
            (Operation::Forward, GeoInput::Forward { query }) => {
                format!(
                    "{uri}/forward/{user_id}/b/b/{}?dontChain=1",
                    urlencoding::encode(query)
                )
            }
            (Operation::Reverse, GeoInput::Reverse { lat, lng }) => {
                format!("{uri}/reverse/{user_id}/bla/blub/{lat}/{lng}?dontChain=1")
            }
            _ => unreachable!("operation/input mismatch"),
        }
    }

    fn parse_response(
        &self,
        body: &str,
        _op: Operation,
        provider: &Provider,
        user_id: &str,
    ) -> Result<Address, DispatchError> {
        let parsed: ChainResponse =
            serde_json::from_str(body).map_err(|_| DispatchError::EmptyResult)?;

        if !parsed.error.is_empty() {
            return Err(DispatchError::Transport(parsed.error));
        }

        let addr = Address {
            lat: parsed.address.lat,
            lng: parsed.address.lng,
            street: parsed.address.street,
            postal: parsed.address.postal,
            city: parsed.address.city,
            house_number: parsed.address.house_number,
            country: parsed.address.country,
            ..Default::default()
        };

        // The peer encodes "nothing found" as the Unbekannt sentinel rather
        // than a non-empty Error, per the spec's EmptyResult leak policy.
        if addr == Address::unknown() {
            return Err(DispatchError::EmptyResult);
        }

        provider
            .runtime
            .lock()
            .users_to_req_count
            .insert(user_id.to_string(), parsed.cur_user_requests_used);

        Ok(addr)
    }
}
