use serde::Deserialize;

use super::{Adapter, GeoInput, Operation};
use crate::address::Address;
use crate::error::DispatchError;
use crate::provider::{now_nanos, Provider};

/// TomTom reports no quota feedback in its response body; this adapter
/// maintains `cur_interval_requests` itself and resets it once a fixed
/// 24-hour window has elapsed.
pub struct TomTomAdapter;

const TWENTY_FOUR_HOURS_NANOS: u64 = 24 * 60 * 60 * 1_000_000_000;

#[derive(Deserialize)]
struct TomTomPosition {
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

#[derive(Deserialize)]
struct TomTomStreetAddress {
    #[serde(default, rename = "streetName")]
    street_name: String,
    #[serde(default, rename = "streetNumber")]
    street_number: String,
    #[serde(default)]
    municipality: String,
    #[serde(default, rename = "postalCode")]
    postal_code: String,
    #[serde(default)]
    country: String,
}

#[derive(Deserialize)]
struct TomTomResult {
    position: TomTomPosition,
    address: TomTomStreetAddress,
}

#[derive(Deserialize)]
struct TomTomResponse {
    #[serde(default)]
    results: Vec<TomTomResult>,
}

impl Adapter for TomTomAdapter {
    fn build_request(
        &self,
        op: Operation,
        input: &GeoInput,
        provider: &Provider,
        _user_id: &str,
    ) -> String {
        let uri = &provider.config.uri;
        let key = &provider.config.key1;
        match (op, input) {
            (Operation::Forward, GeoInput::Forward { query }) => {
                format!("{uri}/geocode/{}.JSON?key={key}", urlencoding::encode(query))
            }
            (Operation::Reverse, GeoInput::Reverse { lat, lng }) => {
                format!("{uri}/reverseGeocode/{lat},{lng}.JSON?key={key}")
            }
            _ => unreachable!("operation/input mismatch"),
        }
    }

    fn parse_response(
        &self,
        body: &str,
        _op: Operation,
        provider: &Provider,
        _user_id: &str,
    ) -> Result<Address, DispatchError> {
        let parsed: TomTomResponse =
            serde_json::from_str(body).map_err(|_| DispatchError::EmptyResult)?;

        {
            let mut rt = provider.runtime.lock();
            let now = now_nanos();
            if rt.first_interval_request == 0
                || now.saturating_sub(rt.first_interval_request) >= TWENTY_FOUR_HOURS_NANOS
            {
                rt.first_interval_request = now;
                rt.cur_interval_requests = 0;
            }
            rt.cur_interval_requests += 1;
        }

        let first = parsed.results.into_iter().next().ok_or(DispatchError::EmptyResult)?;
        Ok(Address {
            lat: first.position.lat,
            lng: first.position.lon,
            street: first.address.street_name,
            house_number: first.address.street_number,
            postal: first.address.postal_code,
            city: first.address.municipality,
            country: first.address.country,
            ..Default::default()
        })
    }
}
