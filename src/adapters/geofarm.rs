use serde::Deserialize;

use super::{apply_generic_quota_feedback, Adapter, GeoInput, Operation};
use crate::address::Address;
use crate::error::DispatchError;
use crate::provider::Provider;

pub struct GeoFarmAdapter;

#[derive(Deserialize)]
struct GeoFarmResult {
    #[serde(default)]
    street: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    house_number: String,
    #[serde(default)]
    postal: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lng: f64,
}

#[derive(Deserialize)]
struct GeoFarmResponse {
    #[serde(default)]
    results: Vec<GeoFarmResult>,
}

impl Adapter for GeoFarmAdapter {
    fn build_request(
        &self,
        op: Operation,
        input: &GeoInput,
        provider: &Provider,
        _user_id: &str,
    ) -> String {
        let uri = &provider.config.uri;
        match (op, input) {
            (Operation::Forward, GeoInput::Forward { query }) => {
                format!("{uri}/forward/?addr={}&lang=en=1", urlencoding::encode(query))
            }
            (Operation::Reverse, GeoInput::Reverse { lat, lng }) => {
                format!("{uri}/reverse/?lat={lat}&lon={lng}&lang=en")
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
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|_| DispatchError::EmptyResult)?;
        apply_generic_quota_feedback(&value, provider);

        let parsed: GeoFarmResponse =
            serde_json::from_value(value).map_err(|_| DispatchError::EmptyResult)?;
        let first = parsed.results.into_iter().next().ok_or(DispatchError::EmptyResult)?;

        Ok(Address {
            lat: first.lat,
            lng: first.lng,
            street: first.street,
            postal: first.postal,
            city: first.city,
            house_number: first.house_number,
            country: first.country,
            ..Default::default()
        })
    }
}
