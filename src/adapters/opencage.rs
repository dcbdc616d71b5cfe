use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use super::{apply_generic_quota_feedback, Adapter, GeoInput, Operation};
use crate::address::Address;
use crate::error::DispatchError;
use crate::provider::Provider;

pub struct OpenCageAdapter;

#[derive(Deserialize)]
struct OpenCageComponents {
    #[serde(default)]
    road: String,
    #[serde(default)]
    house_number: String,
    #[serde(default)]
    postcode: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
}

#[derive(Deserialize)]
struct OpenCageGeometry {
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lng: f64,
}

#[derive(Deserialize)]
struct OpenCageResult {
    components: OpenCageComponents,
    geometry: OpenCageGeometry,
}

#[derive(Deserialize)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
}

fn house_number_postal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+[A-Za-z]?)\s+(\d{4,5})\s+([A-Za-z])").unwrap())
}

/// Inserts a comma between a house number and a following postal code,
/// e.g. "12 10115 Berlin" -> "12, 10115 Berlin".
fn normalize_query(query: &str) -> String {
    house_number_postal_regex()
        .replace(query, "$1, $2 $3")
        .into_owned()
}

impl Adapter for OpenCageAdapter {
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
                let normalized = normalize_query(query);
                format!("{uri}&q={}&key={key}", urlencoding::encode(&normalized))
            }
            (Operation::Reverse, GeoInput::Reverse { lat, lng }) => {
                format!("{uri}&q={lat},{lng}&key={key}")
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

        let parsed: OpenCageResponse =
            serde_json::from_value(value).map_err(|_| DispatchError::EmptyResult)?;
        let first = parsed.results.into_iter().next().ok_or(DispatchError::EmptyResult)?;

        Ok(Address {
            lat: first.geometry.lat,
            lng: first.geometry.lng,
            street: first.components.road,
            house_number: first.components.house_number,
            postal: first.components.postcode,
            city: first.components.city,
            country: first.components.country,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_comma_between_house_number_and_postal_code() {
        assert_eq!(normalize_query("Hauptstr 12 10115 Berlin"), "Hauptstr 12, 10115 Berlin");
    }

    #[test]
    fn leaves_query_without_pattern_untouched() {
        assert_eq!(normalize_query("Berlin"), "Berlin");
    }
}
