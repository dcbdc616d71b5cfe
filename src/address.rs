use serde::{Deserialize, Serialize};

/// A structured postal address as returned by an upstream geocoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub postal: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub house_number: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub accuracy: String,
    #[serde(default)]
    pub fuel: String,
    #[serde(default)]
    pub additional1: String,
    #[serde(default)]
    pub additional2: String,
}

impl Address {
    /// The sentinel address leaked to callers when a Chain provider reports
    /// an empty result and no candidate before it succeeded.
    pub fn unknown() -> Self {
        Self {
            street: "Unbekannt".to_string(),
            city: "Unbekannt".to_string(),
            ..Default::default()
        }
    }

    /// Missing one or more of house number, street, city.
    pub fn is_thin(&self) -> bool {
        self.house_number.is_empty() || self.street.is_empty() || self.city.is_empty()
    }

    /// All of house number, street, city present.
    pub fn is_full(&self) -> bool {
        !self.is_thin()
    }
}
