//! Postal address used for shipping and billing.

use serde::{Deserialize, Serialize};

/// A structured postal address.
///
/// Only presence of the required fields is checked here. Format checks and
/// geocoding belong to the address provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub first_name: String,
    pub last_name: String,
    /// Street line.
    pub address1: String,
    /// Unit or apartment.
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    /// State or region.
    pub province: String,
    /// Postal code.
    pub zip: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl PostalAddress {
    /// Names of required fields that are empty or whitespace-only.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("address1", &self.address1),
            ("city", &self.city),
            ("province", &self.province),
            ("zip", &self.zip),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}
