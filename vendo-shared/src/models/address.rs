use serde::{Deserialize, Serialize};

/// A postal address snapshot. Stored on orders and vendor shipments at
/// creation time; never re-read from the owning profile afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
}

impl Address {
    /// Single-line form used when talking to the carrier API.
    pub fn summary(&self) -> String {
        [&self.line1, &self.city, &self.state, &self.country]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.line1.is_empty() && self.city.is_empty() && self.country.is_empty()
    }
}
