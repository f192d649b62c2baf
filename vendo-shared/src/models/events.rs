use chrono::{DateTime, Utc};

/// One carrier-reported tracking event, as recorded on a vendor shipment.
/// The event log is append-only; reconciliation keeps the raw carrier
/// vocabulary here even when it maps to "no change" internally.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct TrackingEvent {
    pub status: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TrackingEvent {
    pub fn new(status: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            status: status.into(),
            description: None,
            location: None,
            occurred_at,
        }
    }
}
