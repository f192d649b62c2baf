use crate::BoxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vendo_shared::TrackingEvent;

/// One party of a shipment (sender or receiver) as the carrier expects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateParty {
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Single-line address, built via Address::summary().
    pub address: String,
}

/// A package line sent with a rate request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateItem {
    pub name: String,
    /// Kilograms. Defaults to 1.0 upstream when the product declares none.
    pub weight: f64,
    /// Declared value in minor currency units.
    pub amount: i64,
    pub quantity: u32,
}

/// A single courier quote inside a rate response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierQuote {
    pub courier_id: String,
    pub courier_name: String,
    /// Carrier vocabulary: "standard", "express", "same_day".
    pub delivery_type: String,
    /// Minor currency units.
    pub amount: i64,
    pub estimated_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuoteResponse {
    pub couriers: Vec<CourierQuote>,
    pub cheapest_courier_id: Option<String>,
    pub fastest_courier_id: Option<String>,
    /// Opaque token; required to create a shipment against this exact quote.
    pub request_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedAddress {
    pub address_code: String,
    pub formatted_address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentReceipt {
    pub tracking_number: String,
    pub shipment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingReport {
    pub tracking_number: String,
    pub status: String,
    pub events: Vec<TrackingEvent>,
}

/// Contract for the external shipping/logistics network.
///
/// Every call is a network suspension point; callers bound it with a timeout
/// and treat failure as a degraded-service condition, never a fatal error.
#[async_trait]
pub trait CarrierAdapter: Send + Sync {
    async fn validate_address(&self, party: &RateParty) -> Result<ValidatedAddress, BoxError>;

    async fn get_delivery_rates(
        &self,
        sender: &RateParty,
        receiver: &RateParty,
        items: &[RateItem],
    ) -> Result<RateQuoteResponse, BoxError>;

    async fn create_shipment(
        &self,
        request_token: &str,
        courier_id: &str,
        insured: bool,
    ) -> Result<ShipmentReceipt, BoxError>;

    async fn track_shipment(&self, tracking_number: &str) -> Result<TrackingReport, BoxError>;

    async fn cancel_shipment(&self, tracking_number: &str) -> Result<(), BoxError>;
}
