use crate::models::{DeliveryType, Order, ShipmentStatus};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use vendo_core::carrier::{CarrierAdapter, CourierQuote, RateItem, RateParty};

/// Converts a confirmed, paid order into real per-vendor shipments.
///
/// Failure policy: any per-vendor error is logged and skipped. It must not
/// abort order processing or other vendors' shipments; a shipment left
/// `pending` here is an accepted, recoverable condition.
pub struct ShipmentOrchestrator {
    carrier: Arc<dyn CarrierAdapter>,
    call_timeout: Duration,
}

struct CreatedShipment {
    vendor_id: Uuid,
    tracking_number: String,
    shipment_id: String,
    courier: String,
}

impl ShipmentOrchestrator {
    pub fn new(carrier: Arc<dyn CarrierAdapter>, call_timeout: Duration) -> Self {
        Self {
            carrier,
            call_timeout,
        }
    }

    /// Create carrier shipments for every still-pending vendor shipment on
    /// the order, updating each in place. Returns how many were created.
    /// The caller persists the order afterwards.
    pub async fn create_shipments(&self, order: &mut Order) -> usize {
        let receiver = RateParty {
            name: order.shipping_address.name.clone(),
            email: order.customer_email.inner().clone(),
            phone: order.shipping_address.phone.clone(),
            address: order.shipping_address.summary(),
        };

        let pending: Vec<_> = order
            .vendor_shipments
            .iter()
            .filter(|s| s.status == ShipmentStatus::Pending)
            .map(|s| {
                let items: Vec<RateItem> = order
                    .items
                    .iter()
                    .filter(|i| i.physical && s.product_ids.contains(&i.product_id))
                    .map(|i| RateItem {
                        name: i.name.clone(),
                        weight: i.weight,
                        amount: i.unit_price,
                        quantity: i.quantity,
                    })
                    .collect();
                let sender = RateParty {
                    name: s.vendor_name.clone(),
                    email: String::new(),
                    phone: s.origin.phone.clone(),
                    address: s.origin.summary(),
                };
                (s.vendor_id, sender, items)
            })
            .collect();

        let delivery_type = order.delivery_type;
        let calls = pending.into_iter().map(|(vendor_id, sender, items)| {
            let carrier = Arc::clone(&self.carrier);
            let receiver = receiver.clone();
            let timeout = self.call_timeout;
            async move {
                match Self::create_one(carrier, timeout, vendor_id, sender, receiver, items, delivery_type)
                    .await
                {
                    Ok(created) => Some(created),
                    Err(err) => {
                        tracing::warn!(
                            "Shipment creation skipped for vendor {}: {}",
                            vendor_id,
                            err
                        );
                        None
                    }
                }
            }
        });

        let mut created_count = 0;
        for created in join_all(calls).await.into_iter().flatten() {
            if let Some(shipment) = order.shipment_for_vendor_mut(created.vendor_id) {
                shipment.tracking_number = Some(created.tracking_number.clone());
                shipment.shipment_id = Some(created.shipment_id);
                shipment.courier = Some(created.courier);
                shipment.status = ShipmentStatus::Created;
                created_count += 1;
            }
            if order.vendor_shipments.len() == 1 {
                // Single-vendor orders still populate the legacy field.
                order.tracking_number = Some(created.tracking_number);
            }
        }
        created_count
    }

    async fn create_one(
        carrier: Arc<dyn CarrierAdapter>,
        timeout: Duration,
        vendor_id: Uuid,
        sender: RateParty,
        receiver: RateParty,
        items: Vec<RateItem>,
        delivery_type: DeliveryType,
    ) -> Result<CreatedShipment, vendo_core::BoxError> {
        let rates = tokio::time::timeout(
            timeout,
            carrier.get_delivery_rates(&sender, &receiver, &items),
        )
        .await
        .map_err(|_| "carrier rate call timed out")??;

        // Express and same-day buyers get the fastest quote; everyone else
        // gets the cheapest.
        let want_fastest = matches!(delivery_type, DeliveryType::Express | DeliveryType::SameDay);
        let preferred_id = if want_fastest {
            rates.fastest_courier_id.clone()
        } else {
            rates.cheapest_courier_id.clone()
        };
        let chosen: &CourierQuote = match preferred_id
            .and_then(|id| rates.couriers.iter().find(|c| c.courier_id == id))
        {
            Some(quote) => quote,
            None if want_fastest => rates
                .couriers
                .iter()
                .min_by_key(|c| c.estimated_days)
                .ok_or("carrier returned no couriers")?,
            None => rates
                .couriers
                .iter()
                .min_by_key(|c| c.amount)
                .ok_or("carrier returned no couriers")?,
        };

        let receipt = tokio::time::timeout(
            timeout,
            carrier.create_shipment(&rates.request_token, &chosen.courier_id, false),
        )
        .await
        .map_err(|_| "carrier shipment call timed out")??;

        tracing::info!(
            "Created shipment {} (tracking {}) for vendor {} via {}",
            receipt.shipment_id,
            receipt.tracking_number,
            vendor_id,
            chosen.courier_name
        );

        Ok(CreatedShipment {
            vendor_id,
            tracking_number: receipt.tracking_number,
            shipment_id: receipt.shipment_id,
            courier: chosen.courier_name.clone(),
        })
    }
}

/// Mock carrier used in development wiring and tests. Returns a fixed pair
/// of couriers and fabricated tracking identifiers.
pub struct MockCarrierAdapter {
    failing: bool,
}

impl MockCarrierAdapter {
    pub fn new() -> Self {
        Self { failing: false }
    }

    /// Every call errors, for exercising fallback paths.
    pub fn failing() -> Self {
        Self { failing: true }
    }

    fn check(&self) -> Result<(), vendo_core::BoxError> {
        if self.failing {
            Err("simulated carrier outage".into())
        } else {
            Ok(())
        }
    }
}

impl Default for MockCarrierAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CarrierAdapter for MockCarrierAdapter {
    async fn validate_address(
        &self,
        party: &RateParty,
    ) -> Result<vendo_core::carrier::ValidatedAddress, vendo_core::BoxError> {
        self.check()?;
        Ok(vendo_core::carrier::ValidatedAddress {
            address_code: format!("ADDR-{}", Uuid::new_v4().simple()),
            formatted_address: party.address.clone(),
            city: String::new(),
            state: String::new(),
            country: String::new(),
            postal_code: String::new(),
            lat: 0.0,
            lon: 0.0,
        })
    }

    async fn get_delivery_rates(
        &self,
        _sender: &RateParty,
        _receiver: &RateParty,
        _items: &[RateItem],
    ) -> Result<vendo_core::carrier::RateQuoteResponse, vendo_core::BoxError> {
        self.check()?;
        Ok(vendo_core::carrier::RateQuoteResponse {
            couriers: vec![
                CourierQuote {
                    courier_id: "mock-standard".to_string(),
                    courier_name: "MockStandard".to_string(),
                    delivery_type: "standard".to_string(),
                    amount: 2500,
                    estimated_days: 4,
                },
                CourierQuote {
                    courier_id: "mock-express".to_string(),
                    courier_name: "MockExpress".to_string(),
                    delivery_type: "express".to_string(),
                    amount: 5000,
                    estimated_days: 1,
                },
            ],
            cheapest_courier_id: Some("mock-standard".to_string()),
            fastest_courier_id: Some("mock-express".to_string()),
            request_token: format!("mock_tok_{}", Uuid::new_v4().simple()),
        })
    }

    async fn create_shipment(
        &self,
        _request_token: &str,
        _courier_id: &str,
        _insured: bool,
    ) -> Result<vendo_core::carrier::ShipmentReceipt, vendo_core::BoxError> {
        self.check()?;
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        Ok(vendo_core::carrier::ShipmentReceipt {
            tracking_number: format!("TRK-{}", suffix),
            shipment_id: format!("SHP-{}", suffix),
        })
    }

    async fn track_shipment(
        &self,
        tracking_number: &str,
    ) -> Result<vendo_core::carrier::TrackingReport, vendo_core::BoxError> {
        self.check()?;
        Ok(vendo_core::carrier::TrackingReport {
            tracking_number: tracking_number.to_string(),
            status: "in_transit".to_string(),
            events: vec![vendo_shared::TrackingEvent::new(
                "in_transit",
                chrono::Utc::now(),
            )],
        })
    }

    async fn cancel_shipment(&self, tracking_number: &str) -> Result<(), vendo_core::BoxError> {
        self.check()?;
        tracing::info!("Mock carrier cancelled shipment {}", tracking_number);
        Ok(())
    }
}
