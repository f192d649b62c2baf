use crate::grouper::VendorGroup;
use crate::models::DeliveryType;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use vendo_core::carrier::{CarrierAdapter, RateItem, RateParty, RateQuoteResponse};

/// Static prices substituted when the live rate source is unavailable.
/// Minor currency units.
pub const FALLBACK_STANDARD_PRICE: i64 = 2500;
pub const FALLBACK_EXPRESS_PRICE: i64 = 5000;

const FALLBACK_STANDARD_DAYS: u32 = 5;
const FALLBACK_EXPRESS_DAYS: u32 = 2;

/// Delivery option kinds offered to the customer. Superset of DeliveryType:
/// digital fulfillment is an option kind but never a chosen shipping mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuoteType {
    Pickup,
    Digital,
    Standard,
    Express,
    SameDay,
}

impl QuoteType {
    /// Parse the carrier's declared delivery-type vocabulary. Unknown
    /// strings are skipped by the aggregator.
    pub fn from_carrier(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "express" => Some(Self::Express),
            "same_day" | "same-day" => Some(Self::SameDay),
            _ => None,
        }
    }

    pub fn for_delivery(delivery: DeliveryType) -> Self {
        match delivery {
            DeliveryType::Standard => Self::Standard,
            DeliveryType::Express => Self::Express,
            DeliveryType::SameDay => Self::SameDay,
            DeliveryType::Pickup => Self::Pickup,
        }
    }

    fn sort_key(self) -> u8 {
        match self {
            Self::Pickup => 0,
            Self::Digital => 1,
            Self::Standard => 2,
            Self::Express => 3,
            Self::SameDay => 4,
        }
    }
}

/// One vendor's contribution to an aggregated option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorRate {
    pub vendor_id: Uuid,
    pub vendor_name: String,
    pub amount: i64,
    pub courier_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOption {
    pub quote_type: QuoteType,
    /// Cross-vendor sum, minor currency units.
    pub price: i64,
    pub courier: String,
    pub description: String,
    /// Worst-case ETA across contributing vendors; a multi-vendor order is
    /// only delivered when its slowest leg arrives.
    pub estimated_days: Option<u32>,
    pub breakdown: Vec<VendorRate>,
}

/// The unified cross-vendor delivery option list. `carrier_live` reports
/// whether any vendor's quotes came from the live carrier, for
/// observability only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSheet {
    pub options: Vec<DeliveryOption>,
    pub carrier_live: bool,
}

impl RateSheet {
    pub fn option_for(&self, delivery: DeliveryType) -> Option<&DeliveryOption> {
        let wanted = QuoteType::for_delivery(delivery);
        self.options.iter().find(|o| o.quote_type == wanted)
    }
}

/// A vendor's selected quote for one delivery type.
#[derive(Debug, Clone)]
struct SelectedQuote {
    amount: i64,
    estimated_days: u32,
    courier_name: String,
}

/// Fans out to the carrier once per vendor, keeps the cheapest quote per
/// delivery type per vendor, and merges everything into one option list.
/// Deliberately resilient: this operation never fails outright.
pub struct RateAggregator {
    carrier: Arc<dyn CarrierAdapter>,
    call_timeout: Duration,
}

impl RateAggregator {
    pub fn new(carrier: Arc<dyn CarrierAdapter>, call_timeout: Duration) -> Self {
        Self {
            carrier,
            call_timeout,
        }
    }

    pub async fn aggregate(&self, groups: &[VendorGroup], destination: &RateParty) -> RateSheet {
        if groups.is_empty() {
            return RateSheet {
                options: Vec::new(),
                carrier_live: false,
            };
        }

        let physical: Vec<&VendorGroup> =
            groups.iter().filter(|g| g.has_physical_items()).collect();
        let digital: Vec<&VendorGroup> =
            groups.iter().filter(|g| !g.has_physical_items()).collect();

        // One carrier call per physical vendor, concurrently. A slow or
        // failing vendor must not block or fail the others.
        let calls = physical.iter().map(|group| {
            let carrier = Arc::clone(&self.carrier);
            let sender = sender_party(group);
            let items = rate_items(group);
            let receiver = destination.clone();
            let timeout = self.call_timeout;
            async move {
                match tokio::time::timeout(
                    timeout,
                    carrier.get_delivery_rates(&sender, &receiver, &items),
                )
                .await
                {
                    Ok(Ok(resp)) if !resp.couriers.is_empty() => Some(resp),
                    Ok(Ok(_)) => None,
                    Ok(Err(err)) => {
                        tracing::warn!("Carrier rate call failed for vendor: {}", err);
                        None
                    }
                    Err(_) => {
                        tracing::warn!("Carrier rate call timed out for vendor");
                        None
                    }
                }
            }
        });
        let responses: Vec<Option<RateQuoteResponse>> = join_all(calls).await;
        let any_success = responses.iter().any(|r| r.is_some());

        let mut per_vendor: Vec<(&VendorGroup, HashMap<QuoteType, SelectedQuote>)> = Vec::new();

        for group in digital.iter().copied() {
            let mut quotes = HashMap::new();
            quotes.insert(
                QuoteType::Digital,
                SelectedQuote {
                    amount: 0,
                    estimated_days: 0,
                    courier_name: "Instant".to_string(),
                },
            );
            per_vendor.push((group, quotes));
        }

        for (group, response) in physical.iter().copied().zip(responses.into_iter()) {
            match response {
                Some(resp) => per_vendor.push((group, cheapest_per_type(&resp))),
                None if any_success => {
                    // Vendor-level fallback: this vendor only.
                    per_vendor.push((group, fallback_quotes()));
                }
                None => {
                    // All vendors failed; handled globally below.
                }
            }
        }

        let mut options = aggregate_options(&per_vendor);

        if !any_success && !physical.is_empty() {
            // No live rates for any vendor: emit the global static fallback
            // list instead of vendor-summed fallbacks, so the caller never
            // receives zero non-pickup options.
            options.push(global_fallback(QuoteType::Standard));
            options.push(global_fallback(QuoteType::Express));
        }

        if groups.iter().all(|g| g.supports_pickup()) {
            options.push(pickup_option(groups.len()));
        }

        options.sort_by_key(|o| o.quote_type.sort_key());

        RateSheet {
            options,
            carrier_live: any_success,
        }
    }
}

fn sender_party(group: &VendorGroup) -> RateParty {
    RateParty {
        name: group.vendor_name.clone(),
        email: group.vendor_email.clone(),
        phone: group.vendor_phone.clone(),
        address: group.origin.summary(),
    }
}

fn rate_items(group: &VendorGroup) -> Vec<RateItem> {
    group
        .physical_items()
        .map(|item| RateItem {
            name: item.name.clone(),
            weight: item.weight,
            amount: item.unit_price,
            quantity: item.quantity,
        })
        .collect()
}

/// Cheapest quote per declared delivery type for one vendor; ties broken by
/// the carrier's reported order (first seen wins).
fn cheapest_per_type(response: &RateQuoteResponse) -> HashMap<QuoteType, SelectedQuote> {
    let mut selected: HashMap<QuoteType, SelectedQuote> = HashMap::new();
    for quote in &response.couriers {
        let Some(quote_type) = QuoteType::from_carrier(&quote.delivery_type) else {
            continue;
        };
        match selected.get(&quote_type) {
            Some(existing) if existing.amount <= quote.amount => {}
            _ => {
                selected.insert(
                    quote_type,
                    SelectedQuote {
                        amount: quote.amount,
                        estimated_days: quote.estimated_days,
                        courier_name: quote.courier_name.clone(),
                    },
                );
            }
        }
    }
    selected
}

fn fallback_quotes() -> HashMap<QuoteType, SelectedQuote> {
    let mut quotes = HashMap::new();
    quotes.insert(
        QuoteType::Standard,
        SelectedQuote {
            amount: FALLBACK_STANDARD_PRICE,
            estimated_days: FALLBACK_STANDARD_DAYS,
            courier_name: "Standard Delivery".to_string(),
        },
    );
    quotes.insert(
        QuoteType::Express,
        SelectedQuote {
            amount: FALLBACK_EXPRESS_PRICE,
            estimated_days: FALLBACK_EXPRESS_DAYS,
            courier_name: "Express Delivery".to_string(),
        },
    );
    quotes
}

/// Merge per-vendor selections: per-type price sum, unioned breakdown,
/// worst-case ETA, and a combined courier label.
fn aggregate_options(
    per_vendor: &[(&VendorGroup, HashMap<QuoteType, SelectedQuote>)],
) -> Vec<DeliveryOption> {
    let mut merged: HashMap<QuoteType, DeliveryOption> = HashMap::new();

    for (group, quotes) in per_vendor {
        for (quote_type, quote) in quotes {
            let option = merged.entry(*quote_type).or_insert_with(|| DeliveryOption {
                quote_type: *quote_type,
                price: 0,
                courier: quote.courier_name.clone(),
                description: String::new(),
                estimated_days: None,
                breakdown: Vec::new(),
            });
            option.price += quote.amount;
            option.estimated_days = Some(
                option
                    .estimated_days
                    .map_or(quote.estimated_days, |d| d.max(quote.estimated_days)),
            );
            option.breakdown.push(VendorRate {
                vendor_id: group.vendor_id,
                vendor_name: group.vendor_name.clone(),
                amount: quote.amount,
                courier_name: quote.courier_name.clone(),
            });
        }
    }

    let mut options: Vec<DeliveryOption> = merged.into_values().collect();
    for option in &mut options {
        if option.breakdown.len() > 1 {
            option.courier = "Multiple Couriers".to_string();
        }
        option.description = match option.quote_type {
            QuoteType::Digital => "Delivered instantly".to_string(),
            _ => match option.estimated_days {
                Some(days) => format!("Estimated delivery in {} day(s)", days),
                None => String::new(),
            },
        };
    }
    options
}

fn global_fallback(quote_type: QuoteType) -> DeliveryOption {
    let (price, days, courier) = match quote_type {
        QuoteType::Express => (
            FALLBACK_EXPRESS_PRICE,
            FALLBACK_EXPRESS_DAYS,
            "Express Delivery",
        ),
        _ => (
            FALLBACK_STANDARD_PRICE,
            FALLBACK_STANDARD_DAYS,
            "Standard Delivery",
        ),
    };
    DeliveryOption {
        quote_type,
        price,
        courier: courier.to_string(),
        description: format!("Estimated delivery in {} day(s)", days),
        estimated_days: Some(days),
        breakdown: Vec::new(),
    }
}

fn pickup_option(location_count: usize) -> DeliveryOption {
    let description = if location_count > 1 {
        format!("Pick up from {} vendor locations", location_count)
    } else {
        "Pick up from the vendor location".to_string()
    };
    DeliveryOption {
        quote_type: QuoteType::Pickup,
        price: 0,
        courier: "Self Pickup".to_string(),
        description,
        estimated_days: None,
        breakdown: Vec::new(),
    }
}
