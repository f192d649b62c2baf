use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vendo_shared::Address;

/// Catalog view of a product, as seen by the fulfillment subsystem. Price,
/// name and image are snapshotted onto order items at creation time; the
/// catalog is never re-read for an existing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    /// Free-form type string. "digital" and "service" (case-insensitive)
    /// mark non-physical goods; anything else, including absent, ships.
    pub product_type: Option<String>,
    /// Minor currency units.
    pub price: i64,
    /// Kilograms per unit; None means the vendor never weighed it.
    pub weight: Option<f64>,
    pub stock: i64,
    pub sales_count: i64,
    pub is_active: bool,
}

impl Product {
    /// An item is physical unless its declared type is exactly "digital" or
    /// "service". Unknown products must not silently lose their shipping
    /// cost, so a missing type defaults to physical.
    pub fn is_physical(&self) -> bool {
        match self.product_type.as_deref() {
            Some(t) => {
                let t = t.trim().to_ascii_lowercase();
                t != "digital" && t != "service"
            }
            None => true,
        }
    }

    pub fn unit_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// Vendor profile fields the orchestrator needs: identity plus the origin
/// address shipments depart from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
}
