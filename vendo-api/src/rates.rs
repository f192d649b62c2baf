use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use vendo_catalog::{Product, Vendor};
use vendo_core::carrier::RateParty;
use vendo_order::grouper::{group_by_vendor, CartLine};
use vendo_order::rates::RateSheet;
use vendo_shared::Address;

// ============================================================================
// Request/Response Types
// ============================================================================

/// A cart line as the upstream cart service hands it over, with product and
/// vendor already resolved into snapshots.
#[derive(Debug, Deserialize)]
pub struct CartLineDto {
    pub product: ProductDto,
    pub vendor: VendorDto,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ProductDto {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub product_type: Option<String>,
    /// Minor currency units.
    pub price: i64,
    pub weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct VendorDto {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: Address,
}

impl CartLineDto {
    pub fn into_line(self) -> CartLine {
        CartLine {
            product: Product {
                id: self.product.id,
                vendor_id: self.vendor.id,
                name: self.product.name,
                image_url: self.product.image_url,
                product_type: self.product.product_type,
                price: self.product.price,
                weight: self.product.weight,
                stock: 0,
                sales_count: 0,
                is_active: true,
            },
            vendor: Vendor {
                id: self.vendor.id,
                name: self.vendor.name,
                email: self.vendor.email,
                phone: self.vendor.phone,
                address: self.vendor.address,
            },
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub lines: Vec<CartLineDto>,
    pub destination: Address,
    pub email: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/rates
/// Quote delivery options for a cart and destination.
pub async fn quote_rates(
    State(state): State<AppState>,
    Json(req): Json<RateRequest>,
) -> Result<Json<RateSheet>, AppError> {
    if req.lines.is_empty() {
        return Err(AppError::ValidationError("Cart is empty".to_string()));
    }

    let lines: Vec<CartLine> = req.lines.into_iter().map(CartLineDto::into_line).collect();
    let groups = group_by_vendor(&lines);

    let destination = RateParty {
        name: req.destination.name.clone(),
        email: req.email,
        phone: req.destination.phone.clone(),
        address: req.destination.summary(),
    };

    let sheet = state.rates.aggregate(&groups, &destination).await;
    Ok(Json(sheet))
}
