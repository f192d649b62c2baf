use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::CustomerClaims;
use crate::rates::CartLineDto;
use crate::state::AppState;
use vendo_order::ledger::{CouponApplication, CreateOrderRequest};
use vendo_order::models::{
    DeliveryType, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, RefundRecord,
    StatusEntry, VendorShipment,
};
use vendo_order::repository::OrderRepoError;
use vendo_shared::{Address, Masked};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderDto {
    pub lines: Vec<CartLineDto>,
    pub delivery_type: DeliveryType,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub coupon: Option<CouponDto>,
}

#[derive(Debug, Deserialize)]
pub struct CouponDto {
    pub code: String,
    /// Discount already computed upstream, minor currency units.
    pub discount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderDto {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: OrderResponse,
    pub authorization_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_email: Masked<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub subtotal: i64,
    pub discount: i64,
    pub shipping_cost: i64,
    pub tax: i64,
    pub total: i64,
    pub items: Vec<OrderItem>,
    pub shipments: Vec<VendorShipment>,
    pub status_history: Vec<StatusEntry>,
    pub delivery_type: DeliveryType,
    pub shipping_address: Address,
    pub coupon_code: Option<String>,
    pub tracking_number: Option<String>,
    pub refund: Option<RefundRecord>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            customer_email: order.customer_email,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            payment_reference: order.payment_reference,
            subtotal: order.subtotal,
            discount: order.discount,
            shipping_cost: order.shipping_cost,
            tax: order.tax,
            total: order.total,
            items: order.items,
            shipments: order.vendor_shipments,
            status_history: order.status_history,
            delivery_type: order.delivery_type,
            shipping_address: order.shipping_address,
            coupon_code: order.coupon_code,
            tracking_number: order.tracking_number,
            refund: order.refund,
            created_at: order.created_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
/// Create and settle an order from the caller's cart.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<CreateOrderDto>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let coupon = req.coupon.map(|c| CouponApplication {
        code: c.code,
        discount: c.discount,
    });

    let outcome = state
        .ledger
        .create_order(CreateOrderRequest {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            lines: req.lines.into_iter().map(CartLineDto::into_line).collect(),
            delivery_type: req.delivery_type,
            shipping_address: req.shipping_address,
            payment_method: req.payment_method,
            coupon,
        })
        .await?;

    Ok(Json(CreateOrderResponse {
        order: outcome.order.into(),
        authorization_url: outcome.authorization_url,
    }))
}

/// GET /v1/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = load_owned(&state, &claims, order_id).await?;
    Ok(Json(order.into()))
}

/// GET /v1/orders
/// List the caller's orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state
        .orders
        .list_for_user(&claims.sub)
        .await
        .map_err(storage_err)?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// POST /v1/orders/:id/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(order_id): Path<Uuid>,
    body: Option<Json<CancelOrderDto>>,
) -> Result<Json<OrderResponse>, AppError> {
    // Ownership check before the compensator touches anything
    load_owned(&state, &claims, order_id).await?;

    let reason = body
        .and_then(|Json(dto)| dto.reason)
        .unwrap_or_else(|| "Cancelled by customer".to_string());

    let cancelled = state.compensator.cancel(order_id, &reason).await?;
    Ok(Json(cancelled.into()))
}

/// GET /v1/payments/verify/:reference
/// Gateway redirect landing path: confirm or fail the referenced order.
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(reference): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    // Ownership first: verification settles the order, so a stranger's
    // request must leave it untouched.
    let order = state
        .orders
        .find_by_order_number(&reference)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| AppError::NotFoundError(reference.clone()))?;
    if order.user_id != claims.sub {
        return Err(AppError::AuthorizationError(
            "Order belongs to another customer".to_string(),
        ));
    }

    let order = state.ledger.verify_payment(&reference).await?;
    Ok(Json(order.into()))
}

async fn load_owned(
    state: &AppState,
    claims: &CustomerClaims,
    order_id: Uuid,
) -> Result<Order, AppError> {
    let order = state
        .orders
        .get(order_id)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| AppError::NotFoundError(order_id.to_string()))?;

    if order.user_id != claims.sub {
        return Err(AppError::AuthorizationError(
            "Order belongs to another customer".to_string(),
        ));
    }
    Ok(order)
}

fn storage_err(err: OrderRepoError) -> AppError {
    AppError::InternalServerError(err.to_string())
}
