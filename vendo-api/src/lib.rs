use axum::{
    http::Method,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod clients;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod rates;
pub mod state;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    // The carrier posts here unauthenticated; everything else is JWT-gated.
    let public = Router::new().route("/v1/webhooks/carrier", post(webhooks::carrier_webhook));

    let customer = Router::new()
        .route("/v1/rates", post(rates::quote_rates))
        .route(
            "/v1/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route("/v1/orders/{id}", get(orders::get_order))
        .route("/v1/orders/{id}/cancel", post(orders::cancel_order))
        .route(
            "/v1/payments/verify/{reference}",
            get(orders::verify_payment),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::customer_auth_middleware,
        ));

    let admin = Router::new()
        .route("/v1/orders/{id}/refresh", post(webhooks::refresh_tracking))
        .route("/v1/orders/{id}/events", get(webhooks::order_events))
        .route("/v1/orders/{id}/tracking", get(webhooks::order_tracking))
        .route("/v1/webhooks/simulate", post(webhooks::simulate_webhook))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::admin_auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(customer)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
