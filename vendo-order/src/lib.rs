pub mod cancel;
pub mod grouper;
pub mod ledger;
pub mod models;
pub mod rates;
pub mod reconcile;
pub mod repository;
pub mod shipping;

pub use cancel::CancellationCompensator;
pub use grouper::{group_by_vendor, CartLine, VendorGroup};
pub use ledger::{CreateOrderRequest, OrderLedger};
pub use models::{DeliveryType, Order, OrderItem, OrderStatus, PaymentStatus, VendorShipment};
pub use rates::{RateAggregator, RateSheet};
pub use reconcile::{CarrierWebhook, WebhookReconciler};
pub use repository::OrderRepository;
pub use shipping::ShipmentOrchestrator;
