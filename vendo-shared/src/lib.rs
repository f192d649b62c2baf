pub mod models;
pub mod pii;

pub use models::address::Address;
pub use models::events::TrackingEvent;
pub use pii::Masked;
