pub mod carrier;
pub mod payment;
pub mod resiliency;
pub mod wallet;

/// Boxed error alias used across the adapter traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
