pub mod app_config;
pub mod memory;
pub mod order_repo;

pub use memory::{MemoryCartStore, MemoryCouponStore, MemoryOrderRepository, MemoryWalletLedger};
pub use order_repo::PgOrderRepository;
