pub mod inventory;
pub mod product;

pub use inventory::InventoryManager;
pub use product::{Product, Vendor};
