pub mod address;
pub mod events;
