pub mod analysis;
pub mod events;
pub mod inspection;
