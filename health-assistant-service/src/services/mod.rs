pub mod database;
pub mod metrics;
pub mod policy;
pub mod providers;
pub mod records;

pub use database::AssistantDb;
pub use policy::{PolicySettings, ResponsePolicy};
pub use records::RecordStore;
