//! Domain models for the health assistant.

pub mod context;
pub mod patient;
pub mod response;

pub use context::ContextBundle;
pub use patient::PatientRecord;
pub use response::ResponseResult;
