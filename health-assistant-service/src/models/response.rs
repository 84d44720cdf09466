use serde::{Deserialize, Serialize};

/// Outcome of answering one query. Returned to the caller, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseResult {
    /// Answer text; always carries the medical-advice disclaimer.
    pub response: String,

    /// The query as received.
    pub query: String,

    /// Whether any context (history, keyword note, extra context) was injected.
    pub context_used: bool,

    pub disclaimer_included: bool,
}
