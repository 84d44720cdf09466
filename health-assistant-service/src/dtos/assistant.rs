use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Body accepted by the assistant endpoints.
///
/// Every field is optional at the wire level so that a missing query maps to
/// the "No query provided" error instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssistRequest {
    #[validate(length(max = 4000))]
    pub query: Option<String>,

    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,

    /// Free-form extra context, e.g. the last few chat messages.
    #[serde(default)]
    pub context: Option<Value>,
}

/// Minimal reply shape used by the chat widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistReply {
    pub response: String,
}
