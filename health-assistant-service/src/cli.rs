//! One-shot invocation: read a query from flags or the environment, answer
//! it, and print the result as JSON.

use crate::models::ResponseResult;
use crate::services::policy::AssistError;
use crate::services::ResponsePolicy;
use clap::Parser;
use serde::Serialize;
use serde_json::Value;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "health-assist",
    version,
    about = "Answer a single health query and print the result as JSON"
)]
pub struct Invocation {
    #[arg(long, env = "QUERY", default_value = "", help = "Question to answer")]
    pub query: String,

    #[arg(
        long,
        env = "USER_ID",
        default_value = "",
        help = "Patient/user id whose medical history should be used"
    )]
    pub user_id: String,

    #[arg(
        long,
        env = "CONTEXT",
        default_value = "{}",
        help = "Extra context as a JSON value"
    )]
    pub context: String,
}

impl Invocation {
    /// Extra context parsed from JSON. Malformed input counts as no context.
    pub fn extra_context(&self) -> Option<Value> {
        if self.context.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&self.context) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed CONTEXT");
                None
            }
        }
    }
}

/// Either the full result or `{"error": ...}`.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CliOutput {
    Result(ResponseResult),
    Error { error: String },
}

impl From<AssistError> for CliOutput {
    fn from(err: AssistError) -> Self {
        CliOutput::Error {
            error: err.to_string(),
        }
    }
}

pub async fn execute(policy: &ResponsePolicy, invocation: &Invocation) -> CliOutput {
    let extra = invocation.extra_context();

    match policy
        .answer(
            Some(invocation.query.as_str()),
            Some(invocation.user_id.as_str()),
            extra.as_ref(),
        )
        .await
    {
        Ok(result) => CliOutput::Result(result),
        Err(e) => e.into(),
    }
}

/// JSON with two-space indentation.
pub fn render(output: &CliOutput) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(query: &str, context: &str) -> Invocation {
        Invocation {
            query: query.to_string(),
            user_id: String::new(),
            context: context.to_string(),
        }
    }

    #[test]
    fn parses_flags() {
        let invocation = Invocation::try_parse_from([
            "health-assist",
            "--query",
            "any symptoms?",
            "--user-id",
            "u1",
        ])
        .unwrap();

        assert_eq!(invocation.query, "any symptoms?");
        assert_eq!(invocation.user_id, "u1");
    }

    #[test]
    fn malformed_context_is_ignored() {
        assert_eq!(invocation("q", "{not json").extra_context(), None);
        assert_eq!(invocation("q", "").extra_context(), None);
        assert_eq!(
            invocation("q", r#"{"mood": "tired"}"#).extra_context(),
            Some(serde_json::json!({"mood": "tired"}))
        );
    }

    #[tokio::test]
    async fn empty_query_renders_error_object() {
        let policy = ResponsePolicy::fallback_only();
        let output = execute(&policy, &invocation("", "{}")).await;

        assert_eq!(
            output,
            CliOutput::Error {
                error: "No query provided".to_string()
            }
        );
        assert_eq!(
            render(&output).unwrap(),
            "{\n  \"error\": \"No query provided\"\n}"
        );
    }

    #[tokio::test]
    async fn result_renders_all_fields() {
        let policy = ResponsePolicy::fallback_only();
        let output = execute(&policy, &invocation("book an appointment", "{}")).await;
        let json: Value = serde_json::from_str(&render(&output).unwrap()).unwrap();

        assert_eq!(json["query"], "book an appointment");
        assert_eq!(json["context_used"], false);
        assert_eq!(json["disclaimer_included"], true);
        assert!(json["response"]
            .as_str()
            .unwrap()
            .starts_with("I can help you schedule appointments"));
    }
}
