use crate::dtos::{AssistReply, AssistRequest};
use crate::models::ResponseResult;
use crate::startup::AppState;
use axum::{extract::State, Extension, Json};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;
use validator::Validate;

/// Chat widget endpoint: `{"query": ...}` in, `{"response": ...}` out.
pub async fn ai_assistant(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Json(request): Json<AssistRequest>,
) -> Result<Json<AssistReply>, AppError> {
    let result = answer(&state, request_id, &request).await?;
    Ok(Json(AssistReply {
        response: result.response,
    }))
}

/// Same as [`ai_assistant`] but returns the full result record.
pub async fn assist(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Json(request): Json<AssistRequest>,
) -> Result<Json<ResponseResult>, AppError> {
    Ok(Json(answer(&state, request_id, &request).await?))
}

async fn answer(
    state: &AppState,
    request_id: Option<Extension<RequestId>>,
    request: &AssistRequest,
) -> Result<ResponseResult, AppError> {
    request.validate()?;

    let result = state
        .policy
        .answer(
            request.query.as_deref(),
            request.user_id.as_deref(),
            request.context.as_ref(),
        )
        .await?;

    tracing::info!(
        request_id = request_id.as_ref().map(|Extension(RequestId(id))| id.as_str()),
        context_used = result.context_used,
        response_len = result.response.len(),
        "Answered assistant query"
    );

    Ok(result)
}
