use crate::{
    AppState,
    slack::{EventEnvelope, SlackEvent},
    types::{AppError, Result},
};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";
const RETRY_HEADER: &str = "x-slack-retry-num";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Slack Events API webhook.
///
/// Mentions are acknowledged straight away and handled on their own task,
/// since Slack expects an answer within three seconds.
pub async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let timestamp = header(&headers, TIMESTAMP_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing request timestamp".into()))?;
    let signature = header(&headers, SIGNATURE_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing request signature".into()))?;

    state
        .verifier
        .verify(timestamp, signature, &body, chrono::Utc::now().timestamp())
        .inspect_err(|e| tracing::warn!(error = %e, "Rejected Slack request"))?;

    let envelope: EventEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid event payload: {}", e)))?;

    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            tracing::info!("Answered Slack URL verification");
            Ok(Json(json!({ "challenge": challenge })).into_response())
        }
        _ if header(&headers, RETRY_HEADER).is_some() => {
            tracing::debug!(
                retry = header(&headers, RETRY_HEADER).unwrap_or_default(),
                "Ignoring Slack retry"
            );
            Ok(StatusCode::OK.into_response())
        }
        EventEnvelope::EventCallback {
            team_id,
            event_id,
            event: SlackEvent::AppMention(mut mention),
        } => {
            if mention.team.is_none() {
                mention.team = team_id;
            }
            tracing::info!(
                event_id = event_id.as_deref().unwrap_or_default(),
                user = %mention.user,
                channel = %mention.channel,
                "Received app mention"
            );
            tokio::spawn(state.bot.clone().dispatch(mention));
            Ok(StatusCode::OK.into_response())
        }
        _ => Ok(StatusCode::OK.into_response()),
    }
}
