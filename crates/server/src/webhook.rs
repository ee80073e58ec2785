//! `POST /webhook/messages`: one inbound message with its interpretation and catalog in,
//! the ordered outbound actions out.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use leadflow_agent::dispatch::RecordingChannel;
use leadflow_agent::orchestrator::{Orchestrator, TurnRequest, TurnStatus};
use leadflow_core::domain::outbound::OutboundAction;
use leadflow_core::errors::InterfaceError;
use leadflow_core::phase::PhaseAssessment;

#[derive(Clone)]
pub struct WebhookState {
    orchestrator: Arc<Orchestrator>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookResponse {
    pub status: TurnStatus,
    pub correlation_id: String,
    pub lead_id: Option<String>,
    pub actions: Vec<OutboundAction>,
    pub phase: Option<PhaseAssessment>,
    pub score: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookError {
    pub error: &'static str,
    /// Safe to forward to the lead verbatim.
    pub message: &'static str,
    pub correlation_id: String,
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/webhook/messages", post(receive_message))
        .with_state(WebhookState { orchestrator })
}

/// The response body is the transmission channel: every action placed in it counts as sent.
pub async fn receive_message(
    State(state): State<WebhookState>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<WebhookResponse>, (StatusCode, Json<WebhookError>)> {
    let channel = RecordingChannel::default();

    match state.orchestrator.process(&request, &channel).await {
        Ok((outcome, report)) => {
            info!(
                event_name = "webhook.message.handled",
                correlation_id = %outcome.correlation_id,
                lead_id = outcome.lead_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
                status = ?outcome.status,
                actions = report.sent.len(),
                "inbound message handled"
            );
            Ok(Json(WebhookResponse {
                status: outcome.status,
                correlation_id: outcome.correlation_id,
                lead_id: outcome.lead_id.map(|id| id.0),
                actions: report.sent,
                phase: outcome.phase,
                score: outcome.score.map(|evaluation| evaluation.score),
            }))
        }
        Err(error) => {
            let interface = error.into_interface(Uuid::new_v4().to_string());
            warn!(
                event_name = "webhook.message.failed",
                correlation_id = %interface.correlation_id(),
                lead_id = "unknown",
                error = %interface,
                "inbound message failed"
            );
            Err(error_response(&interface))
        }
    }
}

fn error_response(error: &InterfaceError) -> (StatusCode, Json<WebhookError>) {
    let (status, kind) = match error {
        InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
        InterfaceError::ServiceUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
        InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (
        status,
        Json(WebhookError {
            error: kind,
            message: error.user_message(),
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}
