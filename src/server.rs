use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classify::{classify, Inbound};
use crate::commands::{parse_form, ParsedCommand};
use crate::dedupe::{Admission, Deduplicator};
use crate::dispatch::{route_event, Dispatcher, Route};
use crate::error::InboundError;
use crate::handlers::{CommandHandler, MessageHandler};
use crate::signature::SignatureVerifier;
use crate::types::VerifiedEvent;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<SignatureVerifier>,
    pub dedupe: Arc<Deduplicator>,
    pub dispatcher: Dispatcher,
    pub messages: Arc<MessageHandler>,
    pub commands: Arc<CommandHandler>,
    pub bot_name: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health-check", get(health_handler))
        .route("/slack/events", post(slack_events_handler))
        .route("/slack/commands", post(slack_commands_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "Health check passed"
}

async fn slack_events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, InboundError> {
    debug!(bytes = body.len(), "received request to /slack/events");

    let content_type = headers.get(CONTENT_TYPE).and_then(|h| h.to_str().ok());
    match classify(content_type, &body) {
        Inbound::Command => {
            info!("form body on events endpoint, handling as slash command");
            accept_command(&state, &headers, &body)
        }
        // url_verification is answered before any signature check
        Inbound::Challenge(token) => {
            info!("answering url_verification challenge");
            Ok(([(CONTENT_TYPE, "text/plain")], token).into_response())
        }
        Inbound::Malformed(reason) => Err(InboundError::MalformedPayload(reason)),
        Inbound::Event(value) => accept_event(&state, &headers, &body, value),
    }
}

async fn slack_commands_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, InboundError> {
    debug!(bytes = body.len(), "received request to /slack/commands");
    accept_command(&state, &headers, &body)
}

fn accept_event(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    value: Value,
) -> Result<Response, InboundError> {
    let proof = state.verifier.verify(headers, body)?;
    let event = VerifiedEvent::from_value(proof, value);

    let (event_id, event_ts) = event
        .details()
        .map(|d| (d.id.clone(), d.timestamp))
        .unwrap_or_default();

    let route = route_event(event, &state.bot_name);
    match &route {
        Route::Ignored(reason) => {
            debug!(reason, "ignoring event");
            return Ok(StatusCode::OK.into_response());
        }
        Route::Unhandled(event_type) => {
            warn!(event_type = %event_type, "unhandled event type");
            return Ok(StatusCode::OK.into_response());
        }
        _ => {}
    }

    // reserved first so a 503 leaves the id free for the platform's retry
    let slot = state.dispatcher.reserve()?;
    match state.dedupe.admit(event_id.as_deref(), event_ts) {
        Admission::Accepted => {}
        Admission::Duplicate => {
            info!(event_id = ?event_id, "duplicate event, skipping");
            return Ok(StatusCode::OK.into_response());
        }
        Admission::Stale => {
            info!(event_id = ?event_id, event_ts = ?event_ts, "event predates process start, skipping");
            return Ok(StatusCode::OK.into_response());
        }
    }

    let task_name = route.name();
    info!(event_id = ?event_id, route = task_name, "dispatching event");
    let messages = state.messages.clone();
    slot.spawn(task_name, async move { messages.handle(route).await });

    Ok(StatusCode::OK.into_response())
}

fn accept_command(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, InboundError> {
    state.verifier.verify(headers, body)?;

    let parsed = parse_form(body)
        .map_err(|e| InboundError::MalformedPayload(e.to_string()))?
        .ok_or(InboundError::MissingCommand)?;

    let (kind, cmd) = match parsed {
        ParsedCommand::Known(kind, cmd) => (kind, cmd),
        ParsedCommand::Unknown(cmd) => {
            warn!(command = %cmd.command, user = %cmd.user_id, "unknown command");
            return Ok(StatusCode::OK.into_response());
        }
    };

    let slot = state.dispatcher.reserve()?;
    let commands = state.commands.clone();
    slot.spawn(kind.name(), async move { commands.handle(kind, cmd).await });

    Ok(StatusCode::OK.into_response())
}
