//! HTTP control surface for the action proxy.
//!
//! Two routes only, consumed by a trusted orchestrator on a private channel:
//! `POST /init` loads the action exactly once, `POST /run` dispatches one
//! activation per request. Request bodies are parsed by hand so that every
//! failure, including malformed JSON, yields the `502` + `{"error": …}`
//! contract instead of a framework rejection. Completion markers are written
//! after every `/run` call and after a failed `/init`, on every exit path.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info};

use crate::runtime::dispatcher::{Dispatcher, InvocationRequest};
use crate::runtime::error::{InitError, InvokeError};
use crate::runtime::lifecycle::{LifecycleController, LifecycleState};
use crate::runtime::markers::MarkerWriter;

/// Shared state behind both routes
#[derive(Clone)]
pub struct ProxyState {
    /// The initialize-once state machine
    pub controller: Arc<LifecycleController>,
    /// The worker-pool dispatcher
    pub dispatcher: Arc<Dispatcher>,
    /// Completion-marker output (stdout in production)
    pub markers: MarkerWriter,
}

/// Build the two-route router over the given state.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/init", post(handle_init))
        .route("/run", post(handle_run))
        .with_state(state)
}

/// `502` with the standard error body.
fn error_response(message: &str) -> Response {
    (StatusCode::BAD_GATEWAY, Json(json!({ "error": message }))).into_response()
}

async fn handle_init(State(state): State<ProxyState>, body: Bytes) -> Response {
    info!("received initialization request");
    match init_outcome(&state, &body).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(message) => {
            error!(%message, "initialization failed");
            state.markers.write_activation_markers();
            error_response(&message)
        }
    }
}

/// The init sequence, funnelled into one error string for the wire.
async fn init_outcome(state: &ProxyState, body: &[u8]) -> Result<(), String> {
    // Fail fast before reading the payload when the process is claimed.
    if state.controller.state() != LifecycleState::Uninitialized {
        return Err(InitError::AlreadyInitialized.to_string());
    }

    let payload: Value =
        serde_json::from_slice(body).map_err(|err| format!("Error parsing input: {err}"))?;

    let message = payload
        .get("value")
        .and_then(Value::as_object)
        .ok_or("Missing main/no code to execute.")?;
    let entry_point = message
        .get("main")
        .and_then(Value::as_str)
        .ok_or("Missing main/no code to execute.")?
        .to_string();
    let code = message
        .get("code")
        .and_then(Value::as_str)
        .ok_or("Missing main/no code to execute.")?;

    let package = BASE64
        .decode(code.trim())
        .map_err(|err| format!("The code package is not valid base64: {err}"))?;

    // Loading opens a shared library; keep it off the async workers.
    let controller = state.controller.clone();
    tokio::task::spawn_blocking(move || controller.initialize(&package, &entry_point))
        .await
        .map_err(|err| format!("An error has occurred in the action proxy: {err}"))?
        .map_err(|err| err.to_string())
}

async fn handle_run(State(state): State<ProxyState>, body: Bytes) -> Response {
    let outcome = run_outcome(&state, body).await;
    state.markers.write_activation_markers();
    match outcome {
        Ok(response) => response,
        Err(err) => {
            error!(%err, "activation failed");
            error_response(&err.to_string())
        }
    }
}

/// The run sequence: reject before parse when uninitialized, then dispatch.
async fn run_outcome(state: &ProxyState, body: Bytes) -> Result<Response, InvokeError> {
    let Some(action) = state.controller.try_get_action() else {
        return Err(InvokeError::NotInitialized);
    };

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|err| InvokeError::Infrastructure(format!("Error parsing input: {err}")))?;
    let Value::Object(mut fields) = payload else {
        return Err(InvokeError::Infrastructure(
            "Error parsing input: the request body must be a JSON object".to_string(),
        ));
    };

    // The action's argument; context is everything else. A missing or
    // non-object `value` degrades to an empty argument object.
    let value = match fields.remove("value") {
        Some(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    };

    debug!(context_fields = fields.len(), "received invocation");

    let result = state
        .dispatcher
        .invoke(
            action,
            InvocationRequest {
                value,
                context: fields,
            },
        )
        .await?;

    debug!(status_code = result.status_code, "writing action response");

    let status = StatusCode::from_u16(result.status_code).unwrap_or(StatusCode::OK);
    Ok((status, Json(result.body)).into_response())
}
