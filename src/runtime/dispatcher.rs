//! Invocation dispatcher and worker-pool policy
//!
//! Owns the per-call execution sequence: build the activation environment,
//! run the loaded handle on a blocking worker, classify the outcome. The
//! pool is modeled with two semaphores: `slots` bounds total admitted
//! activations (running plus queued) and `workers` bounds how many run user
//! code at once. A hung action occupies its worker indefinitely; there is no
//! per-call timeout or cancellation here.

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::env::ActivationEnv;
use super::error::InvokeError;
use super::loader::Loadable;

/// What happens to an activation arriving while workers and queue are full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backpressure {
    /// Wait for an admission slot to free up
    Block,
    /// Reject the activation with an overload error
    Reject,
}

/// One activation's input: the action argument plus auxiliary context
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// The action's argument (the `value` field of the `/run` body)
    pub value: Value,

    /// All other top-level fields of the `/run` body
    pub context: Map<String, Value>,
}

/// One activation's outcome as seen by the control surface
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    /// HTTP status for the response; the action's `statusCode` field, or 200
    pub status_code: u16,

    /// The action's returned JSON value, verbatim
    pub body: Value,
}

/// Schedules activations onto a bounded blocking worker pool.
pub struct Dispatcher {
    workers: Arc<Semaphore>,
    slots: Arc<Semaphore>,
    backpressure: Backpressure,
}

impl Dispatcher {
    /// Dispatcher with an explicit pool shape.
    pub fn new(max_workers: usize, queue_capacity: usize, backpressure: Backpressure) -> Self {
        let workers = max_workers.max(1);
        Self {
            workers: Arc::new(Semaphore::new(workers)),
            slots: Arc::new(Semaphore::new(workers + queue_capacity)),
            backpressure,
        }
    }

    /// Dispatcher shaped by the proxy configuration.
    pub fn from_config(config: &super::ProxyConfig) -> Self {
        Self::new(
            config.effective_workers(),
            config.queue_capacity,
            config.backpressure,
        )
    }

    /// Run one activation to completion.
    ///
    /// Admission first: without a free slot the caller blocks or is rejected
    /// per the backpressure policy, never silently dropped. Admitted callers
    /// wait for a worker, then run the action on the blocking pool. A panic
    /// in user code is reported as a user-code failure; it never takes the
    /// control surface down.
    pub async fn invoke(
        &self,
        action: Arc<dyn Loadable>,
        request: InvocationRequest,
    ) -> Result<InvocationResult, InvokeError> {
        let _slot = match self.backpressure {
            Backpressure::Block => self
                .slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| InvokeError::Infrastructure(err.to_string()))?,
            Backpressure::Reject => self
                .slots
                .clone()
                .try_acquire_owned()
                .map_err(|_| InvokeError::Overloaded)?,
        };

        let _worker = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| InvokeError::Infrastructure(err.to_string()))?;

        let env = ActivationEnv::from_context(&request.context);
        debug!(context_entries = env.len(), "dispatching activation");

        let value = request.value;
        let outcome =
            tokio::task::spawn_blocking(move || action.invoke(value, &env)).await;

        match outcome {
            Ok(Ok(result)) if result.is_null() => Err(InvokeError::NullResult),
            Ok(Ok(result)) => Ok(InvocationResult {
                status_code: status_code_of(&result),
                body: result,
            }),
            Ok(Err(err)) => Err(err),
            Err(join_err) if join_err.is_panic() => {
                let message = panic_message(join_err.into_panic());
                warn!(%message, "user code panicked");
                Err(InvokeError::UserCode(message))
            }
            Err(join_err) => Err(InvokeError::Infrastructure(join_err.to_string())),
        }
    }
}

/// The `statusCode` field of an action result, defaulting to 200.
///
/// Non-integer or out-of-range values also fall back to the default.
fn status_code_of(result: &Value) -> u16 {
    result
        .get("statusCode")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(200)
}

/// Best-effort text of a panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "user code panicked".to_string()
    }
}
