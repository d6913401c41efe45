//! Error types for the action proxy
//!
//! We use thiserror for domain errors and keep the taxonomy tagged by kind so
//! callers and tests can assert on the variant instead of message text. The
//! control surface maps every failure to a `502` with a JSON error body; the
//! `Display` strings below are what the orchestrator sees on the wire.

use std::io;
use thiserror::Error;

/// Errors from loading a code package into an invocable handle
#[derive(Debug, Error)]
pub enum LoadError {
    /// The code package's transport encoding could not be decoded
    #[error("The code package is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The decoded package could not be persisted to local storage
    #[error("Could not persist the code package: {0}")]
    Io(#[from] io::Error),

    /// The artifact could not be opened or its registration symbol resolved
    #[error("Could not link the action artifact: {0}")]
    Link(String),

    /// The entry point is missing from the artifact or malformed
    #[error("Invalid entry point '{entry_point}': {detail}")]
    InvalidEntryPoint {
        /// The entry-point string as received from the orchestrator
        entry_point: String,
        /// What was wrong with it
        detail: String,
    },
}

/// Errors from the initialization path
#[derive(Debug, Error)]
pub enum InitError {
    /// A previous init attempt already claimed this process
    #[error("Cannot initialize the action more than once.")]
    AlreadyInitialized,

    /// The loader rejected the code package or entry point
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Errors from dispatching one activation
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No action has been loaded yet
    #[error("Cannot invoke an uninitialized action.")]
    NotInitialized,

    /// The action returned null instead of a JSON object
    #[error("The action returned a null or empty result.")]
    NullResult,

    /// The action's own code failed; the underlying cause is preserved
    /// distinctly from infrastructure failures
    #[error("An error has occurred while invoking the action: {0}")]
    UserCode(String),

    /// Workers and pending queue are both saturated
    #[error("The action is overloaded; the invocation was rejected.")]
    Overloaded,

    /// A proxy-side failure unrelated to the action's own logic
    #[error("An error has occurred in the action proxy: {0}")]
    Infrastructure(String),
}
