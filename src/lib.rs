//! Action Proxy – in-process execution harness for a serverless container
//!
//! This crate implements the initialize-once / invoke-many action lifecycle
//! behind a minimal two-route HTTP control surface:
//! - `POST /init` accepts one code package plus an entry point, loads it, and
//!   publishes the resulting action handle for the rest of the process lifetime
//! - `POST /run` dispatches one activation of the loaded action per request,
//!   marshalling JSON in and out and exposing per-call context to the action
//! - A bounded worker pool schedules concurrent activations
//! - A sentinel line on stdout delimits each activation's log output so the
//!   orchestrator can detect completion even when the action crashes or hangs

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Native ABI between the proxy and compiled action artifacts
pub mod abi;

/// Runtime core modules: lifecycle, loading, dispatch, activation environment
pub mod runtime;

/// HTTP control surface (`/init` and `/run`)
pub mod service;

// Re-export key types for convenience
pub use runtime::ProxyConfig;

/// Current version of the action proxy
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
