//! Entry-point descriptor parsing
//!
//! An entry point arrives from the orchestrator as a single string of the
//! form `name` or `name#method`. It is parsed exactly once, at load time,
//! and is immutable afterwards.

use super::error::LoadError;

/// Default method name when the entry point omits one
pub const DEFAULT_METHOD: &str = "main";

/// A parsed entry-point descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Qualified name of the action within the artifact
    pub qualified_name: String,

    /// Method name; defaults to `main`
    pub method: String,
}

impl EntryPoint {
    /// Parse `"name"` or `"name#method"`.
    ///
    /// An empty method segment (`"name#"`) falls back to the default, and
    /// anything after a second `#` is ignored. An empty qualified name is
    /// rejected.
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        let mut parts = raw.split('#');
        let qualified_name = parts.next().unwrap_or_default();
        if qualified_name.is_empty() {
            return Err(LoadError::InvalidEntryPoint {
                entry_point: raw.to_string(),
                detail: "the qualified name is empty".to_string(),
            });
        }

        let method = match parts.next() {
            Some(method) if !method.is_empty() => method,
            _ => DEFAULT_METHOD,
        };

        Ok(Self {
            qualified_name: qualified_name.to_string(),
            method: method.to_string(),
        })
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.qualified_name, self.method)
    }
}
