//! Native ABI between the proxy and compiled action artifacts
//!
//! An action artifact is a shared library (`.so` / `.dylib` / `.dll`) built
//! against this module. The artifact exports a single registration symbol,
//! [`CATALOG_SYMBOL`], returning an [`ActionCatalog`]: a static table of named
//! callables. At load time the proxy resolves the catalog once and selects the
//! entry matching the configured entry point; the catalog is never consulted
//! again per invocation.
//!
//! Each callable accepts exactly one JSON value plus the per-activation
//! environment table and returns one JSON value. Context travels by explicit
//! parameter, never through the process-wide environment, so concurrent
//! activations cannot observe each other's context entries.

use serde_json::Value;

use crate::runtime::env::ActivationEnv;

/// Name of the registration symbol every action artifact must export.
pub const CATALOG_SYMBOL: &str = "whisk_action_catalog";

/// Signature of the registration symbol: `fn() -> ActionCatalog`.
pub type CatalogFn = fn() -> ActionCatalog;

/// A single action callable.
///
/// Plain function pointer: invocable without an instance, takes one JSON
/// value and the activation environment, returns one JSON value. A `Null`
/// return is a contract violation reported to the caller as a failed
/// activation.
pub type ActionFn = fn(Value, &ActivationEnv) -> Value;

/// One named callable registered by an action artifact.
#[derive(Debug, Clone, Copy)]
pub struct ActionDescriptor {
    /// Qualified name of the action (the part before `#` in an entry point)
    pub name: &'static str,

    /// Method name (the part after `#`; entry points default to `main`)
    pub method: &'static str,

    /// The callable itself
    pub func: ActionFn,
}

/// The table of callables an artifact exports through [`CATALOG_SYMBOL`].
#[derive(Debug, Clone, Copy)]
pub struct ActionCatalog {
    /// All callables registered by the artifact
    pub actions: &'static [ActionDescriptor],
}

impl ActionCatalog {
    /// Look up the callable registered under `(name, method)`.
    pub fn resolve(&self, name: &str, method: &str) -> Option<ActionFn> {
        self.actions
            .iter()
            .find(|entry| entry.name == name && entry.method == method)
            .map(|entry| entry.func)
    }
}

/// Export an action catalog from an artifact crate.
///
/// ```ignore
/// use action_proxy::action_catalog;
/// use action_proxy::runtime::env::ActivationEnv;
/// use serde_json::{Value, json};
///
/// fn greet(arg: Value, _env: &ActivationEnv) -> Value {
///     json!({ "greeting": format!("Hello, {}!", arg["name"].as_str().unwrap_or("world")) })
/// }
///
/// action_catalog! {
///     "com.example.Greeter" # "main" => greet,
/// }
/// ```
#[macro_export]
macro_rules! action_catalog {
    ($( $name:literal # $method:literal => $func:path ),+ $(,)?) => {
        #[unsafe(no_mangle)]
        pub fn whisk_action_catalog() -> $crate::abi::ActionCatalog {
            $crate::abi::ActionCatalog {
                actions: &[
                    $( $crate::abi::ActionDescriptor {
                        name: $name,
                        method: $method,
                        func: $func,
                    }, )+
                ],
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(arg: Value, _env: &ActivationEnv) -> Value {
        arg
    }

    fn greet(_arg: Value, _env: &ActivationEnv) -> Value {
        json!({ "greeting": "hi" })
    }

    const CATALOG: ActionCatalog = ActionCatalog {
        actions: &[
            ActionDescriptor {
                name: "com.example.Echo",
                method: "main",
                func: echo,
            },
            ActionDescriptor {
                name: "com.example.Echo",
                method: "greet",
                func: greet,
            },
        ],
    };

    #[test]
    fn resolve_matches_name_and_method() {
        let func = CATALOG.resolve("com.example.Echo", "greet").unwrap();
        let out = func(json!({}), &ActivationEnv::default());
        assert_eq!(out, json!({ "greeting": "hi" }));
    }

    #[test]
    fn resolve_rejects_unknown_entries() {
        assert!(CATALOG.resolve("com.example.Echo", "missing").is_none());
        assert!(CATALOG.resolve("com.example.Other", "main").is_none());
    }
}
