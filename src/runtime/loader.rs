//! Code loading: from a decoded package to an invocable action handle
//!
//! The lifecycle controller depends only on the [`Loadable`] capability and
//! the [`ActionLoader`] seam, never on loading mechanics. The production
//! loader, [`DylibLoader`], persists the package to a private temporary file,
//! opens it as a shared library, resolves the artifact's action catalog once,
//! and validates that the configured entry point exists in it.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use libloading::Library;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::abi::{ActionFn, CatalogFn, CATALOG_SYMBOL};

use super::entry_point::EntryPoint;
use super::env::ActivationEnv;
use super::error::{InvokeError, LoadError};

/// Fixed directories widened into the loading context when present.
///
/// The platform may mount shared configuration or runtime libraries here;
/// their absence is expected on most deployments and never aborts a load.
pub const WIDENING_DIRS: &[&str] = &["/conf", "/action_runtime_libs"];

/// An invocable action handle: one JSON value in, one JSON value out.
///
/// This is the only capability the rest of the runtime sees. Exactly one
/// implementation is ever published per process.
pub trait Loadable: Send + Sync {
    /// Run the action once with the given argument and activation
    /// environment.
    fn invoke(&self, value: Value, env: &ActivationEnv) -> Result<Value, InvokeError>;

    /// The entry point this handle was resolved from, for logging.
    fn entry_point(&self) -> &EntryPoint;
}

/// The seam between the lifecycle controller and loading mechanics.
pub trait ActionLoader: Send + Sync {
    /// Materialize a decoded code package and resolve its entry point.
    fn load(&self, package: &[u8], entry_point: &str) -> Result<Box<dyn Loadable>, LoadError>;
}

/// Production loader: the package is a shared library exporting an action
/// catalog (see [`crate::abi`]).
pub struct DylibLoader {
    widening_dirs: Vec<PathBuf>,
}

impl DylibLoader {
    /// Loader with the platform's fixed widening directories.
    pub fn new() -> Self {
        Self {
            widening_dirs: WIDENING_DIRS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Loader with explicit widening directories (used by tests).
    pub fn with_widening_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { widening_dirs: dirs }
    }

    /// Persist the decoded package to a private temporary file.
    ///
    /// The file handle lives inside the returned [`LoadedAction`] so the
    /// artifact stays on disk for the process lifetime and is removed when
    /// the process exits.
    fn persist_artifact(package: &[u8]) -> Result<NamedTempFile, LoadError> {
        let mut artifact = tempfile::Builder::new()
            .prefix("useraction")
            .suffix(".artifact")
            .tempfile()?;
        artifact.write_all(package)?;
        artifact.flush()?;
        debug!(path = %artifact.path().display(), bytes = package.len(), "persisted code package");
        Ok(artifact)
    }

    /// Open every shared library found in the widening directories.
    ///
    /// Best-effort only: a missing directory or an unloadable file degrades
    /// to a warning.
    fn widen_context(&self) -> Vec<Library> {
        let mut companions = Vec::new();
        for dir in &self.widening_dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(dir = %dir.display(), %err, "could not widen loading context");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                // SAFETY: companion libraries are platform-provided artifacts
                // the container image trusts by construction.
                match unsafe { Library::new(&path) } {
                    Ok(library) => {
                        debug!(path = %path.display(), "added to loading context");
                        companions.push(library);
                    }
                    Err(err) => {
                        warn!(path = %path.display(), %err, "skipping unloadable companion library");
                    }
                }
            }
        }
        companions
    }
}

impl Default for DylibLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionLoader for DylibLoader {
    fn load(&self, package: &[u8], entry_point: &str) -> Result<Box<dyn Loadable>, LoadError> {
        let entry_point = EntryPoint::parse(entry_point)?;
        let artifact = Self::persist_artifact(package)?;
        let companions = self.widen_context();

        // SAFETY: the artifact is the action the orchestrator asked this
        // process to run; isolation is enforced by the platform's sandbox
        // around the whole container, not here.
        let library = unsafe { Library::new(artifact.path()) }
            .map_err(|err| LoadError::Link(err.to_string()))?;

        let catalog = {
            // SAFETY: the symbol signature is fixed by the platform ABI.
            let constructor = unsafe { library.get::<CatalogFn>(CATALOG_SYMBOL.as_bytes()) }
                .map_err(|err| LoadError::Link(err.to_string()))?;
            constructor()
        };

        let func = catalog
            .resolve(&entry_point.qualified_name, &entry_point.method)
            .ok_or_else(|| LoadError::InvalidEntryPoint {
                entry_point: entry_point.to_string(),
                detail: format!(
                    "the artifact registers {} action(s) but none match",
                    catalog.actions.len()
                ),
            })?;

        debug!(entry_point = %entry_point, "resolved action entry point");

        Ok(Box::new(LoadedAction {
            func,
            entry_point,
            _library: library,
            _companions: companions,
            _artifact: artifact,
        }))
    }
}

/// The result of a successful load: a validated callable bound to its
/// loading context.
///
/// The library handles and the temporary artifact are owned here so the
/// loading context stays alive for the process lifetime.
pub struct LoadedAction {
    func: ActionFn,
    entry_point: EntryPoint,
    _library: Library,
    _companions: Vec<Library>,
    _artifact: NamedTempFile,
}

impl Loadable for LoadedAction {
    fn invoke(&self, value: Value, env: &ActivationEnv) -> Result<Value, InvokeError> {
        // Panics in user code are caught at the dispatch boundary.
        Ok((self.func)(value, env))
    }

    fn entry_point(&self) -> &EntryPoint {
        &self.entry_point
    }
}
