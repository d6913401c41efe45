//! Lifecycle controller: the initialize-once state machine
//!
//! Enforces at-most-one successful initialization per process, rejects
//! invocations before initialization, and serializes concurrent init
//! attempts. The published action handle is read-mostly after publication
//! and requires no locking to read.

use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{error, info};

use super::error::InitError;
use super::loader::{ActionLoader, Loadable};

/// Where the process is in its initialize-once lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No init request has been accepted yet
    Uninitialized,
    /// An init request is being processed
    Initializing,
    /// The action is loaded; terminal for the process lifetime
    Ready,
    /// The first init attempt failed; terminal, retries are locked out
    FailedInit,
}

/// The state machine guarding the single action handle.
///
/// `FailedInit` is a permanent lockout: once any init attempt has claimed the
/// process, every later attempt is rejected with `AlreadyInitialized`, which
/// keeps the externally visible contract to exactly "cannot initialize more
/// than once".
pub struct LifecycleController {
    loader: Arc<dyn ActionLoader>,
    init_lock: Mutex<()>,
    state: Mutex<LifecycleState>,
    action: OnceLock<Arc<dyn Loadable>>,
}

impl LifecycleController {
    /// Controller that loads through the given seam.
    pub fn new(loader: Arc<dyn ActionLoader>) -> Self {
        Self {
            loader,
            init_lock: Mutex::new(()),
            state: Mutex::new(LifecycleState::Uninitialized),
            action: OnceLock::new(),
        }
    }

    /// Current lifecycle state (non-blocking snapshot).
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Load the code package and publish the action handle.
    ///
    /// Mutually exclusive with itself: the first caller proceeds, concurrent
    /// callers serialize behind the init lock and then observe a claimed
    /// state. Callers that see a non-`Uninitialized` state before acquiring
    /// fail fast without touching the loader.
    pub fn initialize(&self, package: &[u8], entry_point: &str) -> Result<(), InitError> {
        if self.state() != LifecycleState::Uninitialized {
            return Err(InitError::AlreadyInitialized);
        }

        let _serialize = self.init_lock.lock();
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Uninitialized {
                // Lost the race to a concurrent init attempt.
                return Err(InitError::AlreadyInitialized);
            }
            *state = LifecycleState::Initializing;
        }

        match self.loader.load(package, entry_point) {
            Ok(action) => {
                let action: Arc<dyn Loadable> = Arc::from(action);
                info!(entry_point = %action.entry_point(), "action initialized");
                // The state machine admits exactly one loader call, so this
                // is the only publication that can ever happen.
                let _ = self.action.set(action);
                *self.state.lock() = LifecycleState::Ready;
                Ok(())
            }
            Err(err) => {
                *self.state.lock() = LifecycleState::FailedInit;
                error!(entry_point, %err, "action initialization failed");
                Err(InitError::Load(err))
            }
        }
    }

    /// Non-blocking read of the published handle.
    ///
    /// Invocation callers observing `None` must reject with "not
    /// initialized".
    pub fn try_get_action(&self) -> Option<Arc<dyn Loadable>> {
        self.action.get().cloned()
    }
}
