//! Integration tests for the initialize-once lifecycle
//!
//! Exercises the state machine through the loader seam: exactly one init
//! attempt may ever reach the loader, regardless of interleaving.

use std::sync::Arc;
use std::sync::Barrier;
use std::sync::atomic::{AtomicUsize, Ordering};

use action_proxy::runtime::entry_point::EntryPoint;
use action_proxy::runtime::env::ActivationEnv;
use action_proxy::runtime::error::{InitError, InvokeError, LoadError};
use action_proxy::runtime::lifecycle::{LifecycleController, LifecycleState};
use action_proxy::runtime::loader::{ActionLoader, Loadable};
use serde_json::{Value, json};

struct StubAction {
    entry_point: EntryPoint,
}

impl Loadable for StubAction {
    fn invoke(&self, _value: Value, _env: &ActivationEnv) -> Result<Value, InvokeError> {
        Ok(json!({ "ok": true }))
    }

    fn entry_point(&self) -> &EntryPoint {
        &self.entry_point
    }
}

struct StubLoader {
    calls: AtomicUsize,
    fail: bool,
}

impl StubLoader {
    fn new(fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ActionLoader for StubLoader {
    fn load(&self, _package: &[u8], entry_point: &str) -> Result<Box<dyn Loadable>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LoadError::Link("stub refuses to load".into()));
        }
        Ok(Box::new(StubAction {
            entry_point: EntryPoint::parse(entry_point)?,
        }))
    }
}

#[test]
fn initialize_publishes_exactly_one_handle() {
    let loader = Arc::new(StubLoader::new(false));
    let controller = LifecycleController::new(loader.clone());

    assert_eq!(controller.state(), LifecycleState::Uninitialized);
    assert!(controller.try_get_action().is_none());

    controller.initialize(b"artifact", "com.example.Foo#run").unwrap();

    assert_eq!(controller.state(), LifecycleState::Ready);
    // The published handle carries the resolved descriptor, which is also
    // what the controller reports once the action is initialized.
    let action = controller.try_get_action().expect("handle published");
    assert_eq!(action.entry_point().qualified_name, "com.example.Foo");
    assert_eq!(action.entry_point().method, "run");
    assert_eq!(action.entry_point().to_string(), "com.example.Foo#run");
    assert_eq!(loader.calls(), 1);
}

#[test]
fn second_initialize_is_rejected_without_loading() {
    let loader = Arc::new(StubLoader::new(false));
    let controller = LifecycleController::new(loader.clone());

    controller.initialize(b"artifact", "com.example.Foo").unwrap();
    let err = controller
        .initialize(b"other", "com.example.Bar")
        .unwrap_err();

    assert!(matches!(err, InitError::AlreadyInitialized));
    assert_eq!(controller.state(), LifecycleState::Ready);
    assert_eq!(loader.calls(), 1, "the loader must not run twice");
}

#[test]
fn failed_init_locks_out_retries() {
    let loader = Arc::new(StubLoader::new(true));
    let controller = LifecycleController::new(loader.clone());

    let err = controller
        .initialize(b"artifact", "com.example.Foo")
        .unwrap_err();
    assert!(matches!(err, InitError::Load(LoadError::Link(_))));
    assert_eq!(controller.state(), LifecycleState::FailedInit);
    assert!(controller.try_get_action().is_none());

    // Terminal lockout: the retry never reaches the loader.
    let err = controller
        .initialize(b"artifact", "com.example.Foo")
        .unwrap_err();
    assert!(matches!(err, InitError::AlreadyInitialized));
    assert_eq!(loader.calls(), 1);
}

#[test]
fn concurrent_initializes_admit_exactly_one() {
    let loader = Arc::new(StubLoader::new(false));
    let controller = Arc::new(LifecycleController::new(loader.clone()));

    let attempts = 8;
    let barrier = Arc::new(Barrier::new(attempts));

    let handles: Vec<_> = (0..attempts)
        .map(|_| {
            let controller = controller.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                controller.initialize(b"artifact", "com.example.Foo")
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let rejections = outcomes
        .iter()
        .filter(|r| matches!(r, Err(InitError::AlreadyInitialized)))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(rejections, attempts - 1);
    assert_eq!(loader.calls(), 1);
    assert_eq!(controller.state(), LifecycleState::Ready);
}
