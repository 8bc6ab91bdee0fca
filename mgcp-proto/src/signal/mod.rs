//! Abstract signal lifecycle shared by every AU-package signal (§4.5).

pub mod playcollect;
pub mod playlist;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::MgcpError;

/// Identifies a signal by its package and symbol, e.g. `("AU", "pc")` for `PlayCollect`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalId {
    pub package: String,
    pub symbol: String,
}

impl SignalId {
    pub fn new(package: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self { package: package.into(), symbol: symbol.into() }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.symbol)
    }
}

/// How a signal completes once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    /// Completes synchronously, before `start()` returns.
    Brief,
    /// Long-running; completes asynchronously and must be cancelable.
    TimeOut,
    /// Toggles a sustained effect until explicitly turned off.
    OnOff,
}

/// The outcome reported exactly once per successfully started signal (§4.5, §5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalCompletion {
    OperationComplete { symbol: String, code: u16, params: BTreeMap<String, String> },
    OperationFailed { symbol: String, code: u16, params: BTreeMap<String, String> },
}

impl SignalCompletion {
    pub fn code(&self) -> u16 {
        match self {
            SignalCompletion::OperationComplete { code, .. } => *code,
            SignalCompletion::OperationFailed { code, .. } => *code,
        }
    }
}

/// Cooperative cancellation handle, safe to trigger from any thread (§5). Cheap to clone; every
/// clone observes the same cancellation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self { canceled: Arc::new(AtomicBool::new(false)), notify: Arc::new(tokio::sync::Notify::new()) }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: triggering an already-canceled token is a no-op.
    pub fn cancel(&self) {
        if !self.canceled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel()` has been called. Resolves immediately if already canceled.
    pub async fn canceled(&self) {
        if self.is_canceled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// The contract every AU-package signal implements.
///
/// `start()` is the atomic `false -> true` transition on `executing`; `run()` drives the signal to
/// completion or cancellation and is only valid to call once, after a successful `start()`.
/// `cancel()` may be called concurrently with `run()` from any context and must make `run()`
/// resolve without emitting a completion.
#[async_trait::async_trait]
pub trait Signal: Send {
    fn id(&self) -> &SignalId;
    fn signal_type(&self) -> SignalType;
    fn is_executing(&self) -> bool;

    /// Declares whether `name` is a parameter this signal recognizes, independent of whether a
    /// value for it was actually supplied.
    fn is_parameter_supported(&self, name: &str) -> bool;

    /// Transitions `executing: false -> true`. Returns `MgcpError::AlreadyExecuting` if already
    /// running (§4.5's `IllegalState`, expressed as this controller's error taxonomy).
    fn start(&mut self) -> Result<(), MgcpError>;

    /// A cooperative cancellation handle for this signal instance.
    fn cancel_token(&self) -> CancelToken;

    /// Drives the signal to completion. Returns `None` if canceled before completing (no
    /// completion notification should be emitted in that case), `Some(completion)` exactly once
    /// otherwise.
    async fn run(&mut self) -> Option<SignalCompletion>;
}
