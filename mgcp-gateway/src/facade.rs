//! The endpoint facade (§4.4, §5): one single-threaded actor per endpoint, fed by an `mpsc`
//! mailbox, that owns the currently active signal and fans out the `NTFY` requests a completed
//! signal produces.
//!
//! This mirrors the teacher's per-connection `ClientHandler` (one task per `UnixStream`, driven by
//! its own channel, `Drop`-deregistered from shared state) generalized from "one task per TCP
//! client" to "one task per endpoint", since endpoints — not connections — are this protocol's unit
//! of serialization (§5).

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use mgcp_proto::bus::Bus;
use mgcp_proto::endpoint::{EndpointId, EndpointLocalName};
use mgcp_proto::error::MgcpError;
use mgcp_proto::media::{DtmfDetector, Player};
use mgcp_proto::message::{MgcpCommandParameterType as P, MgcpMessage, MessageDirection, Verb};
use mgcp_proto::signal::{CancelToken, Signal, SignalCompletion, SignalType};

/// Supplies fresh `Player`/`DtmfDetector` instances for one endpoint's media stream.
///
/// External collaborator per §1 (supplied by the underlying RTP/media engine); a concrete
/// `MgcpCommand` uses this to build the `Player`/`DtmfDetector` pair a new signal activation needs.
pub trait MediaFactory: Send + Sync {
    fn player(&self) -> Box<dyn Player>;
    fn detector(&self) -> Box<dyn DtmfDetector>;
}

/// Resolves endpoint identifiers to live endpoints, and allocates fresh ones for `$`.
///
/// External collaborator per §1: the real implementation is backed by the media gateway's
/// hardware/port inventory. This trait is the seam; `StaticEndpointManager` below is an in-memory
/// double good enough to drive the mediator and `PlayCollect` end-to-end without a real media
/// engine.
#[async_trait::async_trait]
pub trait EndpointManager: Send + Sync {
    /// Resolves a concrete or wildcard endpoint id to the handle(s) it addresses.
    ///
    /// `*` (wildcard) resolves to every endpoint in the domain; `$` allocates a fresh one; a named
    /// id resolves to that endpoint or fails with `EndpointUnknown`.
    async fn resolve(&self, id: &EndpointId) -> Result<Vec<EndpointHandle>, MgcpError>;
}

/// A lightweight, cloneable reference to one endpoint's actor mailbox.
#[derive(Clone)]
pub struct EndpointHandle {
    id: EndpointId,
    tx: mpsc::Sender<EndpointMsg>,
    media: Arc<dyn MediaFactory>,
}

enum EndpointMsg {
    Activate { signal: Box<dyn Signal>, respond: oneshot::Sender<Result<(), MgcpError>> },
    Cancel,
}

impl EndpointHandle {
    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    /// A fresh `Player`/`DtmfDetector` pair for a new signal activation on this endpoint.
    pub fn new_media(&self) -> (Box<dyn Player>, Box<dyn DtmfDetector>) {
        (self.media.player(), self.media.detector())
    }

    /// Activates `signal` on this endpoint. Fails with `AlreadyExecuting` (528) if a `TimeOut`
    /// signal is already running on it (§4.4); `OnOff` signals are idempotent by `(package,
    /// symbol)` at the caller (the concrete command), since only the command knows whether the
    /// new activation is "the same" toggle.
    pub async fn activate_signal(&self, signal: Box<dyn Signal>) -> Result<(), MgcpError> {
        let (respond, done) = oneshot::channel();
        self.tx
            .send(EndpointMsg::Activate { signal, respond })
            .await
            .map_err(|_| MgcpError::EndpointNotReady)?;
        done.await.map_err(|_| MgcpError::EndpointNotReady)?
    }

    /// Cancels whatever signal is currently active on this endpoint, if any. Non-blocking from the
    /// caller's perspective; the actor observes it on its next scheduling tick.
    pub async fn cancel_active_signal(&self) {
        let _ = self.tx.send(EndpointMsg::Cancel).await;
    }
}

/// Owns one endpoint's actor task. Dropping this drops the channel sender side the actor was
/// spawned with, which ends the actor's `recv()` loop once all `EndpointHandle` clones are also
/// dropped.
pub struct EndpointActor {
    handle: EndpointHandle,
    task: JoinHandle<()>,
}

impl EndpointActor {
    /// Spawns a new endpoint actor and returns a handle to it. `notifications` is the bus the
    /// endpoint facade fans `NTFY` requests OUT through (§4.4: "it implements the subject interface
    /// so that generated requests fan out OUT").
    pub fn spawn(id: EndpointId, notifications: Arc<Bus<MgcpMessage>>, media: Arc<dyn MediaFactory>) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let handle = EndpointHandle { id: id.clone(), tx, media };
        let task = tokio::spawn(run_actor(id, rx, notifications));
        Self { handle, task }
    }

    pub fn handle(&self) -> EndpointHandle {
        self.handle.clone()
    }
}

impl Drop for EndpointActor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_actor(id: EndpointId, mut rx: mpsc::Receiver<EndpointMsg>, notifications: Arc<Bus<MgcpMessage>>) {
    let mut active: Option<(SignalType, CancelToken, JoinHandle<Option<SignalCompletion>>)> = None;

    loop {
        tokio::select! {
            biased;

            maybe_msg = rx.recv() => {
                let Some(msg) = maybe_msg else { break };
                match msg {
                    EndpointMsg::Activate { mut signal, respond } => {
                        if signal.signal_type() == SignalType::TimeOut
                            && active.as_ref().map(|(t, ..)| *t == SignalType::TimeOut).unwrap_or(false)
                        {
                            let _ = respond.send(Err(MgcpError::AlreadyExecuting));
                            continue;
                        }
                        if let Err(e) = signal.start() {
                            let _ = respond.send(Err(e));
                            continue;
                        }
                        let _ = respond.send(Ok(()));
                        let signal_type = signal.signal_type();
                        let cancel = signal.cancel_token();
                        let run_task = tokio::spawn(async move { signal.run().await });
                        active = Some((signal_type, cancel, run_task));
                    }
                    EndpointMsg::Cancel => {
                        if let Some((_, cancel, _)) = &active {
                            cancel.cancel();
                        }
                    }
                }
            }

            completion = &mut active.as_mut().unwrap().2, if active.is_some() => {
                active = None;
                if let Ok(Some(completion)) = completion {
                    let ntfy = build_ntfy(&id, completion);
                    notifications.notify(&ntfy, MessageDirection::Outgoing);
                }
            }
        }
    }
}

/// Builds the `NTFY` request a completed signal reports to the call agent (§6: `ObservedEvents`
/// is a comma-separated list of `package/symbol(code,params)`).
fn build_ntfy(endpoint: &EndpointId, completion: SignalCompletion) -> MgcpMessage {
    let (symbol, code, params) = match completion {
        SignalCompletion::OperationComplete { symbol, code, params } => (symbol, code, params),
        SignalCompletion::OperationFailed { symbol, code, params } => (symbol, code, params),
    };

    let mut rendered_params = BTreeMap::new();
    let observed = format!(
        "AU/{symbol}({code}{})",
        if params.is_empty() {
            String::new()
        } else {
            format!(",{}", params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(","))
        }
    );
    rendered_params.insert(P::ObservedEvents, observed);

    MgcpMessage::Request {
        verb: Verb::Ntfy,
        transaction_id: 0,
        endpoint_id: endpoint.clone(),
        parameters: rendered_params,
    }
}

/// In-memory `EndpointManager` good enough to exercise the mediator and `PlayCollect` without a
/// real media engine: endpoints are created up front (or lazily for `$`) and live for the process
/// lifetime.
pub struct StaticEndpointManager {
    domain: String,
    endpoints: dashmap::DashMap<String, Arc<EndpointActor>>,
    notifications: Arc<Bus<MgcpMessage>>,
    default_media: Arc<dyn MediaFactory>,
    next_allocated: std::sync::atomic::AtomicU64,
}

impl StaticEndpointManager {
    pub fn new(domain: impl Into<String>, notifications: Arc<Bus<MgcpMessage>>, default_media: Arc<dyn MediaFactory>) -> Self {
        Self {
            domain: domain.into(),
            endpoints: dashmap::DashMap::new(),
            notifications,
            default_media,
            next_allocated: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Pre-registers a concrete endpoint, e.g. `aaln/1`, using the manager's default media
    /// factory.
    pub fn register(&self, local_name: impl Into<String>) -> EndpointHandle {
        self.register_with_media(local_name, self.default_media.clone())
    }

    /// Pre-registers a concrete endpoint with a specific media factory, e.g. a test double wired
    /// with scripted DTMF tones.
    pub fn register_with_media(&self, local_name: impl Into<String>, media: Arc<dyn MediaFactory>) -> EndpointHandle {
        let local_name = local_name.into();
        let id = EndpointId::named(local_name.clone(), self.domain.clone());
        let actor = Arc::new(EndpointActor::spawn(id, self.notifications.clone(), media));
        let handle = actor.handle();
        self.endpoints.insert(local_name, actor);
        handle
    }
}

#[async_trait::async_trait]
impl EndpointManager for StaticEndpointManager {
    async fn resolve(&self, id: &EndpointId) -> Result<Vec<EndpointHandle>, MgcpError> {
        match &id.local_name {
            EndpointLocalName::Named(name) => self
                .endpoints
                .get(name)
                .map(|e| vec![e.handle()])
                .ok_or(MgcpError::EndpointUnknown),
            EndpointLocalName::Wildcard => {
                Ok(self.endpoints.iter().map(|e| e.handle()).collect())
            }
            EndpointLocalName::AnyFree => {
                let n = self.next_allocated.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let local_name = format!("aaln/{n}");
                Ok(vec![self.register(local_name)])
            }
        }
    }
}
