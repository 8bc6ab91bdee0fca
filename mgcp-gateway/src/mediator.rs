//! The transactional mediator (§4.3, §5): binds inbound requests to transactions, dispatches
//! commands, correlates responses, and evicts completed/timed-out transactions.
//!
//! Where the teacher dispatches one task per accepted connection and lets the connection's own
//! future chain carry error handling, this mediator dispatches one task per transaction — the
//! protocol's unit of request/response correlation — and the `DashMap`-backed transaction table
//! plays the role the teacher's `RwLock<IdxSet<Client>>` plays for connections: shared state
//! mutated from many tasks, read far more often than written.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use mgcp_proto::bus::Bus;
use mgcp_proto::command::{CommandProvider, MgcpCommand, MgcpCommandResult};
use mgcp_proto::error::CommandError;
use mgcp_proto::message::{MgcpMessage, MessageDirection, TransactionId};
use mgcp_proto::transaction::MgcpTransaction;

/// Tunables for transaction lifecycle management (§4.3, §7 config).
#[derive(Debug, Clone, Copy)]
pub struct MediatorConfig {
    /// `T_transaction`: how long an open transaction may run before it is forced to FAILED/406.
    pub transaction_timeout: Duration,
    /// Capacity of the bounded "recently completed" buffer used for duplicate suppression.
    pub recently_completed_capacity: usize,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self { transaction_timeout: Duration::from_secs(30), recently_completed_capacity: 256 }
    }
}

/// Bounded LRU of evicted transactions' final responses, so a duplicate inbound request arriving
/// after its transaction has already completed can still be answered idempotently (§4.3).
struct RecentlyCompleted {
    order: VecDeque<TransactionId>,
    responses: std::collections::HashMap<TransactionId, MgcpMessage>,
    capacity: usize,
}

impl RecentlyCompleted {
    fn new(capacity: usize) -> Self {
        Self { order: VecDeque::with_capacity(capacity), responses: std::collections::HashMap::new(), capacity }
    }

    fn insert(&mut self, id: TransactionId, response: MgcpMessage) {
        if self.responses.contains_key(&id) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.responses.remove(&evicted);
            }
        }
        self.order.push_back(id);
        self.responses.insert(id, response);
    }

    fn get(&self, id: TransactionId) -> Option<&MgcpMessage> {
        self.responses.get(&id)
    }
}

/// Binds inbound `MgcpMessage::Request`s to transactions and dispatches the command each verb
/// resolves to. `C` is the `CommandProvider` the gateway binary wires up for the in-scope verbs.
pub struct Mediator<C: CommandProvider> {
    provider: C,
    transactions: DashMap<TransactionId, MgcpTransaction>,
    recently_completed: std::sync::Mutex<RecentlyCompleted>,
    /// Responses observed OUT. The endpoint facade's `NTFY` bus is separate (§4.4); this one only
    /// carries the request/response pairs the mediator itself correlates.
    responses: Bus<MgcpMessage>,
    config: MediatorConfig,
}

impl<C> Mediator<C>
where
    C: CommandProvider + Send + Sync + 'static,
    C::Command: 'static,
{
    pub fn new(provider: C, config: MediatorConfig) -> Arc<Self> {
        Arc::new(Self {
            provider,
            transactions: DashMap::new(),
            recently_completed: std::sync::Mutex::new(RecentlyCompleted::new(config.recently_completed_capacity)),
            responses: Bus::new(),
            config,
        })
    }

    /// The bus observers subscribe to in order to see outbound responses (§4.1, §4.3).
    pub fn responses(&self) -> &Bus<MgcpMessage> {
        &self.responses
    }

    /// Handles one inbound `MgcpMessage`. Requests are registered as transactions and dispatched;
    /// responses observed without a matching open transaction are logged and dropped (§4.3).
    pub fn handle_inbound(self: &Arc<Self>, message: MgcpMessage) {
        match message {
            MgcpMessage::Request { .. } => self.handle_request(message),
            MgcpMessage::Response { transaction_id, .. } => {
                tracing::warn!(transaction_id, "response observed with no matching transaction; dropping");
            }
        }
    }

    fn handle_request(self: &Arc<Self>, request: MgcpMessage) {
        let MgcpMessage::Request { verb, transaction_id, endpoint_id, parameters } = request.clone() else {
            unreachable!("caller already matched Request");
        };

        if let Some(existing) = self.transactions.get(&transaction_id) {
            if existing.is_terminal() {
                if let Some(response) = existing.last_response.clone() {
                    tracing::debug!(transaction_id, "duplicate request for terminal transaction; re-emitting");
                    self.responses.notify(&response, MessageDirection::Outgoing);
                }
            } else {
                tracing::debug!(transaction_id, "duplicate request for in-progress transaction; dropping");
            }
            return;
        }

        if let Some(response) = self.recently_completed.lock().unwrap().get(transaction_id).cloned() {
            tracing::debug!(transaction_id, "duplicate request for evicted transaction; re-emitting");
            self.responses.notify(&response, MessageDirection::Outgoing);
            return;
        }

        self.transactions.insert(transaction_id, MgcpTransaction::new(request));

        let command = self.provider.provide(verb, transaction_id, endpoint_id, parameters);
        let mediator = Arc::clone(self);

        tokio::spawn(async move {
            let result = match command {
                Ok(mut command) => {
                    match tokio::time::timeout(mediator.config.transaction_timeout, command.call()).await {
                        Ok(result) => result,
                        Err(_elapsed) => {
                            tracing::warn!(transaction_id, "transaction exceeded T_transaction; forcing 406");
                            MgcpCommandResult::failure(
                                transaction_id,
                                CommandError::new(406, "transaction timed out"),
                            )
                        }
                    }
                }
                Err(err) => MgcpCommandResult::failure(transaction_id, err),
            };

            mediator.complete_transaction(transaction_id, result);
        });
    }

    fn complete_transaction(&self, transaction_id: TransactionId, result: MgcpCommandResult) {
        let response = MgcpMessage::response(transaction_id, result.code, result.message, result.parameters);

        if let Some(mut entry) = self.transactions.get_mut(&transaction_id) {
            entry.complete(response.clone());
        }
        self.transactions.remove(&transaction_id);
        self.recently_completed.lock().unwrap().insert(transaction_id, response.clone());

        self.responses.notify(&response, MessageDirection::Outgoing);
    }

    /// Periodically sweeps the open-transaction table for entries that have outrun
    /// `T_transaction` without completing (e.g. a command stuck awaiting a collaborator that never
    /// responds) and forces them to FAILED/406 (§4.3). The per-transaction task already applies a
    /// `tokio::time::timeout` around `call()`, so this sweep is a backstop for transactions whose
    /// dispatch task itself never got scheduled or got stuck outside that timeout's reach.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let mediator = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let timed_out: Vec<TransactionId> = mediator
                    .transactions
                    .iter()
                    .filter(|e| !e.is_terminal() && e.elapsed() >= mediator.config.transaction_timeout)
                    .map(|e| e.id)
                    .collect();
                for transaction_id in timed_out {
                    tracing::warn!(transaction_id, "reaper evicting stale transaction");
                    mediator.complete_transaction(
                        transaction_id,
                        MgcpCommandResult::failure(transaction_id, CommandError::new(406, "transaction timed out")),
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mgcp_proto::endpoint::EndpointId;
    use mgcp_proto::message::{MgcpCommandParameterType, Verb};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        transaction_id: TransactionId,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MgcpCommand for Echo {
        fn transaction_id(&self) -> TransactionId {
            self.transaction_id
        }
        async fn execute(&mut self) -> Result<MgcpCommandResult, CommandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MgcpCommandResult::success(self.transaction_id, 200))
        }
        async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
            MgcpCommandResult::failure(self.transaction_id, error)
        }
        fn reset(&mut self) {}
    }

    struct EchoProvider {
        calls: Arc<AtomicUsize>,
    }

    impl CommandProvider for EchoProvider {
        type Command = Echo;
        fn provide(
            &self,
            _verb: Verb,
            transaction_id: TransactionId,
            _endpoint: EndpointId,
            _parameters: BTreeMap<MgcpCommandParameterType, String>,
        ) -> Result<Self::Command, CommandError> {
            Ok(Echo { transaction_id, calls: self.calls.clone() })
        }
    }

    fn request(id: TransactionId) -> MgcpMessage {
        MgcpMessage::Request {
            verb: Verb::Auep,
            transaction_id: id,
            endpoint_id: EndpointId::named("aaln/1", "gw.example.com"),
            parameters: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn dispatches_and_notifies_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mediator = Mediator::new(EchoProvider { calls: calls.clone() }, MediatorConfig::default());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        struct Recorder(tokio::sync::mpsc::UnboundedSender<MgcpMessage>);
        impl mgcp_proto::bus::Observer<MgcpMessage> for Recorder {
            fn notify(&self, message: &MgcpMessage, _direction: MessageDirection) {
                let _ = self.0.send(message.clone());
            }
        }
        mediator.responses().observe(Arc::new(Recorder(tx)));

        mediator.handle_inbound(request(1));
        let response = rx.recv().await.unwrap();
        assert_eq!(response.transaction_id(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_in_progress_request_is_dropped_not_redispatched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mediator = Mediator::new(EchoProvider { calls: calls.clone() }, MediatorConfig::default());
        mediator.handle_inbound(request(7));
        mediator.handle_inbound(request(7));
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Exactly one dispatch ran `execute`, even though the request arrived twice.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_after_completion_replays_last_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mediator = Mediator::new(EchoProvider { calls: calls.clone() }, MediatorConfig::default());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        struct Recorder(tokio::sync::mpsc::UnboundedSender<MgcpMessage>);
        impl mgcp_proto::bus::Observer<MgcpMessage> for Recorder {
            fn notify(&self, message: &MgcpMessage, _direction: MessageDirection) {
                let _ = self.0.send(message.clone());
            }
        }
        mediator.responses().observe(Arc::new(Recorder(tx)));

        mediator.handle_inbound(request(3));
        let _first = rx.recv().await.unwrap();
        mediator.handle_inbound(request(3));
        let replay = rx.recv().await.unwrap();
        assert_eq!(replay.transaction_id(), 3);
        // Still only one real dispatch.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
