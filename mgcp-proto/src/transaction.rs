//! Per-transaction bookkeeping (§3, §4.3).

use std::time::Instant;

use crate::message::{MgcpMessage, TransactionId};

/// Lifecycle state of a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    InProgress,
    Completed,
    Failed,
}

/// A transaction tracked by the mediator from the moment its request is first seen until it is
/// evicted.
#[derive(Debug, Clone)]
pub struct MgcpTransaction {
    pub id: TransactionId,
    pub request: MgcpMessage,
    pub state: TransactionState,
    pub started_at: Instant,
    /// The last response produced for this transaction, if any — used to answer duplicate
    /// inbound requests idempotently (§4.3).
    pub last_response: Option<MgcpMessage>,
}

impl MgcpTransaction {
    pub fn new(request: MgcpMessage) -> Self {
        let id = request.transaction_id();
        Self { id, request, state: TransactionState::InProgress, started_at: Instant::now(), last_response: None }
    }

    pub fn complete(&mut self, response: MgcpMessage) {
        self.state = if response_is_failure(&response) { TransactionState::Failed } else { TransactionState::Completed };
        self.last_response = Some(response);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TransactionState::Completed | TransactionState::Failed)
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

fn response_is_failure(response: &MgcpMessage) -> bool {
    matches!(response, MgcpMessage::Response { code, .. } if *code >= 400)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointId;
    use crate::message::Verb;
    use std::collections::BTreeMap;

    fn request(id: TransactionId) -> MgcpMessage {
        MgcpMessage::Request {
            verb: Verb::Auep,
            transaction_id: id,
            endpoint_id: EndpointId::named("aaln/1", "gw.example.com"),
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn starts_in_progress() {
        let txn = MgcpTransaction::new(request(1));
        assert_eq!(txn.state, TransactionState::InProgress);
        assert!(!txn.is_terminal());
    }

    #[test]
    fn completes_on_2xx() {
        let mut txn = MgcpTransaction::new(request(1));
        txn.complete(MgcpMessage::response(1, 200, None, BTreeMap::new()));
        assert_eq!(txn.state, TransactionState::Completed);
        assert!(txn.is_terminal());
    }

    #[test]
    fn fails_on_4xx_5xx() {
        let mut txn = MgcpTransaction::new(request(1));
        txn.complete(MgcpMessage::response(1, 500, None, BTreeMap::new()));
        assert_eq!(txn.state, TransactionState::Failed);
        assert!(txn.is_terminal());
    }
}
