//! `NTFY` — notification.
//!
//! The endpoint facade is what *generates* `NTFY` requests when a signal completes (§4.4); this
//! command handles the rarer case of one arriving inbound (e.g. a call agent echoing a
//! notification request back for acknowledgment in a test harness). It does no endpoint
//! resolution of its own — `RequestIdentifier`/`ObservedEvents` are opaque correlation data at
//! this layer — and simply acknowledges.

use std::collections::BTreeMap;

use async_trait::async_trait;

use mgcp_proto::command::{MgcpCommand, MgcpCommandResult};
use mgcp_proto::error::CommandError;
use mgcp_proto::message::{MgcpCommandParameterType as P, TransactionId};

pub struct Ntfy {
    transaction_id: TransactionId,
    parameters: BTreeMap<P, String>,
}

impl Ntfy {
    pub fn new(transaction_id: TransactionId, parameters: BTreeMap<P, String>) -> Self {
        Self { transaction_id, parameters }
    }
}

#[async_trait]
impl MgcpCommand for Ntfy {
    fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    async fn execute(&mut self) -> Result<MgcpCommandResult, CommandError> {
        if let Some(key) = self.parameters.keys().find_map(|k| match k {
            P::Unknown(name) => Some(name.clone()),
            _ => None,
        }) {
            return Err(CommandError::new(538, format!("unknown parameter `{key}`")));
        }
        Ok(MgcpCommandResult::success(self.transaction_id, 200))
    }

    async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
        MgcpCommandResult::failure(self.transaction_id, error)
    }

    fn reset(&mut self) {}
}
