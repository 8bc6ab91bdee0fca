//! `DLCX` — delete connection.
//!
//! Broadcast-capable (`*` resolves every endpoint in the domain, §6): each resolved endpoint has
//! its currently active signal, if any, canceled before the connection is torn down, since a
//! deleted connection must not go on emitting completion notifications for a signal nobody is
//! listening for anymore.

use std::sync::Arc;

use async_trait::async_trait;

use mgcp_proto::command::{MgcpCommand, MgcpCommandResult};
use mgcp_proto::endpoint::EndpointId;
use mgcp_proto::error::CommandError;
use mgcp_proto::message::TransactionId;

use crate::facade::EndpointManager;

pub struct Dlcx {
    transaction_id: TransactionId,
    endpoint_id: EndpointId,
    manager: Arc<dyn EndpointManager>,
}

impl Dlcx {
    pub fn new(transaction_id: TransactionId, endpoint_id: EndpointId, manager: Arc<dyn EndpointManager>) -> Self {
        Self { transaction_id, endpoint_id, manager }
    }
}

#[async_trait]
impl MgcpCommand for Dlcx {
    fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    async fn execute(&mut self) -> Result<MgcpCommandResult, CommandError> {
        let handles = self.manager.resolve(&self.endpoint_id).await.map_err(CommandError::from)?;
        for handle in &handles {
            handle.cancel_active_signal().await;
        }
        Ok(MgcpCommandResult::success(self.transaction_id, 250))
    }

    async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
        MgcpCommandResult::failure(self.transaction_id, error)
    }

    fn reset(&mut self) {}
}
