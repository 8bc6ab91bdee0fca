//! `AUEP` — audio endpoint status query.
//!
//! Purely a liveness check: resolves the endpoint(s) and reports how many answered. Carries no
//! signal-framework responsibility of its own (that's `RQNT`'s job).

use std::sync::Arc;

use async_trait::async_trait;

use mgcp_proto::command::{MgcpCommand, MgcpCommandResult};
use mgcp_proto::endpoint::EndpointId;
use mgcp_proto::error::CommandError;
use mgcp_proto::message::TransactionId;

use crate::facade::EndpointManager;

pub struct Auep {
    transaction_id: TransactionId,
    endpoint_id: EndpointId,
    manager: Arc<dyn EndpointManager>,
}

impl Auep {
    pub fn new(transaction_id: TransactionId, endpoint_id: EndpointId, manager: Arc<dyn EndpointManager>) -> Self {
        Self { transaction_id, endpoint_id, manager }
    }
}

#[async_trait]
impl MgcpCommand for Auep {
    fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    async fn execute(&mut self) -> Result<MgcpCommandResult, CommandError> {
        self.manager.resolve(&self.endpoint_id).await.map_err(CommandError::from)?;
        Ok(MgcpCommandResult::success(self.transaction_id, 200))
    }

    async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
        MgcpCommandResult::failure(self.transaction_id, error)
    }

    fn reset(&mut self) {}
}
