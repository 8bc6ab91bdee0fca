//! `MDCX` — modify connection.
//!
//! Unlike `CRCX`, a modify targets a single already-existing connection: `*` and `$` are rejected
//! with `ProtocolError` (510) before the endpoint manager is even consulted, since broadcasting a
//! modify or allocating a fresh endpoint for one make no sense for this verb.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use mgcp_proto::command::{MgcpCommand, MgcpCommandResult};
use mgcp_proto::endpoint::EndpointId;
use mgcp_proto::error::{CommandError, MgcpError};
use mgcp_proto::message::{MgcpCommandParameterType as P, TransactionId};

use crate::facade::EndpointManager;

pub struct Mdcx {
    transaction_id: TransactionId,
    endpoint_id: EndpointId,
    parameters: BTreeMap<P, String>,
    manager: Arc<dyn EndpointManager>,
}

impl Mdcx {
    pub fn new(
        transaction_id: TransactionId,
        endpoint_id: EndpointId,
        parameters: BTreeMap<P, String>,
        manager: Arc<dyn EndpointManager>,
    ) -> Self {
        Self { transaction_id, endpoint_id, parameters, manager }
    }
}

#[async_trait]
impl MgcpCommand for Mdcx {
    fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    async fn execute(&mut self) -> Result<MgcpCommandResult, CommandError> {
        if self.endpoint_id.is_wildcard() || self.endpoint_id.requests_allocation() {
            return Err(CommandError::from(MgcpError::ProtocolError));
        }
        if let Some(key) = self.parameters.keys().find_map(|k| match k {
            P::Unknown(name) => Some(name.clone()),
            _ => None,
        }) {
            return Err(CommandError::new(538, format!("unknown parameter `{key}`")));
        }

        self.manager.resolve(&self.endpoint_id).await.map_err(CommandError::from)?;
        Ok(MgcpCommandResult::success(self.transaction_id, 200))
    }

    async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
        MgcpCommandResult::failure(self.transaction_id, error)
    }

    fn reset(&mut self) {}
}
