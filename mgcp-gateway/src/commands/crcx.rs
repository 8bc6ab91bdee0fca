//! `CRCX` — create connection.
//!
//! Resolves the endpoint (allocating a fresh one for `$`), and echoes the concrete endpoint id
//! back as `Z` when allocation was requested (§6). Connection/SDP bookkeeping itself is the
//! wire parser's and media engine's job (§1 Out of scope); this command's in-scope responsibility
//! is endpoint resolution and the uniform execute/rollback/reset contract (§4.2).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use mgcp_proto::command::{MgcpCommand, MgcpCommandResult};
use mgcp_proto::endpoint::EndpointId;
use mgcp_proto::error::CommandError;
use mgcp_proto::message::{MgcpCommandParameterType as P, TransactionId};

use crate::facade::EndpointManager;

pub struct Crcx {
    transaction_id: TransactionId,
    endpoint_id: EndpointId,
    parameters: BTreeMap<P, String>,
    manager: Arc<dyn EndpointManager>,
    allocated: bool,
}

impl Crcx {
    pub fn new(
        transaction_id: TransactionId,
        endpoint_id: EndpointId,
        parameters: BTreeMap<P, String>,
        manager: Arc<dyn EndpointManager>,
    ) -> Self {
        let allocated = endpoint_id.requests_allocation();
        Self { transaction_id, endpoint_id, parameters, manager, allocated }
    }
}

#[async_trait]
impl MgcpCommand for Crcx {
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

        let handles = self.manager.resolve(&self.endpoint_id).await.map_err(CommandError::from)?;
        let handle = handles.first().ok_or_else(|| CommandError::new(500, "endpoint unknown"))?;

        let mut result = MgcpCommandResult::success(self.transaction_id, 200);
        if self.allocated {
            result = result.with_parameter(P::ResolvedEndpointId, handle.id().to_string());
        }
        Ok(result)
    }

    async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
        MgcpCommandResult::failure(self.transaction_id, error)
    }

    fn reset(&mut self) {}
}
