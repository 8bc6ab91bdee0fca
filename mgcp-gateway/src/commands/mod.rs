//! Concrete `MgcpCommand` implementations for the in-scope verbs (§6), plus the
//! `GatewayCommandProvider` that resolves a `Verb` to one of them.
//!
//! Each command is its own type implementing `mgcp_proto::command::MgcpCommand` rather than one
//! big dispatch function (§9's redesign note): `execute`/`rollback`/`reset` are the only methods a
//! command supplies, and `MgcpCommand::call` enforces the invariants around them uniformly.

pub mod aucx;
pub mod auep;
pub mod crcx;
pub mod dlcx;
pub mod mdcx;
pub mod ntfy;
pub mod rqnt;

use std::collections::BTreeMap;
use std::sync::Arc;

use mgcp_proto::command::{CommandProvider, MgcpCommand};
use mgcp_proto::endpoint::EndpointId;
use mgcp_proto::error::CommandError;
use mgcp_proto::message::{MgcpCommandParameterType, TransactionId, Verb};
use mgcp_proto::signal::playcollect::Ticks;

use crate::facade::EndpointManager;

/// Resolves a `Verb` to its concrete command, sharing the `EndpointManager` every verb needs to
/// resolve its target endpoint(s) and the `fdt`/`idt` defaults `RQNT` falls back to when a request
/// doesn't override them (§9 ambient config).
pub struct GatewayCommandProvider {
    manager: Arc<dyn EndpointManager>,
    default_first_digit_timer: Ticks,
    default_inter_digit_timer: Ticks,
}

impl GatewayCommandProvider {
    pub fn new(manager: Arc<dyn EndpointManager>) -> Self {
        Self::with_timer_defaults(manager, Ticks(50), Ticks(30))
    }

    pub fn with_timer_defaults(
        manager: Arc<dyn EndpointManager>,
        default_first_digit_timer: Ticks,
        default_inter_digit_timer: Ticks,
    ) -> Self {
        Self { manager, default_first_digit_timer, default_inter_digit_timer }
    }
}

impl CommandProvider for GatewayCommandProvider {
    type Command = Box<dyn MgcpCommand>;

    fn provide(
        &self,
        verb: Verb,
        transaction_id: TransactionId,
        endpoint_id: EndpointId,
        parameters: BTreeMap<MgcpCommandParameterType, String>,
    ) -> Result<Self::Command, CommandError> {
        let manager = self.manager.clone();
        let command: Box<dyn MgcpCommand> = match verb {
            Verb::Crcx => Box::new(crcx::Crcx::new(transaction_id, endpoint_id, parameters, manager)),
            Verb::Mdcx => Box::new(mdcx::Mdcx::new(transaction_id, endpoint_id, parameters, manager)),
            Verb::Dlcx => Box::new(dlcx::Dlcx::new(transaction_id, endpoint_id, manager)),
            Verb::Rqnt => Box::new(rqnt::Rqnt::new(
                transaction_id,
                endpoint_id,
                parameters,
                manager,
                self.default_first_digit_timer,
                self.default_inter_digit_timer,
            )),
            Verb::Ntfy => Box::new(ntfy::Ntfy::new(transaction_id, parameters)),
            Verb::Auep => Box::new(auep::Auep::new(transaction_id, endpoint_id, manager)),
            Verb::Aucx => Box::new(aucx::Aucx::new(transaction_id, endpoint_id, parameters, manager)),
        };
        Ok(command)
    }
}
