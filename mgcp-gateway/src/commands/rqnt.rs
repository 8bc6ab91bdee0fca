//! `RQNT` — request notification.
//!
//! The one verb that actually creates and activates an AU-package signal. `S:` (`SignalRequests`)
//! names the requested signal as `package/symbol`; this controller recognizes only `AU/pc`
//! (`PlayCollect`, §4.6). Any other package is `UnknownExtension` (518); any other AU symbol is
//! the same, since `PlayCollect` is the only AU signal this controller implements (§1 scope).
//! Everything else in the request (`RequestedEvents`, `NotifiedEntity`) is accepted but otherwise
//! inert — wiring event subscriptions up to the call agent's notification policy is call-control
//! territory, out of scope per §1.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use mgcp_proto::command::{MgcpCommand, MgcpCommandResult};
use mgcp_proto::endpoint::EndpointId;
use mgcp_proto::error::{CommandError, MgcpError};
use mgcp_proto::message::{MgcpCommandParameterType as P, TransactionId};
use mgcp_proto::signal::playcollect::{PlayCollect, PlayCollectParams, Ticks};
use mgcp_proto::signal::Signal;

use crate::facade::EndpointManager;

pub struct Rqnt {
    transaction_id: TransactionId,
    endpoint_id: EndpointId,
    parameters: BTreeMap<P, String>,
    manager: Arc<dyn EndpointManager>,
    default_first_digit_timer: Ticks,
    default_inter_digit_timer: Ticks,
}

impl Rqnt {
    pub fn new(
        transaction_id: TransactionId,
        endpoint_id: EndpointId,
        parameters: BTreeMap<P, String>,
        manager: Arc<dyn EndpointManager>,
        default_first_digit_timer: Ticks,
        default_inter_digit_timer: Ticks,
    ) -> Self {
        Self {
            transaction_id,
            endpoint_id,
            parameters,
            manager,
            default_first_digit_timer,
            default_inter_digit_timer,
        }
    }

    /// Splits `"AU/pc"` (or bare `"pc"`, defaulting to the `AU` package) into `(package, symbol)`.
    /// A request can name at most one signal in this controller's scope; multiple comma-separated
    /// requests are accepted by the grammar but only the first is activated, matching the single
    /// `TimeOut` signal an endpoint can run at a time (§5).
    fn requested_signal(raw: &str) -> Option<(String, String)> {
        let first = raw.split(',').map(str::trim).find(|s| !s.is_empty())?;
        match first.split_once('/') {
            Some((pkg, sym)) => Some((pkg.to_string(), sym.to_string())),
            None => Some(("AU".to_string(), first.to_string())),
        }
    }
}

#[async_trait]
impl MgcpCommand for Rqnt {
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

        let Some(raw_signal) = self.parameters.get(&P::SignalRequests) else {
            return Ok(MgcpCommandResult::success(self.transaction_id, 200));
        };

        let Some((package, symbol)) = Self::requested_signal(raw_signal) else {
            return Ok(MgcpCommandResult::success(self.transaction_id, 200));
        };

        if package != "AU" || symbol != "pc" {
            return Err(CommandError::from(MgcpError::UnknownExtension));
        }

        let params = PlayCollectParams::parse_with_timer_defaults(
            &self.parameters,
            self.default_first_digit_timer,
            self.default_inter_digit_timer,
        )?;

        let handles = self.manager.resolve(&self.endpoint_id).await.map_err(CommandError::from)?;
        if handles.is_empty() {
            return Err(CommandError::from(MgcpError::EndpointUnknown));
        }

        let mut last_err = None;
        let mut activated = 0u32;
        for handle in &handles {
            let (player, detector) = handle.new_media();
            let signal: Box<dyn Signal> = Box::new(PlayCollect::new(params.clone(), player, detector));
            match handle.activate_signal(signal).await {
                Ok(()) => activated += 1,
                Err(e) => last_err = Some(e),
            }
        }

        if activated == 0 {
            if let Some(e) = last_err {
                return Err(CommandError::from(e));
            }
        }

        Ok(MgcpCommandResult::success(self.transaction_id, 200))
    }

    async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
        MgcpCommandResult::failure(self.transaction_id, error)
    }

    fn reset(&mut self) {}
}
