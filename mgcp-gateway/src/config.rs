//! Gateway configuration: transaction timeout, duplicate-suppression buffer size, and the
//! domain/transport the listener answers as (§9 ambient stack).
//!
//! Layered the way `kimberlite-config`'s `ConfigLoader` is: built-in defaults, then an optional
//! TOML file, then `MGCP_`-prefixed environment variables, then `clap` flags on top of all of it
//! (applied by the caller in `bin/gatewayd.rs`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mediator::MediatorConfig;

/// Transport the gateway listens on. A real deployment binds a UDP socket (MGCP's usual
/// transport); `mgcp-probe` and the test suite also drive the mediator directly in-process without
/// any transport at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Transport {
    Udp { bind: String },
    Unix { path: String },
}

impl Default for Transport {
    fn default() -> Self {
        Transport::Udp { bind: "0.0.0.0:2427".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub transport: Transport,
    /// The domain half of endpoint ids this gateway answers for.
    pub domain: String,
    /// `T_transaction` in milliseconds (§4.3). Default 30_000.
    pub transaction_timeout_ms: u64,
    /// Capacity of the mediator's "recently completed" duplicate-suppression buffer (§4.3).
    /// Default 256.
    pub recently_completed_capacity: usize,
    /// Default first-digit timer in 100ms ticks, used when a `RQNT` doesn't override `fdt`.
    pub default_first_digit_timer: u32,
    /// Default inter-digit timer in 100ms ticks, used when a `RQNT` doesn't override `idt`.
    pub default_inter_digit_timer: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            domain: "gw.example.com".to_string(),
            transaction_timeout_ms: 30_000,
            recently_completed_capacity: 256,
            default_first_digit_timer: 50,
            default_inter_digit_timer: 30,
        }
    }
}

impl GatewayConfig {
    pub fn mediator_config(&self) -> MediatorConfig {
        MediatorConfig {
            transaction_timeout: Duration::from_millis(self.transaction_timeout_ms),
            recently_completed_capacity: self.recently_completed_capacity,
        }
    }

    /// Loads defaults, then an optional TOML file at `path`, then `MGCP_`-prefixed environment
    /// variables, in that order of increasing precedence.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        builder = builder.add_source(config::Config::try_from(&GatewayConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("MGCP").separator("_").try_parsing(true));
        let built = builder.build()?;
        Ok(built.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_loadable_with_no_file() {
        let config = GatewayConfig::load(None).unwrap();
        assert_eq!(config.transaction_timeout_ms, 30_000);
        assert_eq!(config.recently_completed_capacity, 256);
    }
}
