//! Wire-independent MGCP domain model: messages, transactions, the command contract, the AU
//! package's signal framework and its `PlayCollect` state machine, the playlist, and the MEGACO
//! digit-map translator.
//!
//! Networking, configuration, and the concrete `MgcpCommand` implementations for specific verbs
//! live in `mgcp-gateway`; this crate has no tokio runtime dependency beyond `time`/`sync`, which
//! the signal framework needs for its timers and cancellation.

pub mod bus;
pub mod command;
pub mod digitmap;
pub mod endpoint;
pub mod error;
pub mod media;
pub mod message;
pub mod signal;
pub mod transaction;
