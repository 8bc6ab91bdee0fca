//! The MGCP request/response message model (§3, §6).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::endpoint::EndpointId;
use crate::error::MgcpError;

/// Transaction id. Positive, unique within the mediator's sliding window (§3).
pub type TransactionId = u32;

/// Every notification carries the direction it travelled, relative to this gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

/// The verb of an inbound request. A closed enumeration so unknown verbs are rejected by the
/// parser itself rather than reaching `CommandProvider` (§9 redesign note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Crcx,
    Mdcx,
    Dlcx,
    Rqnt,
    Ntfy,
    Auep,
    Aucx,
}

impl FromStr for Verb {
    type Err = MgcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRCX" => Ok(Verb::Crcx),
            "MDCX" => Ok(Verb::Mdcx),
            "DLCX" => Ok(Verb::Dlcx),
            "RQNT" => Ok(Verb::Rqnt),
            "NTFY" => Ok(Verb::Ntfy),
            "AUEP" => Ok(Verb::Auep),
            "AUCX" => Ok(Verb::Aucx),
            _ => Err(MgcpError::ProtocolError),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Crcx => "CRCX",
            Verb::Mdcx => "MDCX",
            Verb::Dlcx => "DLCX",
            Verb::Rqnt => "RQNT",
            Verb::Ntfy => "NTFY",
            Verb::Auep => "AUEP",
            Verb::Aucx => "AUCX",
        };
        f.write_str(s)
    }
}

/// The closed vocabulary of parameter keys this controller understands, plus an escape hatch for
/// anything else so that unrecognized keys fail with `UnknownParameter` instead of being silently
/// dropped (§6).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MgcpCommandParameterType {
    CallId,
    LocalConnectionOptions,
    ConnectionMode,
    RequestedEvents,
    SignalRequests,
    NotifiedEntity,
    RequestIdentifier,
    ObservedEvents,
    ReasonCode,
    /// `Z` — the concrete endpoint id, echoed back when `$` requested allocation of any free one.
    ResolvedEndpointId,
    /// `ip` — initial prompt.
    InitialPrompt,
    /// `rp` — reprompt.
    Reprompt,
    /// `nd` — no-digits reprompt.
    NoDigitsReprompt,
    /// `fa` — failure announcement.
    FailureAnnouncement,
    /// `sa` — success announcement.
    SuccessAnnouncement,
    /// `ni` — non-interruptible initial prompt.
    NonInterruptible,
    /// `cb` — clear digit buffer.
    ClearDigitBuffer,
    /// `na` — number of attempts.
    NumAttempts,
    /// `mn` — minimum digits.
    MinDigits,
    /// `mx` — maximum digits.
    MaxDigits,
    /// `dp` — digit pattern.
    DigitPattern,
    /// `fdt` — first-digit timer.
    FirstDigitTimer,
    /// `idt` — inter-digit timer.
    InterDigitTimer,
    /// `edt` — extra-digit timer.
    ExtraDigitTimer,
    /// `rsk` — restart key.
    RestartKey,
    /// `rik` — reinput key.
    ReinputKey,
    /// `rtk` — return key.
    ReturnKey,
    /// `psk` — position key.
    PositionKey,
    /// `stk` — stop key.
    StopKey,
    /// `sik` — start input keys.
    StartInputKeys,
    /// `eik` — end input key.
    EndInputKey,
    /// `iek` — include end key in result.
    IncludeEndKey,
    /// Anything outside the above vocabulary; callers should reject these with 538.
    Unknown(String),
}

impl MgcpCommandParameterType {
    /// Parses the short key used on the wire (e.g. `"mn"`, `"CallId"`) into a parameter type.
    /// Never fails: unrecognized keys become `Unknown` so the caller decides whether that's fatal.
    pub fn parse(key: &str) -> Self {
        use MgcpCommandParameterType::*;
        match key {
            "CallId" | "C" => CallId,
            "LocalConnectionOptions" | "L" => LocalConnectionOptions,
            "ConnectionMode" | "M" => ConnectionMode,
            "RequestedEvents" | "R" => RequestedEvents,
            "SignalRequests" | "S" => SignalRequests,
            "NotifiedEntity" | "N" => NotifiedEntity,
            "RequestIdentifier" | "X" => RequestIdentifier,
            "ObservedEvents" | "O" => ObservedEvents,
            "ReasonCode" | "E" => ReasonCode,
            "ResolvedEndpointId" | "Z" => ResolvedEndpointId,
            "ip" => InitialPrompt,
            "rp" => Reprompt,
            "nd" => NoDigitsReprompt,
            "fa" => FailureAnnouncement,
            "sa" => SuccessAnnouncement,
            "ni" => NonInterruptible,
            "cb" => ClearDigitBuffer,
            "na" => NumAttempts,
            "mn" => MinDigits,
            "mx" => MaxDigits,
            "dp" => DigitPattern,
            "fdt" => FirstDigitTimer,
            "idt" => InterDigitTimer,
            "edt" => ExtraDigitTimer,
            "rsk" => RestartKey,
            "rik" => ReinputKey,
            "rtk" => ReturnKey,
            "psk" => PositionKey,
            "stk" => StopKey,
            "sik" => StartInputKeys,
            "eik" => EndInputKey,
            "iek" => IncludeEndKey,
            other => Unknown(other.to_string()),
        }
    }
}

/// A parsed, structured MGCP message — either a request destined for this controller, or a
/// response this controller produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MgcpMessage {
    Request {
        verb: Verb,
        transaction_id: TransactionId,
        endpoint_id: EndpointId,
        parameters: BTreeMap<MgcpCommandParameterType, String>,
    },
    Response {
        transaction_id: TransactionId,
        code: u16,
        comment: Option<String>,
        parameters: BTreeMap<MgcpCommandParameterType, String>,
    },
}

impl MgcpMessage {
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            MgcpMessage::Request { transaction_id, .. } => *transaction_id,
            MgcpMessage::Response { transaction_id, .. } => *transaction_id,
        }
    }

    /// Is this a terminal response, i.e. would it complete an open transaction?
    pub fn is_terminal_response(&self) -> bool {
        matches!(self, MgcpMessage::Response { .. })
    }

    pub fn response(
        transaction_id: TransactionId,
        code: u16,
        comment: impl Into<Option<String>>,
        parameters: BTreeMap<MgcpCommandParameterType, String>,
    ) -> Self {
        MgcpMessage::Response { transaction_id, code, comment: comment.into(), parameters }
    }
}
