//! Error taxonomy understood by the gateway and wire back to callers as MGCP response codes.

use thiserror::Error;

/// An error that can be attached to an MGCP response.
///
/// Every variant carries the numeric code that is placed in the response's
/// status line; `code()` is what `MgcpCommand::call` and the signal
/// framework consult when building the outgoing `MgcpMessage`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MgcpError {
    /// Unsupported package or verb extension.
    #[error("unsupported extension")]
    UnknownExtension,
    /// A parameter key outside the command's declared vocabulary.
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    /// The endpoint id in the request does not resolve to a known endpoint.
    #[error("endpoint unknown")]
    EndpointUnknown,
    /// The endpoint exists but cannot currently be activated.
    #[error("endpoint not ready")]
    EndpointNotReady,
    /// Media resources (players, detectors, ports) are exhausted.
    #[error("no resources available")]
    NoResourcesAvailable,
    /// A timeout or transaction-table overflow.
    #[error("transient failure")]
    TransientFailure,
    /// The inbound request was malformed.
    #[error("protocol error")]
    ProtocolError,
    /// A signal is already running and does not permit re-activation.
    #[error("signal already executing")]
    AlreadyExecuting,
    /// Digits were collected but did not satisfy the pattern or count bounds.
    #[error("digit pattern not matched")]
    PatternNotMatched,
    /// No digits were collected before the relevant timer expired.
    #[error("no digits collected")]
    NoDigitsCollected,
    /// Too few digits were collected to satisfy `mn`.
    #[error("too few digits")]
    TooFewDigits,
    /// Catch-all for unexpected internal failures; reported as 5xx.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MgcpError {
    /// The MGCP response code this error maps to, per the taxonomy in the spec's
    /// error-handling section.
    pub fn code(&self) -> u16 {
        match self {
            MgcpError::UnknownExtension => 518,
            MgcpError::UnknownParameter(_) => 538,
            MgcpError::EndpointUnknown => 500,
            MgcpError::EndpointNotReady => 501,
            MgcpError::NoResourcesAvailable => 403,
            MgcpError::TransientFailure => 406,
            MgcpError::ProtocolError => 510,
            MgcpError::AlreadyExecuting => 528,
            MgcpError::PatternNotMatched => 327,
            MgcpError::NoDigitsCollected => 326,
            MgcpError::TooFewDigits => 328,
            MgcpError::Internal(_) => 500,
        }
    }
}

/// Error produced by `MgcpCommand::execute`/`rollback`, carrying the response code and a
/// human-readable message that is copied into the response's `comment` field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("command error {code}: {message}")]
pub struct CommandError {
    pub code: u16,
    pub message: String,
}

impl CommandError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl From<MgcpError> for CommandError {
    fn from(err: MgcpError) -> Self {
        CommandError::new(err.code(), err.to_string())
    }
}
