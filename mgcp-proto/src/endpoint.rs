//! Endpoint identifiers of the form `localName@domain`, including the `*` and `$` wildcards.

use std::fmt;
use std::str::FromStr;

use crate::error::MgcpError;

/// The local-name half of an endpoint identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EndpointLocalName {
    /// A concrete, already-allocated endpoint.
    Named(String),
    /// `*` — matches every endpoint for broadcast-style commands.
    Wildcard,
    /// `$` — request allocation of any free endpoint.
    AnyFree,
}

impl fmt::Display for EndpointLocalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointLocalName::Named(name) => f.write_str(name),
            EndpointLocalName::Wildcard => f.write_str("*"),
            EndpointLocalName::AnyFree => f.write_str("$"),
        }
    }
}

/// A fully-qualified endpoint identifier, `localName@domain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId {
    pub local_name: EndpointLocalName,
    pub domain: String,
}

impl EndpointId {
    pub fn named(local_name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self { local_name: EndpointLocalName::Named(local_name.into()), domain: domain.into() }
    }

    /// True if this id can match more than one concrete endpoint.
    pub fn is_wildcard(&self) -> bool {
        matches!(self.local_name, EndpointLocalName::Wildcard)
    }

    /// True if this id requests allocation of a free endpoint.
    pub fn requests_allocation(&self) -> bool {
        matches!(self.local_name, EndpointLocalName::AnyFree)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_name, self.domain)
    }
}

impl FromStr for EndpointId {
    type Err = MgcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (local, domain) = s.split_once('@').ok_or(MgcpError::ProtocolError)?;
        if local.is_empty() || domain.is_empty() {
            return Err(MgcpError::ProtocolError);
        }
        let local_name = match local {
            "*" => EndpointLocalName::Wildcard,
            "$" => EndpointLocalName::AnyFree,
            name => EndpointLocalName::Named(name.to_string()),
        };
        Ok(EndpointId { local_name, domain: domain.to_string() })
    }
}
