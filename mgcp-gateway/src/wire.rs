//! A minimal text encoding for `MgcpMessage`, used only by `gatewayd`'s UDP listener and
//! `mgcp-probe` to exchange datagrams for manual smoke-testing.
//!
//! The real MGCP wire format (RFC 3435 §3) is an external collaborator per §1 — a dedicated parser
//! supplies structured `MgcpMessage` values in production. This module is not that parser; it is a
//! small line-oriented stand-in (`VERB txid endpoint key=val,key=val`) good enough to drive the
//! mediator end to end without one.

use std::collections::BTreeMap;
use std::str::FromStr;

use mgcp_proto::endpoint::EndpointId;
use mgcp_proto::error::MgcpError;
use mgcp_proto::message::{MgcpCommandParameterType, MgcpMessage, TransactionId, Verb};

/// Parses one line of the demo wire format into a request.
///
/// Format: `VERB transaction_id endpoint_id [key=value ...]`, e.g.
/// `RQNT 147 aaln/1@gw.example.com S=AU/pc,mn=3,mx=3`.
pub fn decode_request(line: &str) -> Result<MgcpMessage, MgcpError> {
    let mut parts = line.split_whitespace();
    let verb: Verb = parts.next().ok_or(MgcpError::ProtocolError)?.parse()?;
    let transaction_id: TransactionId =
        parts.next().ok_or(MgcpError::ProtocolError)?.parse().map_err(|_| MgcpError::ProtocolError)?;
    let endpoint_id: EndpointId = parts.next().ok_or(MgcpError::ProtocolError)?.parse()?;

    let mut parameters = BTreeMap::new();
    if let Some(rest) = parts.next() {
        for kv in rest.split(',') {
            let (key, value) = kv.split_once('=').ok_or(MgcpError::ProtocolError)?;
            parameters.insert(MgcpCommandParameterType::parse(key), value.to_string());
        }
    }

    Ok(MgcpMessage::Request { verb, transaction_id, endpoint_id, parameters })
}

/// Renders a response as one line of the demo wire format: `transaction_id code [comment]
/// [key=value ...]`.
pub fn encode_response(message: &MgcpMessage) -> String {
    match message {
        MgcpMessage::Response { transaction_id, code, comment, parameters } => {
            let mut line = format!("{transaction_id} {code}");
            if let Some(comment) = comment {
                line.push(' ');
                line.push_str(comment);
            }
            if !parameters.is_empty() {
                line.push(' ');
                line.push_str(
                    &parameters
                        .iter()
                        .map(|(k, v)| format!("{k:?}={v}"))
                        .collect::<Vec<_>>()
                        .join(","),
                );
            }
            line
        }
        MgcpMessage::Request { verb, transaction_id, endpoint_id, parameters } => {
            let mut line = format!("{verb} {transaction_id} {endpoint_id}");
            if !parameters.is_empty() {
                line.push(' ');
                line.push_str(
                    &parameters
                        .iter()
                        .map(|(k, v)| format!("{k:?}={v}"))
                        .collect::<Vec<_>>()
                        .join(","),
                );
            }
            line
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_simple_request_line() {
        let msg = decode_request("AUEP 100 aaln/1@gw.example.com").unwrap();
        match msg {
            MgcpMessage::Request { verb, transaction_id, .. } => {
                assert_eq!(verb, Verb::Auep);
                assert_eq!(transaction_id, 100);
            }
            _ => panic!("expected a request"),
        }
    }

    #[test]
    fn decodes_parameters() {
        let msg = decode_request("RQNT 147 aaln/1@gw.example.com S=AU/pc,mn=3").unwrap();
        match msg {
            MgcpMessage::Request { parameters, .. } => {
                assert_eq!(parameters.get(&MgcpCommandParameterType::MinDigits), Some(&"3".to_string()));
            }
            _ => panic!("expected a request"),
        }
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(decode_request("ZZZZ 1 a@b").is_err());
    }
}
