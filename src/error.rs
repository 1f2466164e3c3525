// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::codec::TxRid;

#[derive(Debug, Error)]
pub enum RelayError {
    // Transport-level failure talking to a node (connect, timeout, broken pipe)
    #[error("transport error: {0}")]
    Transport(String),

    // The node answered but rejected the request
    #[error("rpc error on {query}: {message}")]
    Rpc { query: String, message: String },

    // A submitted transaction was rejected by the chain
    #[error("transaction {rid} rejected: {message}")]
    TxRejected { rid: TxRid, message: String },

    // The confirming submit variant gave up waiting for finality
    #[error("transaction {rid} not confirmed within {timeout_secs}s")]
    ConfirmationTimeout { rid: TxRid, timeout_secs: u64 },

    // A proof transaction came back without the expected proof operation
    #[error("malformed proof transaction: {0}")]
    MalformedProof(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelayError {
    /// Short stable identifier for metrics labels.
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::Transport(_) => "transport",
            RelayError::Rpc { .. } => "rpc",
            RelayError::TxRejected { .. } => "tx_rejected",
            RelayError::ConfirmationTimeout { .. } => "confirmation_timeout",
            RelayError::MalformedProof(_) => "malformed_proof",
            RelayError::Serialization(_) => "serialization",
            RelayError::Storage(_) => "storage",
            RelayError::Signing(_) => "signing",
            RelayError::InvalidConfig(_) => "invalid_config",
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

impl From<rusqlite::Error> for RelayError {
    fn from(e: rusqlite::Error) -> Self {
        RelayError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_labels() {
        let errors = vec![
            (RelayError::Transport("t".to_string()), "transport"),
            (
                RelayError::Rpc {
                    query: "q".to_string(),
                    message: "m".to_string(),
                },
                "rpc",
            ),
            (
                RelayError::MalformedProof("p".to_string()),
                "malformed_proof",
            ),
            (RelayError::Serialization("s".to_string()), "serialization"),
            (RelayError::Storage("s".to_string()), "storage"),
            (RelayError::Signing("s".to_string()), "signing"),
            (RelayError::InvalidConfig("c".to_string()), "invalid_config"),
        ];
        for (error, expected) in errors {
            assert_eq!(error.error_type(), expected);
        }
    }

    /// error_type values are used as Prometheus label values and must stay
    /// lowercase/underscore-only.
    #[test]
    fn test_error_type_valid_prometheus_labels() {
        let errors = vec![
            RelayError::Transport("t".to_string()),
            RelayError::Rpc {
                query: "q".to_string(),
                message: "m".to_string(),
            },
            RelayError::Storage("s".to_string()),
            RelayError::InvalidConfig("c".to_string()),
        ];
        for error in errors {
            let label = error.error_type();
            assert!(!label.is_empty());
            assert!(label.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
            assert!(!label.starts_with('_') && !label.ends_with('_'));
        }
    }
}
