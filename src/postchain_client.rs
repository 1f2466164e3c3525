// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Thin async REST client for a Postchain node.
//!
//! Covers the four things the relay needs from a node: named queries,
//! transaction submission, confirmation polling, and cross-chain proof
//! construction on the management chain. Everything else about the
//! ledger protocol is out of scope.

use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::codec::{transaction_rid, ContentHash, TxRid};
use crate::error::{RelayError, RelayResult};
use crate::types::{ChainRid, RawTx, SignedTx};

/// How a chain is addressed in REST paths: by its 32-byte rid, or by
/// internal id for the directory/management chain (iid 0).
#[derive(Clone, PartialEq, Eq)]
pub enum ChainRef {
    Rid(ChainRid),
    Iid(u64),
}

impl ChainRef {
    fn path_segment(&self) -> String {
        match self {
            ChainRef::Rid(rid) => rid.to_hex(),
            ChainRef::Iid(iid) => format!("iid_{iid}"),
        }
    }
}

impl fmt::Display for ChainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_segment())
    }
}

impl fmt::Debug for ChainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainRef({self})")
    }
}

#[derive(Debug, Deserialize)]
struct TxStatusResponse {
    status: String,
    #[serde(default)]
    #[serde(rename = "rejectReason")]
    reject_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Waiting,
    Confirmed,
    Rejected(String),
    Unknown,
}

#[derive(Clone)]
pub struct PostchainRestClient {
    http_client: reqwest::Client,
    node_url: String,
    chain: ChainRef,
    confirmation_poll_interval: Duration,
    confirmation_timeout: Duration,
}

fn shared_http_client() -> reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .pool_max_idle_per_host(16)
                .tcp_keepalive(Some(Duration::from_secs(30)))
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build reqwest client")
        })
        .clone()
}

fn is_transient_transport_error(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }
    let msg = err.to_string().to_lowercase();
    msg.contains("connection closed")
        || msg.contains("connection reset")
        || msg.contains("broken pipe")
        || msg.contains("unexpected eof")
}

const MAX_TRANSPORT_ATTEMPTS: usize = 3;

impl PostchainRestClient {
    pub fn new(node_url: impl Into<String>, chain: ChainRef) -> Self {
        Self {
            http_client: shared_http_client(),
            node_url: node_url.into().trim_end_matches('/').to_string(),
            chain,
            confirmation_poll_interval: Duration::from_secs(1),
            confirmation_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn chain(&self) -> &ChainRef {
        &self.chain
    }

    async fn post_json(&self, url: &str, body: &Value) -> RelayResult<Value> {
        let mut last_err: Option<RelayError> = None;

        for attempt in 0..MAX_TRANSPORT_ATTEMPTS {
            let response = match self.http_client.post(url).json(body).send().await {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt + 1 < MAX_TRANSPORT_ATTEMPTS && is_transient_transport_error(&err) {
                        warn!(
                            url,
                            attempt = attempt + 1,
                            "transient transport error, retrying"
                        );
                        last_err = Some(err.into());
                        tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                        continue;
                    }
                    return Err(err.into());
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                error!(url, %status, "node rejected request: {text}");
                return Err(RelayError::Rpc {
                    query: url.to_string(),
                    message: format!("HTTP {status}: {text}"),
                });
            }

            return Ok(response.json().await?);
        }

        Err(last_err.unwrap_or_else(|| RelayError::Transport("request failed".to_string())))
    }

    /// Run a named query against the chain. Returns `None` when the
    /// query answers null (the chain's "absent" sentinel).
    pub async fn query(&self, name: &str, args: Value) -> RelayResult<Option<Value>> {
        let url = format!("{}/query/{}", self.node_url, self.chain.path_segment());
        let mut body = json!({ "type": name });
        if let (Some(body_map), Some(args_map)) = (body.as_object_mut(), args.as_object()) {
            for (key, value) in args_map {
                body_map.insert(key.clone(), value.clone());
            }
        }
        debug!(query = name, chain = %self.chain, "running query");
        let result = self.post_json(&url, &body).await?;
        Ok(if result.is_null() { None } else { Some(result) })
    }

    /// Submit a signed transaction. Fire-and-forget: the returned rid
    /// identifies the transaction but confirmation is not awaited.
    pub async fn send_transaction(&self, tx: &SignedTx) -> RelayResult<TxRid> {
        let url = format!("{}/tx/{}", self.node_url, self.chain.path_segment());
        let body = json!({ "tx": serde_json::to_value(tx)? });
        self.post_json(&url, &body).await?;
        let rid = transaction_rid(&tx.raw)?;
        debug!(%rid, chain = %self.chain, "transaction submitted");
        Ok(rid)
    }

    /// Current status of a submitted transaction.
    pub async fn tx_status(&self, rid: &TxRid) -> RelayResult<TxStatus> {
        let url = format!(
            "{}/tx/{}/{}/status",
            self.node_url,
            self.chain.path_segment(),
            rid.to_hex()
        );
        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RelayError::Rpc {
                query: url,
                message: format!("HTTP {}", response.status()),
            });
        }
        let status: TxStatusResponse = response.json().await?;
        Ok(match status.status.as_str() {
            "waiting" => TxStatus::Waiting,
            "confirmed" => TxStatus::Confirmed,
            "rejected" => TxStatus::Rejected(status.reject_reason.unwrap_or_default()),
            _ => TxStatus::Unknown,
        })
    }

    /// Submit a signed transaction and poll until the chain accepts it.
    /// Unlike `send_transaction`, this blocks until finality or errors
    /// out on rejection/timeout.
    pub async fn send_transaction_confirmed(&self, tx: &SignedTx) -> RelayResult<TxRid> {
        let rid = self.send_transaction(tx).await?;
        let deadline = tokio::time::Instant::now() + self.confirmation_timeout;

        loop {
            match self.tx_status(&rid).await? {
                TxStatus::Confirmed => {
                    debug!(%rid, chain = %self.chain, "transaction confirmed");
                    return Ok(rid);
                }
                TxStatus::Rejected(reason) => {
                    return Err(RelayError::TxRejected {
                        rid,
                        message: reason,
                    });
                }
                TxStatus::Waiting | TxStatus::Unknown => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(RelayError::ConfirmationTimeout {
                            rid,
                            timeout_secs: self.confirmation_timeout.as_secs(),
                        });
                    }
                    tokio::time::sleep(self.confirmation_poll_interval).await;
                }
            }
        }
    }

    /// Ask the management chain to construct a cross-chain proof
    /// transaction for a confirmed transaction. The proof's first
    /// operation is what downstream transactions embed. Only meaningful
    /// on a management-chain client (iid 0).
    pub async fn fetch_proof_tx(
        &self,
        tx_rid: &TxRid,
        tx_hash: &ContentHash,
        signers: &[Vec<u8>],
        from_chain: &ChainRid,
        to_chain: &ChainRid,
    ) -> RelayResult<RawTx> {
        let signers_hex: Vec<String> = signers.iter().map(hex::encode).collect();
        let result = self
            .query(
                "iccf.get_proof_tx",
                json!({
                    "tx_rid": tx_rid.to_hex(),
                    "tx_hash": tx_hash.to_hex(),
                    "signers": signers_hex,
                    "source_blockchain_rid": from_chain.to_hex(),
                    "target_blockchain_rid": to_chain.to_hex(),
                }),
            )
            .await?
            .ok_or_else(|| {
                RelayError::MalformedProof(format!("no proof available for tx {tx_rid}"))
            })?;
        Ok(serde_json::from_value(result)?)
    }
}

impl fmt::Debug for PostchainRestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostchainRestClient")
            .field("node_url", &self.node_url)
            .field("chain", &self.chain)
            .finish()
    }
}
