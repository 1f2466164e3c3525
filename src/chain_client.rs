// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chain client facade.
//!
//! `ChainClientInner` is the seam between the relay and one ledger
//! connection; the production implementation speaks REST, tests plug in
//! a mock. `ChainClient` wraps an inner with the chain identity, metrics
//! and the typed queries the driver and transfer machine consume.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::codec::{ContentHash, TxRid};
use crate::error::{RelayError, RelayResult};
use crate::metrics::RelayMetrics;
use crate::postchain_client::PostchainRestClient;
use crate::signer::OracleSigner;
use crate::types::{AccountId, ChainRid, ContractId, ExternalAddress, RawTx, SignedTx, SourceEvent};

/// Request for a cross-chain proof of a confirmed transaction,
/// addressed from one chain to another. Direction matters: the proof is
/// only consumable on the `to_chain`.
#[derive(Clone, Debug)]
pub struct ProofRequest {
    pub tx_rid: TxRid,
    pub tx_hash: ContentHash,
    pub signers: Vec<Vec<u8>>,
    pub from_chain: ChainRid,
    pub to_chain: ChainRid,
}

/// One ledger connection, reduced to what the relay needs.
#[async_trait]
pub trait ChainClientInner: Send + Sync {
    type Error: Into<RelayError> + Send;

    /// Named query; `None` means the chain answered "absent".
    async fn query(&self, name: &str, args: Value) -> Result<Option<Value>, Self::Error>;

    /// Fire-and-forget submission; settlement is assumed externally.
    async fn submit_transaction(&self, tx: &SignedTx) -> Result<TxRid, Self::Error>;

    /// Blocking submission; returns only once the chain accepted the
    /// transaction (or rejects/times out).
    async fn submit_and_confirm(&self, tx: &SignedTx) -> Result<TxRid, Self::Error>;

    /// Construct a cross-chain proof transaction. Only the management
    /// connection implements this meaningfully.
    async fn fetch_cross_chain_proof(&self, request: &ProofRequest)
        -> Result<RawTx, Self::Error>;
}

pub struct ChainClient<P> {
    inner: P,
    chain_rid: ChainRid,
    /// Human-readable role of this connection ("source", "destination",
    /// "management"), used in logs and metric labels.
    label: String,
    metrics: Arc<RelayMetrics>,
}

impl<P: ChainClientInner> ChainClient<P> {
    pub fn new(inner: P, chain_rid: ChainRid, label: &str, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            inner,
            chain_rid,
            label: label.to_string(),
            metrics,
        }
    }

    pub fn new_for_testing(inner: P, chain_rid: ChainRid, label: &str) -> Self {
        Self::new(
            inner,
            chain_rid,
            label,
            Arc::new(RelayMetrics::new_for_testing()),
        )
    }

    pub fn chain_rid(&self) -> &ChainRid {
        &self.chain_rid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn record_err(&self, err: RelayError) -> RelayError {
        self.metrics
            .rpc_errors
            .with_label_values(&[&self.label, err.error_type()])
            .inc();
        err
    }

    async fn query(&self, name: &str, args: Value) -> RelayResult<Option<Value>> {
        self.inner
            .query(name, args)
            .await
            .map_err(|e| self.record_err(e.into()))
    }

    /// Next token event strictly after the given row identifier, or
    /// `None` when the feed is exhausted. One event at a time, ordered
    /// by rowid ascending.
    pub async fn next_token_after(&self, rowid: u64) -> RelayResult<Option<SourceEvent>> {
        let result = self
            .query("tokens.get_token_after", json!({ "rowid": rowid }))
            .await?;
        result
            .map(|row| serde_json::from_value(row).map_err(RelayError::from))
            .transpose()
    }

    /// Mirrored record for {chain, contract, token id} on this chain, or
    /// `None` when the token is not (yet) known here.
    pub async fn mirrored_token(
        &self,
        chain: &str,
        contract: &ContractId,
        token_id: u64,
    ) -> RelayResult<Option<Value>> {
        self.query(
            "yours.external.get_token",
            json!({
                "chain": chain,
                "contract": contract.to_hex(),
                "token_id": token_id,
            }),
        )
        .await
    }

    /// Resolve the account registered for an external address on this
    /// chain. Only the first page's first entry is consulted, by design.
    pub async fn account_by_signer(
        &self,
        external_address: &ExternalAddress,
    ) -> RelayResult<Option<AccountId>> {
        #[derive(Deserialize)]
        struct AccountRow {
            id: AccountId,
        }
        #[derive(Deserialize)]
        struct AccountPage {
            data: Vec<AccountRow>,
        }

        let result = self
            .query(
                "ft4.get_accounts_by_signer",
                json!({
                    "id": external_address.to_hex(),
                    "page_size": 1,
                    "page_cursor": null,
                }),
            )
            .await?;

        let Some(page) = result else {
            return Ok(None);
        };
        let page: AccountPage = serde_json::from_value(page)?;
        Ok(page.data.into_iter().next().map(|row| row.id))
    }

    /// Sign a transaction body with the oracle identity and submit it.
    /// Returns the signed transaction so callers can decode it for
    /// rid/hash derivation and downstream proof arguments.
    pub async fn sign_and_submit(
        &self,
        raw: RawTx,
        signer: &OracleSigner,
    ) -> RelayResult<SignedTx> {
        let signed = signer.sign_transaction(raw)?;
        self.inner
            .submit_transaction(&signed)
            .await
            .map_err(|e| self.record_err(e.into()))?;
        self.metrics
            .transactions_submitted
            .with_label_values(&[&self.label])
            .inc();
        Ok(signed)
    }

    /// Like `sign_and_submit` but blocks until on-chain acceptance.
    pub async fn sign_and_submit_confirmed(
        &self,
        raw: RawTx,
        signer: &OracleSigner,
    ) -> RelayResult<SignedTx> {
        let signed = signer.sign_transaction(raw)?;
        self.inner
            .submit_and_confirm(&signed)
            .await
            .map_err(|e| self.record_err(e.into()))?;
        self.metrics
            .transactions_submitted
            .with_label_values(&[&self.label])
            .inc();
        Ok(signed)
    }

    /// Fetch a cross-chain proof transaction via this connection.
    pub async fn fetch_proof(&self, request: &ProofRequest) -> RelayResult<RawTx> {
        self.inner
            .fetch_cross_chain_proof(request)
            .await
            .map_err(|e| self.record_err(e.into()))
    }
}

#[async_trait]
impl ChainClientInner for PostchainRestClient {
    type Error = RelayError;

    async fn query(&self, name: &str, args: Value) -> Result<Option<Value>, Self::Error> {
        PostchainRestClient::query(self, name, args).await
    }

    async fn submit_transaction(&self, tx: &SignedTx) -> Result<TxRid, Self::Error> {
        self.send_transaction(tx).await
    }

    async fn submit_and_confirm(&self, tx: &SignedTx) -> Result<TxRid, Self::Error> {
        self.send_transaction_confirmed(tx).await
    }

    async fn fetch_cross_chain_proof(
        &self,
        request: &ProofRequest,
    ) -> Result<RawTx, Self::Error> {
        self.fetch_proof_tx(
            &request.tx_rid,
            &request.tx_hash,
            &request.signers,
            &request.from_chain,
            &request.to_chain,
        )
        .await
    }
}
