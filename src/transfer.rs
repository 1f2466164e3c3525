// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Three-phase transfer state machine.
//!
//! Init runs on the source chain, Apply on the destination chain,
//! Complete back on the source chain. Each phase submits one signed
//! transaction; phases 1 and 2 wait a fixed settlement delay (a
//! documented heuristic, not a confirmation check) before the confirmed
//! transaction is decoded and proven to the counter-chain. Phase 3 uses
//! the confirming submit variant since it is the terminal step.
//!
//! Operation indices are protocol-fixed: the apply operation references
//! the init transaction at index 0, the complete operation references
//! the apply transaction at index 1. Reordering the operations of either
//! transaction breaks proof addressing.

use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chain_client::{ChainClient, ChainClientInner, ProofRequest};
use crate::codec::{content_hash, serialize_token_metadata, transaction_rid};
use crate::error::{RelayError, RelayResult};
use crate::metrics::RelayMetrics;
use crate::signer::OracleSigner;
use crate::types::{Operation, RawTx, SignedTx, SourceEvent, TransferIntent};

pub const INIT_TRANSFER_OP: &str = "yours.init_oracle_transfer";
pub const APPLY_TRANSFER_OP: &str = "yours.apply_transfer";
pub const COMPLETE_TRANSFER_OP: &str = "yours.complete_transfer";

/// Position of the init operation inside the init transaction.
pub const INIT_OP_INDEX: u64 = 0;
/// Position of the apply operation inside the apply transaction (the
/// proof delivery operation sits at index 0).
pub const APPLY_OP_INDEX: u64 = 1;

/// The protocol moves whole non-fungible units only.
pub const TRANSFER_QUANTITY: u64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferPhase {
    Idle,
    InitSent,
    InitConfirmed,
    ApplySent,
    ApplyConfirmed,
    CompleteSent,
    Done,
}

impl TransferPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPhase::Idle => "idle",
            TransferPhase::InitSent => "init_sent",
            TransferPhase::InitConfirmed => "init_confirmed",
            TransferPhase::ApplySent => "apply_sent",
            TransferPhase::ApplyConfirmed => "apply_confirmed",
            TransferPhase::CompleteSent => "complete_sent",
            TransferPhase::Done => "done",
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The owner's external address resolves to no account on the
    /// destination chain.
    NoDestinationAccount,
    /// The destination chain has no mirrored record for the token.
    NoMirroredToken,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoDestinationAccount => "no_destination_account",
            SkipReason::NoMirroredToken => "no_mirror",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    Skipped(SkipReason),
}

pub struct TransferMachine<P> {
    source: Arc<ChainClient<P>>,
    destination: Arc<ChainClient<P>>,
    /// Directory/management connection, used only for proof construction.
    management: Arc<ChainClient<P>>,
    signer: Arc<OracleSigner>,
    settlement_delay: Duration,
    metrics: Arc<RelayMetrics>,
}

impl<P: ChainClientInner> TransferMachine<P> {
    pub fn new(
        source: Arc<ChainClient<P>>,
        destination: Arc<ChainClient<P>>,
        management: Arc<ChainClient<P>>,
        signer: Arc<OracleSigner>,
        settlement_delay: Duration,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            source,
            destination,
            management,
            signer,
            settlement_delay,
            metrics,
        }
    }

    /// Drive one event through the protocol. Any error aborts the
    /// attempt without persisting partial progress; the caller decides
    /// whether the watermark advances.
    pub async fn run(&self, event: &SourceEvent) -> RelayResult<TransferOutcome> {
        let Some(to_account) = self
            .destination
            .account_by_signer(&event.owner_external_address)
            .await?
        else {
            // The owner has no account on the destination chain. Handing
            // the init operation an unresolved account would produce an
            // invalid transaction, so this is an explicit skip.
            warn!(
                event_id = event.rowid,
                token_id = event.token.token_id,
                chain = self.destination.label(),
                "no destination account for owner external address, skipping transfer"
            );
            self.metrics
                .events_skipped
                .with_label_values(&[SkipReason::NoDestinationAccount.as_str()])
                .inc();
            return Ok(TransferOutcome::Skipped(SkipReason::NoDestinationAccount));
        };

        let intent = TransferIntent {
            event: event.clone(),
            to_account,
        };

        let (init_tx, init_proof_op) = self.init_phase(&intent).await?;
        let (apply_tx, apply_proof_op) = self.apply_phase(&intent, &init_tx, init_proof_op).await?;
        self.complete_phase(&intent, &apply_tx, apply_proof_op)
            .await?;

        info!(
            event_id = intent.event.rowid,
            token_id = intent.event.token.token_id,
            phase = %TransferPhase::Done,
            "transfer complete"
        );
        Ok(TransferOutcome::Completed)
    }

    /// Phase 1: initiate the transfer on the source chain and prove it
    /// to the destination chain.
    async fn init_phase(&self, intent: &TransferIntent) -> RelayResult<(SignedTx, Operation)> {
        let started = Instant::now();
        let event = &intent.event;

        let raw = RawTx {
            operations: vec![Operation::new(
                INIT_TRANSFER_OP,
                vec![
                    json!(event.owner_account_id.to_hex()),
                    json!(self.destination.chain_rid().to_hex()),
                    json!(intent.to_account.to_hex()),
                    json!(event.token.token_id),
                    json!(TRANSFER_QUANTITY),
                    json!(hex::encode(serialize_token_metadata(
                        &event.token.metadata
                    )?)),
                ],
            )],
            signers: vec![self.signer.public_key()],
        };

        let signed = self.source.sign_and_submit(raw, &self.signer).await?;
        info!(
            event_id = event.rowid,
            token_id = event.token.token_id,
            phase = %TransferPhase::InitSent,
            chain = self.source.label(),
            "transfer initiated on source chain"
        );

        self.wait_settlement().await;

        let proof_op = self
            .prove(&signed, self.source.chain_rid(), self.destination.chain_rid())
            .await?;
        debug!(
            event_id = event.rowid,
            phase = %TransferPhase::InitConfirmed,
            "init proof fetched"
        );

        self.observe_phase("init", started);
        Ok((signed, proof_op))
    }

    /// Phase 2: deliver the init proof to the destination chain and
    /// apply the transfer there, then prove the apply transaction back
    /// to the source chain.
    async fn apply_phase(
        &self,
        intent: &TransferIntent,
        init_tx: &SignedTx,
        init_proof_op: Operation,
    ) -> RelayResult<(SignedTx, Operation)> {
        let started = Instant::now();
        let event = &intent.event;

        let raw = RawTx {
            operations: vec![
                init_proof_op,
                Operation::new(
                    APPLY_TRANSFER_OP,
                    vec![
                        serde_json::to_value(init_tx.decode())?,
                        json!(INIT_OP_INDEX),
                    ],
                ),
            ],
            signers: vec![self.signer.public_key()],
        };

        let signed = self.destination.sign_and_submit(raw, &self.signer).await?;
        info!(
            event_id = event.rowid,
            token_id = event.token.token_id,
            phase = %TransferPhase::ApplySent,
            chain = self.destination.label(),
            "transfer applied on destination chain"
        );

        self.wait_settlement().await;

        let proof_op = self
            .prove(&signed, self.destination.chain_rid(), self.source.chain_rid())
            .await?;
        debug!(
            event_id = event.rowid,
            phase = %TransferPhase::ApplyConfirmed,
            "apply proof fetched"
        );

        self.observe_phase("apply", started);
        Ok((signed, proof_op))
    }

    /// Phase 3: close out the transfer on the source chain. Uses the
    /// confirming submit variant so the caller gets a definitive
    /// success/failure signal for the terminal step.
    async fn complete_phase(
        &self,
        intent: &TransferIntent,
        apply_tx: &SignedTx,
        apply_proof_op: Operation,
    ) -> RelayResult<()> {
        let started = Instant::now();
        let event = &intent.event;

        let raw = RawTx {
            operations: vec![
                apply_proof_op,
                Operation::new(
                    COMPLETE_TRANSFER_OP,
                    vec![
                        serde_json::to_value(apply_tx.decode())?,
                        json!(APPLY_OP_INDEX),
                    ],
                ),
            ],
            signers: vec![self.signer.public_key()],
        };

        self.source
            .sign_and_submit_confirmed(raw, &self.signer)
            .await?;
        info!(
            event_id = event.rowid,
            token_id = event.token.token_id,
            phase = %TransferPhase::CompleteSent,
            chain = self.source.label(),
            "transfer completion confirmed on source chain"
        );

        self.observe_phase("complete", started);
        Ok(())
    }

    /// Decode a submitted transaction, derive its rid and content hash,
    /// and fetch the proof operation addressed from `from` to `to`.
    async fn prove(
        &self,
        signed: &SignedTx,
        from: &crate::types::ChainRid,
        to: &crate::types::ChainRid,
    ) -> RelayResult<Operation> {
        let raw = signed.decode();
        let request = ProofRequest {
            tx_rid: transaction_rid(raw)?,
            tx_hash: content_hash(raw)?,
            signers: vec![self.signer.public_key()],
            from_chain: from.clone(),
            to_chain: to.clone(),
        };
        let proof_tx = self.management.fetch_proof(&request).await?;
        proof_tx.operations.into_iter().next().ok_or_else(|| {
            RelayError::MalformedProof(format!(
                "proof transaction for {} carries no operations",
                request.tx_rid
            ))
        })
    }

    async fn wait_settlement(&self) {
        if !self.settlement_delay.is_zero() {
            debug!(
                delay_secs = self.settlement_delay.as_secs(),
                "waiting for settlement"
            );
            tokio::time::sleep(self.settlement_delay).await;
        }
    }

    fn observe_phase(&self, phase: &str, started: Instant) {
        self.metrics
            .transfer_phase_latency
            .with_label_values(&[phase])
            .observe(started.elapsed().as_secs_f64());
    }
}
