// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Poll-cycle driver.
//!
//! One cycle handles at most one event: fetch the next row after the
//! current watermark, decide skip-or-transfer, durably record the row.
//! A backlog drains at one event per tick; no batching. The watermark
//! advances for skipped events too, so a token without a destination
//! mirror or account is consulted exactly once and never blocks the
//! feed.
//!
//! Cycles never overlap. A cycle that would start while the previous
//! one is still in flight is dropped, not queued.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain_client::{ChainClient, ChainClientInner};
use crate::error::RelayResult;
use crate::metrics::RelayMetrics;
use crate::progress_store::ProgressStore;
use crate::transfer::{SkipReason, TransferMachine, TransferOutcome};
use crate::types::SourceEvent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle ran; `events` is 0 (empty feed) or 1.
    Ran { events: u64 },
    /// A previous cycle was still running.
    SkippedOverlap,
}

pub struct RelayDriver<P> {
    source: Arc<ChainClient<P>>,
    destination: Arc<ChainClient<P>>,
    machine: TransferMachine<P>,
    store: Arc<ProgressStore>,
    metrics: Arc<RelayMetrics>,
    // Held for the duration of a cycle; try_lock failure means overlap.
    pub(crate) cycle_lock: tokio::sync::Mutex<()>,
}

impl<P: ChainClientInner> RelayDriver<P> {
    pub fn new(
        source: Arc<ChainClient<P>>,
        destination: Arc<ChainClient<P>>,
        machine: TransferMachine<P>,
        store: Arc<ProgressStore>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            source,
            destination,
            machine,
            store,
            metrics,
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one poll cycle. Errors abort the cycle before the failing
    /// event's row is recorded, so the next cycle retries it.
    pub async fn run_cycle(&self) -> RelayResult<CycleOutcome> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            warn!("previous poll cycle still in flight, skipping this tick");
            self.metrics.cycles_skipped_inflight.inc();
            return Ok(CycleOutcome::SkippedOverlap);
        };
        self.metrics.cycles_total.inc();

        let watermark = self.store.last_processed().await?.unwrap_or(0);

        // At most one event per cycle; a backlog drains across ticks.
        let Some(event) = self.source.next_token_after(watermark).await? else {
            return Ok(CycleOutcome::Ran { events: 0 });
        };

        debug!(
            event_id = event.rowid,
            token_id = event.token.token_id,
            collection = %event.token.collection,
            "processing source event"
        );
        self.process_event(&event).await?;

        // Recorded only after the event is fully handled; a crash
        // before this point replays the event on restart.
        self.store.record_processed(event.rowid).await?;
        self.metrics.events_processed.inc();
        self.metrics
            .last_processed_rowid
            .set(i64::try_from(event.rowid).unwrap_or(i64::MAX));

        info!(event_id = event.rowid, "poll cycle processed one event");
        Ok(CycleOutcome::Ran { events: 1 })
    }

    /// Decide skip-or-transfer for one event. The mirror check runs
    /// against the destination chain; absence is an expected outcome,
    /// not an error.
    async fn process_event(&self, event: &SourceEvent) -> RelayResult<()> {
        let mirrored = self
            .destination
            .mirrored_token(&event.chain, &event.contract, event.token.token_id)
            .await?;

        if mirrored.is_none() {
            debug!(
                event_id = event.rowid,
                token_id = event.token.token_id,
                chain = self.destination.label(),
                "token has no destination mirror, skipping"
            );
            self.metrics
                .events_skipped
                .with_label_values(&[SkipReason::NoMirroredToken.as_str()])
                .inc();
            return Ok(());
        }

        match self.machine.run(event).await? {
            TransferOutcome::Completed => {
                self.metrics.transfers_completed.inc();
            }
            TransferOutcome::Skipped(_) => {
                // Already logged and metered by the transfer machine.
            }
        }
        Ok(())
    }
}
