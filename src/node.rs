// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Relay node lifecycle.
//!
//! A single poller task ticks at the configured interval and runs one
//! poll cycle per tick. Missed ticks are skipped rather than queued (a
//! long cycle never causes a burst of catch-up cycles) and the first
//! tick fires one full period after startup. Cancellation stops the
//! poller at the next await point.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::chain_client::ChainClientInner;
use crate::config::RelayContext;
use crate::driver::RelayDriver;
use crate::error::RelayResult;

/// Spawn the poller task. A cycle failure is logged and the loop keeps
/// going; the watermark guarantees the failed event is retried on the
/// next tick.
pub fn spawn_poller<P>(
    driver: Arc<RelayDriver<P>>,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    P: ChainClientInner + 'static,
{
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + poll_interval;
        let mut interval = tokio::time::interval_at(start, poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("poller shutting down");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = driver.run_cycle().await {
                        error!(error = %e, error_type = e.error_type(), "poll cycle failed");
                    }
                }
            }
        }
    })
}

/// Run the relay node until cancelled. Blocks the caller for the node's
/// whole lifetime.
pub async fn run_relay_node(context: RelayContext, cancel: CancellationToken) -> RelayResult<()> {
    context.store.initialize().await?;

    let driver = Arc::new(RelayDriver::new(
        context.source,
        context.destination,
        context.machine,
        context.store,
        context.metrics,
    ));

    info!(
        poll_interval_secs = context.poll_interval.as_secs(),
        "relay node started"
    );
    let poller = spawn_poller(driver, context.poll_interval, cancel);
    if let Err(e) = poller.await {
        error!(error = %e, "poller task panicked");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_client::ChainClient;
    use crate::metrics::RelayMetrics;
    use crate::mock_chain_client::MockChainClient;
    use crate::progress_store::ProgressStore;
    use crate::signer::OracleSigner;
    use crate::transfer::TransferMachine;
    use crate::types::ChainRid;

    const TEST_KEY: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    async fn test_driver() -> (Arc<RelayDriver<MockChainClient>>, Arc<RelayMetrics>) {
        let metrics = Arc::new(RelayMetrics::new_for_testing());
        let source = Arc::new(ChainClient::new(
            MockChainClient::new(),
            ChainRid([1; 32]),
            "source",
            metrics.clone(),
        ));
        let destination = Arc::new(ChainClient::new(
            MockChainClient::new(),
            ChainRid([2; 32]),
            "destination",
            metrics.clone(),
        ));
        let management = Arc::new(ChainClient::new(
            MockChainClient::new(),
            ChainRid([0; 32]),
            "management",
            metrics.clone(),
        ));
        let machine = TransferMachine::new(
            source.clone(),
            destination.clone(),
            management,
            Arc::new(OracleSigner::from_hex(TEST_KEY).unwrap()),
            Duration::ZERO,
            metrics.clone(),
        );
        let store = Arc::new(ProgressStore::open_in_memory().unwrap());
        store.initialize().await.unwrap();
        (
            Arc::new(RelayDriver::new(
                source,
                destination,
                machine,
                store,
                metrics.clone(),
            )),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_poller_ticks_and_stops_on_cancel() {
        let (driver, metrics) = test_driver().await;
        let cancel = CancellationToken::new();
        let handle = spawn_poller(driver, Duration::from_millis(10), cancel.clone());

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop after cancellation")
            .unwrap();

        assert!(metrics.cycles_total.get() >= 1);
    }

    #[tokio::test]
    async fn test_cancel_before_first_tick_runs_no_cycle() {
        let (driver, metrics) = test_driver().await;
        let cancel = CancellationToken::new();
        let handle = spawn_poller(driver, Duration::from_secs(60), cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop after cancellation")
            .unwrap();

        assert_eq!(metrics.cycles_total.get(), 0);
    }
}
