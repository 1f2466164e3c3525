// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, HistogramVec,
    IntCounter, IntCounterVec, IntGauge, Registry,
};

const PHASE_LATENCY_SEC_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0, 45.0, 60.0, 90.0, 120.0, 180.0,
    300.0,
];

#[derive(Clone, Debug)]
pub struct RelayMetrics {
    /// Poll cycles started (including no-op cycles).
    pub(crate) cycles_total: IntCounter,
    /// Cycles skipped because the previous one was still in flight.
    pub(crate) cycles_skipped_inflight: IntCounter,
    /// Events fully processed (watermark advanced).
    pub(crate) events_processed: IntCounter,
    /// Events skipped without a transfer, by reason.
    pub(crate) events_skipped: IntCounterVec,
    /// Transfers driven through all three phases.
    pub(crate) transfers_completed: IntCounter,
    /// Transactions submitted, by chain label.
    pub(crate) transactions_submitted: IntCounterVec,
    /// RPC failures, by chain label and error type.
    pub(crate) rpc_errors: IntCounterVec,
    /// Highest source row identifier recorded as processed.
    pub(crate) last_processed_rowid: IntGauge,
    /// Wall time per transfer phase.
    pub(crate) transfer_phase_latency: HistogramVec,
}

impl RelayMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            cycles_total: register_int_counter_with_registry!(
                "relay_cycles_total",
                "Total number of poll cycles started",
                registry,
            )
            .unwrap(),
            cycles_skipped_inflight: register_int_counter_with_registry!(
                "relay_cycles_skipped_inflight",
                "Poll cycles skipped because a previous cycle was still running",
                registry,
            )
            .unwrap(),
            events_processed: register_int_counter_with_registry!(
                "relay_events_processed",
                "Source events fully processed and recorded in the watermark",
                registry,
            )
            .unwrap(),
            events_skipped: register_int_counter_vec_with_registry!(
                "relay_events_skipped",
                "Source events processed without a transfer, by reason",
                &["reason"],
                registry,
            )
            .unwrap(),
            transfers_completed: register_int_counter_with_registry!(
                "relay_transfers_completed",
                "Transfers driven through init, apply and complete",
                registry,
            )
            .unwrap(),
            transactions_submitted: register_int_counter_vec_with_registry!(
                "relay_transactions_submitted",
                "Signed transactions submitted, by chain",
                &["chain"],
                registry,
            )
            .unwrap(),
            rpc_errors: register_int_counter_vec_with_registry!(
                "relay_rpc_errors",
                "RPC failures, by chain and error type",
                &["chain", "error_type"],
                registry,
            )
            .unwrap(),
            last_processed_rowid: register_int_gauge_with_registry!(
                "relay_last_processed_rowid",
                "Highest source row identifier recorded as processed",
                registry,
            )
            .unwrap(),
            transfer_phase_latency: register_histogram_vec_with_registry!(
                "relay_transfer_phase_latency_seconds",
                "Wall time spent in each transfer phase",
                &["phase"],
                PHASE_LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        Self::new(&Registry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_for_testing_registers_cleanly() {
        // Each call uses a fresh registry, so repeated construction must not
        // collide on metric names.
        let _a = RelayMetrics::new_for_testing();
        let _b = RelayMetrics::new_for_testing();
    }

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = RelayMetrics::new_for_testing();
        assert_eq!(metrics.cycles_total.get(), 0);
        assert_eq!(metrics.transfers_completed.get(), 0);
        assert_eq!(metrics.last_processed_rowid.get(), 0);
    }
}
