// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Node configuration.
//!
//! All knobs arrive via CLI flags or environment variables and are
//! validated once at startup into a `RelayContext`. Nothing downstream
//! re-parses strings or lazily constructs connections.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::chain_client::ChainClient;
use crate::error::{RelayError, RelayResult};
use crate::metrics::RelayMetrics;
use crate::postchain_client::{ChainRef, PostchainRestClient};
use crate::progress_store::ProgressStore;
use crate::signer::OracleSigner;
use crate::transfer::TransferMachine;
use crate::types::ChainRid;

#[derive(Debug, Parser)]
#[clap(name = "yours-oracle-relay", about = "Cross-chain token transfer relay")]
pub struct RelayNodeConfig {
    /// REST endpoint of a node serving the source chain.
    #[clap(long, env = "RELAY_SOURCE_NODE_URL")]
    pub source_node_url: String,

    /// Blockchain rid of the source chain, hex.
    #[clap(long, env = "RELAY_SOURCE_CHAIN_RID")]
    pub source_chain_rid: String,

    /// REST endpoint of a node serving the destination chain.
    #[clap(long, env = "RELAY_DESTINATION_NODE_URL")]
    pub destination_node_url: String,

    /// Blockchain rid of the destination chain, hex.
    #[clap(long, env = "RELAY_DESTINATION_CHAIN_RID")]
    pub destination_chain_rid: String,

    /// REST endpoint of a node serving the directory/management chain
    /// (chain iid 0), used for cross-chain proof construction.
    #[clap(long, env = "RELAY_DIRECTORY_NODE_URL")]
    pub directory_node_url: String,

    /// Oracle signing key, 32 bytes hex.
    #[clap(long, env = "RELAY_ORACLE_KEY", hide_env_values = true)]
    pub oracle_key: String,

    /// Path of the sqlite watermark database.
    #[clap(long, env = "RELAY_DB_PATH", default_value = "relay.sqlite")]
    pub db_path: PathBuf,

    /// Seconds between poll cycles.
    #[clap(long, env = "RELAY_POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Seconds to wait after phase 1 and 2 submissions before requesting
    /// a proof. A settlement heuristic, not a confirmation check.
    #[clap(long, env = "RELAY_SETTLEMENT_DELAY_SECS", default_value_t = 10)]
    pub settlement_delay_secs: u64,

    /// Seconds to wait for the terminal completion transaction to confirm.
    #[clap(long, env = "RELAY_CONFIRMATION_TIMEOUT_SECS", default_value_t = 60)]
    pub confirmation_timeout_secs: u64,

    /// Listen address for the prometheus /metrics endpoint.
    #[clap(long, env = "RELAY_METRICS_ADDRESS", default_value = "0.0.0.0:9184")]
    pub metrics_address: String,
}

/// Everything the running node needs, constructed once from a validated
/// configuration.
pub struct RelayContext {
    pub source: Arc<ChainClient<PostchainRestClient>>,
    pub destination: Arc<ChainClient<PostchainRestClient>>,
    pub machine: TransferMachine<PostchainRestClient>,
    pub store: Arc<ProgressStore>,
    pub poll_interval: Duration,
    pub metrics: Arc<RelayMetrics>,
}

impl RelayNodeConfig {
    /// Validate the configuration and build the node context. Fails fast
    /// on malformed urls, rids or keys; nothing network-facing runs yet.
    pub fn validate(&self, metrics: Arc<RelayMetrics>) -> RelayResult<RelayContext> {
        for (name, value) in [
            ("source node url", &self.source_node_url),
            ("destination node url", &self.destination_node_url),
            ("directory node url", &self.directory_node_url),
        ] {
            Url::parse(value)
                .map_err(|e| RelayError::InvalidConfig(format!("invalid {name}: {e}")))?;
        }

        let source_rid: ChainRid = self.source_chain_rid.parse()?;
        let destination_rid: ChainRid = self.destination_chain_rid.parse()?;
        if source_rid == destination_rid {
            return Err(RelayError::InvalidConfig(
                "source and destination chain rids must differ".to_string(),
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "poll interval must be at least 1 second".to_string(),
            ));
        }

        let signer = Arc::new(OracleSigner::from_hex(&self.oracle_key)?);

        let source = Arc::new(ChainClient::new(
            PostchainRestClient::new(&self.source_node_url, ChainRef::Rid(source_rid.clone()))
                .with_confirmation_timeout(Duration::from_secs(self.confirmation_timeout_secs)),
            source_rid,
            "source",
            metrics.clone(),
        ));
        let destination = Arc::new(ChainClient::new(
            PostchainRestClient::new(
                &self.destination_node_url,
                ChainRef::Rid(destination_rid.clone()),
            ),
            destination_rid,
            "destination",
            metrics.clone(),
        ));
        // Directory chain is always addressed by internal id 0.
        let management = Arc::new(ChainClient::new(
            PostchainRestClient::new(&self.directory_node_url, ChainRef::Iid(0)),
            ChainRid([0u8; 32]),
            "management",
            metrics.clone(),
        ));

        let machine = TransferMachine::new(
            source.clone(),
            destination.clone(),
            management,
            signer,
            Duration::from_secs(self.settlement_delay_secs),
            metrics.clone(),
        );

        let store = Arc::new(ProgressStore::open(&self.db_path)?);

        info!(
            source = %self.source_node_url,
            destination = %self.destination_node_url,
            db = %self.db_path.display(),
            poll_interval_secs = self.poll_interval_secs,
            "relay context constructed"
        );

        Ok(RelayContext {
            source,
            destination,
            machine,
            store,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    fn base_config(db_path: PathBuf) -> RelayNodeConfig {
        RelayNodeConfig {
            source_node_url: "http://localhost:7740".to_string(),
            source_chain_rid: "aa".repeat(32),
            destination_node_url: "http://localhost:7741".to_string(),
            destination_chain_rid: "bb".repeat(32),
            directory_node_url: "http://localhost:7740".to_string(),
            oracle_key: TEST_KEY.to_string(),
            db_path,
            poll_interval_secs: 10,
            settlement_delay_secs: 10,
            confirmation_timeout_secs: 60,
            metrics_address: "127.0.0.1:9184".to_string(),
        }
    }

    #[test]
    fn test_validate_builds_context() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(dir.path().join("relay.sqlite"));
        let context = config
            .validate(Arc::new(RelayMetrics::new_for_testing()))
            .unwrap();
        assert_eq!(context.source.label(), "source");
        assert_eq!(context.destination.label(), "destination");
        assert_eq!(context.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path().join("relay.sqlite"));
        config.source_node_url = "not a url".to_string();
        let result = config.validate(Arc::new(RelayMetrics::new_for_testing()));
        assert!(matches!(result, Err(RelayError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_identical_chain_rids() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path().join("relay.sqlite"));
        config.destination_chain_rid = config.source_chain_rid.clone();
        assert!(config
            .validate(Arc::new(RelayMetrics::new_for_testing()))
            .is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path().join("relay.sqlite"));
        config.oracle_key = "zz".to_string();
        assert!(config
            .validate(Arc::new(RelayMetrics::new_for_testing()))
            .is_err());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path().join("relay.sqlite"));
        config.poll_interval_secs = 0;
        assert!(config
            .validate(Arc::new(RelayMetrics::new_for_testing()))
            .is_err());
    }
}
