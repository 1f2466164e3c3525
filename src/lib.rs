// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Oracle relay that mirrors token transfers across chains.
//!
//! The relay watches a source chain's token event feed, and for every
//! token that has a mirrored counterpart on the destination chain it
//! drives a three-phase proven transfer (init on the source chain,
//! apply on the destination chain, complete back on the source chain).
//! A durable sqlite watermark makes restarts idempotent.

pub mod chain_client;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod node;
pub mod postchain_client;
pub mod progress_store;
pub mod signer;
pub mod transfer;
pub mod types;

#[cfg(test)]
pub mod mock_chain_client;
