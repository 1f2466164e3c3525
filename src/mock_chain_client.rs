// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A mock ledger connection for tests.
//!
//! Query responses are preset per query name and consumed in order;
//! submitted transactions and proof requests are recorded for
//! assertions. An unprimed query answers "absent", which doubles as an
//! empty event feed.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::chain_client::{ChainClientInner, ProofRequest};
use crate::codec::{transaction_rid, TxRid};
use crate::error::RelayError;
use crate::types::{Operation, RawTx, SignedTx};

/// A transaction the mock received, with the submission variant used.
#[derive(Clone, Debug)]
pub struct SubmittedTx {
    pub tx: SignedTx,
    pub confirmed: bool,
}

#[derive(Clone, Default)]
pub struct MockChainClient {
    query_responses: Arc<Mutex<HashMap<String, VecDeque<Option<Value>>>>>,
    query_errors: Arc<Mutex<HashMap<String, VecDeque<RelayError>>>>,
    recorded_queries: Arc<Mutex<Vec<(String, Value)>>>,
    submitted: Arc<Mutex<Vec<SubmittedTx>>>,
    proof_requests: Arc<Mutex<Vec<ProofRequest>>>,
    proof_responses: Arc<Mutex<VecDeque<RawTx>>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the named query. Responses are consumed in
    /// FIFO order; once drained the query answers "absent" again.
    pub fn push_query_response(&self, name: &str, response: Option<Value>) {
        self.query_responses
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push_back(response);
    }

    /// Queue an error for the named query, served before any responses.
    pub fn push_query_error(&self, name: &str, error: RelayError) {
        self.query_errors
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push_back(error);
    }

    /// Queue a proof transaction; drained queues fall back to a synthetic
    /// single-operation proof tx.
    pub fn push_proof_response(&self, proof_tx: RawTx) {
        self.proof_responses.lock().unwrap().push_back(proof_tx);
    }

    pub fn recorded_queries(&self) -> Arc<Mutex<Vec<(String, Value)>>> {
        self.recorded_queries.clone()
    }

    pub fn submitted(&self) -> Arc<Mutex<Vec<SubmittedTx>>> {
        self.submitted.clone()
    }

    pub fn proof_requests(&self) -> Arc<Mutex<Vec<ProofRequest>>> {
        self.proof_requests.clone()
    }

    fn default_proof_tx(rid: &TxRid) -> RawTx {
        RawTx {
            operations: vec![Operation::new("iccf.proof", vec![json!(rid.to_hex())])],
            signers: vec![],
        }
    }
}

#[async_trait]
impl ChainClientInner for MockChainClient {
    type Error = RelayError;

    async fn query(&self, name: &str, args: Value) -> Result<Option<Value>, Self::Error> {
        self.recorded_queries
            .lock()
            .unwrap()
            .push((name.to_string(), args));

        if let Some(queue) = self.query_errors.lock().unwrap().get_mut(name) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }

        let mut responses = self.query_responses.lock().unwrap();
        Ok(responses
            .get_mut(name)
            .and_then(|queue| queue.pop_front())
            .flatten())
    }

    async fn submit_transaction(&self, tx: &SignedTx) -> Result<TxRid, Self::Error> {
        self.submitted.lock().unwrap().push(SubmittedTx {
            tx: tx.clone(),
            confirmed: false,
        });
        transaction_rid(&tx.raw)
    }

    async fn submit_and_confirm(&self, tx: &SignedTx) -> Result<TxRid, Self::Error> {
        self.submitted.lock().unwrap().push(SubmittedTx {
            tx: tx.clone(),
            confirmed: true,
        });
        transaction_rid(&tx.raw)
    }

    async fn fetch_cross_chain_proof(
        &self,
        request: &ProofRequest,
    ) -> Result<RawTx, Self::Error> {
        self.proof_requests.lock().unwrap().push(request.clone());
        let preset = self.proof_responses.lock().unwrap().pop_front();
        Ok(preset.unwrap_or_else(|| Self::default_proof_tx(&request.tx_rid)))
    }
}
