// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Canonical transaction encoding and digest derivation.
//!
//! The canonical form of a transaction is its JSON encoding; struct
//! fields serialize in declaration order so the bytes are stable for a
//! given body. Two domain-separated SHA-256 digests are derived from it:
//! the transaction rid (the identifier the chain indexes by) and the
//! content hash (the digest that gets signed and proven across chains).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{RelayError, RelayResult};
use crate::types::RawTx;

const RID_DOMAIN: &[u8] = b"relay/tx-rid";
const HASH_DOMAIN: &[u8] = b"relay/tx-hash";

/// Canonical transaction identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxRid(pub [u8; 32]);

/// Digest of a transaction's canonical content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

macro_rules! digest_display {
    ($name:ident) => {
        impl $name {
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = RelayError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| {
                    RelayError::Serialization(format!("invalid digest hex: {e}"))
                })?;
                let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
                    RelayError::Serialization(format!("digest must be 32 bytes, got {}", v.len()))
                })?;
                Ok($name(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

digest_display!(TxRid);
digest_display!(ContentHash);

/// Canonical byte encoding of a transaction body.
pub fn canonical_bytes(raw: &RawTx) -> RelayResult<Vec<u8>> {
    Ok(serde_json::to_vec(raw)?)
}

/// Derive the canonical identifier of a transaction.
pub fn transaction_rid(raw: &RawTx) -> RelayResult<TxRid> {
    Ok(TxRid(domain_hash(RID_DOMAIN, &canonical_bytes(raw)?)))
}

/// Derive the content hash of a transaction.
pub fn content_hash(raw: &RawTx) -> RelayResult<ContentHash> {
    Ok(ContentHash(domain_hash(HASH_DOMAIN, &canonical_bytes(raw)?)))
}

fn domain_hash(domain: &[u8], bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update([0u8]);
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Serialize a token metadata blob into the byte form the init operation
/// carries. The blob itself is opaque protocol data.
pub fn serialize_token_metadata(metadata: &serde_json::Value) -> RelayResult<Vec<u8>> {
    Ok(serde_json::to_vec(metadata)?)
}
