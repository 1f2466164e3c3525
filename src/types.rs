// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Data model for the relay.
//!
//! Query results are explicit tagged structs with `Option` for absence,
//! never nullable fields probed ad hoc. Byte-string identifiers are hex
//! on the wire and newtypes in memory.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::RelayError;

/// Serde adapter for byte strings carried as hex.
pub mod hex_serde {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

macro_rules! hex_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(#[serde(with = "hex_serde")] pub Vec<u8>);

        impl $name {
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = RelayError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                hex::decode(s.trim_start_matches("0x"))
                    .map(Self)
                    .map_err(|e| RelayError::InvalidConfig(format!(
                        "invalid hex for {}: {e}",
                        stringify!($name)
                    )))
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
    };
}

hex_newtype!(
    /// Account identifier in a chain's own address space.
    AccountId
);
hex_newtype!(
    /// Token contract identifier on the origin chain. Opaque.
    ContractId
);
hex_newtype!(
    /// Cross-chain identity of a token owner (e.g. an EVM address).
    ExternalAddress
);

/// 32-byte blockchain identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ChainRid(pub [u8; 32]);

impl ChainRid {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for ChainRid {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| RelayError::InvalidConfig(format!("invalid chain rid hex: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            RelayError::InvalidConfig(format!("chain rid must be 32 bytes, got {}", v.len()))
        })?;
        Ok(ChainRid(bytes))
    }
}

impl fmt::Display for ChainRid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChainRid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainRid({})", self.to_hex())
    }
}

impl Serialize for ChainRid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainRid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Reference to the project a token collection belongs to. Opaque to the
/// relay; forwarded as part of the token descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_rid: Option<ChainRid>,
}

/// Token descriptor carried with a source event. The metadata blob is
/// consumed opaquely and serialized as-is into the init operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub project: ProjectRef,
    pub collection: String,
    pub token_id: u64,
    pub metadata: serde_json::Value,
}

/// One token record observed on the source chain. Immutable once read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Monotonic row identifier, used as the watermark cursor.
    pub rowid: u64,
    /// Origin chain identifier (e.g. "eth").
    pub chain: String,
    pub contract: ContractId,
    pub owner_account_id: AccountId,
    pub owner_external_address: ExternalAddress,
    pub token: TokenDescriptor,
}

/// Ephemeral per-event transfer context. Never persisted.
#[derive(Clone, Debug)]
pub struct TransferIntent {
    pub event: SourceEvent,
    /// Destination account resolved from the owner's external address.
    pub to_account: AccountId,
}

/// A single operation inside a transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub args: Vec<serde_json::Value>,
}

impl Operation {
    pub fn new(name: impl Into<String>, args: Vec<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Canonical (unsigned) transaction body: ordered operations plus the
/// public keys expected to sign it. Operation order is load-bearing:
/// proof addressing references operations by index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawTx {
    pub operations: Vec<Operation>,
    #[serde(with = "signers_hex")]
    pub signers: Vec<Vec<u8>>,
}

mod signers_hex {
    use super::*;

    pub fn serialize<S: Serializer>(keys: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(keys.len()))?;
        for key in keys {
            seq.serialize_element(&hex::encode(key))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// A signed transaction ready for submission. Decoding recovers the
/// canonical body for rid/hash derivation and downstream proof args.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedTx {
    pub raw: RawTx,
    #[serde(with = "signers_hex")]
    pub signatures: Vec<Vec<u8>>,
}

impl SignedTx {
    /// Recover the canonical transaction body.
    pub fn decode(&self) -> &RawTx {
        &self.raw
    }
}
