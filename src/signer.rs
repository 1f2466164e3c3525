// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Oracle signing identity.
//!
//! The relay signs every protocol transaction with a single secp256k1
//! keypair, read once at startup. The secret never appears in Debug
//! output or logs.

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;

use crate::codec::content_hash;
use crate::error::{RelayError, RelayResult};
use crate::types::{RawTx, SignedTx};

pub struct OracleSigner {
    secret: SecretKey,
    public: PublicKey,
    secp: Secp256k1<secp256k1::All>,
}

impl OracleSigner {
    /// Parse a signer from a hex-encoded 32-byte secret key.
    pub fn from_hex(key_hex: &str) -> RelayResult<Self> {
        let bytes = hex::decode(key_hex.trim_start_matches("0x"))
            .map_err(|e| RelayError::InvalidConfig(format!("oracle key is not valid hex: {e}")))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| RelayError::InvalidConfig(format!("invalid oracle secret key: {e}")))?;
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self {
            secret,
            public,
            secp,
        })
    }

    /// Compressed public key (33 bytes), the entry carried in a
    /// transaction's signer list.
    pub fn public_key(&self) -> Vec<u8> {
        self.public.serialize().to_vec()
    }

    /// Sign a canonical transaction body. The signature is over the
    /// transaction's content hash.
    pub fn sign_transaction(&self, raw: RawTx) -> RelayResult<SignedTx> {
        let digest = content_hash(&raw)?;
        let message = Message::from_slice(&digest.0)
            .map_err(|e| RelayError::Signing(format!("invalid digest: {e}")))?;
        let signature = self.secp.sign_ecdsa(&message, &self.secret);
        Ok(SignedTx {
            raw,
            signatures: vec![signature.serialize_compact().to_vec()],
        })
    }
}

impl fmt::Debug for OracleSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleSigner")
            .field("public", &hex::encode(self.public.serialize()))
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operation;
    use serde_json::json;

    const TEST_KEY: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn test_from_hex_derives_compressed_pubkey() {
        let signer = OracleSigner::from_hex(TEST_KEY).unwrap();
        assert_eq!(signer.public_key().len(), 33);

        let prefixed = OracleSigner::from_hex(&format!("0x{TEST_KEY}")).unwrap();
        assert_eq!(prefixed.public_key(), signer.public_key());
    }

    #[test]
    fn test_from_hex_rejects_bad_keys() {
        assert!(OracleSigner::from_hex("not hex").is_err());
        assert!(OracleSigner::from_hex("abcd").is_err());
        // All-zero key is outside the curve order
        assert!(OracleSigner::from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_sign_transaction_attaches_one_signature() {
        let signer = OracleSigner::from_hex(TEST_KEY).unwrap();
        let raw = RawTx {
            operations: vec![Operation::new("noop", vec![json!(1)])],
            signers: vec![signer.public_key()],
        };
        let signed = signer.sign_transaction(raw.clone()).unwrap();
        assert_eq!(signed.raw, raw);
        assert_eq!(signed.signatures.len(), 1);
        assert_eq!(signed.signatures[0].len(), 64);

        // Deterministic (RFC 6979) signatures for the same body
        let again = signer.sign_transaction(raw).unwrap();
        assert_eq!(again.signatures, signed.signatures);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let signer = OracleSigner::from_hex(TEST_KEY).unwrap();
        let debug = format!("{signer:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(TEST_KEY));
    }
}
