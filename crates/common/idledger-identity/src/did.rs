use ed25519_dalek::Verifier;
use multibase::{decode, Base};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ed25519 public key multicodec prefix
pub const ED25519_MULTICODEC_PREFIX: u8 = 0xed;

/// Length in bytes of an Ed25519 public key.
pub const ED25519_KEY_LENGTH: usize = 32;

/// Error type for DID operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DidError {
    #[error("malformed DID string")]
    Malformed,
    #[error("unsupported multicodec: {0:#x}")]
    UnsupportedCodec(u64),
    #[error("invalid key length: expected {expected}, found {found}")]
    InvalidKeyLength { expected: usize, found: usize },
}

/// A W3C-compatible Decentralized Identifier.
///
/// Ledger requests carry it as their `identifier`. Only **`did:key:z…`** for
/// Ed25519 public keys is supported, so the verifying key travels inside the
/// identifier itself.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Construct a DID from an Ed25519 public key.
    pub fn new_ed25519(pk: &ed25519_dalek::VerifyingKey) -> Self {
        let mut bytes = vec![ED25519_MULTICODEC_PREFIX];
        bytes.extend_from_slice(pk.as_bytes());

        let encoded = multibase::encode(Base::Base58Btc, bytes);
        Self(format!("did:key:{}", encoded))
    }

    /// Return the DID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode and return the embedded Ed25519 public key.
    pub fn to_ed25519(&self) -> Result<ed25519_dalek::VerifyingKey, DidError> {
        let parts: Vec<&str> = self.0.split(':').collect();
        if parts.len() != 3 || parts[0] != "did" || parts[1] != "key" {
            return Err(DidError::Malformed);
        }
        let (_, data) = decode(parts[2]).map_err(|_| DidError::Malformed)?;

        // First byte is the multicodec code.
        let (codec, key_bytes) = data.split_first().ok_or(DidError::Malformed)?;
        if *codec != ED25519_MULTICODEC_PREFIX {
            return Err(DidError::UnsupportedCodec(*codec as u64));
        }

        let bytes: [u8; ED25519_KEY_LENGTH] =
            key_bytes.try_into().map_err(|_| DidError::InvalidKeyLength {
                expected: ED25519_KEY_LENGTH,
                found: key_bytes.len(),
            })?;

        ed25519_dalek::VerifyingKey::from_bytes(&bytes).map_err(|_| DidError::Malformed)
    }

    /// Verify `sig` over `msg` with the key embedded in this DID.
    ///
    /// Returns `false` for malformed DIDs as well as bad signatures.
    pub fn verify(&self, msg: &[u8], sig: &ed25519_dalek::Signature) -> bool {
        match self.to_ed25519() {
            Ok(pk) => pk.verify(msg, sig).is_ok(),
            Err(_) => false,
        }
    }
}

impl FromStr for Did {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with("did:key:") {
            return Err(DidError::Malformed);
        }

        let did = Did(s.to_string());
        did.to_ed25519()?;

        Ok(did)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
