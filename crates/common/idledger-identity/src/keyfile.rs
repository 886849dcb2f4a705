use crate::{Did, DidError, KeyPair, SEED_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading or writing a keypair file.
#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("I/O error on keypair file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid keypair JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("secret key is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("secret key must be {SEED_LENGTH} bytes, found {0}")]
    SecretLength(usize),

    #[error("stored DID is invalid: {0}")]
    Did(#[from] DidError),

    #[error("stored DID {stored} does not match the secret key (derived {derived})")]
    DidMismatch { stored: String, derived: String },
}

/// On-disk keypair format shared by the command-line tool and test pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeypairFile {
    pub did: String,
    pub public_key: String,
    pub secret_key: String,
    pub generated_at: String,
}

impl KeypairFile {
    pub fn from_keypair(keypair: &KeyPair) -> Self {
        Self {
            did: keypair.did.as_str().to_string(),
            public_key: hex::encode(keypair.pk.to_bytes()),
            secret_key: hex::encode(keypair.to_bytes()),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild the keypair, checking the stored DID against the secret key.
    pub fn to_keypair(&self) -> Result<KeyPair, KeyFileError> {
        let secret = hex::decode(&self.secret_key)?;
        let seed: [u8; SEED_LENGTH] = secret
            .as_slice()
            .try_into()
            .map_err(|_| KeyFileError::SecretLength(secret.len()))?;
        let keypair = KeyPair::from_seed(&seed);

        let stored: Did = self.did.parse()?;
        if stored != keypair.did {
            return Err(KeyFileError::DidMismatch {
                stored: stored.to_string(),
                derived: keypair.did.to_string(),
            });
        }
        Ok(keypair)
    }

    pub fn load(path: &Path) -> Result<Self, KeyFileError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), KeyFileError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
