use crate::Did;
use ed25519_dalek::{Signer, Verifier};
use rand::rngs::OsRng;

pub type Signature = ed25519_dalek::Signature;

/// Length of the secret seed an Ed25519 key is derived from.
pub const SEED_LENGTH: usize = 32;

/// Ed25519 keypair bound to a DID.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub did: Did,
    pub pk: ed25519_dalek::VerifyingKey,
    sk: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self::from_signing_key(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    /// Derive a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Self {
        Self::from_signing_key(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    /// Derive a keypair from a human alias, see [`seed_from_alias`].
    pub fn from_alias(alias: &str) -> Self {
        Self::from_seed(&seed_from_alias(alias))
    }

    fn from_signing_key(sk: ed25519_dalek::SigningKey) -> Self {
        let pk = sk.verifying_key();
        let did = Did::new_ed25519(&pk);
        Self { did, pk, sk }
    }

    /// Sign arbitrary bytes, returning an Ed25519 signature.
    pub fn sign(&self, msg: &[u8]) -> Signature {
        self.sk.sign(msg)
    }

    /// Verify a signature against `msg`.
    pub fn verify(&self, msg: &[u8], sig: &Signature) -> bool {
        self.pk.verify(msg, sig).is_ok()
    }

    /// Return the bytes of the signing key.
    pub fn to_bytes(&self) -> [u8; SEED_LENGTH] {
        self.sk.to_bytes()
    }
}

/// Build a key seed from an alias: the alias bytes right-padded with `'0'`
/// to 32 bytes. Longer aliases are truncated.
///
/// Test pools name their stewards and nodes this way so every participant
/// can recompute the others' identities.
pub fn seed_from_alias(alias: &str) -> [u8; SEED_LENGTH] {
    let mut seed = [b'0'; SEED_LENGTH];
    let bytes = alias.as_bytes();
    let n = bytes.len().min(SEED_LENGTH);
    seed[..n].copy_from_slice(&bytes[..n]);
    seed
}
