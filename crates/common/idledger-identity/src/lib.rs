//! idledger identity – DID & key tooling for ledger clients.
//!
//! - Supports `did:key` using Ed25519 (`multicodec: 0xED`, `multibase: base58btc`).
//! - Provides `KeyPair` generation, seeded derivation, signing and verification.
//! - Reads and writes keypair files used by the command-line tool.

#![forbid(unsafe_code)]

mod did;
mod keyfile;
mod keypair;

pub use did::{Did, DidError, ED25519_KEY_LENGTH, ED25519_MULTICODEC_PREFIX};
pub use keyfile::{KeyFileError, KeypairFile};
pub use keypair::{seed_from_alias, KeyPair, Signature, SEED_LENGTH};
