//! Ledger entities as seen by the client.
//!
//! Cryptographic material is opaque here: group elements and big integers are
//! carried as the decimal or hex strings the issuer produced. Every entity
//! has an optional `seq_id` that is only set once the ledger has ordered the
//! transaction that carries it.

use crate::constants::DEFAULT_SCHEMA_TYPE;
use idledger_identity::Did;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;

/// Natural key of a schema on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaKey {
    pub name: String,
    pub version: String,
    pub issuer_id: Did,
}

impl SchemaKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>, issuer_id: Did) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            issuer_id,
        }
    }
}

/// Lookup key for an issuer's keys: the schema transaction they were
/// published against and the issuer that published them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssuerKeyId {
    pub schema_id: u64,
    pub issuer_id: Did,
}

impl IssuerKeyId {
    pub fn new(schema_id: u64, issuer_id: Did) -> Self {
        Self {
            schema_id,
            issuer_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub version: String,
    pub schema_type: String,
    pub attr_names: Vec<String>,
    pub issuer_id: Option<Did>,
    pub seq_id: Option<u64>,
}

impl Schema {
    /// A schema that has not been written to the ledger yet.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        attr_names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            schema_type: DEFAULT_SCHEMA_TYPE.to_string(),
            attr_names: attr_names.into_iter().map(Into::into).collect(),
            issuer_id: None,
            seq_id: None,
        }
    }

    pub fn with_schema_type(mut self, schema_type: impl Into<String>) -> Self {
        self.schema_type = schema_type.into();
        self
    }

    pub fn with_issuer_id(mut self, issuer_id: Did) -> Self {
        self.issuer_id = Some(issuer_id);
        self
    }

    pub fn with_seq_id(mut self, seq_id: u64) -> Self {
        self.seq_id = Some(seq_id);
        self
    }

    /// The schema key, if the issuer is known.
    pub fn key(&self) -> Option<SchemaKey> {
        self.issuer_id
            .clone()
            .map(|issuer| SchemaKey::new(&self.name, &self.version, issuer))
    }

    /// Key id for issuer keys published against this schema. Only available
    /// once the schema is on the ledger.
    pub fn issuer_key_id(&self) -> Option<IssuerKeyId> {
        match (self.seq_id, &self.issuer_id) {
            (Some(seq_id), Some(issuer)) => Some(IssuerKeyId::new(seq_id, issuer.clone())),
            _ => None,
        }
    }
}

/// Primary (CL) issuer public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub n: String,
    pub rms: String,
    pub rctxt: String,
    pub r: BTreeMap<String, String>,
    pub s: String,
    pub z: String,
    #[serde(skip)]
    pub seq_id: Option<u64>,
}

impl PublicKey {
    pub fn with_seq_id(mut self, seq_id: u64) -> Self {
        self.seq_id = Some(seq_id);
        self
    }
}

/// Revocation public key of an issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationPublicKey {
    pub qr: String,
    pub g: String,
    pub h: String,
    pub h0: String,
    pub h1: String,
    pub h2: String,
    pub htilde: String,
    pub u: String,
    pub pk: String,
    pub y: String,
    pub x: String,
    #[serde(skip)]
    pub seq_id: Option<u64>,
}

impl RevocationPublicKey {
    pub fn with_seq_id(mut self, seq_id: u64) -> Self {
        self.seq_id = Some(seq_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorPublicKey {
    pub z: String,
    #[serde(skip)]
    pub seq_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    pub i_a: String,
    pub acc: String,
    pub v: BTreeSet<u32>,
    pub l: u32,
    pub current_i: u32,
}

/// Tails of a revocation accumulator, indexed by credential slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tails {
    pub g: BTreeMap<u32, String>,
    pub g_prime: BTreeMap<u32, String>,
}
