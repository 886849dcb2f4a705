use crate::constants::{DATA, TXN_TYPE};
use idledger_identity::Did;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Correlation key of a submitted request: the submitting identity plus its
/// per-identity request number. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub identifier: Did,
    #[serde(rename = "reqId")]
    pub req_id: u64,
}

impl RequestKey {
    pub fn new(identifier: Did, req_id: u64) -> Self {
        Self { identifier, req_id }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identifier, self.req_id)
    }
}

/// A ledger operation: a flat mapping of wire fields including the
/// transaction type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(Map<String, Value>);

impl Operation {
    /// Start an operation for the given transaction type tag.
    pub fn new(txn_type: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(TXN_TYPE.to_string(), Value::String(txn_type.to_string()));
        Self(fields)
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Attach a payload under `data`.
    ///
    /// The payload is stored as its JSON text, not as a nested object: ledger
    /// nodes expect `data` to be a string.
    pub fn with_data(self, payload: &Value) -> Self {
        let encoded = payload.to_string();
        self.with_field(DATA, encoded)
    }

    pub fn txn_type(&self) -> Option<&str> {
        self.get_str(TXN_TYPE)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// An unsigned request as assembled by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub identifier: Did,
    #[serde(rename = "reqId")]
    pub req_id: u64,
    pub operation: Operation,
}

impl Request {
    pub fn new(identifier: Did, req_id: u64, operation: Operation) -> Self {
        Self {
            identifier,
            req_id,
            operation,
        }
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.identifier.clone(), self.req_id)
    }

    /// Bytes covered by the request signature: the request serialized as JSON
    /// with object keys in sorted order.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        // `serde_json::Value` objects are ordered maps, so going through a
        // `Value` gives a canonical key order at every nesting level.
        let canonical = serde_json::to_value(self)?;
        serde_json::to_vec(&canonical)
    }
}

/// A request with its hex-encoded Ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    #[serde(flatten)]
    pub request: Request,
    pub signature: String,
}

impl SignedRequest {
    /// The correlation key, derived from the request's own identifying fields.
    pub fn key(&self) -> RequestKey {
        self.request.key()
    }

    pub fn operation(&self) -> &Operation {
        &self.request.operation
    }
}
