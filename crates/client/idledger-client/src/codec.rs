//! Encoding of ledger operations and decoding of consensus replies.
//!
//! Everything here is synchronous and never retries: a reply that does not
//! decode is a protocol mismatch, not a transient condition.

use idledger_identity::Did;
use idledger_types::constants::{
    ATTR_NAMES, DATA, GET_ISSUER_KEY, GET_SCHEMA, ISSUER_KEY, NAME, ORIGIN, PRIMARY, REF,
    REVOCATION, SCHEMA, SEQ_NO, TARGET_NYM, TYPE, VERSION,
};
use idledger_types::{
    ConsensusReply, DecodeError, IssuerKeyId, Operation, PublicKey, RevocationPublicKey, Schema,
    SchemaKey,
};
use serde_json::{json, Value};

/// Payload and sequence number extracted from a consensus reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyData {
    pub data: Value,
    pub seq_no: Option<u64>,
}

impl ReplyData {
    /// Whether the ledger returned nothing for the request.
    pub fn is_empty(&self) -> bool {
        is_falsy(&self.data)
    }
}

/// Signature shared by the reply decoders handed to the consensus waiter.
pub type ReplyDecoder = fn(ConsensusReply) -> Result<ReplyData, DecodeError>;

pub fn submit_schema(schema: &Schema) -> Operation {
    Operation::new(SCHEMA).with_data(&json!({
        NAME: schema.name,
        VERSION: schema.version,
        TYPE: schema.schema_type,
        ATTR_NAMES: schema.attr_names.join(","),
    }))
}

pub fn get_schema(key: &SchemaKey) -> Operation {
    Operation::new(GET_SCHEMA)
        .with_field(TARGET_NYM, key.issuer_id.as_str())
        .with_data(&json!({
            NAME: key.name,
            VERSION: key.version,
        }))
}

pub fn submit_public_keys(
    schema_id: u64,
    pk: &PublicKey,
    pk_r: Option<&RevocationPublicKey>,
) -> Operation {
    Operation::new(ISSUER_KEY)
        .with_field(REF, schema_id)
        .with_data(&json!({
            PRIMARY: pk,
            REVOCATION: pk_r,
        }))
}

pub fn get_issuer_key(id: &IssuerKeyId) -> Operation {
    Operation::new(GET_ISSUER_KEY)
        .with_field(REF, id.schema_id)
        .with_field(ORIGIN, id.issuer_id.as_str())
}

/// Parse the JSON text of a reply payload.
///
/// Some ledger nodes emit payloads quoted with single quotes. Text that is not
/// valid JSON as-is is parsed again with every `'` turned into `"`.
pub fn parse_data(raw: &str) -> Result<Value, DecodeError> {
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(_) => {
            let normalized = raw.replace('\'', "\"");
            serde_json::from_str(&normalized).map_err(|source| DecodeError::Json {
                payload: raw.to_string(),
                source,
            })
        }
    }
}

/// Decoder for read replies: the sequence number is the one recorded inside
/// the returned payload.
pub fn decode_get_reply(reply: ConsensusReply) -> Result<ReplyData, DecodeError> {
    let data = reply_payload(&reply)?;
    let seq_no = if is_falsy(&data) {
        None
    } else {
        seq_no_field(data.get(SEQ_NO))?
    };
    Ok(ReplyData { data, seq_no })
}

/// Decoder for write replies: the sequence number is the one the ledger
/// assigned in the envelope.
pub fn decode_submit_reply(reply: ConsensusReply) -> Result<ReplyData, DecodeError> {
    let data = reply_payload(&reply)?;
    let seq_no = if is_falsy(&data) { None } else { reply.seq_no };
    Ok(ReplyData { data, seq_no })
}

fn reply_payload(reply: &ConsensusReply) -> Result<Value, DecodeError> {
    match reply.data.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_data(raw),
        _ => Ok(Value::Null),
    }
}

fn seq_no_field(value: Option<&Value>) -> Result<Option<u64>, DecodeError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| invalid(SEQ_NO, n)),
        Some(Value::String(s)) => s.parse().map(Some).map_err(|_| invalid(SEQ_NO, s)),
        Some(other) => Err(invalid(SEQ_NO, other)),
    }
}

/// Rebuild a schema from a read payload.
pub fn schema_from_data(data: &Value, seq_no: Option<u64>) -> Result<Schema, DecodeError> {
    let attr_names = required_str(data, ATTR_NAMES)?
        .split(',')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    let issuer_id: Did = required_str(data, ORIGIN)?
        .parse()
        .map_err(|e| invalid(ORIGIN, e))?;

    let mut schema = Schema::new(
        required_str(data, NAME)?,
        required_str(data, VERSION)?,
        attr_names,
    )
    .with_schema_type(required_str(data, TYPE)?)
    .with_issuer_id(issuer_id);
    if let Some(seq_no) = seq_no {
        schema = schema.with_seq_id(seq_no);
    }
    Ok(schema)
}

/// Rebuild the primary key from an issuer key read payload.
pub fn public_key_from_data(data: &Value, seq_no: Option<u64>) -> Result<PublicKey, DecodeError> {
    let section = key_section(data)?;
    let primary = section
        .get(PRIMARY)
        .filter(|v| !v.is_null())
        .ok_or(DecodeError::MissingField(PRIMARY))?;
    let pk: PublicKey = from_section(PRIMARY, primary)?;
    Ok(match seq_no {
        Some(seq_no) => pk.with_seq_id(seq_no),
        None => pk,
    })
}

/// Rebuild the revocation key from an issuer key read payload. `None` when
/// the issuer published no revocation key.
pub fn revocation_key_from_data(
    data: &Value,
    seq_no: Option<u64>,
) -> Result<Option<RevocationPublicKey>, DecodeError> {
    let section = key_section(data)?;
    let revocation = match section.get(REVOCATION) {
        None | Some(Value::Null) => return Ok(None),
        Some(section) => section,
    };
    let pk_r: RevocationPublicKey = from_section(REVOCATION, revocation)?;
    Ok(Some(match seq_no {
        Some(seq_no) => pk_r.with_seq_id(seq_no),
        None => pk_r,
    }))
}

/// The `data` section of an issuer key payload, which nodes may send either
/// as an object or as JSON text.
fn key_section(data: &Value) -> Result<Value, DecodeError> {
    match data.get(DATA) {
        Some(Value::String(raw)) => parse_data(raw),
        Some(section @ Value::Object(_)) => Ok(section.clone()),
        Some(other) => Err(invalid(DATA, other)),
        None => Err(DecodeError::MissingField(DATA)),
    }
}

fn from_section<T: serde::de::DeserializeOwned>(
    field: &'static str,
    section: &Value,
) -> Result<T, DecodeError> {
    let section = match section {
        Value::String(raw) => parse_data(raw)?,
        other => other.clone(),
    };
    serde_json::from_value(section).map_err(|e| invalid(field, e))
}

fn required_str<'a>(data: &'a Value, field: &'static str) -> Result<&'a str, DecodeError> {
    data.get(field)
        .ok_or(DecodeError::MissingField(field))?
        .as_str()
        .ok_or_else(|| invalid(field, "expected a string"))
}

fn invalid(field: &'static str, reason: impl std::fmt::Display) -> DecodeError {
    DecodeError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}

/// JSON values a ledger uses to mean "nothing here".
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
