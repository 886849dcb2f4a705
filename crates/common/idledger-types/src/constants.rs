//! Field names and transaction type tags of the ledger wire format.
//!
//! These strings are shared with existing ledger nodes and must not change.

pub const TARGET_NYM: &str = "dest";
pub const TXN_TYPE: &str = "type";
pub const DATA: &str = "data";
pub const NAME: &str = "name";
pub const VERSION: &str = "version";
/// Schema type inside a schema `data` payload.
pub const TYPE: &str = "type";
pub const ATTR_NAMES: &str = "attr_names";
pub const ORIGIN: &str = "origin";
pub const REF: &str = "ref";
pub const PRIMARY: &str = "primary";
pub const REVOCATION: &str = "revocation";
pub const SEQ_NO: &str = "seqNo";
pub const IDENTIFIER: &str = "identifier";
pub const REQ_ID: &str = "reqId";
pub const SIGNATURE: &str = "signature";

pub const SCHEMA: &str = "101";
pub const ISSUER_KEY: &str = "102";
pub const GET_SCHEMA: &str = "107";
pub const GET_ISSUER_KEY: &str = "108";

/// Schema type used when the caller does not name one.
pub const DEFAULT_SCHEMA_TYPE: &str = "CL";
