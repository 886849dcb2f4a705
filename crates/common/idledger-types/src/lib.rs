pub mod constants;
pub mod entities;
pub mod error;
pub mod reply;
pub mod request;

pub use entities::{
    Accumulator, AccumulatorPublicKey, IssuerKeyId, PublicKey, RevocationPublicKey, Schema,
    SchemaKey, Tails, TimestampMs,
};
pub use error::{DecodeError, LedgerError, SigningError};
pub use reply::ConsensusReply;
pub use request::{Operation, Request, RequestKey, SignedRequest};
