use idledger_identity::Did;
use idledger_types::{
    Accumulator, AccumulatorPublicKey, IssuerKeyId, LedgerError, Operation, PublicKey, Request,
    RevocationPublicKey, Schema, SchemaKey, Tails, TimestampMs,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::codec::{self, ReplyData, ReplyDecoder};
use crate::config::GatewayConfig;
use crate::consensus::ConsensusWaiter;
use crate::transport::LedgerClient;
use crate::wallet::Wallet;

/// Typed access to the identity ledger.
///
/// Every call runs one full request lifecycle: build the operation, sign it
/// with the wallet's default identity, submit it, wait for the pool to agree
/// on a reply and decode that reply. Nothing is resubmitted; on timeout the
/// request may still be ordered later and it is up to the caller to look it
/// up or try again.
pub struct LedgerGateway {
    client: Arc<dyn LedgerClient>,
    wallet: Arc<dyn Wallet>,
    waiter: ConsensusWaiter,
}

impl LedgerGateway {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        wallet: Arc<dyn Wallet>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            client,
            wallet,
            waiter: ConsensusWaiter::new(config.wait_config()),
        }
    }

    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        &self.wallet
    }

    // READ

    /// Fetch a schema by issuer, name and version. `None` if the ledger has
    /// no such schema.
    pub async fn get_schema(&self, key: &SchemaKey) -> Result<Option<Schema>, LedgerError> {
        let reply = self.send_get_request(codec::get_schema(key)).await?;
        if reply.is_empty() {
            debug!("No schema {} {} from {}", key.name, key.version, key.issuer_id);
            return Ok(None);
        }
        Ok(Some(codec::schema_from_data(&reply.data, reply.seq_no)?))
    }

    /// Fetch the primary public key an issuer published for a schema.
    pub async fn get_public_key(&self, id: &IssuerKeyId) -> Result<Option<PublicKey>, LedgerError> {
        let reply = self.send_get_request(codec::get_issuer_key(id)).await?;
        if reply.is_empty() {
            return Ok(None);
        }
        Ok(Some(codec::public_key_from_data(&reply.data, reply.seq_no)?))
    }

    /// Fetch the revocation public key an issuer published for a schema.
    /// `None` if there are no keys, or the issuer published no revocation key.
    pub async fn get_public_key_revocation(
        &self,
        id: &IssuerKeyId,
    ) -> Result<Option<RevocationPublicKey>, LedgerError> {
        let reply = self.send_get_request(codec::get_issuer_key(id)).await?;
        if reply.is_empty() {
            return Ok(None);
        }
        Ok(codec::revocation_key_from_data(&reply.data, reply.seq_no)?)
    }

    pub async fn get_public_key_accumulator(
        &self,
        _id: &IssuerKeyId,
    ) -> Result<AccumulatorPublicKey, LedgerError> {
        Err(LedgerError::Unsupported("accumulator public key retrieval"))
    }

    pub async fn get_accumulator(&self, _id: &IssuerKeyId) -> Result<Accumulator, LedgerError> {
        Err(LedgerError::Unsupported("accumulator retrieval"))
    }

    pub async fn get_tails(&self, _id: &IssuerKeyId) -> Result<Tails, LedgerError> {
        Err(LedgerError::Unsupported("tails retrieval"))
    }

    // SUBMIT

    /// Write a schema under the wallet's default identity.
    ///
    /// Returns the stored schema with its issuer and sequence number, or
    /// `None` if the ledger confirmed the request without assigning one.
    pub async fn submit_schema(&self, schema: &Schema) -> Result<Option<Schema>, LedgerError> {
        let (issuer_id, reply) = self.send_submit_request(codec::submit_schema(schema)).await?;

        let Some(seq_no) = reply.seq_no else {
            warn!(
                "Schema {} {} confirmed without a sequence number",
                schema.name, schema.version
            );
            return Ok(None);
        };
        info!("Schema {} {} stored with seqNo {}", schema.name, schema.version, seq_no);
        Ok(Some(
            schema
                .clone()
                .with_issuer_id(issuer_id)
                .with_seq_id(seq_no),
        ))
    }

    /// Publish an issuer's keys for the schema with sequence number
    /// `schema_id`. Both returned keys carry the sequence number of the key
    /// transaction.
    pub async fn submit_public_keys(
        &self,
        schema_id: u64,
        pk: &PublicKey,
        pk_r: Option<&RevocationPublicKey>,
    ) -> Result<Option<(PublicKey, Option<RevocationPublicKey>)>, LedgerError> {
        let (_, reply) = self
            .send_submit_request(codec::submit_public_keys(schema_id, pk, pk_r))
            .await?;

        let Some(seq_no) = reply.seq_no else {
            warn!("Issuer keys for schema {} confirmed without a sequence number", schema_id);
            return Ok(None);
        };
        info!("Issuer keys for schema {} stored with seqNo {}", schema_id, seq_no);
        Ok(Some((
            pk.clone().with_seq_id(seq_no),
            pk_r.map(|pk_r| pk_r.clone().with_seq_id(seq_no)),
        )))
    }

    pub async fn submit_accumulator(
        &self,
        _id: &IssuerKeyId,
        _accum_pk: &AccumulatorPublicKey,
        _accum: &Accumulator,
        _tails: &Tails,
    ) -> Result<(), LedgerError> {
        Err(LedgerError::Unsupported("accumulator publication"))
    }

    pub async fn submit_accum_update(
        &self,
        _id: &IssuerKeyId,
        _accum: &Accumulator,
        _timestamp: TimestampMs,
    ) -> Result<(), LedgerError> {
        Err(LedgerError::Unsupported("accumulator update"))
    }

    /// Returns the identity the write was signed with alongside the reply.
    async fn send_submit_request(&self, op: Operation) -> Result<(Did, ReplyData), LedgerError> {
        self.send_request(op, codec::decode_submit_reply).await
    }

    async fn send_get_request(&self, op: Operation) -> Result<ReplyData, LedgerError> {
        let (_, reply) = self.send_request(op, codec::decode_get_reply).await?;
        Ok(reply)
    }

    /// The signing identity is read from the wallet once, when the request is
    /// built; later changes to the wallet default do not affect this call.
    async fn send_request(
        &self,
        op: Operation,
        decode: ReplyDecoder,
    ) -> Result<(Did, ReplyData), LedgerError> {
        let request = Request::new(self.wallet.default_id(), self.wallet.next_req_id(), op);
        let signed = self.wallet.prepare_request(request)?;

        let key = self.client.submit(signed).await?;
        debug!("Submitted request {}", key);

        let reply = self
            .waiter
            .await_consensus(self.client.as_ref(), &key, decode)
            .await?;
        Ok((key.identifier, reply))
    }
}
