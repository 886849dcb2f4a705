use anyhow::Result;
use idledger_client::{
    GatewayConfig, KeyWallet, LedgerClient, LedgerGateway, LedgerSimConfig, PoolGenesis,
    SimulatedLedger, Wallet,
};
use idledger_identity::{Did, KeyPair};
use idledger_types::{
    Accumulator, AccumulatorPublicKey, ConsensusReply, IssuerKeyId, LedgerError, PublicKey,
    RequestKey, RevocationPublicKey, Schema, SchemaKey, SignedRequest, Tails,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Test helper: a four node pool (tolerates one faulty node)
fn test_pool(config: LedgerSimConfig) -> SimulatedLedger {
    SimulatedLedger::new(
        PoolGenesis::generate("Test", &["Alpha", "Beta", "Gamma", "Delta"]),
        config,
    )
}

fn gateway_for(ledger: SimulatedLedger, alias: &str) -> LedgerGateway {
    let wallet = Arc::new(KeyWallet::new(KeyPair::from_alias(alias)));
    LedgerGateway::new(Arc::new(ledger), wallet, &GatewayConfig::default())
}

fn degree_schema() -> Schema {
    Schema::new("degree", "1.0", ["name", "age"])
}

fn sample_pk() -> PublicKey {
    PublicKey {
        n: "89057765651800459030103911598694169835931320404459570102253965466045532669865684092518362135930940112502263498496335250135601124519172068317163741086983519494043168252186111551835366571584950296764626458785776311514968350600732183408950813066589742888246925358509482561838243805468775416479523402043160919428168650069477488093758569936116799246881809224343325540306266957664475026390533069487455816053169001876208052109360113102565642529699056163373190930839656498261278601357214695582219007449398650197048218304260447909283768896882743373383452996855450316360259637079070460616248922547314789644935074980711243164129".into(),
        rms: "5166367624784247881496559180647616631401832977910075839267820443586410170627642110010711877619928398".into(),
        rctxt: "7022687767435709886380833776532789172829671309454546763322765851221906940613104000645306426254804565".into(),
        r: BTreeMap::from([
            ("name".to_string(), "1979951958527931540565952299305290822688033970730254590821856428751308795859".to_string()),
            ("age".to_string(), "3848520154406932651573521098458347935926373612519082155154287034693546004838".to_string()),
        ]),
        s: "4601074866547493493763721181822644724422110101028105102273321700568382308105".into(),
        z: "1035568322154564985313185300911755351909301509992565993227180251922150812621".into(),
        seq_id: None,
    }
}

fn sample_revocation_key() -> RevocationPublicKey {
    RevocationPublicKey {
        qr: "1 1".into(),
        g: "1 2".into(),
        h: "1 3".into(),
        h0: "1 4".into(),
        h1: "1 5".into(),
        h2: "1 6".into(),
        htilde: "1 7".into(),
        u: "1 8".into(),
        pk: "1 9".into(),
        y: "1 10".into(),
        x: "11".into(),
        seq_id: None,
    }
}

#[tokio::test(start_paused = true)]
async fn submit_schema_assigns_issuer_and_seq_no() -> Result<()> {
    let gateway = gateway_for(test_pool(LedgerSimConfig::default()), "Faber");
    let faber = gateway.wallet().default_id();

    let stored = gateway
        .submit_schema(&degree_schema())
        .await?
        .expect("schema should receive a sequence number");

    assert_eq!(stored.name, "degree");
    assert_eq!(stored.version, "1.0");
    assert_eq!(stored.schema_type, "CL");
    assert_eq!(stored.attr_names, vec!["name", "age"]);
    assert_eq!(stored.issuer_id, Some(faber));
    assert_eq!(stored.seq_id, Some(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn submitted_schema_can_be_read_back() -> Result<()> {
    let gateway = gateway_for(test_pool(LedgerSimConfig::default()), "Faber");
    let stored = gateway.submit_schema(&degree_schema()).await?.unwrap();

    let key = stored.key().expect("stored schema has an issuer");
    let fetched = gateway.get_schema(&key).await?.expect("schema is on the ledger");

    assert_eq!(fetched, stored);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn missing_schema_reads_as_none() -> Result<()> {
    let gateway = gateway_for(test_pool(LedgerSimConfig::default()), "Faber");
    let key = SchemaKey::new("degree", "9.9", gateway.wallet().default_id());

    assert_eq!(gateway.get_schema(&key).await?, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn schema_reads_are_scoped_to_the_issuer() -> Result<()> {
    let ledger = test_pool(LedgerSimConfig::default());
    let faber = gateway_for(ledger.clone(), "Faber");
    let acme = gateway_for(ledger, "Acme");

    faber.submit_schema(&degree_schema()).await?.unwrap();

    let under_acme = SchemaKey::new("degree", "1.0", acme.wallet().default_id());
    assert_eq!(acme.get_schema(&under_acme).await?, None);

    let under_faber = SchemaKey::new("degree", "1.0", faber.wallet().default_id());
    assert!(acme.get_schema(&under_faber).await?.is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn duplicate_schema_is_rejected() -> Result<()> {
    let gateway = gateway_for(test_pool(LedgerSimConfig::default()), "Faber");
    gateway.submit_schema(&degree_schema()).await?;

    let started = Instant::now();
    let err = gateway.submit_schema(&degree_schema()).await.unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Rejected { ref reason, .. } if reason.contains("already exists")
    ));
    assert!(started.elapsed() < Duration::from_secs(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn public_keys_round_trip_through_the_ledger() -> Result<()> {
    let gateway = gateway_for(test_pool(LedgerSimConfig::default()), "Faber");
    let schema = gateway.submit_schema(&degree_schema()).await?.unwrap();
    let schema_id = schema.seq_id.unwrap();

    let (pk, pk_r) = gateway
        .submit_public_keys(schema_id, &sample_pk(), Some(&sample_revocation_key()))
        .await?
        .expect("keys should receive a sequence number");
    assert_eq!(pk.seq_id, Some(2));
    assert_eq!(pk_r.as_ref().and_then(|k| k.seq_id), Some(2));

    let id = schema.issuer_key_id().unwrap();
    let fetched = gateway.get_public_key(&id).await?.unwrap();
    assert_eq!(fetched, pk);

    let fetched_r = gateway.get_public_key_revocation(&id).await?;
    assert_eq!(fetched_r, pk_r);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn absent_revocation_key_reads_as_none() -> Result<()> {
    let gateway = gateway_for(test_pool(LedgerSimConfig::default()), "Faber");
    let schema = gateway.submit_schema(&degree_schema()).await?.unwrap();
    let id = schema.issuer_key_id().unwrap();

    let (_, pk_r) = gateway
        .submit_public_keys(id.schema_id, &sample_pk(), None)
        .await?
        .unwrap();
    assert!(pk_r.is_none());

    assert!(gateway.get_public_key(&id).await?.is_some());
    assert_eq!(gateway.get_public_key_revocation(&id).await?, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn keys_for_unknown_schema_are_rejected() -> Result<()> {
    let gateway = gateway_for(test_pool(LedgerSimConfig::default()), "Faber");

    let err = gateway
        .submit_public_keys(42, &sample_pk(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Rejected { ref reason, .. } if reason.contains("unknown schema")
    ));

    let id = IssuerKeyId::new(42, gateway.wallet().default_id());
    assert_eq!(gateway.get_public_key(&id).await?, None);
    assert_eq!(gateway.get_public_key_revocation(&id).await?, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn confirmation_inside_the_window_is_returned() -> Result<()> {
    let ledger = test_pool(LedgerSimConfig {
        confirmation_delay: Duration::from_secs(7),
        ..Default::default()
    });
    let gateway = gateway_for(ledger, "Faber");

    let started = Instant::now();
    let stored = gateway.submit_schema(&degree_schema()).await?;

    assert!(stored.is_some());
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(7) && waited < Duration::from_secs(20));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn tolerated_faulty_node_does_not_block_consensus() -> Result<()> {
    let ledger = test_pool(LedgerSimConfig {
        faulty_nodes: 1,
        ..Default::default()
    });
    let gateway = gateway_for(ledger, "Faber");

    let stored = gateway.submit_schema(&degree_schema()).await?.unwrap();
    assert_eq!(stored.seq_id, Some(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn too_many_faulty_nodes_time_out() {
    let ledger = test_pool(LedgerSimConfig {
        faulty_nodes: 2,
        ..Default::default()
    });
    let gateway = gateway_for(ledger.clone(), "Faber");

    let started = Instant::now();
    let err = gateway.submit_schema(&degree_schema()).await.unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(20) && waited < Duration::from_secs(21));
    assert!(ledger.transactions().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn legacy_quoted_replies_decode() -> Result<()> {
    let ledger = test_pool(LedgerSimConfig {
        legacy_quotes: true,
        ..Default::default()
    });
    let gateway = gateway_for(ledger, "Faber");

    let stored = gateway.submit_schema(&degree_schema()).await?.unwrap();
    let fetched = gateway.get_schema(&stored.key().unwrap()).await?.unwrap();
    assert_eq!(fetched.attr_names, vec!["name", "age"]);
    assert_eq!(fetched.seq_id, Some(1));

    let id = stored.issuer_key_id().unwrap();
    gateway
        .submit_public_keys(id.schema_id, &sample_pk(), Some(&sample_revocation_key()))
        .await?;
    assert_eq!(gateway.get_public_key(&id).await?.unwrap().n, sample_pk().n);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn requests_are_signed_by_the_default_identity() -> Result<()> {
    let ledger = test_pool(LedgerSimConfig::default());
    let wallet = Arc::new(KeyWallet::new(KeyPair::from_alias("Faber")));
    let acme = wallet.add_identity(KeyPair::from_alias("Acme"));
    wallet.set_default(&acme)?;

    let gateway = LedgerGateway::new(Arc::new(ledger.clone()), wallet, &GatewayConfig::default());
    let stored = gateway.submit_schema(&degree_schema()).await?.unwrap();

    assert_eq!(stored.issuer_id.as_ref(), Some(&acme));
    assert_eq!(ledger.transactions().await[0].identifier, acme);
    Ok(())
}

#[tokio::test]
async fn revocation_registry_operations_are_unsupported() {
    let gateway = gateway_for(test_pool(LedgerSimConfig::default()), "Faber");
    let id = IssuerKeyId::new(1, gateway.wallet().default_id());
    let accum = Accumulator {
        i_a: "1".into(),
        acc: "2".into(),
        v: BTreeSet::new(),
        l: 1,
        current_i: 1,
    };
    let accum_pk = AccumulatorPublicKey {
        z: "3".into(),
        seq_id: None,
    };

    assert!(matches!(
        gateway.get_public_key_accumulator(&id).await,
        Err(LedgerError::Unsupported(_))
    ));
    assert!(matches!(gateway.get_accumulator(&id).await, Err(LedgerError::Unsupported(_))));
    assert!(matches!(gateway.get_tails(&id).await, Err(LedgerError::Unsupported(_))));
    assert!(matches!(
        gateway
            .submit_accumulator(&id, &accum_pk, &accum, &Tails::default())
            .await,
        Err(LedgerError::Unsupported(_))
    ));
    assert!(matches!(
        gateway.submit_accum_update(&id, &accum, 1_700_000_000_000).await,
        Err(LedgerError::Unsupported(_))
    ));
}

/// Ledger stub that confirms every request with a fixed reply.
struct FixedReplyClient {
    reply: ConsensusReply,
}

#[async_trait::async_trait]
impl LedgerClient for FixedReplyClient {
    async fn submit(&self, request: SignedRequest) -> Result<RequestKey, LedgerError> {
        Ok(request.key())
    }

    async fn reply_if_consensus(
        &self,
        _key: &RequestKey,
    ) -> (Option<ConsensusReply>, Option<String>) {
        (Some(self.reply.clone()), None)
    }
}

fn gateway_with_reply(reply: ConsensusReply) -> LedgerGateway {
    LedgerGateway::new(
        Arc::new(FixedReplyClient { reply }),
        Arc::new(KeyWallet::new(KeyPair::from_alias("Faber"))),
        &GatewayConfig::default(),
    )
}

#[tokio::test]
async fn confirmed_write_without_seq_no_yields_none() -> Result<()> {
    let no_seq = gateway_with_reply(ConsensusReply::new(r#"{"name":"degree"}"#, None));
    assert_eq!(no_seq.submit_schema(&degree_schema()).await?, None);
    assert_eq!(no_seq.submit_public_keys(1, &sample_pk(), None).await?, None);

    // An empty payload hides the envelope sequence number.
    let empty = gateway_with_reply(ConsensusReply::new("{}", Some(5)));
    assert_eq!(empty.submit_schema(&degree_schema()).await?, None);
    Ok(())
}

#[tokio::test]
async fn malformed_read_payload_is_a_decode_error() {
    let gateway = gateway_with_reply(ConsensusReply::new("{not json", None));
    let key = SchemaKey::new("degree", "1.0", gateway.wallet().default_id());

    let err = gateway.get_schema(&key).await.unwrap_err();
    assert!(matches!(err, LedgerError::Decode(_)));
}

#[tokio::test]
async fn read_seq_no_comes_from_the_payload() -> Result<()> {
    let origin = KeyPair::from_alias("Faber").did;
    let payload = format!(
        "{{'name': 'degree', 'version': '1.0', 'type': 'CL', 'attr_names': 'name,age', \
         'origin': '{}', 'seqNo': 12}}",
        origin
    );
    let gateway = gateway_with_reply(ConsensusReply::new(payload, Some(99)));

    let schema = gateway
        .get_schema(&SchemaKey::new("degree", "1.0", origin.clone()))
        .await?
        .unwrap();
    assert_eq!(schema.seq_id, Some(12));
    assert_eq!(schema.issuer_id, Some(origin));
    Ok(())
}

#[tokio::test]
async fn confirmed_write_carries_the_envelope_seq_no() -> Result<()> {
    let gateway = gateway_with_reply(ConsensusReply::new(
        r#"{"name":"degree","version":"1.0","attr_names":"name,age"}"#,
        Some(7),
    ));

    let schema = gateway.submit_schema(&degree_schema()).await?.unwrap();
    assert_eq!(schema.seq_id, Some(7));
    assert_eq!(schema.attr_names, vec!["name".to_string(), "age".to_string()]);
    assert_eq!(schema.issuer_id, Some(gateway.wallet().default_id()));
    Ok(())
}

/// Ledger stub that switches the wallet default while the request is in
/// flight, then confirms it.
struct SwitchingClient {
    wallet: Arc<KeyWallet>,
    next_default: Did,
}

#[async_trait::async_trait]
impl LedgerClient for SwitchingClient {
    async fn submit(&self, request: SignedRequest) -> Result<RequestKey, LedgerError> {
        Ok(request.key())
    }

    async fn reply_if_consensus(
        &self,
        _key: &RequestKey,
    ) -> (Option<ConsensusReply>, Option<String>) {
        self.wallet.set_default(&self.next_default).unwrap();
        (Some(ConsensusReply::new(r#"{"name":"degree"}"#, Some(7))), None)
    }
}

#[tokio::test]
async fn written_schema_names_the_signing_identity() -> Result<()> {
    let faber = KeyPair::from_alias("Faber").did;
    let wallet = Arc::new(KeyWallet::new(KeyPair::from_alias("Faber")));
    let acme = wallet.add_identity(KeyPair::from_alias("Acme"));
    let client = SwitchingClient {
        wallet: wallet.clone(),
        next_default: acme.clone(),
    };
    let gateway = LedgerGateway::new(Arc::new(client), wallet.clone(), &GatewayConfig::default());

    let schema = gateway.submit_schema(&degree_schema()).await?.unwrap();
    assert_eq!(wallet.default_id(), acme);
    assert_eq!(schema.issuer_id, Some(faber));
    assert_eq!(schema.seq_id, Some(7));
    Ok(())
}

/// Ledger stub whose consensus polls never complete.
struct StalledClient;

#[async_trait::async_trait]
impl LedgerClient for StalledClient {
    async fn submit(&self, request: SignedRequest) -> Result<RequestKey, LedgerError> {
        Ok(request.key())
    }

    async fn reply_if_consensus(
        &self,
        _key: &RequestKey,
    ) -> (Option<ConsensusReply>, Option<String>) {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_pool_still_times_out() {
    let gateway = LedgerGateway::new(
        Arc::new(StalledClient),
        Arc::new(KeyWallet::new(KeyPair::from_alias("Faber"))),
        &GatewayConfig::default(),
    );

    let started = Instant::now();
    let err = gateway.submit_schema(&degree_schema()).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}
