use idledger_identity::KeyPair;
use idledger_types::constants::{ATTR_NAMES, DATA, NAME, SCHEMA, TXN_TYPE};
use idledger_types::{ConsensusReply, Operation, Request, RequestKey, Schema, SignedRequest};
use serde_json::{json, Value};

#[test]
fn operation_data_is_a_json_string() {
    let op = Operation::new(SCHEMA).with_data(&json!({ NAME: "degree", ATTR_NAMES: "name,age" }));

    let wire = serde_json::to_value(&op).unwrap();
    assert_eq!(wire[TXN_TYPE], "101");

    let data = wire[DATA].as_str().expect("data must be encoded as a string");
    let inner: Value = serde_json::from_str(data).unwrap();
    assert_eq!(inner[NAME], "degree");
    assert_eq!(inner[ATTR_NAMES], "name,age");
}

#[test]
fn signing_bytes_are_stable_and_sorted() {
    let kp = KeyPair::from_alias("Faber");
    let op = Operation::new(SCHEMA)
        .with_field("zeta", 1)
        .with_field("alpha", 2);
    let req = Request::new(kp.did.clone(), 42, op);

    let a = req.signing_bytes().unwrap();
    let b = req.clone().signing_bytes().unwrap();
    assert_eq!(a, b);

    let text = String::from_utf8(a).unwrap();
    let alpha = text.find("\"alpha\"").unwrap();
    let zeta = text.find("\"zeta\"").unwrap();
    assert!(alpha < zeta);
    let identifier = text.find("\"identifier\"").unwrap();
    let operation = text.find("\"operation\"").unwrap();
    assert!(identifier < operation);
}

#[test]
fn signed_request_flattens_request_fields() {
    let kp = KeyPair::from_alias("Acme");
    let req = Request::new(kp.did.clone(), 7, Operation::new(SCHEMA));
    let signed = SignedRequest {
        request: req,
        signature: "abcd".to_string(),
    };

    let wire = serde_json::to_value(&signed).unwrap();
    assert_eq!(wire["identifier"], kp.did.as_str());
    assert_eq!(wire["reqId"], 7);
    assert_eq!(wire["signature"], "abcd");
    assert_eq!(signed.key(), RequestKey::new(kp.did.clone(), 7));

    let back: SignedRequest = serde_json::from_value(wire).unwrap();
    assert_eq!(back, signed);
}

#[test]
fn reply_envelope_parses_with_missing_fields() {
    let reply: ConsensusReply =
        serde_json::from_value(json!({ "data": "{'a': 1}", "seqNo": 3 })).unwrap();
    assert_eq!(reply.seq_no, Some(3));
    assert_eq!(reply.data.as_deref(), Some("{'a': 1}"));
    assert!(reply.identifier.is_none());

    let pending: ConsensusReply = serde_json::from_value(json!({ "seqNo": null })).unwrap();
    assert_eq!(pending.seq_no, None);
    assert_eq!(pending.data, None);
}

#[test]
fn schema_updates_return_new_values() {
    let draft = Schema::new("degree", "1.0", ["name", "age"]);
    let issuer = KeyPair::from_alias("Faber").did;

    let stored = draft.clone().with_issuer_id(issuer.clone()).with_seq_id(7);

    assert_eq!(draft.seq_id, None);
    assert_eq!(draft.issuer_id, None);
    assert_eq!(stored.seq_id, Some(7));
    assert_eq!(stored.key().unwrap().issuer_id, issuer);
    assert_eq!(stored.attr_names, draft.attr_names);
    assert_eq!(stored.schema_type, "CL");
}
