use rlp::RlpStream;
use txkit::{
    chains::{
        self,
        codec::{open_envelope, seal_envelope},
    },
    prelude::*,
};

const TRON_PK: &str = "EB94159C7EBC2959720B9F0321849F792B60FCBC7BFA4A9115F7E7A72B9ACE6F";
const STX_RECIPIENT: &str = "ST10QTJZ91MTKCCK7Q3SAZBY9AC8H3H0TWKH6JV5P";
const TRX_RECIPIENT: &str = "TVHsEa7nqPebk8fU5yc9ctf8n5X7DZKxkb";
const TRX_BLOCK_HASH: &str = "0000000000badb0d89177fd84c5d9196021cc1085b9e689b3e9a6195cac8bcae";

fn secp(seed: u8) -> KeyMaterial {
    KeyMaterial::from_private(Algorithm::Secp256k1, &[seed; 32]).unwrap()
}

fn ed25519(seed: u8) -> KeyMaterial {
    KeyMaterial::from_private(Algorithm::Ed25519, &[seed; 32]).unwrap()
}

fn algo_transfer(sender: &KeyMaterial) -> AnyBuilder {
    let from = chains::algo::key_address(sender).unwrap();
    let to = chains::algo::key_address(&ed25519(8)).unwrap();
    let mut builder = new_builder("talgo", TransactionType::Send).unwrap();
    builder
        .as_algo_transfer_mut()
        .unwrap()
        .fee(1000)
        .unwrap()
        .sender(&from)
        .unwrap()
        .first_round(100)
        .unwrap()
        .last_round(1100)
        .unwrap()
        .testnet()
        .receiver(&to)
        .unwrap()
        .amount(5000)
        .unwrap();
    builder
}

fn stx_transfer(sender: &KeyMaterial) -> AnyBuilder {
    let source = chains::stx::key_address(&Coin::Tstx.config(), sender).unwrap();
    let mut builder = new_builder("tstx", TransactionType::Send).unwrap();
    builder
        .as_stx_transfer_mut()
        .unwrap()
        .fee(180)
        .unwrap()
        .source(&source)
        .unwrap()
        .nonce(0)
        .unwrap()
        .to(STX_RECIPIENT)
        .unwrap()
        .amount(1000)
        .unwrap();
    builder
}

fn trx_transfer(sender: &KeyMaterial) -> AnyBuilder {
    let source = chains::trx::key_address(sender).unwrap();
    let mut builder = new_builder("ttrx", TransactionType::Send).unwrap();
    builder
        .as_trx_transfer_mut()
        .unwrap()
        .source(&source)
        .unwrap()
        .block(51407, TRX_BLOCK_HASH)
        .unwrap()
        .timestamp(1612964127000)
        .unwrap()
        .to(TRX_RECIPIENT)
        .unwrap()
        .amount(1000)
        .unwrap();
    builder
}

fn eos_transfer() -> AnyBuilder {
    let mut builder = new_builder("teos", TransactionType::Send).unwrap();
    builder
        .as_eos_transfer_mut()
        .unwrap()
        .actor("alice")
        .unwrap()
        .expiration(1_700_000_000)
        .unwrap()
        .ref_block(4242, 0x1122_3344)
        .unwrap()
        .to("bob")
        .unwrap()
        .quantity("1.0000 EOS")
        .unwrap()
        .memo("invoice 7")
        .unwrap();
    builder
}

#[tokio::test]
async fn resuming_broadcast_bytes_rebuilds_identical_bytes() {
    let tron = KeyMaterial::from_private_hex(Algorithm::Secp256k1, TRON_PK).unwrap();
    let cases = vec![
        ("talgo", algo_transfer(&ed25519(7)), ed25519(7)),
        ("tstx", stx_transfer(&secp(1)), secp(1)),
        ("ttrx", trx_transfer(&tron), tron),
        ("teos", eos_transfer(), secp(5)),
    ];

    for (coin, mut builder, key) in cases {
        builder.queue_signer(key).unwrap();
        let tx = builder.build().await.unwrap();
        assert!(tx.is_fully_signed(), "{coin}");

        let mut resumed = builder_from_raw(coin, &tx.to_broadcast_bytes()).unwrap();
        assert_eq!(resumed.kind(), builder.kind(), "{coin}");
        assert_eq!(resumed.ledger().entries(), tx.signatures(), "{coin}");
        let rebuilt = resumed.build().await.unwrap();
        assert_eq!(rebuilt.to_broadcast_bytes(), tx.to_broadcast_bytes(), "{coin}");
        assert_eq!(rebuilt.id(), tx.id(), "{coin}");
        assert_eq!(rebuilt.to_explain_json(), tx.to_explain_json(), "{coin}");
    }
}

#[tokio::test]
async fn single_signer_transfer_explains_its_fields() {
    let sender = secp(1);
    let source = chains::stx::key_address(&Coin::Tstx.config(), &sender).unwrap();

    let mut builder = stx_transfer(&sender);
    builder.queue_signer(sender.clone()).unwrap();
    let tx = builder.build().await.unwrap();

    let explain = tx.to_explain_json();
    assert_eq!(explain["from"], source);
    assert_eq!(explain["to"], STX_RECIPIENT);
    assert_eq!(explain["amount"], "1000");
    assert_eq!(explain["fee"], 180);
    assert_eq!(explain["type"], "Send");
    assert_eq!(explain["fullySigned"], true);

    // independent builders with the same inputs agree byte for byte
    let mut again = stx_transfer(&sender);
    again.queue_signer(sender).unwrap();
    assert_eq!(again.build().await.unwrap().to_broadcast_bytes(), tx.to_broadcast_bytes());
}

#[tokio::test]
async fn fee_below_the_minimum_is_never_stored() {
    let mut builder = new_builder("tstx", TransactionType::Send).unwrap();
    let stx = builder.as_stx_transfer_mut().unwrap();
    let err = stx.fee(179).unwrap_err();
    assert!(matches!(err, BuilderError::Validation { field: "fee", .. }));
    assert!(err.to_string().contains("179"));
    assert!(matches!(builder.build().await, Err(BuilderError::MissingField("fee"))));
    assert_eq!(builder.phase(), Phase::Empty);

    let mut algo = new_builder("algo", TransactionType::Send).unwrap();
    assert!(matches!(
        algo.as_algo_transfer_mut().unwrap().fee(999),
        Err(BuilderError::Validation { field: "fee", .. })
    ));
    assert!(matches!(algo.build().await, Err(BuilderError::MissingField("fee"))));
}

#[tokio::test]
async fn failed_builds_leave_the_builder_retryable() {
    let tron = KeyMaterial::from_private_hex(Algorithm::Secp256k1, TRON_PK).unwrap();
    let mut builder = new_builder("ttrx", TransactionType::Send).unwrap();
    builder.queue_signer(tron.clone()).unwrap();
    assert!(matches!(builder.build().await, Err(BuilderError::MissingField("source"))));
    assert_eq!(builder.pending_signers(), vec![tron.identity()]);
    assert_eq!(builder.phase(), Phase::Configured);

    let source = chains::trx::key_address(&tron).unwrap();
    builder
        .as_trx_transfer_mut()
        .unwrap()
        .source(&source)
        .unwrap()
        .block(51407, TRX_BLOCK_HASH)
        .unwrap()
        .timestamp(1612964127000)
        .unwrap()
        .to(TRX_RECIPIENT)
        .unwrap()
        .amount(1000)
        .unwrap();
    let tx = builder.build().await.unwrap();
    assert_eq!(builder.phase(), Phase::Built);
    assert_eq!(tx.sender(), source);

    // building again recomputes the same transaction
    let again = builder.build().await.unwrap();
    assert_eq!(again, tx);
}

#[test]
fn malformed_bytes_are_parse_errors() {
    let inputs: [&[u8]; 4] = [b"", b"not a transaction", &[0xc0], &[0xc3, 0x80, 0x80]];
    for coin in ["algo", "talgo", "stx", "tstx", "trx", "ttrx", "eos", "teos"] {
        for raw in inputs {
            assert!(
                matches!(builder_from_raw(coin, raw), Err(BuilderError::Parse(_))),
                "{coin} accepted {raw:?}"
            );
        }
    }
}

/// Replaces the authorization of `raw` while keeping its unsigned part
fn with_authorization(raw: &[u8], authorization: RlpStream) -> Vec<u8> {
    let (unsigned, _) = open_envelope(raw).unwrap();
    seal_envelope(unsigned.as_raw(), &authorization.out())
}

/// A 2-of-3 Stacks multisig transfer over secp256k1 seeds 1, 2 and 3
fn stx_multisig() -> AnyBuilder {
    let public: Vec<String> = (1..=3).map(|seed| hex::encode(secp(seed).public_key())).collect();
    let declared: Vec<&str> = public.iter().map(String::as_str).collect();
    let mut builder = new_builder("tstx", TransactionType::Send).unwrap();
    let stx = builder.as_stx_transfer_mut().unwrap();
    stx.multisig(2, &declared).unwrap();
    let account = stx.multisig_address().unwrap();
    stx.fee(180)
        .unwrap()
        .source(&account)
        .unwrap()
        .nonce(0)
        .unwrap()
        .to(STX_RECIPIENT)
        .unwrap()
        .amount(1000)
        .unwrap();
    builder
}

#[tokio::test]
async fn corrupt_authorizations_are_parse_errors() {
    let mut cases: Vec<(&str, Vec<u8>)> = Vec::new();

    let stx = stx_multisig().build_partial().await.unwrap().to_broadcast_bytes();
    let stx_auth = |threshold: u8, fields: &[(u8, Vec<u8>)]| {
        let mut s = RlpStream::new_list(2);
        s.append(&threshold);
        s.begin_list(fields.len());
        for (kind, data) in fields {
            s.begin_list(2);
            s.append(kind);
            s.append(data);
        }
        with_authorization(&stx, s)
    };
    let keys: Vec<(u8, Vec<u8>)> =
        (1..=17).map(|seed| (0x00, secp(seed).public_key().to_vec())).collect();
    // thresholds outside 1..=keys, including ones no script opcode can express
    cases.push(("tstx", stx_auth(200, &[])));
    cases.push(("tstx", stx_auth(255, &keys[..3])));
    cases.push(("tstx", stx_auth(0, &keys[..3])));
    cases.push(("tstx", stx_auth(4, &keys[..3])));
    // more keys than a redeem script holds
    cases.push(("tstx", stx_auth(2, &keys[..])));
    // unknown field kind
    cases.push(("tstx", stx_auth(2, &[(0x07, keys[0].1.clone())])));

    let algo = algo_transfer(&ed25519(7)).build_partial().await.unwrap().to_broadcast_bytes();
    let public = ed25519(7).public_key().to_vec();
    let mut s = RlpStream::new_list(4);
    s.append(&"msig").append(&2u8).append(&1u8);
    s.begin_list(1).begin_list(2).append(&public).append_empty_data();
    cases.push(("talgo", with_authorization(&algo, s)));
    let mut s = RlpStream::new_list(4);
    s.append(&"msig").append(&1u8).append(&1u8);
    s.begin_list(1).begin_list(2).append(&&public[..31]).append_empty_data();
    cases.push(("talgo", with_authorization(&algo, s)));
    let mut s = RlpStream::new_list(3);
    s.append(&"sig").append(&public).append(&vec![1u8; 10]);
    cases.push(("talgo", with_authorization(&algo, s)));

    let tron = KeyMaterial::from_private_hex(Algorithm::Secp256k1, TRON_PK).unwrap();
    let trx = trx_transfer(&tron).build_partial().await.unwrap().to_broadcast_bytes();
    let eos = eos_transfer().build_partial().await.unwrap().to_broadcast_bytes();
    for (coin, raw) in [("ttrx", &trx), ("teos", &eos)] {
        // a signature too short to recover a key from
        let mut s = RlpStream::new_list(2);
        s.begin_list(1).append(&vec![1u8; 10]);
        s.begin_list(0);
        cases.push((coin, with_authorization(raw, s)));
    }

    for (coin, raw) in cases {
        assert!(
            matches!(builder_from_raw(coin, &raw), Err(BuilderError::Parse(_))),
            "{coin} accepted {}",
            hex::encode(&raw)
        );
    }
}

#[test]
fn unknown_coins_and_types_are_rejected() {
    assert!(matches!(
        new_builder("doge", TransactionType::Send),
        Err(BuilderError::UnsupportedCoin(coin)) if coin == "doge"
    ));
    assert!(matches!(
        new_builder("tstx", TransactionType::KeyRegistration),
        Err(BuilderError::UnrecognizedTransactionType(_))
    ));
    assert!(matches!(
        builder_from_raw("doge", &[0xc0]),
        Err(BuilderError::UnsupportedCoin(_))
    ));
}
