use super::{Bytes, SignatureEntry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};

/// The kind of operation a transaction performs
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum TransactionType {
    Send,
    ContractCall,
    WalletInitialization,
    KeyRegistration,
    StakingActivate,
    StakingWithdraw,
}

/// One canonical input or output of a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub address: String,
    /// Amount in base units, or the chain's native asset syntax where it has one
    pub value: String,
    pub coin: String,
}

impl Entry {
    pub fn new(
        address: impl Into<String>,
        value: impl Into<String>,
        coin: impl Into<String>,
    ) -> Self {
        Self { address: address.into(), value: value.into(), coin: coin.into() }
    }
}

/// Everything needed to assemble a [`TransactionRecord`]
#[derive(Clone, Debug)]
pub struct RecordParts {
    pub id: String,
    pub tx_type: TransactionType,
    pub coin: String,
    pub sender: String,
    pub fee: u64,
    pub inputs: Vec<Entry>,
    pub outputs: Vec<Entry>,
    pub raw: Bytes,
    pub broadcast: Bytes,
    pub signatures: Vec<SignatureEntry>,
    pub signature_weight: u32,
    pub threshold: u32,
    pub fully_signed: bool,
    /// Chain specific fields added to the explain projection
    pub details: Map<String, Value>,
}

/// The immutable result of a successful build.
///
/// A record is never modified after it is returned. Signing further and building again
/// produces a new record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransactionRecord {
    id: String,
    #[serde(rename = "type")]
    tx_type: TransactionType,
    coin: String,
    sender: String,
    fee: u64,
    inputs: Vec<Entry>,
    outputs: Vec<Entry>,
    raw: Bytes,
    broadcast: Bytes,
    signatures: Vec<SignatureEntry>,
    signature_weight: u32,
    threshold: u32,
    fully_signed: bool,
    #[serde(skip)]
    details: Map<String, Value>,
}

impl From<RecordParts> for TransactionRecord {
    fn from(parts: RecordParts) -> Self {
        Self {
            id: parts.id,
            tx_type: parts.tx_type,
            coin: parts.coin,
            sender: parts.sender,
            fee: parts.fee,
            inputs: parts.inputs,
            outputs: parts.outputs,
            raw: parts.raw,
            broadcast: parts.broadcast,
            signatures: parts.signatures,
            signature_weight: parts.signature_weight,
            threshold: parts.threshold,
            fully_signed: parts.fully_signed,
            details: parts.details,
        }
    }
}

impl TransactionRecord {
    /// The chain defined transaction identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tx_type(&self) -> TransactionType {
        self.tx_type
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn inputs(&self) -> &[Entry] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Entry] {
        &self.outputs
    }

    /// Signatures in the order they are emitted in the broadcast encoding
    pub fn signatures(&self) -> &[SignatureEntry] {
        &self.signatures
    }

    pub fn signature_weight(&self) -> u32 {
        self.signature_weight
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_fully_signed(&self) -> bool {
        self.fully_signed
    }

    /// The unsigned encoding that signers sign over
    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw
    }

    /// The chain-native encoding including every collected signature
    pub fn to_broadcast_bytes(&self) -> Bytes {
        self.broadcast.clone()
    }

    pub fn to_broadcast_hex(&self) -> String {
        self.broadcast.to_hex()
    }

    /// A display oriented projection for reviewing a transaction before signing it.
    ///
    /// `to` and `amount` describe the first output, when there is one.
    pub fn to_explain_json(&self) -> Value {
        let mut explain = Map::new();
        explain.insert("id".into(), json!(self.id));
        explain.insert("type".into(), json!(self.tx_type.to_string()));
        explain.insert("coin".into(), json!(self.coin));
        explain.insert("from".into(), json!(self.sender));
        if let Some(output) = self.outputs.first() {
            explain.insert("to".into(), json!(output.address));
            explain.insert("amount".into(), json!(output.value));
        }
        explain.insert("fee".into(), json!(self.fee));
        explain.insert("outputs".into(), json!(self.outputs));
        explain.insert("signatures".into(), json!(self.signatures.len()));
        explain.insert("fullySigned".into(), json!(self.fully_signed));
        for (key, value) in &self.details {
            explain.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(explain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TransactionRecord {
        let mut details = Map::new();
        details.insert("memo".into(), json!("hello"));
        details.insert("fee".into(), json!("ignored"));
        RecordParts {
            id: "abc".into(),
            tx_type: TransactionType::Send,
            coin: "tstx".into(),
            sender: "S".into(),
            fee: 180,
            inputs: vec![Entry::new("S", "1000", "tstx")],
            outputs: vec![Entry::new("D", "1000", "tstx")],
            raw: vec![1u8, 2, 3].into(),
            broadcast: vec![1u8, 2, 3, 4].into(),
            signatures: vec![],
            signature_weight: 0,
            threshold: 1,
            fully_signed: false,
            details,
        }
        .into()
    }

    #[test]
    fn explains_first_output() {
        let explain = record().to_explain_json();
        assert_eq!(explain["from"], "S");
        assert_eq!(explain["to"], "D");
        assert_eq!(explain["amount"], "1000");
        assert_eq!(explain["fee"], 180);
        assert_eq!(explain["type"], "Send");
        assert_eq!(explain["memo"], "hello");
    }

    #[test]
    fn broadcast_accessors() {
        let record = record();
        assert_eq!(record.to_broadcast_hex(), "01020304");
        assert_eq!(&record.to_broadcast_bytes()[..], &[1u8, 2, 3, 4]);
        assert_eq!(record.raw_bytes().to_hex(), "010203");
        assert_eq!(
            "StakingActivate".parse::<TransactionType>().unwrap(),
            TransactionType::StakingActivate
        );
    }
}
