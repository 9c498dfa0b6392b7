use serde::{Deserialize, Serialize};

/// A transaction as submitted by a client for routing.
///
/// Addresses are hex-encoded public keys, the value is a decimal string
/// (observer networks routinely exceed 64-bit amounts) and the signature is
/// hex. The gateway validates encodings and routes; it never verifies
/// signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default, rename = "gasPrice")]
    pub gas_price: u64,
    #[serde(default, rename = "gasLimit")]
    pub gas_limit: u64,
    #[serde(default, with = "serde_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub signature: String,
    #[serde(default, rename = "chainID")]
    pub chain_id: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian: Option<String>,
    #[serde(
        default,
        rename = "guardianSignature",
        skip_serializing_if = "Option::is_none"
    )]
    pub guardian_signature: Option<String>,
}

/// The canonical wire form of a transaction, with every variable-length
/// field already decoded to raw bytes.
///
/// The byte encoding produced by [`WireTransaction::wire_bytes`] is the
/// hashing preimage clients rely on to correlate a submitted transaction
/// with later status queries, so the field order and framing here must
/// never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireTransaction {
    pub nonce: u64,
    /// Big-endian magnitude of the (non-negative) value.
    pub value: Vec<u8>,
    pub receiver: Vec<u8>,
    pub sender: Vec<u8>,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub data: Vec<u8>,
    pub chain_id: String,
    pub version: u32,
    pub signature: Vec<u8>,
    pub options: Option<u32>,
}

impl WireTransaction {
    /// Serialize the transaction with a fixed field order and unambiguous
    /// framing: fixed-width integers big-endian, variable-length fields
    /// length-prefixed.
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(
            64 + self.value.len()
                + self.receiver.len()
                + self.sender.len()
                + self.data.len()
                + self.chain_id.len()
                + self.signature.len(),
        );

        buffer.extend_from_slice(&self.nonce.to_be_bytes());
        push_framed(&mut buffer, &self.value);
        push_framed(&mut buffer, &self.receiver);
        push_framed(&mut buffer, &self.sender);
        buffer.extend_from_slice(&self.gas_price.to_be_bytes());
        buffer.extend_from_slice(&self.gas_limit.to_be_bytes());
        push_framed(&mut buffer, &self.data);
        push_framed(&mut buffer, self.chain_id.as_bytes());
        buffer.extend_from_slice(&self.version.to_be_bytes());
        push_framed(&mut buffer, &self.signature);
        if let Some(options) = self.options {
            buffer.extend_from_slice(&options.to_be_bytes());
        }

        buffer
    }

    /// The canonical transaction hash: blake3 over the wire encoding,
    /// rendered as lowercase hex.
    pub fn hash(&self) -> String {
        let digest = blake3::hash(&self.wire_bytes());
        hex::encode(digest.as_bytes())
    }
}

fn push_framed(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buffer.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_wire_tx() -> WireTransaction {
        WireTransaction {
            nonce: 1,
            value: vec![1],
            receiver: b"aaaa".to_vec(),
            sender: b"bbbb".to_vec(),
            gas_price: 1,
            gas_limit: 2,
            data: b"blablabla".to_vec(),
            chain_id: "1".to_string(),
            version: 1,
            signature: vec![0xAB, 0xCD, 0xAB, 0xCD],
            options: None,
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let tx = sample_wire_tx();
        assert_eq!(tx.hash(), tx.hash());
    }

    #[test]
    fn hash_changes_with_any_field() {
        let base = sample_wire_tx();

        let mut changed = base.clone();
        changed.nonce = 2;
        assert_ne!(base.hash(), changed.hash());

        let mut changed = base.clone();
        changed.value = vec![2];
        assert_ne!(base.hash(), changed.hash());

        let mut changed = base.clone();
        changed.chain_id = "2".to_string();
        assert_ne!(base.hash(), changed.hash());

        let mut changed = base.clone();
        changed.data = b"blablablb".to_vec();
        assert_ne!(base.hash(), changed.hash());
    }

    #[test]
    fn framing_keeps_adjacent_fields_apart() {
        // moving a byte between adjacent variable-length fields must change
        // the encoding, not just shift bytes around
        let mut left = sample_wire_tx();
        left.receiver = b"aaa".to_vec();
        left.sender = b"abbbb".to_vec();

        let right = sample_wire_tx();
        assert_ne!(left.wire_bytes(), right.wire_bytes());
        assert_ne!(left.hash(), right.hash());
    }

    #[test]
    fn transaction_json_field_names() {
        let tx = Transaction {
            nonce: 7,
            value: "1000".to_string(),
            receiver: "61616161".to_string(),
            sender: "62626262".to_string(),
            gas_price: 12,
            gas_limit: 13,
            chain_id: "1".to_string(),
            version: 1,
            ..Default::default()
        };

        let encoded = serde_json::to_value(&tx).unwrap();
        assert_eq!(encoded["chainID"], "1");
        assert_eq!(encoded["gasPrice"], 12);
        assert_eq!(encoded["gasLimit"], 13);
        assert!(encoded.get("options").is_none());
    }
}
