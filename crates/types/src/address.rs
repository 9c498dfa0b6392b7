/// Errors that can occur when parsing an address string.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("address must not be empty")]
    Empty,
}

/// Encode raw public key bytes into the human readable gateway format.
///
/// Addresses travel as the plain hexadecimal representation of the public
/// key bytes. The gateway does not pin a key length: observers of different
/// networks expose keys of different sizes and the routing layer only needs
/// the raw bytes to compute the owning shard.
pub fn encode_address(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Attempt to decode a human readable address string into the raw bytes.
pub fn decode_address(address: &str) -> Result<Vec<u8>, AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }

    Ok(hex::decode(address)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let bytes = vec![0xABu8; 32];
        let encoded = encode_address(&bytes);
        assert_eq!(encoded.len(), 64);

        let decoded = decode_address(&encoded).expect("address should decode");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn short_addresses_accepted() {
        let decoded = decode_address("61616161").expect("short address should decode");
        assert_eq!(decoded, b"aaaa".to_vec());
    }

    #[test]
    fn invalid_hex_rejected() {
        let err = decode_address("invalid hex number").unwrap_err();
        assert!(matches!(err, AddressError::InvalidHex(_)));
    }

    #[test]
    fn empty_rejected() {
        let err = decode_address("").unwrap_err();
        assert!(matches!(err, AddressError::Empty));
    }
}
