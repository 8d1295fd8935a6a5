//! Utility functions for identifiers and hashing

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Serialises `value` to CBOR and returns the hex sha256 of the encoding.
pub fn content_digest<T: minicbor::Encode<()>>(value: &T) -> anyhow::Result<String> {
    let cbor = minicbor::to_vec(value)?;
    Ok(sha256::digest(&cbor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("offer").unwrap();
        assert!(encoded.starts_with("offer1"));
    }

    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("order").unwrap();
        let id2 = new_uuid_to_bech32("order").unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn digest_is_stable() {
        let a = content_digest(&vec![1u32, 2, 3]).unwrap();
        let b = content_digest(&vec![1u32, 2, 3]).unwrap();
        let c = content_digest(&vec![3u32, 2, 1]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
