//! NIP-19: bech32 `nsec` / `npub` encodings for 32-byte keys.

use bech32::{Bech32, Hrp};

use crate::error::{NostrError, Result};

pub const NSEC_HRP: &str = "nsec";
pub const NPUB_HRP: &str = "npub";
pub(crate) const NSEC_PREFIX: &str = "nsec1";

pub fn encode_nsec(secret: &[u8; 32]) -> Result<String> {
    encode_bech32(NSEC_HRP, secret)
}

pub fn encode_npub(public_key: &[u8; 32]) -> Result<String> {
    encode_bech32(NPUB_HRP, public_key)
}

pub fn decode_nsec(value: &str) -> Result<Vec<u8>> {
    decode_bech32(NSEC_HRP, value)
}

pub fn decode_npub(value: &str) -> Result<Vec<u8>> {
    decode_bech32(NPUB_HRP, value)
}

fn encode_bech32(hrp: &str, data: &[u8; 32]) -> Result<String> {
    let parsed_hrp = Hrp::parse(hrp).map_err(|error| NostrError::Bech32(error.to_string()))?;
    bech32::encode::<Bech32>(parsed_hrp, data).map_err(|error| NostrError::Bech32(error.to_string()))
}

fn decode_bech32(expected_hrp: &str, value: &str) -> Result<Vec<u8>> {
    let (hrp, data) =
        bech32::decode(value.trim()).map_err(|error| NostrError::Bech32(error.to_string()))?;
    if !hrp.as_str().eq_ignore_ascii_case(expected_hrp) {
        return Err(NostrError::Bech32(format!(
            "expected {expected_hrp} prefix, got {}",
            hrp.as_str()
        )));
    }
    if data.len() != 32 {
        return Err(NostrError::InvalidKey(format!(
            "{expected_hrp} payload must be 32 bytes, got {}",
            data.len()
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_HEX: &str = "7f7ff03d123792d6ac594bfa67bf6d0c0ab55b6b1fdb6249303fe861f1ccba9a";
    const NSEC: &str = "nsec10allq0gjx7fddtzef0ax00mdps9t2kmtrldkyjfs8l5xruwvh2dq0lhhkp";
    const PUBLIC_HEX: &str = "17162c921dc4d2518f9a101db33695df1afb56ab82f5ff3e5da6eec3ca5cd917";
    const NPUB: &str = "npub1zutzeysacnf9rru6zqwmxd54mud0k44tst6l70ja5mhv8jjumytsd2x7nu";

    fn to_array(hex_value: &str) -> Result<[u8; 32]> {
        let bytes = hex::decode(hex_value).map_err(|error| NostrError::InvalidKey(error.to_string()))?;
        bytes
            .try_into()
            .map_err(|_| NostrError::InvalidKey("expected 32 bytes".into()))
    }

    #[test]
    fn encodes_known_vectors() -> Result<()> {
        assert_eq!(encode_nsec(&to_array(SECRET_HEX)?)?, NSEC);
        assert_eq!(encode_npub(&to_array(PUBLIC_HEX)?)?, NPUB);
        Ok(())
    }

    #[test]
    fn decodes_known_vectors() -> Result<()> {
        assert_eq!(hex::encode(decode_nsec(NSEC)?), SECRET_HEX);
        assert_eq!(hex::encode(decode_npub(NPUB)?), PUBLIC_HEX);
        Ok(())
    }

    #[test]
    fn rejects_mismatched_prefix() {
        let result = decode_nsec(NPUB);
        match result {
            Err(NostrError::Bech32(message)) => assert!(message.contains("expected nsec")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let mut corrupted = NSEC.to_string();
        corrupted.pop();
        corrupted.push('q');
        assert!(matches!(decode_nsec(&corrupted), Err(NostrError::Bech32(_))));
    }
}
