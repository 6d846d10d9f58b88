//! General utility functions.

pub mod config;
pub mod logging;

use crate::error::{CtError, Result};

/// Decode a hex string, accepting the empty string as zero bytes.
pub fn decode_hex(label: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| CtError::invalid_argument(format!("Invalid {} hex: {}", label, e)))
}

/// Decode hex that must be exactly `N` bytes.
pub fn decode_hex_array<const N: usize>(label: &str, value: &str) -> Result<[u8; N]> {
    let bytes = decode_hex(label, value)?;
    if bytes.len() != N {
        return Err(CtError::invalid_argument(format!(
            "Invalid {} length: expected {} bytes, got {}",
            label,
            N,
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Decode a 32-byte value written in display order (byte-reversed), as used
/// for txids, asset ids, entropy and blinding factors.
pub fn decode_reversed_hex32(label: &str, value: &str) -> Result<[u8; 32]> {
    let mut bytes = decode_hex_array::<32>(label, value)?;
    bytes.reverse();
    Ok(bytes)
}

/// Encode 32 internal-order bytes as display-order hex.
pub fn encode_reversed_hex(bytes: &[u8]) -> String {
    let mut reversed = bytes.to_vec();
    reversed.reverse();
    hex::encode(reversed)
}

/// Validate a satoshi amount passed in as a signed 64-bit integer.
pub fn checked_amount(amount: i64) -> Result<u64> {
    u64::try_from(amount)
        .map_err(|_| CtError::invalid_argument(format!("Amount out of range: {}", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_hex_roundtrip() {
        let display = "57a15002d066ce52573d674df925c9bc0f1164849420705f2cfad8a68111230f";
        let internal = decode_reversed_hex32("txid", display).unwrap();
        assert_eq!(internal[0], 0x0f);
        assert_eq!(encode_reversed_hex(&internal), display);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(decode_hex_array::<32>("asset", "00ff").is_err());
        assert!(decode_hex("script", "0g").is_err());
        assert!(decode_hex("script", "").unwrap().is_empty());
    }

    #[test]
    fn test_checked_amount() {
        assert_eq!(checked_amount(0).unwrap(), 0);
        assert_eq!(checked_amount(i64::MAX).unwrap(), i64::MAX as u64);
        assert!(checked_amount(-1).is_err());
    }
}
