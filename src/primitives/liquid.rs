//! Elements confidential primitives: asset ids, confidential asset/value/nonce
//! fields, blinding factors and issuance id derivation.

use super::encode::{read_array, read_u8, write_all, Decodable, Encodable};
use super::hash::{sha256_midstate, sha256d};
use super::transaction::OutPoint;
use crate::error::{CtError, Result};
use crate::utils::{decode_reversed_hex32, encode_reversed_hex};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// A 32-byte asset id, stored in internal byte order and displayed reversed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(pub [u8; 32]);

impl AssetId {
    pub fn new(bytes: [u8; 32]) -> Self {
        AssetId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Asset id issued from the given entropy: midstate(entropy || 0^32).
    pub fn from_entropy(entropy: &[u8; 32]) -> Self {
        AssetId(midstate_pair(entropy, &[0u8; 32]))
    }

    /// Reissuance token id for the given entropy. The token id differs
    /// depending on whether the issuance amount was blinded.
    pub fn reissuance_token_from_entropy(entropy: &[u8; 32], is_confidential: bool) -> Self {
        let mut second = [0u8; 32];
        second[0] = if is_confidential { 2 } else { 1 };
        AssetId(midstate_pair(entropy, &second))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_reversed_hex(&self.0))
    }
}

impl FromStr for AssetId {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(AssetId(decode_reversed_hex32("asset", s)?))
    }
}

impl Encodable for AssetId {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        self.0.consensus_encode(writer)
    }
}

impl Decodable for AssetId {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(AssetId(read_array(reader)?))
    }
}

fn midstate_pair(first: &[u8; 32], second: &[u8; 32]) -> [u8; 32] {
    let mut block = [0u8; 64];
    block[..32].copy_from_slice(first);
    block[32..].copy_from_slice(second);
    sha256_midstate(&block)
}

/// Entropy of a new issuance: midstate(sha256d(outpoint) || contract_hash).
pub fn generate_asset_entropy(outpoint: &OutPoint, contract_hash: &[u8; 32]) -> [u8; 32] {
    let mut serialized = Vec::with_capacity(36);
    serialized.extend_from_slice(&outpoint.txid);
    serialized.extend_from_slice(&outpoint.vout.to_le_bytes());
    midstate_pair(&sha256d(&serialized), contract_hash)
}

/// Confidential asset: either an explicit asset id or a blinded generator
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidentialAsset {
    #[default]
    Null,
    Explicit(AssetId),
    /// Wire bytes of the commitment, prefix 0x0a or 0x0b
    Confidential(#[serde_as(as = "Bytes")] [u8; 33]),
}

impl ConfidentialAsset {
    pub fn is_explicit(&self) -> bool {
        matches!(self, ConfidentialAsset::Explicit(_))
    }

    pub fn is_confidential(&self) -> bool {
        matches!(self, ConfidentialAsset::Confidential(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfidentialAsset::Null)
    }

    pub fn explicit(&self) -> Option<AssetId> {
        match self {
            ConfidentialAsset::Explicit(asset_id) => Some(*asset_id),
            _ => None,
        }
    }

    pub fn commitment(&self) -> Option<[u8; 33]> {
        match self {
            ConfidentialAsset::Confidential(c) => Some(*c),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ConfidentialAsset::Null => vec![0x00],
            ConfidentialAsset::Explicit(asset_id) => {
                let mut out = Vec::with_capacity(33);
                out.push(0x01);
                out.extend_from_slice(&asset_id.0);
                out
            }
            ConfidentialAsset::Confidential(c) => c.to_vec(),
        }
    }

    /// Parse a 33-byte asset commitment (or any wire form) from hex.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(ConfidentialAsset::Null);
        }
        let bytes = hex::decode(s)?;
        ConfidentialAsset::consensus_decode_from_slice(&bytes)
            .map_err(|_| CtError::invalid_argument(format!("Invalid asset commitment: {}", s)))
    }
}

impl Encodable for ConfidentialAsset {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        write_all(writer, &self.to_bytes())
    }
}

impl Decodable for ConfidentialAsset {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        match read_u8(reader)? {
            0x00 => Ok(ConfidentialAsset::Null),
            0x01 => Ok(ConfidentialAsset::Explicit(AssetId::consensus_decode(reader)?)),
            prefix @ (0x0a | 0x0b) => {
                let mut commitment = [0u8; 33];
                commitment[0] = prefix;
                commitment[1..].copy_from_slice(&read_array::<R, 32>(reader)?);
                Ok(ConfidentialAsset::Confidential(commitment))
            }
            prefix => Err(CtError::malformed(format!("Invalid asset prefix: {:#x}", prefix))),
        }
    }
}

/// Confidential value: an explicit amount or a Pedersen commitment
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidentialValue {
    #[default]
    Null,
    Explicit(u64),
    /// Wire bytes of the commitment, prefix 0x08 or 0x09
    Confidential(#[serde_as(as = "Bytes")] [u8; 33]),
}

impl ConfidentialValue {
    pub fn is_explicit(&self) -> bool {
        matches!(self, ConfidentialValue::Explicit(_))
    }

    pub fn is_confidential(&self) -> bool {
        matches!(self, ConfidentialValue::Confidential(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfidentialValue::Null)
    }

    pub fn explicit(&self) -> Option<u64> {
        match self {
            ConfidentialValue::Explicit(value) => Some(*value),
            _ => None,
        }
    }

    pub fn commitment(&self) -> Option<[u8; 33]> {
        match self {
            ConfidentialValue::Confidential(c) => Some(*c),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ConfidentialValue::Null => vec![0x00],
            ConfidentialValue::Explicit(value) => {
                let mut out = Vec::with_capacity(9);
                out.push(0x01);
                out.extend_from_slice(&value.to_be_bytes());
                out
            }
            ConfidentialValue::Confidential(c) => c.to_vec(),
        }
    }

    /// Hex of the wire form; empty for a null value.
    pub fn to_hex(&self) -> String {
        match self {
            ConfidentialValue::Null => String::new(),
            _ => hex::encode(self.to_bytes()),
        }
    }

    /// Parse the wire form from hex. An empty string is a null value.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(ConfidentialValue::Null);
        }
        let bytes = hex::decode(s)?;
        ConfidentialValue::consensus_decode_from_slice(&bytes)
            .map_err(|_| CtError::invalid_argument(format!("Invalid confidential value: {}", s)))
    }
}

impl Encodable for ConfidentialValue {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        write_all(writer, &self.to_bytes())
    }
}

impl Decodable for ConfidentialValue {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        match read_u8(reader)? {
            0x00 => Ok(ConfidentialValue::Null),
            0x01 => Ok(ConfidentialValue::Explicit(u64::from_be_bytes(read_array(reader)?))),
            prefix @ (0x08 | 0x09) => {
                let mut commitment = [0u8; 33];
                commitment[0] = prefix;
                commitment[1..].copy_from_slice(&read_array::<R, 32>(reader)?);
                Ok(ConfidentialValue::Confidential(commitment))
            }
            prefix => Err(CtError::malformed(format!("Invalid value prefix: {:#x}", prefix))),
        }
    }
}

/// Output nonce; for blinded outputs, the sender's ephemeral ECDH pubkey
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidentialNonce {
    #[default]
    Null,
    Explicit([u8; 32]),
    /// Compressed public key, prefix 0x02 or 0x03
    Confidential(#[serde_as(as = "Bytes")] [u8; 33]),
}

impl ConfidentialNonce {
    pub fn is_null(&self) -> bool {
        matches!(self, ConfidentialNonce::Null)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ConfidentialNonce::Null => vec![0x00],
            ConfidentialNonce::Explicit(n) => {
                let mut out = Vec::with_capacity(33);
                out.push(0x01);
                out.extend_from_slice(n);
                out
            }
            ConfidentialNonce::Confidential(c) => c.to_vec(),
        }
    }

    pub fn to_hex(&self) -> String {
        match self {
            ConfidentialNonce::Null => String::new(),
            _ => hex::encode(self.to_bytes()),
        }
    }

    /// Parse a nonce from hex; empty means null, 33 bytes starting 02/03 is a
    /// pubkey.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(ConfidentialNonce::Null);
        }
        let bytes = hex::decode(s)?;
        ConfidentialNonce::consensus_decode_from_slice(&bytes)
            .map_err(|_| CtError::invalid_argument(format!("Invalid nonce: {}", s)))
    }
}

impl Encodable for ConfidentialNonce {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        write_all(writer, &self.to_bytes())
    }
}

impl Decodable for ConfidentialNonce {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        match read_u8(reader)? {
            0x00 => Ok(ConfidentialNonce::Null),
            0x01 => Ok(ConfidentialNonce::Explicit(read_array(reader)?)),
            prefix @ (0x02 | 0x03) => {
                let mut commitment = [0u8; 33];
                commitment[0] = prefix;
                commitment[1..].copy_from_slice(&read_array::<R, 32>(reader)?);
                Ok(ConfidentialNonce::Confidential(commitment))
            }
            prefix => Err(CtError::malformed(format!("Invalid nonce prefix: {:#x}", prefix))),
        }
    }
}

/// Asset or value blinding factor, internal byte order, displayed reversed
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlindingFactor(pub [u8; 32]);

impl BlindingFactor {
    pub fn new(bytes: [u8; 32]) -> Self {
        BlindingFactor(bytes)
    }

    pub fn zero() -> Self {
        BlindingFactor([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_reversed_hex(&self.0))
    }
}

impl FromStr for BlindingFactor {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(BlindingFactor(decode_reversed_hex32("blinding factor", s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_display_roundtrip() {
        let display = "186c7f955149a5274b39e24b6a50d1d6479f552f6522d91f3a97d771f1c18179";
        let asset: AssetId = display.parse().unwrap();
        assert_eq!(asset.0[0], 0x79);
        assert_eq!(asset.to_string(), display);
        assert!("1234".parse::<AssetId>().is_err());
    }

    #[test]
    fn test_reissuance_asset_from_entropy() {
        let entropy: BlindingFactor =
            "6f9ccf5949eba5d6a08bff7a015e825c97824e82d57c8a0c77f9a41908fe8306"
                .parse()
                .unwrap();
        assert_eq!(
            AssetId::from_entropy(&entropy.0).to_string(),
            "accb7354c07974e00b32e4e5eef55078490141675592ac3610e6101831edb0cd"
        );
    }

    #[test]
    fn test_token_id_depends_on_confidentiality() {
        let entropy = [7u8; 32];
        assert_ne!(
            AssetId::reissuance_token_from_entropy(&entropy, true),
            AssetId::reissuance_token_from_entropy(&entropy, false)
        );
        assert_ne!(
            AssetId::from_entropy(&entropy),
            AssetId::reissuance_token_from_entropy(&entropy, false)
        );
    }

    #[test]
    fn test_explicit_value_is_big_endian() {
        let value = ConfidentialValue::Explicit(600000000);
        assert_eq!(value.to_hex(), "010000000023c34600");
        assert_eq!(ConfidentialValue::from_hex("010000000023c34600").unwrap(), value);
    }

    #[test]
    fn test_null_fields_encode_as_zero_byte() {
        assert_eq!(ConfidentialValue::Null.to_bytes(), vec![0]);
        assert_eq!(ConfidentialValue::Null.to_hex(), "");
        assert_eq!(ConfidentialAsset::Null.to_bytes(), vec![0]);
        assert_eq!(ConfidentialNonce::from_hex("").unwrap(), ConfidentialNonce::Null);
    }

    #[test]
    fn test_commitment_prefixes() {
        let mut raw = vec![0x09];
        raw.extend_from_slice(&[0x11; 32]);
        let value = ConfidentialValue::consensus_decode_from_slice(&raw).unwrap();
        assert!(value.is_confidential());
        assert_eq!(value.to_bytes(), raw);

        raw[0] = 0x0a;
        let asset = ConfidentialAsset::consensus_decode_from_slice(&raw).unwrap();
        assert!(asset.is_confidential());
        assert_eq!(asset.to_bytes(), raw);

        raw[0] = 0x07;
        assert!(matches!(
            ConfidentialValue::consensus_decode_from_slice(&raw).unwrap_err(),
            CtError::MalformedEncoding(_)
        ));
    }

    #[test]
    fn test_nonce_pubkey_hex() {
        let hex_nonce = "03ce4c4eac09fe317f365e45c00ffcf2e9639bc0fd792c10f72cdc173c4e5ed879";
        let nonce = ConfidentialNonce::from_hex(hex_nonce).unwrap();
        assert!(matches!(nonce, ConfidentialNonce::Confidential(_)));
        assert_eq!(nonce.to_hex(), hex_nonce);
    }

    #[test]
    fn test_blinding_factor_zero() {
        assert!(BlindingFactor::zero().is_zero());
        assert_eq!(
            BlindingFactor::zero().to_string(),
            "0000000000000000000000000000000000000000000000000000000000000000"
        );
    }
}
