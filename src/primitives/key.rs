//! Private key parsing (raw hex or WIF) and public key helpers.

use crate::error::{CtError, Result};
use base58check::{FromBase58Check, ToBase58Check};
use secp256k1::{PublicKey, Secp256k1, SecretKey};

const WIF_MAINNET_VERSION: u8 = 0x80;
const WIF_TESTNET_VERSION: u8 = 0xef;

/// A private key together with the WIF attributes it was parsed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivateKey {
    pub secret_key: SecretKey,
    pub compressed: bool,
    pub is_testnet: bool,
}

impl PrivateKey {
    pub fn new(secret_key: SecretKey) -> Self {
        PrivateKey {
            secret_key,
            compressed: true,
            is_testnet: false,
        }
    }

    /// Parse a key given either as 64 hex characters or as WIF.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes = hex::decode(s)?;
            return Ok(PrivateKey::new(SecretKey::from_slice(&bytes)?));
        }
        Self::from_wif(s)
    }

    pub fn from_wif(wif: &str) -> Result<Self> {
        let (version, payload) = wif
            .from_base58check()
            .map_err(|_| CtError::invalid_argument("Invalid WIF encoding"))?;

        let is_testnet = match version {
            WIF_MAINNET_VERSION => false,
            WIF_TESTNET_VERSION => true,
            _ => {
                return Err(CtError::invalid_argument(format!(
                    "Invalid WIF version: {:#x}",
                    version
                )))
            }
        };

        let compressed = match payload.len() {
            32 => false,
            33 if payload[32] == 0x01 => true,
            _ => return Err(CtError::invalid_argument("Invalid WIF payload length")),
        };

        Ok(PrivateKey {
            secret_key: SecretKey::from_slice(&payload[..32])?,
            compressed,
            is_testnet,
        })
    }

    pub fn to_wif(&self) -> String {
        let mut payload = self.secret_key.secret_bytes().to_vec();
        if self.compressed {
            payload.push(0x01);
        }
        let version = if self.is_testnet {
            WIF_TESTNET_VERSION
        } else {
            WIF_MAINNET_VERSION
        };
        payload.to_base58check(version)
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::signing_only();
        PublicKey::from_secret_key(&secp, &self.secret_key)
    }

    /// Serialized public key honouring the compression flag.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        if self.compressed {
            self.public_key().serialize().to_vec()
        } else {
            self.public_key().serialize_uncompressed().to_vec()
        }
    }
}

/// Parse a hex-encoded compressed or uncompressed public key.
pub fn parse_public_key(s: &str) -> Result<PublicKey> {
    let bytes = hex::decode(s)
        .map_err(|e| CtError::invalid_argument(format!("Invalid pubkey hex: {}", e)))?;
    PublicKey::from_slice(&bytes)
        .map_err(|e| CtError::invalid_argument(format!("Invalid pubkey {}: {}", s, e)))
}

/// Parse a 32-byte hex secret key.
pub fn parse_secret_key(s: &str) -> Result<SecretKey> {
    let bytes = hex::decode(s)
        .map_err(|e| CtError::invalid_argument(format!("Invalid private key hex: {}", e)))?;
    Ok(SecretKey::from_slice(&bytes)?)
}
