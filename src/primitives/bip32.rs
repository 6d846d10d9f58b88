//! BIP32 Hierarchical Deterministic Keys.

use super::hash::hash160;
use crate::error::{CtError, Result};
use base58check::{FromBase58Check, ToBase58Check};
use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
const BIP32_MASTER_KEY: &[u8] = b"Bitcoin seed";
const BIP32_HARDENED_KEY_LIMIT: u32 = 0x80000000;

// Version bytes for extended keys
const MAINNET_PRIVATE_VERSION: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4]; // xprv
const MAINNET_PUBLIC_VERSION: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E]; // xpub
const TESTNET_PRIVATE_VERSION: [u8; 4] = [0x04, 0x35, 0x83, 0x94]; // tprv
const TESTNET_PUBLIC_VERSION: [u8; 4] = [0x04, 0x35, 0x87, 0xCF]; // tpub

/// Which version bytes an extended key carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Bitcoin,
    Testnet,
}

impl Network {
    pub fn private_version_bytes(&self) -> [u8; 4] {
        match self {
            Network::Bitcoin => MAINNET_PRIVATE_VERSION,
            Network::Testnet => TESTNET_PRIVATE_VERSION,
        }
    }

    pub fn public_version_bytes(&self) -> [u8; 4] {
        match self {
            Network::Bitcoin => MAINNET_PUBLIC_VERSION,
            Network::Testnet => TESTNET_PUBLIC_VERSION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainCode(pub [u8; 32]);

/// Key fingerprint (first 4 bytes of HASH160 of public key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 4]);

impl Fingerprint {
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let hash = hash160(&public_key.serialize());
        let mut fingerprint = [0u8; 4];
        fingerprint.copy_from_slice(&hash[0..4]);
        Fingerprint(fingerprint)
    }
}

/// Derivation path for BIP32 key derivation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DerivationPath {
    path: Vec<u32>,
}

impl DerivationPath {
    pub fn new(path: Vec<u32>) -> Self {
        DerivationPath { path }
    }

    pub fn master() -> Self {
        DerivationPath { path: Vec::new() }
    }

    pub fn path(&self) -> &[u32] {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_hardened(child_number: u32) -> bool {
        child_number >= BIP32_HARDENED_KEY_LIMIT
    }

    pub fn hardened(index: u32) -> u32 {
        index + BIP32_HARDENED_KEY_LIMIT
    }

    pub fn has_hardened_step(&self) -> bool {
        self.path.iter().any(|c| Self::is_hardened(*c))
    }

    /// Append the components of `other`
    pub fn extend(&self, other: &DerivationPath) -> DerivationPath {
        let mut path = self.path.clone();
        path.extend_from_slice(&other.path);
        DerivationPath::new(path)
    }

    /// Parse a single component such as `44`, `44'` or `44h`.
    pub fn parse_component(component: &str) -> Result<u32> {
        if component.is_empty() {
            return Err(CtError::invalid_argument("Empty path component"));
        }

        let (index_str, is_hardened) =
            match component.strip_suffix('\'').or_else(|| component.strip_suffix('h')) {
                Some(stripped) => (stripped, true),
                None => (component, false),
            };

        let index: u32 = index_str.parse().map_err(|_| {
            CtError::invalid_argument(format!("Invalid path component: {}", component))
        })?;

        if index >= BIP32_HARDENED_KEY_LIMIT {
            return Err(CtError::invalid_argument(format!(
                "Path component index too large: {}",
                index
            )));
        }

        Ok(if is_hardened {
            DerivationPath::hardened(index)
        } else {
            index
        })
    }
}

impl FromStr for DerivationPath {
    type Err = CtError;

    /// Accepts absolute (`m/0/1`) and relative (`0/1`, `/0/1`) forms.
    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('m')
            .or_else(|| s.strip_prefix('M'))
            .unwrap_or(s);
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(DerivationPath::master());
        }

        let path = rest
            .split('/')
            .map(DerivationPath::parse_component)
            .collect::<Result<Vec<u32>>>()?;
        Ok(DerivationPath::new(path))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for &child_number in &self.path {
            if DerivationPath::is_hardened(child_number) {
                write!(f, "/{}'", child_number - BIP32_HARDENED_KEY_LIMIT)?;
            } else {
                write!(f, "/{}", child_number)?;
            }
        }
        Ok(())
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<([u8; 32], [u8; 32])> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key)
        .map_err(|_| CtError::invalid_argument("Invalid HMAC key"))?;
    for part in parts {
        mac.update(part);
    }
    let result = mac.finalize().into_bytes();
    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&result[..32]);
    right.copy_from_slice(&result[32..]);
    Ok((left, right))
}

fn encode_extended(data: &[u8]) -> String {
    data[1..].to_base58check(data[0])
}

fn decode_extended(s: &str, kind: &str) -> Result<[u8; 78]> {
    let (version, payload) = s
        .from_base58check()
        .map_err(|_| CtError::invalid_argument(format!("Invalid base58 in extended {} key", kind)))?;
    if payload.len() != 77 {
        return Err(CtError::invalid_argument(format!(
            "Invalid extended {} key length: {} expected 78",
            kind,
            payload.len() + 1
        )));
    }
    let mut data = [0u8; 78];
    data[0] = version;
    data[1..].copy_from_slice(&payload);
    Ok(data)
}

/// Extended private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedPrivateKey {
    pub network: Network,
    pub depth: u8,
    pub parent_fingerprint: Fingerprint,
    pub child_number: u32,
    pub private_key: SecretKey,
    pub chain_code: ChainCode,
}

impl ExtendedPrivateKey {
    #[cfg(test)]
    pub fn new_master_from_seed(seed: &[u8], network: Network) -> Result<Self> {
        let (key_bytes, chain_code) = hmac_sha512(BIP32_MASTER_KEY, &[seed])?;
        let private_key = SecretKey::from_slice(&key_bytes)?;

        Ok(ExtendedPrivateKey {
            network,
            depth: 0,
            parent_fingerprint: Fingerprint([0; 4]),
            child_number: 0,
            private_key,
            chain_code: ChainCode(chain_code),
        })
    }

    pub fn derive_child(&self, child_number: u32) -> Result<ExtendedPrivateKey> {
        let secp = Secp256k1::new();
        let public_key = self.private_key.public_key(&secp);

        let (key_bytes, chain_code) = if DerivationPath::is_hardened(child_number) {
            hmac_sha512(
                &self.chain_code.0,
                &[&[0u8][..], &self.private_key.secret_bytes()[..], &child_number.to_be_bytes()[..]],
            )?
        } else {
            hmac_sha512(
                &self.chain_code.0,
                &[&public_key.serialize()[..], &child_number.to_be_bytes()[..]],
            )?
        };

        let tweak = Scalar::from_be_bytes(key_bytes)
            .map_err(|_| CtError::invalid_argument("Derived tweak out of range"))?;
        let private_key = self.private_key.add_tweak(&tweak)?;

        Ok(ExtendedPrivateKey {
            network: self.network,
            depth: self.depth.saturating_add(1),
            parent_fingerprint: Fingerprint::from_public_key(&public_key),
            child_number,
            private_key,
            chain_code: ChainCode(chain_code),
        })
    }

    pub fn derive_path(&self, path: &DerivationPath) -> Result<ExtendedPrivateKey> {
        let mut current_key = self.clone();
        for &child_number in path.path() {
            current_key = current_key.derive_child(child_number)?;
        }
        Ok(current_key)
    }

    pub fn extended_public_key(&self) -> ExtendedPublicKey {
        let secp = Secp256k1::new();
        ExtendedPublicKey {
            network: self.network,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            public_key: self.private_key.public_key(&secp),
            chain_code: self.chain_code,
        }
    }

    #[cfg(test)]
    pub fn fingerprint(&self) -> Fingerprint {
        self.extended_public_key().fingerprint()
    }

    fn serialize(&self) -> [u8; 78] {
        let mut data = [0u8; 78];
        data[0..4].copy_from_slice(&self.network.private_version_bytes());
        data[4] = self.depth;
        data[5..9].copy_from_slice(&self.parent_fingerprint.0);
        data[9..13].copy_from_slice(&self.child_number.to_be_bytes());
        data[13..45].copy_from_slice(&self.chain_code.0);
        // data[45] stays 0x00 ahead of the 32-byte key
        data[46..78].copy_from_slice(&self.private_key.secret_bytes());
        data
    }
}

impl FromStr for ExtendedPrivateKey {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self> {
        let data = decode_extended(s, "private")?;

        let network = match [data[0], data[1], data[2], data[3]] {
            MAINNET_PRIVATE_VERSION => Network::Bitcoin,
            TESTNET_PRIVATE_VERSION => Network::Testnet,
            _ => return Err(CtError::invalid_argument("Invalid version bytes")),
        };

        if data[45] != 0x00 {
            return Err(CtError::invalid_argument("Invalid private key prefix"));
        }

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        Ok(ExtendedPrivateKey {
            network,
            depth: data[4],
            parent_fingerprint: Fingerprint([data[5], data[6], data[7], data[8]]),
            child_number: u32::from_be_bytes([data[9], data[10], data[11], data[12]]),
            private_key: SecretKey::from_slice(&data[46..78])?,
            chain_code: ChainCode(chain_code),
        })
    }
}

impl fmt::Display for ExtendedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_extended(&self.serialize()))
    }
}

/// Extended public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedPublicKey {
    pub network: Network,
    pub depth: u8,
    pub parent_fingerprint: Fingerprint,
    pub child_number: u32,
    pub public_key: PublicKey,
    pub chain_code: ChainCode,
}

impl ExtendedPublicKey {
    /// Derive a child public key (non-hardened only)
    pub fn derive_child(&self, child_number: u32) -> Result<ExtendedPublicKey> {
        if DerivationPath::is_hardened(child_number) {
            return Err(CtError::invalid_argument(
                "Cannot derive hardened child from public key",
            ));
        }

        let secp = Secp256k1::new();
        let (key_bytes, chain_code) = hmac_sha512(
            &self.chain_code.0,
            &[&self.public_key.serialize()[..], &child_number.to_be_bytes()[..]],
        )?;

        let derived_secret = SecretKey::from_slice(&key_bytes)?;
        let derived_public = derived_secret.public_key(&secp);
        let public_key = self.public_key.combine(&derived_public)?;

        Ok(ExtendedPublicKey {
            network: self.network,
            depth: self.depth.saturating_add(1),
            parent_fingerprint: Fingerprint::from_public_key(&self.public_key),
            child_number,
            public_key,
            chain_code: ChainCode(chain_code),
        })
    }

    pub fn derive_path(&self, path: &DerivationPath) -> Result<ExtendedPublicKey> {
        let mut current_key = self.clone();
        for &child_number in path.path() {
            current_key = current_key.derive_child(child_number)?;
        }
        Ok(current_key)
    }

    #[cfg(test)]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_public_key(&self.public_key)
    }

    fn serialize(&self) -> [u8; 78] {
        let mut data = [0u8; 78];
        data[0..4].copy_from_slice(&self.network.public_version_bytes());
        data[4] = self.depth;
        data[5..9].copy_from_slice(&self.parent_fingerprint.0);
        data[9..13].copy_from_slice(&self.child_number.to_be_bytes());
        data[13..45].copy_from_slice(&self.chain_code.0);
        data[45..78].copy_from_slice(&self.public_key.serialize());
        data
    }
}

impl FromStr for ExtendedPublicKey {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self> {
        let data = decode_extended(s, "public")?;

        let network = match [data[0], data[1], data[2], data[3]] {
            MAINNET_PUBLIC_VERSION => Network::Bitcoin,
            TESTNET_PUBLIC_VERSION => Network::Testnet,
            _ => return Err(CtError::invalid_argument("Invalid version bytes")),
        };

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        Ok(ExtendedPublicKey {
            network,
            depth: data[4],
            parent_fingerprint: Fingerprint([data[5], data[6], data[7], data[8]]),
            child_number: u32::from_be_bytes([data[9], data[10], data[11], data[12]]),
            public_key: PublicKey::from_slice(&data[45..78])?,
            chain_code: ChainCode(chain_code),
        })
    }
}

impl fmt::Display for ExtendedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_extended(&self.serialize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn test_bip32_master_from_seed() {
        let seed = hex::decode(SEED).unwrap();
        let xprv = ExtendedPrivateKey::new_master_from_seed(&seed, Network::Bitcoin).unwrap();

        assert_eq!(
            hex::encode(xprv.private_key.secret_bytes()),
            "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
        );
        assert_eq!(
            hex::encode(xprv.chain_code.0),
            "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508"
        );
        assert_eq!(xprv.depth, 0);
    }

    #[test]
    fn test_bip32_test_vectors() {
        let seed = hex::decode(SEED).unwrap();
        let master = ExtendedPrivateKey::new_master_from_seed(&seed, Network::Bitcoin).unwrap();

        assert_eq!(
            master.to_string(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            master.extended_public_key().to_string(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );

        let child = master.derive_path(&"m/0'".parse().unwrap()).unwrap();
        assert_eq!(
            child.extended_public_key().to_string(),
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw"
        );
    }

    #[test]
    fn test_derivation_path_parsing() {
        let path = DerivationPath::from_str("m").unwrap();
        assert!(path.is_empty());
        assert_eq!(path.to_string(), "m");

        let path = DerivationPath::from_str("m/44h/0'/0'/0/5").unwrap();
        assert_eq!(
            path.path(),
            &[
                DerivationPath::hardened(44),
                DerivationPath::hardened(0),
                DerivationPath::hardened(0),
                0,
                5
            ]
        );
        assert_eq!(path.to_string(), "m/44'/0'/0'/0/5");
        assert!(path.has_hardened_step());
    }

    #[test]
    fn test_relative_paths() {
        assert_eq!(DerivationPath::from_str("0/1").unwrap().path(), &[0, 1]);
        assert_eq!(DerivationPath::from_str("/7").unwrap().path(), &[7]);
        let joined = DerivationPath::from_str("1/0")
            .unwrap()
            .extend(&DerivationPath::from_str("3").unwrap());
        assert_eq!(joined.to_string(), "m/1/0/3");
    }

    #[test]
    fn test_derivation_path_errors() {
        assert!(DerivationPath::from_str("m//0").is_err());
        assert!(DerivationPath::from_str("m/abc").is_err());
        assert!(DerivationPath::from_str(&format!("m/{}", BIP32_HARDENED_KEY_LIMIT)).is_err());
    }

    #[test]
    fn test_public_derivation_matches_private() {
        let seed = hex::decode(SEED).unwrap();
        let master_priv = ExtendedPrivateKey::new_master_from_seed(&seed, Network::Bitcoin).unwrap();
        let master_pub = master_priv.extended_public_key();

        let path = DerivationPath::from_str("0/1/2").unwrap();
        let from_priv = master_priv.derive_path(&path).unwrap().extended_public_key();
        let from_pub = master_pub.derive_path(&path).unwrap();
        assert_eq!(from_priv, from_pub);

        assert!(master_pub.derive_child(DerivationPath::hardened(0)).is_err());
        assert_eq!(
            master_priv.derive_child(0).unwrap().parent_fingerprint,
            master_priv.fingerprint()
        );
    }

    #[test]
    fn test_extended_key_string_roundtrip() {
        let seed = hex::decode(SEED).unwrap();
        let master = ExtendedPrivateKey::new_master_from_seed(&seed, Network::Testnet).unwrap();

        let serialized = master.to_string();
        assert!(serialized.starts_with("tprv"));
        assert_eq!(ExtendedPrivateKey::from_str(&serialized).unwrap(), master);

        let xpub = master.extended_public_key();
        let pub_serialized = xpub.to_string();
        assert!(pub_serialized.starts_with("tpub"));
        assert_eq!(ExtendedPublicKey::from_str(&pub_serialized).unwrap(), xpub);
    }

    #[test]
    fn test_invalid_extended_key_deserialization() {
        assert!(ExtendedPrivateKey::from_str("invalid").is_err());
        let key = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
        assert!(ExtendedPrivateKey::from_str(&key[..key.len() - 10]).is_err());
        assert!(ExtendedPublicKey::from_str(key).is_err());
    }
}
