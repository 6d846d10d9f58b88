//! Bitcoin and Elements addresses.
//!
//! Plain addresses are base58check (P2PKH, P2SH) or bech32 (segwit).
//! Elements chains additionally have confidential addresses carrying a
//! blinding pubkey: base58check with a confidential prefix, or blech32.

use crate::error::{CtError, Result};
use crate::primitives::blech32;
use crate::primitives::hash::{hash160, Hash160};
use crate::primitives::script::Script;
use crate::types::NetworkType;
use base58check::{FromBase58Check, ToBase58Check};
use bech32::{u5, FromBase32, ToBase32, Variant};
use secp256k1::PublicKey;
use std::fmt;
use std::str::FromStr;

/// Prefixes and human readable parts of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressParams {
    pub network: NetworkType,
    pub p2pkh_prefix: u8,
    pub p2sh_prefix: u8,
    pub bech_hrp: &'static str,
    pub confidential_prefix: Option<u8>,
    pub blech_hrp: Option<&'static str>,
}

impl AddressParams {
    pub const MAINNET: AddressParams = AddressParams {
        network: NetworkType::Mainnet,
        p2pkh_prefix: 0x00,
        p2sh_prefix: 0x05,
        bech_hrp: "bc",
        confidential_prefix: None,
        blech_hrp: None,
    };

    pub const TESTNET: AddressParams = AddressParams {
        network: NetworkType::Testnet,
        p2pkh_prefix: 0x6f,
        p2sh_prefix: 0xc4,
        bech_hrp: "tb",
        confidential_prefix: None,
        blech_hrp: None,
    };

    pub const REGTEST: AddressParams = AddressParams {
        network: NetworkType::Regtest,
        p2pkh_prefix: 0x6f,
        p2sh_prefix: 0xc4,
        bech_hrp: "bcrt",
        confidential_prefix: None,
        blech_hrp: None,
    };

    pub const LIQUIDV1: AddressParams = AddressParams {
        network: NetworkType::Liquidv1,
        p2pkh_prefix: 57,
        p2sh_prefix: 39,
        bech_hrp: "ex",
        confidential_prefix: Some(12),
        blech_hrp: Some("lq"),
    };

    pub const ELEMENTS_REGTEST: AddressParams = AddressParams {
        network: NetworkType::ElementsRegtest,
        p2pkh_prefix: 235,
        p2sh_prefix: 75,
        bech_hrp: "ert",
        confidential_prefix: Some(4),
        blech_hrp: Some("el"),
    };

    /// Lookup order used when parsing without a network hint.
    pub const ALL: [AddressParams; 5] = [
        AddressParams::LIQUIDV1,
        AddressParams::ELEMENTS_REGTEST,
        AddressParams::MAINNET,
        AddressParams::TESTNET,
        AddressParams::REGTEST,
    ];

    pub fn for_network(network: NetworkType) -> &'static AddressParams {
        match network {
            NetworkType::Mainnet => &AddressParams::MAINNET,
            NetworkType::Testnet => &AddressParams::TESTNET,
            NetworkType::Regtest => &AddressParams::REGTEST,
            NetworkType::Liquidv1 => &AddressParams::LIQUIDV1,
            NetworkType::ElementsRegtest => &AddressParams::ELEMENTS_REGTEST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Pay-to-Pubkey-Hash
    PubkeyHash(Hash160),
    /// Pay-to-Script-Hash
    ScriptHash(Hash160),
    /// Segwit program of any version
    WitnessProgram { version: u8, program: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub network: NetworkType,
    pub payload: Payload,
    pub blinding_pubkey: Option<PublicKey>,
}

impl Address {
    fn new(network: NetworkType, payload: Payload) -> Self {
        Address {
            network,
            payload,
            blinding_pubkey: None,
        }
    }

    pub fn p2pkh(pubkey: &[u8], network: NetworkType) -> Self {
        Address::new(network, Payload::PubkeyHash(hash160(pubkey)))
    }

    /// P2SH address of `script`.
    pub fn p2sh(script: &Script, network: NetworkType) -> Self {
        Address::new(network, Payload::ScriptHash(hash160(script.as_bytes())))
    }

    pub fn p2wpkh(pubkey: &[u8], network: NetworkType) -> Self {
        Address::new(
            network,
            Payload::WitnessProgram {
                version: 0,
                program: hash160(pubkey).to_vec(),
            },
        )
    }

    /// P2WSH address of the witness script.
    pub fn p2wsh(script: &Script, network: NetworkType) -> Self {
        Address::new(
            network,
            Payload::WitnessProgram {
                version: 0,
                program: crate::primitives::hash::sha256(script.as_bytes()).to_vec(),
            },
        )
    }

    /// P2SH address wrapping a P2WPKH program.
    pub fn p2shwpkh(pubkey: &[u8], network: NetworkType) -> Self {
        let program = Script::new_p2wpkh(&hash160(pubkey));
        Address::p2sh(&program, network)
    }

    /// P2SH address wrapping a P2WSH program.
    pub fn p2shwsh(script: &Script, network: NetworkType) -> Self {
        Address::p2sh(&script.to_p2wsh(), network)
    }

    /// Recognise a standard locking script.
    pub fn from_script(script: &Script, network: NetworkType) -> Result<Self> {
        let bytes = script.as_bytes();
        let payload = if script.is_p2pkh() {
            Payload::PubkeyHash(extract_hash(&bytes[3..23]))
        } else if script.is_p2sh() {
            Payload::ScriptHash(extract_hash(&bytes[2..22]))
        } else if let Some((version, program)) = witness_program(bytes) {
            Payload::WitnessProgram {
                version,
                program: program.to_vec(),
            }
        } else {
            return Err(CtError::InvalidScript(format!(
                "No address form for script {}",
                script.to_hex()
            )));
        };
        Ok(Address::new(network, payload))
    }

    pub fn script_pubkey(&self) -> Script {
        match &self.payload {
            Payload::PubkeyHash(hash) => Script::new_p2pkh(hash),
            Payload::ScriptHash(hash) => Script::new_p2sh(hash),
            Payload::WitnessProgram { version, program } => {
                let version_op = if *version == 0 { 0x00 } else { 0x50 + version };
                let mut bytes = Vec::with_capacity(program.len() + 2);
                bytes.push(version_op);
                bytes.push(program.len() as u8);
                bytes.extend_from_slice(program);
                Script::from_bytes(bytes)
            }
        }
    }

    pub fn params(&self) -> &'static AddressParams {
        AddressParams::for_network(self.network)
    }

    pub fn is_confidential(&self) -> bool {
        self.blinding_pubkey.is_some()
    }

    /// Attach a blinding pubkey. Only Elements chains have confidential addresses.
    pub fn to_confidential(&self, blinding_pubkey: PublicKey) -> Result<Self> {
        if !self.network.is_elements() {
            return Err(CtError::invalid_argument(format!(
                "Network {} has no confidential addresses",
                self.network
            )));
        }
        Ok(Address {
            blinding_pubkey: Some(blinding_pubkey),
            ..self.clone()
        })
    }

    pub fn to_unconfidential(&self) -> Self {
        Address {
            blinding_pubkey: None,
            ..self.clone()
        }
    }

    /// Parse an address, only accepting the prefixes of `network`.
    pub fn parse_with_network(s: &str, network: NetworkType) -> Result<Self> {
        parse_with_params(s, AddressParams::for_network(network))
            .ok_or_else(|| CtError::invalid_argument(format!("Invalid {} address: {}", network, s)))?
    }
}

fn extract_hash(bytes: &[u8]) -> Hash160 {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(bytes);
    hash
}

fn witness_program(bytes: &[u8]) -> Option<(u8, &[u8])> {
    if bytes.len() < 4 || bytes.len() > 42 {
        return None;
    }
    let version = match bytes[0] {
        0x00 => 0,
        op @ 0x51..=0x60 => op - 0x50,
        _ => return None,
    };
    if bytes[1] as usize + 2 != bytes.len() {
        return None;
    }
    Some((version, &bytes[2..]))
}

fn bech_variant(version: u8) -> Variant {
    if version == 0 {
        Variant::Bech32
    } else {
        Variant::Bech32m
    }
}

fn blech_variant(version: u8) -> blech32::Variant {
    if version == 0 {
        blech32::Variant::Blech32
    } else {
        blech32::Variant::Blech32m
    }
}

/// Returns None when the string is not shaped for `params` at all, and
/// Some(Err) when it is but fails validation.
fn parse_with_params(s: &str, params: &AddressParams) -> Option<Result<Address>> {
    let lower = s.to_lowercase();
    if let Some(hrp) = params.blech_hrp {
        if lower.starts_with(&format!("{}1", hrp)) {
            return Some(parse_blech32(s, params));
        }
    }
    if lower.starts_with(&format!("{}1", params.bech_hrp)) {
        return Some(parse_bech32(s, params));
    }

    let (version, payload) = s.from_base58check().ok()?;
    if Some(version) == params.confidential_prefix && payload.len() == 54 {
        let payload_type = payload[0];
        let blinding_pubkey = match PublicKey::from_slice(&payload[1..34]) {
            Ok(pk) => pk,
            Err(e) => {
                return Some(Err(CtError::invalid_argument(format!(
                    "Invalid blinding pubkey in address: {}",
                    e
                ))))
            }
        };
        let hash = extract_hash(&payload[34..]);
        let payload = if payload_type == params.p2pkh_prefix {
            Payload::PubkeyHash(hash)
        } else if payload_type == params.p2sh_prefix {
            Payload::ScriptHash(hash)
        } else {
            return None;
        };
        return Some(Ok(Address {
            network: params.network,
            payload,
            blinding_pubkey: Some(blinding_pubkey),
        }));
    }

    if payload.len() != 20 {
        return None;
    }
    let hash = extract_hash(&payload);
    let payload = if version == params.p2pkh_prefix {
        Payload::PubkeyHash(hash)
    } else if version == params.p2sh_prefix {
        Payload::ScriptHash(hash)
    } else {
        return None;
    };
    Some(Ok(Address::new(params.network, payload)))
}

fn parse_bech32(s: &str, params: &AddressParams) -> Result<Address> {
    let (_hrp, data, variant) = bech32::decode(s)
        .map_err(|e| CtError::invalid_argument(format!("Invalid bech32 address {}: {}", s, e)))?;
    let (version, program) = data
        .split_first()
        .ok_or_else(|| CtError::invalid_argument("Empty bech32 payload"))?;
    let version = version.to_u8();
    if variant != bech_variant(version) {
        return Err(CtError::invalid_argument("Bech32 checksum variant mismatch"));
    }
    let program = Vec::<u8>::from_base32(program)
        .map_err(|e| CtError::invalid_argument(format!("Invalid bech32 program: {}", e)))?;
    validate_program(version, &program)?;

    Ok(Address::new(
        params.network,
        Payload::WitnessProgram { version, program },
    ))
}

fn parse_blech32(s: &str, params: &AddressParams) -> Result<Address> {
    let (_hrp, data, variant) = blech32::decode(s)?;
    let (version, rest) = data
        .split_first()
        .ok_or_else(|| CtError::invalid_argument("Empty blech32 payload"))?;
    if variant != blech_variant(*version) {
        return Err(CtError::invalid_argument("Blech32 checksum variant mismatch"));
    }
    let bytes = blech32::convert_bits(rest, 5, 8, false)?;
    if bytes.len() < 33 {
        return Err(CtError::invalid_argument("Blech32 payload too short"));
    }
    let blinding_pubkey = PublicKey::from_slice(&bytes[..33])?;
    let program = bytes[33..].to_vec();
    validate_program(*version, &program)?;

    Ok(Address {
        network: params.network,
        payload: Payload::WitnessProgram {
            version: *version,
            program,
        },
        blinding_pubkey: Some(blinding_pubkey),
    })
}

fn validate_program(version: u8, program: &[u8]) -> Result<()> {
    if version > 16 || program.len() < 2 || program.len() > 40 {
        return Err(CtError::invalid_argument("Invalid witness program"));
    }
    if version == 0 && program.len() != 20 && program.len() != 32 {
        return Err(CtError::invalid_argument(
            "Invalid witness v0 program length",
        ));
    }
    Ok(())
}

impl FromStr for Address {
    type Err = CtError;

    /// Parse against every known chain, Elements first.
    fn from_str(s: &str) -> Result<Self> {
        for params in AddressParams::ALL.iter() {
            if let Some(result) = parse_with_params(s, params) {
                return result;
            }
        }
        Err(CtError::invalid_argument(format!("Unrecognised address: {}", s)))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let params = self.params();
        match (&self.payload, self.blinding_pubkey) {
            (Payload::PubkeyHash(hash), None) => {
                write!(f, "{}", hash.to_base58check(params.p2pkh_prefix))
            }
            (Payload::ScriptHash(hash), None) => {
                write!(f, "{}", hash.to_base58check(params.p2sh_prefix))
            }
            (Payload::PubkeyHash(hash), Some(blinder))
            | (Payload::ScriptHash(hash), Some(blinder)) => {
                let prefix = match self.payload {
                    Payload::PubkeyHash(_) => params.p2pkh_prefix,
                    _ => params.p2sh_prefix,
                };
                let confidential = params.confidential_prefix.ok_or(fmt::Error)?;
                let mut payload = Vec::with_capacity(54);
                payload.push(prefix);
                payload.extend_from_slice(&blinder.serialize());
                payload.extend_from_slice(hash);
                write!(f, "{}", payload.to_base58check(confidential))
            }
            (Payload::WitnessProgram { version, program }, None) => {
                let mut data = vec![u5::try_from_u8(*version).map_err(|_| fmt::Error)?];
                data.extend(program.to_base32());
                let encoded = bech32::encode(params.bech_hrp, data, bech_variant(*version))
                    .map_err(|_| fmt::Error)?;
                f.write_str(&encoded)
            }
            (Payload::WitnessProgram { version, program }, Some(blinder)) => {
                let hrp = params.blech_hrp.ok_or(fmt::Error)?;
                let mut bytes = blinder.serialize().to_vec();
                bytes.extend_from_slice(program);
                let mut data = vec![*version];
                data.extend(blech32::convert_bits(&bytes, 8, 5, true).map_err(|_| fmt::Error)?);
                let encoded =
                    blech32::encode(hrp, &data, blech_variant(*version)).map_err(|_| fmt::Error)?;
                f.write_str(&encoded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pubkey_bytes(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn test_p2pkh_liquid() {
        let pk = pubkey_bytes("0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798");
        let address = Address::p2pkh(&pk, NetworkType::Liquidv1);
        assert_eq!(address.to_string(), "Q7wegLt2qMGhm28vch6VTzvpzs8KXvs4X7");
        assert_eq!(
            address.script_pubkey().to_hex(),
            "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac"
        );
    }

    #[test]
    fn test_p2sh_and_wrapped_segwit() {
        let redeem =
            Script::from_hex("210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798ac")
                .unwrap();
        let address = Address::p2sh(&redeem, NetworkType::Liquidv1);
        assert_eq!(address.to_string(), "GkSEheszYzEBMgX9G9ueaAyLVg8gfZwiDY");
        assert_eq!(
            address.script_pubkey().to_hex(),
            "a91423b0ad3477f2178bc0b3eed26e4e6316f4e83aa187"
        );

        let pk = pubkey_bytes("0205ffcdde75f262d66ada3dd877c7471f8f8ee9ee24d917c3e18d01cee458bafe");
        let wrapped = Address::p2shwpkh(&pk, NetworkType::Liquidv1);
        assert_eq!(wrapped.to_string(), "GsaK3GXnFAjdfZDBPPo9PD6UNyAJ53nS9Z");
    }

    #[test]
    fn test_p2wpkh_elements_regtest() {
        let pk = pubkey_bytes("02bedf98a38247c1718fdff7e07561b4dc15f10323ebb0accab581778e72c2e995");
        let address = Address::p2wpkh(&pk, NetworkType::ElementsRegtest);
        assert_eq!(address.to_string(), "ert1qs58jzsgjsteydejyhy32p2v2vm8llh9uns6d93");
        assert_eq!(
            address.script_pubkey().to_hex(),
            "0014850f21411282f246e644b922a0a98a66cfffdcbc"
        );

        let parsed: Address = "ert1qs58jzsgjsteydejyhy32p2v2vm8llh9uns6d93".parse().unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_confidential_base58_roundtrip() {
        let s = "CTEw7oSCUWDfmfhCEdsB3gsG7D9b4xLCZEq71H8JxRFeBu7yQN3CbSF6qT6J4F7qji4bq1jVSdVcqvRJ";
        let address: Address = s.parse().unwrap();
        assert_eq!(address.network, NetworkType::ElementsRegtest);
        assert!(address.is_confidential());
        assert_eq!(address.to_string(), s);
        assert_eq!(
            address.script_pubkey().to_hex(),
            "76a914d08f5ba8874d36cf97d19379b370f1f23ba36d5888ac"
        );
        assert!(!address.to_unconfidential().is_confidential());
    }

    #[test]
    fn test_blech32_roundtrip() {
        let pk = pubkey_bytes("02bedf98a38247c1718fdff7e07561b4dc15f10323ebb0accab581778e72c2e995");
        let blinder = PublicKey::from_slice(&pubkey_bytes(
            "02200d8510dfcf8e2330c0795c771d1e6064daab2f274ac32a6e2708df9bfa893d",
        ))
        .unwrap();
        let address = Address::p2wpkh(&pk, NetworkType::ElementsRegtest)
            .to_confidential(blinder)
            .unwrap();
        let encoded = address.to_string();
        assert!(encoded.starts_with("el1q"));

        let parsed = Address::parse_with_network(&encoded, NetworkType::ElementsRegtest).unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_bitcoin_has_no_confidential_form() {
        let pk = pubkey_bytes("02bedf98a38247c1718fdff7e07561b4dc15f10323ebb0accab581778e72c2e995");
        let blinder = PublicKey::from_slice(&pk).unwrap();
        assert!(Address::p2pkh(&pk, NetworkType::Mainnet)
            .to_confidential(blinder)
            .is_err());
    }

    #[test]
    fn test_from_script_rejects_nonstandard() {
        let script = Script::from_hex("6a0401020304").unwrap();
        assert!(Address::from_script(&script, NetworkType::Liquidv1).is_err());
        assert!("not an address".parse::<Address>().is_err());
    }
}
