//! Output script descriptors, multisig scripts and address derivation.
//!
//! A descriptor such as `sh(wsh(pkh(KEY)))` resolves into one
//! [`DescriptorNode`] per nesting level, outermost first. Wrappers are
//! peeled iteratively with an explicit depth counter so that adversarial
//! nesting fails early instead of recursing.

use crate::error::{CtError, Result};
use crate::primitives::address::{Address, Payload};
use crate::primitives::bip32::{DerivationPath, ExtendedPrivateKey, ExtendedPublicKey};
use crate::primitives::hash::hash160;
use crate::primitives::script::Script;
use crate::types::{HashType, NetworkType};
use log::debug;
use std::str::FromStr;

/// Nesting levels accepted unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 8;

const CHECKSUM_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorScriptType {
    Null,
    Sh,
    Wsh,
    Pk,
    Pkh,
    Wpkh,
    Combo,
    Multi,
    SortedMulti,
    Addr,
    Raw,
}

impl DescriptorScriptType {
    pub fn as_i32(self) -> i32 {
        match self {
            DescriptorScriptType::Null => 0,
            DescriptorScriptType::Sh => 1,
            DescriptorScriptType::Wsh => 2,
            DescriptorScriptType::Pk => 3,
            DescriptorScriptType::Pkh => 4,
            DescriptorScriptType::Wpkh => 5,
            DescriptorScriptType::Combo => 6,
            DescriptorScriptType::Multi => 7,
            DescriptorScriptType::SortedMulti => 8,
            DescriptorScriptType::Addr => 9,
            DescriptorScriptType::Raw => 10,
        }
    }

    fn from_name(name: &str) -> Result<Self> {
        match name {
            "sh" => Ok(DescriptorScriptType::Sh),
            "wsh" => Ok(DescriptorScriptType::Wsh),
            "pk" => Ok(DescriptorScriptType::Pk),
            "pkh" => Ok(DescriptorScriptType::Pkh),
            "wpkh" => Ok(DescriptorScriptType::Wpkh),
            "combo" => Ok(DescriptorScriptType::Combo),
            "multi" => Ok(DescriptorScriptType::Multi),
            "sortedmulti" => Ok(DescriptorScriptType::SortedMulti),
            "addr" => Ok(DescriptorScriptType::Addr),
            "raw" => Ok(DescriptorScriptType::Raw),
            _ => Err(CtError::InvalidDescriptor(format!(
                "Unknown script type: {}",
                name
            ))),
        }
    }

    fn is_wrapper(self) -> bool {
        matches!(self, DescriptorScriptType::Sh | DescriptorScriptType::Wsh)
    }

    fn is_multisig(self) -> bool {
        matches!(
            self,
            DescriptorScriptType::Multi | DescriptorScriptType::SortedMulti
        )
    }

    /// Whether this expression may appear directly inside `parent`.
    fn allowed_inside(self, parent: Option<DescriptorScriptType>) -> bool {
        use DescriptorScriptType::*;
        match (self, parent) {
            (_, None) => true,
            (Wsh, Some(Sh)) | (Wpkh, Some(Sh)) => true,
            (Pk, Some(_)) | (Pkh, Some(_)) | (Multi, Some(_)) | (SortedMulti, Some(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKeyType {
    Null,
    Public,
    Bip32,
    Bip32Priv,
}

impl DescriptorKeyType {
    pub fn as_i32(self) -> i32 {
        match self {
            DescriptorKeyType::Null => 0,
            DescriptorKeyType::Public => 1,
            DescriptorKeyType::Bip32 => 2,
            DescriptorKeyType::Bip32Priv => 3,
        }
    }
}

/// Key material of a descriptor leaf or multisig slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorKey {
    pub key_type: DescriptorKeyType,
    /// Serialized public key as it appears in the script
    pub pubkey: Vec<u8>,
    /// Extended public key after applying the key's path
    pub ext_pubkey: Option<String>,
    /// Extended private key after applying the key's path
    pub ext_privkey: Option<String>,
}

impl DescriptorKey {
    pub fn pubkey_hex(&self) -> String {
        hex::encode(&self.pubkey)
    }

    fn is_compressed(&self) -> bool {
        self.pubkey.len() == 33
    }
}

/// One entry per key of a `multi(...)` expression, in script order.
pub type MultisigKeyEntry = DescriptorKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorNode {
    pub depth: u32,
    pub script_type: DescriptorScriptType,
    pub locking_script: Script,
    /// Empty when the locking script has no address form
    pub address: String,
    pub hash_type: Option<HashType>,
    /// Script of the child node, for `sh` and `wsh` wrappers
    pub redeem_script: Option<Script>,
    pub key: Option<DescriptorKey>,
    pub is_multisig: bool,
    /// Signature threshold when `is_multisig`
    pub required_signatures: usize,
}

impl DescriptorNode {
    pub fn key_type(&self) -> DescriptorKeyType {
        self.key
            .as_ref()
            .map(|k| k.key_type)
            .unwrap_or(DescriptorKeyType::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedDescriptor {
    pub nodes: Vec<DescriptorNode>,
    pub multisig_keys: Vec<MultisigKeyEntry>,
}

/// Result of a multisig script derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigAddress {
    pub address: Address,
    pub redeem_script: Option<Script>,
    pub witness_script: Option<Script>,
}

/// Result of a single-key or single-script address derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAddress {
    pub address: Address,
    pub locking_script: Script,
    /// Segwit program nested inside P2SH, for wrapped hash types
    pub p2sh_segwit_locking_script: Option<Script>,
}

struct Leaf {
    script_type: DescriptorScriptType,
    locking_script: Script,
    hash_type: Option<HashType>,
    key: Option<DescriptorKey>,
    multisig: Option<(usize, Vec<MultisigKeyEntry>)>,
}

fn invalid<S: Into<String>>(msg: S) -> CtError {
    CtError::InvalidDescriptor(msg.into())
}

/// Parse with the default depth limit.
pub fn parse_descriptor(
    descriptor: &str,
    network: NetworkType,
    derive_path: Option<&str>,
) -> Result<ParsedDescriptor> {
    parse_descriptor_with_depth(descriptor, network, derive_path, DEFAULT_MAX_DEPTH)
}

pub fn parse_descriptor_with_depth(
    descriptor: &str,
    network: NetworkType,
    derive_path: Option<&str>,
    max_depth: usize,
) -> Result<ParsedDescriptor> {
    let body = strip_checksum(descriptor.trim())?;
    let derive_path = match derive_path.map(str::trim) {
        Some("") | None => None,
        Some(p) => Some(
            DerivationPath::from_str(p)
                .map_err(|e| invalid(format!("Invalid derivation path {}: {}", p, e)))?,
        ),
    };

    let mut wrappers: Vec<DescriptorScriptType> = Vec::new();
    let mut current = body;
    let (leaf_type, leaf_args) = loop {
        if wrappers.len() >= max_depth {
            return Err(invalid(format!(
                "Descriptor nesting exceeds {} levels",
                max_depth
            )));
        }
        let (name, args) = split_call(current)?;
        let script_type = DescriptorScriptType::from_name(name)?;
        if !script_type.allowed_inside(wrappers.last().copied()) {
            return Err(invalid(format!(
                "{} is not allowed at depth {}",
                name,
                wrappers.len()
            )));
        }
        if script_type.is_wrapper() {
            wrappers.push(script_type);
            current = args;
        } else {
            break (script_type, args);
        }
    };

    let leaf = resolve_leaf(leaf_type, leaf_args, network, derive_path.as_ref())?;
    debug!(
        "descriptor resolved: {} wrapper(s) around {:?}",
        wrappers.len(),
        leaf.script_type
    );

    let mut nodes = Vec::with_capacity(wrappers.len() + 1);
    let mut child_type = leaf.script_type;
    let mut child_script = leaf.locking_script.clone();
    let multisig_required = leaf.multisig.as_ref().map(|(m, _)| *m).unwrap_or(0);

    // Leaf node, unless a multisig leaf is folded into its wrapper.
    let leaf_emits_node = !(leaf.script_type.is_multisig() && !wrappers.is_empty());
    if leaf_emits_node {
        nodes.push(DescriptorNode {
            depth: wrappers.len() as u32,
            script_type: leaf.script_type,
            address: address_string(&leaf.locking_script, network),
            locking_script: leaf.locking_script.clone(),
            hash_type: leaf.hash_type,
            redeem_script: None,
            key: leaf.key.clone(),
            is_multisig: leaf.multisig.is_some(),
            required_signatures: multisig_required,
        });
    }

    for (depth, wrapper) in wrappers.iter().enumerate().rev() {
        let (locking_script, hash_type) = match wrapper {
            DescriptorScriptType::Wsh => (child_script.to_p2wsh(), HashType::P2wsh),
            _ => {
                let hash_type = match child_type {
                    DescriptorScriptType::Wsh => HashType::P2shP2wsh,
                    DescriptorScriptType::Wpkh => HashType::P2shP2wpkh,
                    _ => HashType::P2sh,
                };
                (child_script.to_p2sh(), hash_type)
            }
        };
        let wraps_multisig = child_type.is_multisig();
        nodes.push(DescriptorNode {
            depth: depth as u32,
            script_type: *wrapper,
            address: address_string(&locking_script, network),
            locking_script: locking_script.clone(),
            hash_type: Some(hash_type),
            redeem_script: Some(child_script),
            key: None,
            is_multisig: wraps_multisig,
            required_signatures: if wraps_multisig { multisig_required } else { 0 },
        });
        child_type = *wrapper;
        child_script = locking_script;
    }
    nodes.reverse();

    Ok(ParsedDescriptor {
        nodes,
        multisig_keys: leaf.multisig.map(|(_, keys)| keys).unwrap_or_default(),
    })
}

fn address_string(script: &Script, network: NetworkType) -> String {
    Address::from_script(script, network)
        .map(|a| a.to_string())
        .unwrap_or_default()
}

/// Drop a trailing `#checksum`, checking only its shape.
fn strip_checksum(descriptor: &str) -> Result<&str> {
    match descriptor.rsplit_once('#') {
        None => Ok(descriptor),
        Some((body, checksum)) => {
            if checksum.len() != CHECKSUM_LENGTH
                || !checksum.chars().all(|c| CHECKSUM_CHARSET.contains(c))
            {
                return Err(invalid(format!("Malformed checksum: {}", checksum)));
            }
            Ok(body)
        }
    }
}

/// Split `name(args)` into its parts.
fn split_call(expr: &str) -> Result<(&str, &str)> {
    let open = expr
        .find('(')
        .ok_or_else(|| invalid(format!("Expected script expression: {}", expr)))?;
    if !expr.ends_with(')') {
        return Err(invalid(format!("Unbalanced parentheses: {}", expr)));
    }
    let name = &expr[..open];
    let args = &expr[open + 1..expr.len() - 1];

    let mut balance: i32 = 0;
    for c in args.chars() {
        match c {
            '(' => balance += 1,
            ')' => balance -= 1,
            _ => {}
        }
        if balance < 0 {
            return Err(invalid(format!("Unbalanced parentheses: {}", expr)));
        }
    }
    if balance != 0 {
        return Err(invalid(format!("Unbalanced parentheses: {}", expr)));
    }
    Ok((name, args))
}

fn resolve_leaf(
    script_type: DescriptorScriptType,
    args: &str,
    network: NetworkType,
    derive_path: Option<&DerivationPath>,
) -> Result<Leaf> {
    let leaf = |locking_script, hash_type, key| Leaf {
        script_type,
        locking_script,
        hash_type,
        key,
        multisig: None,
    };

    match script_type {
        DescriptorScriptType::Pk => {
            let key = parse_key(args, network, derive_path)?;
            Ok(leaf(Script::new_p2pk(&key.pubkey), None, Some(key)))
        }
        DescriptorScriptType::Pkh => {
            let key = parse_key(args, network, derive_path)?;
            let script = Script::new_p2pkh(&hash160(&key.pubkey));
            Ok(leaf(script, Some(HashType::P2pkh), Some(key)))
        }
        DescriptorScriptType::Wpkh => {
            let key = parse_key(args, network, derive_path)?;
            if !key.is_compressed() {
                return Err(invalid("wpkh requires a compressed key"));
            }
            let script = Script::new_p2wpkh(&hash160(&key.pubkey));
            Ok(leaf(script, Some(HashType::P2wpkh), Some(key)))
        }
        DescriptorScriptType::Combo => {
            // Compressed keys resolve to the P2WPKH form, others to P2PKH.
            let key = parse_key(args, network, derive_path)?;
            let hash = hash160(&key.pubkey);
            if key.is_compressed() {
                Ok(leaf(Script::new_p2wpkh(&hash), Some(HashType::P2wpkh), Some(key)))
            } else {
                Ok(leaf(Script::new_p2pkh(&hash), Some(HashType::P2pkh), Some(key)))
            }
        }
        DescriptorScriptType::Multi | DescriptorScriptType::SortedMulti => {
            let mut parts = args.split(',').map(str::trim);
            let required: usize = parts
                .next()
                .and_then(|m| m.parse().ok())
                .ok_or_else(|| invalid(format!("Invalid multisig threshold in {}", args)))?;
            let mut keys = parts
                .map(|k| parse_key(k, network, derive_path))
                .collect::<Result<Vec<_>>>()?;
            if script_type == DescriptorScriptType::SortedMulti {
                keys.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));
            }
            let pubkeys: Vec<Vec<u8>> = keys.iter().map(|k| k.pubkey.clone()).collect();
            let script = Script::new_multisig(required, &pubkeys)
                .map_err(|e| invalid(format!("Invalid multisig: {}", e)))?;
            Ok(Leaf {
                script_type,
                locking_script: script,
                hash_type: None,
                key: None,
                multisig: Some((required, keys)),
            })
        }
        DescriptorScriptType::Addr => {
            let address = Address::parse_with_network(args.trim(), network)
                .map_err(|e| invalid(format!("Invalid address: {}", e)))?;
            let hash_type = match &address.payload {
                Payload::PubkeyHash(_) => HashType::P2pkh,
                Payload::ScriptHash(_) => HashType::P2sh,
                Payload::WitnessProgram { program, .. } if program.len() == 20 => HashType::P2wpkh,
                Payload::WitnessProgram { .. } => HashType::P2wsh,
            };
            Ok(leaf(address.script_pubkey(), Some(hash_type), None))
        }
        DescriptorScriptType::Raw => {
            let script = Script::from_hex(args.trim())
                .map_err(|e| invalid(format!("Invalid raw script: {}", e)))?;
            Ok(leaf(script, None, None))
        }
        DescriptorScriptType::Null | DescriptorScriptType::Sh | DescriptorScriptType::Wsh => {
            Err(invalid(format!("{:?} is not a leaf expression", script_type)))
        }
    }
}

/// Parse `[origin]KEY[/path][/*]`, expanding wildcards with `derive_path`.
fn parse_key(
    expr: &str,
    network: NetworkType,
    derive_path: Option<&DerivationPath>,
) -> Result<DescriptorKey> {
    let expr = expr.trim();
    let expr = match expr.strip_prefix('[') {
        Some(rest) => {
            let close = rest
                .find(']')
                .ok_or_else(|| invalid(format!("Unterminated key origin: {}", expr)))?;
            &rest[close + 1..]
        }
        None => expr,
    };

    let mut components = expr.split('/');
    let key_str = components.next().unwrap_or_default();

    if key_str.len() == 66 || key_str.len() == 130 {
        if expr.contains('/') {
            return Err(invalid("A raw public key cannot carry a derivation path"));
        }
        let pubkey = hex::decode(key_str).map_err(|e| invalid(format!("Invalid key hex: {}", e)))?;
        secp256k1::PublicKey::from_slice(&pubkey)
            .map_err(|e| invalid(format!("Invalid public key {}: {}", key_str, e)))?;
        return Ok(DescriptorKey {
            key_type: DescriptorKeyType::Public,
            pubkey,
            ext_pubkey: None,
            ext_privkey: None,
        });
    }

    let mut path = Vec::new();
    for component in components {
        match component {
            "*" | "*'" | "*h" => {
                let supplied = derive_path.ok_or_else(|| {
                    invalid("Wildcard key requires a derivation path argument")
                })?;
                let hardened = component != "*";
                for &child in supplied.path() {
                    path.push(if hardened && !DerivationPath::is_hardened(child) {
                        DerivationPath::hardened(child)
                    } else {
                        child
                    });
                }
            }
            other => path.push(
                DerivationPath::parse_component(other)
                    .map_err(|e| invalid(format!("Invalid key path: {}", e)))?,
            ),
        }
    }
    let path = DerivationPath::new(path);

    let is_private = key_str.starts_with("xprv") || key_str.starts_with("tprv");
    let is_public = key_str.starts_with("xpub") || key_str.starts_with("tpub");
    if is_private {
        let xprv = ExtendedPrivateKey::from_str(key_str)
            .and_then(|k| k.derive_path(&path))
            .map_err(|e| invalid(format!("Invalid extended private key: {}", e)))?;
        let xpub = xprv.extended_public_key();
        Ok(DescriptorKey {
            key_type: DescriptorKeyType::Bip32Priv,
            pubkey: xpub.public_key.serialize().to_vec(),
            ext_pubkey: Some(xpub.to_string()),
            ext_privkey: Some(xprv.to_string()),
        })
    } else if is_public {
        let xpub = ExtendedPublicKey::from_str(key_str)
            .and_then(|k| k.derive_path(&path))
            .map_err(|e| invalid(format!("Invalid extended public key: {}", e)))?;
        Ok(DescriptorKey {
            key_type: DescriptorKeyType::Bip32,
            pubkey: xpub.public_key.serialize().to_vec(),
            ext_pubkey: Some(xpub.to_string()),
            ext_privkey: None,
        })
    } else {
        Err(invalid(format!(
            "Unrecognised key expression on {}: {}",
            network, key_str
        )))
    }
}

/// Build an M-of-N multisig in the listed key order and derive its address.
pub fn derive_multisig_address(
    network: NetworkType,
    hash_type: HashType,
    pubkeys: &[Vec<u8>],
    required: usize,
) -> Result<MultisigAddress> {
    for pubkey in pubkeys {
        secp256k1::PublicKey::from_slice(pubkey)?;
    }
    let multisig = Script::new_multisig(required, pubkeys)?;

    let result = match hash_type {
        HashType::P2sh => MultisigAddress {
            address: Address::p2sh(&multisig, network),
            redeem_script: Some(multisig),
            witness_script: None,
        },
        HashType::P2wsh => MultisigAddress {
            address: Address::p2wsh(&multisig, network),
            redeem_script: None,
            witness_script: Some(multisig),
        },
        HashType::P2shP2wsh => MultisigAddress {
            address: Address::p2shwsh(&multisig, network),
            redeem_script: Some(multisig.to_p2wsh()),
            witness_script: Some(multisig),
        },
        other => {
            return Err(CtError::invalid_argument(format!(
                "Hash type {:?} cannot carry a multisig script",
                other
            )))
        }
    };
    debug!(
        "derived {}-of-{} multisig address {}",
        required,
        pubkeys.len(),
        result.address
    );
    Ok(result)
}

/// One single-key address per pubkey of a multisig script, in script order.
pub fn extract_multisig_addresses(
    redeem_script: &Script,
    network: NetworkType,
    hash_type: HashType,
) -> Result<(Vec<Address>, Vec<Vec<u8>>)> {
    let (_, pubkeys) = redeem_script.parse_multisig()?;
    let addresses = pubkeys
        .iter()
        .map(|pubkey| match hash_type {
            HashType::P2pkh => Ok(Address::p2pkh(pubkey, network)),
            HashType::P2wpkh => Ok(Address::p2wpkh(pubkey, network)),
            HashType::P2shP2wpkh => Ok(Address::p2shwpkh(pubkey, network)),
            other => Err(CtError::invalid_argument(format!(
                "Hash type {:?} is not a single-key type",
                other
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((addresses, pubkeys))
}

fn require_pubkey(pubkey: Option<&[u8]>) -> Result<&[u8]> {
    let pubkey = pubkey
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CtError::invalid_argument("Public key is required"))?;
    secp256k1::PublicKey::from_slice(pubkey)?;
    Ok(pubkey)
}

fn require_script(script: Option<&Script>) -> Result<&Script> {
    script
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CtError::invalid_argument("Redeem script is required"))
}

/// Address for a pubkey (key-hash types) or a script (script-hash types).
pub fn create_address(
    hash_type: HashType,
    pubkey: Option<&[u8]>,
    redeem_script: Option<&Script>,
    network: NetworkType,
) -> Result<CreatedAddress> {
    let (address, p2sh_segwit_locking_script) = match hash_type {
        HashType::P2pkh => (Address::p2pkh(require_pubkey(pubkey)?, network), None),
        HashType::P2wpkh => (Address::p2wpkh(require_pubkey(pubkey)?, network), None),
        HashType::P2shP2wpkh => {
            let pubkey = require_pubkey(pubkey)?;
            (
                Address::p2shwpkh(pubkey, network),
                Some(Script::new_p2wpkh(&hash160(pubkey))),
            )
        }
        HashType::P2sh => (Address::p2sh(require_script(redeem_script)?, network), None),
        HashType::P2wsh => (Address::p2wsh(require_script(redeem_script)?, network), None),
        HashType::P2shP2wsh => {
            let script = require_script(redeem_script)?;
            (Address::p2shwsh(script, network), Some(script.to_p2wsh()))
        }
    };

    Ok(CreatedAddress {
        locking_script: address.script_pubkey(),
        address,
        p2sh_segwit_locking_script,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkh_descriptor() {
        let parsed = parse_descriptor(
            "pkh(02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5)",
            NetworkType::Liquidv1,
            None,
        )
        .unwrap();
        assert_eq!(parsed.nodes.len(), 1);
        assert!(parsed.multisig_keys.is_empty());

        let node = &parsed.nodes[0];
        assert_eq!(node.depth, 0);
        assert_eq!(node.script_type, DescriptorScriptType::Pkh);
        assert_eq!(
            node.locking_script.to_hex(),
            "76a91406afd46bcdfd22ef94ac122aa11f241244a37ecc88ac"
        );
        assert_eq!(node.address, "PwsjpD1YkjcfZ95WGVZuvGfypkKmpogoA3");
        assert_eq!(node.hash_type, Some(HashType::P2pkh));
        assert_eq!(node.key_type(), DescriptorKeyType::Public);
        assert!(!node.is_multisig);
    }

    #[test]
    fn test_nested_descriptor_depths() {
        let parsed = parse_descriptor(
            "sh(wsh(pkh(02e493dbf1c10d80f3581e4904930b1404cc6c13900ee0758474fa94abe8c4cd13)))",
            NetworkType::Liquidv1,
            None,
        )
        .unwrap();
        let depths: Vec<u32> = parsed.nodes.iter().map(|n| n.depth).collect();
        assert_eq!(depths, vec![0, 1, 2]);

        assert_eq!(parsed.nodes[0].address, "Gq1mmExLuSEwfzzk6YtUxJ769grv6T5Tak");
        assert_eq!(parsed.nodes[0].hash_type, Some(HashType::P2shP2wsh));
        assert_eq!(
            parsed.nodes[1].address,
            "ex1ql3dvcvp24wtlsg0e5c0pe3tju7tg5cp428546jap9dga7evpfqhs0htdlf"
        );
        assert_eq!(parsed.nodes[2].address, "QF9hGPQMVAPc8RxTHALgSvNPWEjGbL9bse");
    }

    #[test]
    fn test_checksum_suffix_is_ignored() {
        let plain = "wpkh(02f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9)";
        let with_checksum = format!("{}#8zl0zxma", plain);
        let a = parse_descriptor(plain, NetworkType::Mainnet, None).unwrap();
        let b = parse_descriptor(&with_checksum, NetworkType::Mainnet, None).unwrap();
        assert_eq!(a, b);
        assert!(parse_descriptor(&format!("{}#bad", plain), NetworkType::Mainnet, None).is_err());
    }

    #[test]
    fn test_depth_cap_and_placement() {
        let key = "02e493dbf1c10d80f3581e4904930b1404cc6c13900ee0758474fa94abe8c4cd13";
        let nested = format!("sh(wsh(pkh({})))", key);
        let err = parse_descriptor_with_depth(&nested, NetworkType::Liquidv1, None, 2).unwrap_err();
        assert!(matches!(err, CtError::InvalidDescriptor(_)));

        let misplaced = format!("wsh(sh(pkh({})))", key);
        assert!(matches!(
            parse_descriptor(&misplaced, NetworkType::Liquidv1, None),
            Err(CtError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_wildcard_requires_path() {
        let desc = "wpkh(xpub661MyMwAqRbcFW31YEwpkMuc5THy2PSt5bDMsktWQcFF8syAmRUapSCGu8ED9W6oDMSgv6Zz8idoc4a6mr8BDzTJY47LJhkJ8UB7WEGuduB/1/0/*)";
        assert!(matches!(
            parse_descriptor(desc, NetworkType::Mainnet, None),
            Err(CtError::InvalidDescriptor(_))
        ));
        assert!(parse_descriptor(desc, NetworkType::Mainnet, Some("0")).is_ok());
    }

    #[test]
    fn test_multisig_p2sh_p2wsh() {
        let pubkeys = vec![
            hex::decode("0205ffcdde75f262d66ada3dd877c7471f8f8ee9ee24d917c3e18d01cee458bafe").unwrap(),
            hex::decode("02be61f4350b4ae7544f99649a917f48ba16cf48c983ac1599774958d88ad17ec5").unwrap(),
        ];
        let result =
            derive_multisig_address(NetworkType::Liquidv1, HashType::P2shP2wsh, &pubkeys, 2).unwrap();
        assert_eq!(result.address.to_string(), "H4PB6YPgiTmQLiMU7b772LMFY9vA4gSUC1");
        assert_eq!(
            result.redeem_script.unwrap().to_hex(),
            "0020f39f6272ba6b57918eb047c5dc44fb475356b0f24c12fca39b19284e80008a42"
        );

        assert!(derive_multisig_address(NetworkType::Liquidv1, HashType::P2sh, &pubkeys, 3).is_err());
        assert!(derive_multisig_address(NetworkType::Liquidv1, HashType::P2pkh, &pubkeys, 1).is_err());
    }

    #[test]
    fn test_create_address_requires_inputs() {
        assert!(create_address(HashType::P2pkh, None, None, NetworkType::Liquidv1).is_err());
        assert!(create_address(HashType::P2sh, None, None, NetworkType::Liquidv1).is_err());
    }
}
