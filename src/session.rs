//! Sessions.
//!
//! A [`Session`] is the unit of isolation for callers: it owns an error slot
//! (code and message of the last failed call, cleared by every successful
//! one) and the blind and multisig contexts created under it. All arguments
//! cross this boundary as hex strings, addresses and raw integer codes.

use crate::blinder::{BlindContext, InputBlindingData};
use crate::confidential::{derive_issuance_blinding_key, ConfidentialEngine};
use crate::descriptor::{self, ParsedDescriptor};
use crate::error::{CtError, ErrorCode, Result};
use crate::primitives::key::{parse_public_key, parse_secret_key, PrivateKey};
use crate::primitives::liquid::{AssetId, BlindingFactor, ConfidentialValue};
use crate::primitives::script::Script;
use crate::primitives::transaction::{OutPoint, Transaction};
use crate::transaction_builder::{
    self, IssuanceInfo, IssueResult, ReissueResult, TxInInfo, TxOutInfo,
};
use crate::transaction_signer::{
    self, MultisigSignContext, SigHashType, SighashSubject, SignatureTarget, TransactionSigner,
};
use crate::types::{EngineConfig, HashType, NetworkType, NETWORK_DEFAULT};
use crate::utils::{checked_amount, decode_hex, decode_hex_array};
use log::{debug, warn};
use secp256k1::SecretKey;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Identifies a blind context owned by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlindHandle(u64);

/// Identifies a multisig sign context owned by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MultisigHandle(u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressInfo {
    pub address: String,
    pub locking_script: String,
    /// Empty unless the hash type nests a segwit program in P2SH
    pub p2sh_segwit_locking_script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultisigScriptInfo {
    pub address: String,
    pub redeem_script: String,
    pub witness_script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultisigAddressEntry {
    pub address: String,
    pub pubkey: String,
}

/// Opening of a blinded output, in display hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnblindedOutput {
    pub asset: String,
    pub value: i64,
    pub asset_blinding_factor: String,
    pub value_blinding_factor: String,
}

/// Opening of an issuance. Token fields are empty (and the value zero) when
/// the issuance mints no token or no token key was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnblindedIssuance {
    pub asset: String,
    pub asset_value: i64,
    pub asset_blinding_factor: String,
    pub asset_value_blinding_factor: String,
    pub token: String,
    pub token_value: i64,
    pub token_blinding_factor: String,
    pub token_value_blinding_factor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LastError {
    code: ErrorCode,
    message: String,
}

impl LastError {
    fn success() -> Self {
        LastError {
            code: ErrorCode::Success,
            message: String::new(),
        }
    }
}

/// An engine session. Created through [`crate::Engine::create_session`].
pub struct Session {
    id: u64,
    default_network: NetworkType,
    max_descriptor_depth: usize,
    last_error: LastError,
    next_handle: u64,
    blind_contexts: HashMap<u64, BlindContext>,
    multisig_contexts: HashMap<u64, MultisigSignContext>,
    signer: TransactionSigner,
    engine: ConfidentialEngine,
    open_sessions: Arc<AtomicUsize>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("default_network", &self.default_network)
            .field("last_error", &self.last_error)
            .field("blind_contexts", &self.blind_contexts.len())
            .field("multisig_contexts", &self.multisig_contexts.len())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(id: u64, config: &EngineConfig, open_sessions: Arc<AtomicUsize>) -> Self {
        open_sessions.fetch_add(1, Ordering::SeqCst);
        debug!("session {} created", id);
        Session {
            id,
            default_network: config.default_network,
            max_descriptor_depth: config.max_descriptor_depth,
            last_error: LastError::success(),
            next_handle: 1,
            blind_contexts: HashMap::new(),
            multisig_contexts: HashMap::new(),
            signer: TransactionSigner::new(),
            engine: ConfidentialEngine::new(),
            open_sessions,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn default_network(&self) -> NetworkType {
        self.default_network
    }

    /// Network for a raw code; [`NETWORK_DEFAULT`] selects the session's
    /// configured network.
    fn network(&self, code: i32) -> Result<NetworkType> {
        if code == NETWORK_DEFAULT {
            return Ok(self.default_network);
        }
        NetworkType::try_from(code)
    }

    /// Numeric code of the last call; `Success` after a successful one.
    pub fn last_error_code(&self) -> ErrorCode {
        self.last_error.code
    }

    /// Description of the last failure, or `""` after a successful call.
    pub fn last_error_message(&self) -> &str {
        &self.last_error.message
    }

    /// Release the session. Dropping it has the same effect.
    pub fn close(self) {}

    fn track<T>(&mut self, operation: &str, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error = LastError::success(),
            Err(e) => {
                warn!("session {}: {} failed: {}", self.id, operation, e);
                self.last_error = LastError {
                    code: e.code(),
                    message: e.to_string(),
                };
            }
        }
        result
    }

    fn allocate_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    // Transaction construction and inspection.

    pub fn initialize_tx(&mut self, version: i32, lock_time: u32) -> Result<String> {
        let result = transaction_builder::initialize_tx(version, lock_time);
        self.track("initialize_tx", result)
    }

    pub fn add_tx_in(&mut self, tx_hex: &str, txid: &str, vout: u32, sequence: u32) -> Result<String> {
        let result = transaction_builder::add_tx_in(tx_hex, txid, vout, sequence);
        self.track("add_tx_in", result)
    }

    /// Append an output. `address` and `locking_script` are alternatives;
    /// both empty makes a fee output.
    #[allow(clippy::too_many_arguments)]
    pub fn add_tx_out(
        &mut self,
        tx_hex: &str,
        asset: &str,
        amount: i64,
        value_commitment: &str,
        address: &str,
        locking_script: &str,
        nonce: &str,
    ) -> Result<String> {
        let result = transaction_builder::add_tx_out(
            tx_hex,
            asset,
            amount,
            value_commitment,
            address,
            locking_script,
            nonce,
        );
        self.track("add_tx_out", result)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_reissue_asset(
        &mut self,
        tx_hex: &str,
        txid: &str,
        vout: u32,
        amount: i64,
        blinding_nonce: &str,
        entropy: &str,
        address: &str,
        locking_script: &str,
    ) -> Result<ReissueResult> {
        let result = transaction_builder::set_reissue_asset(
            tx_hex,
            txid,
            vout,
            amount,
            blinding_nonce,
            entropy,
            address,
            locking_script,
        );
        self.track("set_reissue_asset", result)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_issue_asset(
        &mut self,
        tx_hex: &str,
        txid: &str,
        vout: u32,
        contract_hash: &str,
        asset_amount: i64,
        asset_address: &str,
        token_amount: i64,
        token_address: &str,
        is_blind: bool,
    ) -> Result<IssueResult> {
        let result = transaction_builder::set_issue_asset(
            tx_hex,
            txid,
            vout,
            contract_hash,
            asset_amount,
            asset_address,
            token_amount,
            token_address,
            is_blind,
        );
        self.track("set_issue_asset", result)
    }

    pub fn get_tx_in_count(&mut self, tx_hex: &str) -> Result<usize> {
        let result = transaction_builder::get_tx_in_count(tx_hex);
        self.track("get_tx_in_count", result)
    }

    pub fn get_tx_out_count(&mut self, tx_hex: &str) -> Result<usize> {
        let result = transaction_builder::get_tx_out_count(tx_hex);
        self.track("get_tx_out_count", result)
    }

    pub fn get_tx_in(&mut self, tx_hex: &str, index: usize) -> Result<TxInInfo> {
        let result = transaction_builder::get_tx_in(tx_hex, index);
        self.track("get_tx_in", result)
    }

    pub fn get_tx_in_issuance_info(&mut self, tx_hex: &str, index: usize) -> Result<IssuanceInfo> {
        let result = transaction_builder::get_tx_in_issuance_info(tx_hex, index);
        self.track("get_tx_in_issuance_info", result)
    }

    pub fn get_tx_out(&mut self, tx_hex: &str, index: usize) -> Result<TxOutInfo> {
        let result = transaction_builder::get_tx_out(tx_hex, index);
        self.track("get_tx_out", result)
    }

    pub fn get_txid(&mut self, tx_hex: &str) -> Result<String> {
        let result = transaction_builder::get_txid(tx_hex);
        self.track("get_txid", result)
    }

    pub fn get_wtxid(&mut self, tx_hex: &str) -> Result<String> {
        let result = transaction_builder::get_wtxid(tx_hex);
        self.track("get_wtxid", result)
    }

    // Addresses and descriptors.

    /// Address for `pubkey` (key-hash types) or `redeem_script`
    /// (script-hash types). The network is checked before the hash type.
    pub fn create_address(
        &mut self,
        hash_type: i32,
        pubkey: &str,
        redeem_script: &str,
        network: i32,
    ) -> Result<AddressInfo> {
        let result = (|| -> Result<_> {
            let network = self.network(network)?;
            let hash_type = HashType::try_from(hash_type)?;
            let pubkey = decode_hex("pubkey", pubkey)?;
            let script = Script::from_hex(redeem_script)?;
            let created = descriptor::create_address(
                hash_type,
                Some(pubkey.as_slice()),
                Some(&script),
                network,
            )?;
            Ok(AddressInfo {
                address: created.address.to_string(),
                locking_script: created.locking_script.to_hex(),
                p2sh_segwit_locking_script: created
                    .p2sh_segwit_locking_script
                    .map(|s| s.to_hex())
                    .unwrap_or_default(),
            })
        })();
        self.track("create_address", result)
    }

    pub fn create_multisig_script(
        &mut self,
        network: i32,
        hash_type: i32,
        pubkeys: &[&str],
        required: u32,
    ) -> Result<MultisigScriptInfo> {
        let result = (|| -> Result<_> {
            let network = self.network(network)?;
            let hash_type = HashType::try_from(hash_type)?;
            let pubkeys = pubkeys
                .iter()
                .map(|pk| decode_hex("pubkey", pk))
                .collect::<Result<Vec<_>>>()?;
            let multisig =
                descriptor::derive_multisig_address(network, hash_type, &pubkeys, required as usize)?;
            Ok(MultisigScriptInfo {
                address: multisig.address.to_string(),
                redeem_script: multisig.redeem_script.map(|s| s.to_hex()).unwrap_or_default(),
                witness_script: multisig.witness_script.map(|s| s.to_hex()).unwrap_or_default(),
            })
        })();
        self.track("create_multisig_script", result)
    }

    pub fn get_addresses_from_multisig(
        &mut self,
        redeem_script: &str,
        network: i32,
        hash_type: i32,
    ) -> Result<Vec<MultisigAddressEntry>> {
        let result = (|| -> Result<_> {
            let network = self.network(network)?;
            let hash_type = HashType::try_from(hash_type)?;
            let script = Script::from_hex(redeem_script)?;
            let (addresses, pubkeys) =
                descriptor::extract_multisig_addresses(&script, network, hash_type)?;
            Ok(addresses
                .into_iter()
                .zip(pubkeys)
                .map(|(address, pubkey)| MultisigAddressEntry {
                    address: address.to_string(),
                    pubkey: hex::encode(pubkey),
                })
                .collect())
        })();
        self.track("get_addresses_from_multisig", result)
    }

    /// Parse an output descriptor. `derive_path` (e.g. `"0"`) replaces the
    /// `*` of ranged keys; pass `""` for none.
    pub fn parse_descriptor(
        &mut self,
        descriptor: &str,
        network: i32,
        derive_path: &str,
    ) -> Result<ParsedDescriptor> {
        let max_depth = self.max_descriptor_depth;
        let result = self.network(network).and_then(|network| {
            let path = Some(derive_path).filter(|p| !p.is_empty());
            descriptor::parse_descriptor_with_depth(descriptor, network, path, max_depth)
        });
        self.track("parse_descriptor", result)
    }

    // Confidential values.

    /// Issuance blinding key for the input spending `txid:vout`, as hex.
    pub fn get_issuance_blinding_key(
        &mut self,
        master_blinding_key: &str,
        txid: &str,
        vout: u32,
    ) -> Result<String> {
        let result = (|| -> Result<_> {
            let master = decode_hex_array::<32>("master blinding key", master_blinding_key)?;
            let outpoint = OutPoint::from_hex_txid(txid, vout)?;
            let key = derive_issuance_blinding_key(&master, &outpoint)?;
            Ok(hex::encode(key.secret_bytes()))
        })();
        self.track("get_issuance_blinding_key", result)
    }

    pub fn unblind_tx_out(
        &mut self,
        tx_hex: &str,
        index: usize,
        blinding_key: &str,
    ) -> Result<UnblindedOutput> {
        let result = (|| -> Result<_> {
            let tx = Transaction::from_hex(tx_hex)?;
            let key = parse_secret_key(blinding_key)?;
            let secrets = self.engine.unblind_output(tx.output_at(index)?, &key)?;
            Ok(UnblindedOutput {
                asset: secrets.asset.to_string(),
                value: to_signed_amount(secrets.value)?,
                asset_blinding_factor: secrets.asset_blinding_factor.to_string(),
                value_blinding_factor: secrets.value_blinding_factor.to_string(),
            })
        })();
        self.track("unblind_tx_out", result)
    }

    /// Open the issuance of input `index`. Empty keys are treated as absent.
    pub fn unblind_issuance(
        &mut self,
        tx_hex: &str,
        index: usize,
        asset_blinding_key: &str,
        token_blinding_key: &str,
    ) -> Result<UnblindedIssuance> {
        let result = (|| -> Result<_> {
            let tx = Transaction::from_hex(tx_hex)?;
            let asset_key = optional_secret_key(asset_blinding_key)?;
            let token_key = optional_secret_key(token_blinding_key)?;
            let secrets =
                self.engine
                    .unblind_issuance(&tx, index, asset_key.as_ref(), token_key.as_ref())?;

            let mut unblinded = UnblindedIssuance {
                asset: String::new(),
                asset_value: 0,
                asset_blinding_factor: String::new(),
                asset_value_blinding_factor: String::new(),
                token: String::new(),
                token_value: 0,
                token_blinding_factor: String::new(),
                token_value_blinding_factor: String::new(),
            };
            if let Some(asset) = secrets.asset {
                unblinded.asset = asset.asset.to_string();
                unblinded.asset_value = to_signed_amount(asset.value)?;
                unblinded.asset_blinding_factor = asset.asset_blinding_factor.to_string();
                unblinded.asset_value_blinding_factor = asset.value_blinding_factor.to_string();
            }
            if let Some(token) = secrets.token {
                unblinded.token = token.asset.to_string();
                unblinded.token_value = to_signed_amount(token.value)?;
                unblinded.token_blinding_factor = token.asset_blinding_factor.to_string();
                unblinded.token_value_blinding_factor = token.value_blinding_factor.to_string();
            }
            Ok(unblinded)
        })();
        self.track("unblind_issuance", result)
    }

    // Blinding.

    /// Open a blind context bound to `tx_hex`.
    pub fn initialize_blind_tx(&mut self, tx_hex: &str) -> Result<BlindHandle> {
        let result = BlindContext::from_hex(tx_hex).map(|context| {
            let handle = self.allocate_handle();
            self.blind_contexts.insert(handle, context);
            debug!("session {}: blind context {} opened", self.id, handle);
            BlindHandle(handle)
        });
        self.track("initialize_blind_tx", result)
    }

    fn blind_context(&mut self, handle: BlindHandle) -> Result<&mut BlindContext> {
        self.blind_contexts.get_mut(&handle.0).ok_or_else(|| {
            CtError::HandleAlreadyFreed(format!("Blind handle {} is not open", handle.0))
        })
    }

    /// Register the opening of the output spent by `txid:vout`. Issuance keys
    /// may be empty.
    #[allow(clippy::too_many_arguments)]
    pub fn add_blind_tx_in_data(
        &mut self,
        handle: BlindHandle,
        txid: &str,
        vout: u32,
        asset: &str,
        asset_blinding_factor: &str,
        value_blinding_factor: &str,
        amount: i64,
        issuance_asset_key: &str,
        issuance_token_key: &str,
    ) -> Result<()> {
        let data = (|| -> Result<_> {
            let outpoint = OutPoint::from_hex_txid(txid, vout)?;
            let data = InputBlindingData {
                asset: asset.parse::<AssetId>()?,
                asset_blinding_factor: asset_blinding_factor.parse::<BlindingFactor>()?,
                value_blinding_factor: value_blinding_factor.parse::<BlindingFactor>()?,
                amount: checked_amount(amount)?,
                issuance_asset_key: optional_secret_key(issuance_asset_key)?,
                issuance_token_key: optional_secret_key(issuance_token_key)?,
            };
            Ok((outpoint, data))
        })();
        let result = data.and_then(|(outpoint, data)| {
            self.blind_context(handle)?
                .add_input_blinding_data(&outpoint, data)
        });
        self.track("add_blind_tx_in_data", result)
    }

    pub fn add_blind_tx_out_data(
        &mut self,
        handle: BlindHandle,
        index: usize,
        confidential_key: &str,
    ) -> Result<()> {
        let result = parse_public_key(confidential_key).and_then(|pubkey| {
            self.blind_context(handle)?
                .add_output_blinding_key(index, pubkey)
        });
        self.track("add_blind_tx_out_data", result)
    }

    /// Blind `tx_hex`, which must be the transaction the context was opened
    /// for. The context stays allocated until freed but refuses further use.
    pub fn finalize_blind_tx(&mut self, handle: BlindHandle, tx_hex: &str) -> Result<String> {
        let result = Transaction::from_hex(tx_hex).and_then(|tx| {
            let blinded = self.blind_context(handle)?.finalize(&tx)?;
            blinded.to_hex()
        });
        self.track("finalize_blind_tx", result)
    }

    pub fn free_blind_handle(&mut self, handle: BlindHandle) -> Result<()> {
        let result = self
            .blind_contexts
            .remove(&handle.0)
            .map(|_| ())
            .ok_or_else(|| {
                CtError::HandleAlreadyFreed(format!("Blind handle {} is not open", handle.0))
            });
        self.track("free_blind_handle", result)
    }

    // Signing.

    /// Signature hash of the input spending `txid:vout`, as hex.
    ///
    /// Key-hash types take `pubkey`, script-hash types take `redeem_script`.
    /// A non-empty `value_commitment` takes precedence over `amount`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_confidential_sighash(
        &mut self,
        tx_hex: &str,
        txid: &str,
        vout: u32,
        hash_type: i32,
        pubkey: &str,
        redeem_script: &str,
        amount: i64,
        value_commitment: &str,
        sighash_type: i32,
        anyone_can_pay: bool,
    ) -> Result<String> {
        let result = (|| -> Result<_> {
            let tx = Transaction::from_hex(tx_hex)?;
            let outpoint = OutPoint::from_hex_txid(txid, vout)?;
            let index = find_input(&tx, &outpoint)?;
            let hash_type = HashType::try_from(hash_type)?;
            let sighash_type = parse_sighash_type(sighash_type, anyone_can_pay)?;
            let value = if value_commitment.is_empty() {
                ConfidentialValue::Explicit(checked_amount(amount)?)
            } else {
                ConfidentialValue::from_hex(value_commitment)?
            };

            let pubkey = decode_hex("pubkey", pubkey)?;
            let script = Script::from_hex(redeem_script)?;
            let subject = if hash_type.is_script_hash() {
                SighashSubject::Script(&script)
            } else {
                SighashSubject::Pubkey(&pubkey)
            };
            let digest =
                self.signer
                    .signature_hash(&tx, index, hash_type, &subject, &value, sighash_type)?;
            Ok(hex::encode(digest))
        })();
        self.track("create_confidential_sighash", result)
    }

    /// Sign a sighash with a hex or WIF private key, returning the compact
    /// signature as hex. A WIF key must belong to `network`.
    ///
    /// `deterministic` selects RFC6979 nonces over random ones, `grind_r`
    /// applies to deterministic signing only.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_ec_signature(
        &mut self,
        sighash: &str,
        private_key: &str,
        network: i32,
        grind_r: bool,
        deterministic: bool,
        low_s: bool,
    ) -> Result<String> {
        let result = (|| -> Result<_> {
            let network = self.network(network)?;
            let digest = decode_hex_array::<32>("sighash", sighash)?;
            let key = PrivateKey::parse(private_key)?;
            if private_key.len() != 64 && key.is_testnet == is_mainnet(network) {
                return Err(CtError::invalid_argument(format!(
                    "WIF key does not belong to {}",
                    network
                )));
            }
            let signature = self
                .signer
                .sign_hash(&digest, &key.secret_key, deterministic, grind_r, low_s)?;
            Ok(hex::encode(signature))
        })();
        self.track("calculate_ec_signature", result)
    }

    pub fn verify_signature(&mut self, sighash: &str, signature: &str, pubkey: &str) -> Result<bool> {
        let result = (|| -> Result<_> {
            let digest = decode_hex_array::<32>("sighash", sighash)?;
            let signature = decode_hex("signature", signature)?;
            let pubkey = parse_public_key(pubkey)?;
            self.signer.verify_signature(&digest, &signature, &pubkey)
        })();
        self.track("verify_signature", result)
    }

    /// DER-encode a compact signature, append the sighash byte and push it
    /// onto the input spending `txid:vout`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_tx_der_sign(
        &mut self,
        tx_hex: &str,
        txid: &str,
        vout: u32,
        is_witness: bool,
        signature: &str,
        sighash_type: i32,
        anyone_can_pay: bool,
        clear_stack: bool,
    ) -> Result<String> {
        let result = (|| -> Result<_> {
            let mut tx = Transaction::from_hex(tx_hex)?;
            let outpoint = OutPoint::from_hex_txid(txid, vout)?;
            let signature = decode_hex("signature", signature)?;
            let sighash_type = parse_sighash_type(sighash_type, anyone_can_pay)?;
            transaction_signer::attach_signature(
                &mut tx,
                &outpoint,
                SignatureTarget::from_is_witness(is_witness),
                &signature,
                sighash_type,
                true,
                true,
                clear_stack,
            )?;
            tx.to_hex()
        })();
        self.track("add_tx_der_sign", result)
    }

    /// Push caller-supplied data onto the input spending `txid:vout`.
    /// With `is_pubkey` the data must parse as a public key; otherwise it
    /// is pushed as raw bytes (an encoded signature, for instance).
    #[allow(clippy::too_many_arguments)]
    pub fn add_tx_sign(
        &mut self,
        tx_hex: &str,
        txid: &str,
        vout: u32,
        is_witness: bool,
        data: &str,
        is_pubkey: bool,
        clear_stack: bool,
    ) -> Result<String> {
        let result = (|| -> Result<_> {
            let mut tx = Transaction::from_hex(tx_hex)?;
            let outpoint = OutPoint::from_hex_txid(txid, vout)?;
            let target = SignatureTarget::from_is_witness(is_witness);
            if is_pubkey {
                let pubkey = parse_public_key(data)?;
                transaction_signer::attach_pubkey(&mut tx, &outpoint, target, &pubkey, clear_stack)?;
            } else {
                let bytes = decode_hex("sign data", data)?;
                if bytes.is_empty() {
                    return Err(CtError::invalid_argument("Sign data is empty"));
                }
                transaction_signer::attach_script(
                    &mut tx,
                    &outpoint,
                    target,
                    &Script::from_bytes(bytes),
                    clear_stack,
                )?;
            }
            tx.to_hex()
        })();
        self.track("add_tx_sign", result)
    }

    pub fn add_tx_script(
        &mut self,
        tx_hex: &str,
        txid: &str,
        vout: u32,
        is_witness: bool,
        script: &str,
        clear_stack: bool,
    ) -> Result<String> {
        let result = (|| -> Result<_> {
            let mut tx = Transaction::from_hex(tx_hex)?;
            let outpoint = OutPoint::from_hex_txid(txid, vout)?;
            let script = Script::from_hex(script)?;
            transaction_signer::attach_script(
                &mut tx,
                &outpoint,
                SignatureTarget::from_is_witness(is_witness),
                &script,
                clear_stack,
            )?;
            tx.to_hex()
        })();
        self.track("add_tx_script", result)
    }

    // Multisig.

    pub fn initialize_multisig_sign(&mut self) -> Result<MultisigHandle> {
        let handle = self.allocate_handle();
        self.multisig_contexts
            .insert(handle, MultisigSignContext::new());
        debug!("session {}: multisig context {} opened", self.id, handle);
        self.track("initialize_multisig_sign", Ok(MultisigHandle(handle)))
    }

    fn multisig_context(&mut self, handle: MultisigHandle) -> Result<&mut MultisigSignContext> {
        self.multisig_contexts.get_mut(&handle.0).ok_or_else(|| {
            CtError::HandleAlreadyFreed(format!("Multisig handle {} is not open", handle.0))
        })
    }

    /// Register a compact signature, DER-encoded with its sighash byte.
    pub fn add_multisig_sign_data_to_der(
        &mut self,
        handle: MultisigHandle,
        signature: &str,
        sighash_type: i32,
        anyone_can_pay: bool,
        pubkey: &str,
    ) -> Result<()> {
        let result = (|| -> Result<_> {
            let signature = decode_hex("signature", signature)?;
            let sighash_type = parse_sighash_type(sighash_type, anyone_can_pay)?;
            let pubkey = parse_public_key(pubkey)?;
            Ok((signature, sighash_type, pubkey))
        })()
        .and_then(|(signature, sighash_type, pubkey)| {
            self.multisig_context(handle)?
                .add_signature(&signature, sighash_type, true, &pubkey)
        });
        self.track("add_multisig_sign_data_to_der", result)
    }

    /// Register a signature that is already DER-encoded with its sighash
    /// byte.
    pub fn add_multisig_sign_data(
        &mut self,
        handle: MultisigHandle,
        signature: &str,
        pubkey: &str,
    ) -> Result<()> {
        let parsed = decode_hex("signature", signature)
            .and_then(|signature| Ok((signature, parse_public_key(pubkey)?)));
        let result = parsed.and_then(|(signature, pubkey)| {
            self.multisig_context(handle)?
                .add_signature(&signature, SigHashType::All, false, &pubkey)
        });
        self.track("add_multisig_sign_data", result)
    }

    /// Write the collected signatures into the input spending `txid:vout`.
    #[allow(clippy::too_many_arguments)]
    pub fn finalize_multisig_sign(
        &mut self,
        handle: MultisigHandle,
        tx_hex: &str,
        txid: &str,
        vout: u32,
        hash_type: i32,
        witness_script: &str,
        redeem_script: &str,
    ) -> Result<String> {
        let result = (|| -> Result<_> {
            let tx = Transaction::from_hex(tx_hex)?;
            let outpoint = OutPoint::from_hex_txid(txid, vout)?;
            let hash_type = HashType::try_from(hash_type)?;
            let witness_script = optional_script(witness_script)?;
            let redeem_script = optional_script(redeem_script)?;
            Ok((tx, outpoint, hash_type, witness_script, redeem_script))
        })()
        .and_then(|(tx, outpoint, hash_type, witness_script, redeem_script)| {
            let signed = self.multisig_context(handle)?.finalize(
                &tx,
                &outpoint,
                hash_type,
                redeem_script.as_ref(),
                witness_script.as_ref(),
            )?;
            signed.to_hex()
        });
        self.track("finalize_multisig_sign", result)
    }

    pub fn free_multisig_sign_handle(&mut self, handle: MultisigHandle) -> Result<()> {
        let result = self
            .multisig_contexts
            .remove(&handle.0)
            .map(|_| ())
            .ok_or_else(|| {
                CtError::HandleAlreadyFreed(format!("Multisig handle {} is not open", handle.0))
            });
        self.track("free_multisig_sign_handle", result)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.blind_contexts.is_empty() || !self.multisig_contexts.is_empty() {
            debug!(
                "session {} released with {} blind and {} multisig contexts open",
                self.id,
                self.blind_contexts.len(),
                self.multisig_contexts.len()
            );
        }
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        debug!("session {} closed", self.id);
    }
}

fn is_mainnet(network: NetworkType) -> bool {
    matches!(network, NetworkType::Mainnet | NetworkType::Liquidv1)
}

fn find_input(tx: &Transaction, outpoint: &OutPoint) -> Result<usize> {
    tx.find_input(outpoint).ok_or_else(|| {
        CtError::invalid_argument(format!(
            "Input {}:{} is not part of the transaction",
            outpoint.txid_hex(),
            outpoint.vout
        ))
    })
}

fn parse_sighash_type(flag: i32, anyone_can_pay: bool) -> Result<SigHashType> {
    let flag = u8::try_from(flag)
        .map_err(|_| CtError::invalid_argument(format!("Illegal sighash type: {}", flag)))?;
    SigHashType::from_parts(flag, anyone_can_pay)
}

fn optional_secret_key(key: &str) -> Result<Option<SecretKey>> {
    if key.is_empty() {
        return Ok(None);
    }
    parse_secret_key(key).map(Some)
}

fn optional_script(script: &str) -> Result<Option<Script>> {
    if script.is_empty() {
        return Ok(None);
    }
    Script::from_hex(script).map(Some)
}

fn to_signed_amount(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| CtError::invalid_argument(format!("Amount out of range: {}", value)))
}
