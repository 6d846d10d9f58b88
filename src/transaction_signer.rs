//! Signature hashes, ECDSA signing and script-sig / witness assembly for
//! Elements inputs, including the collect-then-finalize multisig flow.

use crate::error::{CtError, Result};
use crate::primitives::encode::{write_varint, Encodable};
use crate::primitives::hash::{hash160, sha256d, Hash256};
use crate::primitives::liquid::ConfidentialValue;
use crate::primitives::script::{Script, ScriptBuilder};
use crate::primitives::transaction::{OutPoint, Transaction, TxIn};
use crate::types::HashType;
use log::debug;
use rand::RngCore;
use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

const ANYONE_CAN_PAY: u8 = 0x80;

/// Signature hash types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SigHashType {
    /// Sign all inputs and outputs
    #[default]
    All = 0x01,
    /// Sign all inputs, no outputs
    None = 0x02,
    /// Sign all inputs, only the output with the same index
    Single = 0x03,
    AllPlusAnyoneCanPay = 0x81,
    NonePlusAnyoneCanPay = 0x82,
    SinglePlusAnyoneCanPay = 0x83,
}

impl SigHashType {
    /// Combine a base flag (1, 2 or 3) with the ANYONECANPAY modifier.
    pub fn from_parts(flag: u8, anyone_can_pay: bool) -> Result<Self> {
        let base = match flag & !ANYONE_CAN_PAY {
            0x01 => SigHashType::All,
            0x02 => SigHashType::None,
            0x03 => SigHashType::Single,
            other => {
                return Err(CtError::invalid_argument(format!(
                    "Unknown sighash type: {}",
                    other
                )))
            }
        };
        if anyone_can_pay || flag & ANYONE_CAN_PAY != 0 {
            Ok(base.with_anyone_can_pay())
        } else {
            Ok(base)
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_u32(self) -> u32 {
        u32::from(self.as_u8())
    }

    pub fn is_anyone_can_pay(self) -> bool {
        self.as_u8() & ANYONE_CAN_PAY != 0
    }

    /// The flag with ANYONECANPAY stripped.
    pub fn base(self) -> SigHashType {
        match self {
            SigHashType::All | SigHashType::AllPlusAnyoneCanPay => SigHashType::All,
            SigHashType::None | SigHashType::NonePlusAnyoneCanPay => SigHashType::None,
            SigHashType::Single | SigHashType::SinglePlusAnyoneCanPay => SigHashType::Single,
        }
    }

    fn with_anyone_can_pay(self) -> SigHashType {
        match self.base() {
            SigHashType::All => SigHashType::AllPlusAnyoneCanPay,
            SigHashType::None => SigHashType::NonePlusAnyoneCanPay,
            _ => SigHashType::SinglePlusAnyoneCanPay,
        }
    }
}

/// What the spent output locks to: a key for the pubkey-hash types, a
/// script for the script-hash types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SighashSubject<'a> {
    Pubkey(&'a [u8]),
    Script(&'a Script),
}

/// Which stack of an input a push goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureTarget {
    ScriptSig,
    Witness,
}

impl SignatureTarget {
    pub fn from_is_witness(is_witness: bool) -> Self {
        if is_witness {
            SignatureTarget::Witness
        } else {
            SignatureTarget::ScriptSig
        }
    }
}

/// Signing and sighash computation over one secp256k1 context.
pub struct TransactionSigner {
    secp: Secp256k1<All>,
}

impl Default for TransactionSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionSigner {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Digest a signature for input `input_index` commits to.
    ///
    /// `value` is the spent amount (explicit or commitment) and is required
    /// for the segwit hash types.
    pub fn signature_hash(
        &self,
        transaction: &Transaction,
        input_index: usize,
        hash_type: HashType,
        subject: &SighashSubject<'_>,
        value: &ConfidentialValue,
        sighash_type: SigHashType,
    ) -> Result<Hash256> {
        transaction.input_at(input_index)?;
        let script_code = script_code(hash_type, subject)?;

        if hash_type.is_witness() {
            if value.is_null() {
                return Err(CtError::invalid_argument(
                    "Segwit signature hashes need the spent amount or commitment",
                ));
            }
            self.signature_hash_segwit_v0(
                transaction,
                input_index,
                &script_code,
                value,
                sighash_type,
            )
        } else {
            self.signature_hash_legacy(transaction, input_index, &script_code, sighash_type)
        }
    }

    /// Elements legacy digest: the transaction with every other script
    /// blanked, serialized without the witness flag and with plain prevout
    /// indices, issuances kept.
    pub fn signature_hash_legacy(
        &self,
        transaction: &Transaction,
        input_index: usize,
        script_code: &Script,
        sighash_type: SigHashType,
    ) -> Result<Hash256> {
        let base = sighash_type.base();
        if base == SigHashType::Single && input_index >= transaction.output.len() {
            return Err(CtError::invalid_argument(format!(
                "SIGHASH_SINGLE: no output at index {}",
                input_index
            )));
        }

        let inputs: Vec<usize> = if sighash_type.is_anyone_can_pay() {
            vec![input_index]
        } else {
            (0..transaction.input.len()).collect()
        };
        let outputs = match base {
            SigHashType::None => &transaction.output[..0],
            SigHashType::Single => &transaction.output[..=input_index],
            _ => &transaction.output[..],
        };

        let mut data = Vec::new();
        transaction.version.consensus_encode(&mut data)?;
        write_compact_size(&mut data, inputs.len())?;
        for i in inputs {
            let txin = &transaction.input[i];
            encode_plain_outpoint(&mut data, &txin.previous_output)?;
            if i == input_index {
                script_code.consensus_encode(&mut data)?;
            } else {
                Script::new().consensus_encode(&mut data)?;
            }
            let sequence = if i != input_index && base != SigHashType::All {
                0
            } else {
                txin.sequence
            };
            sequence.consensus_encode(&mut data)?;
            if let Some(issuance) = &txin.asset_issuance {
                issuance.consensus_encode(&mut data)?;
            }
        }

        write_compact_size(&mut data, outputs.len())?;
        let last = outputs.len().saturating_sub(1);
        for (i, txout) in outputs.iter().enumerate() {
            if base == SigHashType::Single && i != last {
                // Blanked output: null asset and value, empty script
                data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
            } else {
                txout.consensus_encode(&mut data)?;
            }
        }
        transaction.lock_time.consensus_encode(&mut data)?;
        sighash_type.as_u32().consensus_encode(&mut data)?;

        Ok(sha256d(&data))
    }

    /// Elements variant of the BIP143 digest, which adds `hashIssuance`,
    /// commits to the confidential spent value and to the input's issuance.
    pub fn signature_hash_segwit_v0(
        &self,
        transaction: &Transaction,
        input_index: usize,
        script_code: &Script,
        value: &ConfidentialValue,
        sighash_type: SigHashType,
    ) -> Result<Hash256> {
        let base = sighash_type.base();
        let anyone_can_pay = sighash_type.is_anyone_can_pay();
        let zero = [0u8; 32];

        let hash_prevouts = if !anyone_can_pay {
            let mut prevouts = Vec::new();
            for txin in &transaction.input {
                encode_plain_outpoint(&mut prevouts, &txin.previous_output)?;
            }
            sha256d(&prevouts)
        } else {
            zero
        };

        let hash_sequence = if !anyone_can_pay && base == SigHashType::All {
            let mut sequences = Vec::new();
            for txin in &transaction.input {
                txin.sequence.consensus_encode(&mut sequences)?;
            }
            sha256d(&sequences)
        } else {
            zero
        };

        let hash_issuance = if !anyone_can_pay {
            let mut issuances = Vec::new();
            for txin in &transaction.input {
                encode_issuance_or_null(&mut issuances, txin)?;
            }
            sha256d(&issuances)
        } else {
            zero
        };

        let hash_outputs = if base != SigHashType::Single && base != SigHashType::None {
            let mut outputs = Vec::new();
            for txout in &transaction.output {
                txout.consensus_encode(&mut outputs)?;
            }
            sha256d(&outputs)
        } else if base == SigHashType::Single && input_index < transaction.output.len() {
            sha256d(&transaction.output[input_index].consensus_encode_to_vec()?)
        } else {
            zero
        };

        let txin = transaction.input_at(input_index)?;
        let mut data = Vec::new();
        transaction.version.consensus_encode(&mut data)?;
        data.extend_from_slice(&hash_prevouts);
        data.extend_from_slice(&hash_sequence);
        data.extend_from_slice(&hash_issuance);
        encode_plain_outpoint(&mut data, &txin.previous_output)?;
        script_code.consensus_encode(&mut data)?;
        value.consensus_encode(&mut data)?;
        txin.sequence.consensus_encode(&mut data)?;
        if let Some(issuance) = &txin.asset_issuance {
            issuance.consensus_encode(&mut data)?;
        }
        data.extend_from_slice(&hash_outputs);
        transaction.lock_time.consensus_encode(&mut data)?;
        sighash_type.as_u32().consensus_encode(&mut data)?;

        Ok(sha256d(&data))
    }

    /// Sign a digest, returning the 64-byte compact signature.
    ///
    /// Deterministic signing uses RFC6979; `grind_r` retries until R is
    /// low. Otherwise random extra nonce data is mixed in. `low_s` forces
    /// `s <= n/2` on the returned signature.
    pub fn sign_hash(
        &self,
        digest: &Hash256,
        private_key: &SecretKey,
        deterministic: bool,
        grind_r: bool,
        low_s: bool,
    ) -> Result<[u8; 64]> {
        let message = Message::from_digest(*digest);
        let mut signature = if !deterministic {
            let mut noncedata = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut noncedata);
            self.secp
                .sign_ecdsa_with_noncedata(&message, private_key, &noncedata)
        } else if grind_r {
            self.secp.sign_ecdsa_low_r(&message, private_key)
        } else {
            self.secp.sign_ecdsa(&message, private_key)
        };
        if low_s {
            signature.normalize_s();
        }
        Ok(signature.serialize_compact())
    }

    /// Verify a compact or DER signature (a trailing sighash byte on DER is
    /// tolerated). High-S signatures are checked in their normalized form.
    pub fn verify_signature(
        &self,
        digest: &Hash256,
        signature: &[u8],
        public_key: &PublicKey,
    ) -> Result<bool> {
        let mut signature = parse_signature(signature)?;
        signature.normalize_s();
        let message = Message::from_digest(*digest);
        Ok(self
            .secp
            .verify_ecdsa(&message, &signature, public_key)
            .is_ok())
    }
}

fn write_compact_size(data: &mut Vec<u8>, n: usize) -> Result<usize> {
    write_varint(data, n as u64)
}

fn encode_plain_outpoint(data: &mut Vec<u8>, outpoint: &OutPoint) -> Result<usize> {
    outpoint.consensus_encode(data)
}

fn encode_issuance_or_null(data: &mut Vec<u8>, txin: &TxIn) -> Result<()> {
    match &txin.asset_issuance {
        Some(issuance) => {
            issuance.consensus_encode(data)?;
        }
        None => data.push(0x00),
    }
    Ok(())
}

/// The script a signature commits to for the given output type.
fn script_code(hash_type: HashType, subject: &SighashSubject<'_>) -> Result<Script> {
    match (hash_type, subject) {
        (HashType::P2pkh | HashType::P2wpkh | HashType::P2shP2wpkh, SighashSubject::Pubkey(pk)) => {
            PublicKey::from_slice(pk)?;
            Ok(Script::new_p2pkh(&hash160(pk)))
        }
        (HashType::P2sh | HashType::P2wsh | HashType::P2shP2wsh, SighashSubject::Script(s)) => {
            if s.is_empty() {
                return Err(CtError::invalid_argument("Script is empty"));
            }
            Ok((*s).clone())
        }
        (hash_type, _) => Err(CtError::invalid_argument(format!(
            "{:?} needs a {}",
            hash_type,
            if hash_type.is_script_hash() {
                "script"
            } else {
                "public key"
            }
        ))),
    }
}

fn parse_signature(signature: &[u8]) -> Result<Signature> {
    if signature.len() == 64 {
        return Ok(Signature::from_compact(signature)?);
    }
    match Signature::from_der(signature) {
        Ok(sig) => Ok(sig),
        Err(_) if !signature.is_empty() => {
            Ok(Signature::from_der(&signature[..signature.len() - 1])?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Signature bytes as pushed on a stack. With `der_encode` the 64-byte
/// compact form becomes DER plus the sighash byte; otherwise it is pushed
/// as given.
pub fn encode_signature(
    signature: &[u8],
    sighash_type: SigHashType,
    der_encode: bool,
    low_s: bool,
) -> Result<Vec<u8>> {
    if !der_encode {
        if signature.is_empty() {
            return Err(CtError::invalid_argument("Signature is empty"));
        }
        return Ok(signature.to_vec());
    }
    let mut sig = Signature::from_compact(signature)
        .map_err(|e| CtError::invalid_argument(format!("Invalid compact signature: {}", e)))?;
    if low_s {
        sig.normalize_s();
    }
    let mut encoded = sig.serialize_der().to_vec();
    encoded.push(sighash_type.as_u8());
    Ok(encoded)
}

fn push_to_input(
    tx: &mut Transaction,
    outpoint: &OutPoint,
    target: SignatureTarget,
    data: &[u8],
    clear_stack: bool,
) -> Result<()> {
    let index = tx.find_input(outpoint).ok_or_else(|| {
        CtError::invalid_argument(format!(
            "Input {}:{} is not part of the transaction",
            outpoint.txid_hex(),
            outpoint.vout
        ))
    })?;
    let txin = &mut tx.input[index];
    match target {
        SignatureTarget::Witness => {
            if clear_stack {
                txin.witness.script_witness.clear();
            }
            txin.witness.script_witness.push(data.to_vec());
        }
        SignatureTarget::ScriptSig => {
            let mut script = if clear_stack {
                Vec::new()
            } else {
                txin.script_sig.as_bytes().to_vec()
            };
            script.extend_from_slice(ScriptBuilder::new().push_slice(data).into_script().as_bytes());
            txin.script_sig = Script::from_bytes(script);
        }
    }
    Ok(())
}

/// Push a signature onto the scriptSig or witness of the input spending
/// `outpoint`.
#[allow(clippy::too_many_arguments)]
pub fn attach_signature(
    tx: &mut Transaction,
    outpoint: &OutPoint,
    target: SignatureTarget,
    signature: &[u8],
    sighash_type: SigHashType,
    der_encode: bool,
    low_s: bool,
    clear_stack: bool,
) -> Result<()> {
    let encoded = encode_signature(signature, sighash_type, der_encode, low_s)?;
    push_to_input(tx, outpoint, target, &encoded, clear_stack)
}

pub fn attach_pubkey(
    tx: &mut Transaction,
    outpoint: &OutPoint,
    target: SignatureTarget,
    pubkey: &PublicKey,
    clear_stack: bool,
) -> Result<()> {
    push_to_input(tx, outpoint, target, &pubkey.serialize(), clear_stack)
}

/// Push a redeem or witness script.
pub fn attach_script(
    tx: &mut Transaction,
    outpoint: &OutPoint,
    target: SignatureTarget,
    script: &Script,
    clear_stack: bool,
) -> Result<()> {
    push_to_input(tx, outpoint, target, script.as_bytes(), clear_stack)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultisigState {
    Created,
    Collecting,
    Finalized,
}

/// Collects multisig signatures in any order and emits them in script
/// order.
#[derive(Debug)]
pub struct MultisigSignContext {
    state: MultisigState,
    /// Encoded signature (with sighash byte) and compressed pubkey
    signatures: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Default for MultisigSignContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MultisigSignContext {
    pub fn new() -> Self {
        MultisigSignContext {
            state: MultisigState::Created,
            signatures: Vec::new(),
        }
    }

    pub fn state(&self) -> MultisigState {
        self.state
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == MultisigState::Finalized {
            return Err(CtError::HandleAlreadyFreed(
                "Multisig sign context has already been finalized".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add_signature(
        &mut self,
        signature: &[u8],
        sighash_type: SigHashType,
        der_encode: bool,
        pubkey: &PublicKey,
    ) -> Result<()> {
        self.ensure_open()?;
        let pubkey = pubkey.serialize().to_vec();
        if self.signatures.iter().any(|(_, pk)| *pk == pubkey) {
            return Err(CtError::DuplicateEntry(format!(
                "A signature for {} is already registered",
                hex::encode(&pubkey)
            )));
        }
        let encoded = encode_signature(signature, sighash_type, der_encode, true)?;
        self.signatures.push((encoded, pubkey));
        self.state = MultisigState::Collecting;
        Ok(())
    }

    /// Write `OP_0 <sig>... <script>` into the input spending `outpoint`.
    ///
    /// P2SH takes the multisig script as `redeem_script`; P2WSH and
    /// P2SH-P2WSH take it as `witness_script`, the latter also getting the
    /// P2WSH program pushed into its scriptSig. Existing stacks are replaced.
    pub fn finalize(
        &mut self,
        tx: &Transaction,
        outpoint: &OutPoint,
        hash_type: HashType,
        redeem_script: Option<&Script>,
        witness_script: Option<&Script>,
    ) -> Result<Transaction> {
        self.ensure_open()?;
        let multisig_script = match hash_type {
            HashType::P2sh => redeem_script,
            HashType::P2wsh | HashType::P2shP2wsh => witness_script,
            other => {
                return Err(CtError::invalid_argument(format!(
                    "{:?} is not a multisig hash type",
                    other
                )))
            }
        }
        .ok_or_else(|| CtError::invalid_argument("Multisig script is required"))?;

        let (required, script_pubkeys) = multisig_script.parse_multisig()?;
        let mut ordered: Vec<(usize, &Vec<u8>)> = Vec::with_capacity(self.signatures.len());
        for (signature, pubkey) in &self.signatures {
            let position = script_pubkeys
                .iter()
                .position(|pk| pk == pubkey)
                .ok_or_else(|| CtError::PubkeyNotInScript(hex::encode(pubkey)))?;
            ordered.push((position, signature));
        }
        if ordered.len() != required {
            return Err(CtError::SignatureCountMismatch(format!(
                "Script requires {} signatures, {} collected",
                required,
                ordered.len()
            )));
        }
        ordered.sort_by_key(|(position, _)| *position);

        let mut signed = tx.clone();
        let index = signed.find_input(outpoint).ok_or_else(|| {
            CtError::invalid_argument(format!(
                "Input {}:{} is not part of the transaction",
                outpoint.txid_hex(),
                outpoint.vout
            ))
        })?;
        let txin = &mut signed.input[index];

        if hash_type == HashType::P2sh {
            let mut builder = ScriptBuilder::new().push_int(0);
            for (_, signature) in &ordered {
                builder = builder.push_slice(signature);
            }
            txin.script_sig = builder.push_slice(multisig_script.as_bytes()).into_script();
        } else {
            let mut stack = Vec::with_capacity(ordered.len() + 2);
            stack.push(Vec::new());
            stack.extend(ordered.iter().map(|(_, sig)| sig.to_vec()));
            stack.push(multisig_script.as_bytes().to_vec());
            txin.witness.script_witness = stack;

            txin.script_sig = if hash_type == HashType::P2shP2wsh {
                let program = multisig_script.to_p2wsh();
                if let Some(redeem) = redeem_script {
                    if *redeem != program {
                        return Err(CtError::InvalidScript(
                            "Redeem script is not the P2WSH program of the witness script"
                                .to_string(),
                        ));
                    }
                }
                ScriptBuilder::new().push_slice(program.as_bytes()).into_script()
            } else {
                Script::new()
            };
        }

        debug!(
            "multisig: {} of {} signatures placed on input {}",
            required,
            script_pubkeys.len(),
            index
        );
        self.state = MultisigState::Finalized;
        self.signatures.clear();
        Ok(signed)
    }
}
