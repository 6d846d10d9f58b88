//! Elements transaction data structures and their consensus serialization.

use super::encode::{
    read_list, read_stack, read_u8, read_var_bytes, write_all, write_list, write_stack,
    write_var_bytes, Decodable, Encodable,
};
use super::hash::{sha256d, Hash256};
use super::liquid::{ConfidentialAsset, ConfidentialNonce, ConfidentialValue};
use super::script::Script;
use crate::error::{CtError, Result};
use crate::utils::{decode_reversed_hex32, encode_reversed_hex};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const OUTPOINT_ISSUANCE_FLAG: u32 = 0x8000_0000;
const OUTPOINT_PEGIN_FLAG: u32 = 0x4000_0000;
const OUTPOINT_INDEX_MASK: u32 = 0x3fff_ffff;

/// Reference to a previous output. `txid` is in internal byte order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: [u8; 32], vout: u32) -> Self {
        OutPoint { txid, vout }
    }

    /// Build from a display-order txid hex string.
    pub fn from_hex_txid(txid: &str, vout: u32) -> Result<Self> {
        Ok(OutPoint {
            txid: decode_reversed_hex32("txid", txid)?,
            vout,
        })
    }

    pub fn txid_hex(&self) -> String {
        encode_reversed_hex(&self.txid)
    }

    pub fn is_null(&self) -> bool {
        self.vout == u32::MAX && self.txid == [0u8; 32]
    }
}

impl Encodable for OutPoint {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.txid.consensus_encode(writer)?;
        written += self.vout.consensus_encode(writer)?;
        Ok(written)
    }
}

/// Issuance or reissuance attached to an input. Nonce and entropy are in
/// internal byte order; a zero nonce marks a new issuance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AssetIssuance {
    pub asset_blinding_nonce: [u8; 32],
    pub asset_entropy: [u8; 32],
    pub amount: ConfidentialValue,
    pub inflation_keys: ConfidentialValue,
}

impl AssetIssuance {
    pub fn is_reissuance(&self) -> bool {
        self.asset_blinding_nonce != [0u8; 32]
    }

    pub fn is_null(&self) -> bool {
        self.amount.is_null() && self.inflation_keys.is_null()
    }
}

impl Encodable for AssetIssuance {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.asset_blinding_nonce.consensus_encode(writer)?;
        written += self.asset_entropy.consensus_encode(writer)?;
        written += self.amount.consensus_encode(writer)?;
        written += self.inflation_keys.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for AssetIssuance {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(AssetIssuance {
            asset_blinding_nonce: Decodable::consensus_decode(reader)?,
            asset_entropy: Decodable::consensus_decode(reader)?,
            amount: ConfidentialValue::consensus_decode(reader)?,
            inflation_keys: ConfidentialValue::consensus_decode(reader)?,
        })
    }
}

/// Witness data carried for an input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TxInWitness {
    pub amount_rangeproof: Vec<u8>,
    pub inflation_keys_rangeproof: Vec<u8>,
    pub script_witness: Vec<Vec<u8>>,
    pub pegin_witness: Vec<Vec<u8>>,
}

impl TxInWitness {
    pub fn is_empty(&self) -> bool {
        self.amount_rangeproof.is_empty()
            && self.inflation_keys_rangeproof.is_empty()
            && self.script_witness.is_empty()
            && self.pegin_witness.is_empty()
    }
}

impl Encodable for TxInWitness {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = write_var_bytes(writer, &self.amount_rangeproof)?;
        written += write_var_bytes(writer, &self.inflation_keys_rangeproof)?;
        written += write_stack(writer, &self.script_witness)?;
        written += write_stack(writer, &self.pegin_witness)?;
        Ok(written)
    }
}

impl Decodable for TxInWitness {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(TxInWitness {
            amount_rangeproof: read_var_bytes(reader)?,
            inflation_keys_rangeproof: read_var_bytes(reader)?,
            script_witness: read_stack(reader)?,
            pegin_witness: read_stack(reader)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub is_pegin: bool,
    pub script_sig: Script,
    pub sequence: u32,
    pub asset_issuance: Option<AssetIssuance>,
    pub witness: TxInWitness,
}

impl TxIn {
    pub fn new(previous_output: OutPoint, sequence: u32) -> Self {
        TxIn {
            previous_output,
            is_pegin: false,
            script_sig: Script::new(),
            sequence,
            asset_issuance: None,
            witness: TxInWitness::default(),
        }
    }

    pub fn has_issuance(&self) -> bool {
        self.asset_issuance.is_some()
    }

    /// Prevout index with the issuance and pegin flags folded in.
    pub fn flagged_vout(&self) -> u32 {
        if self.previous_output.is_null() {
            return self.previous_output.vout;
        }
        let mut vout = self.previous_output.vout;
        if self.asset_issuance.is_some() {
            vout |= OUTPOINT_ISSUANCE_FLAG;
        }
        if self.is_pegin {
            vout |= OUTPOINT_PEGIN_FLAG;
        }
        vout
    }
}

impl Encodable for TxIn {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.previous_output.txid.consensus_encode(writer)?;
        written += self.flagged_vout().consensus_encode(writer)?;
        written += self.script_sig.consensus_encode(writer)?;
        written += self.sequence.consensus_encode(writer)?;
        if let Some(issuance) = &self.asset_issuance {
            written += issuance.consensus_encode(writer)?;
        }
        Ok(written)
    }
}

impl Decodable for TxIn {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        let txid = <[u8; 32]>::consensus_decode(reader)?;
        let raw_vout = u32::consensus_decode(reader)?;
        let script_sig = Script::consensus_decode(reader)?;
        let sequence = u32::consensus_decode(reader)?;

        let (vout, has_issuance, is_pegin) = if raw_vout == u32::MAX {
            (raw_vout, false, false)
        } else {
            (
                raw_vout & OUTPOINT_INDEX_MASK,
                raw_vout & OUTPOINT_ISSUANCE_FLAG != 0,
                raw_vout & OUTPOINT_PEGIN_FLAG != 0,
            )
        };

        let asset_issuance = if has_issuance {
            Some(AssetIssuance::consensus_decode(reader)?)
        } else {
            None
        };

        Ok(TxIn {
            previous_output: OutPoint { txid, vout },
            is_pegin,
            script_sig,
            sequence,
            asset_issuance,
            witness: TxInWitness::default(),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TxOutWitness {
    pub surjection_proof: Vec<u8>,
    pub rangeproof: Vec<u8>,
}

impl TxOutWitness {
    pub fn is_empty(&self) -> bool {
        self.surjection_proof.is_empty() && self.rangeproof.is_empty()
    }
}

impl Encodable for TxOutWitness {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = write_var_bytes(writer, &self.surjection_proof)?;
        written += write_var_bytes(writer, &self.rangeproof)?;
        Ok(written)
    }
}

impl Decodable for TxOutWitness {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(TxOutWitness {
            surjection_proof: read_var_bytes(reader)?,
            rangeproof: read_var_bytes(reader)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub asset: ConfidentialAsset,
    pub value: ConfidentialValue,
    pub nonce: ConfidentialNonce,
    pub script_pubkey: Script,
    pub witness: TxOutWitness,
}

impl TxOut {
    pub fn new_explicit(
        asset: super::liquid::AssetId,
        value: u64,
        script_pubkey: Script,
        nonce: ConfidentialNonce,
    ) -> Self {
        TxOut {
            asset: ConfidentialAsset::Explicit(asset),
            value: ConfidentialValue::Explicit(value),
            nonce,
            script_pubkey,
            witness: TxOutWitness::default(),
        }
    }

    /// An output with an empty locking script pays the fee.
    pub fn is_fee(&self) -> bool {
        self.script_pubkey.is_empty() && self.asset.is_explicit() && self.value.is_explicit()
    }

    pub fn is_fully_explicit(&self) -> bool {
        self.asset.is_explicit() && self.value.is_explicit()
    }

    pub fn is_fully_confidential(&self) -> bool {
        self.asset.is_confidential() && self.value.is_confidential()
    }
}

impl Encodable for TxOut {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.asset.consensus_encode(writer)?;
        written += self.value.consensus_encode(writer)?;
        written += self.nonce.consensus_encode(writer)?;
        written += self.script_pubkey.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for TxOut {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        let out = TxOut {
            asset: ConfidentialAsset::consensus_decode(reader)?,
            value: ConfidentialValue::consensus_decode(reader)?,
            nonce: ConfidentialNonce::consensus_decode(reader)?,
            script_pubkey: Script::consensus_decode(reader)?,
            witness: TxOutWitness::default(),
        };
        if out.asset.is_confidential() != out.value.is_confidential() && !out.value.is_null() {
            return Err(CtError::malformed(
                "Output mixes explicit and confidential asset/value",
            ));
        }
        Ok(out)
    }
}

/// An Elements transaction
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub lock_time: u32,
    pub input: Vec<TxIn>,
    pub output: Vec<TxOut>,
}

impl Transaction {
    pub fn new(version: i32, lock_time: u32) -> Self {
        Transaction {
            version,
            lock_time,
            input: Vec::new(),
            output: Vec::new(),
        }
    }

    pub fn from_hex(tx_hex: &str) -> Result<Self> {
        let bytes = hex::decode(tx_hex)
            .map_err(|e| CtError::malformed(format!("Invalid transaction hex: {}", e)))?;
        Self::consensus_decode_from_slice(&bytes)
    }

    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(self.consensus_encode_to_vec()?))
    }

    pub fn has_witness(&self) -> bool {
        self.input.iter().any(|i| !i.witness.is_empty())
            || self.output.iter().any(|o| !o.witness.is_empty())
    }

    /// Serialization without any witness data
    pub fn encode_without_witness(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_body(&mut buf, false)?;
        Ok(buf)
    }

    /// Transaction id in internal byte order.
    pub fn txid(&self) -> Result<Hash256> {
        Ok(sha256d(&self.encode_without_witness()?))
    }

    /// Hash of the full serialization, internal byte order.
    pub fn wtxid(&self) -> Result<Hash256> {
        Ok(sha256d(&self.consensus_encode_to_vec()?))
    }

    pub fn txid_hex(&self) -> Result<String> {
        Ok(encode_reversed_hex(&self.txid()?))
    }

    pub fn wtxid_hex(&self) -> Result<String> {
        Ok(encode_reversed_hex(&self.wtxid()?))
    }

    /// Index of the input spending `outpoint`.
    pub fn find_input(&self, outpoint: &OutPoint) -> Option<usize> {
        self.input.iter().position(|i| i.previous_output == *outpoint)
    }

    pub fn input_at(&self, index: usize) -> Result<&TxIn> {
        self.input.get(index).ok_or_else(|| {
            CtError::invalid_argument(format!(
                "Input index {} out of range ({} inputs)",
                index,
                self.input.len()
            ))
        })
    }

    pub fn output_at(&self, index: usize) -> Result<&TxOut> {
        self.output.get(index).ok_or_else(|| {
            CtError::invalid_argument(format!(
                "Output index {} out of range ({} outputs)",
                index,
                self.output.len()
            ))
        })
    }

    fn encode_body<W: Write>(&self, writer: &mut W, with_witness: bool) -> Result<usize> {
        let mut written = self.version.consensus_encode(writer)?;
        written += write_all(writer, &[with_witness as u8])?;
        written += write_list(writer, &self.input)?;
        written += write_list(writer, &self.output)?;
        written += self.lock_time.consensus_encode(writer)?;
        if with_witness {
            for input in &self.input {
                written += input.witness.consensus_encode(writer)?;
            }
            for output in &self.output {
                written += output.witness.consensus_encode(writer)?;
            }
        }
        Ok(written)
    }
}

impl Encodable for Transaction {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        self.encode_body(writer, self.has_witness())
    }
}

impl Decodable for Transaction {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        let version = i32::consensus_decode(reader)?;
        let flag = read_u8(reader)?;
        if flag > 1 {
            return Err(CtError::malformed(format!("Invalid witness flag: {:#x}", flag)));
        }

        let mut input: Vec<TxIn> = read_list(reader)?;
        let mut output: Vec<TxOut> = read_list(reader)?;
        let lock_time = u32::consensus_decode(reader)?;

        if flag == 1 {
            for txin in &mut input {
                txin.witness = TxInWitness::consensus_decode(reader)?;
            }
            for txout in &mut output {
                txout.witness = TxOutWitness::consensus_decode(reader)?;
            }
        }

        let tx = Transaction {
            version,
            lock_time,
            input,
            output,
        };
        if flag == 1 && !tx.has_witness() {
            return Err(CtError::malformed("Superfluous witness record"));
        }
        Ok(tx)
    }
}
