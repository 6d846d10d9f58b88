//! Raw Elements transaction construction and inspection.
//!
//! [`TransactionBuilder`] mutates a decoded [`Transaction`] in place. The
//! free functions wrap it in the hex-in, hex-out form used by sessions: each
//! decodes the given transaction, applies one change and re-encodes it.

use crate::error::{CtError, Result};
use crate::primitives::address::Address;
use crate::primitives::liquid::{
    generate_asset_entropy, AssetId, ConfidentialAsset, ConfidentialNonce, ConfidentialValue,
};
use crate::primitives::script::Script;
use crate::primitives::transaction::{AssetIssuance, OutPoint, Transaction, TxIn, TxOut};
use crate::utils::{checked_amount, decode_reversed_hex32, encode_reversed_hex};
use log::debug;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Input fields as returned by [`get_tx_in`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInInfo {
    pub txid: String,
    pub vout: u32,
    pub sequence: u32,
    pub script_sig: String,
}

/// Issuance fields of an input. Values are hex of their wire form and empty
/// when null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceInfo {
    pub entropy: String,
    pub nonce: String,
    pub asset_value: String,
    pub token_value: String,
    pub asset_rangeproof: String,
    pub token_rangeproof: String,
}

/// Output fields as returned by [`get_tx_out`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutInfo {
    /// Asset id for explicit outputs, asset commitment hex otherwise
    pub asset: String,
    /// Explicit amount, 0 when the value is committed
    pub amount: i64,
    pub value_commitment: String,
    pub nonce: String,
    pub locking_script: String,
    pub surjection_proof: String,
    pub rangeproof: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReissueResult {
    pub asset: String,
    pub tx_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueResult {
    pub asset: String,
    pub token: String,
    pub entropy: String,
    pub tx_hex: String,
}

/// Where an output pays to.
///
/// A confidential address contributes its blinding pubkey as the output
/// nonce. With neither an address nor a script the output pays the fee.
#[derive(Debug, Clone, Default)]
pub struct OutputDestination<'a> {
    pub address: &'a str,
    pub locking_script: &'a str,
    pub nonce: &'a str,
}

impl<'a> OutputDestination<'a> {
    pub fn address(address: &'a str) -> Self {
        OutputDestination {
            address,
            ..Default::default()
        }
    }

    fn resolve(&self) -> Result<(Script, ConfidentialNonce)> {
        if !self.address.is_empty() && !self.locking_script.is_empty() {
            return Err(CtError::invalid_argument(
                "Specify either an address or a locking script, not both",
            ));
        }
        let mut nonce = ConfidentialNonce::from_hex(self.nonce)?;

        let script = if !self.address.is_empty() {
            let address = Address::from_str(self.address)?;
            if let Some(pubkey) = address.blinding_pubkey {
                if !nonce.is_null() {
                    return Err(CtError::invalid_argument(
                        "A confidential address already supplies the nonce",
                    ));
                }
                nonce = ConfidentialNonce::Confidential(pubkey.serialize());
            }
            address.script_pubkey()
        } else {
            Script::from_hex(self.locking_script)?
        };
        Ok((script, nonce))
    }
}

/// Incremental editor for a transaction.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    tx: Transaction,
}

impl TransactionBuilder {
    pub fn new(version: i32, lock_time: u32) -> Self {
        TransactionBuilder {
            tx: Transaction::new(version, lock_time),
        }
    }

    pub fn from_transaction(tx: Transaction) -> Self {
        TransactionBuilder { tx }
    }

    pub fn from_hex(tx_hex: &str) -> Result<Self> {
        Ok(TransactionBuilder {
            tx: Transaction::from_hex(tx_hex)?,
        })
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn into_transaction(self) -> Transaction {
        self.tx
    }

    pub fn to_hex(&self) -> Result<String> {
        self.tx.to_hex()
    }

    pub fn add_input(&mut self, outpoint: OutPoint, sequence: u32) -> Result<usize> {
        if self.tx.find_input(&outpoint).is_some() {
            return Err(CtError::DuplicateEntry(format!(
                "Input {}:{} is already spent by this transaction",
                outpoint.txid_hex(),
                outpoint.vout
            )));
        }
        self.tx.input.push(TxIn::new(outpoint, sequence));
        Ok(self.tx.input.len() - 1)
    }

    /// Append an output. `value_commitment`, when non-empty, replaces the
    /// explicit `amount`.
    pub fn add_output(
        &mut self,
        asset: &str,
        amount: i64,
        value_commitment: &str,
        destination: &OutputDestination<'_>,
    ) -> Result<usize> {
        let asset = parse_asset(asset)?;
        let value = if value_commitment.is_empty() {
            ConfidentialValue::Explicit(checked_amount(amount)?)
        } else {
            ConfidentialValue::from_hex(value_commitment)?
        };
        let (script_pubkey, nonce) = destination.resolve()?;

        if value.is_confidential() != asset.is_confidential() {
            return Err(CtError::invalid_argument(
                "Asset and value must both be explicit or both be committed",
            ));
        }
        if script_pubkey.is_empty() && !(asset.is_explicit() && value.is_explicit()) {
            return Err(CtError::invalid_argument("Fee outputs must be explicit"));
        }

        self.tx.output.push(TxOut {
            asset,
            value,
            nonce,
            script_pubkey,
            witness: Default::default(),
        });
        Ok(self.tx.output.len() - 1)
    }

    fn issuance_input(&mut self, outpoint: &OutPoint) -> Result<usize> {
        let index = self.tx.find_input(outpoint).ok_or_else(|| {
            CtError::invalid_argument(format!(
                "Input {}:{} is not part of the transaction",
                outpoint.txid_hex(),
                outpoint.vout
            ))
        })?;
        if self.tx.input[index].has_issuance() {
            return Err(CtError::DuplicateEntry(format!(
                "Input {} already carries an issuance",
                index
            )));
        }
        Ok(index)
    }

    /// Turn the input spending `outpoint` (which must hold the reissuance
    /// token) into a reissuance of `amount` and pay it to `destination`.
    pub fn set_reissue_asset(
        &mut self,
        outpoint: &OutPoint,
        amount: i64,
        blinding_nonce: &[u8; 32],
        entropy: &[u8; 32],
        destination: &OutputDestination<'_>,
    ) -> Result<AssetId> {
        let amount = checked_amount(amount)?;
        if amount == 0 {
            return Err(CtError::invalid_argument("Reissue amount must be positive"));
        }
        if *blinding_nonce == [0u8; 32] {
            return Err(CtError::invalid_argument(
                "Reissuance requires the token's asset blinding factor as nonce",
            ));
        }
        let (script_pubkey, nonce) = destination.resolve()?;
        let index = self.issuance_input(outpoint)?;

        let asset = AssetId::from_entropy(entropy);
        self.tx.input[index].asset_issuance = Some(AssetIssuance {
            asset_blinding_nonce: *blinding_nonce,
            asset_entropy: *entropy,
            amount: ConfidentialValue::Explicit(amount),
            inflation_keys: ConfidentialValue::Null,
        });
        self.tx
            .output
            .push(TxOut::new_explicit(asset, amount, script_pubkey, nonce));

        debug!("reissue of {} on input {}", asset, index);
        Ok(asset)
    }

    /// Attach a new issuance to the input spending `outpoint`. Each
    /// non-zero amount is paid to its destination. Returns the asset id,
    /// the token id and the issuance entropy.
    #[allow(clippy::too_many_arguments)]
    pub fn set_issue_asset(
        &mut self,
        outpoint: &OutPoint,
        contract_hash: &[u8; 32],
        asset_amount: i64,
        asset_destination: &OutputDestination<'_>,
        token_amount: i64,
        token_destination: &OutputDestination<'_>,
        is_blind: bool,
    ) -> Result<(AssetId, AssetId, [u8; 32])> {
        let asset_amount = checked_amount(asset_amount)?;
        let token_amount = checked_amount(token_amount)?;
        if asset_amount == 0 && token_amount == 0 {
            return Err(CtError::invalid_argument(
                "Issuance needs a non-zero asset or token amount",
            ));
        }
        let index = self.issuance_input(outpoint)?;

        let entropy = generate_asset_entropy(outpoint, contract_hash);
        let asset = AssetId::from_entropy(&entropy);
        let token = AssetId::reissuance_token_from_entropy(&entropy, is_blind);

        let mut outputs = Vec::with_capacity(2);
        for (id, amount, destination) in [
            (asset, asset_amount, asset_destination),
            (token, token_amount, token_destination),
        ] {
            if amount == 0 {
                continue;
            }
            let (script_pubkey, nonce) = destination.resolve()?;
            if script_pubkey.is_empty() {
                return Err(CtError::invalid_argument(format!(
                    "No destination for issued {}",
                    id
                )));
            }
            outputs.push(TxOut::new_explicit(id, amount, script_pubkey, nonce));
        }

        let as_value = |amount: u64| match amount {
            0 => ConfidentialValue::Null,
            v => ConfidentialValue::Explicit(v),
        };
        self.tx.input[index].asset_issuance = Some(AssetIssuance {
            asset_blinding_nonce: [0u8; 32],
            asset_entropy: *contract_hash,
            amount: as_value(asset_amount),
            inflation_keys: as_value(token_amount),
        });
        self.tx.output.extend(outputs);

        debug!("issuance of {} (token {}) on input {}", asset, token, index);
        Ok((asset, token, entropy))
    }
}

fn parse_asset(asset: &str) -> Result<ConfidentialAsset> {
    match asset.len() {
        64 => Ok(ConfidentialAsset::Explicit(AssetId::from_str(asset)?)),
        66 => ConfidentialAsset::from_hex(asset),
        _ => Err(CtError::invalid_argument(format!("Invalid asset: {}", asset))),
    }
}

/// Empty transaction of the given version and lock time.
pub fn initialize_tx(version: i32, lock_time: u32) -> Result<String> {
    TransactionBuilder::new(version, lock_time).to_hex()
}

pub fn add_tx_in(tx_hex: &str, txid: &str, vout: u32, sequence: u32) -> Result<String> {
    let mut builder = TransactionBuilder::from_hex(tx_hex)?;
    builder.add_input(OutPoint::from_hex_txid(txid, vout)?, sequence)?;
    builder.to_hex()
}

pub fn add_tx_out(
    tx_hex: &str,
    asset: &str,
    amount: i64,
    value_commitment: &str,
    address: &str,
    locking_script: &str,
    nonce: &str,
) -> Result<String> {
    let mut builder = TransactionBuilder::from_hex(tx_hex)?;
    let destination = OutputDestination {
        address,
        locking_script,
        nonce,
    };
    builder.add_output(asset, amount, value_commitment, &destination)?;
    builder.to_hex()
}

#[allow(clippy::too_many_arguments)]
pub fn set_reissue_asset(
    tx_hex: &str,
    txid: &str,
    vout: u32,
    amount: i64,
    blinding_nonce: &str,
    entropy: &str,
    address: &str,
    locking_script: &str,
) -> Result<ReissueResult> {
    let mut builder = TransactionBuilder::from_hex(tx_hex)?;
    let outpoint = OutPoint::from_hex_txid(txid, vout)?;
    let destination = OutputDestination {
        address,
        locking_script,
        nonce: "",
    };
    let asset = builder.set_reissue_asset(
        &outpoint,
        amount,
        &decode_reversed_hex32("blinding nonce", blinding_nonce)?,
        &decode_reversed_hex32("entropy", entropy)?,
        &destination,
    )?;
    Ok(ReissueResult {
        asset: asset.to_string(),
        tx_hex: builder.to_hex()?,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn set_issue_asset(
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
    let mut builder = TransactionBuilder::from_hex(tx_hex)?;
    let outpoint = OutPoint::from_hex_txid(txid, vout)?;
    let contract_hash = if contract_hash.is_empty() {
        [0u8; 32]
    } else {
        decode_reversed_hex32("contract hash", contract_hash)?
    };
    let (asset, token, entropy) = builder.set_issue_asset(
        &outpoint,
        &contract_hash,
        asset_amount,
        &OutputDestination::address(asset_address),
        token_amount,
        &OutputDestination::address(token_address),
        is_blind,
    )?;
    Ok(IssueResult {
        asset: asset.to_string(),
        token: token.to_string(),
        entropy: encode_reversed_hex(&entropy),
        tx_hex: builder.to_hex()?,
    })
}

pub fn get_tx_in_count(tx_hex: &str) -> Result<usize> {
    Ok(Transaction::from_hex(tx_hex)?.input.len())
}

pub fn get_tx_out_count(tx_hex: &str) -> Result<usize> {
    Ok(Transaction::from_hex(tx_hex)?.output.len())
}

pub fn get_tx_in(tx_hex: &str, index: usize) -> Result<TxInInfo> {
    let tx = Transaction::from_hex(tx_hex)?;
    let txin = tx.input_at(index)?;
    Ok(TxInInfo {
        txid: txin.previous_output.txid_hex(),
        vout: txin.previous_output.vout,
        sequence: txin.sequence,
        script_sig: txin.script_sig.to_hex(),
    })
}

pub fn get_tx_in_issuance_info(tx_hex: &str, index: usize) -> Result<IssuanceInfo> {
    let tx = Transaction::from_hex(tx_hex)?;
    let txin = tx.input_at(index)?;
    let issuance = txin
        .asset_issuance
        .as_ref()
        .ok_or_else(|| CtError::invalid_argument(format!("Input {} has no issuance", index)))?;
    Ok(IssuanceInfo {
        entropy: encode_reversed_hex(&issuance.asset_entropy),
        nonce: encode_reversed_hex(&issuance.asset_blinding_nonce),
        asset_value: issuance.amount.to_hex(),
        token_value: issuance.inflation_keys.to_hex(),
        asset_rangeproof: hex::encode(&txin.witness.amount_rangeproof),
        token_rangeproof: hex::encode(&txin.witness.inflation_keys_rangeproof),
    })
}

pub fn get_tx_out(tx_hex: &str, index: usize) -> Result<TxOutInfo> {
    let tx = Transaction::from_hex(tx_hex)?;
    let txout = tx.output_at(index)?;
    let asset = match &txout.asset {
        ConfidentialAsset::Null => String::new(),
        ConfidentialAsset::Explicit(id) => id.to_string(),
        ConfidentialAsset::Confidential(c) => hex::encode(c),
    };
    let amount = match txout.value.explicit() {
        Some(v) => i64::try_from(v)
            .map_err(|_| CtError::malformed(format!("Output amount {} out of range", v)))?,
        None => 0,
    };
    Ok(TxOutInfo {
        asset,
        amount,
        value_commitment: txout.value.to_hex(),
        nonce: txout.nonce.to_hex(),
        locking_script: txout.script_pubkey.to_hex(),
        surjection_proof: hex::encode(&txout.witness.surjection_proof),
        rangeproof: hex::encode(&txout.witness.rangeproof),
    })
}

pub fn get_txid(tx_hex: &str) -> Result<String> {
    Transaction::from_hex(tx_hex)?.txid_hex()
}

pub fn get_wtxid(tx_hex: &str) -> Result<String> {
    Transaction::from_hex(tx_hex)?.wtxid_hex()
}
