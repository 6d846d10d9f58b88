//! Accumulate-then-finalize blinding of a transaction.
//!
//! A [`BlindContext`] is bound to one transaction. Callers register the
//! opening of every spent output and the blinding pubkey of every output to
//! hide, then call [`BlindContext::finalize`] once. The last registered
//! output absorbs the value blinding factor that makes the commitments
//! balance.

use crate::confidential::{issuance_ids, ConfidentialEngine, TxOutSecrets};
use crate::error::{CtError, Result};
use crate::primitives::liquid::{AssetId, BlindingFactor, ConfidentialAsset, ConfidentialValue};
use crate::primitives::transaction::{OutPoint, Transaction};
use crate::utils::logging::DebugTracer;
use log::{debug, info};
use secp256k1_zkp::{Generator, PublicKey, SecretKey, Tag, Tweak, ZERO_TWEAK};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlindState {
    Created,
    Accumulating,
    Finalized,
}

/// Opening of a spent output plus optional issuance blinding keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBlindingData {
    pub asset: AssetId,
    pub asset_blinding_factor: BlindingFactor,
    pub value_blinding_factor: BlindingFactor,
    pub amount: u64,
    pub issuance_asset_key: Option<SecretKey>,
    pub issuance_token_key: Option<SecretKey>,
}

impl InputBlindingData {
    fn secrets(&self) -> TxOutSecrets {
        TxOutSecrets::new(
            self.asset,
            self.asset_blinding_factor,
            self.amount,
            self.value_blinding_factor,
        )
    }
}

pub struct BlindContext {
    tx: Transaction,
    state: BlindState,
    inputs: HashMap<usize, InputBlindingData>,
    /// Output index and receiver pubkey, in registration order
    outputs: Vec<(usize, PublicKey)>,
    engine: ConfidentialEngine,
}

impl BlindContext {
    pub fn new(tx: Transaction) -> Self {
        BlindContext {
            tx,
            state: BlindState::Created,
            inputs: HashMap::new(),
            outputs: Vec::new(),
            engine: ConfidentialEngine::new(),
        }
    }

    pub fn from_hex(tx_hex: &str) -> Result<Self> {
        Ok(BlindContext::new(Transaction::from_hex(tx_hex)?))
    }

    pub fn state(&self) -> BlindState {
        self.state
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == BlindState::Finalized {
            return Err(CtError::HandleAlreadyFreed(
                "Blind context has already been finalized".to_string(),
            ));
        }
        Ok(())
    }

    /// Register the opening of the output spent by `outpoint`.
    pub fn add_input_blinding_data(
        &mut self,
        outpoint: &OutPoint,
        data: InputBlindingData,
    ) -> Result<()> {
        self.ensure_open()?;
        let index = self.tx.find_input(outpoint).ok_or_else(|| {
            CtError::invalid_argument(format!(
                "Input {}:{} is not part of the transaction",
                outpoint.txid_hex(),
                outpoint.vout
            ))
        })?;
        if self.inputs.contains_key(&index) {
            return Err(CtError::DuplicateEntry(format!(
                "Blinding data for input {}:{} is already registered",
                outpoint.txid_hex(),
                outpoint.vout
            )));
        }
        let txin = &self.tx.input[index];
        if !txin.has_issuance()
            && (data.issuance_asset_key.is_some() || data.issuance_token_key.is_some())
        {
            return Err(CtError::invalid_argument(format!(
                "Input {} has no issuance to blind",
                index
            )));
        }

        debug!("blind: registered input {} ({})", index, data.asset);
        self.inputs.insert(index, data);
        self.state = BlindState::Accumulating;
        Ok(())
    }

    /// Register the receiver pubkey of output `index`.
    pub fn add_output_blinding_key(&mut self, index: usize, pubkey: PublicKey) -> Result<()> {
        self.ensure_open()?;
        let txout = self.tx.output_at(index)?;
        if self.outputs.iter().any(|(i, _)| *i == index) {
            return Err(CtError::DuplicateEntry(format!(
                "Blinding key for output {} is already registered",
                index
            )));
        }
        if txout.is_fee() || !txout.is_fully_explicit() {
            return Err(CtError::invalid_argument(format!(
                "Output {} is not an explicit, non-fee output",
                index
            )));
        }

        debug!("blind: registered output {}", index);
        self.outputs.push((index, pubkey));
        self.state = BlindState::Accumulating;
        Ok(())
    }

    /// Blind the registered outputs (and issuances) of `tx`, which must be
    /// the transaction this context was created for. On failure the context
    /// stays usable; on success it is spent.
    pub fn finalize(&mut self, tx: &Transaction) -> Result<Transaction> {
        self.ensure_open()?;
        if *tx != self.tx {
            return Err(CtError::invalid_argument(
                "Transaction differs from the one the blind context was created for",
            ));
        }
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(CtError::InsufficientBlindingData(format!(
                "{} input(s) and {} output(s) registered, at least one of each is required",
                self.inputs.len(),
                self.outputs.len()
            )));
        }
        if let Some(missing) = (0..self.tx.input.len()).find(|i| !self.inputs.contains_key(i)) {
            return Err(CtError::InsufficientBlindingData(format!(
                "No blinding data for input {}",
                missing
            )));
        }

        let mut tracer = DebugTracer::start("blind_transaction");
        let mut rng = rand::thread_rng();
        let mut blinded = self.tx.clone();

        // Spent amounts and surjection domain, inputs first then issuances.
        let mut input_secrets = Vec::with_capacity(blinded.input.len());
        let mut domain: Vec<(Generator, Tag, Tweak)> = Vec::with_capacity(blinded.input.len());
        for index in 0..blinded.input.len() {
            let data = &self.inputs[&index];
            input_secrets.push(data.secrets());
            domain.push(self.engine.surjection_input(&data.secrets())?);
        }
        tracer.step("collect_inputs");

        for index in 0..blinded.input.len() {
            let data = &self.inputs[&index];
            let txin = &mut blinded.input[index];
            let issuance = match txin.asset_issuance.clone() {
                Some(issuance) => issuance,
                None => continue,
            };

            let blind_amount = data.issuance_asset_key.is_some() && issuance.amount.is_explicit();
            let ids = issuance_ids(txin, blind_amount || issuance.amount.is_confidential())?;

            let mut sides = vec![(
                ids.asset,
                issuance.amount,
                data.issuance_asset_key,
                true,
            )];
            if let Some(token) = ids.token {
                sides.push((token, issuance.inflation_keys, data.issuance_token_key, false));
            }

            for (asset, value, key, is_amount) in sides {
                let amount = match value {
                    ConfidentialValue::Null => continue,
                    ConfidentialValue::Explicit(v) => v,
                    ConfidentialValue::Confidential(_) => {
                        return Err(CtError::BlindingFailed(format!(
                            "Issuance on input {} is already blinded",
                            index
                        )))
                    }
                };
                let generator = self.engine.unblinded_generator(&asset);
                domain.push((generator, Tag::from(*asset.as_bytes()), ZERO_TWEAK));

                let key = match key {
                    Some(key) => key,
                    None => {
                        input_secrets.push(TxOutSecrets::explicit(asset, amount));
                        continue;
                    }
                };
                let vbf = self.engine.random_blinding_factor(&mut rng);
                let result = self.engine.blind_issuance_amount(&asset, amount, &vbf, &key)?;
                input_secrets.push(TxOutSecrets::new(
                    asset,
                    BlindingFactor::zero(),
                    amount,
                    vbf,
                ));

                let issuance_mut = txin
                    .asset_issuance
                    .as_mut()
                    .ok_or_else(|| CtError::BlindingFailed("Issuance vanished".to_string()))?;
                if is_amount {
                    issuance_mut.amount = result.value;
                    txin.witness.amount_rangeproof = result.rangeproof;
                } else {
                    issuance_mut.inflation_keys = result.value;
                    txin.witness.inflation_keys_rangeproof = result.rangeproof;
                }
                debug!("blind: blinded issuance of {} on input {}", asset, index);
            }
        }
        tracer.step("blind_issuances");

        self.check_conservation(&blinded, &input_secrets)?;
        tracer.step("check_conservation");

        // Every registered output gets a random abf; all but the last get a
        // random vbf and the last one solves the balance.
        let mut output_secrets = Vec::with_capacity(self.outputs.len());
        for (position, (index, _)) in self.outputs.iter().enumerate() {
            let txout = &blinded.output[*index];
            let (asset, value) = match (&txout.asset, &txout.value) {
                (ConfidentialAsset::Explicit(a), ConfidentialValue::Explicit(v)) => (*a, *v),
                _ => {
                    return Err(CtError::BlindingFailed(format!(
                        "Output {} is no longer explicit",
                        index
                    )))
                }
            };
            let abf = self.engine.random_blinding_factor(&mut rng);
            let vbf = if position + 1 == self.outputs.len() {
                self.engine
                    .solve_value_blinding_factor(value, &abf, &input_secrets, &output_secrets)?
            } else {
                self.engine.random_blinding_factor(&mut rng)
            };
            output_secrets.push(TxOutSecrets::new(asset, abf, value, vbf));
        }

        for ((index, pubkey), secrets) in self.outputs.iter().zip(&output_secrets) {
            let txout = &mut blinded.output[*index];
            self.engine
                .blind_output(&mut rng, txout, secrets, pubkey, &domain)?;
        }
        tracer.step_with_message(
            "blind_outputs",
            Some(format!("{} output(s)", output_secrets.len())),
        );

        self.state = BlindState::Finalized;
        self.inputs.clear();
        self.outputs.clear();
        tracer.finish();
        info!(
            "blinded {} output(s) of a {}-input transaction",
            output_secrets.len(),
            blinded.input.len()
        );
        Ok(blinded)
    }

    /// Per asset, spent plus issued amounts must equal the output amounts.
    /// Fails if any output is already confidential, since its amount is unknown.
    fn check_conservation(&self, tx: &Transaction, inputs: &[TxOutSecrets]) -> Result<()> {
        let overflow = || CtError::BlindingFailed("Amount total overflows".to_string());
        let mut balance: HashMap<AssetId, i128> = HashMap::new();

        for secrets in inputs {
            let entry = balance.entry(secrets.asset).or_insert(0);
            *entry = entry
                .checked_add(i128::from(secrets.value))
                .ok_or_else(overflow)?;
        }
        for (index, txout) in tx.output.iter().enumerate() {
            match (&txout.asset, &txout.value) {
                (ConfidentialAsset::Explicit(asset), ConfidentialValue::Explicit(value)) => {
                    let entry = balance.entry(*asset).or_insert(0);
                    *entry = entry
                        .checked_sub(i128::from(*value))
                        .ok_or_else(overflow)?;
                }
                (ConfidentialAsset::Null, ConfidentialValue::Null) => {}
                _ => {
                    return Err(CtError::BlindingFailed(format!(
                        "Output {} is already confidential and cannot be balanced",
                        index
                    )))
                }
            }
        }

        let total_in = inputs
            .iter()
            .try_fold(0u64, |acc, s| acc.checked_add(s.value))
            .ok_or_else(overflow)?;
        if total_in > i64::MAX as u64 {
            return Err(overflow());
        }

        match balance.iter().find(|(_, v)| **v != 0) {
            Some((asset, diff)) => Err(CtError::BlindingFailed(format!(
                "Amounts of asset {} do not balance (difference {})",
                asset, diff
            ))),
            None => Ok(()),
        }
    }
}
