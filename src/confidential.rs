//! Pedersen commitments, range proofs and surjection proofs for outputs and
//! issuances, plus the matching unblinding routines.
//!
//! Blinding factors are carried as [`BlindingFactor`] (internal byte order)
//! and converted to `secp256k1_zkp::Tweak` at the edges.

use crate::error::{CtError, Result};
use crate::primitives::hash::{hmac_sha256, sha256};
use crate::primitives::liquid::{
    generate_asset_entropy, AssetId, BlindingFactor, ConfidentialAsset, ConfidentialNonce,
    ConfidentialValue,
};
use crate::primitives::script::{Opcode, ScriptBuilder};
use crate::primitives::transaction::{OutPoint, Transaction, TxIn, TxOut};
use log::{debug, warn};
use rand::{CryptoRng, RngCore};
use secp256k1_zkp::ecdh::SharedSecret;
use secp256k1_zkp::{
    compute_adaptive_blinding_factor, verify_commitments_sum_to_equal, All, CommitmentSecrets, Generator,
    PedersenCommitment, PublicKey, RangeProof, Secp256k1, SecretKey, SurjectionProof, Tag, Tweak,
    ZERO_TWEAK,
};

/// Minimum value proven by output range proofs.
pub const RANGEPROOF_MIN_VALUE: u64 = 1;
/// Base-10 exponent of output range proofs.
pub const RANGEPROOF_EXP: i32 = 0;
/// Minimum number of private bits in output range proofs.
pub const RANGEPROOF_MIN_BITS: u8 = 52;

/// The opening of one confidential amount: what the commitments hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutSecrets {
    pub asset: AssetId,
    pub asset_blinding_factor: BlindingFactor,
    pub value: u64,
    pub value_blinding_factor: BlindingFactor,
}

impl TxOutSecrets {
    pub fn new(
        asset: AssetId,
        asset_blinding_factor: BlindingFactor,
        value: u64,
        value_blinding_factor: BlindingFactor,
    ) -> Self {
        TxOutSecrets {
            asset,
            asset_blinding_factor,
            value,
            value_blinding_factor,
        }
    }

    /// Secrets of an explicit amount.
    pub fn explicit(asset: AssetId, value: u64) -> Self {
        TxOutSecrets::new(asset, BlindingFactor::zero(), value, BlindingFactor::zero())
    }
}

/// Issued asset and token ids of an input's issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceIds {
    pub entropy: [u8; 32],
    pub asset: AssetId,
    /// None for reissuances, which never mint tokens
    pub token: Option<AssetId>,
}

/// Unblinded asset and token amounts of an issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IssuanceSecrets {
    pub asset: Option<TxOutSecrets>,
    pub token: Option<TxOutSecrets>,
}

/// A blinded amount together with its range proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindedValue {
    pub value: ConfidentialValue,
    pub rangeproof: Vec<u8>,
}

/// Key for blinding an input's issuance amounts:
/// HMAC-SHA256(master, `OP_RETURN <txid> <vout>`).
pub fn derive_issuance_blinding_key(
    master_blinding_key: &[u8; 32],
    outpoint: &OutPoint,
) -> Result<SecretKey> {
    let script = ScriptBuilder::new()
        .push_opcode(Opcode::OP_RETURN)
        .push_slice(&outpoint.txid)
        .push_int(i64::from(outpoint.vout))
        .into_script();
    let key = hmac_sha256(master_blinding_key, script.as_bytes())?;
    Ok(SecretKey::from_slice(&key)?)
}

/// Asset (and token) ids minted by the issuance on `txin`.
///
/// `token_confidential` selects the token id variant; it must reflect
/// whether the issuance amount is (or will be) blinded.
pub fn issuance_ids(txin: &TxIn, token_confidential: bool) -> Result<IssuanceIds> {
    let issuance = txin
        .asset_issuance
        .as_ref()
        .ok_or_else(|| CtError::invalid_argument("Input has no issuance"))?;

    if issuance.is_reissuance() {
        let entropy = issuance.asset_entropy;
        Ok(IssuanceIds {
            entropy,
            asset: AssetId::from_entropy(&entropy),
            token: None,
        })
    } else {
        let entropy = generate_asset_entropy(&txin.previous_output, &issuance.asset_entropy);
        Ok(IssuanceIds {
            entropy,
            asset: AssetId::from_entropy(&entropy),
            token: Some(AssetId::reissuance_token_from_entropy(
                &entropy,
                token_confidential,
            )),
        })
    }
}

pub(crate) fn to_tweak(factor: &BlindingFactor) -> Result<Tweak> {
    if factor.is_zero() {
        return Ok(ZERO_TWEAK);
    }
    Tweak::from_slice(factor.as_bytes())
        .map_err(|e| CtError::invalid_argument(format!("Invalid blinding factor: {}", e)))
}

pub(crate) fn from_tweak(tweak: &Tweak) -> BlindingFactor {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(tweak.as_ref());
    BlindingFactor(bytes)
}

fn asset_tag(asset: &AssetId) -> Tag {
    Tag::from(*asset.as_bytes())
}

fn rangeproof_message(asset: &AssetId, abf: &BlindingFactor) -> [u8; 64] {
    let mut message = [0u8; 64];
    message[..32].copy_from_slice(asset.as_bytes());
    message[32..].copy_from_slice(abf.as_bytes());
    message
}

/// Rewind nonce shared between the ephemeral key and the receiver's key.
fn shared_nonce(pubkey: &PublicKey, secret: &SecretKey) -> Result<SecretKey> {
    let shared = SharedSecret::new(pubkey, secret);
    Ok(SecretKey::from_slice(&sha256(&shared.secret_bytes()))?)
}

/// Commitment and proof machinery bound to one secp256k1-zkp context.
pub struct ConfidentialEngine {
    secp: Secp256k1<All>,
}

impl Default for ConfidentialEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfidentialEngine {
    pub fn new() -> Self {
        ConfidentialEngine {
            secp: Secp256k1::new(),
        }
    }

    /// Surjection domain entry of a spent amount.
    pub fn surjection_input(&self, secrets: &TxOutSecrets) -> Result<(Generator, Tag, Tweak)> {
        let tag = asset_tag(&secrets.asset);
        let abf = to_tweak(&secrets.asset_blinding_factor)?;
        Ok((Generator::new_blinded(&self.secp, tag, abf), tag, abf))
    }

    /// Asset generator and value commitment for `secrets`.
    pub fn commit(&self, secrets: &TxOutSecrets) -> Result<(Generator, PedersenCommitment)> {
        let generator = Generator::new_blinded(
            &self.secp,
            asset_tag(&secrets.asset),
            to_tweak(&secrets.asset_blinding_factor)?,
        );
        let commitment = PedersenCommitment::new(
            &self.secp,
            secrets.value,
            to_tweak(&secrets.value_blinding_factor)?,
            generator,
        );
        Ok((generator, commitment))
    }

    /// Value blinding factor that balances `inputs` against `outputs` plus
    /// a final output of `value` blinded with `abf`.
    pub fn solve_value_blinding_factor(
        &self,
        value: u64,
        abf: &BlindingFactor,
        inputs: &[TxOutSecrets],
        outputs: &[TxOutSecrets],
    ) -> Result<BlindingFactor> {
        let convert = |list: &[TxOutSecrets]| {
            list.iter()
                .map(|s| {
                    Ok(CommitmentSecrets::new(
                        s.value,
                        to_tweak(&s.value_blinding_factor)?,
                        to_tweak(&s.asset_blinding_factor)?,
                    ))
                })
                .collect::<Result<Vec<CommitmentSecrets>>>()
        };
        let vbf = compute_adaptive_blinding_factor(
            &self.secp,
            value,
            to_tweak(abf)?,
            &convert(inputs)?,
            &convert(outputs)?,
        );
        Ok(from_tweak(&vbf))
    }

    /// Replace an explicit output with its confidential form.
    ///
    /// Commits to `secrets`, proves the range with a nonce shared with
    /// `receiver`, proves the asset against `domain`, and stores the
    /// ephemeral pubkey in the nonce field. Returns the ephemeral secret.
    pub fn blind_output<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        txout: &mut TxOut,
        secrets: &TxOutSecrets,
        receiver: &PublicKey,
        domain: &[(Generator, Tag, Tweak)],
    ) -> Result<SecretKey> {
        if secrets.value == 0 {
            return Err(CtError::BlindingFailed(
                "Zero amounts cannot be blinded".to_string(),
            ));
        }
        let failed = |stage: &str, e: secp256k1_zkp::Error| {
            CtError::BlindingFailed(format!("{} creation failed: {}", stage, e))
        };

        let (generator, commitment) = self.commit(secrets)?;
        let ephemeral = SecretKey::new(rng);
        let nonce = shared_nonce(receiver, &ephemeral)?;

        let rangeproof = RangeProof::new(
            &self.secp,
            RANGEPROOF_MIN_VALUE,
            commitment,
            secrets.value,
            to_tweak(&secrets.value_blinding_factor)?,
            &rangeproof_message(&secrets.asset, &secrets.asset_blinding_factor),
            txout.script_pubkey.as_bytes(),
            nonce,
            RANGEPROOF_EXP,
            RANGEPROOF_MIN_BITS,
            generator,
        )
        .map_err(|e| failed("Range proof", e))?;

        let surjection_proof = SurjectionProof::new(
            &self.secp,
            rng,
            asset_tag(&secrets.asset),
            to_tweak(&secrets.asset_blinding_factor)?,
            domain,
        )
        .map_err(|e| failed("Surjection proof", e))?;

        let ephemeral_pubkey = PublicKey::from_secret_key(&self.secp, &ephemeral);
        txout.asset = ConfidentialAsset::Confidential(generator.serialize());
        txout.value = ConfidentialValue::Confidential(commitment.serialize());
        txout.nonce = ConfidentialNonce::Confidential(ephemeral_pubkey.serialize());
        txout.witness.rangeproof = rangeproof.serialize();
        txout.witness.surjection_proof = surjection_proof.serialize();
        Ok(ephemeral)
    }

    /// Blind one issuance amount. The generator is the unblinded one of
    /// `asset`, and the range proof nonce is the issuance blinding key.
    pub fn blind_issuance_amount(
        &self,
        asset: &AssetId,
        value: u64,
        vbf: &BlindingFactor,
        issuance_key: &SecretKey,
    ) -> Result<BlindedValue> {
        if value == 0 {
            return Err(CtError::BlindingFailed(
                "Zero issuance amounts cannot be blinded".to_string(),
            ));
        }
        let generator = Generator::new_unblinded(&self.secp, asset_tag(asset));
        let commitment = PedersenCommitment::new(&self.secp, value, to_tweak(vbf)?, generator);
        let rangeproof = RangeProof::new(
            &self.secp,
            RANGEPROOF_MIN_VALUE,
            commitment,
            value,
            to_tweak(vbf)?,
            &rangeproof_message(asset, &BlindingFactor::zero()),
            &[],
            *issuance_key,
            RANGEPROOF_EXP,
            RANGEPROOF_MIN_BITS,
            generator,
        )
        .map_err(|e| CtError::BlindingFailed(format!("Issuance range proof failed: {}", e)))?;

        Ok(BlindedValue {
            value: ConfidentialValue::Confidential(commitment.serialize()),
            rangeproof: rangeproof.serialize(),
        })
    }

    /// Recover the secrets of an output with the receiver's blinding key.
    /// Explicit outputs open to their values with zero factors.
    pub fn unblind_output(&self, txout: &TxOut, blinding_key: &SecretKey) -> Result<TxOutSecrets> {
        if let (ConfidentialAsset::Explicit(asset), ConfidentialValue::Explicit(value)) =
            (&txout.asset, &txout.value)
        {
            return Ok(TxOutSecrets::explicit(*asset, *value));
        }

        let (generator_bytes, commitment_bytes) = match (&txout.asset, &txout.value) {
            (ConfidentialAsset::Confidential(g), ConfidentialValue::Confidential(c)) => (g, c),
            _ => {
                return Err(CtError::UnblindFailed(
                    "Output is neither explicit nor fully confidential".to_string(),
                ))
            }
        };
        let nonce_pubkey = match &txout.nonce {
            ConfidentialNonce::Confidential(bytes) => PublicKey::from_slice(bytes)
                .map_err(|e| CtError::UnblindFailed(format!("Invalid output nonce: {}", e)))?,
            _ => return Err(CtError::UnblindFailed("Output has no ECDH nonce".to_string())),
        };
        let nonce = shared_nonce(&nonce_pubkey, blinding_key)?;

        self.rewind(
            &txout.witness.rangeproof,
            generator_bytes,
            commitment_bytes,
            &nonce,
            txout.script_pubkey.as_bytes(),
        )
    }

    /// Recover the issued asset and token amounts of input `index`.
    pub fn unblind_issuance(
        &self,
        tx: &Transaction,
        index: usize,
        asset_key: Option<&SecretKey>,
        token_key: Option<&SecretKey>,
    ) -> Result<IssuanceSecrets> {
        let txin = tx.input_at(index)?;
        let issuance = txin
            .asset_issuance
            .as_ref()
            .ok_or_else(|| CtError::invalid_argument(format!("Input {} has no issuance", index)))?;
        let ids = issuance_ids(txin, issuance.amount.is_confidential())?;

        let asset = self.open_issuance_amount(
            &ids.asset,
            &issuance.amount,
            &txin.witness.amount_rangeproof,
            asset_key,
        )?;
        let token = match ids.token {
            Some(token_id) => self.open_issuance_amount(
                &token_id,
                &issuance.inflation_keys,
                &txin.witness.inflation_keys_rangeproof,
                token_key,
            )?,
            None => None,
        };
        Ok(IssuanceSecrets { asset, token })
    }

    fn open_issuance_amount(
        &self,
        asset: &AssetId,
        value: &ConfidentialValue,
        rangeproof: &[u8],
        key: Option<&SecretKey>,
    ) -> Result<Option<TxOutSecrets>> {
        match value {
            ConfidentialValue::Null => Ok(None),
            ConfidentialValue::Explicit(v) => Ok(Some(TxOutSecrets::explicit(*asset, *v))),
            ConfidentialValue::Confidential(commitment) => {
                let key = key.ok_or_else(|| {
                    CtError::UnblindFailed("Issuance blinding key is required".to_string())
                })?;
                let generator = Generator::new_unblinded(&self.secp, asset_tag(asset));
                let secrets =
                    self.rewind(rangeproof, &generator.serialize(), commitment, key, &[])?;
                if secrets.asset != *asset {
                    return Err(CtError::UnblindFailed(
                        "Issuance proof commits to a different asset".to_string(),
                    ));
                }
                Ok(Some(secrets))
            }
        }
    }

    fn rewind(
        &self,
        rangeproof: &[u8],
        generator: &[u8; 33],
        commitment: &[u8; 33],
        nonce: &SecretKey,
        extra_commit: &[u8],
    ) -> Result<TxOutSecrets> {
        let unblind_failed = |what: &str, e: secp256k1_zkp::Error| {
            CtError::UnblindFailed(format!("{}: {}", what, e))
        };
        let generator =
            Generator::from_slice(generator).map_err(|e| unblind_failed("Invalid asset commitment", e))?;
        let commitment = PedersenCommitment::from_slice(commitment)
            .map_err(|e| unblind_failed("Invalid value commitment", e))?;
        let proof =
            RangeProof::from_slice(rangeproof).map_err(|e| unblind_failed("Invalid range proof", e))?;

        let (opening, _range) = proof
            .rewind(&self.secp, commitment, *nonce, extra_commit, generator)
            .map_err(|e| {
                warn!("range proof rewind failed: {}", e);
                unblind_failed("Range proof rewind failed", e)
            })?;

        let message: &[u8] = opening.message.as_ref();
        if message.len() < 64 {
            return Err(CtError::UnblindFailed(
                "Range proof message is too short".to_string(),
            ));
        }
        let mut asset = [0u8; 32];
        asset.copy_from_slice(&message[..32]);
        let mut abf = [0u8; 32];
        abf.copy_from_slice(&message[32..64]);
        let secrets = TxOutSecrets {
            asset: AssetId(asset),
            asset_blinding_factor: BlindingFactor(abf),
            value: opening.value,
            value_blinding_factor: from_tweak(&opening.blinding_factor),
        };

        let expected = Generator::new_blinded(
            &self.secp,
            asset_tag(&secrets.asset),
            to_tweak(&secrets.asset_blinding_factor)?,
        );
        if expected != generator {
            return Err(CtError::UnblindFailed(
                "Recovered asset does not open the asset commitment".to_string(),
            ));
        }
        debug!("unblinded amount {} of asset {}", secrets.value, secrets.asset);
        Ok(secrets)
    }

    /// Check the range and surjection proofs of a confidential output.
    pub fn verify_output_proofs(&self, txout: &TxOut, domain: &[Generator]) -> Result<bool> {
        let (generator, commitment) = match (&txout.asset, &txout.value) {
            (ConfidentialAsset::Confidential(g), ConfidentialValue::Confidential(c)) => (
                Generator::from_slice(g).map_err(|e| CtError::invalid_argument(e.to_string()))?,
                PedersenCommitment::from_slice(c)
                    .map_err(|e| CtError::invalid_argument(e.to_string()))?,
            ),
            _ => return Ok(false),
        };
        let rangeproof = RangeProof::from_slice(&txout.witness.rangeproof)
            .map_err(|e| CtError::invalid_argument(format!("Invalid range proof: {}", e)))?;
        let surjection = SurjectionProof::from_slice(&txout.witness.surjection_proof)
            .map_err(|e| CtError::invalid_argument(format!("Invalid surjection proof: {}", e)))?;

        let range_ok = rangeproof
            .verify(
                &self.secp,
                commitment,
                txout.script_pubkey.as_bytes(),
                generator,
            )
            .is_ok();
        let surjection_ok = surjection.verify(&self.secp, generator, domain);
        Ok(range_ok && surjection_ok)
    }

    /// Whether the value commitments of `tx` balance, given the openings
    /// of the spent outputs in input order.
    pub fn verify_balance(&self, tx: &Transaction, spent: &[TxOutSecrets]) -> Result<bool> {
        if spent.len() != tx.input.len() {
            return Err(CtError::invalid_argument(format!(
                "Expected {} spent outputs, got {}",
                tx.input.len(),
                spent.len()
            )));
        }

        let mut inputs = Vec::with_capacity(spent.len());
        for (txin, secrets) in tx.input.iter().zip(spent) {
            inputs.push(self.commit(secrets)?.1);
            if let Some(issuance) = &txin.asset_issuance {
                let ids = issuance_ids(txin, issuance.amount.is_confidential())?;
                let mut amounts = vec![(ids.asset, &issuance.amount)];
                if let Some(token) = ids.token {
                    amounts.push((token, &issuance.inflation_keys));
                }
                for (asset, value) in amounts {
                    if let Some(c) = self.value_commitment(&asset, value)? {
                        inputs.push(c);
                    }
                }
            }
        }

        let mut outputs = Vec::with_capacity(tx.output.len());
        for txout in &tx.output {
            match (&txout.asset, &txout.value) {
                (ConfidentialAsset::Explicit(asset), value) => {
                    if let Some(c) = self.value_commitment(asset, value)? {
                        outputs.push(c);
                    }
                }
                (_, ConfidentialValue::Confidential(c)) => outputs.push(
                    PedersenCommitment::from_slice(c)
                        .map_err(|e| CtError::invalid_argument(e.to_string()))?,
                ),
                _ => {}
            }
        }

        Ok(verify_commitments_sum_to_equal(&self.secp, &inputs, &outputs))
    }

    fn value_commitment(
        &self,
        asset: &AssetId,
        value: &ConfidentialValue,
    ) -> Result<Option<PedersenCommitment>> {
        match value {
            ConfidentialValue::Null => Ok(None),
            ConfidentialValue::Explicit(v) => {
                let generator = Generator::new_unblinded(&self.secp, asset_tag(asset));
                Ok(Some(PedersenCommitment::new_unblinded(&self.secp, *v, generator)))
            }
            ConfidentialValue::Confidential(c) => Ok(Some(
                PedersenCommitment::from_slice(c)
                    .map_err(|e| CtError::invalid_argument(e.to_string()))?,
            )),
        }
    }

    /// Fresh random blinding factor.
    pub fn random_blinding_factor<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BlindingFactor {
        from_tweak(&Tweak::new(rng))
    }

    /// Unblinded generator of `asset`, as used for explicit amounts and issuances.
    pub fn unblinded_generator(&self, asset: &AssetId) -> Generator {
        Generator::new_unblinded(&self.secp, asset_tag(asset))
    }
}
