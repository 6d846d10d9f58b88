//! Bitcoin hashing utilities.

use crate::error::{CtError, Result};
use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub type Hash160 = [u8; 20];
pub type Hash256 = [u8; 32];

/// A standard Hash160 is RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha256_hash = Sha256::digest(data);
    let mut ripemd160 = Ripemd160::new();
    ripemd160.update(sha256_hash);
    ripemd160.finalize().into()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// A standard Double-SHA256 is SHA256(SHA256(data)).
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|_| CtError::invalid_argument("Invalid HMAC key"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// SHA256 compression of a single 64-byte block from the standard initial
/// state, without padding. Elements derives asset ids and entropy this way.
pub fn sha256_midstate(block: &[u8; 64]) -> [u8; 32] {
    let mut state: [u32; 8] = [
        0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab,
        0x5be0cd19,
    ];
    let block = sha2::digest::generic_array::GenericArray::clone_from_slice(block);
    sha2::compress256(&mut state, &[block]);

    let mut out = [0u8; 32];
    for (chunk, word) in out.chunks_exact_mut(4).zip(state.iter()) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    out
}
