//! Blech32: the bech32 variant used by Elements confidential segwit
//! addresses. Same alphabet and data layout as bech32, with a 60-bit
//! checksum (12 characters) computed over a wider generator.

use crate::error::{CtError, Result};

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_LENGTH: usize = 12;
const GENERATOR: [u64; 5] = [
    0x7d52fba40bd886,
    0x5e8dbf1a03950c,
    0x1c3a3c74072a18,
    0x385d72fa0e5139,
    0x7093e5a608865b,
];
const BLECH32_CONST: u64 = 1;
const BLECH32M_CONST: u64 = 0x455972a3350f7a1;

/// Checksum flavour, mirroring bech32/bech32m.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Witness version 0
    Blech32,
    /// Witness version 1 and above
    Blech32m,
}

impl Variant {
    fn constant(self) -> u64 {
        match self {
            Variant::Blech32 => BLECH32_CONST,
            Variant::Blech32m => BLECH32M_CONST,
        }
    }

    fn from_remainder(rem: u64) -> Option<Variant> {
        match rem {
            BLECH32_CONST => Some(Variant::Blech32),
            BLECH32M_CONST => Some(Variant::Blech32m),
            _ => None,
        }
    }
}

fn polymod(values: &[u8]) -> u64 {
    let mut chk: u64 = 1;
    for v in values {
        let top = chk >> 55;
        chk = ((chk & 0x7fffffffffffff) << 5) ^ u64::from(*v);
        for (i, g) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2 + 1);
    out.extend(bytes.iter().map(|b| b >> 5));
    out.push(0);
    out.extend(bytes.iter().map(|b| b & 0x1f));
    out
}

fn create_checksum(hrp: &str, data: &[u8], variant: Variant) -> [u8; CHECKSUM_LENGTH] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LENGTH]);
    let pm = polymod(&values) ^ variant.constant();
    let mut checksum = [0u8; CHECKSUM_LENGTH];
    for (i, c) in checksum.iter_mut().enumerate() {
        *c = ((pm >> (5 * (CHECKSUM_LENGTH - 1 - i))) & 0x1f) as u8;
    }
    checksum
}

/// Regroup bits, as in BIP173's convertbits.
pub fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let maxv: u32 = (1 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for value in data {
        let v = u32::from(*value);
        if v >> from != 0 {
            return Err(CtError::invalid_argument("Invalid data for bit conversion"));
        }
        acc = (acc << from) | v;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & maxv) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & maxv) != 0 {
        return Err(CtError::invalid_argument("Invalid padding in bit conversion"));
    }
    Ok(out)
}

/// Encode 5-bit `data` under `hrp`.
pub fn encode(hrp: &str, data: &[u8], variant: Variant) -> Result<String> {
    if data.iter().any(|d| *d > 31) {
        return Err(CtError::invalid_argument("Blech32 data values must be 5-bit"));
    }
    let hrp = hrp.to_lowercase();
    let checksum = create_checksum(&hrp, data, variant);
    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LENGTH);
    out.push_str(&hrp);
    out.push('1');
    for d in data.iter().chain(checksum.iter()) {
        out.push(CHARSET[*d as usize] as char);
    }
    Ok(out)
}

/// Decode into (hrp, 5-bit data without checksum, checksum variant).
pub fn decode(s: &str) -> Result<(String, Vec<u8>, Variant)> {
    let invalid = |msg: &str| CtError::invalid_argument(format!("Invalid blech32 string: {}", msg));

    if s.chars().any(|c| c.is_ascii_lowercase()) && s.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("mixed case"));
    }
    let lower = s.to_lowercase();
    let sep = lower.rfind('1').ok_or_else(|| invalid("missing separator"))?;
    if sep == 0 || sep + CHECKSUM_LENGTH + 1 > lower.len() {
        return Err(invalid("bad separator position"));
    }

    let hrp = &lower[..sep];
    let data = lower[sep + 1..]
        .bytes()
        .map(|b| {
            CHARSET
                .iter()
                .position(|c| *c == b)
                .map(|p| p as u8)
                .ok_or_else(|| invalid("invalid character"))
        })
        .collect::<Result<Vec<u8>>>()?;

    let mut values = hrp_expand(hrp);
    values.extend_from_slice(&data);
    let variant =
        Variant::from_remainder(polymod(&values)).ok_or_else(|| invalid("checksum mismatch"))?;

    Ok((hrp.to_string(), data[..data.len() - CHECKSUM_LENGTH].to_vec(), variant))
}
