//! Script parsing and the standard script templates.

use super::encode::{read_var_bytes, write_var_bytes, Decodable, Encodable};
use super::hash::{hash160, sha256, Hash160, Hash256};
use crate::error::{CtError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

/// Maximum number of keys in a CHECKMULTISIG template we build or parse.
pub const MAX_MULTISIG_KEYS: usize = 16;

/// Script opcodes used by the standard templates
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    OP_0 = 0x00,
    OP_PUSHDATA1 = 0x4c,
    OP_PUSHDATA2 = 0x4d,
    OP_PUSHDATA4 = 0x4e,
    OP_1NEGATE = 0x4f,
    OP_1 = 0x51,
    OP_2 = 0x52,
    OP_3 = 0x53,
    OP_4 = 0x54,
    OP_5 = 0x55,
    OP_6 = 0x56,
    OP_7 = 0x57,
    OP_8 = 0x58,
    OP_9 = 0x59,
    OP_10 = 0x5a,
    OP_11 = 0x5b,
    OP_12 = 0x5c,
    OP_13 = 0x5d,
    OP_14 = 0x5e,
    OP_15 = 0x5f,
    OP_16 = 0x60,
    OP_RETURN = 0x6a,
    OP_DUP = 0x76,
    OP_EQUAL = 0x87,
    OP_EQUALVERIFY = 0x88,
    OP_HASH160 = 0xa9,
    OP_CHECKSIG = 0xac,
    OP_CHECKSIGVERIFY = 0xad,
    OP_CHECKMULTISIG = 0xae,
    OP_CHECKMULTISIGVERIFY = 0xaf,
    OP_INVALIDOPCODE = 0xff,
}

impl From<u8> for Opcode {
    fn from(b: u8) -> Self {
        match b {
            0x00 => Opcode::OP_0,
            0x4c => Opcode::OP_PUSHDATA1,
            0x4d => Opcode::OP_PUSHDATA2,
            0x4e => Opcode::OP_PUSHDATA4,
            0x4f => Opcode::OP_1NEGATE,
            0x51 => Opcode::OP_1,
            0x52 => Opcode::OP_2,
            0x53 => Opcode::OP_3,
            0x54 => Opcode::OP_4,
            0x55 => Opcode::OP_5,
            0x56 => Opcode::OP_6,
            0x57 => Opcode::OP_7,
            0x58 => Opcode::OP_8,
            0x59 => Opcode::OP_9,
            0x5a => Opcode::OP_10,
            0x5b => Opcode::OP_11,
            0x5c => Opcode::OP_12,
            0x5d => Opcode::OP_13,
            0x5e => Opcode::OP_14,
            0x5f => Opcode::OP_15,
            0x60 => Opcode::OP_16,
            0x6a => Opcode::OP_RETURN,
            0x76 => Opcode::OP_DUP,
            0x87 => Opcode::OP_EQUAL,
            0x88 => Opcode::OP_EQUALVERIFY,
            0xa9 => Opcode::OP_HASH160,
            0xac => Opcode::OP_CHECKSIG,
            0xad => Opcode::OP_CHECKSIGVERIFY,
            0xae => Opcode::OP_CHECKMULTISIG,
            0xaf => Opcode::OP_CHECKMULTISIGVERIFY,
            _ => Opcode::OP_INVALIDOPCODE,
        }
    }
}

impl Opcode {
    /// OP_1 .. OP_16 for 1..=16
    pub fn small_int(n: u8) -> Option<Opcode> {
        match n {
            1..=16 => Some(Opcode::from(0x50 + n)),
            _ => None,
        }
    }

    /// Value of OP_1 .. OP_16
    pub fn as_small_int(self) -> Option<u8> {
        let b = self as u8;
        if (0x51..=0x60).contains(&b) {
            Some(b - 0x50)
        } else {
            None
        }
    }
}

/// Script instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Push data onto the stack; OP_0 parses as an empty push
    PushBytes(Vec<u8>),
    /// Execute an opcode
    Op(Opcode),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Script(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Script(hex::decode(s)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the script into instructions
    pub fn instructions(&self) -> Result<Vec<Instruction>> {
        let truncated = || CtError::InvalidScript("Script truncated".to_string());
        let mut instructions = Vec::new();
        let mut i = 0;

        while i < self.0.len() {
            let opcode = self.0[i];
            i += 1;

            let len = match opcode {
                0..=75 => opcode as usize,
                0x4c => {
                    let len = *self.0.get(i).ok_or_else(truncated)? as usize;
                    i += 1;
                    len
                }
                0x4d => {
                    let bytes = self.0.get(i..i + 2).ok_or_else(truncated)?;
                    i += 2;
                    u16::from_le_bytes([bytes[0], bytes[1]]) as usize
                }
                0x4e => {
                    let bytes = self.0.get(i..i + 4).ok_or_else(truncated)?;
                    i += 4;
                    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
                }
                _ => {
                    instructions.push(Instruction::Op(Opcode::from(opcode)));
                    continue;
                }
            };

            let data = self.0.get(i..i + len).ok_or_else(truncated)?;
            instructions.push(Instruction::PushBytes(data.to_vec()));
            i += len;
        }

        Ok(instructions)
    }

    pub fn is_p2pkh(&self) -> bool {
        self.0.len() == 25 &&
        self.0[0] == 0x76 && // OP_DUP
        self.0[1] == 0xa9 && // OP_HASH160
        self.0[2] == 0x14 && // Push 20 bytes
        self.0[23] == 0x88 && // OP_EQUALVERIFY
        self.0[24] == 0xac    // OP_CHECKSIG
    }

    pub fn is_p2sh(&self) -> bool {
        self.0.len() == 23 &&
        self.0[0] == 0xa9 && // OP_HASH160
        self.0[1] == 0x14 && // Push 20 bytes
        self.0[22] == 0x87   // OP_EQUAL
    }

    pub fn is_p2wpkh(&self) -> bool {
        self.0.len() == 22 &&
        self.0[0] == 0x00 && // OP_0
        self.0[1] == 0x14    // Push 20 bytes
    }

    pub fn is_p2wsh(&self) -> bool {
        self.0.len() == 34 &&
        self.0[0] == 0x00 && // OP_0
        self.0[1] == 0x20    // Push 32 bytes
    }

    pub fn is_witness_program(&self) -> bool {
        self.is_p2wpkh() || self.is_p2wsh()
    }

    /// Extract the hash160 from a P2PKH, P2SH or P2WPKH script
    pub fn extract_hash160(&self) -> Option<Hash160> {
        let range = if self.is_p2pkh() {
            3..23
        } else if self.is_p2sh() || self.is_p2wpkh() {
            2..22
        } else {
            return None;
        };
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&self.0[range]);
        Some(hash)
    }

    /// Extract the hash256 from a P2WSH script
    pub fn extract_hash256(&self) -> Option<Hash256> {
        if self.is_p2wsh() {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&self.0[2..34]);
            Some(hash)
        } else {
            None
        }
    }

    /// Validate script size and push limits
    pub fn validate(&self) -> Result<()> {
        if self.0.len() > 10000 {
            return Err(CtError::InvalidScript("Script too large".to_string()));
        }

        for instruction in self.instructions()? {
            if let Instruction::PushBytes(data) = instruction {
                if data.len() > 520 {
                    return Err(CtError::InvalidScript("Push data too large".to_string()));
                }
            }
        }

        Ok(())
    }

    pub fn new_p2pkh(hash160: &Hash160) -> Self {
        let mut script = Vec::with_capacity(25);
        script.push(0x76); // OP_DUP
        script.push(0xa9); // OP_HASH160
        script.push(0x14); // Push 20 bytes
        script.extend_from_slice(hash160);
        script.push(0x88); // OP_EQUALVERIFY
        script.push(0xac); // OP_CHECKSIG
        Script(script)
    }

    pub fn new_p2sh(hash160: &Hash160) -> Self {
        let mut script = Vec::with_capacity(23);
        script.push(0xa9); // OP_HASH160
        script.push(0x14); // Push 20 bytes
        script.extend_from_slice(hash160);
        script.push(0x87); // OP_EQUAL
        Script(script)
    }

    pub fn new_p2wpkh(hash160: &Hash160) -> Self {
        let mut script = Vec::with_capacity(22);
        script.push(0x00); // OP_0
        script.push(0x14); // Push 20 bytes
        script.extend_from_slice(hash160);
        Script(script)
    }

    pub fn new_p2wsh(hash256: &Hash256) -> Self {
        let mut script = Vec::with_capacity(34);
        script.push(0x00); // OP_0
        script.push(0x20); // Push 32 bytes
        script.extend_from_slice(hash256);
        Script(script)
    }

    /// `<pubkey> OP_CHECKSIG`
    pub fn new_p2pk(pubkey: &[u8]) -> Self {
        ScriptBuilder::new()
            .push_slice(pubkey)
            .push_opcode(Opcode::OP_CHECKSIG)
            .into_script()
    }

    /// Script-hash locking script committing to this script
    pub fn to_p2sh(&self) -> Self {
        Script::new_p2sh(&hash160(&self.0))
    }

    /// Version-0 witness-script-hash program committing to this script
    pub fn to_p2wsh(&self) -> Self {
        Script::new_p2wsh(&sha256(&self.0))
    }

    /// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`, keys in the given order.
    pub fn new_multisig(required: usize, pubkeys: &[Vec<u8>]) -> Result<Self> {
        if pubkeys.is_empty() || pubkeys.len() > MAX_MULTISIG_KEYS {
            return Err(CtError::invalid_argument(format!(
                "Multisig key count must be between 1 and {}, got {}",
                MAX_MULTISIG_KEYS,
                pubkeys.len()
            )));
        }
        if required == 0 || required > pubkeys.len() {
            return Err(CtError::invalid_argument(format!(
                "Required signature count {} is out of range for {} keys",
                required,
                pubkeys.len()
            )));
        }

        let mut builder = ScriptBuilder::new().push_int(required as i64);
        for pubkey in pubkeys {
            builder = builder.push_slice(pubkey);
        }
        Ok(builder
            .push_int(pubkeys.len() as i64)
            .push_opcode(Opcode::OP_CHECKMULTISIG)
            .into_script())
    }

    /// Decompose a bare CHECKMULTISIG script into (required, pubkeys).
    pub fn parse_multisig(&self) -> Result<(usize, Vec<Vec<u8>>)> {
        let instructions = self.instructions()?;
        let not_multisig = || CtError::InvalidScript("Not a multisig script".to_string());

        if instructions.len() < 4 {
            return Err(not_multisig());
        }
        let small_int = |ins: &Instruction| match ins {
            Instruction::Op(op) => op.as_small_int().map(usize::from),
            _ => None,
        };

        let required = small_int(&instructions[0]).ok_or_else(not_multisig)?;
        let n = instructions.len();
        if instructions[n - 1] != Instruction::Op(Opcode::OP_CHECKMULTISIG) {
            return Err(not_multisig());
        }
        let total = small_int(&instructions[n - 2]).ok_or_else(not_multisig)?;

        let mut pubkeys = Vec::with_capacity(total);
        for ins in &instructions[1..n - 2] {
            match ins {
                Instruction::PushBytes(data) if data.len() == 33 || data.len() == 65 => {
                    pubkeys.push(data.clone())
                }
                _ => return Err(not_multisig()),
            }
        }

        if pubkeys.len() != total || required > total {
            return Err(CtError::InvalidScript(format!(
                "Multisig script declares {}-of-{} but carries {} keys",
                required,
                total,
                pubkeys.len()
            )));
        }
        Ok((required, pubkeys))
    }

    pub fn is_multisig(&self) -> bool {
        self.parse_multisig().is_ok()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Encodable for Script {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        write_var_bytes(writer, &self.0)
    }
}

impl Decodable for Script {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Script(read_var_bytes(reader)?))
    }
}

/// Incremental script construction with minimal push encodings.
#[derive(Debug, Clone, Default)]
pub struct ScriptBuilder(Vec<u8>);

impl ScriptBuilder {
    pub fn new() -> Self {
        ScriptBuilder(Vec::new())
    }

    pub fn push_opcode(mut self, opcode: Opcode) -> Self {
        self.0.push(opcode as u8);
        self
    }

    /// Push data using the shortest push opcode.
    pub fn push_slice(mut self, data: &[u8]) -> Self {
        match data.len() {
            n if n <= 75 => self.0.push(n as u8),
            n if n <= 0xff => {
                self.0.push(Opcode::OP_PUSHDATA1 as u8);
                self.0.push(n as u8);
            }
            n if n <= 0xffff => {
                self.0.push(Opcode::OP_PUSHDATA2 as u8);
                self.0.extend_from_slice(&(n as u16).to_le_bytes());
            }
            n => {
                self.0.push(Opcode::OP_PUSHDATA4 as u8);
                self.0.extend_from_slice(&(n as u32).to_le_bytes());
            }
        }
        self.0.extend_from_slice(data);
        self
    }

    /// Push a number: OP_0, OP_1NEGATE, OP_1..OP_16, otherwise a minimal
    /// script-number push.
    pub fn push_int(self, n: i64) -> Self {
        match n {
            0 => self.push_opcode(Opcode::OP_0),
            -1 => self.push_opcode(Opcode::OP_1NEGATE),
            1..=16 => self.push_opcode(Opcode::from(0x50 + n as u8)),
            _ => {
                let encoded = encode_script_num(n);
                self.push_slice(&encoded)
            }
        }
    }

    pub fn into_script(self) -> Script {
        Script(self.0)
    }
}

/// Minimal little-endian sign-magnitude encoding of a script number.
pub fn encode_script_num(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let negative = n < 0;
    let mut abs = n.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    if out.last().map_or(false, |b| b & 0x80 != 0) {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        if let Some(last) = out.last_mut() {
            *last |= 0x80;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_parsing() {
        let p2pkh_script = Script::new_p2pkh(&[0x12; 20]);
        let instructions = p2pkh_script.instructions().unwrap();

        assert_eq!(instructions.len(), 5);
        assert_eq!(instructions[0], Instruction::Op(Opcode::OP_DUP));
        assert_eq!(instructions[1], Instruction::Op(Opcode::OP_HASH160));
        assert_eq!(instructions[2], Instruction::PushBytes(vec![0x12; 20]));
        assert_eq!(instructions[3], Instruction::Op(Opcode::OP_EQUALVERIFY));
        assert_eq!(instructions[4], Instruction::Op(Opcode::OP_CHECKSIG));
    }

    #[test]
    fn test_script_patterns() {
        let hash160 = [0x12; 20];
        let hash256 = [0x34; 32];

        let p2pkh = Script::new_p2pkh(&hash160);
        assert!(p2pkh.is_p2pkh());
        assert!(!p2pkh.is_p2sh());
        assert_eq!(p2pkh.extract_hash160(), Some(hash160));

        let p2sh = Script::new_p2sh(&hash160);
        assert!(p2sh.is_p2sh());
        assert_eq!(p2sh.extract_hash160(), Some(hash160));

        let p2wpkh = Script::new_p2wpkh(&hash160);
        assert!(p2wpkh.is_p2wpkh());
        assert!(p2wpkh.is_witness_program());

        let p2wsh = Script::new_p2wsh(&hash256);
        assert!(p2wsh.is_p2wsh());
        assert_eq!(p2wsh.extract_hash256(), Some(hash256));
        assert_eq!(p2wsh.extract_hash160(), None);
    }

    #[test]
    fn test_truncated_script_rejected() {
        let truncated_script = Script(vec![0x4c, 0x10]);
        assert!(matches!(
            truncated_script.instructions().unwrap_err(),
            CtError::InvalidScript(_)
        ));
        assert!(Script(vec![0x4d, 0x01]).validate().is_err());
    }

    #[test]
    fn test_pushdata_encoding() {
        let data = vec![0xab; 80];
        let script = ScriptBuilder::new().push_slice(&data).into_script();
        assert_eq!(&script.0[..2], &[0x4c, 80]);
        assert_eq!(script.instructions().unwrap(), vec![Instruction::PushBytes(data)]);
    }

    #[test]
    fn test_script_num_encoding() {
        assert_eq!(encode_script_num(17), vec![0x11]);
        assert_eq!(encode_script_num(128), vec![0x80, 0x00]);
        assert_eq!(encode_script_num(-1), vec![0x81]);
        assert_eq!(encode_script_num(255), vec![0xff, 0x00]);

        let script = ScriptBuilder::new().push_int(0).push_int(16).push_int(17).into_script();
        assert_eq!(script.to_hex(), "00600111");
    }

    #[test]
    fn test_multisig_build_and_parse() {
        let pk1 =
            hex::decode("02bfd7daa5d113fcbd8c2f374ae58cbb89cbed9570e898f1af5ff989457e2d4d71")
                .unwrap();
        let pk2 =
            hex::decode("02715ed9a5f16153c5216a6751b7d84eba32076f0b607550a58b209077ab7c30ad")
                .unwrap();
        let script = Script::new_multisig(2, &[pk1.clone(), pk2.clone()]).unwrap();
        assert_eq!(
            script.to_hex(),
            "522102bfd7daa5d113fcbd8c2f374ae58cbb89cbed9570e898f1af5ff989457e2d4d712102715ed9a5f16153c5216a6751b7d84eba32076f0b607550a58b209077ab7c30ad52ae"
        );

        let (required, keys) = script.parse_multisig().unwrap();
        assert_eq!(required, 2);
        assert_eq!(keys, vec![pk1, pk2]);
    }

    #[test]
    fn test_multisig_bounds() {
        let pk = vec![0x02; 33];
        assert!(Script::new_multisig(0, &[pk.clone()]).is_err());
        assert!(Script::new_multisig(2, &[pk.clone()]).is_err());
        assert!(Script::new_multisig(1, &vec![pk; 17]).is_err());
        assert!(Script::new_multisig(1, &[]).is_err());
    }

    #[test]
    fn test_non_multisig_rejected() {
        let p2pkh = Script::new_p2pkh(&[0x12; 20]);
        assert!(!p2pkh.is_multisig());
        assert!(matches!(p2pkh.parse_multisig().unwrap_err(), CtError::InvalidScript(_)));
    }

    #[test]
    fn test_script_encode_decode() {
        let original = Script::new_p2pkh(&[0x12; 20]);
        let encoded = original.consensus_encode_to_vec().unwrap();
        let decoded = Script::consensus_decode_from_slice(&encoded).unwrap();
        assert_eq!(original, decoded);
    }
}
