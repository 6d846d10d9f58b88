//! Consensus-critical serialization and deserialization.

use crate::error::{CtError, Result};
use std::io::{Read, Write};

/// Upper bound for a single length-prefixed field. Anything larger is a
/// corrupt length, not a real transaction.
pub const MAX_VEC_SIZE: u64 = 4_000_000;

pub trait Encodable {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize>;

    fn consensus_encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.consensus_encode(&mut buf)?;
        Ok(buf)
    }
}

pub trait Decodable: Sized {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self>;

    /// Decode a value that must consume the whole slice.
    fn consensus_decode_from_slice(data: &[u8]) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(data);
        let value = Self::consensus_decode(&mut cursor)?;
        if cursor.position() as usize != data.len() {
            return Err(CtError::malformed(format!(
                "{} trailing bytes after data",
                data.len() - cursor.position() as usize
            )));
        }
        Ok(value)
    }
}

pub(crate) fn write_all<W: Write>(writer: &mut W, data: &[u8]) -> Result<usize> {
    writer.write_all(data)?;
    Ok(data.len())
}

/// `read_exact` where running out of input is a malformed encoding.
pub(crate) fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => CtError::malformed("unexpected end of data"),
        _ => CtError::Io(e),
    })
}

pub(crate) fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    read_exact(reader, &mut buf)?;
    Ok(buf)
}

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    Ok(read_array::<R, 1>(reader)?[0])
}

// Helper for writing a variable-length integer (CompactSize).
pub fn write_varint<W: Write>(writer: &mut W, n: u64) -> Result<usize> {
    if n < 0xfd {
        write_all(writer, &[n as u8])
    } else if n <= 0xffff {
        Ok(write_all(writer, &[0xfd])? + write_all(writer, &(n as u16).to_le_bytes())?)
    } else if n <= 0xffffffff {
        Ok(write_all(writer, &[0xfe])? + write_all(writer, &(n as u32).to_le_bytes())?)
    } else {
        Ok(write_all(writer, &[0xff])? + write_all(writer, &n.to_le_bytes())?)
    }
}

// Helper for reading a variable-length integer (CompactSize). Non-minimal
// encodings are rejected so that every value has one serialization.
pub fn read_varint<R: Read>(reader: &mut R) -> Result<u64> {
    let n = match read_u8(reader)? {
        0xfd => {
            let n = u16::from_le_bytes(read_array(reader)?) as u64;
            if n < 0xfd {
                return Err(CtError::malformed("non-minimal varint"));
            }
            n
        }
        0xfe => {
            let n = u32::from_le_bytes(read_array(reader)?) as u64;
            if n <= 0xffff {
                return Err(CtError::malformed("non-minimal varint"));
            }
            n
        }
        0xff => {
            let n = u64::from_le_bytes(read_array(reader)?);
            if n <= 0xffffffff {
                return Err(CtError::malformed("non-minimal varint"));
            }
            n
        }
        n => n as u64,
    };
    Ok(n)
}

/// Length prefix followed by the raw bytes.
pub fn write_var_bytes<W: Write>(writer: &mut W, data: &[u8]) -> Result<usize> {
    Ok(write_varint(writer, data.len() as u64)? + write_all(writer, data)?)
}

pub fn read_var_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = read_varint(reader)?;
    if len > MAX_VEC_SIZE {
        return Err(CtError::malformed(format!("field length {} too large", len)));
    }
    let mut buf = vec![0u8; len as usize];
    read_exact(reader, &mut buf)?;
    Ok(buf)
}

/// A witness stack: item count, then each item length-prefixed.
pub fn write_stack<W: Write>(writer: &mut W, stack: &[Vec<u8>]) -> Result<usize> {
    let mut written = write_varint(writer, stack.len() as u64)?;
    for item in stack {
        written += write_var_bytes(writer, item)?;
    }
    Ok(written)
}

pub fn read_stack<R: Read>(reader: &mut R) -> Result<Vec<Vec<u8>>> {
    let count = read_varint(reader)?;
    if count > MAX_VEC_SIZE {
        return Err(CtError::malformed(format!("stack size {} too large", count)));
    }
    let mut stack = Vec::new();
    for _ in 0..count {
        stack.push(read_var_bytes(reader)?);
    }
    Ok(stack)
}

/// Encode a list of consensus items with a count prefix.
pub fn write_list<W: Write, T: Encodable>(writer: &mut W, items: &[T]) -> Result<usize> {
    let mut written = write_varint(writer, items.len() as u64)?;
    for item in items {
        written += item.consensus_encode(writer)?;
    }
    Ok(written)
}

pub fn read_list<R: Read, T: Decodable>(reader: &mut R) -> Result<Vec<T>> {
    let count = read_varint(reader)?;
    if count > MAX_VEC_SIZE {
        return Err(CtError::malformed(format!("list size {} too large", count)));
    }
    let mut items = Vec::new();
    for _ in 0..count {
        items.push(T::consensus_decode(reader)?);
    }
    Ok(items)
}

impl Encodable for u8 {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        write_all(writer, &[*self])
    }
}

impl Decodable for u8 {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        read_u8(reader)
    }
}

impl Encodable for u32 {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        write_all(writer, &self.to_le_bytes())
    }
}

impl Decodable for u32 {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(u32::from_le_bytes(read_array(reader)?))
    }
}

impl Encodable for i32 {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        write_all(writer, &self.to_le_bytes())
    }
}

impl Decodable for i32 {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(i32::from_le_bytes(read_array(reader)?))
    }
}

impl Encodable for u64 {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        write_all(writer, &self.to_le_bytes())
    }
}

impl Decodable for u64 {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(u64::from_le_bytes(read_array(reader)?))
    }
}

impl Encodable for [u8; 32] {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        write_all(writer, self)
    }
}

impl Decodable for [u8; 32] {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        read_array(reader)
    }
}
