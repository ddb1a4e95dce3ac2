//! Entry record codec.
//!
//! ```text
//! lenBits (u32 LE) | D | key bytes | D | algorithm (u32 LE) | D | flags (u32 LE)
//! ```
//!
//! `D` is the configured delimiter. The key byte count is `ceil(lenBits / 8)`,
//! so delimiter bytes inside key material are never mistaken for separators.

use zeroize::Zeroizing;

/// One decoded entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Key size in bits
    pub len_bits: u32,
    /// Raw key bytes
    pub bytes: Zeroizing<Vec<u8>>,
    /// Numeric key type id
    pub algorithm: u32,
    /// Key flag bits
    pub flags: u32,
}

/// Why a record failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// Input ended early or had trailing bytes
    Length,
    /// A separator was not where expected
    Delimiter,
    /// Declared key length exceeds the limit
    KeyTooLong,
}

impl Record {
    /// Serialized length for a key of `key_len` bytes.
    pub const fn encoded_len(key_len: usize) -> usize {
        4 + 1 + key_len + 1 + 4 + 1 + 4
    }

    /// Serialize with `delimiter`.
    pub fn encode(&self, delimiter: u8) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(Self::encoded_len(self.bytes.len())));
        out.extend_from_slice(&self.len_bits.to_le_bytes());
        out.push(delimiter);
        out.extend_from_slice(&self.bytes);
        out.push(delimiter);
        out.extend_from_slice(&self.algorithm.to_le_bytes());
        out.push(delimiter);
        out.extend_from_slice(&self.flags.to_le_bytes());
        out
    }

    /// Parse a record produced by [`Record::encode`].
    pub fn decode(data: &[u8], delimiter: u8, max_key_len: usize) -> Result<Self, RecordError> {
        let mut cursor = Cursor { data, pos: 0 };

        let len_bits = cursor.u32()?;
        let key_len = (len_bits as usize).div_ceil(8);
        if key_len > max_key_len {
            return Err(RecordError::KeyTooLong);
        }
        if data.len() != Self::encoded_len(key_len) {
            return Err(RecordError::Length);
        }

        cursor.delimiter(delimiter)?;
        let bytes = Zeroizing::new(cursor.take(key_len)?.to_vec());
        cursor.delimiter(delimiter)?;
        let algorithm = cursor.u32()?;
        cursor.delimiter(delimiter)?;
        let flags = cursor.u32()?;

        Ok(Self { len_bits, bytes, algorithm, flags })
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], RecordError> {
        let end = self.pos.checked_add(n).ok_or(RecordError::Length)?;
        let slice = self.data.get(self.pos..end).ok_or(RecordError::Length)?;
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, RecordError> {
        let mut word = [0u8; 4];
        word.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(word))
    }

    fn delimiter(&mut self, expected: u8) -> Result<(), RecordError> {
        match self.take(1)? {
            [b] if *b == expected => Ok(()),
            _ => Err(RecordError::Delimiter),
        }
    }
}
