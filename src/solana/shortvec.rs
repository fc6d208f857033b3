//! Compact-u16 length prefixes used throughout the wire format.
//!
//! Seven bits per byte, little-endian, high bit set on every byte except
//! the last. At most three bytes.

use crate::solana::types::{LedgerError, LedgerResult};

pub fn encode_len(len: usize, out: &mut Vec<u8>) -> LedgerResult<()> {
    let mut rem = u16::try_from(len)
        .map_err(|_| LedgerError::Decode(format!("length {} exceeds compact-u16 range", len)))?;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return Ok(());
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Sequential reader over a transaction byte buffer.
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn peek_u8(&self) -> LedgerResult<u8> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.eof("u8"))
    }

    pub fn read_u8(&mut self) -> LedgerResult<u8> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize) -> LedgerResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.eof("byte slice"));
        }
        let bytes: &'a [u8] = self.bytes;
        let slice = &bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> LedgerResult<[u8; N]> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_len(&mut self) -> LedgerResult<usize> {
        let mut value: usize = 0;
        for i in 0..3 {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7f) as usize) << (7 * i);
            if byte & 0x80 == 0 {
                if i > 0 && byte == 0 {
                    return Err(LedgerError::Decode("non-canonical compact-u16".to_string()));
                }
                if value > u16::MAX as usize {
                    return Err(LedgerError::Decode("compact-u16 overflow".to_string()));
                }
                return Ok(value);
            }
        }
        Err(LedgerError::Decode("compact-u16 longer than 3 bytes".to_string()))
    }

    fn eof(&self, what: &str) -> LedgerError {
        LedgerError::Decode(format!("unexpected end of data reading {} at offset {}", what, self.pos))
    }
}
