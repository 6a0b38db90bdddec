/*!
 * Bit-level packing for the board's wire format.
 *
 * Fields are unaligned unsigned integers of up to 32 bits. Bit `i` of a field
 * written at offset `o` lands in bit `(o + i) % 8` of byte `(o + i) / 8`, so the
 * least significant bit of every byte comes first on the wire.
 */
use crate::error::{Error, Result};

/// Widest field the codec handles
pub const MAX_FIELD_BITS: usize = 32;

/// Number of bytes needed to hold `bits` bits
pub fn bytes_for_bits(bits: usize) -> usize {
    (bits + 7) / 8
}

/// Read `len` bits starting at bit `offset` of `bytes`.
///
/// # Panics
///
/// Panics if `len` is wider than [`MAX_FIELD_BITS`].
pub fn read_bits(bytes: &[u8], offset: usize, len: usize) -> Result<u32> {
    assert!(len <= MAX_FIELD_BITS, "bit field of {} bits is too wide", len);
    if len == 0 {
        return Ok(0);
    }

    let available = bytes.len() * 8;
    if offset + len > available {
        return Err(Error::Codec {
            offset,
            len,
            available,
        });
    }

    let mut value = 0u32;
    for i in (0..len).rev() {
        let location = offset + i;
        value <<= 1;
        if bytes[location / 8] & (1 << (location % 8)) != 0 {
            value |= 1;
        }
    }
    Ok(value)
}

/// A growable buffer of packed bit fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuffer {
    bytes: Vec<u8>,
}

impl BitBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap bytes received from the wire
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Write the low `len` bits of `value` starting at bit `offset`.
    ///
    /// The buffer grows as needed. Bits of `value` above `len` are ignored.
    ///
    /// # Panics
    ///
    /// Panics if `len` is wider than [`MAX_FIELD_BITS`].
    pub fn write(&mut self, offset: usize, len: usize, value: u32) {
        assert!(len <= MAX_FIELD_BITS, "bit field of {} bits is too wide", len);
        if len == 0 {
            return;
        }

        self.grow_to(offset + len);
        for i in 0..len {
            let location = offset + i;
            let mask = 1u8 << (location % 8);
            if value & (1 << i) != 0 {
                self.bytes[location / 8] |= mask;
            } else {
                self.bytes[location / 8] &= !mask;
            }
        }
    }

    /// Zero `len` bits starting at bit `offset`, growing the buffer if needed
    pub fn clear(&mut self, offset: usize, len: usize) {
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(MAX_FIELD_BITS);
            self.write(offset + done, chunk, 0);
            done += chunk;
        }
    }

    /// Read `len` bits starting at bit `offset`
    pub fn read(&self, offset: usize, len: usize) -> Result<u32> {
        read_bits(&self.bytes, offset, len)
    }

    /// Number of bits currently backed by storage
    pub fn capacity_bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// The raw bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy out exactly enough bytes to hold `bit_len` bits, zero padded
    pub fn to_bytes(&self, bit_len: usize) -> Vec<u8> {
        let mut out = self.bytes.clone();
        out.resize(bytes_for_bits(bit_len), 0);
        out
    }

    fn grow_to(&mut self, bit_len: usize) {
        let needed = bytes_for_bits(bit_len);
        if self.bytes.len() < needed {
            self.bytes.resize(needed, 0);
        }
    }
}
