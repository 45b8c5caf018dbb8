//! # Byte Codec
//!
//! Fixed-width primitives appended to and read from a byte buffer in network
//! (big-endian) order. Floats travel as their IEEE-754 bit pattern, so a round
//! trip is bit-for-bit.
//!
//! Reads are lenient: reading past the end consumes whatever is left and
//! yields `0`, `false`, `0.0` or an empty blob. Callers that need strict
//! validation check [`Deserializer::is_exhausted`] or [`Deserializer::remaining`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Default initial capacity for a fresh serializer
const DEFAULT_CAPACITY: usize = 64;

/// Append-only writer for fixed-width primitives
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    data: BytesMut,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(DEFAULT_CAPACITY),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Clears the buffer, keeping its capacity
    pub fn reset(&mut self) {
        self.data.clear();
    }

    pub fn write_bool(&mut self, value: bool) {
        self.data.put_u8(u8::from(value));
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.put_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.put_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.put_i32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.data.put_u64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.data.put_u32(value.to_bits());
    }

    /// Appends raw bytes with no length prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    /// Appends a u32 length prefix followed by the bytes
    pub fn write_blob(&mut self, bytes: &[u8]) {
        self.data.put_u32(bytes.len() as u32);
        self.data.put_slice(bytes);
    }

    /// The bytes written so far
    pub fn serialize(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Takes the written bytes, leaving the serializer empty
    pub fn freeze(&mut self) -> Bytes {
        self.data.split().freeze()
    }
}

/// Cursor over a received buffer
#[derive(Debug, Clone, Default)]
pub struct Deserializer {
    data: Bytes,
}

impl Deserializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a deserializer positioned at the start of `bytes`
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self { data: bytes.into() }
    }

    /// Loads a new buffer and rewinds the cursor
    pub fn receive(&mut self, bytes: impl Into<Bytes>) {
        self.data = bytes.into();
    }

    pub fn reset(&mut self) {
        self.data = Bytes::new();
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    pub fn is_exhausted(&self) -> bool {
        !self.data.has_remaining()
    }

    /// Returns true when `width` bytes are available; otherwise drains the rest.
    #[inline]
    fn take(&mut self, width: usize) -> bool {
        if self.data.remaining() >= width {
            true
        } else {
            self.data.advance(self.data.remaining());
            false
        }
    }

    pub fn read_bool(&mut self) -> bool {
        self.take(1) && self.data.get_u8() == 1
    }

    pub fn read_u8(&mut self) -> u8 {
        if self.take(1) {
            self.data.get_u8()
        } else {
            0
        }
    }

    pub fn read_u16(&mut self) -> u16 {
        if self.take(2) {
            self.data.get_u16()
        } else {
            0
        }
    }

    pub fn read_u32(&mut self) -> u32 {
        if self.take(4) {
            self.data.get_u32()
        } else {
            0
        }
    }

    pub fn read_i32(&mut self) -> i32 {
        if self.take(4) {
            self.data.get_i32()
        } else {
            0
        }
    }

    pub fn read_u64(&mut self) -> u64 {
        if self.take(8) {
            self.data.get_u64()
        } else {
            0
        }
    }

    pub fn read_f32(&mut self) -> f32 {
        if self.take(4) {
            f32::from_bits(self.data.get_u32())
        } else {
            0.0
        }
    }

    /// Reads a blob written by [`Serializer::write_blob`].
    ///
    /// A length prefix larger than what is left yields the available bytes.
    pub fn read_blob(&mut self) -> Bytes {
        let len = self.read_u32() as usize;
        let len = len.min(self.data.remaining());
        self.data.split_to(len)
    }

    /// Takes everything left in the buffer
    pub fn read_rest(&mut self) -> Bytes {
        let len = self.data.remaining();
        self.data.split_to(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_big_endian() {
        let mut ser = Serializer::new();
        ser.write_u16(0x0102);
        ser.write_u32(0x0304_0506);
        ser.write_u64(0x0708_090A_0B0C_0D0E);
        assert_eq!(
            ser.serialize(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
        );
    }

    #[test]
    fn test_float_bits_survive() {
        let values = [0.0f32, -0.0, 1.5, f32::MIN_POSITIVE, f32::MAX, f32::NAN];
        let mut ser = Serializer::new();
        for v in values {
            ser.write_f32(v);
        }
        let mut de = Deserializer::from_bytes(ser.freeze());
        for v in values {
            assert_eq!(de.read_f32().to_bits(), v.to_bits());
        }
        assert!(de.is_exhausted());
    }

    #[test]
    fn test_truncated_reads_default() {
        let mut de = Deserializer::from_bytes(vec![0xAB, 0xCD]);
        assert_eq!(de.read_u32(), 0);
        assert!(de.is_exhausted());
        assert!(!de.read_bool());
        assert_eq!(de.read_u64(), 0);
        assert_eq!(de.read_f32(), 0.0);
        assert!(de.read_blob().is_empty());
    }

    #[test]
    fn test_bool_encoding() {
        let mut ser = Serializer::new();
        ser.write_bool(true);
        ser.write_bool(false);
        assert_eq!(ser.serialize(), &[1, 0]);

        // Only an exact 1 reads back as true
        let mut de = Deserializer::from_bytes(vec![1, 2, 0]);
        assert!(de.read_bool());
        assert!(!de.read_bool());
        assert!(!de.read_bool());
    }

    #[test]
    fn test_blob_length_clamped() {
        let mut ser = Serializer::new();
        ser.write_u32(100);
        ser.write_bytes(&[1, 2, 3]);
        let mut de = Deserializer::from_bytes(ser.freeze());
        assert_eq!(de.read_blob().as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_reset_and_receive() {
        let mut ser = Serializer::new();
        ser.write_u8(9);
        ser.reset();
        assert!(ser.is_empty());

        let mut de = Deserializer::new();
        de.receive(vec![7u8]);
        assert_eq!(de.read_u8(), 7);
        de.receive(vec![8u8]);
        assert_eq!(de.read_u8(), 8);
        de.reset();
        assert_eq!(de.remaining(), 0);
    }
}
