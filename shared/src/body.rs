//! Helpers for reading and writing packet bodies.
//!
//! Reads are lenient the way the legacy client expects: a short body yields
//! zeros instead of an error, so a handler can always decode its arguments.

use bytes::{BufMut, Bytes, BytesMut};

/// Cursor over a request body
#[derive(Debug, Clone)]
pub struct BodyReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BodyReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn read_u32(&mut self) -> u32 {
        match self.take::<4>() {
            Some(b) => u32::from_be_bytes(b),
            None => 0,
        }
    }

    pub fn read_i32(&mut self) -> i32 {
        self.read_u32() as i32
    }

    pub fn read_u16(&mut self) -> u16 {
        match self.take::<2>() {
            Some(b) => u16::from_be_bytes(b),
            None => 0,
        }
    }

    pub fn read_u8(&mut self) -> u8 {
        match self.take::<1>() {
            Some(b) => b[0],
            None => 0,
        }
    }

    /// Read up to `n` bytes (fewer if the body runs out)
    pub fn read_bytes(&mut self, n: usize) -> &'a [u8] {
        let n = n.min(self.remaining());
        let out = &self.data[self.offset..self.offset + n];
        self.offset += n;
        out
    }

    /// Read a fixed-width string field, stopping at the first zero byte
    pub fn read_fixed_str(&mut self, width: usize) -> String {
        let raw = self.read_bytes(width);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.remaining() < N {
            // Drain so later reads stay zero instead of picking up a misaligned tail
            self.offset = self.data.len();
            return None;
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.offset..self.offset + N]);
        self.offset += N;
        Some(out)
    }
}

/// Builder for response bodies
#[derive(Debug, Default, Clone)]
pub struct BodyWriter {
    buf: BytesMut,
}

impl BodyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32(value);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    /// Write `count` zero bytes
    pub fn put_zeros(&mut self, count: usize) -> &mut Self {
        self.buf.put_bytes(0, count);
        self
    }

    /// Write a string into a fixed-width field, truncating or zero padding
    pub fn put_fixed_str(&mut self, value: &str, width: usize) -> &mut Self {
        let raw = value.as_bytes();
        let used = raw.len().min(width);
        self.buf.put_slice(&raw[..used]);
        self.buf.put_bytes(0, width - used);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_reads_yield_zero() {
        let data = [0u8, 0, 0, 7, 1, 2];
        let mut reader = BodyReader::new(&data);
        assert_eq!(reader.read_u32(), 7);
        assert_eq!(reader.read_u32(), 0);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read_u16(), 0);
    }

    #[test]
    fn test_fixed_string_padding_and_truncation() {
        let mut writer = BodyWriter::new();
        writer.put_fixed_str("Seer", 8).put_fixed_str("abcdefghij", 4);
        let bytes = writer.finish();
        assert_eq!(&bytes[..], b"Seer\0\0\0\0abcd");

        let mut reader = BodyReader::new(&bytes);
        assert_eq!(reader.read_fixed_str(8), "Seer");
        assert_eq!(reader.read_fixed_str(4), "abcd");
    }

    #[test]
    fn test_fixed_string_stops_at_first_zero() {
        let data = b"ab\0cd\0\0\0";
        let mut reader = BodyReader::new(data);
        assert_eq!(reader.read_fixed_str(8), "ab");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_bytes_is_clamped() {
        let data = [1u8, 2, 3];
        let mut reader = BodyReader::new(&data);
        assert_eq!(reader.read_bytes(10), &[1, 2, 3]);
        assert!(reader.read_bytes(1).is_empty());
    }
}
