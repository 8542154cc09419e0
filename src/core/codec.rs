//! Big-endian binary primitives for persisted state.
//!
//! [`StateWriter`] appends to an in-memory buffer; [`StateReader`] walks a
//! byte slice and reports truncation instead of panicking. Table indices are
//! written with the narrowest width that can hold every index of the table
//! (1, 2 or 4 bytes), so both sides must agree on the table size.

use smol_str::SmolStr;
use thiserror::Error;

use super::interner::StringTable;

/// Low-level decoding/encoding failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of state data at byte {offset}")]
    UnexpectedEof { offset: usize },

    #[error("index {index} out of range for table of {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid UTF-8 in string table entry {entry}")]
    InvalidUtf8 { entry: usize },

    #[error("invalid shared prefix length {shared} for entry {entry}")]
    InvalidPrefix { entry: usize, shared: usize },

    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),

    #[error("{what} count {count} does not fit the state format")]
    TooLarge { what: &'static str, count: usize },
}

/// Appends big-endian values to a byte buffer.
#[derive(Debug, Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a collection length as `u32`.
    pub fn write_count(&mut self, what: &'static str, count: usize) -> Result<(), CodecError> {
        let value = u32::try_from(count).map_err(|_| CodecError::TooLarge { what, count })?;
        self.write_u32(value);
        Ok(())
    }

    /// Write an index into a table of `len` entries using the narrowest width.
    pub fn write_index(&mut self, index: usize, len: usize) -> Result<(), CodecError> {
        if index >= len {
            return Err(CodecError::IndexOutOfRange { index, len });
        }
        match index_width(len) {
            1 => self.write_u8(index as u8),
            2 => self.write_u16(index as u16),
            _ => self.write_u32(index as u32),
        }
        Ok(())
    }

    /// Write the whole string table: count, then each entry encoded as
    /// `(u16 shared prefix bytes, u32 suffix bytes, suffix)` relative to the
    /// previous entry. Sorted-ish tables (type names, locators) compress well.
    pub fn write_string_table(&mut self, table: &StringTable) -> Result<(), CodecError> {
        self.write_count("string table", table.len())?;
        let mut last: &str = "";
        for entry in table.iter() {
            let shared = shared_prefix_len(last, entry);
            let suffix = &entry.as_bytes()[shared..];
            self.write_u16(shared as u16);
            self.write_count("string", suffix.len())?;
            self.buf.extend_from_slice(suffix);
            last = entry.as_str();
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads big-endian values from a byte slice.
pub struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodecError::UnexpectedEof { offset: self.pos })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_count(&mut self) -> Result<usize, CodecError> {
        Ok(self.read_u32()? as usize)
    }

    /// Read an index written by [`StateWriter::write_index`] for a table of
    /// `len` entries, rejecting out-of-range values.
    pub fn read_index(&mut self, len: usize) -> Result<usize, CodecError> {
        let index = match index_width(len) {
            1 => self.read_u8()? as usize,
            2 => self.read_u16()? as usize,
            _ => self.read_u32()? as usize,
        };
        if index >= len {
            return Err(CodecError::IndexOutOfRange { index, len });
        }
        Ok(index)
    }

    /// Read a table written by [`StateWriter::write_string_table`].
    pub fn read_string_table(&mut self) -> Result<Vec<SmolStr>, CodecError> {
        let count = self.read_count()?;
        // Every entry takes at least six bytes; don't trust a huge count.
        let mut strings = Vec::with_capacity(count.min(self.data.len() / 6 + 1));
        let mut last = String::new();
        for entry in 0..count {
            let shared = self.read_u16()? as usize;
            if shared > last.len() || !last.is_char_boundary(shared) {
                return Err(CodecError::InvalidPrefix { entry, shared });
            }
            let suffix_len = self.read_count()?;
            let suffix = self.take(suffix_len)?;
            let suffix =
                std::str::from_utf8(suffix).map_err(|_| CodecError::InvalidUtf8 { entry })?;
            last.truncate(shared);
            last.push_str(suffix);
            strings.push(SmolStr::new(&last));
        }
        Ok(strings)
    }
}

/// Bytes needed for an index into a table of `len` entries.
fn index_width(len: usize) -> usize {
    if len <= 1 << 8 {
        1
    } else if len <= 1 << 16 {
        2
    } else {
        4
    }
}

/// Longest common prefix in bytes that ends on a char boundary of both
/// strings and fits the `u16` prefix field.
fn shared_prefix_len(a: &str, b: &str) -> usize {
    let mut shared = 0;
    for ((ia, ca), cb) in a.char_indices().zip(b.chars()) {
        if ca != cb {
            break;
        }
        let next = ia + ca.len_utf8();
        if next > u16::MAX as usize {
            break;
        }
        shared = next;
    }
    shared
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_big_endian() {
        let mut writer = StateWriter::new();
        writer.write_u32(0x0102_0304);
        writer.write_i32(-2);
        assert_eq!(
            writer.into_bytes(),
            vec![0x01, 0x02, 0x03, 0x04, 0xff, 0xff, 0xff, 0xfe]
        );
    }

    #[test]
    fn test_index_width_follows_table_size() {
        let mut writer = StateWriter::new();
        writer.write_index(3, 10).unwrap();
        assert_eq!(writer.len(), 1);
        writer.write_index(300, 1000).unwrap();
        assert_eq!(writer.len(), 3);
        writer.write_index(70_000, 100_000).unwrap();
        assert_eq!(writer.len(), 7);

        let bytes = writer.into_bytes();
        let mut reader = StateReader::new(&bytes);
        assert_eq!(reader.read_index(10).unwrap(), 3);
        assert_eq!(reader.read_index(1000).unwrap(), 300);
        assert_eq!(reader.read_index(100_000).unwrap(), 70_000);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_write_index_rejects_out_of_range() {
        let mut writer = StateWriter::new();
        assert_eq!(
            writer.write_index(5, 5),
            Err(CodecError::IndexOutOfRange { index: 5, len: 5 })
        );
    }

    #[test]
    fn test_string_table_shares_prefixes() {
        let mut table = StringTable::new();
        table.intern("src/p1/Alpha.java");
        table.intern("src/p1/Beta.java");
        table.intern("ünïcödé/Типы");
        table.intern("");

        let mut writer = StateWriter::new();
        writer.write_string_table(&table).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = StateReader::new(&bytes);
        let strings = reader.read_string_table().unwrap();
        let expected: Vec<SmolStr> = table.iter().cloned().collect();
        assert_eq!(strings, expected);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_truncated_read_reports_eof() {
        let mut reader = StateReader::new(&[0x00, 0x01]);
        assert_eq!(
            reader.read_u32(),
            Err(CodecError::UnexpectedEof { offset: 0 })
        );
    }

    #[test]
    fn test_shared_prefix_stops_at_char_boundary() {
        // 'é' and 'è' share their first UTF-8 byte but are different chars
        assert_eq!(shared_prefix_len("abé", "abè"), 2);
        assert_eq!(shared_prefix_len("same", "same"), 4);
        assert_eq!(shared_prefix_len("", "x"), 0);
    }
}
