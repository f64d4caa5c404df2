//! Bounds-checked big-endian reader over font data.

use core::ops;

use crate::{
    errors::{ParseError, ParseErrorKind},
    tables::Tag,
};

/// Cheaply copyable cursor over a window of font data.
///
/// The cursor remembers the absolute offset of its window within the backing
/// file and, optionally, the table being parsed, so that every error it
/// produces carries both.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    pub(crate) bytes: &'a [u8],
    offset: usize,
    table: Option<Tag>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            table: None,
        }
    }

    pub(crate) fn at(bytes: &'a [u8], offset: usize) -> Self {
        Self {
            bytes,
            offset,
            table: None,
        }
    }

    pub(crate) fn for_table(bytes: &'a [u8], offset: usize, table: Tag) -> Self {
        Self {
            bytes,
            offset,
            table: Some(table),
        }
    }

    /// Absolute offset of the next unread byte.
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            offset: self.offset,
            table: self.table,
        }
    }

    fn eof(&self) -> ParseError {
        self.err(ParseErrorKind::UnexpectedEof)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        if self.bytes.len() < n {
            Err(self.eof())
        } else {
            self.bytes = &self.bytes[n..];
            self.offset += n;
            Ok(())
        }
    }

    /// Splits off the next `len` bytes into a separate cursor and advances
    /// past them.
    pub(crate) fn split_at(&mut self, len: usize) -> Result<Cursor<'a>, ParseError> {
        if self.bytes.len() < len {
            return Err(self.eof());
        }
        let (head, tail) = self.bytes.split_at(len);
        let head_cursor = Cursor {
            bytes: head,
            offset: self.offset,
            table: self.table,
        };
        self.bytes = tail;
        self.offset += len;
        Ok(head_cursor)
    }

    /// Restricts the cursor to `range` of its remaining window.
    pub(crate) fn range(self, range: ops::Range<usize>) -> Result<Cursor<'a>, ParseError> {
        if range.end < range.start || self.bytes.len() < range.end {
            return Err(self.err(ParseErrorKind::RangeOutOfBounds {
                range,
                len: self.bytes.len(),
            }));
        }
        Ok(Cursor {
            bytes: &self.bytes[range.clone()],
            offset: self.offset + range.start,
            table: self.table,
        })
    }

    pub(crate) fn read_byte_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        if self.bytes.len() < N {
            return Err(self.eof());
        }
        let (head, tail) = self.bytes.split_at(N);
        self.bytes = tail;
        self.offset += N;
        Ok(head.try_into().expect("split produces exactly N bytes"))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ParseError> {
        self.read_byte_array::<1>().map(|[byte]| byte)
    }

    pub(crate) fn read_i8(&mut self) -> Result<i8, ParseError> {
        #[allow(clippy::cast_possible_wrap)] // intentional reinterpretation
        self.read_u8().map(|byte| byte as i8)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ParseError> {
        self.read_byte_array::<2>().map(u16::from_be_bytes)
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16, ParseError> {
        self.read_byte_array::<2>().map(i16::from_be_bytes)
    }

    pub(crate) fn read_u24(&mut self) -> Result<u32, ParseError> {
        self.read_byte_array::<3>()
            .map(|[a, b, c]| u32::from_be_bytes([0, a, b, c]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ParseError> {
        self.read_byte_array::<4>().map(u32::from_be_bytes)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, ParseError> {
        self.read_byte_array::<4>().map(i32::from_be_bytes)
    }

    /// Reads a 16.16 fixed-point value.
    #[allow(clippy::cast_precision_loss)] // 16.16 values fit into `f32` well enough
    pub(crate) fn read_fixed(&mut self) -> Result<f32, ParseError> {
        self.read_i32().map(|bits| bits as f32 / 65_536.0)
    }

    /// Reads a 2.14 fixed-point value.
    pub(crate) fn read_f2dot14(&mut self) -> Result<f32, ParseError> {
        self.read_i16().map(|bits| f32::from(bits) / 16_384.0)
    }

    pub(crate) fn read_tag(&mut self) -> Result<Tag, ParseError> {
        self.read_byte_array::<4>().map(Tag)
    }

    pub(crate) fn read_u16_checked<T>(
        &mut self,
        check: impl FnOnce(u16) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u16()?;
        check(value).map_err(|kind| start.err(kind))
    }

    pub(crate) fn read_u32_checked<T>(
        &mut self,
        check: impl FnOnce(u32) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u32()?;
        check(value).map_err(|kind| start.err(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_primitives() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0xff, 0x80];
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_u24().unwrap(), 0x5678_ff);
        assert_eq!(cursor.read_i8().unwrap(), -128);
        assert!(cursor.is_empty());

        let err = cursor.read_u8().unwrap_err();
        assert_eq!(err.offset(), 6);
        assert!(matches!(err.kind(), ParseErrorKind::UnexpectedEof));
    }

    #[test]
    fn reading_fixed_point() {
        let bytes = [0x00, 0x01, 0x80, 0x00, 0x70, 0x00, 0xc0, 0x00];
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_fixed().unwrap(), 1.5);
        assert_eq!(cursor.read_f2dot14().unwrap(), 1.75);
        assert_eq!(cursor.read_f2dot14().unwrap(), -1.0);
    }

    #[test]
    fn split_and_range_track_offsets() {
        let bytes = [0_u8; 16];
        let mut cursor = Cursor::at(&bytes, 100);
        let head = cursor.split_at(4).unwrap();
        assert_eq!(head.offset(), 100);
        assert_eq!(cursor.offset(), 104);

        let sub = cursor.range(2..6).unwrap();
        assert_eq!(sub.offset(), 106);
        assert_eq!(sub.len(), 4);

        let err = cursor.range(4..20).unwrap_err();
        assert!(matches!(
            err.kind(),
            ParseErrorKind::RangeOutOfBounds { len: 12, .. }
        ));
    }
}
