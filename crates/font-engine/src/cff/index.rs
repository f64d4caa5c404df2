//! CFF INDEX structures.

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
};

/// An INDEX: a counted sequence of variable-length byte strings.
///
/// CFF stores the element count as `u16`, CFF2 as `u32`; offsets are 1-based
/// with a configurable byte width.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Index<'a> {
    count: u32,
    off_size: u8,
    offsets: &'a [u8],
    data: &'a [u8],
}

impl<'a> Index<'a> {
    /// Parses an INDEX off the front of `cursor`, advancing past it.
    pub(crate) fn parse(cursor: &mut Cursor<'a>, long_count: bool) -> Result<Self, ParseError> {
        let count = if long_count {
            cursor.read_u32()?
        } else {
            cursor.read_u16()?.into()
        };
        if count == 0 {
            return Ok(Self::default());
        }

        let off_size = cursor.read_u8()?;
        if !(1..=4).contains(&off_size) {
            return Err(cursor.err(ParseErrorKind::Malformed("INDEX offSize out of range")));
        }
        let offsets_len = (count as usize + 1) * usize::from(off_size);
        let offsets = cursor.split_at(offsets_len)?;

        let data_len = read_offset(offsets.bytes, count as usize, off_size)
            .checked_sub(1)
            .ok_or_else(|| cursor.err(ParseErrorKind::Malformed("zero INDEX offset")))?;
        let data = cursor.split_at(data_len)?;

        Ok(Self {
            count,
            off_size,
            offsets: offsets.bytes,
            data: data.bytes,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.count as usize
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub(crate) fn get(&self, idx: usize) -> Result<&'a [u8], ParseError> {
        if idx >= self.len() {
            return Err(ParseError::new(ParseErrorKind::OffsetOutOfBounds(idx)));
        }
        let start = read_offset(self.offsets, idx, self.off_size) - 1;
        let end = read_offset(self.offsets, idx + 1, self.off_size) - 1;
        if start > end || end > self.data.len() {
            return Err(ParseError::new(ParseErrorKind::RangeOutOfBounds {
                range: start..end,
                len: self.data.len(),
            }));
        }
        Ok(&self.data[start..end])
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Result<&'a [u8], ParseError>> + '_ {
        (0..self.len()).map(|idx| self.get(idx))
    }

    /// Bias added to subroutine operands of `callsubr`/`callgsubr`.
    pub(crate) fn subr_bias(&self) -> i32 {
        if self.count <= 1239 {
            107
        } else if self.count <= 33_899 {
            1131
        } else {
            32_768
        }
    }
}

fn read_offset(offsets: &[u8], idx: usize, off_size: u8) -> usize {
    let start = idx * usize::from(off_size);
    offsets[start..start + usize::from(off_size)]
        .iter()
        .fold(0_usize, |acc, &byte| (acc << 8) | usize::from(byte))
}
