//! Legacy `kern` table processing (Windows version 0 and Apple version 1
//! headers; pair-list format 0 and class-matrix format 2 subtables).

use crate::{errors::ParseError, reader::Cursor, tables::Tag};

#[derive(Debug, Clone)]
enum Subtable<'a> {
    /// Format 0: sorted pair list, binary-searched on `left:right` key.
    Pairs(SortedPairs<'a>),
    /// Format 2: class-based 2D kerning array.
    Classes(ClassMatrix<'a>),
}

#[derive(Debug, Clone, Copy)]
struct SortedPairs<'a> {
    /// 6-byte records: `{left: u16, right: u16, value: i16}`.
    records: &'a [u8],
    count: usize,
}

impl SortedPairs<'_> {
    fn parse<'a>(cursor: &mut Cursor<'a>) -> Result<SortedPairs<'a>, ParseError> {
        let count = usize::from(cursor.read_u16()?);
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift
        Ok(SortedPairs {
            records: cursor.bytes,
            count: count.min(cursor.bytes.len() / 6),
        })
    }

    fn record(&self, idx: usize) -> (u32, i16) {
        let record = &self.records[idx * 6..idx * 6 + 6];
        let key = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
        let value = i16::from_be_bytes([record[4], record[5]]);
        (key, value)
    }

    fn kerning(&self, left: u16, right: u16) -> Option<i16> {
        let needle = u32::from(left) << 16 | u32::from(right);
        let (mut lo, mut hi) = (0, self.count);
        while lo < hi {
            let mid = (lo + hi) / 2;
            let (key, value) = self.record(mid);
            match key.cmp(&needle) {
                core::cmp::Ordering::Less => lo = mid + 1,
                core::cmp::Ordering::Greater => hi = mid,
                core::cmp::Ordering::Equal => return Some(value),
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct ClassMatrix<'a> {
    /// The whole subtable; class-table and kerning-array offsets are
    /// relative to its start.
    data: &'a [u8],
    row_width: u16,
    left_class_offset: u16,
    right_class_offset: u16,
    array_offset: u16,
}

impl ClassMatrix<'_> {
    fn parse<'a>(data: &'a [u8], cursor: &mut Cursor<'a>) -> Result<ClassMatrix<'a>, ParseError> {
        Ok(ClassMatrix {
            data,
            row_width: cursor.read_u16()?,
            left_class_offset: cursor.read_u16()?,
            right_class_offset: cursor.read_u16()?,
            array_offset: cursor.read_u16()?,
        })
    }

    /// Looks up a glyph in a class table; `None` for out-of-range glyphs.
    fn class_value(&self, offset: u16, glyph_id: u16) -> Option<u16> {
        let table = self.data.get(usize::from(offset)..)?;
        let mut cursor = Cursor::new(table);
        let first_glyph = cursor.read_u16().ok()?;
        let glyph_count = cursor.read_u16().ok()?;
        let idx = glyph_id.checked_sub(first_glyph)?;
        if idx >= glyph_count {
            return None;
        }
        let mut values = cursor
            .range(usize::from(idx) * 2..usize::from(glyph_count) * 2)
            .ok()?;
        values.read_u16().ok()
    }

    fn kerning(&self, left: u16, right: u16) -> Option<i16> {
        if self.row_width == 0 {
            return None;
        }
        // Left class values are absolute byte offsets into the subtable
        // (pre-multiplied by the row width and based at the kerning array);
        // right class values are pre-multiplied by 2.
        let left_class = self.class_value(self.left_class_offset, left)?;
        let right_class = self.class_value(self.right_class_offset, right)?;
        let offset = usize::from(left_class) + usize::from(right_class);
        if offset < usize::from(self.array_offset) {
            return None;
        }
        let bytes = self.data.get(offset..offset + 2)?;
        Some(i16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

/// Parsed `kern` table restricted to horizontal, non-cross-stream subtables.
#[derive(Debug, Clone)]
pub(crate) struct KernTable<'a> {
    subtables: Vec<Subtable<'a>>,
}

impl<'a> KernTable<'a> {
    const HORIZONTAL: u16 = 0x0001;
    const CROSS_STREAM: u16 = 0x0004;
    const AAT_VERTICAL: u16 = 0x8000;
    const AAT_CROSS_STREAM: u16 = 0x4000;

    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(bytes, base, Tag::KERN);
        let version = cursor.read_u16()?;
        let (num_tables, apple_flavor) = if version == 0 {
            (u32::from(cursor.read_u16()?), false)
        } else {
            // Apple AAT header: fixed 1.0 version, u32 table count.
            cursor.skip(2)?;
            (cursor.read_u32()?, true)
        };

        let mut subtables = vec![];
        for _ in 0..num_tables {
            let subtable_start = cursor;
            let length;
            let coverage;
            if apple_flavor {
                length = cursor.read_u32()? as usize;
                coverage = cursor.read_u16()?;
                cursor.skip(2)?; // tupleIndex
            } else {
                cursor.skip(2)?; // subtable version
                length = usize::from(cursor.read_u16()?);
                coverage = cursor.read_u16()?;
            }

            let horizontal = if apple_flavor {
                coverage & (Self::AAT_VERTICAL | Self::AAT_CROSS_STREAM) == 0
            } else {
                coverage & Self::HORIZONTAL != 0 && coverage & Self::CROSS_STREAM == 0
            };
            let format = if apple_flavor {
                coverage & 0x00ff
            } else {
                coverage >> 8
            };

            if horizontal {
                match format {
                    0 => subtables.push(Subtable::Pairs(SortedPairs::parse(&mut cursor)?)),
                    2 => subtables.push(Subtable::Classes(ClassMatrix::parse(
                        subtable_start.bytes,
                        &mut cursor,
                    )?)),
                    _ => { /* unsupported kerning format; skip the subtable */ }
                }
            }

            // Re-anchor at the declared subtable end; parsers above only read
            // their headers.
            cursor = subtable_start;
            if length == 0 || cursor.skip(length).is_err() {
                break;
            }
        }

        Ok(Self { subtables })
    }

    /// Accumulated kerning adjustment for a glyph pair in font units.
    pub(crate) fn kerning(&self, left: u16, right: u16) -> Option<i16> {
        let mut result = None;
        for subtable in &self.subtables {
            let value = match subtable {
                Subtable::Pairs(pairs) => pairs.kerning(left, right),
                Subtable::Classes(classes) => classes.kerning(left, right),
            };
            if let Some(value) = value {
                result = Some(result.unwrap_or(0) + value);
            }
        }
        result
    }
}
