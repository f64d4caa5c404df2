//! `cmap` table processing.
//!
//! Supports the character mapping subtable formats encountered in practice:
//! byte encoding (0), segment mapping to deltas (4), trimmed mapping (6),
//! segmented coverage (12), many-to-one coverage (13) and Unicode variation
//! sequences (14). One "best" Unicode subtable is selected for lookups;
//! Windows/full-repertoire (3/10) wins over Windows/BMP (3/1), which wins
//! over any Unicode-platform subtable.

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
    tables::Tag,
};

#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentWithDelta {
    pub(crate) start_code: u16,
    pub(crate) end_code: u16,
    pub(crate) id_delta: u16,
    pub(crate) id_range_offset: u16,
}

/// Segment mapping to delta values (format 4) subtable.
#[derive(Debug, Clone)]
pub(crate) struct SegmentDeltas<'a> {
    pub(crate) segments: Vec<SegmentWithDelta>,
    pub(crate) glyph_id_array: &'a [u8],
}

impl<'a> SegmentDeltas<'a> {
    fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        cursor.skip(2)?; // format, already dispatched on
        let remaining_len = cursor.read_u16_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(4)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        // Tolerate subtables that run to the end of the table but lie about it.
        let remaining_len = remaining_len.min(cursor.len());
        cursor = cursor.range(0..remaining_len)?;

        cursor.skip(2)?; // language
        let segment_count = cursor.read_u16()? / 2;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let vec_len = 2 * usize::from(segment_count);
        let mut end_codes = cursor.split_at(vec_len)?;
        cursor.skip(2)?; // reserved padding
        let mut start_codes = cursor.split_at(vec_len)?;
        let mut id_deltas = cursor.split_at(vec_len)?;
        let mut id_range_offsets = cursor.split_at(vec_len)?;

        let segments = (0..segment_count).map(|_| {
            Ok(SegmentWithDelta {
                start_code: start_codes.read_u16()?,
                end_code: end_codes.read_u16()?,
                id_delta: id_deltas.read_u16()?,
                id_range_offset: id_range_offsets.read_u16()?,
            })
        });

        Ok(Self {
            segments: segments.collect::<Result<_, ParseError>>()?,
            glyph_id_array: cursor.bytes,
        })
    }

    fn map(&self, code: u32) -> Option<u16> {
        let code = u16::try_from(code).ok()?;
        let segment_idx = self
            .segments
            .binary_search_by_key(&code, |segment| segment.end_code)
            .unwrap_or_else(|pos| pos);
        let segment = self.segments.get(segment_idx)?;
        if segment.start_code > code {
            return None;
        }

        let glyph_id = if segment.id_range_offset == 0 {
            segment.id_delta.wrapping_add(code)
        } else {
            // Offset is counted from this segment's `idRangeOffsets` slot.
            let mut byte_offset = 2 * segment_idx;
            byte_offset += usize::from(segment.id_range_offset);
            byte_offset += 2 * usize::from(code - segment.start_code);
            if byte_offset < 2 * self.segments.len() {
                return None;
            }
            // Shift the offset to count from the start of `glyphIdArray`.
            byte_offset -= 2 * self.segments.len();
            let glyph_id_bytes = self.glyph_id_array.get(byte_offset..(byte_offset + 2))?;
            let glyph_id = u16::from_be_bytes(glyph_id_bytes.try_into().unwrap());
            if glyph_id == 0 {
                return None;
            }
            segment.id_delta.wrapping_add(glyph_id)
        };
        (glyph_id != 0).then_some(glyph_id)
    }

    fn mappings(&self, action: &mut impl FnMut(u32, u16)) {
        for segment in &self.segments {
            for code in segment.start_code..=segment.end_code {
                if let Some(glyph_id) = self.map(code.into()) {
                    action(code.into(), glyph_id);
                }
                if code == u16::MAX {
                    break;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SequentialMapGroup {
    pub(crate) start_char_code: u32,
    pub(crate) end_char_code: u32,
    pub(crate) start_glyph_id: u32,
}

/// Segmented coverage (format 12) or many-to-one coverage (format 13) subtable.
#[derive(Debug, Default, Clone)]
pub(crate) struct SegmentedCoverage {
    pub(crate) groups: Vec<SequentialMapGroup>,
    /// `true` for format 13: all chars of a group map to `start_glyph_id`.
    many_to_one: bool,
}

impl SegmentedCoverage {
    fn parse(mut cursor: Cursor<'_>, many_to_one: bool) -> Result<Self, ParseError> {
        cursor.skip(4)?; // format, reserved
        let remaining_len = cursor.read_u32_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(8)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        let remaining_len = remaining_len.min(cursor.len());
        cursor = cursor.range(0..remaining_len)?;

        cursor.skip(4)?; // language
        let num_groups = cursor.read_u32()?;
        let groups = (0..num_groups).map(|_| {
            Ok(SequentialMapGroup {
                start_char_code: cursor.read_u32()?,
                end_char_code: cursor.read_u32()?,
                start_glyph_id: cursor.read_u32()?,
            })
        });

        Ok(Self {
            groups: groups.collect::<Result<_, ParseError>>()?,
            many_to_one,
        })
    }

    fn map(&self, code: u32) -> Option<u16> {
        let group_idx = self
            .groups
            .binary_search_by_key(&code, |group| group.end_char_code)
            .unwrap_or_else(|pos| pos);
        let group = self.groups.get(group_idx)?;
        if group.start_char_code > code {
            return None;
        }
        let glyph_id = if self.many_to_one {
            group.start_glyph_id
        } else {
            code - group.start_char_code + group.start_glyph_id
        };
        let glyph_id = u16::try_from(glyph_id).ok()?;
        (glyph_id != 0).then_some(glyph_id)
    }

    fn mappings(&self, action: &mut impl FnMut(u32, u16)) {
        for group in &self.groups {
            for code in group.start_char_code..=group.end_char_code {
                if let Some(glyph_id) = self.map(code) {
                    action(code, glyph_id);
                }
            }
        }
    }
}

/// Byte encoding (format 0) subtable.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ByteEncoding<'a> {
    glyph_ids: &'a [u8],
}

impl<'a> ByteEncoding<'a> {
    fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        cursor.skip(6)?; // format, length, language
        let glyph_ids = cursor.split_at(256)?;
        Ok(Self {
            glyph_ids: glyph_ids.bytes,
        })
    }

    fn map(&self, code: u32) -> Option<u16> {
        let glyph_id = *self.glyph_ids.get(usize::try_from(code).ok()?)?;
        (glyph_id != 0).then_some(glyph_id.into())
    }
}

/// Trimmed table mapping (format 6) subtable.
#[derive(Debug, Clone)]
pub(crate) struct TrimmedMapping {
    first_code: u16,
    glyph_ids: Vec<u16>,
}

impl TrimmedMapping {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        cursor.skip(6)?; // format, length, language
        let first_code = cursor.read_u16()?;
        let entry_count = cursor.read_u16()?;
        let glyph_ids = (0..entry_count)
            .map(|_| cursor.read_u16())
            .collect::<Result<_, ParseError>>()?;
        Ok(Self {
            first_code,
            glyph_ids,
        })
    }

    fn map(&self, code: u32) -> Option<u16> {
        let idx = code.checked_sub(self.first_code.into())?;
        let glyph_id = *self.glyph_ids.get(usize::try_from(idx).ok()?)?;
        (glyph_id != 0).then_some(glyph_id)
    }
}

/// Unicode variation sequences (format 14) subtable.
#[derive(Debug, Clone)]
pub(crate) struct UnicodeVariations<'a> {
    selectors: Vec<VariationSelector>,
    table: Cursor<'a>,
}

#[derive(Debug, Clone, Copy)]
struct VariationSelector {
    selector: u32,
    default_uvs_offset: u32,
    non_default_uvs_offset: u32,
}

impl<'a> UnicodeVariations<'a> {
    fn parse(table: Cursor<'a>) -> Result<Self, ParseError> {
        let mut cursor = table;
        cursor.skip(6)?; // format, length
        let num_selectors = cursor.read_u32()?;
        let selectors = (0..num_selectors)
            .map(|_| {
                Ok(VariationSelector {
                    selector: cursor.read_u24()?,
                    default_uvs_offset: cursor.read_u32()?,
                    non_default_uvs_offset: cursor.read_u32()?,
                })
            })
            .collect::<Result<_, ParseError>>()?;
        Ok(Self { selectors, table })
    }

    /// Resolves a variation sequence. `Ok(None)` means the sequence defaults
    /// to the standard mapping of `code`.
    fn map(&self, code: u32, selector: u32) -> Option<VariationMapping> {
        let idx = self
            .selectors
            .binary_search_by_key(&selector, |record| record.selector)
            .ok()?;
        let record = self.selectors[idx];

        if record.non_default_uvs_offset != 0 {
            if let Ok(mut cursor) = self
                .table
                .range(record.non_default_uvs_offset as usize..self.table.len())
            {
                if let Ok(num_mappings) = cursor.read_u32() {
                    for _ in 0..num_mappings {
                        let (Ok(unicode), Ok(glyph_id)) = (cursor.read_u24(), cursor.read_u16())
                        else {
                            break;
                        };
                        if unicode == code {
                            return Some(VariationMapping::NonDefault(glyph_id));
                        }
                    }
                }
            }
        }

        if record.default_uvs_offset != 0 {
            if let Ok(mut cursor) = self
                .table
                .range(record.default_uvs_offset as usize..self.table.len())
            {
                if let Ok(num_ranges) = cursor.read_u32() {
                    for _ in 0..num_ranges {
                        let (Ok(start), Ok(additional)) = (cursor.read_u24(), cursor.read_u8())
                        else {
                            break;
                        };
                        if (start..=start + u32::from(additional)).contains(&code) {
                            return Some(VariationMapping::Default);
                        }
                    }
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
enum VariationMapping {
    /// Sequence maps to the glyph of the standard `cmap` lookup.
    Default,
    NonDefault(u16),
}

#[derive(Debug, Clone)]
pub(crate) enum Subtable<'a> {
    ByteEncoding(ByteEncoding<'a>),
    SegmentDeltas(SegmentDeltas<'a>),
    TrimmedMapping(TrimmedMapping),
    SegmentedCoverage(SegmentedCoverage),
}

impl Subtable<'_> {
    fn map(&self, code: u32) -> Option<u16> {
        match self {
            Self::ByteEncoding(table) => table.map(code),
            Self::SegmentDeltas(table) => table.map(code),
            Self::TrimmedMapping(table) => table.map(code),
            Self::SegmentedCoverage(table) => table.map(code),
        }
    }
}

/// Parsed `cmap` table with the selected Unicode subtable.
#[derive(Debug, Clone)]
pub(crate) struct CmapTable<'a> {
    best: Subtable<'a>,
    variations: Option<UnicodeVariations<'a>>,
}

impl<'a> CmapTable<'a> {
    const UNICODE_PLATFORM: u16 = 0;
    const WINDOWS_PLATFORM: u16 = 3;

    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let table_cursor = Cursor::for_table(bytes, base, Tag::CMAP);
        let mut cursor = table_cursor;
        cursor.read_u16_checked(|version| {
            if version == 0 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion {
                    version: version.into(),
                })
            }
        })?;

        let num_tables = cursor.read_u16()?;
        let (mut best, mut best_priority) = (None, 0_u8);
        let mut variations = None;
        for _ in 0..num_tables {
            let platform_id = cursor.read_u16()?;
            let encoding_id = cursor.read_u16()?;
            let offset = cursor.read_u32()? as usize;

            if platform_id == Self::UNICODE_PLATFORM && encoding_id == 5 {
                let mut subtable = table_cursor;
                subtable.skip(offset)?;
                variations = Some(UnicodeVariations::parse(subtable)?);
                continue;
            }

            let priority = match (platform_id, encoding_id) {
                (Self::WINDOWS_PLATFORM, 10) => 3,
                (Self::WINDOWS_PLATFORM, 1) => 2,
                (Self::UNICODE_PLATFORM, _) => 1,
                _ => continue, // non-Unicode encoding
            };
            if priority > best_priority {
                let mut subtable = table_cursor;
                subtable.skip(offset)?;
                best = Some(Self::parse_subtable(subtable)?);
                best_priority = priority;
            }
        }

        Ok(Self {
            best: best.ok_or_else(|| cursor.err(ParseErrorKind::NoSupportedCmap))?,
            variations,
        })
    }

    fn parse_subtable(cursor: Cursor<'a>) -> Result<Subtable<'a>, ParseError> {
        let format = {
            let mut peek = cursor;
            peek.read_u16()?
        };
        Ok(match format {
            0 => Subtable::ByteEncoding(ByteEncoding::parse(cursor)?),
            4 => Subtable::SegmentDeltas(SegmentDeltas::parse(cursor)?),
            6 => Subtable::TrimmedMapping(TrimmedMapping::parse(cursor)?),
            12 => Subtable::SegmentedCoverage(SegmentedCoverage::parse(cursor, false)?),
            13 => Subtable::SegmentedCoverage(SegmentedCoverage::parse(cursor, true)?),
            _ => return Err(cursor.err(ParseErrorKind::UnexpectedTableFormat { format })),
        })
    }

    pub(crate) fn glyph_id(&self, code: u32) -> Option<u16> {
        self.best.map(code)
    }

    pub(crate) fn glyph_variation_id(&self, code: u32, selector: u32) -> Option<u16> {
        match self.variations.as_ref()?.map(code, selector)? {
            VariationMapping::Default => self.glyph_id(code),
            VariationMapping::NonDefault(glyph_id) => Some(glyph_id),
        }
    }

    /// Calls `action` for every `(char code, glyph ID)` pair of the selected
    /// subtable, in increasing char code order.
    pub(crate) fn mappings(&self, mut action: impl FnMut(u32, u16)) {
        match &self.best {
            Subtable::ByteEncoding(table) => {
                for code in 0..256 {
                    if let Some(glyph_id) = table.map(code) {
                        action(code, glyph_id);
                    }
                }
            }
            Subtable::SegmentDeltas(table) => table.mappings(&mut action),
            Subtable::TrimmedMapping(table) => {
                for code in table.first_code..=u16::MAX {
                    if let Some(glyph_id) = table.map(code.into()) {
                        action(code.into(), glyph_id);
                    }
                    if usize::from(code - table.first_code) + 1 >= table.glyph_ids.len() {
                        break;
                    }
                }
            }
            Subtable::SegmentedCoverage(table) => table.mappings(&mut action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::testing::push_u16;

    fn format4_subtable(segments: &[(u16, u16, u16)]) -> Vec<u8> {
        let mut bytes = vec![];
        let segment_count = segments.len() as u16 + 1;
        push_u16(&mut bytes, 4);
        push_u16(&mut bytes, 16 + 8 * segment_count); // length
        push_u16(&mut bytes, 0); // language
        push_u16(&mut bytes, segment_count * 2);
        push_u16(&mut bytes, 0); // searchRange
        push_u16(&mut bytes, 0); // entrySelector
        push_u16(&mut bytes, 0); // rangeShift
        for &(_, end, _) in segments {
            push_u16(&mut bytes, end);
        }
        push_u16(&mut bytes, 0xffff);
        push_u16(&mut bytes, 0); // reserved
        for &(start, _, _) in segments {
            push_u16(&mut bytes, start);
        }
        push_u16(&mut bytes, 0xffff);
        for &(_, _, delta) in segments {
            push_u16(&mut bytes, delta);
        }
        push_u16(&mut bytes, 1);
        for _ in 0..segment_count {
            push_u16(&mut bytes, 0); // idRangeOffsets
        }
        bytes
    }

    fn cmap_with_format4(segments: &[(u16, u16, u16)]) -> Vec<u8> {
        let mut bytes = vec![];
        push_u16(&mut bytes, 0); // version
        push_u16(&mut bytes, 1); // numTables
        push_u16(&mut bytes, 3); // platform
        push_u16(&mut bytes, 1); // encoding
        bytes.extend_from_slice(&12_u32.to_be_bytes());
        bytes.extend_from_slice(&format4_subtable(segments));
        bytes
    }

    #[test]
    fn ascii_segment_lookup() {
        // `startCode=0x41 endCode=0x5A idDelta=-0x40`
        let bytes = cmap_with_format4(&[(0x41, 0x5a, 0_u16.wrapping_sub(0x40))]);
        let cmap = CmapTable::parse(&bytes, 0).unwrap();

        assert_eq!(cmap.glyph_id(u32::from('A')), Some(1));
        assert_eq!(cmap.glyph_id(u32::from('Z')), Some(26));
        assert_eq!(cmap.glyph_id(0x5b), None);
        assert_eq!(cmap.glyph_id(0x40), None);
        assert_eq!(cmap.glyph_id(0x1_0000), None);
    }

    #[test]
    fn enumerating_format4_mappings() {
        let bytes = cmap_with_format4(&[(0x30, 0x32, 5), (0x41, 0x42, 0_u16.wrapping_sub(0x40))]);
        let cmap = CmapTable::parse(&bytes, 0).unwrap();

        let mut mappings = vec![];
        cmap.mappings(|code, glyph_id| mappings.push((code, glyph_id)));
        assert_eq!(
            mappings,
            [(0x30, 0x35), (0x31, 0x36), (0x32, 0x37), (0x41, 1), (0x42, 2)]
        );
    }

    #[test]
    fn format12_lookup_and_priority() {
        let mut bytes = vec![];
        push_u16(&mut bytes, 0); // version
        push_u16(&mut bytes, 2); // numTables
        // Lower-priority Windows/BMP record listed first.
        push_u16(&mut bytes, 3);
        push_u16(&mut bytes, 1);
        bytes.extend_from_slice(&20_u32.to_be_bytes());
        push_u16(&mut bytes, 3);
        push_u16(&mut bytes, 10);
        let format4 = format4_subtable(&[(0x41, 0x41, 0_u16.wrapping_sub(0x40))]);
        let format12_offset = 20 + format4.len() as u32;
        bytes.extend_from_slice(&format12_offset.to_be_bytes());
        bytes.extend_from_slice(&format4);

        // Format 12 subtable with a supplementary-plane group.
        push_u16(&mut bytes, 12);
        push_u16(&mut bytes, 0);
        bytes.extend_from_slice(&(16 + 12_u32).to_be_bytes());
        bytes.extend_from_slice(&0_u32.to_be_bytes()); // language
        bytes.extend_from_slice(&1_u32.to_be_bytes()); // numGroups
        bytes.extend_from_slice(&0x1_f600_u32.to_be_bytes());
        bytes.extend_from_slice(&0x1_f602_u32.to_be_bytes());
        bytes.extend_from_slice(&7_u32.to_be_bytes());

        let cmap = CmapTable::parse(&bytes, 0).unwrap();
        assert_eq!(cmap.glyph_id(0x1_f601), Some(8));
        // The format-4 subtable lost the priority contest.
        assert_eq!(cmap.glyph_id(0x41), None);
    }
}
