//! Serialization of SFNT and WOFF2 containers.

use core::iter;

use crate::{font, tables::Tag};

mod brotli;
pub(crate) mod cff;

/// Whole-file checksum target: `head.checkSumAdjustment` is chosen so that
/// the 32-bit sum of the file equals this value.
pub(crate) const SFNT_CHECKSUM: u32 = 0xb1b0_afba;

/// Physical table order of an emitted font. The directory itself is sorted
/// by tag; data placement follows the layout recommended for TrueType
/// rasterizer performance.
const CANONICAL_ORDER: [Tag; 20] = [
    Tag::HEAD,
    Tag::HHEA,
    Tag::MAXP,
    Tag::OS2,
    Tag::HMTX,
    Tag::VHEA,
    Tag::VMTX,
    Tag::CMAP,
    Tag::FPGM,
    Tag::PREP,
    Tag::CVT,
    Tag::LOCA,
    Tag::GLYF,
    Tag::CFF,
    Tag::CFF2,
    Tag::VORG,
    Tag::KERN,
    Tag::NAME,
    Tag::POST,
    Tag(*b"gasp"),
];

/// Position of a table in the canonical data layout.
pub(crate) fn canonical_rank(tag: Tag) -> usize {
    CANONICAL_ORDER
        .iter()
        .position(|&known| known == tag)
        .unwrap_or(CANONICAL_ORDER.len())
}

pub(crate) fn write_u16(writer: &mut Vec<u8>, value: u16) {
    writer.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_u32(writer: &mut Vec<u8>, value: u32) {
    writer.extend_from_slice(&value.to_be_bytes());
}

/// Standard SFNT checksum: big-endian 32-bit word sum modulo 2³²; a partial
/// trailing word is zero-padded.
pub(crate) fn checksum(bytes: &[u8]) -> u32 {
    let mut sum = 0_u32;
    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        sum = sum.wrapping_add(u32::from_be_bytes(chunk.try_into().unwrap()));
    }
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut last = [0_u8; 4];
        last[..remainder.len()].copy_from_slice(remainder);
        sum = sum.wrapping_add(u32::from_be_bytes(last));
    }
    sum
}

fn uint_base128_len(val: u32) -> usize {
    if val == 0 {
        1
    } else {
        val.ilog2() as usize / 7 + 1
    }
}

#[allow(clippy::cast_possible_truncation)] // intentional
fn write_uint_base128(buffer: &mut Vec<u8>, val: u32) {
    if val >= 1 << 28 {
        buffer.push(0x80 | (val >> 28) as u8);
    }
    if val >= 1 << 21 {
        buffer.push(0x80 | (val >> 21) as u8);
    }
    if val >= 1 << 14 {
        buffer.push(0x80 | (val >> 14) as u8);
    }
    if val >= 1 << 7 {
        buffer.push(0x80 | (val >> 7) as u8);
    }
    buffer.push((val & 127) as u8);
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(test, derive(PartialEq))]
pub(crate) struct TableRecord {
    pub(crate) tag: Tag,
    pub(crate) checksum: u32,
    /// Offset is initially recorded relative to the table data start. It's
    /// always 4-byte aligned.
    pub(crate) offset: u32,
    pub(crate) length: u32,
}

impl TableRecord {
    const BYTE_LEN: usize = 16;

    fn write_opentype(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.tag.0);
        write_u32(writer, self.checksum);
        write_u32(writer, self.offset);
        write_u32(writer, self.length);
    }

    fn self_checksum(&self) -> u32 {
        self.tag
            .as_u32()
            .wrapping_add(self.checksum)
            .wrapping_add(self.offset)
            .wrapping_add(self.length)
    }

    fn woff2_len(&self) -> usize {
        let tag_len = if crate::woff2::known_tag_index(self.tag).is_some() {
            0
        } else {
            4
        };
        1 + tag_len + uint_base128_len(self.length)
    }

    fn write_woff2(&self, buffer: &mut Vec<u8>) {
        // All tables are emitted untransformed; for glyf/loca the null
        // transform is number 3, signalled in the two high flag bits.
        const NULL_TRANSFORM: u8 = 0b1100_0000;

        let transform = if self.tag == Tag::GLYF || self.tag == Tag::LOCA {
            NULL_TRANSFORM
        } else {
            0
        };
        match crate::woff2::known_tag_index(self.tag) {
            Some(index) => buffer.push(index | transform),
            None => {
                buffer.push(0x3f | transform);
                buffer.extend_from_slice(&self.tag.0);
            }
        }
        write_uint_base128(buffer, self.length);
    }
}

/// Accumulates tables and assembles SFNT or WOFF2 files with correct
/// checksums.
#[derive(Debug, Clone)]
pub(crate) struct FontWriter {
    flavor: u32,
    pub(crate) tables: Vec<TableRecord>,
    /// Contains *aligned* table data.
    pub(crate) table_data: Vec<u8>,
}

impl FontWriter {
    const SFNT_HEADER_LEN: usize = 12;
    const WOFF2_HEADER_LEN: usize = 48;

    pub(crate) fn new(flavor: u32) -> Self {
        Self {
            flavor,
            tables: vec![],
            table_data: vec![],
        }
    }

    pub(crate) fn truetype() -> Self {
        Self::new(font::SFNT_VERSION_TRUETYPE)
    }

    pub(crate) fn write_table<T>(&mut self, tag: Tag, with: impl FnOnce(&mut Vec<u8>) -> T) -> T {
        let offset = self.table_data.len();
        debug_assert_eq!(offset % 4, 0, "unaligned offset: {offset}");

        let output = with(&mut self.table_data);
        let length = self.table_data.len() - offset;
        // Pad the table heap to a 4-byte boundary.
        if length % 4 > 0 {
            let zero_padding = 4 - length % 4;
            self.table_data.extend(iter::repeat(0_u8).take(zero_padding));
        }

        let checksum = checksum(&self.table_data[offset..]);
        self.tables.push(TableRecord {
            tag,
            checksum,
            offset: u32::try_from(offset).expect("table offset overflow"),
            length: u32::try_from(length).expect("table length overflow"),
        });
        output
    }

    pub(crate) fn write_raw_table(&mut self, tag: Tag, content: &[u8]) {
        self.write_table(tag, |buffer| buffer.extend_from_slice(content));
    }

    fn write_sfnt_header(&self) -> Vec<u8> {
        let mut buffer = vec![];
        write_u32(&mut buffer, self.flavor);

        // `unwrap()`s are safe: we don't have many tables written.
        let table_count = u16::try_from(self.tables.len()).unwrap();
        write_u16(&mut buffer, table_count);
        let entry_selector = u16::try_from(table_count.ilog2()).unwrap();
        let search_range = 16 << entry_selector;
        write_u16(&mut buffer, search_range);
        write_u16(&mut buffer, entry_selector);
        let range_shift = 16 * table_count - search_range;
        write_u16(&mut buffer, range_shift);

        debug_assert_eq!(buffer.len(), Self::SFNT_HEADER_LEN);
        buffer
    }

    /// Returns the starting offset of table data.
    fn data_offset(&self) -> usize {
        Self::SFNT_HEADER_LEN + self.tables.len() * TableRecord::BYTE_LEN
    }

    pub(crate) fn into_opentype(mut self) -> Vec<u8> {
        let mut buffer = self.write_sfnt_header();
        self.adjust_data(checksum(&buffer));

        self.tables.sort_unstable_by_key(|record| record.tag.0);
        for record in &self.tables {
            record.write_opentype(&mut buffer);
        }
        buffer.extend(self.table_data);
        buffer
    }

    fn adjust_data(&mut self, sfnt_header_checksum: u32) {
        let data_offset = self.data_offset();
        let data_offset_u32 = u32::try_from(data_offset).expect("data_offset overflow");

        let mut file_checksum = sfnt_header_checksum;
        for record in &mut self.tables {
            record.offset += data_offset_u32;
            file_checksum = file_checksum
                .wrapping_add(record.self_checksum())
                .wrapping_add(record.checksum);
        }
        self.patch_head_table(file_checksum, data_offset);
    }

    fn patch_head_table(&mut self, file_checksum: u32, data_offset: usize) {
        let Some(head_record) = self
            .tables
            .iter()
            .find(|record| record.tag == Tag::HEAD)
            .copied()
        else {
            return;
        };
        let checksum_adjustment = SFNT_CHECKSUM.wrapping_sub(file_checksum);

        // At this point, the table offset already includes the heap offset,
        // so we need to subtract it.
        let offset = head_record.offset as usize - data_offset
            + crate::tables::HeadTable::CHECKSUM_ADJUSTMENT_OFFSET;
        self.table_data[offset..offset + 4].copy_from_slice(&checksum_adjustment.to_be_bytes());
    }

    pub(crate) fn into_woff2(mut self) -> Vec<u8> {
        const WOFF2_SIGNATURE: u32 = u32::from_be_bytes(*b"wOF2");

        self.adjust_data(checksum(&self.write_sfnt_header()));

        let compressed_data = self.compress_data();
        let tables_len = self
            .tables
            .iter()
            .map(TableRecord::woff2_len)
            .sum::<usize>();
        let mut file_len = Self::WOFF2_HEADER_LEN + tables_len + compressed_data.len();
        if file_len % 4 != 0 {
            file_len += 4 - file_len % 4;
        }

        let mut buffer = vec![];
        write_u32(&mut buffer, WOFF2_SIGNATURE);
        write_u32(&mut buffer, self.flavor);
        write_u32(
            &mut buffer,
            file_len.try_into().expect("file length overflow"),
        );
        // `unwrap()` is safe: we don't write many tables
        write_u16(&mut buffer, self.tables.len().try_into().unwrap());
        write_u16(&mut buffer, 0); // reserved

        let decompressed_len = self.data_offset() + self.table_data.len();
        // `unwrap`s are safe, since `file_len` fits into u32.
        write_u32(&mut buffer, decompressed_len.try_into().unwrap());
        write_u32(&mut buffer, compressed_data.len().try_into().unwrap());
        write_u32(&mut buffer, 0); // WOFF version
        write_u32(&mut buffer, 0); // metadata offset
        write_u32(&mut buffer, 0); // metadata length
        write_u32(&mut buffer, 0); // original metadata length
        write_u32(&mut buffer, 0); // private block offset
        write_u32(&mut buffer, 0); // private block length
        debug_assert_eq!(buffer.len(), Self::WOFF2_HEADER_LEN);

        for record in &self.tables {
            record.write_woff2(&mut buffer);
        }
        debug_assert_eq!(buffer.len(), Self::WOFF2_HEADER_LEN + tables_len);
        buffer.extend(compressed_data);

        // Pad to a 4-byte boundary. This is required even though we don't
        // have metadata or private blocks.
        if buffer.len() % 4 != 0 {
            let padding = 4 - buffer.len() % 4;
            buffer.extend(iter::repeat(0).take(padding));
        }
        buffer
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Byte-level fixture builders shared between test modules.

    pub(crate) use super::{write_u16 as push_u16, write_u32 as push_u32};
    use crate::glyf::GlyphComponent;

    /// Serializes a simple glyph with uncompressed flags and word deltas.
    pub(crate) fn serialize_simple_glyph(
        contours: &[&[(i16, i16, bool)]],
        instructions: &[u8],
    ) -> Vec<u8> {
        let points: Vec<_> = contours.iter().flat_map(|contour| contour.iter()).collect();
        let (mut x_min, mut y_min, mut x_max, mut y_max) = (i16::MAX, i16::MAX, i16::MIN, i16::MIN);
        for &&(x, y, _) in &points {
            x_min = x_min.min(x);
            y_min = y_min.min(y);
            x_max = x_max.max(x);
            y_max = y_max.max(y);
        }
        if points.is_empty() {
            (x_min, y_min, x_max, y_max) = (0, 0, 0, 0);
        }

        let mut bytes = vec![];
        push_u16(&mut bytes, contours.len() as u16);
        for value in [x_min, y_min, x_max, y_max] {
            push_u16(&mut bytes, value as u16);
        }
        let mut last = 0_i32;
        for contour in contours {
            last += contour.len() as i32;
            push_u16(&mut bytes, (last - 1) as u16);
        }
        push_u16(&mut bytes, instructions.len() as u16);
        bytes.extend_from_slice(instructions);
        for &&(_, _, on_curve) in &points {
            bytes.push(u8::from(on_curve));
        }
        let mut prev = 0_i16;
        for &&(x, ..) in &points {
            push_u16(&mut bytes, x.wrapping_sub(prev) as u16);
            prev = x;
        }
        let mut prev = 0_i16;
        for &&(_, y, _) in &points {
            push_u16(&mut bytes, y.wrapping_sub(prev) as u16);
            prev = y;
        }
        bytes
    }

    /// Serializes a composite glyph with word xy-offset components.
    pub(crate) fn serialize_composite(
        components: &[(u16, i16, i16)],
        instructions: &[u8],
    ) -> Vec<u8> {
        let mut bytes = vec![];
        push_u16(&mut bytes, (-1_i16) as u16);
        for _ in 0..4 {
            push_u16(&mut bytes, 0); // bounding box
        }
        for (idx, &(glyph_id, dx, dy)) in components.iter().enumerate() {
            let mut flags =
                GlyphComponent::ARG_1_AND_2_ARE_WORDS | GlyphComponent::ARGS_ARE_XY_VALUES;
            if idx + 1 < components.len() {
                flags |= GlyphComponent::MORE_COMPONENTS;
            } else if !instructions.is_empty() {
                flags |= GlyphComponent::WE_HAVE_INSTRUCTIONS;
            }
            push_u16(&mut bytes, flags);
            push_u16(&mut bytes, glyph_id);
            push_u16(&mut bytes, dx as u16);
            push_u16(&mut bytes, dy as u16);
        }
        if !instructions.is_empty() {
            push_u16(&mut bytes, instructions.len() as u16);
            bytes.extend_from_slice(instructions);
        }
        bytes
    }

    /// Builds a minimal two-glyph CFF table: `.notdef` (empty) and a
    /// 100x100 box starting at x=10.
    pub(crate) fn build_test_cff() -> Vec<u8> {
        use super::cff::{encode_dict_int, encode_dict_offset, IndexBuilder};

        let notdef = vec![14]; // endchar
        let mut box_glyph = vec![];
        let push_num = |bytes: &mut Vec<u8>, value: i16| {
            super::cff::encode_charstring_int(bytes, value.into());
        };
        push_num(&mut box_glyph, 10);
        push_num(&mut box_glyph, 0);
        box_glyph.push(21); // rmoveto
        push_num(&mut box_glyph, 100);
        box_glyph.push(6); // hlineto
        push_num(&mut box_glyph, 100);
        box_glyph.push(7); // vlineto
        push_num(&mut box_glyph, -100);
        box_glyph.push(6); // hlineto
        box_glyph.push(14); // endchar

        let mut name_index = IndexBuilder::default();
        name_index.push(b"TestSans-Regular".to_vec());
        let name_index = name_index.encode(false);
        let string_index = IndexBuilder::default().encode(false);
        let global_subrs = IndexBuilder::default().encode(false);

        let mut charstrings = IndexBuilder::default();
        charstrings.push(notdef);
        charstrings.push(box_glyph);
        let charstrings = charstrings.encode(false);

        let mut private_dict = vec![];
        encode_dict_int(&mut private_dict, 0);
        private_dict.push(20); // defaultWidthX
        encode_dict_int(&mut private_dict, 0);
        private_dict.push(21); // nominalWidthX

        // The Top DICT uses fixed-width offsets so its length is stable.
        let build_top_dict = |charstrings_offset: i32, private_offset: i32| {
            let mut dict = vec![];
            encode_dict_offset(&mut dict, charstrings_offset);
            dict.push(17); // CharStrings
            encode_dict_int(&mut dict, private_dict.len() as i32);
            encode_dict_offset(&mut dict, private_offset);
            dict.push(18); // Private
            dict
        };
        let mut top_dict_index = IndexBuilder::default();
        top_dict_index.push(build_top_dict(0, 0));
        let top_dict_index_len = top_dict_index.encode(false).len();

        let header_len = 4;
        let charstrings_offset =
            header_len + name_index.len() + top_dict_index_len + string_index.len() + global_subrs.len();
        let private_offset = charstrings_offset + charstrings.len();

        let mut top_dict_index = IndexBuilder::default();
        top_dict_index.push(build_top_dict(
            charstrings_offset as i32,
            private_offset as i32,
        ));
        let top_dict_index = top_dict_index.encode(false);
        assert_eq!(top_dict_index.len(), top_dict_index_len);

        let mut cff = vec![1, 0, 4, 4]; // major, minor, hdrSize, offSize
        cff.extend_from_slice(&name_index);
        cff.extend_from_slice(&top_dict_index);
        cff.extend_from_slice(&string_index);
        cff.extend_from_slice(&global_subrs);
        cff.extend_from_slice(&charstrings);
        cff.extend_from_slice(&private_dict);
        cff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_padded_words() {
        assert_eq!(checksum(&[0, 0, 0, 1, 0, 0, 0, 2]), 3);
        // Trailing bytes are zero-padded.
        assert_eq!(checksum(&[0, 0, 0, 1, 0x80]), 0x8000_0001);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn base128_encoding() {
        let samples = &[
            (0_u32, &[0_u8] as &[u8]),
            (1, &[1]),
            (127, &[127]),
            (128, &[0x81, 0]),
            (129, &[0x81, 1]),
            (16_383, &[0xff, 0x7f]),
            (16_384, &[0x81, 0x80, 0]),
        ];
        for &(val, expected) in samples {
            assert_eq!(uint_base128_len(val), expected.len());
            let mut buffer = vec![];
            write_uint_base128(&mut buffer, val);
            assert_eq!(buffer, expected);
        }
    }

    #[test]
    fn sfnt_assembly_satisfies_checksum_equation() {
        let mut writer = FontWriter::truetype();
        // A fake head table: all zeros except the magic.
        writer.write_table(Tag::HEAD, |buffer| {
            buffer.extend_from_slice(&[0; 12]);
            write_u32(buffer, 0x5f0f_3cf5);
            buffer.extend_from_slice(&[0; 38]);
        });
        writer.write_raw_table(Tag::MAXP, &[0, 0, 0x50, 0, 0, 3]);

        let sfnt = writer.into_opentype();
        assert_eq!(checksum(&sfnt), SFNT_CHECKSUM);
    }

    #[test]
    fn table_padding_is_applied() {
        let mut writer = FontWriter::truetype();
        writer.write_raw_table(Tag(*b"test"), &[1, 2, 3]);
        assert_eq!(writer.table_data.len(), 4);
        assert_eq!(writer.tables[0].length, 3);
        assert_eq!(writer.tables[0].checksum, checksum(&[1, 2, 3, 0]));
    }
}
