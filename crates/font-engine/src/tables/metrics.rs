//! Horizontal and vertical metrics tables (`hhea`/`vhea`, `hmtx`/`vmtx`).

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
    tables::Tag,
};

/// Parsed `hhea` or `vhea` table; the two share a layout.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HheaTable<'a> {
    pub(crate) raw: &'a [u8],
    pub(crate) ascender: i16,
    pub(crate) descender: i16,
    pub(crate) line_gap: i16,
    pub(crate) number_of_metrics: u16,
}

impl<'a> HheaTable<'a> {
    pub(crate) const EXPECTED_LEN: usize = 36; // 18 big-endian words

    pub(crate) fn parse(bytes: &'a [u8], base: usize, tag: Tag) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(bytes, base, tag);
        if bytes.len() != Self::EXPECTED_LEN {
            return Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::EXPECTED_LEN,
                actual: bytes.len(),
            }));
        }
        cursor.skip(4)?; // version
        let ascender = cursor.read_i16()?;
        let descender = cursor.read_i16()?;
        let line_gap = cursor.read_i16()?;
        cursor.skip(24)?; // advance/extent maxima, slope, offsets, reserved, metricDataFormat
        let number_of_metrics = cursor.read_u16()?;

        Ok(Self {
            raw: bytes,
            ascender,
            descender,
            line_gap,
            number_of_metrics,
        })
    }
}

/// Parsed `hmtx` or `vmtx` table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HmtxTable<'a> {
    raw: &'a [u8],
    base: usize,
    tag: Tag,
    number_of_metrics: u16,
}

impl<'a> HmtxTable<'a> {
    pub(crate) fn new(raw: &'a [u8], base: usize, tag: Tag, number_of_metrics: u16) -> Self {
        Self {
            raw,
            base,
            tag,
            number_of_metrics,
        }
    }

    /// Returns the advance and side bearing for a glyph. Glyphs past
    /// `numberOfHMetrics` reuse the last advance and read their side bearing
    /// from the trailing array.
    pub(crate) fn advance_and_sb(&self, glyph_id: u16) -> Result<(u16, i16), ParseError> {
        let full_metrics = usize::from(self.number_of_metrics);
        let glyph_idx = usize::from(glyph_id);
        let (advance, side_bearing);
        if glyph_idx < full_metrics {
            let mut cursor = self.metrics_at(glyph_idx * 4)?;
            advance = cursor.read_u16()?;
            side_bearing = cursor.read_i16()?;
        } else {
            let last_full = full_metrics
                .checked_sub(1)
                .ok_or_else(|| self.err_no_metrics())?;
            let mut cursor = self.metrics_at(last_full * 4)?;
            advance = cursor.read_u16()?;

            let sb_offset = full_metrics * 4 + (glyph_idx - full_metrics) * 2;
            let mut cursor = self.metrics_at(sb_offset)?;
            side_bearing = cursor.read_i16()?;
        }
        Ok((advance, side_bearing))
    }

    fn metrics_at(&self, offset: usize) -> Result<Cursor<'a>, ParseError> {
        if self.raw.len() < offset {
            Err(ParseError::new(ParseErrorKind::OffsetOutOfBounds(offset))
                .with_table(self.tag)
                .with_offset(self.base + self.raw.len()))
        } else {
            Ok(Cursor::for_table(
                &self.raw[offset..],
                self.base + offset,
                self.tag,
            ))
        }
    }

    fn err_no_metrics(&self) -> ParseError {
        ParseError::new(ParseErrorKind::Malformed("no long metric records"))
            .with_table(self.tag)
            .with_offset(self.base)
    }
}
