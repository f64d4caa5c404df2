//! `CFF` and `CFF2` table processing.

use crate::{
    cff::{
        charstring::BlendState,
        dict::{ops, Dict},
        index::Index,
    },
    errors::{ParseError, ParseErrorKind},
    outline::OutlineSink,
    reader::Cursor,
    tables::Tag,
    var::store::ItemVariationStore,
};

pub(crate) mod charstring;
pub(crate) mod dict;
pub(crate) mod index;

/// Mapping from glyph IDs to string IDs (SIDs).
#[derive(Debug, Clone)]
pub(crate) enum Charset {
    /// Predefined charsets; SIDs match glyph IDs closely enough for subset
    /// re-emission.
    Identity,
    /// Explicit per-glyph SIDs, glyph 0 included.
    Sids(Vec<u16>),
}

impl Charset {
    fn parse(mut cursor: Cursor<'_>, num_glyphs: u16) -> Result<Self, ParseError> {
        let format = cursor.read_u8()?;
        let mut sids = Vec::with_capacity(usize::from(num_glyphs));
        sids.push(0); // .notdef
        match format {
            0 => {
                for _ in 1..num_glyphs {
                    sids.push(cursor.read_u16()?);
                }
            }
            1 | 2 => {
                while sids.len() < usize::from(num_glyphs) {
                    let first = cursor.read_u16()?;
                    let n_left = if format == 1 {
                        u16::from(cursor.read_u8()?)
                    } else {
                        cursor.read_u16()?
                    };
                    for offset in 0..=n_left {
                        if sids.len() >= usize::from(num_glyphs) {
                            break;
                        }
                        sids.push(first.wrapping_add(offset));
                    }
                }
            }
            _ => {
                return Err(cursor.err(ParseErrorKind::UnexpectedTableFormat {
                    format: format.into(),
                }))
            }
        }
        Ok(Self::Sids(sids))
    }

    pub(crate) fn sid(&self, glyph_id: u16) -> u16 {
        match self {
            Self::Identity => glyph_id,
            Self::Sids(sids) => sids.get(usize::from(glyph_id)).copied().unwrap_or(0),
        }
    }
}

/// Glyph-to-font-dict assignment of a CID-keyed font.
#[derive(Debug, Clone)]
enum FdSelect {
    Format0(Vec<u8>),
    /// Ranges `(first_glyph, fd)` plus a sentinel glyph count.
    Format3(Vec<(u16, u8)>, u16),
}

impl FdSelect {
    fn parse(mut cursor: Cursor<'_>, num_glyphs: u16) -> Result<Self, ParseError> {
        let format = cursor.read_u8()?;
        match format {
            0 => {
                let fds = (0..num_glyphs)
                    .map(|_| cursor.read_u8())
                    .collect::<Result<_, _>>()?;
                Ok(Self::Format0(fds))
            }
            3 => {
                let n_ranges = cursor.read_u16()?;
                let ranges = (0..n_ranges)
                    .map(|_| Ok((cursor.read_u16()?, cursor.read_u8()?)))
                    .collect::<Result<_, ParseError>>()?;
                let sentinel = cursor.read_u16()?;
                Ok(Self::Format3(ranges, sentinel))
            }
            _ => Err(cursor.err(ParseErrorKind::UnexpectedTableFormat {
                format: format.into(),
            })),
        }
    }

    fn fd(&self, glyph_id: u16) -> usize {
        match self {
            Self::Format0(fds) => fds.get(usize::from(glyph_id)).copied().unwrap_or(0).into(),
            Self::Format3(ranges, sentinel) => {
                if glyph_id >= *sentinel {
                    return 0;
                }
                let idx = match ranges.binary_search_by_key(&glyph_id, |&(first, _)| first) {
                    Ok(idx) => idx,
                    Err(0) => return 0,
                    Err(idx) => idx - 1,
                };
                ranges[idx].1.into()
            }
        }
    }
}

/// A font DICT with its Private DICT and local subroutines. Non-CID fonts
/// have exactly one.
#[derive(Debug, Clone)]
pub(crate) struct FontDict<'a> {
    pub(crate) private_dict: Dict,
    pub(crate) local_subrs: Index<'a>,
}

impl<'a> FontDict<'a> {
    fn from_private_entry(table: Cursor<'a>, dict: &Dict) -> Result<Self, ParseError> {
        let Some((size, offset)) = dict.size_and_offset(ops::PRIVATE) else {
            return Ok(Self {
                private_dict: Dict::default(),
                local_subrs: Index::default(),
            });
        };
        let private_cursor = table.range(offset..offset + size)?;
        let private_dict = Dict::parse(private_cursor)?;
        let local_subrs = if let Some(subrs_offset) = private_dict.int(ops::SUBRS) {
            let subrs_offset = usize::try_from(subrs_offset)
                .map_err(|_| table.err(ParseErrorKind::Malformed("negative Subrs offset")))?;
            let mut cursor = table.range(offset + subrs_offset..table.len())?;
            Index::parse(&mut cursor, false)?
        } else {
            Index::default()
        };
        Ok(Self {
            private_dict,
            local_subrs,
        })
    }
}

/// Parsed `CFF ` table.
#[derive(Debug, Clone)]
pub(crate) struct CffTable<'a> {
    pub(crate) name: &'a [u8],
    pub(crate) strings: Index<'a>,
    pub(crate) global_subrs: Index<'a>,
    pub(crate) charstrings: Index<'a>,
    pub(crate) charset: Charset,
    pub(crate) is_cid: bool,
    fonts: Vec<FontDict<'a>>,
    fd_select: Option<FdSelect>,
}

impl<'a> CffTable<'a> {
    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let table = Cursor::for_table(bytes, base, Tag::CFF);
        let mut cursor = table;
        cursor.skip(2)?; // major, minor
        let header_size = cursor.read_u8()?;
        cursor.skip(1)?; // offSize
        let mut cursor = table.range(usize::from(header_size)..table.len())?;

        let names = Index::parse(&mut cursor, false)?;
        let top_dicts = Index::parse(&mut cursor, false)?;
        let strings = Index::parse(&mut cursor, false)?;
        let global_subrs = Index::parse(&mut cursor, false)?;

        let name = names.get(0)?;
        let top_dict = Dict::parse(Cursor::new(top_dicts.get(0)?))?;

        let charstrings_offset = top_dict
            .int(ops::CHAR_STRINGS)
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or_else(|| table.err(ParseErrorKind::Malformed("missing CharStrings entry")))?;
        let mut charstrings_cursor = table.range(charstrings_offset..table.len())?;
        let charstrings = Index::parse(&mut charstrings_cursor, false)?;
        let num_glyphs = u16::try_from(charstrings.len()).unwrap_or(u16::MAX);

        let charset = match top_dict.int(ops::CHARSET) {
            None | Some(0..=2) => Charset::Identity,
            Some(offset) => {
                let offset = usize::try_from(offset)
                    .map_err(|_| table.err(ParseErrorKind::Malformed("negative charset offset")))?;
                Charset::parse(table.range(offset..table.len())?, num_glyphs)?
            }
        };

        let is_cid = top_dict.contains(ops::ROS);
        let (fonts, fd_select) = if is_cid {
            let fd_array_offset = top_dict
                .int(ops::FD_ARRAY)
                .and_then(|offset| usize::try_from(offset).ok())
                .ok_or_else(|| table.err(ParseErrorKind::Malformed("CID font without FDArray")))?;
            let mut fd_cursor = table.range(fd_array_offset..table.len())?;
            let fd_array = Index::parse(&mut fd_cursor, false)?;
            let fonts = fd_array
                .iter()
                .map(|font_dict| {
                    let font_dict = Dict::parse(Cursor::new(font_dict?))?;
                    FontDict::from_private_entry(table, &font_dict)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let fd_select_offset = top_dict
                .int(ops::FD_SELECT)
                .and_then(|offset| usize::try_from(offset).ok())
                .ok_or_else(|| table.err(ParseErrorKind::Malformed("CID font without FDSelect")))?;
            let fd_select = FdSelect::parse(table.range(fd_select_offset..table.len())?, num_glyphs)?;
            (fonts, Some(fd_select))
        } else {
            (vec![FontDict::from_private_entry(table, &top_dict)?], None)
        };
        if fonts.is_empty() {
            return Err(table.err(ParseErrorKind::Malformed("empty FDArray")));
        }

        Ok(Self {
            name,
            strings,
            global_subrs,
            charstrings,
            charset,
            is_cid,
            fonts,
            fd_select,
        })
    }

    pub(crate) fn num_glyphs(&self) -> u16 {
        u16::try_from(self.charstrings.len()).unwrap_or(u16::MAX)
    }

    pub(crate) fn font_dict(&self, glyph_id: u16) -> &FontDict<'a> {
        let fd = self
            .fd_select
            .as_ref()
            .map_or(0, |fd_select| fd_select.fd(glyph_id));
        self.fonts.get(fd).unwrap_or(&self.fonts[0])
    }

    /// Interprets the glyph's charstring into `sink`.
    pub(crate) fn outline(
        &self,
        glyph_id: u16,
        sink: &mut impl OutlineSink,
    ) -> Result<(), ParseError> {
        let charstring = self
            .charstrings
            .get(glyph_id.into())
            .map_err(|err| err.with_table(Tag::CFF))?;
        let font_dict = self.font_dict(glyph_id);
        charstring::evaluate(
            charstring,
            self.global_subrs,
            Some(font_dict.local_subrs),
            None,
            false,
            sink,
        )
        .map_err(|err| err.with_table(Tag::CFF))
    }
}

/// Parsed `CFF2` table.
#[derive(Debug, Clone)]
pub(crate) struct Cff2Table<'a> {
    pub(crate) global_subrs: Index<'a>,
    pub(crate) charstrings: Index<'a>,
    pub(crate) var_store: Option<ItemVariationStore>,
    fonts: Vec<FontDict<'a>>,
    fd_select: Option<FdSelect>,
}

impl<'a> Cff2Table<'a> {
    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let table = Cursor::for_table(bytes, base, Tag::CFF2);
        let mut cursor = table;
        cursor.read_u8().and_then(|major| {
            if major == 2 {
                Ok(())
            } else {
                Err(cursor.err(ParseErrorKind::UnexpectedTableVersion {
                    version: major.into(),
                }))
            }
        })?;
        cursor.skip(1)?; // minor
        let header_size = cursor.read_u8()?;
        let top_dict_len = cursor.read_u16()?;

        let top_dict_start = usize::from(header_size);
        let top_dict = Dict::parse(table.range(top_dict_start..top_dict_start + usize::from(top_dict_len))?)?;
        let mut cursor = table.range(top_dict_start + usize::from(top_dict_len)..table.len())?;
        let global_subrs = Index::parse(&mut cursor, true)?;

        let charstrings_offset = top_dict
            .int(ops::CHAR_STRINGS)
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or_else(|| table.err(ParseErrorKind::Malformed("missing CharStrings entry")))?;
        let mut charstrings_cursor = table.range(charstrings_offset..table.len())?;
        let charstrings = Index::parse(&mut charstrings_cursor, true)?;
        let num_glyphs = u16::try_from(charstrings.len()).unwrap_or(u16::MAX);

        // `vstore` data is prefixed with a 2-byte length.
        let var_store = match top_dict.int(ops::VSTORE) {
            Some(offset) => {
                let offset = usize::try_from(offset)
                    .map_err(|_| table.err(ParseErrorKind::Malformed("negative vstore offset")))?;
                let mut length_cursor = table.range(offset..table.len())?;
                let length = usize::from(length_cursor.read_u16()?);
                let store_cursor = table.range(offset + 2..(offset + 2 + length).min(table.len()))?;
                Some(ItemVariationStore::parse(store_cursor)?)
            }
            None => None,
        };

        let fonts = match top_dict.int(ops::FD_ARRAY) {
            Some(offset) => {
                let offset = usize::try_from(offset)
                    .map_err(|_| table.err(ParseErrorKind::Malformed("negative FDArray offset")))?;
                let mut fd_cursor = table.range(offset..table.len())?;
                let fd_array = Index::parse(&mut fd_cursor, true)?;
                fd_array
                    .iter()
                    .map(|font_dict| {
                        let font_dict = Dict::parse(Cursor::new(font_dict?))?;
                        FontDict::from_private_entry(table, &font_dict)
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => vec![FontDict {
                private_dict: Dict::default(),
                local_subrs: Index::default(),
            }],
        };

        let fd_select = match top_dict.int(ops::FD_SELECT) {
            Some(offset) => {
                let offset = usize::try_from(offset)
                    .map_err(|_| table.err(ParseErrorKind::Malformed("negative FDSelect offset")))?;
                Some(FdSelect::parse(table.range(offset..table.len())?, num_glyphs)?)
            }
            None => None,
        };
        if fonts.is_empty() {
            return Err(table.err(ParseErrorKind::Malformed("empty FDArray")));
        }

        Ok(Self {
            global_subrs,
            charstrings,
            var_store,
            fonts,
            fd_select,
        })
    }

    pub(crate) fn num_glyphs(&self) -> u16 {
        u16::try_from(self.charstrings.len()).unwrap_or(u16::MAX)
    }

    fn font_dict(&self, glyph_id: u16) -> &FontDict<'a> {
        let fd = self
            .fd_select
            .as_ref()
            .map_or(0, |fd_select| fd_select.fd(glyph_id));
        self.fonts.get(fd).unwrap_or(&self.fonts[0])
    }

    /// Interprets the glyph's charstring into `sink` at the given normalized
    /// coordinates (empty slice means the default location).
    pub(crate) fn outline(
        &self,
        glyph_id: u16,
        coords: &[f32],
        sink: &mut impl OutlineSink,
    ) -> Result<(), ParseError> {
        let charstring = self
            .charstrings
            .get(glyph_id.into())
            .map_err(|err| err.with_table(Tag::CFF2))?;
        let font_dict = self.font_dict(glyph_id);
        let blend = match &self.var_store {
            Some(store) => {
                // The Private DICT may preselect a variation data subtable.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let initial = font_dict.private_dict.int(dict::ops::VSINDEX).unwrap_or(0) as u16;
                Some(BlendState::new(store, coords, initial).map_err(|err| err.with_table(Tag::CFF2))?)
            }
            None => None,
        };
        charstring::evaluate(
            charstring,
            self.global_subrs,
            Some(font_dict.local_subrs),
            blend,
            true,
            sink,
        )
        .map_err(|err| err.with_table(Tag::CFF2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        outline::{Outline, OutlineCommand},
        write::testing::build_test_cff,
    };

    #[test]
    fn parsing_and_outlining_synthetic_cff() {
        // A two-glyph font: .notdef (empty) and a 100x100 box.
        let cff = build_test_cff();
        let table = CffTable::parse(&cff, 0).unwrap();
        assert_eq!(table.num_glyphs(), 2);
        assert!(!table.is_cid);
        assert_eq!(table.name, b"TestSans-Regular");

        let mut outline = Outline::default();
        table.outline(1, &mut outline).unwrap();
        assert_eq!(
            outline.commands(),
            [
                OutlineCommand::MoveTo(10.0, 0.0),
                OutlineCommand::LineTo(110.0, 0.0),
                OutlineCommand::LineTo(110.0, 100.0),
                OutlineCommand::LineTo(10.0, 100.0),
                OutlineCommand::Close,
            ]
        );

        let mut empty = Outline::default();
        table.outline(0, &mut empty).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn fd_select_ranges() {
        let fd_select = FdSelect::Format3(vec![(0, 0), (10, 2), (20, 1)], 30);
        assert_eq!(fd_select.fd(0), 0);
        assert_eq!(fd_select.fd(9), 0);
        assert_eq!(fd_select.fd(10), 2);
        assert_eq!(fd_select.fd(19), 2);
        assert_eq!(fd_select.fd(20), 1);
        assert_eq!(fd_select.fd(29), 1);
        assert_eq!(fd_select.fd(30), 0);
    }
}
