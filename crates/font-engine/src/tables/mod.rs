//! Parsers for the core SFNT tables.

use core::fmt;

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
};

pub(crate) mod cmap;
pub(crate) mod kern;
pub(crate) mod metrics;
pub(crate) mod name;
pub(crate) mod post;

/// 4-byte tag identifying a font table, variation axis or similar entity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub(crate) const AVAR: Self = Self(*b"avar");
    pub(crate) const CFF: Self = Self(*b"CFF ");
    pub(crate) const CFF2: Self = Self(*b"CFF2");
    pub(crate) const CMAP: Self = Self(*b"cmap");
    pub(crate) const CVAR: Self = Self(*b"cvar");
    pub(crate) const CVT: Self = Self(*b"cvt ");
    pub(crate) const FPGM: Self = Self(*b"fpgm");
    pub(crate) const FVAR: Self = Self(*b"fvar");
    pub(crate) const GLYF: Self = Self(*b"glyf");
    pub(crate) const GVAR: Self = Self(*b"gvar");
    pub(crate) const HEAD: Self = Self(*b"head");
    pub(crate) const HHEA: Self = Self(*b"hhea");
    pub(crate) const HMTX: Self = Self(*b"hmtx");
    pub(crate) const HVAR: Self = Self(*b"HVAR");
    pub(crate) const KERN: Self = Self(*b"kern");
    pub(crate) const LOCA: Self = Self(*b"loca");
    pub(crate) const MAXP: Self = Self(*b"maxp");
    pub(crate) const MVAR: Self = Self(*b"MVAR");
    pub(crate) const NAME: Self = Self(*b"name");
    pub(crate) const OS2: Self = Self(*b"OS/2");
    pub(crate) const POST: Self = Self(*b"post");
    pub(crate) const PREP: Self = Self(*b"prep");
    pub(crate) const VHEA: Self = Self(*b"vhea");
    pub(crate) const VMTX: Self = Self(*b"vmtx");
    pub(crate) const VORG: Self = Self(*b"VORG");
    pub(crate) const VVAR: Self = Self(*b"VVAR");

    pub(crate) fn as_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            let ch = if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte)
            } else {
                char::REPLACEMENT_CHARACTER
            };
            write!(formatter, "{ch}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Tag({self})")
    }
}

/// Width of `loca` table offsets, selected by `head.indexToLocFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocaFormat {
    Short,
    Long,
}

impl LocaFormat {
    pub(crate) const fn bytes_per_offset(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Long => 4,
        }
    }
}

/// Parsed `head` table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeadTable<'a> {
    pub(crate) raw: &'a [u8],
    pub(crate) units_per_em: u16,
    pub(crate) bbox: [i16; 4],
    pub(crate) loca_format: LocaFormat,
}

impl<'a> HeadTable<'a> {
    const MAGIC: u32 = 0x5f0f_3cf5;
    pub(crate) const CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;
    pub(crate) const LOCA_FORMAT_OFFSET: usize = 50;

    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(bytes, base, Tag::HEAD);
        cursor.read_u32_checked(|version| {
            if version == 0x0001_0000 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion { version })
            }
        })?;
        cursor.skip(8)?; // fontRevision, checksumAdjustment
        cursor.read_u32_checked(|magic| {
            if magic == Self::MAGIC {
                Ok(())
            } else {
                Err(ParseErrorKind::BadMagic { magic })
            }
        })?;
        cursor.skip(2)?; // flags
        let units_per_em = cursor.read_u16()?;
        cursor.skip(16)?; // created, modified
        let bbox = [
            cursor.read_i16()?,
            cursor.read_i16()?,
            cursor.read_i16()?,
            cursor.read_i16()?,
        ];
        cursor.skip(6)?; // macStyle, lowestRecPPEM, fontDirectionHint
        let loca_format = cursor.read_u16_checked(|raw| match raw {
            0 => Ok(LocaFormat::Short),
            1 => Ok(LocaFormat::Long),
            _ => Err(ParseErrorKind::Malformed("unknown indexToLocFormat")),
        })?;

        Ok(Self {
            raw: bytes,
            units_per_em,
            bbox,
            loca_format,
        })
    }
}

/// Parsed `maxp` table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MaxpTable<'a> {
    pub(crate) raw: &'a [u8],
    pub(crate) num_glyphs: u16,
}

impl<'a> MaxpTable<'a> {
    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(bytes, base, Tag::MAXP);
        cursor.read_u32_checked(|version| {
            if version == 0x0000_5000 || version == 0x0001_0000 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion { version })
            }
        })?;
        let num_glyphs = cursor.read_u16()?;
        Ok(Self {
            raw: bytes,
            num_glyphs,
        })
    }
}

/// Parsed `OS/2` table (the fields the facade exposes).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Os2Table<'a> {
    pub(crate) raw: &'a [u8],
    pub(crate) typo_ascender: i16,
    pub(crate) typo_descender: i16,
    pub(crate) typo_line_gap: i16,
    pub(crate) x_height: Option<i16>,
    pub(crate) cap_height: Option<i16>,
}

impl<'a> Os2Table<'a> {
    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(bytes, base, Tag::OS2);
        let version = cursor.read_u16()?;
        cursor.skip(66)?; // metrics, Panose, Unicode ranges, vendor, selection, char indices
        let typo_ascender = cursor.read_i16()?;
        let typo_descender = cursor.read_i16()?;
        let typo_line_gap = cursor.read_i16()?;

        let (mut x_height, mut cap_height) = (None, None);
        if version >= 2 {
            cursor.skip(12)?; // usWinAscent, usWinDescent, ulCodePageRange1/2
            x_height = Some(cursor.read_i16()?);
            cap_height = Some(cursor.read_i16()?);
        }

        Ok(Self {
            raw: bytes,
            typo_ascender,
            typo_descender,
            typo_line_gap,
            x_height,
            cap_height,
        })
    }
}

/// Parsed `VORG` table.
#[derive(Debug, Clone)]
pub(crate) struct VorgTable {
    pub(crate) default_origin_y: i16,
    /// Sorted by glyph ID.
    pub(crate) origins: Vec<(u16, i16)>,
}

impl VorgTable {
    pub(crate) fn parse(bytes: &[u8], base: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(bytes, base, Tag::VORG);
        cursor.read_u32_checked(|version| {
            if version == 0x0001_0000 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion { version })
            }
        })?;
        let default_origin_y = cursor.read_i16()?;
        let num_entries = cursor.read_u16()?;
        let origins = (0..num_entries)
            .map(|_| Ok((cursor.read_u16()?, cursor.read_i16()?)))
            .collect::<Result<_, ParseError>>()?;
        Ok(Self {
            default_origin_y,
            origins,
        })
    }

    pub(crate) fn origin_y(&self, glyph_id: u16) -> i16 {
        self.origins
            .binary_search_by_key(&glyph_id, |&(id, _)| id)
            .map_or(self.default_origin_y, |idx| self.origins[idx].1)
    }
}
