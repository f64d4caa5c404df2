//! `post` table processing.

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
    tables::Tag,
};

/// The 258 standard Macintosh glyph names that `post` 2.0 name indices below
/// 258 resolve against.
#[rustfmt::skip]
pub(crate) const MACINTOSH_GLYPH_NAMES: [&str; 258] = [
    ".notdef", ".null", "nonmarkingreturn", "space", "exclam", "quotedbl",
    "numbersign", "dollar", "percent", "ampersand", "quotesingle", "parenleft",
    "parenright", "asterisk", "plus", "comma", "hyphen", "period", "slash",
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight",
    "nine", "colon", "semicolon", "less", "equal", "greater", "question", "at",
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O",
    "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "bracketleft",
    "backslash", "bracketright", "asciicircum", "underscore", "grave", "a",
    "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p",
    "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar",
    "braceright", "asciitilde", "Adieresis", "Aring", "Ccedilla", "Eacute",
    "Ntilde", "Odieresis", "Udieresis", "aacute", "agrave", "acircumflex",
    "adieresis", "atilde", "aring", "ccedilla", "eacute", "egrave",
    "ecircumflex", "edieresis", "iacute", "igrave", "icircumflex", "idieresis",
    "ntilde", "oacute", "ograve", "ocircumflex", "odieresis", "otilde",
    "uacute", "ugrave", "ucircumflex", "udieresis", "dagger", "degree", "cent",
    "sterling", "section", "bullet", "paragraph", "germandbls", "registered",
    "copyright", "trademark", "acute", "dieresis", "notequal", "AE", "Oslash",
    "infinity", "plusminus", "lessequal", "greaterequal", "yen", "mu",
    "partialdiff", "summation", "product", "pi", "integral", "ordfeminine",
    "ordmasculine", "Omega", "ae", "oslash", "questiondown", "exclamdown",
    "logicalnot", "radical", "florin", "approxequal", "Delta", "guillemotleft",
    "guillemotright", "ellipsis", "nonbreakingspace", "Agrave", "Atilde",
    "Otilde", "OE", "oe", "endash", "emdash", "quotedblleft", "quotedblright",
    "quoteleft", "quoteright", "divide", "lozenge", "ydieresis", "Ydieresis",
    "fraction", "currency", "guilsinglleft", "guilsinglright", "fi", "fl",
    "daggerdbl", "periodcentered", "quotesinglbase", "quotedblbase",
    "perthousand", "Acircumflex", "Ecircumflex", "Aacute", "Edieresis",
    "Egrave", "Iacute", "Icircumflex", "Idieresis", "Igrave", "Oacute",
    "Ocircumflex", "apple", "Ograve", "Uacute", "Ucircumflex", "Ugrave",
    "dotlessi", "circumflex", "tilde", "macron", "breve", "dotaccent", "ring",
    "cedilla", "hungarumlaut", "ogonek", "caron", "Lslash", "lslash", "Scaron",
    "scaron", "Zcaron", "zcaron", "brokenbar", "Eth", "eth", "Yacute",
    "yacute", "Thorn", "thorn", "minus", "multiply", "onesuperior",
    "twosuperior", "threesuperior", "onehalf", "onequarter", "threequarters",
    "franc", "Gbreve", "gbreve", "Idotaccent", "Scedilla", "scedilla",
    "Cacute", "cacute", "Ccaron", "ccaron", "dcroat",
];

/// Glyph names carried by a `post` table.
#[derive(Debug, Clone, Default)]
enum GlyphNames<'a> {
    /// Versions 3.0 and 2.5 carry no usable names.
    #[default]
    None,
    /// Version 2.0: per-glyph name indices plus a Pascal-string pool.
    Indexed {
        indices: Vec<u16>,
        string_pool: Vec<&'a str>,
    },
}

/// Parsed `post` table.
#[derive(Debug, Clone)]
pub(crate) struct PostTable<'a> {
    pub(crate) raw: &'a [u8],
    names: GlyphNames<'a>,
}

impl<'a> PostTable<'a> {
    pub(crate) const HEADER_LEN: usize = 32;

    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(bytes, base, Tag::POST);
        let version = cursor.read_u32()?;
        cursor.skip(Self::HEADER_LEN - 4)?;
        // ^ italicAngle, underlinePosition/Thickness, isFixedPitch, memory usage hints

        let names = match version {
            0x0001_0000 | 0x0003_0000 => GlyphNames::None,
            // Deprecated reordering table; rejected rather than misread.
            0x0002_5000 => return Err(cursor.err(ParseErrorKind::UnsupportedFormat { version })),
            0x0002_0000 => Self::parse_names(&mut cursor)?,
            _ => return Err(cursor.err(ParseErrorKind::UnexpectedTableVersion { version })),
        };
        Ok(Self { raw: bytes, names })
    }

    fn parse_names(cursor: &mut Cursor<'a>) -> Result<GlyphNames<'a>, ParseError> {
        let num_glyphs = cursor.read_u16()?;
        let indices = (0..num_glyphs)
            .map(|_| cursor.read_u16())
            .collect::<Result<_, ParseError>>()?;

        let mut string_pool = vec![];
        while !cursor.is_empty() {
            let len = cursor.read_u8()?;
            let name = cursor.split_at(len.into())?;
            let name = core::str::from_utf8(name.bytes)
                .map_err(|_| name.err(ParseErrorKind::Malformed("glyph name is not ASCII")))?;
            string_pool.push(name);
        }
        Ok(GlyphNames::Indexed {
            indices,
            string_pool,
        })
    }

    /// Gets the name of a glyph, if the table carries names.
    pub(crate) fn glyph_name(&self, glyph_id: u16) -> Option<&str> {
        let GlyphNames::Indexed {
            indices,
            string_pool,
        } = &self.names
        else {
            return None;
        };
        let index = *indices.get(usize::from(glyph_id))?;
        if let Some(standard_idx) = usize::from(index).checked_sub(MACINTOSH_GLYPH_NAMES.len()) {
            string_pool.get(standard_idx).copied()
        } else {
            Some(MACINTOSH_GLYPH_NAMES[usize::from(index)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version2_table(indices: &[u16], names: &[&str]) -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend_from_slice(&0x0002_0000_u32.to_be_bytes());
        bytes.extend_from_slice(&[0; PostTable::HEADER_LEN - 4]);
        bytes.extend_from_slice(&(indices.len() as u16).to_be_bytes());
        for &index in indices {
            bytes.extend_from_slice(&index.to_be_bytes());
        }
        for name in names {
            bytes.push(name.len() as u8);
            bytes.extend_from_slice(name.as_bytes());
        }
        bytes
    }

    #[test]
    fn resolving_glyph_names() {
        let bytes = version2_table(&[0, 36, 258, 259], &["alpha.alt", "beta.alt"]);
        let post = PostTable::parse(&bytes, 0).unwrap();
        assert_eq!(post.glyph_name(0), Some(".notdef"));
        assert_eq!(post.glyph_name(1), Some("A"));
        assert_eq!(post.glyph_name(2), Some("alpha.alt"));
        assert_eq!(post.glyph_name(3), Some("beta.alt"));
        assert_eq!(post.glyph_name(4), None);
    }

    #[test]
    fn version3_has_no_names() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&0x0003_0000_u32.to_be_bytes());
        bytes.extend_from_slice(&[0; PostTable::HEADER_LEN - 4]);
        let post = PostTable::parse(&bytes, 0).unwrap();
        assert_eq!(post.glyph_name(0), None);
    }

    #[test]
    fn version2_5_is_rejected() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&0x0002_5000_u32.to_be_bytes());
        bytes.extend_from_slice(&[0; PostTable::HEADER_LEN - 4]);
        let err = PostTable::parse(&bytes, 0).unwrap_err();
        assert!(matches!(
            err.kind(),
            ParseErrorKind::UnsupportedFormat { version: 0x0002_5000 }
        ));
    }
}
