//! WOFF 2.0 container decoding: packed directory, Brotli stream and
//! transform inversion.

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
    tables::Tag,
    write::FontWriter,
};

pub(crate) mod glyf;

/// Known-table tags indexed by the 6-bit flag value of the packed WOFF2
/// directory; flag value 63 introduces an explicit 4-byte tag instead.
#[rustfmt::skip]
pub(crate) const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post",
    b"cvt ", b"fpgm", b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT",
    b"EBLC", b"gasp", b"hdmx", b"kern", b"LTSH", b"PCLT", b"VDMX", b"vhea",
    b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC", b"JSTF", b"MATH",
    b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar",
    b"gvar", b"hsty", b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop",
    b"trak", b"Zapf", b"Silf", b"Glat", b"Gloc", b"Feat", b"Sill",
];

/// Index of a tag in [`KNOWN_TAGS`], for directory emission.
pub(crate) fn known_tag_index(tag: Tag) -> Option<u8> {
    KNOWN_TAGS
        .iter()
        .position(|&known| *known == tag.0)
        .map(|idx| u8::try_from(idx).expect("63 known tags"))
}

/// Reads a 255UInt16 variable-length value.
pub(crate) fn read_255_u16(cursor: &mut Cursor<'_>) -> Result<u16, ParseError> {
    const WORD_CODE: u8 = 253;
    const ONE_MORE_BYTE_CODE_2: u8 = 254;
    const ONE_MORE_BYTE_CODE_1: u8 = 255;
    const LOWEST_U_CODE: u16 = 253;

    let code = cursor.read_u8()?;
    Ok(match code {
        WORD_CODE => cursor.read_u16()?,
        ONE_MORE_BYTE_CODE_1 => u16::from(cursor.read_u8()?) + LOWEST_U_CODE,
        ONE_MORE_BYTE_CODE_2 => u16::from(cursor.read_u8()?) + LOWEST_U_CODE * 2,
        _ => code.into(),
    })
}

/// Reads a UIntBase128 variable-length value (at most 5 bytes, no leading
/// zeros, no overflow).
pub(crate) fn read_base128(cursor: &mut Cursor<'_>) -> Result<u32, ParseError> {
    let mut result = 0_u32;
    for i in 0..5 {
        let code = cursor.read_u8()?;
        if i == 0 && code == 0x80 {
            return Err(cursor.err(ParseErrorKind::Malformed("leading zero in UIntBase128")));
        }
        if result & 0xfe00_0000 != 0 {
            return Err(cursor.err(ParseErrorKind::Malformed("UIntBase128 overflow")));
        }
        result = (result << 7) | u32::from(code & 0x7f);
        if code & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(cursor.err(ParseErrorKind::Malformed("unterminated UIntBase128")))
}

#[derive(Debug, Clone, Copy)]
struct DirectoryEntry {
    tag: Tag,
    transform: u8,
    orig_length: u32,
    /// Length of the table inside the decompressed stream.
    stream_length: u32,
}

impl DirectoryEntry {
    fn is_transformed(&self) -> bool {
        if self.tag == Tag::GLYF || self.tag == Tag::LOCA {
            self.transform != 3
        } else {
            self.transform != 0
        }
    }
}

/// Decodes a WOFF2 container into SFNT bytes, inverting the `glyf`/`loca`
/// and `hmtx` transforms and recomputing all checksums.
pub(crate) fn decode(bytes: &[u8]) -> Result<Vec<u8>, ParseError> {
    let mut cursor = Cursor::new(bytes);
    cursor.skip(4)?; // signature, checked by the caller
    let flavor = cursor.read_u32()?;
    if flavor == u32::from_be_bytes(*b"ttcf") {
        return Err(cursor.err(ParseErrorKind::UnsupportedFormat { version: flavor }));
    }
    cursor.skip(4)?; // length
    let num_tables = cursor.read_u16()?;
    cursor.skip(2)?; // reserved
    cursor.skip(4)?; // totalSfntSize
    let total_compressed_size = cursor.read_u32()? as usize;
    cursor.skip(2 + 2)?; // majorVersion, minorVersion
    cursor.skip(4 * 5)?; // metadata and private block ranges

    let mut entries = Vec::with_capacity(num_tables.into());
    for _ in 0..num_tables {
        let flags = cursor.read_u8()?;
        let tag = if flags & 0x3f == 0x3f {
            cursor.read_tag()?
        } else {
            Tag(*KNOWN_TAGS[usize::from(flags & 0x3f)])
        };
        let transform = (flags >> 6) & 0x03;
        let orig_length = read_base128(&mut cursor)?;

        let mut entry = DirectoryEntry {
            tag,
            transform,
            orig_length,
            stream_length: orig_length,
        };
        if entry.is_transformed() {
            entry.stream_length = read_base128(&mut cursor)?;
        }
        entries.push(entry);
    }

    // Single Brotli stream holding all (possibly transformed) tables.
    let compressed = cursor.split_at(total_compressed_size.min(cursor.len()))?;
    let mut stream = vec![];
    let mut compressed_reader = compressed.bytes;
    ::brotli::BrotliDecompress(&mut compressed_reader, &mut stream)
        .map_err(|_| compressed.err(ParseErrorKind::Brotli))?;
    let expected_len: usize = entries.iter().map(|entry| entry.stream_length as usize).sum();
    if stream.len() != expected_len {
        return Err(ParseError::new(ParseErrorKind::Malformed(
            "decompressed stream length mismatch",
        )));
    }

    // Slice the stream into per-table chunks.
    let mut chunks = Vec::with_capacity(entries.len());
    let mut offset = 0_usize;
    for entry in &entries {
        let end = offset + entry.stream_length as usize;
        chunks.push(&stream[offset..end]);
        offset = end;
    }

    let find_chunk = |tag: Tag| {
        entries
            .iter()
            .position(|entry| entry.tag == tag)
            .map(|idx| chunks[idx])
    };

    // Invert the glyf transform first; hmtx reconstruction needs its x-mins.
    let mut reconstructed_glyf = None;
    for (entry, chunk) in entries.iter().zip(&chunks) {
        if entry.tag == Tag::GLYF && entry.is_transformed() {
            reconstructed_glyf = Some(glyf::reconstruct_glyf(Cursor::new(chunk))?);
        }
    }

    let mut writer = FontWriter::new(flavor);
    for (entry, chunk) in entries.iter().zip(&chunks) {
        match entry.tag {
            Tag::GLYF if entry.is_transformed() => {
                let data = reconstructed_glyf
                    .as_ref()
                    .expect("reconstructed in the loop above");
                writer.write_raw_table(Tag::GLYF, &data.glyf);
            }
            Tag::LOCA if entry.is_transformed() => {
                if entry.stream_length != 0 {
                    return Err(ParseError::new(ParseErrorKind::Malformed(
                        "transformed loca must be empty",
                    ))
                    .with_table(Tag::LOCA));
                }
                let data = reconstructed_glyf.as_ref().ok_or_else(|| {
                    ParseError::new(ParseErrorKind::Malformed(
                        "transformed loca without transformed glyf",
                    ))
                    .with_table(Tag::LOCA)
                })?;
                if data.loca.len() != entry.orig_length as usize {
                    return Err(ParseError::new(ParseErrorKind::Malformed(
                        "loca origLength does not match the reconstruction",
                    ))
                    .with_table(Tag::LOCA));
                }
                writer.write_raw_table(Tag::LOCA, &data.loca);
            }
            Tag::HMTX if entry.is_transformed() => {
                let glyf_data = reconstructed_glyf.as_ref().ok_or_else(|| {
                    ParseError::new(ParseErrorKind::Malformed(
                        "transformed hmtx without transformed glyf",
                    ))
                    .with_table(Tag::HMTX)
                })?;
                let num_h_metrics = find_chunk(Tag::HHEA)
                    .and_then(|hhea| hhea.get(34..36))
                    .map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
                    .ok_or_else(|| ParseError::missing_table(Tag::HHEA))?;
                let hmtx =
                    glyf::reconstruct_hmtx(Cursor::new(chunk), glyf_data, num_h_metrics)?;
                writer.write_raw_table(Tag::HMTX, &hmtx);
            }
            Tag::HEAD => {
                let mut head = chunk.to_vec();
                crate::container::zero_checksum_adjustment(&mut head);
                writer.write_raw_table(Tag::HEAD, &head);
            }
            _ if entry.is_transformed() => {
                return Err(ParseError::new(ParseErrorKind::Malformed(
                    "unsupported table transform",
                ))
                .with_table(entry.tag));
            }
            tag => writer.write_raw_table(tag, chunk),
        }
    }

    Ok(writer.into_opentype())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_length_u16() {
        let check = |bytes: &[u8], expected: u16| {
            let mut cursor = Cursor::new(bytes);
            assert_eq!(read_255_u16(&mut cursor).unwrap(), expected);
        };
        check(&[0], 0);
        check(&[252], 252);
        check(&[255, 0], 253);
        check(&[255, 255], 508);
        check(&[254, 0], 506);
        check(&[253, 0x12, 0x34], 0x1234);
    }

    #[test]
    fn base128_decoding() {
        let check = |bytes: &[u8], expected: u32| {
            let mut cursor = Cursor::new(bytes);
            assert_eq!(read_base128(&mut cursor).unwrap(), expected);
        };
        check(&[0x3f], 63);
        check(&[0x81, 0x00], 128);
        check(&[0x81, 0x80, 0x00], 16_384);

        let mut cursor = Cursor::new(&[0x80, 0x01]);
        assert!(read_base128(&mut cursor).is_err());
        let mut cursor = Cursor::new(&[0xff, 0xff, 0xff, 0xff, 0xff]);
        assert!(read_base128(&mut cursor).is_err());
    }

    #[test]
    fn known_tag_round_trip() {
        for (idx, tag) in KNOWN_TAGS.iter().enumerate() {
            assert_eq!(known_tag_index(Tag(**tag)), Some(idx as u8));
        }
        assert_eq!(known_tag_index(Tag(*b"zzzz")), None);
        assert_eq!(KNOWN_TAGS[10], b"glyf");
        assert_eq!(KNOWN_TAGS[11], b"loca");
    }
}
