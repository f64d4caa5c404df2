//! Font container handling: format sniffing and decompression of WOFF /
//! WOFF2 wrappers into plain SFNT bytes.

use std::borrow::Cow;
use std::io::Read;

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
    tables::Tag,
    woff2,
    write::FontWriter,
};

const WOFF_SIGNATURE: u32 = u32::from_be_bytes(*b"wOFF");
const WOFF2_SIGNATURE: u32 = u32::from_be_bytes(*b"wOF2");
const TTC_MAGIC: u32 = u32::from_be_bytes(*b"ttcf");

/// Containers recognized by [`sniff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    /// Plain SFNT (TrueType or CFF flavored).
    Sfnt,
    /// TrueType/OpenType collection.
    Collection,
    /// WOFF 1.0.
    Woff,
    /// WOFF 2.0.
    Woff2,
}

/// Determines the container format of font bytes, if recognized.
pub fn sniff(bytes: &[u8]) -> Option<FontKind> {
    let mut cursor = Cursor::new(bytes);
    match cursor.read_u32().ok()? {
        WOFF_SIGNATURE => Some(FontKind::Woff),
        WOFF2_SIGNATURE => Some(FontKind::Woff2),
        TTC_MAGIC => Some(FontKind::Collection),
        magic if crate::font::is_sfnt_version(magic) => Some(FontKind::Sfnt),
        _ => None,
    }
}

/// Unwraps a font container into SFNT bytes [`Font::parse`] accepts:
/// SFNT and collection bytes pass through unchanged, WOFF and WOFF2
/// containers are decompressed and reconstructed.
///
/// [`Font::parse`]: crate::Font::parse
pub fn decompress(bytes: &[u8]) -> Result<Cow<'_, [u8]>, ParseError> {
    match sniff(bytes) {
        Some(FontKind::Sfnt | FontKind::Collection) => Ok(Cow::Borrowed(bytes)),
        Some(FontKind::Woff) => decode_woff(bytes).map(Cow::Owned),
        Some(FontKind::Woff2) => woff2::decode(bytes).map(Cow::Owned),
        None => {
            let mut cursor = Cursor::new(bytes);
            let magic = cursor.read_u32().unwrap_or(0);
            Err(ParseError::new(ParseErrorKind::BadMagic { magic }))
        }
    }
}

/// Rebuilds an SFNT from a WOFF 1.0 container, inflating zlib-compressed
/// table bodies.
fn decode_woff(bytes: &[u8]) -> Result<Vec<u8>, ParseError> {
    let mut cursor = Cursor::new(bytes);
    cursor.skip(4)?; // signature, checked by the caller
    let flavor = cursor.read_u32()?;
    cursor.skip(4)?; // length
    let num_tables = cursor.read_u16()?;
    cursor.skip(2)?; // reserved
    cursor.skip(4 + 4)?; // totalSfntSize, version
    cursor.skip(4 * 5)?; // metadata and private block ranges

    let mut entries = Vec::with_capacity(num_tables.into());
    for _ in 0..num_tables {
        let tag = cursor.read_tag()?;
        let offset = cursor.read_u32()? as usize;
        let comp_length = cursor.read_u32()? as usize;
        let orig_length = cursor.read_u32()? as usize;
        cursor.skip(4)?; // origChecksum, recomputed below
        entries.push((tag, offset, comp_length, orig_length));
    }
    // Emit bodies in tag order.
    entries.sort_unstable_by_key(|&(tag, ..)| tag);

    let mut writer = FontWriter::new(flavor);
    for (tag, offset, comp_length, orig_length) in entries {
        if comp_length > orig_length {
            return Err(ParseError::new(ParseErrorKind::Malformed(
                "compressed table longer than its original",
            ))
            .with_table(tag)
            .with_offset(offset));
        }
        let compressed = bytes
            .get(offset..offset + comp_length)
            .ok_or_else(|| {
                ParseError::new(ParseErrorKind::RangeOutOfBounds {
                    range: offset..offset + comp_length,
                    len: bytes.len(),
                })
                .with_table(tag)
            })?;

        let body = if comp_length < orig_length {
            let mut decompressed = Vec::with_capacity(orig_length);
            flate2::read::ZlibDecoder::new(compressed)
                .read_to_end(&mut decompressed)
                .map_err(|_| {
                    ParseError::new(ParseErrorKind::Deflate)
                        .with_table(tag)
                        .with_offset(offset)
                })?;
            if decompressed.len() != orig_length {
                return Err(ParseError::new(ParseErrorKind::Malformed(
                    "inflated table length mismatch",
                ))
                .with_table(tag));
            }
            Cow::Owned(decompressed)
        } else {
            Cow::Borrowed(compressed)
        };

        if tag == Tag::HEAD {
            let mut head = body.into_owned();
            zero_checksum_adjustment(&mut head);
            writer.write_raw_table(tag, &head);
        } else {
            writer.write_raw_table(tag, &body);
        }
    }

    Ok(writer.into_opentype())
}

pub(crate) fn zero_checksum_adjustment(head: &mut [u8]) {
    use crate::tables::HeadTable;
    if head.len() >= HeadTable::CHECKSUM_ADJUSTMENT_OFFSET + 4 {
        head[HeadTable::CHECKSUM_ADJUSTMENT_OFFSET..HeadTable::CHECKSUM_ADJUSTMENT_OFFSET + 4]
            .fill(0);
    }
}
