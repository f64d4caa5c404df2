//! `name` table processing.

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
    tables::Tag,
};

const UNICODE_PLATFORM: u16 = 0;
const MACINTOSH_PLATFORM: u16 = 1;
const WINDOWS_PLATFORM: u16 = 3;

const MAC_ROMAN_ENCODING: u16 = 0;
const MAC_ENGLISH_LANGUAGE: u16 = 0;
const WINDOWS_UNICODE_BMP_ENCODING: u16 = 1;
const WINDOWS_ENGLISH_US_LANGUAGE: u16 = 0x0409;

/// Well-known name IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NameId {
    /// Font family name (ID 1).
    Family,
    /// Font subfamily name (ID 2).
    Subfamily,
    /// Full font name (ID 4).
    FullName,
    /// PostScript name (ID 6).
    PostScriptName,
    /// Any other name ID.
    Other(u16),
}

impl From<NameId> for u16 {
    fn from(id: NameId) -> u16 {
        match id {
            NameId::Family => 1,
            NameId::Subfamily => 2,
            NameId::FullName => 4,
            NameId::PostScriptName => 6,
            NameId::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct NameRecord {
    platform_id: u16,
    encoding_id: u16,
    language_id: u16,
    name_id: u16,
    length: u16,
    offset: u16,
}

impl NameRecord {
    /// Lower is better; `None` means the record cannot be decoded.
    fn priority(&self) -> Option<u8> {
        match (self.platform_id, self.encoding_id, self.language_id) {
            (WINDOWS_PLATFORM, WINDOWS_UNICODE_BMP_ENCODING, WINDOWS_ENGLISH_US_LANGUAGE) => {
                Some(0)
            }
            (WINDOWS_PLATFORM, WINDOWS_UNICODE_BMP_ENCODING, _) => Some(1),
            (UNICODE_PLATFORM, _, _) => Some(2),
            (MACINTOSH_PLATFORM, MAC_ROMAN_ENCODING, MAC_ENGLISH_LANGUAGE) => Some(3),
            (MACINTOSH_PLATFORM, MAC_ROMAN_ENCODING, _) => Some(4),
            (WINDOWS_PLATFORM, _, _) => Some(5),
            _ => None,
        }
    }

    fn is_unicode(&self) -> bool {
        self.platform_id == UNICODE_PLATFORM || self.platform_id == WINDOWS_PLATFORM
    }
}

/// Parsed `name` table.
#[derive(Debug, Clone)]
pub(crate) struct NameTable<'a> {
    pub(crate) raw: &'a [u8],
    records: Vec<NameRecord>,
    string_data: &'a [u8],
}

impl<'a> NameTable<'a> {
    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(bytes, base, Tag::NAME);
        cursor.read_u16_checked(|version| {
            if version <= 1 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion {
                    version: version.into(),
                })
            }
        })?;
        let count = cursor.read_u16()?;
        let storage_offset = cursor.read_u16()?;
        let string_data = bytes.get(usize::from(storage_offset)..).ok_or_else(|| {
            cursor.err(ParseErrorKind::OffsetOutOfBounds(storage_offset.into()))
        })?;

        let records = (0..count)
            .map(|_| {
                Ok(NameRecord {
                    platform_id: cursor.read_u16()?,
                    encoding_id: cursor.read_u16()?,
                    language_id: cursor.read_u16()?,
                    name_id: cursor.read_u16()?,
                    length: cursor.read_u16()?,
                    offset: cursor.read_u16()?,
                })
            })
            .collect::<Result<_, ParseError>>()?;

        Ok(Self {
            raw: bytes,
            records,
            string_data,
        })
    }

    /// Gets the best available string for `name_id`: Windows/Unicode/English
    /// first, then Windows/Unicode in any language, the Unicode platform,
    /// Mac/Roman/English, and finally any decodable record.
    pub(crate) fn string(&self, name_id: impl Into<u16>) -> Option<String> {
        let name_id = name_id.into();
        let record = self
            .records
            .iter()
            .filter(|record| record.name_id == name_id)
            .filter_map(|record| record.priority().map(|priority| (priority, record)))
            .min_by_key(|&(priority, _)| priority)
            .map(|(_, record)| record)?;

        let start = usize::from(record.offset);
        let bytes = self
            .string_data
            .get(start..start + usize::from(record.length))?;
        if record.is_unicode() {
            decode_utf16_be(bytes)
        } else {
            decode_mac_roman(bytes)
        }
    }
}

fn decode_utf16_be(bytes: &[u8]) -> Option<String> {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .ok()
}

/// Decodes the ASCII subset of MacRoman; returns `None` on upper-half bytes.
fn decode_mac_roman(bytes: &[u8]) -> Option<String> {
    bytes.iter().map(|&byte| byte.is_ascii().then(|| char::from(byte))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::testing::push_u16;

    fn name_table(records: &[(u16, u16, u16, u16, &[u8])]) -> Vec<u8> {
        let mut strings = vec![];
        let mut bytes = vec![];
        push_u16(&mut bytes, 0); // version
        push_u16(&mut bytes, records.len() as u16);
        push_u16(&mut bytes, 6 + 12 * records.len() as u16);
        for &(platform, encoding, language, name_id, string) in records {
            push_u16(&mut bytes, platform);
            push_u16(&mut bytes, encoding);
            push_u16(&mut bytes, language);
            push_u16(&mut bytes, name_id);
            push_u16(&mut bytes, string.len() as u16);
            push_u16(&mut bytes, strings.len() as u16);
            strings.extend_from_slice(string);
        }
        bytes.extend_from_slice(&strings);
        bytes
    }

    #[test]
    fn windows_english_is_preferred() {
        let family_utf16: Vec<u8> = "Test Sans"
            .encode_utf16()
            .flat_map(u16::to_be_bytes)
            .collect();
        let bytes = name_table(&[
            (1, 0, 0, 1, b"Mac Name"),
            (3, 1, 0x0409, 1, &family_utf16),
        ]);
        let name = NameTable::parse(&bytes, 0).unwrap();
        assert_eq!(name.string(NameId::Family).unwrap(), "Test Sans");
        assert_eq!(name.string(NameId::FullName), None);
    }

    #[test]
    fn mac_roman_fallback() {
        let bytes = name_table(&[(1, 0, 0, 6, b"TestSans-Regular")]);
        let name = NameTable::parse(&bytes, 0).unwrap();
        assert_eq!(
            name.string(NameId::PostScriptName).unwrap(),
            "TestSans-Regular"
        );
    }

    #[test]
    fn surrogate_pairs_are_assembled() {
        let emoji_utf16: Vec<u8> = "name \u{1f600}"
            .encode_utf16()
            .flat_map(u16::to_be_bytes)
            .collect();
        let bytes = name_table(&[(0, 3, 0, 4, &emoji_utf16)]);
        let name = NameTable::parse(&bytes, 0).unwrap();
        assert_eq!(name.string(NameId::FullName).unwrap(), "name \u{1f600}");
    }
}
