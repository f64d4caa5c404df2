//! Metrics variation tables: `HVAR`, `VVAR` and `MVAR`.

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
    tables::Tag,
    var::store::{DeltaSetIndexMap, ItemVariationStore},
};

/// Parsed `HVAR` or `VVAR` table (the `VORG` mapping of `VVAR` included).
#[derive(Debug, Clone)]
pub(crate) struct HvarTable {
    store: ItemVariationStore,
    advance_map: Option<DeltaSetIndexMap>,
    lsb_map: Option<DeltaSetIndexMap>,
}

impl HvarTable {
    pub(crate) fn parse(bytes: &[u8], base: usize, tag: Tag) -> Result<Self, ParseError> {
        let table = Cursor::for_table(bytes, base, tag);
        let mut cursor = table;
        cursor.read_u32_checked(|version| {
            if version == 0x0001_0000 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion { version })
            }
        })?;
        let store_offset = cursor.read_u32()? as usize;
        let advance_offset = cursor.read_u32()? as usize;
        let lsb_offset = cursor.read_u32()? as usize;
        cursor.skip(4)?; // right/bottom side bearing mapping, unused here

        let store = ItemVariationStore::parse(table.range(store_offset..table.len())?)?;
        let parse_map = |offset: usize| -> Result<Option<DeltaSetIndexMap>, ParseError> {
            if offset == 0 {
                Ok(None)
            } else {
                DeltaSetIndexMap::parse(table.range(offset..table.len())?).map(Some)
            }
        };

        Ok(Self {
            store,
            advance_map: parse_map(advance_offset)?,
            lsb_map: parse_map(lsb_offset)?,
        })
    }

    /// Advance delta for a glyph; the identity mapping `(0, glyph_id)`
    /// applies when the advance mapping is absent.
    pub(crate) fn advance_delta(&self, glyph_id: u16, coords: &[f32]) -> f32 {
        let (outer, inner) = self
            .advance_map
            .as_ref()
            .map_or((0, glyph_id), |map| map.get(glyph_id.into()));
        self.store.delta(outer, inner, coords)
    }

    /// Side-bearing delta for a glyph; `None` when the table carries no
    /// side-bearing mapping.
    pub(crate) fn side_bearing_delta(&self, glyph_id: u16, coords: &[f32]) -> Option<f32> {
        let (outer, inner) = self.lsb_map.as_ref()?.get(glyph_id.into());
        Some(self.store.delta(outer, inner, coords))
    }
}

/// Parsed `MVAR` table.
#[derive(Debug, Clone)]
pub(crate) struct MvarTable {
    store: ItemVariationStore,
    /// `(metric tag, outer, inner)`, sorted by tag.
    records: Vec<(Tag, u16, u16)>,
}

impl MvarTable {
    pub(crate) fn parse(bytes: &[u8], base: usize) -> Result<Self, ParseError> {
        let table = Cursor::for_table(bytes, base, Tag::MVAR);
        let mut cursor = table;
        cursor.read_u16_checked(|major| {
            if major == 1 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion {
                    version: major.into(),
                })
            }
        })?;
        cursor.skip(4)?; // minor version, reserved
        let record_size = cursor.read_u16()?;
        if usize::from(record_size) < 8 {
            return Err(cursor.err(ParseErrorKind::Malformed("valueRecordSize below 8")));
        }
        let record_count = cursor.read_u16()?;
        let store_offset = usize::from(cursor.read_u16()?);

        let records = (0..record_count)
            .map(|_| {
                let mut record = cursor.split_at(record_size.into())?;
                Ok((record.read_tag()?, record.read_u16()?, record.read_u16()?))
            })
            .collect::<Result<_, ParseError>>()?;

        let store = if record_count == 0 {
            ItemVariationStore::default()
        } else {
            ItemVariationStore::parse(table.range(store_offset..table.len())?)?
        };
        Ok(Self { store, records })
    }

    /// Delta for a font-wide metric identified by its `MVAR` value tag.
    pub(crate) fn delta(&self, metric: Tag, coords: &[f32]) -> f32 {
        let Ok(idx) = self
            .records
            .binary_search_by_key(&metric, |&(tag, _, _)| tag)
        else {
            return 0.0;
        };
        let (_, outer, inner) = self.records[idx];
        self.store.delta(outer, inner, coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hvar_bytes() -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend_from_slice(&0x0001_0000_u32.to_be_bytes());
        bytes.extend_from_slice(&20_u32.to_be_bytes()); // store offset
        bytes.extend_from_slice(&[0; 12]); // no mappings
        // ItemVariationStore with a single 1-axis region peaking at 1.0.
        let store_start = bytes.len();
        assert_eq!(store_start, 20);
        bytes.extend_from_slice(&1_u16.to_be_bytes()); // format
        bytes.extend_from_slice(&16_u32.to_be_bytes()); // region list offset
        bytes.extend_from_slice(&1_u16.to_be_bytes()); // data count
        bytes.extend_from_slice(&26_u32.to_be_bytes()); // data offset
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(&1_u16.to_be_bytes()); // axis count
        bytes.extend_from_slice(&1_u16.to_be_bytes()); // region count
        for value in [0_i16, 0x4000, 0x4000] {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        bytes.extend_from_slice(&2_u16.to_be_bytes()); // item count
        bytes.extend_from_slice(&1_u16.to_be_bytes()); // word delta count
        bytes.extend_from_slice(&1_u16.to_be_bytes()); // region index count
        bytes.extend_from_slice(&0_u16.to_be_bytes());
        bytes.extend_from_slice(&100_i16.to_be_bytes()); // glyph 0 delta
        bytes.extend_from_slice(&(-50_i16).to_be_bytes()); // glyph 1 delta
        bytes
    }

    #[test]
    fn hvar_identity_mapping() {
        let hvar = HvarTable::parse(&hvar_bytes(), 0, Tag::HVAR).unwrap();
        assert_eq!(hvar.advance_delta(0, &[1.0]), 100.0);
        assert_eq!(hvar.advance_delta(1, &[1.0]), -50.0);
        assert_eq!(hvar.advance_delta(1, &[0.5]), -25.0);
        assert_eq!(hvar.advance_delta(0, &[0.0]), 0.0);
        assert_eq!(hvar.side_bearing_delta(0, &[1.0]), None);
    }
}
