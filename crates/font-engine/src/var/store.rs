//! `ItemVariationStore` and `DeltaSetIndexMap` structures shared by
//! `HVAR`/`VVAR`/`MVAR` and CFF2 blending.

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
};

/// Per-axis tent of a variation region, in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RegionAxis {
    pub(crate) start: f32,
    pub(crate) peak: f32,
    pub(crate) end: f32,
}

/// A variation region: one tent per axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct VariationRegion {
    pub(crate) axes: Vec<RegionAxis>,
}

impl VariationRegion {
    /// Computes the scalar of the region at the given normalized coordinates.
    ///
    /// The scalar is the product of per-axis tents: an axis with a zero peak
    /// contributes 1, an out-of-range coordinate zeroes the whole region.
    pub(crate) fn scalar(&self, coords: &[f32]) -> f32 {
        let mut scalar = 1.0_f32;
        for (i, axis) in self.axes.iter().enumerate() {
            let coord = coords.get(i).copied().unwrap_or(0.0);
            let RegionAxis { start, peak, end } = *axis;
            if start > peak || peak > end || (start < 0.0 && end > 0.0 && peak != 0.0) {
                // Invalid region definition; the axis is ignored.
                continue;
            }
            if peak == 0.0 {
                continue;
            }
            if coord < start || coord > end {
                return 0.0;
            }
            if (coord - peak).abs() < f32::EPSILON {
                continue;
            }
            scalar *= if coord < peak {
                (coord - start) / (peak - start)
            } else {
                (end - coord) / (end - peak)
            };
        }
        scalar
    }
}

/// One ItemVariationData subtable: a subset of regions and per-item deltas.
#[derive(Debug, Clone, Default)]
pub(crate) struct ItemVariationData {
    pub(crate) region_indexes: Vec<u16>,
    pub(crate) item_count: u16,
    /// Row-major: `item_count` rows of `region_indexes.len()` deltas.
    pub(crate) deltas: Vec<i32>,
}

impl ItemVariationData {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let item_count = cursor.read_u16()?;
        let word_delta_count = cursor.read_u16()?;
        let long_words = word_delta_count & 0x8000 != 0;
        let word_delta_count = usize::from(word_delta_count & 0x7fff);
        let region_count = usize::from(cursor.read_u16()?);
        if word_delta_count > region_count {
            return Err(cursor.err(ParseErrorKind::Malformed(
                "wordDeltaCount exceeds regionIndexCount",
            )));
        }
        let region_indexes = (0..region_count)
            .map(|_| cursor.read_u16())
            .collect::<Result<Vec<_>, _>>()?;

        let mut deltas = Vec::with_capacity(usize::from(item_count) * region_count);
        for _ in 0..item_count {
            for column in 0..region_count {
                let wide = column < word_delta_count;
                let delta = match (wide, long_words) {
                    (true, true) => cursor.read_i32()?,
                    (true, false) | (false, true) => cursor.read_i16()?.into(),
                    (false, false) => cursor.read_i8()?.into(),
                };
                deltas.push(delta);
            }
        }

        Ok(Self {
            region_indexes,
            item_count,
            deltas,
        })
    }

    fn delta_row(&self, inner: u16) -> Option<&[i32]> {
        if inner >= self.item_count {
            return None;
        }
        let width = self.region_indexes.len();
        let start = usize::from(inner) * width;
        self.deltas.get(start..start + width)
    }
}

/// Parsed `ItemVariationStore`.
#[derive(Debug, Clone, Default)]
pub(crate) struct ItemVariationStore {
    pub(crate) regions: Vec<VariationRegion>,
    pub(crate) subtables: Vec<ItemVariationData>,
}

impl ItemVariationStore {
    pub(crate) fn parse(table: Cursor<'_>) -> Result<Self, ParseError> {
        let mut cursor = table;
        cursor.read_u16_checked(|format| {
            if format == 1 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableFormat { format })
            }
        })?;
        let region_list_offset = cursor.read_u32()? as usize;
        let data_count = cursor.read_u16()?;
        let data_offsets = (0..data_count)
            .map(|_| cursor.read_u32())
            .collect::<Result<Vec<_>, _>>()?;

        let mut regions_cursor = table.range(region_list_offset..table.len())?;
        let axis_count = regions_cursor.read_u16()?;
        let region_count = regions_cursor.read_u16()?;
        let regions = (0..region_count)
            .map(|_| {
                let axes = (0..axis_count)
                    .map(|_| {
                        Ok(RegionAxis {
                            start: regions_cursor.read_f2dot14()?,
                            peak: regions_cursor.read_f2dot14()?,
                            end: regions_cursor.read_f2dot14()?,
                        })
                    })
                    .collect::<Result<_, ParseError>>()?;
                Ok(VariationRegion { axes })
            })
            .collect::<Result<_, ParseError>>()?;

        let subtables = data_offsets
            .into_iter()
            .map(|offset| ItemVariationData::parse(table.range(offset as usize..table.len())?))
            .collect::<Result<_, ParseError>>()?;

        Ok(Self { regions, subtables })
    }

    /// Scalars of the regions referenced by subtable `outer`, in reference
    /// order. This is the `r`-element vector consumed by the CFF2 `blend`
    /// operator.
    pub(crate) fn region_scalars(&self, outer: u16, coords: &[f32]) -> Result<Vec<f32>, ParseError> {
        let subtable = self.subtable(outer)?;
        subtable
            .region_indexes
            .iter()
            .map(|&region_idx| {
                let region = self.regions.get(usize::from(region_idx)).ok_or_else(|| {
                    ParseError::new(ParseErrorKind::Malformed("region index out of range"))
                })?;
                Ok(region.scalar(coords))
            })
            .collect()
    }

    /// Computes the delta for `(outer, inner)` at the given normalized
    /// coordinates.
    pub(crate) fn delta(&self, outer: u16, inner: u16, coords: &[f32]) -> f32 {
        let Ok(subtable) = self.subtable(outer) else {
            return 0.0;
        };
        let Some(row) = subtable.delta_row(inner) else {
            return 0.0;
        };
        let mut accum = 0.0_f32;
        for (&region_idx, &delta) in subtable.region_indexes.iter().zip(row) {
            let Some(region) = self.regions.get(usize::from(region_idx)) else {
                continue;
            };
            #[allow(clippy::cast_precision_loss)] // deltas are 16-bit in practice
            {
                accum += region.scalar(coords) * delta as f32;
            }
        }
        accum
    }

    fn subtable(&self, outer: u16) -> Result<&ItemVariationData, ParseError> {
        self.subtables.get(usize::from(outer)).ok_or_else(|| {
            ParseError::new(ParseErrorKind::Malformed("variation data index out of range"))
        })
    }
}

/// `DeltaSetIndexMap` remapping logical item IDs to `(outer, inner)` pairs.
#[derive(Debug, Clone)]
pub(crate) struct DeltaSetIndexMap {
    inner_bits: u8,
    entries: Vec<u32>,
}

impl DeltaSetIndexMap {
    pub(crate) fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let format = cursor.read_u8()?;
        let entry_format = cursor.read_u8()?;
        let map_count = match format {
            0 => cursor.read_u16()?.into(),
            1 => cursor.read_u32()?,
            _ => {
                return Err(cursor.err(ParseErrorKind::UnexpectedTableFormat {
                    format: format.into(),
                }))
            }
        };
        let inner_bits = (entry_format & 0x0f) + 1;
        let entry_size = ((entry_format & 0x30) >> 4) + 1;

        let entries = (0..map_count)
            .map(|_| {
                Ok(match entry_size {
                    1 => cursor.read_u8()?.into(),
                    2 => cursor.read_u16()?.into(),
                    3 => cursor.read_u24()?,
                    _ => cursor.read_u32()?,
                })
            })
            .collect::<Result<_, ParseError>>()?;
        Ok(Self {
            inner_bits,
            entries,
        })
    }

    /// Maps a logical index; out-of-range indices use the last entry.
    pub(crate) fn get(&self, index: u32) -> (u16, u16) {
        let idx = (index as usize).min(self.entries.len().saturating_sub(1));
        let Some(&entry) = self.entries.get(idx) else {
            return (0, 0);
        };
        #[allow(clippy::cast_possible_truncation)] // outer/inner are 16-bit by format
        (
            (entry >> self.inner_bits) as u16,
            (entry & ((1 << self.inner_bits) - 1)) as u16,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(tents: &[(f32, f32, f32)]) -> VariationRegion {
        VariationRegion {
            axes: tents
                .iter()
                .map(|&(start, peak, end)| RegionAxis { start, peak, end })
                .collect(),
        }
    }

    #[test]
    fn region_scalar_tent_properties() {
        let tent = region(&[(0.0, 0.5, 1.0)]);
        assert_eq!(tent.scalar(&[0.5]), 1.0);
        assert_eq!(tent.scalar(&[0.0]), 0.0);
        assert_eq!(tent.scalar(&[1.0]), 0.0);
        assert_eq!(tent.scalar(&[0.25]), 0.5);
        assert_eq!(tent.scalar(&[0.75]), 0.5);
        assert_eq!(tent.scalar(&[-0.25]), 0.0);

        // Zero peak contributes 1 regardless of the coordinate.
        let neutral = region(&[(0.0, 0.0, 0.0)]);
        assert_eq!(neutral.scalar(&[0.7]), 1.0);

        // Out-of-range axis short-circuits the product.
        let product = region(&[(0.0, 1.0, 1.0), (0.0, 1.0, 1.0)]);
        assert_eq!(product.scalar(&[0.5, 0.5]), 0.25);
        assert_eq!(product.scalar(&[0.5, -0.1]), 0.0);
    }

    fn two_region_store() -> ItemVariationStore {
        ItemVariationStore {
            regions: vec![region(&[(0.0, 1.0, 1.0)]), region(&[(-1.0, -1.0, 0.0)])],
            subtables: vec![ItemVariationData {
                region_indexes: vec![0, 1],
                item_count: 2,
                deltas: vec![100, -60, 8, 0],
            }],
        }
    }

    #[test]
    fn delta_lookup() {
        let store = two_region_store();
        // At the default location every region scalar is 0.
        assert_eq!(store.delta(0, 0, &[0.0]), 0.0);
        assert_eq!(store.delta(0, 0, &[0.5]), 50.0);
        assert_eq!(store.delta(0, 0, &[-1.0]), -60.0);
        assert_eq!(store.delta(0, 1, &[0.5]), 4.0);
        // Unknown indices yield no delta.
        assert_eq!(store.delta(1, 0, &[0.5]), 0.0);
        assert_eq!(store.delta(0, 5, &[0.5]), 0.0);
    }

    #[test]
    fn store_parsing() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&1_u16.to_be_bytes()); // format
        bytes.extend_from_slice(&16_u32.to_be_bytes()); // region list offset
        bytes.extend_from_slice(&1_u16.to_be_bytes()); // data count
        bytes.extend_from_slice(&26_u32.to_be_bytes()); // data offset
        bytes.extend_from_slice(&[0; 4]); // padding to offset 16
        assert_eq!(bytes.len(), 16);
        // Region list: 1 axis, 1 region with tent (0, 1, 1).
        bytes.extend_from_slice(&1_u16.to_be_bytes());
        bytes.extend_from_slice(&1_u16.to_be_bytes());
        for value in [0_i16, 0x4000, 0x4000] {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        assert_eq!(bytes.len(), 26);
        // ItemVariationData: 1 item, 1 word delta, 1 region.
        bytes.extend_from_slice(&1_u16.to_be_bytes());
        bytes.extend_from_slice(&1_u16.to_be_bytes());
        bytes.extend_from_slice(&1_u16.to_be_bytes());
        bytes.extend_from_slice(&0_u16.to_be_bytes());
        bytes.extend_from_slice(&250_i16.to_be_bytes());

        let store = ItemVariationStore::parse(Cursor::new(&bytes)).unwrap();
        assert_eq!(store.regions.len(), 1);
        assert_eq!(store.subtables.len(), 1);
        assert_eq!(store.delta(0, 0, &[1.0]), 250.0);
        assert_eq!(store.delta(0, 0, &[0.0]), 0.0);
        assert_eq!(store.region_scalars(0, &[0.5]).unwrap(), [0.5]);
    }

    #[test]
    fn index_map_entry_unpacking() {
        let map = DeltaSetIndexMap {
            inner_bits: 4,
            entries: vec![0x12, 0x25, 0x3f],
        };
        assert_eq!(map.get(0), (1, 2));
        assert_eq!(map.get(1), (2, 5));
        assert_eq!(map.get(2), (3, 15));
        // Out-of-range indices clamp to the last entry.
        assert_eq!(map.get(100), (3, 15));
    }
}
