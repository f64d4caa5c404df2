//! Font variation machinery: axes, normalization and delta stores.

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
    tables::Tag,
};

pub(crate) mod metrics;
pub(crate) mod store;
pub(crate) mod tuple;

/// A variation axis from the `fvar` table.
#[derive(Debug, Clone, Copy)]
pub struct VariationAxis {
    /// 4-byte axis tag (e.g. `wght`).
    pub tag: Tag,
    /// Minimum user-space value.
    pub min: f32,
    /// Default user-space value.
    pub default: f32,
    /// Maximum user-space value.
    pub max: f32,
    /// Axis flags (bit 0: hidden).
    pub flags: u16,
    /// `name` table ID of the axis label.
    pub name_id: u16,
}

/// A named instance from the `fvar` table.
#[derive(Debug, Clone)]
pub struct NamedInstance {
    /// `name` table ID of the subfamily label.
    pub name_id: u16,
    /// Per-axis user-space coordinates, in `fvar` axis order.
    pub coordinates: Vec<f32>,
}

/// Parsed `fvar` table.
#[derive(Debug, Clone)]
pub(crate) struct FvarTable {
    pub(crate) axes: Vec<VariationAxis>,
    pub(crate) instances: Vec<NamedInstance>,
}

impl FvarTable {
    pub(crate) fn parse(bytes: &[u8], base: usize) -> Result<Self, ParseError> {
        let table = Cursor::for_table(bytes, base, Tag::FVAR);
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
        cursor.skip(2)?; // minor version
        let axes_offset = cursor.read_u16()?;
        cursor.skip(2)?; // reserved
        let axis_count = cursor.read_u16()?;
        let axis_size = cursor.read_u16()?;
        let instance_count = cursor.read_u16()?;
        let instance_size = cursor.read_u16()?;

        let mut axes_cursor = table.range(usize::from(axes_offset)..table.len())?;
        let mut axes = Vec::with_capacity(axis_count.into());
        for _ in 0..axis_count {
            let mut record = axes_cursor.split_at(axis_size.into())?;
            axes.push(VariationAxis {
                tag: record.read_tag()?,
                min: record.read_fixed()?,
                default: record.read_fixed()?,
                max: record.read_fixed()?,
                flags: record.read_u16()?,
                name_id: record.read_u16()?,
            });
        }

        let mut instances = Vec::with_capacity(instance_count.into());
        for _ in 0..instance_count {
            let mut record = axes_cursor.split_at(instance_size.into())?;
            let name_id = record.read_u16()?;
            record.skip(2)?; // flags
            let coordinates = (0..axis_count)
                .map(|_| record.read_fixed())
                .collect::<Result<_, _>>()?;
            instances.push(NamedInstance {
                name_id,
                coordinates,
            });
        }

        Ok(Self { axes, instances })
    }

}

/// Per-axis piecewise-linear segment map from the `avar` table.
#[derive(Debug, Clone, Default)]
pub(crate) struct SegmentMap {
    /// `(from, to)` pairs in normalized coordinates, sorted by `from`.
    pub(crate) mappings: Vec<(f32, f32)>,
}

impl SegmentMap {
    /// A map missing any of the anchor mappings `(-1, -1)`, `(0, 0)`,
    /// `(1, 1)` is invalid and behaves as the identity.
    fn is_valid(&self) -> bool {
        let has = |from: f32, to: f32| {
            self.mappings
                .iter()
                .any(|&(f, t)| (f - from).abs() < f32::EPSILON && (t - to).abs() < f32::EPSILON)
        };
        has(-1.0, -1.0) && has(0.0, 0.0) && has(1.0, 1.0)
    }

    pub(crate) fn apply(&self, coord: f32) -> f32 {
        if !self.is_valid() {
            return coord;
        }
        // Find the surrounding pair of mappings and interpolate.
        let mut prev = self.mappings[0];
        for &(from, to) in &self.mappings {
            if (from - coord).abs() < f32::EPSILON {
                return to;
            }
            if from > coord {
                if (from - prev.0).abs() < f32::EPSILON {
                    return to;
                }
                return prev.1 + (to - prev.1) * (coord - prev.0) / (from - prev.0);
            }
            prev = (from, to);
        }
        prev.1
    }
}

/// Parsed `avar` table.
#[derive(Debug, Clone)]
pub(crate) struct AvarTable {
    pub(crate) segment_maps: Vec<SegmentMap>,
}

impl AvarTable {
    pub(crate) fn parse(bytes: &[u8], base: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(bytes, base, Tag::AVAR);
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
        let axis_count = cursor.read_u16()?;
        let segment_maps = (0..axis_count)
            .map(|_| {
                let position_count = cursor.read_u16()?;
                let mappings = (0..position_count)
                    .map(|_| Ok((cursor.read_f2dot14()?, cursor.read_f2dot14()?)))
                    .collect::<Result<_, ParseError>>()?;
                Ok(SegmentMap { mappings })
            })
            .collect::<Result<_, ParseError>>()?;
        Ok(Self { segment_maps })
    }
}

/// A resolved variation instance: normalized per-axis coordinates in `fvar`
/// axis order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    pub(crate) coords: Vec<f32>,
}

impl Instance {
    /// Normalized coordinates, one per `fvar` axis, each in `[-1, 1]`.
    pub fn coordinates(&self) -> &[f32] {
        &self.coords
    }

    /// Checks whether all coordinates sit at the default location.
    pub fn is_default(&self) -> bool {
        self.coords.iter().all(|&coord| coord == 0.0)
    }
}

/// Rounds a normalized coordinate to the 2.14 fixed-point grid used on the
/// wire.
fn quantize_f2dot14(value: f32) -> f32 {
    (value * 16_384.0).round() / 16_384.0
}

/// Maps a user-space axis value to `[-1, 1]`, without `avar` remapping.
pub(crate) fn normalize_axis_value(axis: &VariationAxis, value: f32) -> f32 {
    let value = value.clamp(axis.min, axis.max);
    if value < axis.default {
        if axis.default == axis.min {
            0.0
        } else {
            -(axis.default - value) / (axis.default - axis.min)
        }
    } else if value > axis.default {
        if axis.max == axis.default {
            0.0
        } else {
            (value - axis.default) / (axis.max - axis.default)
        }
    } else {
        0.0
    }
}

/// Builds the normalized coordinate vector for the given `(axis tag, value)`
/// assignments; unassigned axes stay at their default.
pub(crate) fn normalize(
    fvar: &FvarTable,
    avar: Option<&AvarTable>,
    values: &[(Tag, f32)],
) -> Instance {
    let coords = fvar
        .axes
        .iter()
        .enumerate()
        .map(|(idx, axis)| {
            let value = values
                .iter()
                .find(|(tag, _)| *tag == axis.tag)
                .map_or(axis.default, |&(_, value)| value);
            let mut coord = normalize_axis_value(axis, value);
            if let Some(avar) = avar {
                if let Some(map) = avar.segment_maps.get(idx) {
                    coord = map.apply(coord);
                }
            }
            quantize_f2dot14(coord.clamp(-1.0, 1.0))
        })
        .collect();
    Instance { coords }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_axis() -> VariationAxis {
        VariationAxis {
            tag: Tag(*b"wght"),
            min: 100.0,
            default: 400.0,
            max: 900.0,
            flags: 0,
            name_id: 256,
        }
    }

    #[test]
    fn normalization_anchors() {
        let axis = weight_axis();
        assert_eq!(normalize_axis_value(&axis, 100.0), -1.0);
        assert_eq!(normalize_axis_value(&axis, 400.0), 0.0);
        assert_eq!(normalize_axis_value(&axis, 900.0), 1.0);
        let normalized = normalize_axis_value(&axis, 550.0);
        assert!((normalized - 0.3).abs() < 1e-3);
        // Out-of-range values clamp to the axis bounds.
        assert_eq!(normalize_axis_value(&axis, 1_000.0), 1.0);
        assert_eq!(normalize_axis_value(&axis, 0.0), -1.0);
    }

    #[test]
    fn default_values_normalize_to_zero() {
        let fvar = FvarTable {
            axes: vec![weight_axis()],
            instances: vec![],
        };
        let instance = normalize(&fvar, None, &[]);
        assert!(instance.is_default());
    }

    #[test]
    fn avar_segment_remap() {
        let map = SegmentMap {
            mappings: vec![(-1.0, -1.0), (0.0, 0.0), (0.5, 0.75), (1.0, 1.0)],
        };
        assert_eq!(map.apply(0.0), 0.0);
        assert_eq!(map.apply(0.25), 0.375);
        assert_eq!(map.apply(0.75), 0.875);
        assert_eq!(map.apply(0.5), 0.75);
        assert_eq!(map.apply(-0.5), -0.5);
        assert_eq!(map.apply(1.0), 1.0);
    }

    #[test]
    fn invalid_avar_map_is_identity() {
        let map = SegmentMap {
            mappings: vec![(0.0, 0.0), (0.5, 0.75)],
        };
        assert_eq!(map.apply(0.25), 0.25);
    }

    #[test]
    fn quantization_matches_wire_precision() {
        assert_eq!(quantize_f2dot14(0.375), 0.375);
        let quantized = quantize_f2dot14(0.3);
        assert!((quantized - 0.3).abs() < 1.0 / 16_384.0);
    }
}
