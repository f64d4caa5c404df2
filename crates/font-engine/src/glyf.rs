//! TrueType glyph data (`glyf` + `loca`).

use core::ops;
use std::collections::BTreeSet;

use crate::{
    errors::{ParseError, ParseErrorKind},
    outline::ContourPoint,
    reader::Cursor,
    tables::{LocaFormat, Tag},
};

/// Maximum supported nesting depth of composite glyphs.
pub(crate) const MAX_COMPOSITE_DEPTH: usize = 16;

/// Parsed `loca` table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocaTable<'a> {
    format: LocaFormat,
    bytes: &'a [u8],
    base: usize,
}

impl<'a> LocaTable<'a> {
    pub(crate) fn new(
        format: LocaFormat,
        glyph_count: u16,
        bytes: &'a [u8],
        base: usize,
    ) -> Result<Self, ParseError> {
        let expected_len = format.bytes_per_offset() * (usize::from(glyph_count) + 1);
        if bytes.len() < expected_len {
            Err(ParseError::new(ParseErrorKind::UnexpectedTableLen {
                expected: expected_len,
                actual: bytes.len(),
            })
            .with_table(Tag::LOCA)
            .with_offset(base))
        } else {
            Ok(Self {
                format,
                bytes,
                base,
            })
        }
    }

    pub(crate) fn glyph_count(&self) -> u16 {
        let count = self.bytes.len() / self.format.bytes_per_offset() - 1;
        u16::try_from(count).unwrap_or(u16::MAX)
    }

    pub(crate) fn offset(&self, idx: usize) -> Result<usize, ParseError> {
        let mut cursor = Cursor::for_table(self.bytes, self.base, Tag::LOCA);
        cursor.skip(idx * self.format.bytes_per_offset())?;
        Ok(match self.format {
            LocaFormat::Short => usize::from(cursor.read_u16()?) * 2,
            LocaFormat::Long => cursor.read_u32()? as usize,
        })
    }

    pub(crate) fn glyph_range(&self, glyph_id: u16) -> Result<ops::Range<usize>, ParseError> {
        let start = self.offset(usize::from(glyph_id))?;
        let end = self.offset(usize::from(glyph_id) + 1)?;
        if start > end {
            return Err(ParseError::new(ParseErrorKind::Malformed(
                "loca offsets are not monotonically non-decreasing",
            ))
            .with_table(Tag::LOCA)
            .with_offset(self.base));
        }
        Ok(start..end)
    }
}

/// Component of a composite glyph.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GlyphComponent {
    pub(crate) flags: u16,
    pub(crate) glyph_id: u16,
    pub(crate) arg1: i32,
    pub(crate) arg2: i32,
    pub(crate) transform: ComponentTransform,
}

/// Scaling part of a component's affine transform, in raw 2.14 units.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ComponentTransform {
    None,
    Scale(i16),
    ScaleXY(i16, i16),
    Matrix([i16; 4]),
}

impl ComponentTransform {
    /// `[xx, xy, yx, yy]` multipliers.
    pub(crate) fn matrix(self) -> [f32; 4] {
        let f = |raw: i16| f32::from(raw) / 16_384.0;
        match self {
            Self::None => [1.0, 0.0, 0.0, 1.0],
            Self::Scale(scale) => [f(scale), 0.0, 0.0, f(scale)],
            Self::ScaleXY(x, y) => [f(x), 0.0, 0.0, f(y)],
            Self::Matrix([xx, xy, yx, yy]) => [f(xx), f(xy), f(yx), f(yy)],
        }
    }
}

impl GlyphComponent {
    pub(crate) const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
    pub(crate) const ARGS_ARE_XY_VALUES: u16 = 0x0002;
    pub(crate) const WE_HAVE_A_SCALE: u16 = 0x0008;
    pub(crate) const MORE_COMPONENTS: u16 = 0x0020;
    pub(crate) const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
    pub(crate) const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
    pub(crate) const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

    fn parse(cursor: &mut Cursor<'_>) -> Result<(Self, bool), ParseError> {
        let flags = cursor.read_u16()?;
        let glyph_id = cursor.read_u16()?;
        let words = flags & Self::ARG_1_AND_2_ARE_WORDS != 0;
        let signed = flags & Self::ARGS_ARE_XY_VALUES != 0;
        let (arg1, arg2) = if words {
            let (a, b) = (cursor.read_i16()?, cursor.read_i16()?);
            if signed {
                (i32::from(a), i32::from(b))
            } else {
                #[allow(clippy::cast_sign_loss)] // reinterpret as point numbers
                (i32::from(a as u16), i32::from(b as u16))
            }
        } else {
            let (a, b) = (cursor.read_u8()?, cursor.read_u8()?);
            if signed {
                #[allow(clippy::cast_possible_wrap)] // reinterpret as offsets
                (i32::from(a as i8), i32::from(b as i8))
            } else {
                (i32::from(a), i32::from(b))
            }
        };

        let transform = if flags & Self::WE_HAVE_A_SCALE != 0 {
            ComponentTransform::Scale(cursor.read_i16()?)
        } else if flags & Self::WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            ComponentTransform::ScaleXY(cursor.read_i16()?, cursor.read_i16()?)
        } else if flags & Self::WE_HAVE_A_TWO_BY_TWO != 0 {
            ComponentTransform::Matrix([
                cursor.read_i16()?,
                cursor.read_i16()?,
                cursor.read_i16()?,
                cursor.read_i16()?,
            ])
        } else {
            ComponentTransform::None
        };

        let this = Self {
            flags,
            glyph_id,
            arg1,
            arg2,
            transform,
        };
        Ok((this, flags & Self::MORE_COMPONENTS != 0))
    }

    /// `Some((dx, dy))` for offset components, `None` for anchor-point ones.
    pub(crate) fn xy_offset(&self) -> Option<(i32, i32)> {
        (self.flags & Self::ARGS_ARE_XY_VALUES != 0).then_some((self.arg1, self.arg2))
    }
}

/// Single glyph record of the `glyf` table.
#[derive(Debug)]
pub(crate) enum Glyph<'a> {
    Empty,
    Simple {
        /// Raw record, header included.
        raw: &'a [u8],
        bbox: [i16; 4],
    },
    Composite {
        bbox: [i16; 4],
        components: Vec<GlyphComponent>,
        /// Optional instructions after the last component descriptor.
        instructions: &'a [u8],
    },
}

impl<'a> Glyph<'a> {
    fn parse(raw: Cursor<'a>) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Ok(Self::Empty);
        }

        let mut cursor = raw;
        let number_of_contours = cursor.read_i16()?;
        let bbox = [
            cursor.read_i16()?,
            cursor.read_i16()?,
            cursor.read_i16()?,
            cursor.read_i16()?,
        ];
        if number_of_contours >= 0 {
            return Ok(Self::Simple {
                raw: raw.bytes,
                bbox,
            });
        }

        let mut components = Vec::with_capacity(1);
        let mut has_more = true;
        let mut has_instructions = false;
        while has_more {
            let (component, more) = GlyphComponent::parse(&mut cursor)?;
            has_instructions |= component.flags & GlyphComponent::WE_HAVE_INSTRUCTIONS != 0;
            components.push(component);
            has_more = more;
        }
        let instructions = if has_instructions {
            let len = cursor.read_u16()?;
            cursor.split_at(len.into())?.bytes
        } else {
            &[]
        };
        Ok(Self::Composite {
            bbox,
            components,
            instructions,
        })
    }
}

/// Fully decoded simple glyph outline.
#[derive(Debug, Clone)]
pub(crate) struct SimpleOutline<'a> {
    pub(crate) end_points: Vec<u16>,
    pub(crate) points: Vec<ContourPoint>,
    pub(crate) instructions: &'a [u8],
}

impl<'a> SimpleOutline<'a> {
    const ON_CURVE: u8 = 0x01;
    const X_SHORT: u8 = 0x02;
    const Y_SHORT: u8 = 0x04;
    const REPEAT: u8 = 0x08;
    const X_SAME_OR_POSITIVE: u8 = 0x10;
    const Y_SAME_OR_POSITIVE: u8 = 0x20;

    /// Decodes the body of a simple glyph record (`raw` includes the header).
    pub(crate) fn parse(raw: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(raw, base, Tag::GLYF);
        let number_of_contours = cursor.read_i16()?;
        cursor.skip(8)?; // bounding box
        #[allow(clippy::cast_sign_loss)] // composite glyphs are dispatched earlier
        let number_of_contours = number_of_contours as u16;

        let mut end_points = Vec::with_capacity(number_of_contours.into());
        for _ in 0..number_of_contours {
            end_points.push(cursor.read_u16()?);
        }
        let point_count = end_points.last().map_or(0, |&last| usize::from(last) + 1);

        let instructions_len = cursor.read_u16()?;
        let instructions = cursor.split_at(instructions_len.into())?.bytes;

        // Flag array with run-length compression.
        let mut flags = Vec::with_capacity(point_count);
        while flags.len() < point_count {
            let flag = cursor.read_u8()?;
            flags.push(flag);
            if flag & Self::REPEAT != 0 {
                let repeats = cursor.read_u8()?;
                for _ in 0..repeats {
                    flags.push(flag);
                }
            }
        }
        if flags.len() != point_count {
            return Err(cursor.err(ParseErrorKind::Malformed("extra repeats in glyph flags")));
        }

        let xs = Self::read_coords(&mut cursor, &flags, Self::X_SHORT, Self::X_SAME_OR_POSITIVE)?;
        let ys = Self::read_coords(&mut cursor, &flags, Self::Y_SHORT, Self::Y_SAME_OR_POSITIVE)?;

        let points = flags
            .iter()
            .zip(xs.iter().zip(&ys))
            .map(|(&flag, (&x, &y))| ContourPoint {
                #[allow(clippy::cast_precision_loss)] // coordinates are 16-bit
                x: x as f32,
                #[allow(clippy::cast_precision_loss)]
                y: y as f32,
                on_curve: flag & Self::ON_CURVE != 0,
            })
            .collect();

        Ok(Self {
            end_points,
            points,
            instructions,
        })
    }

    fn read_coords(
        cursor: &mut Cursor<'_>,
        flags: &[u8],
        short_bit: u8,
        same_or_positive_bit: u8,
    ) -> Result<Vec<i32>, ParseError> {
        let mut coords = Vec::with_capacity(flags.len());
        let mut value = 0_i32;
        for &flag in flags {
            if flag & short_bit != 0 {
                let delta = i32::from(cursor.read_u8()?);
                value += if flag & same_or_positive_bit != 0 {
                    delta
                } else {
                    -delta
                };
            } else if flag & same_or_positive_bit == 0 {
                value += i32::from(cursor.read_i16()?);
            }
            coords.push(value);
        }
        Ok(coords)
    }
}

/// `glyf` table together with its `loca` index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GlyfTable<'a> {
    pub(crate) loca: LocaTable<'a>,
    pub(crate) data: &'a [u8],
    pub(crate) base: usize,
}

impl<'a> GlyfTable<'a> {
    pub(crate) fn glyph_data(&self, glyph_id: u16) -> Result<&'a [u8], ParseError> {
        let range = self.loca.glyph_range(glyph_id)?;
        self.data.get(range.clone()).ok_or_else(|| {
            ParseError::new(ParseErrorKind::RangeOutOfBounds {
                range,
                len: self.data.len(),
            })
            .with_table(Tag::GLYF)
            .with_offset(self.base)
        })
    }

    pub(crate) fn glyph(&self, glyph_id: u16) -> Result<Glyph<'a>, ParseError> {
        let range = self.loca.glyph_range(glyph_id)?;
        let base = self.base + range.start;
        let raw = self.glyph_data(glyph_id)?;
        Glyph::parse(Cursor::for_table(raw, base, Tag::GLYF))
    }

    pub(crate) fn glyph_record_base(&self, glyph_id: u16) -> Result<usize, ParseError> {
        Ok(self.base + self.loca.glyph_range(glyph_id)?.start)
    }

    /// Computes the transitive closure of `roots` over composite components.
    ///
    /// The returned set contains all roots. Fails on reference cycles and on
    /// nesting deeper than [`MAX_COMPOSITE_DEPTH`].
    pub(crate) fn closure(
        &self,
        roots: impl IntoIterator<Item = u16>,
    ) -> Result<BTreeSet<u16>, ParseError> {
        let mut visited = BTreeSet::new();
        let mut path = vec![];
        for root in roots {
            self.visit_components(root, &mut visited, &mut path)?;
        }
        Ok(visited)
    }

    fn visit_components(
        &self,
        glyph_id: u16,
        visited: &mut BTreeSet<u16>,
        path: &mut Vec<u16>,
    ) -> Result<(), ParseError> {
        if path.contains(&glyph_id) {
            return Err(ParseError::new(ParseErrorKind::CompositeCycle { glyph_id })
                .with_table(Tag::GLYF));
        }
        if path.len() >= MAX_COMPOSITE_DEPTH {
            return Err(ParseError::new(ParseErrorKind::CompositeDepth {
                limit: MAX_COMPOSITE_DEPTH,
            })
            .with_table(Tag::GLYF));
        }
        if !visited.insert(glyph_id) {
            return Ok(()); // already expanded via another path
        }

        if let Glyph::Composite { components, .. } = self.glyph(glyph_id)? {
            path.push(glyph_id);
            for component in &components {
                self.visit_components(component.glyph_id, visited, path)?;
            }
            path.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::testing::{push_u16, serialize_composite, serialize_simple_glyph};

    fn glyf_fixture(glyphs: &[Vec<u8>]) -> (Vec<u8>, Vec<u8>) {
        let mut glyf = vec![];
        let mut loca = vec![];
        push_u16(&mut loca, 0);
        for glyph in glyphs {
            glyf.extend_from_slice(glyph);
            if glyf.len() % 2 != 0 {
                glyf.push(0);
            }
            push_u16(&mut loca, (glyf.len() / 2) as u16);
        }
        (glyf, loca)
    }

    fn table<'a>(glyf: &'a [u8], loca: &'a [u8]) -> GlyfTable<'a> {
        let glyph_count = loca.len() / 2 - 1;
        GlyfTable {
            loca: LocaTable::new(LocaFormat::Short, glyph_count as u16, loca, 0).unwrap(),
            data: glyf,
            base: 0,
        }
    }

    #[test]
    fn simple_glyph_point_decoding() {
        let glyph = serialize_simple_glyph(
            &[&[(10, 20, true), (110, 20, false), (110, 120, true)]],
            &[1, 2, 3],
        );
        let (glyf, loca) = glyf_fixture(&[vec![], glyph]);
        let table = table(&glyf, &loca);

        assert!(matches!(table.glyph(0).unwrap(), Glyph::Empty));
        let Glyph::Simple { raw, bbox } = table.glyph(1).unwrap() else {
            panic!("expected simple glyph");
        };
        assert_eq!(bbox, [10, 20, 110, 120]);

        let outline = SimpleOutline::parse(raw, 0).unwrap();
        assert_eq!(outline.end_points, [2]);
        assert_eq!(outline.instructions, [1, 2, 3]);
        let coords: Vec<_> = outline
            .points
            .iter()
            .map(|pt| (pt.x as i32, pt.y as i32, pt.on_curve))
            .collect();
        assert_eq!(coords, [(10, 20, true), (110, 20, false), (110, 120, true)]);
    }

    #[test]
    fn composite_closure_is_transitive() {
        // glyph 3 -> {1, 2}, glyph 2 -> {1}; glyphs 0 and 1 are simple/empty.
        let simple = serialize_simple_glyph(&[&[(0, 0, true), (50, 50, true)]], &[]);
        let composite2 = serialize_composite(&[(1, 10, 0)], &[]);
        let composite3 = serialize_composite(&[(1, 0, 0), (2, 100, 10)], &[]);
        let (glyf, loca) = glyf_fixture(&[vec![], simple, composite2, composite3]);
        let table = table(&glyf, &loca);

        let closure = table.closure([3]).unwrap();
        assert_eq!(closure.into_iter().collect::<Vec<_>>(), [1, 2, 3]);

        let closure = table.closure([0, 2]).unwrap();
        assert_eq!(closure.into_iter().collect::<Vec<_>>(), [0, 1, 2]);
    }

    #[test]
    fn composite_cycle_is_detected() {
        // glyph 1 -> glyph 2 -> glyph 1.
        let composite1 = serialize_composite(&[(2, 0, 0)], &[]);
        let composite2 = serialize_composite(&[(1, 0, 0)], &[]);
        let (glyf, loca) = glyf_fixture(&[vec![], composite1, composite2]);
        let table = table(&glyf, &loca);

        let err = table.closure([1]).unwrap_err();
        assert!(matches!(
            err.kind(),
            ParseErrorKind::CompositeCycle { glyph_id: 1 }
        ));
    }
}
