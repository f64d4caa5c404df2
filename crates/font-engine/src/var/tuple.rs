//! Tuple variation stores (`gvar` and `cvar`).

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
    tables::Tag,
};

const SHARED_POINT_NUMBERS: u16 = 0x8000;
const COUNT_MASK: u16 = 0x0fff;

const EMBEDDED_PEAK_TUPLE: u16 = 0x8000;
const INTERMEDIATE_REGION: u16 = 0x4000;
const PRIVATE_POINT_NUMBERS: u16 = 0x2000;
const TUPLE_INDEX_MASK: u16 = 0x0fff;

/// One tuple variation header with resolved peak/intermediate tuples.
#[derive(Debug, Clone)]
struct TupleHeader {
    data_size: u16,
    peak: Vec<f32>,
    intermediate: Option<(Vec<f32>, Vec<f32>)>,
    private_points: bool,
}

fn read_tuple(cursor: &mut Cursor<'_>, axis_count: u16) -> Result<Vec<f32>, ParseError> {
    (0..axis_count).map(|_| cursor.read_f2dot14()).collect()
}

fn read_tuple_header(
    cursor: &mut Cursor<'_>,
    axis_count: u16,
    shared_tuples: &[Vec<f32>],
) -> Result<TupleHeader, ParseError> {
    let data_size = cursor.read_u16()?;
    let tuple_index = cursor.read_u16()?;
    let peak = if tuple_index & EMBEDDED_PEAK_TUPLE != 0 {
        read_tuple(cursor, axis_count)?
    } else {
        let idx = usize::from(tuple_index & TUPLE_INDEX_MASK);
        shared_tuples
            .get(idx)
            .cloned()
            .ok_or_else(|| cursor.err(ParseErrorKind::Malformed("shared tuple index out of range")))?
    };
    let intermediate = if tuple_index & INTERMEDIATE_REGION != 0 {
        let start = read_tuple(cursor, axis_count)?;
        let end = read_tuple(cursor, axis_count)?;
        Some((start, end))
    } else {
        None
    };
    Ok(TupleHeader {
        data_size,
        peak,
        intermediate,
        private_points: tuple_index & PRIVATE_POINT_NUMBERS != 0,
    })
}

impl TupleHeader {
    /// Scalar of this tuple at the given normalized coordinates.
    fn scalar(&self, coords: &[f32]) -> f32 {
        let mut scalar = 1.0_f32;
        for (i, &peak) in self.peak.iter().enumerate() {
            if peak == 0.0 {
                continue;
            }
            let coord = coords.get(i).copied().unwrap_or(0.0);
            if (coord - peak).abs() < f32::EPSILON {
                continue;
            }
            if let Some((start, end)) = &self.intermediate {
                let (start, end) = (start[i], end[i]);
                let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
                if coord < lo || coord > hi {
                    return 0.0;
                }
                if coord < peak {
                    if (peak - start).abs() < f32::EPSILON {
                        return 0.0;
                    }
                    scalar *= (coord - start) / (peak - start);
                } else {
                    if (end - peak).abs() < f32::EPSILON {
                        return 0.0;
                    }
                    scalar *= (end - coord) / (end - peak);
                }
            } else {
                if coord == 0.0 {
                    return 0.0;
                }
                if coord < peak.min(0.0) || coord > peak.max(0.0) {
                    return 0.0;
                }
                scalar *= coord / peak;
            }
        }
        scalar
    }
}

/// Decodes a packed point-number list; `None` means "all points".
fn read_packed_points(cursor: &mut Cursor<'_>) -> Result<Option<Vec<u16>>, ParseError> {
    let first = cursor.read_u8()?;
    let count = if first == 0 {
        return Ok(None);
    } else if first & 0x80 != 0 {
        (u16::from(first & 0x7f) << 8) | u16::from(cursor.read_u8()?)
    } else {
        first.into()
    };

    let mut points = Vec::with_capacity(count.into());
    let mut last = 0_u16;
    while points.len() < count.into() {
        let control = cursor.read_u8()?;
        let run_len = usize::from(control & 0x7f) + 1;
        let words = control & 0x80 != 0;
        for _ in 0..run_len {
            if points.len() >= count.into() {
                break;
            }
            let delta = if words {
                cursor.read_u16()?
            } else {
                cursor.read_u8()?.into()
            };
            last = last.wrapping_add(delta);
            points.push(last);
        }
    }
    Ok(Some(points))
}

/// Decodes `count` packed deltas (zero runs, byte runs and word runs).
fn read_packed_deltas(cursor: &mut Cursor<'_>, count: usize) -> Result<Vec<i32>, ParseError> {
    const DELTAS_ARE_ZERO: u8 = 0x80;
    const DELTAS_ARE_WORDS: u8 = 0x40;
    const COUNT_MASK: u8 = 0x3f;

    let mut deltas = Vec::with_capacity(count);
    while deltas.len() < count {
        let control = cursor.read_u8()?;
        let run_len = usize::from(control & COUNT_MASK) + 1;
        for _ in 0..run_len {
            if deltas.len() >= count {
                break;
            }
            let delta = if control & DELTAS_ARE_ZERO != 0 {
                0
            } else if control & DELTAS_ARE_WORDS != 0 {
                cursor.read_i16()?.into()
            } else {
                cursor.read_i8()?.into()
            };
            deltas.push(delta);
        }
    }
    Ok(deltas)
}

/// Parsed `gvar` table.
#[derive(Debug, Clone)]
pub(crate) struct GvarTable<'a> {
    raw: &'a [u8],
    base: usize,
    axis_count: u16,
    shared_tuples: Vec<Vec<f32>>,
    glyph_count: u16,
    long_offsets: bool,
    offsets_start: usize,
    data_start: usize,
}

impl<'a> GvarTable<'a> {
    pub(crate) fn parse(bytes: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let table = Cursor::for_table(bytes, base, Tag::GVAR);
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
        let axis_count = cursor.read_u16()?;
        let shared_tuple_count = cursor.read_u16()?;
        let shared_tuples_offset = cursor.read_u32()? as usize;
        let glyph_count = cursor.read_u16()?;
        let flags = cursor.read_u16()?;
        let data_start = cursor.read_u32()? as usize;
        let offsets_start = 20;

        let mut shared_cursor = table.range(shared_tuples_offset..table.len())?;
        let shared_tuples = (0..shared_tuple_count)
            .map(|_| read_tuple(&mut shared_cursor, axis_count))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            raw: bytes,
            base,
            axis_count,
            shared_tuples,
            glyph_count,
            long_offsets: flags & 1 != 0,
            offsets_start,
            data_start,
        })
    }

    fn glyph_data(&self, glyph_id: u16) -> Result<Option<Cursor<'a>>, ParseError> {
        if glyph_id >= self.glyph_count {
            return Ok(None);
        }
        let table = Cursor::for_table(self.raw, self.base, Tag::GVAR);
        let width = if self.long_offsets { 4 } else { 2 };
        let mut offsets = table.range(
            self.offsets_start + usize::from(glyph_id) * width..self.raw.len(),
        )?;
        let (start, end) = if self.long_offsets {
            (offsets.read_u32()? as usize, offsets.read_u32()? as usize)
        } else {
            (
                usize::from(offsets.read_u16()?) * 2,
                usize::from(offsets.read_u16()?) * 2,
            )
        };
        if start >= end {
            return Ok(None);
        }
        Some(table.range(self.data_start + start..self.data_start + end)).transpose()
    }

    /// Accumulated per-point deltas for a glyph at the given coordinates.
    ///
    /// `point_count` includes the four phantom points; deltas apply to
    /// explicitly referenced points only.
    pub(crate) fn deltas(
        &self,
        glyph_id: u16,
        coords: &[f32],
        point_count: usize,
    ) -> Result<Vec<(f32, f32)>, ParseError> {
        let mut accum = vec![(0.0, 0.0); point_count];
        let Some(data) = self.glyph_data(glyph_id)? else {
            return Ok(accum);
        };

        let mut cursor = data;
        let tuple_count = cursor.read_u16()?;
        let serialized_offset = usize::from(cursor.read_u16()?);
        let mut serialized = data.range(serialized_offset..data.len())?;

        let shared_points = if tuple_count & SHARED_POINT_NUMBERS != 0 {
            read_packed_points(&mut serialized)?
        } else {
            None
        };

        let headers = (0..tuple_count & COUNT_MASK)
            .map(|_| read_tuple_header(&mut cursor, self.axis_count, &self.shared_tuples))
            .collect::<Result<Vec<_>, _>>()?;

        for header in headers {
            let mut body = serialized.split_at(header.data_size.into())?;
            let scalar = header.scalar(coords);
            let points = if header.private_points {
                read_packed_points(&mut body)?
            } else {
                shared_points.clone()
            };
            if scalar == 0.0 {
                continue;
            }

            let delta_count = points.as_ref().map_or(point_count, Vec::len);
            let x_deltas = read_packed_deltas(&mut body, delta_count)?;
            let y_deltas = read_packed_deltas(&mut body, delta_count)?;
            #[allow(clippy::cast_precision_loss)] // deltas are 16-bit
            match &points {
                None => {
                    for (point, (dx, dy)) in accum.iter_mut().zip(x_deltas.iter().zip(&y_deltas)) {
                        point.0 += scalar * *dx as f32;
                        point.1 += scalar * *dy as f32;
                    }
                }
                Some(points) => {
                    for ((&point_idx, &dx), &dy) in points.iter().zip(&x_deltas).zip(&y_deltas) {
                        if let Some(point) = accum.get_mut(usize::from(point_idx)) {
                            point.0 += scalar * dx as f32;
                            point.1 += scalar * dy as f32;
                        }
                    }
                }
            }
        }
        Ok(accum)
    }
}

/// Parsed `cvar` table: tuple variations applied to the `cvt ` values.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CvarTable<'a> {
    raw: &'a [u8],
    base: usize,
}

impl<'a> CvarTable<'a> {
    pub(crate) fn new(raw: &'a [u8], base: usize) -> Self {
        Self { raw, base }
    }

    /// Accumulated deltas for the control values at the given coordinates.
    pub(crate) fn deltas(
        &self,
        axis_count: u16,
        coords: &[f32],
        cvt_count: usize,
    ) -> Result<Vec<f32>, ParseError> {
        let table = Cursor::for_table(self.raw, self.base, Tag::CVAR);
        let mut cursor = table;
        cursor.skip(4)?; // version
        let tuple_count = cursor.read_u16()?;
        let serialized_offset = usize::from(cursor.read_u16()?);
        let mut serialized = table.range(serialized_offset..table.len())?;

        let shared_points = if tuple_count & SHARED_POINT_NUMBERS != 0 {
            read_packed_points(&mut serialized)?
        } else {
            None
        };

        let headers = (0..tuple_count & COUNT_MASK)
            .map(|_| read_tuple_header(&mut cursor, axis_count, &[]))
            .collect::<Result<Vec<_>, _>>()?;

        let mut accum = vec![0.0; cvt_count];
        for header in headers {
            let mut body = serialized.split_at(header.data_size.into())?;
            let scalar = header.scalar(coords);
            let points = if header.private_points {
                read_packed_points(&mut body)?
            } else {
                shared_points.clone()
            };
            if scalar == 0.0 {
                continue;
            }
            let delta_count = points.as_ref().map_or(cvt_count, Vec::len);
            let deltas = read_packed_deltas(&mut body, delta_count)?;
            #[allow(clippy::cast_precision_loss)] // deltas are 16-bit
            match &points {
                None => {
                    for (value, &delta) in accum.iter_mut().zip(&deltas) {
                        *value += scalar * delta as f32;
                    }
                }
                Some(points) => {
                    for (&point_idx, &delta) in points.iter().zip(&deltas) {
                        if let Some(value) = accum.get_mut(usize::from(point_idx)) {
                            *value += scalar * delta as f32;
                        }
                    }
                }
            }
        }
        Ok(accum)
    }
}
