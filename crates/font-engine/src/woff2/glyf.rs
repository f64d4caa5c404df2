//! Inversion of the WOFF2 `glyf`/`loca` and `hmtx` transforms.

use crate::{
    errors::{ParseError, ParseErrorKind},
    glyf::GlyphComponent,
    reader::Cursor,
    woff2::read_255_u16,
};

// Simple glyph flag bits, as re-serialized.
const ON_CURVE: u8 = 1 << 0;
const X_SHORT: u8 = 1 << 1;
const Y_SHORT: u8 = 1 << 2;
const REPEAT: u8 = 1 << 3;
const X_SAME_OR_POSITIVE: u8 = 1 << 4;
const Y_SAME_OR_POSITIVE: u8 = 1 << 5;
const OVERLAP_SIMPLE: u8 = 1 << 6;

const HAS_OVERLAP_BITMAP: u16 = 1 << 0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: i32,
    y: i32,
    on_curve: bool,
}

/// Output of the `glyf` transform inversion.
#[derive(Debug)]
pub(crate) struct ReconstructedGlyf {
    pub(crate) num_glyphs: u16,
    pub(crate) glyf: Vec<u8>,
    pub(crate) loca: Vec<u8>,
    /// Per-glyph `xMin` (0 for empty glyphs), for `hmtx` reconstruction.
    pub(crate) x_mins: Vec<i16>,
}

struct Streams<'a> {
    n_contours: Cursor<'a>,
    n_points: Cursor<'a>,
    flags: Cursor<'a>,
    glyphs: Cursor<'a>,
    composites: Cursor<'a>,
    bbox_bitmap: &'a [u8],
    bboxes: Cursor<'a>,
    instructions: Cursor<'a>,
    overlap_bitmap: Option<&'a [u8]>,
}

/// Rebuilds standard `glyf` and `loca` tables from the transformed `glyf`
/// representation (transform version 0).
pub(crate) fn reconstruct_glyf(data: Cursor<'_>) -> Result<ReconstructedGlyf, ParseError> {
    let mut cursor = data;
    cursor.skip(2)?; // reserved
    let option_flags = cursor.read_u16()?;
    let num_glyphs = cursor.read_u16()?;
    let index_format = cursor.read_u16()?;

    let mut sizes = [0_usize; 7];
    for size in &mut sizes {
        *size = cursor.read_u32()? as usize;
    }
    let mut streams = vec![];
    for size in sizes {
        streams.push(cursor.split_at(size)?);
    }

    let bitmap_len = ((usize::from(num_glyphs) + 31) >> 5) << 2;
    let bbox_stream = streams[5];
    if bitmap_len > bbox_stream.len() {
        return Err(bbox_stream.err(ParseErrorKind::Malformed("bbox bitmap out of bounds")));
    }
    let bbox_bitmap = &bbox_stream.bytes[..bitmap_len];

    let overlap_bitmap = if option_flags & HAS_OVERLAP_BITMAP != 0 {
        let overlap_len = (usize::from(num_glyphs) + 7) >> 3;
        Some(cursor.split_at(overlap_len)?.bytes)
    } else {
        None
    };

    let mut streams = Streams {
        n_contours: streams[0],
        n_points: streams[1],
        flags: streams[2],
        glyphs: streams[3],
        composites: streams[4],
        bbox_bitmap,
        bboxes: bbox_stream.range(bitmap_len..bbox_stream.len())?,
        instructions: streams[6],
        overlap_bitmap,
    };

    let mut glyf = vec![];
    let mut loca_values = Vec::with_capacity(usize::from(num_glyphs) + 1);
    let mut x_mins = Vec::with_capacity(num_glyphs.into());
    for glyph_idx in 0..usize::from(num_glyphs) {
        loca_values.push(glyf.len() as u32);
        let record_start = glyf.len();

        let n_contours = streams.n_contours.read_i16()?;
        let has_bbox = streams.bbox_bitmap[glyph_idx >> 3] & (0x80 >> (glyph_idx & 7)) != 0;
        match n_contours {
            0 => {
                // Empty glyph; per the transform it must not carry a bbox.
                if has_bbox {
                    return Err(streams
                        .bboxes
                        .err(ParseErrorKind::Malformed("empty glyph has a bbox")));
                }
            }
            -1 => {
                if !has_bbox {
                    return Err(streams
                        .bboxes
                        .err(ParseErrorKind::Malformed("composite glyph without a bbox")));
                }
                reconstruct_composite(&mut streams, &mut glyf)?;
            }
            n_contours if n_contours > 0 => {
                let has_overlap_bit = streams
                    .overlap_bitmap
                    .is_some_and(|bitmap| bitmap[glyph_idx >> 3] & (0x80 >> (glyph_idx & 7)) != 0);
                #[allow(clippy::cast_sign_loss)] // just checked to be positive
                reconstruct_simple(
                    &mut streams,
                    n_contours as u16,
                    has_bbox,
                    has_overlap_bit,
                    &mut glyf,
                )?;
            }
            _ => {
                return Err(streams
                    .n_contours
                    .err(ParseErrorKind::Malformed("invalid contour count")));
            }
        }

        x_mins.push(if glyf.len() > record_start {
            i16::from_be_bytes([glyf[record_start + 2], glyf[record_start + 3]])
        } else {
            0
        });

        // Pad each glyph record to a 4-byte boundary.
        while glyf.len() % 4 != 0 {
            glyf.push(0);
        }
    }
    loca_values.push(glyf.len() as u32);

    let mut loca = Vec::with_capacity(loca_values.len() * if index_format == 0 { 2 } else { 4 });
    for &value in &loca_values {
        if index_format == 0 {
            #[allow(clippy::cast_possible_truncation)] // offsets are even and bounded
            loca.extend_from_slice(&((value >> 1) as u16).to_be_bytes());
        } else {
            loca.extend_from_slice(&value.to_be_bytes());
        }
    }

    Ok(ReconstructedGlyf {
        num_glyphs,
        glyf,
        loca,
        x_mins,
    })
}

fn reconstruct_composite(streams: &mut Streams<'_>, out: &mut Vec<u8>) -> Result<(), ParseError> {
    // Measure the component run first, then copy it verbatim.
    let mut probe = streams.composites;
    let mut composite_len = 0_usize;
    let mut have_instructions = false;
    loop {
        let flags = probe.read_u16()?;
        have_instructions |= flags & GlyphComponent::WE_HAVE_INSTRUCTIONS != 0;
        let mut arg_len = if flags & GlyphComponent::ARG_1_AND_2_ARE_WORDS != 0 {
            4
        } else {
            2
        };
        if flags & GlyphComponent::WE_HAVE_A_SCALE != 0 {
            arg_len += 2;
        } else if flags & GlyphComponent::WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            arg_len += 4;
        } else if flags & GlyphComponent::WE_HAVE_A_TWO_BY_TWO != 0 {
            arg_len += 8;
        }
        probe.skip(2 + arg_len)?; // component glyph ID + args + transform
        composite_len += 4 + arg_len;
        if flags & GlyphComponent::MORE_COMPONENTS == 0 {
            break;
        }
    }

    out.extend_from_slice(&(-1_i16).to_be_bytes());
    let bbox = streams.bboxes.split_at(8)?;
    out.extend_from_slice(bbox.bytes);
    let components = streams.composites.split_at(composite_len)?;
    out.extend_from_slice(components.bytes);

    if have_instructions {
        let instruction_len = read_255_u16(&mut streams.glyphs)?;
        out.extend_from_slice(&instruction_len.to_be_bytes());
        let instructions = streams.instructions.split_at(instruction_len.into())?;
        out.extend_from_slice(instructions.bytes);
    }
    Ok(())
}

fn reconstruct_simple(
    streams: &mut Streams<'_>,
    n_contours: u16,
    has_bbox: bool,
    has_overlap_bit: bool,
    out: &mut Vec<u8>,
) -> Result<(), ParseError> {
    let mut end_points = Vec::with_capacity(n_contours.into());
    let mut total_points = 0_u32;
    for _ in 0..n_contours {
        let contour_points = read_255_u16(&mut streams.n_points)?;
        if contour_points == 0 {
            return Err(streams
                .n_points
                .err(ParseErrorKind::Malformed("contour without points")));
        }
        total_points += u32::from(contour_points);
        if total_points > 0xffff {
            return Err(streams
                .n_points
                .err(ParseErrorKind::Malformed("too many points in a glyph")));
        }
        end_points.push(total_points - 1);
    }

    let flags = streams.flags.split_at(total_points as usize)?;
    let points = decode_triplets(flags.bytes, &mut streams.glyphs)?;
    let instruction_len = read_255_u16(&mut streams.glyphs)?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    out.extend_from_slice(&(n_contours as i16).to_be_bytes());
    if has_bbox {
        let bbox = streams.bboxes.split_at(8)?;
        out.extend_from_slice(bbox.bytes);
    } else {
        write_bbox(&points, out);
    }
    for &end_point in &end_points {
        #[allow(clippy::cast_possible_truncation)] // bounded by the check above
        out.extend_from_slice(&(end_point as u16).to_be_bytes());
    }
    out.extend_from_slice(&instruction_len.to_be_bytes());
    let instructions = streams.instructions.split_at(instruction_len.into())?;
    out.extend_from_slice(instructions.bytes);
    write_points(&points, has_overlap_bit, out);
    Ok(())
}

/// Decodes per-point triplets: the flag byte selects one of the packed
/// delta encodings (1 to 4 extra bytes), the high bit marks off-curve.
fn decode_triplets(flags: &[u8], glyphs: &mut Cursor<'_>) -> Result<Vec<Point>, ParseError> {
    fn with_sign(flag: i32, base: i32) -> i32 {
        if flag & 1 != 0 {
            base
        } else {
            -base
        }
    }

    let mut points = Vec::with_capacity(flags.len());
    let (mut x, mut y) = (0_i32, 0_i32);
    for &raw_flag in flags {
        let on_curve = raw_flag >> 7 == 0;
        let flag = i32::from(raw_flag & 0x7f);

        let (dx, dy);
        if flag < 10 {
            dx = 0;
            dy = with_sign(flag, ((flag & 14) << 7) + i32::from(glyphs.read_u8()?));
        } else if flag < 20 {
            dx = with_sign(flag, (((flag - 10) & 14) << 7) + i32::from(glyphs.read_u8()?));
            dy = 0;
        } else if flag < 84 {
            let b0 = flag - 20;
            let b1 = i32::from(glyphs.read_u8()?);
            dx = with_sign(flag, 1 + (b0 & 0x30) + (b1 >> 4));
            dy = with_sign(flag >> 1, 1 + ((b0 & 0x0c) << 2) + (b1 & 0x0f));
        } else if flag < 120 {
            let b0 = flag - 84;
            dx = with_sign(flag, 1 + ((b0 / 12) << 8) + i32::from(glyphs.read_u8()?));
            dy = with_sign(
                flag >> 1,
                1 + (((b0 % 12) >> 2) << 8) + i32::from(glyphs.read_u8()?),
            );
        } else if flag < 124 {
            let b1 = i32::from(glyphs.read_u8()?);
            let b2 = i32::from(glyphs.read_u8()?);
            let b3 = i32::from(glyphs.read_u8()?);
            dx = with_sign(flag, (b1 << 4) + (b2 >> 4));
            dy = with_sign(flag >> 1, ((b2 & 0x0f) << 8) + b3);
        } else {
            dx = with_sign(flag, i32::from(glyphs.read_u16()?));
            dy = with_sign(flag >> 1, i32::from(glyphs.read_u16()?));
        }
        x = x.checked_add(dx).ok_or_else(|| {
            glyphs.err(ParseErrorKind::Malformed("coordinate overflow"))
        })?;
        y = y.checked_add(dy).ok_or_else(|| {
            glyphs.err(ParseErrorKind::Malformed("coordinate overflow"))
        })?;
        points.push(Point { x, y, on_curve });
    }
    Ok(points)
}

#[allow(clippy::cast_possible_truncation)] // coordinates are validated 16-bit
fn write_bbox(points: &[Point], out: &mut Vec<u8>) {
    let (mut x_min, mut y_min, mut x_max, mut y_max) = (0, 0, 0, 0);
    if let Some(first) = points.first() {
        (x_min, y_min, x_max, y_max) = (first.x, first.y, first.x, first.y);
    }
    for point in points.iter().skip(1) {
        x_min = x_min.min(point.x);
        y_min = y_min.min(point.y);
        x_max = x_max.max(point.x);
        y_max = y_max.max(point.y);
    }
    for value in [x_min, y_min, x_max, y_max] {
        out.extend_from_slice(&(value as i16).to_be_bytes());
    }
}

/// Serializes points in the standard `glyf` encoding with run-length
/// compressed flags and short/long deltas.
#[allow(clippy::cast_possible_truncation)]
fn write_points(points: &[Point], has_overlap_bit: bool, out: &mut Vec<u8>) {
    let mut last_flag = 0x100_u16; // never equal to a real flag
    let mut repeats = 0_u8;
    let (mut last_x, mut last_y) = (0_i32, 0_i32);
    for (idx, point) in points.iter().enumerate() {
        let mut flag = 0_u8;
        if point.on_curve {
            flag |= ON_CURVE;
        }
        if has_overlap_bit && idx == 0 {
            flag |= OVERLAP_SIMPLE;
        }
        let dx = point.x - last_x;
        if dx == 0 {
            flag |= X_SAME_OR_POSITIVE;
        } else if (-255..=255).contains(&dx) {
            flag |= X_SHORT | if dx > 0 { X_SAME_OR_POSITIVE } else { 0 };
        }
        let dy = point.y - last_y;
        if dy == 0 {
            flag |= Y_SAME_OR_POSITIVE;
        } else if (-255..=255).contains(&dy) {
            flag |= Y_SHORT | if dy > 0 { Y_SAME_OR_POSITIVE } else { 0 };
        }

        // Flags are buffered so that a run of equal values collapses into
        // one flag with the repeat bit and a count byte.
        if u16::from(flag) == last_flag && repeats < 255 {
            repeats += 1;
        } else {
            flush_flag(last_flag, repeats, out);
            repeats = 0;
        }
        last_flag = flag.into();
        (last_x, last_y) = (point.x, point.y);
    }
    flush_flag(last_flag, repeats, out);

    let mut last_x = 0;
    for point in points {
        let dx = point.x - last_x;
        if dx != 0 {
            if (-255..=255).contains(&dx) {
                out.push(dx.unsigned_abs() as u8);
            } else {
                out.extend_from_slice(&(dx as i16).to_be_bytes());
            }
        }
        last_x = point.x;
    }
    let mut last_y = 0;
    for point in points {
        let dy = point.y - last_y;
        if dy != 0 {
            if (-255..=255).contains(&dy) {
                out.push(dy.unsigned_abs() as u8);
            } else {
                out.extend_from_slice(&(dy as i16).to_be_bytes());
            }
        }
        last_y = point.y;
    }
}

#[allow(clippy::cast_possible_truncation)]
fn flush_flag(flag: u16, repeats: u8, out: &mut Vec<u8>) {
    if flag > 0xff {
        return; // initial sentinel; nothing buffered yet
    }
    if repeats > 0 {
        out.push(flag as u8 | REPEAT);
        out.push(repeats);
    } else {
        out.push(flag as u8);
    }
}

/// Rebuilds a standard `hmtx` table from its transformed representation:
/// omitted side bearings are recovered from per-glyph `xMin` values (0 for
/// glyphs without contours).
pub(crate) fn reconstruct_hmtx(
    data: Cursor<'_>,
    glyf: &ReconstructedGlyf,
    num_h_metrics: u16,
) -> Result<Vec<u8>, ParseError> {
    let mut cursor = data;
    let flags = cursor.read_u8()?;
    let has_proportional_sbs = flags & 1 == 0;
    let has_monospace_sbs = flags & 2 == 0;
    if flags & 0xfc != 0 {
        return Err(cursor.err(ParseErrorKind::Malformed("reserved hmtx flag bits set")));
    }
    if has_proportional_sbs && has_monospace_sbs {
        return Err(cursor.err(ParseErrorKind::Malformed("hmtx transform without effect")));
    }
    let num_glyphs = glyf.num_glyphs;
    if num_h_metrics > num_glyphs || num_h_metrics == 0 {
        return Err(cursor.err(ParseErrorKind::Malformed("invalid numberOfHMetrics")));
    }

    let advances = (0..num_h_metrics)
        .map(|_| cursor.read_u16())
        .collect::<Result<Vec<_>, _>>()?;
    let mut side_bearings = Vec::with_capacity(num_glyphs.into());
    for glyph_idx in 0..num_glyphs {
        let explicit = if glyph_idx < num_h_metrics {
            has_proportional_sbs
        } else {
            has_monospace_sbs
        };
        side_bearings.push(if explicit {
            cursor.read_i16()?
        } else {
            glyf.x_mins[usize::from(glyph_idx)]
        });
    }

    let mut hmtx = Vec::with_capacity(usize::from(num_h_metrics) * 2 + usize::from(num_glyphs) * 2);
    for glyph_idx in 0..usize::from(num_glyphs) {
        if let Some(&advance) = advances.get(glyph_idx) {
            hmtx.extend_from_slice(&advance.to_be_bytes());
        }
        hmtx.extend_from_slice(&side_bearings[glyph_idx].to_be_bytes());
    }
    Ok(hmtx)
}
