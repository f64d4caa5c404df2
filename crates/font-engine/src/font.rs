//! The `Font` facade: container decoding and table access.

use crate::{
    cff::{Cff2Table, CffTable},
    errors::{ParseError, ParseErrorKind},
    glyf::{GlyfTable, Glyph, GlyphComponent, LocaTable, SimpleOutline, MAX_COMPOSITE_DEPTH},
    outline::{emit_quad_contours, ContourPoint, Outline, OutlineSink},
    reader::Cursor,
    tables::{
        cmap::CmapTable,
        kern::KernTable,
        metrics::{HheaTable, HmtxTable},
        name::{NameId, NameTable},
        post::PostTable,
        HeadTable, MaxpTable, Os2Table, Tag, VorgTable,
    },
    var::{
        metrics::{HvarTable, MvarTable},
        normalize,
        tuple::{CvarTable, GvarTable},
        AvarTable, FvarTable, Instance, NamedInstance, VariationAxis,
    },
};

pub(crate) const SFNT_VERSION_TRUETYPE: u32 = 0x0001_0000;
pub(crate) const SFNT_VERSION_CFF: u32 = u32::from_be_bytes(*b"OTTO");
const SFNT_VERSION_APPLE: u32 = u32::from_be_bytes(*b"true");
const SFNT_VERSION_TYP1: u32 = u32::from_be_bytes(*b"typ1");
const TTC_MAGIC: u32 = u32::from_be_bytes(*b"ttcf");

pub(crate) fn is_sfnt_version(magic: u32) -> bool {
    matches!(
        magic,
        SFNT_VERSION_TRUETYPE | SFNT_VERSION_CFF | SFNT_VERSION_APPLE | SFNT_VERSION_TYP1
    )
}

/// Glyph outline source of a font.
#[derive(Debug)]
pub(crate) enum OutlineData<'a> {
    Glyf(GlyfTable<'a>),
    Cff(CffTable<'a>),
    Cff2(Cff2Table<'a>),
}

/// A parsed font.
///
/// Borrows the backing byte slice; all queries are read-only, so a `Font`
/// can be shared freely between threads. WOFF/WOFF2 containers must be
/// reconstructed into SFNT bytes first (see [`decompress`](crate::decompress)).
#[derive(Debug)]
pub struct Font<'a> {
    pub(crate) data: &'a [u8],
    /// Directory entries `(tag, table bytes, file offset)` in directory order.
    pub(crate) tables: Vec<(Tag, &'a [u8], usize)>,
    pub(crate) head: HeadTable<'a>,
    pub(crate) maxp: MaxpTable<'a>,
    pub(crate) cmap: CmapTable<'a>,
    pub(crate) hhea: HheaTable<'a>,
    pub(crate) hmtx: HmtxTable<'a>,
    pub(crate) name: NameTable<'a>,
    pub(crate) post: PostTable<'a>,
    pub(crate) os2: Option<Os2Table<'a>>,
    pub(crate) vhea: Option<HheaTable<'a>>,
    pub(crate) vmtx: Option<HmtxTable<'a>>,
    pub(crate) vorg: Option<VorgTable>,
    pub(crate) kern: Option<KernTable<'a>>,
    pub(crate) outlines: OutlineData<'a>,
    pub(crate) fvar: Option<FvarTable>,
    pub(crate) avar: Option<AvarTable>,
    pub(crate) gvar: Option<GvarTable<'a>>,
    pub(crate) cvar: Option<CvarTable<'a>>,
    pub(crate) hvar: Option<HvarTable>,
    pub(crate) vvar: Option<HvarTable>,
    pub(crate) mvar: Option<MvarTable>,
}

impl<'a> Font<'a> {
    /// Parses an SFNT font, or the first font of a collection.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ParseError> {
        Self::parse_at(bytes, 0)
    }

    /// Parses the font at `index` of a collection (`index` must be 0 for a
    /// plain SFNT).
    pub fn parse_at(bytes: &'a [u8], index: u32) -> Result<Self, ParseError> {
        let mut cursor = Cursor::new(bytes);
        let magic = cursor.read_u32()?;
        let sfnt_offset = if magic == TTC_MAGIC {
            cursor.skip(4)?; // version
            let count = cursor.read_u32()?;
            if index >= count {
                return Err(cursor.err(ParseErrorKind::OffsetOutOfBounds(index as usize)));
            }
            cursor.skip(index as usize * 4)?;
            cursor.read_u32()? as usize
        } else if is_sfnt_version(magic) {
            if index != 0 {
                return Err(cursor.err(ParseErrorKind::OffsetOutOfBounds(index as usize)));
            }
            0
        } else {
            return Err(ParseError::new(ParseErrorKind::BadMagic { magic }));
        };
        Self::parse_sfnt(bytes, sfnt_offset)
    }

    /// Number of fonts in a collection; 1 for a plain SFNT, `None` when the
    /// bytes are not an SFNT-flavored container.
    pub fn collection_count(bytes: &[u8]) -> Option<u32> {
        let mut cursor = Cursor::new(bytes);
        let magic = cursor.read_u32().ok()?;
        if magic == TTC_MAGIC {
            cursor.skip(4).ok()?;
            cursor.read_u32().ok()
        } else if is_sfnt_version(magic) {
            Some(1)
        } else {
            None
        }
    }

    fn parse_sfnt(bytes: &'a [u8], offset: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::at(&bytes[offset.min(bytes.len())..], offset);
        cursor.read_u32_checked(|magic| {
            if is_sfnt_version(magic) {
                Ok(())
            } else {
                Err(ParseErrorKind::BadMagic { magic })
            }
        })?;
        let table_count = cursor.read_u16()?;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut tables = Vec::with_capacity(table_count.into());
        for _ in 0..table_count {
            let tag = cursor.read_tag()?;
            cursor.skip(4)?; // checksum
            let table_offset = cursor.read_u32()? as usize;
            let len = cursor.read_u32()? as usize;
            let table_bytes = table_offset
                .checked_add(len)
                .and_then(|end| bytes.get(table_offset..end))
                .ok_or_else(|| {
                    cursor
                        .err(ParseErrorKind::RangeOutOfBounds {
                            range: table_offset..table_offset.saturating_add(len),
                            len: bytes.len(),
                        })
                        .with_table(tag)
                })?;
            tables.push((tag, table_bytes, table_offset));
        }

        Self::from_tables(bytes, tables)
    }

    fn from_tables(
        data: &'a [u8],
        tables: Vec<(Tag, &'a [u8], usize)>,
    ) -> Result<Self, ParseError> {
        let find = |tag: Tag| {
            tables
                .iter()
                .find(|&&(table_tag, ..)| table_tag == tag)
                .map(|&(_, bytes, offset)| (bytes, offset))
        };
        let required = |tag: Tag| find(tag).ok_or_else(|| ParseError::missing_table(tag));

        let (head_bytes, head_offset) = required(Tag::HEAD)?;
        let head = HeadTable::parse(head_bytes, head_offset)?;
        let (maxp_bytes, maxp_offset) = required(Tag::MAXP)?;
        let maxp = MaxpTable::parse(maxp_bytes, maxp_offset)?;
        let (cmap_bytes, cmap_offset) = required(Tag::CMAP)?;
        let cmap = CmapTable::parse(cmap_bytes, cmap_offset)?;
        let (hhea_bytes, hhea_offset) = required(Tag::HHEA)?;
        let hhea = HheaTable::parse(hhea_bytes, hhea_offset, Tag::HHEA)?;
        let (hmtx_bytes, hmtx_offset) = required(Tag::HMTX)?;
        let hmtx = HmtxTable::new(hmtx_bytes, hmtx_offset, Tag::HMTX, hhea.number_of_metrics);
        let (name_bytes, name_offset) = required(Tag::NAME)?;
        let name = NameTable::parse(name_bytes, name_offset)?;
        let (post_bytes, post_offset) = required(Tag::POST)?;
        let post = PostTable::parse(post_bytes, post_offset)?;

        let os2 = find(Tag::OS2)
            .map(|(bytes, offset)| Os2Table::parse(bytes, offset))
            .transpose()?;
        let vhea = find(Tag::VHEA)
            .map(|(bytes, offset)| HheaTable::parse(bytes, offset, Tag::VHEA))
            .transpose()?;
        let vmtx = match (&vhea, find(Tag::VMTX)) {
            (Some(vhea), Some((bytes, offset))) => Some(HmtxTable::new(
                bytes,
                offset,
                Tag::VMTX,
                vhea.number_of_metrics,
            )),
            _ => None,
        };
        let vorg = find(Tag::VORG)
            .map(|(bytes, offset)| VorgTable::parse(bytes, offset))
            .transpose()?;
        let kern = find(Tag::KERN)
            .map(|(bytes, offset)| KernTable::parse(bytes, offset))
            .transpose()?;

        // Exactly one outline source: glyf+loca, CFF or CFF2.
        let outlines = if let Some((glyf_bytes, glyf_offset)) = find(Tag::GLYF) {
            let (loca_bytes, loca_offset) = required(Tag::LOCA)?;
            let loca = LocaTable::new(head.loca_format, maxp.num_glyphs, loca_bytes, loca_offset)?;
            OutlineData::Glyf(GlyfTable {
                loca,
                data: glyf_bytes,
                base: glyf_offset,
            })
        } else if let Some((cff_bytes, cff_offset)) = find(Tag::CFF) {
            OutlineData::Cff(CffTable::parse(cff_bytes, cff_offset)?)
        } else if let Some((cff2_bytes, cff2_offset)) = find(Tag::CFF2) {
            OutlineData::Cff2(Cff2Table::parse(cff2_bytes, cff2_offset)?)
        } else {
            return Err(ParseError::missing_table(Tag::GLYF));
        };

        let fvar = find(Tag::FVAR)
            .map(|(bytes, offset)| FvarTable::parse(bytes, offset))
            .transpose()?;
        let avar = find(Tag::AVAR)
            .map(|(bytes, offset)| AvarTable::parse(bytes, offset))
            .transpose()?;
        let gvar = find(Tag::GVAR)
            .map(|(bytes, offset)| GvarTable::parse(bytes, offset))
            .transpose()?;
        let cvar = find(Tag::CVAR).map(|(bytes, offset)| CvarTable::new(bytes, offset));
        let hvar = find(Tag::HVAR)
            .map(|(bytes, offset)| HvarTable::parse(bytes, offset, Tag::HVAR))
            .transpose()?;
        let vvar = find(Tag::VVAR)
            .map(|(bytes, offset)| HvarTable::parse(bytes, offset, Tag::VVAR))
            .transpose()?;
        let mvar = find(Tag::MVAR)
            .map(|(bytes, offset)| MvarTable::parse(bytes, offset))
            .transpose()?;

        Ok(Self {
            data,
            tables,
            head,
            maxp,
            cmap,
            hhea,
            hmtx,
            name,
            post,
            os2,
            vhea,
            vmtx,
            vorg,
            kern,
            outlines,
            fvar,
            avar,
            gvar,
            cvar,
            hvar,
            vvar,
            mvar,
        })
    }

    /// The backing bytes this font was parsed from.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Raw bytes of a table, if present.
    pub fn raw_table(&self, tag: [u8; 4]) -> Option<&'a [u8]> {
        self.tables
            .iter()
            .find(|&&(table_tag, ..)| table_tag == Tag(tag))
            .map(|&(_, bytes, _)| bytes)
    }

    /// Number of glyphs in the font.
    pub fn num_glyphs(&self) -> u16 {
        self.maxp.num_glyphs
    }

    /// Font units per em.
    pub fn units_per_em(&self) -> u16 {
        self.head.units_per_em
    }

    /// Typographic ascender (from `hhea`).
    pub fn ascender(&self) -> i16 {
        self.hhea.ascender
    }

    /// Typographic descender (from `hhea`; negative below the baseline).
    pub fn descender(&self) -> i16 {
        self.hhea.descender
    }

    /// Line gap (from `hhea`).
    pub fn line_gap(&self) -> i16 {
        self.hhea.line_gap
    }

    /// Typographic ascender from `OS/2`, when present.
    pub fn typographic_ascender(&self) -> Option<i16> {
        Some(self.os2.as_ref()?.typo_ascender)
    }

    /// Typographic descender from `OS/2`, when present.
    pub fn typographic_descender(&self) -> Option<i16> {
        Some(self.os2.as_ref()?.typo_descender)
    }

    /// Typographic line gap from `OS/2`, when present.
    pub fn typographic_line_gap(&self) -> Option<i16> {
        Some(self.os2.as_ref()?.typo_line_gap)
    }

    /// Capital height from `OS/2`, when present.
    pub fn cap_height(&self) -> Option<i16> {
        self.os2.as_ref()?.cap_height
    }

    /// x-height from `OS/2`, when present.
    pub fn x_height(&self) -> Option<i16> {
        self.os2.as_ref()?.x_height
    }

    /// Font-wide bounding box `[x_min, y_min, x_max, y_max]` (from `head`).
    pub fn bounding_box(&self) -> [i16; 4] {
        self.head.bbox
    }

    /// Maps a character to its glyph ID.
    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        let glyph_id = self.cmap.glyph_id(ch.into())?;
        (glyph_id < self.maxp.num_glyphs).then_some(glyph_id)
    }

    /// Maps a variation sequence (base character plus variation selector) to
    /// its glyph ID.
    pub fn glyph_variation_id(&self, ch: char, selector: char) -> Option<u16> {
        let glyph_id = self.cmap.glyph_variation_id(ch.into(), selector.into())?;
        (glyph_id < self.maxp.num_glyphs).then_some(glyph_id)
    }

    /// Name of a glyph per the `post` table, when names are present.
    pub fn glyph_name(&self, glyph_id: u16) -> Option<&str> {
        self.post.glyph_name(glyph_id)
    }

    /// Best-effort decoded `name` table string (e.g. [`NameId::Family`]).
    pub fn name_string(&self, id: NameId) -> Option<String> {
        self.name.string(id)
    }

    /// Horizontal advance of a glyph in font units, optionally at a
    /// variation instance (`HVAR`-based).
    pub fn advance_width(
        &self,
        glyph_id: u16,
        instance: Option<&Instance>,
    ) -> Result<u16, ParseError> {
        let (advance, _) = self.hmtx.advance_and_sb(glyph_id)?;
        Ok(self.apply_metric_delta(advance, glyph_id, instance, self.hvar.as_ref()))
    }

    /// Vertical advance of a glyph, when the font carries vertical metrics.
    pub fn advance_height(
        &self,
        glyph_id: u16,
        instance: Option<&Instance>,
    ) -> Option<Result<u16, ParseError>> {
        let vmtx = self.vmtx.as_ref()?;
        Some(vmtx.advance_and_sb(glyph_id).map(|(advance, _)| {
            self.apply_metric_delta(advance, glyph_id, instance, self.vvar.as_ref())
        }))
    }

    fn apply_metric_delta(
        &self,
        advance: u16,
        glyph_id: u16,
        instance: Option<&Instance>,
        deltas: Option<&HvarTable>,
    ) -> u16 {
        let Some(instance) = instance.filter(|instance| !instance.is_default()) else {
            return advance;
        };
        let Some(deltas) = deltas else {
            return advance;
        };
        let delta = deltas.advance_delta(glyph_id, instance.coordinates());
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted = (f32::from(advance) + delta).round().max(0.0) as u16;
        adjusted
    }

    /// Left side bearing of a glyph in font units, optionally adjusted by
    /// `HVAR` at a variation instance.
    pub fn left_side_bearing(
        &self,
        glyph_id: u16,
        instance: Option<&Instance>,
    ) -> Result<i16, ParseError> {
        let (_, side_bearing) = self.hmtx.advance_and_sb(glyph_id)?;
        let adjusted = instance
            .filter(|instance| !instance.is_default())
            .zip(self.hvar.as_ref())
            .and_then(|(instance, hvar)| {
                hvar.side_bearing_delta(glyph_id, instance.coordinates())
            })
            .map_or(side_bearing, |delta| {
                #[allow(clippy::cast_possible_truncation)]
                let adjusted = (f32::from(side_bearing) + delta).round() as i32;
                adjusted.clamp(i16::MIN.into(), i16::MAX.into()) as i16
            });
        Ok(adjusted)
    }

    /// Vertical origin of a glyph (`VORG`), when present.
    pub fn vertical_origin(&self, glyph_id: u16) -> Option<i16> {
        self.vorg.as_ref().map(|vorg| vorg.origin_y(glyph_id))
    }

    /// Kerning between two glyphs per the legacy `kern` table.
    pub fn kerning(&self, left: u16, right: u16) -> Option<i16> {
        self.kern.as_ref()?.kerning(left, right)
    }

    /// Delta for a font-wide metric from `MVAR` at an instance; 0 without
    /// `MVAR` or at the default location.
    pub fn metric_delta(&self, metric_tag: [u8; 4], instance: &Instance) -> f32 {
        self.mvar.as_ref().map_or(0.0, |mvar| {
            mvar.delta(Tag(metric_tag), instance.coordinates())
        })
    }

    /// Control values (`cvt `) adjusted by `cvar` deltas at an instance.
    pub fn control_values(&self, instance: Option<&Instance>) -> Result<Vec<i16>, ParseError> {
        let Some(cvt) = self.raw_table(*b"cvt ") else {
            return Ok(vec![]);
        };
        let mut values: Vec<i16> = cvt
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        let (Some(instance), Some(cvar), Some(fvar)) = (
            instance.filter(|instance| !instance.is_default()),
            self.cvar.as_ref(),
            self.fvar.as_ref(),
        ) else {
            return Ok(values);
        };

        let axis_count = u16::try_from(fvar.axes.len()).unwrap_or(u16::MAX);
        let deltas = cvar.deltas(axis_count, instance.coordinates(), values.len())?;
        for (value, delta) in values.iter_mut().zip(&deltas) {
            #[allow(clippy::cast_possible_truncation)]
            let adjusted = (f32::from(*value) + delta).round() as i32;
            *value = adjusted.clamp(i16::MIN.into(), i16::MAX.into()) as i16;
        }
        Ok(values)
    }

    /// Variation axes of the font (empty for non-variable fonts).
    pub fn variation_axes(&self) -> &[VariationAxis] {
        self.fvar.as_ref().map_or(&[], |fvar| fvar.axes.as_slice())
    }

    /// Named instances from `fvar`.
    pub fn named_instances(&self) -> &[NamedInstance] {
        self.fvar
            .as_ref()
            .map_or(&[], |fvar| fvar.instances.as_slice())
    }

    /// Starts building a variation instance for this font.
    pub fn variation_instance(&self) -> InstanceBuilder<'_> {
        InstanceBuilder {
            fvar: self.fvar.as_ref(),
            avar: self.avar.as_ref(),
            values: vec![],
        }
    }

    /// Extracts a glyph outline into `sink`, applying the variation instance
    /// when one is given.
    pub fn glyph_outline(
        &self,
        glyph_id: u16,
        instance: Option<&Instance>,
        sink: &mut impl OutlineSink,
    ) -> Result<(), ParseError> {
        if glyph_id >= self.maxp.num_glyphs {
            return Err(ParseError::new(ParseErrorKind::OffsetOutOfBounds(
                glyph_id.into(),
            )));
        }
        let instance = instance.filter(|instance| !instance.is_default());
        match &self.outlines {
            OutlineData::Glyf(glyf) => {
                let (points, end_points) = self.tt_glyph_points(glyf, glyph_id, instance, 0)?;
                emit_quad_contours(&points, &end_points, sink);
                Ok(())
            }
            OutlineData::Cff(cff) => cff.outline(glyph_id, sink),
            OutlineData::Cff2(cff2) => {
                let coords = instance.map_or(&[] as &[f32], Instance::coordinates);
                cff2.outline(glyph_id, coords, sink)
            }
        }
    }

    /// Convenience wrapper over [`Self::glyph_outline`] collecting into an
    /// [`Outline`].
    pub fn outline(
        &self,
        glyph_id: u16,
        instance: Option<&Instance>,
    ) -> Result<Outline, ParseError> {
        let mut outline = Outline::default();
        self.glyph_outline(glyph_id, instance, &mut outline)?;
        Ok(outline)
    }

    /// Collects the contour points of a TrueType glyph, composites resolved
    /// and `gvar` deltas applied.
    fn tt_glyph_points(
        &self,
        glyf: &GlyfTable<'a>,
        glyph_id: u16,
        instance: Option<&Instance>,
        depth: usize,
    ) -> Result<(Vec<ContourPoint>, Vec<u16>), ParseError> {
        if depth > MAX_COMPOSITE_DEPTH {
            return Err(ParseError::new(ParseErrorKind::CompositeDepth {
                limit: MAX_COMPOSITE_DEPTH,
            })
            .with_table(Tag::GLYF));
        }

        match glyf.glyph(glyph_id)? {
            Glyph::Empty => Ok((vec![], vec![])),
            Glyph::Simple { raw, .. } => {
                let base = glyf.glyph_record_base(glyph_id)?;
                let simple = SimpleOutline::parse(raw, base)?;
                let mut points = simple.points;
                if let (Some(instance), Some(gvar)) = (instance, &self.gvar) {
                    let deltas =
                        gvar.deltas(glyph_id, instance.coordinates(), points.len() + 4)?;
                    for (point, &(dx, dy)) in points.iter_mut().zip(&deltas) {
                        point.x += dx;
                        point.y += dy;
                    }
                }
                Ok((points, simple.end_points))
            }
            Glyph::Composite { components, .. } => {
                // In `gvar` terms a composite glyph's points are its
                // component offsets (plus the four phantom points).
                let component_deltas = match (instance, &self.gvar) {
                    (Some(instance), Some(gvar)) => Some(gvar.deltas(
                        glyph_id,
                        instance.coordinates(),
                        components.len() + 4,
                    )?),
                    _ => None,
                };

                let mut points = vec![];
                let mut end_points = vec![];
                for (idx, component) in components.iter().enumerate() {
                    let (child_points, child_ends) =
                        self.tt_glyph_points(glyf, component.glyph_id, instance, depth + 1)?;
                    let matrix = component.transform.matrix();
                    let transformed: Vec<ContourPoint> = child_points
                        .iter()
                        .map(|point| ContourPoint {
                            x: matrix[0] * point.x + matrix[2] * point.y,
                            y: matrix[1] * point.x + matrix[3] * point.y,
                            on_curve: point.on_curve,
                        })
                        .collect();

                    let (dx, dy) = match component.xy_offset() {
                        Some((dx, dy)) => {
                            #[allow(clippy::cast_precision_loss)] // 16-bit offsets
                            let (mut dx, mut dy) = (dx as f32, dy as f32);
                            if let Some(deltas) = &component_deltas {
                                if let Some(&(ddx, ddy)) = deltas.get(idx) {
                                    dx += ddx;
                                    dy += ddy;
                                }
                            }
                            (dx, dy)
                        }
                        None => Self::anchor_offset(component, &points, &transformed),
                    };

                    #[allow(clippy::cast_possible_truncation)]
                    let point_base = points.len() as u16;
                    points.extend(transformed.iter().map(|point| ContourPoint {
                        x: point.x + dx,
                        y: point.y + dy,
                        on_curve: point.on_curve,
                    }));
                    end_points.extend(child_ends.iter().map(|&end| end + point_base));
                }
                Ok((points, end_points))
            }
        }
    }

    /// Offset for an anchor-attached component: parent point `arg1` must
    /// coincide with (transformed) child point `arg2`.
    fn anchor_offset(
        component: &GlyphComponent,
        parent_points: &[ContourPoint],
        child_points: &[ContourPoint],
    ) -> (f32, f32) {
        let parent = usize::try_from(component.arg1)
            .ok()
            .and_then(|idx| parent_points.get(idx));
        let child = usize::try_from(component.arg2)
            .ok()
            .and_then(|idx| child_points.get(idx));
        match (parent, child) {
            (Some(parent), Some(child)) => (parent.x - child.x, parent.y - child.y),
            _ => (0.0, 0.0),
        }
    }

    /// Computes the composite closure of the requested glyphs (TrueType
    /// flavor; CFF charstrings have no composites).
    pub(crate) fn glyph_closure(
        &self,
        roots: impl IntoIterator<Item = u16>,
    ) -> Result<std::collections::BTreeSet<u16>, ParseError> {
        match &self.outlines {
            OutlineData::Glyf(glyf) => glyf.closure(roots),
            OutlineData::Cff(_) | OutlineData::Cff2(_) => Ok(roots.into_iter().collect()),
        }
    }
}

/// Builder for a variation [`Instance`]; see
/// [`Font::variation_instance`].
#[derive(Debug)]
pub struct InstanceBuilder<'a> {
    fvar: Option<&'a FvarTable>,
    avar: Option<&'a AvarTable>,
    values: Vec<(Tag, f32)>,
}

impl InstanceBuilder<'_> {
    /// Sets a user-space value for an axis; unknown axis tags are ignored at
    /// build time.
    pub fn set(&mut self, tag: [u8; 4], value: f32) -> &mut Self {
        self.values.retain(|(existing, _)| *existing != Tag(tag));
        self.values.push((Tag(tag), value));
        self
    }

    /// Resets an axis to its default value.
    pub fn reset(&mut self, tag: [u8; 4]) -> &mut Self {
        self.values.retain(|(existing, _)| *existing != Tag(tag));
        self
    }

    /// Resolves the accumulated axis values to normalized coordinates.
    pub fn build(&self) -> Instance {
        match self.fvar {
            Some(fvar) => normalize(fvar, self.avar, &self.values),
            None => Instance::default(),
        }
    }
}
