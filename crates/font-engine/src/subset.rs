//! Glyph subsetting: closure, ID remapping and table rewriting.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    errors::{ParseError, SubsetError},
    font::{Font, OutlineData, SFNT_VERSION_CFF, SFNT_VERSION_TRUETYPE},
    glyf::{GlyfTable, Glyph, GlyphComponent},
    tables::{
        metrics::HheaTable,
        post::{PostTable, MACINTOSH_GLYPH_NAMES},
        HeadTable, LocaFormat, Tag,
    },
    write::{canonical_rank, cff::subset_cff, write_u16, write_u32, FontWriter},
};

/// Options controlling subset emission.
#[derive(Debug, Clone, Copy)]
pub struct SubsetOptions {
    /// Copy the hinting tables (`cvt `, `fpgm`, `prep`) into the subset.
    pub preserve_hints: bool,
}

impl Default for SubsetOptions {
    fn default() -> Self {
        Self {
            preserve_hints: true,
        }
    }
}

/// A subset of a [`Font`]: the transitive closure of the requested glyphs
/// with contiguous new IDs (glyph 0 stays glyph 0).
#[derive(Debug)]
pub struct Subset<'a> {
    font: &'a Font<'a>,
    /// Old glyph IDs in new-ID order; `kept[0] == 0`.
    kept: Vec<u16>,
    old_to_new: BTreeMap<u16, u16>,
    /// `(codepoint, new glyph ID)` pairs in increasing codepoint order.
    char_map: Vec<(u32, u16)>,
    options: SubsetOptions,
}

impl<'a> Font<'a> {
    /// Builds a subset containing the requested glyphs, glyph 0, and all
    /// transitively referenced composite components.
    pub fn subset(
        &self,
        glyph_ids: impl IntoIterator<Item = u16>,
        options: SubsetOptions,
    ) -> Result<Subset<'_>, SubsetError> {
        let mut roots = BTreeSet::from([0_u16]);
        for glyph_id in glyph_ids {
            if glyph_id >= self.num_glyphs() {
                return Err(SubsetError::GlyphOutOfRange { glyph_id });
            }
            roots.insert(glyph_id);
        }

        let kept_set = self.glyph_closure(roots)?;
        let kept: Vec<_> = kept_set.iter().copied().collect();
        let old_to_new: BTreeMap<_, _> = kept
            .iter()
            .enumerate()
            .map(|(new_id, &old_id)| {
                #[allow(clippy::cast_possible_truncation)] // at most u16::MAX glyphs
                (old_id, new_id as u16)
            })
            .collect();

        let mut char_map = vec![];
        self.cmap.mappings(|codepoint, old_id| {
            if let Some(&new_id) = old_to_new.get(&old_id) {
                char_map.push((codepoint, new_id));
            }
        });

        Ok(Subset {
            font: self,
            kept,
            old_to_new,
            char_map,
            options,
        })
    }

    /// Convenience wrapper resolving characters through `cmap` before
    /// subsetting; unmapped characters are dropped.
    pub fn subset_for_chars(
        &self,
        chars: impl IntoIterator<Item = char>,
        options: SubsetOptions,
    ) -> Result<Subset<'_>, SubsetError> {
        let glyph_ids: BTreeSet<_> = chars
            .into_iter()
            .filter_map(|ch| self.glyph_id(ch))
            .collect();
        self.subset(glyph_ids, options)
    }
}

impl Subset<'_> {
    /// Number of glyphs in the subset.
    pub fn num_glyphs(&self) -> u16 {
        #[allow(clippy::cast_possible_truncation)] // subset of a u16-indexed set
        let count = self.kept.len() as u16;
        count
    }

    /// New glyph ID of an old one, when the glyph was kept.
    pub fn remapped_glyph_id(&self, old_id: u16) -> Option<u16> {
        self.old_to_new.get(&old_id).copied()
    }

    /// Serializes the subset as an SFNT file.
    pub fn to_sfnt(&self) -> Result<Vec<u8>, SubsetError> {
        self.to_writer().map(FontWriter::into_opentype)
    }

    /// Serializes the subset as a WOFF2 file (no table transforms applied).
    pub fn to_woff2(&self) -> Result<Vec<u8>, SubsetError> {
        self.to_writer().map(FontWriter::into_woff2)
    }

    fn to_writer(&self) -> Result<FontWriter, SubsetError> {
        let font = self.font;
        let flavor = match &font.outlines {
            OutlineData::Glyf(_) => SFNT_VERSION_TRUETYPE,
            OutlineData::Cff(_) => SFNT_VERSION_CFF,
            OutlineData::Cff2(_) => return Err(SubsetError::UnsupportedOutlines),
        };
        let mut writer = FontWriter::new(flavor);

        // Outline data first (the loca format feeds the head rewrite), then
        // the remaining tables in canonical physical order.
        let loca_format = match &font.outlines {
            OutlineData::Glyf(glyf) => Some(self.write_glyf_and_loca(&mut writer, glyf)?),
            OutlineData::Cff(cff) => {
                let cff_subset = subset_cff(cff, &self.kept)?;
                writer.write_raw_table(Tag::CFF, &cff_subset);
                None
            }
            OutlineData::Cff2(_) => unreachable!("rejected above"),
        };

        let mut tables: Vec<Tag> = vec![Tag::HEAD, Tag::HHEA, Tag::MAXP, Tag::HMTX, Tag::CMAP, Tag::NAME, Tag::POST];
        if font.os2.is_some() {
            tables.push(Tag::OS2);
        }
        if font.vhea.is_some() && font.vmtx.is_some() {
            tables.push(Tag::VHEA);
            tables.push(Tag::VMTX);
        }
        if font.vorg.is_some() {
            tables.push(Tag::VORG);
        }
        if self.options.preserve_hints {
            for tag in [Tag::CVT, Tag::FPGM, Tag::PREP] {
                if font.raw_table(tag.0).is_some() {
                    tables.push(tag);
                }
            }
        }
        tables.sort_by_key(|&tag| canonical_rank(tag));

        for tag in tables {
            self.write_table(&mut writer, tag, loca_format)?;
        }
        Ok(writer)
    }

    fn write_table(
        &self,
        writer: &mut FontWriter,
        tag: Tag,
        loca_format: Option<LocaFormat>,
    ) -> Result<(), SubsetError> {
        let font = self.font;
        match tag {
            Tag::HEAD => {
                let head = self.rewrite_head(loca_format);
                writer.write_raw_table(Tag::HEAD, &head);
            }
            Tag::HHEA => {
                let number_of_h_metrics =
                    writer.write_table(Tag::HMTX, |buffer| self.write_hmtx(buffer, false))?;
                // hmtx was just written; now patch its count into hhea.
                let hhea = Self::rewrite_hhea(&font.hhea, number_of_h_metrics);
                writer.write_raw_table(Tag::HHEA, &hhea);
            }
            Tag::HMTX => { /* written together with hhea */ }
            Tag::VHEA => {
                let number_of_v_metrics =
                    writer.write_table(Tag::VMTX, |buffer| self.write_hmtx(buffer, true))?;
                let vhea = font.vhea.as_ref().expect("checked by the caller");
                let vhea = Self::rewrite_hhea(vhea, number_of_v_metrics);
                writer.write_raw_table(Tag::VHEA, &vhea);
            }
            Tag::VMTX => { /* written together with vhea */ }
            Tag::MAXP => {
                let maxp = self.rewrite_maxp();
                writer.write_raw_table(Tag::MAXP, &maxp);
            }
            Tag::CMAP => {
                writer.write_table(Tag::CMAP, |buffer| self.write_cmap(buffer));
            }
            Tag::NAME => {
                writer.write_raw_table(Tag::NAME, font.name.raw);
            }
            Tag::POST => {
                writer.write_table(Tag::POST, |buffer| self.write_post(buffer));
            }
            Tag::OS2 => {
                let os2 = font.os2.as_ref().expect("checked by the caller");
                writer.write_raw_table(Tag::OS2, os2.raw);
            }
            Tag::VORG => {
                let vorg = font.vorg.as_ref().expect("checked by the caller");
                writer.write_table(Tag::VORG, |buffer| {
                    write_u32(buffer, 0x0001_0000);
                    buffer.extend_from_slice(&vorg.default_origin_y.to_be_bytes());
                    let kept: Vec<_> = vorg
                        .origins
                        .iter()
                        .filter_map(|&(old_id, y)| {
                            self.old_to_new.get(&old_id).map(|&new_id| (new_id, y))
                        })
                        .collect();
                    write_u16(buffer, kept.len() as u16);
                    for (new_id, y) in kept {
                        write_u16(buffer, new_id);
                        buffer.extend_from_slice(&y.to_be_bytes());
                    }
                });
            }
            tag => {
                let raw = font.raw_table(tag.0).expect("checked by the caller");
                writer.write_raw_table(tag, raw);
            }
        }
        Ok(())
    }

    /// Writes the subset `glyf` table and a fresh `loca`, returning the
    /// chosen `loca` format.
    fn write_glyf_and_loca(
        &self,
        writer: &mut FontWriter,
        glyf: &GlyfTable<'_>,
    ) -> Result<LocaFormat, SubsetError> {
        let mut locations = vec![0_usize];
        let glyf_result = writer.write_table(Tag::GLYF, |buffer| -> Result<(), SubsetError> {
            let initial_offset = buffer.len();
            for &old_id in &self.kept {
                match glyf.glyph(old_id).map_err(SubsetError::Parse)? {
                    Glyph::Empty => {}
                    Glyph::Simple { raw, .. } => buffer.extend_from_slice(raw),
                    Glyph::Composite {
                        bbox,
                        components,
                        instructions,
                    } => {
                        write_u16(buffer, (-1_i16) as u16);
                        for value in bbox {
                            buffer.extend_from_slice(&value.to_be_bytes());
                        }
                        for (idx, component) in components.iter().enumerate() {
                            let new_id = self
                                .old_to_new
                                .get(&component.glyph_id)
                                .copied()
                                .ok_or(SubsetError::GlyphOutOfRange {
                                    glyph_id: component.glyph_id,
                                })?;
                            let has_instructions =
                                idx + 1 == components.len() && !instructions.is_empty();
                            Self::write_component(buffer, component, new_id, has_instructions);
                        }
                        if !instructions.is_empty() {
                            write_u16(buffer, instructions.len() as u16);
                            buffer.extend_from_slice(instructions);
                        }
                    }
                }
                // Glyph records are kept 2-byte aligned for the short loca
                // format.
                if (buffer.len() - initial_offset) % 2 != 0 {
                    buffer.push(0);
                }
                locations.push(buffer.len() - initial_offset);
            }
            Ok(())
        });
        glyf_result?;

        Ok(writer.write_table(Tag::LOCA, |buffer| {
            let short = locations.last().is_some_and(|&total| total < 2 * 0xffff);
            for &location in &locations {
                if short {
                    #[allow(clippy::cast_possible_truncation)] // bounded by the check
                    write_u16(buffer, (location / 2) as u16);
                } else {
                    write_u32(buffer, u32::try_from(location).expect("glyph location overflow"));
                }
            }
            if short {
                LocaFormat::Short
            } else {
                LocaFormat::Long
            }
        }))
    }

    /// Re-serializes a composite component with a remapped glyph ID; flags,
    /// args and transform data are retained verbatim.
    fn write_component(
        buffer: &mut Vec<u8>,
        component: &GlyphComponent,
        new_id: u16,
        has_instructions: bool,
    ) {
        use crate::glyf::ComponentTransform;

        let mut flags = component.flags;
        if has_instructions {
            flags |= GlyphComponent::WE_HAVE_INSTRUCTIONS;
        } else {
            flags &= !GlyphComponent::WE_HAVE_INSTRUCTIONS;
        }
        write_u16(buffer, flags);
        write_u16(buffer, new_id);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        if flags & GlyphComponent::ARG_1_AND_2_ARE_WORDS != 0 {
            write_u16(buffer, component.arg1 as u16);
            write_u16(buffer, component.arg2 as u16);
        } else {
            buffer.push(component.arg1 as u8);
            buffer.push(component.arg2 as u8);
        }
        match component.transform {
            ComponentTransform::None => {}
            ComponentTransform::Scale(scale) => {
                buffer.extend_from_slice(&scale.to_be_bytes());
            }
            ComponentTransform::ScaleXY(x, y) => {
                buffer.extend_from_slice(&x.to_be_bytes());
                buffer.extend_from_slice(&y.to_be_bytes());
            }
            ComponentTransform::Matrix(matrix) => {
                for value in matrix {
                    buffer.extend_from_slice(&value.to_be_bytes());
                }
            }
        }
    }

    fn rewrite_head(&self, loca_format: Option<LocaFormat>) -> Vec<u8> {
        let mut head = self.font.head.raw.to_vec();
        crate::container::zero_checksum_adjustment(&mut head);
        if let Some(format) = loca_format {
            let value: u16 = match format {
                LocaFormat::Short => 0,
                LocaFormat::Long => 1,
            };
            let offset = HeadTable::LOCA_FORMAT_OFFSET;
            if head.len() >= offset + 2 {
                head[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
            }
        }
        head
    }

    fn rewrite_hhea(hhea: &HheaTable<'_>, number_of_metrics: u16) -> Vec<u8> {
        let mut bytes = hhea.raw.to_vec();
        let len = bytes.len();
        bytes[len - 2..].copy_from_slice(&number_of_metrics.to_be_bytes());
        bytes
    }

    fn rewrite_maxp(&self) -> Vec<u8> {
        let mut maxp = self.font.maxp.raw.to_vec();
        maxp[4..6].copy_from_slice(&self.num_glyphs().to_be_bytes());
        maxp
    }

    /// Writes the metrics table, collapsing a trailing run of equal advances
    /// into short records. Returns the number of long records.
    fn write_hmtx(&self, buffer: &mut Vec<u8>, vertical: bool) -> Result<u16, SubsetError> {
        let font = self.font;
        let source = if vertical {
            font.vmtx.as_ref().expect("checked by the caller")
        } else {
            &font.hmtx
        };
        let metrics = self
            .kept
            .iter()
            .map(|&old_id| source.advance_and_sb(old_id))
            .collect::<Result<Vec<_>, ParseError>>()?;

        let mut full_count = metrics.len();
        while full_count > 1 && metrics[full_count - 1].0 == metrics[full_count - 2].0 {
            full_count -= 1;
        }

        for (idx, &(advance, side_bearing)) in metrics.iter().enumerate() {
            if idx < full_count {
                write_u16(buffer, advance);
            }
            buffer.extend_from_slice(&side_bearing.to_be_bytes());
        }
        Ok(u16::try_from(full_count).expect("at most u16::MAX glyphs"))
    }

    fn write_cmap(&self, buffer: &mut Vec<u8>) {
        let bmp: Vec<(u16, u16)> = self
            .char_map
            .iter()
            .filter_map(|&(codepoint, glyph_id)| {
                u16::try_from(codepoint).ok().map(|cp| (cp, glyph_id))
            })
            .collect();
        let has_supplementary = self.char_map.len() != bmp.len();

        write_u16(buffer, 0); // version
        write_u16(buffer, if has_supplementary { 2 } else { 1 });

        let mut subtable_offset = 4 + 8 * u32::from(has_supplementary) + 8;
        write_u16(buffer, 3); // Windows platform
        write_u16(buffer, 1); // Unicode BMP
        write_u32(buffer, subtable_offset);
        let format4 = Self::build_format4(&bmp);
        if has_supplementary {
            subtable_offset += u32::try_from(format4.len()).expect("subtable overflow");
            write_u16(buffer, 3); // Windows platform
            write_u16(buffer, 10); // Unicode full repertoire
            write_u32(buffer, subtable_offset);
        }
        buffer.extend_from_slice(&format4);
        if has_supplementary {
            Self::build_format12(&self.char_map, buffer);
        }
    }

    /// Builds a format 4 subtable; segments merge runs of consecutive
    /// codepoints mapping to consecutive glyph IDs.
    fn build_format4(map: &[(u16, u16)]) -> Vec<u8> {
        let mut segments: Vec<(u16, u16, u16)> = vec![]; // start, end, start glyph
        for &(codepoint, glyph_id) in map {
            match segments.last_mut() {
                Some((start, end, start_glyph))
                    if codepoint == end.wrapping_add(1)
                        && u32::from(glyph_id)
                            == u32::from(*start_glyph) + u32::from(codepoint - *start) =>
                {
                    *end = codepoint;
                }
                _ => segments.push((codepoint, codepoint, glyph_id)),
            }
        }
        // The required final segment maps 0xffff to glyph 0.
        segments.push((0xffff, 0xffff, 0));

        let segment_count = u16::try_from(segments.len()).expect("segment count overflow");
        let mut bytes = vec![];
        write_u16(&mut bytes, 4); // format
        write_u16(&mut bytes, 16 + 8 * segment_count); // length
        write_u16(&mut bytes, 0); // language
        write_u16(&mut bytes, segment_count * 2);
        let entry_selector = u16::try_from(segment_count.ilog2()).expect("ilog2 of u16");
        let search_range = 2 << entry_selector;
        write_u16(&mut bytes, search_range);
        write_u16(&mut bytes, entry_selector);
        write_u16(&mut bytes, segment_count * 2 - search_range);
        for &(_, end, _) in &segments {
            write_u16(&mut bytes, end);
        }
        write_u16(&mut bytes, 0); // reserved padding
        for &(start, ..) in &segments {
            write_u16(&mut bytes, start);
        }
        for &(start, _, start_glyph) in &segments {
            let delta = if start == 0xffff && start_glyph == 0 {
                1 // maps the sentinel to glyph 0, as recommended
            } else {
                start_glyph.wrapping_sub(start)
            };
            write_u16(&mut bytes, delta);
        }
        for _ in &segments {
            write_u16(&mut bytes, 0); // idRangeOffsets
        }
        bytes
    }

    fn build_format12(map: &[(u32, u16)], buffer: &mut Vec<u8>) {
        let mut groups: Vec<(u32, u32, u32)> = vec![];
        for &(codepoint, glyph_id) in map {
            match groups.last_mut() {
                Some((start, end, start_glyph))
                    if codepoint == *end + 1
                        && u32::from(glyph_id) == *start_glyph + (codepoint - *start) =>
                {
                    *end = codepoint;
                }
                _ => groups.push((codepoint, codepoint, glyph_id.into())),
            }
        }

        write_u16(buffer, 12); // format
        write_u16(buffer, 0); // reserved
        let length = 16 + 12 * u32::try_from(groups.len()).expect("group count overflow");
        write_u32(buffer, length);
        write_u32(buffer, 0); // language
        write_u32(buffer, u32::try_from(groups.len()).expect("group count overflow"));
        for (start, end, start_glyph) in groups {
            write_u32(buffer, start);
            write_u32(buffer, end);
            write_u32(buffer, start_glyph);
        }
    }

    /// Re-emits `post`: version 2.0 with remapped glyph names when the
    /// source carries names, otherwise a version 3.0 header.
    fn write_post(&self, buffer: &mut Vec<u8>) {
        let source = &self.font.post;
        let header = &source.raw[..PostTable::HEADER_LEN.min(source.raw.len())];
        let has_names = self.kept.iter().any(|&old_id| source.glyph_name(old_id).is_some());

        if !has_names {
            write_u32(buffer, 0x0003_0000);
            buffer.extend_from_slice(header.get(4..).unwrap_or(&[0; 28]));
            return;
        }

        write_u32(buffer, 0x0002_0000);
        buffer.extend_from_slice(header.get(4..).unwrap_or(&[0; 28]));
        write_u16(buffer, self.num_glyphs());
        let mut string_pool: Vec<&str> = vec![];
        for &old_id in &self.kept {
            let name = source.glyph_name(old_id).unwrap_or(".notdef");
            let index = match MACINTOSH_GLYPH_NAMES.iter().position(|&std| std == name) {
                Some(standard_idx) => standard_idx,
                None => {
                    let pool_idx = string_pool.iter().position(|&pooled| pooled == name);
                    let pool_idx = pool_idx.unwrap_or_else(|| {
                        string_pool.push(name);
                        string_pool.len() - 1
                    });
                    MACINTOSH_GLYPH_NAMES.len() + pool_idx
                }
            };
            write_u16(buffer, u16::try_from(index).expect("name index overflow"));
        }
        for name in string_pool {
            #[allow(clippy::cast_possible_truncation)] // glyph names are short
            buffer.push(name.len().min(255) as u8);
            buffer.extend_from_slice(&name.as_bytes()[..name.len().min(255)]);
        }
    }
}
