//! Shared fixtures: synthetic fonts assembled in memory, plus end-to-end
//! subsetting and container round-trip tests.

use allsorts::{binary::read::ReadScope, font::MatchingPresentation, font_data::FontData};
use test_casing::test_casing;

use crate::{
    outline::OutlineCommand,
    tables::Tag,
    write::{
        checksum,
        testing::{push_u16, push_u32, serialize_composite, serialize_simple_glyph},
        FontWriter, SFNT_CHECKSUM,
    },
    Font, SubsetOptions,
};

/// Assembles a complete in-memory TrueType font:
///
/// * glyph 0: empty `.notdef`;
/// * glyph 1: a box, mapped from `A`;
/// * glyph 2: a triangle, mapped from `B`;
/// * glyph 3: composite referencing glyph 1, mapped from `C`;
/// * glyph 4: composite referencing glyphs 2 and 3, mapped from `D`.
///
/// With `variable` set, the font grows a `wght` axis (100..900, default 400)
/// with `gvar` deltas shifting glyph 1 by +100 x-units at the maximum, and
/// an `HVAR` adding 50 units to glyph 1's advance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TestFontBuilder {
    pub(crate) units_per_em: u16,
    pub(crate) variable: bool,
}

impl Default for TestFontBuilder {
    fn default() -> Self {
        Self {
            units_per_em: 1_000,
            variable: false,
        }
    }
}

pub(crate) const ADVANCES: [u16; 5] = [500, 550, 600, 650, 700];

impl TestFontBuilder {
    pub(crate) fn build(self) -> Vec<u8> {
        let glyphs = [
            vec![],
            serialize_simple_glyph(&[&[(10, 20, true), (110, 20, true), (110, 120, true), (10, 120, true)]], &[]),
            serialize_simple_glyph(&[&[(0, 0, true), (200, 0, true), (100, 300, true)]], &[]),
            serialize_composite(&[(1, 100, 0)], &[]),
            serialize_composite(&[(2, 0, 0), (3, 50, 50)], &[]),
        ];

        let mut writer = FontWriter::truetype();
        writer.write_raw_table(Tag::HEAD, &self.head());
        writer.write_raw_table(Tag::HHEA, &Self::hhea());
        writer.write_raw_table(Tag::MAXP, &Self::maxp(glyphs.len() as u16));
        writer.write_raw_table(Tag::HMTX, &Self::hmtx());
        writer.write_raw_table(Tag::CMAP, &Self::cmap());
        writer.write_raw_table(Tag::NAME, &Self::name());
        writer.write_raw_table(Tag::POST, &Self::post());
        writer.write_raw_table(Tag::OS2, &Self::os2());

        let mut glyf = vec![];
        let mut loca = vec![];
        push_u32(&mut loca, 0);
        for glyph in &glyphs {
            glyf.extend_from_slice(glyph);
            while glyf.len() % 4 != 0 {
                glyf.push(0);
            }
            push_u32(&mut loca, glyf.len() as u32);
        }
        writer.write_raw_table(Tag::GLYF, &glyf);
        writer.write_raw_table(Tag::LOCA, &loca);

        if self.variable {
            writer.write_raw_table(Tag::FVAR, &Self::fvar());
            writer.write_raw_table(Tag::GVAR, &Self::gvar(glyphs.len() as u16));
            writer.write_raw_table(Tag::HVAR, &Self::hvar());
        }

        writer.into_opentype()
    }

    fn head(self) -> Vec<u8> {
        let mut head = vec![];
        push_u32(&mut head, 0x0001_0000); // version
        push_u32(&mut head, 0x0001_0000); // fontRevision
        push_u32(&mut head, 0); // checkSumAdjustment, patched by the writer
        push_u32(&mut head, 0x5f0f_3cf5); // magicNumber
        push_u16(&mut head, 0); // flags
        push_u16(&mut head, self.units_per_em);
        head.extend_from_slice(&[0; 16]); // created, modified
        for value in [0_i16, 0, 510, 300] {
            head.extend_from_slice(&value.to_be_bytes());
        }
        push_u16(&mut head, 0); // macStyle
        push_u16(&mut head, 8); // lowestRecPPEM
        push_u16(&mut head, 2); // fontDirectionHint
        push_u16(&mut head, 1); // indexToLocFormat: long
        push_u16(&mut head, 0); // glyphDataFormat
        head
    }

    fn hhea() -> Vec<u8> {
        let mut hhea = vec![];
        push_u32(&mut hhea, 0x0001_0000);
        for value in [800_i16, -200, 90] {
            hhea.extend_from_slice(&value.to_be_bytes());
        }
        push_u16(&mut hhea, 700); // advanceWidthMax
        for value in [0_i16, 0, 510] {
            hhea.extend_from_slice(&value.to_be_bytes()); // min bearings, extent
        }
        for value in [1_i16, 0, 0] {
            hhea.extend_from_slice(&value.to_be_bytes()); // caret slope, offset
        }
        hhea.extend_from_slice(&[0; 8]); // reserved
        push_u16(&mut hhea, 0); // metricDataFormat
        push_u16(&mut hhea, ADVANCES.len() as u16);
        hhea
    }

    fn maxp(num_glyphs: u16) -> Vec<u8> {
        let mut maxp = vec![];
        push_u32(&mut maxp, 0x0001_0000);
        push_u16(&mut maxp, num_glyphs);
        maxp.extend_from_slice(&[0; 26]);
        maxp
    }

    fn hmtx() -> Vec<u8> {
        let mut hmtx = vec![];
        for advance in ADVANCES {
            push_u16(&mut hmtx, advance);
            push_u16(&mut hmtx, 10); // left side bearing
        }
        hmtx
    }

    fn cmap() -> Vec<u8> {
        let mut cmap = vec![];
        push_u16(&mut cmap, 0); // version
        push_u16(&mut cmap, 1); // numTables
        push_u16(&mut cmap, 3); // Windows platform
        push_u16(&mut cmap, 1); // Unicode BMP
        push_u32(&mut cmap, 12);
        // Format 4 with one segment: A..D -> glyphs 1..4, plus the sentinel.
        push_u16(&mut cmap, 4);
        push_u16(&mut cmap, 16 + 8 * 2);
        push_u16(&mut cmap, 0); // language
        push_u16(&mut cmap, 4); // segCountX2
        push_u16(&mut cmap, 4); // searchRange
        push_u16(&mut cmap, 1); // entrySelector
        push_u16(&mut cmap, 0); // rangeShift
        push_u16(&mut cmap, 0x44); // endCode
        push_u16(&mut cmap, 0xffff);
        push_u16(&mut cmap, 0); // reserved
        push_u16(&mut cmap, 0x41); // startCode
        push_u16(&mut cmap, 0xffff);
        push_u16(&mut cmap, 0_u16.wrapping_sub(0x40)); // idDelta
        push_u16(&mut cmap, 1);
        push_u16(&mut cmap, 0); // idRangeOffsets
        push_u16(&mut cmap, 0);
        cmap
    }

    fn name() -> Vec<u8> {
        let family: Vec<u8> = "Test Sans".encode_utf16().flat_map(u16::to_be_bytes).collect();
        let mut name = vec![];
        push_u16(&mut name, 0); // version
        push_u16(&mut name, 1); // count
        push_u16(&mut name, 18); // storage offset
        push_u16(&mut name, 3);
        push_u16(&mut name, 1);
        push_u16(&mut name, 0x0409);
        push_u16(&mut name, 1); // family name ID
        push_u16(&mut name, family.len() as u16);
        push_u16(&mut name, 0);
        name.extend_from_slice(&family);
        name
    }

    fn post() -> Vec<u8> {
        let mut post = vec![];
        push_u32(&mut post, 0x0003_0000);
        post.extend_from_slice(&[0; 28]);
        post
    }

    fn os2() -> Vec<u8> {
        let mut os2 = vec![];
        push_u16(&mut os2, 2); // version
        os2.extend_from_slice(&[0; 66]); // metrics through usLastCharIndex
        for value in [780_i16, -220, 90] {
            os2.extend_from_slice(&value.to_be_bytes()); // typo metrics
        }
        push_u16(&mut os2, 1_000); // usWinAscent
        push_u16(&mut os2, 250); // usWinDescent
        os2.extend_from_slice(&[0; 8]); // code page ranges
        for value in [520_i16, 720] {
            os2.extend_from_slice(&value.to_be_bytes()); // sxHeight, sCapHeight
        }
        os2.extend_from_slice(&[0; 6]); // default/break char, max context
        os2
    }

    fn fvar() -> Vec<u8> {
        let mut fvar = vec![];
        push_u16(&mut fvar, 1); // major
        push_u16(&mut fvar, 0); // minor
        push_u16(&mut fvar, 16); // axes offset
        push_u16(&mut fvar, 2); // reserved
        push_u16(&mut fvar, 1); // axisCount
        push_u16(&mut fvar, 20); // axisSize
        push_u16(&mut fvar, 0); // instanceCount
        push_u16(&mut fvar, 8); // instanceSize
        fvar.extend_from_slice(b"wght");
        push_u32(&mut fvar, 100 << 16);
        push_u32(&mut fvar, 400 << 16);
        push_u32(&mut fvar, 900 << 16);
        push_u16(&mut fvar, 0); // flags
        push_u16(&mut fvar, 256); // nameID
        fvar
    }

    fn gvar(glyph_count: u16) -> Vec<u8> {
        // Variation data for glyph 1 only: one tuple with an embedded peak
        // at wght=1.0, shared "all points", +100 x-deltas on the 4 points.
        let mut data = vec![];
        push_u16(&mut data, 0x8001); // shared points, 1 tuple
        push_u16(&mut data, 10); // serialized data offset
        push_u16(&mut data, 10); // variationDataSize
        push_u16(&mut data, 0x8000); // embedded peak
        push_u16(&mut data, 0x4000); // peak = 1.0
        data.push(0); // shared point count: all points
        data.push(0x07); // x deltas: 8 byte-sized values
        data.extend_from_slice(&[100, 100, 100, 100, 0, 0, 0, 0]);
        data.push(0x87); // y deltas: 8 zeros
        if data.len() % 2 != 0 {
            data.push(0);
        }
        let data_len = data.len() as u16;

        let mut gvar = vec![];
        push_u16(&mut gvar, 1); // major
        push_u16(&mut gvar, 0); // minor
        push_u16(&mut gvar, 1); // axisCount
        push_u16(&mut gvar, 0); // sharedTupleCount
        let offsets_len = (u32::from(glyph_count) + 1) * 2;
        push_u32(&mut gvar, 20 + offsets_len); // sharedTuplesOffset (empty)
        push_u16(&mut gvar, glyph_count);
        push_u16(&mut gvar, 0); // flags: short offsets
        push_u32(&mut gvar, 20 + offsets_len); // data array offset
        // glyph_count + 1 offsets (stored halved): only glyph 1 carries data.
        push_u16(&mut gvar, 0);
        push_u16(&mut gvar, 0);
        for _ in 2..=glyph_count {
            push_u16(&mut gvar, data_len / 2);
        }
        gvar.extend_from_slice(&data);
        gvar
    }

    fn hvar() -> Vec<u8> {
        let mut hvar = vec![];
        push_u32(&mut hvar, 0x0001_0000);
        push_u32(&mut hvar, 20); // variation store offset
        push_u32(&mut hvar, 0); // advance mapping: identity
        push_u32(&mut hvar, 0);
        push_u32(&mut hvar, 0);
        // Item variation store: one region peaking at wght=1.0.
        push_u16(&mut hvar, 1); // format
        push_u32(&mut hvar, 16); // region list offset
        push_u16(&mut hvar, 1); // data count
        push_u32(&mut hvar, 26); // data offset
        hvar.extend_from_slice(&[0; 4]);
        push_u16(&mut hvar, 1); // axis count
        push_u16(&mut hvar, 1); // region count
        for value in [0_i16, 0x4000, 0x4000] {
            hvar.extend_from_slice(&value.to_be_bytes());
        }
        push_u16(&mut hvar, 5); // item count
        push_u16(&mut hvar, 1); // word delta count
        push_u16(&mut hvar, 1); // region index count
        push_u16(&mut hvar, 0);
        for delta in [0_i16, 50, 0, 0, 0] {
            hvar.extend_from_slice(&delta.to_be_bytes());
        }
        hvar
    }
}

/// Assembles a CFF-flavored font with two glyphs: `.notdef` and a box
/// mapped from `A`.
pub(crate) fn build_cff_font() -> Vec<u8> {
    use crate::write::testing::build_test_cff;

    let mut writer = FontWriter::new(u32::from_be_bytes(*b"OTTO"));
    let builder = TestFontBuilder::default();
    writer.write_raw_table(Tag::HEAD, &builder.head());
    let mut hhea = TestFontBuilder::hhea();
    let len = hhea.len();
    hhea[len - 2..].copy_from_slice(&2_u16.to_be_bytes()); // numberOfHMetrics
    writer.write_raw_table(Tag::HHEA, &hhea);
    let mut maxp = vec![];
    push_u32(&mut maxp, 0x0000_5000);
    push_u16(&mut maxp, 2);
    writer.write_raw_table(Tag::MAXP, &maxp);
    let mut hmtx = vec![];
    for (advance, lsb) in [(500_u16, 0_i16), (550, 10)] {
        push_u16(&mut hmtx, advance);
        hmtx.extend_from_slice(&lsb.to_be_bytes());
    }
    writer.write_raw_table(Tag::HMTX, &hmtx);
    writer.write_raw_table(Tag::CMAP, &TestFontBuilder::cmap());
    writer.write_raw_table(Tag::NAME, &TestFontBuilder::name());
    writer.write_raw_table(Tag::POST, &TestFontBuilder::post());
    writer.write_raw_table(Tag::OS2, &TestFontBuilder::os2());
    writer.write_raw_table(Tag::CFF, &build_test_cff());
    writer.into_opentype()
}

#[test]
fn cff_font_parsing_and_subsetting() {
    let bytes = build_cff_font();
    let font = Font::parse(&bytes).unwrap();
    assert_eq!(font.num_glyphs(), 2);
    assert_eq!(font.glyph_id('A'), Some(1));

    let outline = font.outline(1, None).unwrap();
    assert_eq!(
        outline.commands(),
        [
            OutlineCommand::MoveTo(10.0, 0.0),
            OutlineCommand::LineTo(110.0, 0.0),
            OutlineCommand::LineTo(110.0, 100.0),
            OutlineCommand::LineTo(10.0, 100.0),
            OutlineCommand::Close,
        ]
    );

    let subset = font.subset_for_chars(['A'], SubsetOptions::default()).unwrap();
    let sfnt = subset.to_sfnt().unwrap();
    assert_eq!(checksum(&sfnt), SFNT_CHECKSUM);

    let reparsed = Font::parse(&sfnt).unwrap();
    assert_eq!(reparsed.num_glyphs(), 2);
    assert_eq!(reparsed.glyph_id('A'), Some(1));
    assert_eq!(reparsed.advance_width(1, None).unwrap(), 550);
    assert_eq!(
        reparsed.outline(1, None).unwrap().commands(),
        outline.commands()
    );
}

fn referee_glyph_id(bytes: &[u8], ch: char) -> u16 {
    let font_file = ReadScope::new(bytes).read::<FontData>().unwrap();
    let provider = font_file.table_provider(0).unwrap();
    let mut referee = allsorts::Font::new(provider).unwrap();
    let (glyph_id, _) = referee.lookup_glyph_index(ch, MatchingPresentation::NotRequired, None);
    glyph_id
}

#[test]
fn parsing_synthetic_font() {
    let bytes = TestFontBuilder::default().build();
    let font = Font::parse(&bytes).unwrap();

    assert_eq!(font.num_glyphs(), 5);
    assert_eq!(font.units_per_em(), 1_000);
    assert_eq!(font.ascender(), 800);
    assert_eq!(font.descender(), -200);
    assert_eq!(font.cap_height(), Some(720));
    assert_eq!(font.x_height(), Some(520));
    assert_eq!(font.glyph_id('A'), Some(1));
    assert_eq!(font.glyph_id('D'), Some(4));
    assert_eq!(font.glyph_id('E'), None);
    assert_eq!(font.advance_width(2, None).unwrap(), 600);
    assert_eq!(font.left_side_bearing(2, None).unwrap(), 10);
    assert_eq!(
        font.name_string(crate::NameId::Family).as_deref(),
        Some("Test Sans")
    );
}

#[test]
fn outlining_simple_and_composite_glyphs() {
    let bytes = TestFontBuilder::default().build();
    let font = Font::parse(&bytes).unwrap();

    let outline = font.outline(1, None).unwrap();
    assert_eq!(
        outline.commands(),
        [
            OutlineCommand::MoveTo(10.0, 20.0),
            OutlineCommand::LineTo(110.0, 20.0),
            OutlineCommand::LineTo(110.0, 120.0),
            OutlineCommand::LineTo(10.0, 120.0),
            OutlineCommand::Close,
        ]
    );

    // Glyph 3 is glyph 1 shifted by (100, 0).
    let outline = font.outline(3, None).unwrap();
    assert_eq!(outline.commands()[0], OutlineCommand::MoveTo(110.0, 20.0));
    assert_eq!(outline.control_box(), Some([110.0, 20.0, 210.0, 120.0]));

    // Glyph 4 nests another composite: triangle + shifted box.
    let outline = font.outline(4, None).unwrap();
    assert_eq!(outline.control_box(), Some([0.0, 0.0, 260.0, 300.0]));
}

#[test]
fn variation_instance_affects_outlines_and_metrics() {
    let bytes = TestFontBuilder {
        variable: true,
        ..TestFontBuilder::default()
    }
    .build();
    let font = Font::parse(&bytes).unwrap();

    assert_eq!(font.variation_axes().len(), 1);
    let mut builder = font.variation_instance();
    builder.set(*b"wght", 900.0);
    let bold = builder.build();
    assert_eq!(bold.coordinates(), [1.0]);

    let outline = font.outline(1, Some(&bold)).unwrap();
    assert_eq!(outline.commands()[0], OutlineCommand::MoveTo(110.0, 20.0));
    assert_eq!(font.advance_width(1, Some(&bold)).unwrap(), 600);

    // Intermediate location: deltas scale linearly.
    let mut builder = font.variation_instance();
    builder.set(*b"wght", 650.0);
    let medium = builder.build();
    assert_eq!(medium.coordinates(), [0.5]);
    let outline = font.outline(1, Some(&medium)).unwrap();
    assert_eq!(outline.commands()[0], OutlineCommand::MoveTo(60.0, 20.0));
    assert_eq!(font.advance_width(1, Some(&medium)).unwrap(), 575);

    // Composite outlines reuse the component's deltas.
    let outline = font.outline(3, Some(&bold)).unwrap();
    assert_eq!(outline.commands()[0], OutlineCommand::MoveTo(210.0, 20.0));

    // The default instance leaves everything untouched.
    let default = font.variation_instance().build();
    assert!(default.is_default());
    assert_eq!(font.advance_width(1, Some(&default)).unwrap(), 550);
}

#[test]
fn subsetting_composite_closure_and_remap() {
    let bytes = TestFontBuilder::default().build();
    let font = Font::parse(&bytes).unwrap();

    // Requesting the nested composite pulls in the whole chain.
    let subset = font.subset([4], SubsetOptions::default()).unwrap();
    assert_eq!(subset.num_glyphs(), 5);

    // Requesting glyph 3 keeps {0, 1, 3} with a compacting remap.
    let subset = font.subset([3], SubsetOptions::default()).unwrap();
    assert_eq!(subset.num_glyphs(), 3);
    assert_eq!(subset.remapped_glyph_id(0), Some(0));
    assert_eq!(subset.remapped_glyph_id(1), Some(1));
    assert_eq!(subset.remapped_glyph_id(3), Some(2));
    assert_eq!(subset.remapped_glyph_id(2), None);

    let sfnt = subset.to_sfnt().unwrap();
    assert_eq!(checksum(&sfnt), SFNT_CHECKSUM);

    let reparsed = Font::parse(&sfnt).unwrap();
    assert_eq!(reparsed.num_glyphs(), 3);
    assert_eq!(reparsed.glyph_id('A'), Some(1));
    assert_eq!(reparsed.glyph_id('C'), Some(2));
    assert_eq!(reparsed.glyph_id('B'), None);
    assert_eq!(reparsed.advance_width(2, None).unwrap(), ADVANCES[3]);

    // The composite still resolves to the shifted box.
    let outline = reparsed.outline(2, None).unwrap();
    assert_eq!(outline.control_box(), Some([110.0, 20.0, 210.0, 120.0]));

    assert_eq!(referee_glyph_id(&sfnt, 'A'), 1);
    assert_eq!(referee_glyph_id(&sfnt, 'C'), 2);
}

#[test]
fn subsetting_all_glyphs_preserves_semantics() {
    let bytes = TestFontBuilder::default().build();
    let font = Font::parse(&bytes).unwrap();

    let subset = font.subset(0..font.num_glyphs(), SubsetOptions::default()).unwrap();
    let sfnt = subset.to_sfnt().unwrap();
    let reparsed = Font::parse(&sfnt).unwrap();

    assert_eq!(reparsed.num_glyphs(), font.num_glyphs());
    for ch in 'A'..='D' {
        assert_eq!(reparsed.glyph_id(ch), font.glyph_id(ch));
    }
    for glyph_id in 0..font.num_glyphs() {
        assert_eq!(
            reparsed.advance_width(glyph_id, None).unwrap(),
            font.advance_width(glyph_id, None).unwrap()
        );
        assert_eq!(
            reparsed.outline(glyph_id, None).unwrap().commands(),
            font.outline(glyph_id, None).unwrap().commands()
        );
    }
    assert!(reparsed.validate().is_ok());
}

#[test]
fn subsetting_is_idempotent() {
    let bytes = TestFontBuilder::default().build();
    let font = Font::parse(&bytes).unwrap();

    let first = font
        .subset([1, 3], SubsetOptions::default())
        .unwrap()
        .to_sfnt()
        .unwrap();
    let first_font = Font::parse(&first).unwrap();
    let second = first_font
        .subset(0..first_font.num_glyphs(), SubsetOptions::default())
        .unwrap()
        .to_sfnt()
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn empty_subset_request_yields_notdef_only_font() {
    let bytes = TestFontBuilder::default().build();
    let font = Font::parse(&bytes).unwrap();

    let subset = font.subset([], SubsetOptions::default()).unwrap();
    assert_eq!(subset.num_glyphs(), 1);
    let sfnt = subset.to_sfnt().unwrap();
    assert_eq!(checksum(&sfnt), SFNT_CHECKSUM);
    let reparsed = Font::parse(&sfnt).unwrap();
    assert_eq!(reparsed.num_glyphs(), 1);
    assert_eq!(reparsed.glyph_id('A'), None);
}

#[test]
fn out_of_range_request_is_rejected() {
    let bytes = TestFontBuilder::default().build();
    let font = Font::parse(&bytes).unwrap();
    let err = font.subset([42], SubsetOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        crate::SubsetError::GlyphOutOfRange { glyph_id: 42 }
    ));
}

#[test_casing(3, ["ABCD", "A", "CD"])]
fn woff2_round_trip(chars: &str) {
    let bytes = TestFontBuilder::default().build();
    let font = Font::parse(&bytes).unwrap();

    let subset = font
        .subset_for_chars(chars.chars(), SubsetOptions::default())
        .unwrap();
    let sfnt = subset.to_sfnt().unwrap();
    let woff2 = subset.to_woff2().unwrap();
    assert_eq!(crate::sniff(&woff2), Some(crate::FontKind::Woff2));

    let decoded = crate::decompress(&woff2).unwrap();
    let reparsed = Font::parse(&decoded).unwrap();
    let direct = Font::parse(&sfnt).unwrap();

    assert_eq!(reparsed.num_glyphs(), direct.num_glyphs());
    for ch in chars.chars() {
        assert_eq!(reparsed.glyph_id(ch), direct.glyph_id(ch));
        let glyph_id = reparsed.glyph_id(ch).unwrap();
        assert_eq!(
            reparsed.outline(glyph_id, None).unwrap().commands(),
            direct.outline(glyph_id, None).unwrap().commands()
        );
    }
    // Re-decoding the decoded bytes is the identity.
    let again = crate::decompress(&decoded).unwrap();
    assert_eq!(again.as_ref(), decoded.as_ref());
}

#[test]
fn collection_parsing() {
    let sfnt = TestFontBuilder::default().build();
    // Assemble a 2-font collection referencing the same table directory.
    let mut ttc = vec![];
    ttc.extend_from_slice(b"ttcf");
    push_u32(&mut ttc, 0x0001_0000);
    push_u32(&mut ttc, 2);
    let base = (ttc.len() + 8) as u32;
    push_u32(&mut ttc, base);
    push_u32(&mut ttc, base);
    // The embedded SFNT's table offsets are relative to the file start, so
    // re-emit the directory with shifted offsets.
    let font = Font::parse(&sfnt).unwrap();
    let mut writer = FontWriter::truetype();
    for &(tag, bytes, _) in &font.tables {
        writer.write_raw_table(tag, bytes);
    }
    let rebuilt = writer.into_opentype();
    let mut shifted = rebuilt.clone();
    let table_count = u16::from_be_bytes([rebuilt[4], rebuilt[5]]) as usize;
    for record_idx in 0..table_count {
        let offset_pos = 12 + record_idx * 16 + 8;
        let offset = u32::from_be_bytes(rebuilt[offset_pos..offset_pos + 4].try_into().unwrap());
        shifted[offset_pos..offset_pos + 4].copy_from_slice(&(offset + base).to_be_bytes());
    }
    ttc.extend_from_slice(&shifted);

    assert_eq!(Font::collection_count(&ttc), Some(2));
    let font0 = Font::parse_at(&ttc, 0).unwrap();
    let font1 = Font::parse_at(&ttc, 1).unwrap();
    assert_eq!(font0.glyph_id('A'), Some(1));
    assert_eq!(font1.glyph_id('D'), Some(4));
    assert!(Font::parse_at(&ttc, 2).is_err());
}
