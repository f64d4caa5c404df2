//! CFF subset emission: desubroutinization and table assembly.

#![allow(clippy::cast_possible_truncation)] // operand encoders truncate by range checks

use crate::{
    cff::{
        charstring::{ops, SUBR_DEPTH_LIMIT},
        dict::{ops as dict_ops, Operand},
        index::Index,
        CffTable,
    },
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
};

/// Builds CFF INDEX bytes from owned items.
#[derive(Debug, Default)]
pub(crate) struct IndexBuilder {
    items: Vec<Vec<u8>>,
}

impl IndexBuilder {
    pub(crate) fn push(&mut self, item: Vec<u8>) {
        self.items.push(item);
    }

    pub(crate) fn encode(&self, long_count: bool) -> Vec<u8> {
        let mut bytes = vec![];
        let count = u32::try_from(self.items.len()).expect("INDEX count overflow");
        if long_count {
            bytes.extend_from_slice(&count.to_be_bytes());
        } else {
            let count = u16::try_from(count).expect("INDEX count overflow");
            bytes.extend_from_slice(&count.to_be_bytes());
        }
        if self.items.is_empty() {
            return bytes;
        }

        let data_len: usize = self.items.iter().map(Vec::len).sum();
        let end_offset = data_len + 1;
        let off_size: u8 = if end_offset <= 0xff {
            1
        } else if end_offset <= 0xffff {
            2
        } else if end_offset <= 0xff_ffff {
            3
        } else {
            4
        };
        bytes.push(off_size);

        let mut offset = 1_usize;
        let push_offset = |bytes: &mut Vec<u8>, offset: usize| {
            let encoded = u32::try_from(offset).expect("INDEX data overflow").to_be_bytes();
            bytes.extend_from_slice(&encoded[4 - usize::from(off_size)..]);
        };
        push_offset(&mut bytes, offset);
        for item in &self.items {
            offset += item.len();
            push_offset(&mut bytes, offset);
        }
        for item in &self.items {
            bytes.extend_from_slice(item);
        }
        bytes
    }
}

/// Encodes an integer in the shortest DICT operand form.
pub(crate) fn encode_dict_int(out: &mut Vec<u8>, value: i32) {
    match value {
        -107..=107 => out.push((value + 139) as u8),
        108..=1131 => {
            let value = value - 108;
            out.push((value / 256 + 247) as u8);
            out.push((value % 256) as u8);
        }
        -1131..=-108 => {
            let value = -value - 108;
            out.push((value / 256 + 251) as u8);
            out.push((value % 256) as u8);
        }
        -32_768..=32_767 => {
            out.push(28);
            out.extend_from_slice(&(value as i16).to_be_bytes());
        }
        _ => encode_dict_offset(out, value),
    }
}

/// Encodes an integer in the fixed 5-byte DICT form, so that offsets can be
/// patched without shifting the DICT length.
pub(crate) fn encode_dict_offset(out: &mut Vec<u8>, value: i32) {
    out.push(29);
    out.extend_from_slice(&value.to_be_bytes());
}

fn encode_dict_real(out: &mut Vec<u8>, value: f64) {
    #[allow(clippy::cast_possible_truncation)]
    if value.fract() == 0.0 && (i32::MIN as f64..=i32::MAX as f64).contains(&value) {
        encode_dict_int(out, value as i32);
        return;
    }
    out.push(30);
    let repr = format!("{value}");
    let mut nibbles = vec![];
    let mut chars = repr.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '0'..='9' => nibbles.push(ch as u8 - b'0'),
            '.' => nibbles.push(0xa),
            '-' => nibbles.push(0xe),
            'e' | 'E' => {
                if chars.peek() == Some(&'-') {
                    chars.next();
                    nibbles.push(0xc);
                } else {
                    nibbles.push(0xb);
                }
            }
            _ => {}
        }
    }
    nibbles.push(0xf);
    if nibbles.len() % 2 != 0 {
        nibbles.push(0xf);
    }
    for pair in nibbles.chunks_exact(2) {
        out.push(pair[0] << 4 | pair[1]);
    }
}

fn encode_dict_operands(out: &mut Vec<u8>, operands: &[Operand]) {
    for operand in operands {
        match *operand {
            Operand::Int(value) => encode_dict_int(out, value),
            Operand::Real(value) => encode_dict_real(out, value),
        }
    }
}

fn encode_dict_op(out: &mut Vec<u8>, op: u16) {
    if op >= 0x0c00 {
        out.push(0x0c);
    }
    #[allow(clippy::cast_possible_truncation)]
    out.push((op & 0xff) as u8);
}

/// Encodes an integer in the shortest charstring operand form.
pub(crate) fn encode_charstring_int(out: &mut Vec<u8>, value: i32) {
    match value {
        -107..=107 => out.push((value + 139) as u8),
        108..=1131 => {
            let value = value - 108;
            out.push((value / 256 + 247) as u8);
            out.push((value % 256) as u8);
        }
        -1131..=-108 => {
            let value = -value - 108;
            out.push((value / 256 + 251) as u8);
            out.push((value % 256) as u8);
        }
        -32_768..=32_767 => {
            out.push(28);
            out.extend_from_slice(&(value as i16).to_be_bytes());
        }
        _ => {
            // Values outside the 16-bit range only occur as 16.16 operands.
            out.push(255);
            out.extend_from_slice(&value.to_be_bytes());
        }
    }
}

/// Charstring operand retaining its original precision.
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i32),
    /// Raw 16.16 bits.
    Fixed(i32),
}

impl Number {
    fn encode(self, out: &mut Vec<u8>) {
        match self {
            Self::Int(value) => encode_charstring_int(out, value),
            Self::Fixed(bits) => {
                if bits & 0xffff == 0 {
                    // Integral fixed-point values re-encode as integers.
                    encode_charstring_int(out, bits >> 16);
                } else {
                    out.push(255);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
            }
        }
    }
}

/// Rewrites a charstring into an equivalent one with all `callsubr` /
/// `callgsubr` invocations inlined and operands re-encoded minimally.
pub(crate) fn desubroutinize(
    charstring: &[u8],
    global_subrs: Index<'_>,
    local_subrs: Index<'_>,
) -> Result<Vec<u8>, ParseError> {
    let mut inliner = Inliner {
        global_subrs,
        local_subrs,
        pending: vec![],
        out: vec![],
        stem_count: 0,
        done: false,
    };
    inliner.inline(charstring, 0)?;
    if !inliner.done {
        // Source charstrings lacking an explicit terminator get one.
        inliner.flush();
        inliner.out.push(ops::ENDCHAR);
    }
    Ok(inliner.out)
}

struct Inliner<'a> {
    global_subrs: Index<'a>,
    local_subrs: Index<'a>,
    pending: Vec<Number>,
    out: Vec<u8>,
    stem_count: usize,
    done: bool,
}

impl Inliner<'_> {
    fn inline(&mut self, charstring: &[u8], depth: usize) -> Result<(), ParseError> {
        if depth > SUBR_DEPTH_LIMIT {
            return Err(ParseError::new(ParseErrorKind::SubrDepth {
                limit: SUBR_DEPTH_LIMIT,
            }));
        }
        let mut cursor = Cursor::new(charstring);
        while !cursor.is_empty() && !self.done {
            let b0 = cursor.read_u8()?;
            match b0 {
                28 => self.pending.push(Number::Int(cursor.read_i16()?.into())),
                32..=246 => self.pending.push(Number::Int((i32::from(b0)) - 139)),
                247..=250 => self.pending.push(Number::Int(
                    (i32::from(b0) - 247) * 256 + i32::from(cursor.read_u8()?) + 108,
                )),
                251..=254 => self.pending.push(Number::Int(
                    -(i32::from(b0) - 251) * 256 - i32::from(cursor.read_u8()?) - 108,
                )),
                255 => self.pending.push(Number::Fixed(cursor.read_i32()?)),
                ops::CALLSUBR | ops::CALLGSUBR => {
                    let index = if b0 == ops::CALLSUBR {
                        self.local_subrs
                    } else {
                        self.global_subrs
                    };
                    let raw = self.pending.pop().ok_or_else(|| {
                        cursor.err(ParseErrorKind::Malformed("subr call without an index"))
                    })?;
                    let Number::Int(raw) = raw else {
                        return Err(cursor.err(ParseErrorKind::Malformed("fractional subr index")));
                    };
                    let biased = usize::try_from(raw + index.subr_bias()).map_err(|_| {
                        cursor.err(ParseErrorKind::Malformed("negative subr index"))
                    })?;
                    let body = index.get(biased)?;
                    self.inline(body, depth + 1)?;
                }
                ops::RETURN => break,
                ops::ESCAPE => {
                    let b1 = cursor.read_u8()?;
                    self.flush();
                    self.out.push(ops::ESCAPE);
                    self.out.push(b1);
                }
                ops::ENDCHAR => {
                    self.flush();
                    self.out.push(ops::ENDCHAR);
                    self.done = true;
                }
                ops::HSTEM | ops::VSTEM | ops::HSTEMHM | ops::VSTEMHM => {
                    self.stem_count += self.pending.len() / 2;
                    self.flush();
                    self.out.push(b0);
                }
                ops::HINTMASK | ops::CNTRMASK => {
                    // Leftover operands are an implied `vstemhm`.
                    self.stem_count += self.pending.len() / 2;
                    self.flush();
                    self.out.push(b0);
                    let mask_len = (self.stem_count + 7) / 8;
                    let mask = cursor.split_at(mask_len)?;
                    self.out.extend_from_slice(mask.bytes);
                }
                _ => {
                    self.flush();
                    self.out.push(b0);
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) {
        for number in core::mem::take(&mut self.pending) {
            number.encode(&mut self.out);
        }
    }
}

/// Emits a subset CFF table containing the charstrings of `kept` glyphs (in
/// new-glyph-ID order), desubroutinized and linearized to a non-CID font.
pub(crate) fn subset_cff(cff: &CffTable<'_>, kept: &[u16]) -> Result<Vec<u8>, ParseError> {
    let mut charstrings = IndexBuilder::default();
    for &old_id in kept {
        let charstring = cff.charstrings.get(old_id.into())?;
        let local_subrs = cff.font_dict(old_id).local_subrs;
        charstrings.push(desubroutinize(charstring, cff.global_subrs, local_subrs)?);
    }
    let charstrings = charstrings.encode(false);

    let mut name_index = IndexBuilder::default();
    name_index.push(cff.name.to_vec());
    let name_index = name_index.encode(false);

    let mut string_index = IndexBuilder::default();
    for string in cff.strings.iter() {
        string_index.push(string?.to_vec());
    }
    let string_index = string_index.encode(false);

    let global_subrs = IndexBuilder::default().encode(false);

    // Charset format 0: SIDs of all glyphs except the implicit glyph 0.
    let mut charset = vec![0_u8];
    for &old_id in &kept[1..] {
        charset.extend_from_slice(&cff.charset.sid(old_id).to_be_bytes());
    }

    // Private DICT of the first font DICT, minus the Subrs reference.
    let mut private_dict = vec![];
    for (op, operands) in cff.font_dict(0).private_dict.entries() {
        if *op == dict_ops::SUBRS {
            continue;
        }
        encode_dict_operands(&mut private_dict, operands);
        encode_dict_op(&mut private_dict, *op);
    }

    // The Top DICT carries only offset-dependent entries, all encoded with
    // fixed-width operands so the second pass preserves the layout.
    let build_top_dict = |charset_offset: i32, charstrings_offset: i32, private_offset: i32| {
        let mut dict = vec![];
        encode_dict_offset(&mut dict, charset_offset);
        encode_dict_op(&mut dict, dict_ops::CHARSET);
        encode_dict_offset(&mut dict, charstrings_offset);
        encode_dict_op(&mut dict, dict_ops::CHAR_STRINGS);
        encode_dict_offset(&mut dict, i32::try_from(private_dict.len()).expect("dict overflow"));
        encode_dict_offset(&mut dict, private_offset);
        encode_dict_op(&mut dict, dict_ops::PRIVATE);
        dict
    };

    let mut top_dict_index = IndexBuilder::default();
    top_dict_index.push(build_top_dict(0, 0, 0));
    let top_dict_index_len = top_dict_index.encode(false).len();

    let header = [1_u8, 0, 4, 4];
    let charset_offset =
        header.len() + name_index.len() + top_dict_index_len + string_index.len() + global_subrs.len();
    let charstrings_offset = charset_offset + charset.len();
    let private_offset = charstrings_offset + charstrings.len();

    let mut top_dict_index = IndexBuilder::default();
    top_dict_index.push(build_top_dict(
        i32::try_from(charset_offset).expect("offset overflow"),
        i32::try_from(charstrings_offset).expect("offset overflow"),
        i32::try_from(private_offset).expect("offset overflow"),
    ));
    let top_dict_index = top_dict_index.encode(false);
    debug_assert_eq!(top_dict_index.len(), top_dict_index_len);

    let mut out = vec![];
    out.extend_from_slice(&header);
    out.extend_from_slice(&name_index);
    out.extend_from_slice(&top_dict_index);
    out.extend_from_slice(&string_index);
    out.extend_from_slice(&global_subrs);
    out.extend_from_slice(&charset);
    out.extend_from_slice(&charstrings);
    out.extend_from_slice(&private_dict);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charstring_int_encodings_round_trip() {
        for value in [0, 1, -1, 107, -107, 108, -108, 1131, -1131, 1132, 30_000, -30_000] {
            let mut bytes = vec![];
            encode_charstring_int(&mut bytes, value);
            bytes.push(ops::ENDCHAR);
            let desubred = desubroutinize(&bytes, Index::default(), Index::default()).unwrap();
            // Re-encoding is canonical, so a second pass is a fixed point.
            assert_eq!(desubred, bytes, "value: {value}");
        }
    }

    #[test]
    fn inlining_flattens_nested_subrs() {
        // Local subr 0 (bias 107): "30 hlineto return".
        let mut subr = vec![];
        encode_charstring_int(&mut subr, 30);
        subr.push(ops::HLINETO);
        subr.push(ops::RETURN);

        let mut index_bytes = vec![];
        index_bytes.extend_from_slice(&1_u16.to_be_bytes());
        index_bytes.push(1);
        index_bytes.push(1);
        index_bytes.push(1 + subr.len() as u8);
        index_bytes.extend_from_slice(&subr);
        let mut cursor = Cursor::new(&index_bytes);
        let local_subrs = Index::parse(&mut cursor, false).unwrap();

        // "0 0 rmoveto (-107) callsubr endchar"
        let mut cs = vec![];
        encode_charstring_int(&mut cs, 0);
        encode_charstring_int(&mut cs, 0);
        cs.push(ops::RMOVETO);
        encode_charstring_int(&mut cs, -107);
        cs.push(ops::CALLSUBR);
        cs.push(ops::ENDCHAR);

        let flat = desubroutinize(&cs, Index::default(), local_subrs).unwrap();

        let mut expected = vec![];
        encode_charstring_int(&mut expected, 0);
        encode_charstring_int(&mut expected, 0);
        expected.push(ops::RMOVETO);
        encode_charstring_int(&mut expected, 30);
        expected.push(ops::HLINETO);
        expected.push(ops::ENDCHAR);
        assert_eq!(flat, expected);
    }

    #[test]
    fn hintmask_bytes_survive_inlining() {
        // "10 20 hstemhm 1 2 hintmask <mask> 0 0 rmoveto endchar"
        let mut cs = vec![];
        for value in [10, 20] {
            encode_charstring_int(&mut cs, value);
        }
        cs.push(ops::HSTEMHM);
        for value in [1, 2] {
            encode_charstring_int(&mut cs, value);
        }
        cs.push(ops::HINTMASK);
        cs.push(0xa5); // 2 stems -> 1 mask byte
        for value in [0, 0] {
            encode_charstring_int(&mut cs, value);
        }
        cs.push(ops::RMOVETO);
        cs.push(ops::ENDCHAR);

        let flat = desubroutinize(&cs, Index::default(), Index::default()).unwrap();
        assert_eq!(flat, cs);
    }

    #[test]
    fn subr_depth_is_bounded() {
        // Subr 0 calls itself.
        let mut subr = vec![];
        encode_charstring_int(&mut subr, -107);
        subr.push(ops::CALLSUBR);

        let mut index_bytes = vec![];
        index_bytes.extend_from_slice(&1_u16.to_be_bytes());
        index_bytes.push(1);
        index_bytes.push(1);
        index_bytes.push(1 + subr.len() as u8);
        index_bytes.extend_from_slice(&subr);
        let mut cursor = Cursor::new(&index_bytes);
        let local_subrs = Index::parse(&mut cursor, false).unwrap();

        let mut cs = vec![];
        encode_charstring_int(&mut cs, -107);
        cs.push(ops::CALLSUBR);
        let err = desubroutinize(&cs, Index::default(), local_subrs).unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::SubrDepth { .. }));
    }
}
