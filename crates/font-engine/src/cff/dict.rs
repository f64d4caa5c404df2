//! CFF DICT structures.

use crate::{
    errors::{ParseError, ParseErrorKind},
    reader::Cursor,
};

/// DICT operators used by the engine. Two-byte operators are keyed as
/// `0x0c00 | second_byte`.
pub(crate) mod ops {
    pub(crate) const CHARSET: u16 = 15;
    pub(crate) const CHAR_STRINGS: u16 = 17;
    pub(crate) const PRIVATE: u16 = 18;
    pub(crate) const SUBRS: u16 = 19;
    pub(crate) const VSINDEX: u16 = 22;
    pub(crate) const VSTORE: u16 = 24;
    pub(crate) const ROS: u16 = 0x0c1e;
    pub(crate) const FD_ARRAY: u16 = 0x0c24;
    pub(crate) const FD_SELECT: u16 = 0x0c25;
}

/// A single DICT operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Operand {
    Int(i32),
    Real(f64),
}

impl Operand {
    pub(crate) fn to_i32(self) -> i32 {
        match self {
            Self::Int(value) => value,
            #[allow(clippy::cast_possible_truncation)] // deliberate for offset operands
            Self::Real(value) => value as i32,
        }
    }
}

/// Parsed DICT: operator-keyed operand lists in order of appearance.
#[derive(Debug, Clone, Default)]
pub(crate) struct Dict {
    entries: Vec<(u16, Vec<Operand>)>,
}

impl Dict {
    pub(crate) fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let mut entries = vec![];
        let mut operands = vec![];
        while !cursor.is_empty() {
            let b0 = cursor.read_u8()?;
            match b0 {
                // 22..=27 are reserved in CFF but carry `vsindex`/`blend` in
                // CFF2 Private DICTs; both parse as plain operators here.
                0..=27 => {
                    let op = if b0 == 12 {
                        0x0c00 | u16::from(cursor.read_u8()?)
                    } else {
                        b0.into()
                    };
                    entries.push((op, core::mem::take(&mut operands)));
                }
                28 | 29 | 32..=254 => operands.push(Operand::Int(parse_int(&mut cursor, b0)?)),
                30 => operands.push(Operand::Real(parse_real(&mut cursor)?)),
                _ => return Err(cursor.err(ParseErrorKind::Malformed("reserved DICT byte"))),
            }
        }
        Ok(Self { entries })
    }

    pub(crate) fn entries(&self) -> &[(u16, Vec<Operand>)] {
        &self.entries
    }

    pub(crate) fn get(&self, op: u16) -> Option<&[Operand]> {
        self.entries
            .iter()
            .find(|(key, _)| *key == op)
            .map(|(_, operands)| operands.as_slice())
    }

    pub(crate) fn contains(&self, op: u16) -> bool {
        self.get(op).is_some()
    }

    pub(crate) fn int(&self, op: u16) -> Option<i32> {
        self.get(op)?.first().map(|operand| operand.to_i32())
    }

    /// Reads a `[size, offset]` operand pair (the `Private` entry layout).
    pub(crate) fn size_and_offset(&self, op: u16) -> Option<(usize, usize)> {
        match self.get(op)? {
            [size, offset] => Some((
                usize::try_from(size.to_i32()).ok()?,
                usize::try_from(offset.to_i32()).ok()?,
            )),
            _ => None,
        }
    }
}

/// Parses a compactly encoded DICT integer whose first byte is `b0`.
pub(crate) fn parse_int(cursor: &mut Cursor<'_>, b0: u8) -> Result<i32, ParseError> {
    Ok(match b0 {
        32..=246 => i32::from(b0) - 139,
        247..=250 => (i32::from(b0) - 247) * 256 + i32::from(cursor.read_u8()?) + 108,
        251..=254 => -(i32::from(b0) - 251) * 256 - i32::from(cursor.read_u8()?) - 108,
        28 => cursor.read_i16()?.into(),
        29 => cursor.read_i32()?,
        _ => return Err(cursor.err(ParseErrorKind::Malformed("not an integer operand"))),
    })
}

/// Parses a nibble-encoded (BCD) real number.
fn parse_real(cursor: &mut Cursor<'_>) -> Result<f64, ParseError> {
    let mut repr = String::new();
    'outer: loop {
        let byte = cursor.read_u8()?;
        for nibble in [byte >> 4, byte & 0x0f] {
            match nibble {
                0..=9 => repr.push(char::from(b'0' + nibble)),
                0xa => repr.push('.'),
                0xb => repr.push('E'),
                0xc => repr.push_str("E-"),
                0xe => repr.push('-'),
                0xf => break 'outer,
                _ => return Err(cursor.err(ParseErrorKind::Malformed("reserved real nibble"))),
            }
        }
    }
    repr.parse()
        .map_err(|_| cursor.err(ParseErrorKind::Malformed("unparseable real operand")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> Dict {
        Dict::parse(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn integer_encodings() {
        // 0 -> charset (op 15)
        let dict = parse(&[139, 15]);
        assert_eq!(dict.int(ops::CHARSET), Some(0));

        // 2-byte positive and negative forms -> CharStrings (op 17)
        let dict = parse(&[247, 0, 17]);
        assert_eq!(dict.int(ops::CHAR_STRINGS), Some(108));
        let dict = parse(&[254, 255, 17]);
        assert_eq!(dict.int(ops::CHAR_STRINGS), Some(-1131));

        // 3- and 5-byte forms
        let dict = parse(&[28, 0x12, 0x34, 17]);
        assert_eq!(dict.int(ops::CHAR_STRINGS), Some(0x1234));
        let dict = parse(&[29, 0x00, 0x01, 0x00, 0x00, 17]);
        assert_eq!(dict.int(ops::CHAR_STRINGS), Some(0x10000));
    }

    #[test]
    fn real_encoding() {
        // -2.25 is encoded as nibbles e 2 a 2 5 f.
        let dict = parse(&[30, 0xe2, 0xa2, 0x5f, 0x0c, 0x1e]);
        let [Operand::Real(value)] = dict.get(ops::ROS).unwrap() else {
            panic!("expected a real operand");
        };
        assert_eq!(*value, -2.25);
    }

    #[test]
    fn private_entry_pair() {
        let dict = parse(&[
            247, 0, // size = 108
            28, 0x04, 0x00, // offset = 1024
            18, // Private
        ]);
        assert_eq!(dict.size_and_offset(ops::PRIVATE), Some((108, 1024)));
    }
}
