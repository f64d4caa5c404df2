//! Type 2 charstring interpretation.

use crate::{
    cff::index::Index,
    errors::{ParseError, ParseErrorKind},
    outline::OutlineSink,
    reader::Cursor,
    var::store::ItemVariationStore,
};

/// Maximum nesting depth for subroutine calls, per the Type 2 implementation
/// limits appendix.
pub(crate) const SUBR_DEPTH_LIMIT: usize = 10;

const STACK_LIMIT: usize = 513;

/// Charstring operators.
pub(crate) mod ops {
    pub(crate) const HSTEM: u8 = 1;
    pub(crate) const VSTEM: u8 = 3;
    pub(crate) const VMOVETO: u8 = 4;
    pub(crate) const RLINETO: u8 = 5;
    pub(crate) const HLINETO: u8 = 6;
    pub(crate) const VLINETO: u8 = 7;
    pub(crate) const RRCURVETO: u8 = 8;
    pub(crate) const CALLSUBR: u8 = 10;
    pub(crate) const RETURN: u8 = 11;
    pub(crate) const ESCAPE: u8 = 12;
    pub(crate) const ENDCHAR: u8 = 14;
    pub(crate) const VSINDEX: u8 = 15;
    pub(crate) const BLEND: u8 = 16;
    pub(crate) const HSTEMHM: u8 = 18;
    pub(crate) const HINTMASK: u8 = 19;
    pub(crate) const CNTRMASK: u8 = 20;
    pub(crate) const RMOVETO: u8 = 21;
    pub(crate) const HMOVETO: u8 = 22;
    pub(crate) const VSTEMHM: u8 = 23;
    pub(crate) const RCURVELINE: u8 = 24;
    pub(crate) const RLINECURVE: u8 = 25;
    pub(crate) const VVCURVETO: u8 = 26;
    pub(crate) const HHCURVETO: u8 = 27;
    pub(crate) const CALLGSUBR: u8 = 29;
    pub(crate) const VHCURVETO: u8 = 30;
    pub(crate) const HVCURVETO: u8 = 31;

    // Two-byte operators following ESCAPE.
    pub(crate) const HFLEX: u8 = 34;
    pub(crate) const FLEX: u8 = 35;
    pub(crate) const HFLEX1: u8 = 36;
    pub(crate) const FLEX1: u8 = 37;
}

/// Variation state for CFF2 charstring evaluation: region scalars for the
/// currently selected variation data subtable.
#[derive(Debug)]
pub(crate) struct BlendState<'a> {
    store: &'a ItemVariationStore,
    coords: &'a [f32],
    scalars: Vec<f32>,
}

impl<'a> BlendState<'a> {
    pub(crate) fn new(
        store: &'a ItemVariationStore,
        coords: &'a [f32],
        store_index: u16,
    ) -> Result<Self, ParseError> {
        let scalars = store.region_scalars(store_index, coords)?;
        Ok(Self {
            store,
            coords,
            scalars,
        })
    }

    fn set_store_index(&mut self, store_index: u16) -> Result<(), ParseError> {
        self.scalars = self.store.region_scalars(store_index, self.coords)?;
        Ok(())
    }

    pub(crate) fn scalars(&self) -> &[f32] {
        &self.scalars
    }
}

/// Evaluates a charstring, emitting path commands to `sink`.
///
/// `blend` must be present when evaluating CFF2 charstrings backed by an
/// item variation store. CFF2 charstrings (no width operand, termination at
/// end of data) are selected by `cff2`.
pub(crate) fn evaluate(
    charstring: &[u8],
    global_subrs: Index<'_>,
    local_subrs: Option<Index<'_>>,
    blend: Option<BlendState<'_>>,
    cff2: bool,
    sink: &mut impl OutlineSink,
) -> Result<(), ParseError> {
    let mut evaluator = Evaluator {
        global_subrs,
        local_subrs,
        blend,
        is_open: false,
        have_read_width: cff2,
        stem_count: 0,
        done: false,
        x: 0.0,
        y: 0.0,
        stack: vec![],
    };
    evaluator.evaluate(charstring, sink, 0)?;
    if evaluator.is_open {
        sink.close();
    }
    Ok(())
}

struct Evaluator<'a> {
    global_subrs: Index<'a>,
    local_subrs: Option<Index<'a>>,
    blend: Option<BlendState<'a>>,
    is_open: bool,
    have_read_width: bool,
    stem_count: usize,
    done: bool,
    x: f32,
    y: f32,
    stack: Vec<f32>,
}

impl Evaluator<'_> {
    fn evaluate(
        &mut self,
        charstring: &[u8],
        sink: &mut impl OutlineSink,
        depth: usize,
    ) -> Result<(), ParseError> {
        if depth > SUBR_DEPTH_LIMIT {
            return Err(ParseError::new(ParseErrorKind::SubrDepth {
                limit: SUBR_DEPTH_LIMIT,
            }));
        }
        let mut cursor = Cursor::new(charstring);
        while !cursor.is_empty() && !self.done {
            let b0 = cursor.read_u8()?;
            match b0 {
                28 | 32..=255 => self.push(parse_number(&mut cursor, b0)?)?,
                ops::ESCAPE => {
                    let b1 = cursor.read_u8()?;
                    self.flex(b1, sink)?;
                }
                ops::RETURN => break,
                ops::CALLSUBR | ops::CALLGSUBR => {
                    let index = if b0 == ops::CALLSUBR {
                        self.local_subrs.as_ref().copied().unwrap_or_default()
                    } else {
                        self.global_subrs
                    };
                    #[allow(clippy::cast_possible_truncation)] // biased subr index is integral
                    let biased = self.pop()? as i32 + index.subr_bias();
                    let subr = usize::try_from(biased)
                        .map_err(|_| cursor.err(ParseErrorKind::Malformed("negative subr index")))
                        .and_then(|idx| index.get(idx))?;
                    self.evaluate(subr, sink, depth + 1)?;
                }
                _ => self.operator(b0, &mut cursor, sink)?,
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)] // one arm per operator group
    fn operator(
        &mut self,
        op: u8,
        cursor: &mut Cursor<'_>,
        sink: &mut impl OutlineSink,
    ) -> Result<(), ParseError> {
        match op {
            ops::VSINDEX => {
                self.ensure_blend(cursor)?;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let store_index = self.pop()? as u16;
                self.blend
                    .as_mut()
                    .expect("checked by ensure_blend")
                    .set_store_index(store_index)?;
            }
            ops::BLEND => self.apply_blend(cursor)?,
            ops::ENDCHAR => {
                if !self.stack.is_empty() && !self.have_read_width {
                    self.have_read_width = true;
                }
                self.stack.clear();
                if self.is_open {
                    self.is_open = false;
                    sink.close();
                }
                self.done = true;
            }
            ops::HSTEM | ops::VSTEM | ops::HSTEMHM | ops::VSTEMHM => {
                self.count_stems();
            }
            ops::HINTMASK | ops::CNTRMASK => {
                // Leftover arguments are an implied `vstemhm`.
                self.count_stems();
                let mask_len = (self.stem_count + 7) / 8;
                cursor.skip(mask_len)?;
            }
            ops::RMOVETO => {
                let args = self.take_args(2)?;
                self.start_contour(sink);
                self.x += args[0];
                self.y += args[1];
                sink.move_to(self.x, self.y);
            }
            ops::HMOVETO | ops::VMOVETO => {
                let args = self.take_args(1)?;
                self.start_contour(sink);
                if op == ops::HMOVETO {
                    self.x += args[0];
                } else {
                    self.y += args[0];
                }
                sink.move_to(self.x, self.y);
            }
            ops::RLINETO => {
                let args = self.take_all();
                for pair in args.chunks_exact(2) {
                    self.x += pair[0];
                    self.y += pair[1];
                    sink.line_to(self.x, self.y);
                }
            }
            ops::HLINETO | ops::VLINETO => {
                let args = self.take_all();
                let mut horizontal = op == ops::HLINETO;
                for &delta in &args {
                    if horizontal {
                        self.x += delta;
                    } else {
                        self.y += delta;
                    }
                    horizontal = !horizontal;
                    sink.line_to(self.x, self.y);
                }
            }
            ops::RRCURVETO => {
                let args = self.take_all();
                for chunk in args.chunks_exact(6) {
                    self.curve(chunk, sink);
                }
            }
            ops::RCURVELINE => {
                let args = self.take_all();
                let curve_len = args.len().saturating_sub(2) / 6 * 6;
                for chunk in args[..curve_len].chunks_exact(6) {
                    self.curve(chunk, sink);
                }
                if let &[dx, dy] = &args[curve_len..] {
                    self.x += dx;
                    self.y += dy;
                    sink.line_to(self.x, self.y);
                }
            }
            ops::RLINECURVE => {
                let args = self.take_all();
                let line_len = args.len().saturating_sub(6) / 2 * 2;
                for pair in args[..line_len].chunks_exact(2) {
                    self.x += pair[0];
                    self.y += pair[1];
                    sink.line_to(self.x, self.y);
                }
                if args[line_len..].len() == 6 {
                    self.curve(&args[line_len..], sink);
                }
            }
            ops::VVCURVETO | ops::HHCURVETO => {
                let mut args = self.take_all();
                let mut leading = 0.0;
                if args.len() % 4 != 0 && !args.is_empty() {
                    leading = args.remove(0);
                }
                for chunk in args.chunks_exact(4) {
                    let (x1, y1);
                    if op == ops::VVCURVETO {
                        x1 = self.x + leading;
                        y1 = self.y + chunk[0];
                    } else {
                        x1 = self.x + chunk[0];
                        y1 = self.y + leading;
                    }
                    let x2 = x1 + chunk[1];
                    let y2 = y1 + chunk[2];
                    if op == ops::VVCURVETO {
                        self.x = x2;
                        self.y = y2 + chunk[3];
                    } else {
                        self.x = x2 + chunk[3];
                        self.y = y2;
                    }
                    sink.curve_to(x1, y1, x2, y2, self.x, self.y);
                    leading = 0.0;
                }
            }
            ops::HVCURVETO | ops::VHCURVETO => {
                let args = self.take_all();
                let count = args.len();
                let mut horizontal = op == ops::HVCURVETO;
                let mut i = 0;
                while i + 4 <= count {
                    let last = count - i == 5;
                    let (x1, y1, x2, y2, x3, y3);
                    if horizontal {
                        x1 = self.x + args[i];
                        y1 = self.y;
                        x2 = x1 + args[i + 1];
                        y2 = y1 + args[i + 2];
                        y3 = y2 + args[i + 3];
                        x3 = if last { x2 + args[i + 4] } else { x2 };
                    } else {
                        x1 = self.x;
                        y1 = self.y + args[i];
                        x2 = x1 + args[i + 1];
                        y2 = y1 + args[i + 2];
                        x3 = x2 + args[i + 3];
                        y3 = if last { y2 + args[i + 4] } else { y2 };
                    }
                    sink.curve_to(x1, y1, x2, y2, x3, y3);
                    self.x = x3;
                    self.y = y3;
                    horizontal = !horizontal;
                    i += 4;
                }
            }
            _ => {
                // Unknown operator: drop its arguments and carry on.
                self.stack.clear();
            }
        }
        Ok(())
    }

    fn flex(&mut self, op: u8, sink: &mut impl OutlineSink) -> Result<(), ParseError> {
        // The flex family always emits its two curves, following FreeType.
        let arg = |this: &Self, i: usize| this.stack.get(i).copied().unwrap_or(0.0);
        match op {
            ops::HFLEX => {
                let x1 = self.x + arg(self, 0);
                let y1 = self.y;
                let x2 = x1 + arg(self, 1);
                let y2 = y1 + arg(self, 2);
                let x3 = x2 + arg(self, 3);
                let x4 = x3 + arg(self, 4);
                let x5 = x4 + arg(self, 5);
                let end_x = x5 + arg(self, 6);
                sink.curve_to(x1, y1, x2, y2, x3, y2);
                sink.curve_to(x4, y2, x5, self.y, end_x, self.y);
                self.x = end_x;
            }
            ops::FLEX => {
                let x1 = self.x + arg(self, 0);
                let y1 = self.y + arg(self, 1);
                let x2 = x1 + arg(self, 2);
                let y2 = y1 + arg(self, 3);
                let x3 = x2 + arg(self, 4);
                let y3 = y2 + arg(self, 5);
                let x4 = x3 + arg(self, 6);
                let y4 = y3 + arg(self, 7);
                let x5 = x4 + arg(self, 8);
                let y5 = y4 + arg(self, 9);
                self.x = x5 + arg(self, 10);
                self.y = y5 + arg(self, 11);
                sink.curve_to(x1, y1, x2, y2, x3, y3);
                sink.curve_to(x4, y4, x5, y5, self.x, self.y);
            }
            ops::HFLEX1 => {
                let x1 = self.x + arg(self, 0);
                let y1 = self.y + arg(self, 1);
                let x2 = x1 + arg(self, 2);
                let y2 = y1 + arg(self, 3);
                let x3 = x2 + arg(self, 4);
                let x4 = x3 + arg(self, 5);
                let x5 = x4 + arg(self, 6);
                let y5 = y2 + arg(self, 7);
                self.x = x5 + arg(self, 8);
                sink.curve_to(x1, y1, x2, y2, x3, y2);
                sink.curve_to(x4, y2, x5, y5, self.x, self.y);
            }
            ops::FLEX1 => {
                let start_x = self.x;
                let start_y = self.y;
                let x1 = self.x + arg(self, 0);
                let y1 = self.y + arg(self, 1);
                let x2 = x1 + arg(self, 2);
                let y2 = y1 + arg(self, 3);
                let x3 = x2 + arg(self, 4);
                let y3 = y2 + arg(self, 5);
                let x4 = x3 + arg(self, 6);
                let y4 = y3 + arg(self, 7);
                let x5 = x4 + arg(self, 8);
                let y5 = y4 + arg(self, 9);
                if (x5 - start_x).abs() > (y5 - start_y).abs() {
                    self.x = x5 + arg(self, 10);
                    self.y = start_y;
                } else {
                    self.x = start_x;
                    self.y = y5 + arg(self, 10);
                }
                sink.curve_to(x1, y1, x2, y2, x3, y3);
                sink.curve_to(x4, y4, x5, y5, self.x, self.y);
            }
            _ => { /* unknown two-byte operator; tolerated */ }
        }
        self.stack.clear();
        Ok(())
    }

    fn curve(&mut self, chunk: &[f32], sink: &mut impl OutlineSink) {
        let x1 = self.x + chunk[0];
        let y1 = self.y + chunk[1];
        let x2 = x1 + chunk[2];
        let y2 = y1 + chunk[3];
        self.x = x2 + chunk[4];
        self.y = y2 + chunk[5];
        sink.curve_to(x1, y1, x2, y2, self.x, self.y);
    }

    fn start_contour(&mut self, sink: &mut impl OutlineSink) {
        if self.is_open {
            sink.close();
        } else {
            self.is_open = true;
        }
    }

    /// Takes the trailing `count` arguments off the stack; a leading unused
    /// value is the glyph width (CFF only, first stack-clearing operator).
    fn take_args(&mut self, count: usize) -> Result<Vec<f32>, ParseError> {
        if self.stack.len() > count && !self.have_read_width {
            self.have_read_width = true;
        }
        if self.stack.len() < count {
            return Err(ParseError::new(ParseErrorKind::Malformed(
                "not enough charstring arguments",
            )));
        }
        let args = self.stack.split_off(self.stack.len() - count);
        self.stack.clear();
        Ok(args)
    }

    /// Takes all arguments. Width operands only precede stem, mask, moveto
    /// and `endchar` operators, so no stripping happens here.
    fn take_all(&mut self) -> Vec<f32> {
        self.have_read_width = true;
        core::mem::take(&mut self.stack)
    }

    fn count_stems(&mut self) {
        if self.stack.len() % 2 != 0 && !self.have_read_width {
            self.have_read_width = true;
        }
        self.stem_count += self.stack.len() / 2;
        self.stack.clear();
    }

    fn ensure_blend(&mut self, cursor: &Cursor<'_>) -> Result<(), ParseError> {
        if self.blend.is_none() {
            return Err(cursor.err(ParseErrorKind::Malformed(
                "blend operator without a variation store",
            )));
        }
        Ok(())
    }

    fn apply_blend(&mut self, cursor: &Cursor<'_>) -> Result<(), ParseError> {
        self.ensure_blend(cursor)?;
        let region_count = self.blend.as_ref().expect("checked above").scalars().len();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let operand_count = self.pop()? as usize;
        let needed = operand_count * (region_count + 1);
        if self.stack.len() < needed {
            return Err(cursor.err(ParseErrorKind::Malformed("blend stack underflow")));
        }
        let scalars = self.blend.as_ref().expect("checked above").scalars();
        // Deltas follow the base values grouped by region: the delta for base
        // `i` and region `j` sits at `k * (1 + j) + i` past the first base.
        let bases_start = self.stack.len() - needed;
        for i in 0..operand_count {
            let mut value = self.stack[bases_start + i];
            for (j, &scalar) in scalars.iter().enumerate() {
                let delta = self.stack[bases_start + operand_count * (j + 1) + i];
                value += scalar * delta;
            }
            self.stack[bases_start + i] = value;
        }
        self.stack.truncate(bases_start + operand_count);
        Ok(())
    }

    fn push(&mut self, value: f32) -> Result<(), ParseError> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(ParseError::new(ParseErrorKind::Malformed(
                "charstring stack overflow",
            )));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<f32, ParseError> {
        self.stack.pop().ok_or_else(|| {
            ParseError::new(ParseErrorKind::Malformed("charstring stack underflow"))
        })
    }
}

/// Parses a charstring number whose first byte is `b0`.
#[allow(clippy::cast_precision_loss)] // charstring operands are 16-bit integers
fn parse_number(cursor: &mut Cursor<'_>, b0: u8) -> Result<f32, ParseError> {
    Ok(match b0 {
        28 => f32::from(cursor.read_i16()?),
        32..=246 => f32::from(i16::from(b0) - 139),
        247..=250 => ((i32::from(b0) - 247) * 256 + i32::from(cursor.read_u8()?) + 108) as f32,
        251..=254 => (-(i32::from(b0) - 251) * 256 - i32::from(cursor.read_u8()?) - 108) as f32,
        255 => cursor.read_fixed()?,
        _ => {
            return Err(cursor.err(ParseErrorKind::Malformed("not a charstring number")));
        }
    })
}
