//! Cross-table consistency validation.

use core::fmt;

use crate::{
    font::{Font, OutlineData},
    tables::Tag,
};

/// Severity of a [`ValidationIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Questionable but usable data.
    Warning,
    /// Data that is likely to misbehave in consumers.
    Error,
}

/// A single finding of [`Font::validate`].
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Issue severity.
    pub severity: Severity,
    /// Table the issue relates to, when attributable.
    pub table: Option<Tag>,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.message)?;
        if let Some(table) = self.table {
            write!(formatter, " [table: {table}]")?;
        }
        Ok(())
    }
}

/// Outcome of [`Font::validate`]: collected issues plus a terminal verdict.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Checks that no error-severity issues were found.
    pub fn is_ok(&self) -> bool {
        self.issues
            .iter()
            .all(|issue| issue.severity != Severity::Error)
    }

    /// All collected issues, errors first.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    fn push(&mut self, severity: Severity, table: Tag, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity,
            table: Some(table),
            message: message.into(),
        });
    }
}

impl Font<'_> {
    /// Walks the parsed tables checking cross-table invariants; parsing
    /// itself has already validated per-table structure.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let num_glyphs = self.num_glyphs();

        let units_per_em = self.units_per_em();
        if !(16..=16_384).contains(&units_per_em) {
            result.push(
                Severity::Warning,
                Tag::HEAD,
                format!("unitsPerEm {units_per_em} outside [16, 16384]"),
            );
        }

        if self.hhea.number_of_metrics > num_glyphs {
            result.push(
                Severity::Error,
                Tag::HHEA,
                format!(
                    "numberOfHMetrics {} exceeds glyph count {num_glyphs}",
                    self.hhea.number_of_metrics
                ),
            );
        } else if num_glyphs > 0 && self.hmtx.advance_and_sb(num_glyphs - 1).is_err() {
            result.push(
                Severity::Error,
                Tag::HMTX,
                "metrics records do not cover all glyphs",
            );
        }

        match &self.outlines {
            OutlineData::Glyf(glyf) => {
                if glyf.loca.glyph_count() != num_glyphs {
                    result.push(
                        Severity::Error,
                        Tag::LOCA,
                        format!(
                            "expected {} offsets, table holds {}",
                            num_glyphs + 1,
                            glyf.loca.glyph_count() + 1
                        ),
                    );
                }
                let mut prev = 0_usize;
                for glyph_id in 0..=glyf.loca.glyph_count().min(num_glyphs) {
                    match glyf.loca.offset(usize::from(glyph_id)) {
                        Ok(offset) if offset < prev => {
                            result.push(
                                Severity::Error,
                                Tag::LOCA,
                                format!("offset for glyph {glyph_id} goes backwards"),
                            );
                            break;
                        }
                        Ok(offset) => {
                            if offset > glyf.data.len() {
                                result.push(
                                    Severity::Error,
                                    Tag::LOCA,
                                    format!("offset for glyph {glyph_id} is past the glyf table"),
                                );
                                break;
                            }
                            prev = offset;
                        }
                        Err(_) => break,
                    }
                }
            }
            OutlineData::Cff(cff) => {
                if cff.num_glyphs() != num_glyphs {
                    result.push(
                        Severity::Error,
                        Tag::CFF,
                        format!(
                            "CharStrings holds {} glyphs, maxp declares {num_glyphs}",
                            cff.num_glyphs()
                        ),
                    );
                }
            }
            OutlineData::Cff2(cff2) => {
                if cff2.num_glyphs() != num_glyphs {
                    result.push(
                        Severity::Error,
                        Tag::CFF2,
                        format!(
                            "CharStrings holds {} glyphs, maxp declares {num_glyphs}",
                            cff2.num_glyphs()
                        ),
                    );
                }
            }
        }

        let mut bad_mappings = 0_u32;
        self.cmap.mappings(|_, glyph_id| {
            if glyph_id >= num_glyphs {
                bad_mappings += 1;
            }
        });
        if bad_mappings > 0 {
            result.push(
                Severity::Error,
                Tag::CMAP,
                format!("{bad_mappings} mappings point past the glyph count"),
            );
        }

        if self.vhea.is_some() && self.vmtx.is_none() {
            result.push(
                Severity::Warning,
                Tag::VHEA,
                "vertical header without vertical metrics",
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestFontBuilder;

    #[test]
    fn well_formed_font_validates() {
        let bytes = TestFontBuilder::default().build();
        let font = Font::parse(&bytes).unwrap();
        let result = font.validate();
        assert!(result.is_ok(), "issues: {:?}", result.issues());
    }

    #[test]
    fn tolerates_unusual_units_per_em() {
        let bytes = TestFontBuilder {
            units_per_em: 10,
            ..TestFontBuilder::default()
        }
        .build();
        let font = Font::parse(&bytes).unwrap();
        let result = font.validate();
        assert!(result.is_ok());
        assert_eq!(result.issues().len(), 1);
        assert_eq!(result.issues()[0].severity, Severity::Warning);
    }
}
