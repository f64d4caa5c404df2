//! Error types.

use core::{fmt, ops};

use crate::tables::Tag;

/// Kind of a font [`ParseError`].
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// Unexpected end of the font data.
    UnexpectedEof,
    /// Unexpected magic bytes at the start of a font container.
    BadMagic {
        /// The magic value actually read.
        magic: u32,
    },
    /// Missing required font table (e.g., `head`).
    MissingTable,
    /// No supported Unicode subtable in the `cmap` table.
    NoSupportedCmap,
    /// Offset inferred from the table data is out of bounds.
    OffsetOutOfBounds(usize),
    /// Range inferred from the table data is out of bounds.
    RangeOutOfBounds {
        /// Inferred range.
        range: ops::Range<usize>,
        /// Length of the indexed data.
        len: usize,
    },
    /// Unexpected version of a table or font container.
    UnexpectedTableVersion {
        /// Actual table version.
        version: u32,
    },
    /// Unexpected table length.
    UnexpectedTableLen {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
    /// Unexpected table format (e.g., for a `cmap` subtable).
    UnexpectedTableFormat {
        /// Actual format.
        format: u16,
    },
    /// Recognized, but unimplemented format of a table.
    UnsupportedFormat {
        /// Version or format identifier of the table.
        version: u32,
    },
    /// A table-specific structural invariant does not hold.
    Malformed(&'static str),
    /// A composite glyph directly or indirectly references itself.
    CompositeCycle {
        /// Glyph encountered for the second time on the same component path.
        glyph_id: u16,
    },
    /// Composite glyph nesting exceeds the supported depth.
    CompositeDepth {
        /// Maximum supported nesting depth.
        limit: usize,
    },
    /// CFF subroutine nesting exceeds the supported depth.
    SubrDepth {
        /// Maximum supported nesting depth.
        limit: usize,
    },
    /// zlib-compressed WOFF table data failed to decompress.
    Deflate,
    /// The Brotli stream of a WOFF2 file failed to decompress.
    Brotli,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => formatter.write_str("unexpected end of font data"),
            Self::BadMagic { magic } => write!(formatter, "unexpected magic bytes {magic:#010x}"),
            Self::MissingTable => formatter.write_str("missing required font table"),
            Self::NoSupportedCmap => {
                formatter.write_str("no supported Unicode subtable in the `cmap` table")
            }
            Self::OffsetOutOfBounds(offset) => {
                write!(formatter, "offset {offset} is out of bounds")
            }
            Self::RangeOutOfBounds { range, len } => {
                write!(
                    formatter,
                    "range {}..{} is out of bounds for data of length {len}",
                    range.start, range.end
                )
            }
            Self::UnexpectedTableVersion { version } => {
                write!(formatter, "unexpected table version {version:#010x}")
            }
            Self::UnexpectedTableLen { expected, actual } => {
                write!(
                    formatter,
                    "unexpected table length: expected {expected} bytes, got {actual}"
                )
            }
            Self::UnexpectedTableFormat { format } => {
                write!(formatter, "unexpected table format {format}")
            }
            Self::UnsupportedFormat { version } => {
                write!(formatter, "recognized but unsupported format {version:#x}")
            }
            Self::Malformed(detail) => write!(formatter, "malformed table: {detail}"),
            Self::CompositeCycle { glyph_id } => {
                write!(formatter, "cycle through composite glyph {glyph_id}")
            }
            Self::CompositeDepth { limit } => {
                write!(formatter, "composite glyphs nested deeper than {limit}")
            }
            Self::SubrDepth { limit } => {
                write!(formatter, "charstring subroutines nested deeper than {limit}")
            }
            Self::Deflate => formatter.write_str("error inflating zlib-compressed table data"),
            Self::Brotli => formatter.write_str("error decompressing Brotli stream"),
        }
    }
}

/// Errors that can occur when parsing an OpenType [`Font`](crate::Font).
#[derive(Debug)]
pub struct ParseError {
    pub(crate) kind: ParseErrorKind,
    pub(crate) offset: usize,
    pub(crate) table: Option<Tag>,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            offset: 0,
            table: None,
        }
    }

    pub(crate) fn missing_table(tag: Tag) -> Self {
        Self::new(ParseErrorKind::MissingTable).with_table(tag)
    }

    pub(crate) fn with_table(mut self, tag: Tag) -> Self {
        self.table = Some(tag);
        self
    }

    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Gets the table this error relates to.
    pub fn table(&self) -> Option<Tag> {
        self.table
    }

    /// Gets the offset in the font data.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} (at offset {:#x})", self.kind, self.offset)?;
        if let Some(table) = self.table {
            write!(formatter, " [table: {table}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Errors that can occur when building a font [`Subset`](crate::Subset).
#[derive(Debug)]
#[non_exhaustive]
pub enum SubsetError {
    /// Error parsing source font data needed by the subsetter.
    Parse(ParseError),
    /// A requested glyph ID does not exist in the source font.
    GlyphOutOfRange {
        /// The offending glyph ID.
        glyph_id: u16,
    },
    /// The source font's outline flavor cannot be re-emitted.
    UnsupportedOutlines,
}

impl From<ParseError> for SubsetError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl fmt::Display for SubsetError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(formatter, "error parsing source font: {err}"),
            Self::GlyphOutOfRange { glyph_id } => {
                write!(formatter, "glyph {glyph_id} is not present in the font")
            }
            Self::UnsupportedOutlines => {
                formatter.write_str("font outline flavor is not supported by the subsetter")
            }
        }
    }
}

impl std::error::Error for SubsetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}
