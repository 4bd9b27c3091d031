use std::fmt;

use crate::reader::{ReaderError, ReaderResult};

/// Represents the strand of a genomic feature.
///
/// This enum is used to indicate the orientation of a feature on a reference sequence.
///
/// # Example
///
/// ```
/// use annoset::strand::Strand;
///
/// let strand = Strand::Forward;
/// assert_eq!(strand, Strand::Forward);
/// assert_eq!(strand.to_string(), "+");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strand {
    /// Positive strand (`+`).
    Forward,
    /// Negative strand (`-`).
    Reverse,
    /// Unknown strand (`.` or `?`).
    #[default]
    Unknown,
}

impl Strand {
    /// Parses a column value into a `Strand`.
    ///
    /// # Errors
    ///
    /// This function returns an error if the string is not a valid strand.
    pub(crate) fn parse(raw: &str, line: usize) -> ReaderResult<Self> {
        match raw.trim() {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            "." | "?" | "" => Ok(Strand::Unknown),
            other => Err(ReaderError::invalid_field(
                line,
                "strand",
                format!("ERROR: expected '+', '-', '.', or '?', got '{other}' in {line}:strand"),
            )),
        }
    }

    /// Returns `true` for the reverse strand.
    #[inline]
    pub fn is_reverse(&self) -> bool {
        matches!(self, Strand::Reverse)
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => f.write_str("+"),
            Strand::Reverse => f.write_str("-"),
            Strand::Unknown => f.write_str("."),
        }
    }
}
