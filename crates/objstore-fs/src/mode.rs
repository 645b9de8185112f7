//! Open modes.

use std::fmt;
use std::str::FromStr;

use crate::error::FsError;

/// How a stream is opened.
///
/// Objects cannot be updated in place, so a stream is either read-only or write-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `r`: read an existing object.
    Read,
    /// `w`: create or truncate.
    Write,
    /// `a`: keep the existing content and write after it.
    Append,
    /// `x`: create, failing when the object already exists.
    CreateNew,
}

impl OpenMode {
    /// Whether the stream is readable.
    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, Self::Read)
    }
}

impl FromStr for OpenMode {
    type Err = FsError;

    /// Parse an `fopen`-style mode string. The `b` and `t` flags are ignored; `+`
    /// (read and write) is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('+') {
            return Err(FsError::InvalidMode(format!(
                "{s}: objects cannot be opened for reading and writing"
            )));
        }
        let base: String = s.chars().filter(|c| !matches!(c, 'b' | 't')).collect();
        match base.as_str() {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "a" => Ok(Self::Append),
            "x" => Ok(Self::CreateNew),
            _ => Err(FsError::InvalidMode(s.to_owned())),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::Append => "a",
            Self::CreateNew => "x",
        })
    }
}
