use std::{fmt, panic::Location};

use serde::Serialize;

/// Rendered in place of the file name when the caller gave none.
pub const UNKNOWN_FILE: &str = "???";

/// The source location an `allocate()` or `free()` came from. Only used for
/// diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Site {
    pub file: Option<&'static str>,
    pub line: u32,
}

impl Site {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self {
            file: Some(file),
            line,
        }
    }

    /// A site with no file information, e.g. from a C caller that passed
    /// `NULL` for `__FILE__`.
    pub const fn unknown(line: u32) -> Self {
        Self { file: None, line }
    }

    /// The Rust call site of whoever called this (through any number of
    /// `#[track_caller]` frames).
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line())
    }

    pub fn file_or_placeholder(&self) -> &'static str {
        self.file.unwrap_or(UNKNOWN_FILE)
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_or_placeholder(), self.line)
    }
}
