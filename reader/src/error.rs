//! `Location`, `ParseError` and `ParseResult`, the plumbing every parser
//! function threads through to report where a malformed file went wrong.

use std::fmt;

/// The location of a token or error within the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line_number: usize,
}

/// A parse error, with the line it was detected on.
#[derive(Debug)]
pub struct ParseError {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.location.line_number, self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

macro_rules! err {
    ( $loc:expr, $msg:expr ) => {
        Err($crate::error::ParseError {
            location: $loc,
            message: $msg.to_string(),
        })
    };
    ( $loc:expr, $fmt:expr, $( $arg:expr ),+ ) => {
        Err($crate::error::ParseError {
            location: $loc,
            message: format!( $fmt, $( $arg ),+ ),
        })
    };
}

pub(crate) use err;
