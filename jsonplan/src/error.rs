//! Error types for schema building, decoding and encoding.

use alloc::string::String;
use core::fmt::{self, Display};

/// Maximum number of input bytes quoted in a [`JsonErrorKind::MalformedInput`] error.
pub const ERROR_WINDOW: usize = 128;

/// Maximum nesting of arrays and objects inside a dynamic [`Value`](jsonplan_core::Value).
pub const MAX_DEPTH: usize = 128;

/// Error type for every jsonplan operation.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonError {
    /// The specific kind of error
    pub kind: JsonErrorKind,
    /// Byte offset into the input where the error was detected
    pub offset: Option<usize>,
    /// Up to [`ERROR_WINDOW`] bytes of input starting at `offset`
    pub window: Option<String>,
}

impl Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(offset) = self.offset {
            write!(f, " at byte {offset}")?;
        }
        if let Some(window) = &self.window {
            write!(f, ", near `{window}`")?;
        }
        Ok(())
    }
}

impl std::error::Error for JsonError {}

impl JsonError {
    /// Create an error without position information
    pub const fn new(kind: JsonErrorKind) -> Self {
        JsonError {
            kind,
            offset: None,
            window: None,
        }
    }

    /// Create a malformed-input error at `offset`, quoting the input around it.
    pub fn malformed(reason: Malformed, input: &[u8], offset: usize) -> Self {
        JsonError {
            kind: JsonErrorKind::MalformedInput(reason),
            offset: Some(offset),
            window: Some(window(input, offset)),
        }
    }

    /// Get an error code for this error.
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Specific error kinds
#[derive(Debug, Clone, PartialEq)]
pub enum JsonErrorKind {
    /// The schema builder met a type it cannot compile
    UnsupportedType {
        /// The offending type
        type_name: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
    /// A record type contains itself
    CyclicType {
        /// The record that was re-entered
        type_name: &'static str,
    },
    /// Two fields of one record map to the same JSON key
    DuplicateKey {
        /// The record being compiled
        type_name: &'static str,
        /// The key
        key: String,
    },
    /// The input is not valid JSON for the destination
    MalformedInput(Malformed),
    /// The destination cannot be written through
    DestinationNotSettable {
        /// The destination type
        type_name: &'static str,
    },
}

impl Display for JsonErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonErrorKind::UnsupportedType { type_name, reason } => {
                write!(f, "unsupported type {type_name}: {reason}")
            }
            JsonErrorKind::CyclicType { type_name } => {
                write!(f, "cyclic type: {type_name} contains itself")
            }
            JsonErrorKind::DuplicateKey { type_name, key } => {
                write!(f, "duplicate key `{key}` in {type_name}")
            }
            JsonErrorKind::MalformedInput(reason) => write!(f, "malformed input: {reason}"),
            JsonErrorKind::DestinationNotSettable { type_name } => {
                write!(f, "cannot decode into {type_name}")
            }
        }
    }
}

impl JsonErrorKind {
    /// Get an error code for this kind of error.
    pub const fn code(&self) -> &'static str {
        match self {
            JsonErrorKind::UnsupportedType { .. } => "jsonplan::unsupported_type",
            JsonErrorKind::CyclicType { .. } => "jsonplan::cyclic_type",
            JsonErrorKind::DuplicateKey { .. } => "jsonplan::duplicate_key",
            JsonErrorKind::MalformedInput(_) => "jsonplan::malformed_input",
            JsonErrorKind::DestinationNotSettable { .. } => "jsonplan::destination_not_settable",
        }
    }
}

/// Why the input was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// Input ended early
    UnexpectedEof {
        /// What was expected
        expected: &'static str,
    },
    /// A byte that does not fit the grammar at this point
    UnexpectedByte {
        /// The byte found
        got: u8,
        /// What was expected
        expected: &'static str,
    },
    /// `true`, `false` or `null` misspelled
    InvalidLiteral,
    /// Unknown backslash escape
    InvalidEscape,
    /// Bad `\uXXXX` escape or unpaired surrogate
    InvalidUnicodeEscape,
    /// Number syntax error
    InvalidNumber,
    /// Number does not fit the destination
    NumberOutOfRange {
        /// The destination type
        target: &'static str,
    },
    /// String is not UTF-8
    InvalidUtf8,
    /// Byte blob is not standard base64
    InvalidBase64,
    /// Non-whitespace after the root value
    TrailingCharacters,
    /// Arrays and objects nested deeper than [`MAX_DEPTH`]
    DepthLimit,
}

impl Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Malformed::UnexpectedEof { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            Malformed::UnexpectedByte { got, expected } => {
                write!(f, "unexpected {:?}, expected {expected}", char::from(*got))
            }
            Malformed::InvalidLiteral => f.write_str("invalid literal"),
            Malformed::InvalidEscape => f.write_str("invalid escape sequence"),
            Malformed::InvalidUnicodeEscape => f.write_str("invalid unicode escape"),
            Malformed::InvalidNumber => f.write_str("invalid number"),
            Malformed::NumberOutOfRange { target } => write!(f, "number out of range for {target}"),
            Malformed::InvalidUtf8 => f.write_str("invalid UTF-8 sequence"),
            Malformed::InvalidBase64 => f.write_str("invalid base64"),
            Malformed::TrailingCharacters => f.write_str("trailing characters"),
            Malformed::DepthLimit => write!(f, "nesting deeper than {MAX_DEPTH}"),
        }
    }
}

/// Result type for jsonplan operations
pub type Result<T> = core::result::Result<T, JsonError>;

/// Renders at most [`ERROR_WINDOW`] bytes starting at `offset`, never
/// splitting a UTF-8 sequence.
fn window(input: &[u8], offset: usize) -> String {
    let mut start = offset.min(input.len());
    while start > 0 && start < input.len() && (input[start] & 0xC0) == 0x80 {
        start -= 1;
    }
    let mut end = (start + ERROR_WINDOW).min(input.len());
    while end > start && end < input.len() && (input[end] & 0xC0) == 0x80 {
        end -= 1;
    }
    String::from_utf8_lossy(&input[start..end]).into_owned()
}
