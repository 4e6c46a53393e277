use std::fmt;

/// The classified failure modes of a parse.
///
/// `Display` renders the stable snake_case code for each variant so callers
/// can branch on (or log) the exact documented names.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum ErrorType {
    /// The document is larger than the workspace this parser allocated.
    Capacity,
    /// Workspace allocation failed or was requested with zero capacity.
    MemAlloc,
    /// The structural characters do not form a well-nested document.
    TapeError,
    /// Nesting exceeded the configured maximum depth.
    DepthError,
    /// A string could not be decoded.
    StringError,
    /// A scalar starting with `t` was not `true`.
    TAtomError,
    /// A scalar starting with `f` was not `false`.
    FAtomError,
    /// A scalar starting with `n` was not `null`.
    NAtomError,
    /// A scalar starting with a digit or `-` was not a valid JSON number.
    NumberError,
    /// The input is not valid UTF-8.
    Utf8Error,
    /// Stage 2 was invoked without a successful stage 1.
    Uninitialized,
    /// No structural character was found in the input.
    Empty,
    /// A raw control character appeared inside a string.
    UnescapedChars,
    /// The input ended inside a string.
    UnclosedString,
    /// No stage-1 implementation supports this CPU.
    UnsupportedArchitecture,
    /// An object does not contain the requested key.
    NoSuchField,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Capacity => "capacity",
            ErrorType::MemAlloc => "memalloc",
            ErrorType::TapeError => "tape_error",
            ErrorType::DepthError => "depth_error",
            ErrorType::StringError => "string_error",
            ErrorType::TAtomError => "t_atom_error",
            ErrorType::FAtomError => "f_atom_error",
            ErrorType::NAtomError => "n_atom_error",
            ErrorType::NumberError => "number_error",
            ErrorType::Utf8Error => "utf8_error",
            ErrorType::Uninitialized => "uninitialized",
            ErrorType::Empty => "empty",
            ErrorType::UnescapedChars => "unescaped_chars",
            ErrorType::UnclosedString => "unclosed_string",
            ErrorType::UnsupportedArchitecture => "unsupported_architecture",
            ErrorType::NoSuchField => "no_such_field",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parse failure, carrying the byte offset and character it was
/// classified at when that position is known.
#[derive(Debug, PartialEq, Clone)]
pub struct Error {
    index: usize,
    character: char,
    error: ErrorType,
}

impl Error {
    pub(crate) fn new_c(index: usize, character: char, error: ErrorType) -> Self {
        Self {
            index,
            character,
            error,
        }
    }

    pub(crate) fn generic(error: ErrorType) -> Self {
        Self {
            index: 0,
            character: '\u{0}',
            error,
        }
    }

    /// The classified error code.
    pub fn error_type(&self) -> ErrorType {
        self.error
    }

    /// Byte offset into the input the error was classified at.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.character == '\u{0}' {
            write!(f, "{}", self.error)
        } else {
            write!(
                f,
                "{} at character {} ('{}')",
                self.error, self.index, self.character
            )
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
