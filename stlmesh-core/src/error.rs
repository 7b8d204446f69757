/// Error taxonomy for STL loading
use std::fmt;
use std::io;

/// Why a load attempt failed. Every variant is terminal for that attempt.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be opened or read, or it was empty.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Neither the binary nor the ASCII signature matched.
    #[error("unrecognized STL format: {0}")]
    Format(String),

    /// A binary file is shorter than its header declares.
    #[error("truncated binary STL: header declares {declared} facets ({expected_len} bytes) but only {actual_len} bytes are present")]
    Truncated {
        declared: u32,
        expected_len: u64,
        actual_len: u64,
    },

    /// ASCII grammar violation.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The file parsed but contains no facets.
    #[error("STL file contains no facets")]
    EmptyMesh,

    /// The facet count exceeds the configured limit.
    #[error("STL file declares {declared} facets, limit is {limit}")]
    TooManyFacets { declared: u64, limit: u32 },
}

impl LoadError {
    /// Short category name, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Io(_) => "io",
            LoadError::Format(_) => "format",
            LoadError::Truncated { .. } => "truncated",
            LoadError::Parse(_) => "parse",
            LoadError::EmptyMesh => "empty",
            LoadError::TooManyFacets { .. } => "too_many_facets",
        }
    }
}

/// ASCII STL syntax error with the position of the offending token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ASCII STL parse error on line {line}: expected {expected}, found {found}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub expected: String,
    pub found: Found,
}

/// What the text decoder saw where it expected something else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    Token(String),
    EndOfFile,
    InvalidUtf8,
}

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Found::Token(token) => write!(f, "`{}`", token),
            Found::EndOfFile => f.write_str("end of file"),
            Found::InvalidUtf8 => f.write_str("invalid UTF-8"),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
