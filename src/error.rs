//! Error kinds produced while parsing or evaluating a document.
//!
//! Mirrors the shape of a typical lossless-parser error type: a small enum,
//! `Display`/`std::error::Error` impls, and `From` conversions for the
//! external failure modes (`std::io::Error`).

use std::fmt;

/// A single error raised by parsing or evaluating a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed expression: unknown operator, wrong arity, unknown escape,
    /// zero `from_range` in `map`, bad colour mode, and so on.
    ParseError(String),
    /// An `AddressRef` could not resolve its path and had no fallback.
    KeyNotFound(String),
    /// `Wrapper::add` tried to install a non-wrapper node over an existing one.
    DuplicateKey(String),
    /// A `clone` merge hit a non-wrapper conflict.
    MergeConflict(String),
    /// Evaluation re-entered a slot that is already being evaluated.
    Cycle(String),
    /// A typed accessor (`get_int`/`get_float`) was invoked on a node that
    /// cannot produce that type.
    TypeMismatch(String),
    /// An `Env`/`Cmd`/`File` operation failed.
    ExternalFailure(String),
    /// `ArrCache` was indexed past the end of its cached sequence.
    IndexOutOfRange(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(msg) => write!(f, "parse error: {msg}"),
            Error::KeyNotFound(msg) => write!(f, "key not found: {msg}"),
            Error::DuplicateKey(msg) => write!(f, "duplicate key: {msg}"),
            Error::MergeConflict(msg) => write!(f, "merge conflict: {msg}"),
            Error::Cycle(msg) => write!(f, "reference cycle: {msg}"),
            Error::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            Error::ExternalFailure(msg) => write!(f, "external failure: {msg}"),
            Error::IndexOutOfRange(msg) => write!(f, "index out of range: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ExternalFailure(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An accumulated `(location, message)` pair, as produced by parsing a whole
/// document: the offending key is omitted but parsing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// `section.key` (or `line N`) the error was attributed to.
    pub location: String,
    /// The underlying error.
    pub error: Error,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}

/// An error list threaded through document-level parsing and cloning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, location: impl Into<String>, error: Error) {
        self.0.push(Diagnostic {
            location: location.into(),
            error,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }
}
