//! Error taxonomy for notice conversion.
//!
//! Two tiers: `ConvertError` is fatal for the notice being converted (nothing
//! can run without a parsed tree), `Warning` covers everything recovered
//! locally by the assembler or the dispatch loop.

use std::fmt;

/// Fatal conversion error. Aborts the conversion of one notice.
#[derive(Debug)]
pub enum ConvertError {
    /// Input bytes are not valid UTF-8.
    Utf8(std::str::Utf8Error),
    /// The document could not be parsed as XML.
    Xml(roxmltree::Error),
    /// File I/O failure (CLI and config loading).
    Io(std::io::Error),
    /// Invalid forms table, merge schema, or registry wiring.
    Config(String),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Utf8(e) => write!(f, "input is not valid UTF-8: {}", e),
            ConvertError::Xml(e) => write!(f, "unparsable XML: {}", e),
            ConvertError::Io(e) => write!(f, "I/O error: {}", e),
            ConvertError::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::Utf8(e) => Some(e),
            ConvertError::Xml(e) => Some(e),
            ConvertError::Io(e) => Some(e),
            ConvertError::Config(_) => None,
        }
    }
}

impl From<std::str::Utf8Error> for ConvertError {
    fn from(err: std::str::Utf8Error) -> Self {
        ConvertError::Utf8(err)
    }
}

impl From<roxmltree::Error> for ConvertError {
    fn from(err: roxmltree::Error) -> Self {
        ConvertError::Xml(err)
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Io(err)
    }
}

/// Recoverable condition surfaced alongside a best-effort release.
///
/// Warnings never abort a conversion; the CLI reports them per notice.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A record in an identity-keyed collection was skipped.
    MalformedRecord {
        /// Collection path, e.g. `tender.lots`.
        collection: String,
        reason: String,
    },
    /// An extractor returned an error; its contribution is missing.
    ExtractorFailed {
        extractor: String,
        message: String,
    },
    /// The detector could not determine a form family.
    Unclassified,
    /// A merge was attempted against a frozen release and ignored.
    FrozenRelease,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MalformedRecord { collection, reason } => {
                write!(f, "skipped record in '{}': {}", collection, reason)
            }
            Warning::ExtractorFailed { extractor, message } => {
                write!(f, "extractor '{}' failed: {}", extractor, message)
            }
            Warning::Unclassified => {
                write!(f, "document form family could not be determined")
            }
            Warning::FrozenRelease => {
                write!(f, "merge into frozen release ignored")
            }
        }
    }
}
