//! Error types for YAML parsing with source locations.

use crate::SourceInfo;
use std::fmt;
use thiserror::Error;

/// Result type alias for harpoon-yaml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of the YAML pipeline rejected the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The tokenizer could not make sense of the characters
    /// (bad indentation indicators, illegal characters, unterminated quotes).
    Scanner,

    /// The token stream was valid but did not form a YAML structure
    /// (unclosed flow collections, missing keys, unsupported aliases).
    Parser,
}

impl ErrorKind {
    /// Stable, machine-readable name of this error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Scanner => "ScannerError",
            ErrorKind::Parser => "ParserError",
        }
    }

    /// Classify a yaml-rust2 diagnostic.
    ///
    /// yaml-rust2 reports tokenizer and grammar failures through the same
    /// `ScanError` type, so the stage is recovered from the message. Grammar
    /// errors are raised by the event parser, whose messages all start with
    /// one of the prefixes below.
    pub fn classify(info: &str) -> Self {
        const PARSER_PREFIXES: &[&str] = &[
            "while parsing",
            "did not find expected <document start>",
            "did not find expected node content",
            "unexpected eof",
            "unknown anchor",
            "aliases are not supported",
        ];
        if info.starts_with("while scanning") {
            return ErrorKind::Scanner;
        }
        if PARSER_PREFIXES.iter().any(|prefix| info.starts_with(prefix)) {
            ErrorKind::Parser
        } else {
            ErrorKind::Scanner
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during YAML parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// YAML syntax error
    #[error("{kind}: {message}")]
    Syntax {
        kind: ErrorKind,
        /// The underlying diagnostic without position
        message: String,
        location: SourceInfo,
    },

    /// Well-formed YAML that cannot be used as configuration
    #[error("Invalid YAML structure: {message}")]
    InvalidStructure {
        message: String,
        location: SourceInfo,
    },
}

impl Error {
    /// Location the error points at.
    pub fn location(&self) -> &SourceInfo {
        match self {
            Error::Syntax { location, .. } | Error::InvalidStructure { location, .. } => location,
        }
    }

    /// Stage that rejected the document. Structural problems count as
    /// grammar failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Syntax { kind, .. } => *kind,
            Error::InvalidStructure { .. } => ErrorKind::Parser,
        }
    }

    /// The diagnostic without position information.
    pub fn message(&self) -> &str {
        match self {
            Error::Syntax { message, .. } | Error::InvalidStructure { message, .. } => message,
        }
    }

    pub(crate) fn from_scan(err: &yaml_rust2::ScanError, filename: Option<&str>) -> Self {
        let mut location = SourceInfo::from_marker(err.marker());
        if let Some(filename) = filename {
            location = location.with_file(filename);
        }
        Error::Syntax {
            kind: ErrorKind::classify(err.info()),
            message: err.info().to_string(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_scanner_messages() {
        assert_eq!(
            ErrorKind::classify(
                "while scanning a block scalar, did not find expected comment or line break"
            ),
            ErrorKind::Scanner
        );
        assert_eq!(
            ErrorKind::classify("mapping values are not allowed in this context"),
            ErrorKind::Scanner
        );
        assert_eq!(
            ErrorKind::classify("found character that cannot start any token"),
            ErrorKind::Scanner
        );
    }

    #[test]
    fn test_classify_parser_messages() {
        assert_eq!(
            ErrorKind::classify("while parsing a flow mapping, did not find expected ',' or '}'"),
            ErrorKind::Parser
        );
        assert_eq!(
            ErrorKind::classify("did not find expected node content"),
            ErrorKind::Parser
        );
    }

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(ErrorKind::Scanner.to_string(), "ScannerError");
        assert_eq!(ErrorKind::Parser.to_string(), "ParserError");
    }
}
