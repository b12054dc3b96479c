//! Error types for C3D operations.
//!
//! This module defines the [`Error`] enum which represents all fatal failures
//! that can occur when reading or writing C3D files, and the [`Warning`] enum
//! for conditions that are reported but do not stop processing.
//!
//! # Example
//!
//! ```no_run
//! use c3d_rs::{Error, Reader, Result};
//! use std::fs::File;
//!
//! fn open(path: &str) -> Result<()> {
//!     match Reader::new(File::open(path)?) {
//!         Ok(reader) => {
//!             println!("{} points per frame", reader.point_used()?);
//!             Ok(())
//!         }
//!         Err(Error::InvalidMagic(magic)) => {
//!             eprintln!("Not a C3D file (magic byte {magic})");
//!             Err(Error::InvalidMagic(magic))
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use core::fmt;

/// Errors that can occur during C3D file operations.
///
/// Format errors (`TooShortBuffer`, `InvalidMagic`, `UnsupportedProcessor`,
/// `MalformedRecord`) and consistency errors (`InconsistentMetadata`) abort a
/// decode before any partially built metadata is returned.
#[derive(Debug)]
pub enum Error {
    /// Buffer provided for parsing was too small.
    ///
    /// This typically indicates file corruption or an incomplete read.
    TooShortBuffer {
        /// Actual number of bytes available
        actual: usize,
        /// Minimum number of bytes required
        expected: usize,
        /// Source file where the error was detected
        file: &'static str,
        /// Line number where the error was detected
        line: u32,
    },

    /// The second header byte is not the C3D magic value 80.
    InvalidMagic(u8),

    /// The parameter section was written by an unsupported processor type.
    ///
    /// Only Intel (little-endian, tag 84) files are supported.
    UnsupportedProcessor(u8),

    /// A parameter directory record is structurally invalid, e.g. its declared
    /// size runs past the end of the parameter section.
    MalformedRecord(String),

    /// The header disagrees with the parameter directory.
    InconsistentMetadata {
        /// Header field that was compared
        field: &'static str,
        /// Value found in the header
        header: String,
        /// Value found in the parameter directory
        parameter: String,
    },

    /// A typed accessor was used on a parameter whose shape or contents do not
    /// fit the requested interpretation.
    ValueAccess {
        /// Name of the parameter
        name: String,
        /// Why the access failed
        reason: String,
    },

    /// A parameter could not be constructed from the supplied fields.
    InvalidParameter(String),

    /// A required parameter (e.g. `POINT:RATE`) is not present.
    MissingParameter(String),

    /// A group id or name is already registered in the directory.
    DuplicateGroup(String),

    /// Frame data handed to the writer does not match the file layout.
    InvalidFrame(String),

    /// Failed to serialize a record to bytes.
    BlockSerializationError(String),

    /// An I/O error occurred while reading or writing the stream.
    IOError(std::io::Error),
}

impl Error {
    /// Returns `true` for errors caused by bytes that are not a valid C3D file.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::TooShortBuffer { .. }
                | Error::InvalidMagic(_)
                | Error::UnsupportedProcessor(_)
                | Error::MalformedRecord(_)
        )
    }

    /// Returns `true` for header/parameter cross-check failures.
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, Error::InconsistentMetadata { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooShortBuffer {
                actual,
                expected,
                file,
                line,
            } => write!(
                f,
                "Buffer too small at {file}:{line}: need at least {expected} bytes, got {actual}"
            ),
            Error::InvalidMagic(magic) => {
                write!(f, "Invalid C3D magic byte: expected 80, found {magic}")
            }
            Error::UnsupportedProcessor(tag) => {
                write!(f, "Unsupported processor type {tag}: only Intel (84) is supported")
            }
            Error::MalformedRecord(s) => write!(f, "Malformed parameter record: {s}"),
            Error::InconsistentMetadata {
                field,
                header,
                parameter,
            } => write!(
                f,
                "Inconsistent {field}: header has {header}, parameters have {parameter}"
            ),
            Error::ValueAccess { name, reason } => {
                write!(f, "Cannot access parameter {name}: {reason}")
            }
            Error::InvalidParameter(s) => write!(f, "Invalid parameter: {s}"),
            Error::MissingParameter(key) => write!(f, "Missing parameter {key}"),
            Error::DuplicateGroup(key) => write!(f, "Duplicate parameter group {key}"),
            Error::InvalidFrame(s) => write!(f, "Invalid frame: {s}"),
            Error::BlockSerializationError(s) => write!(f, "Block serialization error: {s}"),
            Error::IOError(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IOError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IOError(err)
    }
}

/// A specialized Result type for C3D operations.
///
/// This is defined as `core::result::Result<T, Error>` for convenience.
pub type Result<T> = core::result::Result<T, Error>;

/// Non-fatal conditions found while decoding or validating metadata.
///
/// Warnings are logged through the `log` facade and also handed back to the
/// caller, so they can be inspected without installing a logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An optional parameter such as `POINT:LABELS` is absent.
    MissingParameter(&'static str),
    /// Parameters referenced a group id whose group record never appeared.
    UnnamedGroup(u8),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingParameter(key) => write!(f, "missing parameter {key}"),
            Warning::UnnamedGroup(id) => {
                write!(f, "group {id} has parameters but no group record")
            }
        }
    }
}
