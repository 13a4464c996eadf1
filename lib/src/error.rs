use std::{io, path::PathBuf, result};

use thiserror::Error;

use crate::format::FormatError;

/// A type alias for `Result<T, imc_layers::ImcError>`.
pub type Result<T> = result::Result<T, ImcError>;

/// Describes what has gone wrong when opening a file or changing what is shown on the canvas
#[derive(Error, Debug)]
pub enum ImcError {
    /// None of the registered readers accepts and decodes the file
    #[error("No registered reader can open {path:?}")]
    UnsupportedFormat {
        /// The file that was opened
        path: PathBuf,
        /// The last decode failure, if any reader accepted the file
        #[source]
        cause: Option<Box<ImcError>>,
    },

    /// A reader accepted the file, but then failed to decode its metadata
    #[error("The {format} reader failed to decode {path:?}: {source}")]
    Decode {
        /// Name of the reader that accepted the file
        format: &'static str,
        /// The file that was opened
        path: PathBuf,
        /// The original error that was raised.
        #[source]
        source: FormatError,
    },

    /// Reading panorama or channel pixel data failed. Nothing was changed.
    #[error("Failed to read {target}: {source}")]
    Read {
        /// Description of what was being read
        target: String,
        /// The original error that was raised.
        #[source]
        source: FormatError,
    },

    /// The referenced file has been closed
    #[error("The referenced file has been closed")]
    StaleReference,

    /// No entity exists which matches the supplied key or label
    #[error("No such {0}")]
    UnknownEntity(String),

    /// A style property was given a value outside of its valid range
    #[error("Invalid value for {property}: {reason}")]
    InvalidProperty {
        /// Name of the property
        property: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// An I/O error occurred
    #[error("An I/O error occured")]
    Io {
        #[from]
        /// The original error that was raised.
        source: io::Error,
    },

    /// The configuration file could not be parsed
    #[error("Failed to parse configuration: {source}")]
    Config {
        #[from]
        /// The original error that was raised.
        source: serde_json::Error,
    },
}

impl ImcError {
    /// Returns true for errors which mean the referenced file was closed in the meantime
    pub fn is_stale(&self) -> bool {
        matches!(self, ImcError::StaleReference)
    }
}
