//! Error types for the actionable callback.
//!
//! Rendering itself has no failure mode: handlers consume whatever the
//! runtime hands them and fall back on best-effort extraction when a payload
//! field is missing. The only fallible surface of this crate is loading the
//! display options, so the error taxonomy is small.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for actionable operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for the actionable callback.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Options Errors
    // ========================================================================
    /// Failed to read an options file from disk.
    #[error("Failed to read options file '{}'", path.display())]
    OptionsRead {
        /// Path to the options file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse an options file.
    #[error("Failed to parse options file '{}': {reason}", path.display())]
    OptionsParse {
        /// Path to the options file
        path: PathBuf,
        /// Parser error message
        reason: String,
    },

    /// An option was given a value it cannot hold.
    #[error("Invalid value '{value}' for option '{option}'")]
    InvalidOption {
        /// Name of the option
        option: String,
        /// The rejected value
        value: String,
    },
}
