//! Error definitions for the acquisition library.
//!
//! The wire layers (XDR, RPC, VXI-11) report plain `std::io::Error`s;
//! everything above them uses this `Error`, which wraps those.

use std::io;
use thiserror::Error;

/// The Error type for instrument sessions and acquisitions
#[derive(Error, Debug)]
pub enum Error {
    /// A transport-level I/O error
    #[error("{0}")]
    Io(#[from] io::Error),
    /// The INI file couldn't be read or parsed
    #[error("{0}")]
    Ini(#[from] ini::Error),
    /// A missing or malformed configuration value
    #[error("Configuration error: {0}")]
    Config(String),
    /// A VISA resource string we can't open
    #[error("Unsupported VISA resource: {0}")]
    UnsupportedResource(String),
    /// The waveform preamble didn't have the expected shape
    #[error("Malformed waveform preamble: {0}")]
    Preamble(String),
    /// A malformed IEEE 488.2 binary block
    #[error("Malformed binary block: {0}")]
    Block(String),
    /// A query response that couldn't be interpreted
    #[error("Unable to parse response {0:?}")]
    Parse(String),
    /// The transferred buffer doesn't divide into the configured segments
    #[error("Cannot split {len} samples into {count} equal segments")]
    SegmentSplit { len: usize, count: usize },
    /// The connected instrument doesn't speak the expected dialect
    #[error("Connected to {0:?}, which is not a Keysight/Agilent instrument")]
    UnexpectedModel(String),
}

/// The default result type for the library
pub type Result<T> = std::result::Result<T, Error>;
