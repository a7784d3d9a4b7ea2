//! Error types used throughout the annotation pipeline.

use thiserror::Error;

/// Errors raised while loading the vocabulary or parsing input.
///
/// I/O failures are propagated as `std::io::Error` and lookup failures as
/// [`TransportError`].
#[derive(Debug, Error)]
pub enum Error {
    /// Severity vocabulary could not be read or contains an invalid term.
    #[error("configuration error: {0}")]
    Config(String),
    /// A VCF data line is malformed.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Failure of a single remote lookup.
///
/// Never fatal for the pipeline; the affected column is filled with the
/// sentinel instead.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("request to {url} returned HTTP status {status}")]
    Status { url: String, status: u16 },
}
