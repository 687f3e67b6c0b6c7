//! Error types for wirescan.
//!
//! Parsing anomalies inside a single header are never errors: a decoder that
//! cannot make sense of its bytes leaves the header length at zero and the
//! scan degrades to payload. Only capacity violations and invalid caller
//! arguments surface through [`enum@ScanError`].

use thiserror::Error;

/// Errors surfaced to the caller of a scan.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The declared on-wire length is smaller than the captured buffer.
    #[error("wire length {wire_len} is less than captured length {cap_len}")]
    WireLengthTooSmall { wire_len: u32, cap_len: u32 },

    /// The packet produced more headers than the configured maximum.
    ///
    /// This is a hard error rather than a silent cut: dropping trailing
    /// headers would corrupt the flow key and header-presence queries.
    #[error("packet produced more than {max} header entries")]
    TooManyHeaders { max: usize },

    /// The combined packet record exceeds the sanity ceiling.
    #[error("packet record size {bytes} exceeds ceiling {ceiling}")]
    RecordTooLarge { bytes: usize, ceiling: usize },

    /// Invalid scanner configuration.
    #[error("invalid scanner configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}

/// Result type alias using [`enum@ScanError`].
pub type Result<T> = std::result::Result<T, ScanError>;
