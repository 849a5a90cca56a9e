// Crate-wide error type.
//
// Every failure names the phase it happened in, so a rejected parameter at
// construction reads differently from a corrupt frame mid-stream. The stream
// types implement `std::io::{Read, Write}`, so this error also travels inside
// `std::io::Error`; `From<io::Error>` unwraps it back out again.

use std::fmt;
use std::io;

use crate::codec::CodecError;

/// The stage of a running stream in which a codec call failed.
///
/// Construction failures have their own variants ([`Error::Allocation`],
/// [`Error::Configuration`]) and need no phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compress,
    Decompress,
    Flush,
    Finish,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compress => "compress",
            Self::Decompress => "decompress",
            Self::Flush => "flush",
            Self::Finish => "finish",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A codec context (or a one-shot output buffer) could not be allocated.
    #[error("construction: failed to allocate {what}")]
    Allocation { what: &'static str },

    /// The codec rejected a required parameter.
    #[error("parameter: codec rejected {param}={value}: {message}")]
    Configuration {
        param: &'static str,
        value: i64,
        message: String,
    },

    /// A chunk call failed (corrupt input, truncated frame, size mismatch).
    #[error("{phase}: {message}")]
    Codec { phase: Phase, message: String },

    /// The stream already failed once and can no longer be used.
    #[error("stream is unusable after an earlier failure")]
    Poisoned,

    /// The stream has been closed.
    #[error("stream is closed")]
    Closed,

    /// An argument was rejected before any codec call.
    #[error("invalid argument: {0}")]
    Usage(String),

    /// One-shot decompression of a frame that does not declare its size.
    #[error("frame does not declare its decompressed size")]
    UnknownContentSize,

    #[error("I/O error: {0}")]
    Io(io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn codec(phase: Phase, err: CodecError) -> Self {
        Self::Codec {
            phase,
            message: err.description().to_string(),
        }
    }

    pub(crate) fn truncated(phase: Phase) -> Self {
        Self::Codec {
            phase,
            message: "truncated frame: input ended before the frame was complete".into(),
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::Allocation { .. } => io::ErrorKind::OutOfMemory,
            Self::Configuration { .. } | Self::Usage(_) => io::ErrorKind::InvalidInput,
            Self::Codec { .. } | Self::UnknownContentSize => io::ErrorKind::InvalidData,
            Self::Poisoned | Self::Closed => io::ErrorKind::Other,
            Self::Io(e) => e.kind(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Self::Io(e);
        }
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(inner)) => Self::Io(io::Error::new(kind, inner)),
            None => Self::Io(io::Error::from(kind)),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_roundtrip_preserves_variant() {
        let err = Error::Codec {
            phase: Phase::Decompress,
            message: "Data corruption detected".into(),
        };
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        match Error::from(io_err) {
            Error::Codec { phase, message } => {
                assert_eq!(phase, Phase::Decompress);
                assert_eq!(message, "Data corruption detected");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn plain_io_error_stays_io() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));

        let back: io::Error = err.into();
        assert_eq!(back.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn display_names_phase() {
        let err = Error::Codec {
            phase: Phase::Finish,
            message: "Src size is incorrect".into(),
        };
        assert_eq!(err.to_string(), "finish: Src size is incorrect");
        assert_eq!(
            Error::Allocation {
                what: "compression context"
            }
            .to_string(),
            "construction: failed to allocate compression context"
        );
        assert_eq!(
            Error::Configuration {
                param: "level",
                value: 1000,
                message: "level out of range".into(),
            }
            .to_string(),
            "parameter: codec rejected level=1000: level out of range"
        );
    }
}
