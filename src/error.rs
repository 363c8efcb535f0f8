use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures inside the fingerprint computations.
///
/// The best-effort entry points never hand these to callers; they map them
/// to sentinel results. The `try_` variants return them unchanged.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("opening {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reading at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// A sampled window did not hold the number of bytes the file length
    /// promised, usually because the file was truncated (or grew) while
    /// being sampled.
    #[error("inconsistent read at offset {offset}: expected {expected} bytes, got {actual}")]
    UnexpectedRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("invalid sampling params: {0}")]
    InvalidParams(&'static str),

    #[error("incomplete fingerprint draft: missing {0}")]
    IncompleteDraft(&'static str),
}

impl FingerprintError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn read(offset: u64, source: io::Error) -> Self {
        Self::Read { offset, source }
    }
}

pub type Result<T> = std::result::Result<T, FingerprintError>;
