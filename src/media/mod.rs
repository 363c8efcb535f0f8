pub mod magic;

use std::io;
use std::path::Path;

use thiserror::Error;

pub use magic::MagicSniffer;

#[derive(Debug, Error)]
pub enum SniffError {
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("sniffer failed: {0}")]
    Other(String),
}

pub type SniffResult = Result<Option<String>, SniffError>;

/// Content-based media type detection.
///
/// Either method may fail; callers treat a failure as "type unknown".
pub trait MediaSniffer {
    /// Cheap guess from the leading bytes of a file and its label.
    /// `head` is `None` when the caller has not read anything.
    fn peek(&self, head: Option<&[u8]>, label: &str) -> SniffResult;

    /// Expensive guess that opens and inspects the file itself.
    fn detect_file(&self, path: &Path) -> SniffResult;
}

impl<S: MediaSniffer + ?Sized> MediaSniffer for &S {
    fn peek(&self, head: Option<&[u8]>, label: &str) -> SniffResult {
        (**self).peek(head, label)
    }

    fn detect_file(&self, path: &Path) -> SniffResult {
        (**self).detect_file(path)
    }
}

/// Look up a media type from the label's extension alone. No I/O.
pub fn lookup_by_label(label: &str) -> Option<String> {
    mime_guess::from_path(label).first_raw().map(str::to_string)
}
