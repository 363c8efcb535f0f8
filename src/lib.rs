//! Compact identity fingerprints for files.
//!
//! A [`FileFingerprint`] pairs a CRC-32 of the whole file with its media
//! type. A [`SparseChecksum`] samples at most a fixed number of windows, so
//! it costs the same for a 10 GiB file as for a 10 MiB one; it is a hint for
//! telling files apart quickly, never proof that two files are equal.
//!
//! Both operations are best-effort: they return a value carrying a sentinel
//! (no checksum, or [`SparseChecksum::UNDETERMINED`]) instead of an error.
//! Use the `try_` variants to see why a computation failed.

pub mod checksum;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod media;
pub mod scan;

pub use error::FingerprintError;
pub use fingerprint::{
    FileFingerprint, FingerprintDraft, FullFingerprinter, SamplingParams, SparseChecksum,
    compute_full_fingerprint, compute_sparse_fingerprint, detect_media_type,
};
