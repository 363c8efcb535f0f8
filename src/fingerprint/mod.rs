//! File identity fingerprints.
//!
//! [`full`] reads a file once for a CRC-32 of every byte and a media type;
//! [`sparse`] samples a bounded number of windows for a cheaper, weaker
//! identity that does not grow with file size.

pub mod full;
pub mod record;
pub mod sparse;

pub use full::{FullFailure, FullFingerprinter, compute_full_fingerprint, detect_media_type};
pub use record::{FileFingerprint, FingerprintDraft, SparseChecksum};
pub use sparse::{
    SPARSE_REVISION, SamplingParams, compute_sparse_fingerprint, sampling_plan,
    try_compute_sparse_fingerprint,
};
