use std::path::Path;

use serde::{Serialize, Serializer};

use super::full::FullFingerprinter;
use crate::error::{FingerprintError, Result};
use crate::media::MediaSniffer;

/// Whole-file identity: CRC-32 of every byte plus the detected media type.
///
/// `checksum` is `None` when the file could not be read to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFingerprint {
    #[serde(serialize_with = "serialize_hex")]
    checksum: Option<u64>,
    media_type: Option<String>,
    label: String,
    size_bytes: u64,
}

impl FileFingerprint {
    pub(crate) fn new(
        checksum: Option<u64>,
        media_type: Option<String>,
        label: String,
        size_bytes: u64,
    ) -> Self {
        Self {
            checksum,
            media_type,
            label,
            size_bytes,
        }
    }

    pub fn checksum(&self) -> Option<u64> {
        self.checksum
    }

    /// Lowercase hex rendering of the checksum, without leading zeros.
    pub fn checksum_hex(&self) -> Option<String> {
        self.checksum.map(|c| format!("{c:x}"))
    }

    pub fn is_degraded(&self) -> bool {
        self.checksum.is_none()
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// The logical file name used for media type detection.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// True when both fingerprints carry a checksum and the checksums and
    /// sizes agree. Labels and media types are not compared.
    pub fn same_content(&self, other: &FileFingerprint) -> bool {
        match (self.checksum, other.checksum) {
            (Some(a), Some(b)) => a == b && self.size_bytes == other.size_bytes,
            _ => false,
        }
    }
}

fn serialize_hex<S: Serializer>(checksum: &Option<u64>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match checksum {
        Some(c) => s.serialize_str(&format!("{c:x}")),
        None => s.serialize_none(),
    }
}

/// Field-by-field accumulator for a [`FileFingerprint`].
///
/// Nothing can read a draft as a fingerprint; [`FingerprintDraft::finish`]
/// produces a fresh value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintDraft {
    pub checksum: Option<u64>,
    pub media_type: Option<String>,
    pub label: Option<String>,
    pub size_bytes: Option<u64>,
}

impl FingerprintDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fingerprint(fp: &FileFingerprint) -> Self {
        Self {
            checksum: fp.checksum,
            media_type: fp.media_type.clone(),
            label: Some(fp.label.clone()),
            size_bytes: Some(fp.size_bytes),
        }
    }

    pub fn with_checksum(mut self, checksum: Option<u64>) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_size_bytes(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    /// Re-fingerprint `path` and take its checksum, media type and size.
    /// The label is replaced only when `update_label` is set, so a file can
    /// be re-checksummed under its original title.
    pub fn refresh_from<S: MediaSniffer>(
        mut self,
        path: &Path,
        update_label: bool,
        fingerprinter: &FullFingerprinter<S>,
    ) -> Self {
        let fresh = fingerprinter.fingerprint(path, None);
        self.checksum = fresh.checksum;
        self.media_type = fresh.media_type;
        self.size_bytes = Some(fresh.size_bytes);
        if update_label || self.label.is_none() {
            self.label = Some(fresh.label);
        }
        self
    }

    pub fn finish(self) -> Result<FileFingerprint> {
        let label = self.label.ok_or(FingerprintError::IncompleteDraft("label"))?;
        let size_bytes = self
            .size_bytes
            .ok_or(FingerprintError::IncompleteDraft("size_bytes"))?;
        Ok(FileFingerprint::new(
            self.checksum,
            self.media_type,
            label,
            size_bytes,
        ))
    }
}

/// Approximate identity from sampled windows.
///
/// Weaker than [`FileFingerprint`]: equal values do not prove equal bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SparseChecksum {
    value: u64,
}

impl SparseChecksum {
    /// Failure marker. A CRC-32 never reaches this value.
    pub const UNDETERMINED: SparseChecksum = SparseChecksum { value: u64::MAX };

    pub fn new(value: u64) -> Self {
        Self { value }
    }

    pub fn value(self) -> u64 {
        self.value
    }

    pub fn is_undetermined(self) -> bool {
        self == Self::UNDETERMINED
    }

    /// `None` for [`SparseChecksum::UNDETERMINED`].
    pub fn get(self) -> Option<u64> {
        (!self.is_undetermined()).then_some(self.value)
    }
}

impl Serialize for SparseChecksum {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self.get() {
            Some(v) => s.serialize_str(&format!("{v:x}")),
            None => s.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileFingerprint {
        FileFingerprint::new(Some(0xcbf43926), Some("text/plain".into()), "a.txt".into(), 9)
    }

    #[test]
    fn hex_is_lowercase() {
        assert_eq!(sample().checksum_hex().as_deref(), Some("cbf43926"));
        let degraded = FileFingerprint::new(None, None, "x".into(), 0);
        assert!(degraded.checksum_hex().is_none());
        assert!(degraded.is_degraded());
    }

    #[test]
    fn serializes_checksum_as_hex() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["checksum"], "cbf43926");
        assert_eq!(json["media_type"], "text/plain");
        assert_eq!(json["label"], "a.txt");
        assert_eq!(json["size_bytes"], 9);

        let degraded = FileFingerprint::new(None, None, "x".into(), 0);
        let json = serde_json::to_value(degraded).unwrap();
        assert!(json["checksum"].is_null());
    }

    #[test]
    fn draft_copies_and_overrides() {
        let original = sample();
        let patched = FingerprintDraft::from_fingerprint(&original)
            .with_label("renamed.txt")
            .finish()
            .unwrap();
        assert_eq!(patched.label(), "renamed.txt");
        assert_eq!(patched.checksum(), original.checksum());
        assert_eq!(patched.size_bytes(), 9);
        // the source value is untouched
        assert_eq!(original.label(), "a.txt");
    }

    #[test]
    fn draft_requires_label_and_size() {
        let err = FingerprintDraft::new().with_size_bytes(1).finish().unwrap_err();
        assert!(matches!(err, FingerprintError::IncompleteDraft("label")));
        let err = FingerprintDraft::new().with_label("x").finish().unwrap_err();
        assert!(matches!(err, FingerprintError::IncompleteDraft("size_bytes")));
    }

    #[test]
    fn same_content_ignores_labels_and_sentinels() {
        let a = sample();
        let b = FingerprintDraft::from_fingerprint(&a).with_label("b.txt").finish().unwrap();
        assert!(a.same_content(&b));
        let degraded = FingerprintDraft::from_fingerprint(&a).with_checksum(None).finish().unwrap();
        assert!(!degraded.same_content(&degraded));
    }

    #[test]
    fn undetermined_sparse() {
        assert!(SparseChecksum::UNDETERMINED.is_undetermined());
        assert_eq!(SparseChecksum::UNDETERMINED.value(), u64::MAX);
        assert!(SparseChecksum::UNDETERMINED.get().is_none());
        assert_eq!(SparseChecksum::new(7).get(), Some(7));
        assert_eq!(SparseChecksum::new(7), SparseChecksum::new(7));
        assert_ne!(SparseChecksum::new(7), SparseChecksum::UNDETERMINED);
        assert_eq!(serde_json::to_string(&SparseChecksum::new(255)).unwrap(), "\"ff\"");
        assert_eq!(serde_json::to_string(&SparseChecksum::UNDETERMINED).unwrap(), "null");
    }
}
