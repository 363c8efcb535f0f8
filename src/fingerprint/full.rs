use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use super::record::FileFingerprint;
use crate::checksum::{Crc32, RollingChecksum};
use crate::error::FingerprintError;
use crate::media::{self, MagicSniffer, MediaSniffer};

/// Sequential read chunk. Large enough to amortize syscalls, small enough
/// to bound memory per call.
pub const DEFAULT_BUFFER_CAP: usize = 512 * 1024;

/// A full fingerprint that could not checksum the file.
#[derive(Debug, Error)]
#[error("fingerprinting {}: {error}", .fallback.label())]
pub struct FullFailure {
    #[source]
    pub error: FingerprintError,
    /// Checksum-less fingerprint with whatever media type was found.
    pub fallback: FileFingerprint,
}

/// Single-pass checksum plus media type detection.
#[derive(Debug, Clone)]
pub struct FullFingerprinter<S = MagicSniffer> {
    buffer_cap: usize,
    sniffer: S,
}

impl FullFingerprinter<MagicSniffer> {
    pub fn new() -> Self {
        Self::with_sniffer(MagicSniffer::new())
    }
}

impl Default for FullFingerprinter<MagicSniffer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MediaSniffer> FullFingerprinter<S> {
    pub fn with_sniffer(sniffer: S) -> Self {
        Self {
            buffer_cap: DEFAULT_BUFFER_CAP,
            sniffer,
        }
    }

    /// Upper bound on the read buffer. Zero is treated as one byte.
    pub fn buffer_cap(mut self, cap: usize) -> Self {
        self.buffer_cap = cap.max(1);
        self
    }

    pub fn sniffer(&self) -> &S {
        &self.sniffer
    }

    /// Best-effort fingerprint: read failures are logged and surface as a
    /// fingerprint without a checksum.
    pub fn fingerprint(&self, path: &Path, label: Option<&str>) -> FileFingerprint {
        match self.try_fingerprint(path, label) {
            Ok(fp) => fp,
            Err(failure) => {
                warn!(path = %path.display(), error = %failure.error, "full fingerprint degraded");
                failure.fallback
            }
        }
    }

    pub fn try_fingerprint(
        &self,
        path: &Path,
        label: Option<&str>,
    ) -> Result<FileFingerprint, FullFailure> {
        let label = resolve_label(path, label);
        let mut media_type = media::lookup_by_label(&label);
        let mut size_bytes = 0;

        match self.checksum_file(path, &label, &mut media_type, &mut size_bytes) {
            Ok(checksum) => {
                if media_type.is_none() {
                    media_type = self.detect_whole(path);
                }
                Ok(FileFingerprint::new(Some(checksum), media_type, label, size_bytes))
            }
            Err(error) => {
                if size_bytes == 0 {
                    size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                }
                Err(FullFailure {
                    error,
                    fallback: FileFingerprint::new(None, media_type, label, size_bytes),
                })
            }
        }
    }

    /// Media type only: extension table, a content-free peek, then the
    /// whole-file sniffer. Never reads the file for a checksum.
    pub fn detect_media_type(&self, path: &Path, label: Option<&str>) -> Option<String> {
        let label = resolve_label(path, label);
        if let Some(found) = media::lookup_by_label(&label) {
            return Some(found);
        }
        if let Some(found) = self.peek(None, &label) {
            return Some(found);
        }
        match self.sniffer.detect_file(path) {
            Ok(found) => found,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "media type detection failed");
                None
            }
        }
    }

    fn checksum_file(
        &self,
        path: &Path,
        label: &str,
        media_type: &mut Option<String>,
        size_bytes: &mut u64,
    ) -> Result<u64, FingerprintError> {
        let mut file = File::open(path).map_err(|e| FingerprintError::open(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| FingerprintError::read(0, e))?
            .len();
        *size_bytes = size;

        // At least one byte, so an empty file still reads through to EOF.
        let cap = (self.buffer_cap as u64).min(size).max(1) as usize;
        let mut buf = vec![0u8; cap];
        let mut checksum = Crc32::new();
        let mut offset = 0u64;

        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(FingerprintError::read(offset, e)),
            };
            checksum.update(&buf[..n]);
            if offset == 0 && media_type.is_none() {
                *media_type = self.peek(Some(&buf[..n]), label);
            }
            offset += n as u64;
        }

        Ok(checksum.value())
    }

    fn peek(&self, head: Option<&[u8]>, label: &str) -> Option<String> {
        match self.sniffer.peek(head, label) {
            Ok(found) => found,
            Err(e) => {
                debug!(label, error = %e, "media type peek failed");
                None
            }
        }
    }

    fn detect_whole(&self, path: &Path) -> Option<String> {
        debug!(path = %path.display(), "falling back to whole-file media detection");
        match self.sniffer.detect_file(path) {
            Ok(found) => found,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "media type detection failed");
                None
            }
        }
    }
}

fn resolve_label(path: &Path, label: Option<&str>) -> String {
    match label {
        Some(l) => l.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    }
}

/// [`FullFingerprinter::fingerprint`] with the default buffer and sniffer.
pub fn compute_full_fingerprint(path: &Path, label: Option<&str>) -> FileFingerprint {
    FullFingerprinter::new().fingerprint(path, label)
}

/// [`FullFingerprinter::detect_media_type`] with the default sniffer.
pub fn detect_media_type(path: &Path, label: Option<&str>) -> Option<String> {
    FullFingerprinter::new().detect_media_type(path, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::crc32_of;
    use crate::media::{SniffError, SniffResult};
    use std::cell::{Cell, RefCell};

    /// Delegates to `MagicSniffer` and records every call.
    #[derive(Default)]
    struct Recording {
        peeks: RefCell<Vec<Option<usize>>>,
        full_calls: Cell<usize>,
        fail: bool,
    }

    impl Recording {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    impl MediaSniffer for Recording {
        fn peek(&self, head: Option<&[u8]>, label: &str) -> SniffResult {
            self.peeks.borrow_mut().push(head.map(<[u8]>::len));
            if self.fail {
                return Err(SniffError::Other("peek refused".into()));
            }
            MagicSniffer.peek(head, label)
        }

        fn detect_file(&self, path: &Path) -> SniffResult {
            self.full_calls.set(self.full_calls.get() + 1);
            if self.fail {
                return Err(SniffError::Other("detect refused".into()));
            }
            MagicSniffer.detect_file(path)
        }
    }

    fn write(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    #[test]
    fn size_and_checksum_cover_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = patterned(1_500_000);
        let path = write(&dir, "big.bin", &data);

        let fp = compute_full_fingerprint(&path, None);
        assert_eq!(fp.size_bytes(), data.len() as u64);
        assert_eq!(fp.checksum(), Some(crc32_of(&data)));
        assert_eq!(fp.label(), "big.bin");
    }

    #[test]
    fn small_buffer_still_checksums_every_chunk_once() {
        let dir = tempfile::tempdir().unwrap();
        let data = patterned(10_007);
        let path = write(&dir, "odd.bin", &data);

        let fp = FullFingerprinter::new().buffer_cap(7).fingerprint(&path, None);
        assert_eq!(fp.checksum(), Some(crc32_of(&data)));
    }

    #[test]
    fn identical_content_same_checksum_regardless_of_name() {
        let dir = tempfile::tempdir().unwrap();
        let data = patterned(4096);
        let a = write(&dir, "a.png", &data);
        let b = write(&dir, "b.txt", &data);

        let fa = compute_full_fingerprint(&a, None);
        let fb = compute_full_fingerprint(&b, None);
        assert_eq!(fa.checksum(), fb.checksum());
        assert_ne!(fa.media_type(), fb.media_type());
        assert!(fa.same_content(&fb));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "same.dat", &patterned(70_000));
        let first = compute_full_fingerprint(&path, Some("title"));
        let second = compute_full_fingerprint(&path, Some("title"));
        assert_eq!(first, second);
    }

    #[test]
    fn empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "empty.zzq", b"");
        let sniffer = Recording::default();

        let fp = FullFingerprinter::with_sniffer(&sniffer).fingerprint(&path, None);
        assert_eq!(fp.checksum(), Some(0));
        assert_eq!(fp.size_bytes(), 0);
        // nothing was read, so there was nothing to peek at
        assert!(sniffer.peeks.borrow().is_empty());
        assert_eq!(sniffer.full_calls.get(), 1);
        assert_eq!(fp.media_type(), Some("application/octet-stream"));
    }

    #[test]
    fn text_without_table_entry_uses_peek_not_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let text = "lorem ipsum dolor sit amet\n".repeat(38);
        let path = write(&dir, "note.zzq", &text.as_bytes()[..1024]);
        let sniffer = Recording::default();

        let fp = FullFingerprinter::with_sniffer(&sniffer).fingerprint(&path, None);
        assert_eq!(fp.media_type(), Some("text/plain"));
        assert_eq!(*sniffer.peeks.borrow(), vec![Some(1024)]);
        assert_eq!(sniffer.full_calls.get(), 0);
    }

    #[test]
    fn extension_table_skips_sniffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "note.txt", b"hello");
        let sniffer = Recording::default();

        let fp = FullFingerprinter::with_sniffer(&sniffer).fingerprint(&path, None);
        assert_eq!(fp.media_type(), Some("text/plain"));
        assert!(sniffer.peeks.borrow().is_empty());
        assert_eq!(sniffer.full_calls.get(), 0);
    }

    #[test]
    fn override_label_drives_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "download.tmp", b"%PDF-1.4 ...");

        let fp = compute_full_fingerprint(&path, Some("Quarterly Report.pdf"));
        assert_eq!(fp.label(), "Quarterly Report.pdf");
        assert_eq!(fp.media_type(), Some("application/pdf"));
    }

    #[test]
    fn sniffer_failures_do_not_affect_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let data = patterned(3000);
        let path = write(&dir, "blob.zzq", &data);
        let sniffer = Recording::failing();

        let fp = FullFingerprinter::with_sniffer(&sniffer).fingerprint(&path, None);
        assert_eq!(fp.checksum(), Some(crc32_of(&data)));
        assert!(fp.media_type().is_none());
        assert_eq!(sniffer.full_calls.get(), 1);
    }

    #[test]
    fn missing_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");

        let fp = compute_full_fingerprint(&path, None);
        assert!(fp.is_degraded());
        assert_eq!(fp.media_type(), Some("text/plain"));
        assert_eq!(fp.size_bytes(), 0);

        let failure = FullFingerprinter::new().try_fingerprint(&path, None).unwrap_err();
        assert!(matches!(failure.error, FingerprintError::Open { .. }));
        assert_eq!(failure.fallback, fp);
    }

    #[test]
    fn detect_media_type_paths() {
        let dir = tempfile::tempdir().unwrap();
        let png = write(&dir, "image.zzq", b"\x89PNG\r\n\x1a\n0000");
        let make = write(&dir, "Makefile", b"all:\n");
        let sniffer = Recording::default();
        let fingerprinter = FullFingerprinter::with_sniffer(&sniffer);

        assert_eq!(
            fingerprinter.detect_media_type(&png, Some("x.json")).as_deref(),
            Some("application/json")
        );
        assert_eq!(fingerprinter.detect_media_type(&make, None).as_deref(), Some("text/plain"));
        assert_eq!(sniffer.full_calls.get(), 0);

        assert_eq!(fingerprinter.detect_media_type(&png, None).as_deref(), Some("image/png"));
        assert_eq!(sniffer.full_calls.get(), 1);
        // peeks never see file content on this path
        assert!(sniffer.peeks.borrow().iter().all(Option::is_none));
    }

    #[test]
    fn detect_media_type_swallows_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "blob.zzq", b"\x00\x01");
        let sniffer = Recording::failing();
        assert!(
            FullFingerprinter::with_sniffer(&sniffer)
                .detect_media_type(&path, None)
                .is_none()
        );
        assert!(detect_media_type(&dir.path().join("nope.zzq"), None).is_none());
    }

    #[test]
    fn draft_refresh_keeps_title() {
        use crate::fingerprint::FingerprintDraft;

        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "v1.txt", b"first");
        let fingerprinter = FullFingerprinter::new();
        let original = fingerprinter.fingerprint(&path, Some("Meeting notes"));

        std::fs::write(&path, b"second, longer").unwrap();
        let kept = FingerprintDraft::from_fingerprint(&original)
            .refresh_from(&path, false, &fingerprinter)
            .finish()
            .unwrap();
        assert_eq!(kept.label(), "Meeting notes");
        assert_eq!(kept.size_bytes(), 14);
        assert_eq!(kept.checksum(), Some(crc32_of(b"second, longer")));

        let renamed = FingerprintDraft::from_fingerprint(&original)
            .refresh_from(&path, true, &fingerprinter)
            .finish()
            .unwrap();
        assert_eq!(renamed.label(), "v1.txt");
    }
}
