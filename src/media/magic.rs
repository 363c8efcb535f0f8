use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{MediaSniffer, SniffError, SniffResult};

/// How much of a file `detect_file` inspects.
const HEAD_LEN: u64 = 64 * 1024;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";

/// (offset, signature, media type)
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xff\xd8\xff", "image/jpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"II*\x00", "image/tiff"),
    (0, b"MM\x00*", "image/tiff"),
    (0, b"%PDF-", "application/pdf"),
    (0, b"%!PS", "application/postscript"),
    (0, b"{\\rtf", "application/rtf"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1f\x8b", "application/gzip"),
    (0, b"BZh", "application/x-bzip2"),
    (0, b"\xfd7zXZ\x00", "application/x-xz"),
    (0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (0, b"\x28\xb5\x2f\xfd", "application/zstd"),
    (0, b"\x7fELF", "application/x-executable"),
    (0, b"MZ", "application/vnd.microsoft.portable-executable"),
    (0, b"\x00asm", "application/wasm"),
    (0, b"\xca\xfe\xba\xbe", "application/java-vm"),
    (0, b"SQLite format 3\x00", "application/vnd.sqlite3"),
    (0, b"OggS", "application/ogg"),
    (0, b"fLaC", "audio/flac"),
    (0, b"ID3", "audio/mpeg"),
    (4, b"ftyp", "video/mp4"),
    (257, b"ustar", "application/x-tar"),
    (0, b"<?xml", "application/xml"),
];

/// RIFF containers carry their subtype at offset 8.
const RIFF_SUBTYPES: &[(&[u8], &str)] = &[
    (b"WAVE", "audio/wav"),
    (b"WEBP", "image/webp"),
    (b"AVI ", "video/x-msvideo"),
];

/// Extensionless names that are conventionally plain text.
const TEXT_NAMES: &[&str] = &[
    "makefile",
    "dockerfile",
    "readme",
    "license",
    "copying",
    "authors",
    "changelog",
    ".gitignore",
    ".gitattributes",
    ".editorconfig",
];

/// Signature-table sniffer with a text/binary heuristic as the last resort.
#[derive(Debug, Default, Clone, Copy)]
pub struct MagicSniffer;

impl MagicSniffer {
    pub fn new() -> Self {
        Self
    }
}

impl MediaSniffer for MagicSniffer {
    fn peek(&self, head: Option<&[u8]>, label: &str) -> SniffResult {
        if let Some(found) = head.and_then(classify) {
            return Ok(Some(found.to_string()));
        }
        Ok(name_hint(label).map(str::to_string))
    }

    fn detect_file(&self, path: &Path) -> SniffResult {
        let io_err = |source| SniffError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let mut head = Vec::new();
        file.take(HEAD_LEN).read_to_end(&mut head).map_err(io_err)?;
        Ok(Some(classify(&head).unwrap_or(OCTET_STREAM).to_string()))
    }
}

/// Classify leading bytes. `None` when there is nothing to look at.
pub fn classify(head: &[u8]) -> Option<&'static str> {
    if head.is_empty() {
        return None;
    }
    for &(offset, sig, media) in SIGNATURES {
        if head.len() >= offset + sig.len() && &head[offset..offset + sig.len()] == sig {
            return Some(media);
        }
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" {
        for &(sub, media) in RIFF_SUBTYPES {
            if &head[8..12] == sub {
                return Some(media);
            }
        }
    }
    if looks_like_html(head) {
        return Some("text/html");
    }
    if looks_like_text(head) {
        return Some(TEXT_PLAIN);
    }
    Some(OCTET_STREAM)
}

fn looks_like_html(head: &[u8]) -> bool {
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let prefix: Vec<u8> = head[start..]
        .iter()
        .take(14)
        .map(u8::to_ascii_lowercase)
        .collect();
    prefix.starts_with(b"<!doctype html") || prefix.starts_with(b"<html")
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.starts_with(b"\xef\xbb\xbf") || head.starts_with(b"\xff\xfe") || head.starts_with(b"\xfe\xff") {
        return true;
    }
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character cut off by the end of the buffer is fine.
        Err(e) => e.error_len().is_none(),
    }
}

fn name_hint(label: &str) -> Option<&'static str> {
    let name = Path::new(label).file_name()?.to_str()?.to_ascii_lowercase();
    TEXT_NAMES.contains(&name.as_str()).then_some(TEXT_PLAIN)
}
