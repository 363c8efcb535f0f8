use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use super::record::SparseChecksum;
use crate::checksum::{Crc32, RollingChecksum};
use crate::error::{FingerprintError, Result};

/// Bumped whenever the window layout changes, so stored sparse values can
/// be invalidated.
pub const SPARSE_REVISION: u32 = 1;

const KB: u64 = 1024;

/// Window size, window budget and minimum stride for sparse sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SamplingParams {
    window_size: usize,
    max_windows: u64,
    minimum_stride: u64,
}

impl SamplingParams {
    /// 8 KiB windows (filesystems use 4 KiB sectors; 16-32 KiB buys
    /// little), at most 20 of them, at least 512 KiB apart.
    pub const DEFAULT: SamplingParams = SamplingParams {
        window_size: 8 * KB as usize,
        max_windows: 20,
        minimum_stride: 512 * KB,
    };

    pub fn new(window_size: usize, max_windows: u64, minimum_stride: u64) -> Result<Self> {
        if window_size == 0 {
            return Err(FingerprintError::InvalidParams("window_size must be positive"));
        }
        if max_windows == 0 {
            return Err(FingerprintError::InvalidParams("max_windows must be positive"));
        }
        if minimum_stride == 0 {
            return Err(FingerprintError::InvalidParams("minimum_stride must be positive"));
        }
        Ok(Self {
            window_size,
            max_windows,
            minimum_stride,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn max_windows(&self) -> u64 {
        self.max_windows
    }

    pub fn minimum_stride(&self) -> u64 {
        self.minimum_stride
    }

    /// Distance between consecutive window starts for a file of `size`
    /// bytes. Never zero.
    pub fn stride(&self, size: u64) -> u64 {
        self.minimum_stride
            .min(size)
            .max(size / self.max_windows)
            .max(1)
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One sampled byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub len: usize,
}

/// Iterator over the windows sampled from a file of a given size.
#[derive(Debug, Clone)]
pub struct SamplingPlan {
    size: u64,
    window: usize,
    stride: u64,
    remaining: u64,
    next: u64,
}

/// Windows start at 0 and every `stride` bytes after that, measured from
/// the previous window's start, so they overlap when the stride is smaller
/// than the window. The last window is cut at end of file.
pub fn sampling_plan(size: u64, params: &SamplingParams) -> SamplingPlan {
    SamplingPlan {
        size,
        window: (params.window_size as u64).min(size) as usize,
        stride: params.stride(size),
        remaining: params.max_windows,
        next: 0,
    }
}

impl Iterator for SamplingPlan {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.next >= self.size || self.remaining == 0 {
            return None;
        }
        let offset = self.next;
        let len = if offset + self.window as u64 >= self.size {
            (self.size - offset) as usize
        } else {
            self.window
        };
        self.next = offset.saturating_add(self.stride);
        self.remaining -= 1;
        Some(Window { offset, len })
    }
}

/// Fold every planned window of `reader` into `checksum`.
///
/// `size` is the length the plan is built from. Each window must yield
/// exactly its planned length: a short read (truncation) or a final window
/// that runs past `size` (growth) fails the whole call.
pub fn sample_windows<R, C>(
    reader: &mut R,
    size: u64,
    params: &SamplingParams,
    checksum: &mut C,
) -> Result<()>
where
    R: Read + Seek,
    C: RollingChecksum,
{
    let plan = sampling_plan(size, params);
    let mut buf = vec![0u8; plan.window];

    for window in plan {
        reader
            .seek(SeekFrom::Start(window.offset))
            .map_err(|e| FingerprintError::read(window.offset, e))?;
        let got = fill(reader, &mut buf).map_err(|e| FingerprintError::read(window.offset, e))?;
        if got != window.len {
            return Err(FingerprintError::UnexpectedRead {
                offset: window.offset,
                expected: window.len,
                actual: got,
            });
        }
        checksum.update(&buf[..got]);
    }
    Ok(())
}

/// Read until `buf` is full or the reader is exhausted.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

pub fn try_compute_sparse_fingerprint(path: &Path, params: &SamplingParams) -> Result<SparseChecksum> {
    let mut file = File::open(path).map_err(|e| FingerprintError::open(path, e))?;
    let size = file
        .metadata()
        .map_err(|e| FingerprintError::read(0, e))?
        .len();
    debug!(
        path = %path.display(),
        size,
        stride = params.stride(size),
        windows = sampling_plan(size, params).count(),
        "sparse sampling"
    );

    let mut checksum = Crc32::new();
    sample_windows(&mut file, size, params, &mut checksum)?;
    Ok(SparseChecksum::new(checksum.value()))
}

/// Best-effort sparse fingerprint; failures are logged and reported as
/// [`SparseChecksum::UNDETERMINED`].
pub fn compute_sparse_fingerprint(path: &Path, params: &SamplingParams) -> SparseChecksum {
    match try_compute_sparse_fingerprint(path, params) {
        Ok(sum) => sum,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "sparse fingerprint undetermined");
            SparseChecksum::UNDETERMINED
        }
    }
}
