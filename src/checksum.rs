/// A streaming, non-cryptographic digest with no knowledge of files.
pub trait RollingChecksum {
    fn update(&mut self, bytes: &[u8]);
    /// Digest of everything folded in so far. Does not reset the state.
    fn value(&self) -> u64;
}

/// CRC-32 (IEEE polynomial, as used by zip and gzip).
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RollingChecksum for Crc32 {
    fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    fn value(&self) -> u64 {
        u64::from(self.hasher.clone().finalize())
    }
}

/// CRC-32 of a byte slice in one shot.
pub fn crc32_of(data: &[u8]) -> u64 {
    u64::from(crc32fast::hash(data))
}
