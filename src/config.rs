use crate::error::{OvbdError, Result};

/// Sector size used by LSMT images (bytes).
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// Mappings fetched from the segment index per lookup call.
pub const DEFAULT_LOOKUP_BATCH: usize = 16;

/// Upper bound for `lookup_batch`; the batch lives on the stack of each read.
pub const MAX_LOOKUP_BATCH: usize = 64;

/// Ceiling on any on-disk index loaded at open time (1 GiB).
pub const DEFAULT_MAX_INDEX_BYTES: u64 = 1024 * 1024 * 1024;

/// Configuration for opening images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Addressing unit of the virtual disk (default: 512)
    pub sector_size: u32,

    /// Segment mappings resolved per index lookup (default: 16)
    pub lookup_batch: usize,

    /// Largest segment index or block-size table accepted at open (default: 1GiB)
    pub max_index_bytes: u64,

    /// Hold a shared advisory lock on files opened by path (default: true)
    pub lock_backing: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            sector_size: DEFAULT_SECTOR_SIZE,
            lookup_batch: DEFAULT_LOOKUP_BATCH,
            max_index_bytes: DEFAULT_MAX_INDEX_BYTES,
            lock_backing: true,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sector size
    pub fn sector_size(mut self, sector_size: u32) -> Self {
        self.sector_size = sector_size;
        self
    }

    /// Set the lookup batch size
    pub fn lookup_batch(mut self, batch: usize) -> Self {
        self.lookup_batch = batch;
        self
    }

    /// Set the index size ceiling
    pub fn max_index_bytes(mut self, bytes: u64) -> Self {
        self.max_index_bytes = bytes;
        self
    }

    /// Enable or disable the shared file lock
    pub fn lock_backing(mut self, lock: bool) -> Self {
        self.lock_backing = lock;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sector_size == 0 || !self.sector_size.is_power_of_two() {
            return Err(OvbdError::Config(format!(
                "sector size must be a non-zero power of two, got {}",
                self.sector_size
            )));
        }
        if self.lookup_batch == 0 || self.lookup_batch > MAX_LOOKUP_BATCH {
            return Err(OvbdError::Config(format!(
                "lookup batch must be in 1..={}, got {}",
                MAX_LOOKUP_BATCH, self.lookup_batch
            )));
        }
        if self.max_index_bytes == 0 {
            return Err(OvbdError::Config("index size ceiling must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReaderConfig::default();
        assert_eq!(config.sector_size, 512);
        assert_eq!(config.lookup_batch, 16);
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_sector_size() {
        assert!(ReaderConfig::new().sector_size(0).validate().is_err());
        assert!(ReaderConfig::new().sector_size(500).validate().is_err());
        ReaderConfig::new().sector_size(1).validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_batch() {
        let err = ReaderConfig::new().lookup_batch(0).validate().unwrap_err();
        assert!(matches!(err, OvbdError::Config(_)));
        assert!(ReaderConfig::new().lookup_batch(65).validate().is_err());
        ReaderConfig::new().lookup_batch(1).validate().unwrap();
    }
}
