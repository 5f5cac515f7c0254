use crate::error::{OvbdError, Result};

/// Location of one compressed block inside the ZFile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpEntry {
    /// Byte offset of the block's stored bytes in the file.
    pub partial_offset: u64,
    /// Stored length, including the trailing checksum when verify is set.
    pub delta: u32,
}

/// Cumulative offsets of the compressed blocks, one entry per block plus a
/// sentinel marking the end of the block data.
///
/// `entries[i + 1].partial_offset == entries[i].partial_offset + entries[i].delta`
#[derive(Debug, Clone)]
pub struct JumpTable {
    entries: Vec<JumpEntry>,
}

impl JumpTable {
    /// Build from per-block stored sizes, with block 0 at `data_start`.
    pub fn build(sizes: &[u32], data_start: u64) -> Result<Self> {
        let mut entries = Vec::with_capacity(sizes.len() + 1);
        let mut offset = data_start;
        for (block, &delta) in sizes.iter().enumerate() {
            entries.push(JumpEntry {
                partial_offset: offset,
                delta,
            });
            offset = offset.checked_add(delta as u64).ok_or_else(|| {
                OvbdError::Format(format!("jump table overflows at block {}", block))
            })?;
        }
        entries.push(JumpEntry {
            partial_offset: offset,
            delta: 0,
        });
        Ok(JumpTable { entries })
    }

    /// Build from the on-disk table of little-endian u32 block sizes.
    pub fn from_raw(raw: &[u8], data_start: u64) -> Result<Self> {
        if raw.len() % 4 != 0 {
            return Err(OvbdError::Format(format!(
                "block size table is {} bytes, not a multiple of 4",
                raw.len()
            )));
        }
        let sizes: Vec<u32> = raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::build(&sizes, data_start)
    }

    pub fn block_count(&self) -> usize {
        self.entries.len() - 1
    }

    /// Entry for a real block (not the sentinel).
    pub fn get(&self, block: u64) -> Option<&JumpEntry> {
        if block >= self.block_count() as u64 {
            return None;
        }
        self.entries.get(block as usize)
    }

    /// All entries, sentinel included.
    pub fn entries(&self) -> &[JumpEntry] {
        &self.entries
    }

    /// File offset where block data begins.
    pub fn data_start(&self) -> u64 {
        self.entries[0].partial_offset
    }

    /// File offset just past the last block.
    pub fn data_end(&self) -> u64 {
        self.entries[self.entries.len() - 1].partial_offset
    }

    /// Contiguous byte range `(offset, length)` holding blocks
    /// `start..=end`, or `None` if the range is not covered.
    pub fn span(&self, start: u64, end: u64) -> Option<(u64, u64)> {
        if start > end {
            return None;
        }
        let first = self.get(start)?;
        let last = self.get(end)?;
        let stop = last.partial_offset + last.delta as u64;
        Some((first.partial_offset, stop - first.partial_offset))
    }
}
