use crate::config::{ReaderConfig, MAX_LOOKUP_BATCH};
use crate::error::{OvbdError, Result};
use crate::lsmt::header::LsmtHeader;
use crate::lsmt::index::SegmentIndex;
use crate::lsmt::mapping::{Segment, SegmentMapping, MAPPING_SIZE};
use crate::lsmt::HT_SPACE;
use crate::storage::backing::ReadAt;

/// Read-only LSMT virtual disk over a backing store.
///
/// The backing is usually a `ZFile` (decompressed view) or a raw file. The
/// trailer and segment index are loaded once at open; reads only borrow
/// `self`.
pub struct VirtualFile<B> {
    backing: B,
    header: LsmtHeader,
    index: SegmentIndex,
    sector_size: u32,
    lookup_batch: usize,
}

impl<B: ReadAt> VirtualFile<B> {
    /// Check whether `backing` starts with an LSMT header.
    pub fn probe(backing: &B) -> Result<bool> {
        let mut head = [0u8; LsmtHeader::STRUCT_SIZE];
        let n = backing.read_at(&mut head, 0)?;
        Ok(n == head.len() && LsmtHeader::has_magic(&head))
    }

    pub fn open(backing: B, config: &ReaderConfig) -> Result<Self> {
        config.validate()?;

        let file_size = backing.size();
        if file_size < HT_SPACE {
            return Err(OvbdError::Format(format!(
                "file too small for an LSMT trailer: {} bytes",
                file_size
            )));
        }

        if !Self::probe(&backing)? {
            tracing::warn!(file_size, "backing store is not an LSMT file");
            return Err(OvbdError::Format("not an LSMT file".into()));
        }

        let trailer_offset = file_size - HT_SPACE;
        let mut raw_trailer = [0u8; LsmtHeader::STRUCT_SIZE];
        backing.read_exact_at(&mut raw_trailer, trailer_offset)?;
        let header = LsmtHeader::decode(&raw_trailer)?;
        tracing::debug!(
            index_offset = header.index_offset,
            index_size = header.index_size,
            virtual_size = header.virtual_size,
            "read LSMT trailer"
        );

        let index_bytes = header
            .index_size
            .checked_mul(MAPPING_SIZE as u64)
            .ok_or_else(|| {
                OvbdError::Allocation(format!("index size {} overflows", header.index_size))
            })?;
        if index_bytes == 0 || index_bytes > config.max_index_bytes {
            tracing::warn!(index_bytes, limit = config.max_index_bytes, "rejecting LSMT index");
            return Err(OvbdError::Allocation(format!(
                "segment index of {} bytes is outside 1..={}",
                index_bytes, config.max_index_bytes
            )));
        }

        let mut raw_index = vec![0u8; index_bytes as usize];
        backing.read_exact_at(&mut raw_index, header.index_offset)?;
        let index = SegmentIndex::from_raw(&raw_index)?;

        Ok(VirtualFile {
            backing,
            header,
            index,
            sector_size: config.sector_size,
            lookup_batch: config.lookup_batch,
        })
    }

    /// Logical size of the virtual disk in bytes.
    pub fn virtual_size(&self) -> u64 {
        self.header.virtual_size
    }

    pub fn header(&self) -> &LsmtHeader {
        &self.header
    }

    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    pub fn into_backing(self) -> B {
        self.backing
    }

    /// Read `buf.len()` bytes of the virtual disk starting at `offset`.
    ///
    /// Both must be sector aligned. The request is clamped to the virtual
    /// size; the number of bytes produced is returned. Holes and zeroed
    /// segments read as zeros without touching the backing store. If the
    /// backing store fails, the read stops and `OvbdError::Partial` reports
    /// how many bytes were already produced.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let sector = self.sector_size as u64;
        if offset % sector != 0 || buf.len() as u64 % sector != 0 {
            tracing::warn!(offset, count = buf.len(), "unaligned LSMT read");
            return Err(OvbdError::Alignment {
                offset,
                count: buf.len(),
                sector_size: self.sector_size,
            });
        }

        let vsize = self.header.virtual_size;
        if offset >= vsize {
            return Ok(0);
        }
        let count = (buf.len() as u64).min(vsize - offset) as usize;
        let out = &mut buf[..count];

        let mut cursor = Segment::new(offset / sector, (count as u64).div_ceil(sector));
        let mut batch = [SegmentMapping::default(); MAX_LOOKUP_BATCH];
        let batch = &mut batch[..self.lookup_batch];
        let mut pos = 0usize;

        loop {
            let n = self.index.lookup(&cursor, batch);
            tracing::trace!(offset = cursor.offset, length = cursor.length, n, "index lookup");

            for m in &batch[..n] {
                if m.offset > cursor.offset {
                    pos = zero_fill(out, pos, (m.offset - cursor.offset) * sector);
                }

                let len = m.length as u64 * sector;
                if m.zeroed {
                    pos = zero_fill(out, pos, len);
                } else {
                    let end = clip(out, pos, len);
                    let moffset = m.moffset.saturating_mul(sector);
                    if let Err(e) = self.backing.read_exact_at(&mut out[pos..end], moffset) {
                        tracing::warn!(
                            moffset,
                            length = end - pos,
                            produced = pos,
                            error = %e,
                            "LSMT read aborted"
                        );
                        return Err(OvbdError::Partial {
                            produced: pos,
                            source: Box::new(e),
                        });
                    }
                    pos = end;
                }
                cursor.forward_offset_to(m.end());
            }

            if n < batch.len() {
                break;
            }
        }

        if cursor.length > 0 {
            pos = zero_fill(out, pos, cursor.length * sector);
        }
        Ok(pos)
    }
}

fn clip(out: &[u8], pos: usize, len: u64) -> usize {
    (pos as u64).saturating_add(len).min(out.len() as u64) as usize
}

fn zero_fill(out: &mut [u8], pos: usize, len: u64) -> usize {
    let end = clip(out, pos, len);
    out[pos..end].fill(0);
    end
}

impl<B: ReadAt> ReadAt for VirtualFile<B> {
    /// Unaligned access is rejected the same way as `read`.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.read(buf, offset)
    }

    fn size(&self) -> u64 {
        self.virtual_size()
    }
}
