use crate::config::ReaderConfig;
use crate::error::{OvbdError, Result};
use crate::storage::backing::ReadAt;
use crate::zfile::codec::{verify_checksum, BlockDecoder};
use crate::zfile::header::ZFileHeader;
use crate::zfile::jump_table::JumpTable;
use crate::zfile::{MAX_BLOCK_SIZE, ZF_SPACE};

/// Random-access reader over a block-compressed file.
///
/// Addresses are in the decompressed space `0..vsize`.
pub struct ZFile<B> {
    backing: B,
    header: ZFileHeader,
    jump_table: JumpTable,
    decoder: BlockDecoder,
}

impl<B: ReadAt> ZFile<B> {
    /// Check whether `backing` starts with a ZFile header.
    pub fn probe(backing: &B) -> Result<bool> {
        let mut head = [0u8; ZFileHeader::STRUCT_SIZE];
        let n = backing.read_at(&mut head, 0)?;
        Ok(n == head.len() && ZFileHeader::has_magic(&head))
    }

    pub fn open(backing: B, config: &ReaderConfig) -> Result<Self> {
        config.validate()?;

        let file_size = backing.size();
        if file_size < 2 * ZF_SPACE {
            return Err(OvbdError::Format(format!(
                "file too small for a ZFile header and trailer: {} bytes",
                file_size
            )));
        }

        if !Self::probe(&backing)? {
            tracing::warn!(file_size, "backing store is not a ZFile");
            return Err(OvbdError::Format("not a ZFile".into()));
        }

        let mut raw_trailer = [0u8; ZFileHeader::STRUCT_SIZE];
        backing.read_exact_at(&mut raw_trailer, file_size - ZF_SPACE)?;
        let header = ZFileHeader::decode(&raw_trailer)?;
        let opt = header.opt;
        tracing::debug!(
            index_offset = header.index_offset,
            index_size = header.index_size,
            vsize = header.vsize,
            block_size = opt.block_size,
            algorithm = opt.algorithm,
            verify = opt.verify,
            "read ZFile trailer"
        );

        let kind = opt.compression()?;
        if !opt.block_size.is_power_of_two() || opt.block_size > MAX_BLOCK_SIZE {
            tracing::warn!(block_size = opt.block_size, "rejecting ZFile block size");
            return Err(OvbdError::Format(format!(
                "ZFile block size {} is not a power of two in 1..={}",
                opt.block_size, MAX_BLOCK_SIZE
            )));
        }

        let index_bytes = header.index_size.checked_mul(4).ok_or_else(|| {
            OvbdError::Allocation(format!("block count {} overflows", header.index_size))
        })?;
        if index_bytes == 0 || index_bytes > config.max_index_bytes {
            tracing::warn!(index_bytes, limit = config.max_index_bytes, "rejecting ZFile index");
            return Err(OvbdError::Allocation(format!(
                "block size table of {} bytes is outside 1..={}",
                index_bytes, config.max_index_bytes
            )));
        }

        let needed_blocks = header.vsize.div_ceil(opt.block_size as u64);
        if header.index_size < needed_blocks {
            return Err(OvbdError::Format(format!(
                "ZFile has {} blocks but {} bytes need {}",
                header.index_size, header.vsize, needed_blocks
            )));
        }

        let dict_len = opt.dict_len();
        if dict_len > config.max_index_bytes {
            return Err(OvbdError::Allocation(format!(
                "dictionary of {} bytes exceeds {}",
                dict_len, config.max_index_bytes
            )));
        }

        let mut raw_index = vec![0u8; index_bytes as usize];
        backing.read_exact_at(&mut raw_index, header.index_offset)?;
        let jump_table = JumpTable::from_raw(&raw_index, ZF_SPACE + dict_len)?;
        if jump_table.data_end() > header.index_offset {
            return Err(OvbdError::Format(format!(
                "compressed blocks end at {}, past the block size table at {}",
                jump_table.data_end(),
                header.index_offset
            )));
        }

        let dict = if dict_len > 0 {
            let mut dict = vec![0u8; dict_len as usize];
            backing.read_exact_at(&mut dict, ZF_SPACE)?;
            Some(dict)
        } else {
            None
        };
        let decoder = BlockDecoder::new(kind, dict)?;

        Ok(ZFile {
            backing,
            header,
            jump_table,
            decoder,
        })
    }

    /// Decompressed size in bytes.
    pub fn vsize(&self) -> u64 {
        self.header.vsize
    }

    pub fn block_size(&self) -> u32 {
        self.header.opt.block_size
    }

    pub fn header(&self) -> &ZFileHeader {
        &self.header
    }

    pub fn jump_table(&self) -> &JumpTable {
        &self.jump_table
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    pub fn into_backing(self) -> B {
        self.backing
    }

    /// Read decompressed bytes starting at `offset`, clamped to `vsize`.
    ///
    /// All blocks covering the range are fetched with one positioned read
    /// and decompressed in order through a single block-sized scratch
    /// buffer.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let vsize = self.header.vsize;
        if offset >= vsize || buf.is_empty() {
            return Ok(0);
        }
        let count = (buf.len() as u64).min(vsize - offset) as usize;

        let block_size = self.header.opt.block_size as u64;
        let start_block = offset / block_size;
        let end_block = (offset + count as u64 - 1) / block_size;
        let (span_offset, span_len) =
            self.jump_table.span(start_block, end_block).ok_or_else(|| {
                OvbdError::Format(format!(
                    "blocks {}..={} are not in the jump table",
                    start_block, end_block
                ))
            })?;

        let mut compressed = vec![0u8; span_len as usize];
        self.backing.read_exact_at(&mut compressed, span_offset)?;

        let mut scratch = vec![0u8; block_size as usize];
        let mut written = 0usize;
        let mut cursor = offset;
        for block in start_block..=end_block {
            let entry = self.jump_table.entries()[block as usize];
            let rel = (entry.partial_offset - span_offset) as usize;
            let stored = &compressed[rel..rel + entry.delta as usize];
            let payload = if self.header.opt.verify {
                verify_checksum(block, stored)?
            } else {
                stored
            };

            let decoded = self.decoder.decompress(block, payload, &mut scratch)?;

            let in_block = (cursor - block * block_size) as usize;
            let take = (count - written).min(block_size as usize - in_block);
            if in_block + take > decoded {
                return Err(OvbdError::Decompress {
                    block,
                    reason: format!(
                        "decoded {} bytes, need {}",
                        decoded,
                        in_block + take
                    ),
                });
            }
            buf[written..written + take].copy_from_slice(&scratch[in_block..in_block + take]);
            written += take;
            cursor += take as u64;
        }

        tracing::trace!(offset, count, start_block, end_block, "ZFile read");
        Ok(written)
    }
}

impl<B: ReadAt> ReadAt for ZFile<B> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.read(buf, offset)
    }

    fn size(&self) -> u64 {
        self.vsize()
    }
}
