//! ZFile header/trailer.
//!
//! Packed little-endian layout (92 bytes, padded to ZF_SPACE on disk):
//!   magic0:       [u8; 8]   @0
//!   magic1:       uuid      @8
//!   size:         u32       @24  struct size
//!   (padding)     u32       @28
//!   flags:        u64       @32
//!   index_offset: u64       @40  bytes, start of the block-size table
//!   index_size:   u64       @48  number of blocks
//!   vsize:        u64       @56  decompressed size in bytes
//!   (reserved)    u64       @64
//!   compress_options        @72
//!     block_size: u32       @72
//!     type:       u8        @76
//!     level:      u8        @77
//!     use_dict:   u8        @78
//!     (reserved)  u8        @79
//!     args:       u32       @80
//!     dict_size:  u32       @84
//!     verify:     u8        @88
//!     (reserved)  [u8; 3]   @89
use crate::error::{OvbdError, Result};
use crate::format::{le_u32, le_u64, uuid_at, HeaderFlags};
use crate::zfile::codec::CompressionType;
use crate::zfile::{DEFAULT_BLOCK_SIZE, MAGIC0, MAGIC1};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    pub block_size: u32,
    /// Raw compression type id; see `CompressionType`.
    pub algorithm: u8,
    pub level: u8,
    pub use_dict: bool,
    pub args: u32,
    pub dict_size: u32,
    pub verify: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        CompressOptions {
            block_size: DEFAULT_BLOCK_SIZE,
            algorithm: CompressionType::LZ4_ID,
            level: 0,
            use_dict: false,
            args: 0,
            dict_size: 0,
            verify: false,
        }
    }
}

impl CompressOptions {
    pub fn compression(&self) -> Result<CompressionType> {
        CompressionType::from_id(self.algorithm)
    }

    /// Bytes of dictionary stored after the head header.
    pub fn dict_len(&self) -> u64 {
        if self.use_dict {
            self.dict_size as u64
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZFileHeader {
    pub size: u32,
    pub flags: HeaderFlags,
    pub index_offset: u64,
    pub index_size: u64,
    pub vsize: u64,
    pub opt: CompressOptions,
}

impl ZFileHeader {
    pub const STRUCT_SIZE: usize = 92;

    pub fn new(index_offset: u64, index_size: u64, vsize: u64, opt: CompressOptions) -> Self {
        ZFileHeader {
            size: Self::STRUCT_SIZE as u32,
            flags: HeaderFlags::default(),
            index_offset,
            index_size,
            vsize,
            opt,
        }
    }

    /// True if `buf` starts with the ZFile magic pair.
    pub fn has_magic(buf: &[u8]) -> bool {
        buf.len() >= 24 && buf[0..8] == MAGIC0 && uuid_at(buf, 8) == MAGIC1
    }

    pub fn encode(&self) -> [u8; Self::STRUCT_SIZE] {
        let mut buf = [0u8; Self::STRUCT_SIZE];
        buf[0..8].copy_from_slice(&MAGIC0);
        buf[8..24].copy_from_slice(MAGIC1.as_bytes());
        buf[24..28].copy_from_slice(&self.size.to_le_bytes());
        buf[32..40].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[40..48].copy_from_slice(&self.index_offset.to_le_bytes());
        buf[48..56].copy_from_slice(&self.index_size.to_le_bytes());
        buf[56..64].copy_from_slice(&self.vsize.to_le_bytes());
        buf[72..76].copy_from_slice(&self.opt.block_size.to_le_bytes());
        buf[76] = self.opt.algorithm;
        buf[77] = self.opt.level;
        buf[78] = self.opt.use_dict as u8;
        buf[80..84].copy_from_slice(&self.opt.args.to_le_bytes());
        buf[84..88].copy_from_slice(&self.opt.dict_size.to_le_bytes());
        buf[88] = self.opt.verify as u8;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::STRUCT_SIZE {
            return Err(OvbdError::Format(format!(
                "ZFile header truncated: {} of {} bytes",
                buf.len(),
                Self::STRUCT_SIZE
            )));
        }
        if !Self::has_magic(buf) {
            return Err(OvbdError::Format("ZFile magic mismatch".into()));
        }

        let size = le_u32(buf, 24);
        if (size as usize) < Self::STRUCT_SIZE {
            return Err(OvbdError::Format(format!(
                "ZFile header declares size {}, need at least {}",
                size,
                Self::STRUCT_SIZE
            )));
        }

        Ok(ZFileHeader {
            size,
            flags: HeaderFlags::from_bits(le_u64(buf, 32)),
            index_offset: le_u64(buf, 40),
            index_size: le_u64(buf, 48),
            vsize: le_u64(buf, 56),
            opt: CompressOptions {
                block_size: le_u32(buf, 72),
                algorithm: buf[76],
                level: buf[77],
                use_dict: buf[78] != 0,
                args: le_u32(buf, 80),
                dict_size: le_u32(buf, 84),
                verify: buf[88] != 0,
            },
        })
    }
}
