//! LSMT header/trailer.
//!
//! Packed little-endian layout (56 bytes, padded to HT_SPACE on disk):
//!   magic0:       [u8; 8]   @0
//!   magic1:       uuid      @8
//!   size:         u32       @24  struct size, for version checks
//!   flags:        u32       @28
//!   index_offset: u64       @32  bytes
//!   index_size:   u64       @40  number of segment mappings, tombstones included
//!   virtual_size: u64       @48  bytes
use crate::error::{OvbdError, Result};
use crate::format::{le_u32, le_u64, uuid_at, HeaderFlags};
use crate::lsmt::{MAGIC0, MAGIC1};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsmtHeader {
    pub size: u32,
    pub flags: HeaderFlags,
    pub index_offset: u64,
    pub index_size: u64,
    pub virtual_size: u64,
}

impl LsmtHeader {
    pub const STRUCT_SIZE: usize = 56;

    /// A trailer describing `index_size` mappings at `index_offset`.
    pub fn new(index_offset: u64, index_size: u64, virtual_size: u64) -> Self {
        LsmtHeader {
            size: Self::STRUCT_SIZE as u32,
            flags: HeaderFlags::default(),
            index_offset,
            index_size,
            virtual_size,
        }
    }

    /// True if `buf` starts with the LSMT magic pair.
    pub fn has_magic(buf: &[u8]) -> bool {
        buf.len() >= 24 && buf[0..8] == MAGIC0 && uuid_at(buf, 8) == MAGIC1
    }

    pub fn encode(&self) -> [u8; Self::STRUCT_SIZE] {
        let mut buf = [0u8; Self::STRUCT_SIZE];
        buf[0..8].copy_from_slice(&MAGIC0);
        buf[8..24].copy_from_slice(MAGIC1.as_bytes());
        buf[24..28].copy_from_slice(&self.size.to_le_bytes());
        buf[28..32].copy_from_slice(&(self.flags.bits() as u32).to_le_bytes());
        buf[32..40].copy_from_slice(&self.index_offset.to_le_bytes());
        buf[40..48].copy_from_slice(&self.index_size.to_le_bytes());
        buf[48..56].copy_from_slice(&self.virtual_size.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::STRUCT_SIZE {
            return Err(OvbdError::Format(format!(
                "LSMT header truncated: {} of {} bytes",
                buf.len(),
                Self::STRUCT_SIZE
            )));
        }
        if !Self::has_magic(buf) {
            return Err(OvbdError::Format("LSMT magic mismatch".into()));
        }

        let size = le_u32(buf, 24);
        if (size as usize) < Self::STRUCT_SIZE {
            return Err(OvbdError::Format(format!(
                "LSMT header declares size {}, need at least {}",
                size,
                Self::STRUCT_SIZE
            )));
        }

        Ok(LsmtHeader {
            size,
            flags: HeaderFlags::from_bits(le_u32(buf, 28) as u64),
            index_offset: le_u64(buf, 32),
            index_size: le_u64(buf, 40),
            virtual_size: le_u64(buf, 48),
        })
    }
}
