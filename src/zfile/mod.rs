//! ZFile: a seekable container of independently compressed blocks.
//!
//! File layout:
//!   [header copy (ZF_SPACE)] [dictionary?] [block 0] [block 1] ... [block sizes: u32 x n] [trailer (ZF_SPACE)]
//!
//! The block-size table is turned into a jump table at open so any
//! decompressed byte range maps to one contiguous run of compressed blocks.

use uuid::Uuid;

use crate::format::packed_uuid;

pub mod codec;
pub mod file;
pub mod header;
pub mod jump_table;

pub use codec::CompressionType;
pub use file::ZFile;
pub use header::{CompressOptions, ZFileHeader};
pub use jump_table::{JumpEntry, JumpTable};

/// Bytes reserved for the header at the head and for the trailer at the tail.
pub const ZF_SPACE: u64 = 512;

/// Trailing CRC32C stored after each block when `verify` is set.
pub const CHECKSUM_SIZE: usize = 4;

/// Default uncompressed block size.
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// Largest uncompressed block size accepted at open.
pub const MAX_BLOCK_SIZE: u32 = 4 * 1024 * 1024;

/// `"ZFile\0\1"` plus its terminating NUL.
pub const MAGIC0: [u8; 8] = *b"ZFile\0\x01\0";

pub const MAGIC1: Uuid = packed_uuid(
    0x696a_7574,
    0x792e,
    0x6679,
    0x4140,
    [0x6c, 0x69, 0x62, 0x61, 0x62, 0x61],
);
