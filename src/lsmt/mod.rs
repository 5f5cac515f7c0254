//! LSMT: a sparse virtual disk described by a sorted table of segment
//! mappings.
//!
//! File layout (append-only, finalized by the trailer):
//!   [header copy (HT_SPACE)] [data ...] [segment index] [trailer (HT_SPACE)]
//!
//! Offsets and lengths inside the index are in sectors; the header fields are
//! in bytes.

use uuid::Uuid;

use crate::format::packed_uuid;

pub mod file;
pub mod header;
pub mod index;
pub mod mapping;

pub use file::VirtualFile;
pub use header::LsmtHeader;
pub use index::SegmentIndex;
pub use mapping::{Segment, SegmentMapping};

/// Bytes reserved for the header at the head and for the trailer at the tail.
pub const HT_SPACE: u64 = 4096;

/// `"LSMT\0\1\2"` plus its terminating NUL.
pub const MAGIC0: [u8; 8] = *b"LSMT\0\x01\x02\0";

pub const MAGIC1: Uuid = packed_uuid(
    0x657e_63d2,
    0x9444,
    0x084c,
    0xa2d2,
    [0xc8, 0xec, 0x4f, 0xcf, 0xae, 0x8a],
);
