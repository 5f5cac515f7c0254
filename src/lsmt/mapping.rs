//! Segment mapping record.
//!
//! On-disk format (16 bytes, two little-endian u64 words):
//!   word0: offset (bits 0..50) | length (bits 50..64)
//!   word1: moffset (bits 0..55) | zeroed (bit 55) | tag (bits 56..64)
//!
//! `offset` and `length` address the virtual disk, `moffset` the backing
//! store, all in sectors.

pub const MAPPING_SIZE: usize = 16;

const OFFSET_BITS: u32 = 50;
const LENGTH_BITS: u32 = 14;
const MOFFSET_BITS: u32 = 55;
const ZEROED_BITS: u32 = 1;
const TAG_BITS: u32 = 8;

const _: () = assert!(OFFSET_BITS + LENGTH_BITS == 64);
const _: () = assert!(MOFFSET_BITS + ZEROED_BITS + TAG_BITS == 64);
const _: () = assert!(MAPPING_SIZE == 2 * std::mem::size_of::<u64>());

pub const MAX_OFFSET: u64 = (1 << OFFSET_BITS) - 1;
pub const MAX_LENGTH: u32 = (1 << LENGTH_BITS) - 1;
pub const MAX_MOFFSET: u64 = (1 << MOFFSET_BITS) - 1;

/// Offset value marking a deleted entry.
pub const INVALID_OFFSET: u64 = MAX_OFFSET;

const ZEROED_SHIFT: u32 = MOFFSET_BITS;
const TAG_SHIFT: u32 = MOFFSET_BITS + ZEROED_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentMapping {
    pub offset: u64,
    pub length: u32,
    pub moffset: u64,
    pub zeroed: bool,
    pub tag: u8,
}

impl SegmentMapping {
    /// A data segment backed by `moffset` in the backing store.
    pub fn new(offset: u64, length: u32, moffset: u64) -> Self {
        SegmentMapping {
            offset,
            length,
            moffset,
            zeroed: false,
            tag: 0,
        }
    }

    /// A segment that reads as zeros without touching the backing store.
    pub fn new_zeroed(offset: u64, length: u32) -> Self {
        SegmentMapping {
            offset,
            length,
            moffset: 0,
            zeroed: true,
            tag: 0,
        }
    }

    pub fn tombstone() -> Self {
        SegmentMapping {
            offset: INVALID_OFFSET,
            ..Default::default()
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }

    pub fn mapped_end(&self) -> u64 {
        self.moffset + self.length as u64
    }

    pub fn is_tombstone(&self) -> bool {
        self.offset == INVALID_OFFSET
    }

    /// Move the start forward to `x`, keeping the end fixed.
    /// The mapped start moves by the same amount unless the segment is zeroed.
    pub fn forward_offset_to(&mut self, x: u64) {
        debug_assert!(x >= self.offset && x <= self.end());
        let delta = x - self.offset;
        self.offset = x;
        self.length -= delta as u32;
        if !self.zeroed {
            self.moffset += delta;
        }
    }

    /// Move the end backward to `x`, keeping the start fixed.
    pub fn backward_end_to(&mut self, x: u64) {
        debug_assert!(x >= self.offset && x <= self.end());
        self.length = (x - self.offset) as u32;
    }

    /// Serialize to the 16-byte on-disk record. Fields wider than their bit
    /// width are truncated.
    pub fn encode(&self) -> [u8; MAPPING_SIZE] {
        let word0 = (self.offset & MAX_OFFSET) | ((self.length as u64 & MAX_LENGTH as u64) << OFFSET_BITS);
        let word1 = (self.moffset & MAX_MOFFSET)
            | ((self.zeroed as u64) << ZEROED_SHIFT)
            | ((self.tag as u64) << TAG_SHIFT);

        let mut buf = [0u8; MAPPING_SIZE];
        buf[0..8].copy_from_slice(&word0.to_le_bytes());
        buf[8..16].copy_from_slice(&word1.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; MAPPING_SIZE]) -> Self {
        let mut w = [0u8; 8];
        w.copy_from_slice(&buf[0..8]);
        let word0 = u64::from_le_bytes(w);
        w.copy_from_slice(&buf[8..16]);
        let word1 = u64::from_le_bytes(w);

        SegmentMapping {
            offset: word0 & MAX_OFFSET,
            length: (word0 >> OFFSET_BITS) as u32,
            moffset: word1 & MAX_MOFFSET,
            zeroed: (word1 >> ZEROED_SHIFT) & 1 == 1,
            tag: (word1 >> TAG_SHIFT) as u8,
        }
    }
}

/// A range of the virtual disk, in sectors. Used as a lookup query and as
/// the read cursor, so its length is not limited to the 14-bit record width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Segment {
    pub offset: u64,
    pub length: u64,
}

impl Segment {
    pub fn new(offset: u64, length: u64) -> Self {
        Segment { offset, length }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn forward_offset_to(&mut self, x: u64) {
        debug_assert!(x >= self.offset && x <= self.end());
        let delta = x - self.offset;
        self.offset = x;
        self.length -= delta;
    }
}
