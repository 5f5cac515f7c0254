//! Helpers shared by the LSMT and ZFile header/trailer layouts.
//!
//! Both formats store an 8-byte ASCII tag followed by a 16-byte UUID whose
//! fields are laid out as a packed little-endian struct
//! `{u32 a; u16 b, c, d; u8 e[6]}`, then format-specific fields.
use uuid::Uuid;

/// Build a UUID from the packed little-endian field layout used on disk.
pub const fn packed_uuid(a: u32, b: u16, c: u16, d: u16, e: [u8; 6]) -> Uuid {
    let a = a.to_le_bytes();
    let b = b.to_le_bytes();
    let c = c.to_le_bytes();
    let d = d.to_le_bytes();
    Uuid::from_bytes([
        a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], d[0], d[1], e[0], e[1], e[2], e[3], e[4],
        e[5],
    ])
}

/// Bit flags carried by both header kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags(u64);

impl HeaderFlags {
    /// Set on the copy at the head of the file, clear on the trailer.
    pub const HEADER: u64 = 1 << 0;
    /// Set for data files, clear for index-only files.
    pub const DATA_FILE: u64 = 1 << 1;
    /// Set once the file has been finalized.
    pub const SEALED: u64 = 1 << 2;

    pub const fn from_bits(bits: u64) -> Self {
        HeaderFlags(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_header(self) -> bool {
        self.0 & Self::HEADER != 0
    }

    pub const fn is_data_file(self) -> bool {
        self.0 & Self::DATA_FILE != 0
    }

    pub const fn is_sealed(self) -> bool {
        self.0 & Self::SEALED != 0
    }

    pub const fn with(self, flag: u64) -> Self {
        HeaderFlags(self.0 | flag)
    }
}

pub(crate) fn le_u32(buf: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(b)
}

pub(crate) fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(b)
}

pub(crate) fn uuid_at(buf: &[u8], at: usize) -> Uuid {
    let mut b = [0u8; 16];
    b.copy_from_slice(&buf[at..at + 16]);
    Uuid::from_bytes(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_uuid_layout() {
        let id = packed_uuid(0x0403_0201, 0x0605, 0x0807, 0x0a09, [11, 12, 13, 14, 15, 16]);
        assert_eq!(
            id.as_bytes(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]
        );
    }

    #[test]
    fn test_flags() {
        let flags = HeaderFlags::default()
            .with(HeaderFlags::HEADER)
            .with(HeaderFlags::SEALED);
        assert!(flags.is_header());
        assert!(!flags.is_data_file());
        assert!(flags.is_sealed());
        assert_eq!(flags.bits(), 0b101);
    }

    #[test]
    fn test_le_readers() {
        let buf = [0xffu8, 0x01, 0x00, 0x00, 0x00, 0x02, 0, 0, 0, 0, 0, 0];
        assert_eq!(le_u32(&buf, 1), 1);
        assert_eq!(le_u64(&buf, 4), 0x0200);
    }
}
