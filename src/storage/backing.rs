use std::sync::Arc;

use crate::error::{OvbdError, Result};

/// Positioned-read access to the bytes underneath an image layer.
///
/// Implemented by `FileBacking` (a file on disk), in-memory buffers, and
/// `ZFile` (the decompressed view of a block-compressed file), so an LSMT
/// file can sit directly on a raw file or on top of a ZFile.
///
/// Reads take `&self` and carry their own offset; there is no cursor, so a
/// shared handle can serve concurrent readers.
pub trait ReadAt {
    /// Read up to `buf.len()` bytes starting at `offset`.
    /// Returns the number of bytes read, 0 at or past the end.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Total addressable bytes.
    fn size(&self) -> u64;

    /// Fill `buf` completely or fail with `ShortRead`.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.read_at(&mut buf[done..], offset + done as u64)?;
            if n == 0 {
                return Err(OvbdError::ShortRead {
                    offset,
                    wanted: buf.len(),
                    got: done,
                });
            }
            done += n;
        }
        Ok(())
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        if offset >= self.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.as_slice().read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Box<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Arc<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}
