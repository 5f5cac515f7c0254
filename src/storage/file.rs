use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::error::{OvbdError, Result};
use crate::storage::backing::ReadAt;

/// Read-only image file accessed with positioned reads.
///
/// When opened with `lock = true` a shared advisory lock is held for the
/// lifetime of the handle, so a cooperating writer taking an exclusive lock
/// cannot rewrite the image underneath open readers.
pub struct FileBacking {
    file: File,
    size: u64,
    path: PathBuf,
    locked: bool,
}

impl FileBacking {
    pub fn open(path: &Path, lock: bool) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;

        if lock {
            file.lock_shared().map_err(|e| {
                OvbdError::Io(io::Error::new(
                    e.kind(),
                    format!("failed to acquire shared lock on {}: {}", path.display(), e),
                ))
            })?;
        }

        let size = file.metadata()?.len();
        tracing::debug!(path = %path.display(), size, lock, "opened backing file");

        Ok(FileBacking {
            file,
            size,
            path: path.to_path_buf(),
            locked: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(&self.file, buf, offset)
    }

    #[cfg(windows)]
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(&self.file, buf, offset)
    }
}

impl ReadAt for FileBacking {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.pread(buf, offset) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for FileBacking {
    fn drop(&mut self) {
        if self.locked {
            let _ = FileExt::unlock(&self.file);
        }
    }
}
