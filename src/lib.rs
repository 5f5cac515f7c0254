//! ovbd: read-only overlay virtual block device images
//!
//! An image is a sparse virtual disk:
//! - LSMT segment index mapping virtual sectors onto a backing store
//! - optional ZFile container storing the backing bytes as independently
//!   compressed blocks (LZ4 or ZSTD), readable at any offset
//! - holes and zeroed segments read as zeros without I/O
//! - positioned reads only, so one open image serves concurrent readers

pub mod config;
pub mod error;
pub mod format;
pub mod lsmt;
pub mod storage;
pub mod zfile;

use std::path::{Path, PathBuf};

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::lsmt::VirtualFile;
use crate::storage::{FileBacking, ReadAt};
use crate::zfile::ZFile;

/// Bytes underneath the LSMT index: the file itself, or its decompressed
/// contents when the file is a ZFile.
pub enum Layer {
    Raw(FileBacking),
    Compressed(ZFile<FileBacking>),
}

impl ReadAt for Layer {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        match self {
            Layer::Raw(file) => file.read_at(buf, offset),
            Layer::Compressed(zfile) => zfile.read_at(buf, offset),
        }
    }

    fn size(&self) -> u64 {
        match self {
            Layer::Raw(file) => file.size(),
            Layer::Compressed(zfile) => zfile.size(),
        }
    }
}

/// Open image handle.
pub struct Image {
    file: VirtualFile<Layer>,
    path: PathBuf,
}

impl Image {
    /// Open the image at `path` with default settings.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, &ReaderConfig::default())
    }

    pub fn open_with_config(path: &Path, config: &ReaderConfig) -> Result<Self> {
        config.validate()?;
        let backing = FileBacking::open(path, config.lock_backing)?;

        let layer = if ZFile::probe(&backing)? {
            Layer::Compressed(ZFile::open(backing, config)?)
        } else {
            Layer::Raw(backing)
        };
        let file = VirtualFile::open(layer, config)?;

        tracing::info!(
            path = %path.display(),
            compressed = matches!(file.backing(), Layer::Compressed(_)),
            virtual_size = file.virtual_size(),
            segments = file.index().len(),
            "opened image"
        );
        Ok(Image {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Read at a sector-aligned byte offset. Returns the bytes produced,
    /// fewer than `buf.len()` only at the end of the disk.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.file.read(buf, offset)
    }

    /// Size of the virtual disk in bytes.
    pub fn logical_size(&self) -> u64 {
        self.file.virtual_size()
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.file.backing(), Layer::Compressed(_))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn virtual_file(&self) -> &VirtualFile<Layer> {
        &self.file
    }

    /// Release the index, jump table and file handle.
    pub fn close(self) {
        tracing::debug!(path = %self.path.display(), "closing image");
    }
}
