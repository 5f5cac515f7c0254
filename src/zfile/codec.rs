use std::fmt;

use zstd::bulk::Decompressor;
use zstd::dict::DecoderDictionary;

use crate::error::{OvbdError, Result};
use crate::zfile::CHECKSUM_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    MiniLzo,
    Lz4,
    Zstd,
}

impl CompressionType {
    pub const MINI_LZO_ID: u8 = 0;
    pub const LZ4_ID: u8 = 1;
    pub const ZSTD_ID: u8 = 2;

    pub const fn id(self) -> u8 {
        match self {
            CompressionType::MiniLzo => Self::MINI_LZO_ID,
            CompressionType::Lz4 => Self::LZ4_ID,
            CompressionType::Zstd => Self::ZSTD_ID,
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            Self::MINI_LZO_ID => Ok(CompressionType::MiniLzo),
            Self::LZ4_ID => Ok(CompressionType::Lz4),
            Self::ZSTD_ID => Ok(CompressionType::Zstd),
            _ => Err(OvbdError::Format(format!(
                "unknown compression type id {}",
                id
            ))),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CompressionType::MiniLzo => "minilzo",
            CompressionType::Lz4 => "lz4",
            CompressionType::Zstd => "zstd",
        }
    }
}

/// Decompresses single blocks of one ZFile.
///
/// A ZSTD dictionary is digested once here and shared by every block.
pub struct BlockDecoder {
    kind: CompressionType,
    dict: Option<Vec<u8>>,
    zstd_dict: Option<DecoderDictionary<'static>>,
}

impl fmt::Debug for BlockDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDecoder")
            .field("kind", &self.kind)
            .field("dict_len", &self.dict.as_ref().map(Vec::len))
            .finish()
    }
}

impl BlockDecoder {
    pub fn new(kind: CompressionType, dict: Option<Vec<u8>>) -> Result<Self> {
        if kind == CompressionType::MiniLzo {
            return Err(OvbdError::Format(
                "minilzo-compressed blocks are not supported".into(),
            ));
        }
        let zstd_dict = match (kind, dict.as_deref()) {
            (CompressionType::Zstd, Some(raw)) => Some(DecoderDictionary::copy(raw)),
            _ => None,
        };
        Ok(BlockDecoder {
            kind,
            dict,
            zstd_dict,
        })
    }

    pub fn kind(&self) -> CompressionType {
        self.kind
    }

    /// Decompress one block into `dst`, returning the decompressed length.
    pub fn decompress(&self, block: u64, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let decoded = match (self.kind, self.dict.as_deref()) {
            (CompressionType::Lz4, None) => lz4_flex::block::decompress_into(src, dst)
                .map_err(|e| e.to_string()),
            (CompressionType::Lz4, Some(dict)) => {
                lz4_flex::block::decompress_into_with_dict(src, dst, dict)
                    .map_err(|e| e.to_string())
            }
            (CompressionType::Zstd, _) => match &self.zstd_dict {
                Some(prepared) => Decompressor::with_prepared_dictionary(prepared)
                    .and_then(|mut d| d.decompress_to_buffer(src, dst)),
                None => zstd::bulk::decompress_to_buffer(src, dst),
            }
            .map_err(|e| e.to_string()),
            (CompressionType::MiniLzo, _) => Err("minilzo is not supported".to_string()),
        };
        decoded.map_err(|reason| OvbdError::Decompress { block, reason })
    }
}

/// Split a stored block into its compressed payload and check the trailing
/// little-endian CRC32C of that payload.
pub fn verify_checksum(block: u64, stored: &[u8]) -> Result<&[u8]> {
    if stored.len() < CHECKSUM_SIZE {
        return Err(OvbdError::Decompress {
            block,
            reason: format!("{} stored bytes cannot hold a checksum", stored.len()),
        });
    }
    let (payload, tail) = stored.split_at(stored.len() - CHECKSUM_SIZE);
    let mut b = [0u8; CHECKSUM_SIZE];
    b.copy_from_slice(tail);
    let expected = u32::from_le_bytes(b);
    let actual = crc32c::crc32c(payload);
    if expected != actual {
        return Err(OvbdError::Checksum {
            block,
            expected,
            actual,
        });
    }
    Ok(payload)
}
