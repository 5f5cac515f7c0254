#![allow(dead_code)]
//! Fixture builders shared by the integration tests.
//!
//! The crate has no write path, so images are assembled here from the
//! public record encoders.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use ovbd::error::Result;
use ovbd::format::HeaderFlags;
use ovbd::lsmt::{LsmtHeader, SegmentMapping, HT_SPACE};
use ovbd::storage::ReadAt;
use ovbd::zfile::{CompressOptions, CompressionType, ZFileHeader, CHECKSUM_SIZE, ZF_SPACE};

pub const SECTOR: usize = 512;

/// First sector of the data area in images built by `lsmt_image`.
pub const DATA_SECTOR: u64 = HT_SPACE / SECTOR as u64;

/// Lay out `[head][data][index][trailer]`. `data` starts at `DATA_SECTOR`.
pub fn lsmt_image(data: &[u8], mappings: &[SegmentMapping], virtual_size: u64) -> Vec<u8> {
    let mut file = vec![0u8; HT_SPACE as usize];
    file.extend_from_slice(data);
    let index_offset = file.len() as u64;
    for m in mappings {
        file.extend_from_slice(&m.encode());
    }

    let mut ht = LsmtHeader::new(index_offset, mappings.len() as u64, virtual_size);
    ht.flags = HeaderFlags::default()
        .with(HeaderFlags::HEADER)
        .with(HeaderFlags::DATA_FILE);
    file[..LsmtHeader::STRUCT_SIZE].copy_from_slice(&ht.encode());

    ht.flags = HeaderFlags::default()
        .with(HeaderFlags::DATA_FILE)
        .with(HeaderFlags::SEALED);
    let mut trailer = vec![0u8; HT_SPACE as usize];
    trailer[..LsmtHeader::STRUCT_SIZE].copy_from_slice(&ht.encode());
    file.extend_from_slice(&trailer);
    file
}

/// Stored size of a block whose compressed payload is `compressed_len` bytes.
pub fn stored_len(compressed_len: usize, verify: bool) -> usize {
    if verify {
        compressed_len + CHECKSUM_SIZE
    } else {
        compressed_len
    }
}

fn compress_block(chunk: &[u8], opt: &CompressOptions, dict: Option<&[u8]>) -> Vec<u8> {
    match (CompressionType::from_id(opt.algorithm).unwrap(), dict) {
        (CompressionType::Lz4, None) => lz4_flex::block::compress(chunk),
        (CompressionType::Lz4, Some(d)) => lz4_flex::block::compress_with_dict(chunk, d),
        (CompressionType::Zstd, None) => zstd::bulk::compress(chunk, opt.level as i32).unwrap(),
        (CompressionType::Zstd, Some(d)) => {
            zstd::bulk::Compressor::with_dictionary(opt.level as i32, d)
                .unwrap()
                .compress(chunk)
                .unwrap()
        }
        (CompressionType::MiniLzo, _) => panic!("no minilzo encoder"),
    }
}

/// Compress `plain` into a ZFile. Returns the file and each block's stored size.
pub fn zfile_with_sizes(
    plain: &[u8],
    opt: CompressOptions,
    dict: Option<&[u8]>,
) -> (Vec<u8>, Vec<u32>) {
    let mut file = vec![0u8; ZF_SPACE as usize];
    let mut opt = opt;
    if let Some(d) = dict {
        opt.use_dict = true;
        opt.dict_size = d.len() as u32;
        file.extend_from_slice(d);
    }

    let mut sizes = Vec::new();
    for chunk in plain.chunks(opt.block_size as usize) {
        let compressed = compress_block(chunk, &opt, dict);
        file.extend_from_slice(&compressed);
        if opt.verify {
            file.extend_from_slice(&crc32c::crc32c(&compressed).to_le_bytes());
        }
        sizes.push(stored_len(compressed.len(), opt.verify) as u32);
    }

    let index_offset = file.len() as u64;
    for size in &sizes {
        file.extend_from_slice(&size.to_le_bytes());
    }

    let mut ht = ZFileHeader::new(index_offset, sizes.len() as u64, plain.len() as u64, opt);
    ht.flags = HeaderFlags::default()
        .with(HeaderFlags::HEADER)
        .with(HeaderFlags::DATA_FILE);
    file[..ZFileHeader::STRUCT_SIZE].copy_from_slice(&ht.encode());

    ht.flags = HeaderFlags::default()
        .with(HeaderFlags::DATA_FILE)
        .with(HeaderFlags::SEALED);
    let mut trailer = vec![0u8; ZF_SPACE as usize];
    trailer[..ZFileHeader::STRUCT_SIZE].copy_from_slice(&ht.encode());
    file.extend_from_slice(&trailer);
    (file, sizes)
}

pub fn zfile(plain: &[u8], opt: CompressOptions) -> Vec<u8> {
    zfile_with_sizes(plain, opt, None).0
}

pub fn lz4_options(block_size: u32) -> CompressOptions {
    CompressOptions {
        block_size,
        algorithm: CompressionType::LZ4_ID,
        ..Default::default()
    }
}

pub fn zstd_options(block_size: u32, level: u8) -> CompressOptions {
    CompressOptions {
        block_size,
        algorithm: CompressionType::ZSTD_ID,
        level,
        ..Default::default()
    }
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Deterministic, compressible-but-not-trivial content.
pub fn pattern(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = Rng::new(seed);
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let byte = (rng.next() % 16) as u8;
        let run = 1 + (rng.next() % 8) as usize;
        for _ in 0..run.min(len - out.len()) {
            out.push(byte);
        }
    }
    out
}

/// Backing wrapper counting `read_at` calls.
pub struct CountingBacking<B> {
    pub inner: B,
    reads: AtomicUsize,
}

impl<B> CountingBacking<B> {
    pub fn new(inner: B) -> Self {
        CountingBacking {
            inner,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
    }
}

impl<B: ReadAt> ReadAt for CountingBacking<B> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}

// ── PRNG (xorshift64) ──

pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        // Avoid zero state which is a fixed point for xorshift
        Self(if seed == 0 { 0xDEAD_BEEF } else { seed })
    }

    pub fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    pub fn next_range(&mut self, max: u64) -> u64 {
        self.next() % max
    }
}
