mod common;

use std::sync::Arc;
use std::thread;

use common::{lsmt_image, lz4_options, pattern, write_file, zfile, zstd_options, DATA_SECTOR, SECTOR};
use ovbd::config::ReaderConfig;
use ovbd::error::OvbdError;
use ovbd::lsmt::SegmentMapping;
use ovbd::storage::{FileBacking, ReadAt};
use ovbd::{Image, Layer};
use tempfile::TempDir;

/// Plain LSMT image: sectors 0..8 data, 8..12 zeroed, 12..16 hole.
fn sample_lsmt() -> (Vec<u8>, Vec<u8>) {
    let data = pattern(8 * SECTOR, 0xab);
    let mappings = [
        SegmentMapping::new(0, 8, DATA_SECTOR),
        SegmentMapping::new_zeroed(8, 4),
    ];
    (lsmt_image(&data, &mappings, 16 * SECTOR as u64), data)
}

fn check_contents(image: &Image, data: &[u8]) {
    let mut buf = vec![0xCCu8; 16 * SECTOR];
    assert_eq!(image.read(&mut buf, 0).unwrap(), buf.len());
    assert_eq!(&buf[..8 * SECTOR], data);
    assert!(buf[8 * SECTOR..].iter().all(|&b| b == 0));

    let mut buf = vec![0u8; 2 * SECTOR];
    assert_eq!(image.read(&mut buf, 3 * SECTOR as u64).unwrap(), buf.len());
    assert_eq!(&buf[..], &data[3 * SECTOR..5 * SECTOR]);
}

#[test]
fn test_open_raw_lsmt() {
    let dir = TempDir::new().unwrap();
    let (file, data) = sample_lsmt();
    let path = write_file(dir.path(), "raw.img", &file);

    let image = Image::open(&path).unwrap();
    assert!(!image.is_compressed());
    assert_eq!(image.logical_size(), 16 * SECTOR as u64);
    assert_eq!(image.path(), path.as_path());
    assert_eq!(image.virtual_file().index().len(), 2);
    check_contents(&image, &data);
    image.close();
}

#[test]
fn test_open_compressed_lsmt() {
    let dir = TempDir::new().unwrap();
    let (plain, data) = sample_lsmt();

    for (name, opt) in [("lz4.img", lz4_options(4096)), ("zstd.img", zstd_options(4096, 3))] {
        let path = write_file(dir.path(), name, &zfile(&plain, opt));
        let image = Image::open(&path).unwrap();
        assert!(image.is_compressed(), "{}", name);
        match image.virtual_file().backing() {
            Layer::Compressed(zf) => assert_eq!(zf.vsize(), plain.len() as u64),
            Layer::Raw(_) => panic!("{} opened as raw", name),
        }
        check_contents(&image, &data);
    }
}

#[test]
fn test_open_rejects_unknown_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "junk.img", &vec![0x5Au8; 3 * 4096]);
    assert!(matches!(Image::open(&path), Err(OvbdError::Format(_))));

    // a ZFile whose contents are not an LSMT image
    let path = write_file(dir.path(), "plain.zf", &zfile(&pattern(8192, 4), lz4_options(4096)));
    assert!(matches!(Image::open(&path), Err(OvbdError::Format(_))));

    let missing = dir.path().join("missing.img");
    assert!(matches!(Image::open(&missing), Err(OvbdError::Io(_))));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let (file, _) = sample_lsmt();
    let path = write_file(dir.path(), "raw.img", &file);

    let config = ReaderConfig::default().sector_size(3);
    assert!(matches!(
        Image::open_with_config(&path, &config),
        Err(OvbdError::Config(_))
    ));
}

#[test]
fn test_shared_lock_allows_second_reader() {
    let dir = TempDir::new().unwrap();
    let (file, data) = sample_lsmt();
    let path = write_file(dir.path(), "raw.img", &file);

    let first = Image::open(&path).unwrap();
    let second = Image::open(&path).unwrap();
    check_contents(&first, &data);
    check_contents(&second, &data);

    let unlocked = ReaderConfig::default().lock_backing(false);
    let third = Image::open_with_config(&path, &unlocked).unwrap();
    check_contents(&third, &data);
}

#[test]
fn test_file_backing_reads_past_eof() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "small.bin", b"0123456789");
    let backing = FileBacking::open(&path, false).unwrap();
    assert_eq!(backing.size(), 10);

    let mut buf = [0u8; 8];
    assert_eq!(backing.read_at(&mut buf, 6).unwrap(), 4);
    assert_eq!(&buf[..4], b"6789");
    assert_eq!(backing.read_at(&mut buf, 10).unwrap(), 0);
    assert!(matches!(
        backing.read_exact_at(&mut buf, 6),
        Err(OvbdError::ShortRead { wanted: 8, got: 4, .. })
    ));
}

#[test]
fn test_concurrent_reads_from_compressed_image() {
    let dir = TempDir::new().unwrap();
    let (plain, data) = sample_lsmt();
    let path = write_file(dir.path(), "c.img", &zfile(&plain, lz4_options(1024)));
    let image = Arc::new(Image::open(&path).unwrap());
    let data = Arc::new(data);

    let handles: Vec<_> = (0..4usize)
        .map(|t| {
            let image = Arc::clone(&image);
            let data = Arc::clone(&data);
            thread::spawn(move || {
                for round in 0..25usize {
                    let sector = (t + round) % 8;
                    let mut buf = vec![0u8; SECTOR];
                    image.read(&mut buf, (sector * SECTOR) as u64).unwrap();
                    assert_eq!(&buf[..], &data[sector * SECTOR..(sector + 1) * SECTOR]);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}
