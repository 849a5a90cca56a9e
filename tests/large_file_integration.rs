use std::io::{Read, Seek, Write};

use tempfile::NamedTempFile;
use zstream::compress::decoder::DecompressOptions;
use zstream::compress::encoder::CompressOptions;
use zstream::io::{compress_file, decompress_file};

#[test]
#[ignore = "multi-GB test is opt-in due runtime and disk requirements"]
fn multi_gb_sparse_file_roundtrip() {
    const SIZE: u64 = 2 * 1024 * 1024 * 1024;

    let mut input = NamedTempFile::new().unwrap();
    let packed = NamedTempFile::new().unwrap();
    let output = NamedTempFile::new().unwrap();

    // Sparse 2 GiB file with a few marker blocks.
    input.as_file_mut().set_len(SIZE).unwrap();
    for (offset, marker) in [
        (64 * 1024, &b"first-marker"[..]),
        (1024 * 1024 * 1024, &b"middle-marker"[..]),
        (SIZE - 16, &b"tail-marker"[..]),
    ] {
        input
            .as_file_mut()
            .seek(std::io::SeekFrom::Start(offset))
            .unwrap();
        input.as_file_mut().write_all(marker).unwrap();
    }

    let c = compress_file(
        input.path(),
        packed.path(),
        CompressOptions {
            level: 1,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(c.input_size, SIZE);
    assert!(c.output_size < 1024 * 1024);

    let d = decompress_file(packed.path(), output.path(), DecompressOptions::default()).unwrap();
    assert_eq!(d.output_size, SIZE);
    assert_eq!(d.output_sha256, c.input_sha256);

    let mut out_f = std::fs::File::open(output.path()).unwrap();
    out_f.seek(std::io::SeekFrom::Start(SIZE - 16)).unwrap();
    let mut tail = [0u8; 11];
    out_f.read_exact(&mut tail).unwrap();
    assert_eq!(&tail, b"tail-marker");
}

#[test]
fn multi_megabyte_file_roundtrip() {
    let mut input = NamedTempFile::new().unwrap();
    let packed = NamedTempFile::new().unwrap();
    let output = NamedTempFile::new().unwrap();

    let block: Vec<u8> = (0..=255u8).cycle().take(1 << 16).collect();
    for i in 0..64u8 {
        let mut b = block.clone();
        b[usize::from(i) * 97] = i;
        input.write_all(&b).unwrap();
    }
    input.flush().unwrap();

    let c = compress_file(
        input.path(),
        packed.path(),
        CompressOptions {
            chunk_size: 16 * 1024,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(c.input_size, 64 << 16);
    assert!(c.output_size < c.input_size / 10);

    let d = decompress_file(packed.path(), output.path(), DecompressOptions::default()).unwrap();
    assert_eq!(d.output_size, c.input_size);
    assert_eq!(
        std::fs::read(output.path()).unwrap(),
        std::fs::read(input.path()).unwrap()
    );
}
