// Stream- and file-level helpers.
//
// `compress_stream()` / `decompress_stream()` pump any reader/writer pair
// through the streaming encoder/decoder; `compress_file()` /
// `decompress_file()` add buffered file handles on top. With the `file-io`
// feature a SHA-256 of the uncompressed bytes is computed on the fly, so the
// two directions can be cross-checked without re-reading anything.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::compress::decoder::{DecompressOptions, ZstdDecoder};
use crate::compress::encoder::{CompressOptions, ZstdEncoder};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `compress_stream()` / `compress_file()`.
#[derive(Debug, Clone)]
pub struct CompressStats {
    /// Uncompressed bytes read.
    pub input_size: u64,
    /// Compressed bytes written.
    pub output_size: u64,
    /// Whether the codec ran with worker threads.
    pub multithreaded: bool,
    /// SHA-256 of the uncompressed input (if `file-io` feature is enabled).
    pub input_sha256: Option<[u8; 32]>,
}

impl CompressStats {
    /// Compressed size as a fraction of the input size.
    pub fn ratio(&self) -> f64 {
        if self.input_size == 0 {
            return 0.0;
        }
        self.output_size as f64 / self.input_size as f64
    }
}

/// Statistics returned by `decompress_stream()` / `decompress_file()`.
#[derive(Debug, Clone)]
pub struct DecompressStats {
    /// Compressed bytes consumed.
    pub input_size: u64,
    /// Decompressed bytes written.
    pub output_size: u64,
    /// Number of frames decoded.
    pub frames: u64,
    /// SHA-256 of the decompressed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Compress everything `reader` yields into one frame on `writer`.
pub fn compress_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    opts: CompressOptions,
) -> Result<CompressStats> {
    let mut encoder = ZstdEncoder::with_options(writer, opts)?;

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        #[cfg(feature = "file-io")]
        hasher.update(&buf[..n]);
        encoder.write_all(&buf[..n])?;
    }
    encoder.close()?;

    #[cfg(feature = "file-io")]
    let input_sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let input_sha256: Option<[u8; 32]> = None;

    Ok(CompressStats {
        input_size: encoder.bytes_in(),
        output_size: encoder.bytes_out(),
        multithreaded: encoder.is_multithreaded(),
        input_sha256,
    })
}

/// Decompress every frame `reader` yields onto `writer`.
pub fn decompress_stream<R: Read, W: Write>(
    reader: R,
    writer: &mut W,
    opts: DecompressOptions,
) -> Result<DecompressStats> {
    let mut decoder = ZstdDecoder::with_options(reader, opts)?;

    #[cfg(feature = "file-io")]
    let (output_size, output_sha256) = {
        let mut hasher = sha2::Sha256::new();
        let written = {
            let mut hashing_writer = HashingWriter {
                inner: &mut *writer,
                hasher: &mut hasher,
            };
            decoder.decode_to(&mut hashing_writer)?
        };
        (written, Some(hasher.finalize().into()))
    };

    #[cfg(not(feature = "file-io"))]
    let (output_size, output_sha256): (u64, Option<[u8; 32]>) = (decoder.decode_to(writer)?, None);

    writer.flush()?;

    Ok(DecompressStats {
        input_size: decoder.bytes_in(),
        output_size,
        frames: decoder.frames_decoded(),
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Compress `input_path` into `output_path`.
///
/// A non-zero input file size is pledged up front (unless `opts` already
/// carries one), so the frame header records the content size. Files that
/// report a length of zero, such as procfs entries, are compressed without a
/// pledge since their metadata says nothing about what `read` returns.
pub fn compress_file(
    input_path: &Path,
    output_path: &Path,
    opts: CompressOptions,
) -> Result<CompressStats> {
    let input_file = File::open(input_path)?;
    let input_size = input_file.metadata()?.len();
    let mut reader = BufReader::with_capacity(BUF_SIZE, input_file);

    let output_file = File::create(output_path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, output_file);

    let opts = CompressOptions {
        pledged_size: opts.pledged_size.or((input_size > 0).then_some(input_size)),
        ..opts
    };
    let stats = compress_stream(&mut reader, &mut writer, opts)?;
    writer.flush()?;

    log::debug!(
        "zstream: {} -> {} ({} -> {} bytes)",
        input_path.display(),
        output_path.display(),
        stats.input_size,
        stats.output_size
    );
    Ok(stats)
}

/// Decompress `input_path` into `output_path`.
pub fn decompress_file(
    input_path: &Path,
    output_path: &Path,
    opts: DecompressOptions,
) -> Result<DecompressStats> {
    let input_file = File::open(input_path)?;
    let reader = BufReader::with_capacity(BUF_SIZE, input_file);

    let output_file = File::create(output_path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, output_file);

    let stats = decompress_stream(reader, &mut writer, opts)?;

    log::debug!(
        "zstream: {} -> {} ({} -> {} bytes, {} frame(s))",
        input_path.display(),
        output_path.display(),
        stats.input_size,
        stats.output_size,
        stats.frames
    );
    Ok(stats)
}

/// Lowercase hex rendering of a digest.
pub fn hex(digest: &[u8]) -> String {
    use std::fmt::Write as _;
    digest.iter().fold(String::with_capacity(digest.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
