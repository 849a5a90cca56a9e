// Whole-buffer helpers.
//
// A single codec call each: output is pre-sized from `compress_bound` when
// compressing and from the frame's declared content size when decompressing.
// Frames without a declared size (typical for streamed output) are refused
// rather than guessed at.

use super::context::{CompressionContext, DecompressionContext};
use crate::compress::encoder::CompressOptions;
use crate::error::{Error, Phase, Result};

/// Largest compressed size of `len` input bytes.
pub fn compress_bound(len: usize) -> usize {
    zstd_safe::compress_bound(len)
}

/// Compress `src` into one frame at `level` (checksum enabled).
pub fn compress(src: &[u8], level: i32) -> Result<Vec<u8>> {
    compress_with_options(
        src,
        &CompressOptions {
            level,
            ..Default::default()
        },
    )
}

/// Compress `src` into one frame with explicit options.
///
/// Staging-buffer options (`chunk_size`, `leave_open`) do not apply here.
/// The frame always records its content size.
pub fn compress_with_options(src: &[u8], opts: &CompressOptions) -> Result<Vec<u8>> {
    opts.validate()?;
    let mut ctx = CompressionContext::create()?;
    opts.apply_to(&mut ctx)?;

    let mut dst = Vec::new();
    dst.try_reserve_exact(compress_bound(src.len()))
        .map_err(|_| Error::Allocation {
            what: "one-shot output buffer",
        })?;
    ctx.compress_once(&mut dst, src)
        .map_err(|e| Error::codec(Phase::Compress, e))?;
    Ok(dst)
}

/// Decompressed size declared in a frame header.
///
/// `Ok(None)` means the frame is valid but does not record its size.
pub fn frame_content_size(frame: &[u8]) -> Result<Option<u64>> {
    zstd_safe::get_frame_content_size(frame).map_err(|_| Error::Codec {
        phase: Phase::Decompress,
        message: "input does not start with a valid frame header".into(),
    })
}

/// Decompress a single frame whose header declares its content size.
pub fn decompress(frame: &[u8]) -> Result<Vec<u8>> {
    let size = frame_content_size(frame)?.ok_or(Error::UnknownContentSize)?;
    let capacity = usize::try_from(size).map_err(|_| Error::Allocation {
        what: "one-shot output buffer",
    })?;
    decompress_with_capacity(frame, capacity)
}

/// Decompress a single frame into at most `capacity` bytes.
///
/// Fails if the frame decodes to more than `capacity` bytes.
pub fn decompress_with_capacity(frame: &[u8], capacity: usize) -> Result<Vec<u8>> {
    let mut ctx = DecompressionContext::create()?;
    let mut dst = Vec::new();
    dst.try_reserve_exact(capacity)
        .map_err(|_| Error::Allocation {
            what: "one-shot output buffer",
        })?;
    ctx.decompress_once(&mut dst, frame)
        .map_err(|e| Error::codec(Phase::Decompress, e))?;
    Ok(dst)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
