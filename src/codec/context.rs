// Owned codec contexts.
//
// Each context is created once per stream, exclusively owned by it, and
// freed exactly once when dropped. A call never keeps a buffer view alive
// past its own return: callers pass `InBuffer`/`OutBuffer` views over their
// fixed staging buffers and read the cursors back afterwards.

use std::fmt;

use zstd_safe::zstd_sys::ZSTD_EndDirective;
use zstd_safe::{CCtx, CParameter, DCtx, DParameter, InBuffer, OutBuffer};

use crate::error::{Error, Result};

/// Raw error code returned by the native codec.
pub type ErrorCode = zstd_safe::ErrorCode;

// ---------------------------------------------------------------------------
// Errors and modes
// ---------------------------------------------------------------------------

/// A failed codec call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The native codec reported an error code.
    Native(ErrorCode),
    /// The request needs a capability this build does not have.
    Unsupported(&'static str),
}

impl CodecError {
    /// The codec's own description of the failure.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Native(code) => super::describe_error(*code),
            Self::Unsupported(what) => what,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl std::error::Error for CodecError {}

/// How much of its internal state a compress call must emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndMode {
    /// Consume input; the codec may keep data buffered.
    Continue,
    /// Emit everything buffered so far without closing the frame.
    Flush,
    /// Emit everything and close the frame (epilogue + checksum).
    End,
}

impl EndMode {
    fn directive(self) -> ZSTD_EndDirective {
        match self {
            Self::Continue => ZSTD_EndDirective::ZSTD_e_continue,
            Self::Flush => ZSTD_EndDirective::ZSTD_e_flush,
            Self::End => ZSTD_EndDirective::ZSTD_e_end,
        }
    }
}

/// Compression parameters the streaming layer applies at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressParameter {
    Level(i32),
    Checksum(bool),
    Workers(u32),
    WindowLog(u32),
    ContentSize(bool),
}

impl CompressParameter {
    /// Parameter name used in configuration errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Level(_) => "level",
            Self::Checksum(_) => "checksum",
            Self::Workers(_) => "workers",
            Self::WindowLog(_) => "window_log",
            Self::ContentSize(_) => "content_size",
        }
    }

    /// Parameter value as a signed integer (flags map to 0/1).
    pub fn value(&self) -> i64 {
        match *self {
            Self::Level(v) => i64::from(v),
            Self::Checksum(v) | Self::ContentSize(v) => i64::from(v),
            Self::Workers(v) | Self::WindowLog(v) => i64::from(v),
        }
    }
}

// ---------------------------------------------------------------------------
// CompressionContext
// ---------------------------------------------------------------------------

/// An owned compression context.
pub struct CompressionContext {
    cctx: CCtx<'static>,
}

impl CompressionContext {
    /// Allocate a fresh context with default parameters.
    pub fn create() -> Result<Self> {
        let cctx = CCtx::try_create().ok_or(Error::Allocation {
            what: "compression context",
        })?;
        log::debug!("zstream: compression context created");
        Ok(Self { cctx })
    }

    /// Codec-recommended size for one chunk of input.
    pub fn recommended_input_size() -> usize {
        CCtx::in_size()
    }

    /// Codec-recommended output buffer size (guarantees one full block fits).
    pub fn recommended_output_size() -> usize {
        CCtx::out_size()
    }

    /// Apply a single parameter.
    pub fn set_parameter(&mut self, param: CompressParameter) -> std::result::Result<(), CodecError> {
        let native = match param {
            CompressParameter::Level(level) => CParameter::CompressionLevel(level),
            CompressParameter::Checksum(on) => CParameter::ChecksumFlag(on),
            CompressParameter::WindowLog(log) => CParameter::WindowLog(log),
            CompressParameter::ContentSize(on) => CParameter::ContentSizeFlag(on),
            CompressParameter::Workers(workers) => return self.set_workers(workers),
        };
        self.cctx
            .set_parameter(native)
            .map(drop)
            .map_err(CodecError::Native)
    }

    #[cfg(feature = "zstdmt")]
    fn set_workers(&mut self, workers: u32) -> std::result::Result<(), CodecError> {
        self.cctx
            .set_parameter(CParameter::NbWorkers(workers))
            .map(drop)
            .map_err(CodecError::Native)
    }

    #[cfg(not(feature = "zstdmt"))]
    fn set_workers(&mut self, workers: u32) -> std::result::Result<(), CodecError> {
        if workers == 0 {
            Ok(())
        } else {
            Err(CodecError::Unsupported(
                "multi-threaded compression is not compiled in",
            ))
        }
    }

    /// Declare the total number of bytes the next frame will contain.
    ///
    /// The frame header then records the content size, and the codec fails
    /// the frame if the actual amount differs.
    pub fn set_pledged_size(&mut self, size: Option<u64>) -> std::result::Result<(), CodecError> {
        self.cctx
            .set_pledged_src_size(size)
            .map(drop)
            .map_err(CodecError::Native)
    }

    /// One chunk call.
    ///
    /// Consumes some of `input` and writes some output, advancing both
    /// cursors. Returns the number of bytes the codec still holds
    /// internally (0 means everything requested by `mode` has been emitted).
    pub fn compress_chunk(
        &mut self,
        output: &mut OutBuffer<'_, [u8]>,
        input: &mut InBuffer<'_>,
        mode: EndMode,
    ) -> std::result::Result<usize, CodecError> {
        self.cctx
            .compress_stream2(output, input, mode.directive())
            .map_err(CodecError::Native)
    }

    /// Compress `src` into the spare capacity of `dst` in a single call.
    ///
    /// `dst` should have at least `compress_bound(src.len())` spare bytes.
    pub fn compress_once(
        &mut self,
        dst: &mut Vec<u8>,
        src: &[u8],
    ) -> std::result::Result<usize, CodecError> {
        self.cctx.compress2(dst, src).map_err(CodecError::Native)
    }
}

impl Drop for CompressionContext {
    fn drop(&mut self) {
        log::debug!("zstream: compression context released");
    }
}

impl fmt::Debug for CompressionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionContext").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// DecompressionContext
// ---------------------------------------------------------------------------

/// An owned decompression context.
pub struct DecompressionContext {
    dctx: DCtx<'static>,
}

impl DecompressionContext {
    /// Allocate a fresh context. The default window limit accepts any
    /// window the reference encoder produces at its standard levels.
    pub fn create() -> Result<Self> {
        let dctx = DCtx::try_create().ok_or(Error::Allocation {
            what: "decompression context",
        })?;
        log::debug!("zstream: decompression context created");
        Ok(Self { dctx })
    }

    /// Codec-recommended size for one chunk of compressed input.
    pub fn recommended_input_size() -> usize {
        DCtx::in_size()
    }

    /// Codec-recommended output buffer size (one full block).
    pub fn recommended_output_size() -> usize {
        DCtx::out_size()
    }

    /// Refuse frames whose window exceeds `1 << log` bytes.
    pub fn set_window_log_max(&mut self, log: u32) -> std::result::Result<(), CodecError> {
        self.dctx
            .set_parameter(DParameter::WindowLogMax(log))
            .map(drop)
            .map_err(CodecError::Native)
    }

    /// One chunk call.
    ///
    /// Returns the codec's hint: 0 once the current frame is fully decoded
    /// and flushed, otherwise a suggested size for the next input chunk.
    pub fn decompress_chunk(
        &mut self,
        output: &mut OutBuffer<'_, [u8]>,
        input: &mut InBuffer<'_>,
    ) -> std::result::Result<usize, CodecError> {
        self.dctx
            .decompress_stream(output, input)
            .map_err(CodecError::Native)
    }

    /// Decompress a whole frame into the spare capacity of `dst`.
    pub fn decompress_once(
        &mut self,
        dst: &mut Vec<u8>,
        src: &[u8],
    ) -> std::result::Result<usize, CodecError> {
        self.dctx.decompress(dst, src).map_err(CodecError::Native)
    }
}

impl Drop for DecompressionContext {
    fn drop(&mut self) {
        log::debug!("zstream: decompression context released");
    }
}

impl fmt::Debug for DecompressionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecompressionContext").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn compress_all(ctx: &mut CompressionContext, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; CompressionContext::recommended_output_size()];
        let mut input = InBuffer::around(data);
        loop {
            let (remaining, produced) = {
                let mut output = OutBuffer::around(&mut buf[..]);
                let remaining = ctx
                    .compress_chunk(&mut output, &mut input, EndMode::End)
                    .unwrap();
                (remaining, output.pos())
            };
            out.extend_from_slice(&buf[..produced]);
            if remaining == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn recommended_sizes_are_nonzero() {
        assert!(CompressionContext::recommended_input_size() > 0);
        assert!(CompressionContext::recommended_output_size() > 0);
        assert!(DecompressionContext::recommended_input_size() > 0);
        assert!(DecompressionContext::recommended_output_size() >= 128 * 1024);
    }

    #[test]
    fn chunk_calls_roundtrip() {
        let data: Vec<u8> = b"chunked codec calls ".iter().copied().cycle().take(10_000).collect();
        let mut cctx = CompressionContext::create().unwrap();
        cctx.set_parameter(CompressParameter::Level(5)).unwrap();
        cctx.set_parameter(CompressParameter::Checksum(true)).unwrap();
        let frame = compress_all(&mut cctx, &data);
        assert!(frame.len() < data.len());

        let mut dctx = DecompressionContext::create().unwrap();
        let mut out = vec![0u8; DecompressionContext::recommended_output_size()];
        let mut input = InBuffer::around(&frame);
        let (hint, produced) = {
            let mut output = OutBuffer::around(&mut out[..]);
            let hint = dctx.decompress_chunk(&mut output, &mut input).unwrap();
            (hint, output.pos())
        };
        assert_eq!(hint, 0);
        assert_eq!(input.pos(), frame.len());
        assert_eq!(&out[..produced], &data[..]);
    }

    #[test]
    fn bad_window_log_is_rejected() {
        let mut cctx = CompressionContext::create().unwrap();
        let err = cctx
            .set_parameter(CompressParameter::WindowLog(99))
            .unwrap_err();
        assert!(matches!(err, CodecError::Native(_)));
        assert!(!err.description().is_empty());
    }

    #[test]
    fn zero_workers_always_accepted() {
        let mut cctx = CompressionContext::create().unwrap();
        cctx.set_parameter(CompressParameter::Workers(0)).unwrap();
    }

    #[cfg(not(feature = "zstdmt"))]
    #[test]
    fn workers_unsupported_without_zstdmt() {
        let mut cctx = CompressionContext::create().unwrap();
        let err = cctx
            .set_parameter(CompressParameter::Workers(4))
            .unwrap_err();
        assert!(matches!(err, CodecError::Unsupported(_)));
    }

    #[test]
    fn corrupt_input_reports_native_error() {
        let mut dctx = DecompressionContext::create().unwrap();
        let garbage = [0xFFu8; 64];
        let mut out = vec![0u8; 1024];
        let mut input = InBuffer::around(&garbage);
        let mut output = OutBuffer::around(&mut out[..]);
        let err = dctx.decompress_chunk(&mut output, &mut input).unwrap_err();
        assert!(matches!(err, CodecError::Native(_)));
    }

    #[test]
    fn parameter_names_and_values() {
        assert_eq!(CompressParameter::Level(-5).name(), "level");
        assert_eq!(CompressParameter::Level(-5).value(), -5);
        assert_eq!(CompressParameter::Checksum(true).value(), 1);
        assert_eq!(CompressParameter::WindowLog(27).value(), 27);
    }
}
