// Streaming compressor.
//
// ZstdEncoder adapts `std::io::Write` onto chunk-at-a-time codec calls:
//   - Every write is fully consumed before it returns (Continue mode)
//   - flush() drains the codec without closing the frame (Flush mode)
//   - close()/finish() end the frame exactly once (End mode)
//   - One fixed output stage is reused for every codec call

use std::io::{self, Write};

use zstd_safe::{InBuffer, OutBuffer};

use crate::codec::{
    self, CompressParameter, CompressionContext, DEFAULT_LEVEL, EndMode, MIN_CHUNK_SIZE,
};
use crate::error::{Error, Phase, Result};

use super::staging::Stage;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for the streaming compressor.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Compression level; see [`codec::level_range`].
    pub level: i32,
    /// Codec worker threads. 0 or 1 compresses on the calling thread.
    pub workers: u32,
    /// Append a content checksum to the frame.
    pub checksum: bool,
    /// Window size as a power of two (`None` keeps the level's default).
    pub window_log: Option<u32>,
    /// Total input size, if known up front. Recorded in the frame header.
    pub pledged_size: Option<u64>,
    /// Output staging buffer size in bytes.
    pub chunk_size: usize,
    /// Keep the sink alive after `close()` instead of dropping it.
    pub leave_open: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            workers: 0,
            checksum: true,
            window_log: None,
            pledged_size: None,
            chunk_size: CompressionContext::recommended_output_size(),
            leave_open: false,
        }
    }
}

impl CompressOptions {
    /// Reject arguments the codec never sees.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::Usage(format!(
                "chunk size {} is below the minimum of {MIN_CHUNK_SIZE} bytes",
                self.chunk_size
            )));
        }
        let range = codec::level_range();
        if !range.contains(&self.level) {
            return Err(Error::Configuration {
                param: "level",
                value: i64::from(self.level),
                message: format!(
                    "outside the supported range {}..={}",
                    range.start(),
                    range.end()
                ),
            });
        }
        Ok(())
    }

    /// Apply the options to a fresh context.
    ///
    /// Returns whether multi-threaded compression was enabled. A rejected
    /// worker count only disables threading; every other rejection fails.
    pub(crate) fn apply_to(&self, ctx: &mut CompressionContext) -> Result<bool> {
        apply_required(ctx, CompressParameter::Level(self.level))?;
        apply_required(ctx, CompressParameter::Checksum(self.checksum))?;
        if let Some(log) = self.window_log {
            apply_required(ctx, CompressParameter::WindowLog(log))?;
        }
        if let Some(size) = self.pledged_size {
            ctx.set_pledged_size(Some(size))
                .map_err(|e| Error::Configuration {
                    param: "pledged_size",
                    value: i64::try_from(size).unwrap_or(i64::MAX),
                    message: e.description().to_string(),
                })?;
        }

        if self.workers <= 1 {
            return Ok(false);
        }
        match ctx.set_parameter(CompressParameter::Workers(self.workers)) {
            Ok(()) => Ok(true),
            Err(e) => {
                log::warn!(
                    "zstream: {} workers requested but unavailable ({e}); compressing single-threaded",
                    self.workers
                );
                Ok(false)
            }
        }
    }
}

fn apply_required(ctx: &mut CompressionContext, param: CompressParameter) -> Result<()> {
    ctx.set_parameter(param)
        .map_err(|e| Error::Configuration {
            param: param.name(),
            value: param.value(),
            message: e.description().to_string(),
        })
}

// ---------------------------------------------------------------------------
// ZstdEncoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Poisoned,
    Closed,
}

/// Streaming compressor writing one frame to an underlying sink.
///
/// Dropping an open encoder ends the frame; errors at that point can only be
/// logged, so call [`close`](Self::close) or [`finish`](Self::finish) to
/// observe them.
///
/// # Example
/// ```no_run
/// use std::io::Write;
/// use zstream::compress::encoder::ZstdEncoder;
///
/// let mut enc = ZstdEncoder::new(Vec::new(), 3).unwrap();
/// enc.write_all(b"hello hello hello").unwrap();
/// let frame = enc.finish().unwrap();
/// assert!(!frame.is_empty());
/// ```
pub struct ZstdEncoder<W: Write> {
    sink: Option<W>,
    ctx: Option<CompressionContext>,
    output: Stage,
    state: State,
    leave_open: bool,
    multithreaded: bool,
    bytes_in: u64,
    bytes_out: u64,
}

impl<W: Write> ZstdEncoder<W> {
    /// Create an encoder at `level` with default options.
    pub fn new(sink: W, level: i32) -> Result<Self> {
        Self::with_options(
            sink,
            CompressOptions {
                level,
                ..Default::default()
            },
        )
    }

    /// Create an encoder with explicit options.
    ///
    /// Nothing is written to the sink until the first write, flush or close.
    pub fn with_options(sink: W, opts: CompressOptions) -> Result<Self> {
        opts.validate()?;
        let mut ctx = CompressionContext::create()?;
        let multithreaded = opts.apply_to(&mut ctx)?;
        log::debug!(
            "zstream: encoder open (level={}, checksum={}, multithreaded={multithreaded}, chunk={})",
            opts.level,
            opts.checksum,
            opts.chunk_size
        );

        Ok(Self {
            sink: Some(sink),
            ctx: Some(ctx),
            output: Stage::with_capacity(opts.chunk_size),
            state: State::Open,
            leave_open: opts.leave_open,
            multithreaded,
            bytes_in: 0,
            bytes_out: 0,
        })
    }

    /// End the frame, flush the sink and release the codec context.
    ///
    /// The sink is dropped unless the encoder was built with `leave_open`.
    /// Calling `close` again is a no-op. Closing an encoder that already
    /// failed releases its resources and reports [`Error::Poisoned`].
    pub fn close(&mut self) -> Result<()> {
        let result = match self.state {
            State::Closed => return Ok(()),
            State::Poisoned => Err(Error::Poisoned),
            State::Open => self.end_frame(),
        };
        self.release();
        result
    }

    /// End the frame and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.leave_open = true;
        self.close()?;
        self.sink.take().ok_or(Error::Closed)
    }

    /// The sink, unless it has been dropped by `close`.
    pub fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    /// Mutable access to the sink. Writing to it directly corrupts the frame.
    pub fn get_mut(&mut self) -> Option<&mut W> {
        self.sink.as_mut()
    }

    /// Uncompressed bytes accepted so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Compressed bytes written to the sink so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Whether the codec accepted the requested worker count.
    pub fn is_multithreaded(&self) -> bool {
        self.multithreaded
    }

    /// Output staging buffer size.
    pub fn chunk_size(&self) -> usize {
        self.output.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Poisoned => Err(Error::Poisoned),
            State::Closed => Err(Error::Closed),
        }
    }

    fn compress_input(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if data.is_empty() {
            return Ok(());
        }
        self.run(data, EndMode::Continue, Phase::Compress)?;
        self.bytes_in += data.len() as u64;
        Ok(())
    }

    fn flush_frame(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.run(&[], EndMode::Flush, Phase::Flush)?;
        self.flush_sink()
    }

    fn end_frame(&mut self) -> Result<()> {
        self.run(&[], EndMode::End, Phase::Finish)?;
        self.flush_sink()?;
        log::debug!(
            "zstream: frame closed ({} bytes in, {} bytes out)",
            self.bytes_in,
            self.bytes_out
        );
        Ok(())
    }

    /// Drive chunk calls until `mode` is satisfied.
    ///
    /// Continue stops once all of `data` is consumed (the codec may still
    /// hold some internally). Flush and End stop once the codec reports
    /// nothing left, which with workers can take many calls.
    fn run(&mut self, data: &[u8], mode: EndMode, phase: Phase) -> Result<()> {
        let mut input = InBuffer::around(data);
        loop {
            let Some(ctx) = self.ctx.as_mut() else {
                return Err(Error::Closed);
            };
            let (result, produced) = {
                let mut output = OutBuffer::around(self.output.buffer_mut());
                let result = ctx.compress_chunk(&mut output, &mut input, mode);
                (result, output.pos())
            };
            let remaining = match result {
                Ok(remaining) => remaining,
                Err(e) => return Err(self.poison(Error::codec(phase, e))),
            };
            self.output.refilled(produced);
            log::trace!(
                "zstream: compress {mode:?}: consumed={}/{} produced={produced} remaining={remaining}",
                input.pos(),
                data.len()
            );

            if let Err(e) = self.drain() {
                return Err(self.poison(e));
            }

            let done = match mode {
                EndMode::Continue => input.pos() == data.len(),
                EndMode::Flush | EndMode::End => remaining == 0,
            };
            if done {
                return Ok(());
            }
        }
    }

    /// Write everything in the output stage to the sink.
    fn drain(&mut self) -> Result<()> {
        if self.output.is_empty() {
            return Ok(());
        }
        let sink = self.sink.as_mut().ok_or(Error::Closed)?;
        let pending = self.output.pending();
        sink.write_all(pending)?;
        self.bytes_out += pending.len() as u64;
        self.output.clear();
        Ok(())
    }

    fn flush_sink(&mut self) -> Result<()> {
        let flushed = self.sink.as_mut().map_or(Ok(()), |sink| sink.flush());
        flushed.map_err(|e| self.poison(e.into()))
    }

    fn poison(&mut self, err: Error) -> Error {
        log::debug!("zstream: encoder failed: {err}");
        self.state = State::Poisoned;
        err
    }

    fn release(&mut self) {
        self.ctx = None;
        self.output.clear();
        self.state = State::Closed;
        if !self.leave_open {
            self.sink = None;
        }
    }
}

impl<W: Write> Write for ZstdEncoder<W> {
    /// Compress all of `buf`; always reports the full length on success.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.compress_input(buf)?;
        Ok(buf.len())
    }

    /// Emit everything written so far as complete blocks, then flush the sink.
    fn flush(&mut self) -> io::Result<()> {
        self.flush_frame()?;
        Ok(())
    }
}

impl<W: Write> Drop for ZstdEncoder<W> {
    fn drop(&mut self) {
        match self.state {
            State::Closed => {}
            State::Poisoned => self.release(),
            State::Open => {
                if let Err(e) = self.close() {
                    log::warn!("zstream: closing encoder on drop failed: {e}");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Compress `data` as one frame into `writer`, returning the writer.
pub fn encode_all<W: Write>(writer: W, data: &[u8], opts: CompressOptions) -> Result<W> {
    let mut encoder = ZstdEncoder::with_options(writer, opts)?;
    encoder.compress_input(data)?;
    encoder.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
