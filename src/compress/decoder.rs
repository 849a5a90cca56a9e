// Streaming decompressor.
//
// ZstdDecoder adapts `std::io::Read` onto chunk-at-a-time codec calls:
//   - Decoded bytes left over from a previous call are delivered first
//   - Compressed input is pulled from the source only when the stage is empty
//   - Concatenated frames decode as one continuous stream
//   - A source that ends inside a frame is an error, never a short read

use std::io::{self, Read, Write};

use zstd_safe::{InBuffer, OutBuffer};

use crate::codec::DecompressionContext;
use crate::error::{Error, Phase, Result};

use super::staging::Stage;

const SKIPPABLE_MAGIC: u32 = 0x184D_2A50;
const SKIPPABLE_MASK: u32 = 0xFFFF_FFF0;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for the streaming decompressor.
#[derive(Debug, Clone, Default)]
pub struct DecompressOptions {
    /// Refuse frames whose window exceeds `1 << window_log_max` bytes.
    pub window_log_max: Option<u32>,
    /// Keep the source alive after `close()` instead of dropping it.
    pub leave_open: bool,
}

// ---------------------------------------------------------------------------
// ZstdDecoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reading,
    EndOfFrame,
    Poisoned,
    Closed,
}

/// Streaming decompressor reading frames from an underlying source.
pub struct ZstdDecoder<R: Read> {
    source: Option<R>,
    ctx: Option<DecompressionContext>,
    input: Stage,
    output: Stage,
    state: State,
    /// The source returned 0 from `read`.
    source_done: bool,
    /// The last codec call completed a frame and nothing has started since.
    at_boundary: bool,
    leave_open: bool,
    bytes_in: u64,
    bytes_out: u64,
    frames: u64,
    /// Leading bytes of the current frame, to tell skippable frames apart.
    magic: [u8; 4],
    magic_len: usize,
}

impl<R: Read> ZstdDecoder<R> {
    /// Create a decoder with default options.
    pub fn new(source: R) -> Result<Self> {
        Self::with_options(source, DecompressOptions::default())
    }

    /// Create a decoder with explicit options.
    pub fn with_options(source: R, opts: DecompressOptions) -> Result<Self> {
        let mut ctx = DecompressionContext::create()?;
        if let Some(log) = opts.window_log_max {
            ctx.set_window_log_max(log)
                .map_err(|e| Error::Configuration {
                    param: "window_log_max",
                    value: i64::from(log),
                    message: e.description().to_string(),
                })?;
        }
        log::debug!(
            "zstream: decoder open (window_log_max={:?})",
            opts.window_log_max
        );

        Ok(Self {
            source: Some(source),
            ctx: Some(ctx),
            input: Stage::with_capacity(DecompressionContext::recommended_input_size()),
            output: Stage::with_capacity(DecompressionContext::recommended_output_size()),
            state: State::Reading,
            source_done: false,
            at_boundary: false,
            leave_open: opts.leave_open,
            bytes_in: 0,
            bytes_out: 0,
            frames: 0,
            magic: [0; 4],
            magic_len: 0,
        })
    }

    /// Decode everything that remains, writing it to `writer`.
    ///
    /// Returns the number of bytes written by this call.
    pub fn decode_to<W: Write>(&mut self, writer: &mut W) -> Result<u64> {
        let mut total = 0u64;
        while self.fill_output()? {
            let pending = self.output.pending();
            writer.write_all(pending)?;
            let n = pending.len();
            self.output.consume(n);
            self.bytes_out += n as u64;
            total += n as u64;
        }
        Ok(total)
    }

    /// Release the codec context and staging buffers.
    ///
    /// The source is dropped unless the decoder was built with `leave_open`.
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.ctx = None;
        self.input.clear();
        self.output.clear();
        self.state = State::Closed;
        if !self.leave_open {
            self.source = None;
        }
        log::debug!(
            "zstream: decoder closed ({} bytes in, {} bytes out, {} frames)",
            self.bytes_in,
            self.bytes_out,
            self.frames
        );
    }

    /// Close the decoder and hand back the source.
    ///
    /// Returns `None` if an earlier `close` already dropped it.
    pub fn into_inner(mut self) -> Option<R> {
        self.leave_open = true;
        self.close();
        self.source.take()
    }

    pub fn get_ref(&self) -> Option<&R> {
        self.source.as_ref()
    }

    /// Compressed bytes consumed by the codec so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Decompressed bytes delivered to callers so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Complete frames decoded so far. Skippable frames are consumed but not
    /// counted.
    pub fn frames_decoded(&self) -> u64 {
        self.frames
    }

    /// Whether the end of the last frame has been reached.
    pub fn is_finished(&self) -> bool {
        self.state == State::EndOfFrame
    }

    /// `Ok(false)` once the end of the last frame has been reached.
    fn readable(&self) -> Result<bool> {
        match self.state {
            State::Reading => Ok(true),
            State::EndOfFrame => Ok(false),
            State::Poisoned => Err(Error::Poisoned),
            State::Closed => Err(Error::Closed),
        }
    }

    /// Run the codec until the output stage holds undelivered bytes.
    ///
    /// Returns `false` at end of stream.
    fn fill_output(&mut self) -> Result<bool> {
        if !self.readable()? {
            return Ok(false);
        }
        while self.output.is_empty() {
            if self.input.is_empty() && !self.source_done {
                self.fill_input()?;
            }
            if self.input.is_empty() && self.source_done && self.at_boundary {
                log::debug!(
                    "zstream: end of stream after {} frame(s)",
                    self.frames
                );
                self.state = State::EndOfFrame;
                return Ok(false);
            }
            self.step()?;
        }
        Ok(true)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.readable()? {
            return Ok(0);
        }
        let mut written = 0;
        while written < buf.len() && self.fill_output()? {
            written += self.output.drain_into(&mut buf[written..]);
        }
        self.bytes_out += written as u64;
        Ok(written)
    }

    /// Pull the next chunk of compressed input from the source.
    fn fill_input(&mut self) -> Result<()> {
        let source = self.source.as_mut().ok_or(Error::Closed)?;
        let read = loop {
            match source.read(self.input.buffer_mut()) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        match read {
            Ok(0) => {
                self.source_done = true;
                Ok(())
            }
            Ok(n) => {
                self.input.refilled(n);
                Ok(())
            }
            Err(e) => Err(self.poison(e.into())),
        }
    }

    /// One codec call from the input stage into the (empty) output stage.
    fn step(&mut self) -> Result<()> {
        let Some(ctx) = self.ctx.as_mut() else {
            return Err(Error::Closed);
        };
        let (result, consumed, produced) = {
            let mut input = InBuffer::around(self.input.pending());
            let mut output = OutBuffer::around(self.output.buffer_mut());
            let result = ctx.decompress_chunk(&mut output, &mut input);
            (result, input.pos(), output.pos())
        };
        let hint = match result {
            Ok(hint) => hint,
            Err(e) => return Err(self.poison(Error::codec(Phase::Decompress, e))),
        };
        if self.magic_len < self.magic.len() {
            let take = consumed.min(self.magic.len() - self.magic_len);
            self.magic[self.magic_len..self.magic_len + take]
                .copy_from_slice(&self.input.pending()[..take]);
            self.magic_len += take;
        }
        self.input.consume(consumed);
        self.output.refilled(produced);
        self.bytes_in += consumed as u64;
        log::trace!("zstream: decompress: consumed={consumed} produced={produced} hint={hint}");

        let progressed = consumed > 0 || produced > 0;
        if hint == 0 && progressed {
            if u32::from_le_bytes(self.magic) & SKIPPABLE_MASK == SKIPPABLE_MAGIC {
                log::trace!("zstream: skipped a skippable frame");
            } else {
                self.frames += 1;
            }
            self.magic_len = 0;
            self.at_boundary = true;
        } else if progressed {
            self.at_boundary = false;
        } else if self.input.is_empty() && self.source_done {
            return Err(self.poison(Error::truncated(Phase::Decompress)));
        }
        Ok(())
    }

    fn poison(&mut self, err: Error) -> Error {
        log::debug!("zstream: decoder failed: {err}");
        self.state = State::Poisoned;
        err
    }
}

impl<R: Read> Read for ZstdDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl<R: Read> Drop for ZstdDecoder<R> {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Decompress every frame in `data`.
///
/// Unlike [`crate::codec::oneshot::decompress`], frames need not declare
/// their content size.
pub fn decode_all(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZstdDecoder::new(data)?;
    let mut out = Vec::new();
    decoder.decode_to(&mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::encoder::{self, CompressOptions};

    fn compress(data: &[u8]) -> Vec<u8> {
        encoder::encode_all(Vec::new(), data, CompressOptions::default()).unwrap()
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len as u32).map(|i| (i % 251) as u8 ^ (i / 1024) as u8).collect()
    }

    #[test]
    fn decode_all_roundtrip() {
        let data = sample(200_000);
        assert_eq!(decode_all(&compress(&data)).unwrap(), data);
    }

    #[test]
    fn tiny_reads_deliver_everything() {
        let data = sample(10_000);
        let frame = compress(&data);
        let mut decoder = ZstdDecoder::new(&frame[..]).unwrap();

        let mut out = Vec::new();
        let mut byte = [0u8; 7];
        loop {
            let n = decoder.read(&mut byte).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&byte[..n]);
        }
        assert_eq!(out, data);
        assert_eq!(decoder.bytes_out(), data.len() as u64);
        assert_eq!(decoder.bytes_in(), frame.len() as u64);
    }

    #[test]
    fn terminal_read_is_idempotent() {
        let frame = compress(b"short");
        let mut decoder = ZstdDecoder::new(&frame[..]).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(decoder.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"short");
        for _ in 0..3 {
            assert_eq!(decoder.read(&mut buf).unwrap(), 0);
        }
        assert!(decoder.is_finished());
        assert_eq!(decoder.frames_decoded(), 1);
    }

    #[test]
    fn empty_frame_decodes_to_nothing() {
        let frame = compress(b"");
        let mut decoder = ZstdDecoder::new(&frame[..]).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(decoder.read(&mut buf).unwrap(), 0);
        assert!(decoder.is_finished());
    }

    #[test]
    fn empty_source_is_truncated() {
        let mut decoder = ZstdDecoder::new(&b""[..]).unwrap();
        let err = decoder.read(&mut [0u8; 16]).unwrap_err();
        match Error::from(err) {
            Error::Codec { phase, message } => {
                assert_eq!(phase, Phase::Decompress);
                assert!(message.contains("truncated"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn truncated_frame_is_error_not_short_read() {
        let data = sample(50_000);
        let frame = compress(&data);
        let cut = &frame[..frame.len() - 3];

        let err = decode_all(cut).unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
    }

    #[test]
    fn concatenated_frames_decode_in_sequence() {
        let mut stream = compress(b"first frame, ");
        stream.extend_from_slice(&compress(b"second frame"));

        let mut decoder = ZstdDecoder::new(&stream[..]).unwrap();
        let mut out = Vec::new();
        decoder.decode_to(&mut out).unwrap();
        assert_eq!(out, b"first frame, second frame");
        assert_eq!(decoder.frames_decoded(), 2);
    }

    #[test]
    fn skippable_frames_are_not_counted() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&SKIPPABLE_MAGIC.to_le_bytes());
        stream.extend_from_slice(&5u32.to_le_bytes());
        stream.extend_from_slice(b"notes");
        stream.extend_from_slice(&compress(b"data"));
        stream.extend_from_slice(&(SKIPPABLE_MAGIC | 0xF).to_le_bytes());
        stream.extend_from_slice(&3u32.to_le_bytes());
        stream.extend_from_slice(b"end");

        let mut decoder = ZstdDecoder::new(&stream[..]).unwrap();
        let mut out = Vec::new();
        decoder.decode_to(&mut out).unwrap();
        assert_eq!(out, b"data");
        assert_eq!(decoder.frames_decoded(), 1);
        assert!(decoder.is_finished());
    }

    #[test]
    fn decode_to_after_partial_read_continues() {
        let data = sample(300_000);
        let frame = compress(&data);
        let mut decoder = ZstdDecoder::new(&frame[..]).unwrap();

        let mut head = vec![0u8; 1000];
        decoder.read_exact(&mut head).unwrap();
        let mut rest = Vec::new();
        let n = decoder.decode_to(&mut rest).unwrap();

        assert_eq!(n, (data.len() - 1000) as u64);
        head.extend_from_slice(&rest);
        assert_eq!(head, data);
        assert_eq!(decoder.bytes_out(), data.len() as u64);
        assert_eq!(decoder.decode_to(&mut rest).unwrap(), 0);
    }

    #[test]
    fn corrupt_input_poisons_decoder() {
        let mut decoder = ZstdDecoder::new(&[0xA5u8; 256][..]).unwrap();
        let err = decoder.read(&mut [0u8; 64]).unwrap_err();
        assert!(matches!(
            Error::from(err),
            Error::Codec {
                phase: Phase::Decompress,
                ..
            }
        ));
        let err = decoder.read(&mut [0u8; 64]).unwrap_err();
        assert!(matches!(Error::from(err), Error::Poisoned));
    }

    #[test]
    fn window_limit_rejects_large_window() {
        let data = sample(4096);
        let frame = encoder::encode_all(
            Vec::new(),
            &data,
            CompressOptions {
                window_log: Some(20),
                ..Default::default()
            },
        )
        .unwrap();

        let mut decoder = ZstdDecoder::with_options(
            &frame[..],
            DecompressOptions {
                window_log_max: Some(10),
                ..Default::default()
            },
        )
        .unwrap();
        let err = decoder.decode_to(&mut Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
    }

    #[test]
    fn invalid_window_limit_rejected_at_construction() {
        let err = ZstdDecoder::with_options(
            &b""[..],
            DecompressOptions {
                window_log_max: Some(99),
                ..Default::default()
            },
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            Error::Configuration {
                param: "window_log_max",
                ..
            }
        ));
    }

    #[test]
    fn read_after_close_fails() {
        let frame = compress(b"abc");
        let mut decoder = ZstdDecoder::new(&frame[..]).unwrap();
        decoder.close();
        decoder.close();
        assert!(decoder.get_ref().is_none());
        let err = decoder.read(&mut [0u8; 8]).unwrap_err();
        assert!(matches!(Error::from(err), Error::Closed));
    }

    #[test]
    fn into_inner_returns_source() {
        let frame = compress(b"payload");
        let mut decoder = ZstdDecoder::new(io::Cursor::new(&frame)).unwrap();
        let mut out = Vec::new();
        decoder.decode_to(&mut out).unwrap();
        assert_eq!(out, b"payload");

        let cursor = decoder.into_inner().unwrap();
        assert_eq!(cursor.position(), frame.len() as u64);
    }
}
