// Zstandard codec capability.
//
// The native codec is a black box: it is driven one chunk call at a time
// through owned contexts, and everything above this module (the streaming
// encoder/decoder) only sees `compress_chunk` / `decompress_chunk`.
//
// - `context`: owned compression/decompression contexts, parameters, modes
// - `oneshot`: whole-buffer helpers built on bound and content-size queries

pub mod context;
pub mod oneshot;

use std::ops::RangeInclusive;

pub use context::{
    CodecError, CompressParameter, CompressionContext, DecompressionContext, EndMode, ErrorCode,
};

/// Default compression level (matches the reference `zstd` tool).
pub const DEFAULT_LEVEL: i32 = 3;

/// Smallest output staging buffer a compressing stream accepts.
pub const MIN_CHUNK_SIZE: usize = 8 * 1024;

/// Compression levels accepted by the linked codec.
///
/// Level 0 selects the codec's own default; negative levels trade ratio for
/// speed.
pub fn level_range() -> RangeInclusive<i32> {
    zstd_safe::min_c_level()..=zstd_safe::max_c_level()
}

/// Human-readable description of a native error code.
pub fn describe_error(code: ErrorCode) -> &'static str {
    zstd_safe::get_error_name(code)
}

/// Whether this build can run compression jobs on codec worker threads.
pub const fn multithread_supported() -> bool {
    cfg!(feature = "zstdmt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_range_contains_defaults() {
        let range = level_range();
        assert!(range.contains(&DEFAULT_LEVEL));
        assert!(range.contains(&0));
        assert!(range.contains(&1));
        assert!(*range.end() >= 19);
        assert!(*range.start() < 0);
    }
}
