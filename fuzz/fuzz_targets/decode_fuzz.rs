#![no_main]
use std::io::Read;

use libfuzzer_sys::fuzz_target;
use zstream::codec::oneshot;
use zstream::compress::decoder::{self, DecompressOptions, ZstdDecoder};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = decoder::decode_all(data);

    // Small reads exercise the pending-output path.
    if let Ok(mut dec) = ZstdDecoder::with_options(
        data,
        DecompressOptions {
            window_log_max: Some(20),
            ..Default::default()
        },
    ) {
        let mut buf = [0u8; 61];
        while let Ok(n) = dec.read(&mut buf) {
            if n == 0 {
                break;
            }
        }
    }

    // Keep the one-shot path bounded: skip frames declaring huge sizes.
    if let Ok(Some(size)) = oneshot::frame_content_size(data)
        && size <= 1 << 20
    {
        let _ = oneshot::decompress(data);
    }
});
