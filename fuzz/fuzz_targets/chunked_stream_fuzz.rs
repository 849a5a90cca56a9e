#![no_main]
use std::io::{Read, Write};

use libfuzzer_sys::fuzz_target;
use zstream::compress::decoder::ZstdDecoder;
use zstream::compress::encoder::ZstdEncoder;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // Control bytes: write split size, flush cadence, read buffer size.
    let split = 1 + data[0] as usize;
    let flush_every = data[1] as usize;
    let read_len = 1 + data[2] as usize;
    let payload = &data[3..];

    let mut enc = ZstdEncoder::new(Vec::new(), 1).unwrap();
    for (i, piece) in payload.chunks(split).enumerate() {
        enc.write_all(piece).unwrap();
        if flush_every != 0 && i % flush_every == 0 {
            enc.flush().unwrap();
        }
    }
    let frame = enc.finish().unwrap();

    let mut dec = ZstdDecoder::new(&frame[..]).unwrap();
    let mut out = Vec::with_capacity(payload.len());
    let mut buf = vec![0u8; read_len];
    loop {
        let n = dec.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, payload);
    assert_eq!(dec.read(&mut buf).unwrap(), 0);
});
