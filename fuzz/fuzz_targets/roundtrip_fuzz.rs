#![no_main]
use libfuzzer_sys::fuzz_target;
use zstream::compress::decoder;
use zstream::compress::encoder::{self, CompressOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let level = i32::from(data[0] % 24) - 4;
    let checksum = data[1] & 1 == 0;
    let payload = &data[2..];

    let frame = encoder::encode_all(
        Vec::new(),
        payload,
        CompressOptions {
            level,
            checksum,
            ..Default::default()
        },
    )
    .unwrap();

    let decoded = decoder::decode_all(&frame).unwrap();
    assert_eq!(decoded, payload);
});
