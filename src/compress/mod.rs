// Streaming compression API.
//
// Byte-stream wrappers that drive the chunk codec on behalf of callers:
//
// - `encoder`: ZstdEncoder: `Write` sink producing one frame
// - `decoder`: ZstdDecoder: `Read` source consuming one or more frames
// - `staging`: fixed-capacity buffers shared by both directions

pub mod decoder;
pub mod encoder;
pub(crate) mod staging;

pub use decoder::{DecompressOptions, ZstdDecoder};
pub use encoder::{CompressOptions, ZstdEncoder};
