//! zstream: streaming Zstandard compression over a chunk-at-a-time codec.
//!
//! The crate provides:
//! - Owned codec contexts and one-shot helpers (`codec`)
//! - `Write`/`Read` stream adapters (`compress`)
//! - Stream and file helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use zstream::compress::{ZstdDecoder, ZstdEncoder};
//!
//! let mut encoder = ZstdEncoder::new(Vec::new(), 3).unwrap();
//! encoder.write_all(b"hello hello hello hello").unwrap();
//! let frame = encoder.finish().unwrap();
//!
//! let mut decoder = ZstdDecoder::new(&frame[..]).unwrap();
//! let mut out = Vec::new();
//! decoder.read_to_end(&mut out).unwrap();
//! assert_eq!(out, b"hello hello hello hello");
//! ```

pub mod codec;
pub mod compress;
pub mod error;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Phase, Result};
