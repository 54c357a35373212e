#![forbid(unsafe_code)]
#![cfg_attr(docs_rs, feature(doc_cfg))]
#![warn(missing_docs)]

//! A small PNG decoder for preview images.
//!
//! Decodes 8-bit RGB and RGBA, non-interlaced PNG data into an RGBA8 buffer,
//! using its own DEFLATE decompressor. Anything else (palettes, greyscale,
//! other bit depths, interlacing, oversized images) is reported as
//! unsupported rather than decoded.
//!
//! ```no_run
//! # let bytes: Vec<u8> = Vec::new();
//! match pngpeek::RgbaImage::try_from_png_bytes(&bytes) {
//!   Some(image) => println!("{}x{}", image.width, image.height),
//!   None => println!("no preview"),
//! }
//! ```

#[cfg(target_pointer_width = "16")]
compile_error!("this crate assumes 32-bit or bigger pointers!");

mod error;
pub use error::*;

mod bit_source;
pub use bit_source::*;

mod tree_entry;
pub use tree_entry::*;

mod huff_tree;
pub use huff_tree::*;

mod huff_symbol;
pub(crate) use huff_symbol::*;

mod lit_len_alphabet;
pub use lit_len_alphabet::*;

mod dist_alphabet;
pub use dist_alphabet::*;

mod decompress;
pub use decompress::*;

mod png;
pub use png::*;

mod filtering;
pub use filtering::*;

mod pixels;
pub use pixels::*;

mod image;
pub use image::*;
