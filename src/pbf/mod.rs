//! Streaming decoder for OpenStreetMap PBF files.
//!
//! `BlobReader` frames the byte stream into segments, `Blob::decode`
//! inflates and parses one segment, and `PrimitiveBlock::elements` walks the
//! nodes, ways and relations of a data block.

mod blob;
mod block;
mod error;
mod header;
mod reader;
mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use blob::{BlobDecode, BlobType};
pub use block::{Element, Node, PrimitiveBlock};
pub use error::FormatError;
pub use header::HeaderBlock;
pub use reader::BlobReader;
