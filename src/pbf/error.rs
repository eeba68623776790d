use thiserror::Error;

use super::blob::{MAX_BLOB_HEADER_SIZE, MAX_BLOB_SIZE};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Anything that stops a PBF stream from being read to the end.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// The bytes were read but do not form a valid PBF container or block.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("truncated {what}: expected {expected} bytes, got {got}")]
    Truncated {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("blob header of {0} bytes exceeds the {MAX_BLOB_HEADER_SIZE} byte limit")]
    HeaderTooLarge(usize),
    #[error("blob of {0} bytes exceeds the {MAX_BLOB_SIZE} byte limit")]
    BlobTooLarge(usize),
    #[error("malformed protobuf: {0}")]
    Malformed(&'static str),
    #[error("field {field} has unexpected wire type {wire_type}")]
    UnexpectedWireType { field: u32, wire_type: u8 },
    #[error("value of field {field} is out of range: {value}")]
    OutOfRange { field: u32, value: i128 },
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("unsupported blob compression: {0}")]
    UnsupportedCompression(&'static str),
    #[error("corrupt zlib stream: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("decompressed size mismatch: declared {declared} bytes, inflated {actual}")]
    SizeMismatch { declared: usize, actual: usize },
    #[error("expected an OSMHeader blob first, found {0}")]
    MissingHeader(String),
    #[error("unsupported required feature: {0}")]
    UnsupportedFeature(String),
    #[error("string table index {index} out of range (table has {len} entries)")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("string table entry {0} is not valid UTF-8")]
    InvalidUtf8(usize),
    #[error("{field} delta overflows at dense entry {entry}")]
    DeltaOverflow { field: &'static str, entry: usize },
    #[error("dense node sequences disagree: {ids} ids, {lats} lats, {lons} lons")]
    LengthMismatch { ids: usize, lats: usize, lons: usize },
    #[error("node {0} has a different number of tag keys and values")]
    TagLengthMismatch(i64),
    #[error("dense tag sequence ends without a terminator at entry {0}")]
    UnterminatedTags(usize),
    #[error("dense tag sequence has {extra} entries left after the last of {entries} nodes")]
    TrailingTags { entries: usize, extra: usize },
}
