use flate2::read::ZlibDecoder;
use std::borrow::Cow;
use std::io::Read;

use super::block::PrimitiveBlock;
use super::error::FormatError;
use super::header::HeaderBlock;
use super::wire::MessageReader;

/// Largest encoded `BlobHeader` accepted by the reader.
pub const MAX_BLOB_HEADER_SIZE: usize = 64 * 1024;
/// Largest blob, compressed or not, accepted by the reader and decoder.
pub const MAX_BLOB_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlobHeader {
    pub blob_type: String,
    pub datasize: usize,
}

impl BlobHeader {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self, FormatError> {
        let mut blob_type = None;
        let mut datasize = None;
        for field in MessageReader::new(buf) {
            let field = field?;
            match field.number {
                1 => blob_type = Some(field.string()?.to_string()),
                3 => {
                    let size = field.int32()?;
                    datasize = Some(usize::try_from(size).map_err(|_| {
                        FormatError::OutOfRange {
                            field: 3,
                            value: i128::from(size),
                        }
                    })?);
                }
                // indexdata is opaque to us
                _ => {}
            }
        }
        Ok(Self {
            blob_type: blob_type.ok_or(FormatError::MissingField("BlobHeader.type"))?,
            datasize: datasize.ok_or(FormatError::MissingField("BlobHeader.datasize"))?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobType<'a> {
    OsmHeader,
    OsmData,
    Unknown(&'a str),
}

/// One framed segment of a PBF file, still encoded.
#[derive(Debug, Clone)]
pub struct Blob {
    blob_type: String,
    data: Vec<u8>,
    offset: u64,
}

#[derive(Debug)]
pub enum BlobDecode {
    OsmHeader(HeaderBlock),
    OsmData(PrimitiveBlock),
    Unknown(String),
}

impl Blob {
    pub(crate) fn new(blob_type: String, data: Vec<u8>, offset: u64) -> Self {
        Self {
            blob_type,
            data,
            offset,
        }
    }

    pub fn blob_type(&self) -> BlobType<'_> {
        match self.blob_type.as_str() {
            "OSMHeader" => BlobType::OsmHeader,
            "OSMData" => BlobType::OsmData,
            other => BlobType::Unknown(other),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.blob_type
    }

    /// Byte offset of this segment's length prefix in the source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn decode(&self) -> Result<BlobDecode, FormatError> {
        match self.blob_type() {
            BlobType::OsmHeader => Ok(BlobDecode::OsmHeader(HeaderBlock::parse(
                &self.payload()?,
            )?)),
            BlobType::OsmData => Ok(BlobDecode::OsmData(PrimitiveBlock::parse(
                &self.payload()?,
            )?)),
            BlobType::Unknown(other) => Ok(BlobDecode::Unknown(other.to_string())),
        }
    }

    /// The uncompressed block bytes held by this blob.
    pub fn payload(&self) -> Result<Cow<'_, [u8]>, FormatError> {
        let mut raw = None;
        let mut raw_size = None;
        let mut zlib = None;
        let mut other = None;

        for field in MessageReader::new(&self.data) {
            let field = field?;
            match field.number {
                1 => raw = Some(field.bytes()?),
                2 => raw_size = Some(field.int32()?),
                3 => zlib = Some(field.bytes()?),
                4 => other = Some("lzma"),
                5 => other = Some("bzip2"),
                6 => other = Some("lz4"),
                7 => other = Some("zstd"),
                _ => {}
            }
        }

        if let Some(raw) = raw {
            return Ok(Cow::Borrowed(raw));
        }
        if let Some(zlib) = zlib {
            let declared = raw_size.ok_or(FormatError::MissingField("Blob.raw_size"))?;
            let declared = usize::try_from(declared).map_err(|_| FormatError::OutOfRange {
                field: 2,
                value: i128::from(declared),
            })?;
            if declared > MAX_BLOB_SIZE {
                return Err(FormatError::BlobTooLarge(declared));
            }
            return inflate(zlib, declared).map(Cow::Owned);
        }
        match other {
            Some(scheme) => Err(FormatError::UnsupportedCompression(scheme)),
            None => Err(FormatError::MissingField("Blob.data")),
        }
    }
}

/// Inflate a zlib stream that must produce exactly `declared` bytes.
pub fn inflate(data: &[u8], declared: usize) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(declared);
    // One byte of headroom so an oversized stream is detected without inflating all of it.
    ZlibDecoder::new(data)
        .take(declared as u64 + 1)
        .read_to_end(&mut out)
        .map_err(FormatError::Decompress)?;
    if out.len() != declared {
        return Err(FormatError::SizeMismatch {
            declared,
            actual: out.len(),
        });
    }
    Ok(out)
}
