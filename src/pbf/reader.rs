use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::blob::{Blob, BlobHeader, MAX_BLOB_HEADER_SIZE, MAX_BLOB_SIZE};
use super::error::{FormatError, Result};

/// Sequential reader over the framed segments of a PBF stream.
///
/// Each segment is a 4-byte big-endian length, a `BlobHeader` of that
/// length, then a `Blob` of `BlobHeader.datasize` bytes. Only one segment
/// is held in memory at a time. The iterator ends cleanly only on a segment
/// boundary and yields nothing after an error.
pub struct BlobReader<R> {
    reader: R,
    offset: u64,
    finished: bool,
}

impl BlobReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> BlobReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            finished: false,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_blob(&mut self) -> Result<Option<Blob>> {
        let start = self.offset;

        let mut len_buf = [0u8; 4];
        let got = read_fully(&mut self.reader, &mut len_buf)?;
        if got == 0 {
            return Ok(None);
        }
        if got < len_buf.len() {
            return Err(FormatError::Truncated {
                what: "blob header length",
                expected: len_buf.len(),
                got,
            }
            .into());
        }

        let header_len = u32::from_be_bytes(len_buf) as usize;
        if header_len > MAX_BLOB_HEADER_SIZE {
            return Err(FormatError::HeaderTooLarge(header_len).into());
        }
        let header_buf = self.read_exact_or_truncated(header_len, "blob header")?;
        let header = BlobHeader::parse(&header_buf)?;

        if header.datasize > MAX_BLOB_SIZE {
            return Err(FormatError::BlobTooLarge(header.datasize).into());
        }
        let data = self.read_exact_or_truncated(header.datasize, "blob")?;

        self.offset = start + (len_buf.len() + header_len + header.datasize) as u64;
        Ok(Some(Blob::new(header.blob_type, data, start)))
    }

    fn read_exact_or_truncated(&mut self, len: usize, what: &'static str) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let got = read_fully(&mut self.reader, &mut buf)?;
        if got < len {
            return Err(FormatError::Truncated {
                what,
                expected: len,
                got,
            }
            .into());
        }
        Ok(buf)
    }
}

impl<R: Read> Iterator for BlobReader<R> {
    type Item = Result<Blob>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_blob() {
            Ok(Some(blob)) => Some(Ok(blob)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

// Like read_exact, but reports how much was read before EOF.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
