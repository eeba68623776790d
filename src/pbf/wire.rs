//! Protobuf wire-format primitives.
//!
//! Only what the OSM PBF schema needs: varints, zigzag, length-delimited
//! fields and packed repeated scalars. Unknown fields are surfaced to the
//! caller, which skips them by ignoring the returned [`Field`].

use super::error::FormatError;

/// Decode a LEB128 varint from `buf` starting at `*pos`, advancing `*pos`.
pub fn decode_varint(buf: &[u8], pos: &mut usize) -> Result<u64, FormatError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let Some(&byte) = buf.get(*pos) else {
            return Err(FormatError::Malformed("varint runs past end of buffer"));
        };
        *pos += 1;

        let payload = u64::from(byte & 0x7F);
        if shift == 63 && payload > 1 {
            return Err(FormatError::Malformed("varint overflows 64 bits"));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 63 {
            return Err(FormatError::Malformed("varint longer than 10 bytes"));
        }
    }
}

/// Maps 0 -> 0, 1 -> -1, 2 -> 1, 3 -> -2, ...
#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    pub number: u32,
    pub value: FieldValue<'a>,
}

impl<'a> Field<'a> {
    fn wire_type(&self) -> u8 {
        match self.value {
            FieldValue::Varint(_) => 0,
            FieldValue::Fixed64(_) => 1,
            FieldValue::Bytes(_) => 2,
            FieldValue::Fixed32(_) => 5,
        }
    }

    fn unexpected(&self) -> FormatError {
        FormatError::UnexpectedWireType {
            field: self.number,
            wire_type: self.wire_type(),
        }
    }

    pub fn bytes(&self) -> Result<&'a [u8], FormatError> {
        match self.value {
            FieldValue::Bytes(bytes) => Ok(bytes),
            _ => Err(self.unexpected()),
        }
    }

    pub fn string(&self) -> Result<&'a str, FormatError> {
        std::str::from_utf8(self.bytes()?)
            .map_err(|_| FormatError::Malformed("string field is not valid UTF-8"))
    }

    pub fn varint(&self) -> Result<u64, FormatError> {
        match self.value {
            FieldValue::Varint(value) => Ok(value),
            _ => Err(self.unexpected()),
        }
    }

    pub fn int64(&self) -> Result<i64, FormatError> {
        Ok(self.varint()? as i64)
    }

    pub fn sint64(&self) -> Result<i64, FormatError> {
        Ok(zigzag_decode(self.varint()?))
    }

    pub fn int32(&self) -> Result<i32, FormatError> {
        to_int32(self.number, self.varint()?)
    }

    /// Append a repeated `sint64`, accepting both packed and unpacked encodings.
    pub fn packed_sint64(&self, out: &mut Vec<i64>) -> Result<(), FormatError> {
        self.packed_varints(out, |raw| Ok(zigzag_decode(raw)))
    }

    pub fn packed_int32(&self, out: &mut Vec<i32>) -> Result<(), FormatError> {
        let number = self.number;
        self.packed_varints(out, |raw| to_int32(number, raw))
    }

    pub fn packed_uint32(&self, out: &mut Vec<u32>) -> Result<(), FormatError> {
        let number = self.number;
        self.packed_varints(out, |raw| {
            u32::try_from(raw).map_err(|_| FormatError::OutOfRange {
                field: number,
                value: i128::from(raw),
            })
        })
    }

    fn packed_varints<T>(
        &self,
        out: &mut Vec<T>,
        convert: impl Fn(u64) -> Result<T, FormatError>,
    ) -> Result<(), FormatError> {
        match self.value {
            FieldValue::Bytes(packed) => {
                let mut pos = 0;
                while pos < packed.len() {
                    out.push(convert(decode_varint(packed, &mut pos)?)?);
                }
                Ok(())
            }
            FieldValue::Varint(raw) => {
                out.push(convert(raw)?);
                Ok(())
            }
            _ => Err(self.unexpected()),
        }
    }
}

// Negative int32 values are sign-extended to ten-byte varints on the wire.
fn to_int32(field: u32, raw: u64) -> Result<i32, FormatError> {
    i32::try_from(raw as i64).map_err(|_| FormatError::OutOfRange {
        field,
        value: i128::from(raw as i64),
    })
}

/// Iterates the top-level fields of one encoded message.
///
/// Stops after the first error.
pub struct MessageReader<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> MessageReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            failed: false,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let buf: &'a [u8] = self.buf;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= buf.len())
            .ok_or(FormatError::Malformed("field runs past end of message"))?;
        let slice = &buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_field(&mut self) -> Result<Field<'a>, FormatError> {
        let key = decode_varint(self.buf, &mut self.pos)?;
        let number = u32::try_from(key >> 3)
            .ok()
            .filter(|&n| n != 0)
            .ok_or(FormatError::Malformed("invalid field number"))?;

        let value = match key & 0x7 {
            0 => FieldValue::Varint(decode_varint(self.buf, &mut self.pos)?),
            1 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.take(8)?);
                FieldValue::Fixed64(u64::from_le_bytes(raw))
            }
            2 => {
                let len = decode_varint(self.buf, &mut self.pos)?;
                let len = usize::try_from(len)
                    .map_err(|_| FormatError::Malformed("length prefix does not fit in memory"))?;
                FieldValue::Bytes(self.take(len)?)
            }
            5 => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(self.take(4)?);
                FieldValue::Fixed32(u32::from_le_bytes(raw))
            }
            _ => return Err(FormatError::Malformed("unsupported wire type")),
        };

        Ok(Field { number, value })
    }
}

impl<'a> Iterator for MessageReader<'a> {
    type Item = Result<Field<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        let field = self.read_field();
        if field.is_err() {
            self.failed = true;
        }
        Some(field)
    }
}
