//! # Protocol buffer wire format reader
//!
//! A small cursor over a borrowed byte slice which understands the protobuf
//! [wire format](https://protobuf.dev/programming-guides/encoding/):
//! field keys, varints (plain and zig-zag), fixed-width numbers,
//! and length-delimited payloads.
//!
//! The reader never allocates and never owns the data.
//! Positions are always absolute offsets into the slice the reader was created from,
//! so a [`Range`] returned by [`PbfReader::read_len_range`] can be stored
//! and used later to construct a fresh reader over the same bytes.

use integer_encoding::VarInt;
use num_enum::TryFromPrimitive;
use std::borrow::Cow;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PbfError {
    #[error("Unexpected end of data at byte {0}; the message is truncated.")]
    UnexpectedEof(usize),
    #[error("Malformed varint at byte {0}.")]
    MalformedVarint(usize),
    #[error("Unknown wire type {0}.")]
    UnknownWireType(u8),
    #[error("Wire type {0:?} is not supported.")]
    UnsupportedWireType(WireType),
    #[error("Field number {0} does not fit in 32 bits.")]
    InvalidFieldNumber(u64),
}

/// The type of payload following a field key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    I64 = 1,
    Len = 2,
    /// Deprecated group start; not supported.
    StartGroup = 3,
    /// Deprecated group end; not supported.
    EndGroup = 4,
    I32 = 5,
}

/// A cursor over a bounded region of a byte slice.
#[derive(Clone, Debug)]
pub struct PbfReader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> PbfReader<'a> {
    /// Creates a reader over the whole slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
        }
    }

    /// Creates a reader over `range` of `data`.
    ///
    /// # Errors
    ///
    /// Fails if the range does not lie within the slice.
    pub fn with_range(data: &'a [u8], range: Range<usize>) -> Result<Self, PbfError> {
        if range.start > range.end || range.end > data.len() {
            return Err(PbfError::UnexpectedEof(range.end));
        }

        Ok(Self {
            data,
            pos: range.start,
            end: range.end,
        })
    }

    /// The absolute position of the cursor.
    #[inline]
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// The absolute position where this reader stops.
    #[inline]
    pub const fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub const fn is_at_end(&self) -> bool {
        self.pos >= self.end
    }

    #[inline]
    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..self.end]
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PbfError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.end)
            .ok_or(PbfError::UnexpectedEof(self.end))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn decode_var<T: VarInt>(&mut self) -> Result<T, PbfError> {
        if self.is_at_end() {
            return Err(PbfError::UnexpectedEof(self.pos));
        }

        let (value, len) =
            T::decode_var(self.remaining()).ok_or(PbfError::MalformedVarint(self.pos))?;
        self.pos += len;
        Ok(value)
    }

    /// Reads an unsigned varint.
    ///
    /// # Errors
    ///
    /// Fails if the data is truncated or the varint is malformed.
    #[inline]
    pub fn read_varint(&mut self) -> Result<u64, PbfError> {
        self.decode_var::<u64>()
    }

    /// Reads a varint as a two's complement signed integer (protobuf `int64`).
    ///
    /// # Errors
    ///
    /// See [`PbfReader::read_varint`].
    #[inline]
    #[expect(clippy::cast_possible_wrap)]
    pub fn read_varint64(&mut self) -> Result<i64, PbfError> {
        self.read_varint().map(|v| v as i64)
    }

    /// Reads a zig-zag encoded signed varint (protobuf `sint64`).
    ///
    /// # Errors
    ///
    /// See [`PbfReader::read_varint`].
    #[inline]
    pub fn read_svarint(&mut self) -> Result<i64, PbfError> {
        self.decode_var::<i64>()
    }

    /// Reads a varint and interprets any non-zero value as `true`.
    ///
    /// # Errors
    ///
    /// See [`PbfReader::read_varint`].
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool, PbfError> {
        self.read_varint().map(|v| v != 0)
    }

    /// Reads a little-endian `fixed32`.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 4 bytes remain.
    pub fn read_fixed32(&mut self) -> Result<u32, PbfError> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| PbfError::UnexpectedEof(self.pos))?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Reads a little-endian `fixed64`.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 8 bytes remain.
    pub fn read_fixed64(&mut self) -> Result<u64, PbfError> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| PbfError::UnexpectedEof(self.pos))?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Reads a little-endian `float`.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 4 bytes remain.
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32, PbfError> {
        self.read_fixed32().map(f32::from_bits)
    }

    /// Reads a little-endian `double`.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 8 bytes remain.
    #[inline]
    pub fn read_f64(&mut self) -> Result<f64, PbfError> {
        self.read_fixed64().map(f64::from_bits)
    }

    /// Reads a field key, returning the field number and wire type.
    ///
    /// # Errors
    ///
    /// Fails on truncated data or an unknown wire type.
    pub fn read_key(&mut self) -> Result<(u32, WireType), PbfError> {
        let key = self.read_varint()?;
        let field = u32::try_from(key >> 3).map_err(|_| PbfError::InvalidFieldNumber(key >> 3))?;
        #[expect(clippy::cast_possible_truncation)]
        let wire_type = (key & 0x7) as u8;
        let wire_type =
            WireType::try_from(wire_type).map_err(|_| PbfError::UnknownWireType(wire_type))?;
        Ok((field, wire_type))
    }

    /// Reads a length prefix and returns the absolute range of the payload,
    /// moving the cursor past it.
    ///
    /// # Errors
    ///
    /// Fails if the payload extends past the end of this reader.
    pub fn read_len_range(&mut self) -> Result<Range<usize>, PbfError> {
        let len = usize::try_from(self.read_varint()?)
            .map_err(|_| PbfError::UnexpectedEof(self.end))?;
        let start = self.pos;
        self.take(len)?;
        Ok(start..self.pos)
    }

    /// Reads a length-delimited payload as raw bytes.
    ///
    /// # Errors
    ///
    /// See [`PbfReader::read_len_range`].
    pub fn read_bytes(&mut self) -> Result<&'a [u8], PbfError> {
        let range = self.read_len_range()?;
        Ok(&self.data[range])
    }

    /// Reads a length-delimited string.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected;
    /// valid strings are borrowed without copying.
    ///
    /// # Errors
    ///
    /// See [`PbfReader::read_len_range`].
    pub fn read_string(&mut self) -> Result<Cow<'a, str>, PbfError> {
        self.read_bytes().map(String::from_utf8_lossy)
    }

    /// Reads a length-delimited payload and returns a reader bounded to it.
    ///
    /// The cursor of `self` moves past the payload.
    ///
    /// # Errors
    ///
    /// See [`PbfReader::read_len_range`].
    pub fn read_message(&mut self) -> Result<PbfReader<'a>, PbfError> {
        let range = self.read_len_range()?;
        Ok(PbfReader {
            data: self.data,
            pos: range.start,
            end: range.end,
        })
    }

    /// Skips over the payload of a field with the given wire type.
    ///
    /// # Errors
    ///
    /// Fails on truncated data or group wire types.
    pub fn skip(&mut self, wire_type: WireType) -> Result<(), PbfError> {
        match wire_type {
            WireType::Varint => self.read_varint().map(|_| ()),
            WireType::I64 => self.take(8).map(|_| ()),
            WireType::Len => self.read_len_range().map(|_| ()),
            WireType::I32 => self.take(4).map(|_| ()),
            WireType::StartGroup | WireType::EndGroup => {
                Err(PbfError::UnsupportedWireType(wire_type))
            }
        }
    }
}
