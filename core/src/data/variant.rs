//! # Variant Wire Format
//!
//! Binary responses are flattened arrays of variants. Each element starts
//! with a packed 12-byte header:
//!
//! ```text
//! Integer element              Bytes element
//! +0   u32  type tag           +0   u32  type tag
//! +4   u64  value (LE)         +4   u32  payload length (LE)
//!                              +8   u32  reserved (0)
//!                              +12  payload bytes
//! ```
//!
//! Encoding is two-phase: callers add up [`integer_len`] / [`bytes_len`]
//! first, validate against the response buffer, then fill through a
//! [`VariantWriter`] over the validated slice.

use static_assertions::const_assert_eq;

use super::DataType;
use crate::error::{EsifError, EsifResult};

/// Size of a variant header
pub const VARIANT_HEADER_LEN: u32 = 12;

const_assert_eq!(VARIANT_HEADER_LEN, 4 + 8);

/// Encoded size of an integer element
#[inline]
pub const fn integer_len() -> u32 {
    VARIANT_HEADER_LEN
}

/// Encoded size of a bytes element with `payload` bytes
#[inline]
pub const fn bytes_len(payload: u32) -> u32 {
    VARIANT_HEADER_LEN + payload
}

/// One decoded element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant<'a> {
    /// Integer element
    Integer {
        /// Type tag
        ty: DataType,
        /// Value
        value: u64,
    },
    /// Length-prefixed element
    Bytes {
        /// Type tag
        ty: DataType,
        /// Payload
        data: &'a [u8],
    },
}

impl Variant<'_> {
    /// Integer value, if this is an integer element
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer { value, .. } => Some(*value),
            Self::Bytes { .. } => None,
        }
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Sequential variant encoder over a pre-sized destination
#[derive(Debug)]
pub struct VariantWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> VariantWriter<'a> {
    /// Writer starting at the beginning of `buf`
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> EsifResult<&mut [u8]> {
        let start = self.pos;
        let slot = self
            .buf
            .get_mut(start..start + len)
            .ok_or(EsifError::NeedLargerBuffer)?;
        self.pos += len;
        Ok(slot)
    }

    /// Append an integer element
    pub fn put_integer(&mut self, ty: DataType, value: u64) -> EsifResult<()> {
        let slot = self.take(VARIANT_HEADER_LEN as usize)?;
        slot[0..4].copy_from_slice(&ty.code().to_le_bytes());
        slot[4..12].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Append a length-prefixed element
    pub fn put_bytes(&mut self, ty: DataType, data: &[u8]) -> EsifResult<()> {
        let slot = self.take(bytes_len(data.len() as u32) as usize)?;
        slot[0..4].copy_from_slice(&ty.code().to_le_bytes());
        slot[4..8].copy_from_slice(&(data.len() as u32).to_le_bytes());
        slot[8..12].fill(0);
        slot[12..].copy_from_slice(data);
        Ok(())
    }

    /// Append raw bytes with no header
    pub fn put_raw(&mut self, data: &[u8]) -> EsifResult<()> {
        self.take(data.len())?.copy_from_slice(data);
        Ok(())
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Iterator over the elements of a flattened variant array
///
/// Scalar type tags decode as integers, everything else as length-prefixed
/// bytes. Iteration stops at the first truncated element.
#[derive(Debug, Clone)]
pub struct VariantIter<'a> {
    buf: &'a [u8],
}

impl<'a> VariantIter<'a> {
    /// Iterate the elements in `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}

impl<'a> Iterator for VariantIter<'a> {
    type Item = Variant<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.buf.get(..VARIANT_HEADER_LEN as usize)?;
        let ty = DataType::from_code(le_u32(&header[0..4]));

        if ty.scalar_width().is_some() {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&header[4..12]);
            self.buf = &self.buf[VARIANT_HEADER_LEN as usize..];
            return Some(Variant::Integer { ty, value: u64::from_le_bytes(raw) });
        }

        let len = le_u32(&header[4..8]) as usize;
        let end = VARIANT_HEADER_LEN as usize + len;
        let data = self.buf.get(VARIANT_HEADER_LEN as usize..end)?;
        self.buf = &self.buf[end..];
        Some(Variant::Bytes { ty, data })
    }
}
