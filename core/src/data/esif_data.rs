//! # Typed Request/Response Buffer
//!
//! [`EsifData`] is the generic buffer exchanged at the primitive call
//! boundary: a semantic type tag, a caller-sized buffer and the length
//! actually produced.
//!
//! ## Sizing contract
//!
//! `data_len` never describes bytes beyond the buffer. When a producer needs
//! more room than `buf_len` it stores the *required* length in `data_len` and
//! fails with [`EsifError::NeedLargerBuffer`] without writing, so the caller
//! can [`resize`](EsifData::resize) and issue the same call again.

use alloc::vec;
use alloc::vec::Vec;

use super::DataType;
use crate::error::{EsifError, EsifResult};

/// Typed request or response buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsifData {
    /// Semantic type tag
    pub ty: DataType,
    /// Bytes produced (or required, after `NeedLargerBuffer`)
    pub data_len: u32,
    buf: Vec<u8>,
}

impl EsifData {
    /// Zeroed buffer of `buf_len` bytes
    pub fn new(ty: DataType, buf_len: u32) -> Self {
        Self { ty, data_len: 0, buf: vec![0; buf_len as usize] }
    }

    /// Buffer holding `bytes`, all of them valid
    pub fn from_bytes(ty: DataType, bytes: Vec<u8>) -> Self {
        let data_len = bytes.len() as u32;
        Self { ty, data_len, buf: bytes }
    }

    /// Four-byte buffer holding `value`
    pub fn from_u32(ty: DataType, value: u32) -> Self {
        Self::from_bytes(ty, value.to_le_bytes().to_vec())
    }

    /// Eight-byte buffer holding `value`
    pub fn from_u64(ty: DataType, value: u64) -> Self {
        Self::from_bytes(ty, value.to_le_bytes().to_vec())
    }

    /// Empty request
    pub fn void() -> Self {
        Self::new(DataType::Void, 0)
    }

    /// Capacity in bytes
    #[inline]
    pub fn buf_len(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Whole buffer
    #[inline]
    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    /// Whole buffer, writable
    #[inline]
    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Valid bytes
    pub fn data(&self) -> &[u8] {
        let len = (self.data_len as usize).min(self.buf.len());
        &self.buf[..len]
    }

    /// Reallocate to `buf_len` zeroed bytes, keeping the type
    pub fn resize(&mut self, buf_len: u32) {
        self.buf = vec![0; buf_len as usize];
        self.data_len = 0;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Little-endian u16 at `offset`
    pub fn u16_at(&self, offset: usize) -> Option<u16> {
        let bytes = self.buf.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Little-endian u32 at `offset`
    pub fn u32_at(&self, offset: usize) -> Option<u32> {
        let bytes = self.buf.get(offset..offset + 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Some(u32::from_le_bytes(raw))
    }

    /// Little-endian u64 at `offset`
    pub fn u64_at(&self, offset: usize) -> Option<u64> {
        let bytes = self.buf.get(offset..offset + 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Some(u64::from_le_bytes(raw))
    }

    /// First u32 of the buffer
    #[inline]
    pub fn read_u32(&self) -> Option<u32> {
        self.u32_at(0)
    }

    /// Scalar value of a request, read at the width of its type
    ///
    /// Fails with `UnsupportedRequestDataType` for non-scalar types and
    /// `OverflowedResultType` when the buffer is shorter than the type.
    pub fn scalar(&self) -> EsifResult<u64> {
        let width = self.ty.scalar_width().ok_or(EsifError::UnsupportedRequestDataType)?;
        self.scalar_with_width(width)
    }

    /// Scalar value read at an explicit `width` (1, 2, 4 or 8 bytes)
    pub fn scalar_with_width(&self, width: u32) -> EsifResult<u64> {
        let value = match width {
            1 => self.buf.first().map(|b| *b as u64),
            2 => self.u16_at(0).map(u64::from),
            4 => self.u32_at(0).map(u64::from),
            8 => self.u64_at(0),
            _ => return Err(EsifError::UnsupportedRequestDataType),
        };
        value.ok_or(EsifError::OverflowedResultType)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Narrow `value` into the response width of this buffer's type
    ///
    /// `data_len` is set to the type width even when the buffer is too small,
    /// so the caller learns the size it needs.
    pub fn store_scalar(&mut self, value: u64) -> EsifResult<()> {
        let width = self.ty.scalar_width().ok_or(EsifError::UnsupportedResultDataType)?;
        self.store_with_width(width, value)
    }

    /// Narrow `value` into `width` bytes
    pub fn store_with_width(&mut self, width: u32, value: u64) -> EsifResult<()> {
        self.data_len = width;
        let dst = self
            .buf
            .get_mut(..width as usize)
            .ok_or(EsifError::OverflowedResultType)?;
        dst.copy_from_slice(&value.to_le_bytes()[..width as usize]);
        Ok(())
    }

    /// Overwrite the first `width` bytes in place without touching `data_len`
    pub fn patch_scalar(&mut self, width: u32, value: u64) -> EsifResult<()> {
        let dst = self
            .buf
            .get_mut(..width as usize)
            .ok_or(EsifError::OverflowedResultType)?;
        dst.copy_from_slice(&value.to_le_bytes()[..width as usize]);
        Ok(())
    }

    /// Copy `bytes` in as the whole response
    pub fn commit(&mut self, bytes: &[u8]) -> EsifResult<()> {
        self.data_len = bytes.len() as u32;
        let dst = self
            .buf
            .get_mut(..bytes.len())
            .ok_or(EsifError::NeedLargerBuffer)?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    /// Reserve `needed` bytes for a response, recording the requirement
    ///
    /// Returns the destination slice when it fits.
    pub fn reserve(&mut self, needed: u32) -> EsifResult<&mut [u8]> {
        self.data_len = needed;
        self.buf.get_mut(..needed as usize).ok_or(EsifError::NeedLargerBuffer)
    }
}
