//! # ACPI Object Unpacking
//!
//! Converts an evaluated ACPI object tree into the caller's response type in
//! two passes. [`Unpacker::required_len`] walks the tree and totals the bytes
//! every element needs; [`Unpacker::fill`] writes into a destination already
//! checked to be that large. Packages flatten in order.
//!
//! ## Element encodings
//!
//! | Object | `UINT8..UINT64` | `STRING` | `UNICODE` | `BINARY` |
//! |--------|-----------------|----------|-----------|----------|
//! | Integer | narrowed value | `0x..` text, `_UID` only | - | `UINT64` variant |
//! | String | raw text, `_UID` into `UINT32` only | text + NUL | - | `STRING` variant |
//! | Buffer | - | bytes (ASCII + NUL for `_STR`) | raw UTF-16, `_STR` only | `BINARY` variant |
//! | Reference | - | - | - | `STRING` variant of the path |
//! | Processor / PowerResource | - | - | - | `BINARY` variant of the record |
//!
//! Any other combination fails with `AcpiRequestType`.
//!
//! ## Tables
//!
//! A `TABLE` response carries only a [`TableHeader`]. [`TableShape`] derives
//! it from the tree: the outer package count gives the rows, nested package
//! counts the columns, and a leading `{Integer, Package, ...}` layout turns
//! the integer into the table revision.

use core::fmt::Write;

use esif_hal::{AcpiName, AcpiObject, AcpiObjectType};
use heapless::String as HexString;

use crate::data::{variant, DataType, TableHeader, VariantWriter, TABLE_NO_REVISION};
use crate::error::{EsifError, EsifResult};

/// Encoded size of a processor or power resource record
pub const OBJECT_RECORD_LEN: u32 = 24;

/// Method whose buffers hold UTF-16 text
const UNICODE_METHOD: AcpiName = AcpiName::new("_STR");

/// Method whose integers may be requested as text
const UID_METHOD: AcpiName = AcpiName::new("_UID");

/// UTF-16 code units up to the first NUL, plus one for the terminator
fn utf16_char_len(raw: &[u8]) -> u32 {
    let text = raw
        .chunks_exact(2)
        .position(|unit| unit == [0, 0])
        .unwrap_or(raw.len() / 2);
    text as u32 + 1
}

fn uid_text(value: u64) -> EsifResult<HexString<24>> {
    let mut text = HexString::new();
    write!(text, "0x{:x}", value as u32).map_err(|_| EsifError::NoMemory)?;
    Ok(text)
}

/// Little-endian record of a processor or power resource object
fn object_record(obj: &AcpiObject) -> [u8; OBJECT_RECORD_LEN as usize] {
    let mut out = [0u8; OBJECT_RECORD_LEN as usize];
    out[0..4].copy_from_slice(&(obj.object_type() as u32).to_le_bytes());
    match obj {
        AcpiObject::Processor { proc_id, pblk_address, pblk_length } => {
            out[4..8].copy_from_slice(&proc_id.to_le_bytes());
            out[8..16].copy_from_slice(&pblk_address.to_le_bytes());
            out[16..20].copy_from_slice(&pblk_length.to_le_bytes());
        },
        AcpiObject::PowerResource { system_level, resource_order } => {
            out[4..8].copy_from_slice(&system_level.to_le_bytes());
            out[8..12].copy_from_slice(&resource_order.to_le_bytes());
        },
        _ => {},
    }
    out
}

// =============================================================================
// UNPACKER
// =============================================================================

/// Converts one method's result into one response type
#[derive(Debug, Clone, Copy)]
pub struct Unpacker {
    method: AcpiName,
    ty: DataType,
}

impl Unpacker {
    /// Unpacker for `method` results requested as `ty`
    pub fn new(method: AcpiName, ty: DataType) -> Self {
        Self { method, ty }
    }

    fn is_unicode(&self) -> bool {
        self.method == UNICODE_METHOD
    }

    fn is_uid(&self) -> bool {
        self.method == UID_METHOD
    }

    /// Bytes needed to hold `obj`
    pub fn required_len(&self, obj: &AcpiObject) -> EsifResult<u32> {
        let len = match (obj, self.ty) {
            (AcpiObject::Package(elements), _) => {
                let mut total = 0u32;
                for element in elements {
                    total = total.saturating_add(self.required_len(element)?);
                }
                total
            },

            (AcpiObject::Integer(_), DataType::Uint8) => 1,
            (AcpiObject::Integer(_), DataType::Uint16) => 2,
            (AcpiObject::Integer(_), DataType::Uint32 | DataType::Time) => 4,
            (AcpiObject::Integer(_), DataType::Uint64 | DataType::Frequency) => 8,
            (AcpiObject::Integer(value), DataType::String) if self.is_uid() => {
                uid_text(*value)?.len() as u32 + 1
            },
            (AcpiObject::Integer(_), DataType::Binary) => variant::integer_len(),

            (AcpiObject::String(text), DataType::Uint32) if self.is_uid() => text.len() as u32,
            (AcpiObject::String(text), DataType::String) => text.len() as u32 + 1,
            (AcpiObject::String(text), DataType::Binary) => variant::bytes_len(text.len() as u32 + 1),

            (AcpiObject::Buffer(raw), DataType::String) => self.buffer_text_len(raw),
            (AcpiObject::Buffer(raw), DataType::Unicode) => {
                if !self.is_unicode() {
                    return Err(EsifError::InvalidRequestType);
                }
                raw.len() as u32
            },
            (AcpiObject::Buffer(raw), DataType::Binary) => variant::bytes_len(self.buffer_text_len(raw)),

            (AcpiObject::Reference(path), DataType::Binary) => variant::bytes_len(path.len() as u32 + 1),
            (AcpiObject::Processor { .. } | AcpiObject::PowerResource { .. }, DataType::Binary) => {
                variant::bytes_len(OBJECT_RECORD_LEN)
            },

            (obj, ty) => {
                log::debug!(
                    "ACPI: {} {:?} object cannot become {}",
                    self.method,
                    obj.object_type(),
                    ty
                );
                return Err(EsifError::AcpiRequestType);
            },
        };
        Ok(len)
    }

    fn buffer_text_len(&self, raw: &[u8]) -> u32 {
        if self.is_unicode() {
            utf16_char_len(raw)
        } else {
            raw.len() as u32
        }
    }

    /// Write `obj` into `dst`, which holds at least [`Self::required_len`] bytes
    ///
    /// Returns the number of bytes written.
    pub fn fill(&self, obj: &AcpiObject, dst: &mut [u8]) -> EsifResult<usize> {
        let mut offset = 0usize;
        self.fill_at(obj, dst, &mut offset)?;
        Ok(offset)
    }

    fn fill_at(&self, obj: &AcpiObject, dst: &mut [u8], offset: &mut usize) -> EsifResult<()> {
        if let AcpiObject::Package(elements) = obj {
            for element in elements {
                self.fill_at(element, dst, offset)?;
            }
            return Ok(());
        }

        let len = self.required_len(obj)? as usize;
        let out = dst
            .get_mut(*offset..*offset + len)
            .ok_or(EsifError::NeedLargerBuffer)?;
        match (obj, self.ty) {
            (AcpiObject::Integer(value), DataType::String) => {
                let text = uid_text(*value)?;
                out[..text.len()].copy_from_slice(text.as_bytes());
                out[text.len()] = 0;
            },
            (AcpiObject::Integer(value), DataType::Binary) => {
                VariantWriter::new(out).put_integer(DataType::Uint64, *value)?;
            },
            (AcpiObject::Integer(value), _) => {
                out.copy_from_slice(&value.to_le_bytes()[..len]);
            },

            (AcpiObject::String(text), DataType::Uint32) => out.copy_from_slice(text.as_bytes()),
            (AcpiObject::String(text), DataType::String) => {
                out[..text.len()].copy_from_slice(text.as_bytes());
                out[text.len()] = 0;
            },
            (AcpiObject::String(text), _) => {
                let (header, payload) = out.split_at_mut(variant::VARIANT_HEADER_LEN as usize);
                payload[..text.len()].copy_from_slice(text.as_bytes());
                payload[text.len()] = 0;
                write_bytes_header(header, DataType::String, payload.len() as u32);
            },

            (AcpiObject::Buffer(raw), DataType::Unicode) => out.copy_from_slice(raw),
            (AcpiObject::Buffer(raw), DataType::String) => self.copy_buffer_text(raw, out),
            (AcpiObject::Buffer(raw), _) => {
                let (header, payload) = out.split_at_mut(variant::VARIANT_HEADER_LEN as usize);
                self.copy_buffer_text(raw, payload);
                write_bytes_header(header, DataType::Binary, payload.len() as u32);
            },

            (AcpiObject::Reference(path), _) => {
                let (header, payload) = out.split_at_mut(variant::VARIANT_HEADER_LEN as usize);
                payload[..path.len()].copy_from_slice(path.as_bytes());
                payload[path.len()] = 0;
                write_bytes_header(header, DataType::String, payload.len() as u32);
            },

            (_, _) => {
                VariantWriter::new(out).put_bytes(DataType::Binary, &object_record(obj))?;
            },
        }
        *offset += len;
        Ok(())
    }

    /// ASCII text of `_STR` buffers (NUL terminated), raw bytes otherwise
    fn copy_buffer_text(&self, raw: &[u8], out: &mut [u8]) {
        if !self.is_unicode() {
            out.copy_from_slice(&raw[..out.len()]);
            return;
        }
        let Some((last, text)) = out.split_last_mut() else {
            return;
        };
        for (dst, unit) in text.iter_mut().zip(raw.chunks_exact(2)) {
            *dst = u16::from_le_bytes([unit[0], unit[1]]) as u8;
        }
        *last = 0;
    }
}

fn write_bytes_header(header: &mut [u8], ty: DataType, len: u32) {
    header[0..4].copy_from_slice(&ty.code().to_le_bytes());
    header[4..8].copy_from_slice(&len.to_le_bytes());
    header[8..12].fill(0);
}

// =============================================================================
// TABLE SHAPE
// =============================================================================

/// Row/column/revision shape of a package-of-packages result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableShape {
    revision: u16,
    rows: u16,
    cols: u16,
    types: [Option<AcpiObjectType>; 3],
}

impl TableShape {
    /// Scan `obj` in unpack order
    pub fn scan(obj: &AcpiObject) -> Self {
        let mut shape = Self {
            revision: TABLE_NO_REVISION,
            rows: 1,
            cols: 1,
            types: [None; 3],
        };
        if let AcpiObject::Package(elements) = obj {
            shape.rows = elements.len() as u16;
        }
        shape.visit(obj, false);
        shape.check_revision();
        shape
    }

    /// Rows come from the outer package only; nested packages give the columns
    fn visit(&mut self, obj: &AcpiObject, nested: bool) {
        if let Some(slot) = self.types.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(obj.object_type());
        }
        if let (AcpiObject::Integer(value), TABLE_NO_REVISION) = (obj, self.revision) {
            self.revision = *value as u16;
        }
        if let AcpiObject::Package(elements) = obj {
            if nested {
                self.cols = elements.len() as u16;
            }
            for element in elements {
                self.visit(element, true);
            }
        }
    }

    /// A leading revision integer is not a row
    fn check_revision(&mut self) {
        let revisioned = self.types
            == [
                Some(AcpiObjectType::Package),
                Some(AcpiObjectType::Integer),
                Some(AcpiObjectType::Package),
            ];
        if revisioned {
            self.rows = self.rows.saturating_sub(1);
        } else {
            self.revision = TABLE_NO_REVISION;
        }
    }

    /// Header for this shape; `NotTable` unless it has more than one row
    pub fn header(&self) -> EsifResult<TableHeader> {
        if self.rows <= 1 {
            return Err(EsifError::NotTable);
        }
        Ok(TableHeader {
            revision: self.revision as u8,
            rows: self.rows,
            cols: self.cols,
        })
    }
}
