//! # MSR Backend
//!
//! Bit fields of 64-bit model-specific registers, optionally across several
//! logical CPUs.
//!
//! | Param | Meaning |
//! |-------|---------|
//! | `p1` | MSR address |
//! | `p2` | highest bit of the field |
//! | `p3` | lowest bit of the field |
//! | `p4` | affinity hint (`> 0` as a signed value enables CPU selection) |
//!
//! ## CPU selection
//!
//! The CPU selector is `0` (CPU 0 only), [`ALL_CPUS`] (every online CPU) or a
//! bitmap. Without a hint it is always `0`. With a hint:
//!
//! - GET takes the selector from a 4-byte `UINT32` request. Otherwise a
//!   scalar response selects CPU 0 after checking that every online CPU
//!   reports the same field value, and any other response selects all CPUs.
//! - SET takes the selector from the second dword of an 8-byte `UINT32`
//!   request (`{value, selector}`), and selects all CPUs otherwise.
//!
//! ## Multi-CPU responses
//!
//! Multi-CPU GETs need a `BINARY` response and emit, per CPU that could be
//! read, a 32-byte record: a `UINT64` variant holding the CPU number, a
//! `UINT64` variant holding the field value and 8 zero bytes.

use arrayvec::ArrayVec;
use esif_hal::cpu::{cpus_in, MAX_CPUS};
use esif_hal::{bit_range_mask, MsrAccess, ALL_CPUS};

use super::{check_bits, ActionBackend, ActionContext};
use crate::data::{variant, DataType, EsifData, VariantWriter};
use crate::error::{EsifError, EsifResult};
use crate::participant::Participant;
use crate::primitive::Action;

/// Bytes per CPU in a multi-CPU response
pub const MULTI_CPU_RECORD_LEN: u32 = 2 * variant::integer_len() + 8;

/// MSR backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsrBackend;

struct Field {
    msr: u32,
    bit_from: u8,
    bit_to: u8,
    hint: u32,
}

impl Field {
    fn decode(action: &Action) -> EsifResult<Self> {
        let field = Self {
            msr: action.p1(),
            bit_from: action.p3() as u8,
            bit_to: action.p2() as u8,
            hint: action.p4(),
        };
        check_bits(field.bit_from, field.bit_to, 64)?;
        Ok(field)
    }

    fn hinted(&self) -> bool {
        (self.hint as i32) > 0
    }

    fn mask(&self) -> u64 {
        bit_range_mask(self.bit_from, self.bit_to, 64)
    }

    fn extract(&self, raw: u64) -> u64 {
        (raw & self.mask()) >> self.bit_from
    }

    fn insert(&self, raw: u64, value: u64) -> u64 {
        let mask = self.mask();
        (raw & !mask) | ((value << self.bit_from) & mask)
    }

    /// Read-modify-write the field on CPU 0; caller holds the MSR lock
    fn write_cpu0(&self, msr: &dyn MsrAccess, value: u64) -> EsifResult<()> {
        let raw = msr.read(0, self.msr).map_err(|err| io_failure(self, 0, err))?;
        let merged = self.insert(raw, value);
        msr.write(0, self.msr, merged).map_err(|err| io_failure(self, 0, err))?;
        log::trace!("MSR: set 0x{:x} CPU 0 0x{:x} -> 0x{:x}", self.msr, raw, merged);
        Ok(())
    }
}

/// Write `value` into bits `bit_from..=bit_to` of `addr` on CPU 0
///
/// Used by CODE methods that program a register directly.
pub(crate) fn write_field(
    participant: &Participant,
    addr: u32,
    bit_from: u8,
    bit_to: u8,
    value: u64,
) -> EsifResult<()> {
    let msr = participant.platform().msr.as_deref().ok_or(EsifError::NotSupported)?;
    check_bits(bit_from, bit_to, 64)?;
    let field = Field {
        msr: addr,
        bit_from,
        bit_to,
        hint: 0,
    };
    let _guard = participant.locks().msr.lock();
    field.write_cpu0(msr, value)
}

fn is_scalar_response(ctx: &ActionContext<'_>, rsp: &EsifData) -> bool {
    matches!(
        rsp.ty,
        DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64
    ) || ctx.semantic_rsp.is_semantic()
}

/// Selector `cpus` expanded into a bitmap (non-positive means "all online")
fn target_mask(cpus: u32, msr: &dyn MsrAccess) -> u64 {
    if (cpus as i32) > 0 {
        cpus as u64
    } else {
        msr.online_cpus()
    }
}

fn io_failure(field: &Field, cpu: u32, err: esif_hal::HalError) -> EsifError {
    log::warn!("MSR: 0x{:x} on CPU {} failed: {}", field.msr, cpu, err);
    EsifError::HardwareIoFailure
}

impl MsrBackend {
    fn get_single(
        &self,
        ctx: &ActionContext<'_>,
        msr: &dyn MsrAccess,
        field: &Field,
        rsp: &mut EsifData,
    ) -> EsifResult<()> {
        let raw = {
            let _guard = ctx.participant.locks().msr.lock();
            if field.hinted() {
                check_same_value(msr, field)?;
            }
            msr.read(0, field.msr).map_err(|err| io_failure(field, 0, err))?
        };
        let value = field.extract(raw);
        log::trace!(
            "MSR: get 0x{:x}[{}:{}] CPU 0 -> 0x{:x}",
            field.msr,
            field.bit_to,
            field.bit_from,
            value
        );

        match rsp.ty {
            DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => {
                rsp.store_scalar(value)
            },
            DataType::Binary => {
                let dst = rsp.reserve(variant::integer_len())?;
                VariantWriter::new(dst).put_integer(DataType::Uint64, value)
            },
            _ => Err(EsifError::UnsupportedResultDataType),
        }
    }

    fn get_multi(
        &self,
        ctx: &ActionContext<'_>,
        msr: &dyn MsrAccess,
        field: &Field,
        cpus: u32,
        rsp: &mut EsifData,
    ) -> EsifResult<()> {
        if rsp.ty != DataType::Binary {
            return Err(EsifError::NeedBinaryBuffer);
        }
        let mask = target_mask(cpus, msr);

        let mut samples: ArrayVec<(u32, u64), { MAX_CPUS as usize }> = ArrayVec::new();
        let mut failed = 0u32;
        {
            let _guard = ctx.participant.locks().msr.lock();
            for cpu in cpus_in(mask) {
                match msr.read(cpu, field.msr) {
                    Ok(raw) => samples.push((cpu, field.extract(raw))),
                    Err(err) => {
                        log::debug!("MSR: 0x{:x} unreadable on CPU {}: {}", field.msr, cpu, err);
                        failed += 1;
                    },
                }
            }
        }
        log::trace!(
            "MSR: multi get 0x{:x} mask 0x{:x}: {} read, {} failed",
            field.msr,
            mask,
            samples.len(),
            failed
        );

        let dst = rsp.reserve(samples.len() as u32 * MULTI_CPU_RECORD_LEN)?;
        if samples.is_empty() {
            return Err(EsifError::HardwareIoFailure);
        }
        let mut writer = VariantWriter::new(dst);
        for (cpu, value) in samples {
            writer.put_integer(DataType::Uint64, cpu as u64)?;
            writer.put_integer(DataType::Uint64, value)?;
            writer.put_raw(&[0u8; 8])?;
        }
        Ok(())
    }
}

/// Fail with `MultiValueMismatch` unless every online CPU reports the same field
fn check_same_value(msr: &dyn MsrAccess, field: &Field) -> EsifResult<()> {
    let mut first: Option<u64> = None;
    for cpu in cpus_in(msr.online_cpus()) {
        let value = field.extract(msr.read(cpu, field.msr).map_err(|err| io_failure(field, cpu, err))?);
        match first {
            None => first = Some(value),
            Some(expected) if expected != value => {
                log::debug!(
                    "MSR: 0x{:x} differs on CPU {}: 0x{:x} != 0x{:x}",
                    field.msr,
                    cpu,
                    value,
                    expected
                );
                return Err(EsifError::MultiValueMismatch);
            },
            Some(_) => {},
        }
    }
    Ok(())
}

/// Value a SET writes, read at the width of the request type
fn request_value(req: &EsifData) -> EsifResult<u64> {
    let width = match req.ty {
        DataType::Uint8 => 1,
        DataType::Uint16 => 2,
        DataType::Uint32 | DataType::Power | DataType::Temperature | DataType::Time => 4,
        DataType::Uint64 | DataType::Binary => 8,
        _ => return Err(EsifError::UnsupportedRequestDataType),
    };
    req.scalar_with_width(width)
}

impl ActionBackend for MsrBackend {
    fn get(&self, ctx: &ActionContext<'_>, req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        let msr = ctx.participant.platform().msr.as_deref().ok_or(EsifError::NotSupported)?;
        let field = Field::decode(ctx.action)?;

        let cpus = if !field.hinted() {
            0
        } else if req.buf_len() == 4 && req.ty == DataType::Uint32 {
            req.read_u32().unwrap_or(0)
        } else if is_scalar_response(ctx, rsp) {
            0
        } else {
            ALL_CPUS
        };

        if cpus == 0 {
            self.get_single(ctx, msr, &field, rsp)
        } else {
            self.get_multi(ctx, msr, &field, cpus, rsp)
        }
    }

    fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        let msr = ctx.participant.platform().msr.as_deref().ok_or(EsifError::NotSupported)?;
        let field = Field::decode(ctx.action)?;
        let value = request_value(req)?;

        let cpus = if !field.hinted() {
            0
        } else if req.buf_len() == 8 && req.ty == DataType::Uint32 {
            req.u32_at(4).unwrap_or(ALL_CPUS)
        } else {
            ALL_CPUS
        };

        let _guard = ctx.participant.locks().msr.lock();
        if cpus == 0 {
            return field.write_cpu0(msr, value);
        }

        let mask = target_mask(cpus, msr);
        let (mut ok, mut failed) = (0u32, 0u32);
        for cpu in cpus_in(mask) {
            let result = msr
                .read(cpu, field.msr)
                .and_then(|raw| msr.write(cpu, field.msr, field.insert(raw, value)));
            match result {
                Ok(()) => ok += 1,
                Err(err) => {
                    log::debug!("MSR: 0x{:x} not written on CPU {}: {}", field.msr, cpu, err);
                    failed += 1;
                },
            }
        }
        log::trace!("MSR: multi set 0x{:x} mask 0x{:x}: {} written, {} failed", field.msr, mask, ok, failed);
        if ok == 0 {
            log::warn!("MSR: 0x{:x} could not be written on any CPU", field.msr);
            return Err(EsifError::HardwareIoFailure);
        }
        Ok(())
    }
}
