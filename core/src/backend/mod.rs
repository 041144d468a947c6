//! # Action Backends
//!
//! One backend per action type. Every backend implements [`ActionBackend`];
//! the dispatcher picks the variant of the closed [`Backend`] enum matching
//! the action and calls it with plain integer types, semantic re-tagging
//! having already been undone.
//!
//! ## Locking
//!
//! Register backends serialize their read-modify-write sequences with one
//! lock per backend type. Guards are scoped, so every exit path releases.

pub mod acpi;
pub mod code;
pub mod gfx;
pub mod iosf;
pub mod konst;
pub mod mmio;
pub mod msr;
pub mod systemio;
pub mod var;

use crate::catalog::Catalog;
use crate::data::{DataType, EsifData};
use crate::error::{EsifError, EsifResult};
use crate::participant::Participant;
use crate::primitive::{Action, ActionType, Primitive};

pub use acpi::{AcpiBackend, AcpiLpatBackend};
pub use code::CodeBackend;
pub use gfx::GfxBackend;
pub use iosf::IosfBackend;
pub use konst::KonstBackend;
pub use mmio::MmioBackend;
pub use msr::MsrBackend;
pub use systemio::SystemIoBackend;
pub use var::{VarBackend, VarStore};

/// Everything a backend may consult besides the request and response
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    /// Owning participant
    pub participant: &'a Participant,
    /// Catalog the primitive came from
    pub catalog: &'a Catalog,
    /// Primitive being executed
    pub primitive: &'a Primitive,
    /// Action being executed
    pub action: &'a Action,
    /// Response type as the caller asked for it, before re-tagging
    pub semantic_rsp: DataType,
}

/// Backend entry points
pub trait ActionBackend {
    /// Read into `rsp`
    fn get(&self, ctx: &ActionContext<'_>, req: &EsifData, rsp: &mut EsifData) -> EsifResult<()>;

    /// Write from `req`
    ///
    /// `req` is mutable for methods that report results back through the
    /// request structure (`_OSC`).
    fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        let _ = (ctx, req);
        Err(EsifError::OpcodeNotImplemented)
    }
}

/// Closed set of backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// ACPI method
    Acpi(AcpiBackend),
    /// ACPI `LPAT`
    AcpiLpat(AcpiLpatBackend),
    /// Constant
    Konst(KonstBackend),
    /// Hand-coded methods
    Code(CodeBackend),
    /// System I/O
    SystemIo(SystemIoBackend),
    /// Software variable
    Var(VarBackend),
    /// Sideband
    Iosf(IosfBackend),
    /// MMIO (also MMIOTJMAX)
    Mmio(MmioBackend),
    /// MSR
    Msr(MsrBackend),
    /// Graphics driver
    Gfx(GfxBackend),
}

impl Backend {
    /// Backend servicing `ty`
    pub fn for_action(ty: ActionType) -> EsifResult<Self> {
        Ok(match ty {
            ActionType::Acpi => Self::Acpi(AcpiBackend),
            ActionType::AcpiLpat => Self::AcpiLpat(AcpiLpatBackend),
            ActionType::Konst => Self::Konst(KonstBackend),
            ActionType::Kode => Self::Code(CodeBackend),
            ActionType::SystemIo => Self::SystemIo(SystemIoBackend),
            ActionType::Var => Self::Var(VarBackend),
            ActionType::Iosf => Self::Iosf(IosfBackend),
            ActionType::Mmio | ActionType::MmioTjmax => Self::Mmio(MmioBackend),
            ActionType::Msr => Self::Msr(MsrBackend),
            ActionType::DdiGfxPerf => Self::Gfx(GfxBackend::performance()),
            ActionType::DdiGfxDisp => Self::Gfx(GfxBackend::display()),
            ActionType::Unknown(code) => {
                log::debug!("Action: unsupported action type {}", code);
                return Err(EsifError::UnsupportedActionType);
            },
        })
    }

    fn backend(&self) -> &dyn ActionBackend {
        match self {
            Self::Acpi(b) => b,
            Self::AcpiLpat(b) => b,
            Self::Konst(b) => b,
            Self::Code(b) => b,
            Self::SystemIo(b) => b,
            Self::Var(b) => b,
            Self::Iosf(b) => b,
            Self::Mmio(b) => b,
            Self::Msr(b) => b,
            Self::Gfx(b) => b,
        }
    }

    /// Run the GET entry point
    pub fn get(&self, ctx: &ActionContext<'_>, req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        self.backend().get(ctx, req, rsp)
    }

    /// Run the SET entry point
    pub fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        self.backend().set(ctx, req)
    }
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Value a register SET writes, read at the width of the request type
///
/// 8/16/32-bit scalars and `TIME` are accepted; anything else is
/// `UnsupportedRequestDataType`.
pub(crate) fn register_request(req: &EsifData) -> EsifResult<u32> {
    match req.ty {
        DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Time => {
            Ok(req.scalar()? as u32)
        },
        _ => Err(EsifError::UnsupportedRequestDataType),
    }
}

/// Store a 32-bit register field into an 8/16/32-bit or `TIME` response
pub(crate) fn register_response(rsp: &mut EsifData, value: u32) -> EsifResult<()> {
    match rsp.ty {
        DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Time => {
            rsp.store_scalar(value as u64)
        },
        _ => Err(EsifError::UnsupportedResultDataType),
    }
}

/// Reject a bit range that is inverted or runs past a `width`-bit register
pub(crate) fn check_bits(bit_from: u8, bit_to: u8, width: u8) -> EsifResult<()> {
    if bit_from > bit_to || bit_to >= width {
        log::debug!("Action: bit range {}..={} invalid for {}-bit register", bit_from, bit_to, width);
        return Err(EsifError::OutOfBounds);
    }
    Ok(())
}

/// Narrow a bit field of a 32-bit register
#[inline]
pub(crate) fn extract32(raw: u32, bit_from: u8, bit_to: u8) -> u32 {
    let mask = esif_hal::bit_range_mask(bit_from, bit_to, 32) as u32;
    (raw & mask).checked_shr(bit_from as u32).unwrap_or(0)
}

/// Merge `value` into a bit field of a 32-bit register
#[inline]
pub(crate) fn insert32(raw: u32, bit_from: u8, bit_to: u8, value: u32) -> u32 {
    let mask = esif_hal::bit_range_mask(bit_from, bit_to, 32) as u32;
    let shifted = value.checked_shl(bit_from as u32).unwrap_or(0);
    (raw & !mask) | (shifted & mask)
}
