//! # IOSF Backend
//!
//! Bit fields of 32-bit sideband registers reached through the message bus
//! interface (MBI).
//!
//! | Param | Meaning |
//! |-------|---------|
//! | `p1` | sideband port |
//! | `p2` | register within the port |
//! | `p3` | highest bit of the field |
//! | `p4` | lowest bit of the field |
//!
//! SET is a read-modify-write under the sideband lock.

use super::{check_bits, extract32, insert32, register_request, register_response};
use super::{ActionBackend, ActionContext};
use crate::data::EsifData;
use crate::error::{EsifError, EsifResult};

/// Sideband backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IosfBackend;

struct Field {
    port: u8,
    reg: u32,
    bit_from: u8,
    bit_to: u8,
}

impl Field {
    fn decode(ctx: &ActionContext<'_>) -> EsifResult<Self> {
        let action = ctx.action;
        let field = Self {
            port: action.p1() as u8,
            reg: action.p2(),
            bit_from: action.p4() as u8,
            bit_to: action.p3() as u8,
        };
        check_bits(field.bit_from, field.bit_to, 32)?;
        Ok(field)
    }
}

impl ActionBackend for IosfBackend {
    fn get(&self, ctx: &ActionContext<'_>, _req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        let mbi = ctx.participant.platform().iosf.as_ref().ok_or(EsifError::NoIosfSupport)?;
        let field = Field::decode(ctx)?;
        let raw = {
            let _guard = ctx.participant.locks().iosf.lock();
            mbi.mbi_read(field.port, field.reg).map_err(|err| {
                log::warn!("IOSF: read port 0x{:02x} reg 0x{:x} failed: {}", field.port, field.reg, err);
                EsifError::from(err)
            })?
        };
        let value = extract32(raw, field.bit_from, field.bit_to);
        log::trace!(
            "IOSF: get port 0x{:02x} reg 0x{:x}[{}:{}] -> 0x{:x}",
            field.port,
            field.reg,
            field.bit_to,
            field.bit_from,
            value
        );
        register_response(rsp, value)
    }

    fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        let mbi = ctx.participant.platform().iosf.as_ref().ok_or(EsifError::NoIosfSupport)?;
        let field = Field::decode(ctx)?;
        let value = register_request(req)?;

        let _guard = ctx.participant.locks().iosf.lock();
        let raw = mbi.mbi_read(field.port, field.reg)?;
        let merged = insert32(raw, field.bit_from, field.bit_to, value);
        mbi.mbi_write(field.port, field.reg, merged).map_err(|err| {
            log::warn!("IOSF: write port 0x{:02x} reg 0x{:x} failed: {}", field.port, field.reg, err);
            EsifError::from(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::Harness;
    use crate::data::DataType;
    use crate::participant::Platform;
    use crate::primitive::{Action, ActionType};
    use alloc::sync::Arc;
    use esif_hal::iosf::port;
    use esif_hal::sim::SimIosf;

    fn field(reg: u32, bit_from: u32, bit_to: u32) -> Action {
        Action::new(ActionType::Iosf, [port::PUNIT as u32, reg, bit_to, bit_from, 0])
    }

    #[test]
    fn test_get_field() {
        let mbi = Arc::new(SimIosf::new());
        mbi.poke(port::PUNIT, 0x66, 0x0000_3C00);
        let harness = Harness::with_platform(Platform::new().with_iosf(mbi));

        let mut rsp = EsifData::new(DataType::Uint32, 4);
        harness.get(&IosfBackend, &field(0x66, 8, 15), &mut rsp).unwrap();
        assert_eq!(rsp.read_u32(), Some(0x3C));
    }

    #[test]
    fn test_set_preserves_other_bits() {
        let mbi = Arc::new(SimIosf::new());
        mbi.poke(port::PUNIT, 0x70, 0xAAAA_AAAA);
        let harness = Harness::with_platform(Platform::new().with_iosf(mbi.clone()));

        let mut req = EsifData::from_u32(DataType::Uint32, 0x5);
        harness.set(&IosfBackend, &field(0x70, 0, 3), &mut req).unwrap();
        assert_eq!(mbi.peek(port::PUNIT, 0x70), 0xAAAA_AAA5);
    }

    #[test]
    fn test_no_sideband() {
        let harness = Harness::new();
        let mut rsp = EsifData::new(DataType::Uint32, 4);
        assert_eq!(
            harness.get(&IosfBackend, &field(0, 0, 7), &mut rsp),
            Err(EsifError::NoIosfSupport)
        );
    }
}
