//! # MMIO Backend
//!
//! Bit fields of 32-bit registers in the participant's MMIO window. Also
//! services MMIOTJMAX, which reads TjMax from the same window.
//!
//! | Param | Meaning |
//! |-------|---------|
//! | `p1` | byte offset into the window |
//! | `p2` | highest bit of the field |
//! | `p3` | lowest bit of the field |

use super::{check_bits, extract32, insert32, register_request, register_response};
use super::{ActionBackend, ActionContext};
use crate::data::EsifData;
use crate::error::{EsifError, EsifResult};
use crate::primitive::Action;

/// MMIO backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MmioBackend;

struct Field {
    offset: u32,
    bit_from: u8,
    bit_to: u8,
}

impl Field {
    fn decode(action: &Action) -> EsifResult<Self> {
        let field = Self {
            offset: action.p1(),
            bit_from: action.p3() as u8,
            bit_to: action.p2() as u8,
        };
        check_bits(field.bit_from, field.bit_to, 32)?;
        Ok(field)
    }
}

impl ActionBackend for MmioBackend {
    fn get(&self, ctx: &ActionContext<'_>, _req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        let window = ctx.participant.platform().mmio.as_ref().ok_or(EsifError::NoMmioSupport)?;
        let field = Field::decode(ctx.action)?;
        window.check(field.offset)?;

        let raw = {
            let _guard = ctx.participant.locks().mmio.lock();
            window.read32(field.offset)?
        };
        let value = extract32(raw, field.bit_from, field.bit_to);
        log::trace!(
            "MMIO: get 0x{:x}[{}:{}] raw 0x{:08x} -> 0x{:x}",
            field.offset,
            field.bit_to,
            field.bit_from,
            raw,
            value
        );
        register_response(rsp, value)
    }

    fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        let window = ctx.participant.platform().mmio.as_ref().ok_or(EsifError::NoMmioSupport)?;
        let field = Field::decode(ctx.action)?;
        window.check(field.offset)?;
        let value = register_request(req)?;

        let _guard = ctx.participant.locks().mmio.lock();
        let raw = window.read32(field.offset)?;
        let merged = insert32(raw, field.bit_from, field.bit_to, value);
        window.write32(field.offset, merged).map_err(|err| {
            log::warn!("MMIO: write 0x{:x} failed: {}", field.offset, err);
            EsifError::from(err)
        })?;
        log::trace!(
            "MMIO: set 0x{:x}[{}:{}] 0x{:08x} -> 0x{:08x}",
            field.offset,
            field.bit_to,
            field.bit_from,
            raw,
            merged
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{Harness, StallingMmio};
    use crate::data::DataType;
    use crate::participant::Platform;
    use crate::primitive::ActionType;
    use alloc::sync::Arc;
    use esif_hal::sim::SimMmio;

    fn field(offset: u32, bit_from: u32, bit_to: u32) -> Action {
        Action::new(ActionType::Mmio, [offset, bit_to, bit_from, 0, 0])
    }

    fn mmio_harness() -> (Arc<SimMmio>, Harness) {
        let window = Arc::new(SimMmio::new(0x100));
        let harness = Harness::with_platform(Platform::new().with_mmio(window.clone()));
        (window, harness)
    }

    #[test]
    fn test_get_nibble() {
        let (window, harness) = mmio_harness();
        window.poke(0x20, 0x0000_00A5);

        let mut rsp = EsifData::new(DataType::Uint8, 1);
        harness.get(&MmioBackend, &field(0x20, 4, 7), &mut rsp).unwrap();
        assert_eq!(rsp.data(), &[0xA]);
        assert_eq!(rsp.data_len, 1);
    }

    #[test]
    fn test_response_types() {
        let (window, harness) = mmio_harness();
        window.poke(0x0, 0xFFFF_FFFF);

        let mut rsp = EsifData::new(DataType::Uint16, 1);
        assert_eq!(
            harness.get(&MmioBackend, &field(0, 0, 31), &mut rsp),
            Err(EsifError::OverflowedResultType)
        );
        assert_eq!(rsp.data_len, 2);

        let mut rsp = EsifData::new(DataType::Uint64, 8);
        assert_eq!(
            harness.get(&MmioBackend, &field(0, 0, 31), &mut rsp),
            Err(EsifError::UnsupportedResultDataType)
        );
    }

    #[test]
    fn test_bit_isolation() {
        let (window, harness) = mmio_harness();
        for (bit_from, bit_to) in [(0u32, 0u32), (4, 7), (3, 17), (31, 31), (0, 31)] {
            let before = 0x5A5A_C3C3u32;
            window.poke(0x10, before);
            let mask = esif_hal::bit_range_mask(bit_from as u8, bit_to as u8, 32) as u32;

            let mut req = EsifData::from_u32(DataType::Uint32, 0xFFFF_FFFF);
            harness.set(&MmioBackend, &field(0x10, bit_from, bit_to), &mut req).unwrap();
            let after = window.peek(0x10);
            assert_eq!(after & !mask, before & !mask, "bits outside {}..={}", bit_from, bit_to);

            let mut rsp = EsifData::new(DataType::Uint32, 4);
            harness.get(&MmioBackend, &field(0x10, bit_from, bit_to), &mut rsp).unwrap();
            assert_eq!(rsp.read_u32(), Some(mask >> bit_from));
        }
    }

    #[test]
    fn test_window_errors() {
        let harness = Harness::new();
        let mut rsp = EsifData::new(DataType::Uint32, 4);
        assert_eq!(
            harness.get(&MmioBackend, &field(0, 0, 7), &mut rsp),
            Err(EsifError::NoMmioSupport)
        );

        let (_, harness) = mmio_harness();
        assert_eq!(
            harness.get(&MmioBackend, &field(0xFE, 0, 7), &mut rsp),
            Err(EsifError::OutOfBounds)
        );
        let mut req = EsifData::from_u32(DataType::Uint32, 1);
        assert_eq!(
            harness.set(&MmioBackend, &field(0x100, 0, 7), &mut req),
            Err(EsifError::OutOfBounds)
        );
    }

    #[test]
    fn test_set_rejects_wide_request() {
        let (window, harness) = mmio_harness();
        window.poke(0x4, 0x1234);
        let mut req = EsifData::from_u64(DataType::Uint64, 1);
        assert_eq!(
            harness.set(&MmioBackend, &field(0x4, 0, 3), &mut req),
            Err(EsifError::UnsupportedRequestDataType)
        );
        assert_eq!(window.peek(0x4), 0x1234);
    }

    fn set_field(harness: &Harness, bit_from: u32, bit_to: u32, value: u32) -> EsifResult<()> {
        let mut req = EsifData::from_u32(DataType::Uint32, value);
        harness.set(&MmioBackend, &field(0x10, bit_from, bit_to), &mut req)
    }

    #[test]
    fn test_concurrent_field_sets_same_participant() {
        let window = Arc::new(StallingMmio::new(0x100));
        let harness = Harness::with_platform(Platform::new().with_mmio(window.clone()));

        let (low, high) = window.stall.race(
            || set_field(&harness, 0, 7, 0xAA),
            || set_field(&harness, 8, 15, 0xBB),
        );
        assert_eq!(low, Ok(()));
        assert_eq!(high, Ok(()));
        assert_eq!(window.inner.peek(0x10), 0xBBAA);
    }

    #[test]
    fn test_concurrent_field_sets_across_participants() {
        let window = Arc::new(StallingMmio::new(0x100));
        let left = Harness::with_platform(Platform::new().with_mmio(window.clone()));
        let right = Harness::with_platform(Platform::new().with_mmio(window.clone()));

        let (low, high) = window.stall.race(
            || set_field(&left, 0, 7, 0xAA),
            || set_field(&right, 8, 15, 0xBB),
        );
        assert_eq!(low, Ok(()));
        assert_eq!(high, Ok(()));
        assert_eq!(window.inner.peek(0x10), 0xBBAA);
    }
}
