//! RF tuning (`FNDG`): move the FIVR switching frequency away from a radio
//! channel.
//!
//! The request carries the target frequency. It must lie within the clip
//! percentages around the default center frequency; the offset from the
//! center is encoded as a signed 16.16 fraction of the center and written to
//! the register field `p2[p4..=p3]` on CPU 0.

use super::nested_get;
use crate::backend::{msr, ActionContext};
use crate::data::{DataType, EsifData};
use crate::error::{EsifError, EsifResult};
use crate::primitive::{id, INSTANCE_ANY};

/// `round(delta / center * 2^16)`, rounding half away from zero
pub fn encode_offset(delta: i64, center: i64) -> i64 {
    if delta >= 0 {
        ((delta << 17) + center) / (2 * center)
    } else {
        ((delta << 17) - center) / (2 * center)
    }
}

fn target_frequency(req: &EsifData) -> EsifResult<i64> {
    let value = match req.buf_len() {
        0..=3 => None,
        4..=7 => req.u32_at(0).map(u64::from),
        _ => req.u64_at(0),
    };
    value.map(|v| v as i64).ok_or(EsifError::OutOfBounds)
}

pub(super) fn set(ctx: &ActionContext<'_>, req: &EsifData) -> EsifResult<()> {
    let domain = ctx.primitive.tuple.domain;
    let get = |primitive, ty| nested_get(ctx, primitive, domain, INSTANCE_ANY, ty);

    if get(id::GET_PROC_RF_TUNING_AVAILABLE, DataType::Uint32)? == 0 {
        log::debug!("CODE: RF tuning not available");
        return Err(EsifError::NotSupported);
    }
    let center = get(id::GET_RFPROFILE_DEFAULT_CENTER_FREQUENCY, DataType::Frequency)? as i64;
    if center <= 0 {
        log::warn!("CODE: RF profile reports no center frequency");
        return Err(EsifError::PrimitiveActionFailure);
    }

    let delta = target_frequency(req)? - center;
    let factor = ctx.participant.config().percent_factor.max(1) as i64;
    let right = get(id::GET_RFPROFILE_CLIP_PERCENT_RIGHT, DataType::Percent)? as i64;
    let left = get(id::GET_RFPROFILE_CLIP_PERCENT_LEFT, DataType::Percent)? as i64;
    let right_limit = right * center / 100 / factor;
    let left_limit = left * center / 100 / factor;
    if delta < -left_limit || delta > right_limit {
        log::debug!(
            "CODE: RF offset {} outside [-{}, {}] around {}",
            delta,
            left_limit,
            right_limit,
            center
        );
        return Err(EsifError::OutOfBounds);
    }

    let encoded = encode_offset(delta, center);
    let action = ctx.action;
    log::debug!("CODE: RF offset {} from {} encoded 0x{:x}", delta, center, encoded as u16);
    msr::write_field(ctx.participant, action.p2(), action.p4() as u8, action.p3() as u8, encoded as u64)
}

#[cfg(test)]
mod tests {
    use super::super::tests::konst;
    use super::super::CodeBackend;
    use super::*;
    use crate::backend::testing::Harness;
    use crate::catalog::{Algorithm, DspImage, DspMetadata, PowerXform, TempXform};
    use crate::participant::Platform;
    use crate::primitive::{method_code, Action, ActionType, DOMAIN_D0};
    use alloc::sync::Arc;
    use esif_hal::msr::addr::MSR_FIVR_RFI_TUNING;
    use esif_hal::sim::SimMsr;

    fn fndg() -> Action {
        Action::new(ActionType::Kode, [method_code("FNDG"), MSR_FIVR_RFI_TUNING, 15, 0, 0])
    }

    fn rf_harness(available: u32) -> (Arc<SimMsr>, Harness) {
        let image = DspImage::new(DspMetadata::new("rf", 1, 0, 1))
            .algorithm(Algorithm::new(ActionType::Konst, TempXform::None, PowerXform::None))
            .primitive(konst(id::GET_PROC_RF_TUNING_AVAILABLE, DOMAIN_D0, INSTANCE_ANY, available))
            .primitive(konst(id::GET_RFPROFILE_DEFAULT_CENTER_FREQUENCY, DOMAIN_D0, INSTANCE_ANY, 2_400_000))
            .primitive(konst(id::GET_RFPROFILE_CLIP_PERCENT_RIGHT, DOMAIN_D0, INSTANCE_ANY, 5))
            .primitive(konst(id::GET_RFPROFILE_CLIP_PERCENT_LEFT, DOMAIN_D0, INSTANCE_ANY, 5));
        let msr = Arc::new(SimMsr::new(1));
        msr.poke(0, MSR_FIVR_RFI_TUNING, 0xABCD_0000);
        (msr.clone(), Harness::with_image(Platform::new().with_msr(msr), image))
    }

    fn set_target(harness: &Harness, freq: u64) -> EsifResult<()> {
        let mut req = EsifData::from_u64(DataType::Frequency, freq);
        harness.set(&CodeBackend, &fndg(), &mut req)
    }

    #[test]
    fn test_encode_offset() {
        assert_eq!(encode_offset(60_000, 2_400_000), 1638);
        assert_eq!(encode_offset(-60_000, 2_400_000), -1638);
        assert_eq!(encode_offset(0, 2_400_000), 0);
        // exactly half a step rounds away from zero
        assert_eq!(encode_offset(1, 131_072), 1);
    }

    #[test]
    fn test_programs_offset() {
        let (msr, harness) = rf_harness(1);
        set_target(&harness, 2_460_000).unwrap();
        assert_eq!(msr.peek(0, MSR_FIVR_RFI_TUNING), 0xABCD_0000 | 1638);

        set_target(&harness, 2_340_000).unwrap();
        assert_eq!(msr.peek(0, MSR_FIVR_RFI_TUNING), 0xABCD_0000 | (0x1_0000 - 1638));
    }

    #[test]
    fn test_clip_limits() {
        let (_, harness) = rf_harness(1);
        assert!(set_target(&harness, 2_520_000).is_ok());
        assert_eq!(set_target(&harness, 2_520_001), Err(EsifError::OutOfBounds));
        assert_eq!(set_target(&harness, 2_279_999), Err(EsifError::OutOfBounds));
    }

    #[test]
    fn test_requires_tuning_support() {
        let (msr, harness) = rf_harness(0);
        assert_eq!(set_target(&harness, 2_400_000), Err(EsifError::NotSupported));
        assert_eq!(msr.peek(0, MSR_FIVR_RFI_TUNING), 0xABCD_0000);
    }

    #[test]
    fn test_short_request() {
        let (_, harness) = rf_harness(1);
        let mut req = EsifData::from_bytes(DataType::Uint16, alloc::vec![0, 1]);
        assert_eq!(harness.set(&CodeBackend, &fndg(), &mut req), Err(EsifError::OutOfBounds));

        let mut req = EsifData::from_u32(DataType::Uint32, 2_410_000);
        assert!(harness.set(&CodeBackend, &fndg(), &mut req).is_ok());
    }
}
