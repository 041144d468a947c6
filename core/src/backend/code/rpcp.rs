//! Graphics P-state table (`RPCP`).
//!
//! GET synthesizes the table from the RP0 (max), RP1 (efficient) and RPn
//! (min) capability points, stepping down from RP0 in fixed increments.
//! SET looks a table entry up by index and programs it through
//! `SET_GFX_RPCP`.

use alloc::vec::Vec;

use super::nested_get;
use crate::backend::ActionContext;
use crate::data::{variant, DataType, EsifData, Variant, VariantIter, VariantWriter};
use crate::error::{EsifError, EsifResult};
use crate::primitive::{id, Tuple};

/// Step between synthesized frequencies (MHz)
pub const FREQ_INCREMENT: u32 = 50;

/// Capability points are reported in units of this many MHz
pub const RPX_UNIT_MHZ: u32 = 50;

/// Frequency capability points (MHz)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqRange {
    /// Maximum frequency
    pub rp0: u32,
    /// Most efficient frequency
    pub rp1: u32,
    /// Minimum frequency
    pub rpn: u32,
    /// Step between table entries
    pub increment: u32,
}

impl FreqRange {
    /// Step actually used: a zero or oversized increment collapses the
    /// intermediate entries
    fn step(&self) -> u32 {
        if self.increment == 0 || self.increment > self.rp0 {
            self.rp0
        } else {
            self.increment
        }
    }

    fn is_ordered(&self) -> bool {
        self.rpn <= self.rp1 && self.rp1 <= self.rp0 && self.rp0 != 0
    }
}

/// Number of entries [`build_table`] emits for `range` (0 if the range is
/// unusable)
pub fn calc_num_freqs_in_range(range: &FreqRange) -> u32 {
    if !range.is_ordered() {
        return 0;
    }
    let step = range.step();
    let mut count = 1;
    if range.rp0 > range.rp1 {
        count += (range.rp0 - (range.rp1 + 1)) / step + 1;
    }
    if range.rp1 > range.rpn {
        count += (range.rp1 - (range.rpn + 1)) / step + 1;
    }
    count
}

/// Frequencies from RP0 down to RPn, RP1 and RPn always included
pub fn build_table(range: &FreqRange) -> EsifResult<Vec<u32>> {
    let count = calc_num_freqs_in_range(range);
    if count == 0 {
        log::warn!(
            "CODE: unusable graphics range rp0 {} rp1 {} rpn {}",
            range.rp0,
            range.rp1,
            range.rpn
        );
        return Err(EsifError::PrimitiveActionFailure);
    }
    let step = range.step() as usize;
    let mut table = Vec::with_capacity(count as usize);
    if range.rp0 > range.rp1 {
        table.extend((range.rp1 + 1..=range.rp0).rev().step_by(step));
    }
    if range.rp1 > range.rpn {
        table.extend((range.rpn + 1..=range.rp1).rev().step_by(step));
    }
    table.push(range.rpn);
    debug_assert_eq!(table.len(), count as usize);
    Ok(table)
}

fn read_range(ctx: &ActionContext<'_>) -> EsifResult<FreqRange> {
    let domain = ctx.primitive.tuple.domain;
    let mut points = [0u32; 3];
    for (instance, point) in points.iter_mut().enumerate() {
        let raw = nested_get(ctx, id::GET_PROC_RP_STATE_CAPABILITY, domain, instance as u8, DataType::Uint32)?;
        *point = (raw as u32).saturating_mul(RPX_UNIT_MHZ);
    }
    let [rp0, rp1, rpn] = points;
    Ok(FreqRange {
        rp0,
        rp1,
        rpn,
        increment: FREQ_INCREMENT.min(rp0),
    })
}

/// GET: the table as `UINT64` variants
pub(super) fn get_table(ctx: &ActionContext<'_>, rsp: &mut EsifData) -> EsifResult<()> {
    let range = read_range(ctx)?;
    log::trace!(
        "CODE: graphics rp0 {} rp1 {} rpn {} step {}",
        range.rp0,
        range.rp1,
        range.rpn,
        range.increment
    );
    let table = build_table(&range)?;

    let needed = table.len() as u32 * variant::integer_len();
    let have = rsp.buf_len();
    let dst = rsp.reserve(needed).map_err(|err| {
        log::debug!("CODE: P-state table needs {} bytes, have {}", needed, have);
        err
    })?;
    let mut writer = VariantWriter::new(dst);
    for freq in table {
        writer.put_integer(DataType::Uint64, freq as u64)?;
    }
    Ok(())
}

/// Perf-state table of the addressed domain, sized by a first empty call
fn read_perf_states(ctx: &ActionContext<'_>) -> EsifResult<EsifData> {
    let tuple = Tuple::new(
        id::GET_PERF_SUPPORT_STATES,
        ctx.primitive.tuple.domain,
        ctx.primitive.tuple.instance,
    );
    let mut states = EsifData::new(DataType::Binary, 0);
    match ctx.participant.execute_in(ctx.catalog, tuple, &mut EsifData::void(), &mut states, None) {
        Err(EsifError::NeedLargerBuffer) if states.data_len > 0 => {},
        other => {
            log::debug!("CODE: perf state sizing returned {:?}", other);
            return Err(EsifError::PrimitiveActionFailure);
        },
    }

    states.resize(states.data_len);
    ctx.participant
        .execute_in(ctx.catalog, tuple, &mut EsifData::void(), &mut states, None)
        .map_err(|err| {
            log::debug!("CODE: perf state read failed: {}", err);
            EsifError::PrimitiveActionFailure
        })?;
    Ok(states)
}

/// SET: program the P-state at the requested index
pub(super) fn set_state(ctx: &ActionContext<'_>, req: &EsifData) -> EsifResult<()> {
    let index = req.read_u32().ok_or(EsifError::UnsupportedRequestDataType)?;
    let states = read_perf_states(ctx)?;

    let entry = VariantIter::new(states.data())
        .nth(index as usize)
        .ok_or(EsifError::OutOfBounds)?;
    let freq = match entry {
        Variant::Integer {
            ty: DataType::Uint64,
            value,
        } => value,
        other => {
            log::debug!("CODE: P-state {} is not a UINT64 entry: {:?}", index, other);
            return Err(EsifError::PrimitiveActionFailure);
        },
    };

    let setting = (freq / RPX_UNIT_MHZ as u64) as u32;
    log::debug!("CODE: P-state {} ({} MHz) -> RPCP {}", index, freq, setting);
    let tuple = Tuple::new(id::SET_GFX_RPCP, ctx.primitive.tuple.domain, ctx.primitive.tuple.instance);
    ctx.participant.execute_in(
        ctx.catalog,
        tuple,
        &mut EsifData::from_u32(DataType::Uint32, setting),
        &mut EsifData::void(),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::super::tests::{code, konst};
    use super::super::CodeBackend;
    use super::*;
    use crate::backend::testing::Harness;
    use crate::catalog::{Algorithm, DspImage, DspMetadata, PowerXform, TempXform};
    use crate::participant::Platform;
    use crate::primitive::{Action, ActionType, Opcode, Primitive, DOMAIN_D1, INSTANCE_ANY};
    use alloc::sync::Arc;
    use alloc::vec;
    use esif_hal::sim::SimMmio;

    fn range(rp0: u32, rp1: u32, rpn: u32) -> FreqRange {
        FreqRange {
            rp0,
            rp1,
            rpn,
            increment: FREQ_INCREMENT,
        }
    }

    #[test]
    fn test_table_steps() {
        let r = range(1000, 800, 300);
        assert_eq!(calc_num_freqs_in_range(&r), 15);
        let table = build_table(&r).unwrap();
        assert_eq!(&table[..6], &[1000, 950, 900, 850, 800, 750]);
        assert_eq!(table.last(), Some(&300));
        assert_eq!(table.len(), 15);
    }

    #[test]
    fn test_table_degenerate_ranges() {
        assert_eq!(build_table(&range(500, 500, 500)).unwrap(), vec![500]);
        assert_eq!(build_table(&range(1000, 800, 800)).unwrap(), vec![1000, 950, 900, 850, 800]);
        // off-grid gap keeps both end points
        assert_eq!(build_table(&range(1000, 975, 975)).unwrap(), vec![1000, 975]);
        // RPn below the step
        assert_eq!(build_table(&range(100, 40, 0)).unwrap(), vec![100, 50, 40, 0]);
    }

    #[test]
    fn test_unordered_range() {
        assert_eq!(calc_num_freqs_in_range(&range(800, 1000, 300)), 0);
        assert_eq!(calc_num_freqs_in_range(&range(0, 0, 0)), 0);
        assert_eq!(build_table(&range(800, 900, 100)), Err(EsifError::PrimitiveActionFailure));
    }

    #[test]
    fn test_zero_increment() {
        let r = FreqRange {
            increment: 0,
            ..range(1000, 800, 300)
        };
        assert_eq!(build_table(&r).unwrap(), vec![1000, 800, 300]);
    }

    fn gfx_image() -> DspImage {
        DspImage::new(DspMetadata::new("gfx", 1, 0, 2))
            .algorithm(Algorithm::new(ActionType::Konst, TempXform::None, PowerXform::None))
            .primitive(konst(id::GET_PROC_RP_STATE_CAPABILITY, DOMAIN_D1, 0, 20))
            .primitive(konst(id::GET_PROC_RP_STATE_CAPABILITY, DOMAIN_D1, 1, 16))
            .primitive(konst(id::GET_PROC_RP_STATE_CAPABILITY, DOMAIN_D1, 2, 6))
            .primitive(Primitive::new(
                Tuple::new(id::GET_PERF_SUPPORT_STATES, DOMAIN_D1, INSTANCE_ANY),
                Opcode::Get,
                vec![code("RPCP")],
            ))
            .primitive(Primitive::new(
                Tuple::new(id::SET_GFX_RPCP, DOMAIN_D1, INSTANCE_ANY),
                Opcode::Set,
                vec![Action::new(ActionType::Mmio, [0x40, 31, 0, 0, 0])],
            ))
    }

    #[test]
    fn test_get_table_from_capabilities() {
        let harness = Harness::with_image(Platform::new(), gfx_image())
            .with_tuple(Tuple::new(id::GET_PERF_SUPPORT_STATES, DOMAIN_D1, INSTANCE_ANY), Opcode::Get);

        let mut rsp = EsifData::new(DataType::Binary, 0);
        assert_eq!(harness.get(&CodeBackend, &code("RPCP"), &mut rsp), Err(EsifError::NeedLargerBuffer));
        assert_eq!(rsp.data_len, 15 * 12);

        rsp.resize(rsp.data_len);
        harness.get(&CodeBackend, &code("RPCP"), &mut rsp).unwrap();
        let freqs: Vec<u64> = VariantIter::new(rsp.data()).filter_map(|v| v.as_integer()).collect();
        assert_eq!(freqs.len(), 15);
        assert_eq!((freqs[0], freqs[4], freqs[14]), (1000, 800, 300));
    }

    #[test]
    fn test_set_programs_selected_state() {
        let mmio = Arc::new(SimMmio::new(0x100));
        let harness = Harness::with_image(Platform::new().with_mmio(mmio.clone()), gfx_image())
            .with_tuple(Tuple::new(id::SET_GFX_RPCP, DOMAIN_D1, INSTANCE_ANY), Opcode::Set);

        let mut req = EsifData::from_u32(DataType::Uint32, 4);
        harness.set(&CodeBackend, &code("RPCP"), &mut req).unwrap();
        // entry 4 is RP1, 800 MHz
        assert_eq!(mmio.peek(0x40), 16);

        let mut req = EsifData::from_u32(DataType::Uint32, 15);
        assert_eq!(harness.set(&CodeBackend, &code("RPCP"), &mut req), Err(EsifError::OutOfBounds));
        let mut req = EsifData::new(DataType::Uint32, 2);
        assert_eq!(
            harness.set(&CodeBackend, &code("RPCP"), &mut req),
            Err(EsifError::UnsupportedRequestDataType)
        );
    }

    #[test]
    fn test_set_without_perf_states() {
        let harness = Harness::new().with_tuple(Tuple::new(id::SET_GFX_RPCP, DOMAIN_D1, INSTANCE_ANY), Opcode::Set);
        let mut req = EsifData::from_u32(DataType::Uint32, 0);
        assert_eq!(
            harness.set(&CodeBackend, &code("RPCP"), &mut req),
            Err(EsifError::PrimitiveActionFailure)
        );
    }
}
