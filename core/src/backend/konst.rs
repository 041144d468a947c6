//! KONST: a constant carried in the action's first parameter.

use super::{ActionBackend, ActionContext};
use crate::data::EsifData;
use crate::error::{EsifError, EsifResult};

/// Constant backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KonstBackend;

impl ActionBackend for KonstBackend {
    fn get(&self, ctx: &ActionContext<'_>, _req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        let value = ctx.action.p1() as u64;
        if rsp.ty.scalar_width().is_some() {
            return rsp.store_scalar(value);
        }
        // untyped response: widest integer the buffer holds
        let width = [8u32, 4, 2, 1]
            .into_iter()
            .find(|w| *w <= rsp.buf_len())
            .ok_or_else(|| {
                rsp.data_len = 4;
                EsifError::NeedLargerBuffer
            })?;
        rsp.store_with_width(width, value)
    }
}
