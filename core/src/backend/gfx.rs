//! DDIGFXPERF / DDIGFXDISP: settings owned by the graphics driver.
//!
//! `p1` selects the driver setting.

use esif_hal::GfxControl;

use super::{ActionBackend, ActionContext};
use crate::data::EsifData;
use crate::error::{EsifError, EsifResult};

/// Graphics driver backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxBackend {
    control: GfxControl,
}

impl GfxBackend {
    /// Performance control surface
    pub const fn performance() -> Self {
        Self { control: GfxControl::Performance }
    }

    /// Display control surface
    pub const fn display() -> Self {
        Self { control: GfxControl::Display }
    }

    /// Control surface this backend drives
    pub const fn control(&self) -> GfxControl {
        self.control
    }
}

impl ActionBackend for GfxBackend {
    fn get(&self, ctx: &ActionContext<'_>, _req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        let driver = ctx.participant.platform().gfx.as_ref().ok_or(EsifError::NoGfxSupport)?;
        let value = driver.get(self.control, ctx.action.p1()).map_err(|err| {
            log::warn!("Action: graphics {:?} get {} failed: {}", self.control, ctx.action.p1(), err);
            EsifError::from(err)
        })?;
        rsp.store_scalar(value as u64)
    }

    fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        let driver = ctx.participant.platform().gfx.as_ref().ok_or(EsifError::NoGfxSupport)?;
        let value = req.scalar()? as u32;
        driver.set(self.control, ctx.action.p1(), value).map_err(|err| {
            log::warn!("Action: graphics {:?} set {} failed: {}", self.control, ctx.action.p1(), err);
            EsifError::from(err)
        })
    }
}
