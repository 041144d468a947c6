//! # Graphics Driver Interface
//!
//! Integrated graphics performance state and display brightness are owned by
//! the display driver; the engine reaches them through this seam.

use crate::HalResult;

/// Control surface exposed by the graphics driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxControl {
    /// Graphics performance (P-state / frequency)
    Performance,
    /// Display (panel brightness and related controls)
    Display,
}

/// Graphics driver seam
pub trait GfxDriver: Send + Sync {
    /// Read setting `index` of `control`
    fn get(&self, control: GfxControl, index: u32) -> HalResult<u32>;

    /// Write setting `index` of `control`
    fn set(&self, control: GfxControl, index: u32, value: u32) -> HalResult<()>;
}
