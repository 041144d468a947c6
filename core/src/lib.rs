//! # ESIF Primitive Engine
//!
//! Resolves primitive tuples `(id, domain, instance)` against a participant's
//! loaded descriptor and executes the hardware actions behind them, with
//! unit normalization around every raw access.
//!
//! ## Components
//!
//! - **Catalog**: primitives, unit transform policies, events and the LPAT
//!   table of one loaded descriptor
//! - **Executor**: lookup plus the ordered action fallback chain
//! - **Dispatcher**: unit conversion and type re-tagging around one action
//! - **Backends**: ACPI, MSR, MMIO, IOSF, system I/O, graphics driver,
//!   constants, software variables and hand-coded methods
//! - **Transforms**: temperature, power and percent conversions
//! - **Participant**: hardware handles, domains, locks and the catalog slot
//!
//! ## Example
//!
//! ```ignore
//! let participant = Participant::new("TCPU", EngineConfig::default(), platform, domains);
//! participant.load_dsp(image)?;
//!
//! let mut rsp = EsifData::new(DataType::Temperature, 4);
//! participant.get_simple_primitive(id::GET_TEMPERATURE, DOMAIN_D0, INSTANCE_ANY, &mut rsp)?;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod backend;
pub mod catalog;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod executor;
pub mod participant;
pub mod primitive;
pub mod xform;

pub use catalog::{Algorithm, Catalog, DspImage, DspMetadata, DspParser, Event, PowerXform, TempXform};
pub use config::EngineConfig;
pub use data::{DataType, EsifData, Variant, VariantIter, VariantWriter};
pub use domain::{Domain, DomainCapability, DomainState, PollMask, TEMP_INVALID};
pub use error::{EsifError, EsifResult};
pub use participant::{Participant, Platform};
pub use primitive::{id, Action, ActionType, Opcode, Primitive, Tuple, DOMAIN_D0, DOMAIN_D1, DOMAIN_D2, INSTANCE_ANY};

/// Engine version information
pub const ENGINE_VERSION: EngineVersion = EngineVersion {
    major: 1,
    minor: 0,
    patch: 0,
    suffix: "",
};

/// Engine version structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Patch version
    pub patch: u16,
    /// Version suffix (e.g., "beta", "rc1")
    pub suffix: &'static str,
}

impl core::fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.suffix.is_empty() {
            write!(f, "-{}", self.suffix)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_version_display() {
        assert_eq!(ENGINE_VERSION.to_string(), "1.0.0");
        let rc = EngineVersion {
            suffix: "rc1",
            ..ENGINE_VERSION
        };
        assert_eq!(rc.to_string(), "1.0.0-rc1");
    }
}
