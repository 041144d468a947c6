//! # ACPI Control Method Evaluation
//!
//! Owned model of the ACPI object tree returned by a control method and the
//! evaluator seam the engine calls to run one method on a participant's
//! device node.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

// =============================================================================
// NAMES
// =============================================================================

/// Four-character ACPI name segment (e.g. `_TMP`, `_PSV`, `PPCC`)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcpiName(pub [u8; 4]);

impl AcpiName {
    /// Build from a name literal; short names are padded with `_`
    pub const fn new(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut out = [b'_'; 4];
        let mut i = 0;
        while i < 4 && i < bytes.len() {
            out[i] = bytes[i];
            i += 1;
        }
        Self(out)
    }

    /// Unpack a name packed little-endian into a u32 (first char in the low byte)
    pub const fn from_u32(packed: u32) -> Self {
        Self(packed.to_le_bytes())
    }

    /// Pack into a u32, first char in the low byte
    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Name as text (non-ASCII bytes render as `?`)
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Check whether the name starts with `prefix`
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix.as_bytes())
    }
}

impl fmt::Debug for AcpiName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AcpiName({})", self.as_str())
    }
}

impl fmt::Display for AcpiName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// OBJECTS
// =============================================================================

/// ACPI object type codes (ACPICA numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AcpiObjectType {
    /// 64-bit integer
    Integer        = 0x01,
    /// ASCII string
    String         = 0x02,
    /// Raw byte buffer
    Buffer         = 0x03,
    /// Ordered list of objects
    Package        = 0x04,
    /// Power resource declaration
    PowerResource  = 0x0B,
    /// Processor declaration
    Processor      = 0x0C,
    /// Reference to a namespace node
    LocalReference = 0x14,
}

/// One node of an evaluated ACPI object tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcpiObject {
    /// Integer
    Integer(u64),
    /// String without NUL terminator
    String(String),
    /// Raw buffer
    Buffer(Vec<u8>),
    /// Package of nested objects
    Package(Vec<AcpiObject>),
    /// Reference to a namespace node, carried as its full pathname
    Reference(String),
    /// Processor object
    Processor {
        /// Processor id
        proc_id: u32,
        /// Processor block I/O address
        pblk_address: u64,
        /// Processor block length
        pblk_length: u32,
    },
    /// Power resource object
    PowerResource {
        /// Deepest system sleep level
        system_level: u32,
        /// Resource order
        resource_order: u32,
    },
}

impl AcpiObject {
    /// Type code of this object
    pub fn object_type(&self) -> AcpiObjectType {
        match self {
            Self::Integer(_) => AcpiObjectType::Integer,
            Self::String(_) => AcpiObjectType::String,
            Self::Buffer(_) => AcpiObjectType::Buffer,
            Self::Package(_) => AcpiObjectType::Package,
            Self::Reference(_) => AcpiObjectType::LocalReference,
            Self::Processor { .. } => AcpiObjectType::Processor,
            Self::PowerResource { .. } => AcpiObjectType::PowerResource,
        }
    }

    /// Integer value, if this is an integer
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// ACPI evaluation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcpiError {
    /// Method or object does not exist under the device node
    NotFound,
    /// Method exists but rejected the argument types
    BadArgument,
    /// Interpreter returned a failure status
    Failure(u32),
}

impl fmt::Display for AcpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "AE_NOT_FOUND"),
            Self::BadArgument => write!(f, "AE_BAD_PARAMETER"),
            Self::Failure(status) => write!(f, "ACPI status 0x{:x}", status),
        }
    }
}

/// Evaluates control methods on one participant's ACPI device node
pub trait AcpiEvaluator: Send + Sync {
    /// Evaluate `method` with `args`
    ///
    /// Returns `Ok(None)` when the method completed without a return value.
    fn evaluate(&self, method: AcpiName, args: &[AcpiObject]) -> Result<Option<AcpiObject>, AcpiError>;
}
