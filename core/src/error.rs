//! # Engine Errors
//!
//! Every primitive call resolves to `Ok(())` or one [`EsifError`]. Each
//! variant carries a stable numeric code (see [`EsifError::code`]) so results
//! can cross the manager boundary unchanged.
//!
//! ## Fallback semantics
//!
//! The executor walks a primitive's actions until one of them returns a
//! *terminal* result. `Ok`, [`EsifError::NeedLargerBuffer`] and
//! [`EsifError::PrimitiveNotFound`] are terminal; everything else lets the
//! next action try.

use core::fmt;

use esif_hal::{AcpiError, HalError};

/// Result type for engine operations
pub type EsifResult<T> = Result<T, EsifError>;

/// Engine error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsifError {
    // =========================================================================
    // Informational
    // =========================================================================
    /// Trip point method is legitimately absent (`_ACx`, `_PSV`, `_CRT`, ...)
    AcpiTripPointAbsent,
    /// Optional ACPI object is absent (`_STR`, `_UID`)
    AcpiObjectNotPresent,

    // =========================================================================
    // Generic
    // =========================================================================
    /// Feature is not implemented
    NotImplemented,
    /// Operation not supported by this object
    NotSupported,
    /// Required parameter missing
    NullParameter,
    /// Index, domain or bit range outside its valid range
    OutOfBounds,
    /// Allocation failed
    NoMemory,

    // =========================================================================
    // Primitive
    // =========================================================================
    /// No platform descriptor is loaded for the participant
    NeedDsp,
    /// Tuple is absent from the loaded descriptor
    PrimitiveNotFound,
    /// Primitive action failed to produce a value
    PrimitiveActionFailure,
    /// Backend cannot service this opcode
    OpcodeNotImplemented,

    // =========================================================================
    // Action
    // =========================================================================
    /// Action type is not known to the dispatcher
    UnsupportedActionType,
    /// Destination integer width too small
    OverflowedResultType,
    /// Request data type cannot be consumed by this action
    UnsupportedRequestDataType,
    /// Response data type cannot be produced by this action
    UnsupportedResultDataType,
    /// Request type invalid for this method
    InvalidRequestType,

    // =========================================================================
    // Buffers
    // =========================================================================
    /// Response too small; `data_len` holds the required size
    NeedLargerBuffer,
    /// Response must be binary for this request
    NeedBinaryBuffer,

    // =========================================================================
    // Hardware
    // =========================================================================
    /// Register access failed
    HardwareIoFailure,
    /// Targeted CPUs disagree on the masked register value
    MultiValueMismatch,
    /// Participant has no MMIO window
    NoMmioSupport,
    /// Participant has no sideband access
    NoIosfSupport,
    /// Participant has no graphics driver
    NoGfxSupport,
    /// Participant has no ACPI device node
    NoAcpiSupport,

    // =========================================================================
    // ACPI
    // =========================================================================
    /// ACPI object type cannot be converted to the requested type
    AcpiRequestType,
    /// ACPI evaluation failed
    AcpiEvalFailure,
    /// ACPI object not found
    AcpiObjectNotFound,
    /// Response is not a table
    NotTable,

    // =========================================================================
    // Unit transforms
    // =========================================================================
    /// Temperature unit of the request is unknown
    UnsupportedRequestTempType,
    /// Temperature unit of the response is unknown
    UnsupportedResultTempType,
    /// Power unit of the request is unknown
    UnsupportedRequestPowerType,
    /// Power unit of the response is unknown
    UnsupportedResultPowerType,
    /// Percent unit is unknown
    UnsupportedRequestPercentType,
    /// No algorithm registered for the action type
    NeedAlgorithm,
    /// Algorithm registered but its transform kind is unknown
    UnsupportedAlgorithm,
}

impl EsifError {
    /// Stable wire code of this error
    pub const fn code(self) -> u32 {
        match self {
            Self::AcpiTripPointAbsent => 100,
            Self::AcpiObjectNotPresent => 101,
            Self::NotImplemented => 1000,
            Self::NotSupported => 1002,
            Self::NoAcpiSupport => 1100,
            Self::AcpiRequestType => 1104,
            Self::AcpiEvalFailure => 1105,
            Self::AcpiObjectNotFound => 1106,
            Self::OverflowedResultType => 1201,
            Self::UnsupportedActionType => 1202,
            Self::UnsupportedRequestDataType => 1203,
            Self::UnsupportedResultDataType => 1204,
            Self::InvalidRequestType => 1205,
            Self::NeedLargerBuffer => 1300,
            Self::NeedBinaryBuffer => 1301,
            Self::NoMemory => 1800,
            Self::NoMmioSupport => 1900,
            Self::NoIosfSupport => 2000,
            Self::HardwareIoFailure => 2100,
            Self::MultiValueMismatch => 2101,
            Self::NullParameter => 2300,
            Self::OutOfBounds => 2301,
            Self::NeedDsp => 2401,
            Self::PrimitiveActionFailure => 2402,
            Self::NoGfxSupport => 2403,
            Self::PrimitiveNotFound => 2404,
            Self::OpcodeNotImplemented => 2405,
            Self::UnsupportedRequestTempType => 2500,
            Self::UnsupportedResultTempType => 2501,
            Self::NotTable => 2700,
            Self::UnsupportedRequestPowerType => 2800,
            Self::UnsupportedResultPowerType => 2801,
            Self::NeedAlgorithm => 2900,
            Self::UnsupportedAlgorithm => 2901,
            Self::UnsupportedRequestPercentType => 3300,
        }
    }

    /// Whether this result stops the action fallback loop
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::NeedLargerBuffer | Self::PrimitiveNotFound)
    }

    /// Whether this is an informational status rather than a failure
    pub const fn is_informational(self) -> bool {
        self.code() < 1000
    }
}

impl fmt::Display for EsifError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcpiTripPointAbsent => write!(f, "ACPI trip point not present"),
            Self::AcpiObjectNotPresent => write!(f, "optional ACPI object not present"),
            Self::NotImplemented => write!(f, "not implemented"),
            Self::NotSupported => write!(f, "operation not supported"),
            Self::NullParameter => write!(f, "parameter is null"),
            Self::OutOfBounds => write!(f, "parameter is out of bounds"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::NeedDsp => write!(f, "no platform descriptor loaded"),
            Self::PrimitiveNotFound => write!(f, "primitive not found in descriptor"),
            Self::PrimitiveActionFailure => write!(f, "primitive action failed"),
            Self::OpcodeNotImplemented => write!(f, "opcode not implemented"),
            Self::UnsupportedActionType => write!(f, "unsupported action type"),
            Self::OverflowedResultType => write!(f, "result does not fit the response type"),
            Self::UnsupportedRequestDataType => write!(f, "unsupported request data type"),
            Self::UnsupportedResultDataType => write!(f, "unsupported result data type"),
            Self::InvalidRequestType => write!(f, "invalid request type"),
            Self::NeedLargerBuffer => write!(f, "response buffer too small"),
            Self::NeedBinaryBuffer => write!(f, "response must be binary"),
            Self::HardwareIoFailure => write!(f, "register access failed"),
            Self::MultiValueMismatch => write!(f, "CPUs report different values"),
            Self::NoMmioSupport => write!(f, "no MMIO support"),
            Self::NoIosfSupport => write!(f, "no sideband support"),
            Self::NoGfxSupport => write!(f, "no graphics driver"),
            Self::NoAcpiSupport => write!(f, "no ACPI support"),
            Self::AcpiRequestType => write!(f, "ACPI object cannot be converted"),
            Self::AcpiEvalFailure => write!(f, "ACPI evaluation failed"),
            Self::AcpiObjectNotFound => write!(f, "ACPI object not found"),
            Self::NotTable => write!(f, "not a table"),
            Self::UnsupportedRequestTempType => write!(f, "unsupported request temperature unit"),
            Self::UnsupportedResultTempType => write!(f, "unsupported result temperature unit"),
            Self::UnsupportedRequestPowerType => write!(f, "unsupported request power unit"),
            Self::UnsupportedResultPowerType => write!(f, "unsupported result power unit"),
            Self::UnsupportedRequestPercentType => write!(f, "unsupported percent unit"),
            Self::NeedAlgorithm => write!(f, "no transform algorithm for action type"),
            Self::UnsupportedAlgorithm => write!(f, "transform algorithm not supported"),
        }
    }
}

impl From<HalError> for EsifError {
    fn from(err: HalError) -> Self {
        match err {
            HalError::OutOfBounds { .. } | HalError::Unaligned(_) => Self::OutOfBounds,
            HalError::NotSupported => Self::NotSupported,
            _ => Self::HardwareIoFailure,
        }
    }
}

impl From<AcpiError> for EsifError {
    fn from(err: AcpiError) -> Self {
        match err {
            AcpiError::NotFound => Self::AcpiObjectNotFound,
            AcpiError::BadArgument | AcpiError::Failure(_) => Self::AcpiEvalFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_set() {
        assert!(EsifError::NeedLargerBuffer.is_terminal());
        assert!(EsifError::PrimitiveNotFound.is_terminal());
        assert!(!EsifError::HardwareIoFailure.is_terminal());
        assert!(!EsifError::AcpiTripPointAbsent.is_terminal());
    }

    #[test]
    fn test_codes() {
        assert_eq!(EsifError::NeedLargerBuffer.code(), 1300);
        assert_eq!(EsifError::NeedDsp.code(), 2401);
        assert!(EsifError::AcpiObjectNotPresent.is_informational());
        assert!(!EsifError::AcpiEvalFailure.is_informational());
    }

    #[test]
    fn test_from_hal() {
        let err: EsifError = HalError::MsrFault { msr: 0x19C, cpu: 0 }.into();
        assert_eq!(err, EsifError::HardwareIoFailure);
        let err: EsifError = HalError::OutOfBounds { offset: 0x40, size: 0x40 }.into();
        assert_eq!(err, EsifError::OutOfBounds);
        let err: EsifError = AcpiError::Failure(5).into();
        assert_eq!(err, EsifError::AcpiEvalFailure);
    }
}
