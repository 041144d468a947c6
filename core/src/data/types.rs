//! Data type tags carried by every request and response buffer.

use core::fmt;

/// Semantic type of an [`EsifData`](super::EsifData) buffer
///
/// Tags map one-to-one onto the numeric codes used on the wire. Codes the
/// engine does not know survive as [`DataType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Unsigned 8-bit integer
    Uint8,
    /// Unsigned 16-bit integer
    Uint16,
    /// Unsigned 32-bit integer
    Uint32,
    /// Unsigned 64-bit integer
    Uint64,
    /// 16-byte GUID
    Guid,
    /// Temperature in the engine's semantic unit
    Temperature,
    /// Flattened array of variants or raw bytes
    Binary,
    /// NUL-terminated ASCII string
    String,
    /// UTF-16 string
    Unicode,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Register value
    Register,
    /// IPv4 address
    Ipv4,
    /// IPv6 address
    Ipv6,
    /// Pointer
    Pointer,
    /// Enumeration
    Enum,
    /// Opaque handle
    Handle,
    /// No data
    Void,
    /// Power in milli-Watts
    Power,
    /// Bit field
    Bit,
    /// Qualifier
    Qualifier,
    /// Percentage
    Percent,
    /// Instance number
    Instance,
    /// Time
    Time,
    /// Fixed-layout structure (`_OSC`, `_SCP`)
    Structure,
    /// Platform descriptor image
    Dsp,
    /// Opaque blob
    Blob,
    /// Table header followed by rows
    Table,
    /// Type chosen by the backend
    Auto,
    /// XML text
    Xml,
    /// Decibels
    Decibel,
    /// Frequency in Hz
    Frequency,
    /// Angle
    Angle,
    /// Code not known to this engine
    Other(u32),
}

impl DataType {
    /// Wire code of this type
    pub const fn code(self) -> u32 {
        match self {
            Self::Uint8 => 1,
            Self::Uint16 => 2,
            Self::Uint32 => 3,
            Self::Uint64 => 4,
            Self::Guid => 5,
            Self::Temperature => 6,
            Self::Binary => 7,
            Self::String => 8,
            Self::Unicode => 9,
            Self::Int8 => 11,
            Self::Int16 => 12,
            Self::Int32 => 13,
            Self::Int64 => 14,
            Self::Register => 15,
            Self::Ipv4 => 16,
            Self::Ipv6 => 17,
            Self::Pointer => 18,
            Self::Enum => 19,
            Self::Handle => 20,
            Self::Void => 24,
            Self::Power => 26,
            Self::Bit => 27,
            Self::Qualifier => 28,
            Self::Percent => 29,
            Self::Instance => 30,
            Self::Time => 31,
            Self::Structure => 32,
            Self::Dsp => 33,
            Self::Blob => 34,
            Self::Table => 35,
            Self::Auto => 36,
            Self::Xml => 38,
            Self::Decibel => 39,
            Self::Frequency => 40,
            Self::Angle => 41,
            Self::Other(code) => code,
        }
    }

    /// Decode a wire code
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Uint8,
            2 => Self::Uint16,
            3 => Self::Uint32,
            4 => Self::Uint64,
            5 => Self::Guid,
            6 => Self::Temperature,
            7 => Self::Binary,
            8 => Self::String,
            9 => Self::Unicode,
            11 => Self::Int8,
            12 => Self::Int16,
            13 => Self::Int32,
            14 => Self::Int64,
            15 => Self::Register,
            16 => Self::Ipv4,
            17 => Self::Ipv6,
            18 => Self::Pointer,
            19 => Self::Enum,
            20 => Self::Handle,
            24 => Self::Void,
            26 => Self::Power,
            27 => Self::Bit,
            28 => Self::Qualifier,
            29 => Self::Percent,
            30 => Self::Instance,
            31 => Self::Time,
            32 => Self::Structure,
            33 => Self::Dsp,
            34 => Self::Blob,
            35 => Self::Table,
            36 => Self::Auto,
            38 => Self::Xml,
            39 => Self::Decibel,
            40 => Self::Frequency,
            41 => Self::Angle,
            other => Self::Other(other),
        }
    }

    /// Byte width when this type is an unsigned scalar
    pub const fn scalar_width(self) -> Option<u32> {
        match self {
            Self::Uint8 => Some(1),
            Self::Uint16 => Some(2),
            Self::Uint32 | Self::Temperature | Self::Power | Self::Percent | Self::Time => Some(4),
            Self::Uint64 | Self::Frequency => Some(8),
            _ => None,
        }
    }

    /// Whether the dispatcher re-tags this type around a backend call
    pub const fn is_semantic(self) -> bool {
        matches!(self, Self::Temperature | Self::Power | Self::Percent)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "TYPE_{}", code),
            other => write!(f, "{:?}", other),
        }
    }
}
