//! Fixed-layout structures exchanged through `STRUCTURE` and `TABLE` data.
//!
//! All layouts are packed little-endian; offsets are listed on each codec.

use static_assertions::const_assert_eq;

use crate::error::{EsifError, EsifResult};

/// GUID length in bytes
pub const GUID_LEN: usize = 16;

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

// =============================================================================
// _OSC
// =============================================================================

/// `_OSC` capability negotiation request
///
/// ```text
/// +0   guid[16]
/// +16  revision      u32
/// +20  count         u32   dwords in the capabilities buffer
/// +24  status        u32   first capabilities dword, rewritten by firmware
/// +28  capabilities  u32
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OscRequest {
    /// Interface GUID
    pub guid: [u8; GUID_LEN],
    /// Interface revision
    pub revision: u32,
    /// Number of capability dwords
    pub count: u32,
    /// Status dword
    pub status: u32,
    /// Capability mask
    pub capabilities: u32,
}

impl OscRequest {
    /// Encoded length
    pub const LEN: usize = 32;

    /// Offset of the status dword
    pub const STATUS_OFFSET: usize = 24;

    /// Decode from exactly [`Self::LEN`] bytes
    pub fn decode(bytes: &[u8]) -> EsifResult<Self> {
        if bytes.len() != Self::LEN {
            return Err(EsifError::InvalidRequestType);
        }
        let mut guid = [0u8; GUID_LEN];
        guid.copy_from_slice(&bytes[..GUID_LEN]);
        Ok(Self {
            guid,
            revision: le_u32(bytes, 16),
            count: le_u32(bytes, 20),
            status: le_u32(bytes, 24),
            capabilities: le_u32(bytes, 28),
        })
    }

    /// Capability dwords handed to firmware, starting at `status`
    ///
    /// `count` beyond the two carried dwords is clamped.
    pub fn capability_words(&self) -> impl Iterator<Item = u32> {
        let words = [self.status, self.capabilities];
        let count = (self.count as usize).min(words.len());
        words.into_iter().take(count)
    }
}

const_assert_eq!(OscRequest::LEN, GUID_LEN + 4 * 4);

// =============================================================================
// _SCP
// =============================================================================

/// `_SCP` cooling policy request (three u32 at +0, +4, +8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScpRequest {
    /// 0 = active, 1 = passive
    pub cooling_mode: u32,
    /// Acoustic limit, 1..=5
    pub acoustic_limit: u32,
    /// Power limit, 1..=5
    pub power_limit: u32,
}

impl ScpRequest {
    /// Encoded length
    pub const LEN: usize = 12;

    /// Decode from exactly [`Self::LEN`] bytes
    pub fn decode(bytes: &[u8]) -> EsifResult<Self> {
        if bytes.len() != Self::LEN {
            return Err(EsifError::InvalidRequestType);
        }
        Ok(Self {
            cooling_mode: le_u32(bytes, 0),
            acoustic_limit: le_u32(bytes, 4),
            power_limit: le_u32(bytes, 8),
        })
    }
}

// =============================================================================
// TABLE
// =============================================================================

/// Revision value meaning "table carries no revision"
pub const TABLE_NO_REVISION: u16 = 0xFFFF;

/// Table header returned for `TABLE` responses
///
/// ```text
/// +0  revision  u8
/// +1  rows      u16
/// +3  cols      u16
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    /// Table revision (low byte)
    pub revision: u8,
    /// Row count
    pub rows: u16,
    /// Column count
    pub cols: u16,
}

impl TableHeader {
    /// Encoded length
    pub const LEN: usize = 5;

    /// Encode into the first [`Self::LEN`] bytes of `dst`
    pub fn encode(&self, dst: &mut [u8]) -> EsifResult<()> {
        let dst = dst.get_mut(..Self::LEN).ok_or(EsifError::NeedLargerBuffer)?;
        dst[0] = self.revision;
        dst[1..3].copy_from_slice(&self.rows.to_le_bytes());
        dst[3..5].copy_from_slice(&self.cols.to_le_bytes());
        Ok(())
    }

    /// Decode from the first [`Self::LEN`] bytes of `src`
    pub fn decode(src: &[u8]) -> Option<Self> {
        let src = src.get(..Self::LEN)?;
        Some(Self {
            revision: src[0],
            rows: u16::from_le_bytes([src[1], src[2]]),
            cols: u16::from_le_bytes([src[3], src[4]]),
        })
    }
}

const_assert_eq!(TableHeader::LEN, 1 + 2 + 2);

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn osc_bytes(count: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0xAB; 16]);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0x3u32.to_le_bytes());
        bytes
    }

    #[test]
    fn test_osc_decode() {
        let osc = OscRequest::decode(&osc_bytes(2)).unwrap();
        assert_eq!(osc.revision, 1);
        assert_eq!(osc.capabilities, 3);
        let words: Vec<u32> = osc.capability_words().collect();
        assert_eq!(words, [0, 3]);
        assert_eq!(OscRequest::decode(&[0; 31]), Err(EsifError::InvalidRequestType));
    }

    #[test]
    fn test_scp_decode() {
        let mut bytes = Vec::new();
        for v in [1u32, 3, 5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let scp = ScpRequest::decode(&bytes).unwrap();
        assert_eq!((scp.cooling_mode, scp.acoustic_limit, scp.power_limit), (1, 3, 5));
    }

    #[test]
    fn test_table_header_layout() {
        let mut buf = [0u8; 5];
        TableHeader { revision: 2, rows: 0x0102, cols: 5 }.encode(&mut buf).unwrap();
        assert_eq!(buf, [2, 0x02, 0x01, 5, 0]);
        assert_eq!(TableHeader::decode(&buf).map(|h| h.rows), Some(0x0102));
        assert!(TableHeader { revision: 0, rows: 0, cols: 0 }.encode(&mut [0u8; 4]).is_err());
    }
}
