//! Codec Information Element
//!
//! The on-wire description of a codec capability or configuration: a fixed
//! size byte array whose first three bytes carry the length, the media type
//! and the codec type tag. Vendor codecs follow the tag with a 32-bit vendor
//! identifier and a 16-bit vendor codec identifier, both little endian.

use core::fmt;

use crate::constants::{
    AVDT_CODEC_SIZE, CODEC_INFO_CODEC_TYPE_OFFSET, CODEC_INFO_LEN_OFFSET,
    CODEC_INFO_MEDIA_TYPE_OFFSET, CODEC_INFO_PAYLOAD_OFFSET, MEDIA_TYPE_AUDIO,
    VENDOR_CODEC_ID_OFFSET, VENDOR_ID_OFFSET, VENDOR_MIN_LEN, VENDOR_PAYLOAD_OFFSET,
};

/// Media codec type tag (byte 2 of a codec information element)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CodecType {
    /// SBC (Sub-Band Coding) - Mandatory codec for A2DP
    Sbc = 0x00,
    /// MPEG-1,2 Audio (MP3)
    Mpeg12Audio = 0x01,
    /// MPEG-2,4 AAC
    Mpeg24Aac = 0x02,
    /// Vendor-specific codec, sub-tagged by vendor and codec identifiers
    VendorSpecific = 0xFF,
}

impl CodecType {
    /// Decode a raw codec type tag
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Sbc),
            0x01 => Some(Self::Mpeg12Audio),
            0x02 => Some(Self::Mpeg24Aac),
            0xFF => Some(Self::VendorSpecific),
            _ => None,
        }
    }
}

/// Vendor sub-tag of a vendor-specific codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VendorKey {
    /// Bluetooth SIG company identifier of the vendor
    pub vendor_id: u32,
    /// Vendor assigned codec identifier
    pub codec_id: u16,
}

impl VendorKey {
    /// Create a vendor key
    #[must_use]
    pub const fn new(vendor_id: u32, codec_id: u16) -> Self {
        Self {
            vendor_id,
            codec_id,
        }
    }

    /// Compare two keys in a const context
    #[must_use]
    pub const fn matches(&self, other: &Self) -> bool {
        self.vendor_id == other.vendor_id && self.codec_id == other.codec_id
    }
}

impl fmt::Display for VendorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}/{:#06x}", self.vendor_id, self.codec_id)
    }
}

/// Fixed size codec information element
///
/// Equality is byte exact over the whole buffer. Bytes past the length byte
/// are always zero for elements built by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecInfo([u8; AVDT_CODEC_SIZE]);

impl CodecInfo {
    /// All-zero element
    pub const EMPTY: Self = Self([0; AVDT_CODEC_SIZE]);

    /// Wrap a raw buffer
    #[must_use]
    pub const fn from_bytes(bytes: [u8; AVDT_CODEC_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy a received element
    ///
    /// Returns `None` if `bytes` is empty, longer than [`AVDT_CODEC_SIZE`] or
    /// shorter than its own length byte claims.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let len = *bytes.first()? as usize;
        if bytes.len() > AVDT_CODEC_SIZE || len + 1 > bytes.len() {
            return None;
        }
        let mut out = [0u8; AVDT_CODEC_SIZE];
        out[..=len].copy_from_slice(&bytes[..=len]);
        Some(Self(out))
    }

    /// Build a standard (SBC, MPEG) audio element from its family payload
    ///
    /// Payload bytes beyond the element capacity are dropped.
    #[must_use]
    pub const fn standard(codec_type: CodecType, payload: &[u8]) -> Self {
        let mut bytes = [0u8; AVDT_CODEC_SIZE];
        let mut i = 0;
        while i < payload.len() && CODEC_INFO_PAYLOAD_OFFSET + i < AVDT_CODEC_SIZE {
            bytes[CODEC_INFO_PAYLOAD_OFFSET + i] = payload[i];
            i += 1;
        }
        bytes[CODEC_INFO_LEN_OFFSET] = (CODEC_INFO_PAYLOAD_OFFSET - 1 + i) as u8;
        bytes[CODEC_INFO_MEDIA_TYPE_OFFSET] = MEDIA_TYPE_AUDIO << 4;
        bytes[CODEC_INFO_CODEC_TYPE_OFFSET] = codec_type as u8;
        Self(bytes)
    }

    /// Build a vendor-specific audio element from its family payload
    #[must_use]
    pub const fn vendor(key: VendorKey, payload: &[u8]) -> Self {
        let mut bytes = [0u8; AVDT_CODEC_SIZE];
        let vendor = key.vendor_id.to_le_bytes();
        let codec = key.codec_id.to_le_bytes();
        bytes[VENDOR_ID_OFFSET] = vendor[0];
        bytes[VENDOR_ID_OFFSET + 1] = vendor[1];
        bytes[VENDOR_ID_OFFSET + 2] = vendor[2];
        bytes[VENDOR_ID_OFFSET + 3] = vendor[3];
        bytes[VENDOR_CODEC_ID_OFFSET] = codec[0];
        bytes[VENDOR_CODEC_ID_OFFSET + 1] = codec[1];
        let mut i = 0;
        while i < payload.len() && VENDOR_PAYLOAD_OFFSET + i < AVDT_CODEC_SIZE {
            bytes[VENDOR_PAYLOAD_OFFSET + i] = payload[i];
            i += 1;
        }
        bytes[CODEC_INFO_LEN_OFFSET] = (VENDOR_PAYLOAD_OFFSET - 1 + i) as u8;
        bytes[CODEC_INFO_MEDIA_TYPE_OFFSET] = MEDIA_TYPE_AUDIO << 4;
        bytes[CODEC_INFO_CODEC_TYPE_OFFSET] = CodecType::VendorSpecific as u8;
        Self(bytes)
    }

    /// Raw buffer
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; AVDT_CODEC_SIZE] {
        &self.0
    }

    /// Bytes covered by the length byte, including the length byte itself
    #[must_use]
    pub fn wire_bytes(&self) -> &[u8] {
        let end = (self.len() + 1).min(AVDT_CODEC_SIZE);
        &self.0[..end]
    }

    /// Byte at `offset`, zero when out of range
    #[must_use]
    pub const fn byte(&self, offset: usize) -> u8 {
        if offset < AVDT_CODEC_SIZE {
            self.0[offset]
        } else {
            0
        }
    }

    /// Value of the length byte
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0[CODEC_INFO_LEN_OFFSET] as usize
    }

    /// True if the length byte is zero
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0[CODEC_INFO_LEN_OFFSET] == 0
    }

    /// Media type from the upper nibble of byte 1
    #[must_use]
    pub const fn media_type(&self) -> u8 {
        (self.0[CODEC_INFO_MEDIA_TYPE_OFFSET] >> 4) & 0x0F
    }

    /// Raw codec type tag
    #[must_use]
    pub const fn raw_codec_type(&self) -> u8 {
        self.0[CODEC_INFO_CODEC_TYPE_OFFSET]
    }

    /// Decoded codec type tag, `None` for unknown tags
    #[must_use]
    pub const fn codec_type(&self) -> Option<CodecType> {
        CodecType::from_u8(self.raw_codec_type())
    }

    /// Vendor sub-tag for vendor-specific elements long enough to carry one
    #[must_use]
    pub const fn vendor_key(&self) -> Option<VendorKey> {
        if self.raw_codec_type() != CodecType::VendorSpecific as u8
            || self.0[CODEC_INFO_LEN_OFFSET] < VENDOR_MIN_LEN
        {
            return None;
        }
        let b = &self.0;
        Some(VendorKey {
            vendor_id: u32::from_le_bytes([
                b[VENDOR_ID_OFFSET],
                b[VENDOR_ID_OFFSET + 1],
                b[VENDOR_ID_OFFSET + 2],
                b[VENDOR_ID_OFFSET + 3],
            ]),
            codec_id: u16::from_le_bytes([b[VENDOR_CODEC_ID_OFFSET], b[VENDOR_CODEC_ID_OFFSET + 1]]),
        })
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8; AVDT_CODEC_SIZE] {
        &mut self.0
    }
}

impl Default for CodecInfo {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<[u8; AVDT_CODEC_SIZE]> for CodecInfo {
    fn from(bytes: [u8; AVDT_CODEC_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for CodecInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.wire_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
