//! Hardware Offload Descriptors
//!
//! When encoding runs outside the host stack, the negotiated configuration is
//! handed to the offload layer as a fixed 32 byte descriptor instead of the
//! on-wire element. SBC and AAC are plain byte remaps. Vendor codecs start
//! with their vendor and codec identifiers (little endian) followed by a
//! family specific block produced by an [`OffloadTranslator`].
//!
//! Translation works on a zeroed scratch buffer; the caller only ever sees a
//! complete descriptor or an error.

mod lhdc;

use core::fmt;

use crate::codec_info::{CodecInfo, CodecType, VendorKey};
use crate::config::CodecConfig;
use crate::constants::OFFLOAD_DESCRIPTOR_SIZE;
use crate::family::CodecRegistry;
use crate::family::ldac::{LDAC_KEY, QUALITY_HIGH, QUALITY_LOW, QUALITY_MID};
use crate::family::lhdc::{LHDC_V2_KEY, LHDC_V3_KEY, LHDC_V5_KEY};

pub use lhdc::{
    DATA_INTERVAL_10MS, DATA_INTERVAL_20MS, FRAME_DURATION_5000US, OFFLOAD_QUALITY_ABR,
    OFFLOAD_QUALITY_HIGH, OFFLOAD_QUALITY_HIGH1, OFFLOAD_QUALITY_LOW, OFFLOAD_QUALITY_LOW0,
    OFFLOAD_QUALITY_LOW1, OFFLOAD_QUALITY_LOW2, OFFLOAD_QUALITY_LOW3, OFFLOAD_QUALITY_LOW4,
    OFFLOAD_QUALITY_MID, SPEC1_AR, SPEC1_JAS, SPEC1_META, SPEC2_AR_ON, SPEC2_SPLIT, VER_LLAC,
    VER_V3_ONLY, VER_V4_ONLY,
};

/// LDAC offload quality: adaptive bitrate
pub const LDAC_OFFLOAD_QUALITY_ABR: u8 = 0x7F;

/// LDAC descriptor: quality mode
pub const LDAC_CFG_QUALITY: usize = 6;
/// LDAC descriptor: channel mode byte of the element
pub const LDAC_CFG_CHANNEL_MODE: usize = 7;

/// Offload translation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OffloadError {
    /// The element is not a valid encoder configuration
    InvalidCodecConfig,
    /// Version tag outside the supported set
    UnsupportedVersion(u8),
    /// Channel split mode outside the supported set
    UnsupportedSplitMode(u8),
    /// Frame duration outside the supported set
    UnsupportedFrameDuration(u8),
}

impl fmt::Display for OffloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCodecConfig => write!(f, "Codec configuration cannot be offloaded"),
            Self::UnsupportedVersion(v) => write!(f, "Unsupported codec version {v:#x}"),
            Self::UnsupportedSplitMode(m) => write!(f, "Unsupported channel split mode {m:#x}"),
            Self::UnsupportedFrameDuration(d) => write!(f, "Unsupported frame duration {d:#x}"),
        }
    }
}

/// Fixed size offload descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OffloadDescriptor([u8; OFFLOAD_DESCRIPTOR_SIZE]);

impl OffloadDescriptor {
    /// All-zero descriptor
    pub const EMPTY: Self = Self([0; OFFLOAD_DESCRIPTOR_SIZE]);

    /// Raw bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; OFFLOAD_DESCRIPTOR_SIZE] {
        &self.0
    }

    /// Byte at `offset`, zero when out of range
    #[must_use]
    pub const fn byte(&self, offset: usize) -> u8 {
        if offset < OFFLOAD_DESCRIPTOR_SIZE {
            self.0[offset]
        } else {
            0
        }
    }

    /// Little endian 16-bit value at `offset`
    #[must_use]
    pub const fn u16_le(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.byte(offset), self.byte(offset + 1)])
    }
}

impl Default for OffloadDescriptor {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Family specific part of a vendor descriptor
///
/// Receives the element, the resolved configuration (for codec specific
/// fields) and a scratch buffer whose vendor header is already written.
pub type TranslateFn =
    fn(&CodecInfo, &CodecConfig, &mut [u8; OFFLOAD_DESCRIPTOR_SIZE]) -> Result<(), OffloadError>;

/// Offload translator registered for one vendor codec
#[derive(Debug, Clone, Copy)]
pub struct OffloadTranslator {
    /// Vendor codec the translator serves
    pub key: VendorKey,
    /// Translation function
    pub translate: TranslateFn,
}

/// Translators for the built-in vendor families
pub static BUILTIN_TRANSLATORS: [OffloadTranslator; 4] = [
    OffloadTranslator {
        key: LDAC_KEY,
        translate: translate_ldac,
    },
    OffloadTranslator {
        key: LHDC_V3_KEY,
        translate: lhdc::translate_v3,
    },
    OffloadTranslator {
        key: LHDC_V2_KEY,
        translate: lhdc::translate_v2,
    },
    OffloadTranslator {
        key: LHDC_V5_KEY,
        translate: lhdc::translate_v5,
    },
];

/// Build the offload descriptor for a negotiated encoder configuration
///
/// `config` supplies the codec specific fields the element does not carry
/// (LDAC and LHDC quality). Codec types without an offload layout produce an
/// all-zero descriptor.
///
/// # Errors
/// [`OffloadError::InvalidCodecConfig`] if `ota` is not a valid encoder
/// element, or the vendor translator's own error.
pub fn codec_specific_config(
    registry: &CodecRegistry,
    ota: &CodecInfo,
    config: &CodecConfig,
) -> Result<OffloadDescriptor, OffloadError> {
    if !registry.is_source_codec_valid(ota) {
        return Err(OffloadError::InvalidCodecConfig);
    }
    let mut scratch = [0u8; OFFLOAD_DESCRIPTOR_SIZE];
    match ota.codec_type() {
        Some(CodecType::Sbc) => {
            // blocks | subbands | allocation, min bitpool, max bitpool,
            // frequency | channel mode
            scratch[0] = ota.byte(4);
            scratch[1] = ota.byte(5);
            scratch[2] = ota.byte(6);
            scratch[3] = ota.byte(3);
        }
        Some(CodecType::Mpeg24Aac) => {
            // object type, VBR | bitrate high bits
            scratch[0] = ota.byte(3);
            scratch[1] = ota.byte(6);
        }
        Some(CodecType::VendorSpecific) => {
            let key = ota.vendor_key().ok_or(OffloadError::InvalidCodecConfig)?;
            scratch[..4].copy_from_slice(&key.vendor_id.to_le_bytes());
            scratch[4..6].copy_from_slice(&key.codec_id.to_le_bytes());
            if let Some(translator) = registry.translator(&key) {
                (translator.translate)(ota, config, &mut scratch)?;
            }
        }
        Some(CodecType::Mpeg12Audio) | None => {}
    }
    Ok(OffloadDescriptor(scratch))
}

/// Map the LDAC quality mode in codec specific field 1 to its offload code
#[must_use]
pub const fn ldac_offload_quality(codec_specific_1: i64) -> u8 {
    if codec_specific_1 == 0 {
        return LDAC_OFFLOAD_QUALITY_ABR;
    }
    match codec_specific_1 % 10 {
        0 => (QUALITY_HIGH % 10) as u8,
        1 => (QUALITY_MID % 10) as u8,
        2 => (QUALITY_LOW % 10) as u8,
        _ => LDAC_OFFLOAD_QUALITY_ABR,
    }
}

fn translate_ldac(
    ota: &CodecInfo,
    config: &CodecConfig,
    out: &mut [u8; OFFLOAD_DESCRIPTOR_SIZE],
) -> Result<(), OffloadError> {
    out[LDAC_CFG_QUALITY] = ldac_offload_quality(config.codec_specific_1);
    out[LDAC_CFG_CHANNEL_MODE] = ota.byte(10);
    trace!(
        "[OFFLOAD] LDAC quality {:x} channel mode {:x}",
        out[LDAC_CFG_QUALITY],
        out[LDAC_CFG_CHANNEL_MODE]
    );
    Ok(())
}
