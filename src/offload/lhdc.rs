//! LHDC offload descriptors
//!
//! | byte   | field |
//! |--------|-------|
//! | 6      | version selector |
//! | 7, 8   | bitrate (LE) |
//! | 9, 10  | max bitrate (LE) |
//! | 11, 12 | min bitrate (LE) |
//! | 13     | frame duration |
//! | 14     | data interval in ms |
//! | 15     | feature flags |
//! | 16     | split and action flags |

use crate::codec_info::CodecInfo;
use crate::config::CodecConfig;
use crate::constants::OFFLOAD_DESCRIPTOR_SIZE;
use crate::family::lhdc::{
    CH_SPLIT_MASK, CH_SPLIT_NONE, CH_SPLIT_TWS, FEATURE_AR, FEATURE_JAS, FEATURE_LL, FEATURE_LLAC,
    FEATURE_META, FEATURE_MIN_BR, FEATURE_V4, MAX_BIT_RATE_400K, MAX_BIT_RATE_500K,
    MAX_BIT_RATE_MASK, QUALITY_HIGH, QUALITY_HIGH1, QUALITY_LOW, QUALITY_LOW0,
    QUALITY_LOW1, QUALITY_LOW2, QUALITY_LOW3, QUALITY_LOW4, QUALITY_MID, V5_AR_ON, V5_FEATURE_AR,
    V5_FEATURE_JAS, V5_FEATURE_LL, V5_FEATURE_META, V5_FRAME_LEN_MASK, V5_MAX_BIT_RATE_400K,
    V5_MAX_BIT_RATE_500K, V5_MAX_BIT_RATE_900K, V5_MAX_BIT_RATE_MASK, V5_MIN_BIT_RATE_64K,
    V5_MIN_BIT_RATE_128K, V5_MIN_BIT_RATE_256K, V5_MIN_BIT_RATE_MASK, V5_VER1, V5_VERSION_MASK,
    VER2, VER3, VER6, VERSION_MASK,
};

use super::OffloadError;

const CFG_VER: usize = 6;
const CFG_BITRATE: usize = 7;
const CFG_MAX_BITRATE: usize = 9;
const CFG_MIN_BITRATE: usize = 11;
const CFG_FRAME_DURATION: usize = 13;
const CFG_INTERVAL: usize = 14;
const CFG_SPEC1: usize = 15;
const CFG_SPEC2: usize = 16;

/// Version selector: LHDC V3 only
pub const VER_V3_ONLY: u8 = 0x01;
/// Version selector: LHDC V4 only
pub const VER_V4_ONLY: u8 = 0x02;
/// Version selector: LLAC
pub const VER_LLAC: u8 = 0x04;

/// Offload bitrate in kbps
pub const OFFLOAD_QUALITY_LOW0: u16 = 64;
/// Offload bitrate in kbps
pub const OFFLOAD_QUALITY_LOW1: u16 = 128;
/// Offload bitrate in kbps
pub const OFFLOAD_QUALITY_LOW2: u16 = 192;
/// Offload bitrate in kbps
pub const OFFLOAD_QUALITY_LOW3: u16 = 256;
/// Offload bitrate in kbps
pub const OFFLOAD_QUALITY_LOW4: u16 = 320;
/// Offload bitrate in kbps
pub const OFFLOAD_QUALITY_LOW: u16 = 400;
/// Offload bitrate in kbps
pub const OFFLOAD_QUALITY_MID: u16 = 500;
/// Offload bitrate in kbps
pub const OFFLOAD_QUALITY_HIGH: u16 = 900;
/// Offload bitrate in kbps
pub const OFFLOAD_QUALITY_HIGH1: u16 = 1000;
/// Adaptive bitrate
pub const OFFLOAD_QUALITY_ABR: u16 = 0x7FFF;

/// 5 ms frames
pub const FRAME_DURATION_5000US: u8 = 0x01;
/// Low latency packet interval
pub const DATA_INTERVAL_10MS: u8 = 10;
/// Normal packet interval
pub const DATA_INTERVAL_20MS: u8 = 20;

/// Feature flag: adaptive rate
pub const SPEC1_AR: u8 = 0x01;
/// Feature flag: joint allocation scheme
pub const SPEC1_JAS: u8 = 0x02;
/// Feature flag: metadata
pub const SPEC1_META: u8 = 0x04;
/// Channel split to two earbuds
pub const SPEC2_SPLIT: u8 = 0x01;
/// Adaptive rate switched on
pub const SPEC2_AR_ON: u8 = 0x02;

fn put_u16(out: &mut [u8; OFFLOAD_DESCRIPTOR_SIZE], offset: usize, value: u16) {
    out[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Bitrate of a quality index; `allow_high1` keeps HIGH1 instead of
/// clamping it to HIGH
const fn offload_quality(index: u8, allow_high1: bool) -> u16 {
    match index {
        QUALITY_LOW0 => OFFLOAD_QUALITY_LOW0,
        QUALITY_LOW1 => OFFLOAD_QUALITY_LOW1,
        QUALITY_LOW2 => OFFLOAD_QUALITY_LOW2,
        QUALITY_LOW3 => OFFLOAD_QUALITY_LOW3,
        QUALITY_LOW4 => OFFLOAD_QUALITY_LOW4,
        QUALITY_LOW => OFFLOAD_QUALITY_LOW,
        QUALITY_MID => OFFLOAD_QUALITY_MID,
        QUALITY_HIGH => OFFLOAD_QUALITY_HIGH,
        QUALITY_HIGH1 if allow_high1 => OFFLOAD_QUALITY_HIGH1,
        QUALITY_HIGH1 => OFFLOAD_QUALITY_HIGH,
        _ => OFFLOAD_QUALITY_ABR,
    }
}

const fn bitrate_index(config: &CodecConfig) -> u8 {
    (config.codec_specific_1 & 0x0F) as u8
}

const fn v3_max_bit_rate(byte10: u8) -> u16 {
    match byte10 & MAX_BIT_RATE_MASK {
        MAX_BIT_RATE_400K => OFFLOAD_QUALITY_LOW,
        MAX_BIT_RATE_500K => OFFLOAD_QUALITY_MID,
        _ => OFFLOAD_QUALITY_HIGH,
    }
}

const fn interval(low_latency: bool) -> u8 {
    if low_latency {
        DATA_INTERVAL_10MS
    } else {
        DATA_INTERVAL_20MS
    }
}

fn split_mode(byte11: u8) -> Result<u8, OffloadError> {
    match byte11 & CH_SPLIT_MASK {
        CH_SPLIT_NONE => Ok(0),
        CH_SPLIT_TWS => Ok(SPEC2_SPLIT),
        other => {
            error!("[OFFLOAD] LHDC unsupported split mode {:x}", other);
            Err(OffloadError::UnsupportedSplitMode(other))
        }
    }
}

pub(super) fn translate_v3(
    ota: &CodecInfo,
    config: &CodecConfig,
    out: &mut [u8; OFFLOAD_DESCRIPTOR_SIZE],
) -> Result<(), OffloadError> {
    let (b9, b10, b11) = (ota.byte(9), ota.byte(10), ota.byte(11));
    let version = b10 & VERSION_MASK;
    if version != VER3 && version != VER6 {
        error!("[OFFLOAD] LHDC V3 unsupported version {:x}", version);
        return Err(OffloadError::UnsupportedVersion(version));
    }

    let is_llac = b10 & FEATURE_LLAC != 0;
    let is_v4 = b11 & FEATURE_V4 != 0;
    out[CFG_VER] = match (is_llac, is_v4) {
        (true, false) => VER_LLAC,
        (false, true) => VER_V4_ONLY,
        _ => VER_V3_ONLY,
    };

    put_u16(out, CFG_BITRATE, offload_quality(bitrate_index(config), false));
    put_u16(out, CFG_MAX_BITRATE, v3_max_bit_rate(b10));
    let min = if b11 & FEATURE_MIN_BR != 0 {
        OFFLOAD_QUALITY_LOW4
    } else {
        OFFLOAD_QUALITY_LOW1
    };
    put_u16(out, CFG_MIN_BITRATE, min);
    out[CFG_INTERVAL] = interval(b10 & FEATURE_LL != 0);

    if b9 & FEATURE_AR != 0 {
        out[CFG_SPEC1] |= SPEC1_AR;
    }
    if b9 & FEATURE_JAS != 0 {
        out[CFG_SPEC1] |= SPEC1_JAS;
    }
    if b11 & FEATURE_META != 0 {
        out[CFG_SPEC1] |= SPEC1_META;
    }
    out[CFG_SPEC2] |= split_mode(b11)?;

    debug!(
        "[OFFLOAD] LHDC V3 ver {:x} bitrate index {:x} interval {}",
        out[CFG_VER],
        bitrate_index(config),
        out[CFG_INTERVAL]
    );
    Ok(())
}

pub(super) fn translate_v2(
    ota: &CodecInfo,
    config: &CodecConfig,
    out: &mut [u8; OFFLOAD_DESCRIPTOR_SIZE],
) -> Result<(), OffloadError> {
    let (b10, b11) = (ota.byte(10), ota.byte(11));
    let version = b10 & VERSION_MASK;
    if version > VER2 {
        error!("[OFFLOAD] LHDC V2 unsupported version {:x}", version);
        return Err(OffloadError::UnsupportedVersion(version));
    }
    out[CFG_VER] = VER_V3_ONLY;
    put_u16(out, CFG_BITRATE, offload_quality(bitrate_index(config), false));
    put_u16(out, CFG_MAX_BITRATE, v3_max_bit_rate(b10));
    out[CFG_INTERVAL] = interval(b10 & FEATURE_LL != 0);
    out[CFG_SPEC2] |= split_mode(b11)?;
    debug!(
        "[OFFLOAD] LHDC V2 bitrate index {:x} interval {}",
        bitrate_index(config),
        out[CFG_INTERVAL]
    );
    Ok(())
}

pub(super) fn translate_v5(
    ota: &CodecInfo,
    config: &CodecConfig,
    out: &mut [u8; OFFLOAD_DESCRIPTOR_SIZE],
) -> Result<(), OffloadError> {
    let (b10, b11, b12, b13) = (ota.byte(10), ota.byte(11), ota.byte(12), ota.byte(13));
    let version = b11 & V5_VERSION_MASK;
    if version != V5_VER1 {
        error!("[OFFLOAD] LHDC V5 unsupported version {:x}", version);
        return Err(OffloadError::UnsupportedVersion(version));
    }
    out[CFG_VER] = VER_V3_ONLY;

    put_u16(out, CFG_BITRATE, offload_quality(bitrate_index(config), true));
    let max = match b10 & V5_MAX_BIT_RATE_MASK {
        V5_MAX_BIT_RATE_400K => OFFLOAD_QUALITY_LOW,
        V5_MAX_BIT_RATE_500K => OFFLOAD_QUALITY_MID,
        V5_MAX_BIT_RATE_900K => OFFLOAD_QUALITY_HIGH,
        _ => OFFLOAD_QUALITY_HIGH1,
    };
    put_u16(out, CFG_MAX_BITRATE, max);
    let min = match b10 & V5_MIN_BIT_RATE_MASK {
        V5_MIN_BIT_RATE_64K => OFFLOAD_QUALITY_LOW0,
        V5_MIN_BIT_RATE_128K => OFFLOAD_QUALITY_LOW1,
        V5_MIN_BIT_RATE_256K => OFFLOAD_QUALITY_LOW3,
        _ => OFFLOAD_QUALITY_LOW,
    };
    put_u16(out, CFG_MIN_BITRATE, min);

    let frame = b11 & V5_FRAME_LEN_MASK;
    if frame == 0 {
        error!("[OFFLOAD] LHDC V5 unsupported frame duration {:x}", frame);
        return Err(OffloadError::UnsupportedFrameDuration(frame));
    }
    out[CFG_FRAME_DURATION] = FRAME_DURATION_5000US;
    out[CFG_INTERVAL] = interval(b12 & V5_FEATURE_LL != 0);

    if b12 & V5_FEATURE_AR != 0 {
        out[CFG_SPEC1] |= SPEC1_AR;
    }
    if b12 & V5_FEATURE_JAS != 0 {
        out[CFG_SPEC1] |= SPEC1_JAS;
    }
    if b12 & V5_FEATURE_META != 0 {
        out[CFG_SPEC1] |= SPEC1_META;
    }
    if b13 & V5_AR_ON != 0 {
        out[CFG_SPEC2] |= SPEC2_AR_ON;
    }
    debug!(
        "[OFFLOAD] LHDC V5 bitrate index {:x} max {} min {}",
        bitrate_index(config),
        max,
        min
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::CodecRegistry;
    use crate::family::lhdc::{
        BITS_24, CH_SPLIT_TWS_PLUS, FREQ_48000, QUALITY_ABR, LHDC_V2_KEY, LHDC_V3_KEY, LHDC_V5_KEY,
        QUALITY_MAGIC, V5_BITS_24, V5_FEATURE_LLESS, V5_FRAME_LEN_5MS, V5_FREQ_96000,
        V5_MAX_BIT_RATE_1000K, VER1,
    };
    use crate::offload::{OffloadDescriptor, codec_specific_config};

    fn quality(index: u8) -> CodecConfig {
        CodecConfig::EMPTY.with_codec_specific([QUALITY_MAGIC | i64::from(index), 0, 0, 0])
    }

    fn translate(ota: &CodecInfo, config: &CodecConfig) -> Result<OffloadDescriptor, OffloadError> {
        codec_specific_config(CodecRegistry::builtin(), ota, config)
    }

    fn v3(b9: u8, b10: u8, b11: u8) -> CodecInfo {
        CodecInfo::vendor(LHDC_V3_KEY, &[b9, b10, b11])
    }

    fn v5(b10: u8, b11: u8, b12: u8, b13: u8) -> CodecInfo {
        CodecInfo::vendor(LHDC_V5_KEY, &[V5_FREQ_96000, b10, b11, b12, b13])
    }

    #[test]
    fn test_v3_full_descriptor() {
        let ota = v3(
            FEATURE_AR | FEATURE_JAS | BITS_24 | FREQ_48000,
            FEATURE_LL | MAX_BIT_RATE_500K | VER3,
            FEATURE_META | FEATURE_MIN_BR | CH_SPLIT_TWS,
        );
        let desc = translate(&ota, &quality(QUALITY_MID)).unwrap();
        assert_eq!(&desc.as_bytes()[..6], &[0x3A, 0x05, 0, 0, 0x33, 0x4C]);
        assert_eq!(desc.byte(CFG_VER), VER_V3_ONLY);
        assert_eq!(desc.u16_le(CFG_BITRATE), OFFLOAD_QUALITY_MID);
        assert_eq!(desc.u16_le(CFG_MAX_BITRATE), OFFLOAD_QUALITY_MID);
        assert_eq!(desc.u16_le(CFG_MIN_BITRATE), OFFLOAD_QUALITY_LOW4);
        assert_eq!(desc.byte(CFG_FRAME_DURATION), 0);
        assert_eq!(desc.byte(CFG_INTERVAL), DATA_INTERVAL_10MS);
        assert_eq!(desc.byte(CFG_SPEC1), SPEC1_AR | SPEC1_JAS | SPEC1_META);
        assert_eq!(desc.byte(CFG_SPEC2), SPEC2_SPLIT);
    }

    #[test]
    fn test_v3_version_selector() {
        let cases = [
            (FEATURE_LLAC, 0, VER_LLAC),
            (0, FEATURE_V4, VER_V4_ONLY),
            (0, 0, VER_V3_ONLY),
            (FEATURE_LLAC, FEATURE_V4, VER_V3_ONLY),
        ];
        for (llac, v4, expected) in cases {
            let ota = v3(BITS_24 | FREQ_48000, llac | VER6, v4 | CH_SPLIT_NONE);
            let desc = translate(&ota, &quality(QUALITY_HIGH)).unwrap();
            assert_eq!(desc.byte(CFG_VER), expected);
            assert_eq!(desc.byte(CFG_INTERVAL), DATA_INTERVAL_20MS);
            assert_eq!(desc.u16_le(CFG_MIN_BITRATE), OFFLOAD_QUALITY_LOW1);
        }
    }

    #[test]
    fn test_v3_high1_clamps_and_unknown_index_is_abr() {
        let ota = v3(BITS_24 | FREQ_48000, MAX_BIT_RATE_400K | VER3, CH_SPLIT_NONE);
        let desc = translate(&ota, &quality(QUALITY_HIGH1)).unwrap();
        assert_eq!(desc.u16_le(CFG_BITRATE), OFFLOAD_QUALITY_HIGH);
        assert_eq!(desc.u16_le(CFG_MAX_BITRATE), OFFLOAD_QUALITY_LOW);
        let desc = translate(&ota, &quality(0x0E)).unwrap();
        assert_eq!(desc.u16_le(CFG_BITRATE), OFFLOAD_QUALITY_ABR);
    }

    #[test]
    fn test_v3_rejects_bad_version_and_split() {
        // capability shaped element advertising both versions
        let ota = v3(BITS_24 | FREQ_48000, VER3 | VER6, CH_SPLIT_NONE);
        assert_eq!(
            translate(&ota, &quality(QUALITY_LOW)),
            Err(OffloadError::UnsupportedVersion(VER3 | VER6))
        );
        let ota = v3(BITS_24 | FREQ_48000, VER3, CH_SPLIT_TWS_PLUS);
        assert_eq!(
            translate(&ota, &quality(QUALITY_LOW)),
            Err(OffloadError::UnsupportedSplitMode(CH_SPLIT_TWS_PLUS))
        );
    }

    #[test]
    fn test_v2_descriptor() {
        let ota = CodecInfo::vendor(
            LHDC_V2_KEY,
            &[BITS_24 | FREQ_48000, VER1 | MAX_BIT_RATE_500K, CH_SPLIT_TWS],
        );
        let desc = translate(&ota, &quality(QUALITY_LOW2)).unwrap();
        assert_eq!(desc.byte(CFG_VER), VER_V3_ONLY);
        assert_eq!(desc.u16_le(CFG_BITRATE), OFFLOAD_QUALITY_LOW2);
        assert_eq!(desc.u16_le(CFG_MAX_BITRATE), OFFLOAD_QUALITY_MID);
        assert_eq!(desc.u16_le(CFG_MIN_BITRATE), 0);
        assert_eq!(desc.byte(CFG_SPEC1), 0);
        assert_eq!(desc.byte(CFG_SPEC2), SPEC2_SPLIT);
    }

    #[test]
    fn test_v5_full_descriptor() {
        let ota = v5(
            V5_BITS_24 | V5_MAX_BIT_RATE_1000K | V5_MIN_BIT_RATE_128K,
            V5_FRAME_LEN_5MS | V5_VER1,
            V5_FEATURE_AR | V5_FEATURE_META | V5_FEATURE_LL,
            V5_AR_ON,
        );
        let desc = translate(&ota, &quality(QUALITY_HIGH1)).unwrap();
        assert_eq!(desc.byte(CFG_VER), VER_V3_ONLY);
        assert_eq!(desc.u16_le(CFG_BITRATE), OFFLOAD_QUALITY_HIGH1);
        assert_eq!(desc.u16_le(CFG_MAX_BITRATE), OFFLOAD_QUALITY_HIGH1);
        assert_eq!(desc.u16_le(CFG_MIN_BITRATE), OFFLOAD_QUALITY_LOW1);
        assert_eq!(desc.byte(CFG_FRAME_DURATION), FRAME_DURATION_5000US);
        assert_eq!(desc.byte(CFG_INTERVAL), DATA_INTERVAL_10MS);
        assert_eq!(desc.byte(CFG_SPEC1), SPEC1_AR | SPEC1_META);
        assert_eq!(desc.byte(CFG_SPEC2), SPEC2_AR_ON);
    }

    #[test]
    fn test_v5_bit_rate_classes() {
        let cases = [
            (V5_MAX_BIT_RATE_400K | V5_MIN_BIT_RATE_64K, OFFLOAD_QUALITY_LOW, OFFLOAD_QUALITY_LOW0),
            (V5_MAX_BIT_RATE_500K | V5_MIN_BIT_RATE_256K, OFFLOAD_QUALITY_MID, OFFLOAD_QUALITY_LOW3),
            (V5_MAX_BIT_RATE_900K, OFFLOAD_QUALITY_HIGH, OFFLOAD_QUALITY_LOW),
        ];
        for (b10, max, min) in cases {
            let ota = v5(V5_BITS_24 | b10, V5_FRAME_LEN_5MS | V5_VER1, V5_FEATURE_LLESS, 0);
            let desc = translate(&ota, &quality(QUALITY_ABR)).unwrap();
            assert_eq!(desc.u16_le(CFG_MAX_BITRATE), max);
            assert_eq!(desc.u16_le(CFG_MIN_BITRATE), min);
            assert_eq!(desc.u16_le(CFG_BITRATE), OFFLOAD_QUALITY_ABR);
            assert_eq!(desc.byte(CFG_INTERVAL), DATA_INTERVAL_20MS);
        }
    }

    #[test]
    fn test_v5_rejects_bad_version() {
        let ota = v5(V5_BITS_24, V5_FRAME_LEN_5MS | V5_VER1 | 0x02, 0, 0);
        assert_eq!(
            translate(&ota, &quality(QUALITY_MID)),
            Err(OffloadError::UnsupportedVersion(0x03))
        );
    }
}
