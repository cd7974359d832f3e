//! MPEG-2/4 AAC
//!
//! | byte | bits |
//! |------|------|
//! | 3    | object type |
//! | 4    | sampling frequency, low group (44.1 kHz in bit 0) |
//! | 5    | sampling frequency, high group (high nibble), channels (low nibble) |
//! | 6    | VBR flag (bit 7), bitrate bits 22..16 |
//! | 7, 8 | bitrate bits 15..0 |

use crate::CodecError;
use crate::codec_info::{CodecInfo, CodecType};
use crate::config::{BitsPerSample, ChannelMode, CodecConfig, SampleRate};
use crate::index::CodecIndex;

use super::{
    BitOption, ChoiceField, DecoderInterface, EncoderInterface, FamilyHandler, FlagField,
    NegotiationContext, WireLayout, adjust_nothing, check_layout_only, mtu_frame_size,
};

/// Value of the length byte
pub const AAC_INFO_LEN: u8 = 8;

/// MPEG-2 AAC LC
pub const OBJECT_MPEG2_LC: u8 = 0x80;
/// MPEG-4 AAC LC
pub const OBJECT_MPEG4_LC: u8 = 0x40;

/// Variable bitrate supported
pub const VBR: u8 = 0x80;

/// Bitrate advertised by the local encoder
pub const LOCAL_BIT_RATE: u32 = 320_000;

const BYTE_OBJECT_TYPE: usize = 3;
const BYTE_RATE_LOW: usize = 4;
const BYTE_RATE_HIGH: usize = 5;
const BYTE_BIT_RATE: usize = 6;
const BIT_RATE_MASK: u32 = 0x7F_FFFF;

static SAMPLE_RATES: [BitOption<SampleRate>; 4] = [
    BitOption::new(BYTE_RATE_LOW, 0x01, SampleRate::RATE_44100),
    BitOption::new(BYTE_RATE_HIGH, 0x80, SampleRate::RATE_48000),
    BitOption::new(BYTE_RATE_HIGH, 0x20, SampleRate::RATE_88200),
    BitOption::new(BYTE_RATE_HIGH, 0x10, SampleRate::RATE_96000),
];

static CHANNEL_MODES: [BitOption<ChannelMode>; 2] = [
    BitOption::new(BYTE_RATE_HIGH, 0x04, ChannelMode::STEREO),
    BitOption::new(BYTE_RATE_HIGH, 0x08, ChannelMode::MONO),
];

static CHOICES: [ChoiceField; 1] = [ChoiceField {
    byte: BYTE_OBJECT_TYPE,
    preference: &[OBJECT_MPEG2_LC, OBJECT_MPEG4_LC],
}];

static FLAGS: [FlagField; 1] = [FlagField {
    byte: BYTE_BIT_RATE,
    mask: VBR,
}];

/// AAC family
pub const AAC: FamilyHandler = FamilyHandler {
    name: "AAC",
    codec_type: CodecType::Mpeg24Aac,
    vendor: None,
    wire_len: AAC_INFO_LEN,
    source_index: Some(CodecIndex::SourceAac),
    sink_index: Some(CodecIndex::SinkAac),
    source_capability: CodecInfo::standard(
        CodecType::Mpeg24Aac,
        &[OBJECT_MPEG2_LC, 0x01, 0x8C, 0x84, 0xE2, 0x00],
    ),
    sink_capability: CodecInfo::standard(
        CodecType::Mpeg24Aac,
        &[OBJECT_MPEG2_LC | OBJECT_MPEG4_LC, 0x01, 0x8C, 0x84, 0xE2, 0x00],
    ),
    layout: WireLayout {
        sample_rates: &SAMPLE_RATES,
        bits_per_sample: &[],
        channel_modes: &CHANNEL_MODES,
        choices: &CHOICES,
        flags: &FLAGS,
    },
    local_bits: BitsPerSample::BITS_16,
    default_bits: BitsPerSample::BITS_16,
    local_channels: ChannelMode::STEREO,
    default_channel_mode: ChannelMode::STEREO,
    uses_rtp_header: true,
    media_header_len: 0,
    encoder: Some(EncoderInterface {
        name: "AAC encoder",
        effective_frame_size: mtu_frame_size,
    }),
    decoder: Some(DecoderInterface {
        name: "AAC decoder",
    }),
    check: check_layout_only,
    refine: refine_bit_rate,
    bit_rate: aac_bit_rate,
    adjust: adjust_nothing,
};

/// 23-bit bitrate field of an element
#[must_use]
pub const fn bit_rate_of(info: &CodecInfo) -> u32 {
    let high = (info.byte(BYTE_BIT_RATE) & 0x7F) as u32;
    let mid = info.byte(BYTE_BIT_RATE + 1) as u32;
    let low = info.byte(BYTE_BIT_RATE + 2) as u32;
    (high << 16) | (mid << 8) | low
}

fn write_bit_rate(info: &mut CodecInfo, bit_rate: u32) {
    let bit_rate = bit_rate & BIT_RATE_MASK;
    let bytes = info.bytes_mut();
    bytes[BYTE_BIT_RATE] = (bytes[BYTE_BIT_RATE] & VBR) | (bit_rate >> 16) as u8;
    bytes[BYTE_BIT_RATE + 1] = (bit_rate >> 8) as u8;
    bytes[BYTE_BIT_RATE + 2] = bit_rate as u8;
}

fn refine_bit_rate(
    ctx: &NegotiationContext<'_>,
    out: &mut CodecInfo,
    _config: &mut CodecConfig,
) -> Result<(), CodecError> {
    let local = bit_rate_of(ctx.local);
    let peer = bit_rate_of(ctx.peer);
    // a zero bitrate means "unspecified"
    let bit_rate = match (local, peer) {
        (0, peer) => peer,
        (local, 0) => local,
        (local, peer) => local.min(peer),
    };
    write_bit_rate(out, bit_rate);
    Ok(())
}

fn aac_bit_rate(_handler: &FamilyHandler, info: &CodecInfo) -> Option<u32> {
    Some(bit_rate_of(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{CodecRegistry, negotiate};

    fn peer(high: u8, channels: u8, vbr_rate: [u8; 3]) -> CodecInfo {
        CodecInfo::standard(
            CodecType::Mpeg24Aac,
            &[OBJECT_MPEG2_LC, 0x01, high | channels, vbr_rate[0], vbr_rate[1], vbr_rate[2]],
        )
    }

    #[test]
    fn test_local_capability_bit_rate() {
        assert_eq!(bit_rate_of(&AAC.source_capability), LOCAL_BIT_RATE);
        assert_eq!(AAC.source_capability.len(), 8);
    }

    #[test]
    fn test_negotiation_takes_lower_bit_rate_and_common_vbr() {
        // 256000 = 0x03E800, no VBR
        let peer = peer(0x80, 0x0C, [0x03, 0xE8, 0x00]);
        let empty = CodecConfig::EMPTY;
        let ctx = NegotiationContext {
            local: &AAC.source_capability,
            peer: &peer,
            is_capability: true,
            user: &empty,
            audio: &empty,
        };
        let result = negotiate(&AAC, &ctx).unwrap();
        assert_eq!(bit_rate_of(&result.codec_info), 256_000);
        assert_eq!(result.codec_info.byte(6) & VBR, 0);
        assert_eq!(result.config.sample_rate, SampleRate::RATE_44100);
        assert_eq!(result.config.channel_mode, ChannelMode::STEREO);
        assert_eq!(result.codec_info.byte(3), OBJECT_MPEG2_LC);
        assert_eq!(
            CodecRegistry::builtin().track_bit_rate(&result.codec_info),
            Some(256_000)
        );
    }

    #[test]
    fn test_vbr_kept_when_both_support_it() {
        let peer = peer(0x80, 0x04, [0x84, 0xE2, 0x00]);
        let user = CodecConfig::EMPTY.with_sample_rate(SampleRate::RATE_48000);
        let empty = CodecConfig::EMPTY;
        let ctx = NegotiationContext {
            local: &AAC.source_capability,
            peer: &peer,
            is_capability: true,
            user: &user,
            audio: &empty,
        };
        let result = negotiate(&AAC, &ctx).unwrap();
        assert_eq!(result.codec_info.byte(6) & VBR, VBR);
        assert_eq!(bit_rate_of(&result.codec_info), LOCAL_BIT_RATE);
        assert_eq!(result.config.sample_rate, SampleRate::RATE_48000);
        assert_eq!(result.codec_info.byte(5) & 0xF0, 0x80);
        assert_eq!(result.codec_info.byte(4), 0);
    }

    #[test]
    fn test_mono_only_peer() {
        let peer = peer(0x80, 0x08, [0x84, 0xE2, 0x00]);
        let empty = CodecConfig::EMPTY;
        let ctx = NegotiationContext {
            local: &AAC.source_capability,
            peer: &peer,
            is_capability: true,
            user: &empty,
            audio: &empty,
        };
        let result = negotiate(&AAC, &ctx).unwrap();
        assert_eq!(result.config.channel_mode, ChannelMode::MONO);
        assert_eq!(result.capability.channel_mode, ChannelMode::MONO);
    }

    #[test]
    fn test_wrong_length_is_invalid() {
        let short = CodecInfo::standard(CodecType::Mpeg24Aac, &[0x80, 0x01, 0x8C, 0x84, 0xE2]);
        assert!(!AAC.is_valid(&short, true));
    }
}
