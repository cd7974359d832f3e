//! LDAC
//!
//! Byte 9 holds the sampling frequency, byte 10 the channel mode. The sample
//! width is not signalled; the encoder picks it from the local set.
//! Codec specific field 1 carries the encoder quality mode.

use crate::codec_info::{CodecInfo, CodecType, VendorKey};
use crate::config::{BitsPerSample, ChannelMode, SampleRate};
use crate::index::CodecIndex;

use super::{
    BitOption, DecoderInterface, EncoderInterface, FamilyHandler, WireLayout, adjust_nothing,
    check_layout_only, mtu_frame_size, refine_nothing,
};

/// LDAC vendor key
pub const LDAC_KEY: VendorKey = VendorKey::new(0x0000_012D, 0x00AA);

/// 44100 Hz
pub const FREQ_44100: u8 = 0x20;
/// 48000 Hz
pub const FREQ_48000: u8 = 0x10;
/// 88200 Hz
pub const FREQ_88200: u8 = 0x08;
/// 96000 Hz
pub const FREQ_96000: u8 = 0x04;
/// 176400 Hz
pub const FREQ_176400: u8 = 0x02;
/// 192000 Hz
pub const FREQ_192000: u8 = 0x01;

/// Mono
pub const CH_MONO: u8 = 0x04;
/// Dual channel
pub const CH_DUAL: u8 = 0x02;
/// Stereo
pub const CH_STEREO: u8 = 0x01;

/// Quality mode: high
pub const QUALITY_HIGH: i64 = 1000;
/// Quality mode: standard
pub const QUALITY_MID: i64 = 1001;
/// Quality mode: connection
pub const QUALITY_LOW: i64 = 1002;
/// Quality mode: adaptive
pub const QUALITY_ABR: i64 = 1003;

/// Nominal encoder bitrate
pub const BIT_RATE: u32 = 990_000;

const BYTE_FREQ: usize = 9;
const BYTE_CHANNEL: usize = 10;

static SAMPLE_RATES: [BitOption<SampleRate>; 6] = [
    BitOption::new(BYTE_FREQ, FREQ_96000, SampleRate::RATE_96000),
    BitOption::new(BYTE_FREQ, FREQ_88200, SampleRate::RATE_88200),
    BitOption::new(BYTE_FREQ, FREQ_48000, SampleRate::RATE_48000),
    BitOption::new(BYTE_FREQ, FREQ_44100, SampleRate::RATE_44100),
    BitOption::new(BYTE_FREQ, FREQ_192000, SampleRate::RATE_192000),
    BitOption::new(BYTE_FREQ, FREQ_176400, SampleRate::RATE_176400),
];

static CHANNEL_MODES: [BitOption<ChannelMode>; 3] = [
    BitOption::new(BYTE_CHANNEL, CH_STEREO, ChannelMode::STEREO),
    BitOption::new(BYTE_CHANNEL, CH_DUAL, ChannelMode::STEREO),
    BitOption::new(BYTE_CHANNEL, CH_MONO, ChannelMode::MONO),
];

fn ldac_bit_rate(_handler: &FamilyHandler, _info: &CodecInfo) -> Option<u32> {
    Some(BIT_RATE)
}

/// LDAC family
pub const LDAC: FamilyHandler = FamilyHandler {
    name: "LDAC",
    codec_type: CodecType::VendorSpecific,
    vendor: Some(LDAC_KEY),
    wire_len: 10,
    source_index: Some(CodecIndex::SourceLdac),
    sink_index: Some(CodecIndex::SinkLdac),
    source_capability: CodecInfo::vendor(
        LDAC_KEY,
        &[
            FREQ_44100 | FREQ_48000 | FREQ_88200 | FREQ_96000,
            CH_MONO | CH_DUAL | CH_STEREO,
        ],
    ),
    sink_capability: CodecInfo::vendor(
        LDAC_KEY,
        &[
            FREQ_44100 | FREQ_48000 | FREQ_88200 | FREQ_96000,
            CH_MONO | CH_DUAL | CH_STEREO,
        ],
    ),
    layout: WireLayout {
        sample_rates: &SAMPLE_RATES,
        bits_per_sample: &[],
        channel_modes: &CHANNEL_MODES,
        choices: &[],
        flags: &[],
    },
    local_bits: BitsPerSample(
        BitsPerSample::BITS_16.0 | BitsPerSample::BITS_24.0 | BitsPerSample::BITS_32.0,
    ),
    default_bits: BitsPerSample::BITS_32,
    local_channels: ChannelMode::STEREO,
    default_channel_mode: ChannelMode::STEREO,
    uses_rtp_header: true,
    media_header_len: 1,
    encoder: Some(EncoderInterface {
        name: "LDAC encoder",
        effective_frame_size: mtu_frame_size,
    }),
    decoder: Some(DecoderInterface {
        name: "LDAC decoder",
    }),
    check: check_layout_only,
    refine: refine_nothing,
    bit_rate: ldac_bit_rate,
    adjust: adjust_nothing,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use crate::family::{CodecRegistry, NegotiationContext, negotiate};

    fn peer(freq: u8, channel: u8) -> CodecInfo {
        CodecInfo::vendor(LDAC_KEY, &[freq, channel])
    }

    #[test]
    fn test_layout() {
        assert_eq!(LDAC.source_capability.len(), 10);
        assert_eq!(
            LDAC.source_capability.vendor_key(),
            Some(VendorKey::new(0x12D, 0xAA))
        );
    }

    #[test]
    fn test_negotiation_prefers_highest_rate_and_32_bits() {
        let peer = peer(FREQ_44100 | FREQ_96000, CH_STEREO);
        let empty = CodecConfig::EMPTY;
        let ctx = NegotiationContext {
            local: &LDAC.source_capability,
            peer: &peer,
            is_capability: true,
            user: &empty,
            audio: &empty,
        };
        let result = negotiate(&LDAC, &ctx).unwrap();
        assert_eq!(result.config.sample_rate, SampleRate::RATE_96000);
        assert_eq!(result.config.bits_per_sample, BitsPerSample::BITS_32);
        assert_eq!(result.codec_info.wire_bytes()[9..], [FREQ_96000, CH_STEREO]);
        assert_eq!(
            CodecRegistry::builtin().track_bit_rate(&result.codec_info),
            Some(BIT_RATE)
        );
    }

    #[test]
    fn test_user_bits_and_rate_are_honoured() {
        let peer = peer(FREQ_44100 | FREQ_96000, CH_STEREO | CH_MONO);
        let user = CodecConfig::EMPTY
            .with_sample_rate(SampleRate::RATE_44100)
            .with_bits_per_sample(BitsPerSample::BITS_24)
            .with_codec_specific([QUALITY_MID, 0, 0, 0]);
        let empty = CodecConfig::EMPTY;
        let ctx = NegotiationContext {
            local: &LDAC.source_capability,
            peer: &peer,
            is_capability: true,
            user: &user,
            audio: &empty,
        };
        let result = negotiate(&LDAC, &ctx).unwrap();
        assert_eq!(result.config.sample_rate, SampleRate::RATE_44100);
        assert_eq!(result.config.bits_per_sample, BitsPerSample::BITS_24);
        assert_eq!(result.config.codec_specific_1, QUALITY_MID);
    }

    #[test]
    fn test_sink_channel_type() {
        let reg = CodecRegistry::builtin();
        assert_eq!(reg.sink_track_channel_type(&peer(FREQ_48000, CH_MONO)), Some(1));
        assert_eq!(reg.sink_track_channel_type(&peer(FREQ_48000, CH_DUAL)), Some(3));
    }
}
