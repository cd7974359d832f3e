//! Opus
//!
//! One payload byte: channel mode in bits 0..2, frame duration in bits 3..4,
//! 48 kHz sampling in bit 7.

use crate::codec_info::{CodecInfo, CodecType, VendorKey};
use crate::config::{BitsPerSample, ChannelMode, SampleRate};
use crate::index::CodecIndex;

use super::{
    BitOption, ChoiceField, DecoderInterface, EncoderInterface, FamilyHandler, WireLayout,
    adjust_nothing, check_layout_only, mtu_frame_size, refine_nothing,
};

/// Opus vendor key
pub const OPUS_KEY: VendorKey = VendorKey::new(0x0000_00E0, 0x0001);

/// Mono
pub const CH_MONO: u8 = 0x01;
/// Stereo
pub const CH_STEREO: u8 = 0x02;
/// Dual channel
pub const CH_DUAL: u8 = 0x04;
/// 10 ms frames
pub const FRAME_10MS: u8 = 0x08;
/// 20 ms frames
pub const FRAME_20MS: u8 = 0x10;
/// 48000 Hz
pub const FREQ_48000: u8 = 0x80;

/// Nominal encoder bitrate
pub const BIT_RATE: u32 = 256_000;

const BYTE_CONFIG: usize = 9;

static SAMPLE_RATES: [BitOption<SampleRate>; 1] =
    [BitOption::new(BYTE_CONFIG, FREQ_48000, SampleRate::RATE_48000)];

static CHANNEL_MODES: [BitOption<ChannelMode>; 3] = [
    BitOption::new(BYTE_CONFIG, CH_STEREO, ChannelMode::STEREO),
    BitOption::new(BYTE_CONFIG, CH_DUAL, ChannelMode::STEREO),
    BitOption::new(BYTE_CONFIG, CH_MONO, ChannelMode::MONO),
];

static CHOICES: [ChoiceField; 1] = [ChoiceField {
    byte: BYTE_CONFIG,
    preference: &[FRAME_20MS, FRAME_10MS],
}];

fn opus_bit_rate(_handler: &FamilyHandler, _info: &CodecInfo) -> Option<u32> {
    Some(BIT_RATE)
}

/// Opus family
pub const OPUS: FamilyHandler = FamilyHandler {
    name: "Opus",
    codec_type: CodecType::VendorSpecific,
    vendor: Some(OPUS_KEY),
    wire_len: 9,
    source_index: Some(CodecIndex::SourceOpus),
    sink_index: Some(CodecIndex::SinkOpus),
    source_capability: CodecInfo::vendor(OPUS_KEY, &[FREQ_48000 | FRAME_20MS | CH_STEREO]),
    sink_capability: CodecInfo::vendor(
        OPUS_KEY,
        &[FREQ_48000 | FRAME_20MS | FRAME_10MS | CH_MONO | CH_STEREO | CH_DUAL],
    ),
    layout: WireLayout {
        sample_rates: &SAMPLE_RATES,
        bits_per_sample: &[],
        channel_modes: &CHANNEL_MODES,
        choices: &CHOICES,
        flags: &[],
    },
    local_bits: BitsPerSample::BITS_16,
    default_bits: BitsPerSample::BITS_16,
    local_channels: ChannelMode::STEREO,
    default_channel_mode: ChannelMode::STEREO,
    uses_rtp_header: true,
    media_header_len: 0,
    encoder: Some(EncoderInterface {
        name: "Opus encoder",
        effective_frame_size: mtu_frame_size,
    }),
    decoder: Some(DecoderInterface {
        name: "Opus decoder",
    }),
    check: check_layout_only,
    refine: refine_nothing,
    bit_rate: opus_bit_rate,
    adjust: adjust_nothing,
};
