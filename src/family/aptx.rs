//! aptX and aptX HD
//!
//! Both carry a single payload byte after the vendor header: sampling
//! frequency in the high nibble, channel mode in the low nibble. aptX HD
//! appends four reserved bytes. The sample width is fixed per family and not
//! signalled.

use crate::codec_info::{CodecInfo, CodecType, VendorKey};
use crate::config::{BitsPerSample, ChannelMode, SampleRate};
use crate::index::CodecIndex;

use super::{
    BitOption, EncoderInterface, FamilyHandler, WireLayout, adjust_nothing, check_layout_only,
    mtu_frame_size, refine_nothing,
};

/// aptX vendor key
pub const APTX_KEY: VendorKey = VendorKey::new(0x0000_004F, 0x0001);
/// aptX HD vendor key
pub const APTX_HD_KEY: VendorKey = VendorKey::new(0x0000_00D7, 0x0024);

/// 44100 Hz
pub const FREQ_44100: u8 = 0x20;
/// 48000 Hz
pub const FREQ_48000: u8 = 0x10;
/// Mono
pub const CH_MONO: u8 = 0x01;
/// Stereo
pub const CH_STEREO: u8 = 0x02;

const BYTE_FREQ_CHANNEL: usize = 9;

static SAMPLE_RATES: [BitOption<SampleRate>; 2] = [
    BitOption::new(BYTE_FREQ_CHANNEL, FREQ_44100, SampleRate::RATE_44100),
    BitOption::new(BYTE_FREQ_CHANNEL, FREQ_48000, SampleRate::RATE_48000),
];

static CHANNEL_MODES: [BitOption<ChannelMode>; 2] = [
    BitOption::new(BYTE_FREQ_CHANNEL, CH_STEREO, ChannelMode::STEREO),
    BitOption::new(BYTE_FREQ_CHANNEL, CH_MONO, ChannelMode::MONO),
];

const LAYOUT: WireLayout = WireLayout {
    sample_rates: &SAMPLE_RATES,
    bits_per_sample: &[],
    channel_modes: &CHANNEL_MODES,
    choices: &[],
    flags: &[],
};

/// Constant bitrate: four to one compression of the PCM stream
fn aptx_bit_rate(handler: &FamilyHandler, info: &CodecInfo) -> Option<u32> {
    let hz = handler.sample_rates_of(info).hz()?;
    let bits = u32::from(handler.default_bits.bits()?);
    let channels = u32::from(handler.channel_modes_of(info).channel_count()?);
    Some(hz * bits * channels / 4)
}

/// aptX family
pub const APTX: FamilyHandler = FamilyHandler {
    name: "aptX",
    codec_type: CodecType::VendorSpecific,
    vendor: Some(APTX_KEY),
    wire_len: 9,
    source_index: Some(CodecIndex::SourceAptx),
    sink_index: None,
    source_capability: CodecInfo::vendor(APTX_KEY, &[FREQ_44100 | FREQ_48000 | CH_STEREO]),
    sink_capability: CodecInfo::EMPTY,
    layout: LAYOUT,
    local_bits: BitsPerSample::BITS_16,
    default_bits: BitsPerSample::BITS_16,
    local_channels: ChannelMode::STEREO,
    default_channel_mode: ChannelMode::STEREO,
    uses_rtp_header: false,
    media_header_len: 0,
    encoder: Some(EncoderInterface {
        name: "aptX encoder",
        effective_frame_size: mtu_frame_size,
    }),
    decoder: None,
    check: check_layout_only,
    refine: refine_nothing,
    bit_rate: aptx_bit_rate,
    adjust: adjust_nothing,
};

/// aptX HD family
pub const APTX_HD: FamilyHandler = FamilyHandler {
    name: "aptX-HD",
    vendor: Some(APTX_HD_KEY),
    wire_len: 13,
    source_index: Some(CodecIndex::SourceAptxHd),
    source_capability: CodecInfo::vendor(
        APTX_HD_KEY,
        &[FREQ_44100 | FREQ_48000 | CH_STEREO, 0, 0, 0, 0],
    ),
    local_bits: BitsPerSample::BITS_24,
    default_bits: BitsPerSample::BITS_24,
    uses_rtp_header: true,
    encoder: Some(EncoderInterface {
        name: "aptX-HD encoder",
        effective_frame_size: mtu_frame_size,
    }),
    ..APTX
};
