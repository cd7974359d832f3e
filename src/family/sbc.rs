//! SBC (Sub-Band Coding), the mandatory A2DP codec
//!
//! Payload layout (offsets inside the codec information element):
//!
//! | byte | bits |
//! |------|------|
//! | 3    | sampling frequency (high nibble), channel mode (low nibble) |
//! | 4    | block length (high nibble), subbands, allocation method |
//! | 5    | minimum bitpool |
//! | 6    | maximum bitpool |

use crate::CodecError;
use crate::codec_info::{CodecInfo, CodecType};
use crate::config::{BitsPerSample, ChannelMode, CodecConfig, SampleRate};
use crate::index::CodecIndex;

use super::{
    BitOption, ChoiceField, DecoderInterface, EncoderInterface, FamilyHandler, NegotiationContext,
    WireLayout, mtu_frame_size,
};

/// Value of the length byte
pub const SBC_INFO_LEN: u8 = 6;

/// 16000 Hz
pub const FREQ_16000: u8 = 0x80;
/// 32000 Hz
pub const FREQ_32000: u8 = 0x40;
/// 44100 Hz
pub const FREQ_44100: u8 = 0x20;
/// 48000 Hz
pub const FREQ_48000: u8 = 0x10;

/// Mono
pub const CH_MONO: u8 = 0x08;
/// Dual channel
pub const CH_DUAL: u8 = 0x04;
/// Stereo
pub const CH_STEREO: u8 = 0x02;
/// Joint stereo
pub const CH_JOINT_STEREO: u8 = 0x01;

/// 4 blocks
pub const BLOCKS_4: u8 = 0x80;
/// 8 blocks
pub const BLOCKS_8: u8 = 0x40;
/// 12 blocks
pub const BLOCKS_12: u8 = 0x20;
/// 16 blocks
pub const BLOCKS_16: u8 = 0x10;

/// 4 subbands
pub const SUBBANDS_4: u8 = 0x08;
/// 8 subbands
pub const SUBBANDS_8: u8 = 0x04;

/// SNR allocation
pub const ALLOC_SNR: u8 = 0x02;
/// Loudness allocation
pub const ALLOC_LOUDNESS: u8 = 0x01;

/// Smallest legal bitpool
pub const MIN_BITPOOL: u8 = 2;
/// Largest legal bitpool
pub const MAX_BITPOOL: u8 = 250;
/// Largest bitpool the local encoder runs at
pub const ENCODER_MAX_BITPOOL: u8 = 53;

const BYTE_FREQ_CHANNEL: usize = 3;
const BYTE_BLOCKS: usize = 4;
const BYTE_MIN_BITPOOL: usize = 5;
const BYTE_MAX_BITPOOL: usize = 6;

/// Build an SBC element from its four payload bytes
#[must_use]
pub const fn capability(freq_channel: u8, blocks: u8, min_bitpool: u8, max_bitpool: u8) -> CodecInfo {
    CodecInfo::standard(CodecType::Sbc, &[freq_channel, blocks, min_bitpool, max_bitpool])
}

/// Default configuration: 44.1 kHz joint stereo, 16 blocks, 8 subbands,
/// loudness, bitpool 2..53
pub const DEFAULT_CONFIG: CodecInfo = capability(
    FREQ_44100 | CH_JOINT_STEREO,
    BLOCKS_16 | SUBBANDS_8 | ALLOC_LOUDNESS,
    MIN_BITPOOL,
    ENCODER_MAX_BITPOOL,
);

static SAMPLE_RATES: [BitOption<SampleRate>; 4] = [
    BitOption::new(BYTE_FREQ_CHANNEL, FREQ_44100, SampleRate::RATE_44100),
    BitOption::new(BYTE_FREQ_CHANNEL, FREQ_48000, SampleRate::RATE_48000),
    BitOption::new(BYTE_FREQ_CHANNEL, FREQ_32000, SampleRate::RATE_32000),
    BitOption::new(BYTE_FREQ_CHANNEL, FREQ_16000, SampleRate::RATE_16000),
];

static CHANNEL_MODES: [BitOption<ChannelMode>; 4] = [
    BitOption::new(BYTE_FREQ_CHANNEL, CH_JOINT_STEREO, ChannelMode::STEREO),
    BitOption::new(BYTE_FREQ_CHANNEL, CH_STEREO, ChannelMode::STEREO),
    BitOption::new(BYTE_FREQ_CHANNEL, CH_DUAL, ChannelMode::STEREO),
    BitOption::new(BYTE_FREQ_CHANNEL, CH_MONO, ChannelMode::MONO),
];

static CHOICES: [ChoiceField; 3] = [
    ChoiceField {
        byte: BYTE_BLOCKS,
        preference: &[BLOCKS_16, BLOCKS_12, BLOCKS_8, BLOCKS_4],
    },
    ChoiceField {
        byte: BYTE_BLOCKS,
        preference: &[SUBBANDS_8, SUBBANDS_4],
    },
    ChoiceField {
        byte: BYTE_BLOCKS,
        preference: &[ALLOC_LOUDNESS, ALLOC_SNR],
    },
];

/// SBC family
pub const SBC: FamilyHandler = FamilyHandler {
    name: "SBC",
    codec_type: CodecType::Sbc,
    vendor: None,
    wire_len: SBC_INFO_LEN,
    source_index: Some(CodecIndex::SourceSbc),
    sink_index: Some(CodecIndex::SinkSbc),
    source_capability: capability(
        FREQ_44100 | FREQ_48000 | CH_MONO | CH_JOINT_STEREO,
        BLOCKS_16 | SUBBANDS_8 | ALLOC_LOUDNESS,
        MIN_BITPOOL,
        ENCODER_MAX_BITPOOL,
    ),
    sink_capability: capability(0xFF, 0xFF, MIN_BITPOOL, ENCODER_MAX_BITPOOL),
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
    media_header_len: 1,
    encoder: Some(EncoderInterface {
        name: "SBC encoder",
        effective_frame_size: mtu_frame_size,
    }),
    decoder: Some(DecoderInterface {
        name: "SBC decoder",
    }),
    check: check_bitpool,
    refine: refine_bitpool,
    bit_rate: sbc_bit_rate,
    adjust: clamp_bitpool,
};

/// Decoded SBC configuration parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbcParams {
    /// Sampling frequency in Hz
    pub frequency: u32,
    /// Channel mode bit
    pub channel_mode: u8,
    /// Number of blocks
    pub blocks: u32,
    /// Number of subbands
    pub subbands: u32,
    /// Allocation method bit
    pub allocation: u8,
    /// Minimum bitpool
    pub min_bitpool: u8,
    /// Maximum bitpool
    pub max_bitpool: u8,
}

impl SbcParams {
    /// Decode a single-valued SBC configuration
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidCodecInfo`] if a field does not hold
    /// exactly one known value.
    pub fn parse(info: &CodecInfo) -> Result<Self, CodecError> {
        if !SBC.is_valid(info, false) {
            return Err(CodecError::InvalidCodecInfo);
        }
        let freq_channel = info.byte(BYTE_FREQ_CHANNEL);
        let blocks_byte = info.byte(BYTE_BLOCKS);
        let frequency = match freq_channel & 0xF0 {
            FREQ_16000 => 16_000,
            FREQ_32000 => 32_000,
            FREQ_44100 => 44_100,
            FREQ_48000 => 48_000,
            _ => return Err(CodecError::InvalidCodecInfo),
        };
        let blocks = match blocks_byte & 0xF0 {
            BLOCKS_4 => 4,
            BLOCKS_8 => 8,
            BLOCKS_12 => 12,
            BLOCKS_16 => 16,
            _ => return Err(CodecError::InvalidCodecInfo),
        };
        let subbands = match blocks_byte & (SUBBANDS_4 | SUBBANDS_8) {
            SUBBANDS_4 => 4,
            SUBBANDS_8 => 8,
            _ => return Err(CodecError::InvalidCodecInfo),
        };
        Ok(Self {
            frequency,
            channel_mode: freq_channel & 0x0F,
            blocks,
            subbands,
            allocation: blocks_byte & (ALLOC_SNR | ALLOC_LOUDNESS),
            min_bitpool: info.byte(BYTE_MIN_BITPOOL),
            max_bitpool: info.byte(BYTE_MAX_BITPOOL),
        })
    }

    /// Number of PCM channels
    #[must_use]
    pub const fn channels(&self) -> u32 {
        if self.channel_mode == CH_MONO { 1 } else { 2 }
    }

    /// Encoded frame length in bytes at the maximum bitpool
    #[must_use]
    pub const fn frame_length(&self) -> u32 {
        let channels = self.channels();
        let bitpool = self.max_bitpool as u32;
        let header = 4 + (4 * self.subbands * channels) / 8;
        let payload_bits = match self.channel_mode {
            CH_JOINT_STEREO => self.subbands + self.blocks * bitpool,
            CH_STEREO => self.blocks * bitpool,
            _ => self.blocks * channels * bitpool,
        };
        header + payload_bits.div_ceil(8)
    }

    /// Encoded bitrate in bits per second
    #[must_use]
    pub const fn bit_rate(&self) -> u32 {
        let bits = 8 * self.frame_length() as u64 * self.frequency as u64;
        (bits / (self.subbands * self.blocks) as u64) as u32
    }
}

fn bitpool_ok(value: u8) -> bool {
    (MIN_BITPOOL..=MAX_BITPOOL).contains(&value)
}

fn check_bitpool(info: &CodecInfo, _is_capability: bool) -> bool {
    let min = info.byte(BYTE_MIN_BITPOOL);
    let max = info.byte(BYTE_MAX_BITPOOL);
    bitpool_ok(min) && bitpool_ok(max) && min <= max
}

fn refine_bitpool(
    ctx: &NegotiationContext<'_>,
    out: &mut CodecInfo,
    _config: &mut CodecConfig,
) -> Result<(), CodecError> {
    let min = ctx.local.byte(BYTE_MIN_BITPOOL).max(ctx.peer.byte(BYTE_MIN_BITPOOL));
    let max = ctx.local.byte(BYTE_MAX_BITPOOL).min(ctx.peer.byte(BYTE_MAX_BITPOOL));
    if min > max {
        warn!("[SBC] no common bitpool range ({} > {})", min, max);
        return Err(CodecError::NoCompatibleConfig);
    }
    let bytes = out.bytes_mut();
    bytes[BYTE_MIN_BITPOOL] = min;
    bytes[BYTE_MAX_BITPOOL] = max;
    Ok(())
}

fn sbc_bit_rate(_handler: &FamilyHandler, info: &CodecInfo) -> Option<u32> {
    SbcParams::parse(info).ok().map(|params| params.bit_rate())
}

fn clamp_bitpool(info: &CodecInfo) -> CodecInfo {
    let mut out = *info;
    let bytes = out.bytes_mut();
    if bytes[BYTE_MAX_BITPOOL] > ENCODER_MAX_BITPOOL {
        bytes[BYTE_MAX_BITPOOL] = ENCODER_MAX_BITPOOL;
    }
    if bytes[BYTE_MIN_BITPOOL] > bytes[BYTE_MAX_BITPOOL] {
        bytes[BYTE_MIN_BITPOOL] = bytes[BYTE_MAX_BITPOOL];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{CodecRegistry, negotiate};

    #[test]
    fn test_default_config_is_valid() {
        assert!(SBC.is_valid(&DEFAULT_CONFIG, false));
        assert!(SBC.is_valid(&DEFAULT_CONFIG, true));
        assert_eq!(DEFAULT_CONFIG.len(), 6);
        assert_eq!(DEFAULT_CONFIG.wire_bytes(), &[6, 0, 0, 0x21, 0x15, 2, 53]);
    }

    #[test]
    fn test_bitpool_validation() {
        assert!(!SBC.is_valid(&capability(0x21, 0x15, 1, 53), false));
        assert!(!SBC.is_valid(&capability(0x21, 0x15, 2, 251), false));
        assert!(!SBC.is_valid(&capability(0x21, 0x15, 40, 30), false));
    }

    #[test]
    fn test_config_needs_single_values() {
        // two rates
        assert!(!SBC.is_valid(&capability(0x31, 0x15, 2, 53), false));
        // two block lengths
        assert!(!SBC.is_valid(&capability(0x21, 0x35, 2, 53), false));
        assert!(SBC.is_valid(&capability(0x31, 0x35, 2, 53), true));
    }

    #[test]
    fn test_params_and_bit_rate() {
        let params = SbcParams::parse(&DEFAULT_CONFIG).unwrap();
        assert_eq!(params.frequency, 44_100);
        assert_eq!(params.blocks, 16);
        assert_eq!(params.subbands, 8);
        assert_eq!(params.frame_length(), 119);
        assert_eq!(params.bit_rate(), 327_993);
        assert_eq!(
            CodecRegistry::builtin().track_bit_rate(&DEFAULT_CONFIG),
            Some(327_993)
        );
    }

    #[test]
    fn test_mono_frame_length() {
        let mono = capability(FREQ_48000 | CH_MONO, BLOCKS_16 | SUBBANDS_8 | ALLOC_LOUDNESS, 2, 32);
        let params = SbcParams::parse(&mono).unwrap();
        assert_eq!(params.channels(), 1);
        // 4 + 4 + ceil(16 * 32 / 8)
        assert_eq!(params.frame_length(), 72);
    }

    #[test]
    fn test_negotiation_narrows_bitpool() {
        let peer = capability(0xFF, 0xFF, 10, 40);
        let empty = CodecConfig::EMPTY;
        let ctx = NegotiationContext {
            local: &SBC.source_capability,
            peer: &peer,
            is_capability: true,
            user: &empty,
            audio: &empty,
        };
        let result = negotiate(&SBC, &ctx).unwrap();
        assert_eq!(result.codec_info.wire_bytes(), &[6, 0, 0, 0x21, 0x15, 10, 40]);
        assert_eq!(result.config.channel_mode, ChannelMode::STEREO);
        assert_eq!(result.config.bits_per_sample, BitsPerSample::BITS_16);
    }

    #[test]
    fn test_user_mono_selects_mono_bit() {
        let peer = capability(0xFF, 0xFF, 2, 53);
        let user = CodecConfig::EMPTY.with_channel_mode(ChannelMode::MONO);
        let empty = CodecConfig::EMPTY;
        let ctx = NegotiationContext {
            local: &SBC.source_capability,
            peer: &peer,
            is_capability: true,
            user: &user,
            audio: &empty,
        };
        let result = negotiate(&SBC, &ctx).unwrap();
        assert_eq!(result.codec_info.byte(3) & 0x0F, CH_MONO);
        assert_eq!(result.config.channel_mode, ChannelMode::MONO);
    }

    #[test]
    fn test_disjoint_bitpool_fails() {
        let peer = capability(0xFF, 0xFF, 60, 80);
        let empty = CodecConfig::EMPTY;
        let ctx = NegotiationContext {
            local: &SBC.source_capability,
            peer: &peer,
            is_capability: true,
            user: &empty,
            audio: &empty,
        };
        assert_eq!(negotiate(&SBC, &ctx).unwrap_err(), CodecError::NoCompatibleConfig);
    }

    #[test]
    fn test_adjust_clamps_max_bitpool() {
        let wide = capability(0x21, 0x15, 2, 64);
        let adjusted = CodecRegistry::builtin().adjust_codec(&wide).unwrap();
        assert_eq!(adjusted.byte(6), ENCODER_MAX_BITPOOL);
    }
}
