//! Codec configuration views
//!
//! [`CodecConfig`] is the high level view of a codec configuration or
//! capability. Sample rate, bits per sample and channel mode are bit sets:
//! a capability may hold several bits, a resolved configuration exactly one.

use core::fmt;

use crate::index::{CodecIndex, CodecPriority};

/// Sample rate set (bitfield)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleRate(pub u32);

impl SampleRate {
    /// No rate
    pub const NONE: Self = Self(0);
    /// 44100 Hz
    pub const RATE_44100: Self = Self(0x01);
    /// 48000 Hz
    pub const RATE_48000: Self = Self(0x02);
    /// 88200 Hz
    pub const RATE_88200: Self = Self(0x04);
    /// 96000 Hz
    pub const RATE_96000: Self = Self(0x08);
    /// 176400 Hz
    pub const RATE_176400: Self = Self(0x10);
    /// 192000 Hz
    pub const RATE_192000: Self = Self(0x20);
    /// 16000 Hz
    pub const RATE_16000: Self = Self(0x40);
    /// 24000 Hz
    pub const RATE_24000: Self = Self(0x80);
    /// 32000 Hz
    pub const RATE_32000: Self = Self(0x100);

    const NAMES: [(u32, &'static str); 9] = [
        (0x01, "44100"),
        (0x02, "48000"),
        (0x04, "88200"),
        (0x08, "96000"),
        (0x10, "176400"),
        (0x20, "192000"),
        (0x40, "16000"),
        (0x80, "24000"),
        (0x100, "32000"),
    ];

    /// True if no bit is set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if exactly one bit is set
    #[must_use]
    pub const fn is_single(self) -> bool {
        self.0.is_power_of_two()
    }

    /// True if every bit of `other` is set in `self`
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        !other.is_empty() && (self.0 & other.0) == other.0
    }

    /// Bits set in both
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Bits set in either
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Rate in Hz of a single-bit set
    #[must_use]
    pub const fn hz(self) -> Option<u32> {
        match self.0 {
            0x01 => Some(44_100),
            0x02 => Some(48_000),
            0x04 => Some(88_200),
            0x08 => Some(96_000),
            0x10 => Some(176_400),
            0x20 => Some(192_000),
            0x40 => Some(16_000),
            0x80 => Some(24_000),
            0x100 => Some(32_000),
            _ => None,
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self.0, &Self::NAMES, "UnknownSampleRate")
    }
}

/// Bits per sample set (bitfield)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitsPerSample(pub u8);

impl BitsPerSample {
    /// No sample width
    pub const NONE: Self = Self(0);
    /// 16 bits
    pub const BITS_16: Self = Self(0x01);
    /// 24 bits
    pub const BITS_24: Self = Self(0x02);
    /// 32 bits
    pub const BITS_32: Self = Self(0x04);

    const NAMES: [(u32, &'static str); 3] = [(0x01, "16"), (0x02, "24"), (0x04, "32")];

    /// True if no bit is set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if exactly one bit is set
    #[must_use]
    pub const fn is_single(self) -> bool {
        self.0.is_power_of_two()
    }

    /// True if every bit of `other` is set in `self`
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        !other.is_empty() && (self.0 & other.0) == other.0
    }

    /// Bits set in both
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Bits set in either
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Sample width in bits of a single-bit set
    #[must_use]
    pub const fn bits(self) -> Option<u8> {
        match self.0 {
            0x01 => Some(16),
            0x02 => Some(24),
            0x04 => Some(32),
            _ => None,
        }
    }
}

impl fmt::Display for BitsPerSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, u32::from(self.0), &Self::NAMES, "UnknownBitsPerSample")
    }
}

/// Channel mode set (bitfield)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMode(pub u8);

impl ChannelMode {
    /// No channel mode
    pub const NONE: Self = Self(0);
    /// One channel
    pub const MONO: Self = Self(0x01);
    /// Two channels
    pub const STEREO: Self = Self(0x02);

    const NAMES: [(u32, &'static str); 2] = [(0x01, "MONO"), (0x02, "STEREO")];

    /// True if no bit is set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if exactly one bit is set
    #[must_use]
    pub const fn is_single(self) -> bool {
        self.0.is_power_of_two()
    }

    /// True if every bit of `other` is set in `self`
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        !other.is_empty() && (self.0 & other.0) == other.0
    }

    /// Bits set in both
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Bits set in either
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Number of PCM channels of a single-bit set
    #[must_use]
    pub const fn channel_count(self) -> Option<u8> {
        match self.0 {
            0x01 => Some(1),
            0x02 => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, u32::from(self.0), &Self::NAMES, "UnknownChannelMode")
    }
}

fn write_flags(
    f: &mut fmt::Formatter<'_>,
    value: u32,
    names: &[(u32, &str)],
    unknown: &str,
) -> fmt::Result {
    let mut first = true;
    for (bit, name) in names {
        if value & bit != 0 {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
    }
    if first {
        write!(f, "{unknown}({value:#x})")?;
    }
    Ok(())
}

/// High level codec configuration or capability
///
/// The four codec specific fields are opaque to the collection; their meaning
/// belongs to the codec family (e.g. LDAC quality mode in field 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecConfig {
    /// Codec the view refers to; `None` leaves the choice to the collection
    pub codec_type: Option<CodecIndex>,
    /// Selection priority
    pub priority: CodecPriority,
    /// Sample rate set
    pub sample_rate: SampleRate,
    /// Bits per sample set
    pub bits_per_sample: BitsPerSample,
    /// Channel mode set
    pub channel_mode: ChannelMode,
    /// Codec specific field 1
    pub codec_specific_1: i64,
    /// Codec specific field 2
    pub codec_specific_2: i64,
    /// Codec specific field 3
    pub codec_specific_3: i64,
    /// Codec specific field 4
    pub codec_specific_4: i64,
}

impl CodecConfig {
    /// Unpopulated view
    pub const EMPTY: Self = Self {
        codec_type: None,
        priority: CodecPriority::DEFAULT,
        sample_rate: SampleRate::NONE,
        bits_per_sample: BitsPerSample::NONE,
        channel_mode: ChannelMode::NONE,
        codec_specific_1: 0,
        codec_specific_2: 0,
        codec_specific_3: 0,
        codec_specific_4: 0,
    };

    /// Create a view for a codec with everything else unset
    #[must_use]
    pub const fn for_codec(index: CodecIndex) -> Self {
        Self {
            codec_type: Some(index),
            ..Self::EMPTY
        }
    }

    /// Set the sample rate
    #[must_use]
    pub const fn with_sample_rate(mut self, sample_rate: SampleRate) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the bits per sample
    #[must_use]
    pub const fn with_bits_per_sample(mut self, bits_per_sample: BitsPerSample) -> Self {
        self.bits_per_sample = bits_per_sample;
        self
    }

    /// Set the channel mode
    #[must_use]
    pub const fn with_channel_mode(mut self, channel_mode: ChannelMode) -> Self {
        self.channel_mode = channel_mode;
        self
    }

    /// Set the priority
    #[must_use]
    pub const fn with_priority(mut self, priority: CodecPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the four codec specific fields
    #[must_use]
    pub const fn with_codec_specific(mut self, specific: [i64; 4]) -> Self {
        self.codec_specific_1 = specific[0];
        self.codec_specific_2 = specific[1];
        self.codec_specific_3 = specific[2];
        self.codec_specific_4 = specific[3];
        self
    }

    /// True if the view was never populated: default priority and every
    /// other field zero. The codec type does not take part.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.priority.is_default()
            && self.sample_rate.is_empty()
            && self.bits_per_sample.is_empty()
            && self.channel_mode.is_empty()
            && self.codec_specific_1 == 0
            && self.codec_specific_2 == 0
            && self.codec_specific_3 == 0
            && self.codec_specific_4 == 0
    }

    /// True if the view names a codec and has a rate, width and mode
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.codec_type.is_some()
            && !self.sample_rate.is_empty()
            && !self.bits_per_sample.is_empty()
            && !self.channel_mode.is_empty()
    }

    /// True if any PCM shaping field differs: rate, width, mode or codec
    /// specific fields 1 to 3
    #[must_use]
    pub const fn pcm_format_differs(&self, other: &Self) -> bool {
        self.sample_rate.0 != other.sample_rate.0
            || self.bits_per_sample.0 != other.bits_per_sample.0
            || self.channel_mode.0 != other.channel_mode.0
            || self.codec_specific_1 != other.codec_specific_1
            || self.codec_specific_2 != other.codec_specific_2
            || self.codec_specific_3 != other.codec_specific_3
    }
}

/// Renders `Rate=.. Bits=.. Mode=..`, or `Invalid` for views that fail
/// [`CodecConfig::is_valid`]
impl fmt::Display for CodecConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("Invalid");
        }
        write!(
            f,
            "Rate={} Bits={} Mode={}",
            self.sample_rate, self.bits_per_sample, self.channel_mode
        )
    }
}
