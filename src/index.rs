//! Codec indices and priorities

use core::fmt;

use crate::constants::DEFAULT_PRIORITY_STEP;

/// Direction a codec entity serves on the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecDirection {
    /// Local device encodes and sends audio
    Source,
    /// Local device receives and decodes audio
    Sink,
}

/// Stable identifier of a codec family and direction
///
/// The numeric value only breaks priority ties; it never ranks codecs on its
/// own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CodecIndex {
    /// SBC encoder
    SourceSbc = 0,
    /// AAC encoder
    SourceAac = 1,
    /// aptX encoder
    SourceAptx = 2,
    /// aptX HD encoder
    SourceAptxHd = 3,
    /// LDAC encoder
    SourceLdac = 4,
    /// Opus encoder
    SourceOpus = 5,
    /// LHDC V2 encoder
    SourceLhdcV2 = 6,
    /// LHDC V3 encoder
    SourceLhdcV3 = 7,
    /// LHDC V5 encoder
    SourceLhdcV5 = 8,
    /// SBC decoder
    SinkSbc = 9,
    /// AAC decoder
    SinkAac = 10,
    /// LDAC decoder
    SinkLdac = 11,
    /// Opus decoder
    SinkOpus = 12,
    /// LHDC V3 decoder
    SinkLhdcV3 = 13,
    /// LHDC V5 decoder
    SinkLhdcV5 = 14,
}

impl CodecIndex {
    /// Number of source indices; sink indices start here
    pub const SOURCE_MAX: u8 = 9;
    /// Number of indices
    pub const MAX: u8 = 15;

    /// Every index in numeric order
    pub const ALL: [Self; Self::MAX as usize] = [
        Self::SourceSbc,
        Self::SourceAac,
        Self::SourceAptx,
        Self::SourceAptxHd,
        Self::SourceLdac,
        Self::SourceOpus,
        Self::SourceLhdcV2,
        Self::SourceLhdcV3,
        Self::SourceLhdcV5,
        Self::SinkSbc,
        Self::SinkAac,
        Self::SinkLdac,
        Self::SinkOpus,
        Self::SinkLhdcV3,
        Self::SinkLhdcV5,
    ];

    /// Decode a raw index
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        if value < Self::MAX {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }

    /// Raw numeric value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Direction of the index
    #[must_use]
    pub const fn direction(self) -> CodecDirection {
        if (self as u8) < Self::SOURCE_MAX {
            CodecDirection::Source
        } else {
            CodecDirection::Sink
        }
    }

    /// True for encoder indices
    #[must_use]
    pub const fn is_source(self) -> bool {
        matches!(self.direction(), CodecDirection::Source)
    }

    /// True for decoder indices
    #[must_use]
    pub const fn is_sink(self) -> bool {
        matches!(self.direction(), CodecDirection::Sink)
    }

    /// Human readable name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SourceSbc => "SBC",
            Self::SourceAac => "AAC",
            Self::SourceAptx => "aptX",
            Self::SourceAptxHd => "aptX-HD",
            Self::SourceLdac => "LDAC",
            Self::SourceOpus => "Opus",
            Self::SourceLhdcV2 => "LHDC V2",
            Self::SourceLhdcV3 => "LHDC V3",
            Self::SourceLhdcV5 => "LHDC V5",
            Self::SinkSbc => "SBC (Sink)",
            Self::SinkAac => "AAC (Sink)",
            Self::SinkLdac => "LDAC (Sink)",
            Self::SinkOpus => "Opus (Sink)",
            Self::SinkLhdcV3 => "LHDC V3 (Sink)",
            Self::SinkLhdcV5 => "LHDC V5 (Sink)",
        }
    }

    /// Priority assigned when no explicit priority is configured:
    /// `1000 * (index + 1) + 1`
    #[must_use]
    pub const fn default_priority(self) -> CodecPriority {
        CodecPriority(DEFAULT_PRIORITY_STEP * (self as i32 + 1) + 1)
    }
}

impl fmt::Display for CodecIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Codec selection priority
///
/// Higher values win. [`CodecPriority::DEFAULT`] means "derive from the
/// index" and [`CodecPriority::DISABLED`] removes a codec from negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecPriority(pub i32);

impl CodecPriority {
    /// Codec excluded from negotiation
    pub const DISABLED: Self = Self(-1);
    /// Priority not assigned yet
    pub const DEFAULT: Self = Self(0);
    /// Highest priority a user can request
    pub const HIGHEST: Self = Self(1000 * 1000);

    /// Raw value
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// True for [`CodecPriority::DISABLED`]
    #[must_use]
    pub const fn is_disabled(self) -> bool {
        self.0 == Self::DISABLED.0
    }

    /// True for [`CodecPriority::DEFAULT`]
    #[must_use]
    pub const fn is_default(self) -> bool {
        self.0 == Self::DEFAULT.0
    }
}

impl fmt::Display for CodecPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
