#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod codec_info;
pub mod codecs;
pub mod config;
pub mod constants;
pub mod family;
pub mod index;
pub mod lhdc_ext;
pub mod offload;

pub use codec_info::{CodecInfo, CodecType, VendorKey};
pub use codecs::{
    A2dpCodec, A2dpCodecs, CodecList, CodecsOptions, ConfigAndCapabilities, Reconfiguration,
};
pub use config::{BitsPerSample, ChannelMode, CodecConfig, SampleRate};
pub use family::{CodecRegistry, FamilyHandler, PeerParams};
pub use index::{CodecDirection, CodecIndex, CodecPriority};
pub use lhdc_ext::LhdcEncoderSession;
pub use offload::{OffloadDescriptor, OffloadError, OffloadTranslator};

/// Codec negotiation and selection errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Codec information element is malformed or of an unknown family
    InvalidCodecInfo,
    /// Local and peer capabilities share no configuration
    NoCompatibleConfig,
    /// A user configuration takes precedence over the peer's choice
    UserConfigPrecedence,
    /// Codec is not enabled or does not support the operation
    UnsupportedCodec,
    /// No codec has been selected yet
    NoCurrentCodec,
    /// No source codec is enabled
    NoSourceCodecs,
    /// No sink codec is enabled
    NoSinkCodecs,
    /// `init()` was already called
    AlreadyInitialized,
    /// `init()` was not called yet
    NotInitialized,
    /// A fixed capacity container is full
    CapacityExceeded,
    /// Caller supplied buffer is too small
    BufferTooSmall,
    /// Extended API request is malformed
    InvalidRequest,
    /// Offload descriptor could not be built
    Offload(OffloadError),
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidCodecInfo => write!(f, "Invalid codec information"),
            Self::NoCompatibleConfig => write!(f, "No compatible codec configuration"),
            Self::UserConfigPrecedence => write!(f, "User configuration takes precedence"),
            Self::UnsupportedCodec => write!(f, "Codec not supported"),
            Self::NoCurrentCodec => write!(f, "No current codec"),
            Self::NoSourceCodecs => write!(f, "No source codecs enabled"),
            Self::NoSinkCodecs => write!(f, "No sink codecs enabled"),
            Self::AlreadyInitialized => write!(f, "Codecs already initialized"),
            Self::NotInitialized => write!(f, "Codecs not initialized"),
            Self::CapacityExceeded => write!(f, "Capacity exceeded"),
            Self::BufferTooSmall => write!(f, "Buffer too small"),
            Self::InvalidRequest => write!(f, "Invalid extended API request"),
            Self::Offload(e) => write!(f, "Offload error: {e}"),
        }
    }
}

impl From<OffloadError> for CodecError {
    fn from(e: OffloadError) -> Self {
        Self::Offload(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", CodecError::NoCurrentCodec), "No current codec");
        assert_eq!(
            format!("{}", CodecError::Offload(OffloadError::UnsupportedSplitMode(4))),
            "Offload error: Unsupported channel split mode 0x4"
        );
    }

    #[test]
    fn test_offload_error_converts() {
        let e: CodecError = OffloadError::InvalidCodecConfig.into();
        assert_eq!(e, CodecError::Offload(OffloadError::InvalidCodecConfig));
    }
}
