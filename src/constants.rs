//! A2DP codec constants
//!
//! Limits, wire offsets and default values shared by the codec families,
//! the codec collection and the offload translator.

/// Capacity of a codec information element in bytes (AVDTP codec-info size)
pub const AVDT_CODEC_SIZE: usize = 20;

/// Offset of the length byte (counts the bytes that follow it)
pub const CODEC_INFO_LEN_OFFSET: usize = 0;

/// Offset of the media type byte (media type in the upper nibble)
pub const CODEC_INFO_MEDIA_TYPE_OFFSET: usize = 1;

/// Offset of the codec type tag
pub const CODEC_INFO_CODEC_TYPE_OFFSET: usize = 2;

/// First family specific byte of a standard codec
pub const CODEC_INFO_PAYLOAD_OFFSET: usize = 3;

/// Offset of the 32-bit vendor identifier (little endian)
pub const VENDOR_ID_OFFSET: usize = 3;

/// Offset of the 16-bit vendor codec identifier (little endian)
pub const VENDOR_CODEC_ID_OFFSET: usize = 7;

/// First family specific byte of a vendor codec
pub const VENDOR_PAYLOAD_OFFSET: usize = 9;

/// Smallest length byte a vendor codec element can carry
pub const VENDOR_MIN_LEN: u8 = 8;

/// Audio media type
pub const MEDIA_TYPE_AUDIO: u8 = 0x00;

/// Size of the hardware offload codec descriptor in bytes
pub const OFFLOAD_DESCRIPTOR_SIZE: usize = 32;

/// Maximum number of codec entities held by one collection
pub const MAX_CODECS: usize = 16;

/// Step of the default priority formula `step * (index + 1) + 1`
pub const DEFAULT_PRIORITY_STEP: i32 = 1000;

/// Size of a media packet RTP header in bytes
pub const RTP_HEADER_SIZE: usize = 12;

/// Maximum length of a rendered codec config string
pub const MAX_CONFIG_STRING_LENGTH: usize = 160;

/// Maximum number of offload capability tokens parsed at init
pub const MAX_OFFLOAD_TOKENS: usize = 16;
