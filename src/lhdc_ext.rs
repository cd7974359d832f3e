//! LHDC extended API
//!
//! The LHDC encoders expose a small side channel for tools: read back the
//! negotiated codec specific fields, push opaque encoder configuration and
//! user data blobs, and query the API version. [`LhdcEncoderSession`] holds
//! the encoder side state of that channel for one connection; the collection
//! serves the A2DP side (see
//! [`A2dpCodecs::lhdc_get_user_config`](crate::A2dpCodecs::lhdc_get_user_config)).
//!
//! Request buffers start with a big-endian function version (bytes 0..4) and
//! a big-endian function code (bytes 4..8). The top byte of the code (byte 4)
//! tells A2DP requests ([`EXT_TYPE_A2DP`]) from encoder library requests
//! ([`EXT_TYPE_LIB`]).

use heapless::Vec;

use crate::CodecError;
use crate::codec_info::CodecInfo;
use crate::config::CodecConfig;
use crate::family::lhdc::{
    FEATURE_AR, FEATURE_JAS, FEATURE_LARC, FEATURE_LL, FEATURE_LLAC, FEATURE_META,
    FEATURE_MIN_BR, FEATURE_V4,
};

/// Size of the function version field
pub const EXT_VERSION_SIZE: usize = 4;
/// Size of the function code field
pub const EXT_CODE_SIZE: usize = 4;
/// Offset of the request type byte
pub const EXT_TYPE_HEAD: usize = 4;
/// Request type: A2DP configuration
pub const EXT_TYPE_A2DP: u8 = 0x0A;
/// Request type: encoder library
pub const EXT_TYPE_LIB: u8 = 0x0C;

/// Function code: read codec specific fields
pub const EXT_FUNC_GET_SPECIFIC: u32 = 0x0A01_0001;
/// Read codec specific fields, layout 1
pub const EXT_FUNC_VER_GET_SPECIFIC_V1: u32 = 0x0100_0000;
/// Read codec specific fields, layout 2 (adds the capability vector)
pub const EXT_FUNC_VER_GET_SPECIFIC_V2: u32 = 0x0200_0000;

/// Offset of the target view selector
pub const EXT_TARGET_HEAD: usize = 8;
/// Offsets of codec specific fields 1 to 4, each a big-endian `i64`
pub const EXT_SPECIFICS_HEAD: [usize; 4] = [9, 17, 25, 33];
/// Offset of the capability vector (layout 2)
pub const EXT_CAP_VECTOR_HEAD: usize = 41;
/// Size of the capability vector
pub const EXT_CAP_VECTOR_SIZE: usize = 8;
/// Minimum request size, layout 1
pub const EXT_FIXED_SIZE_V1: usize = 41;
/// Minimum request size, layout 2
pub const EXT_FIXED_SIZE_V2: usize = EXT_CAP_VECTOR_HEAD + EXT_CAP_VECTOR_SIZE;

/// Largest encoder configuration or user data blob kept by a session
pub const MAX_EXT_BLOB_SIZE: usize = 128;

/// API version reported by a fresh session
pub const ENCODER_API_VERSION: u32 = 0x0000_0001;

/// View of the current codec a get-specific request reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SpecificTarget {
    /// Resolved configuration
    Config = 1,
    /// Negotiated capability
    Capability = 2,
    /// Local capability
    LocalCapability = 3,
    /// Selectable capability
    SelectableCapability = 4,
    /// User configuration
    UserConfig = 5,
    /// Audio configuration
    AudioConfig = 6,
}

impl SpecificTarget {
    /// Decode a selector byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Config),
            2 => Some(Self::Capability),
            3 => Some(Self::LocalCapability),
            4 => Some(Self::SelectableCapability),
            5 => Some(Self::UserConfig),
            6 => Some(Self::AudioConfig),
            _ => None,
        }
    }
}

/// Layout of a get-specific reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpecificLayout {
    /// Four codec specific fields
    V1,
    /// Four codec specific fields and the capability vector
    V2,
}

impl SpecificLayout {
    /// Minimum buffer size for this layout
    #[must_use]
    pub const fn fixed_size(self) -> usize {
        match self {
            Self::V1 => EXT_FIXED_SIZE_V1,
            Self::V2 => EXT_FIXED_SIZE_V2,
        }
    }
}

/// A decoded get-specific request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetSpecificRequest {
    /// Reply layout
    pub layout: SpecificLayout,
    /// View to read
    pub target: SpecificTarget,
}

fn be_u32(bytes: &[u8]) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

/// Request type byte of `buf`, if present
#[must_use]
pub fn request_type(buf: &[u8]) -> Option<u8> {
    buf.get(EXT_TYPE_HEAD).copied()
}

/// Decode an A2DP get-specific request
///
/// # Errors
/// [`CodecError::BufferTooSmall`] if the header or the layout does not fit,
/// [`CodecError::InvalidRequest`] for an unknown version, function code or
/// target.
pub fn parse_get_specific(buf: &[u8]) -> Result<GetSpecificRequest, CodecError> {
    if buf.len() < EXT_VERSION_SIZE + EXT_CODE_SIZE {
        error!("[LHDC EXT] buffer too small for header: {}", buf.len());
        return Err(CodecError::BufferTooSmall);
    }
    let version = be_u32(buf).ok_or(CodecError::BufferTooSmall)?;
    let code = be_u32(&buf[EXT_VERSION_SIZE..]).ok_or(CodecError::BufferTooSmall)?;
    if code != EXT_FUNC_GET_SPECIFIC {
        debug!("[LHDC EXT] invalid function code {:x}", code);
        return Err(CodecError::InvalidRequest);
    }
    let target = buf
        .get(EXT_TARGET_HEAD)
        .copied()
        .and_then(SpecificTarget::from_u8)
        .ok_or(CodecError::InvalidRequest)?;
    let layout = match version {
        EXT_FUNC_VER_GET_SPECIFIC_V1 => SpecificLayout::V1,
        EXT_FUNC_VER_GET_SPECIFIC_V2 => SpecificLayout::V2,
        _ => {
            debug!("[LHDC EXT] invalid function version {:x}", version);
            return Err(CodecError::InvalidRequest);
        }
    };
    Ok(GetSpecificRequest { layout, target })
}

/// Feature vector of an LHDC V3 capability: JAS, AR, META, LLAC, MIN_BR,
/// LARC, V4, LL, one byte each (0 or 1)
#[must_use]
pub fn capability_vector(local: &CodecInfo) -> [u8; EXT_CAP_VECTOR_SIZE] {
    let (b9, b10, b11) = (local.byte(9), local.byte(10), local.byte(11));
    [
        b9 & FEATURE_JAS,
        b9 & FEATURE_AR,
        b11 & FEATURE_META,
        b10 & FEATURE_LLAC,
        b11 & FEATURE_MIN_BR,
        b11 & FEATURE_LARC,
        b11 & FEATURE_V4,
        b10 & FEATURE_LL,
    ]
    .map(|bit| u8::from(bit != 0))
}

/// Write the reply of a get-specific request into `buf`
///
/// `cap_vector` is written only for [`SpecificLayout::V2`].
///
/// # Errors
/// [`CodecError::BufferTooSmall`] if `buf` is shorter than the layout.
pub fn write_specifics(
    layout: SpecificLayout,
    config: &CodecConfig,
    cap_vector: &[u8; EXT_CAP_VECTOR_SIZE],
    buf: &mut [u8],
) -> Result<(), CodecError> {
    if buf.len() < layout.fixed_size() {
        error!("[LHDC EXT] payload too small: {}", buf.len());
        return Err(CodecError::BufferTooSmall);
    }
    let fields = [
        config.codec_specific_1,
        config.codec_specific_2,
        config.codec_specific_3,
        config.codec_specific_4,
    ];
    for (head, value) in EXT_SPECIFICS_HEAD.into_iter().zip(fields) {
        buf[head..head + 8].copy_from_slice(&value.to_be_bytes());
    }
    if layout == SpecificLayout::V2 {
        buf[EXT_CAP_VECTOR_HEAD..EXT_FIXED_SIZE_V2].copy_from_slice(cap_vector);
    }
    Ok(())
}

/// Encoder side state of the extended API for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LhdcEncoderSession {
    api_version: u32,
    config: Vec<u8, MAX_EXT_BLOB_SIZE>,
    user_data: Vec<u8, MAX_EXT_BLOB_SIZE>,
}

impl Default for LhdcEncoderSession {
    fn default() -> Self {
        Self::new(ENCODER_API_VERSION)
    }
}

impl LhdcEncoderSession {
    /// Create a session reporting `api_version`
    #[must_use]
    pub const fn new(api_version: u32) -> Self {
        Self {
            api_version,
            config: Vec::new(),
            user_data: Vec::new(),
        }
    }

    /// API version
    #[must_use]
    pub const fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Last encoder configuration blob
    #[must_use]
    pub fn config(&self) -> &[u8] {
        &self.config
    }

    /// Last user data blob
    #[must_use]
    pub fn user_data(&self) -> &[u8] {
        &self.user_data
    }

    /// Write the API version big-endian into `buf`
    ///
    /// # Errors
    /// [`CodecError::BufferTooSmall`] if `buf` holds fewer than 4 bytes.
    pub fn write_api_version(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        let slot = buf
            .get_mut(..EXT_VERSION_SIZE)
            .ok_or(CodecError::BufferTooSmall)?;
        slot.copy_from_slice(&self.api_version.to_be_bytes());
        Ok(())
    }

    /// Replace the encoder configuration blob
    ///
    /// # Errors
    /// [`CodecError::CapacityExceeded`] if `blob` is larger than
    /// [`MAX_EXT_BLOB_SIZE`]; the stored blob is kept.
    pub fn set_config(&mut self, blob: &[u8]) -> Result<(), CodecError> {
        self.config = Vec::from_slice(blob).map_err(|()| CodecError::CapacityExceeded)?;
        trace!("[LHDC EXT] encoder config stored ({} bytes)", blob.len());
        Ok(())
    }

    /// Copy the encoder configuration blob into `buf`, returning its length
    ///
    /// # Errors
    /// [`CodecError::BufferTooSmall`] if the blob does not fit.
    pub fn write_config(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let len = self.config.len();
        buf.get_mut(..len)
            .ok_or(CodecError::BufferTooSmall)?
            .copy_from_slice(&self.config);
        Ok(len)
    }

    /// Replace the user data blob
    ///
    /// # Errors
    /// [`CodecError::CapacityExceeded`] if `blob` is larger than
    /// [`MAX_EXT_BLOB_SIZE`]; the stored blob is kept.
    pub fn set_user_data(&mut self, blob: &[u8]) -> Result<(), CodecError> {
        self.user_data = Vec::from_slice(blob).map_err(|()| CodecError::CapacityExceeded)?;
        Ok(())
    }

    /// Forget both blobs, e.g. when the connection closes
    pub fn reset(&mut self) {
        self.config.clear();
        self.user_data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::lhdc::LHDC_V3_KEY;

    fn request(version: u32, code: u32, target: u8, len: usize) -> std::vec::Vec<u8> {
        let mut buf = std::vec![0u8; len];
        buf[..4].copy_from_slice(&version.to_be_bytes());
        buf[4..8].copy_from_slice(&code.to_be_bytes());
        buf[8] = target;
        buf
    }

    #[test]
    fn test_parse_get_specific() {
        let buf = request(EXT_FUNC_VER_GET_SPECIFIC_V2, EXT_FUNC_GET_SPECIFIC, 5, 49);
        assert_eq!(request_type(&buf), Some(EXT_TYPE_A2DP));
        assert_eq!(
            parse_get_specific(&buf),
            Ok(GetSpecificRequest {
                layout: SpecificLayout::V2,
                target: SpecificTarget::UserConfig,
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_requests() {
        assert_eq!(parse_get_specific(&[0; 7]), Err(CodecError::BufferTooSmall));
        let bad_code = request(EXT_FUNC_VER_GET_SPECIFIC_V1, 0x0A01_0002, 1, 41);
        assert_eq!(parse_get_specific(&bad_code), Err(CodecError::InvalidRequest));
        let bad_target = request(EXT_FUNC_VER_GET_SPECIFIC_V1, EXT_FUNC_GET_SPECIFIC, 7, 41);
        assert_eq!(parse_get_specific(&bad_target), Err(CodecError::InvalidRequest));
        let bad_version = request(3, EXT_FUNC_GET_SPECIFIC, 1, 41);
        assert_eq!(parse_get_specific(&bad_version), Err(CodecError::InvalidRequest));
    }

    #[test]
    fn test_write_specifics_big_endian() {
        let config = CodecConfig::EMPTY.with_codec_specific([0x8009, -1, 1, 0x0102_0304]);
        let vector = [1, 0, 1, 0, 1, 0, 1, 0];

        let mut short = [0u8; 40];
        assert_eq!(
            write_specifics(SpecificLayout::V1, &config, &vector, &mut short),
            Err(CodecError::BufferTooSmall)
        );

        let mut buf = [0u8; 49];
        write_specifics(SpecificLayout::V1, &config, &vector, &mut buf).unwrap();
        assert_eq!(buf[9..17], [0, 0, 0, 0, 0, 0, 0x80, 0x09]);
        assert_eq!(buf[17..25], [0xFF; 8]);
        assert_eq!(buf[37..41], [1, 2, 3, 4]);
        assert_eq!(buf[41..49], [0; 8]);

        write_specifics(SpecificLayout::V2, &config, &vector, &mut buf).unwrap();
        assert_eq!(buf[41..49], vector);
    }

    #[test]
    fn test_capability_vector() {
        let local = CodecInfo::vendor(
            LHDC_V3_KEY,
            &[FEATURE_JAS, FEATURE_LL, FEATURE_META | FEATURE_V4],
        );
        assert_eq!(capability_vector(&local), [1, 0, 1, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_session_blobs() {
        let mut session = LhdcEncoderSession::default();
        assert_eq!(session.api_version(), ENCODER_API_VERSION);

        let mut version = [0u8; 4];
        session.write_api_version(&mut version).unwrap();
        assert_eq!(version, ENCODER_API_VERSION.to_be_bytes());
        assert_eq!(
            session.write_api_version(&mut [0u8; 3]),
            Err(CodecError::BufferTooSmall)
        );

        session.set_config(&[1, 2, 3]).unwrap();
        let mut out = [0u8; 8];
        assert_eq!(session.write_config(&mut out), Ok(3));
        assert_eq!(out[..3], [1, 2, 3]);
        assert_eq!(session.write_config(&mut [0u8; 2]), Err(CodecError::BufferTooSmall));

        assert_eq!(
            session.set_user_data(&[0u8; MAX_EXT_BLOB_SIZE + 1]),
            Err(CodecError::CapacityExceeded)
        );
        session.set_user_data(&[9]).unwrap();
        assert_eq!(session.user_data(), &[9]);

        session.reset();
        assert!(session.config().is_empty());
        assert!(session.user_data().is_empty());
    }
}
