//! Codec Family Dispatch
//!
//! Every codec family is one [`FamilyHandler`] table entry: static data (name,
//! tag, vendor key, local capabilities, a declarative [`WireLayout`]) plus a
//! handful of function hooks for the behaviour that does not fit the layout
//! (SBC bitpool, AAC bitrate, LHDC bitrate classes).
//!
//! [`CodecRegistry`] routes a codec information element to its handler by the
//! codec type tag, and for vendor codecs by the vendor and codec identifiers.
//! Every dispatched query is total: unknown elements produce `false`, `None`
//! or an `UNKNOWN` string, never a panic.

pub mod aac;
pub mod aptx;
pub mod ldac;
pub mod lhdc;
pub mod opus;
pub mod sbc;

mod negotiate;

use core::fmt::Write;

use heapless::String;

use crate::CodecError;
use crate::codec_info::{CodecInfo, CodecType, VendorKey};
use crate::config::{BitsPerSample, ChannelMode, CodecConfig, SampleRate};
use crate::constants::{
    CODEC_INFO_PAYLOAD_OFFSET, MAX_CONFIG_STRING_LENGTH, MEDIA_TYPE_AUDIO, RTP_HEADER_SIZE,
    VENDOR_PAYLOAD_OFFSET,
};
use crate::index::{CodecDirection, CodecIndex};
use crate::offload::{BUILTIN_TRANSLATORS, OffloadTranslator};

pub(crate) use negotiate::{Negotiated, negotiate, selectable_capability};

/// Name reported for elements no family recognises
pub const UNKNOWN_CODEC: &str = "UNKNOWN CODEC";

/// Name reported for indices no family serves
pub const UNKNOWN_CODEC_INDEX: &str = "UNKNOWN CODEC INDEX";

/// One wire bit and the value it stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitOption<T> {
    /// Byte offset inside the codec information element
    pub byte: usize,
    /// Bit mask inside that byte
    pub mask: u8,
    /// Value the bit encodes
    pub value: T,
}

impl<T> BitOption<T> {
    /// Create an option
    #[must_use]
    pub const fn new(byte: usize, mask: u8, value: T) -> Self {
        Self { byte, mask, value }
    }

    /// True if the bit is set in `info`
    #[must_use]
    pub const fn is_set(&self, info: &CodecInfo) -> bool {
        info.byte(self.byte) & self.mask != 0
    }
}

/// A field where exactly one of several bits is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceField {
    /// Byte offset inside the codec information element
    pub byte: usize,
    /// Candidate bits, most preferred first
    pub preference: &'static [u8],
}

impl ChoiceField {
    /// Number of candidate bits set in `info`
    #[must_use]
    pub fn count(&self, info: &CodecInfo) -> usize {
        self.preference
            .iter()
            .filter(|&&bit| info.byte(self.byte) & bit != 0)
            .count()
    }
}

/// An optional feature bit, kept only when both sides set it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagField {
    /// Byte offset inside the codec information element
    pub byte: usize,
    /// Bit mask inside that byte
    pub mask: u8,
}

/// Declarative description of the negotiable bits of a family
///
/// An empty `bits_per_sample` or `channel_modes` table means the value is not
/// carried on the wire and comes from the handler's local sets instead.
#[derive(Debug, Clone, Copy)]
pub struct WireLayout {
    /// Sample rate bits, most preferred first
    pub sample_rates: &'static [BitOption<SampleRate>],
    /// Bits per sample bits, most preferred first
    pub bits_per_sample: &'static [BitOption<BitsPerSample>],
    /// Channel mode bits, most preferred first
    pub channel_modes: &'static [BitOption<ChannelMode>],
    /// Single choice fields
    pub choices: &'static [ChoiceField],
    /// Feature flags
    pub flags: &'static [FlagField],
}

/// Link parameters of the peer, as seen by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerParams {
    /// L2CAP MTU of the media channel
    pub peer_mtu: u16,
    /// Peer supports EDR
    pub is_peer_edr: bool,
    /// Peer supports 3 Mbps EDR packets
    pub peer_supports_3mbps: bool,
}

/// Encoder entry points of a family
#[derive(Debug, Clone, Copy)]
pub struct EncoderInterface {
    /// Encoder name
    pub name: &'static str,
    /// Largest encoded payload per media packet for the given peer
    pub effective_frame_size: fn(&CodecInfo, &PeerParams) -> usize,
}

/// Decoder entry points of a family
#[derive(Debug, Clone, Copy)]
pub struct DecoderInterface {
    /// Decoder name
    pub name: &'static str,
}

/// Inputs of one negotiation
#[derive(Debug, Clone, Copy)]
pub struct NegotiationContext<'a> {
    /// Local capability of the entity
    pub local: &'a CodecInfo,
    /// Peer capability or peer chosen configuration
    pub peer: &'a CodecInfo,
    /// `peer` is a capability (several bits per field allowed)
    pub is_capability: bool,
    /// Explicit user configuration
    pub user: &'a CodecConfig,
    /// Audio pipeline configuration
    pub audio: &'a CodecConfig,
}

/// Family specific structural check, run after the layout checks
pub type CheckFn = fn(&CodecInfo, bool) -> bool;

/// Family specific finalisation of a negotiated element and config view
pub type RefineFn =
    fn(&NegotiationContext<'_>, &mut CodecInfo, &mut CodecConfig) -> Result<(), CodecError>;

/// Bitrate of a configuration in bits per second
pub type BitRateFn = fn(&FamilyHandler, &CodecInfo) -> Option<u32>;

/// Table entry for one codec family
#[derive(Debug)]
pub struct FamilyHandler {
    /// Family name
    pub name: &'static str,
    /// Codec type tag
    pub codec_type: CodecType,
    /// Vendor sub-tag for vendor-specific families
    pub vendor: Option<VendorKey>,
    /// Value of the length byte
    pub wire_len: u8,
    /// Encoder index, if the family can be a source
    pub source_index: Option<CodecIndex>,
    /// Decoder index, if the family can be a sink
    pub sink_index: Option<CodecIndex>,
    /// Local encoder capability
    pub source_capability: CodecInfo,
    /// Local decoder capability
    pub sink_capability: CodecInfo,
    /// Negotiable bits
    pub layout: WireLayout,
    /// Supported widths when the width is not on the wire
    pub local_bits: BitsPerSample,
    /// Width chosen when neither user nor audio config asks for one
    pub default_bits: BitsPerSample,
    /// Supported modes when the mode is not on the wire
    pub local_channels: ChannelMode,
    /// Mode chosen when neither user nor audio config asks for one
    pub default_channel_mode: ChannelMode,
    /// Media packets carry an RTP header
    pub uses_rtp_header: bool,
    /// Length of the media payload header written per packet
    pub media_header_len: usize,
    /// Encoder entry points
    pub encoder: Option<EncoderInterface>,
    /// Decoder entry points
    pub decoder: Option<DecoderInterface>,
    /// Structural check hook
    pub check: CheckFn,
    /// Negotiation finalisation hook
    pub refine: RefineFn,
    /// Bitrate hook
    pub bit_rate: BitRateFn,
    /// Adjust a configuration to local encoder limits
    pub adjust: fn(&CodecInfo) -> CodecInfo,
}

impl FamilyHandler {
    /// True if `info` carries this family's tag (and vendor key)
    #[must_use]
    pub fn matches(&self, info: &CodecInfo) -> bool {
        if info.codec_type() != Some(self.codec_type) {
            return false;
        }
        match self.vendor {
            Some(key) => info.vendor_key().is_some_and(|k| k.matches(&key)),
            None => true,
        }
    }

    /// Offset of the first family specific byte
    #[must_use]
    pub const fn payload_offset(&self) -> usize {
        if self.vendor.is_some() {
            VENDOR_PAYLOAD_OFFSET
        } else {
            CODEC_INFO_PAYLOAD_OFFSET
        }
    }

    /// Structural validity
    ///
    /// A capability needs at least one bit per field; a configuration
    /// (`is_capability == false`) needs exactly one.
    #[must_use]
    pub fn is_valid(&self, info: &CodecInfo, is_capability: bool) -> bool {
        if info.len() != usize::from(self.wire_len)
            || info.media_type() != MEDIA_TYPE_AUDIO
            || !self.matches(info)
        {
            return false;
        }
        let layout = &self.layout;
        let counts = [
            count_set(layout.sample_rates, info),
            count_set(layout.bits_per_sample, info),
            count_set(layout.channel_modes, info),
        ];
        let wire_fields = [
            !layout.sample_rates.is_empty(),
            !layout.bits_per_sample.is_empty(),
            !layout.channel_modes.is_empty(),
        ];
        for (count, on_wire) in counts.into_iter().zip(wire_fields) {
            if on_wire && !count_ok(count, is_capability) {
                return false;
            }
        }
        if !layout
            .choices
            .iter()
            .all(|choice| count_ok(choice.count(info), is_capability))
        {
            return false;
        }
        (self.check)(info, is_capability)
    }

    /// Valid either as a configuration or as a capability
    #[must_use]
    pub fn is_valid_any(&self, info: &CodecInfo) -> bool {
        self.is_valid(info, false) || self.is_valid(info, true)
    }

    /// Local capability for a direction, `None` if the family does not serve it
    #[must_use]
    pub fn local_capability(&self, direction: CodecDirection) -> Option<CodecInfo> {
        match direction {
            CodecDirection::Source => self.source_index.map(|_| self.source_capability),
            CodecDirection::Sink => self.sink_index.map(|_| self.sink_capability),
        }
    }

    /// Index serving `direction`
    #[must_use]
    pub const fn index(&self, direction: CodecDirection) -> Option<CodecIndex> {
        match direction {
            CodecDirection::Source => self.source_index,
            CodecDirection::Sink => self.sink_index,
        }
    }

    /// Sample rates advertised by `info`
    #[must_use]
    pub fn sample_rates_of(&self, info: &CodecInfo) -> SampleRate {
        self.layout
            .sample_rates
            .iter()
            .filter(|o| o.is_set(info))
            .fold(SampleRate::NONE, |acc, o| acc.union(o.value))
    }

    /// Sample widths advertised by `info`, or the local set if not on the wire
    #[must_use]
    pub fn bits_per_sample_of(&self, info: &CodecInfo) -> BitsPerSample {
        if self.layout.bits_per_sample.is_empty() {
            return self.local_bits;
        }
        self.layout
            .bits_per_sample
            .iter()
            .filter(|o| o.is_set(info))
            .fold(BitsPerSample::NONE, |acc, o| acc.union(o.value))
    }

    /// Channel modes advertised by `info`, or the local set if not on the wire
    #[must_use]
    pub fn channel_modes_of(&self, info: &CodecInfo) -> ChannelMode {
        if self.layout.channel_modes.is_empty() {
            return self.local_channels;
        }
        self.layout
            .channel_modes
            .iter()
            .filter(|o| o.is_set(info))
            .fold(ChannelMode::NONE, |acc, o| acc.union(o.value))
    }

    /// High level view of an element
    #[must_use]
    pub fn config_view(&self, info: &CodecInfo, index: Option<CodecIndex>) -> CodecConfig {
        let mut view = CodecConfig::EMPTY
            .with_sample_rate(self.sample_rates_of(info))
            .with_bits_per_sample(self.bits_per_sample_of(info))
            .with_channel_mode(self.channel_modes_of(info));
        view.codec_type = index;
        view
    }
}

fn count_set<T>(options: &[BitOption<T>], info: &CodecInfo) -> usize {
    options.iter().filter(|o| o.is_set(info)).count()
}

const fn count_ok(count: usize, is_capability: bool) -> bool {
    if is_capability { count >= 1 } else { count == 1 }
}

/// Structural check that accepts everything the layout accepts
#[must_use]
pub fn check_layout_only(_info: &CodecInfo, _is_capability: bool) -> bool {
    true
}

/// Refinement that keeps the generic result
///
/// # Errors
/// Never fails.
pub fn refine_nothing(
    _ctx: &NegotiationContext<'_>,
    _out: &mut CodecInfo,
    _config: &mut CodecConfig,
) -> Result<(), CodecError> {
    Ok(())
}

/// Adjustment that keeps the configuration
#[must_use]
pub fn adjust_nothing(info: &CodecInfo) -> CodecInfo {
    *info
}

/// Frame size bound by the peer MTU minus the RTP and media headers
#[must_use]
pub fn mtu_frame_size(info: &CodecInfo, params: &PeerParams) -> usize {
    let header = RTP_HEADER_SIZE + usize::from(info.codec_type() != Some(CodecType::Mpeg24Aac));
    usize::from(params.peer_mtu).saturating_sub(header)
}

/// Built-in families, in lookup order
pub static BUILTIN_FAMILIES: [&FamilyHandler; 9] = [
    &sbc::SBC,
    &aac::AAC,
    &aptx::APTX,
    &aptx::APTX_HD,
    &ldac::LDAC,
    &opus::OPUS,
    &lhdc::LHDC_V2,
    &lhdc::LHDC_V3,
    &lhdc::LHDC_V5,
];

/// Registry of the built-in families and translators
pub static BUILTIN_REGISTRY: CodecRegistry =
    CodecRegistry::new(&BUILTIN_FAMILIES, &BUILTIN_TRANSLATORS);

/// Lookup tables for codec families and offload translators
///
/// Integrator supplied tables are consulted before the built-in ones, so a
/// vendor family can be added or replaced without touching the collection:
///
/// ```rust
/// use a2dp_codecs::family::{BUILTIN_FAMILIES, CodecRegistry};
/// use a2dp_codecs::offload::BUILTIN_TRANSLATORS;
///
/// static REGISTRY: CodecRegistry =
///     CodecRegistry::new(&BUILTIN_FAMILIES, &BUILTIN_TRANSLATORS).with_families(&[]);
/// assert!(REGISTRY.family_for_index(a2dp_codecs::CodecIndex::SourceSbc).is_some());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CodecRegistry {
    families: &'static [&'static FamilyHandler],
    extra_families: &'static [&'static FamilyHandler],
    translators: &'static [OffloadTranslator],
    extra_translators: &'static [OffloadTranslator],
}

impl CodecRegistry {
    /// Create a registry over the given tables
    #[must_use]
    pub const fn new(
        families: &'static [&'static FamilyHandler],
        translators: &'static [OffloadTranslator],
    ) -> Self {
        Self {
            families,
            extra_families: &[],
            translators,
            extra_translators: &[],
        }
    }

    /// Add integrator families, consulted first
    #[must_use]
    pub const fn with_families(mut self, extra: &'static [&'static FamilyHandler]) -> Self {
        self.extra_families = extra;
        self
    }

    /// Add integrator offload translators, consulted first
    #[must_use]
    pub const fn with_translators(mut self, extra: &'static [OffloadTranslator]) -> Self {
        self.extra_translators = extra;
        self
    }

    /// Registry of the built-in families
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN_REGISTRY
    }

    fn all_families(&self) -> impl Iterator<Item = &'static FamilyHandler> {
        self.extra_families
            .iter()
            .chain(self.families.iter())
            .copied()
    }

    /// Handler for an element
    #[must_use]
    pub fn family(&self, info: &CodecInfo) -> Option<&'static FamilyHandler> {
        self.all_families().find(|h| h.matches(info))
    }

    /// Handler serving an index
    #[must_use]
    pub fn family_for_index(&self, index: CodecIndex) -> Option<&'static FamilyHandler> {
        self.all_families()
            .find(|h| h.source_index == Some(index) || h.sink_index == Some(index))
    }

    /// Offload translator for a vendor key
    #[must_use]
    pub fn translator(&self, key: &VendorKey) -> Option<&OffloadTranslator> {
        self.extra_translators
            .iter()
            .chain(self.translators.iter())
            .find(|t| t.key.matches(key))
    }

    /// Element is a valid local encoder configuration or capability
    #[must_use]
    pub fn is_source_codec_valid(&self, info: &CodecInfo) -> bool {
        self.family(info)
            .is_some_and(|h| h.source_index.is_some() && h.is_valid_any(info))
    }

    /// Element is a valid local decoder configuration or capability
    #[must_use]
    pub fn is_sink_codec_valid(&self, info: &CodecInfo) -> bool {
        self.family(info)
            .is_some_and(|h| h.sink_index.is_some() && h.is_valid_any(info))
    }

    /// Element from a peer source that a local decoder could accept
    #[must_use]
    pub fn is_peer_source_codec_valid(&self, info: &CodecInfo) -> bool {
        self.is_sink_codec_valid(info)
    }

    /// Element from a peer sink that a local encoder could serve
    #[must_use]
    pub fn is_peer_sink_codec_valid(&self, info: &CodecInfo) -> bool {
        self.is_source_codec_valid(info)
    }

    /// Configuration the local decoder supports as is
    #[must_use]
    pub fn is_sink_codec_supported(&self, info: &CodecInfo) -> bool {
        self.family(info).is_some_and(|h| {
            h.sink_index.is_some()
                && h.is_valid(info, false)
                && negotiate::is_subset(h, info, &h.sink_capability)
        })
    }

    /// Peer source capability shares at least one configuration with the
    /// local decoder
    #[must_use]
    pub fn is_peer_source_codec_supported(&self, info: &CodecInfo) -> bool {
        self.family(info).is_some_and(|h| {
            h.sink_index.is_some()
                && h.is_valid_any(info)
                && negotiate::overlaps(h, info, &h.sink_capability)
        })
    }

    /// Family name, [`UNKNOWN_CODEC`] if unrecognised
    #[must_use]
    pub fn codec_name(&self, info: &CodecInfo) -> &'static str {
        self.family(info).map_or(UNKNOWN_CODEC, |h| h.name)
    }

    /// Name of an index, [`UNKNOWN_CODEC_INDEX`] if no family serves it
    #[must_use]
    pub fn codec_index_str(&self, index: CodecIndex) -> &'static str {
        self.family_for_index(index)
            .map_or(UNKNOWN_CODEC_INDEX, |_| index.name())
    }

    /// Media type of a recognised element
    #[must_use]
    pub fn media_type(&self, info: &CodecInfo) -> Option<u8> {
        self.family(info).map(|_| info.media_type())
    }

    /// Same family (tag and vendor key) on both sides
    #[must_use]
    pub fn codec_type_equals(&self, a: &CodecInfo, b: &CodecInfo) -> bool {
        match (self.family(a), self.family(b)) {
            (Some(ha), Some(hb)) => ha.codec_type == hb.codec_type && ha.vendor == hb.vendor,
            _ => false,
        }
    }

    /// Same family and byte identical wire content
    #[must_use]
    pub fn codec_equals(&self, a: &CodecInfo, b: &CodecInfo) -> bool {
        self.codec_type_equals(a, b) && a.wire_bytes() == b.wire_bytes()
    }

    /// Bitrate of a configuration in bits per second
    #[must_use]
    pub fn track_bit_rate(&self, info: &CodecInfo) -> Option<u32> {
        let h = self.family(info)?;
        if !h.is_valid(info, false) {
            return None;
        }
        (h.bit_rate)(h, info)
    }

    /// Sample rate of a configuration in Hz
    #[must_use]
    pub fn track_sample_rate(&self, info: &CodecInfo) -> Option<u32> {
        let h = self.family(info)?;
        h.sample_rates_of(info).hz()
    }

    /// Sample width of a configuration in bits
    #[must_use]
    pub fn track_bits_per_sample(&self, info: &CodecInfo) -> Option<u8> {
        let h = self.family(info)?;
        if h.layout.bits_per_sample.is_empty() {
            // not on the wire, the encoder runs at the family default
            return h.default_bits.bits();
        }
        h.bits_per_sample_of(info).bits()
    }

    /// Channel count of a configuration
    #[must_use]
    pub fn track_channel_count(&self, info: &CodecInfo) -> Option<u8> {
        let h = self.family(info)?;
        h.channel_modes_of(info).channel_count()
    }

    /// Audio track channel type for a sink: 1 for mono, 3 for stereo
    #[must_use]
    pub fn sink_track_channel_type(&self, info: &CodecInfo) -> Option<u8> {
        let h = self.family(info)?;
        h.sink_index?;
        match h.channel_modes_of(info).channel_count()? {
            1 => Some(1),
            _ => Some(3),
        }
    }

    /// Timestamp of a received media packet payload
    #[must_use]
    pub fn packet_timestamp(&self, info: &CodecInfo, data: &[u8]) -> Option<u32> {
        self.family(info)?;
        let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    /// Write the media payload header for `frames` frames
    ///
    /// Returns the number of header bytes written.
    #[must_use]
    pub fn build_codec_header(&self, info: &CodecInfo, frames: u8, out: &mut [u8]) -> Option<usize> {
        let h = self.family(info)?;
        if h.media_header_len == 0 {
            return Some(0);
        }
        let slot = out.first_mut()?;
        *slot = frames & 0x0F;
        Some(h.media_header_len)
    }

    /// Encoder entry points for a configuration
    #[must_use]
    pub fn encoder_interface(&self, info: &CodecInfo) -> Option<EncoderInterface> {
        let h = self.family(info)?;
        if !h.is_valid_any(info) {
            return None;
        }
        h.encoder
    }

    /// Decoder entry points for a configuration
    #[must_use]
    pub fn decoder_interface(&self, info: &CodecInfo) -> Option<DecoderInterface> {
        let h = self.family(info)?;
        if !h.is_valid_any(info) {
            return None;
        }
        h.decoder
    }

    /// Largest encoded payload per packet, 0 if unknown
    #[must_use]
    pub fn encoder_effective_frame_size(&self, info: &CodecInfo, params: &PeerParams) -> usize {
        self.encoder_interface(info)
            .map_or(0, |enc| (enc.effective_frame_size)(info, params))
    }

    /// Adjust a configuration to local encoder limits
    #[must_use]
    pub fn adjust_codec(&self, info: &CodecInfo) -> Option<CodecInfo> {
        let h = self.family(info)?;
        if !h.is_valid(info, false) {
            return None;
        }
        Some((h.adjust)(info))
    }

    /// Encoder index for an element
    #[must_use]
    pub fn source_codec_index(&self, info: &CodecInfo) -> Option<CodecIndex> {
        self.family(info)?.source_index
    }

    /// Decoder index for an element
    #[must_use]
    pub fn sink_codec_index(&self, info: &CodecInfo) -> Option<CodecIndex> {
        self.family(info)?.sink_index
    }

    /// Local capability element of an index
    #[must_use]
    pub fn init_codec_config(&self, index: CodecIndex) -> Option<CodecInfo> {
        self.family_for_index(index)?
            .local_capability(index.direction())
    }

    /// Default SBC configuration
    #[must_use]
    pub fn init_default_codec(&self) -> CodecInfo {
        sbc::DEFAULT_CONFIG
    }

    /// Media packets for this element carry an RTP header
    ///
    /// Unrecognised elements are assumed to.
    #[must_use]
    pub fn uses_rtp_header(&self, info: &CodecInfo) -> bool {
        self.family(info).is_none_or(|h| h.uses_rtp_header)
    }

    /// One line description of an element
    #[must_use]
    pub fn codec_info_string(&self, info: &CodecInfo) -> String<MAX_CONFIG_STRING_LENGTH> {
        let mut out = String::new();
        match self.family(info) {
            Some(h) => {
                let _ = write!(
                    out,
                    "{}: Rate={} Bits={} Mode={} [{}]",
                    h.name,
                    h.sample_rates_of(info),
                    h.bits_per_sample_of(info),
                    h.channel_modes_of(info),
                    info
                );
            }
            None => {
                let _ = write!(out, "Unsupported codec type: {:#x}", info.raw_codec_type());
            }
        }
        out
    }
}
