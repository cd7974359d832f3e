//! Table driven negotiation over a [`WireLayout`](super::WireLayout)

use crate::CodecError;
use crate::codec_info::CodecInfo;
use crate::config::{BitsPerSample, ChannelMode, CodecConfig, SampleRate};

use super::{BitOption, FamilyHandler, NegotiationContext};

/// Outcome of one negotiation, not yet committed to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Negotiated {
    /// Element to put on the wire
    pub codec_info: CodecInfo,
    /// Resolved configuration (codec type and priority left to the caller)
    pub config: CodecConfig,
    /// Local capability intersected with the peer's
    pub capability: CodecConfig,
    /// Values a user may pick from
    pub selectable: CodecConfig,
}

trait PcmSet: Copy + PartialEq {
    const NONE: Self;
    fn union(self, other: Self) -> Self;
    fn is_single(self) -> bool;
    fn contains(self, other: Self) -> bool;
}

impl PcmSet for SampleRate {
    const NONE: Self = SampleRate::NONE;
    fn union(self, other: Self) -> Self {
        SampleRate::union(self, other)
    }
    fn is_single(self) -> bool {
        SampleRate::is_single(self)
    }
    fn contains(self, other: Self) -> bool {
        SampleRate::contains(self, other)
    }
}

impl PcmSet for BitsPerSample {
    const NONE: Self = BitsPerSample::NONE;
    fn union(self, other: Self) -> Self {
        BitsPerSample::union(self, other)
    }
    fn is_single(self) -> bool {
        BitsPerSample::is_single(self)
    }
    fn contains(self, other: Self) -> bool {
        BitsPerSample::contains(self, other)
    }
}

impl PcmSet for ChannelMode {
    const NONE: Self = ChannelMode::NONE;
    fn union(self, other: Self) -> Self {
        ChannelMode::union(self, other)
    }
    fn is_single(self) -> bool {
        ChannelMode::is_single(self)
    }
    fn contains(self, other: Self) -> bool {
        ChannelMode::contains(self, other)
    }
}

/// Pick the first available option whose value was asked for, else the first
/// available option in table order
fn choose<'a, T: PcmSet>(
    options: &'a [BitOption<T>],
    local: &CodecInfo,
    peer: &CodecInfo,
    wanted: [T; 2],
) -> Option<&'a BitOption<T>> {
    let is_available = |o: &&BitOption<T>| o.is_set(local) && o.is_set(peer);
    wanted
        .iter()
        .find_map(|w| options.iter().filter(is_available).find(|o| o.value == *w))
        .or_else(|| options.iter().find(is_available))
}

/// Same as [`choose`] for values that are not carried on the wire
fn choose_local<T: PcmSet>(local: T, wanted: [T; 2], default: T) -> Option<T> {
    wanted
        .into_iter()
        .find(|w| w.is_single() && local.contains(*w))
        .or_else(|| local.contains(default).then_some(default))
}

fn common<T: PcmSet>(options: &[BitOption<T>], local: &CodecInfo, peer: &CodecInfo) -> T {
    options
        .iter()
        .filter(|o| o.is_set(local) && o.is_set(peer))
        .fold(T::NONE, |acc, o| acc.union(o.value))
}

fn set_bits(out: &mut CodecInfo, byte: usize, mask: u8) {
    if let Some(slot) = out.bytes_mut().get_mut(byte) {
        *slot |= mask;
    }
}

const fn pick_specific(user: i64, audio: i64) -> i64 {
    if user != 0 { user } else { audio }
}

/// Header bytes (length, media type, tag, vendor key) of `local`, payload
/// cleared
fn header_of(handler: &FamilyHandler, local: &CodecInfo) -> CodecInfo {
    let mut out = CodecInfo::EMPTY;
    let end = handler.payload_offset();
    out.bytes_mut()[..end].copy_from_slice(&local.as_bytes()[..end]);
    out
}

/// Local capability intersected with a peer element, as a config view
pub(crate) fn capability_of(
    handler: &FamilyHandler,
    local: &CodecInfo,
    peer: &CodecInfo,
) -> CodecConfig {
    let layout = &handler.layout;
    let bits = if layout.bits_per_sample.is_empty() {
        handler.local_bits
    } else {
        common(layout.bits_per_sample, local, peer)
    };
    let channels = if layout.channel_modes.is_empty() {
        handler.local_channels
    } else {
        common(layout.channel_modes, local, peer)
    };
    CodecConfig::EMPTY
        .with_sample_rate(common(layout.sample_rates, local, peer))
        .with_bits_per_sample(bits)
        .with_channel_mode(channels)
}

/// Selectable capability against a peer capability
///
/// # Errors
/// [`CodecError::InvalidCodecInfo`] if `peer` is not a capability of this
/// family.
pub(crate) fn selectable_capability(
    handler: &FamilyHandler,
    local: &CodecInfo,
    peer: &CodecInfo,
) -> Result<CodecConfig, CodecError> {
    if !handler.is_valid(peer, true) {
        return Err(CodecError::InvalidCodecInfo);
    }
    Ok(capability_of(handler, local, peer))
}

/// Resolve one configuration from a local capability and a peer element
///
/// Sample rate, width and mode follow the user config, then the audio config,
/// then table order. Choice fields take the first common candidate and
/// feature flags survive only when both sides set them. Codec specific fields
/// come from the user config when non-zero, else from the audio config.
///
/// # Errors
/// [`CodecError::InvalidCodecInfo`] for a malformed peer element and
/// [`CodecError::NoCompatibleConfig`] when a field has no common value.
pub(crate) fn negotiate(
    handler: &FamilyHandler,
    ctx: &NegotiationContext<'_>,
) -> Result<Negotiated, CodecError> {
    let (local, peer) = (ctx.local, ctx.peer);
    if !handler.is_valid(peer, ctx.is_capability) {
        return Err(CodecError::InvalidCodecInfo);
    }
    let layout = &handler.layout;
    let mut out = header_of(handler, local);

    let rate = choose(
        layout.sample_rates,
        local,
        peer,
        [ctx.user.sample_rate, ctx.audio.sample_rate],
    )
    .ok_or(CodecError::NoCompatibleConfig)?;
    set_bits(&mut out, rate.byte, rate.mask);

    let wanted_bits = [ctx.user.bits_per_sample, ctx.audio.bits_per_sample];
    let bits = if layout.bits_per_sample.is_empty() {
        choose_local(handler.local_bits, wanted_bits, handler.default_bits)
            .ok_or(CodecError::NoCompatibleConfig)?
    } else {
        let option = choose(layout.bits_per_sample, local, peer, wanted_bits)
            .ok_or(CodecError::NoCompatibleConfig)?;
        set_bits(&mut out, option.byte, option.mask);
        option.value
    };

    let wanted_channels = [ctx.user.channel_mode, ctx.audio.channel_mode];
    let channels = if layout.channel_modes.is_empty() {
        choose_local(
            handler.local_channels,
            wanted_channels,
            handler.default_channel_mode,
        )
        .ok_or(CodecError::NoCompatibleConfig)?
    } else {
        let option = choose(layout.channel_modes, local, peer, wanted_channels)
            .ok_or(CodecError::NoCompatibleConfig)?;
        set_bits(&mut out, option.byte, option.mask);
        option.value
    };

    for choice in layout.choices {
        let shared = local.byte(choice.byte) & peer.byte(choice.byte);
        let bit = choice
            .preference
            .iter()
            .copied()
            .find(|bit| shared & bit != 0)
            .ok_or(CodecError::NoCompatibleConfig)?;
        set_bits(&mut out, choice.byte, bit);
    }

    for flag in layout.flags {
        let shared = local.byte(flag.byte) & peer.byte(flag.byte) & flag.mask;
        set_bits(&mut out, flag.byte, shared);
    }

    let mut config = CodecConfig::EMPTY
        .with_sample_rate(rate.value)
        .with_bits_per_sample(bits)
        .with_channel_mode(channels)
        .with_codec_specific([
            pick_specific(ctx.user.codec_specific_1, ctx.audio.codec_specific_1),
            pick_specific(ctx.user.codec_specific_2, ctx.audio.codec_specific_2),
            pick_specific(ctx.user.codec_specific_3, ctx.audio.codec_specific_3),
            pick_specific(ctx.user.codec_specific_4, ctx.audio.codec_specific_4),
        ]);
    (handler.refine)(ctx, &mut out, &mut config)?;

    let capability = capability_of(handler, local, peer);
    Ok(Negotiated {
        codec_info: out,
        config,
        capability,
        selectable: capability,
    })
}

/// Every bit `config` sets is also set in `capability`
pub(crate) fn is_subset(handler: &FamilyHandler, config: &CodecInfo, capability: &CodecInfo) -> bool {
    fn options_subset<T>(options: &[BitOption<T>], a: &CodecInfo, b: &CodecInfo) -> bool {
        options.iter().all(|o| !o.is_set(a) || o.is_set(b))
    }
    let layout = &handler.layout;
    options_subset(layout.sample_rates, config, capability)
        && options_subset(layout.bits_per_sample, config, capability)
        && options_subset(layout.channel_modes, config, capability)
        && layout.choices.iter().all(|c| {
            c.preference
                .iter()
                .all(|&bit| config.byte(c.byte) & bit == 0 || capability.byte(c.byte) & bit != 0)
        })
}

/// Every negotiable field has at least one common value
pub(crate) fn overlaps(handler: &FamilyHandler, a: &CodecInfo, b: &CodecInfo) -> bool {
    fn options_overlap<T>(options: &[BitOption<T>], a: &CodecInfo, b: &CodecInfo) -> bool {
        options.is_empty() || options.iter().any(|o| o.is_set(a) && o.is_set(b))
    }
    let layout = &handler.layout;
    options_overlap(layout.sample_rates, a, b)
        && options_overlap(layout.bits_per_sample, a, b)
        && options_overlap(layout.channel_modes, a, b)
        && layout.choices.iter().all(|c| {
            c.preference
                .iter()
                .any(|&bit| a.byte(c.byte) & b.byte(c.byte) & bit != 0)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::sbc::{self, SBC};

    fn ctx<'a>(
        local: &'a CodecInfo,
        peer: &'a CodecInfo,
        is_capability: bool,
        user: &'a CodecConfig,
        audio: &'a CodecConfig,
    ) -> NegotiationContext<'a> {
        NegotiationContext {
            local,
            peer,
            is_capability,
            user,
            audio,
        }
    }

    #[test]
    fn test_user_preference_wins_over_audio_and_table() {
        let user = CodecConfig::EMPTY.with_sample_rate(SampleRate::RATE_48000);
        let audio = CodecConfig::EMPTY.with_sample_rate(SampleRate::RATE_44100);
        let local = SBC.source_capability;
        let peer = SBC.sink_capability;
        let result = negotiate(&SBC, &ctx(&local, &peer, true, &user, &audio)).unwrap();
        assert_eq!(result.config.sample_rate, SampleRate::RATE_48000);
        assert_eq!(result.codec_info.byte(3) & 0xF0, sbc::FREQ_48000);
    }

    #[test]
    fn test_audio_preference_used_when_user_unset() {
        let user = CodecConfig::EMPTY;
        let audio = CodecConfig::EMPTY.with_sample_rate(SampleRate::RATE_48000);
        let local = SBC.source_capability;
        let peer = SBC.sink_capability;
        let result = negotiate(&SBC, &ctx(&local, &peer, true, &user, &audio)).unwrap();
        assert_eq!(result.config.sample_rate, SampleRate::RATE_48000);
    }

    #[test]
    fn test_unsupported_preference_falls_back_to_table_order() {
        let user = CodecConfig::EMPTY.with_sample_rate(SampleRate::RATE_96000);
        let local = SBC.source_capability;
        let peer = SBC.sink_capability;
        let empty = CodecConfig::EMPTY;
        let result = negotiate(&SBC, &ctx(&local, &peer, true, &user, &empty)).unwrap();
        assert_eq!(result.config.sample_rate, SampleRate::RATE_44100);
    }

    #[test]
    fn test_no_common_rate() {
        let local = SBC.source_capability;
        let peer = sbc::capability(sbc::FREQ_16000 | sbc::CH_JOINT_STEREO, 0xFF, 2, 53);
        let empty = CodecConfig::EMPTY;
        let err = negotiate(&SBC, &ctx(&local, &peer, true, &empty, &empty)).unwrap_err();
        assert_eq!(err, CodecError::NoCompatibleConfig);
    }

    #[test]
    fn test_config_requires_single_bits() {
        let local = SBC.source_capability;
        let peer = SBC.sink_capability;
        let empty = CodecConfig::EMPTY;
        let err = negotiate(&SBC, &ctx(&local, &peer, false, &empty, &empty)).unwrap_err();
        assert_eq!(err, CodecError::InvalidCodecInfo);
    }

    #[test]
    fn test_codec_specific_taken_from_user_then_audio() {
        let user = CodecConfig::EMPTY.with_codec_specific([7, 0, 0, 0]);
        let audio = CodecConfig::EMPTY.with_codec_specific([1, 2, 0, 4]);
        let local = SBC.source_capability;
        let peer = SBC.sink_capability;
        let result = negotiate(&SBC, &ctx(&local, &peer, true, &user, &audio)).unwrap();
        assert_eq!(result.config.codec_specific_1, 7);
        assert_eq!(result.config.codec_specific_2, 2);
        assert_eq!(result.config.codec_specific_4, 4);
    }

    #[test]
    fn test_selectable_rejects_malformed_peer() {
        let local = SBC.source_capability;
        let mut bytes = *SBC.sink_capability.as_bytes();
        bytes[0] = 5;
        let peer = CodecInfo::from_bytes(bytes);
        assert_eq!(
            selectable_capability(&SBC, &local, &peer),
            Err(CodecError::InvalidCodecInfo)
        );
    }

    #[test]
    fn test_subset_and_overlap() {
        assert!(is_subset(&SBC, &sbc::DEFAULT_CONFIG, &SBC.sink_capability));
        assert!(overlaps(&SBC, &SBC.source_capability, &SBC.sink_capability));
        let mono_only = sbc::capability(sbc::FREQ_44100 | sbc::CH_MONO, 0xFF, 2, 53);
        assert!(!is_subset(&SBC, &sbc::DEFAULT_CONFIG, &mono_only));
    }
}
