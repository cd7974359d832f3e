//! Codec Config Entity
//!
//! One [`A2dpCodec`] owns the configuration lifecycle of one codec index: its
//! priority, the six high level views and the raw elements exchanged with the
//! peer. Every mutating operation negotiates first and commits only once the
//! negotiation succeeded, so a failed call leaves the entity untouched.
//!
//! The entity carries no lock of its own. It lives inside the collection's
//! lock and is handed out by value or by shared reference only.

use core::fmt::{self, Write};

use crate::CodecError;
use crate::codec_info::CodecInfo;
use crate::config::CodecConfig;
use crate::family::{
    CodecRegistry, FamilyHandler, NegotiationContext, PeerParams, negotiate, selectable_capability,
};
use crate::index::{CodecDirection, CodecIndex, CodecPriority};
use crate::offload::{self, OffloadDescriptor};

/// Outcome of a reconfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reconfiguration {
    /// Element to put on the wire
    pub codec_info: CodecInfo,
    /// PCM format changed, the audio pipeline must be rebuilt
    pub restart_input: bool,
    /// Wire element changed, the stream must be renegotiated
    pub restart_output: bool,
    /// Anything observable changed
    pub config_updated: bool,
}

impl Reconfiguration {
    /// Outcome with every flag cleared
    #[must_use]
    pub const fn unchanged(codec_info: CodecInfo) -> Self {
        Self {
            codec_info,
            restart_input: false,
            restart_output: false,
            config_updated: false,
        }
    }
}

/// Configuration state of one codec
#[derive(Debug, Clone)]
pub struct A2dpCodec {
    index: CodecIndex,
    handler: &'static FamilyHandler,
    registry: &'static CodecRegistry,
    local_info: CodecInfo,
    priority: CodecPriority,
    default_priority: CodecPriority,
    config: CodecConfig,
    capability: CodecConfig,
    local_capability: CodecConfig,
    selectable_capability: CodecConfig,
    user_config: CodecConfig,
    audio_config: CodecConfig,
    ota_config: CodecInfo,
    ota_peer_capability: CodecInfo,
    ota_peer_config: CodecInfo,
    peer_params: PeerParams,
}

impl A2dpCodec {
    /// Create the entity for `index`
    ///
    /// `priority` is remembered as the entity's default override: a later
    /// [`A2dpCodec::set_default_priority`] falls back to it unless it is
    /// [`CodecPriority::DEFAULT`]. Returns `None` if no family in `registry`
    /// serves `index`.
    #[must_use]
    pub fn create(
        index: CodecIndex,
        priority: CodecPriority,
        registry: &'static CodecRegistry,
    ) -> Option<Self> {
        let Some(handler) = registry.family_for_index(index) else {
            warn!("[CODEC] no family serves {}", index.name());
            return None;
        };
        let local_info = handler.local_capability(index.direction())?;

        let mut codec = Self {
            index,
            handler,
            registry,
            local_info,
            priority: CodecPriority::DEFAULT,
            default_priority: priority,
            config: CodecConfig::for_codec(index),
            capability: CodecConfig::for_codec(index),
            local_capability: handler.config_view(&local_info, Some(index)),
            selectable_capability: CodecConfig::for_codec(index),
            user_config: CodecConfig::for_codec(index),
            audio_config: CodecConfig::for_codec(index),
            ota_config: CodecInfo::EMPTY,
            ota_peer_capability: CodecInfo::EMPTY,
            ota_peer_config: CodecInfo::EMPTY,
            peer_params: PeerParams::default(),
        };
        codec.set_codec_priority(priority);
        codec.capability.priority = codec.priority;
        codec.local_capability.priority = codec.priority;
        codec.selectable_capability.priority = codec.priority;
        debug!(
            "[CODEC] created {} priority {}",
            index.name(),
            codec.priority.value()
        );
        Some(codec)
    }

    /// Codec index
    #[must_use]
    pub const fn codec_index(&self) -> CodecIndex {
        self.index
    }

    /// Human readable name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.index.name()
    }

    /// Family handler serving this codec
    #[must_use]
    pub const fn family(&self) -> &'static FamilyHandler {
        self.handler
    }

    /// Current priority
    #[must_use]
    pub const fn priority(&self) -> CodecPriority {
        self.priority
    }

    /// Set the priority
    ///
    /// [`CodecPriority::DEFAULT`] restores the default priority, any other
    /// value is stored verbatim.
    pub fn set_codec_priority(&mut self, priority: CodecPriority) {
        if priority.is_default() {
            self.set_default_priority();
        } else {
            self.priority = priority;
        }
        self.config.priority = self.priority;
    }

    /// Restore the default priority: the construction override if one was
    /// given, else `1000 * (index + 1) + 1`
    pub fn set_default_priority(&mut self) {
        self.priority = if self.default_priority.is_default() {
            self.index.default_priority()
        } else {
            self.default_priority
        };
        self.config.priority = self.priority;
    }

    /// Resolved configuration
    #[must_use]
    pub const fn codec_config(&self) -> CodecConfig {
        self.config
    }

    /// Local capability intersected with the peer's
    #[must_use]
    pub const fn codec_capability(&self) -> CodecConfig {
        self.capability
    }

    /// Local capability
    #[must_use]
    pub const fn local_capability(&self) -> CodecConfig {
        self.local_capability
    }

    /// Values a user may pick from
    #[must_use]
    pub const fn selectable_capability(&self) -> CodecConfig {
        self.selectable_capability
    }

    /// Last accepted user configuration
    #[must_use]
    pub const fn user_config(&self) -> CodecConfig {
        self.user_config
    }

    /// Last accepted audio pipeline configuration
    #[must_use]
    pub const fn audio_config(&self) -> CodecConfig {
        self.audio_config
    }

    /// Local capability as a wire element
    #[must_use]
    pub const fn local_codec_info(&self) -> CodecInfo {
        self.local_info
    }

    /// Last capability the peer advertised
    #[must_use]
    pub const fn ota_peer_capability(&self) -> CodecInfo {
        self.ota_peer_capability
    }

    /// Last configuration the peer chose
    #[must_use]
    pub const fn ota_peer_config(&self) -> CodecInfo {
        self.ota_peer_config
    }

    /// Link parameters from the last user reconfiguration
    #[must_use]
    pub const fn peer_params(&self) -> PeerParams {
        self.peer_params
    }

    /// Intersect the local capability with a peer capability
    ///
    /// # Errors
    /// [`CodecError::InvalidCodecInfo`] if `peer` is not a capability of this
    /// codec's family.
    pub fn set_peer_capabilities(&mut self, peer: &CodecInfo) -> Result<(), CodecError> {
        let mut selectable = selectable_capability(self.handler, &self.local_info, peer)?;
        selectable.codec_type = Some(self.index);
        selectable.priority = self.priority;
        self.selectable_capability = selectable;
        self.ota_peer_capability = *peer;
        trace!("[CODEC] {} peer capability stored", self.name());
        Ok(())
    }

    /// Negotiate against a peer element with the stored user and audio
    /// configs and commit the result
    ///
    /// # Errors
    /// [`CodecError::InvalidCodecInfo`] for a malformed peer element and
    /// [`CodecError::NoCompatibleConfig`] when no common configuration exists.
    pub fn set_codec_config(
        &mut self,
        peer: &CodecInfo,
        is_capability: bool,
    ) -> Result<CodecInfo, CodecError> {
        let (user, audio) = (self.user_config, self.audio_config);
        self.negotiate_and_commit(peer, is_capability, &user, &audio)
    }

    /// Reconcile a new user and audio configuration with a peer element
    ///
    /// Input restarts on a change of rate, width, mode or codec specific
    /// fields 1 to 3; field 4 does not take part. Output restarts whenever
    /// the wire element changes. On failure nothing is committed.
    ///
    /// # Errors
    /// Same as [`A2dpCodec::set_codec_config`].
    pub fn set_codec_user_config(
        &mut self,
        user: &CodecConfig,
        audio: &CodecConfig,
        peer_params: &PeerParams,
        peer: &CodecInfo,
        is_capability: bool,
    ) -> Result<Reconfiguration, CodecError> {
        let saved_config = self.config;
        let saved_ota = self.ota_config;

        let codec_info = self
            .negotiate_and_commit(peer, is_capability, user, audio)
            .inspect_err(|_e| {
                warn!("[CODEC] {} user config rejected", self.index.name());
            })?;
        self.user_config = *user;
        self.audio_config = *audio;
        self.peer_params = *peer_params;

        let restart_input = saved_config.pcm_format_differs(&self.config);
        let restart_output = !self.registry.codec_equals(&saved_ota, &codec_info);
        debug!(
            "[CODEC] {} restart input {} output {}",
            self.name(),
            restart_input,
            restart_output
        );
        Ok(Reconfiguration {
            codec_info,
            restart_input,
            restart_output,
            config_updated: restart_input || restart_output,
        })
    }

    fn negotiate_and_commit(
        &mut self,
        peer: &CodecInfo,
        is_capability: bool,
        user: &CodecConfig,
        audio: &CodecConfig,
    ) -> Result<CodecInfo, CodecError> {
        let ctx = NegotiationContext {
            local: &self.local_info,
            peer,
            is_capability,
            user,
            audio,
        };
        let negotiated = negotiate(self.handler, &ctx)?;

        let mut config = negotiated.config;
        config.codec_type = Some(self.index);
        config.priority = self.priority;
        let mut capability = negotiated.capability;
        capability.codec_type = Some(self.index);
        capability.priority = self.priority;

        self.config = config;
        self.capability = capability;
        self.ota_config = negotiated.codec_info;
        if is_capability {
            let mut selectable = negotiated.selectable;
            selectable.codec_type = Some(self.index);
            selectable.priority = self.priority;
            self.selectable_capability = selectable;
            self.ota_peer_capability = *peer;
        } else {
            self.ota_peer_config = *peer;
        }
        Ok(negotiated.codec_info)
    }

    /// Negotiated wire element
    ///
    /// # Errors
    /// [`CodecError::InvalidCodecInfo`] if nothing valid was negotiated yet.
    pub fn copy_out_ota_codec_config(&self) -> Result<CodecInfo, CodecError> {
        let valid = match self.index.direction() {
            CodecDirection::Source => self.registry.is_source_codec_valid(&self.ota_config),
            CodecDirection::Sink => self.registry.is_sink_codec_valid(&self.ota_config),
        };
        if valid {
            Ok(self.ota_config)
        } else {
            Err(CodecError::InvalidCodecInfo)
        }
    }

    /// Bitrate of the negotiated element in bits per second
    #[must_use]
    pub fn track_bit_rate(&self) -> Option<u32> {
        self.registry.track_bit_rate(&self.ota_config)
    }

    /// Negotiated sample width in bits: 16, 24, 32, or 0 if unresolved
    #[must_use]
    pub const fn audio_bits_per_sample(&self) -> u8 {
        match self.config.bits_per_sample.bits() {
            Some(bits @ (16 | 24 | 32)) => bits,
            _ => 0,
        }
    }

    /// Offload descriptor of the negotiated element
    ///
    /// # Errors
    /// [`CodecError::Offload`] if the element cannot be translated.
    pub fn codec_specific_config(&self) -> Result<OffloadDescriptor, CodecError> {
        Ok(offload::codec_specific_config(
            self.registry,
            &self.ota_config,
            &self.config,
        )?)
    }

    /// Write a field labelled state summary
    ///
    /// # Errors
    /// Propagates errors of `out`.
    pub fn dump<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "\nA2DP {} State:\n  Priority: {}\n  Config: {}\n  Selectable: {}\n  Local capability: {}\n",
            self.name(),
            self.priority,
            self.config,
            self.selectable_capability,
            self.local_capability
        )
    }
}
