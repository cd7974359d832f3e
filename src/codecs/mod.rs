//! Codec Collection
//!
//! [`A2dpCodecs`] owns one [`A2dpCodec`] per enabled codec index, keeps the
//! source and sink codecs ordered by priority and tracks which source codec
//! is current. All state sits behind a single blocking mutex; every public
//! operation takes it once and runs its whole negotiate, compare, commit and
//! re-sort sequence under it.
//!
//! Ordering: higher priority first, ties broken by the larger index.

pub mod codec;
pub mod options;

use core::cell::RefCell;
use core::fmt::{self, Write};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use heapless::{FnvIndexMap, Vec};

use crate::CodecError;
use crate::codec_info::CodecInfo;
use crate::config::CodecConfig;
use crate::constants::{MAX_CODECS, MAX_OFFLOAD_TOKENS};
use crate::family::{CodecRegistry, PeerParams, lhdc};
use crate::index::{CodecIndex, CodecPriority};
use crate::lhdc_ext::{
    self, EXT_TYPE_A2DP, EXT_TYPE_LIB, LhdcEncoderSession, SpecificTarget,
};
use crate::offload::OffloadDescriptor;

pub use codec::{A2dpCodec, Reconfiguration};
pub use options::CodecsOptions;

/// Indices in priority order
pub type CodecList = Vec<CodecIndex, MAX_CODECS>;

/// Snapshot for the configuration API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigAndCapabilities {
    /// Configuration of the current codec, empty if there is none
    pub config: CodecConfig,
    /// Local capability of every source codec, in priority order
    pub local_capabilities: Vec<CodecConfig, MAX_CODECS>,
    /// Selectable capability of every source codec that has a rate, width
    /// and mode to offer, in priority order
    pub selectable_capabilities: Vec<CodecConfig, MAX_CODECS>,
}

#[derive(Debug)]
struct CodecsState {
    initialized: bool,
    codecs: FnvIndexMap<CodecIndex, A2dpCodec, MAX_CODECS>,
    disabled: FnvIndexMap<CodecIndex, A2dpCodec, MAX_CODECS>,
    ordered_source: CodecList,
    ordered_sink: CodecList,
    current: Option<CodecIndex>,
    offload: Vec<CodecIndex, MAX_OFFLOAD_TOKENS>,
}

fn sort_by_priority(list: &mut [CodecIndex], codecs: &FnvIndexMap<CodecIndex, A2dpCodec, MAX_CODECS>) {
    let priority = |index: &CodecIndex| codecs.get(index).map(A2dpCodec::priority);
    list.sort_unstable_by(|a, b| priority(b).cmp(&priority(a)).then(b.cmp(a)));
}

impl CodecsState {
    const fn new() -> Self {
        Self {
            initialized: false,
            codecs: FnvIndexMap::new(),
            disabled: FnvIndexMap::new(),
            ordered_source: Vec::new(),
            ordered_sink: Vec::new(),
            current: None,
            offload: Vec::new(),
        }
    }

    const fn ensure_initialized(&self) -> Result<(), CodecError> {
        if self.initialized {
            Ok(())
        } else {
            Err(CodecError::NotInitialized)
        }
    }

    fn init(
        &mut self,
        registry: &'static CodecRegistry,
        options: &CodecsOptions,
    ) -> Result<(), CodecError> {
        if self.initialized {
            return Err(CodecError::AlreadyInitialized);
        }
        match self.build(registry, options) {
            Ok(()) => {
                self.initialized = true;
                Ok(())
            }
            Err(e) => {
                *self = Self::new();
                Err(e)
            }
        }
    }

    fn build(
        &mut self,
        registry: &'static CodecRegistry,
        options: &CodecsOptions,
    ) -> Result<(), CodecError> {
        self.offload = options.offload_codecs();
        info!(
            "[CODECS] offload enabled {} ({} codecs)",
            options.offload_enabled(),
            self.offload.len()
        );

        for index in CodecIndex::ALL {
            let Some(codec) = A2dpCodec::create(index, options.priority_for(index), registry) else {
                continue;
            };
            if codec.priority().is_disabled() {
                info!("[CODECS] {} disabled", index.name());
                self.disabled
                    .insert(index, codec)
                    .map_err(|_| CodecError::CapacityExceeded)?;
                continue;
            }
            self.codecs
                .insert(index, codec)
                .map_err(|_| CodecError::CapacityExceeded)?;
            let list = if index.is_source() {
                &mut self.ordered_source
            } else {
                &mut self.ordered_sink
            };
            list.push(index).map_err(|_| CodecError::CapacityExceeded)?;
        }
        sort_by_priority(&mut self.ordered_source, &self.codecs);
        sort_by_priority(&mut self.ordered_sink, &self.codecs);

        if self.ordered_source.is_empty() {
            error!("[CODECS] no source codecs");
            return Err(CodecError::NoSourceCodecs);
        }
        if self.ordered_sink.is_empty() {
            error!("[CODECS] no sink codecs");
            return Err(CodecError::NoSinkCodecs);
        }
        Ok(())
    }

    fn codec(&self, index: CodecIndex) -> Result<&A2dpCodec, CodecError> {
        self.codecs.get(&index).ok_or(CodecError::UnsupportedCodec)
    }

    fn codec_mut(&mut self, index: CodecIndex) -> Result<&mut A2dpCodec, CodecError> {
        self.codecs.get_mut(&index).ok_or(CodecError::UnsupportedCodec)
    }

    fn current(&self) -> Result<&A2dpCodec, CodecError> {
        let index = self.current.ok_or(CodecError::NoCurrentCodec)?;
        self.codec(index)
    }

    fn enabled(&self, index: Option<CodecIndex>) -> Option<CodecIndex> {
        index.filter(|i| self.codecs.contains_key(i))
    }

    fn set_codec_config(
        &mut self,
        index: Option<CodecIndex>,
        peer: &CodecInfo,
        is_capability: bool,
        select_current: bool,
    ) -> Result<CodecInfo, CodecError> {
        self.ensure_initialized()?;
        let index = self.enabled(index).ok_or(CodecError::UnsupportedCodec)?;
        let info = self.codec_mut(index)?.set_codec_config(peer, is_capability)?;
        if select_current {
            self.current = Some(index);
        }
        Ok(info)
    }

    fn set_codec_user_config(
        &mut self,
        user: &CodecConfig,
        peer_params: &PeerParams,
        peer: &CodecInfo,
    ) -> Result<Reconfiguration, CodecError> {
        self.ensure_initialized()?;
        let last = self.current;
        let result = self.apply_user_config(last, user, peer_params, peer);
        if result.is_err() {
            self.current = last;
        }
        result
    }

    fn apply_user_config(
        &mut self,
        last: Option<CodecIndex>,
        user: &CodecConfig,
        peer_params: &PeerParams,
        peer: &CodecInfo,
    ) -> Result<Reconfiguration, CodecError> {
        let target = match user.codec_type {
            Some(index) if self.codecs.contains_key(&index) => index,
            Some(index) => {
                warn!("[CODECS] user config for unavailable codec {}", index.name());
                return Err(CodecError::UnsupportedCodec);
            }
            None => last.ok_or(CodecError::NoCurrentCodec)?,
        };
        info!("[CODECS] configuring {}", target.name());

        let codec = self.codec_mut(target)?;
        let audio = codec.audio_config();
        let mut result = codec.set_codec_user_config(user, &audio, peer_params, peer, true)?;
        let old_priority = codec.priority();
        codec.set_codec_priority(user.priority);
        let new_priority = codec.priority();

        match last {
            None => {
                self.current = Some(target);
                result.restart_input = true;
                result.restart_output = true;
            }
            Some(last) if last == target => {
                if old_priority != new_priority {
                    result.config_updated = true;
                    if new_priority < old_priority {
                        result.restart_output = true;
                    }
                }
            }
            Some(_) if new_priority <= old_priority => {
                if result.restart_input || result.restart_output || old_priority != new_priority {
                    result.config_updated = true;
                }
                result.restart_input = false;
                result.restart_output = false;
            }
            Some(last) => {
                result.config_updated = true;
                let last_priority = self
                    .codecs
                    .get(&last)
                    .map_or(CodecPriority::DISABLED, A2dpCodec::priority);
                if new_priority >= last_priority {
                    info!(
                        "[CODECS] {} replaces {} as current",
                        target.name(),
                        last.name()
                    );
                    self.current = Some(target);
                    if let Some(previous) = self.codecs.get_mut(&last) {
                        previous.set_default_priority();
                    }
                    result.restart_input = true;
                    result.restart_output = true;
                }
            }
        }
        sort_by_priority(&mut self.ordered_source, &self.codecs);
        sort_by_priority(&mut self.ordered_sink, &self.codecs);

        if result.restart_input || result.restart_output {
            result.config_updated = true;
        }
        info!(
            "[CODECS] configured: restart input {} output {} updated {}",
            result.restart_input,
            result.restart_output,
            result.config_updated
        );
        Ok(result)
    }

    fn set_codec_audio_config(
        &mut self,
        audio: &CodecConfig,
        peer_params: &PeerParams,
        peer: &CodecInfo,
    ) -> Result<Reconfiguration, CodecError> {
        self.ensure_initialized()?;
        let index = self.current.ok_or(CodecError::NoCurrentCodec)?;
        let codec = self.codec_mut(index)?;
        let user = codec.user_config();
        let mut result = codec.set_codec_user_config(&user, audio, peer_params, peer, true)?;
        result.restart_input = false;
        Ok(result)
    }

    fn set_codec_ota_config(
        &mut self,
        registry: &CodecRegistry,
        ota: &CodecInfo,
        peer_params: &PeerParams,
    ) -> Result<Reconfiguration, CodecError> {
        self.ensure_initialized()?;
        let last = self.current;
        if let Some(current) = last {
            if !self.codec(current)?.user_config().is_empty() {
                warn!(
                    "[CODECS] ignoring peer OTA config: user config set for current codec {}",
                    current.name()
                );
                return Err(CodecError::UserConfigPrecedence);
            }
        }
        let Some(index) = registry.source_codec_index(ota) else {
            warn!("[CODECS] ignoring peer OTA config: invalid codec");
            return Err(CodecError::InvalidCodecInfo);
        };
        let codec = self.codecs.get_mut(&index).ok_or_else(|| {
            warn!("[CODECS] no codec for peer OTA config {}", index.name());
            CodecError::UnsupportedCodec
        })?;
        let user = codec.user_config();
        if !user.is_empty() {
            warn!(
                "[CODECS] ignoring peer OTA config: user config set for {}",
                index.name()
            );
            return Err(CodecError::UserConfigPrecedence);
        }
        self.current = Some(index);

        let audio = codec.audio_config();
        match codec.set_codec_user_config(&user, &audio, peer_params, ota, false) {
            Ok(mut result) => {
                if result.restart_input || result.restart_output {
                    result.config_updated = true;
                }
                Ok(result)
            }
            Err(e) => {
                warn!("[CODECS] cannot apply peer OTA config for {}", index.name());
                self.current = last;
                Err(e)
            }
        }
    }

    fn snapshot(&self) -> ConfigAndCapabilities {
        let config = self
            .current()
            .map_or(CodecConfig::EMPTY, A2dpCodec::codec_config);
        let mut local_capabilities = Vec::new();
        let mut selectable_capabilities = Vec::new();
        for codec in self.ordered_source.iter().filter_map(|i| self.codecs.get(i)) {
            if local_capabilities.push(codec.local_capability()).is_err() {
                warn!("[CODECS] local capability list full");
                break;
            }
            let selectable = codec.selectable_capability();
            if selectable.sample_rate.is_empty()
                || selectable.bits_per_sample.is_empty()
                || selectable.channel_mode.is_empty()
            {
                continue;
            }
            if selectable_capabilities.push(selectable).is_err() {
                warn!("[CODECS] selectable capability list full");
                break;
            }
        }
        ConfigAndCapabilities {
            config,
            local_capabilities,
            selectable_capabilities,
        }
    }

    fn lhdc_codec(&self, index: CodecIndex) -> Result<(), CodecError> {
        match index {
            CodecIndex::SourceLhdcV3 | CodecIndex::SourceLhdcV5 => self.codec(index).map(|_| ()),
            _ => {
                debug!("[LHDC EXT] {} does not support the extended API", index.name());
                Err(CodecError::UnsupportedCodec)
            }
        }
    }

    fn lhdc_get_specific(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        let request = lhdc_ext::parse_get_specific(buf)?;
        let current = self.current()?;
        let view = match request.target {
            SpecificTarget::Config => current.codec_config(),
            SpecificTarget::Capability => current.codec_capability(),
            SpecificTarget::LocalCapability => current.local_capability(),
            SpecificTarget::SelectableCapability => current.selectable_capability(),
            SpecificTarget::UserConfig => current.user_config(),
            SpecificTarget::AudioConfig => current.audio_config(),
        };
        let vector = lhdc_ext::capability_vector(&lhdc::LHDC_V3.source_capability);
        lhdc_ext::write_specifics(request.layout, &view, &vector, buf)
    }

    fn dump<W: Write>(&self, out: &mut W) -> fmt::Result {
        out.write_str("\nA2DP Codecs State:\n")?;
        match self.current {
            Some(index) => writeln!(out, "  Current Codec: {}", index.name())?,
            None => out.write_str("  Current Codec: None\n")?,
        }
        for codec in self.ordered_source.iter().filter_map(|i| self.codecs.get(i)) {
            codec.dump(out)?;
        }
        Ok(())
    }
}

/// The codec collection of one A2DP connection
///
/// `M` picks the lock: [`CriticalSectionRawMutex`] when the collection is
/// shared between execution contexts, `NoopRawMutex` when it is not.
pub struct A2dpCodecs<M: RawMutex = CriticalSectionRawMutex> {
    registry: &'static CodecRegistry,
    options: CodecsOptions,
    state: Mutex<M, RefCell<CodecsState>>,
}

impl<M: RawMutex> A2dpCodecs<M> {
    /// Create an uninitialised collection over the built-in families
    #[must_use]
    pub fn new(options: CodecsOptions) -> Self {
        Self::with_registry(CodecRegistry::builtin(), options)
    }

    /// Create an uninitialised collection over `registry`
    #[must_use]
    pub const fn with_registry(registry: &'static CodecRegistry, options: CodecsOptions) -> Self {
        Self {
            registry,
            options,
            state: Mutex::new(RefCell::new(CodecsState::new())),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut CodecsState) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Options the collection was created with
    #[must_use]
    pub const fn options(&self) -> &CodecsOptions {
        &self.options
    }

    /// Family registry
    #[must_use]
    pub const fn registry(&self) -> &'static CodecRegistry {
        self.registry
    }

    /// Build one codec per index and order them
    ///
    /// Codecs whose priority resolves to [`CodecPriority::DISABLED`] are kept
    /// aside and take no part in negotiation.
    ///
    /// # Errors
    /// [`CodecError::AlreadyInitialized`] on a second call,
    /// [`CodecError::NoSourceCodecs`] or [`CodecError::NoSinkCodecs`] if a
    /// direction ends up without codecs. A failed call leaves the collection
    /// empty and uninitialized, so `init()` may be retried.
    pub fn init(&self) -> Result<(), CodecError> {
        self.with_state(|state| state.init(self.registry, &self.options))
    }

    /// `init()` ran
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.with_state(|state| state.initialized)
    }

    /// Enabled encoder for an element
    #[must_use]
    pub fn find_source_codec_config(&self, info: &CodecInfo) -> Option<CodecIndex> {
        let index = self.registry.source_codec_index(info);
        self.with_state(|state| state.enabled(index))
    }

    /// Enabled decoder for an element
    #[must_use]
    pub fn find_sink_codec_config(&self, info: &CodecInfo) -> Option<CodecIndex> {
        let index = self.registry.sink_codec_index(info);
        self.with_state(|state| state.enabled(index))
    }

    /// `index` is enabled
    #[must_use]
    pub fn is_supported_codec(&self, index: CodecIndex) -> bool {
        self.with_state(|state| state.codecs.contains_key(&index))
    }

    /// Negotiate the encoder matching `peer`, optionally making it current
    ///
    /// # Errors
    /// [`CodecError::UnsupportedCodec`] if no enabled encoder matches, or the
    /// negotiation error.
    pub fn set_codec_config(
        &self,
        peer: &CodecInfo,
        is_capability: bool,
        select_current: bool,
    ) -> Result<CodecInfo, CodecError> {
        let index = self.registry.source_codec_index(peer);
        self.with_state(|state| state.set_codec_config(index, peer, is_capability, select_current))
    }

    /// Negotiate the decoder matching `peer`, optionally making it current
    ///
    /// # Errors
    /// Same as [`A2dpCodecs::set_codec_config`].
    pub fn set_sink_codec_config(
        &self,
        peer: &CodecInfo,
        is_capability: bool,
        select_current: bool,
    ) -> Result<CodecInfo, CodecError> {
        let index = self.registry.sink_codec_index(peer);
        self.with_state(|state| state.set_codec_config(index, peer, is_capability, select_current))
    }

    /// Apply a user configuration and run codec selection
    ///
    /// `user.codec_type` picks the codec, `None` means the current one. The
    /// codec's priority is updated from `user.priority`; a codec that now
    /// outranks the current one replaces it and both sides restart. A codec
    /// that is not current and did not gain priority never restarts anything.
    ///
    /// # Errors
    /// [`CodecError::UnsupportedCodec`], [`CodecError::NoCurrentCodec`] or
    /// the negotiation error. The current codec is left as it was.
    pub fn set_codec_user_config(
        &self,
        user: &CodecConfig,
        peer_params: &PeerParams,
        peer_sink_capabilities: &CodecInfo,
    ) -> Result<Reconfiguration, CodecError> {
        self.with_state(|state| state.set_codec_user_config(user, peer_params, peer_sink_capabilities))
    }

    /// Apply an audio pipeline configuration to the current codec
    ///
    /// The input was just restarted by the caller, so `restart_input` is
    /// always reported false.
    ///
    /// # Errors
    /// [`CodecError::NoCurrentCodec`] or the negotiation error.
    pub fn set_codec_audio_config(
        &self,
        audio: &CodecConfig,
        peer_params: &PeerParams,
        peer_sink_capabilities: &CodecInfo,
    ) -> Result<Reconfiguration, CodecError> {
        self.with_state(|state| state.set_codec_audio_config(audio, peer_params, peer_sink_capabilities))
    }

    /// Apply a configuration chosen by the peer
    ///
    /// # Errors
    /// [`CodecError::UserConfigPrecedence`] if the current codec or the codec
    /// the peer picked carries a user configuration, otherwise
    /// [`CodecError::InvalidCodecInfo`], [`CodecError::UnsupportedCodec`] or
    /// the negotiation error. The current codec is left as it was.
    pub fn set_codec_ota_config(
        &self,
        ota: &CodecInfo,
        peer_params: &PeerParams,
    ) -> Result<Reconfiguration, CodecError> {
        self.with_state(|state| state.set_codec_ota_config(self.registry, ota, peer_params))
    }

    /// Store a peer sink capability on the matching encoder
    ///
    /// # Errors
    /// [`CodecError::InvalidCodecInfo`] for an element no encoder could
    /// serve, [`CodecError::UnsupportedCodec`] if that encoder is not enabled.
    pub fn set_peer_sink_codec_capabilities(&self, capabilities: &CodecInfo) -> Result<(), CodecError> {
        if !self.registry.is_peer_sink_codec_valid(capabilities) {
            return Err(CodecError::InvalidCodecInfo);
        }
        let index = self.registry.source_codec_index(capabilities);
        self.with_state(|state| {
            state.ensure_initialized()?;
            let index = state.enabled(index).ok_or(CodecError::UnsupportedCodec)?;
            state.codec_mut(index)?.set_peer_capabilities(capabilities)
        })
    }

    /// Store a peer source capability on the matching decoder
    ///
    /// # Errors
    /// Same as [`A2dpCodecs::set_peer_sink_codec_capabilities`].
    pub fn set_peer_source_codec_capabilities(
        &self,
        capabilities: &CodecInfo,
    ) -> Result<(), CodecError> {
        if !self.registry.is_peer_source_codec_valid(capabilities) {
            return Err(CodecError::InvalidCodecInfo);
        }
        let index = self.registry.sink_codec_index(capabilities);
        self.with_state(|state| {
            state.ensure_initialized()?;
            let index = state.enabled(index).ok_or(CodecError::UnsupportedCodec)?;
            state.codec_mut(index)?.set_peer_capabilities(capabilities)
        })
    }

    /// Current configuration and the source codecs' capabilities
    #[must_use]
    pub fn get_codec_config_and_capabilities(&self) -> ConfigAndCapabilities {
        self.with_state(|state| state.snapshot())
    }

    /// Current codec
    #[must_use]
    pub fn current_codec(&self) -> Option<CodecIndex> {
        self.with_state(|state| state.current)
    }

    /// Resolved configuration of the current codec
    #[must_use]
    pub fn current_codec_config(&self) -> Option<CodecConfig> {
        self.with_state(|state| state.current().ok().map(A2dpCodec::codec_config))
    }

    /// Negotiated wire element of the current codec
    ///
    /// # Errors
    /// [`CodecError::NoCurrentCodec`], or [`CodecError::InvalidCodecInfo`]
    /// if nothing valid was negotiated yet.
    pub fn current_ota_codec_config(&self) -> Result<CodecInfo, CodecError> {
        self.with_state(|state| state.current()?.copy_out_ota_codec_config())
    }

    /// Resolved configuration of an enabled codec
    #[must_use]
    pub fn codec_config(&self, index: CodecIndex) -> Option<CodecConfig> {
        self.with_codec(index, A2dpCodec::codec_config)
    }

    /// Run `f` on an enabled codec under the lock
    pub fn with_codec<R>(&self, index: CodecIndex, f: impl FnOnce(&A2dpCodec) -> R) -> Option<R> {
        self.with_state(|state| state.codecs.get(&index).map(f))
    }

    /// Enabled source codecs, best first
    #[must_use]
    pub fn ordered_source_codecs(&self) -> CodecList {
        self.with_state(|state| state.ordered_source.clone())
    }

    /// Enabled sink codecs, best first
    #[must_use]
    pub fn ordered_sink_codecs(&self) -> CodecList {
        self.with_state(|state| state.ordered_sink.clone())
    }

    /// Codecs set aside by a disabled priority
    #[must_use]
    pub fn disabled_codecs(&self) -> CodecList {
        self.with_state(|state| state.disabled.keys().copied().collect())
    }

    /// Encoding of `index` may be offloaded
    #[must_use]
    pub fn is_offload_supported(&self, index: CodecIndex) -> bool {
        self.with_state(|state| state.offload.contains(&index))
    }

    /// Offload descriptor of the current codec
    ///
    /// # Errors
    /// [`CodecError::NoCurrentCodec`], [`CodecError::UnsupportedCodec`] if the
    /// current codec cannot be offloaded, or [`CodecError::Offload`].
    pub fn offload_codec_config(&self) -> Result<OffloadDescriptor, CodecError> {
        self.with_state(|state| {
            let codec = state.current()?;
            if !state.offload.contains(&codec.codec_index()) {
                warn!("[CODECS] offload not supported for {}", codec.name());
                return Err(CodecError::UnsupportedCodec);
            }
            codec.codec_specific_config()
        })
    }

    /// Write the collection state followed by every source codec's state
    ///
    /// # Errors
    /// Propagates errors of `out`.
    pub fn dump<W: Write>(&self, out: &mut W) -> fmt::Result {
        self.with_state(|state| state.dump(out))
    }

    /// Serve an LHDC extended API read
    ///
    /// A2DP requests read a view of the current codec, library requests read
    /// the encoder configuration stored in `session`. `index` names the
    /// encoder the request was addressed to.
    ///
    /// # Errors
    /// [`CodecError::UnsupportedCodec`] unless `index` is an enabled LHDC V3
    /// or V5 encoder, [`CodecError::InvalidRequest`] for a malformed request,
    /// [`CodecError::BufferTooSmall`] or [`CodecError::NoCurrentCodec`].
    pub fn lhdc_get_user_config(
        &self,
        index: CodecIndex,
        session: &LhdcEncoderSession,
        buf: &mut [u8],
    ) -> Result<(), CodecError> {
        self.with_state(|state| {
            state.lhdc_codec(index)?;
            match lhdc_ext::request_type(buf) {
                Some(EXT_TYPE_A2DP) => state.lhdc_get_specific(buf),
                Some(EXT_TYPE_LIB) => session.write_config(buf).map(|_| ()),
                _ => Err(CodecError::InvalidRequest),
            }
        })
    }

    /// Store an LHDC encoder configuration blob
    ///
    /// # Errors
    /// [`CodecError::UnsupportedCodec`] unless `index` is an enabled LHDC V3
    /// or V5 encoder, or [`CodecError::CapacityExceeded`].
    pub fn lhdc_set_user_config(
        &self,
        index: CodecIndex,
        session: &mut LhdcEncoderSession,
        blob: &[u8],
    ) -> Result<(), CodecError> {
        self.with_state(|state| state.lhdc_codec(index))?;
        session.set_config(blob)
    }

    /// Store an LHDC user data blob
    ///
    /// # Errors
    /// Same as [`A2dpCodecs::lhdc_set_user_config`].
    pub fn lhdc_set_user_data(
        &self,
        index: CodecIndex,
        session: &mut LhdcEncoderSession,
        blob: &[u8],
    ) -> Result<(), CodecError> {
        self.with_state(|state| state.lhdc_codec(index))?;
        session.set_user_data(blob)
    }

    /// Write the LHDC extended API version into `buf`
    ///
    /// # Errors
    /// [`CodecError::UnsupportedCodec`] unless `index` is an enabled LHDC V3
    /// or V5 encoder, or [`CodecError::BufferTooSmall`].
    pub fn lhdc_get_api_version(
        &self,
        index: CodecIndex,
        session: &LhdcEncoderSession,
        buf: &mut [u8],
    ) -> Result<(), CodecError> {
        self.with_state(|state| state.lhdc_codec(index))?;
        session.write_api_version(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelMode, SampleRate};
    use crate::family::aac::AAC;
    use crate::family::sbc::{self, capability};
    use crate::lhdc_ext::{EXT_FUNC_GET_SPECIFIC, EXT_FUNC_VER_GET_SPECIFIC_V1};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use std::string::String;

    type Codecs = A2dpCodecs<NoopRawMutex>;

    fn codecs(options: CodecsOptions) -> Codecs {
        let codecs = Codecs::new(options);
        codecs.init().unwrap();
        codecs
    }

    fn peer_sbc() -> CodecInfo {
        capability(0xFF, 0xFF, 2, 53)
    }

    fn sbc_config() -> CodecInfo {
        capability(sbc::FREQ_44100 | sbc::CH_JOINT_STEREO, 0x15, 2, 53)
    }

    fn user_for(index: CodecIndex) -> CodecConfig {
        CodecConfig::for_codec(index)
    }

    #[test]
    fn test_init_orders_by_priority() {
        let codecs = codecs(CodecsOptions::default());
        assert!(codecs.is_initialized());
        let source = codecs.ordered_source_codecs();
        assert_eq!(source.len(), 9);
        assert_eq!(source[0], CodecIndex::SourceLhdcV5);
        assert_eq!(source[8], CodecIndex::SourceSbc);
        let sink = codecs.ordered_sink_codecs();
        assert_eq!(sink.first(), Some(&CodecIndex::SinkLhdcV5));
        assert_eq!(sink.last(), Some(&CodecIndex::SinkSbc));
        assert!(codecs.disabled_codecs().is_empty());
        assert_eq!(codecs.current_codec(), None);
        assert_eq!(codecs.init(), Err(CodecError::AlreadyInitialized));
    }

    #[test]
    fn test_operations_need_init() {
        let codecs = Codecs::new(CodecsOptions::default());
        assert_eq!(
            codecs.set_codec_user_config(
                &user_for(CodecIndex::SourceSbc),
                &PeerParams::default(),
                &peer_sbc()
            ),
            Err(CodecError::NotInitialized)
        );
    }

    #[test]
    fn test_tie_break_prefers_larger_index() {
        let options = CodecsOptions::default()
            .with_priority(CodecIndex::SourceSbc, CodecPriority::HIGHEST)
            .with_priority(CodecIndex::SourceAac, CodecPriority::HIGHEST);
        let codecs = codecs(options);
        let source = codecs.ordered_source_codecs();
        assert_eq!(source[..2], [CodecIndex::SourceAac, CodecIndex::SourceSbc]);
    }

    #[test]
    fn test_opus_gate_disables_both_directions() {
        let codecs = codecs(CodecsOptions::default().with_opus_enabled(false));
        let disabled = codecs.disabled_codecs();
        assert!(disabled.contains(&CodecIndex::SourceOpus));
        assert!(disabled.contains(&CodecIndex::SinkOpus));
        assert!(!codecs.is_supported_codec(CodecIndex::SourceOpus));
        assert!(!codecs.ordered_source_codecs().contains(&CodecIndex::SourceOpus));
    }

    #[test]
    fn test_init_fails_without_sources() {
        let options = CodecIndex::ALL
            .into_iter()
            .filter(|i| i.is_source())
            .fold(CodecsOptions::default(), |o, i| o.with_priority(i, CodecPriority::DISABLED));
        let codecs = Codecs::new(options);
        assert_eq!(codecs.init(), Err(CodecError::NoSourceCodecs));
        assert!(!codecs.is_initialized());
        assert!(codecs.disabled_codecs().is_empty());
        assert!(codecs.ordered_sink_codecs().is_empty());
    }

    #[test]
    fn test_failed_init_can_be_retried() {
        let options = CodecIndex::ALL
            .into_iter()
            .filter(|i| !i.is_source())
            .fold(CodecsOptions::default(), |o, i| o.with_priority(i, CodecPriority::DISABLED));
        let codecs = Codecs::new(options);
        assert_eq!(codecs.init(), Err(CodecError::NoSinkCodecs));
        assert!(!codecs.is_initialized());
        assert!(codecs.ordered_source_codecs().is_empty());
        assert!(codecs.disabled_codecs().is_empty());
        assert_eq!(codecs.init(), Err(CodecError::NoSinkCodecs));
        assert_eq!(
            codecs.set_codec_user_config(
                &user_for(CodecIndex::SourceSbc),
                &PeerParams::default(),
                &peer_sbc()
            ),
            Err(CodecError::NotInitialized)
        );
    }

    #[test]
    fn test_find_codec_config() {
        let codecs = codecs(CodecsOptions::default().with_opus_enabled(false));
        assert_eq!(
            codecs.find_source_codec_config(&peer_sbc()),
            Some(CodecIndex::SourceSbc)
        );
        assert_eq!(
            codecs.find_sink_codec_config(&peer_sbc()),
            Some(CodecIndex::SinkSbc)
        );
        let opus = crate::family::opus::OPUS.source_capability;
        assert_eq!(codecs.find_source_codec_config(&opus), None);
        assert_eq!(codecs.find_source_codec_config(&CodecInfo::EMPTY), None);
    }

    #[test]
    fn test_first_selection_restarts_everything() {
        let codecs = codecs(CodecsOptions::default());
        let result = codecs
            .set_codec_user_config(
                &user_for(CodecIndex::SourceSbc),
                &PeerParams::default(),
                &peer_sbc(),
            )
            .unwrap();
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SourceSbc));
        assert!(result.restart_input);
        assert!(result.restart_output);
        assert!(result.config_updated);
        assert_eq!(codecs.current_ota_codec_config(), Ok(result.codec_info));
    }

    #[test]
    fn test_repeated_user_config_is_idempotent() {
        let codecs = codecs(CodecsOptions::default());
        let user = user_for(CodecIndex::SourceSbc);
        let params = PeerParams::default();
        codecs.set_codec_user_config(&user, &params, &peer_sbc()).unwrap();
        let again = codecs.set_codec_user_config(&user, &params, &peer_sbc()).unwrap();
        assert!(!again.restart_input);
        assert!(!again.restart_output);
        assert!(!again.config_updated);
    }

    #[test]
    fn test_user_config_without_target_needs_current() {
        let codecs = codecs(CodecsOptions::default());
        assert_eq!(
            codecs.set_codec_user_config(&CodecConfig::EMPTY, &PeerParams::default(), &peer_sbc()),
            Err(CodecError::NoCurrentCodec)
        );
    }

    #[test]
    fn test_failed_user_config_keeps_state() {
        let codecs = codecs(CodecsOptions::default().with_opus_enabled(false));
        let params = PeerParams::default();
        codecs
            .set_codec_user_config(&user_for(CodecIndex::SourceSbc), &params, &peer_sbc())
            .unwrap();
        let config = codecs.current_codec_config();

        assert_eq!(
            codecs.set_codec_user_config(&user_for(CodecIndex::SourceOpus), &params, &peer_sbc()),
            Err(CodecError::UnsupportedCodec)
        );
        let disjoint = capability(0xFF, 0xFF, 60, 80);
        let user = user_for(CodecIndex::SourceSbc).with_sample_rate(SampleRate::RATE_48000);
        assert_eq!(
            codecs.set_codec_user_config(&user, &params, &disjoint),
            Err(CodecError::NoCompatibleConfig)
        );
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SourceSbc));
        assert_eq!(codecs.current_codec_config(), config);
    }

    #[test]
    fn test_higher_priority_codec_takes_over() {
        let codecs = codecs(CodecsOptions::default());
        let params = PeerParams::default();
        codecs
            .set_codec_user_config(&user_for(CodecIndex::SourceSbc), &params, &peer_sbc())
            .unwrap();

        let user = user_for(CodecIndex::SourceAac).with_priority(CodecPriority::HIGHEST);
        let result = codecs
            .set_codec_user_config(&user, &params, &AAC.source_capability)
            .unwrap();
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SourceAac));
        assert!(result.restart_input);
        assert!(result.restart_output);
        assert!(result.config_updated);
        assert_eq!(codecs.ordered_source_codecs()[0], CodecIndex::SourceAac);
        assert_eq!(
            codecs.with_codec(CodecIndex::SourceSbc, A2dpCodec::priority),
            Some(CodecIndex::SourceSbc.default_priority())
        );
    }

    #[test]
    fn test_sink_priority_change_reorders_sinks() {
        let codecs = codecs(CodecsOptions::default());
        let user = user_for(CodecIndex::SinkSbc).with_priority(CodecPriority(900_000));
        codecs
            .set_codec_user_config(&user, &PeerParams::default(), &peer_sbc())
            .unwrap();
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SinkSbc));
        let sink = codecs.ordered_sink_codecs();
        assert_eq!(sink.first(), Some(&CodecIndex::SinkSbc));
        assert_eq!(sink.last(), Some(&CodecIndex::SinkAac));
        assert_eq!(codecs.ordered_source_codecs()[8], CodecIndex::SourceSbc);
    }

    #[test]
    fn test_lower_priority_codec_does_not_switch() {
        let codecs = codecs(CodecsOptions::default());
        let params = PeerParams::default();
        codecs
            .set_codec_user_config(&user_for(CodecIndex::SourceSbc), &params, &peer_sbc())
            .unwrap();

        let user = user_for(CodecIndex::SourceAac).with_priority(CodecPriority(5));
        let result = codecs
            .set_codec_user_config(&user, &params, &AAC.source_capability)
            .unwrap();
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SourceSbc));
        assert!(!result.restart_input);
        assert!(!result.restart_output);
        assert!(result.config_updated);
        assert_eq!(codecs.ordered_source_codecs().last(), Some(&CodecIndex::SourceAac));
    }

    #[test]
    fn test_current_priority_drop_restarts_output() {
        let codecs = codecs(CodecsOptions::default());
        let params = PeerParams::default();
        let user = user_for(CodecIndex::SourceSbc).with_priority(CodecPriority::HIGHEST);
        codecs.set_codec_user_config(&user, &params, &peer_sbc()).unwrap();

        let lower = user.with_priority(CodecPriority(10));
        let result = codecs.set_codec_user_config(&lower, &params, &peer_sbc()).unwrap();
        assert!(!result.restart_input);
        assert!(result.restart_output);
        assert!(result.config_updated);
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SourceSbc));
    }

    #[test]
    fn test_audio_config_never_restarts_input() {
        let codecs = codecs(CodecsOptions::default());
        let params = PeerParams::default();
        assert_eq!(
            codecs.set_codec_audio_config(&CodecConfig::EMPTY, &params, &peer_sbc()),
            Err(CodecError::NoCurrentCodec)
        );
        codecs
            .set_codec_user_config(&user_for(CodecIndex::SourceSbc), &params, &peer_sbc())
            .unwrap();
        let audio = CodecConfig::EMPTY.with_sample_rate(SampleRate::RATE_48000);
        let result = codecs.set_codec_audio_config(&audio, &params, &peer_sbc()).unwrap();
        assert!(!result.restart_input);
        assert!(result.restart_output);
        assert!(result.config_updated);
        assert_eq!(
            codecs.current_codec_config().map(|c| c.sample_rate),
            Some(SampleRate::RATE_48000)
        );
    }

    #[test]
    fn test_ota_config_accepted_without_user_config() {
        let codecs = codecs(CodecsOptions::default());
        let result = codecs
            .set_codec_ota_config(&sbc_config(), &PeerParams::default())
            .unwrap();
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SourceSbc));
        assert!(result.restart_output);
        assert!(result.config_updated);
        assert_eq!(
            codecs.with_codec(CodecIndex::SourceSbc, A2dpCodec::ota_peer_config),
            Some(sbc_config())
        );
    }

    #[test]
    fn test_user_config_wins_over_ota_config() {
        let codecs = codecs(CodecsOptions::default());
        let params = PeerParams::default();
        let user = user_for(CodecIndex::SourceAac).with_priority(CodecPriority::HIGHEST);
        codecs
            .set_codec_user_config(&user, &params, &AAC.source_capability)
            .unwrap();

        assert_eq!(
            codecs.set_codec_ota_config(&sbc_config(), &params),
            Err(CodecError::UserConfigPrecedence)
        );
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SourceAac));
    }

    #[test]
    fn test_invalid_ota_config_keeps_current() {
        let codecs = codecs(CodecsOptions::default());
        let params = PeerParams::default();
        codecs.set_codec_ota_config(&sbc_config(), &params).unwrap();
        assert_eq!(
            codecs.set_codec_ota_config(&CodecInfo::EMPTY, &params),
            Err(CodecError::InvalidCodecInfo)
        );
        let two_rates = capability(sbc::FREQ_44100 | sbc::FREQ_48000 | sbc::CH_MONO, 0x15, 2, 53);
        assert_eq!(
            codecs.set_codec_ota_config(&two_rates, &params),
            Err(CodecError::InvalidCodecInfo)
        );
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SourceSbc));
    }

    #[test]
    fn test_peer_capabilities() {
        let codecs = codecs(CodecsOptions::default());
        assert_eq!(
            codecs.set_peer_sink_codec_capabilities(&CodecInfo::EMPTY),
            Err(CodecError::InvalidCodecInfo)
        );
        codecs.set_peer_sink_codec_capabilities(&peer_sbc()).unwrap();
        codecs.set_peer_source_codec_capabilities(&peer_sbc()).unwrap();
        assert_eq!(
            codecs.with_codec(CodecIndex::SinkSbc, A2dpCodec::ota_peer_capability),
            Some(peer_sbc())
        );

        let snapshot = codecs.get_codec_config_and_capabilities();
        assert!(snapshot.config.is_empty());
        assert_eq!(snapshot.local_capabilities.len(), 9);
        assert_eq!(snapshot.selectable_capabilities.len(), 1);
        let selectable = snapshot.selectable_capabilities[0];
        assert_eq!(selectable.codec_type, Some(CodecIndex::SourceSbc));
        assert_eq!(selectable.channel_mode, ChannelMode::MONO.union(ChannelMode::STEREO));
    }

    #[test]
    fn test_direct_codec_config() {
        let codecs = codecs(CodecsOptions::default());
        let info = codecs.set_codec_config(&peer_sbc(), true, false).unwrap();
        assert_eq!(codecs.current_codec(), None);
        assert_eq!(
            codecs.codec_config(CodecIndex::SourceSbc).map(|c| c.sample_rate),
            Some(SampleRate::RATE_44100)
        );
        assert_eq!(info.len(), 6);

        codecs.set_sink_codec_config(&sbc_config(), false, true).unwrap();
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SinkSbc));
    }

    #[test]
    fn test_offload_follows_capability_list() {
        let codecs = codecs(CodecsOptions::default().with_offload(true, "sbc-ldac"));
        assert!(codecs.is_offload_supported(CodecIndex::SourceSbc));
        assert!(!codecs.is_offload_supported(CodecIndex::SourceAac));
        assert_eq!(codecs.offload_codec_config(), Err(CodecError::NoCurrentCodec));

        let params = PeerParams::default();
        let result = codecs
            .set_codec_user_config(&user_for(CodecIndex::SourceSbc), &params, &peer_sbc())
            .unwrap();
        let descriptor = codecs.offload_codec_config().unwrap();
        assert_eq!(descriptor.byte(0), result.codec_info.byte(4));
        assert_eq!(descriptor.byte(3), result.codec_info.byte(3));

        let aac = user_for(CodecIndex::SourceAac).with_priority(CodecPriority::HIGHEST);
        codecs
            .set_codec_user_config(&aac, &params, &AAC.source_capability)
            .unwrap();
        assert_eq!(codecs.offload_codec_config(), Err(CodecError::UnsupportedCodec));
    }

    #[test]
    fn test_dump() {
        let codecs = codecs(CodecsOptions::default());
        let mut out = String::new();
        codecs.dump(&mut out).unwrap();
        assert!(out.starts_with("\nA2DP Codecs State:\n  Current Codec: None\n"));
        assert!(out.contains("\nA2DP LHDC V5 State:\n"));

        codecs.set_codec_ota_config(&sbc_config(), &PeerParams::default()).unwrap();
        out.clear();
        codecs.dump(&mut out).unwrap();
        assert!(out.contains("  Current Codec: SBC\n"));
        assert!(!out.contains("(Sink)"));
    }

    #[test]
    fn test_lhdc_extended_api() {
        let codecs = codecs(CodecsOptions::default());
        let mut session = LhdcEncoderSession::default();
        let mut buf = [0u8; 41];
        buf[..4].copy_from_slice(&EXT_FUNC_VER_GET_SPECIFIC_V1.to_be_bytes());
        buf[4..8].copy_from_slice(&EXT_FUNC_GET_SPECIFIC.to_be_bytes());
        buf[8] = SpecificTarget::UserConfig as u8;

        assert_eq!(
            codecs.lhdc_get_user_config(CodecIndex::SourceLhdcV2, &session, &mut buf),
            Err(CodecError::UnsupportedCodec)
        );
        assert_eq!(
            codecs.lhdc_get_user_config(CodecIndex::SourceLhdcV3, &session, &mut buf),
            Err(CodecError::NoCurrentCodec)
        );

        let user = user_for(CodecIndex::SourceSbc).with_codec_specific([0, 0, 7, 0]);
        codecs
            .set_codec_user_config(&user, &PeerParams::default(), &peer_sbc())
            .unwrap();
        codecs
            .lhdc_get_user_config(CodecIndex::SourceLhdcV3, &session, &mut buf)
            .unwrap();
        assert_eq!(buf[25..33], 7i64.to_be_bytes());

        codecs
            .lhdc_set_user_config(CodecIndex::SourceLhdcV5, &mut session, &[0x0C, 1, 2])
            .unwrap();
        let mut lib = [0u8; 8];
        lib[4] = EXT_TYPE_LIB;
        codecs
            .lhdc_get_user_config(CodecIndex::SourceLhdcV5, &session, &mut lib)
            .unwrap();
        assert_eq!(lib[..3], [0x0C, 1, 2]);

        codecs
            .lhdc_set_user_data(CodecIndex::SourceLhdcV3, &mut session, &[5])
            .unwrap();
        assert_eq!(session.user_data(), &[5]);
        let mut version = [0u8; 4];
        codecs
            .lhdc_get_api_version(CodecIndex::SourceLhdcV3, &session, &mut version)
            .unwrap();
        assert_eq!(u32::from_be_bytes(version), session.api_version());
        assert_eq!(
            codecs.lhdc_set_user_data(CodecIndex::SourceLdac, &mut session, &[5]),
            Err(CodecError::UnsupportedCodec)
        );
    }

    #[test]
    fn test_shared_between_threads() {
        let codecs: A2dpCodecs = A2dpCodecs::new(CodecsOptions::default());
        codecs.init().unwrap();
        let params = PeerParams::default();
        codecs
            .set_codec_user_config(&user_for(CodecIndex::SourceSbc), &params, &peer_sbc())
            .unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..50 {
                    let audio = CodecConfig::EMPTY.with_sample_rate(SampleRate::RATE_48000);
                    codecs.set_codec_audio_config(&audio, &params, &peer_sbc()).unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..50 {
                    let config = codecs.current_codec_config().unwrap();
                    assert!(config.is_valid());
                }
            });
        });
        assert_eq!(codecs.current_codec(), Some(CodecIndex::SourceSbc));
    }
}
