//! Collection options
//!
//! Everything the collection reads from the platform, gathered once and
//! handed to [`A2dpCodecs::new`](super::A2dpCodecs::new). Nothing here is
//! consulted after `init()`.

use heapless::Vec;

use crate::constants::MAX_OFFLOAD_TOKENS;
use crate::index::{CodecIndex, CodecPriority};

/// Separator of the offload capability string
pub const OFFLOAD_CAPABILITY_SEPARATOR: char = '-';

/// Configuration consumed by `init()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecsOptions {
    /// Per index priority overrides, `None` keeps the default
    pub priorities: [Option<CodecPriority>; CodecIndex::MAX as usize],
    /// Opus encoder and decoder may be used
    pub opus_enabled: bool,
    /// Controller can offload encoding
    pub offload_supported: bool,
    /// Offload switched off by the platform
    pub offload_disabled: bool,
    /// `-` separated list of offloadable codecs, e.g. `sbc-aac-ldac`
    pub offload_capability: &'static str,
}

impl Default for CodecsOptions {
    fn default() -> Self {
        Self {
            priorities: [None; CodecIndex::MAX as usize],
            opus_enabled: true,
            offload_supported: false,
            offload_disabled: false,
            offload_capability: "",
        }
    }
}

impl CodecsOptions {
    /// Override the priority of one codec
    #[must_use]
    pub const fn with_priority(mut self, index: CodecIndex, priority: CodecPriority) -> Self {
        self.priorities[index as usize] = Some(priority);
        self
    }

    /// Enable or disable Opus
    #[must_use]
    pub const fn with_opus_enabled(mut self, enabled: bool) -> Self {
        self.opus_enabled = enabled;
        self
    }

    /// Declare offload support and the offloadable codecs
    #[must_use]
    pub const fn with_offload(mut self, supported: bool, capability: &'static str) -> Self {
        self.offload_supported = supported;
        self.offload_capability = capability;
        self
    }

    /// Switch offload off regardless of controller support
    #[must_use]
    pub const fn with_offload_disabled(mut self, disabled: bool) -> Self {
        self.offload_disabled = disabled;
        self
    }

    /// Priority requested for `index`
    ///
    /// A disabled Opus reports [`CodecPriority::DISABLED`] whatever was
    /// configured.
    #[must_use]
    pub const fn priority_for(&self, index: CodecIndex) -> CodecPriority {
        if !self.opus_enabled && matches!(index, CodecIndex::SourceOpus | CodecIndex::SinkOpus) {
            return CodecPriority::DISABLED;
        }
        match self.priorities[index as usize] {
            Some(priority) => priority,
            None => CodecPriority::DEFAULT,
        }
    }

    /// Offload is supported and not switched off
    #[must_use]
    pub const fn offload_enabled(&self) -> bool {
        self.offload_supported && !self.offload_disabled
    }

    /// Source codecs whose encoding may be offloaded
    ///
    /// Empty unless [`CodecsOptions::offload_enabled`]. LHDC tokens are
    /// recognised but never enable offload.
    #[must_use]
    pub fn offload_codecs(&self) -> Vec<CodecIndex, MAX_OFFLOAD_TOKENS> {
        let mut codecs = Vec::new();
        if !self.offload_enabled() {
            return codecs;
        }
        for token in self
            .offload_capability
            .split(OFFLOAD_CAPABILITY_SEPARATOR)
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let index = match token {
                "sbc" => CodecIndex::SourceSbc,
                "aac" => CodecIndex::SourceAac,
                "aptx" => CodecIndex::SourceAptx,
                "aptxhd" => CodecIndex::SourceAptxHd,
                "ldac" => CodecIndex::SourceLdac,
                "lhdcv2" | "lhdcv3" | "lhdcv5" => {
                    debug!("[OPTIONS] offload of {} not supported", token);
                    continue;
                }
                _ => {
                    warn!("[OPTIONS] unknown offload token {}", token);
                    continue;
                }
            };
            if !codecs.contains(&index) && codecs.push(index).is_err() {
                warn!("[OPTIONS] too many offload tokens");
                break;
            }
        }
        codecs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CodecsOptions::default();
        assert!(options.opus_enabled);
        assert!(!options.offload_enabled());
        assert!(options.offload_codecs().is_empty());
        for index in CodecIndex::ALL {
            assert_eq!(options.priority_for(index), CodecPriority::DEFAULT);
        }
    }

    #[test]
    fn test_priority_override_and_opus_gate() {
        let options = CodecsOptions::default()
            .with_priority(CodecIndex::SourceAac, CodecPriority(5))
            .with_priority(CodecIndex::SourceOpus, CodecPriority::HIGHEST)
            .with_opus_enabled(false);
        assert_eq!(options.priority_for(CodecIndex::SourceAac), CodecPriority(5));
        assert_eq!(
            options.priority_for(CodecIndex::SourceOpus),
            CodecPriority::DISABLED
        );
        assert_eq!(
            options.priority_for(CodecIndex::SinkOpus),
            CodecPriority::DISABLED
        );
    }

    #[test]
    fn test_offload_tokens() {
        let options = CodecsOptions::default().with_offload(true, "sbc-aac-ldac-lhdcv3-bogus-sbc");
        assert_eq!(
            options.offload_codecs().as_slice(),
            &[CodecIndex::SourceSbc, CodecIndex::SourceAac, CodecIndex::SourceLdac]
        );
    }

    #[test]
    fn test_offload_disabled_wins() {
        let options = CodecsOptions::default()
            .with_offload(true, "sbc-aptx-aptxhd")
            .with_offload_disabled(true);
        assert!(!options.offload_enabled());
        assert!(options.offload_codecs().is_empty());

        let unsupported = CodecsOptions::default().with_offload(false, "sbc");
        assert!(unsupported.offload_codecs().is_empty());
    }
}
