//! Speech synthesis backends.
//!
//! One adapter per engine, all behind the same contract: take cleaned text
//! and a voice profile, spawn exactly one external process (per chunk), and
//! leave a native-container artifact on disk, or fail with a typed error the
//! dispatcher can recover from. Container conversion is not an adapter
//! concern; the normalizer handles it afterwards so every adapter stays
//! simple and uniform.

pub mod espeak;
pub mod exec;
pub mod flite;
pub mod gtts;
pub mod piper;
pub mod say;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::format::{AudioArtifact, AudioFormat};
use crate::error::TtsError;
use crate::profile::VoiceProfile;

/// The fixed set of synthesis backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Flite, the cross-platform offline engine.
    Flite,
    /// eSpeak NG, the lightweight offline engine.
    Espeak,
    /// Piper, the neural offline engine (needs a downloaded voice model).
    Piper,
    /// The macOS `say` command, platform-native.
    Say,
    /// Google Translate TTS via `gtts-cli` (needs network access).
    Gtts,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Flite => "flite",
            Backend::Espeak => "espeak",
            Backend::Piper => "piper",
            Backend::Say => "say",
            Backend::Gtts => "gtts",
        }
    }

    /// Container the engine writes natively. The normalizer converts from
    /// here to whatever the caller asked for.
    pub fn native_format(&self) -> AudioFormat {
        match self {
            Backend::Flite | Backend::Espeak | Backend::Piper => AudioFormat::Wav,
            Backend::Say => AudioFormat::Aiff,
            Backend::Gtts => AudioFormat::Mp3,
        }
    }

    /// The adapter implementing this backend's invocation contract.
    pub fn adapter(&self) -> &'static dyn BackendAdapter {
        match self {
            Backend::Flite => &flite::FliteAdapter,
            Backend::Espeak => &espeak::EspeakAdapter,
            Backend::Piper => &piper::PiperAdapter,
            Backend::Say => &say::SayAdapter,
            Backend::Gtts => &gtts::GttsAdapter,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One self-contained unit of synthesis work.
///
/// The profile travels with the request; adapters never read it from shared
/// state, so a request is safe to build and dispatch from any context.
#[derive(Debug)]
pub struct SynthesisRequest<'a> {
    /// Cleaned text, free of cues, markup, and speaker labels.
    pub text: &'a str,
    pub profile: &'a VoiceProfile,
    /// Where the adapter writes its native-container output.
    pub output_path: &'a Path,
    /// Request-level speed multiplier, combined with the profile's base speed.
    pub speed_multiplier: f32,
}

impl SynthesisRequest<'_> {
    /// Profile speed × request multiplier, clamped to a sane band before each
    /// adapter maps it onto engine-specific units.
    pub fn effective_speed(&self) -> f32 {
        (self.profile.speed * self.speed_multiplier).clamp(0.25, 4.0)
    }
}

/// Common contract for all backend adapters.
pub trait BackendAdapter: Sync {
    fn backend(&self) -> Backend;

    /// Synthesize `request.text` into `request.output_path`.
    ///
    /// Exactly one attempt; the dispatcher owns retry/fallback policy.
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<AudioArtifact, TtsError>;
}

/// Platform-aware fallback priority, most-compatible-first. On macOS the
/// always-present native engine leads the list.
pub fn fallback_order() -> &'static [Backend] {
    if cfg!(target_os = "macos") {
        &[Backend::Say, Backend::Flite, Backend::Piper, Backend::Espeak, Backend::Gtts]
    } else {
        &[Backend::Flite, Backend::Piper, Backend::Say, Backend::Espeak, Backend::Gtts]
    }
}

/// Ordered, de-duplicated attempt list: the primary profile's backend first,
/// then the remaining fallbacks in priority order.
pub fn attempt_order(primary: Backend) -> Vec<Backend> {
    std::iter::once(primary)
        .chain(fallback_order().iter().copied().filter(|b| *b != primary))
        .collect()
}

/// Shared epilogue for adapters: the engine claimed success, so the artifact
/// must exist and be non-empty before the detected container is trusted.
pub(crate) fn finish_artifact(backend: Backend, path: &Path) -> Result<AudioArtifact, TtsError> {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(TtsError::EmptyOutput {
            backend,
            path: path.to_path_buf(),
        });
    }
    log::debug!("{backend} wrote {size} bytes to {}", path.display());
    AudioArtifact::detect(path)
}

#[cfg(test)]
mod tests {
    use super::{attempt_order, fallback_order, Backend};
    use crate::audio::format::AudioFormat;

    #[test]
    fn attempt_order_puts_primary_first_without_duplicates() {
        let order = attempt_order(Backend::Gtts);
        assert_eq!(order[0], Backend::Gtts);
        assert_eq!(order.len(), 5);
        let mut seen = std::collections::HashSet::new();
        assert!(order.iter().all(|b| seen.insert(*b)));
    }

    #[test]
    fn attempt_order_keeps_fallback_priority_for_the_rest() {
        let order = attempt_order(Backend::Espeak);
        let expected_tail: Vec<Backend> = fallback_order()
            .iter()
            .copied()
            .filter(|b| *b != Backend::Espeak)
            .collect();
        assert_eq!(&order[1..], expected_tail.as_slice());
    }

    #[test]
    fn primary_already_in_fallback_list_is_not_reattempted() {
        let primary = fallback_order()[0];
        let order = attempt_order(primary);
        assert_eq!(order.iter().filter(|b| **b == primary).count(), 1);
    }

    #[test]
    fn native_formats_match_engine_behavior() {
        assert_eq!(Backend::Say.native_format(), AudioFormat::Aiff);
        assert_eq!(Backend::Gtts.native_format(), AudioFormat::Mp3);
        assert_eq!(Backend::Espeak.native_format(), AudioFormat::Wav);
    }

    #[test]
    fn backend_serde_uses_snake_case_names() {
        let json = serde_json::to_string(&Backend::Say).unwrap();
        assert_eq!(json, "\"say\"");
        let back: Backend = serde_json::from_str("\"espeak\"").unwrap();
        assert_eq!(back, Backend::Espeak);
    }
}
