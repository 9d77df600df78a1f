//! The synthesis pipeline: engine fallback dispatch, per-segment generation,
//! stitching, and batch processing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use tempfile::TempDir;

use crate::audio::combine;
use crate::audio::format::{AudioArtifact, AudioFormat};
use crate::audio::transcode;
use crate::audio::validate::{self, ValidationThresholds};
use crate::engines::{attempt_order, Backend, SynthesisRequest};
use crate::error::TtsError;
use crate::profile::{ProfileRegistry, VoiceProfile};
use crate::text;
use crate::{ConversationSegment, Episode};

/// Configuration for a [`TtsGenerator`].
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct GeneratorConfig {
    /// Directory where finished artifacts (and their scripts) are written.
    pub output_dir: PathBuf,
    /// Request-level speed multiplier applied on top of every profile's base
    /// speed.
    #[builder(default = "1.0")]
    pub voice_speed: f32,
    /// Primary voice profile for whole-script generation.
    #[builder(default = "String::from(\"default\")")]
    pub voice_profile: String,
    /// Silence inserted between adjacent conversation segments.
    #[builder(default = "0.5")]
    pub pause_secs: f64,
    #[builder(default)]
    pub thresholds: ValidationThresholds,
}

/// Multi-engine text-to-speech generator.
///
/// Holds only immutable configuration and the read-only profile registry;
/// every synthesis request carries its own profile, so nothing here changes
/// between or during calls.
pub struct TtsGenerator {
    config: GeneratorConfig,
    registry: ProfileRegistry,
}

impl TtsGenerator {
    /// Create a generator with the built-in voice profiles.
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_registry(config, ProfileRegistry::default())
    }

    /// Create a generator with a custom profile registry.
    pub fn with_registry(config: GeneratorConfig, registry: ProfileRegistry) -> Self {
        Self { config, registry }
    }

    /// All available voice profiles, ordered by name.
    pub fn list_voice_profiles(&self) -> &BTreeMap<String, VoiceProfile> {
        self.registry.list_all()
    }

    /// Synthesize a whole script with the primary voice profile.
    ///
    /// The script text is saved next to the audio, cleaned of non-speech
    /// markup, and handed to the fallback dispatcher. Returns the path of the
    /// finished artifact.
    pub fn generate_for_script(&self, title: &str, script: &str) -> Result<PathBuf, TtsError> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let stem = text::sanitize_filename(title);
        let dest = self.config.output_dir.join(format!("{stem}.mp3"));
        std::fs::write(self.config.output_dir.join(format!("{stem}.txt")), script)?;

        let cleaned = text::clean_audio_cues(script);
        log::info!(
            "cleaned script: {} -> {} characters",
            script.len(),
            cleaned.len()
        );

        let scratch = TempDir::new_in(&self.config.output_dir)?;
        let profile = self.registry.lookup(&self.config.voice_profile);
        self.synthesize_with_fallback(&cleaned, profile, &dest, scratch.path())?;

        log::info!("audio generated: {}", dest.display());
        Ok(dest)
    }

    /// Synthesize an ordered list of speaker-tagged segments and stitch them
    /// into one artifact, with a short pause between adjacent segments.
    ///
    /// Individual segment failures are isolated: a segment whose every engine
    /// fails is skipped with a warning, and generation fails only when no
    /// segment at all produced usable audio. All per-segment intermediates
    /// live in a scratch directory that is removed on every exit path.
    pub fn generate_for_segments(
        &self,
        title: &str,
        segments: &[ConversationSegment],
    ) -> Result<PathBuf, TtsError> {
        if segments.is_empty() {
            return Err(TtsError::CombineFailed(
                "no conversation segments provided".to_string(),
            ));
        }

        std::fs::create_dir_all(&self.config.output_dir)?;
        let stem = text::sanitize_filename(title);
        let dest = self.config.output_dir.join(format!("{stem}.mp3"));
        let scratch = TempDir::new_in(&self.config.output_dir)?;

        log::info!("generating conversation audio with {} segments", segments.len());

        let mut generated: Vec<PathBuf> = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            if segment.text.trim().is_empty() {
                log::debug!("segment {} is empty, skipping", i + 1);
                continue;
            }

            let cleaned = text::clean_audio_cues(&segment.text);
            let profile = self.registry.profile_for_speaker(&segment.speaker);
            log::info!(
                "segment {}/{}: speaker '{}' -> voice '{}' ({})",
                i + 1,
                segments.len(),
                segment.speaker,
                profile.name,
                profile.backend
            );

            let seg_dest = scratch
                .path()
                .join(format!("segment_{i:03}_{}.mp3", text::sanitize_filename(&segment.speaker)));
            match self.synthesize_with_fallback(&cleaned, profile, &seg_dest, scratch.path()) {
                Ok(_) => generated.push(seg_dest),
                Err(e) => {
                    log::warn!("skipping segment {} ('{}'): {e}", i + 1, segment.speaker);
                }
            }
        }

        if generated.is_empty() {
            return Err(TtsError::CombineFailed(
                "no segment produced usable audio".to_string(),
            ));
        }

        let pause = self.make_pause(scratch.path());
        let mut playlist: Vec<PathBuf> = Vec::with_capacity(generated.len() * 2);
        for (idx, path) in generated.iter().enumerate() {
            playlist.push(path.clone());
            if idx + 1 < generated.len() {
                if let Some(pause_path) = &pause {
                    playlist.push(pause_path.clone());
                }
            }
        }

        log::info!("combining {} audio parts", playlist.len());
        combine::combine(&playlist, &dest)?;

        if !validate::is_valid(&dest, None, &self.config.thresholds) {
            log::warn!("final conversation audio failed validation checks");
        }

        log::info!("conversation audio generated: {}", dest.display());
        Ok(dest)
    }

    /// Generate audio for a batch of episodes, isolating failures per
    /// episode, and write a JSON summary of the results.
    pub fn generate_batch(&self, episodes: Vec<Episode>) -> Vec<Episode> {
        let primary = self.registry.lookup(&self.config.voice_profile);
        log::info!("using voice profile: {} ({})", primary.name, primary.backend);

        let mut results = Vec::with_capacity(episodes.len());
        for mut episode in episodes {
            log::info!("generating audio for: {}", episode.title);
            let outcome = if episode.segments.is_empty() {
                self.generate_for_script(&episode.title, &episode.script)
            } else {
                self.generate_for_segments(&episode.title, &episode.segments)
            };
            match outcome {
                Ok(path) => episode.audio_path = Some(path),
                Err(e) => log::warn!("skipping audio generation for '{}': {e}", episode.title),
            }
            results.push(episode);
        }

        if let Err(e) = self.write_summary(&results) {
            log::warn!("could not write batch summary: {e}");
        }
        results
    }

    fn write_summary(&self, episodes: &[Episode]) -> Result<(), TtsError> {
        let json = serde_json::to_string_pretty(episodes)
            .map_err(|e| TtsError::Io(std::io::Error::other(e)))?;
        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join("summary.json");
        std::fs::write(&path, json)?;
        log::info!("summary saved: {}", path.display());
        Ok(())
    }

    /// Try every backend in priority order until one produces audio that
    /// passes validation against the cleaned text.
    fn synthesize_with_fallback(
        &self,
        cleaned: &str,
        profile: &VoiceProfile,
        dest: &Path,
        scratch: &Path,
    ) -> Result<AudioArtifact, TtsError> {
        let order = attempt_order(profile.backend);
        run_attempts(&order, |backend| {
            log::info!("trying {backend} engine");
            let native = scratch.join(format!(
                "take_{}.{}",
                backend.as_str(),
                backend.native_format().extension()
            ));

            let request = SynthesisRequest {
                text: cleaned,
                profile,
                output_path: &native,
                speed_multiplier: self.config.voice_speed,
            };
            let raw = backend.adapter().synthesize(&request)?;

            let normalized =
                transcode::normalize(&raw, dest, AudioFormat::Mp3, &self.config.thresholds)?;
            if raw.path != normalized.path {
                let _ = std::fs::remove_file(&raw.path);
            }

            if !validate::is_valid(dest, Some(cleaned), &self.config.thresholds) {
                let _ = std::fs::remove_file(dest);
                return Err(TtsError::ValidationFailed {
                    reason: format!("{backend} output failed duration/size checks"),
                });
            }

            log::info!("audio generated successfully with {backend}");
            Ok(normalized)
        })
    }

    /// Build the reusable inter-segment pause artifact, or `None` when pauses
    /// are disabled or cannot be produced (not worth failing the episode).
    fn make_pause(&self, scratch: &Path) -> Option<PathBuf> {
        if self.config.pause_secs <= 0.0 {
            return None;
        }
        let wav = scratch.join("pause.wav");
        let mp3 = scratch.join("pause.mp3");
        let result = combine::write_silence(&wav, self.config.pause_secs).and_then(|artifact| {
            transcode::normalize(&artifact, &mp3, AudioFormat::Mp3, &self.config.thresholds)
        });
        match result {
            Ok(artifact) => Some(artifact.path),
            Err(e) => {
                log::warn!("could not generate inter-segment pause: {e}");
                None
            }
        }
    }
}

/// First-success-wins runner over an ordered backend list. Every failure is
/// recorded; exhaustion surfaces the last error inside `AllEnginesFailed`.
fn run_attempts<T>(
    order: &[Backend],
    mut attempt: impl FnMut(Backend) -> Result<T, TtsError>,
) -> Result<T, TtsError> {
    let mut last = TtsError::ValidationFailed {
        reason: "no synthesis attempts were made".to_string(),
    };
    for &backend in order {
        match attempt(backend) {
            Ok(value) => return Ok(value),
            Err(e) => {
                log::warn!("{backend} failed, trying next engine: {e}");
                last = e;
            }
        }
    }
    Err(TtsError::AllEnginesFailed { last: Box::new(last) })
}

#[cfg(test)]
mod tests {
    use super::{run_attempts, GeneratorConfigBuilder, TtsGenerator};
    use crate::engines::Backend;
    use crate::error::TtsError;
    use crate::profile::ProfileRegistry;
    use crate::ConversationSegment;
    use std::cell::RefCell;

    #[test]
    fn builder_fills_sensible_defaults() {
        let config = GeneratorConfigBuilder::default()
            .output_dir("out")
            .build()
            .unwrap();
        assert_eq!(config.voice_speed, 1.0);
        assert_eq!(config.voice_profile, "default");
        assert_eq!(config.pause_secs, 0.5);
    }

    #[test]
    fn unavailable_primary_falls_through_to_next_backend() {
        let attempts = RefCell::new(Vec::new());
        let order = [Backend::Piper, Backend::Espeak, Backend::Gtts];

        let result = run_attempts(&order, |backend| {
            attempts.borrow_mut().push(backend);
            if backend == Backend::Piper {
                Err(TtsError::BackendUnavailable {
                    backend,
                    detail: "missing".to_string(),
                })
            } else {
                Ok(backend)
            }
        });

        assert_eq!(result.unwrap(), Backend::Espeak);
        // The failed backend is not retried, and later backends are not
        // touched after the first success.
        assert_eq!(attempts.into_inner(), vec![Backend::Piper, Backend::Espeak]);
    }

    #[test]
    fn exhausted_attempts_surface_the_last_error() {
        let order = [Backend::Flite, Backend::Espeak];
        let result: Result<(), _> = run_attempts(&order, |backend| {
            Err(TtsError::BackendTimeout { backend, seconds: 1 })
        });

        match result.unwrap_err() {
            TtsError::AllEnginesFailed { last } => match *last {
                TtsError::BackendTimeout { backend, .. } => assert_eq!(backend, Backend::Espeak),
                other => panic!("expected the last backend's error, got {other:?}"),
            },
            other => panic!("expected AllEnginesFailed, got {other:?}"),
        }
    }

    #[test]
    fn empty_segment_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let generator = TtsGenerator::new(
            GeneratorConfigBuilder::default()
                .output_dir(dir.path())
                .build()
                .unwrap(),
        );
        let err = generator.generate_for_segments("episode", &[]).unwrap_err();
        assert!(matches!(err, TtsError::CombineFailed(_)));
    }

    #[test]
    fn list_voice_profiles_exposes_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let generator = TtsGenerator::new(
            GeneratorConfigBuilder::default()
                .output_dir(dir.path())
                .build()
                .unwrap(),
        );
        assert!(generator.list_voice_profiles().contains_key("default"));
    }

    #[test]
    fn two_speaker_conversation_yields_one_artifact_and_no_leftovers() {
        // End-to-end path needs at least one real engine; eSpeak is the one
        // most likely to exist in CI. Skip quietly otherwise.
        if crate::engines::exec::find_binary("espeak-ng").is_none()
            && crate::engines::exec::find_binary("espeak").is_none()
        {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let overrides = r#"{
            "speakers": { "alex": "espeak_female", "sam": "espeak_male" }
        }"#;
        let registry = ProfileRegistry::from_json_reader(overrides.as_bytes()).unwrap();
        let generator = TtsGenerator::with_registry(
            GeneratorConfigBuilder::default()
                .output_dir(dir.path())
                .voice_profile("espeak_male")
                .build()
                .unwrap(),
            registry,
        );

        let segments = vec![
            ConversationSegment::new("alex", "Hi there."),
            ConversationSegment::new("sam", "Hello Alex."),
        ];
        let path = generator.generate_for_segments("Greeting Episode", &segments).unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        // Exactly one artifact remains; every per-segment intermediate was
        // scoped to the scratch directory and deleted with it.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p != &path)
            .collect();
        assert!(leftovers.is_empty(), "unexpected leftovers: {leftovers:?}");
    }
}
