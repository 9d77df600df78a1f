//! Piper adapter: the neural offline engine.
//!
//! Piper needs a downloaded voice model on top of its binary. A host with the
//! binary but no model is treated the same as a host with neither: the
//! backend is unavailable and the dispatcher moves on.
//!
//! Env overrides: `PIPER_BIN`, `PIPER_VOICE` (explicit model path),
//! `PIPER_VOICE_DIR` (directory of `.onnx` models looked up by voice name).

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use crate::audio::format::AudioArtifact;
use crate::engines::{exec, finish_artifact, Backend, BackendAdapter, SynthesisRequest};
use crate::error::TtsError;

const TIMEOUT: Duration = Duration::from_secs(180);
const DEFAULT_VOICE: &str = "en_US-amy-medium";

pub struct PiperAdapter;

impl BackendAdapter for PiperAdapter {
    fn backend(&self) -> Backend {
        Backend::Piper
    }

    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<AudioArtifact, TtsError> {
        let voice = request.profile.voice.as_deref().unwrap_or(DEFAULT_VOICE);
        let model = resolve_voice_model(voice).ok_or_else(|| TtsError::BackendUnavailable {
            backend: Backend::Piper,
            detail: format!(
                "no voice model for '{voice}'; set PIPER_VOICE or PIPER_VOICE_DIR"
            ),
        })?;

        let program = std::env::var("PIPER_BIN").unwrap_or_else(|_| "piper".to_string());
        // Piper expresses speed as length_scale, the inverse of rate.
        let length_scale = (1.0 / request.effective_speed()).clamp(0.5, 2.0);

        log::debug!("piper: model={}, length_scale={length_scale:.2}", model.display());

        let mut cmd = Command::new(program);
        cmd.arg("--model")
            .arg(&model)
            .arg("--output_file")
            .arg(request.output_path)
            .arg("--length_scale")
            .arg(format!("{length_scale:.2}"));

        let config = PathBuf::from(format!("{}.json", model.to_string_lossy()));
        if config.exists() {
            cmd.arg("--config").arg(config);
        }

        exec::run_backend(Backend::Piper, cmd, Some(request.text), TIMEOUT)?;
        finish_artifact(Backend::Piper, request.output_path)
    }
}

/// Find the `.onnx` model for a voice name.
fn resolve_voice_model(voice: &str) -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("PIPER_VOICE") {
        let p = PathBuf::from(explicit);
        if p.exists() {
            return Some(p);
        }
    }

    let as_path = PathBuf::from(voice);
    if as_path.exists() {
        return Some(as_path);
    }

    if let Ok(dir) = std::env::var("PIPER_VOICE_DIR") {
        let dir = PathBuf::from(dir);
        let bare = dir.join(voice);
        if bare.exists() {
            return Some(bare);
        }
        let with_ext = dir.join(format!("{voice}.onnx"));
        if with_ext.exists() {
            return Some(with_ext);
        }
    }

    None
}
