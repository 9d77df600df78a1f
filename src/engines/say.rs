//! macOS `say` adapter: the platform-native engine.
//!
//! `say` writes AIFF regardless of what the output path's extension claims,
//! which is exactly why the rest of the pipeline detects containers by
//! header. On other platforms the binary is simply absent and the dispatcher
//! falls through.

use std::process::Command;
use std::time::Duration;

use crate::audio::format::AudioArtifact;
use crate::engines::{exec, finish_artifact, Backend, BackendAdapter, SynthesisRequest};
use crate::error::TtsError;

const TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_VOICE: &str = "Alex";
/// `say`'s nominal rate in words per minute.
const BASE_WPM: f32 = 200.0;

pub struct SayAdapter;

impl BackendAdapter for SayAdapter {
    fn backend(&self) -> Backend {
        Backend::Say
    }

    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<AudioArtifact, TtsError> {
        let voice = request.profile.voice.as_deref().unwrap_or(DEFAULT_VOICE);
        let rate = (BASE_WPM * request.effective_speed()).round().clamp(90.0, 500.0) as i32;

        log::debug!("say: voice={voice}, rate={rate}wpm");

        let mut cmd = Command::new("say");
        cmd.arg("-v")
            .arg(voice)
            .arg("-r")
            .arg(rate.to_string())
            .arg("-o")
            .arg(request.output_path)
            .arg(request.text);

        exec::run_backend(Backend::Say, cmd, None, TIMEOUT)?;
        finish_artifact(Backend::Say, request.output_path)
    }
}
