//! eSpeak NG adapter: the lightweight offline engine.

use std::process::Command;
use std::time::Duration;

use crate::audio::format::AudioArtifact;
use crate::engines::{exec, finish_artifact, Backend, BackendAdapter, SynthesisRequest};
use crate::error::TtsError;

const TIMEOUT: Duration = Duration::from_secs(120);
/// eSpeak's default speaking rate in words per minute.
const BASE_WPM: f32 = 175.0;

pub struct EspeakAdapter;

impl BackendAdapter for EspeakAdapter {
    fn backend(&self) -> Backend {
        Backend::Espeak
    }

    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<AudioArtifact, TtsError> {
        // Prefer the maintained fork; fall back to the classic binary name.
        let program = if exec::find_binary("espeak-ng").is_some() {
            "espeak-ng"
        } else {
            "espeak"
        };

        let voice = request.profile.voice.as_deref().unwrap_or("en");
        let wpm = (BASE_WPM * request.effective_speed()).round().clamp(80.0, 450.0) as i32;
        // eSpeak pitch runs 0–99 around a default of 50.
        let pitch = (50.0 * request.profile.pitch).round().clamp(0.0, 99.0) as i32;

        log::debug!("{program}: voice={voice}, speed={wpm}wpm, pitch={pitch}");

        let mut cmd = Command::new(program);
        cmd.arg("-v")
            .arg(voice)
            .arg("-s")
            .arg(wpm.to_string())
            .arg("-p")
            .arg(pitch.to_string())
            .arg("-w")
            .arg(request.output_path)
            .arg("--stdin");

        exec::run_backend(Backend::Espeak, cmd, Some(request.text), TIMEOUT)?;
        finish_artifact(Backend::Espeak, request.output_path)
    }
}
