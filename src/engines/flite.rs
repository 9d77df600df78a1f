//! Flite adapter: the cross-platform offline engine.
//!
//! Flite ships tiny voices, installs everywhere, and writes WAV directly,
//! which makes it the most compatible first stop on non-macOS hosts.

use std::process::Command;
use std::time::Duration;

use crate::audio::format::AudioArtifact;
use crate::engines::{exec, finish_artifact, Backend, BackendAdapter, SynthesisRequest};
use crate::error::TtsError;

const TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_VOICE: &str = "slt";

pub struct FliteAdapter;

impl BackendAdapter for FliteAdapter {
    fn backend(&self) -> Backend {
        Backend::Flite
    }

    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<AudioArtifact, TtsError> {
        let voice = request.profile.voice.as_deref().unwrap_or(DEFAULT_VOICE);
        // Flite expresses speed as a duration stretch, the inverse of rate.
        let stretch = (1.0 / request.effective_speed()).clamp(0.5, 2.0);

        log::debug!("flite: voice={voice}, duration_stretch={stretch:.2}");

        let mut cmd = Command::new("flite");
        cmd.arg("-voice")
            .arg(voice)
            .arg("--setf")
            .arg(format!("duration_stretch={stretch:.2}"))
            .arg("-t")
            .arg(request.text)
            .arg("-o")
            .arg(request.output_path);

        exec::run_backend(Backend::Flite, cmd, None, TIMEOUT)?;
        finish_artifact(Backend::Flite, request.output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::{FliteAdapter, DEFAULT_VOICE};
    use crate::engines::{exec, Backend, BackendAdapter, SynthesisRequest};
    use crate::profile::VoiceProfile;

    #[test]
    fn reports_its_backend() {
        assert_eq!(FliteAdapter.backend(), Backend::Flite);
    }

    #[test]
    fn synthesizes_a_wav_when_flite_is_installed() {
        if exec::find_binary("flite").is_none() {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("hello.wav");
        let profile = VoiceProfile::new("Test", Backend::Flite, Some(DEFAULT_VOICE), "en", 1.0, 1.0);
        let request = SynthesisRequest {
            text: "Hello from the test suite.",
            profile: &profile,
            output_path: &out,
            speed_multiplier: 1.0,
        };

        let artifact = FliteAdapter.synthesize(&request).unwrap();
        assert!(artifact.path.exists());
        assert_eq!(artifact.format, crate::audio::format::AudioFormat::Wav);
    }
}
