//! Container conversion with a layered strategy cascade.
//!
//! Conversion robustness degrades in a fixed order: ffmpeg with defensive
//! flags, an in-process PCM rewrite (no external tools at all), a direct
//! `lame` invocation, and finally a raw byte copy. The cascade never returns
//! nothing: the last step trades container correctness for forward progress
//! and says so loudly in the log.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::audio::format::{AudioArtifact, AudioFormat};
use crate::audio::{pcm, probe};
use crate::audio::validate::ValidationThresholds;
use crate::engines::exec;
use crate::error::TtsError;

const FFMPEG_TIMEOUT: Duration = Duration::from_secs(120);
const LAME_TIMEOUT: Duration = Duration::from_secs(60);

/// One rung of the conversion cascade.
pub trait ConvertStrategy {
    fn name(&self) -> &'static str;

    /// Try to convert `input` into `target` format at `dest`.
    fn attempt(
        &self,
        input: &AudioArtifact,
        dest: &Path,
        target: AudioFormat,
        thresholds: &ValidationThresholds,
    ) -> Result<(), TtsError>;
}

fn cascade() -> [&'static dyn ConvertStrategy; 3] {
    [&FfmpegConvert, &NativePcmRewrite, &LameEncode]
}

/// Convert `input` into `target` format at `dest`, first strategy wins.
///
/// Never gives up: if every strategy fails the input bytes are copied to
/// `dest` unchanged and the returned artifact carries whatever container the
/// copy actually has. Only an I/O failure of that final copy is an error.
pub fn normalize(
    input: &AudioArtifact,
    dest: &Path,
    target: AudioFormat,
    thresholds: &ValidationThresholds,
) -> Result<AudioArtifact, TtsError> {
    if input.format == target {
        if input.path == dest {
            return Ok(input.clone());
        }
        std::fs::copy(&input.path, dest)?;
        return AudioArtifact::detect(dest);
    }

    for strategy in cascade() {
        match strategy.attempt(input, dest, target, thresholds) {
            Ok(()) => {
                let artifact = AudioArtifact::detect(dest)?;
                log::debug!(
                    "converted {} to {} via {}",
                    input.path.display(),
                    artifact.format,
                    strategy.name()
                );
                return Ok(artifact);
            }
            Err(e) => {
                log::warn!("{} conversion failed: {e}", strategy.name());
                let _ = std::fs::remove_file(dest);
            }
        }
    }

    log::warn!(
        "all conversion strategies failed for {}; copying bytes unchanged; \
         the result may not be a playable {target} file",
        input.path.display()
    );
    std::fs::copy(&input.path, dest)?;
    AudioArtifact::detect(dest)
}

/// General-purpose transcoder with defensive flags, retried once with a
/// minimal flag set, since exotic flags sometimes trip up unusual inputs.
struct FfmpegConvert;

impl ConvertStrategy for FfmpegConvert {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn attempt(
        &self,
        input: &AudioArtifact,
        dest: &Path,
        target: AudioFormat,
        thresholds: &ValidationThresholds,
    ) -> Result<(), TtsError> {
        exec::find_binary("ffmpeg").ok_or_else(|| TtsError::ToolUnavailable {
            tool: "ffmpeg".to_string(),
        })?;

        let full = run_ffmpeg(input, dest, target, true);
        if let Err(e) = full {
            if matches!(e, TtsError::ToolUnavailable { .. }) {
                return Err(e);
            }
            log::warn!("ffmpeg full-flag conversion failed ({e}); retrying with minimal flags");
            let _ = std::fs::remove_file(dest);
            run_ffmpeg(input, dest, target, false)?;
        }

        verify_converted(input, dest, target, thresholds)
    }
}

fn run_ffmpeg(
    input: &AudioArtifact,
    dest: &Path,
    target: AudioFormat,
    defensive: bool,
) -> Result<(), TtsError> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-i").arg(&input.path);

    match target {
        AudioFormat::Mp3 if defensive => {
            cmd.args([
                "-codec:a",
                "libmp3lame",
                "-b:a",
                "192k",
                "-ar",
                "44100",
                "-ac",
                "2",
                "-f",
                "mp3",
                // Xing headers and source metadata are known to confuse some
                // players after concatenation; timestamps are regenerated to
                // dodge negative-timestamp truncation.
                "-write_xing",
                "0",
                "-id3v2_version",
                "3",
                "-map_metadata",
                "-1",
                "-avoid_negative_ts",
                "make_zero",
                "-fflags",
                "+genpts",
                "-max_muxing_queue_size",
                "1024",
            ]);
        }
        AudioFormat::Mp3 => {
            cmd.args(["-codec:a", "mp3"]);
        }
        AudioFormat::Wav if defensive => {
            cmd.args(["-codec:a", "pcm_s16le", "-ar", "44100", "-ac", "2", "-map_metadata", "-1"]);
        }
        AudioFormat::Wav => {
            cmd.args(["-codec:a", "pcm_s16le"]);
        }
        other => {
            return Err(TtsError::ToolFailed {
                tool: "ffmpeg".to_string(),
                detail: format!("no encoder mapping for target container {other}"),
            })
        }
    }

    cmd.arg("-y").arg(dest);
    exec::run_tool("ffmpeg", cmd, None, FFMPEG_TIMEOUT).map(|_| ())
}

/// Post-conversion checks shared by the external-tool strategies: output must
/// exist, be non-trivial in size relative to the input (for like-for-like
/// containers), and must not have lost duration.
fn verify_converted(
    input: &AudioArtifact,
    dest: &Path,
    target: AudioFormat,
    thresholds: &ValidationThresholds,
) -> Result<(), TtsError> {
    let out_size = std::fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
    if out_size == 0 {
        return Err(TtsError::ToolFailed {
            tool: "ffmpeg".to_string(),
            detail: format!("produced an empty file at {}", dest.display()),
        });
    }

    let in_size = std::fs::metadata(&input.path).map(|m| m.len()).unwrap_or(0);
    let like_for_like = input.format.is_uncompressed() == target.is_uncompressed();
    if like_for_like
        && in_size > 0
        && (out_size as f64) < in_size as f64 * thresholds.min_transcode_size_ratio
    {
        return Err(TtsError::ToolFailed {
            tool: "ffmpeg".to_string(),
            detail: format!(
                "suspected truncation: output {out_size} bytes vs input {in_size} bytes"
            ),
        });
    }

    if let (Some(din), Some(dout)) = (probe::probe_duration(&input.path), probe::probe_duration(dest))
    {
        if din > 0.0 && dout < din * thresholds.min_transcode_duration_ratio {
            return Err(TtsError::ToolFailed {
                tool: "ffmpeg".to_string(),
                detail: format!("duration shrank from {din:.2}s to {dout:.2}s"),
            });
        }
    }

    Ok(())
}

/// Zero-dependency rung: decode uncompressed PCM in-process and rewrite it
/// losslessly as RIFF/WAVE. Guarantees a working fallback on hosts with no
/// external tooling at all.
struct NativePcmRewrite;

impl ConvertStrategy for NativePcmRewrite {
    fn name(&self) -> &'static str {
        "native-pcm"
    }

    fn attempt(
        &self,
        input: &AudioArtifact,
        dest: &Path,
        target: AudioFormat,
        _thresholds: &ValidationThresholds,
    ) -> Result<(), TtsError> {
        if !input.format.is_uncompressed() {
            return Err(TtsError::ToolFailed {
                tool: "native-pcm".to_string(),
                detail: format!("cannot decode {} in-process", input.format),
            });
        }

        let audio = pcm::decode_artifact(input)?;
        audio.write_wav(dest)?;

        if target != AudioFormat::Wav {
            log::warn!(
                "wrote WAV bytes to {} although {target} was requested; \
                 downstream consumers detect containers by header, not extension",
                dest.display()
            );
        }
        Ok(())
    }
}

/// Last-resort dedicated lossy encoder for true compressed output.
struct LameEncode;

impl ConvertStrategy for LameEncode {
    fn name(&self) -> &'static str {
        "lame"
    }

    fn attempt(
        &self,
        input: &AudioArtifact,
        dest: &Path,
        target: AudioFormat,
        _thresholds: &ValidationThresholds,
    ) -> Result<(), TtsError> {
        if target != AudioFormat::Mp3 {
            return Err(TtsError::ToolFailed {
                tool: "lame".to_string(),
                detail: format!("only encodes mp3, not {target}"),
            });
        }
        exec::find_binary("lame").ok_or_else(|| TtsError::ToolUnavailable {
            tool: "lame".to_string(),
        })?;

        let mut cmd = Command::new("lame");
        cmd.arg("-b").arg("128").arg(&input.path).arg(dest);
        exec::run_tool("lame", cmd, None, LAME_TIMEOUT)?;

        let size = std::fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(TtsError::ToolFailed {
                tool: "lame".to_string(),
                detail: "produced an empty file".to_string(),
            });
        }
        Ok(())
    }
}
