//! Stitching per-segment artifacts into one output file.
//!
//! Primary path is the external transcoder's concat mode; the fallback
//! decodes everything in-process and writes a single WAV, so combination
//! works on hosts with no external tooling. The least-desirable path emits
//! only the first valid segment; partial output beats total failure in a
//! user-facing generation tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::audio::format::AudioArtifact;
use crate::audio::pcm::{self, PcmAudio};
use crate::engines::exec;
use crate::error::TtsError;

const CONCAT_TIMEOUT: Duration = Duration::from_secs(120);

/// Sample rate used for generated silence and in-process concatenation.
pub const STITCH_SAMPLE_RATE: u32 = 44100;

/// Write `duration_secs` of silence as a WAV artifact at `path`.
pub fn write_silence(path: &Path, duration_secs: f64) -> Result<AudioArtifact, TtsError> {
    PcmAudio::silence(duration_secs, STITCH_SAMPLE_RATE).write_wav(path)?;
    AudioArtifact::detect(path)
}

/// Concatenate `inputs` in order into a single artifact at `dest`.
///
/// Missing or empty inputs are skipped with a warning; the call fails with
/// [`TtsError::CombineFailed`] only when no valid input remains.
pub fn combine(inputs: &[PathBuf], dest: &Path) -> Result<AudioArtifact, TtsError> {
    let valid = filter_valid(inputs);
    if valid.is_empty() {
        return Err(TtsError::CombineFailed(format!(
            "none of the {} input artifacts exist and are non-empty",
            inputs.len()
        )));
    }

    match concat_with_ffmpeg(&valid, dest) {
        Ok(artifact) => return Ok(artifact),
        Err(e) => log::warn!("ffmpeg concat failed: {e}"),
    }

    match concat_in_process(&valid, dest) {
        Ok(artifact) => return Ok(artifact),
        Err(e) => log::warn!("in-process concatenation failed: {e}"),
    }

    // Least-desirable fallback: ship the first valid segment alone.
    log::warn!(
        "emitting only the first of {} segments to {}; install ffmpeg for full combination",
        valid.len(),
        dest.display()
    );
    std::fs::copy(&valid[0], dest)?;
    AudioArtifact::detect(dest)
}

fn filter_valid(inputs: &[PathBuf]) -> Vec<PathBuf> {
    inputs
        .iter()
        .filter(|path| match std::fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => true,
            Ok(_) => {
                log::warn!("skipping empty segment artifact {}", path.display());
                false
            }
            Err(_) => {
                log::warn!("skipping missing segment artifact {}", path.display());
                false
            }
        })
        .cloned()
        .collect()
}

/// Concat-demuxer invocation with explicit output settings and metadata
/// stripped: tags from different source engines are incompatible and can
/// corrupt the concatenation.
fn concat_with_ffmpeg(inputs: &[PathBuf], dest: &Path) -> Result<AudioArtifact, TtsError> {
    exec::find_binary("ffmpeg").ok_or_else(|| TtsError::ToolUnavailable {
        tool: "ffmpeg".to_string(),
    })?;

    let mut manifest = tempfile::NamedTempFile::new()?;
    for path in inputs {
        writeln!(manifest, "file '{}'", escape_concat_path(path))?;
    }
    manifest.flush()?;

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-f", "concat", "-safe", "0", "-i"])
        .arg(manifest.path())
        .args([
            "-codec:a",
            "libmp3lame",
            "-b:a",
            "192k",
            "-ar",
            "44100",
            "-ac",
            "2",
            "-map_metadata",
            "-1",
            "-y",
        ])
        .arg(dest);

    exec::run_tool("ffmpeg", cmd, None, CONCAT_TIMEOUT)?;

    let size = std::fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(TtsError::ToolFailed {
            tool: "ffmpeg".to_string(),
            detail: "concat produced an empty file".to_string(),
        });
    }
    log::debug!("combined {} artifacts into {} ({size} bytes)", inputs.len(), dest.display());
    AudioArtifact::detect(dest)
}

// The concat demuxer's quoting rule: close the quote, emit an escaped
// quote, reopen.
fn escape_concat_path(path: &Path) -> String {
    path.display().to_string().replace('\'', r"'\''")
}

/// Decode every input in-process, resample to a common rate, and write one
/// uncompressed artifact. Inputs whose container cannot be decoded without
/// external tools (compressed ones) are skipped with a warning.
fn concat_in_process(inputs: &[PathBuf], dest: &Path) -> Result<AudioArtifact, TtsError> {
    let mut combined: Vec<i16> = Vec::new();
    let mut target_rate = 0u32;
    let mut decoded_count = 0usize;

    for path in inputs {
        let artifact = AudioArtifact::detect(path)?;
        let audio = match pcm::decode_artifact(&artifact) {
            Ok(audio) => audio,
            Err(e) => {
                log::warn!("cannot decode {} for in-process concat: {e}", path.display());
                continue;
            }
        };
        if audio.samples.is_empty() {
            continue;
        }
        if target_rate == 0 {
            target_rate = audio.sample_rate;
        }
        combined.extend(pcm::resample_mono(&audio, target_rate));
        decoded_count += 1;
    }

    if decoded_count == 0 || target_rate == 0 {
        return Err(TtsError::CombineFailed(
            "no input artifact was decodable in-process".to_string(),
        ));
    }

    let output = PcmAudio {
        samples: combined,
        channels: 1,
        sample_rate: target_rate,
    };
    output.write_wav(dest)?;

    if dest.extension().and_then(|e| e.to_str()) == Some("mp3") {
        log::warn!(
            "combined audio written as WAV under {}; headers, not extensions, decide playback",
            dest.display()
        );
    }
    log::debug!(
        "combined {decoded_count}/{} artifacts in-process ({:.2}s)",
        inputs.len(),
        output.duration_secs()
    );
    AudioArtifact::detect(dest)
}

#[cfg(test)]
mod tests {
    use super::{combine, concat_in_process, escape_concat_path, write_silence};
    use crate::audio::format::AudioFormat;
    use crate::audio::pcm::{decode_wav, PcmAudio};
    use std::path::PathBuf;

    #[test]
    fn zero_valid_inputs_is_a_combine_failure() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.wav");
        std::fs::write(&empty, b"").unwrap();
        let missing = dir.path().join("missing.wav");

        let err = combine(&[empty, missing], &dir.path().join("out.mp3")).unwrap_err();
        assert!(matches!(err, crate::error::TtsError::CombineFailed(_)));
    }

    #[test]
    fn in_process_concat_duration_is_at_least_the_sum_of_parts() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        let pause = dir.path().join("pause.wav");
        PcmAudio::silence(0.4, 22050).write_wav(&a).unwrap();
        PcmAudio::silence(0.6, 22050).write_wav(&b).unwrap();
        write_silence(&pause, 0.5).unwrap();

        let dest = dir.path().join("out.wav");
        let inputs: Vec<PathBuf> = vec![a, pause, b];
        concat_in_process(&inputs, &dest).unwrap();

        let combined = decode_wav(&dest).unwrap();
        // 0.4 + 0.5 + 0.6 seconds; silence only adds time, never removes.
        assert!(combined.duration_secs() >= 1.5 - 0.01, "got {}", combined.duration_secs());
    }

    #[test]
    fn in_process_concat_resamples_mismatched_rates() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        PcmAudio::silence(1.0, 22050).write_wav(&a).unwrap();
        PcmAudio::silence(1.0, 44100).write_wav(&b).unwrap();

        let dest = dir.path().join("out.wav");
        concat_in_process(&[a, b], &dest).unwrap();

        let combined = decode_wav(&dest).unwrap();
        assert_eq!(combined.sample_rate, 22050);
        assert!((combined.duration_secs() - 2.0).abs() < 0.01);
    }

    #[test]
    fn undecodable_inputs_fall_through_to_first_valid_copy() {
        let dir = tempfile::tempdir().unwrap();
        let fake_mp3 = dir.path().join("a.mp3");
        // Frame-sync header so detection says mp3, which the in-process
        // decoder rightly refuses.
        std::fs::write(&fake_mp3, [0xFF, 0xFB, 0x90, 0x00, 1, 2, 3, 4]).unwrap();

        let dest = dir.path().join("out.mp3");
        let err = concat_in_process(&[fake_mp3], &dest).unwrap_err();
        assert!(matches!(err, crate::error::TtsError::CombineFailed(_)));
    }

    #[test]
    fn combine_produces_one_artifact_from_wav_segments() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        PcmAudio::silence(0.3, 44100).write_wav(&a).unwrap();
        PcmAudio::silence(0.3, 44100).write_wav(&b).unwrap();

        let dest = dir.path().join("out.mp3");
        let artifact = combine(&[a, b], &dest).unwrap();
        assert!(artifact.path.exists());
        assert!(std::fs::metadata(&artifact.path).unwrap().len() > 0);
        // ffmpeg present: true mp3. Absent: WAV bytes from the in-process path.
        assert!(matches!(artifact.format, AudioFormat::Mp3 | AudioFormat::Wav));
    }

    #[test]
    fn single_quotes_in_paths_are_escaped_for_the_manifest() {
        let path = PathBuf::from("/tmp/it's here.mp3");
        assert_eq!(escape_concat_path(&path), r"/tmp/it'\''s here.mp3");
    }
}
