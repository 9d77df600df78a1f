//! Artifact sanity checks.
//!
//! The single most damaging failure mode of this pipeline is silently
//! truncated audio: an engine that dies halfway through still leaves a
//! playable file behind. Validation compares what is on disk against what the
//! input text implies should be there.

use std::path::Path;

use crate::audio::probe;

/// Tunable heuristics for artifact validation.
///
/// These are domain guesses about speech, not physical constants; per-language
/// or per-voice deployments may need different values.
#[derive(Debug, Clone)]
pub struct ValidationThresholds {
    /// Assumed speaking rate used to estimate expected duration.
    pub words_per_second: f64,
    /// Reject artifacts shorter than this fraction of the expected duration.
    pub min_duration_ratio: f64,
    /// Warn (but accept) artifacts longer than this multiple of the expected
    /// duration.
    pub warn_duration_ratio: f64,
    /// Rough compressed-audio size per word, for hosts without ffprobe.
    pub bytes_per_word: u64,
    /// Reject artifacts smaller than this fraction of the byte estimate.
    pub min_size_ratio: f64,
    /// Reject transcoder output smaller than this fraction of its input, for
    /// like-for-like containers.
    pub min_transcode_size_ratio: f64,
    /// Reject transcoder output shorter than this fraction of its input's
    /// probed duration. Deliberately stricter than `min_duration_ratio`:
    /// a transcoder should preserve duration almost exactly, while engines
    /// legitimately vary around the words-per-second estimate. Tune the two
    /// separately.
    pub min_transcode_duration_ratio: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            words_per_second: 2.5,
            min_duration_ratio: 0.5,
            warn_duration_ratio: 3.0,
            bytes_per_word: 1000,
            min_size_ratio: 0.3,
            min_transcode_size_ratio: 0.1,
            min_transcode_duration_ratio: 0.8,
        }
    }
}

/// Check that the artifact at `path` exists, is non-empty, and (when the
/// expected text is known) is plausibly long enough to contain it.
///
/// Prefers a real duration probe; falls back to a byte-size heuristic when no
/// probe tool is installed.
pub fn is_valid(path: &Path, expected_text: Option<&str>, t: &ValidationThresholds) -> bool {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => {
            log::error!("audio file does not exist: {}", path.display());
            return false;
        }
    };
    if size == 0 {
        log::error!("audio file is empty: {}", path.display());
        return false;
    }

    let word_count = expected_text
        .map(|text| text.split_whitespace().count())
        .filter(|&n| n > 0);

    if let Some(duration) = probe::probe_duration(path) {
        log::debug!("audio duration: {duration:.2}s ({})", path.display());

        if let Some(words) = word_count {
            let expected = words as f64 / t.words_per_second;
            if duration < expected * t.min_duration_ratio {
                log::warn!(
                    "audio seems truncated: {duration:.2}s vs expected ~{expected:.2}s ({})",
                    path.display()
                );
                return false;
            }
            if duration > expected * t.warn_duration_ratio {
                log::warn!(
                    "audio seems unexpectedly long: {duration:.2}s vs expected ~{expected:.2}s ({})",
                    path.display()
                );
            }
        }
        return true;
    }

    // No probe tool; fall back to a coarse size estimate.
    if let Some(words) = word_count {
        let min_expected = words as u64 * t.bytes_per_word;
        if (size as f64) < min_expected as f64 * t.min_size_ratio {
            log::warn!(
                "audio file seems small: {size} bytes for {words} words ({})",
                path.display()
            );
            return false;
        }
    }

    log::debug!("audio file basic validation passed: {size} bytes ({})", path.display());
    true
}

#[cfg(test)]
mod tests {
    use super::{is_valid, ValidationThresholds};
    use crate::audio::pcm::PcmAudio;

    #[test]
    fn missing_file_is_invalid() {
        let t = ValidationThresholds::default();
        assert!(!is_valid(std::path::Path::new("/nonexistent/audio.mp3"), None, &t));
    }

    #[test]
    fn zero_byte_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mp3");
        std::fs::write(&path, b"").unwrap();
        assert!(!is_valid(&path, None, &t()));
    }

    #[test]
    fn well_formed_artifact_within_bounds_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");
        // ~2s of audio for 5 words (expected 2s at 2.5 words/s): inside both
        // the duration window and the size heuristic.
        PcmAudio::silence(2.0, 44100).write_wav(&path).unwrap();
        assert!(is_valid(&path, Some("one two three four five"), &t()));
    }

    #[test]
    fn far_too_short_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stub.wav");
        // Half a second of audio against 500 words (~200s expected). Fails
        // the probed-duration window and the no-probe size heuristic alike.
        PcmAudio::silence(0.5, 44100).write_wav(&path).unwrap();
        let text = "word ".repeat(500);
        assert!(!is_valid(&path, Some(&text), &t()));
    }

    #[test]
    fn no_expected_text_only_checks_existence_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        PcmAudio::silence(0.1, 8000).write_wav(&path).unwrap();
        assert!(is_valid(&path, None, &t()));
    }

    fn t() -> ValidationThresholds {
        ValidationThresholds::default()
    }
}
