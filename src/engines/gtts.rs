//! gtts-cli adapter: the cloud engine, last in every fallback order.
//!
//! The service enforces a hard character ceiling per request, so long text is
//! chunked at a fixed boundary, synthesized per chunk, and stitched back into
//! one artifact with the segment combiner before returning.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::audio::combine;
use crate::audio::format::AudioArtifact;
use crate::engines::{exec, finish_artifact, Backend, BackendAdapter, SynthesisRequest};
use crate::error::TtsError;

const TIMEOUT: Duration = Duration::from_secs(300);
/// Hard per-request character ceiling of the cloud endpoint.
pub const MAX_CHARS: usize = 5000;
/// Effective speeds at or below this use the service's "slow" mode.
const SLOW_SPEED_CUTOFF: f32 = 0.75;

pub struct GttsAdapter;

impl BackendAdapter for GttsAdapter {
    fn backend(&self) -> Backend {
        Backend::Gtts
    }

    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<AudioArtifact, TtsError> {
        let lang = &request.profile.language;
        // For this backend the profile's voice selector carries the service
        // top-level domain, which picks the regional accent.
        let tld = request.profile.voice.as_deref();
        let slow = request.effective_speed() <= SLOW_SPEED_CUTOFF;

        let char_count = request.text.chars().count();
        if char_count <= MAX_CHARS {
            synthesize_chunk(request.text, lang, tld, slow, request.output_path)?;
            return finish_artifact(Backend::Gtts, request.output_path);
        }

        let chunks = split_fixed(request.text, MAX_CHARS);
        log::debug!("gtts: splitting {char_count} chars into {} chunks", chunks.len());

        let mut chunk_paths: Vec<PathBuf> = Vec::with_capacity(chunks.len());
        let result: Result<(), TtsError> = (|| {
            for (i, chunk) in chunks.iter().enumerate() {
                let path = chunk_path(request.output_path, i);
                synthesize_chunk(chunk, lang, tld, slow, &path)?;
                chunk_paths.push(path);
            }
            combine::combine(&chunk_paths, request.output_path)?;
            Ok(())
        })();

        for path in &chunk_paths {
            let _ = std::fs::remove_file(path);
        }
        result?;

        finish_artifact(Backend::Gtts, request.output_path)
    }
}

fn synthesize_chunk(
    text: &str,
    lang: &str,
    tld: Option<&str>,
    slow: bool,
    output_path: &Path,
) -> Result<(), TtsError> {
    log::debug!("gtts-cli: lang={lang}, tld={tld:?}, slow={slow}");

    let mut cmd = Command::new("gtts-cli");
    cmd.arg("--lang").arg(lang);
    if let Some(tld) = tld {
        cmd.arg("--tld").arg(tld);
    }
    if slow {
        cmd.arg("--slow");
    }
    cmd.arg("--output").arg(output_path).arg("-");

    exec::run_backend(Backend::Gtts, cmd, Some(text), TIMEOUT)?;

    let size = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(TtsError::EmptyOutput {
            backend: Backend::Gtts,
            path: output_path.to_path_buf(),
        });
    }
    Ok(())
}

fn chunk_path(output_path: &Path, index: usize) -> PathBuf {
    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("chunk");
    output_path.with_file_name(format!("{stem}_chunk{index:02}.mp3"))
}

/// Split text at a fixed character-count boundary, always on a char boundary.
fn split_fixed(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::{chunk_path, split_fixed, MAX_CHARS};
    use std::path::Path;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_fixed("short text", MAX_CHARS);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn long_text_splits_at_the_fixed_boundary() {
        let text = "a".repeat(MAX_CHARS * 2 + 100);
        let chunks = split_fixed(&text, MAX_CHARS);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), MAX_CHARS);
        assert_eq!(chunks[1].chars().count(), MAX_CHARS);
        assert_eq!(chunks[2].chars().count(), 100);
    }

    #[test]
    fn splitting_respects_multibyte_char_boundaries() {
        let text = "é".repeat(10);
        let chunks = split_fixed(&text, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunk_paths_are_siblings_of_the_output() {
        let path = chunk_path(Path::new("/out/episode.mp3"), 3);
        assert_eq!(path, Path::new("/out/episode_chunk03.mp3"));
    }
}
