use std::path::PathBuf;

use crate::engines::Backend;

/// Errors produced by the synthesis pipeline.
///
/// Backend- and transcode-level variants are recoverable: the dispatcher and
/// the conversion cascade catch them, log a warning, and move on to the next
/// strategy. Only `AllEnginesFailed` and `CombineFailed` terminate a unit of
/// work.
#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error(
        "{backend} is not available: {detail}. \
         Install the engine or let the dispatcher fall back to another backend."
    )]
    BackendUnavailable { backend: Backend, detail: String },

    #[error("{backend} timed out after {seconds}s")]
    BackendTimeout { backend: Backend, seconds: u64 },

    #[error("{backend} failed: {detail}")]
    BackendFailed { backend: Backend, detail: String },

    #[error("{backend} produced no audio at {path}")]
    EmptyOutput { backend: Backend, path: PathBuf },

    #[error("generated audio failed validation: {reason}")]
    ValidationFailed { reason: String },

    #[error("all TTS engines failed; last error: {last}")]
    AllEnginesFailed { last: Box<TtsError> },

    #[error("{tool} not found on PATH")]
    ToolUnavailable { tool: String },

    #[error("{tool} failed: {detail}")]
    ToolFailed { tool: String, detail: String },

    #[error("audio combination failed: {0}")]
    CombineFailed(String),

    #[error("failed to parse AIFF container: {0}")]
    AiffParse(String),

    #[error("failed to read WAV container: {0}")]
    WavParse(String),

    #[error("invalid voice profile configuration: {0}")]
    ProfileConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
