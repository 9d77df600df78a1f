//! # podcast-tts
//!
//! Turn speaker-tagged dialogue into a single finished audio file, using
//! whichever speech-synthesis engine the host actually has installed.
//!
//! ## Features
//!
//! - **Five backends behind one contract**: Flite, eSpeak NG, Piper, macOS
//!   `say`, and Google TTS via `gtts-cli`, with platform-aware automatic
//!   fallback
//! - **Defensive audio handling**: containers detected by magic bytes, a
//!   layered transcoding cascade, and duration validation against the input
//!   text to catch silent truncation
//! - **Conversation stitching**: per-speaker voices, inter-segment pauses,
//!   and a combiner that degrades gracefully down to zero external tools
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! podcast-tts = "0.4"
//! ```
//!
//! ```ignore
//! use podcast_tts::{ConversationSegment, GeneratorConfigBuilder, TtsGenerator};
//!
//! let generator = TtsGenerator::new(
//!     GeneratorConfigBuilder::default()
//!         .output_dir("./output")
//!         .build()?,
//! );
//!
//! let segments = vec![
//!     ConversationSegment::new("alex", "Hi there."),
//!     ConversationSegment::new("sam", "Hello Alex."),
//! ];
//! let audio = generator.generate_for_segments("Pilot Episode", &segments)?;
//! println!("episode written to {}", audio.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audio;
pub mod engines;
pub mod error;
pub mod generator;
pub mod profile;
pub mod text;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use audio::{AudioArtifact, AudioFormat, ValidationThresholds};
pub use engines::Backend;
pub use error::TtsError;
pub use generator::{GeneratorConfig, GeneratorConfigBuilder, TtsGenerator};
pub use profile::{ProfileRegistry, VoiceProfile};

/// One speaker-attributed unit of dialogue, synthesized independently and
/// stitched into the final output in list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSegment {
    /// Speaker identity: a named speaker, `"narrator"`, or `"both"` for
    /// shared lines.
    pub speaker: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
}

impl ConversationSegment {
    pub fn new(speaker: &str, text: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            text: text.to_string(),
            duration_seconds: None,
            audio_path: None,
        }
    }
}

/// One unit of batch generation: a titled script, optionally broken into
/// conversation segments, and the artifact it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,
    pub script: String,
    #[serde(default)]
    pub segments: Vec<ConversationSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
}

impl Episode {
    pub fn new(title: &str, script: &str) -> Self {
        Self {
            title: title.to_string(),
            script: script.to_string(),
            segments: Vec::new(),
            audio_path: None,
        }
    }

    pub fn with_segments(title: &str, script: &str, segments: Vec<ConversationSegment>) -> Self {
        Self {
            title: title.to_string(),
            script: script.to_string(),
            segments,
            audio_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationSegment, Episode};

    #[test]
    fn segments_serialize_without_empty_optionals() {
        let segment = ConversationSegment::new("alex", "Hi.");
        let json = serde_json::to_string(&segment).unwrap();
        assert_eq!(json, r#"{"speaker":"alex","text":"Hi."}"#);
    }

    #[test]
    fn episodes_round_trip_through_json() {
        let episode = Episode::with_segments(
            "Pilot",
            "ALEX: Hi.",
            vec![ConversationSegment::new("alex", "Hi.")],
        );
        let json = serde_json::to_string(&episode).unwrap();
        let back: Episode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.title, "Pilot");
        assert_eq!(back.segments.len(), 1);
        assert!(back.audio_path.is_none());
    }
}
