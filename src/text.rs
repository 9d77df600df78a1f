//! Text preparation for synthesis.
//!
//! Dialogue scripts arrive with audio cues (`[BOTH LAUGH]`), markdown
//! emphasis, speaker labels, and punctuation that engines read aloud or choke
//! on. Everything an engine should not speak is stripped here, before any
//! backend sees the text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Returned when cleaning leaves nothing speakable behind.
pub const EMPTY_TEXT_FALLBACK: &str = "Content not available for audio generation.";

static AUDIO_CUES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static STRAY_ASTERISKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*+").unwrap());
static SPEAKER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[A-Z][A-Z0-9 _-]{0,24}:\s*").unwrap());
static ELLIPSIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{3,}").unwrap());
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{1,2}([^_]+)_{1,2}").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static UNSPEAKABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#@$%^&+=|\\/<>{}]").unwrap());
static REPEATED_BANGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"!{2,}").unwrap());
static REPEATED_QUESTIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?{2,}").unwrap());
static REPEATED_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r",{2,}").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip audio cues and formatting that must not be spoken.
///
/// Removes bracketed cue markers, markdown emphasis and inline code,
/// interruption dashes, leading ALL-CAPS speaker labels, and characters known
/// to trip up CLI engines. Whitespace is normalized to single spaces.
///
/// Never returns an empty string: if nothing speakable survives,
/// [`EMPTY_TEXT_FALLBACK`] is returned so downstream duration estimates stay
/// meaningful.
pub fn clean_audio_cues(text: &str) -> String {
    if text.is_empty() {
        return EMPTY_TEXT_FALLBACK.to_string();
    }

    let text = AUDIO_CUES.replace_all(text, "");
    let text = SPEAKER_LABEL.replace_all(&text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = EMPHASIS.replace_all(&text, "$1");
    let text = STRAY_ASTERISKS.replace_all(&text, "");
    let text = text.replace("--", " ");
    let text = ELLIPSIS.replace_all(&text, ".");
    let text = UNDERSCORES.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = UNSPEAKABLE.replace_all(&text, "");
    let text = REPEATED_BANGS.replace_all(&text, "!");
    let text = REPEATED_QUESTIONS.replace_all(&text, "?");
    let text = REPEATED_COMMAS.replace_all(&text, ",");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim();

    if text.is_empty() {
        EMPTY_TEXT_FALLBACK.to_string()
    } else {
        text.to_string()
    }
}

static FILENAME_FORBIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static FILENAME_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Turn an episode title into a filesystem-safe stem (lowercase, dashed,
/// at most 50 characters).
pub fn sanitize_filename(title: &str) -> String {
    let stripped = FILENAME_FORBIDDEN.replace_all(title, "");
    let dashed = FILENAME_SPACES.replace_all(stripped.trim(), "-");
    let lowered = dashed.to_lowercase();
    lowered.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::{clean_audio_cues, sanitize_filename, EMPTY_TEXT_FALLBACK};

    #[test]
    fn removes_bracketed_audio_cues() {
        assert_eq!(
            clean_audio_cues("Hello [BOTH LAUGH] there [PAUSE]."),
            "Hello there ."
        );
    }

    #[test]
    fn strips_markdown_emphasis_and_code() {
        assert_eq!(
            clean_audio_cues("This is *important* and **very** much `code`."),
            "This is important and very much code."
        );
        assert_eq!(clean_audio_cues("a ** b *** c"), "a b c");
    }

    #[test]
    fn strips_leading_speaker_labels() {
        assert_eq!(
            clean_audio_cues("ALEX: Hi there.\nSAM: Hello Alex."),
            "Hi there. Hello Alex."
        );
        // Labels only count at line starts; a colon mid-sentence survives.
        assert_eq!(clean_audio_cues("note: keep this"), "note: keep this");
    }

    #[test]
    fn collapses_ellipses_and_repeated_punctuation() {
        assert_eq!(clean_audio_cues("Well..... maybe!!! Right??"), "Well. maybe! Right?");
    }

    #[test]
    fn replaces_interruption_dashes_with_space() {
        assert_eq!(clean_audio_cues("I was--wait"), "I was wait");
    }

    #[test]
    fn removes_unspeakable_characters() {
        assert_eq!(clean_audio_cues("cost is $5 #tag a/b"), "cost is 5 tag ab");
    }

    #[test]
    fn empty_input_yields_fallback_text() {
        assert_eq!(clean_audio_cues(""), EMPTY_TEXT_FALLBACK);
        assert_eq!(clean_audio_cues("[MUSIC] ***"), EMPTY_TEXT_FALLBACK);
    }

    #[test]
    fn sanitizes_titles_for_the_filesystem() {
        assert_eq!(sanitize_filename("My Great Episode!"), "my-great-episode");
        assert_eq!(sanitize_filename("  spaced   out  "), "spaced-out");
        let long = "x".repeat(80);
        assert_eq!(sanitize_filename(&long).len(), 50);
    }
}
