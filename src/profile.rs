//! Voice profiles and the read-only registry.
//!
//! A profile bundles everything one synthesis request needs to know about a
//! voice: which backend, which engine-specific voice selector, and the
//! base language/speed/pitch. The registry is built once at startup and never
//! mutated afterwards; per-segment voice switching happens by passing a
//! different profile reference with the request, not by swapping registry
//! state.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::engines::Backend;
use crate::error::TtsError;

/// Name of the profile every unknown lookup falls back to.
pub const DEFAULT_PROFILE: &str = "default";

/// Named bundle of synthesis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Human-readable display name.
    pub name: String,
    pub backend: Backend,
    /// Engine-specific voice selector: a flite/say voice name, an eSpeak
    /// variant, a piper model name, or a service TLD for the cloud engine.
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    /// Base speed multiplier; 1.0 is the engine default.
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Base pitch multiplier; only engines with a pitch control honor it.
    #[serde(default = "default_pitch")]
    pub pitch: f32,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_speed() -> f32 {
    1.0
}

fn default_pitch() -> f32 {
    1.0
}

impl VoiceProfile {
    pub fn new(
        name: &str,
        backend: Backend,
        voice: Option<&str>,
        language: &str,
        speed: f32,
        pitch: f32,
    ) -> Self {
        Self {
            name: name.to_string(),
            backend,
            voice: voice.map(str::to_string),
            language: language.to_string(),
            speed,
            pitch,
        }
    }
}

/// Immutable mapping from profile names to profiles, plus the
/// speaker-identity mapping used for conversational segments.
#[derive(Debug)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, VoiceProfile>,
    speakers: BTreeMap<String, String>,
    fallback: VoiceProfile,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::from_parts(builtin_profiles(), builtin_speakers())
    }
}

impl ProfileRegistry {
    fn from_parts(
        profiles: BTreeMap<String, VoiceProfile>,
        speakers: BTreeMap<String, String>,
    ) -> Self {
        let fallback = profiles
            .get(DEFAULT_PROFILE)
            .cloned()
            .unwrap_or_else(builtin_default_profile);
        Self {
            profiles,
            speakers,
            fallback,
        }
    }

    /// Look up a profile by name, falling back to `"default"` for unknown or
    /// empty names.
    pub fn lookup(&self, name: &str) -> &VoiceProfile {
        match self.profiles.get(name) {
            Some(profile) => profile,
            None => {
                if !name.is_empty() && name != DEFAULT_PROFILE {
                    log::debug!("unknown voice profile '{name}', using default");
                }
                &self.fallback
            }
        }
    }

    /// Resolve a conversation speaker identity to its profile.
    pub fn profile_for_speaker(&self, speaker: &str) -> &VoiceProfile {
        match self.speakers.get(speaker) {
            Some(profile_name) => self.lookup(profile_name),
            None => {
                log::debug!("no voice mapping for speaker '{speaker}', using default");
                &self.fallback
            }
        }
    }

    /// The full ordered name→profile mapping, for introspection and listing.
    pub fn list_all(&self) -> &BTreeMap<String, VoiceProfile> {
        &self.profiles
    }

    /// Build a registry from the built-ins plus JSON overrides.
    ///
    /// The document may carry a `profiles` map (merged over the built-in
    /// profiles by name) and a `speakers` map (merged over the built-in
    /// speaker mapping).
    pub fn from_json_reader(reader: impl Read) -> Result<Self, TtsError> {
        let overrides: RegistryOverrides = serde_json::from_reader(reader)
            .map_err(|e| TtsError::ProfileConfig(e.to_string()))?;

        let mut profiles = builtin_profiles();
        profiles.extend(overrides.profiles);
        let mut speakers = builtin_speakers();
        speakers.extend(overrides.speakers);

        for (speaker, profile_name) in &speakers {
            if !profiles.contains_key(profile_name) {
                log::warn!(
                    "speaker '{speaker}' maps to unknown profile '{profile_name}'; \
                     lookups will fall back to default"
                );
            }
        }

        Ok(Self::from_parts(profiles, speakers))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RegistryOverrides {
    #[serde(default)]
    profiles: BTreeMap<String, VoiceProfile>,
    #[serde(default)]
    speakers: BTreeMap<String, String>,
}

fn builtin_default_profile() -> VoiceProfile {
    VoiceProfile::new("Default", Backend::Flite, Some("slt"), "en", 1.0, 1.0)
}

fn builtin_profiles() -> BTreeMap<String, VoiceProfile> {
    let on_macos = cfg!(target_os = "macos");
    let mut m = BTreeMap::new();

    m.insert(DEFAULT_PROFILE.to_string(), builtin_default_profile());
    m.insert(
        "narrator_male".to_string(),
        VoiceProfile::new("Professional Male Narrator", Backend::Flite, Some("rms"), "en", 0.9, 0.8),
    );
    m.insert(
        "narrator_female".to_string(),
        VoiceProfile::new(
            "Professional Female Narrator",
            Backend::Flite,
            Some("slt"),
            "en",
            0.85,
            1.1,
        ),
    );

    // Conversation hosts get the best engine the platform offers.
    m.insert(
        "alex_female".to_string(),
        if on_macos {
            VoiceProfile::new("Alex - Curious Female Host", Backend::Say, Some("Samantha"), "en-US", 0.8, 1.0)
        } else {
            VoiceProfile::new("Alex - Curious Female Host", Backend::Flite, Some("slt"), "en-US", 0.8, 1.0)
        },
    );
    m.insert(
        "sam_male".to_string(),
        if on_macos {
            VoiceProfile::new("Sam - Knowledgeable Male Expert", Backend::Say, Some("Alex"), "en-US", 0.75, 1.0)
        } else {
            VoiceProfile::new("Sam - Knowledgeable Male Expert", Backend::Flite, Some("rms"), "en-US", 0.75, 1.0)
        },
    );

    m.insert(
        "say_alex".to_string(),
        VoiceProfile::new("macOS Alex", Backend::Say, Some("Alex"), "en", 0.85, 1.0),
    );

    m.insert(
        "piper_female".to_string(),
        VoiceProfile::new(
            "Piper Female - High Quality Offline",
            Backend::Piper,
            Some("en_US-amy-medium"),
            "en-US",
            0.8,
            1.0,
        ),
    );
    m.insert(
        "piper_male".to_string(),
        VoiceProfile::new(
            "Piper Male - High Quality Offline",
            Backend::Piper,
            Some("en_US-ryan-medium"),
            "en-US",
            0.75,
            1.0,
        ),
    );

    m.insert(
        "espeak_female".to_string(),
        VoiceProfile::new("eSpeak Female - Lightweight Offline", Backend::Espeak, Some("en+f3"), "en", 0.85, 1.1),
    );
    m.insert(
        "espeak_male".to_string(),
        VoiceProfile::new("eSpeak Male - Lightweight Offline", Backend::Espeak, Some("en+m3"), "en", 0.8, 0.9),
    );

    m.insert(
        "gtts_default".to_string(),
        VoiceProfile::new("Google TTS Default", Backend::Gtts, None, "en", 0.8, 1.0),
    );
    m.insert(
        "gtts_british".to_string(),
        VoiceProfile::new("Google TTS British", Backend::Gtts, Some("co.uk"), "en", 0.8, 1.0),
    );

    m
}

fn builtin_speakers() -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("alex".to_string(), "alex_female".to_string());
    m.insert("sam".to_string(), "sam_male".to_string());
    m.insert("narrator".to_string(), DEFAULT_PROFILE.to_string());
    // Shared segments (laughter, joint lines) use the neutral voice.
    m.insert("both".to_string(), DEFAULT_PROFILE.to_string());
    m
}
