//! Speech Module
//!
//! The speech synthesizer is an external collaborator: given narration text
//! and voice parameters it writes an audio file and reports when each word
//! is spoken. [`SpeechSynthesizer`] is the seam; [`CommandSynthesizer`] runs
//! a configurable TTS program.

mod command;
mod voices;

pub use command::{expand_args, CommandSynthesizer};
pub use voices::{filter_voices, Voice, VoiceCatalog};

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::captions::WordBoundary;
use crate::core::{CoreError, CoreResult};

/// Voice used when the request does not name one
pub const DEFAULT_VOICE: &str = "en-US-ChristopherNeural";
/// Language used when the voice name carries no locale
pub const DEFAULT_LANGUAGE: &str = "en-US";
/// Longest narration a preview speaks, in characters
pub const PREVIEW_CHARS: usize = 200;
/// Public voice list of the default speech service
pub const DEFAULT_VOICES_URL: &str = "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list?trustedclienttoken=6A5AA1D4EAFF4E9FB37E23D68491D6F4";

fn locale_re() -> &'static Regex {
    static LOCALE_RE: OnceLock<Regex> = OnceLock::new();
    LOCALE_RE.get_or_init(|| {
        Regex::new(r"^([a-z]{2}-[A-Z]{2})").expect("locale regex should compile")
    })
}

/// `default` or a signed percentage
fn percent_re() -> &'static Regex {
    static PERCENT_RE: OnceLock<Regex> = OnceLock::new();
    PERCENT_RE.get_or_init(|| {
        Regex::new(r"^(default|[+-]\d{1,3}%)$").expect("percent regex should compile")
    })
}

/// `default` or a signed offset in Hz
fn hertz_re() -> &'static Regex {
    static HERTZ_RE: OnceLock<Regex> = OnceLock::new();
    HERTZ_RE.get_or_init(|| {
        Regex::new(r"^(default|[+-]\d{1,4}Hz)$").expect("hertz regex should compile")
    })
}

// =============================================================================
// Capability
// =============================================================================

/// Text-to-speech collaborator
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Writes narration audio to `audio_out` and returns its word timing in
    /// playback order
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        audio_out: &Path,
    ) -> CoreResult<Vec<WordBoundary>>;
}

// =============================================================================
// Request
// =============================================================================

/// Narration text plus voice parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechRequest {
    pub text: String,
    /// Voice short name, e.g. `en-US-ChristopherNeural`
    pub voice: String,
    /// `default` or a signed percentage, e.g. `+10%`
    pub rate: String,
    /// `default` or a signed offset in Hz, e.g. `-5Hz`
    pub pitch: String,
    /// `default` or a signed percentage
    pub volume: String,
}

impl Default for SpeechRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            voice: DEFAULT_VOICE.to_string(),
            rate: "default".to_string(),
            pitch: "default".to_string(),
            volume: "default".to_string(),
        }
    }
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = rate.into();
        self
    }

    pub fn with_pitch(mut self, pitch: impl Into<String>) -> Self {
        self.pitch = pitch.into();
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.text.trim().is_empty() {
            return Err(CoreError::Validation("Story text is required".to_string()));
        }
        if self.voice.trim().is_empty() {
            return Err(CoreError::Validation("Voice is required".to_string()));
        }
        if !percent_re().is_match(&self.rate) {
            return Err(CoreError::Validation(format!(
                "Invalid rate '{}': expected 'default' or a signed percentage like +10%",
                self.rate
            )));
        }
        if !hertz_re().is_match(&self.pitch) {
            return Err(CoreError::Validation(format!(
                "Invalid pitch '{}': expected 'default' or a signed value like -5Hz",
                self.pitch
            )));
        }
        if !percent_re().is_match(&self.volume) {
            return Err(CoreError::Validation(format!(
                "Invalid volume '{}': expected 'default' or a signed percentage",
                self.volume
            )));
        }
        Ok(())
    }

    /// Same request cut down to the first [`PREVIEW_CHARS`] characters
    pub fn preview(mut self) -> Self {
        if let Some((end, _)) = self.text.char_indices().nth(PREVIEW_CHARS) {
            self.text.truncate(end);
        }
        self
    }

    /// Locale prefix of the voice name (`en-GB-SoniaNeural` -> `en-GB`)
    pub fn language(&self) -> &str {
        language_for_voice(&self.voice)
    }
}

pub fn language_for_voice(voice: &str) -> &str {
    locale_re()
        .captures(voice)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_LANGUAGE)
}

// =============================================================================
// Settings
// =============================================================================

/// How to invoke the external TTS program
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechSettings {
    pub program: String,
    /// Argument template; see [`expand_args`] for placeholders
    pub args: Vec<String>,
    /// Suffix appended to the audio path to find the word-timing file
    pub words_suffix: String,
    pub default_voice: String,
    pub timeout_sec: u64,
    /// Endpoint returning the JSON voice list
    pub voices_url: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: [
                "node-edge-tts",
                "-t",
                "{text}",
                "-f",
                "{audio}",
                "-v",
                "{voice}",
                "-l",
                "{lang}",
                "-r",
                "{rate}",
                "--pitch",
                "{pitch}",
                "--volume",
                "{volume}",
                "-s",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            words_suffix: ".json".to_string(),
            default_voice: DEFAULT_VOICE.to_string(),
            timeout_sec: 60,
            voices_url: DEFAULT_VOICES_URL.to_string(),
        }
    }
}

// =============================================================================
// Word Timing Sidecar
// =============================================================================

#[derive(Debug, Deserialize)]
struct SidecarEntry {
    part: String,
    start: f64,
    end: f64,
}

/// Parses `[{part, start, end}]` (milliseconds) into word boundaries
pub fn parse_word_sidecar(json: &str) -> CoreResult<Vec<WordBoundary>> {
    let entries: Vec<SidecarEntry> = serde_json::from_str(json)?;

    Ok(entries
        .into_iter()
        .map(|entry| {
            let offset_ms = entry.start.max(0.0).round() as u64;
            let duration_ms = (entry.end - entry.start).round().max(1.0) as u64;
            WordBoundary::new(entry.part.trim(), offset_ms, duration_ms)
        })
        .collect())
}

/// Path of the word-timing file written next to `audio`
pub fn sidecar_path(audio: &Path, suffix: &str) -> PathBuf {
    let mut name = audio.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Reads and removes the word-timing sidecar of `audio`.
///
/// A missing or unreadable sidecar yields no words; captions then render
/// header-only.
pub fn take_word_sidecar(audio: &Path, suffix: &str) -> Vec<WordBoundary> {
    let path = sidecar_path(audio, suffix);

    let json = match std::fs::read_to_string(&path) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "no word timing from speech program");
            return Vec::new();
        }
    };

    let words = match parse_word_sidecar(&json) {
        Ok(words) => words,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not parse word timing");
            return Vec::new();
        }
    };

    if let Err(err) = std::fs::remove_file(&path) {
        tracing::warn!(path = %path.display(), error = %err, "could not remove word timing file");
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_voice() {
        assert_eq!(language_for_voice("en-GB-SoniaNeural"), "en-GB");
        assert_eq!(language_for_voice("de-DE-KatjaNeural"), "de-DE");
        assert_eq!(language_for_voice("custom"), "en-US");
        assert_eq!(language_for_voice("EN-gb-Guy"), "en-US");
    }

    #[test]
    fn test_value_patterns_compile_once() {
        assert!(std::ptr::eq(percent_re(), percent_re()));
        assert!(percent_re().is_match("-100%"));
        assert!(!percent_re().is_match("+1000%"));
        assert!(hertz_re().is_match("+1200Hz"));
        assert!(!hertz_re().is_match("+12000Hz"));
        assert!(locale_re().is_match("pt-BR-FranciscaNeural"));
    }

    #[test]
    fn test_request_validation() {
        assert!(SpeechRequest::new("Hello").validate().is_ok());
        assert!(SpeechRequest::new("Hi")
            .with_rate("+10%")
            .with_pitch("-5Hz")
            .validate()
            .is_ok());

        assert!(matches!(
            SpeechRequest::new("   ").validate(),
            Err(CoreError::Validation(_))
        ));
        assert!(SpeechRequest::new("x").with_voice("").validate().is_err());
        assert!(SpeechRequest::new("x").with_rate("fast").validate().is_err());
        assert!(SpeechRequest::new("x").with_rate("10%").validate().is_err());
        assert!(SpeechRequest::new("x").with_pitch("+5%").validate().is_err());
    }

    #[test]
    fn test_preview_truncates_on_char_boundaries() {
        let short = SpeechRequest::new("Once upon a time").with_voice("en-GB-RyanNeural");
        assert_eq!(short.clone().preview(), short);

        let long = SpeechRequest::new("é".repeat(PREVIEW_CHARS + 50)).preview();
        assert_eq!(long.text.chars().count(), PREVIEW_CHARS);
        assert_eq!(long.text.len(), PREVIEW_CHARS * 2);
    }

    #[test]
    fn test_request_deserialize_defaults() {
        let req: SpeechRequest = serde_json::from_str(r#"{"text": "Once upon"}"#).unwrap();
        assert_eq!(req.voice, DEFAULT_VOICE);
        assert_eq!(req.rate, "default");
        assert_eq!(req.language(), "en-US");
    }

    #[test]
    fn test_parse_word_sidecar() {
        let json = r#"[
            {"part": " Once ", "start": 100, "end": 400},
            {"part": "upon", "start": 450, "end": 450},
            {"part": "a", "start": 500.4, "end": 620.6}
        ]"#;
        let words = parse_word_sidecar(json).unwrap();
        assert_eq!(words[0], WordBoundary::new("Once", 100, 300));
        assert_eq!(words[1].duration_ms, 1);
        assert_eq!(words[2], WordBoundary::new("a", 500, 120));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/job/reel_x.mp3"), ".json"),
            PathBuf::from("/tmp/job/reel_x.mp3.json")
        );
    }

    #[test]
    fn test_take_word_sidecar_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.mp3");
        let sidecar = sidecar_path(&audio, ".json");
        std::fs::write(&sidecar, r#"[{"part": "Hi", "start": 0, "end": 200}]"#).unwrap();

        let words = take_word_sidecar(&audio, ".json");
        assert_eq!(words, vec![WordBoundary::new("Hi", 0, 200)]);
        assert!(!sidecar.exists());
    }

    #[test]
    fn test_take_word_sidecar_tolerates_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.mp3");
        assert!(take_word_sidecar(&audio, ".json").is_empty());

        std::fs::write(sidecar_path(&audio, ".json"), "not json").unwrap();
        assert!(take_word_sidecar(&audio, ".json").is_empty());
    }
}
