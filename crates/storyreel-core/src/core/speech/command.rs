//! External TTS program runner

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::{Captures, Regex};

use super::{take_word_sidecar, SpeechRequest, SpeechSettings, SpeechSynthesizer};
use crate::core::captions::WordBoundary;
use crate::core::process::{piped_command, tail_lines};
use crate::core::{CoreError, CoreResult};

fn placeholder_re() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\{(text|audio|voice|lang|rate|pitch|volume)\}")
            .expect("placeholder regex should compile")
    })
}

/// Substitutes request values into an argument template.
///
/// Placeholders: `{text}`, `{audio}`, `{voice}`, `{lang}`, `{rate}`,
/// `{pitch}`, `{volume}`. Substitution is single-pass, so placeholder-like
/// text inside the story is left alone.
pub fn expand_args(template: &[String], request: &SpeechRequest, audio_out: &Path) -> Vec<String> {
    let audio = audio_out.to_string_lossy();

    let re = placeholder_re();

    template
        .iter()
        .map(|arg| {
            re.replace_all(arg, |caps: &Captures<'_>| match &caps[1] {
                "text" => request.text.clone(),
                "audio" => audio.to_string(),
                "voice" => request.voice.clone(),
                "lang" => request.language().to_string(),
                "rate" => request.rate.clone(),
                "pitch" => request.pitch.clone(),
                "volume" => request.volume.clone(),
                other => other.to_string(),
            })
            .into_owned()
        })
        .collect()
}

/// Runs a configurable text-to-speech program
#[derive(Clone, Debug)]
pub struct CommandSynthesizer {
    settings: SpeechSettings,
}

impl CommandSynthesizer {
    pub fn new(settings: SpeechSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SpeechSettings {
        &self.settings
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        audio_out: &Path,
    ) -> CoreResult<Vec<WordBoundary>> {
        request.validate()?;

        if let Some(parent) = audio_out.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = expand_args(&self.settings.args, request, audio_out);
        tracing::info!(
            program = %self.settings.program,
            voice = %request.voice,
            chars = request.text.chars().count(),
            "synthesizing narration"
        );

        let mut cmd = piped_command(Path::new(&self.settings.program));
        cmd.args(&args);

        let timeout = Duration::from_secs(self.settings.timeout_sec.max(1));
        // Dropping the output future on timeout kills the child (kill_on_drop).
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::Synthesis(format!(
                    "Speech program '{}' not found",
                    self.settings.program
                )));
            }
            Ok(Err(err)) => {
                return Err(CoreError::Synthesis(format!(
                    "Failed to run speech program: {}",
                    err
                )));
            }
            Err(_) => {
                return Err(CoreError::Synthesis(format!(
                    "Speech program timed out after {}s",
                    timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::Synthesis(format!(
                "Speech program exited with {}: {}",
                output.status,
                tail_lines(&stderr, 10)
            )));
        }

        let audio_len = tokio::fs::metadata(audio_out)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if audio_len == 0 {
            return Err(CoreError::Synthesis(format!(
                "Speech program produced no audio at {}",
                audio_out.display()
            )));
        }

        let words = take_word_sidecar(audio_out, &self.settings.words_suffix);
        tracing::info!(words = words.len(), bytes = audio_len, "narration ready");

        Ok(words)
    }
}
