//! Render Pipeline
//!
//! One request, one linear job:
//!
//! ```text
//! validate -> resolve background -> allocate job -> speech -> timeline
//!   -> (duration reconciliation || caption synthesis)
//!   -> probe background + pick start -> compose -> release job
//! ```
//!
//! Collaborators are injected as [`MediaRenderer`] and [`SpeechSynthesizer`]
//! trait objects. Jobs share nothing but the directory roots, so a
//! [`RenderPipeline`] can be cloned and driven concurrently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::core::{
    captions::{synthesize_with, CaptionFont, CaptionStyleName, WordBoundary, WordTimeline},
    ffmpeg::{detect_ffmpeg, FFmpegRunner},
    jobs::{JobManager, JobScope},
    library::resolve_background,
    render::{
        pick_start, reconcile, CompositionSpec, Compositor, MediaRenderer, RenderControl,
    },
    settings::AppSettings,
    speech::{sidecar_path, CommandSynthesizer, SpeechRequest, SpeechSynthesizer},
    CoreError, CoreResult, JobId, TimeSec,
};

// =============================================================================
// Requests & Outcome
// =============================================================================

/// Render from story text; speech is synthesized by the pipeline
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderRequest {
    pub story: String,
    /// File name inside the backgrounds directory
    pub background: String,
    pub voice: Option<String>,
    pub style: Option<CaptionStyleName>,
    pub font: Option<CaptionFont>,
    pub rate: Option<String>,
    pub pitch: Option<String>,
}

/// Render from narration that was already synthesized elsewhere
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarratedRenderRequest {
    /// Narration audio; copied into the job, never modified
    pub audio_path: PathBuf,
    pub words: Vec<WordBoundary>,
    pub background: String,
    #[serde(default)]
    pub style: Option<CaptionStyleName>,
    #[serde(default)]
    pub font: Option<CaptionFont>,
}

/// What a finished render produced
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutcome {
    pub job_id: JobId,
    pub output_path: PathBuf,
    pub file_name: String,
    /// Authoritative narration length after reconciliation
    pub duration_sec: TimeSec,
    pub start_offset_sec: TimeSec,
    pub was_padded: bool,
    pub word_count: usize,
    pub style: CaptionStyleName,
    pub font: CaptionFont,
    pub completed_at: DateTime<Utc>,
}

/// Everything the shared tail of the pipeline needs
struct PreparedJob {
    job: JobScope,
    background: PathBuf,
    audio: PathBuf,
    words: Vec<WordBoundary>,
    style: CaptionStyleName,
    font: CaptionFont,
}

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Clone)]
pub struct RenderPipeline {
    settings: Arc<AppSettings>,
    renderer: Arc<dyn MediaRenderer>,
    speech: Arc<dyn SpeechSynthesizer>,
    jobs: JobManager,
}

impl RenderPipeline {
    pub fn new(
        settings: AppSettings,
        renderer: Arc<dyn MediaRenderer>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let jobs = JobManager::new(&settings.paths.temp_dir, &settings.paths.output_dir);
        Self {
            settings: Arc::new(settings),
            renderer,
            speech,
            jobs,
        }
    }

    /// Production wiring: system FFmpeg and the configured TTS program
    pub fn from_settings(settings: AppSettings) -> CoreResult<Self> {
        let info = detect_ffmpeg(
            settings.ffmpeg.ffmpeg_path.as_deref(),
            settings.ffmpeg.ffprobe_path.as_deref(),
        )?;
        tracing::info!(version = %info.version, ffmpeg = %info.ffmpeg_path.display(), "using FFmpeg");

        let renderer = Arc::new(FFmpegRunner::new(info));
        let speech = Arc::new(CommandSynthesizer::new(settings.speech.clone()));
        Ok(Self::new(settings, renderer, speech))
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Synthesizes narration for `request.story` and renders the video
    pub async fn render(
        &self,
        request: RenderRequest,
        control: RenderControl,
    ) -> CoreResult<RenderOutcome> {
        if request.story.trim().is_empty() {
            return Err(CoreError::Validation("Story text is required".to_string()));
        }
        if request.background.trim().is_empty() {
            return Err(CoreError::Validation(
                "Background video is required".to_string(),
            ));
        }

        let speech_request = SpeechRequest {
            text: request.story.clone(),
            voice: request
                .voice
                .clone()
                .unwrap_or_else(|| self.settings.speech.default_voice.clone()),
            rate: request.rate.clone().unwrap_or_else(|| "default".to_string()),
            pitch: request.pitch.clone().unwrap_or_else(|| "default".to_string()),
            ..SpeechRequest::default()
        };
        speech_request.validate()?;

        let background = resolve_background(&self.settings.paths.backgrounds_dir, &request.background)?;

        let mut job = self.jobs.allocate()?;
        let span = tracing::info_span!("render_job", job_id = %job.id());

        async move {
            let audio = job.artifact(".mp3");
            job.track(sidecar_path(&audio, &self.settings.speech.words_suffix));

            tracing::info!("synthesizing speech");
            let words = self.speech.synthesize(&speech_request, &audio).await?;
            tracing::info!(words = words.len(), "speech ready");

            self.finish(
                PreparedJob {
                    job,
                    background,
                    audio,
                    words,
                    style: request.style.unwrap_or(self.settings.captions.default_style),
                    font: request.font.unwrap_or(self.settings.captions.default_font),
                },
                control,
            )
            .await
        }
        .instrument(span)
        .await
    }

    /// Renders already-synthesized narration
    pub async fn render_narrated(
        &self,
        request: NarratedRenderRequest,
        control: RenderControl,
    ) -> CoreResult<RenderOutcome> {
        if !request.audio_path.is_file() {
            return Err(CoreError::NotFound(format!(
                "Narration audio not found: {}",
                request.audio_path.display()
            )));
        }
        let background = resolve_background(&self.settings.paths.backgrounds_dir, &request.background)?;

        let mut job = self.jobs.allocate()?;
        let span = tracing::info_span!("render_job", job_id = %job.id());

        async move {
            let audio = job.artifact(&format!(".{}", audio_extension(&request.audio_path)));
            tokio::fs::copy(&request.audio_path, &audio).await?;

            self.finish(
                PreparedJob {
                    job,
                    background,
                    audio,
                    words: request.words,
                    style: request.style.unwrap_or(self.settings.captions.default_style),
                    font: request.font.unwrap_or(self.settings.captions.default_font),
                },
                control,
            )
            .await
        }
        .instrument(span)
        .await
    }

    /// Timeline -> reconcile + captions -> placement -> compose -> release.
    ///
    /// Any early return drops the job, which deletes its artifacts and the
    /// partial output.
    async fn finish(
        &self,
        prepared: PreparedJob,
        mut control: RenderControl,
    ) -> CoreResult<RenderOutcome> {
        let PreparedJob {
            mut job,
            background,
            audio,
            words,
            style,
            font,
        } = prepared;
        let settings = &self.settings;

        let timeline = WordTimeline::new(words)?;
        if timeline.is_empty() {
            tracing::warn!("no word timing available, captions will be empty");
        }

        let padded = job.artifact(&format!("_padded.{}", audio_extension(&audio)));
        let subtitle = job.artifact(".ass");
        let canvas = settings.render.dimensions();

        let reconcile_audio = reconcile(
            self.renderer.as_ref(),
            &audio,
            &padded,
            settings.render.duration(),
        );
        let write_captions = async {
            let track = synthesize_with(&timeline, style, font, &settings.captions.timing(canvas));
            tokio::fs::write(&subtitle, track.to_ass()).await?;
            tracing::info!(
                style = %style,
                font = %font,
                events = track.events.len(),
                "captions written"
            );
            Ok::<_, CoreError>(())
        };
        let (reconciled, ()) = tokio::try_join!(reconcile_audio, write_captions)?;

        if control.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let background_duration = self.renderer.probe_duration(&background).await?;
        let start_offset_sec = pick_start(
            background_duration,
            reconciled.final_duration_sec,
            &settings.placement,
        );
        tracing::info!(
            background_duration_sec = background_duration,
            start_offset_sec,
            "background placed"
        );

        let spec = CompositionSpec {
            background_path: background,
            audio_path: reconciled.audio_path.clone(),
            subtitle_path: subtitle,
            output_path: job.output_path().to_path_buf(),
            start_offset_sec,
            target_duration_sec: reconciled.final_duration_sec,
            dimensions: canvas,
            encode: settings.render.encode.clone(),
        };

        let output_path = Compositor::new(self.renderer.clone())
            .compose(&spec, control)
            .await?;

        job.commit();
        let cleanup_failures = job.release();
        if cleanup_failures > 0 {
            tracing::warn!(cleanup_failures, "some job artifacts were left behind");
        }

        let outcome = RenderOutcome {
            job_id: job.id().to_string(),
            file_name: file_name_of(&output_path),
            output_path,
            duration_sec: reconciled.final_duration_sec,
            start_offset_sec,
            was_padded: reconciled.was_padded,
            word_count: timeline.len(),
            style,
            font,
            completed_at: Utc::now(),
        };

        tracing::info!(
            output = %outcome.output_path.display(),
            elapsed_ms = (outcome.completed_at - job.created_at()).num_milliseconds(),
            "render complete"
        );

        Ok(outcome)
    }
}

fn audio_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("mp3")
        .to_ascii_lowercase()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_extension() {
        assert_eq!(audio_extension(Path::new("/a/voice.WAV")), "wav");
        assert_eq!(audio_extension(Path::new("/a/voice")), "mp3");
    }

    #[test]
    fn test_render_request_defaults() {
        let request: RenderRequest =
            serde_json::from_str(r#"{"story": "Once", "background": "clip.mp4"}"#).unwrap();
        assert_eq!(request.voice, None);
        assert_eq!(request.style, None);
    }

    #[test]
    fn test_narrated_request_parses_styles() {
        let request: NarratedRenderRequest = serde_json::from_str(
            r#"{
                "audioPath": "/tmp/voice.mp3",
                "words": [{"text": "Hi", "offsetMs": 0, "durationMs": 200}],
                "background": "clip.mp4",
                "style": "bold",
                "font": "Comic Sans MS"
            }"#,
        )
        .unwrap();
        assert_eq!(request.style, Some(CaptionStyleName::Bold));
        assert_eq!(request.font, Some(CaptionFont::ComicSansMs));
        assert_eq!(request.words.len(), 1);
    }
}
