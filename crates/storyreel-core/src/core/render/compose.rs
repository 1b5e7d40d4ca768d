//! Composition Orchestrator
//!
//! Freezes the parameters of the final render and builds the renderer
//! invocation. Filter and argument order matter:
//!
//! 1. input-side seek into the background
//! 2. loop the background indefinitely
//! 3. scale to cover the canvas, then crop the sides
//! 4. burn in the subtitle track
//! 5. take audio only from the narration
//! 6. encode and hard-trim to `ceil(duration) + buffer`
//! 7. move the index to the front for streaming

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{MediaRenderer, RenderControl};
use crate::core::{ffmpeg::RenderSettings, CoreError, CoreResult, Dimensions, TimeSec};

/// Frozen parameters handed to the renderer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionSpec {
    pub background_path: PathBuf,
    pub audio_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub output_path: PathBuf,
    /// Seconds into the background clip at which reading starts
    pub start_offset_sec: TimeSec,
    /// Authoritative narration length after reconciliation
    pub target_duration_sec: TimeSec,
    pub dimensions: Dimensions,
    pub encode: RenderSettings,
}

/// Total output length: narration rounded up plus the trim buffer
pub fn trim_duration(spec: &CompositionSpec) -> TimeSec {
    spec.target_duration_sec.ceil() + spec.encode.trim_buffer_sec
}

/// Escapes a path for use inside a quoted filter argument
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "'\\''")
}

/// Scale-to-cover, center crop of the sides, then the burned-in subtitles
pub fn video_filter(spec: &CompositionSpec) -> String {
    let Dimensions { width, height } = spec.dimensions;
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}:(iw-{w})/2:0,ass='{ass}'",
        w = width,
        h = height,
        ass = escape_filter_path(&spec.subtitle_path)
    )
}

/// Full ffmpeg argument list for a composition
pub fn build_compose_args(spec: &CompositionSpec) -> Vec<String> {
    let encode = &spec.encode;
    let mut args: Vec<String> = Vec::with_capacity(40);

    args.push("-hide_banner".to_string());

    // Background: seek first, then loop
    args.extend([
        "-ss".to_string(),
        format!("{:.3}", spec.start_offset_sec.max(0.0)),
        "-stream_loop".to_string(),
        "-1".to_string(),
        "-i".to_string(),
        spec.background_path.to_string_lossy().to_string(),
    ]);

    // Narration
    args.extend(["-i".to_string(), spec.audio_path.to_string_lossy().to_string()]);

    args.extend([
        "-vf".to_string(),
        video_filter(spec),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
    ]);

    args.extend([
        "-c:v".to_string(),
        encode.video_codec.clone(),
        "-preset".to_string(),
        encode.preset.clone(),
        "-crf".to_string(),
        encode.crf.to_string(),
        "-c:a".to_string(),
        encode.audio_codec.clone(),
        "-b:a".to_string(),
        encode.audio_bitrate.clone(),
        "-shortest".to_string(),
        "-t".to_string(),
        format!("{:.3}", trim_duration(spec)),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-y".to_string(),
        spec.output_path.to_string_lossy().to_string(),
    ]);

    args
}

/// Validates a [`CompositionSpec`] and hands it to the renderer
#[derive(Clone)]
pub struct Compositor {
    renderer: Arc<dyn MediaRenderer>,
}

impl Compositor {
    pub fn new(renderer: Arc<dyn MediaRenderer>) -> Self {
        Self { renderer }
    }

    /// Renders `spec`. No automatic retries.
    pub async fn compose(
        &self,
        spec: &CompositionSpec,
        mut control: RenderControl,
    ) -> CoreResult<PathBuf> {
        validate_spec(spec)?;

        if let Some(parent) = spec.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if control.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        tracing::info!(
            background = %spec.background_path.display(),
            output = %spec.output_path.display(),
            start_offset_sec = spec.start_offset_sec,
            duration_sec = trim_duration(spec),
            dimensions = %spec.dimensions,
            "composing video"
        );

        let output = self.renderer.render(spec, control).await?;

        if !output.exists() {
            return Err(CoreError::Composition(format!(
                "Renderer reported success but {} was not written",
                output.display()
            )));
        }

        Ok(output)
    }
}

fn validate_spec(spec: &CompositionSpec) -> CoreResult<()> {
    for (label, path) in [
        ("Background clip", &spec.background_path),
        ("Narration audio", &spec.audio_path),
        ("Subtitle track", &spec.subtitle_path),
    ] {
        if !path.exists() {
            return Err(CoreError::NotFound(format!(
                "{} not found: {}",
                label,
                path.display()
            )));
        }
    }

    if !spec.target_duration_sec.is_finite() || spec.target_duration_sec <= 0.0 {
        return Err(CoreError::Validation(format!(
            "Target duration must be positive, got {}",
            spec.target_duration_sec
        )));
    }

    if spec.dimensions.width == 0 || spec.dimensions.height == 0 {
        return Err(CoreError::Validation(format!(
            "Invalid output dimensions {}",
            spec.dimensions
        )));
    }

    Ok(())
}
