//! FFmpeg Runner Module
//!
//! Executes ffprobe/ffmpeg for probing, silence padding and composition.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use super::{FFmpegError, FFmpegInfo, FFmpegResult};
use crate::core::{
    process::{drain_stderr, piped_command, tail_lines},
    render::{compose, CompositionSpec, MediaRenderer, RenderControl},
    CoreError, CoreResult, TimeSec,
};

/// Lines of ffmpeg stderr kept in error messages
const DIAGNOSTIC_TAIL_LINES: usize = 20;

// =============================================================================
// Settings
// =============================================================================

/// Encoder settings for the final composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderSettings {
    /// Video codec (e.g., "libx264")
    pub video_codec: String,
    /// Preset (for x264: ultrafast, superfast, fast, medium, slow)
    pub preset: String,
    /// CRF value for quality-based encoding (0-51, lower is better)
    pub crf: u8,
    /// Audio codec (e.g., "aac")
    pub audio_codec: String,
    /// Audio bitrate (e.g., "128k")
    pub audio_bitrate: String,
    /// Seconds of slack added after the rounded-up narration length
    pub trim_buffer_sec: TimeSec,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::vertical_short()
    }
}

impl RenderSettings {
    /// H.264/AAC at constant quality, the short-form default
    pub fn vertical_short() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            trim_buffer_sec: 0.5,
        }
    }

    /// Fast low-effort encode for previews
    pub fn draft() -> Self {
        Self {
            preset: "ultrafast".to_string(),
            crf: 30,
            ..Self::vertical_short()
        }
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Progress of a running composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProgress {
    /// Current frame number
    pub frame: u64,
    /// Progress percentage (0.0 - 100.0)
    pub percent: f32,
    /// Output time encoded so far
    pub time_sec: TimeSec,
    /// Speed multiplier relative to realtime
    pub speed: Option<f32>,
    /// Human readable status
    pub message: String,
}

/// Accumulated key/value state of an ffmpeg `-progress` block
#[derive(Debug, Clone, Default)]
pub struct ProgressData {
    pub frame: u64,
    pub fps: f32,
    pub time_sec: TimeSec,
    pub speed: Option<f32>,
    /// Set once ffmpeg reports `progress=end`
    pub finished: bool,
}

/// Parse one line of `-progress pipe:1` output into `data`.
///
/// Returns `true` on `progress=` lines, which close a block.
///
/// ```text
/// frame=100
/// fps=30.0
/// out_time_ms=3333333
/// speed=2.5x
/// progress=continue
/// ```
pub fn parse_progress_line(line: &str, data: &mut ProgressData) -> bool {
    let line = line.trim();

    if let Some(value) = line.strip_prefix("frame=") {
        data.frame = value.trim().parse().unwrap_or(data.frame);
    } else if let Some(value) = line.strip_prefix("fps=") {
        data.fps = value.trim().parse().unwrap_or(data.fps);
    } else if let Some(value) = line.strip_prefix("out_time_ms=") {
        // out_time_ms is in microseconds despite the name
        if let Ok(micros) = value.trim().parse::<u64>() {
            data.time_sec = micros as f64 / 1_000_000.0;
        }
    } else if let Some(value) = line.strip_prefix("speed=") {
        data.speed = value.trim().strip_suffix('x').and_then(|s| s.trim().parse().ok());
    } else if let Some(value) = line.strip_prefix("progress=") {
        data.finished = value.trim() == "end";
        return true;
    }

    false
}

fn progress_from(data: &ProgressData, total_duration_sec: TimeSec) -> RenderProgress {
    let percent = if data.finished {
        100.0
    } else if total_duration_sec > 0.0 {
        ((data.time_sec / total_duration_sec) * 100.0).clamp(0.0, 100.0) as f32
    } else {
        0.0
    };

    RenderProgress {
        frame: data.frame,
        percent,
        time_sec: data.time_sec,
        speed: data.speed,
        message: if data.finished {
            "Render complete".to_string()
        } else {
            format!("Encoding frame {} ({:.1} fps)", data.frame, data.fps)
        },
    }
}

// =============================================================================
// Runner
// =============================================================================

/// FFmpeg Runner for executing video processing commands
#[derive(Clone)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
}

impl FFmpegRunner {
    /// Create a new FFmpegRunner from detected FFmpeg installation
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    /// Get the FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// Probe a media file's container duration in seconds
    pub async fn probe_duration(&self, input: &Path) -> FFmpegResult<TimeSec> {
        ensure_input(input)?;

        let output = piped_command(&self.info.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(input)
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ProbeError(format!(
                "FFprobe failed for {}: {}",
                input.display(),
                tail_lines(&stderr, DIAGNOSTIC_TAIL_LINES)
            )));
        }

        parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
    }

    /// Append silence so the audio lasts exactly `duration_sec`.
    pub async fn pad_audio(
        &self,
        input: &Path,
        output: &Path,
        duration_sec: TimeSec,
    ) -> FFmpegResult<()> {
        ensure_input(input)?;

        let args = build_pad_args(input, output, duration_sec);
        tracing::debug!(args = ?args, "padding audio");

        let result = piped_command(&self.info.ffmpeg_path)
            .args(&args)
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(FFmpegError::ExecutionFailed(tail_lines(
                &stderr,
                DIAGNOSTIC_TAIL_LINES,
            )));
        }

        Ok(())
    }

    /// Run ffmpeg with `-progress pipe:1`, forwarding progress and honouring
    /// cancellation.
    async fn run_with_progress(
        &self,
        args: Vec<String>,
        total_duration_sec: TimeSec,
        control: RenderControl,
    ) -> FFmpegResult<()> {
        let mut cmd = piped_command(&self.info.ffmpeg_path);
        cmd.args(&args);

        let mut child = cmd.spawn().map_err(FFmpegError::ProcessError)?;
        let stderr_handle = drain_stderr(&mut child);

        let RenderControl {
            progress_tx,
            cancel_rx,
        } = control;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_progress(stdout, total_duration_sec, progress_tx));
        }

        let status = wait_or_cancel(&mut child, cancel_rx).await?;

        if !status.success() {
            let stderr_msg = match stderr_handle {
                Some(handle) => handle
                    .await
                    .unwrap_or_else(|_| "Failed to read stderr".to_string()),
                None => String::new(),
            };
            let diagnostic = tail_lines(&stderr_msg, DIAGNOSTIC_TAIL_LINES);
            return Err(FFmpegError::ExecutionFailed(if diagnostic.is_empty() {
                format!("FFmpeg exited with status: {}", status)
            } else {
                diagnostic
            }));
        }

        Ok(())
    }
}

#[async_trait]
impl MediaRenderer for FFmpegRunner {
    async fn probe_duration(&self, path: &Path) -> CoreResult<TimeSec> {
        Ok(FFmpegRunner::probe_duration(self, path).await?)
    }

    async fn pad_audio(&self, input: &Path, output: &Path, duration_sec: TimeSec) -> CoreResult<()> {
        FFmpegRunner::pad_audio(self, input, output, duration_sec)
            .await
            .map_err(|e| CoreError::Padding(e.to_string()))
    }

    async fn render(&self, spec: &CompositionSpec, control: RenderControl) -> CoreResult<PathBuf> {
        let args = compose::build_compose_args(spec);
        tracing::debug!(args = ?args, "starting composition");

        self.run_with_progress(args, compose::trim_duration(spec), control)
            .await
            .map_err(|e| match e {
                FFmpegError::Cancelled => CoreError::Cancelled,
                other => CoreError::Composition(other.to_string()),
            })?;

        Ok(spec.output_path.clone())
    }
}

fn ensure_input(input: &Path) -> FFmpegResult<()> {
    if input.exists() {
        Ok(())
    } else {
        Err(FFmpegError::InvalidInput(format!(
            "Input file does not exist: {}",
            input.display()
        )))
    }
}

/// Arguments that pad `input` with trailing silence to exactly `duration_sec`
pub(crate) fn build_pad_args(input: &Path, output: &Path, duration_sec: TimeSec) -> Vec<String> {
    let duration = format!("{:.3}", duration_sec);
    vec![
        "-hide_banner".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-af".to_string(),
        format!("apad=whole_dur={}", duration),
        "-t".to_string(),
        duration,
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

async fn wait_or_cancel(
    child: &mut tokio::process::Child,
    cancel_rx: Option<oneshot::Receiver<()>>,
) -> FFmpegResult<ExitStatus> {
    let Some(cancel_rx) = cancel_rx else {
        return child.wait().await.map_err(FFmpegError::ProcessError);
    };

    tokio::select! {
        status = child.wait() => status.map_err(FFmpegError::ProcessError),
        signal = cancel_rx => {
            if signal.is_ok() {
                tracing::info!("cancelling renderer process");
                let _ = child.kill().await;
                Err(FFmpegError::Cancelled)
            } else {
                // The handle was dropped without cancelling.
                child.wait().await.map_err(FFmpegError::ProcessError)
            }
        }
    }
}

async fn forward_progress(
    stdout: tokio::process::ChildStdout,
    total_duration_sec: TimeSec,
    progress_tx: Option<mpsc::Sender<RenderProgress>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut data = ProgressData::default();

    // Keep reading even without a listener so the pipe never fills up.
    while let Ok(Some(line)) = lines.next_line().await {
        if !parse_progress_line(&line, &mut data) {
            continue;
        }
        if let Some(tx) = &progress_tx {
            // A closed receiver just means nobody is watching anymore.
            let _ = tx.send(progress_from(&data, total_duration_sec)).await;
        }
    }
}

/// Parse the duration out of ffprobe JSON output.
///
/// Uses the container duration, falling back to the longest stream.
fn parse_probe_duration(json_str: &str) -> FFmpegResult<TimeSec> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to parse FFprobe output: {}", e)))?;

    let as_secs = |v: &serde_json::Value| -> Option<f64> {
        v.get("duration")
            .and_then(|d| d.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    };

    if let Some(duration) = json.get("format").and_then(as_secs) {
        return Ok(duration);
    }

    json.get("streams")
        .and_then(|s| s.as_array())
        .into_iter()
        .flatten()
        .filter_map(as_secs)
        .fold(None, |max: Option<f64>, d| Some(max.map_or(d, |m| m.max(d))))
        .ok_or_else(|| FFmpegError::ParseError("Could not determine media duration".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_settings_default() {
        let settings = RenderSettings::default();
        assert_eq!(settings.video_codec, "libx264");
        assert_eq!(settings.audio_codec, "aac");
        assert_eq!(settings.audio_bitrate, "128k");
        assert_eq!(settings.crf, 23);
        assert_eq!(settings.preset, "medium");
    }

    #[test]
    fn test_render_settings_draft() {
        let draft = RenderSettings::draft();
        assert_eq!(draft.preset, "ultrafast");
        assert_eq!(draft.video_codec, "libx264");
    }

    #[test]
    fn test_parse_probe_duration_from_format() {
        let json = r#"{
            "format": { "duration": "95.480000", "format_name": "mp3" },
            "streams": [ { "codec_type": "audio", "duration": "95.400000" } ]
        }"#;
        assert_eq!(parse_probe_duration(json).unwrap(), 95.48);
    }

    #[test]
    fn test_parse_probe_duration_falls_back_to_streams() {
        let json = r#"{
            "format": { "format_name": "matroska,webm" },
            "streams": [
                { "codec_type": "video", "duration": "600.5" },
                { "codec_type": "audio", "duration": "599.9" }
            ]
        }"#;
        assert_eq!(parse_probe_duration(json).unwrap(), 600.5);
    }

    #[test]
    fn test_parse_probe_duration_missing() {
        let json = r#"{ "format": { "duration": "N/A" }, "streams": [] }"#;
        assert!(matches!(
            parse_probe_duration(json),
            Err(FFmpegError::ParseError(_))
        ));
        assert!(parse_probe_duration("not json").is_err());
    }

    #[test]
    fn test_parse_progress_block() {
        let mut data = ProgressData::default();
        assert!(!parse_progress_line("frame=300", &mut data));
        assert!(!parse_progress_line("fps=60.0", &mut data));
        assert!(!parse_progress_line("out_time_ms=45000000", &mut data));
        assert!(!parse_progress_line("speed=2.5x", &mut data));
        assert!(parse_progress_line("progress=continue", &mut data));

        assert_eq!(data.frame, 300);
        assert_eq!(data.fps, 60.0);
        assert_eq!(data.time_sec, 45.0);
        assert_eq!(data.speed, Some(2.5));
        assert!(!data.finished);

        let progress = progress_from(&data, 90.0);
        assert_eq!(progress.percent, 50.0);
    }

    #[test]
    fn test_parse_progress_end() {
        let mut data = ProgressData::default();
        parse_progress_line("speed=N/A", &mut data);
        assert_eq!(data.speed, None);
        assert!(parse_progress_line("progress=end", &mut data));
        assert!(data.finished);
        assert_eq!(progress_from(&data, 90.0).percent, 100.0);
    }

    #[test]
    fn test_progress_is_clamped() {
        let data = ProgressData {
            time_sec: 120.0,
            ..Default::default()
        };
        assert_eq!(progress_from(&data, 90.0).percent, 100.0);
        assert_eq!(progress_from(&data, 0.0).percent, 0.0);
    }

    #[test]
    fn test_build_pad_args() {
        let args = build_pad_args(Path::new("/tmp/a.mp3"), Path::new("/tmp/a_padded.mp3"), 90.0);
        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-i",
                "/tmp/a.mp3",
                "-af",
                "apad=whole_dur=90.000",
                "-t",
                "90.000",
                "-y",
                "/tmp/a_padded.mp3",
            ]
        );
    }
}
