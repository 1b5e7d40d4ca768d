//! FFmpeg Integration Module
//!
//! The video/audio renderer behind the [`MediaRenderer`] capability:
//! - Duration probing (ffprobe)
//! - Silence padding of narration audio
//! - Final composition with burned-in subtitles
//!
//! Only system-installed FFmpeg is supported. Explicit binary paths from the
//! settings file take precedence over discovery.
//!
//! [`MediaRenderer`]: crate::core::render::MediaRenderer

mod detection;
mod runner;

pub use detection::*;
pub use runner::{
    parse_progress_line, FFmpegRunner, ProgressData, RenderProgress, RenderSettings,
};

use crate::core::CoreError;

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or set ffmpegPath in the settings file.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Cancelled")]
    Cancelled,
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;

impl From<FFmpegError> for CoreError {
    fn from(err: FFmpegError) -> Self {
        match err {
            FFmpegError::InvalidInput(msg) => CoreError::NotFound(msg),
            FFmpegError::ProbeError(msg) | FFmpegError::ParseError(msg) => CoreError::Probe(msg),
            FFmpegError::Cancelled => CoreError::Cancelled,
            other => CoreError::Composition(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_error_display() {
        let err = FFmpegError::NotFound;
        assert!(err.to_string().contains("FFmpeg not found"));

        let err = FFmpegError::ExecutionFailed("exit code 1".to_string());
        assert!(err.to_string().contains("exit code 1"));
    }

    #[test]
    fn test_ffmpeg_error_into_core_error() {
        let core: CoreError = FFmpegError::InvalidInput("missing.mp4".into()).into();
        assert!(matches!(core, CoreError::NotFound(_)));

        let core: CoreError = FFmpegError::ProbeError("bad json".into()).into();
        assert!(matches!(core, CoreError::Probe(_)));

        let core: CoreError = FFmpegError::Cancelled.into();
        assert!(matches!(core, CoreError::Cancelled));

        let core: CoreError = FFmpegError::ExecutionFailed("boom".into()).into();
        assert!(matches!(core, CoreError::Composition(_)));
    }
}
