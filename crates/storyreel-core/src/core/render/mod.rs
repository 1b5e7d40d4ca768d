//! Render Module
//!
//! Everything between a finished subtitle track and the final video:
//!
//! - `duration`: reconcile narration length against the duration policy
//! - `placement`: choose where in the background clip to start reading
//! - `compose`: freeze the composition parameters and drive the renderer
//!
//! The renderer itself sits behind [`MediaRenderer`] so the pipeline can be
//! exercised with fakes.

pub mod compose;
pub mod duration;
pub mod placement;

pub use compose::{CompositionSpec, Compositor};
pub use duration::{plan_duration, reconcile, DurationMode, DurationPlan, DurationPolicy, Reconciliation};
pub use placement::{pick_start, pick_start_with, PlacementPolicy};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::core::{ffmpeg::RenderProgress, CoreResult, TimeSec};

// =============================================================================
// Renderer Capability
// =============================================================================

/// External video/audio renderer
#[async_trait]
pub trait MediaRenderer: Send + Sync {
    /// Container duration of a media file in seconds
    async fn probe_duration(&self, path: &Path) -> CoreResult<TimeSec>;

    /// Writes `input` padded with trailing silence to exactly `duration_sec`
    async fn pad_audio(&self, input: &Path, output: &Path, duration_sec: TimeSec) -> CoreResult<()>;

    /// Runs the composition and returns the output path
    async fn render(&self, spec: &CompositionSpec, control: RenderControl) -> CoreResult<PathBuf>;
}

// =============================================================================
// Progress & Cancellation
// =============================================================================

/// Optional progress sink and cancellation signal for one render
#[derive(Debug, Default)]
pub struct RenderControl {
    pub progress_tx: Option<mpsc::Sender<RenderProgress>>,
    pub cancel_rx: Option<oneshot::Receiver<()>>,
}

impl RenderControl {
    /// No progress reporting, not cancellable
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a cancellable control and the handle that cancels it
    pub fn with_cancel() -> (Self, RenderHandle) {
        Self::default().cancellable()
    }

    /// Sends progress updates to `tx`
    pub fn with_progress(mut self, tx: mpsc::Sender<RenderProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Attaches a fresh cancellation channel
    pub fn cancellable(mut self) -> (Self, RenderHandle) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancel_rx = Some(cancel_rx);
        (
            self,
            RenderHandle {
                cancel_tx: Some(cancel_tx),
            },
        )
    }

    /// Reports progress if anyone is listening
    pub async fn report(&self, progress: RenderProgress) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(progress).await;
        }
    }

    /// Whether cancellation was already requested
    pub fn is_cancelled(&mut self) -> bool {
        match self.cancel_rx.as_mut() {
            Some(rx) => rx.try_recv().is_ok(),
            None => false,
        }
    }
}

/// Cancels the render it was created with
#[derive(Debug)]
pub struct RenderHandle {
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl RenderHandle {
    /// Requests cancellation. Returns `false` if the render already finished.
    pub fn cancel(mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_control() {
        let (mut control, handle) = RenderControl::with_cancel();
        assert!(!control.is_cancelled());
        assert!(handle.cancel());
        assert!(control.is_cancelled());
    }

    #[test]
    fn test_cancel_after_render_dropped() {
        let (control, handle) = RenderControl::with_cancel();
        drop(control);
        assert!(!handle.cancel());
    }

    #[tokio::test]
    async fn test_report_without_listener_is_noop() {
        let control = RenderControl::none();
        control
            .report(RenderProgress {
                frame: 0,
                percent: 0.0,
                time_sec: 0.0,
                speed: None,
                message: "start".to_string(),
            })
            .await;
    }

    #[tokio::test]
    async fn test_report_forwards_progress() {
        let (tx, mut rx) = mpsc::channel(4);
        let control = RenderControl::none().with_progress(tx);
        control
            .report(RenderProgress {
                frame: 10,
                percent: 50.0,
                time_sec: 45.0,
                speed: Some(2.0),
                message: "half".to_string(),
            })
            .await;
        assert_eq!(rx.recv().await.map(|p| p.frame), Some(10));
    }
}
