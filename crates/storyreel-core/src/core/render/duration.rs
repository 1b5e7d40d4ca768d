//! Duration Reconciler
//!
//! Decides the authoritative output duration from the narration length and
//! the configured policy, padding the narration with silence when a floor
//! applies.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::MediaRenderer;
use crate::core::{CoreError, CoreResult, TimeSec};

/// Default minimum length of a finished video, in seconds
pub const DEFAULT_MINIMUM_DURATION_SEC: TimeSec = 90.0;

/// Which reconciliation rule a product configuration uses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DurationMode {
    /// Pad short narrations with silence up to a floor
    #[default]
    MinimumFloor,
    /// Output is exactly as long as the narration
    MatchNarration,
}

/// A concrete reconciliation rule
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DurationPolicy {
    MinimumFloor { floor_sec: TimeSec },
    MatchNarration,
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self::MinimumFloor {
            floor_sec: DEFAULT_MINIMUM_DURATION_SEC,
        }
    }
}

impl DurationPolicy {
    pub fn from_mode(mode: DurationMode, floor_sec: TimeSec) -> Self {
        match mode {
            DurationMode::MinimumFloor => Self::MinimumFloor { floor_sec },
            DurationMode::MatchNarration => Self::MatchNarration,
        }
    }
}

/// What reconciliation will do, before any audio is touched
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DurationPlan {
    pub final_duration_sec: TimeSec,
    pub needs_padding: bool,
}

/// Outcome of reconciliation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub final_duration_sec: TimeSec,
    /// Audio to mux: the padded file when padding happened
    pub audio_path: PathBuf,
    pub was_padded: bool,
}

/// Pure duration decision.
///
/// Under a floor, audio at or above the floor is left alone.
pub fn plan_duration(audio_duration_sec: TimeSec, policy: DurationPolicy) -> DurationPlan {
    match policy {
        DurationPolicy::MinimumFloor { floor_sec } if audio_duration_sec < floor_sec => {
            DurationPlan {
                final_duration_sec: floor_sec,
                needs_padding: true,
            }
        }
        _ => DurationPlan {
            final_duration_sec: audio_duration_sec,
            needs_padding: false,
        },
    }
}

/// Probes `audio`, applies `policy`, and pads into `padded_out` if needed.
///
/// Padding failures are fatal; the unpadded audio is never silently used.
pub async fn reconcile(
    renderer: &dyn MediaRenderer,
    audio: &Path,
    padded_out: &Path,
    policy: DurationPolicy,
) -> CoreResult<Reconciliation> {
    let audio_duration_sec = renderer.probe_duration(audio).await?;
    if !audio_duration_sec.is_finite() || audio_duration_sec <= 0.0 {
        return Err(CoreError::Probe(format!(
            "Narration audio has no usable duration: {}",
            audio.display()
        )));
    }

    let plan = plan_duration(audio_duration_sec, policy);

    if !plan.needs_padding {
        tracing::info!(duration_sec = plan.final_duration_sec, "narration length kept");
        return Ok(Reconciliation {
            final_duration_sec: plan.final_duration_sec,
            audio_path: audio.to_path_buf(),
            was_padded: false,
        });
    }

    tracing::info!(
        audio_duration_sec,
        target_sec = plan.final_duration_sec,
        "padding narration with silence"
    );

    renderer
        .pad_audio(audio, padded_out, plan.final_duration_sec)
        .await
        .map_err(|e| match e {
            CoreError::Padding(_) => e,
            other => CoreError::Padding(other.to_string()),
        })?;

    if !padded_out.exists() {
        return Err(CoreError::Padding(format!(
            "Padded audio was not written: {}",
            padded_out.display()
        )));
    }

    Ok(Reconciliation {
        final_duration_sec: plan.final_duration_sec,
        audio_path: padded_out.to_path_buf(),
        was_padded: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::render::{CompositionSpec, RenderControl};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeRenderer {
        audio_sec: TimeSec,
        fail_padding: bool,
        padded: AtomicBool,
    }

    impl FakeRenderer {
        fn new(audio_sec: TimeSec) -> Self {
            Self {
                audio_sec,
                fail_padding: false,
                padded: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MediaRenderer for FakeRenderer {
        async fn probe_duration(&self, _path: &Path) -> CoreResult<TimeSec> {
            Ok(self.audio_sec)
        }

        async fn pad_audio(&self, _input: &Path, output: &Path, _d: TimeSec) -> CoreResult<()> {
            if self.fail_padding {
                return Err(CoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "unreadable audio",
                )));
            }
            self.padded.store(true, Ordering::SeqCst);
            std::fs::write(output, b"padded")?;
            Ok(())
        }

        async fn render(&self, spec: &CompositionSpec, _: RenderControl) -> CoreResult<PathBuf> {
            Ok(spec.output_path.clone())
        }
    }

    #[test]
    fn test_plan_pads_below_floor() {
        let policy = DurationPolicy::MinimumFloor { floor_sec: 90.0 };
        assert_eq!(
            plan_duration(40.0, policy),
            DurationPlan {
                final_duration_sec: 90.0,
                needs_padding: true
            }
        );
        assert_eq!(
            plan_duration(120.0, policy),
            DurationPlan {
                final_duration_sec: 120.0,
                needs_padding: false
            }
        );
        assert!(!plan_duration(90.0, policy).needs_padding);
    }

    #[test]
    fn test_plan_match_narration() {
        let plan = plan_duration(40.0, DurationPolicy::MatchNarration);
        assert_eq!(plan.final_duration_sec, 40.0);
        assert!(!plan.needs_padding);
    }

    #[test]
    fn test_policy_from_mode() {
        assert_eq!(
            DurationPolicy::from_mode(DurationMode::MinimumFloor, 60.0),
            DurationPolicy::MinimumFloor { floor_sec: 60.0 }
        );
        assert_eq!(
            DurationPolicy::from_mode(DurationMode::MatchNarration, 60.0),
            DurationPolicy::MatchNarration
        );
    }

    #[tokio::test]
    async fn test_reconcile_short_audio_is_padded() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.mp3");
        let padded = dir.path().join("voice_padded.mp3");
        let renderer = FakeRenderer::new(40.0);

        let result = reconcile(&renderer, &audio, &padded, DurationPolicy::default())
            .await
            .unwrap();

        assert_eq!(result.final_duration_sec, 90.0);
        assert!(result.was_padded);
        assert_eq!(result.audio_path, padded);
    }

    #[tokio::test]
    async fn test_reconcile_long_audio_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.mp3");
        let padded = dir.path().join("voice_padded.mp3");
        let renderer = FakeRenderer::new(120.0);

        let result = reconcile(&renderer, &audio, &padded, DurationPolicy::default())
            .await
            .unwrap();

        assert_eq!(result.final_duration_sec, 120.0);
        assert!(!result.was_padded);
        assert_eq!(result.audio_path, audio);
        assert!(!renderer.padded.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_padding_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FakeRenderer {
            fail_padding: true,
            ..FakeRenderer::new(10.0)
        };

        let result = reconcile(
            &renderer,
            &dir.path().join("a.mp3"),
            &dir.path().join("b.mp3"),
            DurationPolicy::default(),
        )
        .await;

        match result {
            Err(CoreError::Padding(msg)) => assert!(msg.contains("unreadable")),
            other => panic!("expected Padding error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_length_audio_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FakeRenderer::new(0.0);
        let result = reconcile(
            &renderer,
            &dir.path().join("a.mp3"),
            &dir.path().join("b.mp3"),
            DurationPolicy::MatchNarration,
        )
        .await;
        assert!(matches!(result, Err(CoreError::Probe(_))));
    }
}
