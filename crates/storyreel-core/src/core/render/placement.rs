//! Background Placement Selector
//!
//! Picks where in a long background clip the composition starts reading,
//! skipping the clip's intro and leaving enough footage for the output.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::TimeSec;

/// Skip this much of a clip when it is long enough to afford it
pub const DEFAULT_MIN_START_SEC: TimeSec = 120.0;
/// Footage kept in reserve past the end of the output window
pub const SAFETY_MARGIN_SEC: TimeSec = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementPolicy {
    pub min_start_sec: TimeSec,
    pub safety_margin_sec: TimeSec,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            min_start_sec: DEFAULT_MIN_START_SEC,
            safety_margin_sec: SAFETY_MARGIN_SEC,
        }
    }
}

/// Picks a start offset using the thread-local RNG.
pub fn pick_start(
    video_duration_sec: TimeSec,
    output_duration_sec: TimeSec,
    policy: &PlacementPolicy,
) -> TimeSec {
    pick_start_with(
        video_duration_sec,
        output_duration_sec,
        policy,
        &mut rand::thread_rng(),
    )
}

/// Picks a start offset from `rng`.
///
/// - clip no longer than `min_start_sec`: 0
/// - no room past `min_start_sec`: exactly `min_start_sec`
/// - otherwise a whole second in `[min_start_sec, video - output - margin)`
pub fn pick_start_with<R: Rng + ?Sized>(
    video_duration_sec: TimeSec,
    output_duration_sec: TimeSec,
    policy: &PlacementPolicy,
    rng: &mut R,
) -> TimeSec {
    let min_start = policy.min_start_sec.max(0.0);

    if !video_duration_sec.is_finite() || video_duration_sec <= min_start {
        return 0.0;
    }

    let max_start =
        min_start.max(video_duration_sec - output_duration_sec - policy.safety_margin_sec);

    if max_start <= min_start {
        return min_start;
    }

    let offset = (min_start + rng.gen::<f64>() * (max_start - min_start)).floor();
    offset.max(min_start).min(max_start)
}
