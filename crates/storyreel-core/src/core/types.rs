//! Storyreel Core Type Definitions
//!
//! Defines fundamental types used throughout the project.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Render job unique identifier (`reel_` + ULID)
pub type JobId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Time in milliseconds (integer)
pub type TimeMs = u64;

/// Output frame dimensions in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Creates new dimensions
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Full-HD portrait canvas used for short-form video
    pub const fn vertical_1080p() -> Self {
        Self::new(1080, 1920)
    }

    /// Whether the frame is taller than it is wide
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::vertical_1080p()
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_1080p() {
        let dims = Dimensions::default();
        assert_eq!(dims, Dimensions::new(1080, 1920));
        assert!(dims.is_portrait());
        assert_eq!(dims.to_string(), "1080x1920");
    }
}
