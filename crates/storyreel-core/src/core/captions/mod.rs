//! Captions Module
//!
//! Word timing model, caption style table and the synthesis engine that
//! turns narration timing into a burned-in ASS subtitle track.

pub mod ass;
mod engine;
pub mod styles;
mod timeline;

pub use ass::{format_ass_time, SubtitleEvent, SubtitleTrack};
pub use engine::{
    sanitize_display_text, synthesize, synthesize_with, CaptionTiming, CHUNK_TAIL_MS,
    DEFAULT_GAP_THRESHOLD_MS, POP_TAIL_MS,
};
pub use styles::{
    Alignment, CaptionFont, CaptionStyleConfig, CaptionStyleName, Color, RenderStrategy,
};
pub use timeline::{WordBoundary, WordChunk, WordTimeline};
