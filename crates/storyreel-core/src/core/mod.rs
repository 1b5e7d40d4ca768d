//! Storyreel Core Engine
//!
//! Caption synthesis, duration reconciliation, background placement,
//! composition and the per-job lifecycle that ties them together.

pub mod captions;
pub mod ffmpeg;
pub mod jobs;
pub mod library;
pub mod pipeline;
pub mod process;
pub mod render;
pub mod settings;
pub mod speech;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
