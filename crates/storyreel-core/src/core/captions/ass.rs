//! ASS (Advanced SubStation Alpha) subtitle track
//!
//! Serializes a styled caption track into the text format the renderer's
//! `ass` filter burns into the video.

use std::fmt::{self, Write as _};
use std::path::Path;

use super::styles::{CaptionFont, CaptionStyleName};
use crate::core::{CoreResult, Dimensions, TimeMs};

/// Formats milliseconds as an ASS timestamp (`H:MM:SS.CC`).
///
/// Rounds to the nearest centisecond.
pub fn format_ass_time(ms: TimeMs) -> String {
    let total_cs = ms.saturating_add(5) / 10;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;

    format!("{}:{:02}:{:02}.{:02}", hours, mins, secs, cs)
}

/// Converts milliseconds to karaoke fill units (centiseconds, at least 1)
pub fn karaoke_units(ms: TimeMs) -> u64 {
    (ms.saturating_add(5) / 10).max(1)
}

/// Replaces characters that would open or close override blocks
pub fn escape_ass_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '{' => '(',
            '}' => ')',
            '\\' => '/',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}

/// One `Dialogue:` line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubtitleEvent {
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
    /// Text including inline override tags
    pub markup: String,
}

impl SubtitleEvent {
    pub fn to_dialogue_line(&self) -> String {
        format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}",
            format_ass_time(self.start_ms),
            format_ass_time(self.end_ms),
            self.markup
        )
    }
}

/// A complete subtitle track: one style header plus ordered events
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub style: CaptionStyleName,
    pub font: CaptionFont,
    /// Script canvas (PlayResX / PlayResY)
    pub canvas: Dimensions,
    pub events: Vec<SubtitleEvent>,
}

impl SubtitleTrack {
    /// Script info, style and event format sections
    pub fn header(&self) -> String {
        let config = self.style.config();
        let mut out = String::new();

        out.push_str("[Script Info]\n");
        out.push_str("Title: Storyreel Captions\n");
        out.push_str("ScriptType: v4.00+\n");
        let _ = writeln!(out, "PlayResX: {}", self.canvas.width);
        let _ = writeln!(out, "PlayResY: {}", self.canvas.height);
        out.push_str("WrapStyle: 0\n");
        out.push_str("ScaledBorderAndShadow: yes\n");
        out.push('\n');

        out.push_str("[V4+ Styles]\n");
        out.push_str(
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
             OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, \
             ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, \
             Alignment, MarginL, MarginR, MarginV, Encoding\n",
        );
        let _ = writeln!(
            out,
            "Style: Default,{},{},{},{},{},{},{},0,0,0,100,100,{},0,1,{},{},{},40,40,{},1",
            self.font.family(),
            config.font_size,
            config.primary_color.to_ass_color(),
            config.highlight_color.to_ass_color(),
            config.outline_color.to_ass_color(),
            config.background_color.to_ass_color(),
            u8::from(config.bold),
            config.letter_spacing,
            config.outline_width,
            config.shadow_depth,
            config.alignment.ass_code(),
            config.vertical_margin,
        );
        out.push('\n');

        out.push_str("[Events]\n");
        out.push_str(
            "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
        );
        out
    }

    /// Full file contents
    pub fn to_ass(&self) -> String {
        let mut out = self.header();
        for event in &self.events {
            out.push_str(&event.to_dialogue_line());
            out.push('\n');
        }
        out
    }

    /// Writes the track to `path`
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        std::fs::write(path, self.to_ass())?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ass())
    }
}
