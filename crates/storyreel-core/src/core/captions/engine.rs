//! Caption Synthesis Engine
//!
//! Converts a [`WordTimeline`] and a style selection into a [`SubtitleTrack`].
//! Pure and deterministic: the same inputs always produce the same bytes.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::ass::{escape_ass_text, karaoke_units, SubtitleEvent, SubtitleTrack};
use super::styles::{CaptionFont, CaptionStyleConfig, CaptionStyleName, RenderStrategy};
use super::timeline::{WordChunk, WordTimeline};
use crate::core::{Dimensions, TimeMs};

/// Silence between words longer than this becomes its own fill segment
pub const DEFAULT_GAP_THRESHOLD_MS: TimeMs = 50;
/// How long a karaoke chunk stays on screen after its last word
pub const CHUNK_TAIL_MS: TimeMs = 100;
/// How long the final pop word stays on screen after it is spoken
pub const POP_TAIL_MS: TimeMs = 50;
/// Initial scale of a popped word, in percent
pub const POP_SCALE_PERCENT: u32 = 130;
/// Duration of the scale-down to 100%
pub const POP_SCALE_MS: TimeMs = 100;
/// When the highlight-to-primary color flash begins
pub const COLOR_FLASH_START_MS: TimeMs = 80;
/// Latest point at which the color flash ends
pub const COLOR_FLASH_MAX_MS: TimeMs = 300;

/// Tunable timing knobs for synthesis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTiming {
    pub gap_threshold_ms: TimeMs,
    pub canvas: Dimensions,
}

impl Default for CaptionTiming {
    fn default() -> Self {
        Self {
            gap_threshold_ms: DEFAULT_GAP_THRESHOLD_MS,
            canvas: Dimensions::vertical_1080p(),
        }
    }
}

/// Synthesizes a subtitle track with the default timing.
pub fn synthesize(
    timeline: &WordTimeline,
    style: CaptionStyleName,
    font: CaptionFont,
) -> SubtitleTrack {
    synthesize_with(timeline, style, font, &CaptionTiming::default())
}

/// Synthesizes a subtitle track.
///
/// An empty timeline yields a header-only track.
pub fn synthesize_with(
    timeline: &WordTimeline,
    style: CaptionStyleName,
    font: CaptionFont,
    timing: &CaptionTiming,
) -> SubtitleTrack {
    let config = style.config();

    let events = match config.strategy {
        RenderStrategy::ChunkedKaraoke => karaoke_events(timeline, config, timing),
        RenderStrategy::PerWordPop { color_flash } => pop_events(timeline, config, color_flash),
    };

    SubtitleTrack {
        style,
        font,
        canvas: timing.canvas,
        events,
    }
}

// =============================================================================
// Chunked karaoke
// =============================================================================

fn karaoke_events(
    timeline: &WordTimeline,
    config: &CaptionStyleConfig,
    timing: &CaptionTiming,
) -> Vec<SubtitleEvent> {
    timeline
        .chunks(config.words_per_chunk)
        .into_iter()
        .map(|chunk| SubtitleEvent {
            start_ms: chunk.start_ms,
            end_ms: chunk.end_ms.saturating_add(CHUNK_TAIL_MS),
            markup: karaoke_markup(&chunk, timing.gap_threshold_ms),
        })
        .collect()
}

/// `{\kfN}word` per word; long silences become `{\kfG} ` segments.
fn karaoke_markup(chunk: &WordChunk<'_>, gap_threshold_ms: TimeMs) -> String {
    let mut out = String::new();

    for (index, word) in chunk.words.iter().enumerate() {
        if index > 0 {
            let prev_end = chunk.words[index - 1].end_ms();
            let gap = word.offset_ms.saturating_sub(prev_end);
            if gap > gap_threshold_ms {
                let _ = write!(out, "{{\\kf{}}} ", karaoke_units(gap));
            } else {
                out.push(' ');
            }
        }
        let _ = write!(
            out,
            "{{\\kf{}}}{}",
            karaoke_units(word.duration_ms),
            escape_ass_text(&word.text)
        );
    }

    out
}

// =============================================================================
// Per-word pop
// =============================================================================

fn pop_events(
    timeline: &WordTimeline,
    config: &CaptionStyleConfig,
    color_flash: bool,
) -> Vec<SubtitleEvent> {
    let words = timeline.words();

    words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            let end_ms = match words.get(index + 1) {
                Some(next) => next.offset_ms,
                None => word.end_ms().saturating_add(POP_TAIL_MS),
            };

            let mut markup = format!(
                "{{\\fscx{scale}\\fscy{scale}\\t(0,{ms},\\fscx100\\fscy100)",
                scale = POP_SCALE_PERCENT,
                ms = POP_SCALE_MS
            );
            if color_flash {
                let _ = write!(
                    markup,
                    "\\c{}\\t({},{},\\c{})",
                    config.highlight_color.to_ass_color(),
                    COLOR_FLASH_START_MS,
                    color_flash_end_ms(word.duration_ms),
                    config.primary_color.to_ass_color()
                );
            }
            markup.push('}');
            markup.push_str(&sanitize_display_text(&word.text).to_uppercase());

            SubtitleEvent {
                start_ms: word.offset_ms,
                end_ms,
                markup,
            }
        })
        .collect()
}

/// `min(300, round(0.6 * duration))`, never before the flash starts
fn color_flash_end_ms(duration_ms: TimeMs) -> TimeMs {
    (duration_ms.saturating_mul(6).saturating_add(5) / 10)
        .min(COLOR_FLASH_MAX_MS)
        .max(COLOR_FLASH_START_MS)
}

/// Keeps only letters and digits (any script)
pub fn sanitize_display_text(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::timeline::WordBoundary;

    fn timeline(spec: &[(&str, u64, u64)]) -> WordTimeline {
        WordTimeline::new(
            spec.iter()
                .map(|(t, o, d)| WordBoundary::new(*t, *o, *d))
                .collect(),
        )
        .unwrap()
    }

    fn sample() -> WordTimeline {
        timeline(&[
            ("Once", 0, 300),
            ("upon", 320, 250),
            ("a", 700, 100),
            ("time,", 810, 400),
            ("there", 1_500, 200),
        ])
    }

    #[test]
    fn test_sanitize_display_text() {
        assert_eq!(sanitize_display_text("Don't!! panic..."), "Dontpanic");
        assert_eq!(sanitize_display_text("café 42🔥"), "café42");
        assert_eq!(sanitize_display_text("..."), "");
    }

    #[test]
    fn test_karaoke_chunks_and_gaps() {
        let track = synthesize(&sample(), CaptionStyleName::Classic, CaptionFont::Impact);
        assert_eq!(track.events.len(), 2);

        let first = &track.events[0];
        assert_eq!(first.start_ms, 0);
        assert_eq!(first.end_ms, 1_210 + CHUNK_TAIL_MS);
        // 20ms gap is a plain space, 130ms gap gets its own fill, 10ms is a space
        assert_eq!(
            first.markup,
            "{\\kf30}Once {\\kf25}upon{\\kf13} {\\kf10}a {\\kf40}time,"
        );

        let second = &track.events[1];
        assert_eq!(second.start_ms, 1_500);
        assert_eq!(second.end_ms, 1_800);
        assert_eq!(second.markup, "{\\kf20}there");
    }

    #[test]
    fn test_karaoke_gap_threshold_is_tunable() {
        let timing = CaptionTiming {
            gap_threshold_ms: 200,
            ..Default::default()
        };
        let track = synthesize_with(
            &sample(),
            CaptionStyleName::Classic,
            CaptionFont::Impact,
            &timing,
        );
        assert!(!track.events[0].markup.contains("{\\kf13} "));
    }

    #[test]
    fn test_karaoke_fill_reproduces_word_durations() {
        let words = timeline(&[
            ("a", 0, 1),
            ("b", 5, 14),
            ("c", 40, 333),
            ("d", 400, 1_007),
            ("e", 1_500, 95),
            ("f", 1_600, 4),
        ]);
        let track = synthesize(&words, CaptionStyleName::Subtitle, CaptionFont::Impact);
        assert_eq!(track.events.len(), 1);

        let fills: Vec<u64> = track.events[0]
            .markup
            .split("{\\kf")
            .skip(1)
            .filter_map(|part| {
                let (units, rest) = part.split_once('}')?;
                // Gap segments carry only a space
                if rest.trim().is_empty() {
                    return None;
                }
                units.parse::<u64>().ok()
            })
            .collect();

        assert_eq!(fills.len(), words.len());
        for (word, units) in words.words().iter().zip(fills) {
            let diff = (units * 10).abs_diff(word.duration_ms);
            assert!(diff <= 10, "{:?} -> {} units", word, units);
        }
    }

    #[test]
    fn test_chunks_cover_every_word_once() {
        let words = sample();
        for style in [CaptionStyleName::Classic, CaptionStyleName::Subtitle] {
            let track = synthesize(&words, style, CaptionFont::ArialBlack);
            let fills: usize = track
                .events
                .iter()
                .map(|e| e.markup.matches("{\\kf").count() - e.markup.matches("} ").count())
                .sum();
            assert_eq!(fills, words.len(), "style {}", style);
            assert!(track
                .events
                .windows(2)
                .all(|p| p[0].start_ms <= p[1].start_ms));
        }
    }

    #[test]
    fn test_pop_one_event_per_word() {
        let words = sample();
        let track = synthesize(&words, CaptionStyleName::Bold, CaptionFont::Impact);
        assert_eq!(track.events.len(), words.len());

        for (event, word) in track.events.iter().zip(words.words()) {
            assert_eq!(event.start_ms, word.offset_ms);
        }
        assert!(track.events.windows(2).all(|p| p[0].start_ms < p[1].start_ms));
        // Adjacent events touch without overlapping
        for pair in track.events.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        assert_eq!(track.events[4].end_ms, 1_500 + 200 + POP_TAIL_MS);
    }

    #[test]
    fn test_pop_markup_with_color_flash() {
        let words = timeline(&[("Don't!!", 0, 400), ("go", 400, 1_000), ("x", 1_400, 50)]);
        let track = synthesize(&words, CaptionStyleName::Bold, CaptionFont::Impact);

        assert_eq!(
            track.events[0].markup,
            "{\\fscx130\\fscy130\\t(0,100,\\fscx100\\fscy100)\
             \\c&H001478FF\\t(80,240,\\c&H00FFFFFF)}DONT"
        );
        // 0.6 * 1000 is capped at 300
        assert!(track.events[1].markup.contains("\\t(80,300,"));
        // 0.6 * 50 = 30 is held at the flash start
        assert!(track.events[2].markup.contains("\\t(80,80,"));
    }

    #[test]
    fn test_static_color_style_skips_transition() {
        let track = synthesize(&sample(), CaptionStyleName::Outline, CaptionFont::Impact);
        assert_eq!(track.events.len(), 5);
        assert_eq!(
            track.events[3].markup,
            "{\\fscx130\\fscy130\\t(0,100,\\fscx100\\fscy100)}TIME"
        );
        assert!(track.events.iter().all(|e| !e.markup.contains("\\c")));
    }

    #[test]
    fn test_symbol_only_word_keeps_its_slot() {
        let words = timeline(&[("!!!", 0, 100), ("ok", 100, 100)]);
        let track = synthesize(&words, CaptionStyleName::Bold, CaptionFont::Impact);
        assert_eq!(track.events.len(), 2);
        assert!(track.events[0].markup.ends_with('}'));
    }

    #[test]
    fn test_empty_timeline_yields_header_only() {
        for style in CaptionStyleName::ALL {
            let track = synthesize(&WordTimeline::empty(), style, CaptionFont::Montserrat);
            assert!(track.is_empty());
            let text = track.to_ass();
            assert!(text.contains("[Events]"));
            assert!(!text.contains("Dialogue:"));
            assert!(text.contains("Style: Default,Montserrat,"));
        }
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let words = sample();
        for style in CaptionStyleName::ALL {
            let a = synthesize(&words, style, CaptionFont::ComicSansMs).to_ass();
            let b = synthesize(&words, style, CaptionFont::ComicSansMs).to_ass();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_karaoke_text_is_escaped() {
        let words = timeline(&[("{evil}", 0, 100)]);
        let track = synthesize(&words, CaptionStyleName::Classic, CaptionFont::Impact);
        assert_eq!(track.events[0].markup, "{\\kf10}(evil)");
    }

    #[test]
    fn test_pop_words_sharing_an_offset() {
        let words = timeline(&[("one", 200, 150), ("two", 200, 100), ("three", 400, 120)]);
        for style in [CaptionStyleName::Bold, CaptionStyleName::Outline] {
            let track = synthesize(&words, style, CaptionFont::Impact);
            assert_eq!(track.events.len(), words.len());

            // The first word is replaced immediately by the second
            assert_eq!(track.events[0].start_ms, 200);
            assert_eq!(track.events[0].end_ms, 200);
            assert_eq!(track.events[1].start_ms, 200);
            assert_eq!(track.events[1].end_ms, 400);
            assert!(track.events[0].markup.ends_with("ONE"));
        }
    }

    #[test]
    fn test_timing_near_the_ceiling() {
        use crate::core::captions::timeline::MAX_TIMELINE_MS;

        let words = timeline(&[("late", MAX_TIMELINE_MS - 1_000, 1_000)]);
        for style in CaptionStyleName::ALL {
            let track = synthesize(&words, style, CaptionFont::Impact);
            assert_eq!(track.events.len(), 1);
            assert!(track.events[0].end_ms > MAX_TIMELINE_MS);
            assert!(track.to_ass().contains("Dialogue: 0,23:59:59.00,24:00:00."));
        }
        assert_eq!(color_flash_end_ms(u64::MAX), COLOR_FLASH_MAX_MS);
    }
}
