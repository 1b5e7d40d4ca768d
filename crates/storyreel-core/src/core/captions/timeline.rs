//! Word Timeline Model
//!
//! Narration timing as produced by the speech collaborator: an ordered
//! sequence of word boundaries, validated once on construction and
//! immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::core::{CoreError, CoreResult, TimeMs};

/// Latest millisecond a word may end at (24 hours)
pub const MAX_TIMELINE_MS: TimeMs = 24 * 60 * 60 * 1000;

/// When one narrated word starts and how long it is spoken
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordBoundary {
    /// Word as spoken (may carry punctuation)
    pub text: String,
    /// Milliseconds from the start of the narration
    #[serde(alias = "offset")]
    pub offset_ms: TimeMs,
    /// Spoken length in milliseconds (at least 1)
    #[serde(alias = "duration")]
    pub duration_ms: TimeMs,
}

impl WordBoundary {
    /// Creates a new word boundary
    pub fn new(text: impl Into<String>, offset_ms: TimeMs, duration_ms: TimeMs) -> Self {
        Self {
            text: text.into(),
            offset_ms,
            duration_ms,
        }
    }

    /// Millisecond at which the word stops being spoken
    pub fn end_ms(&self) -> TimeMs {
        self.offset_ms.saturating_add(self.duration_ms)
    }
}

/// Validated, ordered word timing for one narration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<WordBoundary>", into = "Vec<WordBoundary>")]
pub struct WordTimeline {
    words: Vec<WordBoundary>,
}

impl WordTimeline {
    /// Validates and wraps a word sequence.
    ///
    /// Fails if any word lasts less than 1 ms, ends after
    /// [`MAX_TIMELINE_MS`], or if offsets ever decrease.
    pub fn new(words: Vec<WordBoundary>) -> CoreResult<Self> {
        for (index, word) in words.iter().enumerate() {
            if word.duration_ms < 1 {
                return Err(CoreError::InvalidTimeline(format!(
                    "word {} ({:?}) has zero duration",
                    index, word.text
                )));
            }
            match word.offset_ms.checked_add(word.duration_ms) {
                Some(end) if end <= MAX_TIMELINE_MS => {}
                _ => {
                    return Err(CoreError::InvalidTimeline(format!(
                        "word {} ({:?}) ends past {}ms",
                        index, word.text, MAX_TIMELINE_MS
                    )));
                }
            }
        }

        if let Some(index) = words
            .windows(2)
            .position(|pair| pair[1].offset_ms < pair[0].offset_ms)
        {
            return Err(CoreError::InvalidTimeline(format!(
                "word {} starts at {}ms, before the previous word at {}ms",
                index + 1,
                words[index + 1].offset_ms,
                words[index].offset_ms
            )));
        }

        Ok(Self { words })
    }

    /// An empty timeline (valid; renders a header-only track)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a JSON array of word boundaries and validates it
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let words: Vec<WordBoundary> = serde_json::from_str(json)?;
        Self::new(words)
    }

    pub fn words(&self) -> &[WordBoundary] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// End of the last spoken word, in milliseconds
    pub fn end_ms(&self) -> TimeMs {
        self.words.last().map(WordBoundary::end_ms).unwrap_or(0)
    }

    /// Partitions the timeline into consecutive chunks of `words_per_chunk`.
    ///
    /// The last chunk may be shorter. Chunks never overlap or skip a word.
    pub fn chunks(&self, words_per_chunk: usize) -> Vec<WordChunk<'_>> {
        self.words
            .chunks(words_per_chunk.max(1))
            .map(WordChunk::new)
            .collect()
    }
}

impl TryFrom<Vec<WordBoundary>> for WordTimeline {
    type Error = CoreError;

    fn try_from(words: Vec<WordBoundary>) -> Result<Self, Self::Error> {
        Self::new(words)
    }
}

impl From<WordTimeline> for Vec<WordBoundary> {
    fn from(timeline: WordTimeline) -> Self {
        timeline.words
    }
}

/// A contiguous group of words displayed as one caption line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WordChunk<'a> {
    pub words: &'a [WordBoundary],
    /// First word's offset
    pub start_ms: TimeMs,
    /// Last word's offset + duration
    pub end_ms: TimeMs,
}

impl<'a> WordChunk<'a> {
    fn new(words: &'a [WordBoundary]) -> Self {
        let start_ms = words.first().map(|w| w.offset_ms).unwrap_or(0);
        let end_ms = words.last().map(WordBoundary::end_ms).unwrap_or(start_ms);
        Self {
            words,
            start_ms,
            end_ms,
        }
    }
}
