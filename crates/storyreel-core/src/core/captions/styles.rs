//! Caption Style Table
//!
//! The closed set of caption styles and fonts. Each style is a fixed
//! [`CaptionStyleConfig`] plus the rendering strategy it uses, so adding a
//! style means adding a table entry, not new control flow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::CoreError;

// =============================================================================
// Colors
// =============================================================================

/// RGBA color value (0-255 for each component)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Creates a new color from RGBA components
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color from RGB components
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);

    /// Converts to ASS color format (&HAABBGGRR, alpha 00 = opaque)
    pub fn to_ass_color(&self) -> String {
        format!(
            "&H{:02X}{:02X}{:02X}{:02X}",
            255 - self.a,
            self.b,
            self.g,
            self.r
        )
    }
}

// =============================================================================
// Layout
// =============================================================================

/// Screen anchor, using ASS numpad alignment codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Bottom third, horizontally centered
    BottomCenter,
    /// Middle of the screen
    Center,
}

impl Alignment {
    pub fn ass_code(&self) -> u8 {
        match self {
            Self::BottomCenter => 2,
            Self::Center => 5,
        }
    }
}

/// How words are turned into subtitle events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RenderStrategy {
    /// One event per chunk with a karaoke fill per word
    ChunkedKaraoke,
    /// One event per word with a scale pop-in
    PerWordPop {
        /// Flash from highlight to primary color while the word is spoken
        color_flash: bool,
    },
}

/// Immutable look of one caption style
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptionStyleConfig {
    pub font_size: u32,
    pub primary_color: Color,
    pub highlight_color: Color,
    pub outline_color: Color,
    pub background_color: Color,
    pub outline_width: u32,
    pub shadow_depth: u32,
    pub alignment: Alignment,
    pub vertical_margin: u32,
    pub words_per_chunk: usize,
    pub bold: bool,
    pub letter_spacing: u32,
    pub strategy: RenderStrategy,
}

const CLASSIC: CaptionStyleConfig = CaptionStyleConfig {
    font_size: 52,
    primary_color: Color::WHITE,
    highlight_color: Color::YELLOW,
    outline_color: Color::BLACK,
    background_color: Color::rgba(0, 0, 0, 127),
    outline_width: 5,
    shadow_depth: 2,
    alignment: Alignment::Center,
    vertical_margin: 200,
    words_per_chunk: 4,
    bold: true,
    letter_spacing: 1,
    strategy: RenderStrategy::ChunkedKaraoke,
};

const BOLD: CaptionStyleConfig = CaptionStyleConfig {
    font_size: 90,
    primary_color: Color::WHITE,
    highlight_color: Color::rgb(255, 120, 20),
    outline_color: Color::BLACK,
    background_color: Color::BLACK,
    outline_width: 6,
    shadow_depth: 3,
    alignment: Alignment::Center,
    vertical_margin: 200,
    words_per_chunk: 1,
    bold: true,
    letter_spacing: 2,
    strategy: RenderStrategy::PerWordPop { color_flash: true },
};

const SUBTITLE: CaptionStyleConfig = CaptionStyleConfig {
    font_size: 38,
    primary_color: Color::WHITE,
    highlight_color: Color::rgb(255, 204, 0),
    outline_color: Color::BLACK,
    background_color: Color::rgba(0, 0, 0, 95),
    outline_width: 3,
    shadow_depth: 1,
    alignment: Alignment::BottomCenter,
    vertical_margin: 80,
    words_per_chunk: 6,
    bold: false,
    letter_spacing: 0,
    strategy: RenderStrategy::ChunkedKaraoke,
};

const OUTLINE: CaptionStyleConfig = CaptionStyleConfig {
    font_size: 84,
    primary_color: Color::rgb(255, 230, 0),
    highlight_color: Color::rgb(255, 230, 0),
    outline_color: Color::BLACK,
    background_color: Color::BLACK,
    outline_width: 8,
    shadow_depth: 0,
    alignment: Alignment::Center,
    vertical_margin: 200,
    words_per_chunk: 1,
    bold: true,
    letter_spacing: 1,
    strategy: RenderStrategy::PerWordPop { color_flash: false },
};

// =============================================================================
// Style Names
// =============================================================================

/// Named caption style
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionStyleName {
    /// Four words at a time, karaoke fill in yellow
    #[default]
    Classic,
    /// One huge word at a time, pop-in with an orange flash
    Bold,
    /// Six words along the bottom, gold karaoke fill
    Subtitle,
    /// One word at a time in static yellow with a heavy outline
    Outline,
}

impl CaptionStyleName {
    pub const ALL: [CaptionStyleName; 4] = [
        CaptionStyleName::Classic,
        CaptionStyleName::Bold,
        CaptionStyleName::Subtitle,
        CaptionStyleName::Outline,
    ];

    pub fn config(&self) -> &'static CaptionStyleConfig {
        match self {
            Self::Classic => &CLASSIC,
            Self::Bold => &BOLD,
            Self::Subtitle => &SUBTITLE,
            Self::Outline => &OUTLINE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Bold => "bold",
            Self::Subtitle => "subtitle",
            Self::Outline => "outline",
        }
    }
}

impl fmt::Display for CaptionStyleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionStyleName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown caption style '{}'. Expected one of: classic, bold, subtitle, outline",
                    s
                ))
            })
    }
}

// =============================================================================
// Fonts
// =============================================================================

/// Caption font family
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptionFont {
    #[serde(rename = "Impact")]
    Impact,
    #[default]
    #[serde(rename = "Arial Black")]
    ArialBlack,
    #[serde(rename = "Montserrat")]
    Montserrat,
    #[serde(rename = "Comic Sans MS")]
    ComicSansMs,
}

impl CaptionFont {
    pub const ALL: [CaptionFont; 4] = [
        CaptionFont::Impact,
        CaptionFont::ArialBlack,
        CaptionFont::Montserrat,
        CaptionFont::ComicSansMs,
    ];

    /// Family name as written into the style header
    pub fn family(&self) -> &'static str {
        match self {
            Self::Impact => "Impact",
            Self::ArialBlack => "Arial Black",
            Self::Montserrat => "Montserrat",
            Self::ComicSansMs => "Comic Sans MS",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Impact => "Classic TikTok bold",
            Self::ArialBlack => "Clean and heavy",
            Self::Montserrat => "Modern and sleek",
            Self::ComicSansMs => "Casual and playful",
        }
    }
}

impl fmt::Display for CaptionFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family())
    }
}

impl FromStr for CaptionFont {
    type Err = CoreError;

    /// Accepts the family name in any case, with or without separators
    /// ("Arial Black", "arial-black", "arialblack"); "comic sans" works too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "impact" => Ok(Self::Impact),
            "arialblack" => Ok(Self::ArialBlack),
            "montserrat" => Ok(Self::Montserrat),
            "comicsansms" | "comicsans" => Ok(Self::ComicSansMs),
            _ => Err(CoreError::Validation(format!(
                "Unknown caption font '{}'. Expected one of: Impact, Arial Black, Montserrat, Comic Sans MS",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ass_colors_match_reference_values() {
        assert_eq!(Color::WHITE.to_ass_color(), "&H00FFFFFF");
        assert_eq!(Color::YELLOW.to_ass_color(), "&H0000FFFF");
        assert_eq!(Color::rgb(255, 120, 20).to_ass_color(), "&H001478FF");
        assert_eq!(Color::rgb(255, 204, 0).to_ass_color(), "&H0000CCFF");
        assert_eq!(Color::rgba(0, 0, 0, 127).to_ass_color(), "&H80000000");
        assert_eq!(Color::rgba(0, 0, 0, 95).to_ass_color(), "&HA0000000");
    }

    #[test]
    fn test_style_table() {
        let classic = CaptionStyleName::Classic.config();
        assert_eq!(classic.words_per_chunk, 4);
        assert_eq!(classic.strategy, RenderStrategy::ChunkedKaraoke);
        assert_eq!(classic.alignment.ass_code(), 5);

        let subtitle = CaptionStyleName::Subtitle.config();
        assert_eq!(subtitle.words_per_chunk, 6);
        assert_eq!(subtitle.alignment.ass_code(), 2);
        assert!(!subtitle.bold);

        let bold = CaptionStyleName::Bold.config();
        assert_eq!(bold.words_per_chunk, 1);
        assert_eq!(bold.strategy, RenderStrategy::PerWordPop { color_flash: true });

        let outline = CaptionStyleName::Outline.config();
        assert_eq!(
            outline.strategy,
            RenderStrategy::PerWordPop { color_flash: false }
        );
        assert_eq!(outline.primary_color, outline.highlight_color);
    }

    #[test]
    fn test_every_style_has_a_usable_chunk_size() {
        for style in CaptionStyleName::ALL {
            let size = style.config().words_per_chunk;
            assert!((1..=6).contains(&size), "{} has chunk size {}", style, size);
        }
    }

    #[test]
    fn test_style_name_parsing() {
        assert_eq!("classic".parse::<CaptionStyleName>().unwrap(), CaptionStyleName::Classic);
        assert_eq!(" BOLD ".parse::<CaptionStyleName>().unwrap(), CaptionStyleName::Bold);
        assert!(matches!(
            "neon".parse::<CaptionStyleName>(),
            Err(CoreError::Validation(_))
        ));
        for style in CaptionStyleName::ALL {
            assert_eq!(style.to_string().parse::<CaptionStyleName>().unwrap(), style);
        }
    }

    #[test]
    fn test_font_parsing() {
        assert_eq!("Arial Black".parse::<CaptionFont>().unwrap(), CaptionFont::ArialBlack);
        assert_eq!("arial-black".parse::<CaptionFont>().unwrap(), CaptionFont::ArialBlack);
        assert_eq!("Comic Sans".parse::<CaptionFont>().unwrap(), CaptionFont::ComicSansMs);
        assert_eq!("IMPACT".parse::<CaptionFont>().unwrap(), CaptionFont::Impact);
        assert!("Papyrus".parse::<CaptionFont>().is_err());
    }

    #[test]
    fn test_font_serde_uses_family_name() {
        let json = serde_json::to_string(&CaptionFont::ComicSansMs).unwrap();
        assert_eq!(json, "\"Comic Sans MS\"");
        let font: CaptionFont = serde_json::from_str("\"Montserrat\"").unwrap();
        assert_eq!(font, CaptionFont::Montserrat);
    }
}
