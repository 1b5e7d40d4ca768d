//! Settings Persistence System
//!
//! Provides persistent settings with:
//! - Atomic file writes (temp file + rename)
//! - Defaults for every missing field
//! - Tolerant normalization of out-of-range values
//! - Environment overrides for the working directories
//!
//! Storage location: {config_dir}/storyreel/settings.json

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{
    captions::{CaptionFont, CaptionStyleName, CaptionTiming, DEFAULT_GAP_THRESHOLD_MS},
    ffmpeg::RenderSettings,
    render::{duration::DEFAULT_MINIMUM_DURATION_SEC, DurationMode, DurationPolicy, PlacementPolicy},
    speech::SpeechSettings,
    CoreError, CoreResult, Dimensions, TimeMs, TimeSec,
};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Application directory name under the platform config/data dirs
pub const APP_DIR_NAME: &str = "storyreel";

pub const ENV_TEMP_DIR: &str = "STORYREEL_TEMP_DIR";
pub const ENV_OUTPUT_DIR: &str = "STORYREEL_OUTPUT_DIR";
pub const ENV_BACKGROUNDS_DIR: &str = "STORYREEL_BACKGROUNDS_DIR";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub placement: PlacementPolicy,

    #[serde(default)]
    pub captions: CaptionSettings,

    #[serde(default)]
    pub speech: SpeechSettings,

    #[serde(default)]
    pub ffmpeg: FFmpegSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            paths: PathSettings::default(),
            render: RenderConfig::default(),
            placement: PlacementPolicy::default(),
            captions: CaptionSettings::default(),
            speech: SpeechSettings::default(),
            ffmpeg: FFmpegSettings::default(),
        }
    }
}

impl AppSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Corrects bad values instead of failing.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        let render = &mut self.render;
        render.minimum_duration_sec = clamp_f64(render.minimum_duration_sec, 1.0, 600.0);
        render.width = even_dimension(render.width);
        render.height = even_dimension(render.height);
        render.encode.crf = render.encode.crf.min(51);
        render.encode.preset = normalize_enum(
            &render.encode.preset,
            &[
                "ultrafast",
                "superfast",
                "veryfast",
                "faster",
                "fast",
                "medium",
                "slow",
                "slower",
                "veryslow",
            ],
            "medium".to_string(),
        );
        render.encode.trim_buffer_sec = clamp_f64(render.encode.trim_buffer_sec, 0.0, 5.0);
        if render.encode.video_codec.trim().is_empty() {
            render.encode.video_codec = RenderSettings::default().video_codec;
        }
        if render.encode.audio_codec.trim().is_empty() {
            render.encode.audio_codec = RenderSettings::default().audio_codec;
        }
        if render.encode.audio_bitrate.trim().is_empty() {
            render.encode.audio_bitrate = RenderSettings::default().audio_bitrate;
        }

        self.placement.min_start_sec = clamp_f64(self.placement.min_start_sec, 0.0, 3600.0);
        self.placement.safety_margin_sec = clamp_f64(self.placement.safety_margin_sec, 0.0, 60.0);

        self.captions.gap_threshold_ms = self.captions.gap_threshold_ms.min(1_000);

        let defaults = SpeechSettings::default();
        if self.speech.program.trim().is_empty() {
            self.speech.program = defaults.program;
            self.speech.args = defaults.args;
        }
        if self.speech.words_suffix.is_empty() {
            self.speech.words_suffix = defaults.words_suffix;
        }
        if self.speech.default_voice.trim().is_empty() {
            self.speech.default_voice = defaults.default_voice;
        }
        self.speech.timeout_sec = self.speech.timeout_sec.clamp(5, 600);
    }

    /// Replaces directories with values from `lookup` (normally the process
    /// environment).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let apply = |key: &str, target: &mut PathBuf| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                info!(key, value = %value, "settings override from environment");
                *target = PathBuf::from(value);
            }
        };
        apply(ENV_TEMP_DIR, &mut self.paths.temp_dir);
        apply(ENV_OUTPUT_DIR, &mut self.paths.output_dir);
        apply(ENV_BACKGROUNDS_DIR, &mut self.paths.backgrounds_dir);
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

fn normalize_enum(value: &str, allowed: &[&str], fallback: String) -> String {
    if allowed.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        value.to_ascii_lowercase()
    } else {
        fallback
    }
}

/// H.264 needs even frame sizes
fn even_dimension(value: u32) -> u32 {
    value.clamp(16, 4096) & !1
}

// =============================================================================
// Sections
// =============================================================================

/// Working directories
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PathSettings {
    /// Root of per-job temp namespaces
    pub temp_dir: PathBuf,
    /// Finished videos
    pub output_dir: PathBuf,
    /// Background clip library
    pub backgrounds_dir: PathBuf,
    /// Daily-rolling log files; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        let data = dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(APP_DIR_NAME));
        Self {
            temp_dir: std::env::temp_dir().join(APP_DIR_NAME),
            output_dir: data.join("output"),
            backgrounds_dir: data.join("backgrounds"),
            log_dir: None,
        }
    }
}

/// Output duration policy, canvas and encoder settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub duration_policy: DurationMode,
    /// Floor used by the `minimumFloor` policy
    pub minimum_duration_sec: TimeSec,
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub encode: RenderSettings,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let canvas = Dimensions::vertical_1080p();
        Self {
            duration_policy: DurationMode::default(),
            minimum_duration_sec: DEFAULT_MINIMUM_DURATION_SEC,
            width: canvas.width,
            height: canvas.height,
            encode: RenderSettings::default(),
        }
    }
}

impl RenderConfig {
    pub fn duration(&self) -> DurationPolicy {
        DurationPolicy::from_mode(self.duration_policy, self.minimum_duration_sec)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Caption defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionSettings {
    pub default_style: CaptionStyleName,
    pub default_font: CaptionFont,
    pub gap_threshold_ms: TimeMs,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            default_style: CaptionStyleName::default(),
            default_font: CaptionFont::default(),
            gap_threshold_ms: DEFAULT_GAP_THRESHOLD_MS,
        }
    }
}

impl CaptionSettings {
    pub fn timing(&self, canvas: Dimensions) -> CaptionTiming {
        CaptionTiming {
            gap_threshold_ms: self.gap_threshold_ms,
            canvas,
        }
    }
}

/// Explicit binary locations; discovered when unset
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FFmpegSettings {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

// =============================================================================
// Manager
// =============================================================================

/// Loads and saves [`AppSettings`]
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager storing `settings.json` in `config_dir`
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            settings_path: config_dir.join(SETTINGS_FILE),
        }
    }

    /// Use an explicit settings file
    pub fn with_path(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }

    /// `{config_dir}/storyreel/settings.json`
    pub fn default_location() -> CoreResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            CoreError::NotFound("Could not determine the user config directory".to_string())
        })?;
        Ok(Self::new(config_dir.join(APP_DIR_NAME)))
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file doesn't exist
    /// or can't be parsed. Environment overrides are applied last.
    pub fn load(&self) -> AppSettings {
        let mut settings = match self.read() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings
    }

    fn read(&self) -> CoreResult<AppSettings> {
        if !self.settings_path.exists() {
            info!("Settings file not found, using defaults");
            return Ok(AppSettings::default());
        }

        let content = fs::read_to_string(&self.settings_path)?;
        let mut settings = serde_json::from_str::<AppSettings>(&content)?;

        if settings.version < SETTINGS_VERSION {
            info!(
                "Migrating settings from version {} to {}",
                settings.version, SETTINGS_VERSION
            );
            settings.version = SETTINGS_VERSION;
        }

        settings.normalize();
        Ok(settings)
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &AppSettings) -> CoreResult<AppSettings> {
        let mut normalized = settings.clone();
        normalized.normalize();

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&normalized)?;

        let temp_path = self.settings_path.with_extension("json.tmp");
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if cfg!(windows) && self.settings_path.exists() {
            // rename does not overwrite on Windows
            fs::remove_file(&self.settings_path)?;
        }
        fs::rename(&temp_path, &self.settings_path)?;

        info!("Settings saved to {:?}", self.settings_path);
        Ok(normalized)
    }
}
