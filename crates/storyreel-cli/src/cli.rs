use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use storyreel_lib::core::captions::{CaptionFont, CaptionStyleName};

#[derive(Debug, Parser)]
#[command(name = "storyreel", version)]
#[command(about = "Render narrated vertical videos with word-synchronized captions.")]
pub struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a video from story text or existing narration
    Render(RenderCmd),
    /// Write an ASS subtitle track from a word-timing file
    Captions(CaptionsCmd),
    /// List background clips
    Backgrounds,
    /// List caption styles and fonts
    Styles,
    /// Speak the start of a story to an audio file
    Preview(PreviewCmd),
    /// List voices offered by the speech service
    Voices {
        /// Locale prefix, e.g. `en` or `pt-BR`
        #[arg(long)]
        locale: Option<String>,

        /// Exact locale to keep (repeatable; overrides --locale)
        #[arg(long = "allow", value_name = "LOCALE")]
        allow: Vec<String>,
    },
    /// Print the path of a rendered video
    Output {
        /// File name inside the output directory
        name: String,
    },
    /// Print the duration of a media file
    Probe {
        path: PathBuf,
    },
    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, ClapArgs)]
pub struct RenderCmd {
    /// Story text to narrate
    #[arg(long, conflicts_with = "story_file")]
    #[arg(required_unless_present_any = ["story_file", "audio"])]
    pub story: Option<String>,

    /// Read the story from a file
    #[arg(long)]
    pub story_file: Option<PathBuf>,

    /// Background clip name inside the backgrounds directory
    #[arg(short, long)]
    pub background: String,

    /// Voice short name, e.g. en-US-ChristopherNeural
    #[arg(long)]
    pub voice: Option<String>,

    #[arg(long)]
    pub style: Option<CaptionStyleName>,

    #[arg(long)]
    pub font: Option<CaptionFont>,

    /// Speaking rate, e.g. +10% or -5%
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<String>,

    /// Pitch offset, e.g. +5Hz
    #[arg(long, allow_hyphen_values = true)]
    pub pitch: Option<String>,

    /// Skip speech synthesis and use this narration audio
    #[arg(long, requires = "words", conflicts_with_all = ["story", "story_file"])]
    pub audio: Option<PathBuf>,

    /// Word timing for --audio
    #[arg(long, requires = "audio")]
    pub words: Option<PathBuf>,

    /// Fast low-quality encode for previews
    #[arg(long)]
    pub draft: bool,
}

#[derive(Debug, ClapArgs)]
pub struct PreviewCmd {
    /// Text to speak (only the first 200 characters are used)
    #[arg(required_unless_present = "story_file", conflicts_with = "story_file")]
    pub text: Option<String>,

    #[arg(long)]
    pub story_file: Option<PathBuf>,

    /// Output audio path
    #[arg(short, long, default_value = "preview.mp3")]
    pub output: PathBuf,

    #[arg(long)]
    pub voice: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub pitch: Option<String>,
}

#[derive(Debug, ClapArgs)]
pub struct CaptionsCmd {
    /// Word-timing JSON file
    pub words: PathBuf,

    /// Output .ass path
    #[arg(short, long)]
    pub output: PathBuf,

    #[arg(long)]
    pub style: Option<CaptionStyleName>,

    #[arg(long)]
    pub font: Option<CaptionFont>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
    /// Write default settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_render_with_story() {
        let args = Args::try_parse_from([
            "storyreel",
            "render",
            "--story",
            "Once upon a time",
            "-b",
            "minecraft.mp4",
            "--style",
            "bold",
            "--font",
            "impact",
            "--rate",
            "-10%",
        ])
        .unwrap();

        let Command::Render(cmd) = args.command else {
            panic!("expected render");
        };
        assert_eq!(cmd.story.as_deref(), Some("Once upon a time"));
        assert_eq!(cmd.style, Some(CaptionStyleName::Bold));
        assert_eq!(cmd.font, Some(CaptionFont::Impact));
        assert_eq!(cmd.rate.as_deref(), Some("-10%"));
    }

    #[test]
    fn render_requires_story_or_audio() {
        assert!(Args::try_parse_from(["storyreel", "render", "-b", "clip.mp4"]).is_err());
        assert!(Args::try_parse_from([
            "storyreel", "render", "-b", "clip.mp4", "--audio", "voice.mp3"
        ])
        .is_err());
        assert!(Args::try_parse_from([
            "storyreel",
            "render",
            "-b",
            "clip.mp4",
            "--audio",
            "voice.mp3",
            "--words",
            "voice.json",
        ])
        .is_ok());
    }

    #[test]
    fn global_json_flag() {
        let args = Args::try_parse_from(["storyreel", "backgrounds", "--json"]).unwrap();
        assert!(args.json);
        assert!(matches!(args.command, Command::Backgrounds));
    }

    #[test]
    fn rejects_unknown_style() {
        assert!(Args::try_parse_from([
            "storyreel", "captions", "w.json", "-o", "out.ass", "--style", "neon"
        ])
        .is_err());
    }

    #[test]
    fn parses_preview_and_voices() {
        let args = Args::try_parse_from([
            "storyreel", "preview", "Hello there", "-o", "hi.mp3", "--pitch", "-5Hz",
        ])
        .unwrap();
        let Command::Preview(cmd) = args.command else {
            panic!("expected preview");
        };
        assert_eq!(cmd.text.as_deref(), Some("Hello there"));
        assert_eq!(cmd.output, PathBuf::from("hi.mp3"));
        assert_eq!(cmd.pitch.as_deref(), Some("-5Hz"));

        assert!(Args::try_parse_from(["storyreel", "preview"]).is_err());

        let args = Args::try_parse_from([
            "storyreel", "voices", "--allow", "en-US", "--allow", "en-AU",
        ])
        .unwrap();
        let Command::Voices { locale, allow } = args.command else {
            panic!("expected voices");
        };
        assert_eq!(locale, None);
        assert_eq!(allow, ["en-US", "en-AU"]);
    }

    #[test]
    fn parses_output_name() {
        let args = Args::try_parse_from(["storyreel", "output", "reel_01.mp4", "--json"]).unwrap();
        assert!(args.json);
        assert!(matches!(args.command, Command::Output { name } if name == "reel_01.mp4"));
    }
}
