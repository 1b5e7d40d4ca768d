use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use storyreel_lib::core::{
    captions::{synthesize_with, CaptionFont, CaptionStyleName, WordBoundary, WordTimeline},
    ffmpeg::{detect_ffmpeg, FFmpegRunner, RenderProgress, RenderSettings},
    library::{list_backgrounds, resolve_output},
    render::RenderControl,
    settings::{AppSettings, SettingsManager},
    speech::{parse_word_sidecar, CommandSynthesizer, SpeechRequest, SpeechSynthesizer, VoiceCatalog},
    CoreError,
};
use storyreel_lib::{NarratedRenderRequest, RenderOutcome, RenderPipeline, RenderRequest};
use tokio::sync::mpsc;

use crate::cli::{CaptionsCmd, ConfigCommand, PreviewCmd, RenderCmd};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Attaches the failing stage so scripts can tell speech from ffmpeg failures
fn stage_error(err: CoreError) -> anyhow::Error {
    let stage = err.stage();
    anyhow::Error::new(err).context(format!("render failed at the {stage} stage"))
}

/// Word timing as boundaries (`text`, `offsetMs`, `durationMs`) or as the
/// speech program's `[{part, start, end}]` sidecar
fn read_words(path: &Path) -> Result<Vec<WordBoundary>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read word timing {}", path.display()))?;

    match serde_json::from_str::<Vec<WordBoundary>>(&json) {
        Ok(words) => Ok(words),
        Err(_) => parse_word_sidecar(&json)
            .with_context(|| format!("unrecognized word timing format in {}", path.display())),
    }
}

// =============================================================================
// render
// =============================================================================

pub async fn run_render(cmd: RenderCmd, mut settings: AppSettings, json: bool) -> Result<()> {
    if cmd.draft {
        settings.render.encode = RenderSettings::draft();
    }
    let pipeline = RenderPipeline::from_settings(settings).map_err(stage_error)?;

    let (control, handle) = RenderControl::with_cancel();
    let (progress_tx, progress_rx) = mpsc::channel(32);
    let control = control.with_progress(progress_tx);
    let printer = tokio::spawn(print_progress(progress_rx));

    let render = execute_render(&pipeline, cmd, control);
    tokio::pin!(render);

    let finished = tokio::select! {
        outcome = &mut render => Some(outcome),
        Ok(()) = tokio::signal::ctrl_c() => None,
    };
    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            tracing::warn!("interrupt received, cancelling render");
            handle.cancel();
            render.await
        }
    };

    // The progress sender lives in the control, which is gone by now.
    let _ = printer.await;
    let outcome = outcome?;

    if json {
        print_json(&outcome)
    } else {
        print_outcome(&outcome);
        Ok(())
    }
}

async fn execute_render(
    pipeline: &RenderPipeline,
    cmd: RenderCmd,
    control: RenderControl,
) -> Result<RenderOutcome> {
    if let (Some(audio_path), Some(words)) = (cmd.audio, cmd.words) {
        let request = NarratedRenderRequest {
            audio_path,
            words: read_words(&words)?,
            background: cmd.background,
            style: cmd.style,
            font: cmd.font,
        };
        return pipeline
            .render_narrated(request, control)
            .await
            .map_err(stage_error);
    }

    let story = match (cmd.story, cmd.story_file) {
        (Some(story), _) => story,
        (None, Some(file)) => std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read story {}", file.display()))?,
        (None, None) => bail!("either --story or --story-file is required"),
    };
    let request = RenderRequest {
        story,
        background: cmd.background,
        voice: cmd.voice,
        style: cmd.style,
        font: cmd.font,
        rate: cmd.rate,
        pitch: cmd.pitch,
    };
    pipeline.render(request, control).await.map_err(stage_error)
}

async fn print_progress(mut rx: mpsc::Receiver<RenderProgress>) {
    let mut shown = false;
    while let Some(progress) = rx.recv().await {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{:>5.1}%  {:<40}", progress.percent, progress.message);
        let _ = stderr.flush();
        shown = true;
    }
    if shown {
        eprintln!();
    }
}

fn print_outcome(outcome: &RenderOutcome) {
    println!("Rendered {}", outcome.output_path.display());
    println!(
        "  duration {:.1}s{}, background from {:.0}s, {} words, {} / {}",
        outcome.duration_sec,
        if outcome.was_padded { " (padded)" } else { "" },
        outcome.start_offset_sec,
        outcome.word_count,
        outcome.style,
        outcome.font
    );
}

// =============================================================================
// captions
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptionsReport<'a> {
    output_path: &'a Path,
    style: CaptionStyleName,
    font: CaptionFont,
    words: usize,
    events: usize,
}

pub fn run_captions(cmd: CaptionsCmd, settings: &AppSettings, json: bool) -> Result<()> {
    let timeline = WordTimeline::new(read_words(&cmd.words)?)?;
    let style = cmd.style.unwrap_or(settings.captions.default_style);
    let font = cmd.font.unwrap_or(settings.captions.default_font);

    let timing = settings.captions.timing(settings.render.dimensions());
    let track = synthesize_with(&timeline, style, font, &timing);
    track
        .save(&cmd.output)
        .with_context(|| format!("failed to write {}", cmd.output.display()))?;

    let report = CaptionsReport {
        output_path: &cmd.output,
        style,
        font,
        words: timeline.len(),
        events: track.events.len(),
    };
    if json {
        print_json(&report)
    } else {
        println!(
            "Wrote {} ({} events from {} words, {} / {})",
            report.output_path.display(),
            report.events,
            report.words,
            style,
            font
        );
        Ok(())
    }
}

// =============================================================================
// backgrounds / styles / probe
// =============================================================================

pub fn run_backgrounds(settings: &AppSettings, json: bool) -> Result<()> {
    let dir = &settings.paths.backgrounds_dir;
    let clips = list_backgrounds(dir)?;

    if json {
        return print_json(&clips);
    }
    if clips.is_empty() {
        println!("No background clips in {}", dir.display());
        return Ok(());
    }
    for clip in &clips {
        println!(
            "{:<40} {:>8.1} MB",
            clip.file_name,
            clip.size_bytes as f64 / (1024.0 * 1024.0)
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct FontEntry {
    name: CaptionFont,
    description: &'static str,
}

#[derive(Serialize)]
struct StylesReport {
    styles: Vec<CaptionStyleName>,
    fonts: Vec<FontEntry>,
}

pub fn run_styles(json: bool) -> Result<()> {
    if json {
        return print_json(&StylesReport {
            styles: CaptionStyleName::ALL.to_vec(),
            fonts: CaptionFont::ALL
                .into_iter()
                .map(|name| FontEntry {
                    name,
                    description: name.description(),
                })
                .collect(),
        });
    }

    println!("Styles:");
    for style in CaptionStyleName::ALL {
        let config = style.config();
        println!(
            "  {:<10} {} word(s) per caption, size {}",
            style, config.words_per_chunk, config.font_size
        );
    }
    println!("Fonts:");
    for font in CaptionFont::ALL {
        println!("  {:<14} {}", font.family(), font.description());
    }
    Ok(())
}

pub async fn run_probe(path: &Path, settings: &AppSettings, json: bool) -> Result<()> {
    let info = detect_ffmpeg(
        settings.ffmpeg.ffmpeg_path.as_deref(),
        settings.ffmpeg.ffprobe_path.as_deref(),
    )?;
    let duration_sec = FFmpegRunner::new(info)
        .probe_duration(path)
        .await
        .with_context(|| format!("failed to probe {}", path.display()))?;

    if json {
        print_json(&serde_json::json!({
            "path": path,
            "durationSec": duration_sec,
        }))
    } else {
        println!("{:.3}", duration_sec);
        Ok(())
    }
}

// =============================================================================
// preview / voices / output
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewReport<'a> {
    output_path: &'a Path,
    voice: &'a str,
    chars: usize,
    words: usize,
}

pub async fn run_preview(cmd: PreviewCmd, settings: &AppSettings, json: bool) -> Result<()> {
    let text = match (cmd.text, cmd.story_file) {
        (Some(text), _) => text,
        (None, Some(file)) => std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read story {}", file.display()))?,
        (None, None) => bail!("preview text or --story-file is required"),
    };

    let mut request = SpeechRequest::new(text)
        .with_voice(cmd.voice.unwrap_or_else(|| settings.speech.default_voice.clone()));
    if let Some(rate) = cmd.rate {
        request = request.with_rate(rate);
    }
    if let Some(pitch) = cmd.pitch {
        request = request.with_pitch(pitch);
    }
    let request = request.preview();

    let words = CommandSynthesizer::new(settings.speech.clone())
        .synthesize(&request, &cmd.output)
        .await
        .map_err(stage_error)?;

    let report = PreviewReport {
        output_path: &cmd.output,
        voice: &request.voice,
        chars: request.text.chars().count(),
        words: words.len(),
    };
    if json {
        print_json(&report)
    } else {
        println!(
            "Wrote {} ({} chars, {} words, {})",
            report.output_path.display(),
            report.chars,
            report.words,
            report.voice
        );
        Ok(())
    }
}

pub async fn run_voices(
    locale: Option<&str>,
    allow: &[String],
    settings: &AppSettings,
    json: bool,
) -> Result<()> {
    let voices = VoiceCatalog::new(&settings.speech)?
        .list(locale, allow)
        .await?;

    if json {
        return print_json(&serde_json::json!({ "voices": voices }));
    }
    if voices.is_empty() {
        println!("No matching voices");
        return Ok(());
    }
    for voice in &voices {
        println!("{:<36} {:<8} {}", voice.short_name, voice.gender, voice.locale);
    }
    Ok(())
}

pub fn run_output(name: &str, settings: &AppSettings, json: bool) -> Result<()> {
    let path = resolve_output(&settings.paths.output_dir, name)?;

    if json {
        let size_bytes = std::fs::metadata(&path)?.len();
        print_json(&serde_json::json!({
            "path": path,
            "sizeBytes": size_bytes,
        }))
    } else {
        println!("{}", path.display());
        Ok(())
    }
}

// =============================================================================
// config
// =============================================================================

pub fn run_config(command: ConfigCommand, manager: &SettingsManager, json: bool) -> Result<()> {
    match command {
        ConfigCommand::Show => print_json(&manager.load()),
        ConfigCommand::Path => {
            if json {
                print_json(&serde_json::json!({ "path": manager.settings_path() }))
            } else {
                println!("{}", manager.settings_path().display());
                Ok(())
            }
        }
        ConfigCommand::Init { force } => {
            let path = manager.settings_path();
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            manager.save(&AppSettings::default())?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}
