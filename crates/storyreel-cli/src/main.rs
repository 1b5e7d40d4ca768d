use anyhow::Result;
use clap::Parser;
use storyreel_lib::core::settings::SettingsManager;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    let manager = match &args.config {
        Some(path) => SettingsManager::with_path(path.clone()),
        None => SettingsManager::default_location()?,
    };
    let settings = manager.load();
    storyreel_lib::init_logging(settings.paths.log_dir.as_deref());

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        settings = %manager.settings_path().display(),
        "storyreel starting"
    );

    match args.command {
        cli::Command::Render(cmd) => commands::run_render(cmd, settings, args.json).await,
        cli::Command::Captions(cmd) => commands::run_captions(cmd, &settings, args.json),
        cli::Command::Backgrounds => commands::run_backgrounds(&settings, args.json),
        cli::Command::Styles => commands::run_styles(args.json),
        cli::Command::Preview(cmd) => commands::run_preview(cmd, &settings, args.json).await,
        cli::Command::Voices { locale, allow } => {
            commands::run_voices(locale.as_deref(), &allow, &settings, args.json).await
        }
        cli::Command::Output { name } => commands::run_output(&name, &settings, args.json),
        cli::Command::Probe { path } => commands::run_probe(&path, &settings, args.json).await,
        cli::Command::Config { command } => commands::run_config(command, &manager, args.json),
    }
}
