//! mv3d - terminal mesh viewer
//!
//! Controls:
//!   - Left drag: orbit, right drag: pan, wheel: zoom, click: select
//!   - o / Ctrl+O: load meshes, w: wireframe, x: axes, r: reset view
//!   - Tab: next mesh, Delete: remove selected, Esc: cancel load, q: quit
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal;
use mv3d_core::AppConfig;
use mv3d_terminal::{TerminalApp, ThemeManager};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mv3d", version, about = "Interactive STL viewer for the terminal")]
struct Args {
    /// Mesh files to load at startup
    paths: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where log output goes while the terminal is in use
    #[arg(long, default_value = "mv3d.log")]
    log_file: PathBuf,

    /// Color theme (dark or light), overrides the configuration
    #[arg(long)]
    theme: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The screen belongs to the viewer, so logs go to a file
    let log_file = File::create(&args.log_file)
        .with_context(|| format!("failed to create log file {}", args.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    // A broken config file is logged and replaced by defaults
    let config = AppConfig::load_or_default(args.config.as_deref());
    let theme = ThemeManager::from_name(args.theme.as_deref().unwrap_or(&config.ui.theme));

    let (width, height) = terminal::size().context("failed to query terminal size")?;
    let mut app = TerminalApp::new(config, theme, width, height);
    if !args.paths.is_empty() {
        app.load(args.paths);
    }

    app.run().context("terminal session failed")?;
    tracing::info!("Exited cleanly");
    Ok(())
}
