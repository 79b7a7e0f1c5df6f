//! `snapkit` command line
//!
//! `snapkit capture page.html` captures once; `snapkit serve page.html`
//! answers JSON requests read from stdin, one per line.

use clap::{Args, Parser, Subcommand};
use snapkit_capture::{FrameClock, IntervalClock, SurfaceLocator};
use snapkit_codecs::parse_data_url;
use snapkit_common::{init_logging, CaptureConfig, LogConfig, LogFormat, Result, SnapKitError};
use snapkit_dom::Document;
use snapkit_shell::{CommandHandler, ReplayClock, Request};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "snapkit", version)]
#[command(about = "Capture the WebGL viewport of a page without its UI")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log output format: pretty, compact, or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture the page once
    Capture {
        #[command(flatten)]
        page: PageArgs,

        /// Write the PNG here instead of printing the data URL
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Answer JSON requests from stdin until EOF
    Serve {
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Args, Debug)]
struct PageArgs {
    /// Path to the HTML page
    page: PathBuf,

    /// Capture configuration file (JSON)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// PNG frame redrawn into the scene canvas on every refresh
    #[arg(long)]
    scene: Option<PathBuf>,
}

impl PageArgs {
    fn load(&self) -> Result<(Document, CaptureConfig)> {
        let config = match &self.config {
            Some(path) => CaptureConfig::load(path)?,
            None => CaptureConfig::default(),
        }
        .with_env_overrides()?;

        let html = std::fs::read_to_string(&self.page)?;
        let doc = Document::parse_html(&html).map_err(|e| {
            SnapKitError::dom_with_source(format!("cannot parse {}", self.page.display()), e)
        })?;
        info!(page = %self.page.display(), canvases = doc.canvases().len(), "Loaded page");
        Ok((doc, config))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig {
            level: Level::WARN,
            ..Default::default()
        }
    };
    init_logging(log_config.with_format(cli.log_format));

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command)) {
        Ok(code) => code,
        Err(e) => {
            error!(category = e.category(), "{e}");
            eprintln!("snapkit: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Documents are single-threaded, so everything runs on this thread.
/// Stdin and stdout go through the blocking pool; only timers need a driver.
fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
}

async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Capture { page, output } => {
            let (doc, config) = page.load()?;
            let clock = IntervalClock::from_config(&config);
            match &page.scene {
                Some(scene) => {
                    let clock = ReplayClock::from_png(clock, scene)?
                        .attach(&doc, &SurfaceLocator::new(&config));
                    capture(CommandHandler::new(doc, &config, clock), output.as_deref()).await
                }
                None => capture(CommandHandler::new(doc, &config, clock), output.as_deref()).await,
            }
        }
        Command::Serve { page } => {
            let (doc, config) = page.load()?;
            let clock = IntervalClock::from_config(&config);
            match &page.scene {
                Some(scene) => {
                    let clock = ReplayClock::from_png(clock, scene)?
                        .attach(&doc, &SurfaceLocator::new(&config));
                    serve(CommandHandler::new(doc, &config, clock)).await
                }
                None => serve(CommandHandler::new(doc, &config, clock)).await,
            }
        }
    }
}

async fn capture<C: FrameClock>(
    mut handler: CommandHandler<C>,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let response = handler.handle(Request::Capture).await;
    let image_data = match (&response.image_data, response.success) {
        (Some(image_data), true) => image_data,
        _ => {
            println!("{}", response.to_json());
            return Ok(ExitCode::FAILURE);
        }
    };

    match output {
        Some(path) => {
            let png = parse_data_url(image_data)
                .map_err(|e| SnapKitError::codec_with_source("invalid capture payload", e))?;
            std::fs::write(path, &png.data)?;
            info!(path = %path.display(), bytes = png.data.len(), "Wrote capture");
        }
        None => println!("{image_data}"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn serve<C: FrameClock>(mut handler: CommandHandler<C>) -> Result<ExitCode> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("Serving requests on stdin");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handler.handle_json(&line).await;
        stdout.write_all(response.to_json().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    info!("Input closed");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_runtime_drives_timers() {
        let runtime = build_runtime().unwrap();
        runtime.block_on(async { tokio::time::sleep(Duration::from_millis(1)).await });
    }

    #[test]
    fn test_cli_parses_scene_option() {
        let cli = Cli::try_parse_from(["snapkit", "capture", "page.html", "--scene", "f.png"]).unwrap();
        match cli.command {
            Command::Capture { page, output } => {
                assert_eq!(page.scene.as_deref(), Some(Path::new("f.png")));
                assert!(output.is_none());
            }
            Command::Serve { .. } => panic!("expected capture"),
        }
    }
}
