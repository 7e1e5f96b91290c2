//! Storyboard - turn a shot list into an image sequence
//!
//! Reads one prompt per line, generates each image in order and exports the
//! completed shots as a zip archive. Ctrl-C stops after the current shot.

use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use storyboard::{
    config::{AppConfig, GeneratorBackend},
    create_generator,
    export::{export_archive, ExportError},
    log_error, log_info, log_warn, logging,
    presentation::{render_board, StoryboardView},
    prompt::parse_prompt_list,
    settings::{AspectRatio, ModelType, SettingsStore},
    Sequencer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "storyboard")]
#[command(version)]
#[command(about = "Generate an ordered storyboard from a shot list", long_about = None)]
struct Args {
    /// Configuration file path (overrides defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shot list file, one prompt per line (default: stdin)
    #[arg(short, long)]
    prompts: Option<PathBuf>,

    /// Image model: flash or pro
    #[arg(long)]
    model: Option<ModelType>,

    /// Aspect ratio: 1:1, 16:9, 9:16, 21:9, 4:3
    #[arg(long)]
    aspect_ratio: Option<AspectRatio>,

    /// Theme / mood
    #[arg(long)]
    theme: Option<String>,

    /// Genre / context
    #[arg(long)]
    category: Option<String>,

    /// Global color palette
    #[arg(long)]
    palette: Option<String>,

    /// Generator backend: proxy or gemini
    #[arg(long)]
    backend: Option<GeneratorBackend>,

    /// Directory for the exported archive
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the zip export
    #[arg(long)]
    no_export: bool,

    /// Print the final frames as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut app_config = AppConfig::load(args.config.as_deref())?;
    init_logging(args.verbose || app_config.debug);

    if let Some(backend) = args.backend {
        app_config.backend = backend;
    }
    if let Some(output) = args.output {
        app_config.output_dir = output;
    }
    app_config.validate()?;

    let store = SettingsStore::new(app_config.defaults.clone());
    store.update(|s| {
        if let Some(model) = args.model {
            s.model = model;
        }
        if let Some(ratio) = args.aspect_ratio {
            s.aspect_ratio = ratio;
        }
        if let Some(theme) = args.theme {
            s.theme = theme;
        }
        if let Some(category) = args.category {
            s.category = category;
        }
        if let Some(palette) = args.palette {
            s.global_color_palette = palette;
        }
    });

    let generator = match create_generator(&app_config) {
        Ok(generator) => generator,
        Err(e) => {
            log_error!("Failed to configure {} backend: {}", app_config.backend, e);
            return Err(e.into());
        }
    };

    let prompts = parse_prompt_list(&read_shot_list(args.prompts.as_ref())?);
    if prompts.is_empty() {
        anyhow::bail!("The shot list is empty: enter one prompt per line");
    }

    let sequencer = Arc::new(Sequencer::new(Arc::from(generator)));

    let transcript = tokio::spawn(logging::record_run(sequencer.subscribe()));
    let events = sequencer.subscribe();
    let view = tokio::spawn(async move {
        let mut view = StoryboardView::new(std::io::stdout());
        view.follow(events).await
    });

    let canceller = {
        let sequencer = Arc::clone(&sequencer);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("⏹ Stopping after the current shot...");
                sequencer.request_cancel();
            }
        })
    };

    let settings = store.get();
    log_info!(
        "Run: {} shots, model {}, ratio {}",
        prompts.len(),
        settings.model,
        settings.aspect_ratio
    );
    let run = sequencer.start_run(prompts, settings).await;
    canceller.abort();

    let summary = match run {
        Ok(summary) => summary,
        Err(e) => {
            log_error!("Run rejected: {}", e);
            return Err(e.into());
        }
    };
    view.await??;
    transcript.await?;
    log_info!(
        "Run finished: {}/{} completed, {} failed, {} skipped",
        summary.completed,
        summary.total,
        summary.failed,
        summary.skipped
    );

    let frames = sequencer.frames();

    if !args.no_export {
        match export_archive(&frames, &app_config.output_dir, chrono::Utc::now()) {
            Ok(export) => println!(
                "📦 Exported {} shots to {}",
                export.entries.len(),
                export.path.display()
            ),
            Err(ExportError::NothingToExport) => {
                log_warn!("Nothing to export");
                eprintln!("No completed shots to export");
            }
            Err(e) => {
                log_error!("Export failed: {}", e);
                eprintln!("❌ Export failed: {}", e);
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&frames)?);
    } else {
        println!("\n{}", render_board(&frames));
    }
    if let Some(path) = logging::log_path() {
        eprintln!("📝 Session log: {}", path.display());
    }

    Ok(())
}

fn read_shot_list(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => Ok(std::fs::read_to_string(path)?),
        _ => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Initialize logging: console via tracing, plus the session log file
fn init_logging(verbose: bool) {
    if let Err(e) = logging::init_logger() {
        eprintln!(
            "Session log unavailable at {}: {}",
            logging::default_log_path().display(),
            e
        );
    }

    let filter = if verbose {
        "storyboard=debug,info"
    } else {
        "storyboard=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
