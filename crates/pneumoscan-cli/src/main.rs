mod display;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pneumoscan_ai::{ModelLoader, OnnxBackend};
use pneumoscan_core::{ImageInput, ModelStatus, PixelScale, SessionConfig, UploadedFile};
use pneumoscan_fetch::{Fetch, Fetcher, is_remote, local};
use pneumoscan_session::SessionController;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pneumoscan", version, about = "Chest X-ray COVID pneumonia classifier")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Settings {
    /// JSON config file; flags override its values
    #[arg(long, global = true, env = "PNEUMOSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Model artifact: http(s) URL, file:// URI, or path
    #[arg(long, global = true, env = "PNEUMOSCAN_MODEL_URI")]
    model: Option<String>,

    /// Side length of the square model input
    #[arg(long, global = true)]
    input_size: Option<usize>,

    /// Maximum history entries (0 = unbounded)
    #[arg(long, global = true)]
    history_limit: Option<usize>,

    /// Pixel scaling fed to the model: raw (0-255) or unit (0-1)
    #[arg(long, global = true)]
    pixel_scale: Option<PixelScale>,
}

#[derive(Subcommand)]
enum Command {
    /// Classify images (paths or URLs) in order, then print the history
    Classify {
        #[arg(required = true)]
        sources: Vec<String>,

        /// Print snapshots as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive session driven by commands on stdin
    Session,
}

impl Settings {
    fn resolve(&self) -> anyhow::Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)?,
            None => SessionConfig::default(),
        };
        if let Some(uri) = &self.model {
            config.model_uri = uri.clone();
        }
        if let Some(size) = self.input_size {
            config.input_size = size;
        }
        if let Some(limit) = self.history_limit {
            config.history_limit = (limit > 0).then_some(limit);
        }
        if let Some(scale) = self.pixel_scale {
            config.pixel_scale = scale;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.settings.resolve().context("loading configuration")?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.model_uri,
        input = %config.input_shape(),
        "pneumoscan starting"
    );

    let fetcher: Arc<dyn Fetch> = Arc::new(Fetcher::new());
    let loader = Arc::new(ModelLoader::new(
        Arc::clone(&fetcher),
        Arc::new(OnnxBackend),
        config.input_shape(),
    ));
    let session = SessionController::new(&config, fetcher, loader.subscribe())?;

    match cli.command {
        Command::Classify { sources, json } => {
            classify(&config, &loader, session, &sources, json).await
        }
        Command::Session => repl::run(&config, loader, session).await,
    }
}

async fn classify(
    config: &SessionConfig,
    loader: &ModelLoader,
    mut session: SessionController,
    sources: &[String],
    json: bool,
) -> anyhow::Result<()> {
    eprintln!("Loading model from {}...", config.model_uri);
    if loader.load(&config.model_uri).await != ModelStatus::Ready {
        let state = loader.state();
        anyhow::bail!(
            "model failed to load from {}: {}",
            config.model_uri,
            state.failure().unwrap_or("unknown error")
        );
    }
    session.refresh();

    let mut failures = 0usize;
    for source in sources {
        let input = match read_source(source).await {
            Ok(input) => input,
            Err(e) => {
                eprintln!("  {source}: {e:#}");
                failures += 1;
                continue;
            }
        };
        if let Err(e) = session.apply_input(input) {
            eprintln!("  {source}: {e}");
            failures += 1;
            continue;
        }
        if session.request_identify().await.is_err() {
            failures += 1;
        }

        let snapshot = session.snapshot();
        if json {
            display::print_snapshot_json(&snapshot)?;
        } else {
            display::print_snapshot(&snapshot);
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} images could not be classified", sources.len());
    }
    Ok(())
}

/// Turn a command-line source into session input: URLs pass through, anything
/// else is read from disk as an upload.
async fn read_source(source: &str) -> anyhow::Result<ImageInput> {
    if is_remote(source) {
        return Ok(ImageInput::Url(source.to_string()));
    }
    let path = local::to_path(source);
    let file = UploadedFile::from_path(&path).await?;
    Ok(ImageInput::Upload(vec![file]))
}
