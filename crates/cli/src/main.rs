use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audora_core::validate::{Field, FieldErrors};
use audora_core::{
    format_bytes, is_direct_media_url, is_large_input, load_config, load_config_from_env,
    metrics, validate_config, Bitrate, Config, ConvertOptions, EngineSlot, FfmpegLoader,
    HttpFetcher, LocalInput, OutputStore, Transcoder, TranscoderUpdate, TrimFields,
};

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "audora.toml";

/// audora: convert a video file or a direct media URL into an MP3.
#[derive(Parser, Debug)]
#[command(name = "audora", version, about)]
struct Cli {
    /// Local video file, or an http(s) URL pointing at one
    source: String,

    /// MP3 bitrate in kbps (128, 192, 256 or 320)
    #[arg(short, long)]
    bitrate: Option<String>,

    /// Downmix to a single channel
    #[arg(long)]
    mono: bool,

    /// Start offset as m:ss
    #[arg(long, default_value = "")]
    start: String,

    /// Length of the extracted clip as m:ss
    #[arg(long, default_value = "")]
    duration: String,

    /// Directory the MP3 is written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Configuration file (defaults to $AUDORA_CONFIG, then ./audora.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics after the conversion
    #[arg(long)]
    print_metrics: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;

    let bitrate = cli
        .bitrate
        .clone()
        .unwrap_or_else(|| config.output.default_bitrate.to_string());
    let options = ConvertOptions::from_fields(
        &bitrate,
        cli.mono,
        &TrimFields::new(cli.start.as_str(), cli.duration.as_str()),
    )
    .map_err(|errors| anyhow!("Invalid options: {}", describe_field_errors(&errors)))?;

    info!("Engine: {:?}", config.engine.ffmpeg_path);
    info!("Output: {}", options.bitrate.label());

    let fetcher = HttpFetcher::new(config.fetch.clone()).context("Failed to create fetcher")?;
    let store = Arc::new(OutputStore::new());
    let mut transcoder = Transcoder::new(
        EngineSlot::new(FfmpegLoader::new(config.engine.clone())),
        Arc::new(fetcher),
        Arc::clone(&store),
    );

    let listener = tokio::spawn(report_updates(transcoder.subscribe()));

    let result = if is_url(&cli.source) {
        if !is_direct_media_url(&cli.source) {
            warn!("URL does not end in a media extension; page links usually fail, direct .mp4/.webm links work best");
        }
        transcoder.convert_url(&cli.source, &options).await
    } else {
        let path = Path::new(&cli.source);
        let input = LocalInput::from_path(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;

        let threshold = config.limits.large_input_threshold_mb;
        if is_large_input(&input.meta, threshold) {
            warn!(
                "Input is {}; files above {} MB may exhaust memory during conversion",
                format_bytes(input.meta.size_bytes),
                threshold
            );
        }

        transcoder.convert_file(input, &options).await
    };

    let resource = result.context("Conversion failed")?;

    let bytes = store
        .get(&resource.reference)
        .ok_or_else(|| anyhow!("Output {} is no longer available", resource.reference))?;

    let output_dir = cli.output_dir.unwrap_or(config.output.directory);
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", output_dir))?;
    let target = output_dir.join(&resource.filename);
    tokio::fs::write(&target, &bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", target))?;

    info!("Saved {:?} ({})", target, format_bytes(resource.size_bytes));

    transcoder.reset();
    drop(transcoder);
    let _ = listener.await;

    if cli.print_metrics {
        print!("{}", metrics::gather_text());
    }

    Ok(())
}

fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("AUDORA_CONFIG").ok().map(PathBuf::from));

    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Loading configuration from {}", DEFAULT_CONFIG_FILE);
            load_config(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_FILE))
        }
        None => load_config_from_env().context("Failed to load config from environment"),
    }
}

async fn report_updates(mut updates: broadcast::Receiver<TranscoderUpdate>) {
    loop {
        match updates.recv().await {
            Ok(TranscoderUpdate::State(state)) => debug!("State: {}", state),
            Ok(TranscoderUpdate::Status(text)) if !text.is_empty() => info!("{}", text),
            Ok(TranscoderUpdate::Status(_)) => {}
            Ok(TranscoderUpdate::Progress(percent)) => {
                if percent % 10 == 0 {
                    info!("Progress: {}%", percent);
                }
            }
            Ok(TranscoderUpdate::Log(line)) => debug!("{}", line),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Skipped {} updates", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn is_url(source: &str) -> bool {
    source.contains("://")
}

fn bitrate_choices() -> String {
    Bitrate::ALL
        .iter()
        .map(|b| b.kbps().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_field_errors(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, err)| {
            match field {
                Field::Bitrate => format!("bitrate: {} ({})", err, bitrate_choices()),
                Field::StartTime => format!("start: {}", err),
                Field::Duration => format!("duration: {}", err),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
