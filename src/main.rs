use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use speechlink_audio::{feed_buffer, BufferedAudioSource, StreamingAudioSource};
use speechlink_core::config;
use speechlink_engine::{EngineRegistry, SessionController};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "speechlink", about = "Speech recognition client")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Engine to use instead of the one named in the config
    #[arg(long)]
    engine: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recognize a whole audio file in one call
    Recognize { file: PathBuf },
    /// Replay an audio file as a live stream of chunks
    Stream {
        file: PathBuf,

        /// Bytes per chunk (defaults to recognition.chunk_size)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Log partial and final results as they arrive
        #[arg(long)]
        progress: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app_config = speechlink_core::AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let env_filter = EnvFilter::try_new(&app_config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    // A bad config is reported here; recognition calls then fail fast.
    match speechlink_core::RecognitionConfig::initialize(&app_config) {
        Ok(recognition) => {
            config::install_global(recognition).context("failed to install config")?;
        }
        Err(e) => tracing::error!("could not initialize recognition config: {e}"),
    }

    let engine_name = cli.engine.as_deref().unwrap_or(&app_config.engine.name);
    let registry = EngineRegistry::new();
    let engine = registry
        .create(engine_name)
        .with_context(|| format!("available engines: {:?}", registry.list_engines()))?;
    tracing::info!("using engine '{}'", engine.name());

    let transcript = match cli.command {
        Command::Recognize { file } => {
            let audio = BufferedAudioSource::from_file(&file)
                .with_context(|| format!("failed to read {file:?}"))?;
            SessionController::from_global(engine)
                .recognize_once(audio)
                .await
                .context("recognition failed")?
        }
        Command::Stream {
            file,
            chunk_size,
            progress,
        } => {
            let data = std::fs::read(&file).with_context(|| format!("failed to read {file:?}"))?;
            let chunk_size = chunk_size.unwrap_or(app_config.recognition.chunk_size);

            let mut controller = SessionController::from_global(engine);
            if progress {
                let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
                controller = controller.with_progress(progress_tx);
                tokio::spawn(async move {
                    while let Some(result) = progress_rx.recv().await {
                        tracing::info!(
                            session_id = result.session_id,
                            is_final = result.is_final,
                            "ASR: {}",
                            result.text,
                        );
                    }
                });
            }

            let (sender, source) =
                StreamingAudioSource::channel(app_config.recognition.stream_buffer);
            let producer = tokio::spawn(async move { feed_buffer(sender, &data, chunk_size).await });

            let transcript = controller
                .recognize_stream(source)
                .await
                .context("streaming recognition failed")?;
            match producer.await {
                Ok(Ok(chunks)) => tracing::debug!(chunks, "producer finished"),
                Ok(Err(e)) => tracing::warn!("producer stopped early: {e}"),
                Err(e) => tracing::warn!("producer task failed: {e}"),
            }
            transcript
        }
    };

    println!("{transcript}");
    Ok(())
}
