use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tonie_worker::{create_router, session, AppState, Config, Converter, Encoder, Store, TrackTags};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tonie-worker", version, about = "PCM capture to Tonie-ready MP3 tracks")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/tonie-worker")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API; recordings are started through it
    Serve,
    /// Convert one raw PCM file (s16le, stereo, 44.1 kHz) into a tagged MP3
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        artist: String,
        #[arg(long, default_value = "")]
        album: String,
        #[arg(long)]
        track: Option<String>,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long, default_value_t = 1)]
        tonie_index: i64,
    },
    /// Create the database schema and exit
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let store = Store::open(&cfg.paths.database_url)
        .await
        .context("Failed to open store")?;
    store.migrate().await.context("Failed to prepare schema")?;

    let converter = Converter::new(Encoder::new(&cfg.encoder.ffmpeg_path));

    match cli.command {
        Command::InitDb => {
            info!("Schema ready at {}", cfg.paths.database_url);
        }
        Command::Convert {
            input,
            output,
            title,
            artist,
            album,
            track,
            comment,
            tonie_index,
        } => {
            let tags = TrackTags {
                title: Some(title),
                artist: Some(artist),
                album: Some(album),
                track_number: track,
                comment,
            };

            let (session_id, track_id) =
                session::convert_file(&store, &converter, &input, output.clone(), tags, tonie_index)
                    .await
                    .with_context(|| format!("Failed to convert {}", input.display()))?;

            info!(
                "Converted {} → {} (session {}, track {})",
                input.display(),
                output.display(),
                session_id,
                track_id
            );
        }
        Command::Serve => {
            let addr = cfg.bind_addr();
            info!("FIFO: {}", cfg.paths.fifo.display());
            info!("Output directory: {}", cfg.paths.output_dir.display());

            let state = AppState::new(store, converter, cfg);
            let app = create_router(state.clone());

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("HTTP server listening on {}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Shutdown requested");
                })
                .await?;

            // Finish the running session so its last segment is converted
            if let Some(stats) = state.stop_active().await? {
                info!(
                    "Session {} finished with {} tracks",
                    stats.session_id, stats.tracks_converted
                );
            }
        }
    }

    Ok(())
}
