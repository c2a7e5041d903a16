use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mp4_to_mp3::{
    create_router, AppState, Config, ConversionSession, EngineHandle, InputFile, SessionSnapshot,
    Status,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mp4-to-mp3")]
#[command(about = "Extract the audio track of an MP4 file as MP3", version)]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/mp4-to-mp3")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert one file and save the MP3 next to it or in --out-dir
    Convert {
        /// MP4 file to convert
        input: PathBuf,

        /// Directory the MP3 is saved to
        #[arg(short, long)]
        out_dir: Option<String>,
    },

    /// Serve the HTTP API
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level)),
        )
        .init();

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let engine = Arc::new(EngineHandle::ffmpeg(cfg.engine.ffmpeg_config()));

    match args.command {
        Command::Convert { input, out_dir } => convert(&cfg, engine, input, out_dir).await,
        Command::Serve { bind, port } => serve(&cfg, engine, bind, port).await,
    }
}

/// One line per view, as a drop zone would render it
fn describe(snapshot: &SessionSnapshot) -> String {
    let name = snapshot
        .input
        .as_ref()
        .map(|input| input.name.as_str())
        .unwrap_or_default();

    match snapshot.status {
        Status::Idle => "Waiting for an MP4 file".to_string(),
        Status::EngineLoading => "Loading conversion engine...".to_string(),
        Status::Converting => format!("Converting {}: {}%", name, snapshot.progress),
        Status::Done => format!("Converted {} -> {}", name, snapshot.output_name()),
        Status::Error => snapshot
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Conversion failed".to_string()),
    }
}

async fn convert(
    cfg: &Config,
    engine: Arc<EngineHandle>,
    input: PathBuf,
    out_dir: Option<String>,
) -> Result<()> {
    let out_dir = match out_dir {
        Some(dir) => PathBuf::from(shellexpand::tilde(&dir).into_owned()),
        None => input
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let session = ConversionSession::new(engine, cfg.session.clone());
    let mut updates = session.subscribe();

    let renderer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            match snapshot.status {
                Status::EngineLoading => info!("{}", describe(&snapshot)),
                Status::Converting => {
                    print!("\r{}", describe(&snapshot));
                    std::io::stdout().flush().ok();
                }
                _ => {}
            }
        }
    });

    let file = InputFile::open(&input).await?;
    let snapshot = session.submit(file).await?;
    renderer.abort();
    println!();

    if snapshot.status != Status::Done {
        error!("{}", describe(&snapshot));
        bail!("Conversion of {} failed", input.display());
    }

    info!("{}", describe(&snapshot));

    let download = session
        .download()
        .context("Converted output is no longer available")?;
    let path = download.save(&out_dir).await?;

    if let Some(summary) = snapshot.output.as_ref().and_then(|o| o.summary.as_ref()) {
        info!(
            "{}: {}Hz, {} channels{}",
            path.display(),
            summary.sample_rate,
            summary.channels,
            summary
                .duration_seconds
                .map(|d| format!(", {:.1}s", d))
                .unwrap_or_default()
        );
    }

    Ok(())
}

async fn serve(
    cfg: &Config,
    engine: Arc<EngineHandle>,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let bind = bind.unwrap_or_else(|| cfg.http.bind.clone());
    let port = port.unwrap_or(cfg.http.port);
    let addr = format!("{}:{}", bind, port);

    let state = AppState::new(engine, cfg.session.clone())
        .with_max_upload_bytes(cfg.http.max_upload_bytes);
    if cfg.http.session_idle_secs > 0 {
        state.spawn_idle_sweeper(Duration::from_secs(cfg.http.session_idle_secs));
    }
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on http://{}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}
