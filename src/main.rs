use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use clipfetch::config::load_config;
use clipfetch::{
    Clipfetch, DownloadOutcome, DownloadRequest, DownloadSession, VideoInfo, YtDlpProgressParser,
};

// --- Command-Line Argument Parsing ---
#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch video info and download media with yt-dlp.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show title, author, duration and the available formats of a video.
    Info {
        url: String,
        /// Print the normalized record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Download a video. Ctrl-C cancels.
    Download {
        /// Video URL or id.
        target: String,
        /// A format id from `info`, or "best".
        #[arg(short, long, default_value = "best")]
        format: String,
        /// Destination directory. Defaults to the configured download directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Update the yt-dlp executable itself.
    Update,
    /// Print which yt-dlp executable would be used.
    Locate,
}

// --- Main Application Logic ---
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config().await?;
    let session = DownloadSession::with_parser(Arc::new(YtDlpProgressParser), config.progress_buffer);
    let client = Clipfetch::with_session(config.packaging_context(), session)
        .metadata_timeout(config.metadata_timeout());

    match cli.command {
        Commands::Info { url, json } => {
            let info = client.fetch_video_info(&url).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&info);
            }
        }
        Commands::Download { target, format, output } => {
            let destination = output.unwrap_or_else(|| PathBuf::from(&config.download_directory));
            tokio::fs::create_dir_all(&destination)
                .await
                .with_context(|| format!("Could not create {}", destination.display()))?;
            let request = DownloadRequest {
                target,
                format_id: format,
                destination,
            };
            run_download(&client, &request).await?;
        }
        Commands::Update => {
            let report = client.update_downloader_binary().await?;
            println!("{}", report.message.trim());
        }
        Commands::Locate => println!("{}", client.locate()),
    }

    Ok(())
}

async fn run_download(client: &Clipfetch, request: &DownloadRequest) -> anyhow::Result<()> {
    let mut handle = client.start_download(request)?;

    loop {
        tokio::select! {
            event = handle.progress.recv() => match event {
                Some(p) => eprintln!(
                    "{:>5.1}%  {:>12}  ETA {:>6}  {} / {}",
                    p.percent, p.speed, p.eta, p.downloaded, p.total
                ),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                client.cancel_download();
                break;
            }
        }
    }

    match handle.wait().await? {
        DownloadOutcome::Completed => println!("Saved to {}", request.destination.display()),
        DownloadOutcome::Cancelled => println!("Download cancelled."),
    }
    Ok(())
}

fn print_info(info: &VideoInfo) {
    println!("{}", info.title);
    println!("  by {} on {} ({})", info.author, info.platform, info.duration);
    if !info.thumbnail.is_empty() {
        println!("  thumbnail: {}", info.thumbnail);
    }
    println!("  formats:");
    for format in &info.formats {
        let size = format
            .filesize
            .map(|bytes| format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0)))
            .unwrap_or_else(|| "?".to_string());
        println!("    {:<12} {:<8} {:<4} {}", format.format_id, format.quality, format.ext, size);
    }
}
