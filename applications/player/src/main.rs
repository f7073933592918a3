/// Cadence - gapless command-line audio player
use cadence_player::{
    config::PlayerConfig,
    player::{self, PlayOptions},
};
use cadence_playback::RepeatMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Gapless audio player", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./cadence.toml if present)
    #[arg(short, long, global = true, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play files and directories
    Play {
        /// Files or directories to play
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Start in shuffle mode
        #[arg(long)]
        shuffle: bool,
        /// Repeat mode: off, set or file
        #[arg(long, default_value = "off")]
        repeat: RepeatMode,
    },
    /// Read tags of every supported file and print a summary
    Scan {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=info,cadence_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = PlayerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            paths,
            shuffle,
            repeat,
        } => {
            player::play(
                config,
                PlayOptions {
                    paths,
                    shuffle,
                    repeat,
                },
            )
            .await?;
        }
        Commands::Scan { paths } => {
            scan(&config, &paths).await?;
        }
    }

    Ok(())
}

async fn scan(config: &PlayerConfig, paths: &[PathBuf]) -> anyhow::Result<()> {
    let batch = player::scan(config, paths).await?;

    for imported in &batch.tracks {
        let metadata = &imported.metadata;
        println!(
            "{}\t{}\t{}\t{}",
            imported.track,
            metadata.title.as_deref().unwrap_or("-"),
            if metadata.performers.is_empty() {
                "-".to_string()
            } else {
                metadata.performers.join(", ")
            },
            metadata.album.as_deref().unwrap_or("-"),
        );
    }
    for failure in &batch.failures {
        eprintln!("failed: {} ({})", failure.track, failure.reason);
    }
    println!(
        "{} files found, {} imported, {} failed",
        batch.files_discovered,
        batch.tracks.len(),
        batch.failures.len()
    );
    Ok(())
}
