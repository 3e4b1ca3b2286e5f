/// Cadenza Headless - drive the player without audio output
use anyhow::Context;
use cadenza_core::{AlbumId, PlaylistId, Scope, ShuffleMode};
use cadenza_headless::{parse_scope, HeadlessConfig, ManifestLibrary, Session, Start};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cadenza-headless")]
#[command(about = "Cadenza player on simulated audio output", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Library manifest, overrides the configured one
    #[arg(short, long, global = true, env = "CADENZA_MANIFEST")]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play an album
    Album {
        /// Album id
        id: i64,
        /// Browsing scope (all, popular, recent, random, compilations,
        /// genre:<id>, artist:<id>); the album alone if omitted
        #[arg(short, long, value_parser = scope_arg)]
        scope: Option<Scope>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Play a user playlist
    Playlist {
        /// Playlist id
        id: i64,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Play a saved radio station
    Radio {
        /// Station name
        name: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Start party mode
    Party {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Resume from the saved state
    Resume {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Validate the library manifest and print a summary
    Check,
}

#[derive(Args)]
struct RunArgs {
    /// Virtual seconds to play
    #[arg(short = 't', long, default_value_t = 600)]
    seconds: u64,

    /// Virtual milliseconds between event reports
    #[arg(long, default_value_t = 1000)]
    step_ms: u64,

    /// Shuffle mode (none, tracks, albums, tracks_artist, albums_artist)
    #[arg(long, value_parser = shuffle_arg)]
    shuffle: Option<ShuffleMode>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn scope_arg(text: &str) -> Result<Scope, String> {
    parse_scope(text).map_err(|e| e.to_string())
}

fn shuffle_arg(text: &str) -> Result<ShuffleMode, String> {
    serde_json::from_value(serde_json::Value::String(text.to_ascii_lowercase()))
        .map_err(|_| format!("Unknown shuffle mode: {text}"))
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadenza_headless=info,cadenza_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = HeadlessConfig::load(cli.config.as_deref())?;
    if let Some(manifest) = cli.manifest {
        config.library.manifest = manifest;
    }
    config.validate()?;

    let library = ManifestLibrary::load(&config.library.manifest)
        .with_context(|| format!("Loading {}", config.library.manifest.display()))?;

    let (start, run) = match cli.command {
        Commands::Check => {
            check(&library);
            return Ok(());
        }
        Commands::Album { id, scope, run } => (
            Start::Album {
                album: AlbumId::new(id),
                scope,
            },
            run,
        ),
        Commands::Playlist { id, run } => (Start::Playlist(PlaylistId::new(id)), run),
        Commands::Radio { name, run } => (Start::Radio(name), run),
        Commands::Party { run } => (Start::Party, run),
        Commands::Resume { run } => (Start::Restore, run),
    };

    play(&config, library, &start, &run)
}

fn play(
    config: &HeadlessConfig,
    library: ManifestLibrary,
    start: &Start,
    run: &RunArgs,
) -> anyhow::Result<()> {
    let session = Session::new(config, library)?;
    if let Some(mode) = run.shuffle {
        session.set_shuffle(mode);
    }

    if !session.start(start)? {
        tracing::warn!("Nothing to play");
        return Ok(());
    }

    let report = session.run(
        Duration::from_secs(run.seconds),
        Duration::from_millis(run.step_ms),
    );
    session.save()?;

    if run.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for played in &report.played {
            println!("{:>8.1}s  {}  {}", played.at_ms as f64 / 1000.0, played.track_id, played.title);
        }
        for error in &report.errors {
            println!("error: {error}");
        }
        println!("final state: {:?}", report.final_state);
    }
    Ok(())
}

fn check(library: &ManifestLibrary) {
    println!("{} albums, {} tracks", library.albums().len(), library.track_count());
    for info in library.playlists() {
        println!("playlist {} '{}' ({} tracks)", info.id, info.name, info.len);
    }
    let missing = library.missing_tracks();
    if missing.is_empty() {
        println!("all tracks present");
    } else {
        for id in missing {
            println!("missing track {id}");
        }
    }
}
