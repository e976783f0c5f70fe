use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use louvor_backend::cache::{CachedCatalog, SystemClock};
use louvor_backend::config::AppConfig;
use louvor_backend::{LocalStore, RepertoireService, RosterScheduler, RosterService, SongCatalog, SongLibrary};
use louvor_types::{SlotPosition, Song, SongId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

// ─── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "louvor", about = "Worship team repertoire and duty roster")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    /// Seed the shuffles for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Yearly Sunday duty roster
    #[command(subcommand)]
    Roster(RosterCommand),
    /// Weekly six-song repertoire
    #[command(subcommand)]
    Repertoire(RepertoireCommand),
    /// Song catalog
    #[command(subcommand)]
    Songs(SongsCommand),
}

#[derive(Subcommand, Debug)]
enum RosterCommand {
    /// Generate one entry per Sunday (defaults to next year)
    Generate {
        #[arg(long)]
        year: Option<i32>,
        /// Delete existing entries for the year first
        #[arg(long)]
        replace: bool,
    },
    Show {
        #[arg(long)]
        year: Option<i32>,
    },
    Clear {
        #[arg(long)]
        year: i32,
    },
}

#[derive(Subcommand, Debug)]
enum RepertoireCommand {
    /// Fill the current week automatically
    Generate,
    Show,
    /// Set all six positions, in order
    Set {
        #[arg(num_args = 6, required = true)]
        songs: Vec<SongId>,
    },
    /// Replace the song at one position
    Swap {
        #[arg(value_parser = parse_position)]
        position: SlotPosition,
        song: SongId,
    },
    Remove {
        #[arg(value_parser = parse_position)]
        position: SlotPosition,
    },
    /// Report integrity problems in the current week
    Check {
        /// Regenerate the week if problems are found
        #[arg(long)]
        repair: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SongsCommand {
    List,
    Show {
        id: SongId,
    },
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        lyrics: String,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        chords: Option<String>,
        #[arg(long)]
        media_url: Option<String>,
        /// Mark as the new song of the week
        #[arg(long)]
        featured: bool,
    },
    Delete {
        id: SongId,
    },
}

fn parse_position(raw: &str) -> Result<SlotPosition, String> {
    let n: u8 = raw.parse().map_err(|_| format!("not a position: {raw}"))?;
    SlotPosition::try_from(n)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "louvor_backend=info,louvor=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;

    let store = LocalStore::open(&config.data_file)
        .await
        .with_context(|| format!("opening store {}", config.data_file.display()))?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let now = Utc::now();

    match args.command {
        Command::Roster(cmd) => {
            let scheduler = RosterScheduler::new(config.roster.roster_config())?;
            let roster = RosterService::new(store.clone(), scheduler, config.roster.min_year);
            let next_year = now.year() + 1;

            match cmd {
                RosterCommand::Generate { year, replace } => {
                    let year = year.unwrap_or(next_year);
                    let entries = if replace {
                        roster.regenerate_year(year, &mut rng).await?
                    } else {
                        roster.generate_year(year, &mut rng).await?
                    };
                    print_json(&entries)?;
                }
                RosterCommand::Show { year } => {
                    print_json(&roster.entries_for_year(year.unwrap_or(next_year)).await?)?;
                }
                RosterCommand::Clear { year } => {
                    let deleted = roster.clear_year(year).await?;
                    print_json(&serde_json::json!({ "year": year, "deleted": deleted }))?;
                }
            }
        }
        Command::Repertoire(cmd) => {
            let catalog = CachedCatalog::new(store.clone(), config.catalog_cache_ttl(), SystemClock);
            let repertoire = RepertoireService::new(catalog, store.clone(), config.timezone()?);

            match cmd {
                RepertoireCommand::Generate => print_json(&repertoire.generate_current_week(now, &mut rng).await?)?,
                RepertoireCommand::Show => print_json(&repertoire.current_week(now).await?)?,
                RepertoireCommand::Set { songs } => print_json(&repertoire.set_manual(now, &songs).await?)?,
                RepertoireCommand::Swap { position, song } => {
                    print_json(&repertoire.swap_slot(now, position, song).await?)?
                }
                RepertoireCommand::Remove { position } => {
                    repertoire.remove_slot(now, position).await?;
                    info!("Position {position} removed");
                }
                RepertoireCommand::Check { repair } => {
                    let issues = if repair {
                        repertoire.repair_week(now, &mut rng).await?
                    } else {
                        repertoire.audit_week(now).await?
                    };
                    if issues.is_empty() {
                        info!("✅ Repertoire is consistent");
                    }
                    print_json(&issues)?;
                }
            }
        }
        Command::Songs(cmd) => match cmd {
            SongsCommand::List => print_json(&store.list_songs().await?)?,
            SongsCommand::Show { id } => match store.find_song(id).await? {
                Some(song) => print_json(&song)?,
                None => anyhow::bail!("song {id} not found"),
            },
            SongsCommand::Add {
                title,
                lyrics,
                artist,
                chords,
                media_url,
                featured,
            } => {
                let mut song = Song::new(title, lyrics);
                if let Some(artist) = artist {
                    song = song.with_artist(artist);
                }
                if let Some(chords) = chords {
                    song = song.with_chords(chords);
                }
                if let Some(url) = media_url {
                    song = song.with_media_url(url);
                }
                if featured {
                    song = song.featured();
                }
                store.save_song(song.clone()).await?;
                print_json(&song)?;
            }
            SongsCommand::Delete { id } => {
                if !store.delete_song(id).await? {
                    anyhow::bail!("song {id} not found");
                }
                info!("Song {id} deleted");
            }
        },
    }

    Ok(())
}
