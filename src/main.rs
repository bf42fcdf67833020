use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use rand::SeedableRng;
use rand::rngs::StdRng;

mod blend;
mod client;
mod config;
mod models;
mod tokens;


use crate::blend::{
    BlendConfig, BlendGenerator, BlendHistory, BlendLists, TrackSource, shared_genres,
};
use crate::client::SpotifyClient;
use crate::config::load_config;
use crate::tokens::UserKey;

#[derive(Parser)]
#[command(name = "blend-generator")]
#[command(about = "Blend two Spotify users' listening into one shared playlist")]
#[command(version)]
struct Args {
    /// Path to the blend configuration JSON file; defaults apply when absent
    #[arg(short = 'c', long = "config")]
    config_file: Option<String>,

    /// Enable debug mode - print the blend to stdout instead of publishing it
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Quiet mode - reduce output verbosity
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Seed for the final shuffle, for reproducible blends
    #[arg(long = "seed")]
    seed: Option<u64>,
}

/// Progress output, silenced by `--quiet`
macro_rules! report {
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            println!($($arg)*);
        }
    };
}

const SUMMARY_SOURCES: [TrackSource; 9] = [
    TrackSource::AlwaysInclude,
    TrackSource::Classic,
    TrackSource::SharedRecent,
    TrackSource::SharedArtist,
    TrackSource::Discovery,
    TrackSource::WildDiscovery,
    TrackSource::WildDiversity,
    TrackSource::Diversity,
    TrackSource::Repeat,
];

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    // Load configuration from .env
    let config = load_config()?;

    let blend_config = match &args.config_file {
        Some(path) => match BlendConfig::load_or_default(path) {
            Ok(blend_config) => blend_config,
            Err(e) => {
                eprintln!("Failed to load blend configuration: {e:#}");
                return Err(e);
            }
        },
        None => BlendConfig::default(),
    };

    let client = SpotifyClient::new(&config);
    if !client.has_token(UserKey::User1) {
        eprintln!("Error: no access token found for either user.");
        eprintln!("Authorize at least one user and store the token in {}.", config.tokens_path);
        return Err(anyhow::anyhow!("No access token available"));
    }
    if client.is_single_user() {
        report!(args.quiet, "Only one account is authorized - blending it with itself.");
    }

    report!(args.quiet, "Fetching listening data...");
    let user1 = client.fetch_snapshot(UserKey::User1)?;
    let user2 = client.fetch_snapshot(UserKey::User2)?;
    report!(
        args.quiet,
        "✓ Fetched data for {} and {}",
        user1.user.label(),
        user2.user.label()
    );

    let lists = BlendLists::load(
        &config.always_include_path,
        &config.block_artists_path,
        &config.block_tracks_path,
    );
    let mut history = BlendHistory::load(&config.history_path);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    report!(args.quiet, "\nGenerating {:?} blend...", blend_config.blend_style);
    let generator = BlendGenerator::new(blend_config, lists, history.clone());
    let blend = generator.generate_blend(&user1, &user2, &client, &mut rng);

    history.record(blend.selected_ids.clone());
    history.save(&config.history_path);

    report!(args.quiet, "\n=== BLEND SUMMARY ===");
    report!(
        args.quiet,
        "Tracks: {} | Unique Artists: {}",
        blend.metadata.total_tracks, blend.metadata.artist_count
    );
    for source in SUMMARY_SOURCES {
        if blend.metadata.source_distribution.contains_key(&source) {
            report!(args.quiet, "   {source}: {}%", blend.metadata.source_percent(source));
        }
    }
    let genres = shared_genres(&user1, &user2);
    if !genres.is_empty() {
        let top: Vec<&str> = genres.iter().take(3).map(String::as_str).collect();
        report!(args.quiet, "   Shared Genres: {}", top.join(", "));
    }

    if blend.tracks.is_empty() {
        report!(args.quiet, "\nNo tracks were selected - nothing to publish.");
        return Ok(());
    }

    if args.debug {
        println!("\n🔍 DEBUG MODE: blend would be published to a playlist");
        for (i, blend_track) in blend.tracks.iter().enumerate() {
            let track = &blend_track.track;
            let artist = track.main_artist().map(|a| a.name.as_str()).unwrap_or("?");
            println!(
                "     {}. \"{}\" by {} [{}] | ID: {}",
                i + 1,
                track.name,
                artist,
                blend_track.source,
                track.id
            );
        }
        return Ok(());
    }

    let uris: Vec<String> = blend
        .tracks
        .iter()
        .filter(|t| !t.track.uri.is_empty())
        .map(|t| t.track.uri.clone())
        .collect();

    report!(args.quiet, "\n🎵 Publishing blend...");
    match client.publish_blend(&user1.user, &user2.user, &uris, &config.playlist_state_path) {
        Ok(url) => {
            println!("✓ Blend published: {url}");
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Failed to publish blend: {e:#}");
            Err(e)
        }
    }
}
