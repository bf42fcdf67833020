use anyhow::{Context, Result};

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub user1_token: Option<String>,
    pub user2_token: Option<String>,
    pub tokens_path: String,
    pub history_path: String,
    pub always_include_path: String,
    pub block_artists_path: String,
    pub block_tracks_path: String,
    pub playlist_state_path: String,
}

/// Load configuration from `.env` and environment
pub fn load_config() -> Result<Config> {
    // Load `.env` file if present
    dotenv::dotenv().ok();

    let client_id = std::env::var("SPOTIFY_CLIENT_ID").context("SPOTIFY_CLIENT_ID is not set")?;
    let client_secret =
        std::env::var("SPOTIFY_CLIENT_SECRET").context("SPOTIFY_CLIENT_SECRET is not set")?;

    Ok(Config {
        client_id,
        client_secret,
        user1_token: optional_var("USER1_TOKEN"),
        user2_token: optional_var("USER2_TOKEN"),
        tokens_path: var_or("BLEND_TOKENS_PATH", ".tokens.json"),
        history_path: var_or("BLEND_HISTORY_PATH", ".blend-history.json"),
        always_include_path: var_or("BLEND_ALWAYS_INCLUDE_PATH", "always-include.json"),
        block_artists_path: var_or("BLEND_BLOCK_ARTISTS_PATH", "block-artists.json"),
        block_tracks_path: var_or("BLEND_BLOCK_TRACKS_PATH", "block-tracks.json"),
        playlist_state_path: var_or("BLEND_PLAYLIST_PATH", ".blend-playlist.json"),
    })
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    optional_var(name).unwrap_or_else(|| default.to_string())
}
