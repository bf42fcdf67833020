use crate::blend::catalog::{RecommendationSeeds, TrackCatalog};
use crate::blend::history::read_json;
use crate::config::Config;
use crate::models::{
    AlbumSummary, Artist, AudioFeatures, AudioFeaturesResponse, FollowedArtistsResponse, Paging,
    PlayHistoryItem, PlaylistInfo, PlaylistSummary, Pool, RecommendationsResponse, SavedAlbumItem,
    Track, TrackItem, UserProfile, UserSnapshot, pool_from_values,
};
use crate::tokens::{TokenStore, UserKey};
use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use ureq::Agent;
use urlencoding::encode;

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const AUDIO_FEATURES_BATCH: usize = 100;
const PLAYLIST_ADD_BATCH: usize = 100;

/// Failure of a single authenticated request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("access token was rejected")]
    Unauthorized,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("no access token available for {0}")]
    NoToken(UserKey),
}

impl From<ureq::Error> for FetchError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::Status(401, _) => FetchError::Unauthorized,
            ureq::Error::Status(status, response) => FetchError::Status {
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => FetchError::Transport(transport.to_string()),
        }
    }
}

impl FetchError {
    fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status: 404, .. })
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Remembers which playlist the blend is published to
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistState {
    playlist_id: Option<String>,
}

/// One participant's access token and the token-store entry it came from
struct Session {
    token: Mutex<Option<String>>,
    /// Key whose refresh token renews this session's token
    owner: UserKey,
}

impl Session {
    fn new(entry: Option<(String, UserKey)>, default_owner: UserKey) -> Self {
        let owner = entry.as_ref().map_or(default_owner, |(_, owner)| *owner);
        Session {
            token: Mutex::new(entry.map(|(token, _)| token)),
            owner,
        }
    }
}

/// A Spotify Web API client acting for both blend participants
pub struct SpotifyClient {
    agent: Agent,
    api_base: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    store: TokenStore,
    user1: Session,
    user2: Session,
    refresh_lock: Mutex<()>,
}

impl SpotifyClient {
    /// Create a client; tokens come from the token store, falling back to the environment.
    /// When only one user has a token, both users share it and refresh it through its owner.
    pub fn new(config: &Config) -> Self {
        let store = TokenStore::new(&config.tokens_path);
        let own1 = store
            .access_token(UserKey::User1)
            .or_else(|| config.user1_token.clone())
            .map(|token| (token, UserKey::User1));
        let own2 = store
            .access_token(UserKey::User2)
            .or_else(|| config.user2_token.clone())
            .map(|token| (token, UserKey::User2));

        let (entry1, entry2) = match (own1, own2) {
            (Some(first), None) => (Some(first.clone()), Some(first)),
            (None, Some(second)) => (Some(second.clone()), Some(second)),
            both => both,
        };

        SpotifyClient {
            agent: Agent::new(),
            api_base: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            store,
            user1: Session::new(entry1, UserKey::User1),
            user2: Session::new(entry2, UserKey::User2),
            refresh_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    fn with_endpoints(mut self, api_base: &str, token_url: &str) -> Self {
        self.api_base = api_base.to_string();
        self.token_url = token_url.to_string();
        self
    }

    fn session(&self, user: UserKey) -> &Session {
        match user {
            UserKey::User1 => &self.user1,
            UserKey::User2 => &self.user2,
        }
    }

    pub fn has_token(&self, user: UserKey) -> bool {
        self.session(user).token.lock().is_some()
    }

    /// Both users act with the same account's token
    pub fn is_single_user(&self) -> bool {
        self.user1.owner == self.user2.owner
    }

    fn current_token(&self, user: UserKey) -> Result<String, FetchError> {
        self.session(user)
            .token
            .lock()
            .clone()
            .ok_or(FetchError::NoToken(user))
    }

    /// Replace a rejected access token using the owner's stored refresh token.
    /// Refreshes are serialized; a caller whose token was already replaced gets the new one.
    fn refresh_access_token(&self, user: UserKey, rejected: &str) -> Result<String, FetchError> {
        let _guard = self.refresh_lock.lock();
        let session = self.session(user);

        let current = session.token.lock().clone();
        if let Some(current) = current.filter(|token| token != rejected) {
            debug!("Token for {user} was already refreshed");
            return Ok(current);
        }

        let owner = session.owner;
        let refresh_token = self
            .store
            .refresh_token(owner)
            .ok_or_else(|| FetchError::Refresh(format!("no refresh token stored for {owner}")))?;

        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .agent
            .post(&self.token_url)
            .set("Authorization", &format!("Basic {credentials}"))
            .send_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .map_err(|e| FetchError::Refresh(e.to_string()))?;

        let refreshed: RefreshResponse = response
            .into_json()
            .map_err(|e| FetchError::Refresh(e.to_string()))?;

        if let Err(e) = self
            .store
            .update_access_token(owner, &refreshed.access_token, refreshed.expires_in)
        {
            warn!("Refreshed token for {owner} could not be saved: {e:#}");
        }
        for session in [&self.user1, &self.user2] {
            if session.owner == owner {
                *session.token.lock() = Some(refreshed.access_token.clone());
            }
        }

        info!("Refreshed access token for {owner}");
        Ok(refreshed.access_token)
    }

    /// Run a request with the user's token. A rejected token is refreshed once and the
    /// request retried once; every other failure is returned as is.
    pub fn with_refresh<T>(
        &self,
        user: UserKey,
        request: impl Fn(&str) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let token = self.current_token(user)?;
        match request(&token) {
            Err(FetchError::Unauthorized) => {
                debug!("Token for {user} rejected, refreshing");
                let token = self.refresh_access_token(user, &token)?;
                request(&token)
            }
            other => other,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, user: UserKey, url: &str) -> Result<T, FetchError> {
        self.with_refresh(user, |token| {
            let response = self
                .agent
                .get(url)
                .set("Authorization", &format!("Bearer {token}"))
                .call()?;
            response
                .into_json::<T>()
                .map_err(|e| FetchError::Decode(e.to_string()))
        })
    }

    /// Follow `next` links until the listing is exhausted
    fn get_paged<T: DeserializeOwned>(&self, user: UserKey, first_url: String) -> Result<Vec<T>, FetchError> {
        let mut items = Vec::new();
        let mut next = Some(first_url);
        while let Some(url) = next {
            let page: Paging<T> = self.get_json(user, &url)?;
            items.extend(page.items);
            next = page.next;
        }
        Ok(items)
    }

    fn top_tracks(&self, user: UserKey, time_range: &str) -> Result<Pool, FetchError> {
        let api = &self.api_base;
        let url = format!("{api}/me/top/tracks?time_range={time_range}&limit=50");
        let page: Paging<serde_json::Value> = self.get_json(user, &url)?;
        Ok(pool_from_values(page.items))
    }

    fn top_artists(&self, user: UserKey) -> Result<Vec<Artist>, FetchError> {
        let api = &self.api_base;
        let url = format!("{api}/me/top/artists?time_range=medium_term&limit=20");
        let page: Paging<Artist> = self.get_json(user, &url)?;
        Ok(page.items)
    }

    /// Recently played tracks, stamped with when they were played
    fn recent_tracks(&self, user: UserKey) -> Result<Pool, FetchError> {
        let api = &self.api_base;
        let url = format!("{api}/me/player/recently-played?limit=50");
        let page: Paging<PlayHistoryItem> = self.get_json(user, &url)?;
        Ok(page
            .items
            .into_iter()
            .map(|item| {
                let played_at = item.played_at;
                item.track
                    .and_then(|value| serde_json::from_value::<Track>(value).ok())
                    .map(|mut track| {
                        track.last_played = track.last_played.or(played_at);
                        track
                    })
            })
            .collect())
    }

    fn liked_songs(&self, user: UserKey) -> Result<Pool, FetchError> {
        let api = &self.api_base;
        let items: Vec<TrackItem> = self.get_paged(user, format!("{api}/me/tracks?limit=50"))?;
        Ok(pool_from_values(items.into_iter().filter_map(|item| item.track).collect()))
    }

    /// Every track of an album, following the embedded page's `next` link when present
    fn album_tracks(&self, user: UserKey, album: AlbumSummary) -> Vec<serde_json::Value> {
        let api = &self.api_base;
        let (mut items, next) = match album.tracks {
            Some(page) => (page.items, page.next),
            None => (Vec::new(), Some(format!("{api}/albums/{}/tracks?limit=50", album.id))),
        };

        if let Some(url) = next {
            match self.get_paged::<serde_json::Value>(user, url) {
                Ok(rest) => items.extend(rest),
                Err(e) => warn!("Skipping tracks of album {} ({}): {e}", album.name, album.id),
            }
        }
        items
    }

    fn saved_album_tracks(&self, user: UserKey) -> Result<Pool, FetchError> {
        let api = &self.api_base;
        let albums: Vec<SavedAlbumItem> = self.get_paged(user, format!("{api}/me/albums?limit=20"))?;
        Ok(pool_from_values(
            albums
                .into_iter()
                .flat_map(|item| self.album_tracks(user, item.album))
                .collect(),
        ))
    }

    /// Tracks from the user's public and collaborative playlists
    fn playlist_tracks(&self, user: UserKey) -> Result<Pool, FetchError> {
        let api = &self.api_base;
        let playlists: Vec<PlaylistSummary> =
            self.get_paged(user, format!("{api}/me/playlists?limit=20"))?;

        let mut values = Vec::new();
        for playlist in playlists
            .into_iter()
            .filter(|p| p.public == Some(true) || p.collaborative)
        {
            let url = format!("{api}/playlists/{}/tracks?limit=100", playlist.id);
            match self.get_paged::<TrackItem>(user, url) {
                Ok(items) => values.extend(items.into_iter().filter_map(|item| item.track)),
                Err(e) => warn!("Skipping playlist {} ({}): {e}", playlist.name, playlist.id),
            }
        }
        Ok(pool_from_values(values))
    }

    fn followed_artists(&self, user: UserKey) -> Result<Vec<Artist>, FetchError> {
        let api = &self.api_base;
        let mut artists = Vec::new();
        let mut next = Some(format!("{api}/me/following?type=artist&limit=50"));
        while let Some(url) = next {
            let page: FollowedArtistsResponse = self.get_json(user, &url)?;
            artists.extend(page.artists.items);
            next = page.artists.next;
        }
        Ok(artists)
    }

    /// Tracks from the latest albums and singles of every followed artist
    fn new_release_tracks(&self, user: UserKey) -> Result<Pool, FetchError> {
        let api = &self.api_base;
        let mut values = Vec::new();
        for artist in self.followed_artists(user)? {
            let url = format!(
                "{api}/artists/{}/albums?include_groups=album,single&limit=5",
                artist.id
            );
            match self.get_json::<Paging<AlbumSummary>>(user, &url) {
                Ok(page) => {
                    for album in page.items {
                        values.extend(self.album_tracks(user, album));
                    }
                }
                Err(e) => warn!("Skipping new releases of artist {}: {e}", artist.id),
            }
        }
        Ok(pool_from_values(values))
    }

    /// Fetch everything a user contributes to a blend. The requests run concurrently;
    /// any top-level failure aborts the snapshot.
    pub fn fetch_snapshot(&self, user: UserKey) -> Result<UserSnapshot> {
        let api = &self.api_base;
        let mut profile = None;
        let mut short_term = None;
        let mut medium_term = None;
        let mut long_term = None;
        let mut recent_tracks = None;
        let mut artists = None;
        let mut liked_songs = None;
        let mut saved_album_tracks = None;
        let mut playlist_tracks = None;
        let mut new_release_tracks = None;

        rayon::scope(|s| {
            s.spawn(|_| profile = Some(self.get_json::<UserProfile>(user, &format!("{api}/me"))));
            s.spawn(|_| short_term = Some(self.top_tracks(user, "short_term")));
            s.spawn(|_| medium_term = Some(self.top_tracks(user, "medium_term")));
            s.spawn(|_| long_term = Some(self.top_tracks(user, "long_term")));
            s.spawn(|_| recent_tracks = Some(self.recent_tracks(user)));
            s.spawn(|_| artists = Some(self.top_artists(user)));
            s.spawn(|_| liked_songs = Some(self.liked_songs(user)));
            s.spawn(|_| saved_album_tracks = Some(self.saved_album_tracks(user)));
            s.spawn(|_| playlist_tracks = Some(self.playlist_tracks(user)));
            s.spawn(|_| new_release_tracks = Some(self.new_release_tracks(user)));
        });

        let snapshot = UserSnapshot {
            user: joined(profile, "profile", user)?,
            short_term: joined(short_term, "short-term top tracks", user)?,
            medium_term: joined(medium_term, "medium-term top tracks", user)?,
            long_term: joined(long_term, "long-term top tracks", user)?,
            recent_tracks: joined(recent_tracks, "recently played tracks", user)?,
            artists: joined(artists, "top artists", user)?,
            liked_songs: joined(liked_songs, "liked songs", user)?,
            saved_album_tracks: joined(saved_album_tracks, "saved albums", user)?,
            playlist_tracks: joined(playlist_tracks, "playlist tracks", user)?,
            new_release_tracks: joined(new_release_tracks, "new releases", user)?,
        };

        info!(
            "Fetched snapshot for {} ({}): {} liked, {} album, {} playlist, {} new-release tracks",
            user,
            snapshot.user.label(),
            snapshot.liked_songs.len(),
            snapshot.saved_album_tracks.len(),
            snapshot.playlist_tracks.len(),
            snapshot.new_release_tracks.len()
        );
        Ok(snapshot)
    }

    /// The session used for catalog lookups: user1's when available, else user2's
    fn catalog_user(&self) -> UserKey {
        if self.has_token(UserKey::User1) {
            UserKey::User1
        } else {
            UserKey::User2
        }
    }

    /// Publish the blend to user1's account, reusing the remembered playlist when it still exists
    pub fn publish_blend(
        &self,
        owner: &UserProfile,
        partner: &UserProfile,
        track_uris: &[String],
        state_path: &str,
    ) -> Result<String> {
        let api = &self.api_base;
        let user = UserKey::User1;
        let name = format!("{} + {}", owner.label(), partner.label());

        let remembered = read_json::<PlaylistState>(std::path::Path::new(state_path))
            .unwrap_or_default()
            .playlist_id;

        let existing = match remembered {
            Some(id) => match self.get_json::<PlaylistInfo>(user, &format!("{api}/playlists/{id}")) {
                Ok(playlist) => Some(playlist),
                Err(e) => {
                    info!("Remembered playlist {id} is unavailable ({e}), creating a new one");
                    None
                }
            },
            None => None,
        };

        let playlist = match existing {
            Some(playlist) => {
                self.send_json(user, "PUT", &format!("{api}/playlists/{}/tracks", playlist.id), serde_json::json!({ "uris": [] }))
                    .with_context(|| format!("Failed to clear playlist '{}'", playlist.name))?;
                playlist
            }
            None => {
                let body = serde_json::json!({
                    "name": name,
                    "description": format!("Generated blend for {name}"),
                    "public": false,
                    "collaborative": true,
                });
                let created: PlaylistInfo = self
                    .send_json(user, "POST", &format!("{api}/users/{}/playlists", encode(&owner.id)), body)
                    .context("Failed to create blend playlist")?
                    .into_json()
                    .context("Failed to decode created playlist")?;

                let state = PlaylistState {
                    playlist_id: Some(created.id.clone()),
                };
                if let Err(e) = std::fs::write(state_path, serde_json::to_string(&state)?) {
                    warn!("Could not remember playlist id in {state_path}: {e}");
                }
                created
            }
        };

        for batch in track_uris.chunks(PLAYLIST_ADD_BATCH) {
            self.send_json(
                user,
                "POST",
                &format!("{api}/playlists/{}/tracks", playlist.id),
                serde_json::json!({ "uris": batch }),
            )
            .with_context(|| format!("Failed to add tracks to playlist '{}'", playlist.name))?;
        }

        Ok(playlist
            .external_urls
            .spotify
            .unwrap_or_else(|| format!("https://open.spotify.com/playlist/{}", playlist.id)))
    }

    fn send_json(
        &self,
        user: UserKey,
        method: &str,
        url: &str,
        body: serde_json::Value,
    ) -> Result<ureq::Response, FetchError> {
        self.with_refresh(user, |token| {
            Ok(self
                .agent
                .request(method, url)
                .set("Authorization", &format!("Bearer {token}"))
                .send_json(body.clone())?)
        })
    }
}

fn joined<T>(slot: Option<Result<T, FetchError>>, what: &str, user: UserKey) -> Result<T> {
    slot.ok_or_else(|| anyhow!("{what} request for {user} did not run"))?
        .with_context(|| format!("Failed to fetch {what} for {user}"))
}

impl TrackCatalog for SpotifyClient {
    fn lookup_track(&self, id: &str) -> Result<Option<Track>> {
        let api = &self.api_base;
        let url = format!("{api}/tracks/{}", encode(id));
        match self.get_json::<serde_json::Value>(self.catalog_user(), &url) {
            Ok(value) => Ok(serde_json::from_value(value).ok()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn recommendations(&self, seeds: &RecommendationSeeds, limit: usize) -> Result<Vec<Option<Track>>> {
        let api = &self.api_base;
        let mut url = format!("{api}/recommendations?limit={limit}");
        for (key, values) in [
            ("seed_artists", &seeds.artists),
            ("seed_genres", &seeds.genres),
            ("seed_tracks", &seeds.tracks),
        ] {
            if !values.is_empty() {
                url.push_str(&format!("&{key}={}", encode(&values.join(","))));
            }
        }

        let response: RecommendationsResponse = self.get_json(self.catalog_user(), &url)?;
        Ok(response.tracks)
    }

    fn audio_features(&self, ids: &[String]) -> Result<HashMap<String, AudioFeatures>> {
        let api = &self.api_base;
        let mut features = HashMap::new();
        let mut failures = 0;
        let batches = ids.chunks(AUDIO_FEATURES_BATCH);
        let batch_count = batches.len();

        for batch in batches {
            let url = format!("{api}/audio-features?ids={}", batch.join(","));
            match self.get_json::<AudioFeaturesResponse>(self.catalog_user(), &url) {
                Ok(response) => {
                    for entry in response.audio_features.into_iter().flatten() {
                        if !entry.id.is_empty() {
                            features.insert(entry.id.clone(), entry);
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch audio features for {} tracks: {e}", batch.len());
                    failures += 1;
                }
            }
        }

        if batch_count > 0 && failures == batch_count {
            return Err(anyhow!("every audio feature request failed"));
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::JoinHandle;

    /// Local HTTP endpoint answering one connection per canned JSON body, in order.
    /// Joining the handle yields the raw requests it received.
    fn serve(bodies: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let mut requests = Vec::new();
            for body in bodies {
                let (mut stream, _) = listener.accept().unwrap();
                requests.push(read_request(&mut stream));
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
            requests
        });
        (base, handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut reader = BufReader::new(stream);
        let mut request = String::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
            request.push_str(&line);
        }
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).unwrap();
        request.push_str(&String::from_utf8_lossy(&body));
        request
    }

    /// A request that only accepts tokens other than "old"
    fn rejects_old(token: &str) -> Result<String, FetchError> {
        if token == "old" {
            Err(FetchError::Unauthorized)
        } else {
            Ok(token.to_string())
        }
    }

    fn config(tokens_path: &str, user1: Option<&str>, user2: Option<&str>) -> Config {
        Config {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            user1_token: user1.map(str::to_string),
            user2_token: user2.map(str::to_string),
            tokens_path: tokens_path.to_string(),
            history_path: String::new(),
            always_include_path: String::new(),
            block_artists_path: String::new(),
            block_tracks_path: String::new(),
            playlist_state_path: String::new(),
        }
    }

    #[test]
    fn test_single_token_is_shared_by_both_users() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let client = SpotifyClient::new(&config(path.to_str().unwrap(), None, Some("only")));

        assert!(client.has_token(UserKey::User1));
        assert!(client.is_single_user());
        assert_eq!(client.current_token(UserKey::User1).unwrap(), "only");
        assert_eq!(client.catalog_user(), UserKey::User1);
    }

    #[test]
    fn test_stored_tokens_take_precedence_over_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, r#"{"user": {"accessToken": "stored"}}"#).unwrap();

        let client = SpotifyClient::new(&config(path.to_str().unwrap(), Some("env1"), Some("env2")));
        assert_eq!(client.current_token(UserKey::User1).unwrap(), "stored");
        assert_eq!(client.current_token(UserKey::User2).unwrap(), "env2");
        assert!(!client.is_single_user());
    }

    #[test]
    fn test_retry_happens_once_after_refresh_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let client = SpotifyClient::new(&config(path.to_str().unwrap(), Some("t"), None));

        let calls = std::cell::Cell::new(0);
        let result: Result<(), FetchError> = client.with_refresh(UserKey::User1, |_| {
            calls.set(calls.get() + 1);
            Err(FetchError::Unauthorized)
        });

        // No refresh token is stored, so the refresh fails before a second attempt.
        assert!(matches!(result, Err(FetchError::Refresh(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_non_auth_failures_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let client = SpotifyClient::new(&config(path.to_str().unwrap(), Some("t"), None));

        let calls = std::cell::Cell::new(0);
        let result: Result<(), FetchError> = client.with_refresh(UserKey::User2, |_| {
            calls.set(calls.get() + 1);
            Err(FetchError::Status {
                status: 500,
                body: String::new(),
            })
        });

        assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_missing_token_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let client = SpotifyClient::new(&config(path.to_str().unwrap(), None, None));

        let result: Result<(), FetchError> = client.with_refresh(UserKey::User1, |_| Ok(()));
        assert!(matches!(result, Err(FetchError::NoToken(UserKey::User1))));
    }

    #[test]
    fn test_shared_token_refreshes_through_its_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, r#"{"user2": {"accessToken": "old", "refreshToken": "r2"}}"#).unwrap();

        let (base, server) = serve(vec![r#"{"access_token": "fresh", "expires_in": 3600}"#]);
        let client = SpotifyClient::new(&config(path.to_str().unwrap(), None, None))
            .with_endpoints(&base, &format!("{base}/token"));
        assert!(client.is_single_user());

        let result = client.with_refresh(UserKey::User1, rejects_old);
        assert_eq!(result.unwrap(), "fresh");

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("POST /token"));
        assert!(requests[0].contains("refresh_token=r2"));

        let store = TokenStore::new(&path);
        assert_eq!(store.access_token(UserKey::User2).as_deref(), Some("fresh"));
        assert_eq!(store.refresh_token(UserKey::User2).as_deref(), Some("r2"));
        assert!(store.get(UserKey::User1).is_none());
        assert_eq!(client.current_token(UserKey::User2).unwrap(), "fresh");
    }

    #[test]
    fn test_concurrent_rejections_refresh_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, r#"{"user": {"accessToken": "old", "refreshToken": "r1"}}"#).unwrap();

        let (base, server) = serve(vec![r#"{"access_token": "fresh"}"#]);
        let client = SpotifyClient::new(&config(path.to_str().unwrap(), None, None))
            .with_endpoints(&base, &format!("{base}/token"));
        let client = &client;

        let results: Vec<Result<String, FetchError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(move || client.with_refresh(UserKey::User1, rejects_old)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results.iter().all(|r| matches!(r, Ok(token) if token == "fresh")));
        assert_eq!(server.join().unwrap().len(), 1);
        assert_eq!(
            TokenStore::new(&path).refresh_token(UserKey::User1).as_deref(),
            Some("r1")
        );
    }

    #[test]
    fn test_embedded_album_page_follows_next_link() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let (base, server) = serve(vec![r#"{"items": [{"id": "t2"}], "next": null}"#]);
        let client = SpotifyClient::new(&config(path.to_str().unwrap(), Some("tok"), None))
            .with_endpoints(&base, &format!("{base}/token"));

        let album = AlbumSummary {
            id: "al".to_string(),
            name: "Long Album".to_string(),
            tracks: Some(Paging {
                items: vec![serde_json::json!({"id": "t1"})],
                next: Some(format!("{base}/albums/al/tracks?offset=1")),
            }),
        };

        let tracks = client.album_tracks(UserKey::User1, album);
        let ids: Vec<&str> = tracks.iter().filter_map(|t| t["id"].as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("GET /albums/al/tracks?offset=1"));
        assert!(requests[0].contains("Bearer tok"));
    }

    #[test]
    fn test_album_without_embedded_tracks_is_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let (base, server) = serve(vec![r#"{"items": [{"id": "t1"}, {"id": "t2"}], "next": null}"#]);
        let client = SpotifyClient::new(&config(path.to_str().unwrap(), Some("tok"), None))
            .with_endpoints(&base, &format!("{base}/token"));

        let album = AlbumSummary {
            id: "al".to_string(),
            name: "Album".to_string(),
            tracks: None,
        };

        assert_eq!(client.album_tracks(UserKey::User1, album).len(), 2);
        assert!(server.join().unwrap()[0].starts_with("GET /albums/al/tracks?limit=50"));
    }
}
