use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// An artist as returned by the Spotify Web API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// A track. Equality is by id only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(
        rename = "playCount",
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub play_count: Option<f64>,
    #[serde(
        rename = "lastPlayed",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_played: Option<DateTime<Utc>>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Track {
    /// The first listed artist, used as the track's single representative
    pub fn main_artist(&self) -> Option<&Artist> {
        self.artists.first()
    }

    pub fn main_artist_id(&self) -> Option<&str> {
        self.main_artist().map(|artist| artist.id.as_str())
    }

    /// A track can take part in a blend only if it has an id and at least one artist
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && !self.artists.is_empty()
    }
}

/// One category of a user's listening history. Entries that were null or
/// failed to decode are kept as `None` so source ranking is preserved.
pub type Pool = Vec<Option<Track>>;

/// Decode a JSON array leniently: every element that is not a decodable track becomes `None`
pub fn deserialize_pool<'de, D>(deserializer: D) -> Result<Pool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(pool_from_values(raw.unwrap_or_default()))
}

/// A numeric field that reads as `None` when the value is not a finite JSON number
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.as_f64()).filter(|n| n.is_finite()))
}

/// An RFC 3339 timestamp that reads as `None` when missing or unparseable
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        .map(|stamp| stamp.with_timezone(&Utc)))
}

/// Iterate the well-formed tracks of a pool, skipping malformed entries
pub fn well_formed(pool: &[Option<Track>]) -> impl Iterator<Item = &Track> {
    pool.iter().flatten().filter(|track| track.is_well_formed())
}

/// Current user's profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserProfile {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Everything one user contributes to a blend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    #[serde(default)]
    pub user: UserProfile,
    #[serde(default, deserialize_with = "deserialize_pool")]
    pub short_term: Pool,
    #[serde(default, deserialize_with = "deserialize_pool")]
    pub medium_term: Pool,
    #[serde(default, deserialize_with = "deserialize_pool")]
    pub long_term: Pool,
    #[serde(default, deserialize_with = "deserialize_pool")]
    pub liked_songs: Pool,
    #[serde(default, deserialize_with = "deserialize_pool")]
    pub saved_album_tracks: Pool,
    #[serde(default, deserialize_with = "deserialize_pool")]
    pub playlist_tracks: Pool,
    #[serde(default, deserialize_with = "deserialize_pool")]
    pub recent_tracks: Pool,
    #[serde(default, deserialize_with = "deserialize_pool")]
    pub new_release_tracks: Pool,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

/// Audio analysis values for a single track
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub valence: Option<f64>,
    pub tempo: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub speechiness: Option<f64>,
    pub loudness: Option<f64>,
}

/// Names of the numeric audio features a blend can be narrowed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFeature {
    Danceability,
    Energy,
    Valence,
    Tempo,
    Acousticness,
    Instrumentalness,
    Liveness,
    Speechiness,
    Loudness,
}

impl AudioFeatures {
    pub fn value(&self, feature: AudioFeature) -> Option<f64> {
        let value = match feature {
            AudioFeature::Danceability => self.danceability,
            AudioFeature::Energy => self.energy,
            AudioFeature::Valence => self.valence,
            AudioFeature::Tempo => self.tempo,
            AudioFeature::Acousticness => self.acousticness,
            AudioFeature::Instrumentalness => self.instrumentalness,
            AudioFeature::Liveness => self.liveness,
            AudioFeature::Speechiness => self.speechiness,
            AudioFeature::Loudness => self.loudness,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Generic paging object used by most list endpoints
#[derive(Debug, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

/// Wrapper returned by `/me/tracks` and playlist track listings
#[derive(Debug, Deserialize)]
pub struct TrackItem {
    #[serde(default)]
    pub track: Option<serde_json::Value>,
}

/// Wrapper returned by `/me/player/recently-played`
#[derive(Debug, Deserialize)]
pub struct PlayHistoryItem {
    #[serde(default)]
    pub track: Option<serde_json::Value>,
    #[serde(default)]
    pub played_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SavedAlbumItem {
    pub album: AlbumSummary,
}

#[derive(Debug, Deserialize)]
pub struct AlbumSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracks: Option<Paging<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub collaborative: bool,
}

/// Response of `/me/following?type=artist`
#[derive(Debug, Deserialize)]
pub struct FollowedArtistsResponse {
    pub artists: Paging<Artist>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsResponse {
    #[serde(default, deserialize_with = "deserialize_pool")]
    pub tracks: Pool,
}

#[derive(Debug, Deserialize)]
pub struct AudioFeaturesResponse {
    #[serde(default)]
    pub audio_features: Vec<Option<AudioFeatures>>,
}

/// Playlist as returned on creation or lookup
#[derive(Debug, Deserialize)]
pub struct PlaylistInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

/// Convert raw JSON values into a pool, keeping undecodable entries as `None`
pub fn pool_from_values(values: Vec<serde_json::Value>) -> Pool {
    values
        .into_iter()
        .map(|value| serde_json::from_value::<Track>(value).ok())
        .collect()
}
