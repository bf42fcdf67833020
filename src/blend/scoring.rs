use super::catalog::TrackCatalog;
use super::config::{AudioFeatureMatch, Weighting};
use crate::models::{AudioFeature, AudioFeatures, Pool, Track};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Candidate reordering and narrowing applied before selection
pub struct BlendScoring;

impl BlendScoring {
    /// Score used to order candidates when weighting is enabled
    pub fn calculate_weight(track: &Track, weighting: &Weighting, now: DateTime<Utc>) -> f64 {
        let mut score = 0.0;

        if weighting.play_count {
            if let Some(play_count) = track.play_count.filter(|c| c.is_finite()) {
                score += play_count;
            }
        }

        if weighting.recency {
            if let Some(last_played) = track.last_played {
                score += Self::days_since(last_played, now);
            }
        }

        score
    }

    /// Fractional days between a timestamp and now, never negative
    pub fn days_since(played: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let duration = now.signed_duration_since(played);
        (duration.num_seconds() as f64 / 86_400.0).max(0.0)
    }

    /// Stable sort of the pool by descending weight. Malformed entries weigh nothing.
    pub fn apply_weighting(pool: Pool, weighting: &Weighting, now: DateTime<Utc>) -> Pool {
        if !weighting.is_enabled() {
            return pool;
        }

        let mut scored: Vec<(f64, Option<Track>)> = pool
            .into_iter()
            .map(|entry| {
                let score = entry
                    .as_ref()
                    .map(|track| Self::calculate_weight(track, weighting, now))
                    .unwrap_or(0.0);
                (score, entry)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(_, entry)| entry).collect()
    }

    /// Keep only tracks within one standard deviation of the pool's mean for every
    /// requested feature. A failed feature lookup leaves the pool untouched.
    pub fn apply_audio_filter(
        pool: Pool,
        audio: &AudioFeatureMatch,
        catalog: &dyn TrackCatalog,
    ) -> Pool {
        if !audio.is_active() {
            return pool;
        }

        let mut seen = HashSet::new();
        let ids: Vec<String> = pool
            .iter()
            .flatten()
            .filter(|track| !track.id.is_empty() && seen.insert(track.id.clone()))
            .map(|track| track.id.clone())
            .collect();

        let features = match catalog.audio_features(&ids) {
            Ok(features) => features,
            Err(e) => {
                warn!("Could not fetch audio features, skipping audio filter: {e:#}");
                return pool;
            }
        };

        Self::filter_by_features(pool, &audio.features, &features)
    }

    /// Sequential filter: each feature narrows the pool left by the previous one
    pub fn filter_by_features(
        mut pool: Pool,
        wanted: &[AudioFeature],
        features: &HashMap<String, AudioFeatures>,
    ) -> Pool {
        for &feature in wanted {
            let value_of = |entry: &Option<Track>| {
                entry
                    .as_ref()
                    .and_then(|track| features.get(&track.id))
                    .and_then(|f| f.value(feature))
            };

            let values: Vec<f64> = pool.iter().filter_map(value_of).collect();
            let Some((mean, std_dev)) = Self::mean_and_std_dev(&values) else {
                debug!("No {feature:?} values among candidates; skipping that filter");
                continue;
            };

            let before = pool.len();
            pool.retain(|entry| value_of(entry).is_some_and(|v| (v - mean).abs() <= std_dev));
            debug!(
                "{feature:?} filter (mean {mean:.3}, std dev {std_dev:.3}) kept {}/{before}",
                pool.len()
            );
        }
        pool
    }

    /// Mean and population standard deviation
    pub fn mean_and_std_dev(values: &[f64]) -> Option<(f64, f64)> {
        if values.is_empty() {
            return None;
        }
        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        Some((mean, variance.sqrt()))
    }
}
