#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::models::AudioFeature;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = BlendConfig::default();
        assert_eq!(config.blend_style, BlendStyle::Creative);
        assert_eq!(config.discovery_percent, 20);
        assert_eq!(config.playlist_length, 50);
        assert!(config.sources.short_term);
        assert!(config.sources.new_release_tracks);
        assert!(!config.weighting.is_enabled());
        assert!(!config.audio_features.is_active());
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: BlendConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BlendConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "blendStyle": "wild",
            "discoveryPercent": 40,
            "playlistLength": 30,
            "sources": {"likedSongs": false, "newReleaseTracks": false},
            "weighting": {"playCount": true},
            "audioFeatures": {"enabled": true, "match": ["energy", "tempo"]}
        }"#;

        let config: BlendConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.blend_style, BlendStyle::Wild);
        assert_eq!(config.discovery_percent, 40);
        assert_eq!(config.playlist_length, 30);
        assert!(!config.sources.liked_songs);
        assert!(!config.sources.new_release_tracks);
        assert!(config.sources.short_term);
        assert!(config.weighting.play_count);
        assert!(!config.weighting.recency);
        assert!(config.weighting.is_enabled());
        assert_eq!(
            config.audio_features.features,
            vec![AudioFeature::Energy, AudioFeature::Tempo]
        );
        assert!(config.audio_features.is_active());
    }

    #[test]
    fn test_audio_features_need_a_feature_list() {
        let config: BlendConfig =
            serde_json::from_str(r#"{"audioFeatures": {"enabled": true}}"#).unwrap();
        assert!(config.audio_features.enabled);
        assert!(!config.audio_features.is_active());
    }

    #[test]
    fn test_unknown_style_is_rejected() {
        let result = serde_json::from_str::<BlendConfig>(r#"{"blendStyle": "chaotic"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_derived_budgets() {
        let config = BlendConfig {
            playlist_length: 25,
            discovery_percent: 30,
            ..BlendConfig::default()
        };
        assert_eq!(config.discovery_limit(), 7);
        assert_eq!(config.repeat_allowance(), 2);
        assert_relative_eq!(config.share(0.2), 5.0);
        assert_relative_eq!(config.share(0.3), 7.5);

        let tiny = BlendConfig {
            playlist_length: 9,
            ..BlendConfig::default()
        };
        assert_eq!(tiny.repeat_allowance(), 0);
    }

    #[test]
    fn test_load_from_file_clamps_discovery_percent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blend.json");
        std::fs::write(&path, r#"{"discoveryPercent": 250, "playlistLength": 10}"#).unwrap();

        let config = BlendConfig::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.discovery_percent, 100);
        assert_eq!(config.discovery_limit(), 10);
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let config = BlendConfig::load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(config, BlendConfig::default());

        let err = BlendConfig::load_from_file(path.to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read blend configuration"));
    }

    #[test]
    fn test_corrupt_config_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blend.json");
        std::fs::write(&path, "{\"blendStyle\": ").unwrap();

        let err = BlendConfig::load_or_default(path.to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse blend configuration"));
    }

    #[test]
    fn test_discovery_limit_saturates_on_huge_lengths() {
        let config = BlendConfig {
            playlist_length: usize::MAX,
            discovery_percent: 50,
            ..BlendConfig::default()
        };
        assert_eq!(config.discovery_limit(), usize::MAX / 100);
    }
}
