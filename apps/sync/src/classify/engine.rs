//! Rule-based track classification
//!
//! Every taxonomy gets a combined score from genre overlap and an audio
//! profile check, then configured adjustments. The highest score wins.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use super::config::{ClassificationConfig, RuleCondition, TaxonomyDefinition};
use crate::error::{SyncError, SyncResult};
use crate::models::AudioFeatures;

/// Track facts beyond genres and audio features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub explicit: bool,
}

/// Score breakdown for one taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaxonomyScore {
    pub genre_score: f64,
    pub audio_match: bool,
    pub adjustment: f64,
    pub combined: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Winning taxonomy key
    pub label: String,
    pub confidence: f64,
    pub scores: BTreeMap<String, TaxonomyScore>,
}

/// Lowercase, trim and hyphenate a genre name
pub fn normalize_genre(genre: &str) -> String {
    genre
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn normalize_genres<'a, I>(genres: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    genres
        .into_iter()
        .map(normalize_genre)
        .filter(|g| !g.is_empty())
        .collect()
}

struct CompiledTaxonomy {
    definition: TaxonomyDefinition,
    genres: HashSet<String>,
    /// Position in the tie-break order, lower wins
    rank: usize,
}

#[derive(Debug, Clone)]
pub struct ClassificationEngine {
    config: ClassificationConfig,
}

impl ClassificationEngine {
    pub fn new(config: ClassificationConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn builtin() -> Self {
        Self {
            config: ClassificationConfig::builtin(),
        }
    }

    pub fn config(&self) -> &ClassificationConfig {
        &self.config
    }

    fn compiled(&self) -> Vec<CompiledTaxonomy> {
        let preferred: HashMap<&str, usize> = self
            .config
            .tie_break
            .iter()
            .enumerate()
            .map(|(i, key)| (key.as_str(), i))
            .collect();
        let offset = preferred.len();

        self.config
            .taxonomies
            .iter()
            .enumerate()
            .map(|(position, definition)| CompiledTaxonomy {
                genres: normalize_genres(definition.genres.iter().map(String::as_str)),
                rank: preferred
                    .get(definition.key.as_str())
                    .copied()
                    .unwrap_or(offset + position),
                definition: definition.clone(),
            })
            .collect()
    }

    /// Classify one track
    ///
    /// # Errors
    /// Returns `SyncError::Internal` only if the configuration holds no
    /// taxonomies, which construction already rules out.
    pub fn classify<'a, I>(
        &self,
        genres: I,
        features: Option<&AudioFeatures>,
        metadata: &TrackMetadata,
    ) -> SyncResult<Classification>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let input = normalize_genres(genres);
        let weights = self.config.weights;

        let compiled = self.compiled();
        let mut scores = BTreeMap::new();
        let mut best: Option<(&str, f64, usize)> = None;

        for taxonomy in &compiled {
            let genre_score = if input.is_empty() {
                0.0
            } else {
                input.intersection(&taxonomy.genres).count() as f64 / input.len() as f64
            };
            let audio_match = profile_matches(&taxonomy.definition, features);
            let base = genre_score * weights.genre + if audio_match { weights.audio } else { 0.0 };
            let adjustment = self.adjustment(&taxonomy.definition.key, &input, features, metadata);
            let combined = (base + adjustment).clamp(0.0, 1.0);

            let key = taxonomy.definition.key.as_str();
            scores.insert(
                key.to_string(),
                TaxonomyScore {
                    genre_score,
                    audio_match,
                    adjustment,
                    combined,
                },
            );

            best = match best {
                Some((_, score, rank))
                    if combined < score || (combined == score && rank < taxonomy.rank) =>
                {
                    best
                }
                _ => Some((key, combined, taxonomy.rank)),
            };
        }

        let (label, confidence, _) = best.ok_or_else(|| {
            SyncError::Internal("classification config has no taxonomies".to_string())
        })?;

        Ok(Classification {
            label: label.to_string(),
            confidence,
            scores,
        })
    }

    fn adjustment(
        &self,
        key: &str,
        genres: &HashSet<String>,
        features: Option<&AudioFeatures>,
        metadata: &TrackMetadata,
    ) -> f64 {
        self.config
            .rules
            .iter()
            .filter(|rule| rule.taxonomy == key)
            .filter(|rule| match &rule.condition {
                RuleCondition::Explicit => metadata.explicit,
                RuleCondition::FeatureBelow { feature, threshold } => {
                    features.map_or(false, |f| feature.value(f) < *threshold)
                }
                RuleCondition::FeatureAbove { feature, threshold } => {
                    features.map_or(false, |f| feature.value(f) > *threshold)
                }
                RuleCondition::GenrePresent { genre } => genres.contains(&normalize_genre(genre)),
            })
            .map(|rule| rule.delta)
            .sum()
    }
}

impl Default for ClassificationEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Without a feature vector only an unbounded profile matches
fn profile_matches(taxonomy: &TaxonomyDefinition, features: Option<&AudioFeatures>) -> bool {
    match features {
        Some(features) => taxonomy
            .profile
            .iter()
            .all(|(feature, bound)| bound.contains(feature.value(features))),
        None => !taxonomy.has_bounds(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::config::{
        AdjustmentRule, AudioFeature, FeatureBound, Weights, BUILD_IT_DEEP, BUILD_IT_RECORDS,
        BUILD_IT_TECH,
    };
    use rstest::rstest;

    fn deep_features() -> AudioFeatures {
        AudioFeatures {
            energy: 0.5,
            tempo: 120.0,
            instrumentalness: 0.5,
            acousticness: 0.2,
            valence: 0.5,
            speechiness: 0.05,
            danceability: 0.5,
        }
    }

    fn taxonomy(key: &str, genres: &[&str]) -> TaxonomyDefinition {
        TaxonomyDefinition {
            key: key.to_string(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            profile: BTreeMap::new(),
        }
    }

    #[test]
    fn test_deep_house_track() {
        let engine = ClassificationEngine::builtin();
        let features = deep_features();
        let result = engine
            .classify(["deep-house", "minimal"], Some(&features), &TrackMetadata::default())
            .unwrap();

        assert_eq!(result.label, BUILD_IT_DEEP);
        assert!((result.confidence - 1.0).abs() < 1e-9);
        let deep = result.scores[BUILD_IT_DEEP];
        assert_eq!(deep.genre_score, 1.0);
        assert!(deep.audio_match);
        assert_eq!(result.scores.len(), 3);
        assert!(!result.scores[BUILD_IT_TECH].audio_match);
    }

    #[test]
    fn test_empty_genres_score_zero() {
        let engine = ClassificationEngine::builtin();
        let features = deep_features();
        let result = engine
            .classify(Vec::<&str>::new(), Some(&features), &TrackMetadata::default())
            .unwrap();

        assert!(result.scores.values().all(|s| s.genre_score == 0.0));
        assert_eq!(result.label, BUILD_IT_DEEP);
        assert!((result.confidence - 0.4).abs() < 1e-9);
    }

    #[rstest]
    #[case(&["Deep House", " MINIMAL "], 1.0)]
    #[case(&["deep-house", "deep house", "techno"], 0.5)]
    #[case(&["polka"], 0.0)]
    fn test_genre_normalization(#[case] genres: &[&str], #[case] expected: f64) {
        let engine = ClassificationEngine::builtin();
        let result = engine
            .classify(genres.iter().copied(), None, &TrackMetadata::default())
            .unwrap();
        assert!((result.scores[BUILD_IT_DEEP].genre_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_missing_features_only_match_unbounded_profiles() {
        let mut config = ClassificationConfig::builtin();
        config.taxonomies.push(taxonomy("OPEN", &[]));
        let engine = ClassificationEngine::new(config).unwrap();

        let result = engine
            .classify(["house"], None, &TrackMetadata::default())
            .unwrap();
        assert!(!result.scores[BUILD_IT_RECORDS].audio_match);
        assert!(result.scores["OPEN"].audio_match);
    }

    #[test]
    fn test_explicit_rule_adjusts_records() {
        let engine = ClassificationEngine::builtin();
        let result = engine
            .classify(["house"], None, &TrackMetadata { explicit: true })
            .unwrap();
        let records = result.scores[BUILD_IT_RECORDS];
        assert!((records.adjustment - 0.1).abs() < 1e-9);
        assert!((records.combined - 0.7).abs() < 1e-9);
        assert_eq!(result.label, BUILD_IT_RECORDS);
    }

    #[test]
    fn test_scores_clamped() {
        let mut config = ClassificationConfig::builtin();
        config.rules.push(AdjustmentRule {
            taxonomy: BUILD_IT_DEEP.to_string(),
            condition: RuleCondition::GenrePresent {
                genre: "Deep House".to_string(),
            },
            delta: 0.5,
        });
        config.rules.push(AdjustmentRule {
            taxonomy: BUILD_IT_TECH.to_string(),
            condition: RuleCondition::FeatureBelow {
                feature: AudioFeature::Energy,
                threshold: 0.6,
            },
            delta: -0.9,
        });
        let engine = ClassificationEngine::new(config).unwrap();
        let features = deep_features();

        let result = engine
            .classify(["deep-house"], Some(&features), &TrackMetadata::default())
            .unwrap();
        assert_eq!(result.scores[BUILD_IT_DEEP].combined, 1.0);
        assert_eq!(result.scores[BUILD_IT_TECH].combined, 0.0);
    }

    #[test]
    fn test_ties_use_declaration_order() {
        let config = ClassificationConfig {
            weights: Weights::default(),
            taxonomies: vec![taxonomy("FIRST", &["house"]), taxonomy("SECOND", &["house"])],
            rules: vec![],
            tie_break: vec![],
        };
        let engine = ClassificationEngine::new(config).unwrap();
        let result = engine
            .classify(["house"], None, &TrackMetadata::default())
            .unwrap();
        assert_eq!(result.label, "FIRST");
    }

    #[test]
    fn test_ties_use_configured_order() {
        let config = ClassificationConfig {
            weights: Weights::default(),
            taxonomies: vec![
                taxonomy("FIRST", &["house"]),
                taxonomy("SECOND", &["house"]),
                taxonomy("THIRD", &["house"]),
            ],
            rules: vec![],
            tie_break: vec!["THIRD".to_string()],
        };
        let engine = ClassificationEngine::new(config).unwrap();
        let result = engine
            .classify(["house"], None, &TrackMetadata::default())
            .unwrap();
        assert_eq!(result.label, "THIRD");
    }

    #[test]
    fn test_tempo_rule_needs_features() {
        let mut config = ClassificationConfig::builtin();
        config.taxonomies[2]
            .profile
            .insert(AudioFeature::Tempo, FeatureBound::default());
        let engine = ClassificationEngine::new(config).unwrap();
        let slow = AudioFeatures {
            tempo: 90.0,
            ..deep_features()
        };

        let with = engine
            .classify(["ambient"], Some(&slow), &TrackMetadata::default())
            .unwrap();
        let without = engine
            .classify(["ambient"], None, &TrackMetadata::default())
            .unwrap();
        assert!((with.scores[BUILD_IT_DEEP].adjustment - 0.1).abs() < 1e-9);
        assert_eq!(without.scores[BUILD_IT_DEEP].adjustment, 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ClassificationConfig {
            weights: Weights::default(),
            taxonomies: vec![],
            rules: vec![],
            tie_break: vec![],
        };
        assert!(ClassificationEngine::new(config).is_err());
    }
}
