//! Taxonomy configuration for the classification engine
//!
//! Taxonomies, weights, adjustment rules and the tie-break order are plain
//! data. A built-in set of three taxonomies ships with the crate; deployments
//! override it with a TOML file:
//!
//! ```toml
//! tie_break = ["BUILD_IT_DEEP", "BUILD_IT_TECH"]
//!
//! [weights]
//! genre = 0.6
//! audio = 0.4
//!
//! [[taxonomy]]
//! key = "BUILD_IT_DEEP"
//! genres = ["deep-house", "minimal"]
//! profile.energy = { max = 0.6 }
//! profile.tempo = { min = 110.0, max = 125.0 }
//!
//! [[rule]]
//! taxonomy = "BUILD_IT_DEEP"
//! delta = 0.1
//! condition = { kind = "feature_below", feature = "tempo", threshold = 100.0 }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::models::AudioFeatures;

pub const BUILD_IT_RECORDS: &str = "BUILD_IT_RECORDS";
pub const BUILD_IT_TECH: &str = "BUILD_IT_TECH";
pub const BUILD_IT_DEEP: &str = "BUILD_IT_DEEP";

/// Audio feature a profile bound or rule can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AudioFeature {
    Energy,
    Tempo,
    Instrumentalness,
    Acousticness,
    Valence,
    Speechiness,
    Danceability,
}

impl AudioFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFeature::Energy => "energy",
            AudioFeature::Tempo => "tempo",
            AudioFeature::Instrumentalness => "instrumentalness",
            AudioFeature::Acousticness => "acousticness",
            AudioFeature::Valence => "valence",
            AudioFeature::Speechiness => "speechiness",
            AudioFeature::Danceability => "danceability",
        }
    }

    pub fn value(&self, features: &AudioFeatures) -> f64 {
        match self {
            AudioFeature::Energy => features.energy,
            AudioFeature::Tempo => features.tempo,
            AudioFeature::Instrumentalness => features.instrumentalness,
            AudioFeature::Acousticness => features.acousticness,
            AudioFeature::Valence => features.valence,
            AudioFeature::Speechiness => features.speechiness,
            AudioFeature::Danceability => features.danceability,
        }
    }
}

impl fmt::Display for AudioFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "energy" => Ok(AudioFeature::Energy),
            "tempo" => Ok(AudioFeature::Tempo),
            "instrumentalness" => Ok(AudioFeature::Instrumentalness),
            "acousticness" => Ok(AudioFeature::Acousticness),
            "valence" => Ok(AudioFeature::Valence),
            "speechiness" => Ok(AudioFeature::Speechiness),
            "danceability" => Ok(AudioFeature::Danceability),
            other => Err(format!("unknown audio feature '{}'", other)),
        }
    }
}

impl TryFrom<String> for AudioFeature {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AudioFeature> for String {
    fn from(feature: AudioFeature) -> Self {
        feature.as_str().to_string()
    }
}

/// Inclusive range on one feature; a missing side is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureBound {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl FeatureBound {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// One category a track can be assigned to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyDefinition {
    pub key: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub profile: BTreeMap<AudioFeature, FeatureBound>,
}

impl TaxonomyDefinition {
    /// True when at least one feature in the profile is bounded
    pub fn has_bounds(&self) -> bool {
        self.profile.values().any(FeatureBound::is_bounded)
    }
}

/// When an adjustment rule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    Explicit,
    FeatureBelow { feature: AudioFeature, threshold: f64 },
    FeatureAbove { feature: AudioFeature, threshold: f64 },
    GenrePresent { genre: String },
}

/// Fixed delta added to one taxonomy's combined score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRule {
    pub taxonomy: String,
    pub condition: RuleCondition,
    pub delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub genre: f64,
    pub audio: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            genre: 0.6,
            audio: 0.4,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub weights: Weights,
    #[serde(default, rename = "taxonomy")]
    pub taxonomies: Vec<TaxonomyDefinition>,
    #[serde(default, rename = "rule")]
    pub rules: Vec<AdjustmentRule>,
    /// Preferred order among tied taxonomies; unlisted ones follow in
    /// declaration order
    #[serde(default)]
    pub tie_break: Vec<String>,
}

fn genres(names: &[&str]) -> Vec<String> {
    names.iter().map(|g| g.to_string()).collect()
}

impl ClassificationConfig {
    /// The three label taxonomies shipped by default
    pub fn builtin() -> Self {
        let records = TaxonomyDefinition {
            key: BUILD_IT_RECORDS.to_string(),
            genres: genres(&[
                "house",
                "tech-house",
                "disco",
                "nu-disco",
                "funk",
                "soulful-house",
                "garage",
                "electronica",
            ]),
            profile: BTreeMap::from([
                (AudioFeature::Energy, FeatureBound::at_least(0.5)),
                (AudioFeature::Danceability, FeatureBound::at_least(0.6)),
                (AudioFeature::Tempo, FeatureBound::between(115.0, 130.0)),
            ]),
        };
        let tech = TaxonomyDefinition {
            key: BUILD_IT_TECH.to_string(),
            genres: genres(&[
                "techno",
                "tech-house",
                "minimal-techno",
                "industrial",
                "acid",
                "hard-techno",
                "peak-time",
            ]),
            profile: BTreeMap::from([
                (AudioFeature::Energy, FeatureBound::at_least(0.7)),
                (AudioFeature::Tempo, FeatureBound::between(124.0, 140.0)),
            ]),
        };
        let deep = TaxonomyDefinition {
            key: BUILD_IT_DEEP.to_string(),
            genres: genres(&["deep-house", "minimal", "ambient", "downtempo", "deep-techno"]),
            profile: BTreeMap::from([
                (AudioFeature::Energy, FeatureBound::at_most(0.6)),
                (AudioFeature::Tempo, FeatureBound::between(110.0, 125.0)),
                (AudioFeature::Instrumentalness, FeatureBound::at_least(0.3)),
            ]),
        };

        Self {
            weights: Weights::default(),
            taxonomies: vec![records, tech, deep],
            rules: vec![
                AdjustmentRule {
                    taxonomy: BUILD_IT_RECORDS.to_string(),
                    condition: RuleCondition::Explicit,
                    delta: 0.1,
                },
                AdjustmentRule {
                    taxonomy: BUILD_IT_DEEP.to_string(),
                    condition: RuleCondition::FeatureBelow {
                        feature: AudioFeature::Tempo,
                        threshold: 100.0,
                    },
                    delta: 0.1,
                },
            ],
            tie_break: Vec::new(),
        }
    }

    /// Parse and validate a TOML configuration
    pub fn from_toml_str(source: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SyncResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!(
                "cannot read taxonomy config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.taxonomies.is_empty() {
            return Err(SyncError::Configuration(
                "at least one taxonomy is required".to_string(),
            ));
        }
        require_finite(self.weights.genre, "weights.genre")?;
        require_finite(self.weights.audio, "weights.audio")?;
        if self.weights.genre < 0.0 || self.weights.audio < 0.0 {
            return Err(SyncError::Configuration(
                "classification weights cannot be negative".to_string(),
            ));
        }

        let mut keys = HashSet::new();
        for taxonomy in &self.taxonomies {
            if taxonomy.key.trim().is_empty() {
                return Err(SyncError::Configuration(
                    "taxonomy key cannot be blank".to_string(),
                ));
            }
            if !keys.insert(taxonomy.key.as_str()) {
                return Err(SyncError::Configuration(format!(
                    "duplicate taxonomy '{}'",
                    taxonomy.key
                )));
            }
            for (feature, bound) in &taxonomy.profile {
                for value in [bound.min, bound.max].into_iter().flatten() {
                    require_finite(value, &format!("{} bound on {}", feature, taxonomy.key))?;
                }
                if let (Some(min), Some(max)) = (bound.min, bound.max) {
                    if min > max {
                        return Err(SyncError::Configuration(format!(
                            "taxonomy '{}' has {} min {} above max {}",
                            taxonomy.key, feature, min, max
                        )));
                    }
                }
            }
        }

        for rule in &self.rules {
            if !keys.contains(rule.taxonomy.as_str()) {
                return Err(SyncError::Configuration(format!(
                    "rule targets unknown taxonomy '{}'",
                    rule.taxonomy
                )));
            }
            require_finite(rule.delta, &format!("rule delta for {}", rule.taxonomy))?;
            if let RuleCondition::FeatureBelow { threshold, .. }
            | RuleCondition::FeatureAbove { threshold, .. } = &rule.condition
            {
                require_finite(*threshold, &format!("rule threshold for {}", rule.taxonomy))?;
            }
        }
        for key in &self.tie_break {
            if !keys.contains(key.as_str()) {
                return Err(SyncError::Configuration(format!(
                    "tie_break names unknown taxonomy '{}'",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// TOML accepts `nan` and `inf`, neither of which can be scored
fn require_finite(value: f64, what: &str) -> SyncResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SyncError::Configuration(format!(
            "{} must be a finite number, got {}",
            what, value
        )))
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self::builtin()
    }
}
