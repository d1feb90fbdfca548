//! Track classification into label taxonomies

pub mod config;
pub mod engine;

pub use config::{
    AdjustmentRule, AudioFeature, ClassificationConfig, FeatureBound, RuleCondition,
    TaxonomyDefinition, Weights, BUILD_IT_DEEP, BUILD_IT_RECORDS, BUILD_IT_TECH,
};
pub use engine::{
    normalize_genre, Classification, ClassificationEngine, TaxonomyScore, TrackMetadata,
};
