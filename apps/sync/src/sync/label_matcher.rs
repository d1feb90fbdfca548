//! Fuzzy label identity matching
//!
//! Catalog label strings are free text ("Build-It Tech", "BUILD IT TECH
//! LTD"). A candidate matches a target when, after normalization, either
//! string contains the other. Spellings the containment rule cannot catch
//! go in a [`LabelAliasTable`].

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::models::Label;

/// Lowercase and drop whitespace and hyphens
pub fn normalize_label(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a catalog label string names the target label
///
/// An empty candidate never matches.
pub fn matches(candidate: &str, target: &str) -> bool {
    let candidate = normalize_label(candidate);
    let target = normalize_label(target);
    if candidate.is_empty() || target.is_empty() {
        return false;
    }
    candidate.contains(&target) || target.contains(&candidate)
}

/// Mapping from external label strings to internal label ids
#[derive(Debug, Clone, Default)]
pub struct LabelAliasTable {
    aliases: HashMap<String, Uuid>,
}

#[derive(Debug, Deserialize)]
struct AliasFile {
    #[serde(default, rename = "alias")]
    aliases: Vec<AliasEntry>,
}

#[derive(Debug, Deserialize)]
struct AliasEntry {
    label_id: Uuid,
    names: Vec<String>,
}

impl LabelAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an alias table
    ///
    /// ```toml
    /// [[alias]]
    /// label_id = "6f1c0c3e-0d39-4c53-a3f7-6c1b8f0f8f11"
    /// names = ["BIR", "Build It Rec."]
    /// ```
    ///
    /// A name mapped to two different labels is rejected.
    pub fn from_toml_str(source: &str) -> SyncResult<Self> {
        let file: AliasFile = toml::from_str(source)?;
        let mut table = Self::new();
        for entry in file.aliases {
            for name in entry.names {
                table.insert(&name, entry.label_id)?;
            }
        }
        Ok(table)
    }

    /// Load an alias table from a TOML file
    pub fn load(path: &Path) -> SyncResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!(
                "cannot read label aliases {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&source)
    }

    /// Map an external label string to a label
    pub fn insert(&mut self, name: &str, label_id: Uuid) -> SyncResult<()> {
        let key = normalize_label(name);
        if key.is_empty() {
            return Err(SyncError::Configuration(
                "label alias cannot be blank".to_string(),
            ));
        }
        match self.aliases.get(&key) {
            Some(existing) if *existing != label_id => Err(SyncError::Configuration(format!(
                "label alias '{}' maps to both {} and {}",
                name, existing, label_id
            ))),
            _ => {
                self.aliases.insert(key, label_id);
                Ok(())
            }
        }
    }

    /// Label id an external label string is aliased to
    pub fn resolve(&self, candidate: &str) -> Option<Uuid> {
        self.aliases.get(&normalize_label(candidate)).copied()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Why a candidate label was accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelMatch {
    DisplayName,
    Variant(String),
    Alias,
}

/// Label matching against display name, variants and the alias table
#[derive(Debug, Clone, Default)]
pub struct LabelMatcher {
    aliases: LabelAliasTable,
}

impl LabelMatcher {
    pub fn new(aliases: LabelAliasTable) -> Self {
        Self { aliases }
    }

    /// Match a release's reported label against a target label
    pub fn match_label(&self, candidate: Option<&str>, label: &Label) -> Option<LabelMatch> {
        let candidate = candidate?;
        if matches(candidate, &label.display_name) {
            return Some(LabelMatch::DisplayName);
        }
        if let Some(variant) = label.variants.iter().find(|v| matches(candidate, v)) {
            return Some(LabelMatch::Variant(variant.clone()));
        }
        match self.aliases.resolve(candidate) {
            Some(id) if id == label.id => Some(LabelMatch::Alias),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Build-It Tech", "Build It Tech", true)]
    #[case("Tech House Records", "Build It Tech", false)]
    #[case("", "Build It Tech", false)]
    #[case("   -  ", "Build It Tech", false)]
    #[case("BUILD IT TECH LTD", "Build It Tech", true)]
    #[case("Build It", "Build It Tech", true)]
    #[case("build\tit\ntech", "Build It Tech", true)]
    #[case("Build It Tech", "", false)]
    fn test_matches(#[case] candidate: &str, #[case] target: &str, #[case] expected: bool) {
        assert_eq!(matches(candidate, target), expected);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label(" Build-It  Deep "), "builditdeep");
    }

    #[test]
    fn test_alias_table_from_toml() {
        let id = Uuid::new_v4();
        let source = format!(
            r#"
            [[alias]]
            label_id = "{}"
            names = ["BIR", "Build It Rec."]
            "#,
            id
        );
        let table = LabelAliasTable::from_toml_str(&source).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("b-i-r"), Some(id));
        assert_eq!(table.resolve("build it rec."), Some(id));
        assert_eq!(table.resolve("Unrelated"), None);
    }

    #[test]
    fn test_alias_conflict_rejected() {
        let mut table = LabelAliasTable::new();
        table.insert("BIR", Uuid::new_v4()).unwrap();
        assert!(matches!(
            table.insert("B I R", Uuid::new_v4()),
            Err(SyncError::Configuration(_))
        ));
    }

    #[test]
    fn test_match_label_order() {
        let label = Label::new("Build It Records", vec!["BIR Music".to_string()]);
        let mut aliases = LabelAliasTable::new();
        aliases.insert("Imprint Holdings", label.id).unwrap();
        let matcher = LabelMatcher::new(aliases);

        assert_eq!(
            matcher.match_label(Some("Build-It Records"), &label),
            Some(LabelMatch::DisplayName)
        );
        assert_eq!(
            matcher.match_label(Some("bir-music"), &label),
            Some(LabelMatch::Variant("BIR Music".to_string()))
        );
        assert_eq!(
            matcher.match_label(Some("Imprint Holdings"), &label),
            Some(LabelMatch::Alias)
        );
        assert_eq!(matcher.match_label(None, &label), None);
        assert_eq!(matcher.match_label(Some("Other Label"), &label), None);
    }

    #[test]
    fn test_alias_for_other_label_does_not_match() {
        let label = Label::new("Build It Deep", vec![]);
        let mut aliases = LabelAliasTable::new();
        aliases.insert("Deep Holdings", Uuid::new_v4()).unwrap();
        let matcher = LabelMatcher::new(aliases);
        assert_eq!(matcher.match_label(Some("Deep Holdings"), &label), None);
    }
}
