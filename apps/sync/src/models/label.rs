//! Record label model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Record label from the labels table
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Label {
    /// Unique label identifier
    pub id: Uuid,

    /// Name shown to users and used as the primary search term
    pub display_name: String,

    /// Other spellings the catalog is known to use for this label
    pub variants: Vec<String>,
}

impl Label {
    /// Create a label with a fresh id
    pub fn new(display_name: impl Into<String>, variants: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            variants,
        }
    }

    /// Catalog search terms: display name first, then variants
    ///
    /// Blank entries are dropped and duplicates are removed ignoring case,
    /// keeping the first spelling seen.
    pub fn search_terms(&self) -> Vec<String> {
        let mut seen = Vec::<String>::new();
        let mut terms = Vec::new();
        for term in std::iter::once(&self.display_name).chain(self.variants.iter()) {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            let folded = term.to_lowercase();
            if seen.contains(&folded) {
                continue;
            }
            seen.push(folded);
            terms.push(term.to_string());
        }
        terms
    }
}
