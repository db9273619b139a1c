//! Data carried between research stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most sources the filter stage may hand to deep reading
pub const MAX_SELECTED_SOURCES: usize = 5;

/// A single search hit. `url` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Which backend produced it, e.g. "Tavily" or "CSE (abcde...)"
    pub source: String,
}

/// Queries for the general-purpose engine, in two languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralQueries {
    pub primary_language: Vec<String>,
    pub secondary_language: Vec<String>,
}

impl GeneralQueries {
    /// Primary-language queries first, then secondary.
    pub fn all(&self) -> Vec<String> {
        self.primary_language
            .iter()
            .chain(self.secondary_language.iter())
            .cloned()
            .collect()
    }
}

/// A query aimed at one configured custom search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSearchTask {
    pub engine_index: usize,
    pub query: String,
}

/// Search strategy produced once per run by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub domain: String,
    pub strategy: String,
    pub general_queries: GeneralQueries,
    pub custom_search_tasks: Vec<CustomSearchTask>,
}

/// Validated indices into the deduplicated result list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantSelection(Vec<usize>);

impl RelevantSelection {
    /// Keep only indices that point at an existing result.
    ///
    /// Order is preserved, repeats collapse to their first position and at most
    /// [`MAX_SELECTED_SOURCES`] survive. Returns the selection and the rejected
    /// raw values.
    pub fn validate(raw: &[i64], result_count: usize) -> (Self, Vec<i64>) {
        let mut kept: Vec<usize> = Vec::new();
        let mut rejected = Vec::new();
        for &value in raw {
            let index = match usize::try_from(value) {
                Ok(i) if i < result_count => i,
                _ => {
                    rejected.push(value);
                    continue;
                }
            };
            if kept.contains(&index) {
                continue;
            }
            if kept.len() == MAX_SELECTED_SOURCES {
                rejected.push(value);
                continue;
            }
            kept.push(index);
        }
        (Self(kept), rejected)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Full-text content (or an error placeholder) for one selected source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    /// Position of the source in the deduplicated result list
    pub original_index: usize,
    pub url: String,
    pub content: String,
}

/// What gets persisted once a run finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SearchResult>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        sources: Vec<SearchResult>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            sources,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_drops_out_of_range() {
        let (selection, rejected) = RelevantSelection::validate(&[0, 7, -1, 2], 3);
        assert_eq!(selection.indices(), &[0, 2]);
        assert_eq!(rejected, vec![7, -1]);
    }

    #[test]
    fn test_selection_collapses_repeats_and_caps() {
        let (selection, rejected) = RelevantSelection::validate(&[4, 4, 1, 0, 2, 3, 5, 6], 10);
        assert_eq!(selection.indices(), &[4, 1, 0, 2, 3]);
        assert_eq!(rejected, vec![5, 6]);
        assert_eq!(selection.len(), MAX_SELECTED_SOURCES);
    }

    #[test]
    fn test_selection_empty_results() {
        let (selection, rejected) = RelevantSelection::validate(&[0, 1], 0);
        assert!(selection.is_empty());
        assert_eq!(rejected.len(), 2);
    }

    #[test]
    fn test_general_queries_order() {
        let queries = GeneralQueries {
            primary_language: vec!["奥希替尼 处方".into()],
            secondary_language: vec!["osimertinib formulation".into(), "Tagrisso".into()],
        };
        assert_eq!(
            queries.all(),
            vec!["奥希替尼 处方", "osimertinib formulation", "Tagrisso"]
        );
    }
}
