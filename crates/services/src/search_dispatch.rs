//! Federated search: fan out to the general engine, walk the custom engines
//! one call at a time, then merge by url.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use shared::research::SearchResult;
use shared::settings::CustomEngine;

use crate::web_search::{GeneralSearch, SpecializedSearch};

/// Custom Search allows roughly one call per second per key.
pub const DEFAULT_SPECIALIZED_SPACING: Duration = Duration::from_millis(1100);

/// One query for one custom engine.
#[derive(Debug, Clone)]
pub struct SpecializedTask {
    pub engine: CustomEngine,
    pub query: String,
}

pub struct SearchDispatcher {
    general: Arc<dyn GeneralSearch>,
    specialized: Arc<dyn SpecializedSearch>,
    spacing: Duration,
}

impl SearchDispatcher {
    pub fn new(general: Arc<dyn GeneralSearch>, specialized: Arc<dyn SpecializedSearch>) -> Self {
        Self {
            general,
            specialized,
            spacing: DEFAULT_SPECIALIZED_SPACING,
        }
    }

    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// Run every query and return the merged, url-deduplicated results.
    ///
    /// A failing query contributes nothing; the dispatch itself never fails.
    pub async fn dispatch(
        &self,
        general_queries: &[String],
        tasks: &[SpecializedTask],
    ) -> Vec<SearchResult> {
        let (general, specialized) = tokio::join!(
            self.run_general(general_queries),
            self.run_specialized(tasks)
        );

        let raw_count = general.len() + specialized.len();
        let merged = dedupe_by_url(general.into_iter().chain(specialized));
        tracing::info!(
            raw = raw_count,
            unique = merged.len(),
            "search dispatch finished"
        );
        merged
    }

    async fn run_general(&self, queries: &[String]) -> Vec<SearchResult> {
        let calls = queries.iter().map(|query| async move {
            match self.general.search(query).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "general search failed");
                    Vec::new()
                }
            }
        });
        join_all(calls).await.into_iter().flatten().collect()
    }

    async fn run_specialized(&self, tasks: &[SpecializedTask]) -> Vec<SearchResult> {
        let mut results = Vec::new();
        for (i, task) in tasks.iter().enumerate() {
            match self.specialized.search(&task.engine, &task.query).await {
                Ok(found) => results.extend(found),
                Err(e) => {
                    tracing::warn!(query = %task.query, error = %e, "custom search failed");
                }
            }
            if i + 1 < tasks.len() {
                tokio::time::sleep(self.spacing).await;
            }
        }
        results
    }
}

/// Keep the first result seen for each url, preserving discovery order.
pub fn dedupe_by_url(results: impl IntoIterator<Item = SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use shared::ResearchError;
    use std::collections::HashMap;
    use std::time::Instant;

    fn hit(url: &str, title: &str, source: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: format!("snippet of {}", title),
            source: source.to_string(),
        }
    }

    struct FakeGeneral {
        answers: HashMap<String, Vec<SearchResult>>,
    }

    #[async_trait]
    impl GeneralSearch for FakeGeneral {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ResearchError> {
            self.answers
                .get(query)
                .cloned()
                .ok_or_else(|| ResearchError::network("Tavily", Some(500), "boom"))
        }
    }

    #[derive(Default)]
    struct FakeSpecialized {
        calls: Mutex<Vec<(String, Instant)>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl SpecializedSearch for FakeSpecialized {
        async fn search(
            &self,
            engine: &CustomEngine,
            query: &str,
        ) -> Result<Vec<SearchResult>, ResearchError> {
            self.calls.lock().push((query.to_string(), Instant::now()));
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail_on.as_deref() == Some(query) {
                return Err(ResearchError::network("Custom Search", Some(429), "quota"));
            }
            Ok(vec![hit(
                &format!("https://cse.example/{}", query),
                query,
                &engine.id,
            )])
        }
    }

    fn engine() -> CustomEngine {
        CustomEngine {
            id: "engine-1".into(),
            key: "k".into(),
            description: "formulations".into(),
            language: "ru".into(),
        }
    }

    fn task(query: &str) -> SpecializedTask {
        SpecializedTask {
            engine: engine(),
            query: query.to_string(),
        }
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let merged = dedupe_by_url(vec![
            hit("https://a", "first a", "Tavily"),
            hit("https://b", "b", "Tavily"),
            hit("https://a", "second a", "CSE"),
            hit("https://c", "c", "CSE"),
            hit("https://b", "second b", "CSE"),
        ]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].title, "first a");
        assert_eq!(merged[1].title, "b");
        assert_eq!(merged[2].url, "https://c");
    }

    #[tokio::test]
    async fn test_failing_general_query_is_isolated() {
        let mut answers = HashMap::new();
        answers.insert("q1".to_string(), vec![hit("https://a", "a", "Tavily")]);
        answers.insert("q3".to_string(), vec![hit("https://c", "c", "Tavily")]);
        let dispatcher = SearchDispatcher::new(
            Arc::new(FakeGeneral { answers }),
            Arc::new(FakeSpecialized::default()),
        );

        let queries = vec!["q1".to_string(), "q2-fails".to_string(), "q3".to_string()];
        let results = dispatcher.dispatch(&queries, &[]).await;
        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://c"]);
    }

    #[tokio::test]
    async fn test_specialized_calls_are_spaced_and_ordered() {
        let spacing = Duration::from_millis(40);
        let specialized = Arc::new(FakeSpecialized {
            fail_on: Some("second".to_string()),
            ..Default::default()
        });
        let dispatcher = SearchDispatcher::new(
            Arc::new(FakeGeneral {
                answers: HashMap::new(),
            }),
            specialized.clone(),
        )
        .with_spacing(spacing);

        let tasks = vec![task("first"), task("second"), task("third")];
        let results = dispatcher.dispatch(&[], &tasks).await;

        let calls = specialized.calls.lock().clone();
        let order: Vec<_> = calls.iter().map(|(q, _)| q.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
        let elapsed = calls[2].1.duration_since(calls[0].1);
        assert!(elapsed >= spacing * 2, "calls only {:?} apart", elapsed);

        // The quota failure on "second" drops just that task.
        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://cse.example/first", "https://cse.example/third"]
        );
    }

    #[tokio::test]
    async fn test_general_results_come_first() {
        let mut answers = HashMap::new();
        answers.insert(
            "q".to_string(),
            vec![hit("https://cse.example/only", "from tavily", "Tavily")],
        );
        let dispatcher = SearchDispatcher::new(
            Arc::new(FakeGeneral { answers }),
            Arc::new(FakeSpecialized::default()),
        );

        let results = dispatcher
            .dispatch(&["q".to_string()], &[task("only")])
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "Tavily");
    }
}
