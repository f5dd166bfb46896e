//! Reference enrichment for suggested solutions.
//!
//! The StackOverflow provider is offline: it builds a search URL from the
//! error message instead of calling any external API.

use async_trait::async_trait;
use reqwest::Url;

use crate::config::EnrichmentConfig;
use crate::models::LogAnalysis;

const STACKOVERFLOW_SEARCH: &str = "https://stackoverflow.com/search";

/// Source of extra reference links for an error message.
#[async_trait]
pub trait SolutionEnricher: Send + Sync {
    /// Links for `error_message`. Implementations must not fail the pipeline;
    /// an unavailable provider returns an empty list.
    async fn references(&self, error_message: &str) -> Vec<String>;

    fn name(&self) -> &str;
}

pub struct NoopEnricher;

#[async_trait]
impl SolutionEnricher for NoopEnricher {
    async fn references(&self, _error_message: &str) -> Vec<String> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "none"
    }
}

pub struct MockStackOverflowEnricher;

#[async_trait]
impl SolutionEnricher for MockStackOverflowEnricher {
    async fn references(&self, error_message: &str) -> Vec<String> {
        let query = error_message.trim();
        if query.is_empty() {
            return Vec::new();
        }
        match Url::parse_with_params(STACKOVERFLOW_SEARCH, &[("q", query)]) {
            Ok(url) => vec![url.to_string()],
            Err(e) => {
                tracing::warn!(error = %e, "Could not build StackOverflow search link");
                Vec::new()
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn create_enricher(config: &EnrichmentConfig) -> Box<dyn SolutionEnricher> {
    match config.provider.as_str() {
        "mock" | "stackoverflow-mock" => Box::new(MockStackOverflowEnricher),
        "none" => Box::new(NoopEnricher),
        other => {
            tracing::warn!(provider = other, "Unknown enrichment provider, enrichment disabled");
            Box::new(NoopEnricher)
        }
    }
}

/// Append up to `max_references` new links to every solution in place.
pub async fn enrich(analysis: &mut LogAnalysis, enricher: &dyn SolutionEnricher, max_references: usize) {
    for solution in &mut analysis.possible_solutions {
        let room = max_references.saturating_sub(solution.references.len());
        if room == 0 {
            continue;
        }
        let found = enricher.references(&solution.error_message).await;
        for link in found {
            if solution.references.len() >= max_references {
                break;
            }
            if !solution.references.contains(&link) {
                solution.references.push(link);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FixPlan, Solution};

    fn solution(message: &str, references: Vec<String>) -> Solution {
        Solution {
            error_message: message.to_string(),
            immediate_fix: FixPlan::default(),
            permanent_fix: FixPlan::default(),
            preventive_measures: FixPlan::default(),
            references,
        }
    }

    struct FixedEnricher(Vec<&'static str>);

    #[async_trait]
    impl SolutionEnricher for FixedEnricher {
        async fn references(&self, _error_message: &str) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_mock_builds_encoded_search_link() {
        let links = MockStackOverflowEnricher
            .references("NullPointerException at Foo.bar")
            .await;
        assert_eq!(
            links,
            vec!["https://stackoverflow.com/search?q=NullPointerException+at+Foo.bar"]
        );
        assert!(MockStackOverflowEnricher.references("  ").await.is_empty());
    }

    #[tokio::test]
    async fn test_enrich_respects_cap_and_dedupes() {
        let mut analysis = LogAnalysis {
            errors: vec![],
            possible_solutions: vec![
                solution("a", vec!["https://x/1".to_string()]),
                solution("b", vec![]),
            ],
        };
        let enricher = FixedEnricher(vec!["https://x/1", "https://x/2", "https://x/3"]);

        enrich(&mut analysis, &enricher, 2).await;

        assert_eq!(analysis.possible_solutions[0].references, vec!["https://x/1", "https://x/2"]);
        assert_eq!(analysis.possible_solutions[1].references, vec!["https://x/1", "https://x/2"]);
    }

    #[tokio::test]
    async fn test_noop_leaves_solutions_untouched() {
        let mut analysis = LogAnalysis {
            errors: vec![],
            possible_solutions: vec![solution("a", vec![])],
        };
        enrich(&mut analysis, &NoopEnricher, 3).await;
        assert!(analysis.possible_solutions[0].references.is_empty());
    }

    #[test]
    fn test_factory_falls_back_to_noop() {
        let config = EnrichmentConfig {
            provider: "duckduckgo".to_string(),
            max_references: 3,
        };
        assert_eq!(create_enricher(&config).name(), "none");
        let config = EnrichmentConfig {
            provider: "mock".to_string(),
            max_references: 3,
        };
        assert_eq!(create_enricher(&config).name(), "mock");
    }
}
