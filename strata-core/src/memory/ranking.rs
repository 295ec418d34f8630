//! Retrieval ranking.
//!
//! Decides which candidates qualify for a query and orders them by a weighted
//! retention score. The score ignores the query itself, so a node that only
//! matched by embedding competes on equal terms with a text match.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::embeddings::{Similarity, compare};
use super::types::{MatchReason, MemoryNode, QueryHit, QuerySpec};
use crate::config::RankingConfig;
use crate::utils::half_decay;

/// Scores and orders query candidates
pub struct RetrievalRanker<'a> {
    config: &'a RankingConfig,
    similarity: &'a dyn Similarity,
}

impl<'a> RetrievalRanker<'a> {
    pub fn new(config: &'a RankingConfig, similarity: &'a dyn Similarity) -> Self {
        Self { config, similarity }
    }

    /// Why `node` qualifies for `spec`, or `None` if it does not.
    ///
    /// Text, embedding and filter conditions are OR-ed. A query with none of
    /// them matches everything.
    pub fn matches(&self, node: &MemoryNode, spec: &QuerySpec) -> Option<MatchReason> {
        if spec.is_browse() {
            return Some(MatchReason::Browse);
        }

        let text = spec.text.trim();
        if !text.is_empty() && node.content.to_lowercase().contains(&text.to_lowercase()) {
            return Some(MatchReason::Text);
        }

        let similar = compare(
            self.similarity,
            spec.embedding.as_deref(),
            node.embedding.as_deref(),
        )
        .is_some_and(|s| s > self.config.similarity_threshold);
        if similar {
            return Some(MatchReason::Embedding);
        }

        let kind_hit = spec.kind.is_some_and(|k| k == node.kind);
        let category_hit = spec
            .category
            .as_deref()
            .is_some_and(|c| node.metadata.category.as_deref() == Some(c));
        let tag_hit = spec.tags.iter().any(|t| node.has_tag(t));
        if kind_hit || category_hit || tag_hit {
            return Some(MatchReason::Filter);
        }

        None
    }

    /// Weighted retention score at `now`
    pub fn score(&self, node: &MemoryNode, now: DateTime<Utc>) -> f64 {
        let c = self.config;
        c.access_weight * node.access_frequency
            + c.recency_weight * half_decay(node.last_accessed, now, c.recency_half_life_days)
            + c.level_weight * node.level.priority()
            + c.quality_weight * node.metadata.quality
            + c.connection_weight * node.avg_connection_weight()
    }

    /// Filter, score and sort candidates, truncating to `spec.limit`.
    ///
    /// Ties fall to the most recently accessed node, then to the smaller id.
    pub fn rank<'n>(
        &self,
        candidates: impl IntoIterator<Item = &'n MemoryNode>,
        spec: &QuerySpec,
        now: DateTime<Utc>,
    ) -> Vec<QueryHit> {
        let mut hits: Vec<QueryHit> = candidates
            .into_iter()
            .filter_map(|node| {
                let reason = self.matches(node, spec)?;
                Some(QueryHit {
                    relevance: self.score(node, now),
                    node: node.clone(),
                    reason,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.node.last_accessed.cmp(&a.node.last_accessed))
                .then_with(|| a.node.id.cmp(&b.node.id))
        });
        hits.truncate(spec.limit);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embeddings::CosineSimilarity;
    use crate::memory::types::{MemoryKind, MemoryLevel};
    use chrono::Duration;

    fn node(content: &str) -> MemoryNode {
        MemoryNode::new(content, MemoryLevel::Working, MemoryKind::Fact)
    }

    #[test]
    fn test_text_match_is_case_insensitive() {
        let config = RankingConfig::default();
        let ranker = RetrievalRanker::new(&config, &CosineSimilarity);
        let n = node("def Fibonacci(n): ...");

        assert_eq!(ranker.matches(&n, &QuerySpec::text("fibonacci")), Some(MatchReason::Text));
        assert_eq!(ranker.matches(&n, &QuerySpec::text("quicksort")), None);
    }

    #[test]
    fn test_embedding_and_filter_matches() {
        let config = RankingConfig::default();
        let ranker = RetrievalRanker::new(&config, &CosineSimilarity);
        let mut n = node("unrelated words");
        n.embedding = Some(vec![1.0, 0.0]);
        n.metadata.tags.insert("auth".into());

        let by_vector = QuerySpec::text("zzz").embedding(vec![0.9, 0.1]);
        assert_eq!(ranker.matches(&n, &by_vector), Some(MatchReason::Embedding));

        let orthogonal = QuerySpec::text("zzz").embedding(vec![0.0, 1.0]);
        assert_eq!(ranker.matches(&n, &orthogonal), None);

        let by_tag = QuerySpec::text("zzz").tag("auth");
        assert_eq!(ranker.matches(&n, &by_tag), Some(MatchReason::Filter));

        let by_kind = QuerySpec::default().kind(MemoryKind::Fact);
        assert_eq!(ranker.matches(&n, &by_kind), Some(MatchReason::Filter));
    }

    #[test]
    fn test_empty_query_browses() {
        let config = RankingConfig::default();
        let ranker = RetrievalRanker::new(&config, &CosineSimilarity);
        assert_eq!(ranker.matches(&node("x"), &QuerySpec::default()), Some(MatchReason::Browse));
    }

    #[test]
    fn test_score_components() {
        let config = RankingConfig::default();
        let ranker = RetrievalRanker::new(&config, &CosineSimilarity);
        let mut n = node("x");
        let now = n.last_accessed;
        n.metadata.quality = 1.0;
        n.connections.insert("other".into(), 0.5);

        // 0.3*0 + 0.2*1 + 0.2*1.0 + 0.2*1.0 + 0.1*0.5
        assert!((ranker.score(&n, now) - 0.65).abs() < 1e-9);

        // One half-life later the recency term halves
        let later = now + Duration::days(30);
        assert!((ranker.score(&n, later) - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_higher_access_frequency_never_scores_lower() {
        let config = RankingConfig::default();
        let ranker = RetrievalRanker::new(&config, &CosineSimilarity);
        let base = node("same");
        let now = base.last_accessed;

        for (low, high) in [(0.0, 0.1), (0.1, 0.5), (0.5, 3.0), (2.0, 2.0)] {
            let mut a = base.clone();
            let mut b = base.clone();
            a.access_frequency = low;
            b.access_frequency = high;
            assert!(ranker.score(&b, now) >= ranker.score(&a, now));
        }
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let config = RankingConfig::default();
        let ranker = RetrievalRanker::new(&config, &CosineSimilarity);
        let now = Utc::now();

        let mut hot = node("cache entry hot");
        hot.access_frequency = 1.0;
        hot.last_accessed = now;
        let mut cold = node("cache entry cold");
        cold.last_accessed = now - Duration::days(60);
        let mut tied = node("cache entry tied");
        tied.last_accessed = now - Duration::days(60);
        let other = node("nothing here");

        let candidates = [cold.clone(), other, hot.clone(), tied];
        let hits = ranker.rank(&candidates, &QuerySpec::text("cache").limit(2), now);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].node.id, hot.id);
        assert!(hits[0].relevance > hits[1].relevance);
        assert!(hits[1].node.content.contains("cache"));
        assert!(hits.iter().all(|h| h.reason == MatchReason::Text));
    }

    #[test]
    fn test_rank_ties_prefer_recent_access() {
        let config = RankingConfig {
            recency_weight: 0.0,
            ..RankingConfig::default()
        };
        let ranker = RetrievalRanker::new(&config, &CosineSimilarity);
        let now = Utc::now();

        let mut old = node("tie");
        old.last_accessed = now - Duration::days(3);
        let mut fresh = node("tie");
        fresh.last_accessed = now;

        let candidates = [old, fresh.clone()];
        let hits = ranker.rank(&candidates, &QuerySpec::text("tie"), now);
        assert_eq!(hits[0].node.id, fresh.id);
    }
}
