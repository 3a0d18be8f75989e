//! Search request and response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::stage::Stage;

/// What the query matches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryKind {
    /// Every document.
    MatchAll,
    /// Free-text query over all fields.
    Text(String),
    /// Match query text against a set of fields (`Field^boost` allowed).
    MultiMatch { query: String, fields: Vec<String> },
    /// A structured query clause, passed to the engine as-is.
    Filter(Value),
}

/// Parameters for a search against the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub kind: QueryKind,
    /// Maximum number of hits to return.
    pub size: Option<usize>,
    /// Offset of the first hit.
    pub from: Option<usize>,
    /// Aggregation definitions, passed through to the engine.
    pub aggregations: Option<Value>,
    /// The caller's active stage. Hits tagged for other stages are excluded.
    pub stage: Option<Stage>,
}

impl SearchQuery {
    fn with_kind(kind: QueryKind) -> Self {
        Self {
            kind,
            size: None,
            from: None,
            aggregations: None,
            stage: None,
        }
    }

    pub fn match_all() -> Self {
        Self::with_kind(QueryKind::MatchAll)
    }

    pub fn text(query: impl Into<String>) -> Self {
        Self::with_kind(QueryKind::Text(query.into()))
    }

    pub fn multi_match<I, S>(query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(QueryKind::MultiMatch {
            query: query.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        })
    }

    pub fn filter(clause: Value) -> Self {
        Self::with_kind(QueryKind::Filter(clause))
    }

    /// Scope the query to a stage.
    pub fn in_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Narrow the page of hits.
    pub fn with_page(mut self, size: usize, from: usize) -> Self {
        self.size = Some(size);
        self.from = Some(from);
        self
    }

    pub fn with_aggregations(mut self, aggregations: Value) -> Self {
        self.aggregations = Some(aggregations);
        self
    }
}

/// A raw hit returned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id string.
    pub id: String,
    /// Relevance score, absent for unscored queries.
    pub score: Option<f64>,
    /// Source payload the document was indexed with.
    pub source: Map<String, Value>,
}

/// Raw result set of a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Hits in relevance order.
    pub hits: Vec<SearchHit>,
    /// Total matching documents.
    pub total: u64,
    /// Time the engine spent on the query, in milliseconds.
    pub took_ms: u64,
    /// Aggregation results, if any were requested.
    pub aggregations: Option<Value>,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builders() {
        let query = SearchQuery::multi_match("rust", ["Title^2", "Content"])
            .in_stage(Stage::Published)
            .with_page(10, 20);

        assert_eq!(
            query.kind,
            QueryKind::MultiMatch {
                query: "rust".to_string(),
                fields: vec!["Title^2".to_string(), "Content".to_string()],
            }
        );
        assert_eq!(query.stage, Some(Stage::Published));
        assert_eq!(query.size, Some(10));
        assert_eq!(query.from, Some(20));
    }

    #[test]
    fn test_empty_response() {
        let response = SearchResponse::empty();
        assert!(response.hits.is_empty());
        assert_eq!(response.total, 0);
    }
}
