//! OpenSearch query builders.
//!
//! This module translates a `SearchQuery` into an OpenSearch request body and
//! parses the raw response back into a `SearchResponse`.

use serde_json::{json, Map, Value};

use crate::errors::SearchError;
use record_index_shared::{fields, QueryKind, SearchHit, SearchQuery, SearchResponse};

/// Build an OpenSearch search body from a SearchQuery.
///
/// The query builder handles:
/// - Free-text queries via `simple_query_string`, which tolerates user syntax errors
/// - `multi_match` over an explicit field list (boosts like `Title^2` are passed through)
/// - Structured clauses passed verbatim
/// - A `term` filter on the stage tags when the query is scoped to a stage
/// - Pagination and aggregations
pub fn build_search_query(query: &SearchQuery) -> Value {
    let clause = build_clause(&query.kind);

    let clause = match query.stage {
        Some(stage) => json!({
            "bool": {
                "must": [clause],
                "filter": [
                    { "term": { (fields::STAGE): stage.as_str() } }
                ]
            }
        }),
        None => clause,
    };

    let mut body = json!({
        "query": clause,
        "track_total_hits": true
    });

    if let Some(size) = query.size {
        body["size"] = json!(size);
    }
    if let Some(from) = query.from {
        body["from"] = json!(from);
    }
    if let Some(aggregations) = &query.aggregations {
        body["aggs"] = aggregations.clone();
    }

    body
}

fn build_clause(kind: &QueryKind) -> Value {
    match kind {
        QueryKind::MatchAll => json!({ "match_all": {} }),
        QueryKind::Text(text) => json!({
            "simple_query_string": {
                "query": text,
                "default_operator": "and"
            }
        }),
        QueryKind::MultiMatch { query, fields } => json!({
            "multi_match": {
                "query": query,
                "fields": fields
            }
        }),
        QueryKind::Filter(clause) => clause.clone(),
    }
}

/// Parse a raw OpenSearch search response.
pub fn parse_search_response(body: &Value) -> Result<SearchResponse, SearchError> {
    let hits_value = body
        .get("hits")
        .ok_or_else(|| SearchError::parse("response has no hits section"))?;

    let total = match &hits_value["total"] {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        other => other["value"].as_u64().unwrap_or(0),
    };

    let hits = hits_value["hits"]
        .as_array()
        .map(|hits| hits.iter().map(parse_hit).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    Ok(SearchResponse {
        hits,
        total,
        took_ms: body["took"].as_u64().unwrap_or(0),
        aggregations: body.get("aggregations").cloned(),
    })
}

fn parse_hit(hit: &Value) -> Result<SearchHit, SearchError> {
    let id = hit["_id"]
        .as_str()
        .ok_or_else(|| SearchError::parse("hit has no _id"))?
        .to_string();

    let source = match &hit["_source"] {
        Value::Object(source) => source.clone(),
        _ => Map::new(),
    };

    Ok(SearchHit {
        id,
        score: hit["_score"].as_f64(),
        source,
    })
}
