//! Cache key derivation.
//!
//! Persisted queries are keyed by id. Unpersisted queries are keyed by a blake3
//! hash of a canonical JSON form of their structure: meta-type, each value
//! clause's path, polarity, lookup and value ids in their given order (`range`
//! reads its bounds positionally), each sub-query's own key, and the four
//! combinator flags. Clause ids and other identity-only
//! fields do not take part, so structurally equal queries share a key.

use std::collections::BTreeSet;

use serde::Serialize;

use savedquery_proto::{
    Lookup, MatchMode, MetaTypeId, PathId, Polarity, Query, QueryId, RecordId, ValueId,
};

/// Tag carried by every entry computed over `meta_type`.
pub fn meta_type_tag(meta_type: &MetaTypeId) -> String {
    format!("meta_type:{}", meta_type)
}

/// Tag carried by record-match entries for `record`.
pub fn record_tag(record: &RecordId) -> String {
    format!("record:{}", record)
}

/// Tag carried by entries that depend on persisted query `id`.
pub fn query_tag(id: &QueryId) -> String {
    format!("query:{}", id)
}

/// Tag carried by count entries.
pub fn count_tag() -> String {
    "count".to_string()
}

#[derive(Serialize)]
struct CanonicalValue<'a> {
    path: &'a PathId,
    include: bool,
    lookup: Option<&'a Lookup>,
    values: &'a [ValueId],
}

#[derive(Serialize)]
struct CanonicalQuery<'a> {
    meta_type: &'a MetaTypeId,
    values: Vec<CanonicalValue<'a>>,
    sub_queries: Vec<String>,
    match_values: MatchMode,
    match_queries: MatchMode,
    include_values: Polarity,
    include_queries: Polarity,
}

/// Structural identity of a query, used to derive cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryFingerprint {
    base: String,
}

impl QueryFingerprint {
    /// Derive the fingerprint of `query`.
    ///
    /// Returns `None` when the query cannot be canonicalized; callers then
    /// bypass the cache for that call.
    pub fn from_query(query: &Query) -> Option<Self> {
        Self::base_key(query).map(|base| Self { base })
    }

    fn base_key(query: &Query) -> Option<String> {
        if let Some(id) = &query.id {
            return Some(format!("query:{}", id));
        }

        let sub_queries = query
            .sub_queries
            .iter()
            .map(Self::base_key)
            .collect::<Option<Vec<_>>>()?;

        let canonical = CanonicalQuery {
            meta_type: &query.meta_type,
            values: query
                .values
                .iter()
                .map(|v| CanonicalValue {
                    path: &v.path,
                    include: v.polarity == Polarity::Include,
                    lookup: v.lookup.as_ref(),
                    values: &v.values,
                })
                .collect(),
            sub_queries,
            match_values: query.match_values,
            match_queries: query.match_queries,
            include_values: query.include_values,
            include_queries: query.include_queries,
        };

        let bytes = serde_json::to_vec(&canonical).ok()?;
        Some(format!("query:fp:{}", blake3::hash(&bytes).to_hex()))
    }

    /// Key for the full result.
    pub fn result_key(&self) -> String {
        self.base.clone()
    }

    /// Key for a single-record match.
    pub fn record_key(&self, record: &RecordId) -> String {
        format!("record_match:{}:{}", self.base, hex::encode(record.as_str()))
    }

    /// Key for the count.
    pub fn count_key(&self) -> String {
        format!("count:{}", self.base)
    }

    /// Tags shared by every entry derived from `query`: the meta-type and id of
    /// the query and of every nested sub-query.
    pub fn tags(query: &Query) -> Vec<String> {
        let mut tags = BTreeSet::new();
        collect_tags(query, &mut tags);
        tags.into_iter().collect()
    }
}

fn collect_tags(query: &Query, tags: &mut BTreeSet<String>) {
    tags.insert(meta_type_tag(&query.meta_type));
    if let Some(id) = &query.id {
        tags.insert(query_tag(id));
    }
    for sub in &query.sub_queries {
        collect_tags(sub, tags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use savedquery_proto::QueryValue;

    fn role_query(values: &[&str]) -> Query {
        Query::new("user").with_value(
            QueryValue::new("v1", "p1")
                .with_lookup(Lookup::Equal)
                .with_values(values.iter().copied()),
        )
    }

    #[test]
    fn test_persisted_query_keyed_by_id() {
        let fp = QueryFingerprint::from_query(&role_query(&["a"]).with_id("q1")).unwrap();
        assert_eq!(fp.result_key(), "query:q1");
        assert_eq!(fp.count_key(), "count:query:q1");
    }

    #[test]
    fn test_identical_structure_same_key() {
        let fp1 = QueryFingerprint::from_query(&role_query(&["a", "b"])).unwrap();
        let fp2 = QueryFingerprint::from_query(&role_query(&["a", "b"])).unwrap();
        assert_eq!(fp1, fp2);
        assert!(fp1.result_key().starts_with("query:fp:"));
    }

    #[test]
    fn test_clause_ids_do_not_matter() {
        let q1 = Query::new("user").with_value(QueryValue::new("v1", "p1").with_value("a"));
        let q2 = Query::new("user").with_value(QueryValue::new("v9", "p1").with_value("a"));
        assert_eq!(
            QueryFingerprint::from_query(&q1),
            QueryFingerprint::from_query(&q2)
        );
    }

    #[test]
    fn test_range_bounds_order_differs() {
        let range = |bounds: [&str; 2]| {
            Query::new("user").with_value(
                QueryValue::new("v1", "score")
                    .with_lookup(Lookup::Range)
                    .with_values(bounds),
            )
        };
        let forward = QueryFingerprint::from_query(&range(["20", "30"])).unwrap();
        let reversed = QueryFingerprint::from_query(&range(["30", "20"])).unwrap();
        assert_ne!(forward, reversed);
    }

    #[test]
    fn test_different_values_same_length_differ() {
        let fp1 = QueryFingerprint::from_query(&role_query(&["a", "b"])).unwrap();
        let fp2 = QueryFingerprint::from_query(&role_query(&["a", "c"])).unwrap();
        assert_ne!(fp1, fp2);
    }

    #[test]
    fn test_flags_and_polarity_differ() {
        let base = role_query(&["a"]);
        let fp = QueryFingerprint::from_query(&base).unwrap();

        let or = base.clone().match_values(MatchMode::Or);
        assert_ne!(QueryFingerprint::from_query(&or).unwrap(), fp);

        let excluded = Query::new("user").with_value(
            QueryValue::new("v1", "p1")
                .with_lookup(Lookup::Equal)
                .with_value("a")
                .excluding(),
        );
        assert_ne!(QueryFingerprint::from_query(&excluded).unwrap(), fp);
    }

    #[test]
    fn test_sub_queries_use_their_own_keys() {
        let persisted = Query::new("user").with_sub_query(role_query(&["a"]).with_id("q1"));
        let other_id = Query::new("user").with_sub_query(role_query(&["a"]).with_id("q2"));
        let inline = Query::new("user").with_sub_query(role_query(&["a"]));
        let fp1 = QueryFingerprint::from_query(&persisted).unwrap();
        let fp2 = QueryFingerprint::from_query(&other_id).unwrap();
        let fp3 = QueryFingerprint::from_query(&inline).unwrap();
        assert_ne!(fp1, fp2);
        assert_ne!(fp1, fp3);
    }

    #[test]
    fn test_record_keys_are_distinct() {
        let fp = QueryFingerprint::from_query(&role_query(&["a"]).with_id("q1")).unwrap();
        assert_ne!(
            fp.record_key(&RecordId::from("u1")),
            fp.record_key(&RecordId::from("u2"))
        );
        assert!(fp.record_key(&RecordId::from("u1")).starts_with("record_match:query:q1:"));
    }

    #[test]
    fn test_tags_cover_nested_queries() {
        let query = Query::new("user")
            .with_id("parent")
            .with_sub_query(Query::new("user").with_id("child"))
            .with_sub_query(Query::new("account"));
        assert_eq!(
            QueryFingerprint::tags(&query),
            vec![
                "meta_type:account".to_string(),
                "meta_type:user".to_string(),
                "query:child".to_string(),
                "query:parent".to_string(),
            ]
        );
    }
}
