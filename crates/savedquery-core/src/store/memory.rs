//! In-memory hybrid store.
//!
//! Records live in a map keyed by id; edges are kept in forward and reverse
//! adjacency maps keyed by `(node, label)`. Statements are interpreted
//! structurally instead of being rendered to SQL.
//!
//! The store counts statements, path lookups and open sessions, and can be
//! told to fail statements that traverse a given label or have a given kind.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use savedquery_proto::{
    Direction, MatchMode, MetaTypeId, PathId, Polarity, QueryPath, RecordId, Traversal,
};

use super::{Datum, PathStore, ReadSession, Row, SessionProvider, StoreError, StoredRecord};
use crate::statement::{Clause, ClauseGroup, CompareOp, Condition, Statement, TextOp};
use crate::strategy::Strategy;

type EdgeKey = (RecordId, String);

#[derive(Default)]
struct Inner {
    records: RwLock<HashMap<RecordId, StoredRecord>>,
    outgoing: RwLock<HashMap<EdgeKey, BTreeSet<RecordId>>>,
    incoming: RwLock<HashMap<EdgeKey, BTreeSet<RecordId>>>,
    paths: RwLock<HashMap<PathId, QueryPath>>,
    failing_labels: RwLock<HashSet<String>>,
    failing_kinds: RwLock<HashSet<String>>,
    fail_path_lookups: AtomicBool,
    statements: AtomicU64,
    path_lookups: AtomicU64,
    open_sessions: AtomicUsize,
    log: Mutex<Vec<String>>,
}

/// Shared in-memory store. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert_record(&self, record: StoredRecord) {
        self.inner.records.write().insert(record.id.clone(), record);
    }

    /// Add a labelled edge.
    pub fn add_edge(
        &self,
        source: impl Into<RecordId>,
        label: impl Into<String>,
        target: impl Into<RecordId>,
    ) {
        let (source, label, target) = (source.into(), label.into(), target.into());
        self.inner
            .outgoing
            .write()
            .entry((source.clone(), label.clone()))
            .or_default()
            .insert(target.clone());
        self.inner
            .incoming
            .write()
            .entry((target, label))
            .or_default()
            .insert(source);
    }

    /// Remove a labelled edge. Returns whether it existed.
    pub fn remove_edge(&self, source: &RecordId, label: &str, target: &RecordId) -> bool {
        let removed = self
            .inner
            .outgoing
            .write()
            .get_mut(&(source.clone(), label.to_string()))
            .map(|targets| targets.remove(target))
            .unwrap_or(false);
        if let Some(sources) = self
            .inner
            .incoming
            .write()
            .get_mut(&(target.clone(), label.to_string()))
        {
            sources.remove(source);
        }
        removed
    }

    /// Register path metadata.
    pub fn add_path(&self, path: QueryPath) {
        self.inner.paths.write().insert(path.id.clone(), path);
    }

    /// Open a session handle.
    pub fn session(&self) -> MemorySession {
        MemorySession::new(self.inner.clone())
    }

    /// Make every statement that traverses `label` fail.
    pub fn fail_label(&self, label: impl Into<String>) {
        self.inner.failing_labels.write().insert(label.into());
    }

    /// Make every statement of `kind` fail (see [`Statement::kind`]).
    pub fn fail_statements(&self, kind: impl Into<String>) {
        self.inner.failing_kinds.write().insert(kind.into());
    }

    /// Make path lookups fail.
    pub fn fail_path_lookups(&self, fail: bool) {
        self.inner.fail_path_lookups.store(fail, AtomicOrdering::SeqCst);
    }

    /// Clear injected failures.
    pub fn clear_failures(&self) {
        self.inner.failing_labels.write().clear();
        self.inner.failing_kinds.write().clear();
        self.fail_path_lookups(false);
    }

    /// Statements executed so far.
    pub fn statements_executed(&self) -> u64 {
        self.inner.statements.load(AtomicOrdering::SeqCst)
    }

    /// Batch path lookups served so far.
    pub fn path_lookups(&self) -> u64 {
        self.inner.path_lookups.load(AtomicOrdering::SeqCst)
    }

    /// Sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(AtomicOrdering::SeqCst)
    }

    /// Executed statements as `kind` or `kind:strategy`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.inner.log.lock().clone()
    }

    /// Reset statement and lookup counters and the execution log.
    pub fn reset_counters(&self) {
        self.inner.statements.store(0, AtomicOrdering::SeqCst);
        self.inner.path_lookups.store(0, AtomicOrdering::SeqCst);
        self.inner.log.lock().clear();
    }
}

impl Inner {
    fn run(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        if self.failing_kinds.read().contains(statement.kind()) {
            return Err(StoreError::Statement(format!(
                "injected failure for {} statement",
                statement.kind()
            )));
        }

        match statement {
            Statement::MatchIds { meta_type, clause } => {
                let mut rows = Vec::new();
                for id in self.ids_of(meta_type) {
                    if self.clause_matches(&id, clause)? {
                        rows.push(Row::single(Datum::Id(id)));
                    }
                }
                Ok(rows)
            }
            Statement::AllIds { meta_type } => Ok(self
                .ids_of(meta_type)
                .into_iter()
                .map(|id| Row::single(Datum::Id(id)))
                .collect()),
            Statement::RecordExists { meta_type, record } => Ok(vec![Row::single(Datum::Bool(
                self.is_member(meta_type, record),
            ))]),
            Statement::MatchRecord {
                meta_type,
                record,
                group,
            } => {
                let matched =
                    self.is_member(meta_type, record) && self.group_matches(record, group)?;
                Ok(vec![Row::single(Datum::Bool(matched))])
            }
            Statement::Count { meta_type, group } => {
                let mut count = 0i64;
                for id in self.ids_of(meta_type) {
                    if self.group_matches(&id, group)? {
                        count += 1;
                    }
                }
                Ok(vec![Row::single(Datum::Int(count))])
            }
        }
    }

    fn ids_of(&self, meta_type: &MetaTypeId) -> Vec<RecordId> {
        let records = self.records.read();
        let mut ids: Vec<RecordId> = records
            .values()
            .filter(|r| &r.meta_type == meta_type)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn is_member(&self, meta_type: &MetaTypeId, id: &RecordId) -> bool {
        self.records
            .read()
            .get(id)
            .map_or(false, |r| &r.meta_type == meta_type)
    }

    fn group_matches(&self, source: &RecordId, group: &ClauseGroup) -> Result<bool, StoreError> {
        let mut matched = match group.mode {
            MatchMode::And => true,
            MatchMode::Or => false,
        };
        for clause in &group.clauses {
            let hit = self.clause_matches(source, clause)?;
            match group.mode {
                MatchMode::And if !hit => {
                    matched = false;
                    break;
                }
                MatchMode::Or if hit => {
                    matched = true;
                    break;
                }
                _ => {}
            }
        }
        Ok(matched != group.negated)
    }

    fn clause_matches(&self, source: &RecordId, clause: &Clause) -> Result<bool, StoreError> {
        {
            let failing = self.failing_labels.read();
            if let Some(hop) = clause.traversal.hops.iter().find(|h| failing.contains(&h.label)) {
                return Err(StoreError::Statement(format!(
                    "injected failure traversing {}",
                    hop.label
                )));
            }
        }

        let reached = self.reach(source, &clause.traversal);
        let found = match (&clause.strategy, &clause.condition) {
            (Strategy::Direct, Condition::IdIn(ids)) => ids
                .iter()
                .any(|p| reached.contains(&RecordId::from(p.as_str()))),
            (_, condition) => {
                let records = self.records.read();
                reached
                    .iter()
                    .filter_map(|id| records.get(id))
                    .any(|target| evaluate(condition, target))
            }
        };

        Ok(match clause.polarity {
            Polarity::Include => found,
            Polarity::Exclude => !found,
        })
    }

    fn reach(&self, source: &RecordId, traversal: &Traversal) -> BTreeSet<RecordId> {
        let outgoing = self.outgoing.read();
        let incoming = self.incoming.read();

        let mut frontier = BTreeSet::from([source.clone()]);
        for hop in &traversal.hops {
            let edges = match hop.direction {
                Direction::Outgoing => &outgoing,
                Direction::Incoming => &incoming,
            };
            let mut next = BTreeSet::new();
            for node in &frontier {
                if let Some(targets) = edges.get(&(node.clone(), hop.label.clone())) {
                    next.extend(targets.iter().cloned());
                }
            }
            if next.is_empty() {
                return next;
            }
            frontier = next;
        }
        frontier
    }
}

/// Evaluate a condition against one target record.
fn evaluate(condition: &Condition, target: &StoredRecord) -> bool {
    let value = target.value.as_deref();
    match condition {
        Condition::IdIn(ids) => ids.iter().any(|p| p.as_str() == target.id.as_str()),
        Condition::Text { op, patterns } => value.map_or(false, |v| {
            patterns.iter().any(|p| {
                let p = p.as_str();
                match op {
                    TextOp::Contains => v.contains(p),
                    TextOp::StartsWith => v.starts_with(p),
                    TextOp::EndsWith => v.ends_with(p),
                    TextOp::Like => like_match(v, p),
                }
            })
        }),
        Condition::Compare { op, values } => value.map_or(false, |v| {
            values.iter().any(|p| {
                let ord = compare(v, p.as_str());
                match op {
                    CompareOp::Gt => ord.is_gt(),
                    CompareOp::Gte => ord.is_ge(),
                    CompareOp::Lt => ord.is_lt(),
                    CompareOp::Lte => ord.is_le(),
                }
            })
        }),
        Condition::Between { low, high } => value.map_or(false, |v| {
            compare(v, low.as_str()).is_ge() && compare(v, high.as_str()).is_le()
        }),
        Condition::IsNull => value.is_none(),
        Condition::IsNotNull => value.is_some(),
        Condition::Properties(pairs) => pairs.iter().all(|(property, expected)| {
            target
                .properties
                .get(property.as_str())
                .map_or(false, |actual| actual == expected.as_str())
        }),
        Condition::Never => false,
    }
}

/// Numeric comparison when both sides parse as numbers, lexicographic otherwise.
fn compare(actual: &str, expected: &str) -> Ordering {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => actual.cmp(expected),
    }
}

/// SQL LIKE: `%` matches any run, `_` matches one character.
fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    // reachable[i]: the pattern prefix consumed so far can end at value[..i]
    let mut reachable = vec![false; value.len() + 1];
    reachable[0] = true;

    for pc in pattern.chars() {
        let mut next = vec![false; value.len() + 1];
        match pc {
            '%' => {
                let mut seen = false;
                for i in 0..=value.len() {
                    seen |= reachable[i];
                    next[i] = seen;
                }
            }
            '_' => {
                for i in 0..value.len() {
                    if reachable[i] {
                        next[i + 1] = true;
                    }
                }
            }
            c => {
                for i in 0..value.len() {
                    if reachable[i] && value[i] == c {
                        next[i + 1] = true;
                    }
                }
            }
        }
        reachable = next;
    }

    reachable[value.len()]
}

/// A session over a [`MemoryStore`]. Counts as open until dropped.
pub struct MemorySession {
    inner: Arc<Inner>,
}

impl MemorySession {
    fn new(inner: Arc<Inner>) -> Self {
        inner.open_sessions.fetch_add(1, AtomicOrdering::SeqCst);
        Self { inner }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.inner.open_sessions.fetch_sub(1, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl ReadSession for MemorySession {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        self.inner.statements.fetch_add(1, AtomicOrdering::SeqCst);
        let entry = match statement {
            Statement::MatchIds { clause, .. } => format!("match_ids:{}", clause.strategy),
            other => other.kind().to_string(),
        };
        tracing::trace!(
            statement = %entry,
            meta_type = %statement.meta_type(),
            sql = %statement.render().sql,
            "executing"
        );
        self.inner.log.lock().push(entry);
        self.inner.run(statement)
    }

    async fn get(
        &self,
        meta_type: &MetaTypeId,
        id: &RecordId,
    ) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self
            .inner
            .records
            .read()
            .get(id)
            .filter(|r| &r.meta_type == meta_type)
            .cloned())
    }
}

#[async_trait]
impl SessionProvider for MemoryStore {
    async fn open(&self) -> Result<Box<dyn ReadSession>, StoreError> {
        Ok(Box::new(self.session()))
    }
}

#[async_trait]
impl PathStore for MemoryStore {
    async fn get_paths(&self, ids: &[PathId]) -> Result<HashMap<PathId, QueryPath>, StoreError> {
        self.inner.path_lookups.fetch_add(1, AtomicOrdering::SeqCst);
        if self.inner.fail_path_lookups.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Connection("path store unavailable".to_string()));
        }
        let paths = self.inner.paths.read();
        Ok(ids
            .iter()
            .filter_map(|id| paths.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{Param, StatementBuilder};

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, name) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol")] {
            store.insert_record(StoredRecord::new(id, "user").with_value(name));
        }
        store.insert_record(StoredRecord::new("admin", "role").with_value("Administrator"));
        store.insert_record(
            StoredRecord::new("viewer", "role")
                .with_value("Viewer")
                .with_property("level", "1"),
        );
        store.add_edge("u1", "HAS_ROLE", "admin");
        store.add_edge("u2", "HAS_ROLE", "viewer");
        store
    }

    fn clause(expr: &str, strategy: Strategy, condition: Condition, polarity: Polarity) -> Clause {
        Clause {
            strategy,
            traversal: Traversal::parse(expr).unwrap(),
            condition,
            polarity,
        }
    }

    fn ids(rows: Vec<Row>) -> Vec<String> {
        rows.into_iter()
            .filter_map(|r| match r.first() {
                Some(Datum::Id(id)) => Some(id.to_string()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_direct_match() {
        let store = store();
        let session = store.session();
        let meta = MetaTypeId::from("user");
        let stmt = StatementBuilder::new(&meta).match_ids(clause(
            "(s)-[:HAS_ROLE]->(t)",
            Strategy::Direct,
            Condition::IdIn(vec![Param::new("admin")]),
            Polarity::Include,
        ));
        assert_eq!(ids(session.execute(&stmt).await.unwrap()), vec!["u1"]);
        assert_eq!(store.executed(), vec!["match_ids:direct"]);
    }

    #[tokio::test]
    async fn test_exclusion_match() {
        let store = store();
        let session = store.session();
        let meta = MetaTypeId::from("user");
        let stmt = StatementBuilder::new(&meta).match_ids(clause(
            "(s)-[:HAS_ROLE]->(t)",
            Strategy::Exists,
            Condition::IdIn(vec![Param::new("admin")]),
            Polarity::Exclude,
        ));
        assert_eq!(ids(session.execute(&stmt).await.unwrap()), vec!["u2", "u3"]);
    }

    #[tokio::test]
    async fn test_incoming_traversal() {
        let store = store();
        let session = store.session();
        let meta = MetaTypeId::from("role");
        let stmt = StatementBuilder::new(&meta).match_ids(clause(
            "(s)<-[:HAS_ROLE]-(t)",
            Strategy::Standard,
            Condition::Text {
                op: TextOp::StartsWith,
                patterns: vec![Param::new("bo")],
            },
            Polarity::Include,
        ));
        assert_eq!(ids(session.execute(&stmt).await.unwrap()), vec!["viewer"]);
    }

    #[tokio::test]
    async fn test_count_and_record_match() {
        let store = store();
        let session = store.session();
        let meta = MetaTypeId::from("user");
        let builder = StatementBuilder::new(&meta);
        let has_role = clause(
            "(s)-[:HAS_ROLE]->(t)",
            Strategy::Standard,
            Condition::IsNotNull,
            Polarity::Include,
        );

        let rows = session
            .execute(&builder.count(vec![has_role.clone()], MatchMode::And, false))
            .await
            .unwrap();
        assert_eq!(rows[0].first(), Some(&Datum::Int(2)));

        let rows = session
            .execute(&builder.count(vec![has_role.clone()], MatchMode::And, true))
            .await
            .unwrap();
        assert_eq!(rows[0].first(), Some(&Datum::Int(1)));

        let rows = session
            .execute(&builder.match_record(
                &RecordId::from("u3"),
                vec![has_role],
                MatchMode::And,
                false,
            ))
            .await
            .unwrap();
        assert_eq!(rows[0].first(), Some(&Datum::Bool(false)));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = store();
        let session = store.session();
        let meta = MetaTypeId::from("user");
        let builder = StatementBuilder::new(&meta);

        store.fail_label("HAS_ROLE");
        let stmt = builder.match_ids(clause(
            "(s)-[:HAS_ROLE]->(t)",
            Strategy::Standard,
            Condition::IsNotNull,
            Polarity::Include,
        ));
        assert!(session.execute(&stmt).await.is_err());

        store.clear_failures();
        store.fail_statements("all_ids");
        assert!(session.execute(&builder.all_ids()).await.is_err());
        assert!(session.execute(&stmt).await.is_ok());
    }

    #[tokio::test]
    async fn test_sessions_are_counted_until_dropped() {
        let store = store();
        let session = store.session();
        let boxed = store.open().await.unwrap();
        assert_eq!(store.open_sessions(), 2);
        drop(session);
        drop(boxed);
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_path_store() {
        let store = store();
        store.add_path(QueryPath::new("p1", "(s)-[:HAS_ROLE]->(t)", "user", "role"));
        let paths = store
            .get_paths(&[PathId::from("p1"), PathId::from("p2")])
            .await
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(store.path_lookups(), 1);

        store.fail_path_lookups(true);
        assert!(store.get_paths(&[PathId::from("p1")]).await.is_err());
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("Administrator", "Admin%"));
        assert!(like_match("Administrator", "%str%"));
        assert!(like_match("cat", "c_t"));
        assert!(!like_match("cart", "c_t"));
        assert!(like_match("", "%"));
        assert!(!like_match("abc", "ab"));
    }

    #[test]
    fn test_compare_numeric_and_text() {
        assert_eq!(compare("10", "9"), Ordering::Greater);
        assert_eq!(compare("apple", "banana"), Ordering::Less);
        assert_eq!(compare("2.50", "2.5"), Ordering::Equal);
    }

    #[test]
    fn test_evaluate_properties() {
        let target = StoredRecord::new("r", "role").with_property("level", "1");
        assert!(evaluate(
            &Condition::Properties(vec![(Param::new("level"), Param::new("1"))]),
            &target
        ));
        assert!(!evaluate(
            &Condition::Properties(vec![(Param::new("level"), Param::new("2"))]),
            &target
        ));
        assert!(evaluate(&Condition::IsNull, &target));
    }
}
