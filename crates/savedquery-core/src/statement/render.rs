//! SQL rendering for statements.
//!
//! Target schema: `records(id, meta_type, value, properties)` and
//! `edges(source_id, label, target_id)`. Every literal is bound; the rendered
//! text only contains `$n` placeholders.

use savedquery_proto::{Direction, MatchMode, Polarity};

use super::{Clause, ClauseGroup, CompareOp, Condition, Param, Statement, TextOp};
use crate::strategy::Strategy;

/// SQL text plus positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStatement {
    /// Statement text with `$1..$n` placeholders.
    pub sql: String,
    /// Parameter values, `params[0]` binds `$1`.
    pub params: Vec<String>,
}

impl Statement {
    /// Render to parameterized SQL.
    pub fn render(&self) -> RenderedStatement {
        let mut r = Renderer::default();
        let sql = match self {
            Statement::MatchIds { meta_type, clause } if clause.strategy == Strategy::Direct => {
                r.direct_join(meta_type.as_str(), clause)
            }
            Statement::MatchIds { meta_type, clause } => {
                let m = r.bind(meta_type.as_str());
                let predicate = r.clause(clause);
                format!("SELECT s.id FROM records s WHERE s.meta_type = {m} AND {predicate}")
            }
            Statement::AllIds { meta_type } => {
                let m = r.bind(meta_type.as_str());
                format!("SELECT s.id FROM records s WHERE s.meta_type = {m}")
            }
            Statement::RecordExists { meta_type, record } => {
                let id = r.bind(record.as_str());
                let m = r.bind(meta_type.as_str());
                format!(
                    "SELECT EXISTS (SELECT 1 FROM records s WHERE s.id = {id} AND s.meta_type = {m})"
                )
            }
            Statement::MatchRecord {
                meta_type,
                record,
                group,
            } => {
                let id = r.bind(record.as_str());
                let m = r.bind(meta_type.as_str());
                let predicate = r.group(group);
                format!(
                    "SELECT EXISTS (SELECT 1 FROM records s WHERE s.id = {id} AND s.meta_type = {m} AND {predicate})"
                )
            }
            Statement::Count { meta_type, group } => {
                let m = r.bind(meta_type.as_str());
                let predicate = r.group(group);
                format!("SELECT COUNT(*) FROM records s WHERE s.meta_type = {m} AND {predicate}")
            }
        };

        RenderedStatement {
            sql,
            params: r.params,
        }
    }
}

/// Columns an edge is entered from and left through for a hop direction.
fn hop_columns(direction: Direction) -> (&'static str, &'static str) {
    match direction {
        Direction::Outgoing => ("source_id", "target_id"),
        Direction::Incoming => ("target_id", "source_id"),
    }
}

#[derive(Default)]
struct Renderer {
    params: Vec<String>,
}

impl Renderer {
    fn bind(&mut self, value: &str) -> String {
        self.params.push(value.to_string());
        format!("${}", self.params.len())
    }

    fn bind_all(&mut self, values: &[Param]) -> Vec<String> {
        values.iter().map(|p| self.bind(p.as_str())).collect()
    }

    fn direct_join(&mut self, meta_type: &str, clause: &Clause) -> String {
        let (hop, ids) = match (clause.traversal.hops.as_slice(), &clause.condition) {
            ([hop], Condition::IdIn(ids)) => (hop, ids),
            // Not a direct shape after all; use the general form.
            _ => {
                let m = self.bind(meta_type);
                let predicate = self.clause(clause);
                return format!("SELECT s.id FROM records s WHERE s.meta_type = {m} AND {predicate}");
            }
        };

        let (entry, exit) = hop_columns(hop.direction);
        let label = self.bind(&hop.label);
        let m = self.bind(meta_type);
        let ids = self.bind_all(ids);
        format!(
            "SELECT DISTINCT s.id FROM records s JOIN edges e1 ON e1.{entry} = s.id AND e1.label = {label} \
             WHERE s.meta_type = {m} AND e1.{exit} IN ({})",
            ids.join(", ")
        )
    }

    fn group(&mut self, group: &ClauseGroup) -> String {
        let joiner = match group.mode {
            MatchMode::And => " AND ",
            MatchMode::Or => " OR ",
        };
        let body = if group.clauses.is_empty() {
            match group.mode {
                MatchMode::And => "TRUE".to_string(),
                MatchMode::Or => "FALSE".to_string(),
            }
        } else {
            let parts: Vec<String> = group.clauses.iter().map(|c| self.clause(c)).collect();
            parts.join(joiner)
        };

        if group.negated {
            format!("NOT ({body})")
        } else {
            format!("({body})")
        }
    }

    fn clause(&mut self, clause: &Clause) -> String {
        let exists = self.traversal_exists(clause);
        match clause.polarity {
            Polarity::Include => exists,
            Polarity::Exclude => format!("NOT {exists}"),
        }
    }

    fn traversal_exists(&mut self, clause: &Clause) -> String {
        let hops = &clause.traversal.hops;
        let Some(last) = hops.last() else {
            return "FALSE".to_string();
        };

        let mut from = String::new();
        let mut filters = Vec::new();
        for (i, hop) in hops.iter().enumerate() {
            let edge = format!("e{}", i + 1);
            let (entry, _) = hop_columns(hop.direction);
            let label = self.bind(&hop.label);
            if i == 0 {
                from.push_str(&format!("edges {edge}"));
                filters.push(format!("{edge}.{entry} = s.id"));
                filters.push(format!("{edge}.label = {label}"));
            } else {
                let (_, prev_exit) = hop_columns(hops[i - 1].direction);
                from.push_str(&format!(
                    " JOIN edges {edge} ON {edge}.{entry} = e{i}.{prev_exit} AND {edge}.label = {label}"
                ));
            }
        }

        let (_, exit) = hop_columns(last.direction);
        let last_edge = format!("e{}", hops.len());
        match (&clause.strategy, &clause.condition) {
            (Strategy::Direct, Condition::IdIn(ids)) => {
                let ids = self.bind_all(ids);
                filters.push(format!("{last_edge}.{exit} IN ({})", ids.join(", ")));
            }
            (_, condition) => {
                from.push_str(&format!(" JOIN records t ON t.id = {last_edge}.{exit}"));
                filters.push(self.condition(condition));
            }
        }

        format!("EXISTS (SELECT 1 FROM {from} WHERE {})", filters.join(" AND "))
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::IdIn(ids) if ids.is_empty() => "FALSE".to_string(),
            Condition::IdIn(ids) => {
                let ids = self.bind_all(ids);
                format!("t.id IN ({})", ids.join(", "))
            }
            Condition::Text { op, patterns } => {
                let parts: Vec<String> = patterns
                    .iter()
                    .map(|p| {
                        let n = self.bind(p.as_str());
                        match op {
                            TextOp::Contains => format!("t.value LIKE '%' || {n} || '%'"),
                            TextOp::StartsWith => format!("t.value LIKE {n} || '%'"),
                            TextOp::EndsWith => format!("t.value LIKE '%' || {n}"),
                            TextOp::Like => format!("t.value LIKE {n}"),
                        }
                    })
                    .collect();
                any(parts)
            }
            Condition::Compare { op, values } => {
                let symbol = match op {
                    CompareOp::Gt => ">",
                    CompareOp::Gte => ">=",
                    CompareOp::Lt => "<",
                    CompareOp::Lte => "<=",
                };
                let parts: Vec<String> = values
                    .iter()
                    .map(|p| format!("t.value {symbol} {}", self.bind(p.as_str())))
                    .collect();
                any(parts)
            }
            Condition::Between { low, high } => {
                let low = self.bind(low.as_str());
                let high = self.bind(high.as_str());
                format!("t.value BETWEEN {low} AND {high}")
            }
            Condition::IsNull => "t.value IS NULL".to_string(),
            Condition::IsNotNull => "t.value IS NOT NULL".to_string(),
            Condition::Properties(pairs) => {
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|(property, value)| {
                        let k = self.bind(property.as_str());
                        let v = self.bind(value.as_str());
                        format!("(t.properties ->> {k}) = {v}")
                    })
                    .collect();
                format!("({})", parts.join(" AND "))
            }
            Condition::Never => "FALSE".to_string(),
        }
    }
}

fn any(parts: Vec<String>) -> String {
    if parts.is_empty() {
        "FALSE".to_string()
    } else {
        format!("({})", parts.join(" OR "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use savedquery_proto::{MetaTypeId, RecordId, Traversal};

    fn clause(expr: &str, strategy: Strategy, condition: Condition, polarity: Polarity) -> Clause {
        Clause {
            strategy,
            traversal: Traversal::parse(expr).unwrap(),
            condition,
            polarity,
        }
    }

    #[test]
    fn test_direct_join_binds_everything() {
        let stmt = Statement::MatchIds {
            meta_type: MetaTypeId::from("user"),
            clause: clause(
                "(s)-[:HAS_ROLE]->(t)",
                Strategy::Direct,
                Condition::IdIn(vec![Param::new("role-x")]),
                Polarity::Include,
            ),
        };
        let rendered = stmt.render();
        assert!(rendered.sql.starts_with("SELECT DISTINCT s.id"));
        assert!(rendered.sql.contains("e1.target_id IN ($3)"));
        assert!(!rendered.sql.contains("role-x"));
        assert!(!rendered.sql.contains("HAS_ROLE"));
        assert_eq!(rendered.params, vec!["HAS_ROLE", "user", "role-x"]);
    }

    #[test]
    fn test_exclusion_renders_not_exists() {
        let stmt = Statement::MatchIds {
            meta_type: MetaTypeId::from("user"),
            clause: clause(
                "(s)-[:HAS_ROLE]->(t)",
                Strategy::Exists,
                Condition::IdIn(vec![Param::new("banned")]),
                Polarity::Exclude,
            ),
        };
        let rendered = stmt.render();
        assert!(rendered.sql.contains("NOT EXISTS (SELECT 1 FROM edges e1"));
        assert!(rendered.sql.contains("JOIN records t ON t.id = e1.target_id"));
        assert!(!rendered.sql.contains("banned"));
    }

    #[test]
    fn test_multi_hop_incoming() {
        let stmt = Statement::MatchIds {
            meta_type: MetaTypeId::from("user"),
            clause: clause(
                "(s)-[:MEMBER_OF]->(g)<-[:OWNS]-(t)",
                Strategy::Standard,
                Condition::Text {
                    op: TextOp::StartsWith,
                    patterns: vec![Param::new("acme'; DROP TABLE records; --")],
                },
                Polarity::Include,
            ),
        };
        let rendered = stmt.render();
        assert!(rendered
            .sql
            .contains("JOIN edges e2 ON e2.target_id = e1.target_id AND e2.label = $3"));
        assert!(rendered.sql.contains("JOIN records t ON t.id = e2.source_id"));
        assert!(rendered.sql.contains("t.value LIKE $4 || '%'"));
        assert!(!rendered.sql.contains("DROP"));
        assert_eq!(rendered.params.len(), 4);
    }

    #[test]
    fn test_count_group() {
        let stmt = Statement::Count {
            meta_type: MetaTypeId::from("user"),
            group: ClauseGroup {
                clauses: vec![
                    clause(
                        "(s)-[:HAS_ROLE]->(t)",
                        Strategy::Direct,
                        Condition::IdIn(vec![Param::new("r1")]),
                        Polarity::Include,
                    ),
                    clause(
                        "(s)-[:LIVES_IN]->(t)",
                        Strategy::Standard,
                        Condition::IsNotNull,
                        Polarity::Include,
                    ),
                ],
                mode: MatchMode::Or,
                negated: true,
            },
        };
        let rendered = stmt.render();
        assert!(rendered.sql.starts_with("SELECT COUNT(*)"));
        assert!(rendered.sql.contains("NOT (EXISTS"));
        assert!(rendered.sql.contains(" OR EXISTS"));
        assert!(rendered.sql.contains("t.value IS NOT NULL"));
    }

    #[test]
    fn test_record_scoped_statements() {
        let stmt = Statement::RecordExists {
            meta_type: MetaTypeId::from("user"),
            record: RecordId::from("u1"),
        };
        let rendered = stmt.render();
        assert!(rendered.sql.contains("s.id = $1 AND s.meta_type = $2"));
        assert_eq!(rendered.params, vec!["u1", "user"]);
    }

    #[test]
    fn test_never_and_empty_conditions() {
        let stmt = Statement::MatchIds {
            meta_type: MetaTypeId::from("item"),
            clause: clause(
                "(s)-[:PRICED]->(t)",
                Strategy::Standard,
                Condition::Never,
                Polarity::Include,
            ),
        };
        assert!(stmt.render().sql.ends_with("AND FALSE)"));
    }
}
