//! Routing of ad-hoc read queries to the shard owning their table.

use std::time::Instant;

use logshard_observability as obs;
use tracing::debug;

use crate::error::{Error, Result};
use crate::resolver::FamilyResolver;
use crate::result::ResultSet;

/// Keywords that end the table reference following `FROM`.
const CLAUSE_KEYWORDS: [&str; 4] = ["WHERE", "GROUP", "ORDER", "LIMIT"];

/// Extracts the table a `SELECT ... FROM <table> [WHERE ...]` query reads.
///
/// Only the leading `SELECT` and the first standalone `FROM` are recognized;
/// the text between `FROM` and the next clause keyword (or `;`, or the end)
/// is trimmed and unquoted. An unquoted name is lowercased the way both
/// engines fold identifiers. Joins and subqueries are not understood.
pub fn extract_target_table(sql: &str) -> Result<String> {
    let sql = sql.trim();
    let statement = match first_unquoted_semicolon(sql) {
        Some(end) if !sql[end + 1..].trim().is_empty() => {
            return Err(Error::malformed_query("only a single statement is allowed"));
        }
        Some(end) => &sql[..end],
        None => sql,
    };

    let words = keyword_positions(statement);
    match words.first() {
        Some((_, word)) if word.eq_ignore_ascii_case("SELECT") => {}
        _ => return Err(Error::malformed_query("expected a SELECT statement")),
    }
    let from_end = words
        .iter()
        .find(|(_, word)| word.eq_ignore_ascii_case("FROM"))
        .map(|(start, word)| start + word.len())
        .ok_or_else(|| Error::malformed_query("missing FROM clause"))?;

    let clause_start = words
        .iter()
        .filter(|(start, _)| *start >= from_end)
        .find(|(_, word)| CLAUSE_KEYWORDS.iter().any(|kw| word.eq_ignore_ascii_case(kw)))
        .map(|(start, _)| *start)
        .unwrap_or(statement.len());

    let target = match unquote(statement[from_end..clause_start].trim()) {
        Some(quoted) => quoted.to_string(),
        None => statement[from_end..clause_start].trim().to_ascii_lowercase(),
    };
    if target.is_empty() {
        return Err(Error::malformed_query("missing table after FROM"));
    }
    Ok(target)
}

/// Byte offsets and text of every bare word outside quoted sections.
fn keyword_positions(sql: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;
    for (index, c) in sql.char_indices() {
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            continue;
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            start.get_or_insert(index);
            continue;
        }
        if let Some(begin) = start.take() {
            words.push((begin, &sql[begin..index]));
        }
        if matches!(c, '\'' | '"' | '`') {
            quote = Some(c);
        }
    }
    if let Some(begin) = start {
        words.push((begin, &sql[begin..]));
    }
    words
}

fn first_unquoted_semicolon(sql: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (index, c) in sql.char_indices() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if matches!(c, '\'' | '"' | '`') => quote = Some(c),
            None if c == ';' => return Some(index),
            None => {}
        }
    }
    None
}

/// The inner text of a quoted identifier, or `None` if `name` is bare.
fn unquote(name: &str) -> Option<&str> {
    ['"', '`'].into_iter().find_map(|quote| {
        (name.len() >= 2 && name.starts_with(quote) && name.ends_with(quote))
            .then(|| &name[1..name.len() - 1])
    })
}

/// Dispatches read queries to the shard hosting the referenced family.
#[derive(Debug, Clone)]
pub struct QueryRouter {
    resolver: FamilyResolver,
}

impl QueryRouter {
    /// Router resolving through `resolver`.
    pub fn new(resolver: FamilyResolver) -> Self {
        Self { resolver }
    }

    /// Runs `sql` verbatim on the owning shard.
    ///
    /// Returns [`Error::MalformedQuery`] when no table can be extracted and
    /// [`Error::FamilyNotFound`] when no shard hosts it; nothing is executed
    /// in either case.
    pub async fn query(&self, sql: &str) -> Result<ResultSet> {
        let table = extract_target_table(sql)?;
        let shard = self
            .resolver
            .locate(&table)
            .await
            .ok_or_else(|| Error::FamilyNotFound(table.clone()))?;

        debug!(family = %table, shard = %shard.label(), "routing query");
        let started = Instant::now();
        let result = shard
            .connection()
            .fetch_all(sql)
            .await
            .map_err(|source| Error::storage("query", table.as_str(), source))?;
        obs::record_query_latency(&table, shard.label(), result.rows.len(), started.elapsed());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_table_before_where() {
        assert_eq!(
            extract_target_table("SELECT * FROM auth WHERE port = 22").unwrap(),
            "auth"
        );
        assert_eq!(extract_target_table("select a, b from  auth ;").unwrap(), "auth");
        assert_eq!(
            extract_target_table("SELECT count(*) FROM \"auth\" ORDER BY 1 LIMIT 3").unwrap(),
            "auth"
        );
        assert_eq!(
            extract_target_table("SELECT * FROM `auth`\nwhere user = 'from x'").unwrap(),
            "auth"
        );
    }

    #[test]
    fn folds_unquoted_table_names_only() {
        assert_eq!(extract_target_table("SELECT * FROM Auth").unwrap(), "auth");
        assert_eq!(
            extract_target_table("SELECT * FROM AUTH WHERE x = 1").unwrap(),
            "auth"
        );
        assert_eq!(extract_target_table("SELECT * FROM \"Auth\"").unwrap(), "Auth");
    }

    #[test]
    fn ignores_keywords_inside_literals_and_identifiers() {
        assert_eq!(
            extract_target_table("SELECT 'FROM nowhere' AS x, from_addr FROM mail WHERE 1 = 1")
                .unwrap(),
            "mail"
        );
    }

    #[test]
    fn rejects_queries_without_source_table() {
        assert!(matches!(
            extract_target_table("SELECT 1"),
            Err(Error::MalformedQuery(_))
        ));
        assert!(matches!(
            extract_target_table("SELECT * FROM WHERE x = 1"),
            Err(Error::MalformedQuery(_))
        ));
        assert!(matches!(
            extract_target_table(""),
            Err(Error::MalformedQuery(_))
        ));
    }

    #[test]
    fn semicolons_inside_literals_are_not_terminators() {
        assert_eq!(
            extract_target_table("SELECT * FROM auth WHERE user = 'a;b'").unwrap(),
            "auth"
        );
    }

    #[test]
    fn rejects_non_select_and_multiple_statements() {
        assert!(matches!(
            extract_target_table("DELETE FROM auth"),
            Err(Error::MalformedQuery(_))
        ));
        assert!(matches!(
            extract_target_table("SELECT * FROM auth; DROP TABLE auth"),
            Err(Error::MalformedQuery(_))
        ));
    }
}
