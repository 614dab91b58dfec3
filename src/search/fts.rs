//! Token-overlap full-text search over relational rows (spec §4.2/§4.7).
//!
//! redb has no virtual-table FTS, so "full-text search" here tokenizes
//! the primary text columns at query time, ranks by term-overlap count
//! descending (ties broken by id descending, matching the default list
//! order), and falls back to a case-insensitive substring scan whenever
//! the tokenized query produces zero hits — the Rust-native reading of
//! spec §4.2's "if an FTS query fails, fall back to LIKE" (see
//! `SPEC_FULL.md` §4.2: there is no virtual table to fail, so "zero
//! token-based hits" is the fallback condition instead).

use crate::storage::schema::{CustomDataRow, DecisionRow};

/// Lowercases and splits on non-alphanumeric boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Counts how many of `query_tokens` occur as tokens of `text`.
fn overlap_score(query_tokens: &[String], text: &str) -> usize {
    let text_tokens = tokenize(text);
    query_tokens
        .iter()
        .filter(|qt| text_tokens.iter().any(|tt| tt == *qt))
        .count()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Ranks `rows` against `query` by token overlap over `text_of`,
/// descending by score then by the row's natural (most-recent-first)
/// order in `rows`, truncated to `limit`. Falls back to substring
/// containment when no row scores a token hit.
fn rank<T: Clone>(rows: Vec<T>, query: &str, text_of: impl Fn(&T) -> String, limit: usize) -> Vec<T> {
    let query_tokens = tokenize(query);

    let mut scored: Vec<(usize, usize, T)> = rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let text = text_of(&row);
            (overlap_score(&query_tokens, &text), idx, row)
        })
        .collect();

    if scored.iter().all(|(score, _, _)| *score == 0) {
        return scored
            .into_iter()
            .filter(|(_, _, row)| contains_ci(&text_of(row), query))
            .map(|(_, _, row)| row)
            .take(limit)
            .collect();
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored
        .into_iter()
        .filter(|(score, _, _)| *score > 0)
        .take(limit)
        .map(|(_, _, row)| row)
        .collect()
}

/// Full-text search over decisions: summary, rationale, and
/// implementation_details (spec §4.7).
pub fn search_decisions(rows: Vec<DecisionRow>, query: &str, limit: usize) -> Vec<DecisionRow> {
    rank(
        rows,
        query,
        |d| {
            format!(
                "{} {} {}",
                d.summary,
                d.rationale.clone().unwrap_or_default(),
                d.implementation_details.clone().unwrap_or_default()
            )
        },
        limit,
    )
}

/// Full-text search over custom data: category, key, and the
/// stringified value (spec §4.7).
pub fn search_custom_data(rows: Vec<CustomDataRow>, query: &str, limit: usize) -> Vec<CustomDataRow> {
    rank(
        rows,
        query,
        |c| format!("{} {} {}", c.category, c.key, c.value),
        limit,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RowId, Timestamp};

    fn decision(id: u64, summary: &str, rationale: Option<&str>) -> DecisionRow {
        DecisionRow {
            id: RowId::new(id),
            timestamp: Timestamp::from_millis(id as i64),
            summary: summary.to_string(),
            rationale: rationale.map(str::to_string),
            implementation_details: None,
            tags: vec![],
        }
    }

    #[test]
    fn tokenize_lowercases_and_splits_on_punctuation() {
        assert_eq!(tokenize("Use Postgres, not MySQL!"), vec!["use", "postgres", "not", "mysql"]);
    }

    #[test]
    fn ranks_by_token_overlap_descending() {
        let rows = vec![
            decision(1, "use postgres for storage", None),
            decision(2, "use postgres and redis for caching", None),
            decision(3, "frontend framework choice", None),
        ];
        let ranked = search_decisions(rows, "postgres redis", 10);
        assert_eq!(ranked[0].id, RowId::new(2));
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn falls_back_to_substring_match_on_zero_token_hits() {
        let rows = vec![decision(1, "postgresql-backed storage", None)];
        // "postgres" is not a token of "postgresql-backed" under our
        // tokenizer, but it IS a substring — fallback should find it.
        let ranked = search_decisions(rows, "postgres", 10);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn searches_rationale_too() {
        let rows = vec![decision(1, "unrelated summary", Some("mentions kubernetes here"))];
        let ranked = search_decisions(rows, "kubernetes", 10);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn respects_limit() {
        let rows = (1..=5).map(|i| decision(i, "shared token", None)).collect();
        let ranked = search_decisions(rows, "shared", 2);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn no_match_returns_empty() {
        let rows = vec![decision(1, "alpha beta", None)];
        assert!(search_decisions(rows, "gamma", 10).is_empty());
    }
}
