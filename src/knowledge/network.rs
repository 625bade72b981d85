//! Per-document concept co-occurrence network.
//!
//! A document's keywords are ranked by how many pages they were assigned to;
//! every unordered pair among the top [`TOP_CONCEPTS`] becomes one edge of
//! weight 1, stored with the higher-ranked keyword first. Aggregation across
//! documents happens only at query time.

use rusqlite::{Connection, params};

use crate::knowledge::error::KnowledgeResult;
use crate::knowledge::store::KnowledgeStore;

/// How many of a document's keywords take part in its network.
pub const TOP_CONCEPTS: usize = 20;

/// Rebuild the edges of one document in its own transaction.
///
/// Returns the number of edges written.
pub fn rebuild_network(store: &KnowledgeStore, cite_key: &str) -> KnowledgeResult<usize> {
    let edges = store.write(cite_key, |tx| rebuild_in(tx, cite_key))?;
    tracing::debug!(cite_key, edges, "concept network rebuilt");
    Ok(edges)
}

/// Replace the edges of `cite_key` using an already open connection or
/// transaction.
pub(crate) fn rebuild_in(conn: &Connection, cite_key: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM concept_network WHERE cite_key = ?1",
        params![cite_key],
    )?;

    let ranked = ranked_keywords(conn, cite_key)?;

    let mut insert = conn.prepare(
        "INSERT INTO concept_network (concept, related_concept, cite_key, co_occurrence_count) \
         VALUES (?1, ?2, ?3, 1)",
    )?;
    let mut edges = 0;
    for (i, concept) in ranked.iter().enumerate() {
        for related in &ranked[i + 1..] {
            insert.execute(params![concept, related, cite_key])?;
            edges += 1;
        }
    }
    debug_assert_eq!(edges, edge_count_for(ranked.len()));
    Ok(edges)
}

/// Distinct keywords of a document, most frequently assigned first.
///
/// Ties keep the order in which the keywords were first written.
fn ranked_keywords(conn: &Connection, cite_key: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT keyword FROM keywords WHERE cite_key = ?1 \
         GROUP BY keyword ORDER BY COUNT(*) DESC, MIN(id) ASC LIMIT ?2",
    )?;
    let limit = i64::try_from(TOP_CONCEPTS).unwrap_or(i64::MAX);
    stmt.query_map(params![cite_key, limit], |row| row.get(0))?
        .collect()
}

/// Number of edges produced by `n` ranked keywords.
pub fn edge_count_for(n: usize) -> usize {
    let n = n.min(TOP_CONCEPTS);
    n * n.saturating_sub(1) / 2
}
