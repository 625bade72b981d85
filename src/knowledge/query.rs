//! Read-only queries over the whole corpus.
//!
//! Substring matching is case-insensitive and literal: `%` and `_` in a
//! query match themselves. Every "top N" list is ordered by its count
//! descending, with ties in the order the rows were first indexed.
//! An empty index yields empty results, never an error.

use std::collections::HashMap;

use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::knowledge::error::KnowledgeResult;
use crate::knowledge::records::{count_rows, decode_list, to_count};
use crate::knowledge::store::KnowledgeStore;

/// Default cap for [`search_keywords`].
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
/// Default cap for [`get_related_concepts`].
pub const DEFAULT_RELATED_LIMIT: usize = 10;
/// Length of the keyword and author leaderboards in [`DocumentStats`].
pub const STATS_TOP_N: usize = 10;

/// One keyword occurrence matching a search, with its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub cite_key: String,
    pub title: String,
    pub authors: Vec<String>,
    pub keyword: String,
    pub context: String,
    pub page_num: u32,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    /// Number of occurrence rows, i.e. pages the keyword was assigned to.
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorCount {
    pub author: String,
    pub papers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: String,
    pub documents: u64,
}

/// Corpus-wide summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub document_count: u64,
    pub page_count: u64,
    pub unique_keywords: u64,
    pub total_keyword_instances: u64,
    pub top_keywords: Vec<KeywordCount>,
    pub top_authors: Vec<AuthorCount>,
    /// Documents per year, latest year first. Documents without a year are
    /// left out.
    pub year_distribution: Vec<YearCount>,
}

/// A concept related to the queried one, with its summed edge weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedConcept {
    pub concept: String,
    pub weight: u64,
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Keyword occurrences whose keyword contains `query`, most frequent first.
pub fn search_keywords(
    store: &KnowledgeStore,
    query: &str,
    limit: usize,
) -> KnowledgeResult<Vec<SearchHit>> {
    let needle = query.trim().to_lowercase();
    let rows = store.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT k.cite_key, d.title, d.authors, k.keyword, k.context, k.page_num, k.frequency \
             FROM keywords k JOIN documents d ON d.cite_key = k.cite_key \
             WHERE instr(k.keyword, ?1) > 0 \
             ORDER BY k.frequency DESC, k.id ASC \
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![needle, sql_limit(limit)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u32>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })?;

    rows.into_iter()
        .map(
            |(cite_key, title, authors, keyword, context, page_num, frequency)| {
                let authors = decode_list(&cite_key, "authors", &authors)?;
                Ok(SearchHit {
                    cite_key,
                    title,
                    authors,
                    keyword,
                    context,
                    page_num,
                    frequency,
                })
            },
        )
        .collect()
}

/// Aggregate statistics over the whole index.
pub fn get_document_stats(store: &KnowledgeStore) -> KnowledgeResult<DocumentStats> {
    let (counts, unique_keywords, top_keywords, author_lists, year_distribution) =
        store.read(|conn| {
            let counts = count_rows(conn)?;

            let unique: i64 =
                conn.query_row("SELECT COUNT(DISTINCT keyword) FROM keywords", [], |row| {
                    row.get(0)
                })?;

            let mut stmt = conn.prepare(
                "SELECT keyword, COUNT(*) FROM keywords \
                 GROUP BY keyword ORDER BY COUNT(*) DESC, MIN(id) ASC LIMIT ?1",
            )?;
            let top_keywords = stmt
                .query_map(params![sql_limit(STATS_TOP_N)], |row| {
                    Ok(KeywordCount {
                        keyword: row.get(0)?,
                        count: to_count(row.get(1)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare("SELECT cite_key, authors FROM documents ORDER BY rowid")?;
            let author_lists = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(
                "SELECT year, COUNT(*) FROM documents WHERE year != '' \
                 GROUP BY year ORDER BY year DESC",
            )?;
            let years = stmt
                .query_map([], |row| {
                    Ok(YearCount {
                        year: row.get(0)?,
                        documents: to_count(row.get(1)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok((counts, unique, top_keywords, author_lists, years))
        })?;

    let mut authors = Vec::new();
    for (cite_key, raw) in &author_lists {
        authors.extend(decode_list(cite_key, "authors", raw)?);
    }

    Ok(DocumentStats {
        document_count: counts.documents,
        page_count: counts.pages,
        unique_keywords: to_count(unique_keywords),
        total_keyword_instances: counts.keywords,
        top_keywords,
        top_authors: rank_authors(authors, STATS_TOP_N),
        year_distribution,
    })
}

/// Count author names, most frequent first, ties in first-seen order.
fn rank_authors(authors: impl IntoIterator<Item = String>, top: usize) -> Vec<AuthorCount> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<AuthorCount> = Vec::new();
    for author in authors {
        match index.get(&author) {
            Some(&i) => counts[i].papers += 1,
            None => {
                index.insert(author.clone(), counts.len());
                counts.push(AuthorCount { author, papers: 1 });
            }
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.papers.cmp(&a.papers));
    counts.truncate(top);
    counts
}

/// Concepts that co-occur with any concept containing `concept`.
///
/// Edges are matched on either side, so the lookup is symmetric even though
/// each edge is stored once with its higher-ranked keyword first. Weights
/// are summed across documents.
pub fn get_related_concepts(
    store: &KnowledgeStore,
    concept: &str,
    limit: usize,
) -> KnowledgeResult<Vec<RelatedConcept>> {
    let needle = concept.trim().to_lowercase();
    store.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT other, SUM(weight) AS total FROM ( \
                 SELECT related_concept AS other, co_occurrence_count AS weight, id \
                 FROM concept_network WHERE instr(concept, ?1) > 0 \
                 UNION ALL \
                 SELECT concept AS other, co_occurrence_count AS weight, id \
                 FROM concept_network WHERE instr(related_concept, ?1) > 0 \
             ) \
             GROUP BY other ORDER BY total DESC, MIN(id) ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![needle, sql_limit(limit)], |row| {
                Ok(RelatedConcept {
                    concept: row.get(0)?,
                    weight: to_count(row.get(1)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
}
