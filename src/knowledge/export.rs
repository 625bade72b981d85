//! Corpus-wide knowledge graph export.
//!
//! Nodes are keywords assigned to more than [`NODE_MIN_COUNT`] pages, edges
//! are concept pairs whose weight summed over all documents exceeds
//! [`EDGE_MIN_WEIGHT`]. Output size is capped regardless of corpus size.

use std::path::Path;

use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::knowledge::error::{KnowledgeError, KnowledgeResult};
use crate::knowledge::records::to_count;
use crate::knowledge::store::KnowledgeStore;

pub const NODE_MIN_COUNT: i64 = 2;
pub const EDGE_MIN_WEIGHT: i64 = 1;
pub const MAX_NODES: usize = 100;
pub const MAX_EDGES: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub frequency: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// RFC 3339 timestamp of the export.
    pub generated: String,
    pub node_count: usize,
    pub edge_count: usize,
}

/// The exported graph document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub metadata: GraphMetadata,
}

/// Build the graph document in memory.
///
/// A pair stored as `(a, b)` by one document and `(b, a)` by another counts
/// as one edge; its source is the lexically smaller concept.
pub fn knowledge_graph(store: &KnowledgeStore) -> KnowledgeResult<KnowledgeGraph> {
    let (nodes, edges) = store.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT keyword, COUNT(*) AS occurrences FROM keywords \
             GROUP BY keyword HAVING COUNT(*) > ?1 \
             ORDER BY occurrences DESC, MIN(id) ASC LIMIT ?2",
        )?;
        let nodes = stmt
            .query_map(params![NODE_MIN_COUNT, MAX_NODES as i64], |row| {
                Ok(GraphNode {
                    id: row.get(0)?,
                    frequency: to_count(row.get(1)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT source, target, SUM(co_occurrence_count) AS weight FROM ( \
                 SELECT min(concept, related_concept) AS source, \
                        max(concept, related_concept) AS target, \
                        co_occurrence_count, id \
                 FROM concept_network \
             ) \
             GROUP BY source, target HAVING SUM(co_occurrence_count) > ?1 \
             ORDER BY weight DESC, MIN(id) ASC LIMIT ?2",
        )?;
        let edges = stmt
            .query_map(params![EDGE_MIN_WEIGHT, MAX_EDGES as i64], |row| {
                Ok(GraphEdge {
                    source: row.get(0)?,
                    target: row.get(1)?,
                    weight: to_count(row.get(2)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((nodes, edges))
    })?;

    let metadata = GraphMetadata {
        generated: chrono::Utc::now().to_rfc3339(),
        node_count: nodes.len(),
        edge_count: edges.len(),
    };
    Ok(KnowledgeGraph {
        nodes,
        edges,
        metadata,
    })
}

/// Write the knowledge graph to `path` as pretty-printed JSON.
///
/// Parent directories are created as needed. Returns the graph written.
pub fn export_knowledge_graph(store: &KnowledgeStore, path: &Path) -> KnowledgeResult<KnowledgeGraph> {
    let graph = knowledge_graph(store)?;
    let json = serde_json::to_string_pretty(&graph).map_err(|e| KnowledgeError::Serialization {
        message: e.to_string(),
    })?;

    let export_err = |source| KnowledgeError::Export {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(export_err)?;
    }
    std::fs::write(path, json).map_err(export_err)?;

    tracing::info!(
        path = %path.display(),
        nodes = graph.metadata.node_count,
        edges = graph.metadata.edge_count,
        "exported knowledge graph"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn edge(store: &KnowledgeStore, cite_key: &str, a: &str, b: &str) {
        store
            .write(cite_key, |tx| {
                tx.execute(
                    "INSERT OR IGNORE INTO documents (cite_key) VALUES (?1)",
                    params![cite_key],
                )?;
                tx.execute(
                    "INSERT INTO concept_network (concept, related_concept, cite_key) \
                     VALUES (?1, ?2, ?3)",
                    params![a, b, cite_key],
                )?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn node_frequency_counts_tagged_pages_not_text_hits() {
        use crate::knowledge::ingest::{IngestConfig, ingest_extraction};
        use crate::model::{DocumentMetadata, ExtractionResult, PageContent};

        let dir = TempDir::new().unwrap();
        let store = KnowledgeStore::open(dir.path().join("index.db")).unwrap();

        // "ammonia" is one row with a high in-page count; "zeolite" is three
        // rows whose pages never mention it.
        let mut first = PageContent::new(1, "ammonia ammonia ammonia");
        first.processed_text = first.raw_text.clone();
        first.keywords = vec!["ammonia".into(), "zeolite".into()];
        let mut second = PageContent::new(2, "pore structure");
        second.keywords = vec!["zeolite".into()];
        let mut third = PageContent::new(3, "framework topology");
        third.keywords = vec!["zeolite".into()];
        let result = ExtractionResult {
            metadata: DocumentMetadata::new("d"),
            pages: vec![first, second, third],
            ..Default::default()
        };
        ingest_extraction(&store, &result, "d.pdf", &IngestConfig::default()).unwrap();
        let ammonia_in_page: i64 = store
            .read(|conn| {
                conn.query_row(
                    "SELECT frequency FROM keywords WHERE keyword = 'ammonia'",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(ammonia_in_page, 3);

        let graph = knowledge_graph(&store).unwrap();
        assert_eq!(
            graph.nodes,
            vec![GraphNode {
                id: "zeolite".into(),
                frequency: 3,
            }]
        );
    }

    #[test]
    fn empty_index_exports_empty_graph() {
        let dir = TempDir::new().unwrap();
        let store = KnowledgeStore::open(dir.path().join("index.db")).unwrap();

        let graph = knowledge_graph(&store).unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert_eq!(graph.metadata.node_count, 0);
        assert!(chrono::DateTime::parse_from_rfc3339(&graph.metadata.generated).is_ok());
    }

    #[test]
    fn reversed_pairs_sum_into_one_edge() {
        let dir = TempDir::new().unwrap();
        let store = KnowledgeStore::open(dir.path().join("index.db")).unwrap();
        edge(&store, "a", "catalysis", "ammonia");
        edge(&store, "b", "ammonia", "catalysis");
        edge(&store, "c", "zeolite", "pore");

        let graph = knowledge_graph(&store).unwrap();
        assert_eq!(
            graph.edges,
            vec![GraphEdge {
                source: "ammonia".into(),
                target: "catalysis".into(),
                weight: 2
            }]
        );
    }

    #[test]
    fn export_writes_json_file() {
        let dir = TempDir::new().unwrap();
        let store = KnowledgeStore::open(dir.path().join("index.db")).unwrap();
        edge(&store, "a", "x", "y");
        edge(&store, "b", "x", "y");

        let out = dir.path().join("graphs/knowledge_graph.json");
        let graph = export_knowledge_graph(&store, &out).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["metadata"]["edge_count"], 1);
        assert_eq!(written["edges"][0]["source"], "x");
        assert_eq!(written["edges"][0]["weight"], 2);
        assert!(written["nodes"].as_array().unwrap().is_empty());
        assert_eq!(graph.metadata.edge_count, 1);
    }
}
