//! Integration tests for the knowledge index.
//!
//! These exercise ingestion, the concept network and the query layer
//! together through the public API.

use scixtract::knowledge::{
    self, IndexCounts, IngestConfig, KnowledgeError, KnowledgeStore, export::MAX_NODES,
};
use scixtract::model::{DocumentMetadata, ExtractionResult, PageContent};

fn temp_store() -> (tempfile::TempDir, KnowledgeStore) {
    let dir = tempfile::TempDir::new().unwrap();
    let store = KnowledgeStore::open(dir.path().join("knowledge_index.db")).unwrap();
    (dir, store)
}

fn page(page_num: u32, text: &str, keywords: &[&str]) -> PageContent {
    PageContent {
        processed_text: text.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        ..PageContent::new(page_num, text)
    }
}

fn document(cite_key: &str, pages: Vec<PageContent>) -> ExtractionResult {
    ExtractionResult {
        metadata: DocumentMetadata {
            title: format!("Title of {cite_key}"),
            authors: vec!["Smith, J.".into(), "Doe, A.".into()],
            year: "2024".into(),
            page_count: u32::try_from(pages.len()).unwrap(),
            ..DocumentMetadata::new(cite_key)
        },
        pages,
        key_concepts: vec!["ammonia synthesis".into()],
        ..Default::default()
    }
}

fn smith2024() -> ExtractionResult {
    document(
        "smith2024",
        vec![
            page(
                1,
                "This paper discusses catalysis and ammonia synthesis.",
                &["catalysis", "ammonia"],
            ),
            page(2, "Synthesis conditions are reported here.", &["synthesis"]),
        ],
    )
}

fn ingest(store: &KnowledgeStore, result: &ExtractionResult) {
    knowledge::ingest_extraction(store, result, "papers/test.pdf", &IngestConfig::default())
        .unwrap();
}

#[test]
fn end_to_end_single_document() {
    let (_dir, store) = temp_store();
    ingest(&store, &smith2024());

    let counts = knowledge::index_counts(&store).unwrap();
    assert_eq!(counts.documents, 1);
    assert_eq!(counts.pages, 2);
    assert_eq!(counts.keywords, 3);
    assert!(counts.edges >= 1);

    let edges = knowledge::document_edges(&store, "smith2024").unwrap();
    let vocab = ["catalysis", "ammonia", "synthesis"];
    assert!(edges.iter().any(|e| {
        vocab.contains(&e.concept.as_str()) && vocab.contains(&e.related_concept.as_str())
    }));

    let hits = knowledge::search_keywords(&store, "catalysis", 20).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].cite_key, "smith2024");
    assert_eq!(hits[0].title, "Title of smith2024");
    assert_eq!(hits[0].page_num, 1);
    assert_eq!(hits[0].frequency, 1);
    assert!(hits[0].context.contains("catalysis"));
}

#[test]
fn reingest_is_idempotent() {
    let (_dir, store) = temp_store();
    let result = smith2024();

    ingest(&store, &result);
    let counts = knowledge::index_counts(&store).unwrap();
    let keywords = knowledge::document_keywords(&store, "smith2024").unwrap();
    let edges = knowledge::document_edges(&store, "smith2024").unwrap();
    let doc = knowledge::get_document(&store, "smith2024").unwrap();

    ingest(&store, &result);
    assert_eq!(knowledge::index_counts(&store).unwrap(), counts);
    assert_eq!(knowledge::document_keywords(&store, "smith2024").unwrap(), keywords);
    assert_eq!(knowledge::document_edges(&store, "smith2024").unwrap(), edges);
    assert_eq!(knowledge::get_document(&store, "smith2024").unwrap(), doc);
}

#[test]
fn reingest_with_fewer_pages_leaves_no_orphans() {
    let (_dir, store) = temp_store();
    ingest(&store, &smith2024());

    let shorter = document(
        "smith2024",
        vec![page(1, "Only nitrogen fixation remains.", &["nitrogen"])],
    );
    ingest(&store, &shorter);

    let counts = knowledge::index_counts(&store).unwrap();
    assert_eq!(counts.documents, 1);
    assert_eq!(counts.pages, 1);
    assert_eq!(counts.keywords, 1);
    // A single keyword has no pairs.
    assert_eq!(counts.edges, 0);

    assert!(knowledge::search_keywords(&store, "catalysis", 20).unwrap().is_empty());
    assert!(knowledge::get_related_concepts(&store, "ammonia", 10).unwrap().is_empty());
    let pages = knowledge::document_pages(&store, "smith2024").unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].keywords, vec!["nitrogen"]);
}

#[test]
fn other_documents_survive_reingest() {
    let (_dir, store) = temp_store();
    ingest(&store, &smith2024());
    ingest(
        &store,
        &document("lee2019", vec![page(1, "catalysis of nitrogen", &["catalysis", "nitrogen"])]),
    );
    ingest(&store, &document("smith2024", vec![]));

    let hits = knowledge::search_keywords(&store, "catalysis", 20).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].cite_key, "lee2019");
    assert_eq!(knowledge::document_edges(&store, "lee2019").unwrap().len(), 1);
}

#[test]
fn search_is_case_insensitive() {
    let (_dir, store) = temp_store();
    ingest(
        &store,
        &document("smith2024", vec![page(1, "Catalysis matters.", &["Catalysis"])]),
    );

    for query in ["catalysis", "CATALYSIS", "Catal", "lysis"] {
        let hits = knowledge::search_keywords(&store, query, 20).unwrap();
        assert_eq!(hits.len(), 1, "query {query:?}");
        assert_eq!(hits[0].keyword, "catalysis");
    }
    assert!(knowledge::search_keywords(&store, "zeolite", 20).unwrap().is_empty());
}

#[test]
fn search_orders_by_frequency_then_insertion() {
    let (_dir, store) = temp_store();
    ingest(
        &store,
        &document(
            "a2020",
            vec![
                page(1, "ammonia once", &["ammonia"]),
                page(2, "ammonia ammonia ammonia", &["ammonia"]),
                page(3, "ammonia here too", &["ammonia"]),
            ],
        ),
    );

    let hits = knowledge::search_keywords(&store, "ammonia", 20).unwrap();
    let order: Vec<(u32, u32)> = hits.iter().map(|h| (h.page_num, h.frequency)).collect();
    assert_eq!(order, vec![(2, 3), (1, 1), (3, 1)]);

    let capped = knowledge::search_keywords(&store, "ammonia", 2).unwrap();
    assert_eq!(capped.len(), 2);
    assert_eq!(capped[1].page_num, 1);
}

#[test]
fn related_concepts_are_symmetric() {
    let (_dir, store) = temp_store();
    ingest(&store, &smith2024());

    // "catalysis" ranks first, so it is stored on the concept side.
    let from_top = knowledge::get_related_concepts(&store, "catalysis", 10).unwrap();
    assert!(from_top.iter().any(|r| r.concept == "ammonia" && r.weight >= 1));

    // "synthesis" ranks last and only appears as the related side.
    let from_bottom = knowledge::get_related_concepts(&store, "SYNTHESIS", 10).unwrap();
    let names: Vec<&str> = from_bottom.iter().map(|r| r.concept.as_str()).collect();
    assert_eq!(names, vec!["catalysis", "ammonia"]);
}

#[test]
fn related_weights_sum_across_documents() {
    let (_dir, store) = temp_store();
    ingest(&store, &smith2024());
    ingest(
        &store,
        &document("lee2019", vec![page(1, "ammonia and catalysis", &["ammonia", "catalysis"])]),
    );

    let related = knowledge::get_related_concepts(&store, "ammonia", 10).unwrap();
    assert_eq!(related[0].concept, "catalysis");
    assert_eq!(related[0].weight, 2);
    assert!(related.iter().any(|r| r.concept == "synthesis" && r.weight == 1));
}

#[test]
fn empty_store_stats_are_zero() {
    let (_dir, store) = temp_store();
    let stats = knowledge::get_document_stats(&store).unwrap();
    assert_eq!(stats, knowledge::DocumentStats::default());
    assert!(knowledge::search_keywords(&store, "", 20).unwrap().is_empty());
    assert!(knowledge::get_related_concepts(&store, "x", 10).unwrap().is_empty());
    assert!(knowledge::list_documents(&store).unwrap().is_empty());
}

#[test]
fn stats_aggregate_the_corpus() {
    let (_dir, store) = temp_store();
    ingest(&store, &smith2024());
    let mut lee = document("lee2019", vec![page(1, "catalysis review", &["catalysis"])]);
    lee.metadata.year = "2019".into();
    lee.metadata.authors = vec!["Lee, K.".into(), "Smith, J.".into()];
    ingest(&store, &lee);

    let stats = knowledge::get_document_stats(&store).unwrap();
    assert_eq!(stats.document_count, 2);
    assert_eq!(stats.page_count, 3);
    assert_eq!(stats.unique_keywords, 3);
    assert_eq!(stats.total_keyword_instances, 4);
    assert_eq!(stats.top_keywords[0].keyword, "catalysis");
    assert_eq!(stats.top_keywords[0].count, 2);
    assert_eq!(stats.top_authors[0].author, "Smith, J.");
    assert_eq!(stats.top_authors[0].papers, 2);
    let years: Vec<&str> = stats.year_distribution.iter().map(|y| y.year.as_str()).collect();
    assert_eq!(years, vec!["2024", "2019"]);
}

#[test]
fn export_caps_nodes_at_one_hundred() {
    let (dir, store) = temp_store();
    let vocab: Vec<String> = (0..150).map(|i| format!("kw{i:03}")).collect();
    let refs: Vec<&str> = vocab.iter().map(String::as_str).collect();
    let pages = (1..=3).map(|n| page(n, "", &refs)).collect();
    ingest(&store, &document("big2024", pages));

    let out = dir.path().join("graphs/knowledge_graph.json");
    let graph = knowledge::export_knowledge_graph(&store, &out).unwrap();

    assert_eq!(graph.nodes.len(), MAX_NODES);
    assert_eq!(graph.metadata.node_count, 100);
    assert!(graph.nodes.iter().all(|n| n.frequency == 3));
    // Equal counts fall back to insertion order.
    assert_eq!(graph.nodes[0].id, "kw000");
    assert_eq!(graph.nodes[99].id, "kw099");
    // One document gives every pair weight 1, below the edge threshold.
    assert!(graph.edges.is_empty());

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["nodes"].as_array().unwrap().len(), 100);
    assert_eq!(written["metadata"]["node_count"], 100);
}

#[test]
fn export_merges_reversed_pairs() {
    let (dir, store) = temp_store();
    // Rank order decides the stored direction: (alpha, beta) here...
    ingest(
        &store,
        &document(
            "one",
            vec![
                page(1, "", &["alpha", "beta"]),
                page(2, "", &["alpha"]),
                page(3, "", &["alpha"]),
            ],
        ),
    );
    // ...and (beta, alpha) here.
    ingest(
        &store,
        &document(
            "two",
            vec![
                page(1, "", &["beta", "alpha"]),
                page(2, "", &["beta"]),
                page(3, "", &["beta"]),
            ],
        ),
    );

    let graph = knowledge::export_knowledge_graph(&store, &dir.path().join("g.json")).unwrap();
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].source, "alpha");
    assert_eq!(graph.edges[0].target, "beta");
    assert_eq!(graph.edges[0].weight, 2);
    assert_eq!(graph.metadata.edge_count, 1);
}

#[test]
fn invalid_records_write_nothing() {
    let (_dir, store) = temp_store();
    let mut bad = smith2024();
    bad.pages.push(page(1, "duplicate page", &["catalysis"]));

    let err = knowledge::ingest_extraction(&store, &bad, "x.pdf", &IngestConfig::default())
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::InvalidRecord { ref cite_key, .. } if cite_key == "smith2024"));
    assert_eq!(knowledge::index_counts(&store).unwrap(), IndexCounts::default());

    let blank = document("  ", vec![]);
    assert!(matches!(
        knowledge::ingest_extraction(&store, &blank, "x.pdf", &IngestConfig::default()),
        Err(KnowledgeError::InvalidRecord { .. })
    ));
}

#[test]
fn remove_document_deletes_everything() {
    let (_dir, store) = temp_store();
    ingest(&store, &smith2024());

    assert!(knowledge::remove_document(&store, "smith2024").unwrap());
    assert!(!knowledge::remove_document(&store, "smith2024").unwrap());
    assert_eq!(knowledge::index_counts(&store).unwrap(), IndexCounts::default());
    assert!(knowledge::get_document(&store, "smith2024").unwrap().is_none());
}

#[test]
fn saved_results_ingest_from_disk() {
    let (dir, store) = temp_store();
    let path = dir.path().join("smith2024_ai_extraction.json");
    std::fs::write(&path, serde_json::to_string_pretty(&smith2024()).unwrap()).unwrap();

    let result = ExtractionResult::from_file(&path).unwrap();
    let summary = knowledge::ingest_extraction(
        &store,
        &result,
        &path.display().to_string(),
        &IngestConfig { context_window: 20 },
    )
    .unwrap();
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.keyword_rows, 3);
    assert_eq!(summary.edges, 3);

    let doc = knowledge::get_document(&store, "smith2024").unwrap().unwrap();
    assert_eq!(doc.file_path, path.display().to_string());
    assert_eq!(doc.key_concepts, vec!["ammonia synthesis"]);

    let hits = knowledge::search_keywords(&store, "ammonia", 20).unwrap();
    assert!(hits[0].context.starts_with("..."));
    assert!(hits[0].context.ends_with("..."));
}
