//! scixtract CLI: PDF extraction and knowledge index for academic papers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use scixtract::config::AppConfig;
use scixtract::extract::setup::recommended;
use scixtract::extract::{
    self, Bibliography, LlmError, ModelCheck, OllamaClient, PaperProcessor, RECOMMENDED_MODELS,
    TextGenerator, check_model,
};
use scixtract::knowledge::{self, KnowledgeStore};
use scixtract::model::ExtractionResult;
use scixtract::paths::ScixPaths;

#[derive(Parser)]
#[command(
    name = "scixtract",
    version,
    about = "Extract academic PDFs with a local LLM and search the results"
)]
struct Cli {
    /// Config file (default: ./scixtract.toml, then the XDG config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge index database file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print query results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a PDF with the LLM and save the results.
    Extract {
        /// PDF file to process.
        pdf: PathBuf,

        /// Directory for the result files.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// BibTeX file with metadata for the paper.
        #[arg(long)]
        bib: Option<PathBuf>,

        /// Ollama model to use instead of the configured one.
        #[arg(long)]
        model: Option<String>,

        /// Do not add the result to the knowledge index.
        #[arg(long)]
        no_index: bool,
    },

    /// Check the Ollama server, pull the model and test it.
    Setup {
        /// Model to prepare instead of the configured one.
        #[arg(long)]
        model: Option<String>,

        /// Only report server and model status; pull nothing.
        #[arg(long)]
        check_only: bool,

        /// Print the recommended models and exit.
        #[arg(long)]
        list_models: bool,
    },

    /// Add saved extraction results to the knowledge index.
    Ingest {
        /// `*_ai_extraction.json` files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Source path recorded for the document (single file only).
        #[arg(long)]
        source: Option<String>,
    },

    /// Query and maintain the knowledge index.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Show or create the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// Search keyword occurrences.
    Search {
        query: String,
        /// Maximum number of hits.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Corpus statistics.
    Stats,
    /// Concepts co-occurring with a concept.
    Related {
        concept: String,
        /// Maximum number of concepts.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Write the concept graph as JSON.
    ExportGraph {
        /// Output file.
        output: PathBuf,
    },
    /// List indexed documents.
    List,
    /// Show one indexed document.
    Show { cite_key: String },
    /// Remove a document and everything derived from it.
    Remove { cite_key: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write an example config file.
    Init {
        /// Destination (default: the XDG config file).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Without a home directory only explicit paths work.
    let paths = ScixPaths::resolve().ok();
    let (config, config_source) = AppConfig::load(cli.config.as_deref(), paths.as_ref())?;
    let db_path = config.resolve_db_path(cli.db.as_deref(), paths.as_ref());

    match cli.command {
        Commands::Extract {
            pdf,
            output_dir,
            bib,
            model,
            no_index,
        } => {
            let mut ollama = config.ollama_config();
            if let Some(model) = model {
                ollama.model = model;
            }
            let mut client = OllamaClient::new(ollama);
            client.ensure_ready()?;

            let mut processor = PaperProcessor::new(client);
            if let Some(bib) = bib {
                processor = processor.with_bibliography(Bibliography::load(&bib)?);
            }

            let result = processor.process_pdf(&pdf)?;
            let output_dir = output_dir.unwrap_or_else(|| config.extraction.output_dir.clone());
            let saved = extract::save_results(&result, &output_dir, &pdf, config.report_options())?;

            println!(
                "Extracted {} with {} ({} pages, {} keywords) in {:.1}s",
                result.metadata.cite_key,
                processor.generator().model(),
                result.pages.len(),
                result.all_keywords.len(),
                result.metadata.processing_time
            );
            println!("  extraction: {}", saved.extraction.display());
            if let Some(md) = &saved.markdown {
                println!("  markdown:   {}", md.display());
            }
            if let Some(kw) = &saved.keywords {
                println!("  keywords:   {}", kw.display());
            }

            if config.extraction.update_knowledge && !no_index {
                let store = KnowledgeStore::open(&db_path)?;
                let summary = knowledge::ingest_extraction(
                    &store,
                    &result,
                    &pdf.display().to_string(),
                    &config.ingest_config(),
                )?;
                println!(
                    "Indexed {} into {} ({} keyword rows, {} edges)",
                    summary.cite_key,
                    db_path.display(),
                    summary.keyword_rows,
                    summary.edges
                );
            }
        }

        Commands::Setup {
            model,
            check_only,
            list_models,
        } => {
            if list_models {
                print_recommended_models();
            } else {
                let mut client = OllamaClient::new(config.ollama_config());
                if let Some(model) = model {
                    client.set_model(model);
                }
                run_setup(&mut client, check_only)?;
            }
        }

        Commands::Ingest { files, source } => {
            if source.is_some() && files.len() > 1 {
                miette::bail!("--source can only be used with a single file");
            }
            let store = KnowledgeStore::open(&db_path)?;
            let ingest_config = config.ingest_config();
            for file in &files {
                let result = ExtractionResult::from_file(file)?;
                let source = source.clone().unwrap_or_else(|| file.display().to_string());
                let summary = knowledge::ingest_extraction(&store, &result, &source, &ingest_config)?;
                println!(
                    "Indexed {}: {} pages, {} keyword rows, {} edges",
                    summary.cite_key, summary.pages, summary.keyword_rows, summary.edges
                );
            }
        }

        Commands::Knowledge { action } => {
            let store = KnowledgeStore::open(&db_path)?;
            run_knowledge(&store, &config, action, cli.json)?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                match &config_source {
                    Some(path) => println!("# loaded from {}", path.display()),
                    None => println!("# defaults (no config file found)"),
                }
                println!("# knowledge index: {}", db_path.display());
                print!("{}", config.to_toml_string()?);
            }
            ConfigAction::Init { output } => {
                let output = match (output, &paths) {
                    (Some(path), _) => path,
                    (None, Some(paths)) => paths.config_file(),
                    (None, None) => miette::bail!("no home directory; pass --output"),
                };
                AppConfig::write_example(&output)?;
                println!("Wrote example config to {}", output.display());
            }
        },
    }

    Ok(())
}

fn run_knowledge(
    store: &KnowledgeStore,
    config: &AppConfig,
    action: KnowledgeAction,
    json: bool,
) -> Result<()> {
    match action {
        KnowledgeAction::Search { query, limit } => {
            let limit = limit.unwrap_or(config.knowledge.max_search_results);
            let hits = knowledge::search_keywords(store, &query, limit)?;
            if json {
                return print_json(&hits);
            }
            if hits.is_empty() {
                println!("No matches for \"{query}\".");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "  {}. {} p.{} [{}] x{}",
                    i + 1,
                    hit.cite_key,
                    hit.page_num,
                    hit.keyword,
                    hit.frequency
                );
                if !hit.title.is_empty() {
                    println!("     {}", hit.title);
                }
                println!("     {}", hit.context);
            }
        }

        KnowledgeAction::Stats => {
            let stats = knowledge::get_document_stats(store)?;
            if json {
                return print_json(&stats);
            }
            println!("Documents:         {}", stats.document_count);
            println!("Pages:             {}", stats.page_count);
            println!("Unique keywords:   {}", stats.unique_keywords);
            println!("Keyword instances: {}", stats.total_keyword_instances);
            if !stats.top_keywords.is_empty() {
                println!("\nTop keywords:");
                for k in &stats.top_keywords {
                    println!("  {:<40} {}", k.keyword, k.count);
                }
            }
            if !stats.top_authors.is_empty() {
                println!("\nTop authors:");
                for a in &stats.top_authors {
                    println!("  {:<40} {}", a.author, a.papers);
                }
            }
            if !stats.year_distribution.is_empty() {
                println!("\nDocuments by year:");
                for y in &stats.year_distribution {
                    println!("  {}  {}", y.year, y.documents);
                }
            }
        }

        KnowledgeAction::Related { concept, limit } => {
            let limit = limit.unwrap_or(config.knowledge.max_related);
            let related = knowledge::get_related_concepts(store, &concept, limit)?;
            if json {
                return print_json(&related);
            }
            if related.is_empty() {
                println!("No concepts related to \"{concept}\".");
            }
            for r in &related {
                println!("  {:<40} {}", r.concept, r.weight);
            }
        }

        KnowledgeAction::ExportGraph { output } => {
            let graph = knowledge::export_knowledge_graph(store, &output)?;
            println!(
                "Exported {} nodes and {} edges to {}",
                graph.metadata.node_count,
                graph.metadata.edge_count,
                output.display()
            );
        }

        KnowledgeAction::List => {
            let docs = knowledge::list_documents(store)?;
            if json {
                return print_json(&docs);
            }
            if docs.is_empty() {
                println!("No documents indexed in {}.", store.path().display());
            } else {
                println!("Documents ({}):", docs.len());
                for doc in &docs {
                    let year = if doc.year.is_empty() { "----" } else { &doc.year };
                    println!("  {} [{}] {}", doc.cite_key, year, doc.title);
                }
            }
        }

        KnowledgeAction::Show { cite_key } => {
            let Some(doc) = knowledge::get_document(store, &cite_key)? else {
                miette::bail!("no document \"{cite_key}\" in {}", store.path().display());
            };
            let pages = knowledge::document_pages(store, &cite_key)?;
            if json {
                return print_json(&serde_json::json!({ "document": doc, "pages": pages }));
            }
            println!("Document: \"{}\"", doc.cite_key);
            println!("  title:      {}", doc.title);
            println!("  authors:    {}", doc.authors.join("; "));
            println!("  year:       {}", doc.year);
            println!("  pages:      {}", doc.page_count);
            println!("  source:     {}", doc.file_path);
            println!("  extracted:  {}", doc.extraction_date);
            println!("  keywords:   {}", doc.keywords.join(", "));
            println!("  concepts:   {}", doc.key_concepts.join(", "));
            for page in &pages {
                println!(
                    "    p.{:<4} {:<12} {:>5} words  {}",
                    page.page_num,
                    page.content_type.as_str(),
                    page.word_count,
                    page.keywords.join(", ")
                );
            }
        }

        KnowledgeAction::Remove { cite_key } => {
            if knowledge::remove_document(store, &cite_key)? {
                println!("Removed {cite_key}");
            } else {
                miette::bail!("no document \"{cite_key}\" in {}", store.path().display());
            }
        }
    }
    Ok(())
}

fn print_recommended_models() {
    println!("Recommended models (* = preferred):");
    for m in RECOMMENDED_MODELS {
        let mark = if m.recommended { '*' } else { ' ' };
        println!("  {mark} {:<30} {:>6}  {}", m.name, m.size, m.description);
    }
}

fn run_setup(client: &mut OllamaClient, check_only: bool) -> Result<()> {
    let base_url = client.config().base_url.clone();
    if !client.probe() {
        return Err(LlmError::Unavailable { url: base_url }.into());
    }
    println!("Ollama is running at {base_url}");

    let installed = client.installed_models();
    if installed.is_empty() {
        println!("No models installed.");
    } else {
        println!("Installed models:");
        for name in installed {
            let note = match recommended(name) {
                Some(m) if m.recommended => " (recommended)",
                _ => "",
            };
            println!("  {name}{note}");
        }
    }

    let model = client.model().to_string();
    if check_only {
        if client.has_model() {
            println!("Model {model} is installed.");
        } else {
            println!("Model {model} is not installed; run `scixtract setup --model {model}` to pull it.");
        }
        return Ok(());
    }

    if !client.has_model() {
        println!("Pulling {model}, this may take a few minutes...");
    }
    client.ensure_model()?;

    println!("Testing {model}...");
    match check_model(&*client)? {
        ModelCheck::Keywords(keywords) => {
            println!("Model works. Keywords: {}", keywords.join(", "));
        }
        ModelCheck::Unstructured => {
            println!("Model works, but did not answer with JSON keywords.");
        }
    }
    println!("Setup complete. Extract a paper with: scixtract extract paper.pdf --model {model}");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

