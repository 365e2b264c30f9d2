use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use log::{error, info};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use gemini_rag::config::{QdrantConfig, Settings};
use gemini_rag::database::QdrantStore;
use gemini_rag::document::PdfExtractor;
use gemini_rag::gemini::GeminiClient;
use gemini_rag::memory::InMemoryStore;
use gemini_rag::pacing::FixedIntervalPacer;
use gemini_rag::rag::{write_outcome, RagEngine};
use gemini_rag::store::VectorStore;

/// Retrieval-augmented question answering over PDF documents with Gemini
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Where documents and chunks are kept
    #[arg(long, value_enum, default_value_t = StoreKind::Qdrant)]
    store: StoreKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Qdrant server configured through QDRANT_URL
    Qdrant,
    /// Process memory, lost on exit
    Memory,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, chunk, embed and store PDF files
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List stored documents, newest first
    List,
    /// Delete a document and its chunks
    Delete { document_id: String },
    /// Ask a single question
    Ask {
        question: String,
        /// Answer without searching stored documents
        #[arg(long)]
        no_documents: bool,
    },
    /// Ingest the given files, then answer questions from stdin
    Chat {
        files: Vec<PathBuf>,
        #[arg(long)]
        no_documents: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::from_env().context("Invalid configuration")?;

    let store: Arc<dyn VectorStore> = match args.store {
        StoreKind::Qdrant => {
            let qdrant_config = QdrantConfig::from_env().context("Missing QDRANT_URL")?;
            Arc::new(
                QdrantStore::connect(qdrant_config)
                    .await
                    .context("Failed to initialize Qdrant store")?,
            )
        }
        StoreKind::Memory => Arc::new(InMemoryStore::new()),
    };

    let gemini = Arc::new(
        GeminiClient::new(settings.gemini.clone()).context("Failed to initialize Gemini client")?,
    );
    let pacer = Arc::new(FixedIntervalPacer::new(
        settings.retrieval.pace_every,
        settings.retrieval.pace_delay(),
    ));

    let engine = RagEngine::new(
        settings.retrieval.clone(),
        Arc::new(PdfExtractor::new()),
        gemini.clone(),
        store,
        gemini,
        pacer,
    )
    .context("Failed to initialize RAG engine")?;

    match args.command {
        Command::Ingest { files } => ingest_all(&engine, &files).await?,
        Command::List => {
            let documents = engine.list_documents().await.context("Failed to list documents")?;
            if documents.is_empty() {
                println!("No documents uploaded");
            }
            for document in documents {
                println!(
                    "{}  {}  {:.2} KB  {} chunks  {}",
                    document.id,
                    document.filename,
                    document.size_bytes as f64 / 1024.0,
                    document.total_chunks,
                    document.uploaded_at.to_rfc3339()
                );
            }
        }
        Command::Delete { document_id } => {
            let report = engine
                .delete_document(&document_id)
                .await
                .with_context(|| format!("Failed to delete document {}", document_id))?;
            println!(
                "Deleted {} ({} chunks removed, {} failed)",
                document_id, report.chunks_deleted, report.chunks_failed
            );
        }
        Command::Ask {
            question,
            no_documents,
        } => {
            let outcome = engine
                .query(&question, !no_documents)
                .await
                .context("Failed to answer question")?;
            write_outcome(&mut io::stdout(), &outcome)?;
        }
        Command::Chat {
            files,
            no_documents,
        } => {
            ingest_all(&engine, &files).await?;
            let stdin = io::stdin();
            engine
                .run_query_loop(stdin.lock(), io::stdout(), !no_documents)
                .await
                .context("Error in query loop")?;
        }
    }

    Ok(())
}

async fn ingest_all(engine: &RagEngine, files: &[PathBuf]) -> Result<()> {
    for path in files {
        info!("Processing file: {}", path.display());
        match engine.ingest_file(path).await {
            Ok(report) => println!(
                "{}: stored as {} ({} of {} chunks)",
                report.filename, report.document_id, report.chunks_created, report.chunks_attempted
            ),
            Err(e) => {
                error!("Failed to ingest {}: {}", path.display(), e);
                return Err(e).with_context(|| format!("Failed to process {}", path.display()));
            }
        }
    }
    Ok(())
}
