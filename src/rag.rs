use crate::answer::{Answer, AnswerService};
use crate::chunking::{Chunker, TextChunk};
use crate::config::RetrievalConfig;
use crate::document::{SourceFile, TextExtractor};
use crate::embeddings::EmbeddingClient;
use crate::error::{RagError, Result};
use crate::pacing::Pacer;
use crate::store::{DeletionReport, NewChunk, NewDocument, ScoredChunk, StoredDocument, VectorStore};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::Arc;

/// Stages of a single ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Extracting,
    Chunking,
    Embedding,
    Storing,
}

/// Stages of a single query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    EmbeddingQuery,
    Searching,
    AssemblingContext,
    Answering,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What an ingestion stored
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: String,
    pub filename: String,
    pub chunks_created: usize,
    pub chunks_attempted: usize,
    /// Indices of chunks whose embedding failed
    pub failed_chunks: Vec<usize>,
}

/// Result of one question
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub query: String,
    pub answer: Answer,
    /// Filenames of the documents that contributed context, first-seen order
    pub sources_used: Vec<String>,
    /// Chunks handed to the answer service, best first
    pub excerpts: Vec<ScoredChunk>,
    pub model: String,
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine {
    config: RetrievalConfig,
    chunker: Chunker,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    answerer: Arc<dyn AnswerService>,
    pacer: Arc<dyn Pacer>,
}

impl RagEngine {
    /// Create a new RAG engine, validating the retrieval settings
    pub fn new(
        config: RetrievalConfig,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        answerer: Arc<dyn AnswerService>,
        pacer: Arc<dyn Pacer>,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::from_config(&config)?;

        Ok(RagEngine {
            config,
            chunker,
            extractor,
            embedder,
            store,
            answerer,
            pacer,
        })
    }

    /// Read a PDF from disk and ingest it
    pub async fn ingest_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<IngestReport> {
        let source = SourceFile::from_path(path).await?;
        self.ingest(&source.filename, &source.bytes).await
    }

    /// Extract, chunk, embed and store a document.
    ///
    /// Chunks whose embedding fails are skipped; the document is stored only
    /// if at least one chunk succeeded.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
        debug!("{}: {}", filename, IngestStage::Extracting);
        let text = self.extractor.extract(bytes).await?;
        let chars = text.chars().count();
        if chars < self.config.min_document_chars {
            return Err(RagError::EmptyDocument {
                filename: filename.to_string(),
                chars,
                min: self.config.min_document_chars,
            });
        }

        debug!("{}: {}", filename, IngestStage::Chunking);
        let chunks = self.chunker.chunk(&text);
        info!(
            "Split {} into {} chunks (size {}, overlap {})",
            filename,
            chunks.len(),
            self.chunker.size(),
            self.chunker.overlap()
        );

        debug!("{}: {}", filename, IngestStage::Embedding);
        let attempts = self.embed_chunks(&chunks).await;
        let chunks_attempted = attempts.len();
        let (embedded, failed_chunks) = partition_embeddings(attempts);

        if embedded.is_empty() {
            return Err(RagError::IngestionFailed {
                filename: filename.to_string(),
                attempted: chunks_attempted,
            });
        }

        debug!("{}: {}", filename, IngestStage::Storing);
        let chunks_created = embedded.len();
        let document_id = self
            .store
            .add_document(NewDocument {
                filename: filename.to_string(),
                size_bytes: bytes.len() as u64,
                total_chunks: chunks_created,
            })
            .await?;
        self.store.add_chunks(&document_id, embedded).await?;

        info!(
            "Ingested {} as {}: {} of {} chunks stored",
            filename, document_id, chunks_created, chunks_attempted
        );

        Ok(IngestReport {
            document_id,
            filename: filename.to_string(),
            chunks_created,
            chunks_attempted,
            failed_chunks,
        })
    }

    /// Embed chunks one at a time, keeping every outcome.
    async fn embed_chunks(&self, chunks: &[TextChunk]) -> Vec<(usize, Result<NewChunk>)> {
        let mut attempts = Vec::with_capacity(chunks.len());
        let mut dimensions: Option<usize> = None;

        for (index, chunk) in chunks.iter().enumerate() {
            let outcome = match self.embedder.embed(&chunk.text).await {
                Ok(embedding) => {
                    let expected = *dimensions.get_or_insert(embedding.len());
                    if embedding.len() == expected {
                        Ok(NewChunk {
                            index,
                            content: chunk.text.clone(),
                            embedding,
                        })
                    } else {
                        Err(RagError::Embedding(format!(
                            "expected {} dimensions, got {}",
                            expected,
                            embedding.len()
                        )))
                    }
                }
                Err(e) => Err(e),
            };

            if let Err(e) = &outcome {
                warn!("Skipping chunk {}: {}", index, e);
            }
            attempts.push((index, outcome));
            self.pacer.after_request(index + 1).await;
        }

        attempts
    }

    pub async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        self.store.list_documents().await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<DeletionReport> {
        self.store.delete_document(document_id).await
    }

    /// Answer a question, using stored documents as context when `use_documents` is set.
    ///
    /// A failing query embedding only drops the document context; the answer
    /// service is still called.
    pub async fn query(&self, query: &str, use_documents: bool) -> Result<QueryOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let mut excerpts = Vec::new();
        let mut documents = Vec::new();
        if use_documents {
            documents = self.store.list_documents().await?;
        }

        if !documents.is_empty() {
            debug!("{}", QueryStage::EmbeddingQuery);
            match self.embedder.embed(query).await {
                Ok(query_vector) => {
                    debug!("{}", QueryStage::Searching);
                    excerpts = self
                        .store
                        .search(&query_vector, self.config.top_k, self.config.min_similarity)
                        .await?;
                }
                Err(e) => warn!("Query embedding failed, answering without documents: {}", e),
            }
        }

        debug!("{}", QueryStage::AssemblingContext);
        let context = assemble_context(&excerpts);
        let sources_used = source_filenames(&excerpts, &documents);

        debug!("{}", QueryStage::Answering);
        let answer = self.answerer.answer(query, context.as_deref()).await?;
        info!(
            "Answered query with {} excerpts from {} documents",
            excerpts.len(),
            sources_used.len()
        );

        Ok(QueryOutcome {
            query: query.to_string(),
            answer,
            sources_used,
            excerpts,
            model: self.answerer.model().to_string(),
        })
    }

    /// Read questions from `input` until `exit` or end of input, writing answers to `output`
    pub async fn run_query_loop<R: BufRead, W: Write>(
        &self,
        mut input: R,
        mut output: W,
        use_documents: bool,
    ) -> Result<()> {
        writeln!(output, "Ready to answer questions. Type 'exit' to quit.")?;
        let mut buffer = String::new();

        loop {
            write!(output, "\nYour question: ")?;
            output.flush()?;

            buffer.clear();
            if input.read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();
            if question.eq_ignore_ascii_case("exit") {
                writeln!(output, "Goodbye!")?;
                break;
            }
            if question.is_empty() {
                continue;
            }

            match self.query(question, use_documents).await {
                Ok(outcome) => write_outcome(&mut output, &outcome)?,
                Err(e) => writeln!(output, "Error: {}", e)?,
            }
        }

        Ok(())
    }
}

/// Split embedding attempts into storable chunks and the indices that failed
pub fn partition_embeddings(
    attempts: Vec<(usize, Result<NewChunk>)>,
) -> (Vec<NewChunk>, Vec<usize>) {
    attempts
        .into_iter()
        .fold((Vec::new(), Vec::new()), |(mut ok, mut failed), (index, outcome)| {
            match outcome {
                Ok(chunk) => ok.push(chunk),
                Err(_) => failed.push(index),
            }
            (ok, failed)
        })
}

/// Render ranked excerpts as the context block for the answer service
pub fn assemble_context(excerpts: &[ScoredChunk]) -> Option<String> {
    if excerpts.is_empty() {
        return None;
    }
    Some(
        excerpts
            .iter()
            .enumerate()
            .map(|(i, result)| format!("[Document excerpt {}]:\n{}", i + 1, result.chunk.content))
            .collect::<Vec<_>>()
            .join("\n\n"),
    )
}

/// Filenames of the documents behind `excerpts`, deduplicated in first-seen order
pub fn source_filenames(excerpts: &[ScoredChunk], documents: &[StoredDocument]) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut names = Vec::new();
    for result in excerpts {
        let document_id = result.chunk.document_id.as_str();
        if seen.contains(&document_id) {
            continue;
        }
        seen.push(document_id);
        if let Some(document) = documents.iter().find(|d| d.id == document_id) {
            names.push(document.filename.clone());
        }
    }
    names
}

/// Print an answer the way the interactive loop shows it
pub fn write_outcome<W: Write>(output: &mut W, outcome: &QueryOutcome) -> std::io::Result<()> {
    let answer = &outcome.answer;
    writeln!(output, "\n{}", answer.answer)?;
    writeln!(output, "\nConfidence: {}", answer.confidence)?;
    if !outcome.sources_used.is_empty() {
        writeln!(output, "Documents used: {}", outcome.sources_used.join(", "))?;
    }
    if !answer.sources.is_empty() {
        writeln!(output, "Sources:")?;
        for source in &answer.sources {
            writeln!(output, "  - {}", source)?;
        }
    }
    if !answer.follow_up_questions.is_empty() {
        writeln!(output, "Follow-up questions:")?;
        for question in &answer.follow_up_questions {
            writeln!(output, "  - {}", question)?;
        }
    }
    writeln!(output, "Model: {}", outcome.model)
}
