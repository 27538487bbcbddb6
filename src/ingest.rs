//! Ingestion pipeline: directory tree to persisted documents.
//!
//! The pipeline walks a project root, filters paths through a
//! [`FileSelector`], loads eligible files into [`Document`]s in batches of
//! 100, and hands each batch to a [`DocumentSink`]. It is best-effort
//! across batches: a failing batch is logged and the run continues, and
//! individual unreadable files are skipped without failing their batch.
//! Cancellation is polled between batches, never mid-batch, and already
//! committed batches stay committed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::models::{
    Document, KEY_DIRECTORY, KEY_FILE_NAME, KEY_FILE_PATH, KEY_PROJECT_ID,
};
use crate::progress::{format_eta, IndexProgressEvent, IndexProgressReporter};
use crate::registry::IndexRegistry;
use crate::selector::FileSelector;
use crate::store::EmbeddingStore;

/// Files per batch; one sink call (and one store commit) per batch.
pub const BATCH_SIZE: usize = 100;

/// Verbose progress detail is emitted every this many processed files.
const PROGRESS_DETAIL_EVERY: u64 = 50;

/// Receives batches of loaded documents. May fail per batch; the pipeline
/// logs the failure and continues with the next batch.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn accept(&self, batch: Vec<Document>) -> Result<()>;
}

/// The production sink: embeds each document's text and persists the whole
/// batch through one bulk store write.
pub struct StoreSink {
    store: Arc<EmbeddingStore>,
    embedder: Arc<dyn Embedder>,
}

impl StoreSink {
    pub fn new(store: Arc<EmbeddingStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl DocumentSink for StoreSink {
    async fn accept(&self, batch: Vec<Document>) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        self.store.add_all(vectors, batch).await?;
        Ok(())
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Committed,
    Failed,
}

/// Aggregate result of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub total_files: u64,
    pub processed_files: u64,
    /// Per-batch outcomes in batch order.
    pub batches: Vec<(usize, BatchOutcome)>,
    pub canceled: bool,
}

impl IngestReport {
    pub fn failed_batches(&self) -> usize {
        self.batches
            .iter()
            .filter(|(_, outcome)| *outcome == BatchOutcome::Failed)
            .count()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "indexed {} of {} files",
            self.processed_files, self.total_files
        );
        let failed = self.failed_batches();
        if failed > 0 {
            summary.push_str(&format!(" ({} batches failed, files skipped)", failed));
        }
        if self.canceled {
            summary.push_str(" (canceled)");
        }
        summary
    }
}

pub struct IngestPipeline {
    batch_size: usize,
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestPipeline {
    pub fn new() -> Self {
        Self {
            batch_size: BATCH_SIZE,
        }
    }

    /// Override the batch size. Values below 1 are clamped to 1.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest everything under `root` accepted by `selector`.
    ///
    /// Counts eligible files first (a zero count is an immediate no-op),
    /// then processes fixed-size batches, polling `cancel` before each one.
    pub async fn run(
        &self,
        project_id: &str,
        root: &Path,
        selector: &FileSelector,
        sink: &dyn DocumentSink,
        reporter: &dyn IndexProgressReporter,
        cancel: &AtomicBool,
    ) -> Result<IngestReport> {
        reporter.report(IndexProgressEvent::Counting {
            project: project_id.to_string(),
        });

        let files = collect_eligible_files(root, selector);
        let total = files.len() as u64;
        let mut report = IngestReport {
            total_files: total,
            ..Default::default()
        };
        if total == 0 {
            debug!(project = project_id, "no eligible files, skipping ingestion");
            return Ok(report);
        }

        let start = Instant::now();
        let mut detail_bucket = 0u64;

        for (batch_index, batch_paths) in files.chunks(self.batch_size).enumerate() {
            if cancel.load(Ordering::Relaxed) {
                info!(project = project_id, "ingestion canceled");
                report.canceled = true;
                break;
            }

            let mut documents = Vec::with_capacity(batch_paths.len());
            for path in batch_paths {
                match load_document(path, project_id) {
                    Some(doc) if !doc.is_blank() => documents.push(doc),
                    Some(_) => debug!(path = %path.display(), "skipping blank file"),
                    None => {}
                }
            }

            let outcome = if documents.is_empty() {
                BatchOutcome::Committed
            } else {
                match sink.accept(documents).await {
                    Ok(()) => BatchOutcome::Committed,
                    Err(err) => {
                        warn!(
                            project = project_id,
                            batch = batch_index,
                            %err,
                            "batch failed, continuing with remaining batches"
                        );
                        BatchOutcome::Failed
                    }
                }
            };
            report.batches.push((batch_index, outcome));
            report.processed_files += batch_paths.len() as u64;

            let processed = report.processed_files;
            let bucket = processed / PROGRESS_DETAIL_EVERY;
            let detail = if bucket > detail_bucket || processed == total {
                detail_bucket = bucket;
                Some(format!(
                    "{} / {} files ({:.1}%)  eta {}",
                    processed,
                    total,
                    processed as f64 * 100.0 / total as f64,
                    format_eta(start.elapsed(), processed, total)
                ))
            } else {
                None
            };
            reporter.report(IndexProgressEvent::Ingesting {
                project: project_id.to_string(),
                processed,
                total,
                detail,
            });
        }

        reporter.report(IndexProgressEvent::Finished {
            project: project_id.to_string(),
            processed: report.processed_files,
            total,
            failed_batches: report.failed_batches(),
            canceled: report.canceled,
        });
        info!(project = project_id, "{}", report.summary());
        Ok(report)
    }
}

/// Full index run for one project, gated by the registry.
///
/// Returns `None` when the project is already indexed (fresh record or a
/// run in flight). On a completed run the project is marked indexed; a
/// canceled run leaves the registry untouched so the project stays
/// eligible for a future re-index. The in-flight marker is always cleared.
pub async fn index_project(
    project_id: &str,
    root: &Path,
    selector: &FileSelector,
    sink: &dyn DocumentSink,
    registry: &IndexRegistry,
    reporter: &dyn IndexProgressReporter,
    cancel: &AtomicBool,
) -> Result<Option<IngestReport>> {
    if registry.is_indexed(project_id) {
        debug!(project = project_id, "already indexed, skipping");
        return Ok(None);
    }

    registry.mark_as_indexing(project_id);
    let result = IngestPipeline::new()
        .run(project_id, root, selector, sink, reporter, cancel)
        .await;
    registry.finish_indexing(project_id);

    let report = result?;
    if !report.canceled {
        registry.mark_as_indexed(project_id)?;
    }
    Ok(Some(report))
}

/// The count pass: walk the tree once, collecting every selector-accepted
/// path in deterministic order. The ingest pass then iterates this list.
fn collect_eligible_files(root: &Path, selector: &FileSelector) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(err) => {
                debug!(%err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|path| selector.matches(path))
        .collect();
    files.sort();
    files
}

/// Load one file into a document. Best-effort: unreadable or non-UTF-8
/// files are skipped, not fatal to their batch.
fn load_document(path: &Path, project_id: &str) -> Option<Document> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            debug!(path = %path.display(), %err, "skipping unreadable file");
            return None;
        }
    };

    let file_name = path.file_name()?.to_string_lossy().to_string();
    let directory = path
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();

    let mut metadata = BTreeMap::new();
    metadata.insert(KEY_PROJECT_ID.to_string(), project_id.to_string());
    metadata.insert(KEY_FILE_NAME.to_string(), file_name);
    metadata.insert(KEY_DIRECTORY.to_string(), directory);
    metadata.insert(
        KEY_FILE_PATH.to_string(),
        path.to_string_lossy().replace('\\', "/"),
    );
    Some(Document::new(text, metadata))
}
