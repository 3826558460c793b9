use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::calendar::WeekdayOccurrenceTable;
use crate::decode::{decode_pages, DecodeError};
use crate::parser::Layout;
use crate::pipeline::{Extraction, ExtractionPipeline};
use crate::source::{DocumentSource, SourceError};
use crate::store::{CollectionPath, RecordSink};

/// One published schedule to process.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub district: String,
    pub url: String,
    pub layout: Layout,
}

pub struct RunOptions {
    pub max_records: usize,
    pub concurrency: usize,
    pub collection_root: String,
    pub subcollection: String,
}

/// Counters returned after every document has been handled.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub documents: usize,
    pub failed_documents: usize,
    pub records: usize,
    pub skipped: usize,
    pub store_errors: usize,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

struct DocumentOutcome {
    doc: SourceDocument,
    result: Result<Extraction, DocumentError>,
}

/// Fetch, decode and extract documents concurrently, storing records as each
/// document finishes. Per-document failures are counted, never fatal.
pub async fn run_documents<S, K>(
    source: Arc<S>,
    sink: &mut K,
    documents: Vec<SourceDocument>,
    table: Arc<WeekdayOccurrenceTable>,
    opts: &RunOptions,
) -> Result<RunStats>
where
    S: DocumentSource + 'static,
    K: RecordSink + ?Sized,
{
    let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1)));
    let total = documents.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} documents ({msg})")?
            .progress_chars("=> "),
    );

    // Workers send finished documents, this loop owns the sink
    let (tx, mut rx) = mpsc::channel::<DocumentOutcome>(opts.concurrency.max(1) * 2);

    for doc in documents {
        let source = Arc::clone(&source);
        let sem = Arc::clone(&semaphore);
        let table = Arc::clone(&table);
        let tx = tx.clone();
        let max_records = opts.max_records;

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let result = process_document(source.as_ref(), &doc, table, max_records).await;
            let _ = tx.send(DocumentOutcome { doc, result }).await;
        });
    }

    drop(tx);

    let mut stats = RunStats::default();
    while let Some(DocumentOutcome { doc, result }) = rx.recv().await {
        stats.documents += 1;
        pb.set_message(doc.district.clone());

        match result {
            Ok(extraction) => {
                stats.skipped += extraction.skipped;
                let collection =
                    CollectionPath::new(&opts.collection_root, &doc.district, &opts.subcollection);
                let stored = store_all(sink, &collection, &extraction, &mut stats);
                info!(
                    "{}: stored {} of {} records ({} lines skipped)",
                    doc.district,
                    stored,
                    extraction.records.len(),
                    extraction.skipped
                );
            }
            Err(e) => {
                stats.failed_documents += 1;
                warn!("Skipping {} ({}): {}", doc.district, doc.url, e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Processed {} documents ({} failed): {} records, {} skipped, {} store errors",
        stats.documents, stats.failed_documents, stats.records, stats.skipped, stats.store_errors
    );
    Ok(stats)
}

async fn process_document<S: DocumentSource>(
    source: &S,
    doc: &SourceDocument,
    table: Arc<WeekdayOccurrenceTable>,
    max_records: usize,
) -> Result<Extraction, DocumentError> {
    let bytes = source.fetch(&doc.url).await?;
    debug!("{}: fetched {} bytes", doc.district, bytes.len());

    let url = doc.url.clone();
    let layout = doc.layout;
    let extraction = tokio::task::spawn_blocking(move || -> Result<Extraction, DecodeError> {
        let pages = decode_pages(bytes)?;
        Ok(ExtractionPipeline::new(&table, layout, max_records).extract(&pages, &url))
    })
    .await??;
    Ok(extraction)
}

/// Hand every record to the sink in order; a failed store doesn't stop the rest.
fn store_all<K: RecordSink + ?Sized>(
    sink: &mut K,
    collection: &CollectionPath,
    extraction: &Extraction,
    stats: &mut RunStats,
) -> usize {
    let mut stored = 0;
    for record in &extraction.records {
        match sink.store(collection, record) {
            Ok(id) => {
                stored += 1;
                debug!("Stored row in {} with id {}", collection, id);
            }
            Err(e) => {
                stats.store_errors += 1;
                warn!("Failed to store row in {}: {}", collection, e);
            }
        }
    }
    stats.records += stored;
    stored
}

// ── Tests ──
