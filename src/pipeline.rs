//! Pipeline orchestration: drives each mapping's loader to completion,
//! normalizes records, applies the upsert decision, and isolates failures so
//! one bad record never takes down a run.
//!
//! The contract of [`run_import_pipeline`] is "always return a report":
//! per-record and mapping-level failures end up as counts in the result, and
//! only configuration errors (an unknown mapping selected, before any loader
//! runs) surface as `Err`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::document::Document;
use crate::error::Result;
use crate::mapping::{Mapping, MappingSet};
use crate::progress::ImportProgress;
use crate::report::{MappingResult, MappingState, MappingStats, Outcome, PipelineRunResult};
use crate::sources::{Loader, RawRecord};
use crate::store::ThingStore;
use crate::transform::{FieldTransform, Transform};

/// Effective write policy for one mapping run: the mapping's own policy
/// OR-ed with the pipeline-wide flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct WritePolicy {
    pub skip_existing: bool,
    pub dry_run: bool,
}

/// Knobs for one pipeline invocation.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Explicit subset of mapping ids to run; `None` runs all of them.
    pub mapping_filter: Option<Vec<String>>,
    pub dry_run: bool,
    pub skip_existing: bool,
    pub max_in_flight_records: usize,
    pub max_concurrent_mappings: usize,
    pub error_detail_cap: usize,
    /// On cancellation, in-flight record work drains, no new pages are
    /// fetched, and the run reports `cancelled = true`.
    pub cancel: CancellationToken,
    pub progress: Option<Arc<ImportProgress>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            mapping_filter: None,
            dry_run: false,
            skip_existing: false,
            max_in_flight_records: settings.max_in_flight_records,
            max_concurrent_mappings: settings.max_concurrent_mappings,
            error_detail_cap: settings.error_detail_cap,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }
}

/// Everything a mapping run shares with its record workers.
#[derive(Clone)]
struct MappingContext {
    store: Arc<dyn ThingStore>,
    policy: WritePolicy,
    max_in_flight: usize,
    progress: Option<Arc<ImportProgress>>,
    cancel: CancellationToken,
}

/// Run the configured mappings against the store and return the aggregate
/// report.
pub async fn run_import_pipeline(
    mappings: &MappingSet,
    store: Arc<dyn ThingStore>,
    options: PipelineOptions,
) -> Result<PipelineRunResult> {
    let selected: Vec<Mapping> = match &options.mapping_filter {
        Some(ids) => mappings.select(ids)?.into_iter().cloned().collect(),
        None => mappings.all().to_vec(),
    };

    tracing::info!(
        mappings = selected.len(),
        store = store.store_name(),
        dry_run = options.dry_run,
        "Starting import pipeline"
    );

    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(options.max_concurrent_mappings.max(1)));
    let mut handles = Vec::with_capacity(selected.len());

    for mapping in selected {
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        if options.cancel.is_cancelled() {
            break;
        }

        let context = MappingContext {
            store: store.clone(),
            policy: WritePolicy {
                skip_existing: mapping.policy.skip_existing || options.skip_existing,
                dry_run: mapping.policy.dry_run || options.dry_run,
            },
            max_in_flight: options.max_in_flight_records.max(1),
            progress: options.progress.clone(),
            cancel: options.cancel.clone(),
        };
        let detail_cap = options.error_detail_cap;
        let label = (mapping.id.clone(), mapping.collection.clone());

        let handle = tokio::spawn(async move {
            let result = run_mapping(mapping, context, detail_cap).await;
            drop(permit);
            result
        });
        handles.push((label, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for ((mapping_id, collection), handle) in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!(mapping = %mapping_id, "Mapping task panicked: {}", e);
                let stats =
                    MappingStats::new(&mapping_id, &collection, options.error_detail_cap);
                stats.record_error(format!("mapping task failed: {}", e));
                results.push(stats.finish(MappingState::Failed));
            }
        }
    }

    let run = PipelineRunResult::from_results(
        results,
        started.elapsed(),
        options.cancel.is_cancelled(),
    );
    tracing::info!(
        processed = run.total_processed,
        created = run.total_created,
        updated = run.total_updated,
        skipped = run.total_skipped,
        errors = run.total_errors,
        success = run.success,
        "Import pipeline finished"
    );
    Ok(run)
}

async fn run_mapping(
    mapping: Mapping,
    context: MappingContext,
    detail_cap: usize,
) -> MappingResult {
    let stats = Arc::new(MappingStats::new(
        &mapping.id,
        &mapping.collection,
        detail_cap,
    ));

    let loader = match mapping.source.build_loader() {
        Ok(loader) => loader,
        Err(e) => {
            tracing::error!(mapping = %mapping.id, "Loader construction failed: {}", e);
            stats.record_error(format!("loader construction failed: {}", e));
            return stats.finish(MappingState::Failed);
        }
    };

    drive_mapping(&mapping, loader, context, stats).await
}

/// Pull pages in source order and fan each page's records out to bounded
/// concurrent workers. Pages stay strictly sequential because a cursor
/// depends on the prior page; records within a page are independent.
async fn drive_mapping(
    mapping: &Mapping,
    mut loader: Box<dyn Loader>,
    context: MappingContext,
    stats: Arc<MappingStats>,
) -> MappingResult {
    stats.mark_running();
    tracing::info!(
        mapping = %mapping.id,
        collection = %mapping.collection,
        source = loader.source_name(),
        dry_run = context.policy.dry_run,
        "Starting mapping"
    );

    let semaphore = Arc::new(Semaphore::new(context.max_in_flight));
    let mut pages_fetched = 0usize;

    loop {
        if context.cancel.is_cancelled() {
            tracing::info!(mapping = %mapping.id, "Cancelled, not fetching further pages");
            break;
        }

        let page = match loader.next_page().await {
            Ok(page) => page,
            Err(e) if pages_fetched == 0 => {
                tracing::error!(mapping = %mapping.id, "Initial fetch failed: {}", e);
                stats.record_error(format!("initial fetch failed: {}", e));
                return stats.finish(MappingState::Failed);
            }
            Err(e) => {
                // Counted once; pages already processed stand as partial results.
                tracing::warn!(
                    mapping = %mapping.id,
                    pages = pages_fetched,
                    "Fetch failed mid-run, abandoning remaining pages: {}", e
                );
                stats.record_error(format!("fetch failed mid-run: {}", e));
                break;
            }
        };
        pages_fetched += 1;

        let mut workers = Vec::with_capacity(page.records.len());
        for record in page.records {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let store = context.store.clone();
            let stats = stats.clone();
            let progress = context.progress.clone();
            let policy = context.policy;
            let transform = mapping.transform.clone();
            let collection = mapping.collection.clone();
            workers.push(tokio::spawn(async move {
                process_record(store, transform, collection, record, policy, stats, progress)
                    .await;
                drop(permit);
            }));
        }
        for worker in futures::future::join_all(workers).await {
            if let Err(e) = worker {
                tracing::warn!(mapping = %mapping.id, "Record task panicked: {}", e);
                stats.record_error(format!("record task failed: {}", e));
            }
        }

        if page.done {
            break;
        }
        if let Some(ms) = mapping.policy.throttle_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    let result = stats.finish(MappingState::Completed);
    tracing::info!(
        mapping = %mapping.id,
        processed = result.processed,
        created = result.created,
        updated = result.updated,
        skipped = result.skipped,
        errors = result.errors,
        "Mapping finished"
    );
    result
}

/// Normalize one record and apply the upsert decision, recording the outcome.
/// Never propagates an error: failures become the `Error` bucket.
async fn process_record(
    store: Arc<dyn ThingStore>,
    transform: FieldTransform,
    collection: String,
    record: RawRecord,
    policy: WritePolicy,
    stats: Arc<MappingStats>,
    progress: Option<Arc<ImportProgress>>,
) {
    let outcome = match transform.transform(&collection, &record) {
        Ok(doc) => match apply_document(store.as_ref(), &doc, policy).await {
            Ok(outcome) => {
                stats.record(outcome, None);
                outcome
            }
            Err(e) => {
                stats.record(Outcome::Error, Some(e.to_string()));
                Outcome::Error
            }
        },
        Err(e) => {
            stats.record(Outcome::Error, Some(e.to_string()));
            Outcome::Error
        }
    };

    if let Some(progress) = progress {
        match outcome {
            Outcome::Error => progress.inc_failed(1),
            _ => progress.inc(1),
        }
    }
}

/// The upsert decision:
///
/// 1. absent → create
/// 2. present + `skip_existing` → skip, even if content differs
/// 3. present + identical content hash → skip (idempotent no-op)
/// 4. present + changed → update
///
/// Under `dry_run` the classification is identical but no write happens.
pub async fn apply_document(
    store: &dyn ThingStore,
    doc: &Document,
    policy: WritePolicy,
) -> Result<Outcome> {
    let existing = store.get_thing(&doc.collection, &doc.id).await?;

    match existing {
        None => {
            if !policy.dry_run {
                store
                    .create_thing(&doc.collection, &doc.id, &doc.metadata, &doc.body)
                    .await?;
            }
            Ok(Outcome::Created)
        }
        Some(_) if policy.skip_existing => Ok(Outcome::Skipped),
        Some(existing) => {
            if existing.content_hash() == doc.content_hash() {
                Ok(Outcome::Skipped)
            } else {
                if !policy.dry_run {
                    store
                        .update_thing(&doc.collection, &doc.id, Some(&doc.metadata), Some(&doc.body))
                        .await?;
                }
                Ok(Outcome::Updated)
            }
        }
    }
}
