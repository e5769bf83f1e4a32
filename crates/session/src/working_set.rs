//! The set of images a user is working on.
//!
//! The working set gates every action through the freemium policy and the
//! quota tracker, and only counts images against the quota once they have
//! actually been compressed.

use crate::batch::{BatchProcessor, CancelToken, ItemOutcome};
use crate::record::{HandleRegistry, ImageRecord, SourceFile};
use serde::Serialize;
use slimsnap_core::{Error, Result, Tier};
use slimsnap_image::{is_allowed_mime, savings_percent, CompressionEngine, CompressionSettings};
use slimsnap_quota::{PolicyEvaluator, QuotaTracker};

/// Result of adding files.
#[derive(Debug, Default)]
pub struct AddOutcome {
    /// Ids of the records created, in input order
    pub added: Vec<String>,
    /// Files dropped because their type is not on the allow-list
    pub rejected: Vec<SourceFile>,
}

/// Totals over the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Records in the set
    pub total: usize,
    /// Records with a compressed result
    pub processed: usize,
    /// Records still waiting
    pub pending: usize,
    /// Original bytes of the processed records
    pub original_bytes: u64,
    /// Compressed bytes of the processed records
    pub compressed_bytes: u64,
    /// Rounded savings over the processed records
    pub savings_percent: i64,
}

/// Images loaded for compression, with the quota that governs them.
pub struct WorkingSet {
    records: Vec<ImageRecord>,
    registry: HandleRegistry,
    tracker: QuotaTracker,
    tier: Tier,
    policy: PolicyEvaluator,
    engine: CompressionEngine,
    cancel: Option<CancelToken>,
    parallel: bool,
}

impl std::fmt::Debug for WorkingSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingSet")
            .field("records", &self.records.len())
            .field("tier", &self.tier)
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl WorkingSet {
    /// Empty working set for a user of `tier`.
    pub fn new(tracker: QuotaTracker, tier: Tier) -> Self {
        Self {
            records: Vec::new(),
            registry: HandleRegistry::new(),
            tracker,
            tier,
            policy: PolicyEvaluator::default(),
            engine: CompressionEngine::default(),
            cancel: None,
            parallel: false,
        }
    }

    /// Use a custom policy evaluator.
    pub fn with_policy(mut self, policy: PolicyEvaluator) -> Self {
        self.policy = policy;
        self
    }

    /// Use a custom compression engine.
    pub fn with_engine(mut self, engine: CompressionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Cancel batches through `token`.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Process batches on the rayon pool when the `parallel` feature is on.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Tier of the current user.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The quota tracker.
    pub fn tracker(&self) -> &QuotaTracker {
        &self.tracker
    }

    /// The handle registry backing previews and results.
    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Add files. Types outside the allow-list are returned as rejected;
    /// the rest are added only if the concurrent-upload cap allows all of
    /// them.
    pub fn add_files(&mut self, files: Vec<SourceFile>) -> Result<AddOutcome> {
        let (accepted, rejected): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| is_allowed_mime(&f.mime));
        for file in &rejected {
            tracing::warn!(file = %file.name, mime = %file.mime, "unsupported file type, skipping");
        }

        self.tracker
            .can_upload(self.tier, accepted.len(), self.records.len())
            .into_result()?;

        let mut added = Vec::with_capacity(accepted.len());
        for file in accepted {
            let record = ImageRecord::new(file, &self.registry);
            tracing::debug!(id = record.id(), image = record.name(), "added image");
            added.push(record.id().to_string());
            self.records.push(record);
        }

        Ok(AddOutcome { added, rejected })
    }

    /// Remove a record, releasing its handles. Quota counters are not
    /// touched.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id() != id);
        before != self.records.len()
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Compress every unprocessed record.
    ///
    /// The whole set is checked against the freemium policy and the
    /// pending records against the quota before any work starts; a denial
    /// leaves the set and the counters as they were. Afterwards only
    /// records compressed by this call are counted.
    pub fn process<F>(&mut self, settings: &CompressionSettings, on_progress: F) -> Result<Vec<ItemOutcome>>
    where
        F: FnMut(usize, usize),
    {
        self.policy
            .evaluate(
                self.records.len(),
                settings.quality,
                settings.max_width,
                settings.max_height,
                self.tier,
            )
            .into_result()?;

        let pending = self.records.iter().filter(|r| !r.is_processed()).count();
        self.tracker.can_process(self.tier, pending).into_result()?;

        let mut processor = BatchProcessor::new(&self.engine);
        if let Some(token) = &self.cancel {
            processor = processor.with_cancel(token.clone());
        }

        let images = std::mem::take(&mut self.records);
        let outcome = if self.parallel {
            run_parallel(&processor, images, settings, self.tier, on_progress)
        } else {
            processor.process(images, settings, self.tier, on_progress)
        };

        let newly = outcome.newly_processed();
        self.records = outcome.images;
        self.tracker.track_processed(u32::try_from(newly).unwrap_or(u32::MAX));

        tracing::info!(
            processed = newly,
            failed = outcome.outcomes.iter().filter(|o| o.is_failed()).count(),
            remaining = %self.tracker.remaining_processing(self.tier),
            "processing finished"
        );
        Ok(outcome.outcomes)
    }

    /// Counts and byte totals.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.records.len(),
            ..Summary::default()
        };
        for record in &self.records {
            if let Some(processed) = record.processed() {
                summary.processed += 1;
                summary.original_bytes += record.original().len() as u64;
                summary.compressed_bytes += processed.payload.len() as u64;
            }
        }
        summary.pending = summary.total - summary.processed;
        summary.savings_percent = savings_percent(summary.original_bytes, summary.compressed_bytes);
        summary
    }
}

#[cfg(feature = "parallel")]
fn run_parallel<F>(
    processor: &BatchProcessor<'_>,
    images: Vec<ImageRecord>,
    settings: &CompressionSettings,
    tier: Tier,
    on_progress: F,
) -> crate::batch::BatchOutcome
where
    F: FnMut(usize, usize),
{
    processor.process_parallel(images, settings, tier, on_progress)
}

#[cfg(not(feature = "parallel"))]
fn run_parallel<F>(
    processor: &BatchProcessor<'_>,
    images: Vec<ImageRecord>,
    settings: &CompressionSettings,
    tier: Tier,
    on_progress: F,
) -> crate::batch::BatchOutcome
where
    F: FnMut(usize, usize),
{
    processor.process(images, settings, tier, on_progress)
}

/// Denial for a file the allow-list rejects, for callers that treat it as
/// an error.
pub fn unsupported(file: &SourceFile) -> Error {
    Error::unsupported_type(&file.name, &file.mime)
}
