//! Batch processing of image records.
//!
//! Every record in a batch comes back, in input order. Records already
//! processed pass through untouched, and a failure on one record never
//! affects the others.

use crate::record::ImageRecord;
use serde::Serialize;
use slimsnap_core::Tier;
use slimsnap_image::{CompressionEngine, CompressionRequest, CompressionSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ItemOutcome {
    /// Already processed before this batch
    Skipped,
    /// Compressed in this batch
    Compressed {
        /// Original size in bytes
        original_bytes: usize,
        /// Compressed size in bytes
        compressed_bytes: usize,
        /// Wall time spent in the engine
        elapsed_ms: u64,
    },
    /// Both strategies failed
    Failed {
        /// Why
        reason: String,
    },
    /// Not attempted because the batch was cancelled
    Cancelled,
}

impl ItemOutcome {
    /// Whether this record was compressed in this batch.
    pub fn is_compressed(&self) -> bool {
        matches!(self, ItemOutcome::Compressed { .. })
    }

    /// Whether compression failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

/// Records after a batch, with one outcome per record.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Same length and order as the input
    pub images: Vec<ImageRecord>,
    /// Outcome for the record at the same index
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchOutcome {
    /// Records compressed by this batch.
    pub fn newly_processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_compressed()).count()
    }

    /// Records whose compression failed.
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// Records that were already processed.
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Skipped))
            .count()
    }

    /// Bytes saved by this batch. Negative when outputs grew.
    pub fn bytes_saved(&self) -> i64 {
        self.outcomes
            .iter()
            .map(|o| match o {
                ItemOutcome::Compressed {
                    original_bytes,
                    compressed_bytes,
                    ..
                } => *original_bytes as i64 - *compressed_bytes as i64,
                _ => 0,
            })
            .sum()
    }
}

/// Cooperative cancellation, checked between records.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs batches through a compression engine.
#[derive(Debug)]
pub struct BatchProcessor<'a> {
    engine: &'a CompressionEngine,
    cancel: Option<CancelToken>,
}

impl<'a> BatchProcessor<'a> {
    /// Processor backed by `engine`.
    pub fn new(engine: &'a CompressionEngine) -> Self {
        Self { engine, cancel: None }
    }

    /// Stop starting new records once `token` is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn process_one(&self, record: &mut ImageRecord, settings: &CompressionSettings, tier: Tier) -> ItemOutcome {
        if record.is_processed() {
            return ItemOutcome::Skipped;
        }
        if self.cancelled() {
            return ItemOutcome::Cancelled;
        }

        let started = Instant::now();
        let request = CompressionRequest {
            name: record.name(),
            bytes: &record.original().bytes,
            mime: &record.original().mime,
            settings,
            tier,
        };
        let result = self.engine.compress(&request);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(out) => {
                let original_bytes = record.original().len();
                let compressed_bytes = out.byte_length();
                record.attach_compressed(out);
                ItemOutcome::Compressed {
                    original_bytes,
                    compressed_bytes,
                    elapsed_ms,
                }
            }
            Err(e) => {
                tracing::error!(image = record.name(), error = %e, "compression failed");
                ItemOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    /// Process records sequentially in input order.
    ///
    /// `on_progress(done, total)` is called once per record, after it is
    /// handled, with `done` running from 1 to `total`.
    pub fn process<F>(
        &self,
        mut images: Vec<ImageRecord>,
        settings: &CompressionSettings,
        tier: Tier,
        mut on_progress: F,
    ) -> BatchOutcome
    where
        F: FnMut(usize, usize),
    {
        let total = images.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, record) in images.iter_mut().enumerate() {
            outcomes.push(self.process_one(record, settings, tier));
            on_progress(index + 1, total);
        }

        tracing::debug!(
            total,
            compressed = outcomes.iter().filter(|o| o.is_compressed()).count(),
            "batch finished"
        );
        BatchOutcome { images, outcomes }
    }

    /// Process records on the rayon pool.
    ///
    /// Output order and per-record isolation match [`BatchProcessor::process`].
    /// Progress is reported in input order once the parallel stage is done.
    #[cfg(feature = "parallel")]
    pub fn process_parallel<F>(
        &self,
        mut images: Vec<ImageRecord>,
        settings: &CompressionSettings,
        tier: Tier,
        mut on_progress: F,
    ) -> BatchOutcome
    where
        F: FnMut(usize, usize),
    {
        use rayon::prelude::*;

        let total = images.len();
        let outcomes: Vec<ItemOutcome> = images
            .par_iter_mut()
            .map(|record| self.process_one(record, settings, tier))
            .collect();

        for done in 1..=total {
            on_progress(done, total);
        }
        BatchOutcome { images, outcomes }
    }
}

/// Process a batch with the default engine.
pub fn process_batch<F>(
    images: Vec<ImageRecord>,
    settings: &CompressionSettings,
    tier: Tier,
    on_progress: F,
) -> BatchOutcome
where
    F: FnMut(usize, usize),
{
    let engine = CompressionEngine::default();
    BatchProcessor::new(&engine).process(images, settings, tier, on_progress)
}

/// Process a batch with the default engine on the rayon pool.
#[cfg(feature = "parallel")]
pub fn process_batch_parallel<F>(
    images: Vec<ImageRecord>,
    settings: &CompressionSettings,
    tier: Tier,
    on_progress: F,
) -> BatchOutcome
where
    F: FnMut(usize, usize),
{
    let engine = CompressionEngine::default();
    BatchProcessor::new(&engine).process_parallel(images, settings, tier, on_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{HandleRegistry, SourceFile};
    use crate::test_support::{jpeg_fixture, png_fixture};

    fn records(registry: &HandleRegistry, files: Vec<SourceFile>) -> Vec<ImageRecord> {
        files.into_iter().map(|f| ImageRecord::new(f, registry)).collect()
    }

    fn mixed_batch(registry: &HandleRegistry) -> Vec<ImageRecord> {
        records(
            registry,
            vec![
                SourceFile::new("a.jpg", "image/jpeg", jpeg_fixture(120, 80)),
                SourceFile::new("corrupt.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 9, 9, 9, 9]),
                SourceFile::new("c.png", "image/png", png_fixture(64, 64)),
            ],
        )
    }

    #[test]
    fn test_corrupt_item_isolated() {
        let registry = HandleRegistry::new();
        let settings = CompressionSettings::with_quality(60);

        let outcome = process_batch(mixed_batch(&registry), &settings, Tier::Free, |_, _| {});

        assert_eq!(outcome.images.len(), 3);
        assert_eq!(outcome.images[1].name(), "corrupt.jpg");
        assert!(outcome.images[0].is_processed());
        assert!(!outcome.images[1].is_processed());
        assert!(outcome.images[2].is_processed());
        assert!(outcome.outcomes[1].is_failed());
        assert_eq!(outcome.newly_processed(), 2);
        assert_eq!(outcome.failed(), 1);
    }

    #[test]
    fn test_progress_called_per_item() {
        let registry = HandleRegistry::new();
        let settings = CompressionSettings::with_quality(60);
        let mut calls = Vec::new();

        process_batch(mixed_batch(&registry), &settings, Tier::Free, |done, total| {
            calls.push((done, total))
        });
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_processed_records_pass_through() {
        let registry = HandleRegistry::new();
        let settings = CompressionSettings::with_quality(60);
        let first = process_batch(mixed_batch(&registry), &settings, Tier::Free, |_, _| {});
        let sizes: Vec<Option<usize>> = first
            .images
            .iter()
            .map(|r| r.processed().map(|p| p.payload.len()))
            .collect();

        let second = process_batch(first.images, &settings, Tier::Free, |_, _| {});
        assert_eq!(second.newly_processed(), 0);
        assert_eq!(second.skipped(), 2);
        let again: Vec<Option<usize>> = second
            .images
            .iter()
            .map(|r| r.processed().map(|p| p.payload.len()))
            .collect();
        assert_eq!(sizes, again);
    }

    #[test]
    fn test_empty_batch() {
        let settings = CompressionSettings::default();
        let mut calls = 0;
        let outcome = process_batch(Vec::new(), &settings, Tier::Premium, |_, _| calls += 1);
        assert!(outcome.images.is_empty());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_cancelled_batch_reports_progress() {
        let registry = HandleRegistry::new();
        let settings = CompressionSettings::with_quality(60);
        let engine = CompressionEngine::default();
        let token = CancelToken::new();
        token.cancel();

        let mut calls = 0;
        let outcome = BatchProcessor::new(&engine)
            .with_cancel(token)
            .process(mixed_batch(&registry), &settings, Tier::Free, |_, _| calls += 1);

        assert_eq!(calls, 3);
        assert!(outcome.outcomes.iter().all(|o| *o == ItemOutcome::Cancelled));
        assert_eq!(outcome.newly_processed(), 0);
    }

    #[test]
    fn test_original_bytes_untouched() {
        let registry = HandleRegistry::new();
        let bytes = jpeg_fixture(90, 60);
        let batch = records(&registry, vec![SourceFile::new("a.jpg", "image/jpeg", bytes.clone())]);

        let outcome = process_batch(batch, &CompressionSettings::with_quality(55), Tier::Free, |_, _| {});
        assert_eq!(outcome.images[0].original().bytes, bytes);
    }

    #[test]
    fn test_result_handles_live_until_dropped() {
        let registry = HandleRegistry::new();
        let outcome = process_batch(
            mixed_batch(&registry),
            &CompressionSettings::with_quality(60),
            Tier::Free,
            |_, _| {},
        );
        // Three previews plus two results.
        assert_eq!(registry.live_count(), 5);
        drop(outcome);
        assert_eq!(registry.live_count(), 0);
    }

    proptest::proptest! {
        #[test]
        fn prop_progress_counts_every_record(n in 0usize..12) {
            let registry = HandleRegistry::new();
            let batch = records(
                &registry,
                (0..n)
                    .map(|i| SourceFile::new(format!("{i}.jpg"), "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0]))
                    .collect(),
            );
            let mut calls = Vec::new();

            let outcome = process_batch(batch, &CompressionSettings::with_quality(60), Tier::Free, |done, total| {
                calls.push((done, total))
            });

            proptest::prop_assert_eq!(outcome.images.len(), n);
            proptest::prop_assert_eq!(outcome.failed(), n);
            proptest::prop_assert_eq!(calls, (1..=n).map(|d| (d, n)).collect::<Vec<_>>());
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential_order() {
        let registry = HandleRegistry::new();
        let settings = CompressionSettings::with_quality(60);
        let mut calls = Vec::new();

        let outcome = process_batch_parallel(mixed_batch(&registry), &settings, Tier::Free, |done, total| {
            calls.push((done, total))
        });

        let names: Vec<&str> = outcome.images.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a.jpg", "corrupt.jpg", "c.png"]);
        assert!(outcome.outcomes[1].is_failed());
        assert_eq!(outcome.newly_processed(), 2);
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
