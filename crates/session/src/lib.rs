//! Image records, batch processing and the working set for SlimSnap.
//!
//! A [`WorkingSet`] holds the images a user has loaded. Adding files is
//! gated by the upload allow-list and the concurrent-upload cap; processing
//! is gated by the freemium policy and the processing quota, and runs the
//! pending records through a [`BatchProcessor`].

#![warn(missing_docs)]

pub mod batch;
mod record;
#[cfg(test)]
mod test_support;
mod working_set;

#[cfg(feature = "parallel")]
pub use batch::process_batch_parallel;
pub use batch::{process_batch, BatchOutcome, BatchProcessor, CancelToken, ItemOutcome};
pub use record::{DisplayHandle, HandleRegistry, ImageRecord, Payload, ProcessedImage, SourceFile, OUTPUT_PREFIX};
pub use working_set::{unsupported, AddOutcome, Summary, WorkingSet};
