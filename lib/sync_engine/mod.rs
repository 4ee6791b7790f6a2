//! Selective archive synchronization engine.
//!
//! Mirrors the filtered subset of a versioned remote content package in
//! bounded-size batches, persisting checkpoint state after every batch so an
//! interrupted transfer resumes at the next unprocessed batch instead of
//! redoing completed work.

mod cleanup;
mod controller;
pub mod error;
mod pipeline;
mod postprocess;
mod scheduler;
mod selector;
pub mod types;

#[cfg(test)]
mod test_support;


#[cfg(test)]
mod pipeline_tests;


pub use controller::{SyncController, SyncOutcome};
pub use error::Error;
pub use pipeline::{segment_file_name, BatchPipeline};
pub use postprocess::{ExtractToolConfig, ExtractToolProcessor, PostProcessError, PostProcessor};
pub use scheduler::{BatchProcessor, BatchScheduler};
pub use selector::select_segments;
pub use types::{
    BatchError, MissingSegmentPolicy, SchedulerOutcome, SegmentFetchOutcome, SyncEngineConfig,
};
