//! Download pipeline components
//!
//! Leaf to root: process runner, metadata extractor, file locator and
//! reconciler, tied together by the job coordinator.

pub mod file_locator;
pub mod job_coordinator;
pub mod job_registry;
pub mod metadata_extractor;
pub mod process_runner;
pub mod reconciler;

pub use file_locator::{FileLocator, LocateError, LocatedFile};
pub use job_coordinator::{AcceptedJob, CoordinatorSettings, JobCoordinator, JobFailure};
pub use job_registry::JobRegistry;
pub use metadata_extractor::{ExtractionError, ExtractionResult, MarkerExtractor, MetadataExtractor};
pub use process_runner::{ExternalDownloader, ProcessOutput, ProcessRunner, SpawnError};
pub use reconciler::{LinkOutcome, Reconciler, RecordKey};
