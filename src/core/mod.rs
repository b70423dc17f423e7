pub mod comparator;
pub mod engine;
pub mod entry;
pub mod planner;
pub mod progress;
pub mod scanner;

pub use comparator::{diff_sorted, entries_equal, SyncPlan};
pub use engine::{execute_operation, JobFailure, SyncEngine, SyncReport, SyncStatus};
pub use entry::FsEntry;
pub use planner::{build_plan, ExecutionPlan, OpKind, Operation, Stage};
pub use progress::{NoopObserver, ProgressEvent, ProgressObserver, ProgressTracker};
pub use scanner::{FileScanner, ScanConfig};
