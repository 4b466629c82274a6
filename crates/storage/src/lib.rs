pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{InMemorySnapshot, InMemoryStorage};
pub use record::{LogEntryRecord, StageVisitRecord, SubmissionRecord};
pub use traits::SubmissionStorage;
