//! Storage layer: raw records and their event log, source artifacts.

mod error;
pub use error::StoreError;

pub mod event_log;
pub mod object;
pub mod raw;

pub use event_log::{DuplicateSummary, EventLog};
pub use object::{FsObjectStore, ListPage, MemoryObjectStore, ObjectStore};
pub use raw::{MemoryRawStore, RawStore};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckRawStore;
