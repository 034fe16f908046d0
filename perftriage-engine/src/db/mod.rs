//! Result persistence
//!
//! Classification, match and suggestion results are stored as opaque JSON
//! documents under a caller-assigned id.

pub mod store;

pub use store::{MemoryResultStore, ResultStore, SqliteResultStore, StoredAnalysis};
