//! Call logging subsystem
//!
//! Host code wraps units of work in [`CallRunner::run`], which hands the
//! body a [`LogContext`] and persists one [`LogEvent`] per call that logged
//! anything. Stored events are read back page by page through
//! [`QueryService`] and pruned by [`RetentionSweeper`].
//!
//! ## Architecture
//!
//! ```text
//! Layer 1: Collection (LogContext, per call, in memory)
//!     ↓
//! Layer 2: Persistence (LogStore, SQLite)
//!     ↓
//! Layer 3: Query (QueryService → HTTP API / CLI)
//!
//! RetentionSweeper ──(runs through CallRunner)──> LogStore
//! ```

pub mod cleanup;
pub mod clock;
pub mod context;
pub mod database;
pub mod event;
pub mod query;
pub mod runner;

// Re-export public types
pub use cleanup::{retention_cutoff, RetentionSweeper, SweepReport, SweeperHandle, CLEANUP_CALL_NAME};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::LogContext;
pub use database::{LogStore, StoreError};
pub use event::{endpoint_name, Day, LogEvent, LogLine, Severity};
pub use query::{LogResponse, QueryError, QueryService, PAGE_SIZE};
pub use runner::CallRunner;
