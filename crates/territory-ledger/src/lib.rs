//! Territory Claim Ledger
//!
//! The authoritative record of which organization owns which cell, plus the
//! versioned change log replication is built on.
//!
//! # Versioning
//!
//! Every accepted mutation bumps the ledger version by exactly one and
//! appends one [`ChangeRecord`] tagged with the new version. Unclaiming a
//! free cell is not a mutation. The log keeps the newest
//! [`LedgerConfig::log_capacity`] records as a contiguous run of versions,
//! which lets [`ClaimLedger::changes_since`] tell three cases apart:
//!
//! - **UpToDate**: the caller already holds the current version
//! - **Delta**: every record the caller is missing is still retained
//! - **SnapshotRequired**: something the caller needs was evicted
//!
//! # Example
//!
//! ```
//! use territory_ledger::{Cell, ClaimLedger, DeltaResult};
//!
//! let ledger = ClaimLedger::default();
//! ledger.claim(Cell::new("world", 0, 0), "nationA").unwrap();
//! ledger.claim(Cell::new("world", 0, 1), "nationA").unwrap();
//! ledger.unclaim(&Cell::new("world", 0, 0));
//!
//! let snapshot = ledger.full_snapshot();
//! assert_eq!(snapshot.version, 3);
//! assert_eq!(snapshot.claims.len(), 1);
//!
//! assert_eq!(ledger.changes_since(3), DeltaResult::UpToDate);
//! ```

mod cell;
mod change;
mod error;
mod ledger;
mod log;

pub use cell::{Cell, OwnerId};
pub use change::{ChangeOp, ChangeRecord, DeltaResult};
pub use error::{Error, Result};
pub use ledger::{ClaimLedger, LedgerConfig, LedgerStats, Snapshot};
pub use log::{ChangeLog, DEFAULT_LOG_CAPACITY};
