//! Territory Sync
//!
//! Pushes the claim ledger to subscribers as either a full snapshot or the
//! delta since the last version each subscriber received.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   changes_since    ┌───────────────┐   frames   ┌────────────┐
//! │ ClaimLedger  │ ◀───────────────── │ SyncScheduler │ ─────────▶ │ Transport  │
//! └──────────────┘   full_snapshot    └───────┬───────┘            └────────────┘
//!                                             │ eligible()
//!                                     ┌───────▼──────────┐
//!                                     │ SubscriberSource │
//!                                     └──────────────────┘
//! ```
//!
//! The scheduler keeps one cursor per subscriber and never sends a delta to
//! a subscriber that has not first received a snapshot. Everything on this
//! path is best-effort: a failed send leaves the cursor where it was and the
//! subscriber is retried on a later tick.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use territory_ledger::{Cell, ClaimLedger};
//! use territory_sync::{ChannelTransport, Replica, SyncConfig, SyncScheduler};
//!
//! let ledger = Arc::new(ClaimLedger::default());
//! let transport = Arc::new(ChannelTransport::new());
//! let scheduler = SyncScheduler::new(
//!     Arc::clone(&ledger),
//!     transport.clone(),
//!     transport.clone(),
//!     SyncConfig::fast(),
//! );
//!
//! let mut rx = transport.connect("viewer-1");
//! ledger.claim(Cell::new("world", 4, 2), "nationA").unwrap();
//! scheduler.tick();
//!
//! let mut replica = Replica::new();
//! replica.apply_frame(&rx.try_recv().unwrap()).unwrap();
//! assert_eq!(replica.owner_at(&Cell::new("world", 4, 2)), Some("nationA"));
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod replica;
pub mod scheduler;
pub mod transport;
pub mod wire;

pub use config::SyncConfig;
pub use cursor::CursorRegistry;
pub use error::{Error, Result};
pub use replica::Replica;
pub use scheduler::{Pending, SchedulerHandle, SyncScheduler, TickStats};
pub use transport::{ChannelTransport, SubscriberId, SubscriberSource, Transport, TransportError};
pub use wire::{ChangeEntry, ClaimEntry, DeltaPayload, FullPayload, SyncMessage, DELTA_TAG, FULL_TAG};
