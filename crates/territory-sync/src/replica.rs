//! Subscriber-side mirror of the claim map.
//!
//! A [`Replica`] consumes the frames the scheduler emits and keeps a copy of
//! the claims at the last version it applied. It is what an in-process
//! viewer uses, and what the protocol tests check convergence against.

use std::collections::{BTreeMap, BTreeSet};

use territory_ledger::{Cell, ChangeOp, OwnerId};
use tracing::{debug, trace};

use crate::error::Result;
use crate::wire::SyncMessage;

/// Local copy of the claim map rebuilt from sync messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replica {
    version: Option<u64>,
    claims: BTreeMap<Cell, OwnerId>,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and apply a frame. Returns whether state changed.
    pub fn apply_frame(&mut self, frame: &[u8]) -> Result<bool> {
        Ok(self.apply(SyncMessage::decode(frame)?))
    }

    /// Apply a message. Returns whether it was accepted.
    ///
    /// A full snapshot always replaces the local state, even one with a lower
    /// version: the sender may have been restored to an older version. A
    /// delta is ignored unless it is newer than the current version, and
    /// before the first snapshot.
    pub fn apply(&mut self, message: SyncMessage) -> bool {
        let version = message.version();

        match message {
            SyncMessage::Full(payload) => {
                if self.version.is_some_and(|current| version < current) {
                    debug!(version, current = ?self.version, "snapshot rewinds replica");
                }
                self.claims = payload
                    .claims
                    .into_iter()
                    .map(|entry| (entry.cell, entry.owner))
                    .collect();
            }
            SyncMessage::Delta(payload) => {
                let Some(current) = self.version else {
                    trace!(version, "ignoring delta before first snapshot");
                    return false;
                };
                if version <= current {
                    trace!(version, current, "ignoring stale delta");
                    return false;
                }
                for change in payload.changes {
                    match change.op {
                        ChangeOp::Claim => {
                            self.claims.insert(change.cell, change.owner);
                        }
                        ChangeOp::Unclaim => {
                            self.claims.remove(&change.cell);
                        }
                    }
                }
            }
        }
        self.version = Some(version);
        true
    }

    /// Version of the last applied message.
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn claims(&self) -> &BTreeMap<Cell, OwnerId> {
        &self.claims
    }

    pub fn owner_at(&self, cell: &Cell) -> Option<&str> {
        self.claims.get(cell).map(String::as_str)
    }

    pub fn claims_of(&self, owner: &str) -> BTreeSet<Cell> {
        self.claims
            .iter()
            .filter(|(_, o)| o.as_str() == owner)
            .map(|(cell, _)| cell.clone())
            .collect()
    }
}
