//! The authoritative claim ledger.
//!
//! Owns the cell → owner map, the per-owner index, the ledger version and
//! the change log. All four live behind one lock so a reader never sees a
//! version without the record that produced it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{trace, warn};

use crate::cell::{Cell, OwnerId};
use crate::change::{ChangeOp, ChangeRecord, DeltaResult};
use crate::error::{Error, Result};
use crate::log::{ChangeLog, DEFAULT_LOG_CAPACITY};

/// Configuration for a claim ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Maximum number of change records retained for delta resolution.
    pub log_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl LedgerConfig {
    /// Set the change log capacity. Zero is raised to one.
    #[must_use]
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity.max(1);
        self
    }
}

/// A consistent point-in-time copy of every claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Ledger version the claims were read at.
    pub version: u64,
    pub claims: BTreeMap<Cell, OwnerId>,
}

/// Counters describing the ledger's current shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    pub version: u64,
    pub claimed_cells: usize,
    pub owners: usize,
    pub log_len: usize,
    pub log_capacity: usize,
    pub min_retained: Option<u64>,
}

#[derive(Debug)]
struct LedgerState {
    version: u64,
    owners: HashMap<Cell, OwnerId>,
    by_owner: HashMap<OwnerId, HashSet<Cell>>,
    log: ChangeLog,
}

impl LedgerState {
    fn empty(log_capacity: usize) -> Self {
        Self {
            version: 0,
            owners: HashMap::new(),
            by_owner: HashMap::new(),
            log: ChangeLog::with_capacity(log_capacity),
        }
    }

    fn index_remove(&mut self, owner: &str, cell: &Cell) {
        if let Some(cells) = self.by_owner.get_mut(owner) {
            cells.remove(cell);
            if cells.is_empty() {
                self.by_owner.remove(owner);
            }
        }
    }

    fn set_owner(&mut self, cell: Cell, owner: OwnerId) {
        if let Some(previous) = self.owners.insert(cell.clone(), owner.clone()) {
            if previous != owner {
                self.index_remove(&previous, &cell);
            }
        }
        self.by_owner.entry(owner).or_default().insert(cell);
    }

    fn record(&mut self, op: ChangeOp, cell: Cell, owner: OwnerId) -> u64 {
        self.version += 1;
        let version = self.version;
        let evicted = self.log.push(ChangeRecord {
            op,
            cell,
            owner,
            version,
        });
        if evicted > 0 {
            trace!(evicted, min_retained = ?self.log.min_retained(), "change log trimmed");
        }
        version
    }

    fn remove(&mut self, cell: &Cell) -> Option<u64> {
        let previous = self.owners.remove(cell)?;
        self.index_remove(&previous, cell);
        Some(self.record(ChangeOp::Unclaim, cell.clone(), previous))
    }
}

/// Authoritative store of territory ownership.
///
/// Mutations are serialized behind a write lock; version increment and log
/// append happen under the same guard. Reads take a read lock and therefore
/// see a consistent version/claims pair.
///
/// Share it between gameplay code and the sync scheduler with an `Arc`.
#[derive(Debug)]
pub struct ClaimLedger {
    state: RwLock<LedgerState>,
}

impl Default for ClaimLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl ClaimLedger {
    /// Create an empty ledger at version 0.
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            state: RwLock::new(LedgerState::empty(config.log_capacity)),
        }
    }

    /// Rebuild a ledger from previously persisted claims.
    ///
    /// The version resumes at `version` and the change log starts empty, so
    /// any subscriber holding an older cursor is sent a snapshot. Invalid
    /// entries are dropped and a cell listed twice keeps its first owner.
    pub fn restore(
        config: LedgerConfig,
        version: u64,
        claims: impl IntoIterator<Item = (Cell, OwnerId)>,
    ) -> Self {
        let mut state = LedgerState::empty(config.log_capacity);
        state.version = version;

        for (cell, owner) in claims {
            if !cell.is_valid() || owner.trim().is_empty() {
                warn!(%cell, %owner, "dropping invalid restored claim");
                continue;
            }
            if let Some(existing) = state.owners.get(&cell) {
                if *existing != owner {
                    warn!(%cell, kept = %existing, dropped = %owner, "duplicate restored claim");
                }
                continue;
            }
            state.set_owner(cell, owner);
        }

        Self {
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign `cell` to `owner`, overwriting any previous owner.
    ///
    /// Always produces a new version and one `Claim` record, even when the
    /// owner is unchanged.
    pub fn claim(&self, cell: Cell, owner: impl Into<OwnerId>) -> Result<u64> {
        let owner = owner.into();
        if owner.trim().is_empty() {
            return Err(Error::InvalidOwner(owner));
        }
        if !cell.is_valid() {
            return Err(Error::InvalidCell);
        }

        let mut state = self.write();
        state.set_owner(cell.clone(), owner.clone());
        let version = state.record(ChangeOp::Claim, cell, owner);
        trace!(version, "claim recorded");
        Ok(version)
    }

    /// Remove ownership of `cell`.
    ///
    /// Returns `None` without advancing the version if the cell was not
    /// claimed.
    pub fn unclaim(&self, cell: &Cell) -> Option<u64> {
        let version = self.write().remove(cell);
        if let Some(version) = version {
            trace!(version, %cell, "unclaim recorded");
        }
        version
    }

    /// Remove ownership of `cell` only if `owner` currently holds it.
    pub fn release(&self, cell: &Cell, owner: &str) -> Result<Option<u64>> {
        if owner.trim().is_empty() {
            return Err(Error::InvalidOwner(owner.to_string()));
        }

        let mut state = self.write();
        if state.owners.get(cell).map(String::as_str) != Some(owner) {
            return Ok(None);
        }
        Ok(state.remove(cell))
    }

    /// Current ledger version.
    pub fn current_version(&self) -> u64 {
        self.read().version
    }

    /// Owner of `cell`, if claimed.
    pub fn owner_at(&self, cell: &Cell) -> Option<OwnerId> {
        self.read().owners.get(cell).cloned()
    }

    /// All cells currently owned by `owner`.
    pub fn claims_of(&self, owner: &str) -> BTreeSet<Cell> {
        self.read()
            .by_owner
            .get(owner)
            .map(|cells| cells.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Claims inside one region, grouped by owner.
    pub fn claims_in_region(&self, region: &str) -> BTreeMap<OwnerId, BTreeSet<Cell>> {
        let state = self.read();
        let mut grouped: BTreeMap<OwnerId, BTreeSet<Cell>> = BTreeMap::new();
        for (cell, owner) in state.owners.iter().filter(|(c, _)| c.region == region) {
            grouped.entry(owner.clone()).or_default().insert(cell.clone());
        }
        grouped
    }

    /// Every current claim.
    pub fn all_claims(&self) -> BTreeMap<Cell, OwnerId> {
        self.full_snapshot().claims
    }

    /// Number of claimed cells.
    pub fn total_claimed(&self) -> usize {
        self.read().owners.len()
    }

    /// Full snapshot tagged with the version it was read at.
    pub fn full_snapshot(&self) -> Snapshot {
        let state = self.read();
        Snapshot {
            version: state.version,
            claims: state
                .owners
                .iter()
                .map(|(cell, owner)| (cell.clone(), owner.clone()))
                .collect(),
        }
    }

    /// Changes a caller holding `known` needs to reach the current version.
    pub fn changes_since(&self, known: u64) -> DeltaResult {
        let state = self.read();
        state.log.changes_since(known, state.version)
    }

    /// Retained change records, oldest first.
    pub fn retained_changes(&self) -> Vec<ChangeRecord> {
        self.read().log.iter().cloned().collect()
    }

    pub fn stats(&self) -> LedgerStats {
        let state = self.read();
        LedgerStats {
            version: state.version,
            claimed_cells: state.owners.len(),
            owners: state.by_owner.len(),
            log_len: state.log.len(),
            log_capacity: state.log.capacity(),
            min_retained: state.log.min_retained(),
        }
    }
}
