//! Change records and delta resolution results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, OwnerId};

/// Kind of ownership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    /// The cell now belongs to `owner` (new claim or transfer).
    Claim,
    /// The cell was released by `owner` and is now unclaimed.
    Unclaim,
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claim => write!(f, "claim"),
            Self::Unclaim => write!(f, "unclaim"),
        }
    }
}

/// One logged mutation, tagged with the ledger version it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub op: ChangeOp,
    pub cell: Cell,
    /// New owner for `Claim`, previous owner for `Unclaim`.
    pub owner: OwnerId,
    /// Ledger version after this change was applied.
    pub version: u64,
}

impl ChangeRecord {
    /// Apply this change to a claim map.
    ///
    /// Records must be applied in version order; out-of-order application
    /// does not converge.
    pub fn apply_to(&self, claims: &mut BTreeMap<Cell, OwnerId>) {
        match self.op {
            ChangeOp::Claim => {
                claims.insert(self.cell.clone(), self.owner.clone());
            }
            ChangeOp::Unclaim => {
                claims.remove(&self.cell);
            }
        }
    }
}

/// Answer to "what changed since version N".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaResult {
    /// The caller already holds the current version.
    UpToDate,
    /// Every record newer than the caller's version, oldest first.
    Delta {
        changes: Vec<ChangeRecord>,
        new_version: u64,
    },
    /// The caller's version is no longer covered by the log (or was never
    /// valid); a full snapshot must be sent instead.
    SnapshotRequired { new_version: u64 },
}

impl DeltaResult {
    /// Version the caller will hold once this result is delivered.
    pub fn new_version(&self) -> Option<u64> {
        match self {
            Self::UpToDate => None,
            Self::Delta { new_version, .. } | Self::SnapshotRequired { new_version } => {
                Some(*new_version)
            }
        }
    }

    pub fn requires_snapshot(&self) -> bool {
        matches!(self, Self::SnapshotRequired { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(op: ChangeOp, x: i32, owner: &str, version: u64) -> ChangeRecord {
        ChangeRecord {
            op,
            cell: Cell::new("world", x, 0),
            owner: owner.to_string(),
            version,
        }
    }

    #[test]
    fn apply_in_order_converges() {
        let mut claims = BTreeMap::new();
        for r in [
            record(ChangeOp::Claim, 0, "a", 1),
            record(ChangeOp::Claim, 1, "a", 2),
            record(ChangeOp::Claim, 0, "b", 3),
            record(ChangeOp::Unclaim, 1, "a", 4),
        ] {
            r.apply_to(&mut claims);
        }
        assert_eq!(claims.len(), 1);
        assert_eq!(claims.get(&Cell::new("world", 0, 0)).map(String::as_str), Some("b"));
    }

    #[test]
    fn op_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChangeOp::Unclaim).unwrap(), "\"unclaim\"");
    }

    #[test]
    fn new_version_of_results() {
        assert_eq!(DeltaResult::UpToDate.new_version(), None);
        let stale = DeltaResult::SnapshotRequired { new_version: 9 };
        assert_eq!(stale.new_version(), Some(9));
        assert!(stale.requires_snapshot());
    }
}
