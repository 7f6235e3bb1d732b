//! Claimable cell coordinates.
//!
//! A cell is one unit of territory: a region name plus integer `(x, z)`
//! coordinates inside that region. Cells order by region first, then `x`,
//! then `z`, which is the order snapshots are emitted in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Opaque organization identifier owning cells.
pub type OwnerId = String;

/// A unit of claimable territory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    /// Region (world) the cell belongs to.
    pub region: String,
    /// Column coordinate.
    pub x: i32,
    /// Row coordinate.
    pub z: i32,
}

impl Cell {
    /// Create a new cell.
    pub fn new(region: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            region: region.into(),
            x,
            z,
        }
    }

    /// Whether the region is usable as a claim target.
    pub fn is_valid(&self) -> bool {
        !self.region.trim().is_empty()
    }

    /// The `region:x:z` key used by map exports and older clients.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.region, self.x, self.z)
    }
}

impl FromStr for Cell {
    type Err = Error;

    /// Parse a `region:x:z` key. Coordinates are taken from the right so a
    /// region name may itself contain `:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidCellKey(s.to_string());

        let mut parts = s.rsplitn(3, ':');
        let z = parts.next().ok_or_else(invalid)?;
        let x = parts.next().ok_or_else(invalid)?;
        let region = parts.next().ok_or_else(invalid)?;

        let cell = Cell::new(
            region,
            x.trim().parse().map_err(|_| invalid())?,
            z.trim().parse().map_err(|_| invalid())?,
        );
        if !cell.is_valid() {
            return Err(invalid());
        }
        Ok(cell)
    }
}
