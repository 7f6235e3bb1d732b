//! Wire encoding for snapshot and delta messages.
//!
//! # Frame layout
//!
//! ```text
//! ┌────────────┬───────────┬──────────────┬──────────────────┐
//! │ tag len    │ tag       │ payload len  │ payload          │
//! │ u16 BE     │ "full" or │ u32 BE       │ JSON             │
//! │            │ "delta"   │              │                  │
//! └────────────┴───────────┴──────────────┴──────────────────┘
//! ```
//!
//! Payloads are deterministic for a given input: claims are ordered by cell,
//! changes by version, and fields by declaration order.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use territory_ledger::{Cell, ChangeOp, ChangeRecord, OwnerId, Snapshot};

use crate::error::{Error, Result};

/// Tag of a full snapshot frame.
pub const FULL_TAG: &str = "full";
/// Tag of a delta frame.
pub const DELTA_TAG: &str = "delta";

/// One claim inside a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEntry {
    pub cell: Cell,
    pub owner: OwnerId,
}

/// One change inside a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub op: ChangeOp,
    pub cell: Cell,
    pub owner: OwnerId,
}

impl From<&ChangeRecord> for ChangeEntry {
    fn from(record: &ChangeRecord) -> Self {
        Self {
            op: record.op,
            cell: record.cell.clone(),
            owner: record.owner.clone(),
        }
    }
}

/// Full snapshot payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullPayload {
    pub version: u64,
    pub claims: Vec<ClaimEntry>,
}

/// Delta payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaPayload {
    pub version: u64,
    pub changes: Vec<ChangeEntry>,
}

/// A replication message sent to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    Full(FullPayload),
    Delta(DeltaPayload),
}

impl SyncMessage {
    /// Build a full message from a ledger snapshot.
    pub fn full(snapshot: &Snapshot) -> Self {
        Self::Full(FullPayload {
            version: snapshot.version,
            claims: snapshot
                .claims
                .iter()
                .map(|(cell, owner)| ClaimEntry {
                    cell: cell.clone(),
                    owner: owner.clone(),
                })
                .collect(),
        })
    }

    /// Build a delta message from ordered change records.
    pub fn delta(version: u64, changes: &[ChangeRecord]) -> Self {
        Self::Delta(DeltaPayload {
            version,
            changes: changes.iter().map(ChangeEntry::from).collect(),
        })
    }

    /// Frame tag for this message.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Full(_) => FULL_TAG,
            Self::Delta(_) => DELTA_TAG,
        }
    }

    /// Version the receiver holds after applying this message.
    pub fn version(&self) -> u64 {
        match self {
            Self::Full(p) => p.version,
            Self::Delta(p) => p.version,
        }
    }

    /// Encode into a framed message.
    pub fn encode(&self) -> Result<Bytes> {
        let payload = match self {
            Self::Full(p) => serde_json::to_vec(p)?,
            Self::Delta(p) => serde_json::to_vec(p)?,
        };
        let payload_len =
            u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge(payload.len()))?;

        let tag = self.tag().as_bytes();
        let mut buf = BytesMut::with_capacity(2 + tag.len() + 4 + payload.len());
        buf.put_u16(tag.len() as u16);
        buf.put_slice(tag);
        buf.put_u32(payload_len);
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode a framed message.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let mut buf = frame;

        let tag = read_chunk(&mut buf, 2)?;
        let payload = read_chunk(&mut buf, 4)?;
        if buf.has_remaining() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after payload",
                buf.remaining()
            )));
        }

        match tag {
            t if t == FULL_TAG.as_bytes() => Ok(Self::Full(serde_json::from_slice(payload)?)),
            t if t == DELTA_TAG.as_bytes() => Ok(Self::Delta(serde_json::from_slice(payload)?)),
            other => Err(Error::Decode(format!(
                "unknown tag {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// Read a big-endian length prefix of `prefix` bytes and the chunk it covers.
fn read_chunk<'a>(buf: &mut &'a [u8], prefix: usize) -> Result<&'a [u8]> {
    if buf.remaining() < prefix {
        return Err(Error::Decode("truncated length prefix".into()));
    }
    let len = match prefix {
        2 => buf.get_u16() as usize,
        _ => buf.get_u32() as usize,
    };
    if buf.remaining() < len {
        return Err(Error::Decode(format!(
            "declared {len} bytes, {} available",
            buf.remaining()
        )));
    }
    let bytes: &'a [u8] = *buf;
    let (chunk, rest) = bytes.split_at(len);
    *buf = rest;
    Ok(chunk)
}
