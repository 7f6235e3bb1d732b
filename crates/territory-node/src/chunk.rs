//! Datagram chunking for sync frames.
//!
//! A snapshot frame can be far larger than one UDP datagram, so every frame
//! is split into chunks and each chunk travels in its own datagram behind a
//! fixed header.
//!
//! Chunk header: 8 bytes
//! - frame: 4 bytes (u32 BE), per-endpoint frame sequence number, wraps
//! - index: 2 bytes (u16 BE), position of this chunk
//! - count: 2 bytes (u16 BE), chunks in the frame
//!
//! Frames that fit in one chunk are sent with `count == 1`. A viewer
//! reassembles with [`FrameAssembler`]; a frame missing any chunk is dropped
//! and the scheduler's next snapshot or delta supersedes it.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the chunk header in bytes.
pub const CHUNK_HEADER_LEN: usize = 8;

/// Default chunk body size (fits a typical path MTU).
pub const DEFAULT_CHUNK_PAYLOAD: usize = 1200;

/// Largest chunk body that still fits a UDP datagram with its header.
pub const MAX_CHUNK_PAYLOAD: usize = 65_507 - CHUNK_HEADER_LEN;

/// Partially received frames kept before the oldest is discarded.
const MAX_PENDING_FRAMES: usize = 4;

/// A frame needs more chunks than the header can number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("frame of {len} bytes needs more than {max_chunks} chunks of {chunk_payload} bytes")]
pub struct FrameTooLarge {
    pub len: usize,
    pub chunk_payload: usize,
    pub max_chunks: usize,
}

/// Split `frame` into chunk datagrams tagged with `frame_id`.
pub fn split_frame(
    frame_id: u32,
    frame: &Bytes,
    chunk_payload: usize,
) -> Result<Vec<Bytes>, FrameTooLarge> {
    let chunk_payload = chunk_payload.clamp(1, MAX_CHUNK_PAYLOAD);
    let count = frame.len().div_ceil(chunk_payload).max(1);
    let count = u16::try_from(count).map_err(|_| FrameTooLarge {
        len: frame.len(),
        chunk_payload,
        max_chunks: u16::MAX as usize,
    })?;

    let chunks = (0..count)
        .map(|index| {
            let start = index as usize * chunk_payload;
            let end = (start + chunk_payload).min(frame.len());
            let mut buf = BytesMut::with_capacity(CHUNK_HEADER_LEN + end - start);
            buf.put_u32(frame_id);
            buf.put_u16(index);
            buf.put_u16(count);
            buf.put_slice(&frame[start..end]);
            buf.freeze()
        })
        .collect();
    Ok(chunks)
}

#[derive(Debug)]
struct PartialFrame {
    chunks: Vec<Option<Bytes>>,
    received: usize,
}

/// Viewer-side reassembly of chunked frames.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    pending: BTreeMap<u32, PartialFrame>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one chunk datagram. Returns the frame once every chunk arrived.
    ///
    /// Malformed datagrams and duplicate chunks are ignored.
    pub fn push(&mut self, datagram: &[u8]) -> Option<Bytes> {
        if datagram.len() < CHUNK_HEADER_LEN {
            return None;
        }
        let mut header = &datagram[..CHUNK_HEADER_LEN];
        let frame_id = header.get_u32();
        let index = header.get_u16() as usize;
        let count = header.get_u16() as usize;
        if count == 0 || index >= count {
            return None;
        }
        let body = Bytes::copy_from_slice(&datagram[CHUNK_HEADER_LEN..]);

        if count == 1 {
            self.pending.remove(&frame_id);
            return Some(body);
        }

        let partial = self.pending.entry(frame_id).or_insert_with(|| PartialFrame {
            chunks: vec![None; count],
            received: 0,
        });
        if partial.chunks.len() != count {
            return None;
        }
        if partial.chunks[index].is_none() {
            partial.chunks[index] = Some(body);
            partial.received += 1;
        }

        if partial.received == count {
            let partial = self.pending.remove(&frame_id)?;
            let mut frame = BytesMut::new();
            for chunk in partial.chunks.into_iter().flatten() {
                frame.put_slice(&chunk);
            }
            return Some(frame.freeze());
        }

        while self.pending.len() > MAX_PENDING_FRAMES {
            self.pending.pop_first();
        }
        None
    }

    /// Frames with some but not all chunks received.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(len: usize) -> Bytes {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    #[test]
    fn small_frame_is_one_chunk() {
        let chunks = split_frame(7, &frame(10), 1200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), CHUNK_HEADER_LEN + 10);
        assert_eq!(&chunks[0][..CHUNK_HEADER_LEN], &[0, 0, 0, 7, 0, 0, 0, 1]);

        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(&chunks[0]), Some(frame(10)));
    }

    #[test]
    fn large_frame_reassembles_out_of_order() {
        let original = frame(5000);
        let mut chunks = split_frame(1, &original, 1200).unwrap();
        assert_eq!(chunks.len(), 5);
        chunks.reverse();

        let mut assembler = FrameAssembler::new();
        let mut out = None;
        for chunk in &chunks {
            out = assembler.push(chunk);
        }
        assert_eq!(out, Some(original));
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn duplicates_and_garbage_are_ignored() {
        let chunks = split_frame(3, &frame(300), 100).unwrap();
        let mut assembler = FrameAssembler::new();

        assert_eq!(assembler.push(&chunks[0]), None);
        assert_eq!(assembler.push(&chunks[0]), None);
        assert_eq!(assembler.push(b"short"), None);
        assert_eq!(assembler.push(&[0, 0, 0, 3, 0, 5, 0, 3]), None);
        assert_eq!(assembler.push(&chunks[1]), None);
        assert_eq!(assembler.push(&chunks[2]), Some(frame(300)));
    }

    #[test]
    fn incomplete_frames_are_bounded() {
        let mut assembler = FrameAssembler::new();
        for id in 0..10 {
            let chunks = split_frame(id, &frame(200), 100).unwrap();
            assembler.push(&chunks[0]);
        }
        assert_eq!(assembler.pending(), MAX_PENDING_FRAMES);

        // the newest frames are still completable
        let chunks = split_frame(9, &frame(200), 100).unwrap();
        assert_eq!(assembler.push(&chunks[1]), Some(frame(200)));
    }

    #[test]
    fn too_many_chunks_is_rejected() {
        let err = split_frame(0, &frame(70_000), 1).unwrap_err();
        assert_eq!(err.max_chunks, u16::MAX as usize);
        assert_eq!(err.len, 70_000);
    }
}
