//! UDP viewer endpoint.
//!
//! Viewers talk to the node with plain-text datagrams:
//!
//! - `hello <viewer-id>` registers (or refreshes) the viewer at the sender's
//!   address
//! - `snapshot <viewer-id>` asks for a fresh full snapshot on the next tick
//!   (and refreshes the viewer like `hello`)
//! - `bye <viewer-id>` unregisters it
//!
//! A viewer stays eligible for replication while it has been heard from
//! within the configured timeout, so viewers are expected to repeat `hello`
//! as a keepalive. Sync frames are sent back to the registered address split
//! into chunk datagrams (see [`crate::chunk`]).

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use territory_sync::{SubscriberId, SubscriberSource, SyncScheduler, Transport, TransportError};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::chunk::{split_frame, DEFAULT_CHUNK_PAYLOAD, MAX_CHUNK_PAYLOAD};

/// Largest viewer id accepted in a datagram.
const MAX_VIEWER_ID_LEN: usize = 64;

/// A control datagram from a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerDatagram {
    Hello(SubscriberId),
    Snapshot(SubscriberId),
    Bye(SubscriberId),
}

impl ViewerDatagram {
    /// Parse a control datagram. Returns `None` for anything malformed.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(data).ok()?.trim();
        let (verb, id) = text.split_once(char::is_whitespace)?;
        let id = id.trim();
        if id.is_empty() || id.len() > MAX_VIEWER_ID_LEN || id.contains(char::is_whitespace) {
            return None;
        }
        match verb {
            "hello" => Some(Self::Hello(id.to_string())),
            "snapshot" => Some(Self::Snapshot(id.to_string())),
            "bye" => Some(Self::Bye(id.to_string())),
            _ => None,
        }
    }
}

/// What a datagram did to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// A viewer that was not registered, or registered elsewhere, said hello.
    Joined(SubscriberId),
    /// A registered viewer repeated hello from the same address.
    Refreshed(SubscriberId),
    /// A viewer asked for a full snapshot.
    SnapshotRequested(SubscriberId),
    /// A viewer said bye.
    Left(SubscriberId),
}

#[derive(Debug, Clone, Copy)]
struct Viewer {
    addr: SocketAddr,
    last_seen: Instant,
}

/// Known viewers and when each was last heard from.
#[derive(Debug)]
pub struct ViewerRegistry {
    viewers: Mutex<HashMap<SubscriberId, Viewer>>,
    timeout: Duration,
}

impl ViewerRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            viewers: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn viewers(&self) -> MutexGuard<'_, HashMap<SubscriberId, Viewer>> {
        self.viewers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a control datagram received from `from` at `now`.
    pub fn handle(&self, datagram: ViewerDatagram, from: SocketAddr, now: Instant) -> ViewerEvent {
        let mut viewers = self.viewers();
        let fresh = Viewer {
            addr: from,
            last_seen: now,
        };
        match datagram {
            ViewerDatagram::Hello(id) => match viewers.insert(id.clone(), fresh) {
                Some(previous)
                    if previous.addr == from
                        && now.saturating_duration_since(previous.last_seen) <= self.timeout =>
                {
                    ViewerEvent::Refreshed(id)
                }
                _ => ViewerEvent::Joined(id),
            },
            ViewerDatagram::Snapshot(id) => {
                viewers.insert(id.clone(), fresh);
                ViewerEvent::SnapshotRequested(id)
            }
            ViewerDatagram::Bye(id) => {
                viewers.remove(&id);
                ViewerEvent::Left(id)
            }
        }
    }

    /// Address of a viewer that is still within its timeout.
    pub fn addr_of(&self, id: &str, now: Instant) -> Option<SocketAddr> {
        self.viewers()
            .get(id)
            .filter(|v| now.saturating_duration_since(v.last_seen) <= self.timeout)
            .map(|v| v.addr)
    }

    /// Viewers heard from within the timeout. Expired entries are dropped.
    pub fn eligible_at(&self, now: Instant) -> BTreeSet<SubscriberId> {
        let mut viewers = self.viewers();
        let before = viewers.len();
        viewers.retain(|_, v| now.saturating_duration_since(v.last_seen) <= self.timeout);
        let expired = before - viewers.len();
        if expired > 0 {
            debug!(expired, "expired silent viewers");
        }
        viewers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.viewers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Act on a viewer event: joining or asking viewers get a full snapshot on
/// the next tick.
pub fn dispatch(event: &ViewerEvent, scheduler: &SyncScheduler) {
    match event {
        ViewerEvent::Joined(id) => {
            info!(viewer = %id, "viewer joined");
            scheduler.request_snapshot(id);
        }
        ViewerEvent::SnapshotRequested(id) => {
            debug!(viewer = %id, "viewer asked for snapshot");
            scheduler.request_snapshot(id);
        }
        ViewerEvent::Left(id) => {
            info!(viewer = %id, "viewer left");
        }
        ViewerEvent::Refreshed(_) => {}
    }
}

/// Viewer endpoint: a UDP socket plus the registry of who listens on it.
pub struct UdpViewers {
    socket: UdpSocket,
    registry: ViewerRegistry,
    chunk_payload: usize,
    next_frame: AtomicU32,
}

impl UdpViewers {
    /// Bind to the given address with configured buffer sizes
    pub async fn bind(
        addr: SocketAddr,
        sndbuf: usize,
        rcvbuf: usize,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        // Buffer sizes must be set before binding
        socket.set_send_buffer_size(sndbuf)?;
        socket.set_recv_buffer_size(rcvbuf)?;
        socket.set_reuse_address(true)?;

        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;

        info!(
            addr = %socket.local_addr()?,
            sndbuf,
            rcvbuf,
            "viewer endpoint bound"
        );

        Ok(Self {
            socket,
            registry: ViewerRegistry::new(timeout),
            chunk_payload: DEFAULT_CHUNK_PAYLOAD,
            next_frame: AtomicU32::new(0),
        })
    }

    /// Set the chunk body size for outgoing frames.
    #[must_use]
    pub fn with_chunk_payload(mut self, bytes: usize) -> Self {
        self.chunk_payload = bytes.clamp(1, MAX_CHUNK_PAYLOAD);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn registry(&self) -> &ViewerRegistry {
        &self.registry
    }

    /// Receive and apply one control datagram.
    ///
    /// Returns `Ok(None)` when the datagram was not a valid control message.
    pub async fn recv_one(&self, buf: &mut [u8]) -> io::Result<Option<ViewerEvent>> {
        let (len, from) = self.socket.recv_from(buf).await?;
        let Some(datagram) = ViewerDatagram::parse(&buf[..len]) else {
            debug!(%from, len, "ignoring malformed viewer datagram");
            return Ok(None);
        };
        Ok(Some(self.registry.handle(datagram, from, Instant::now())))
    }

    /// Serve control datagrams until `shutdown` fires.
    pub async fn serve(&self, scheduler: Arc<SyncScheduler>, mut shutdown: watch::Receiver<bool>) {
        let mut buf = vec![0u8; 512];
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                received = self.recv_one(&mut buf) => match received {
                    Ok(Some(event)) => dispatch(&event, &scheduler),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "viewer socket receive error");
                    }
                },
            }
        }
        debug!("viewer endpoint stopped");
    }
}

impl Transport for UdpViewers {
    fn send(&self, subscriber: &str, frame: Bytes) -> Result<(), TransportError> {
        let addr = self
            .registry
            .addr_of(subscriber, Instant::now())
            .ok_or_else(|| TransportError::Disconnected(subscriber.to_string()))?;

        let frame_id = self.next_frame.fetch_add(1, Ordering::Relaxed);
        let chunks = split_frame(frame_id, &frame, self.chunk_payload).map_err(|e| {
            debug!(subscriber, error = %e, "frame can not be chunked");
            TransportError::TooLarge {
                subscriber: subscriber.to_string(),
                len: frame.len(),
            }
        })?;

        for chunk in &chunks {
            match self.socket.try_send_to(chunk, addr) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(TransportError::Full(subscriber.to_string()));
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
        Ok(())
    }
}

impl SubscriberSource for UdpViewers {
    fn eligible(&self) -> BTreeSet<SubscriberId> {
        self.registry.eligible_at(Instant::now())
    }
}
