//! Sync Scheduler - periodic snapshot/delta fan-out to subscribers.
//!
//! Once per tick the scheduler walks every eligible subscriber and decides
//! what it needs:
//!
//! ```text
//!   UNSEEN ──snapshot──▶ SNAPSHOT_SENT ──delta──▶ DELTA_SENT
//!                              │                      │
//!                              └──────▶ IDLE ◀────────┘
//!                                  (cursor == head)
//! ```
//!
//! A tick is a bounded synchronous sweep. Sends are fire-and-forget and a
//! cursor only advances after the transport accepted the frame, so a failed
//! or abandoned tick is simply repeated later. One subscriber failing never
//! stops the pass for the others.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use territory_ledger::{ClaimLedger, DeltaResult};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::SyncConfig;
use crate::cursor::CursorRegistry;
use crate::error::{Error, Result};
use crate::transport::{SubscriberSource, Transport, TransportError};
use crate::wire::SyncMessage;

/// What a subscriber at a given cursor needs next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// Nothing changed since the cursor.
    UpToDate,
    /// Nothing to send, but the cursor should move to this version.
    Realign(u64),
    /// Send this message.
    Message(SyncMessage),
}

/// Counters for one replication pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Sequence number of the tick.
    pub tick: u64,
    /// Eligible subscribers this tick.
    pub subscribers: usize,
    /// Full snapshots delivered.
    pub snapshots: usize,
    /// Deltas delivered.
    pub deltas: usize,
    /// Subscribers that needed nothing.
    pub idle: usize,
    /// Transport failures.
    pub failures: usize,
    /// Payloads that could not be encoded.
    pub encode_errors: usize,
    /// Frames the transport rejected as too large to ever deliver.
    pub oversized: usize,
    /// Subscribers skipped because of failure backoff.
    pub backed_off: usize,
    /// Cursors dropped for subscribers that are no longer eligible.
    pub pruned: usize,
}

enum Outcome {
    Snapshot,
    Delta,
    Idle,
}

/// Replicates a [`ClaimLedger`] to every eligible subscriber.
pub struct SyncScheduler {
    ledger: Arc<ClaimLedger>,
    transport: Arc<dyn Transport>,
    subscribers: Arc<dyn SubscriberSource>,
    cursors: Mutex<CursorRegistry>,
    config: SyncConfig,
    ticks: AtomicU64,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("config", &self.config)
            .field("ticks", &self.ticks.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SyncScheduler {
    pub fn new(
        ledger: Arc<ClaimLedger>,
        transport: Arc<dyn Transport>,
        subscribers: Arc<dyn SubscriberSource>,
        config: SyncConfig,
    ) -> Self {
        Self {
            ledger,
            transport,
            subscribers,
            cursors: Mutex::new(CursorRegistry::new()),
            config,
            ticks: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn cursors(&self) -> MutexGuard<'_, CursorRegistry> {
        self.cursors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last version delivered to `subscriber`.
    pub fn cursor_of(&self, subscriber: &str) -> Option<u64> {
        self.cursors().cursor_of(subscriber)
    }

    /// Make the next tick send `subscriber` a full snapshot.
    pub fn request_snapshot(&self, subscriber: &str) {
        debug!(subscriber, "snapshot requested");
        self.cursors().forget(subscriber);
    }

    /// Decide what a subscriber holding `cursor` needs.
    ///
    /// `None` is a subscriber that was never synchronized.
    pub fn pending_for(&self, cursor: Option<u64>) -> Pending {
        let resolved = match cursor {
            None => DeltaResult::SnapshotRequired {
                new_version: self.ledger.current_version(),
            },
            Some(known) => self.ledger.changes_since(known),
        };

        match resolved {
            DeltaResult::UpToDate => Pending::UpToDate,
            DeltaResult::SnapshotRequired { .. } => {
                Pending::Message(SyncMessage::full(&self.ledger.full_snapshot()))
            }
            DeltaResult::Delta {
                changes,
                new_version,
            } if changes.is_empty() => Pending::Realign(new_version),
            DeltaResult::Delta {
                changes,
                new_version,
            } => Pending::Message(SyncMessage::delta(new_version, &changes)),
        }
    }

    /// Run one replication pass over all eligible subscribers.
    pub fn tick(&self) -> TickStats {
        // Held for the whole pass so two ticks never interleave.
        let mut cursors = self.cursors();
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        let eligible = self.subscribers.eligible();

        let mut stats = TickStats {
            tick,
            subscribers: eligible.len(),
            ..Default::default()
        };

        for subscriber in &eligible {
            if cursors.is_backed_off(subscriber, tick) {
                stats.backed_off += 1;
                continue;
            }

            match self.sync_subscriber(&mut cursors, subscriber) {
                Ok(Outcome::Snapshot) => stats.snapshots += 1,
                Ok(Outcome::Delta) => stats.deltas += 1,
                Ok(Outcome::Idle) => stats.idle += 1,
                Err(Error::Transport(TransportError::TooLarge { len, .. })) => {
                    warn!(
                        subscriber = %subscriber,
                        len,
                        "territory sync frame too large for transport, not retrying with backoff"
                    );
                    stats.oversized += 1;
                }
                Err(Error::Transport(e)) => {
                    let failures =
                        cursors.record_failure(subscriber, tick, self.config.max_backoff_ticks);
                    warn!(subscriber = %subscriber, failures, "territory sync send failed: {}", e);
                    stats.failures += 1;
                }
                Err(e) => {
                    warn!(subscriber = %subscriber, "skipping subscriber this tick: {}", e);
                    stats.encode_errors += 1;
                }
            }
        }

        stats.pruned = cursors.prune_missing(&eligible);
        trace!(?stats, "territory sync tick complete");
        stats
    }

    fn sync_subscriber(&self, cursors: &mut CursorRegistry, subscriber: &str) -> Result<Outcome> {
        let cursor = cursors.cursor_of(subscriber);

        match self.pending_for(cursor) {
            Pending::UpToDate => Ok(Outcome::Idle),
            Pending::Realign(version) => {
                cursors.advance(subscriber, version);
                Ok(Outcome::Idle)
            }
            Pending::Message(message) => {
                let frame = message.encode()?;
                let version = message.version();
                self.transport.send(subscriber, frame)?;

                match message {
                    SyncMessage::Full(payload) => {
                        // A snapshot replaces whatever the subscriber held, even
                        // a cursor from ahead of the ledger.
                        if !cursors.advance(subscriber, version) {
                            cursors.reset(subscriber, version);
                        }
                        debug!(
                            subscriber,
                            version,
                            claims = payload.claims.len(),
                            "pushed territory snapshot"
                        );
                        Ok(Outcome::Snapshot)
                    }
                    SyncMessage::Delta(payload) => {
                        cursors.advance(subscriber, version);
                        debug!(
                            subscriber,
                            version,
                            changes = payload.changes.len(),
                            "pushed territory delta"
                        );
                        Ok(Outcome::Delta)
                    }
                }
            }
        }
    }

    /// Spawn the periodic task on the current tokio runtime.
    ///
    /// The task stops when [`SchedulerHandle::stop`] is called or the handle
    /// is dropped. Shutdown is only observed between ticks.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);

        let task = tokio::spawn(async move {
            info!(
                interval = ?scheduler.config.tick_interval,
                "territory sync scheduler started"
            );

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("territory sync scheduler stopped before first tick");
                    return;
                }
                _ = tokio::time::sleep(scheduler.config.initial_delay) => {}
            }

            let mut interval = tokio::time::interval(scheduler.config.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        let stats = scheduler.tick();
                        if stats.snapshots + stats.deltas + stats.failures > 0 {
                            debug!(
                                tick = stats.tick,
                                snapshots = stats.snapshots,
                                deltas = stats.deltas,
                                failures = stats.failures,
                                "territory sync pass"
                            );
                        }
                    }
                }
            }

            info!("territory sync scheduler stopped");
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running scheduler task.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for the task to finish its current tick.
    pub async fn stop(self) -> std::result::Result<(), JoinError> {
        // Err means the task already exited and dropped its receiver.
        let _ = self.shutdown.send(true);
        self.task.await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::Replica;
    use crate::transport::{ChannelTransport, SubscriberId};
    use bytes::Bytes;
    use std::collections::{BTreeSet, HashSet};
    use std::time::Duration;
    use territory_ledger::{Cell, LedgerConfig};
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Channel transport that can be told to fail for chosen subscribers.
    #[derive(Default)]
    struct FlakyTransport {
        inner: ChannelTransport,
        failing: Mutex<HashSet<String>>,
        attempts: Mutex<Vec<String>>,
        max_frame: Mutex<Option<usize>>,
    }

    impl FlakyTransport {
        fn set_failing(&self, subscriber: &str, failing: bool) {
            let mut set = self.failing.lock().unwrap();
            if failing {
                set.insert(subscriber.to_string());
            } else {
                set.remove(subscriber);
            }
        }

        fn attempts_for(&self, subscriber: &str) -> usize {
            self.attempts
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.as_str() == subscriber)
                .count()
        }
    }

    impl Transport for FlakyTransport {
        fn send(&self, subscriber: &str, frame: Bytes) -> std::result::Result<(), TransportError> {
            self.attempts.lock().unwrap().push(subscriber.to_string());
            if self.failing.lock().unwrap().contains(subscriber) {
                return Err(TransportError::Full(subscriber.to_string()));
            }
            if let Some(max) = *self.max_frame.lock().unwrap() {
                if frame.len() > max {
                    return Err(TransportError::TooLarge {
                        subscriber: subscriber.to_string(),
                        len: frame.len(),
                    });
                }
            }
            self.inner.send(subscriber, frame)
        }
    }

    impl SubscriberSource for FlakyTransport {
        fn eligible(&self) -> BTreeSet<SubscriberId> {
            self.inner.eligible()
        }
    }

    struct Harness {
        ledger: Arc<ClaimLedger>,
        transport: Arc<FlakyTransport>,
        scheduler: Arc<SyncScheduler>,
    }

    fn harness(ledger_config: LedgerConfig, config: SyncConfig) -> Harness {
        harness_for(Arc::new(ClaimLedger::new(ledger_config)), config)
    }

    fn harness_for(ledger: Arc<ClaimLedger>, config: SyncConfig) -> Harness {
        let transport = Arc::new(FlakyTransport::default());
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&ledger),
            transport.clone(),
            transport.clone(),
            config,
        ));
        Harness {
            ledger,
            transport,
            scheduler,
        }
    }

    fn default_harness() -> Harness {
        harness(LedgerConfig::default(), SyncConfig::fast())
    }

    fn world(x: i32, z: i32) -> Cell {
        Cell::new("world", x, z)
    }

    fn drain(rx: &mut UnboundedReceiver<Bytes>) -> Vec<SyncMessage> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(SyncMessage::decode(&frame).unwrap());
        }
        out
    }

    #[test]
    fn new_subscriber_gets_snapshot_then_silence() {
        let h = default_harness();
        h.ledger.claim(world(0, 0), "nationA").unwrap();
        h.ledger.claim(world(0, 1), "nationA").unwrap();
        h.ledger.unclaim(&world(0, 0));

        let mut rx = h.transport.inner.connect("x");
        let stats = h.scheduler.tick();
        assert_eq!(stats.snapshots, 1);

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            SyncMessage::Full(payload) => {
                assert_eq!(payload.version, 3);
                assert_eq!(payload.claims.len(), 1);
                assert_eq!(payload.claims[0].cell, world(0, 1));
                assert_eq!(payload.claims[0].owner, "nationA");
            }
            other => panic!("expected full, got {other:?}"),
        }
        assert_eq!(h.scheduler.cursor_of("x"), Some(3));

        let stats = h.scheduler.tick();
        assert_eq!(stats.idle, 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn empty_ledger_snapshot_sets_cursor_to_zero() {
        let h = default_harness();
        let mut rx = h.transport.inner.connect("x");
        h.scheduler.tick();
        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(h.scheduler.cursor_of("x"), Some(0));

        h.ledger.claim(world(1, 1), "a").unwrap();
        h.scheduler.tick();
        let messages = drain(&mut rx);
        assert!(matches!(&messages[..], [SyncMessage::Delta(p)] if p.version == 1));
    }

    #[test]
    fn caught_up_subscriber_receives_delta() {
        let h = default_harness();
        let mut rx = h.transport.inner.connect("x");
        h.ledger.claim(world(0, 0), "a").unwrap();
        h.scheduler.tick();
        drain(&mut rx);

        h.ledger.claim(world(5, 5), "b").unwrap();
        h.ledger.unclaim(&world(5, 5));
        let stats = h.scheduler.tick();
        assert_eq!(stats.deltas, 1);

        match &drain(&mut rx)[..] {
            [SyncMessage::Delta(payload)] => {
                assert_eq!(payload.version, 3);
                assert_eq!(payload.changes.len(), 2);
                assert_eq!(payload.changes[1].op, territory_ledger::ChangeOp::Unclaim);
            }
            other => panic!("expected one delta, got {other:?}"),
        }
        assert_eq!(h.scheduler.cursor_of("x"), Some(3));
    }

    #[test]
    fn lagging_beyond_retention_gets_snapshot() {
        let h = harness(
            LedgerConfig::default().with_log_capacity(2),
            SyncConfig::fast().without_backoff(),
        );
        let mut rx = h.transport.inner.connect("x");
        h.ledger.claim(world(0, 0), "a").unwrap();
        h.scheduler.tick();
        assert_eq!(h.scheduler.cursor_of("x"), Some(1));
        drain(&mut rx);

        // x can not receive while four more mutations happen
        h.transport.set_failing("x", true);
        for i in 1..5 {
            h.ledger.claim(world(i, 0), "a").unwrap();
            h.scheduler.tick();
        }
        assert_eq!(h.scheduler.cursor_of("x"), Some(1));

        h.transport.set_failing("x", false);
        let stats = h.scheduler.tick();
        assert_eq!(stats.snapshots, 1);
        assert!(matches!(&drain(&mut rx)[..], [SyncMessage::Full(p)] if p.version == 5));
        assert_eq!(h.scheduler.cursor_of("x"), Some(5));
    }

    #[test]
    fn failed_send_is_retried_next_tick() {
        let h = default_harness();
        let mut rx = h.transport.inner.connect("y");
        h.ledger.claim(world(0, 0), "a").unwrap();
        h.transport.set_failing("y", true);

        let stats = h.scheduler.tick();
        assert_eq!(stats.failures, 1);
        assert_eq!(h.scheduler.cursor_of("y"), None);

        h.ledger.claim(world(0, 1), "a").unwrap();
        h.transport.set_failing("y", false);
        let stats = h.scheduler.tick();
        assert_eq!(stats.snapshots, 1);
        assert_eq!(h.transport.attempts_for("y"), 2);
        assert!(matches!(&drain(&mut rx)[..], [SyncMessage::Full(p)] if p.version == 2));
    }

    #[test]
    fn one_failing_subscriber_does_not_block_others() {
        let h = default_harness();
        let _bad = h.transport.inner.connect("bad");
        let mut good = h.transport.inner.connect("good");
        h.transport.set_failing("bad", true);
        h.ledger.claim(world(0, 0), "a").unwrap();

        let stats = h.scheduler.tick();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.snapshots, 1);
        assert_eq!(drain(&mut good).len(), 1);
        assert_eq!(h.scheduler.cursor_of("good"), Some(1));
    }

    #[test]
    fn repeated_failures_back_off() {
        let h = harness(
            LedgerConfig::default(),
            SyncConfig::fast().with_max_backoff_ticks(4),
        );
        let _rx = h.transport.inner.connect("y");
        h.transport.set_failing("y", true);

        // attempts on ticks 0, 1, 3, 7, 11
        let mut backed_off = 0;
        for _ in 0..12 {
            backed_off += h.scheduler.tick().backed_off;
        }
        assert_eq!(h.transport.attempts_for("y"), 5);
        assert_eq!(backed_off, 7);
    }

    #[test]
    fn oversized_frame_is_reported_without_backoff() {
        let h = default_harness();
        let mut rx = h.transport.inner.connect("x");
        for x in 0..50 {
            h.ledger.claim(world(x, 0), "a").unwrap();
        }
        *h.transport.max_frame.lock().unwrap() = Some(100);

        for _ in 0..3 {
            let stats = h.scheduler.tick();
            assert_eq!(stats.oversized, 1);
            assert_eq!(stats.failures, 0);
            assert_eq!(stats.backed_off, 0);
        }
        assert_eq!(h.transport.attempts_for("x"), 3);
        assert_eq!(h.scheduler.cursor_of("x"), None);

        *h.transport.max_frame.lock().unwrap() = None;
        assert_eq!(h.scheduler.tick().snapshots, 1);
        assert!(matches!(&drain(&mut rx)[..], [SyncMessage::Full(p)] if p.claims.len() == 50));
    }

    #[test]
    fn disconnected_subscribers_are_pruned() {
        let h = default_harness();
        let rx = h.transport.inner.connect("x");
        h.scheduler.tick();
        assert_eq!(h.scheduler.cursor_of("x"), Some(0));

        drop(rx);
        let stats = h.scheduler.tick();
        assert_eq!(stats.pruned, 1);
        assert_eq!(h.scheduler.cursor_of("x"), None);
    }

    #[test]
    fn reconnect_starts_from_snapshot() {
        let h = default_harness();
        let rx = h.transport.inner.connect("x");
        h.ledger.claim(world(0, 0), "a").unwrap();
        h.scheduler.tick();
        drop(rx);
        h.scheduler.tick();

        let mut rx = h.transport.inner.connect("x");
        h.scheduler.tick();
        assert!(matches!(&drain(&mut rx)[..], [SyncMessage::Full(_)]));
    }

    #[test]
    fn requested_snapshot_is_sent_next_tick() {
        let h = default_harness();
        let mut rx = h.transport.inner.connect("x");
        h.ledger.claim(world(0, 0), "a").unwrap();
        h.scheduler.tick();
        drain(&mut rx);

        h.scheduler.request_snapshot("x");
        let stats = h.scheduler.tick();
        assert_eq!(stats.snapshots, 1);
        assert!(matches!(&drain(&mut rx)[..], [SyncMessage::Full(p)] if p.version == 1));
    }

    #[test]
    fn pending_for_covers_every_case() {
        let h = default_harness();
        assert!(matches!(h.scheduler.pending_for(None), Pending::Message(SyncMessage::Full(_))));
        assert_eq!(h.scheduler.pending_for(Some(0)), Pending::UpToDate);

        h.ledger.claim(world(0, 0), "a").unwrap();
        assert!(matches!(
            h.scheduler.pending_for(Some(0)),
            Pending::Message(SyncMessage::Delta(_))
        ));
        // a cursor from ahead of the ledger can not be trusted
        assert!(matches!(
            h.scheduler.pending_for(Some(10)),
            Pending::Message(SyncMessage::Full(_))
        ));
    }

    #[test]
    fn replicas_converge_with_ledger() {
        let h = harness(
            LedgerConfig::default().with_log_capacity(3),
            SyncConfig::fast(),
        );
        let mut early = h.transport.inner.connect("early");
        let mut early_replica = Replica::new();
        let mut late_replica = Replica::new();

        for round in 0..6 {
            h.ledger.claim(world(round, 0), format!("n{}", round % 2)).unwrap();
            h.ledger.claim(world(round, 1), "n2").unwrap();
            if round % 2 == 1 {
                h.ledger.unclaim(&world(round - 1, 1));
            }
            h.scheduler.tick();
            while let Ok(frame) = early.try_recv() {
                early_replica.apply_frame(&frame).unwrap();
            }
        }

        let mut late = h.transport.inner.connect("late");
        h.scheduler.tick();
        while let Ok(frame) = late.try_recv() {
            late_replica.apply_frame(&frame).unwrap();
        }

        let expected = h.ledger.all_claims();
        assert_eq!(early_replica.claims(), &expected);
        assert_eq!(late_replica.claims(), &expected);
        assert_eq!(early_replica.version(), Some(h.ledger.current_version()));
    }

    #[test]
    fn replica_follows_node_restored_to_older_version() {
        let before = default_harness();
        let mut rx = before.transport.inner.connect("viewer");
        for x in 0..3 {
            before.ledger.claim(world(x, 0), "a").unwrap();
        }
        before.scheduler.tick();

        let mut replica = Replica::new();
        while let Ok(frame) = rx.try_recv() {
            replica.apply_frame(&frame).unwrap();
        }
        assert_eq!(replica.version(), Some(3));

        // restart: persisted state is older than what the viewer saw
        let restored = Arc::new(ClaimLedger::restore(
            LedgerConfig::default(),
            1,
            [(world(7, 7), "c".to_string())],
        ));
        let after = harness_for(Arc::clone(&restored), SyncConfig::fast());
        let mut rx = after.transport.inner.connect("viewer");

        after.scheduler.tick();
        restored.claim(world(8, 8), "c").unwrap();
        restored.claim(world(9, 9), "b").unwrap();
        after.scheduler.tick();

        let accepted: Vec<bool> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|frame| replica.apply_frame(&frame).unwrap())
            .collect();
        assert_eq!(accepted, vec![true, true]);
        assert_eq!(replica.claims(), &restored.all_claims());
        assert_eq!(replica.version(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_task_pushes_until_stopped() {
        let h = default_harness();
        let mut rx = h.transport.inner.connect("x");
        h.ledger.claim(world(0, 0), "a").unwrap();

        let handle = h.scheduler.start();
        let frame = rx.recv().await.unwrap();
        assert!(matches!(SyncMessage::decode(&frame).unwrap(), SyncMessage::Full(_)));

        h.ledger.claim(world(0, 1), "a").unwrap();
        let frame = rx.recv().await.unwrap();
        assert!(matches!(SyncMessage::decode(&frame).unwrap(), SyncMessage::Delta(_)));

        tokio_test::assert_ok!(handle.stop().await);
        h.ledger.claim(world(0, 2), "a").unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(h.scheduler.cursor_of("x"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_tick_sends_nothing() {
        let h = harness(
            LedgerConfig::default(),
            SyncConfig::fast().with_initial_delay(Duration::from_secs(60)),
        );
        let mut rx = h.transport.inner.connect("x");

        let handle = h.scheduler.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop().await.unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(h.scheduler.cursor_of("x"), None);
    }
}
