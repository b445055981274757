//! Public handle to the reservation MAC.
//!
//! [`CsmaMac::spawn`] starts the arbiter actor and returns a cloneable
//! handle plus the outbound notification stream. Handle methods never
//! block: requests cross to the actor over its mailbox and answers come
//! back over oneshot channels, so callers on any task can submit, cancel,
//! feed activity observations, and query state concurrently while the
//! actor serializes every mutation.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::oneshot;

use crate::arbiter::{Command, MacActor};
use crate::channel_state::ChannelActivity;
use crate::config::MacConfig;
use crate::error::MacError;
use crate::notification::ReservationStatusNtf;
use crate::phy::{ChannelProbe, NeighborDiscovery, NodeAddress};
use crate::request::ReservationRequest;

/// Handle to a running CSMA reservation arbiter.
#[derive(Clone)]
pub struct CsmaMac {
    cmd_tx: mpsc::UnboundedSender<Command>,
    config: MacConfig,
}

impl CsmaMac {
    /// Spawn the arbiter actor on the current tokio runtime.
    ///
    /// Returns the handle and the stream of reservation status
    /// notifications. Neighbor discovery, when provided, runs once before
    /// the first command is processed; a missing probe is warned about
    /// once and carrier sensing then fails open to "idle". The actor
    /// serves reservations for the life of the runtime.
    pub fn spawn(
        config: MacConfig,
        probe: Option<Arc<dyn ChannelProbe>>,
        discovery: Option<Arc<dyn NeighborDiscovery>>,
    ) -> (Self, UnboundedReceiver<ReservationStatusNtf>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ntf_tx, ntf_rx) = mpsc::unbounded_channel();
        let actor = MacActor::new(config.clone(), probe, discovery, cmd_tx.clone(), ntf_tx);
        tokio::spawn(actor.run(cmd_rx));
        (Self { cmd_tx, config }, ntf_rx)
    }

    /// Submit a reservation request.
    ///
    /// `Ok(())` means the request was admitted to the pending queue; a
    /// grant is signalled later by a `Start` notification. Refusals
    /// surface as [`MacError::Refused`] and mutate nothing.
    pub async fn submit(&self, request: ReservationRequest) -> Result<(), MacError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Submit { request, reply })
            .map_err(|_| MacError::Stopped)?;
        rx.await.map_err(|_| MacError::Stopped)??;
        Ok(())
    }

    /// Cancel a reservation by id, or the active reservation when `id` is
    /// `None`. Returns whether anything was cancelled.
    pub async fn cancel(&self, id: Option<&str>) -> Result<bool, MacError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Cancel {
                id: id.map(str::to_owned),
                reply,
            })
            .map_err(|_| MacError::Stopped)?;
        rx.await.map_err(|_| MacError::Stopped)
    }

    /// Feed one transceiver activity observation into the channel
    /// estimate. Fire-and-forget.
    pub fn observe_activity(&self, activity: ChannelActivity) {
        if self.cmd_tx.send(Command::Activity(activity)).is_err() {
            log::debug!("arbiter stopped, activity observation dropped");
        }
    }

    /// Number of requests waiting in the pending queue.
    pub async fn reservations_pending(&self) -> Result<usize, MacError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::PendingCount { reply })
            .map_err(|_| MacError::Stopped)?;
        rx.await.map_err(|_| MacError::Stopped)
    }

    /// Whether the channel is currently busy: a reservation is active, the
    /// local activity estimate has not expired, or the probe reports busy.
    pub async fn channel_busy(&self) -> Result<bool, MacError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ChannelBusy { reply })
            .map_err(|_| MacError::Stopped)?;
        rx.await.map_err(|_| MacError::Stopped)
    }

    /// Neighbors enumerated at startup. Informational only.
    pub async fn neighbors(&self) -> Result<Vec<NodeAddress>, MacError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Neighbors { reply })
            .map_err(|_| MacError::Stopped)?;
        rx.await.map_err(|_| MacError::Stopped)
    }

    /// The configuration this arbiter was spawned with.
    pub fn config(&self) -> &MacConfig {
        &self.config
    }

    /// Longest admissible reservation, in seconds.
    pub fn max_reservation_duration(&self) -> f32 {
        self.config.max_reservation_duration
    }

    /// Advisory reservation duration for callers, in seconds.
    pub fn recommended_reservation_duration(&self) -> f32 {
        self.config.recommended_reservation_duration
    }

    /// Lower backoff clamp, in seconds.
    pub fn min_backoff(&self) -> f32 {
        self.config.min_backoff
    }

    /// Upper backoff clamp, in seconds.
    pub fn max_backoff(&self) -> f32 {
        self.config.max_backoff
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::{self, Instant};

    use crate::error::RefuseReason;
    use crate::notification::ReservationStatus;

    /// Probe that reports busy for the first `busy_rounds` carrier-sense
    /// queries, then idle.
    struct CountingProbe {
        busy_rounds: usize,
        calls: AtomicUsize,
        frame_duration: Option<f32>,
    }

    impl CountingProbe {
        fn new(busy_rounds: usize, frame_duration: Option<f32>) -> Self {
            Self {
                busy_rounds,
                calls: AtomicUsize::new(0),
                frame_duration,
            }
        }
    }

    impl ChannelProbe for CountingProbe {
        fn is_busy(&self) -> Option<bool> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Some(n < self.busy_rounds)
        }
        fn frame_duration(&self) -> Option<f32> {
            self.frame_duration
        }
    }

    struct FixedNeighbors(Vec<NodeAddress>);

    impl NeighborDiscovery for FixedNeighbors {
        fn discover(&self) -> Vec<NodeAddress> {
            self.0.clone()
        }
    }

    fn no_wait_config() -> MacConfig {
        MacConfig {
            min_backoff: 0.0,
            ..MacConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_durations_refused_without_mutation() {
        let (mac, _ntf) = CsmaMac::spawn(MacConfig::default(), None, None);

        for duration in [0.0, -1.0, 60.5] {
            let err = mac
                .submit(ReservationRequest::new(duration))
                .await
                .unwrap_err();
            assert!(matches!(err, MacError::Refused(RefuseReason::BadDuration)));
        }
        assert_eq!(mac.reservations_pending().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_reservations_refused() {
        let (mac, _ntf) = CsmaMac::spawn(MacConfig::default(), None, None);

        let request = ReservationRequest::new(5.0).with_start_time(chrono::Utc::now());
        let err = mac.submit(request).await.unwrap_err();
        assert!(matches!(
            err,
            MacError::Refused(RefuseReason::UnsupportedStartTime)
        ));
        assert_eq!(mac.reservations_pending().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_end_after_duration() {
        let (mac, mut ntf) = CsmaMac::spawn(no_wait_config(), None, None);

        let request = ReservationRequest::new(5.0).with_id("r1");
        mac.submit(request).await.unwrap();

        let start = ntf.recv().await.unwrap();
        assert_eq!(start.request_id, "r1");
        assert_eq!(start.status, ReservationStatus::Start);
        let granted_at = Instant::now();

        let end = ntf.recv().await.unwrap();
        assert_eq!(end.request_id, "r1");
        assert_eq!(end.status, ReservationStatus::End);
        let held = granted_at.elapsed();
        assert!(held >= Duration::from_secs(5), "held only {held:?}");
        assert!(held < Duration::from_millis(5100), "held {held:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_grants_follow_admission_order() {
        let (mac, mut ntf) = CsmaMac::spawn(no_wait_config(), None, None);

        for id in ["a", "b", "c"] {
            mac.submit(ReservationRequest::new(1.0).with_id(id))
                .await
                .unwrap();
        }

        for id in ["a", "b", "c"] {
            let start = ntf.recv().await.unwrap();
            assert_eq!(start.request_id, id);
            assert_eq!(start.status, ReservationStatus::Start);
            let end = ntf.recv().await.unwrap();
            assert_eq!(end.request_id, id);
            assert_eq!(end.status, ReservationStatus::End);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_queued_request_emits_cancel_only() {
        let (mac, mut ntf) = CsmaMac::spawn(MacConfig::default(), None, None);

        // Busy channel keeps the request queued through backoff rounds.
        mac.observe_activity(ChannelActivity::TxStart { duration: None });
        mac.submit(ReservationRequest::new(10.0).with_id("r1"))
            .await
            .unwrap();

        assert!(mac.cancel(Some("r1")).await.unwrap());
        let cancel = ntf.recv().await.unwrap();
        assert_eq!(cancel.request_id, "r1");
        assert_eq!(cancel.status, ReservationStatus::Cancel);
        assert_eq!(mac.reservations_pending().await.unwrap(), 0);

        // No Start may ever surface for a request cancelled while queued.
        time::advance(Duration::from_secs(60)).await;
        assert!(ntf.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_active_emits_cancel_and_frees_slot() {
        let (mac, mut ntf) = CsmaMac::spawn(no_wait_config(), None, None);

        mac.submit(ReservationRequest::new(30.0).with_id("r1"))
            .await
            .unwrap();
        assert_eq!(ntf.recv().await.unwrap().status, ReservationStatus::Start);

        mac.submit(ReservationRequest::new(1.0).with_id("r2"))
            .await
            .unwrap();

        assert!(mac.cancel(Some("r1")).await.unwrap());
        let cancel = ntf.recv().await.unwrap();
        assert_eq!(cancel.request_id, "r1");
        assert_eq!(cancel.status, ReservationStatus::Cancel);

        // The freed slot goes to the next queued request at once.
        let start = ntf.recv().await.unwrap();
        assert_eq!(start.request_id, "r2");
        assert_eq!(start.status, ReservationStatus::Start);
        assert_eq!(ntf.recv().await.unwrap().status, ReservationStatus::End);

        // The cancelled completion timer must never produce an End for r1.
        time::advance(Duration::from_secs(60)).await;
        assert!(ntf.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_id_matches_active() {
        let (mac, mut ntf) = CsmaMac::spawn(no_wait_config(), None, None);

        assert!(!mac.cancel(None).await.unwrap());

        mac.submit(ReservationRequest::new(10.0).with_id("r1"))
            .await
            .unwrap();
        assert_eq!(ntf.recv().await.unwrap().status, ReservationStatus::Start);

        assert!(mac.cancel(None).await.unwrap());
        let cancel = ntf.recv().await.unwrap();
        assert_eq!(cancel.request_id, "r1");
        assert_eq!(cancel.status, ReservationStatus::Cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mismatched_id_with_active_is_not_found() {
        let (mac, mut ntf) = CsmaMac::spawn(no_wait_config(), None, None);

        mac.submit(ReservationRequest::new(30.0).with_id("a"))
            .await
            .unwrap();
        assert_eq!(ntf.recv().await.unwrap().status, ReservationStatus::Start);
        mac.submit(ReservationRequest::new(1.0).with_id("b"))
            .await
            .unwrap();

        // "b" is queued, but while a reservation is active a mismatched id
        // is not-found; the queue is not scanned.
        assert!(!mac.cancel(Some("b")).await.unwrap());
        assert_eq!(mac.reservations_pending().await.unwrap(), 1);
        assert!(ntf.try_recv().is_err());

        // Cancelling the active reservation still works and "b" gets the
        // slot.
        assert!(mac.cancel(Some("a")).await.unwrap());
        assert_eq!(ntf.recv().await.unwrap().status, ReservationStatus::Cancel);
        let start = ntf.recv().await.unwrap();
        assert_eq!(start.request_id, "b");
        assert_eq!(start.status, ReservationStatus::Start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unknown_id_is_not_found() {
        let (mac, mut ntf) = CsmaMac::spawn(MacConfig::default(), None, None);
        assert!(!mac.cancel(Some("ghost")).await.unwrap());
        assert!(ntf.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_ttl_yields_failure_never_start() {
        let (mac, mut ntf) = CsmaMac::spawn(MacConfig::default(), None, None);

        // Channel busy for 2.5 s; the ttl runs out at 0.5 s, so by the
        // time a grant is possible the request is dead.
        mac.observe_activity(ChannelActivity::TxStart {
            duration: Some(Duration::from_secs(2)),
        });
        mac.submit(ReservationRequest::new(5.0).with_id("r1").with_ttl(0.5))
            .await
            .unwrap();

        let ntf_msg = ntf.recv().await.unwrap();
        assert_eq!(ntf_msg.request_id, "r1");
        assert_eq!(ntf_msg.status, ReservationStatus::Failure);

        time::advance(Duration::from_secs(60)).await;
        assert!(ntf.try_recv().is_err());
        assert_eq!(mac.reservations_pending().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_probe_defers_then_grants() {
        let probe = Arc::new(CountingProbe::new(2, Some(0.01)));
        let (mac, mut ntf) = CsmaMac::spawn(no_wait_config(), Some(probe.clone()), None);

        mac.submit(ReservationRequest::new(1.0).with_id("r1"))
            .await
            .unwrap();

        let start = ntf.recv().await.unwrap();
        assert_eq!(start.request_id, "r1");
        assert_eq!(start.status, ReservationStatus::Start);
        assert_eq!(ntf.recv().await.unwrap().status, ReservationStatus::End);

        // Two busy rounds before the grant means at least three
        // carrier-sense queries.
        assert!(probe.calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_busy_reflects_activity_and_active_reservation() {
        let (mac, mut ntf) = CsmaMac::spawn(no_wait_config(), None, None);
        assert!(!mac.channel_busy().await.unwrap());

        mac.observe_activity(ChannelActivity::RxStart {
            duration: Some(Duration::from_millis(100)),
        });
        assert!(mac.channel_busy().await.unwrap());

        time::advance(Duration::from_secs(1)).await;
        assert!(!mac.channel_busy().await.unwrap());

        // A held reservation counts as busy even on a quiet channel.
        mac.submit(ReservationRequest::new(30.0)).await.unwrap();
        assert_eq!(ntf.recv().await.unwrap().status, ReservationStatus::Start);
        assert!(mac.channel_busy().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_neighbor_enumeration_is_retained_but_inert() {
        let discovery = Arc::new(FixedNeighbors(vec![3, 5, 9]));
        let (mac, mut ntf) = CsmaMac::spawn(no_wait_config(), None, Some(discovery));

        assert_eq!(mac.neighbors().await.unwrap(), vec![3, 5, 9]);

        // Arbitration is unaffected by the neighbor set.
        mac.submit(ReservationRequest::new(1.0)).await.unwrap();
        assert_eq!(ntf.recv().await.unwrap().status, ReservationStatus::Start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_surface() {
        let (mac, _ntf) = CsmaMac::spawn(MacConfig::default(), None, None);
        assert_eq!(mac.min_backoff(), 0.5);
        assert_eq!(mac.max_backoff(), 30.0);
        assert_eq!(mac.max_reservation_duration(), 60.0);
        assert_eq!(mac.recommended_reservation_duration(), 15.0);
    }
}
