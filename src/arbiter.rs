//! The reservation arbiter actor.
//!
//! All mutable MAC state — the pending queue, the channel estimate, the
//! backoff counter, and the single active reservation — lives inside one
//! task driven by an unbounded mailbox. Inbound requests, cancellations,
//! activity observations, queries, and timer fires are commands handled
//! strictly one at a time, which is the whole concurrency story: no locks,
//! no overlapping handlers, no blocking waits. Delays are expressed as
//! [`ScheduledTimer`]s that post generation-stamped commands back into the
//! same mailbox.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::backoff::BackoffScheduler;
use crate::channel_state::{ChannelActivity, ChannelStateTracker};
use crate::config::MacConfig;
use crate::error::RefuseReason;
use crate::notification::{ReservationStatus, ReservationStatusNtf};
use crate::phy::{ChannelProbe, NeighborDiscovery, NodeAddress};
use crate::queue::RequestQueue;
use crate::request::{QueuedRequest, ReservationRequest};
use crate::timer::ScheduledTimer;

// ---------------------------------------------------------------------------
// Mailbox commands
// ---------------------------------------------------------------------------

/// Commands accepted by the arbiter mailbox.
#[derive(Debug)]
pub(crate) enum Command {
    /// Submit a reservation request for admission.
    Submit {
        request: ReservationRequest,
        reply: oneshot::Sender<Result<(), RefuseReason>>,
    },
    /// Cancel a queued or active reservation. An absent id matches the
    /// active reservation, if any.
    Cancel {
        id: Option<String>,
        reply: oneshot::Sender<bool>,
    },
    /// An observation from the transceiver's activity feed.
    Activity(ChannelActivity),
    /// The backoff timer fired.
    BackoffElapsed { generation: u64 },
    /// The active reservation's completion timer fired.
    ReservationElapsed { generation: u64 },
    /// How many requests are pending in the queue.
    PendingCount { reply: oneshot::Sender<usize> },
    /// Whether the channel is busy (reservation active, or carrier sensed).
    ChannelBusy { reply: oneshot::Sender<bool> },
    /// Neighbors enumerated at startup.
    Neighbors {
        reply: oneshot::Sender<Vec<NodeAddress>>,
    },
}

// ---------------------------------------------------------------------------
// Grant cycle state
// ---------------------------------------------------------------------------

/// Where the arbiter is in its grant cycle.
///
/// `kick` is a no-op outside `Idle`, which makes it safe to invoke from
/// every place that might have created work: a fresh admission, a
/// completed reservation, and a cancellation can all race to trigger the
/// next cycle without ever starting two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrantPhase {
    /// No grant cycle running.
    Idle,
    /// A backoff timer is armed; evaluation happens when it fires.
    AwaitingBackoff,
    /// A grant was committed; the slot is held until completion or cancel.
    Granting,
}

/// The single in-flight granted reservation.
#[derive(Debug)]
struct ActiveReservation {
    request: ReservationRequest,
    granted_at: Instant,
    timer: ScheduledTimer,
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

pub(crate) struct MacActor {
    config: MacConfig,
    probe: Option<Arc<dyn ChannelProbe>>,
    discovery: Option<Arc<dyn NeighborDiscovery>>,
    neighbors: Vec<NodeAddress>,

    queue: RequestQueue,
    tracker: ChannelStateTracker,
    backoff: BackoffScheduler,

    phase: GrantPhase,
    active: Option<ActiveReservation>,

    backoff_generation: u64,
    completion_generation: u64,

    cmd_tx: UnboundedSender<Command>,
    ntf_tx: UnboundedSender<ReservationStatusNtf>,
}

impl MacActor {
    pub(crate) fn new(
        config: MacConfig,
        probe: Option<Arc<dyn ChannelProbe>>,
        discovery: Option<Arc<dyn NeighborDiscovery>>,
        cmd_tx: UnboundedSender<Command>,
        ntf_tx: UnboundedSender<ReservationStatusNtf>,
    ) -> Self {
        let tracker = ChannelStateTracker::new(&config);
        let backoff = BackoffScheduler::new(&config);
        Self {
            config,
            probe,
            discovery,
            neighbors: Vec::new(),
            queue: RequestQueue::new(),
            tracker,
            backoff,
            phase: GrantPhase::Idle,
            active: None,
            backoff_generation: 0,
            completion_generation: 0,
            cmd_tx,
            ntf_tx,
        }
    }

    /// Drive the mailbox. The actor keeps a sender for its own timers, so
    /// the loop runs until the owning runtime shuts down.
    pub(crate) async fn run(mut self, mut rx: UnboundedReceiver<Command>) {
        self.startup();
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        log::debug!("MAC arbiter mailbox closed, stopping");
    }

    /// Startup-only collaborator calls: the missing-probe warning and the
    /// neighbor enumeration. Neighbor addresses are logged and retained
    /// for inspection; arbitration never reads them.
    fn startup(&mut self) {
        if self.probe.is_none() {
            log::warn!("no channel probe configured, carrier sensing disabled");
        }
        if let Some(discovery) = &self.discovery {
            self.neighbors = discovery.discover();
            log::info!(
                "discovered {} neighbors: {:?}",
                self.neighbors.len(),
                self.neighbors
            );
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Submit { request, reply } => {
                let _ = reply.send(self.submit(request));
            }
            Command::Cancel { id, reply } => {
                let _ = reply.send(self.cancel(id));
            }
            Command::Activity(activity) => self.tracker.observe(activity),
            Command::BackoffElapsed { generation } => self.on_backoff_elapsed(generation),
            Command::ReservationElapsed { generation } => self.on_reservation_elapsed(generation),
            Command::PendingCount { reply } => {
                let _ = reply.send(self.queue.len());
            }
            Command::ChannelBusy { reply } => {
                let _ = reply.send(self.channel_busy());
            }
            Command::Neighbors { reply } => {
                let _ = reply.send(self.neighbors.clone());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    /// Validate and enqueue a request; refusals leave all state untouched.
    fn submit(&mut self, request: ReservationRequest) -> Result<(), RefuseReason> {
        if request.start_time.is_some() {
            return Err(RefuseReason::UnsupportedStartTime);
        }
        if !(request.duration > 0.0 && request.duration <= self.config.max_reservation_duration) {
            return Err(RefuseReason::BadDuration);
        }
        if self.queue.contains_id(&request.id)
            || self
                .active
                .as_ref()
                .is_some_and(|a| a.request.id == request.id)
        {
            return Err(RefuseReason::DuplicateId);
        }

        // Rebase the relative ttl onto the monotonic clock. A non-finite
        // ttl means no deadline; a non-positive one is already due.
        let deadline = request.ttl.filter(|t| t.is_finite()).map(|t| {
            let now = Instant::now();
            if t <= 0.0 {
                now
            } else {
                now + Duration::from_secs_f32(t)
            }
        });

        log::debug!("reservation request {} queued", request.id);
        self.queue.push(QueuedRequest { request, deadline });
        self.kick();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Grant cycle
    // -----------------------------------------------------------------------

    /// Start a grant cycle if none is running.
    ///
    /// With an empty window the evaluation happens right here in the same
    /// handler execution; otherwise a backoff timer is armed and the
    /// evaluation waits for its fire.
    fn kick(&mut self) {
        if self.phase != GrantPhase::Idle || self.queue.is_empty() {
            return;
        }
        let delay = self.backoff.next_delay(self.frame_duration());
        if delay.is_zero() {
            self.phase = GrantPhase::Granting;
            self.evaluate_grant();
        } else {
            self.arm_backoff(delay);
        }
    }

    /// Arm the backoff timer under a fresh generation.
    fn arm_backoff(&mut self, delay: Duration) {
        self.backoff_generation += 1;
        let _timer = ScheduledTimer::arm(
            delay,
            self.cmd_tx.clone(),
            Command::BackoffElapsed {
                generation: self.backoff_generation,
            },
        );
        self.phase = GrantPhase::AwaitingBackoff;
    }

    fn on_backoff_elapsed(&mut self, generation: u64) {
        if self.phase != GrantPhase::AwaitingBackoff || generation != self.backoff_generation {
            return;
        }
        self.phase = GrantPhase::Granting;
        self.evaluate_grant();
    }

    /// One grant evaluation: drop out if the queue drained, retry with a
    /// wider window if the channel is busy, fail expired heads in place,
    /// or commit the grant.
    fn evaluate_grant(&mut self) {
        if self.queue.is_empty() {
            self.phase = GrantPhase::Idle;
            return;
        }

        if self.tracker.is_busy(self.probe.as_deref()) {
            self.backoff.note_busy();
            log::debug!("carrier sense busy: {}", self.backoff.consecutive_busy());
            // The retry is always a timer fire, never a nested call here;
            // a zero window still takes the mailbox hop.
            let delay = self.backoff.next_delay(self.frame_duration());
            self.arm_backoff(delay);
            return;
        }

        self.backoff.reset();
        while let Some(entry) = self.queue.pop_front() {
            if entry.expired(Instant::now()) {
                log::debug!("reservation request {} ttl expired", entry.request.id);
                self.notify(&entry.request.id, ReservationStatus::Failure);
                continue;
            }
            self.grant(entry.request);
            return;
        }
        self.phase = GrantPhase::Idle;
    }

    // -----------------------------------------------------------------------
    // Active reservation
    // -----------------------------------------------------------------------

    /// Commit a grant: emit `Start` and arm the completion timer for
    /// `ceil(duration * 1000)` milliseconds. The grant cycle stays out of
    /// the loop until completion or cancellation re-kicks it.
    fn grant(&mut self, request: ReservationRequest) {
        log::debug!("reservation request {} granted", request.id);
        self.notify(&request.id, ReservationStatus::Start);

        self.completion_generation += 1;
        let hold = Duration::from_millis((f64::from(request.duration) * 1000.0).ceil() as u64);
        let timer = ScheduledTimer::arm(
            hold,
            self.cmd_tx.clone(),
            Command::ReservationElapsed {
                generation: self.completion_generation,
            },
        );
        self.active = Some(ActiveReservation {
            request,
            granted_at: Instant::now(),
            timer,
        });
    }

    fn on_reservation_elapsed(&mut self, generation: u64) {
        if generation != self.completion_generation {
            // Cancelled (or superseded) after firing.
            return;
        }
        let Some(active) = self.active.take() else {
            return;
        };
        log::debug!(
            "reservation request {} completed after {:?}",
            active.request.id,
            active.granted_at.elapsed()
        );
        self.notify(&active.request.id, ReservationStatus::End);
        self.phase = GrantPhase::Idle;
        self.kick();
    }

    /// Cancel the active reservation, if any. Emits `Cancel` and frees the
    /// slot for the next grant cycle.
    fn cancel_active(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.timer.cancel();
        // Stale any completion fire already in the mailbox.
        self.completion_generation += 1;
        log::debug!("active reservation {} cancelled", active.request.id);
        self.notify(&active.request.id, ReservationStatus::Cancel);
        self.phase = GrantPhase::Idle;
        self.kick();
        true
    }

    // -----------------------------------------------------------------------
    // Cancellation dispatch
    // -----------------------------------------------------------------------

    /// Dispatch a cancellation. Precedence: an absent id or a match on the
    /// active reservation cancels the active slot; a specific id that
    /// mismatches the active reservation is not-found without a queue
    /// scan; the queue is only scanned when nothing is active.
    fn cancel(&mut self, id: Option<String>) -> bool {
        if let Some(active_id) = self.active.as_ref().map(|a| a.request.id.clone()) {
            return match &id {
                Some(i) if *i != active_id => false,
                _ => self.cancel_active(),
            };
        }
        let Some(id) = id else {
            return false;
        };
        match self.queue.remove_by_id(&id) {
            Some(entry) => {
                log::debug!("queued reservation request {} cancelled", entry.request.id);
                self.notify(&entry.request.id, ReservationStatus::Cancel);
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Channel busy as seen by peers: a held reservation counts, then the
    /// local estimate and probe.
    fn channel_busy(&self) -> bool {
        self.active.is_some() || self.tracker.is_busy(self.probe.as_deref())
    }

    /// Frame duration from the probe, 1 s when unavailable.
    fn frame_duration(&self) -> Duration {
        let secs = self
            .probe
            .as_deref()
            .and_then(|p| p.frame_duration())
            .filter(|f| f.is_finite() && *f >= 0.0)
            .unwrap_or(1.0);
        Duration::from_secs_f32(secs)
    }

    fn notify(&self, request_id: &str, status: ReservationStatus) {
        if self
            .ntf_tx
            .send(ReservationStatusNtf::new(request_id, status))
            .is_err()
        {
            log::debug!("notification receiver dropped, {status:?} for {request_id} not delivered");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
