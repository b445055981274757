//! # csma-mac
//!
//! Carrier-sense multiple access (CSMA) medium access control for a single
//! shared half-duplex channel. Competing nodes request time-bounded
//! exclusive reservations; the arbiter grants at most one at a time and
//! defers grants with randomized exponential backoff while the channel
//! appears busy, so independent arbiters are unlikely to collide on the
//! same retry instant.
//!
//! The arbiter runs as a single-owner tokio actor: submissions,
//! cancellations, transceiver activity observations, and timer fires are
//! serialized through one mailbox, and every delay is a scheduled callback
//! rather than a blocking wait. Physical carrier sensing and neighbor
//! discovery are external collaborators behind the [`phy`] traits, with
//! fail-open defaults so a missing transceiver never stalls arbitration.
//!
//! ```no_run
//! use csma_mac::{CsmaMac, MacConfig, ReservationRequest, ReservationStatus};
//!
//! # async fn demo() {
//! let (mac, mut notifications) = CsmaMac::spawn(MacConfig::default(), None, None);
//!
//! let request = ReservationRequest::new(5.0);
//! mac.submit(request).await.unwrap();
//!
//! while let Some(ntf) = notifications.recv().await {
//!     if ntf.status == ReservationStatus::End {
//!         break;
//!     }
//! }
//! # }
//! ```

pub mod backoff;
pub mod channel_state;
pub mod config;
pub mod error;
pub mod mac;
pub mod notification;
pub mod phy;
pub mod queue;
pub mod request;
pub mod timer;

mod arbiter;

pub use backoff::BackoffScheduler;
pub use channel_state::{ChannelActivity, ChannelStateTracker};
pub use config::MacConfig;
pub use error::{MacError, RefuseReason};
pub use mac::CsmaMac;
pub use notification::{ReservationStatus, ReservationStatusNtf};
pub use phy::{ChannelProbe, NeighborDiscovery, NodeAddress};
pub use queue::RequestQueue;
pub use request::{QueuedRequest, ReservationRequest};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
