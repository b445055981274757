//! Collaborator seams toward the physical transceiver and the
//! neighbor-discovery mechanism.
//!
//! Both traits model fast, non-blocking queries. The arbiter must never
//! stall on a collaborator: a probe that is absent or answers `None` is
//! treated as "not busy" / "use the default frame duration" (fail-open),
//! and neighbor discovery runs exactly once at startup with its result
//! logged but never consulted by arbitration.

/// Address of a peer node on the shared channel.
pub type NodeAddress = u32;

/// Carrier-sensing and frame-timing probes exposed by the transceiver.
///
/// `None` from either method means the collaborator could not answer;
/// callers substitute the fail-open default.
pub trait ChannelProbe: Send + Sync {
    /// Whether the transceiver currently perceives the channel as busy.
    fn is_busy(&self) -> Option<bool>;

    /// Duration of one frame on this channel, in seconds.
    fn frame_duration(&self) -> Option<f32>;
}

/// Startup-only enumeration of reachable neighbors.
///
/// The result is logged and retained for inspection but has no bearing on
/// arbitration.
pub trait NeighborDiscovery: Send + Sync {
    /// Enumerate the neighbors visible from this node.
    fn discover(&self) -> Vec<NodeAddress>;
}
