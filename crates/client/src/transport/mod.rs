// Synchronization transport abstraction.
//
// A transport owns the network connection for one channel. It is created in
// a not-yet-connected state bound to an event sink, so the caller can hold
// the document handle before the asynchronous connection sequence starts.
// The WebSocket implementation lives in `ws`; tests substitute mocks.

pub mod ws;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::engine::SyncDoc;
use crate::session::credentials::CredentialSource;
use crate::session::signals::SocketState;

pub use ws::{WsTransport, WsTransportFactory};

/// y-sync custom message tag carrying a UTF-8 JSON stateless payload.
pub const STATELESS_MESSAGE_TAG: u8 = 5;
/// y-sync custom message tag acknowledging one client update.
pub const UPDATE_ACK_MESSAGE_TAG: u8 = 8;

// ── Configuration ───────────────────────────────────────────────────

/// Reconnection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            max_attempts: u32::MAX, // retry indefinitely
        }
    }
}

impl ReconnectPolicy {
    /// Backoff before the next attempt after `consecutive_failures` failures.
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let exp = consecutive_failures.saturating_sub(1).min(7);
        let delay = DurationSaturatingMul::saturating_mul(self.base_delay, 1u64 << exp);
        delay.min(self.max_delay)
    }

    /// Whether another attempt is allowed.
    pub fn should_retry(&self, consecutive_failures: u32) -> bool {
        consecutive_failures < self.max_attempts
    }
}

/// Everything a transport needs to serve one channel.
#[derive(Clone)]
pub struct ChannelSpec {
    /// Base URL of the synchronization service.
    pub base_url: String,
    /// Channel name, e.g. `"pentestfinding/{id}"` or `"project_tree_sync/{id}"`.
    pub channel: String,
    /// Re-read on every connection attempt.
    pub credentials: CredentialSource,
    /// Document to synchronize; `None` disables document sync entirely.
    pub document: Option<SyncDoc>,
    pub reconnect: ReconnectPolicy,
}

impl ChannelSpec {
    /// `{base_url}/{channel}`.
    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.channel)
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Events a transport reports to its owner, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Status(SocketState),
    /// Initial sync completed (or was lost).
    Synced(bool),
    /// Local updates not yet acknowledged by the service.
    UnsyncedChanges(u32),
    /// A remote update was merged into the document.
    RemoteUpdateApplied,
    /// A stateless payload from another client on the channel.
    Stateless(String),
    /// The service refused the session (e.g. stale instance ID).
    AuthenticationFailed { reason: String },
    Disconnected { reason: String },
}

pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

// ── Transport traits ────────────────────────────────────────────────

/// One channel connection.
pub trait SyncTransport: Send {
    /// Start connecting; progress is reported through the event sink.
    fn connect(&mut self) -> Result<()>;

    /// Broadcast a stateless payload. Best-effort: no acknowledgement or replay.
    fn send_stateless(&mut self, payload: &str) -> Result<()>;

    /// Detach every listener and close the connection. Idempotent.
    fn destroy(&mut self);
}

/// Creates not-yet-connected transports.
pub trait TransportFactory {
    type Transport: SyncTransport;

    fn create(&self, spec: ChannelSpec, events: EventSink) -> Result<Self::Transport>;
}

// ── Backoff helper (for Duration::saturating_mul with u64) ──────────

trait DurationSaturatingMul {
    fn saturating_mul(self, rhs: u64) -> Self;
}

impl DurationSaturatingMul for Duration {
    fn saturating_mul(self, rhs: u64) -> Self {
        let nanos = self.as_nanos().saturating_mul(rhs as u128);
        if nanos > u64::MAX as u128 {
            Duration::from_secs(u64::MAX)
        } else {
            Duration::from_nanos(nanos as u64)
        }
    }
}
