// Collaborative editing session: one shared document bound to one
// synchronization channel.
//
// The manager owns the transport and the raw signals. Transport events are
// folded into the signals through `signals::reduce`, and every change is
// published as a derived `ConnectionStatus` on a watch channel. Events are
// processed on the caller's task via `pump`, so signal mutation is
// single-threaded.

pub mod credentials;
pub mod debounce;
pub mod signals;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use coreport_common::types::DocumentIdentity;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use yrs::XmlFragmentRef;

use crate::engine::SyncDoc;
use crate::transport::{ChannelSpec, ReconnectPolicy, SyncTransport, TransportEvent, TransportFactory};

pub use credentials::CredentialSource;
pub use debounce::{UnsyncedDebouncer, DEFAULT_UNSYNCED_DELAY};
pub use signals::{derive_status, reduce, ConnectionStatus, RawSignals, SignalEvent, SocketState};

/// Receives the live document on open and `None` on close.
pub type DebugHook = Arc<dyn Fn(Option<&SyncDoc>) + Send + Sync>;

/// Session parameters.
#[derive(Clone)]
pub struct SessionOptions {
    pub sync_url: String,
    pub unsynced_delay: Duration,
    pub reconnect: ReconnectPolicy,
    pub debug_hook: Option<DebugHook>,
}

impl SessionOptions {
    pub fn new(sync_url: impl Into<String>) -> Self {
        Self {
            sync_url: sync_url.into(),
            unsynced_delay: DEFAULT_UNSYNCED_DELAY,
            reconnect: ReconnectPolicy::default(),
            debug_hook: None,
        }
    }

    pub fn with_debug_hook(mut self, hook: DebugHook) -> Self {
        self.debug_hook = Some(hook);
        self
    }
}

impl From<&crate::config::ClientConfig> for SessionOptions {
    fn from(config: &crate::config::ClientConfig) -> Self {
        Self {
            sync_url: config.sync_url.clone(),
            unsynced_delay: config.unsynced_debounce(),
            reconnect: config.reconnect.policy(),
            debug_hook: None,
        }
    }
}

/// Cloneable flag that turns false once the session is closed.
///
/// Long-running work started from a session (uploads) checks it before
/// touching session state.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn revoke(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum Step {
    Event(Option<TransportEvent>),
    DebounceDeadline,
}

/// One open collaborative editing session.
pub struct ConnectionManager<T: SyncTransport> {
    identity: DocumentIdentity,
    doc: SyncDoc,
    credentials: CredentialSource,
    transport: Option<T>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    signals: RawSignals,
    debouncer: UnsyncedDebouncer,
    status_tx: watch::Sender<ConnectionStatus>,
    liveness: Liveness,
    debug_hook: Option<DebugHook>,
}

impl<T: SyncTransport> ConnectionManager<T> {
    /// Open a session for `identity`.
    ///
    /// The transport is created unconnected and bound to the event channel
    /// first; the document is then handed to the debug hook and only after
    /// that does the connection sequence start.
    pub fn open<F>(
        identity: DocumentIdentity,
        credentials: CredentialSource,
        factory: &F,
        options: SessionOptions,
    ) -> Result<Self>
    where
        F: TransportFactory<Transport = T>,
    {
        let doc = SyncDoc::new();
        let (events_tx, events) = mpsc::unbounded_channel();
        let spec = ChannelSpec {
            base_url: options.sync_url,
            channel: identity.channel_name(),
            credentials: credentials.clone(),
            document: Some(doc.clone()),
            reconnect: options.reconnect,
        };
        let transport = factory.create(spec, events_tx)?;
        let signals = RawSignals::default();
        let (status_tx, _) = watch::channel(derive_status(&signals));

        let mut manager = Self {
            identity,
            doc,
            credentials,
            transport: Some(transport),
            events,
            signals,
            debouncer: UnsyncedDebouncer::new(options.unsynced_delay),
            status_tx,
            liveness: Liveness::new(),
            debug_hook: options.debug_hook,
        };

        if let Some(hook) = &manager.debug_hook {
            hook(Some(&manager.doc));
        }

        let connected = match manager.transport.as_mut() {
            Some(transport) => transport.connect(),
            None => Err(anyhow!("transport missing")),
        };
        if let Err(error) = connected {
            manager.close();
            return Err(error.context(format!("failed to connect session {}", manager.identity)));
        }

        tracing::info!(document = %manager.identity, "collaborative session opened");
        Ok(manager)
    }

    pub fn identity(&self) -> &DocumentIdentity {
        &self.identity
    }

    /// The shared document. Field editors bind directly to its shared types.
    pub fn document(&self) -> &SyncDoc {
        &self.doc
    }

    pub fn signals(&self) -> RawSignals {
        self.signals
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn can_edit(&self) -> bool {
        self.status().can_edit()
    }

    /// Status updates; the receiver sees the current value immediately.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn is_closed(&self) -> bool {
        !self.liveness.is_alive()
    }

    /// Service instance ID captured on first sync.
    pub fn instance_id(&self) -> Option<&str> {
        self.credentials.instance_id()
    }

    /// Caller-driven "treat as dirty" flag.
    pub fn set_editing(&mut self, editing: bool) {
        self.apply(SignalEvent::Editing(editing));
    }

    /// Rich-text fragment for a field.
    ///
    /// Returns an existing fragment at any time but creates a missing one
    /// only once connected and synced; creation before sync would be lost
    /// or conflict with the server's copy on merge.
    pub fn fragment(&self, name: &str) -> Option<XmlFragmentRef> {
        if let Some(fragment) = self.doc.fragment(name) {
            return Some(fragment);
        }
        let ready = self.signals.socket == SocketState::Connected && self.signals.synced;
        ready.then(|| self.doc.get_or_insert_fragment(name))
    }

    /// Process the next transport event or debounce deadline.
    ///
    /// Returns `false` once the session is closed or the transport is gone.
    pub async fn pump(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        let deadline = self.debouncer.next_deadline();
        let step = tokio::select! {
            event = self.events.recv() => Step::Event(event),
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                Step::DebounceDeadline
            }
        };

        match step {
            Step::Event(Some(event)) => {
                self.handle_event(event);
                true
            }
            Step::Event(None) => {
                self.apply(SignalEvent::Disconnected);
                false
            }
            Step::DebounceDeadline => {
                if let Some(pending) = self.debouncer.poll() {
                    self.apply(SignalEvent::UnsyncedChanges(pending));
                }
                true
            }
        }
    }

    /// Pump until `predicate` accepts the status or the session ends.
    pub async fn wait_for<P>(&mut self, predicate: P) -> Option<ConnectionStatus>
    where
        P: Fn(ConnectionStatus) -> bool,
    {
        loop {
            let status = self.status();
            if predicate(status) {
                return Some(status);
            }
            if !self.pump().await {
                return None;
            }
        }
    }

    /// Fold one transport event into the signals.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if self.is_closed() {
            return;
        }
        match event {
            TransportEvent::Status(socket) => self.apply(SignalEvent::Socket(socket)),
            TransportEvent::Synced(true) => {
                self.capture_instance_id();
                self.refresh_save_error();
                self.apply(SignalEvent::Synced(true));
            }
            TransportEvent::Synced(false) => self.apply(SignalEvent::Synced(false)),
            TransportEvent::UnsyncedChanges(count) => {
                if let Some(pending) = self.debouncer.push(count > 0) {
                    self.apply(SignalEvent::UnsyncedChanges(pending));
                }
            }
            TransportEvent::RemoteUpdateApplied => self.refresh_save_error(),
            TransportEvent::Stateless(payload) => {
                tracing::debug!(document = %self.identity, bytes = payload.len(), "ignoring stateless payload");
            }
            TransportEvent::AuthenticationFailed { reason } => {
                tracing::warn!(document = %self.identity, %reason, "synchronization service rejected session");
            }
            TransportEvent::Disconnected { reason } => {
                tracing::debug!(document = %self.identity, %reason, "sync transport disconnected");
                self.apply(SignalEvent::Disconnected);
            }
        }
    }

    /// Tear the session down. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.liveness.revoke();
        self.debouncer.cancel();
        if let Some(mut transport) = self.transport.take() {
            transport.destroy();
        }
        self.events.close();
        self.signals = reduce(self.signals, SignalEvent::Disconnected);
        self.status_tx.send_replace(derive_status(&self.signals));
        if let Some(hook) = self.debug_hook.take() {
            hook(None);
        }
        tracing::info!(document = %self.identity, "collaborative session closed");
    }

    fn capture_instance_id(&self) {
        // Read the document only until the first successful capture.
        if self.credentials.has_instance_id() {
            return;
        }
        if let Some(instance_id) = self.doc.server_info().instance_id.filter(|id| !id.is_empty()) {
            tracing::debug!(document = %self.identity, %instance_id, "captured service instance id");
            self.credentials.capture_instance_id(instance_id);
        }
    }

    fn refresh_save_error(&mut self) {
        let save_error = self.doc.server_info().save_error;
        if save_error != self.signals.save_error {
            self.apply(SignalEvent::SaveError(save_error));
        }
    }

    fn apply(&mut self, event: SignalEvent) {
        let before = derive_status(&self.signals);
        self.signals = reduce(self.signals, event);
        let after = derive_status(&self.signals);
        if before != after {
            tracing::debug!(document = %self.identity, from = %before, to = %after, "status changed");
            self.status_tx.send_replace(after);
        }
    }
}

impl<T: SyncTransport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.close();
    }
}
