// Project tree change notifier.
//
// A stateless broadcast channel per project: no document sync, no status
// tracking. Clients announce structural changes (create/rename/move/delete)
// and everyone else refetches the tree. Delivery is best-effort.

use anyhow::Result;
use coreport_common::protocol::tree::{TreeChange, TreeSyncMessage};
use coreport_common::types::project_tree_channel;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::session::CredentialSource;
use crate::transport::{ChannelSpec, ReconnectPolicy, SyncTransport, TransportEvent, TransportFactory};

pub struct TreeNotifier<T: SyncTransport> {
    project_id: String,
    origin: Uuid,
    transport: Option<T>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl<T: SyncTransport> TreeNotifier<T> {
    /// Join the notifier channel of `project_id`.
    pub fn open<F>(
        project_id: impl Into<String>,
        credentials: CredentialSource,
        factory: &F,
        sync_url: impl Into<String>,
        reconnect: ReconnectPolicy,
    ) -> Result<Self>
    where
        F: TransportFactory<Transport = T>,
    {
        let project_id = project_id.into();
        let (events_tx, events) = mpsc::unbounded_channel();
        let spec = ChannelSpec {
            base_url: sync_url.into(),
            channel: project_tree_channel(&project_id),
            credentials,
            document: None,
            reconnect,
        };
        let mut transport = factory.create(spec, events_tx)?;
        transport.connect()?;

        let origin = Uuid::new_v4();
        tracing::debug!(project = %project_id, %origin, "tree notifier opened");
        Ok(Self { project_id, origin, transport: Some(transport), events })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Tag identifying this notifier's own broadcasts.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Tell other clients to refetch the tree. Failures are logged, not raised.
    pub fn notify(&mut self) {
        self.send(TreeSyncMessage::refetch(self.origin));
    }

    /// Like `notify`, naming the change and the affected node.
    pub fn notify_change(&mut self, change: TreeChange, node_id: impl Into<String>) {
        self.send(TreeSyncMessage::refetch(self.origin).with_change(change, node_id));
    }

    fn send(&mut self, message: TreeSyncMessage) {
        let Some(transport) = self.transport.as_mut() else {
            tracing::debug!(project = %self.project_id, "tree notifier closed; dropping notification");
            return;
        };
        let sent = message.encode().map_err(anyhow::Error::from).and_then(|payload| {
            transport.send_stateless(&payload)
        });
        if let Err(error) = sent {
            tracing::warn!(project = %self.project_id, error = %format!("{error:#}"), "tree notification not sent");
        }
    }

    /// Wait for the next refetch request from another client.
    ///
    /// Own echoes and malformed payloads are skipped. Returns `None` once the
    /// transport is gone.
    pub async fn next_refetch(&mut self) -> Option<TreeSyncMessage> {
        loop {
            let payload = match self.events.recv().await? {
                TransportEvent::Stateless(payload) => payload,
                TransportEvent::Disconnected { reason } => {
                    tracing::debug!(project = %self.project_id, %reason, "tree notifier disconnected");
                    continue;
                }
                _ => continue,
            };
            match TreeSyncMessage::decode(&payload) {
                Ok(message) if message.origin() == self.origin => continue,
                Ok(message) => return Some(message),
                Err(error) => {
                    tracing::debug!(project = %self.project_id, %error, "ignoring malformed tree payload");
                }
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.destroy();
            self.events.close();
            tracing::debug!(project = %self.project_id, "tree notifier closed");
        }
    }
}

impl<T: SyncTransport> Drop for TreeNotifier<T> {
    fn drop(&mut self) {
        self.close();
    }
}
