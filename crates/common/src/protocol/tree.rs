// Stateless messages broadcast on a project's tree-change channel.
//
// Delivery is best-effort and at-most-once; receivers treat every message as
// a hint to refetch, never as the data itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to the tree, when the sender knows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TreeChange {
    Created,
    Renamed,
    Moved,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeSyncMessage {
    /// The tree changed; siblings should refetch the list.
    Refetch {
        /// Session that sent the message, for echo suppression.
        origin: Uuid,
        sent_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        change: Option<TreeChange>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<String>,
    },
}

impl TreeSyncMessage {
    pub fn refetch(origin: Uuid) -> Self {
        Self::Refetch { origin, sent_at: Utc::now(), change: None, node_id: None }
    }

    pub fn with_change(self, change: TreeChange, node_id: impl Into<String>) -> Self {
        match self {
            Self::Refetch { origin, sent_at, .. } => {
                Self::Refetch { origin, sent_at, change: Some(change), node_id: Some(node_id.into()) }
            }
        }
    }

    pub fn origin(&self) -> Uuid {
        match self {
            Self::Refetch { origin, .. } => *origin,
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}
