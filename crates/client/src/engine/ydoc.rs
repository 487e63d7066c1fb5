// Shared document handle built on yrs (y-crdt Rust bindings).
//
// Field editors read and write the document directly through the named
// shared types; the session layer only applies remote updates, forwards local
// ones, and reads the service-owned `serverInfo` metadata.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use yrs::types::ToJson;
use yrs::updates::decoder::Decode;
use yrs::{
    Any, ArrayRef, Doc, Map, MapRef, Origin, ReadTxn, StateVector, Subscription, Transact, Update,
    XmlFragmentRef,
};

/// Root map holding service-written metadata.
pub const META_MAP: &str = "meta";
/// Key of the service metadata entry inside [`META_MAP`].
pub const SERVER_INFO_KEY: &str = "serverInfo";
/// Transaction origin tagging updates received from the service.
pub const REMOTE_ORIGIN: &str = "coreport-remote";

/// Metadata the synchronization service writes into every document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub save_error: bool,
}

/// Cheaply cloneable handle to one shared document.
#[derive(Clone)]
pub struct SyncDoc {
    doc: Doc,
}

impl SyncDoc {
    pub fn new() -> Self {
        Self { doc: Doc::new() }
    }

    /// Create a document with a specific client ID (for deterministic testing).
    pub fn with_client_id(client_id: u64) -> Self {
        Self { doc: Doc::with_client_id(client_id) }
    }

    /// Apply an update received from the service, tagged so it is not echoed.
    pub fn apply_remote_update(&self, data: &[u8]) -> Result<()> {
        let update = Update::decode_v1(data).context("failed to decode remote Yjs update")?;
        self.doc
            .transact_mut_with(REMOTE_ORIGIN)
            .apply_update(update)
            .context("failed to apply remote Yjs update")?;
        Ok(())
    }

    /// Encode the full document state as a binary blob.
    pub fn encode_state(&self) -> Vec<u8> {
        self.doc.transact().encode_state_as_update_v1(&StateVector::default())
    }

    pub fn state_vector(&self) -> StateVector {
        self.doc.transact().state_vector()
    }

    /// Compute an update containing all changes since the given state vector.
    pub fn encode_diff(&self, remote_sv: &StateVector) -> Vec<u8> {
        self.doc.transact().encode_diff_v1(remote_sv)
    }

    pub fn get_or_insert_map(&self, name: &str) -> MapRef {
        self.doc.get_or_insert_map(name)
    }

    pub fn get_or_insert_array(&self, name: &str) -> ArrayRef {
        self.doc.get_or_insert_array(name)
    }

    /// Rich-text fragment, only if some client already created it.
    pub fn fragment(&self, name: &str) -> Option<XmlFragmentRef> {
        self.doc.transact().get_xml_fragment(name)
    }

    /// Rich-text fragment, creating it when missing.
    ///
    /// Creation while disconnected is discarded or conflicts on merge; the
    /// session layer only calls this once synced.
    pub fn get_or_insert_fragment(&self, name: &str) -> XmlFragmentRef {
        self.doc.get_or_insert_xml_fragment(name)
    }

    /// Read `meta.serverInfo`; defaults when absent or malformed.
    pub fn server_info(&self) -> ServerInfo {
        let meta = self.doc.get_or_insert_map(META_MAP);
        let txn = self.doc.transact();
        let Some(value) = meta.get(&txn, SERVER_INFO_KEY) else {
            return ServerInfo::default();
        };
        serde_json::to_value(value.to_json(&txn))
            .and_then(serde_json::from_value)
            .unwrap_or_else(|error| {
                tracing::debug!(%error, "malformed serverInfo entry");
                ServerInfo::default()
            })
    }

    /// Write `meta.serverInfo`, as the synchronization service does.
    pub fn write_server_info(&self, info: &ServerInfo) {
        let mut fields: HashMap<String, Any> = HashMap::new();
        if let Some(instance_id) = &info.instance_id {
            fields.insert("instanceId".into(), Any::from(instance_id.as_str()));
        }
        fields.insert("saveError".into(), Any::Bool(info.save_error));

        let meta = self.doc.get_or_insert_map(META_MAP);
        let mut txn = self.doc.transact_mut();
        meta.insert(&mut txn, SERVER_INFO_KEY, Any::from(fields));
    }

    /// Subscribe to updates produced locally (remote updates are skipped).
    pub fn observe_local_updates<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        let remote = Origin::from(REMOTE_ORIGIN);
        self.doc
            .observe_update_v1(move |txn, event| {
                if txn.origin() == Some(&remote) {
                    return;
                }
                callback(event.update.clone());
            })
            .map_err(|error| anyhow!("failed to observe document updates: {error:?}"))
    }

    /// Get the underlying Doc reference (for advanced operations).
    pub fn inner(&self) -> &Doc {
        &self.doc
    }
}

impl Default for SyncDoc {
    fn default() -> Self {
        Self::new()
    }
}
