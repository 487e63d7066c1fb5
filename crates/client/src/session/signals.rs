// Raw session signals, the reducer that mutates them, and the derived
// user-facing status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport-level socket state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Signals owned by one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RawSignals {
    pub socket: SocketState,
    /// Initial sync completed and the client is caught up.
    pub synced: bool,
    /// Debounced; see `UnsyncedDebouncer`.
    pub has_unsynced_changes: bool,
    /// Caller-set "treat as dirty" override.
    pub editing: bool,
    /// Server-side persistence failure reported in `serverInfo.saveError`.
    pub save_error: bool,
}

/// Every mutation of [`RawSignals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Socket(SocketState),
    Synced(bool),
    /// The transport lost its connection; implies not synced.
    Disconnected,
    UnsyncedChanges(bool),
    Editing(bool),
    SaveError(bool),
}

/// Apply one event to the signal set.
pub fn reduce(mut signals: RawSignals, event: SignalEvent) -> RawSignals {
    match event {
        SignalEvent::Socket(socket) => {
            signals.socket = socket;
            if socket != SocketState::Connected {
                signals.synced = false;
            }
        }
        SignalEvent::Synced(synced) => signals.synced = synced,
        SignalEvent::Disconnected => {
            signals.socket = SocketState::Disconnected;
            signals.synced = false;
        }
        SignalEvent::UnsyncedChanges(pending) => signals.has_unsynced_changes = pending,
        SignalEvent::Editing(editing) => signals.editing = editing,
        SignalEvent::SaveError(failed) => signals.save_error = failed,
    }
    signals
}

/// User-facing connection and save status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Syncing,
    Dirty,
    Idle,
    Error,
}

impl ConnectionStatus {
    /// Whether input controls accept edits in this status.
    pub fn can_edit(self) -> bool {
        matches!(self, Self::Idle | Self::Dirty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Syncing => "syncing",
            Self::Dirty => "dirty",
            Self::Idle => "idle",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the status; the first matching rule wins.
pub fn derive_status(signals: &RawSignals) -> ConnectionStatus {
    match signals.socket {
        SocketState::Disconnected => return ConnectionStatus::Disconnected,
        SocketState::Connecting => return ConnectionStatus::Connecting,
        SocketState::Connected => {}
    }
    if !signals.synced {
        ConnectionStatus::Syncing
    } else if signals.save_error {
        ConnectionStatus::Error
    } else if signals.has_unsynced_changes || signals.editing {
        ConnectionStatus::Dirty
    } else {
        ConnectionStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn connected_synced() -> RawSignals {
        RawSignals { socket: SocketState::Connected, synced: true, ..RawSignals::default() }
    }

    // ── Derivation table ───────────────────────────────────────────

    #[test]
    fn default_signals_are_disconnected() {
        assert_eq!(derive_status(&RawSignals::default()), ConnectionStatus::Disconnected);
    }

    #[test]
    fn socket_state_overrides_everything_else() {
        let signals = RawSignals {
            socket: SocketState::Disconnected,
            synced: true,
            has_unsynced_changes: true,
            editing: true,
            save_error: true,
        };
        assert_eq!(derive_status(&signals), ConnectionStatus::Disconnected);

        let connecting = RawSignals { socket: SocketState::Connecting, ..signals };
        assert_eq!(derive_status(&connecting), ConnectionStatus::Connecting);
    }

    #[test]
    fn connected_but_not_synced_is_syncing() {
        let signals =
            RawSignals { synced: false, save_error: true, editing: true, ..connected_synced() };
        assert_eq!(derive_status(&signals), ConnectionStatus::Syncing);
    }

    #[test]
    fn save_error_beats_dirty() {
        let signals = RawSignals { save_error: true, has_unsynced_changes: true, ..connected_synced() };
        assert_eq!(derive_status(&signals), ConnectionStatus::Error);
    }

    #[test]
    fn unsynced_changes_or_editing_flag_is_dirty() {
        let unsynced = RawSignals { has_unsynced_changes: true, ..connected_synced() };
        assert_eq!(derive_status(&unsynced), ConnectionStatus::Dirty);
        let editing = RawSignals { editing: true, ..connected_synced() };
        assert_eq!(derive_status(&editing), ConnectionStatus::Dirty);
    }

    #[test]
    fn otherwise_idle() {
        assert_eq!(derive_status(&connected_synced()), ConnectionStatus::Idle);
    }

    #[test]
    fn can_edit_only_when_idle_or_dirty() {
        assert!(ConnectionStatus::Idle.can_edit());
        assert!(ConnectionStatus::Dirty.can_edit());
        for status in [
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Syncing,
            ConnectionStatus::Error,
        ] {
            assert!(!status.can_edit(), "{status} should not allow edits");
        }
    }

    // ── Reducer ────────────────────────────────────────────────────

    #[test]
    fn disconnect_clears_synced() {
        let signals = reduce(connected_synced(), SignalEvent::Disconnected);
        assert_eq!(signals.socket, SocketState::Disconnected);
        assert!(!signals.synced);
    }

    #[test]
    fn leaving_connected_clears_synced() {
        let signals = reduce(connected_synced(), SignalEvent::Socket(SocketState::Connecting));
        assert!(!signals.synced);
        assert_eq!(derive_status(&signals), ConnectionStatus::Connecting);
    }

    #[test]
    fn reducer_keeps_unrelated_signals() {
        let before = RawSignals { editing: true, save_error: true, ..connected_synced() };
        let after = reduce(before, SignalEvent::UnsyncedChanges(true));
        assert!(after.has_unsynced_changes);
        assert!(after.editing);
        assert!(after.save_error);
        assert!(after.synced);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ConnectionStatus::Dirty).unwrap(), "\"dirty\"");
    }

    // ── Properties ─────────────────────────────────────────────────

    fn arb_socket() -> impl Strategy<Value = SocketState> {
        prop_oneof![
            Just(SocketState::Disconnected),
            Just(SocketState::Connecting),
            Just(SocketState::Connected),
        ]
    }

    fn arb_signals() -> impl Strategy<Value = RawSignals> {
        (arb_socket(), any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            |(socket, synced, has_unsynced_changes, editing, save_error)| RawSignals {
                socket,
                synced,
                has_unsynced_changes,
                editing,
                save_error,
            },
        )
    }

    fn arb_event() -> impl Strategy<Value = SignalEvent> {
        prop_oneof![
            arb_socket().prop_map(SignalEvent::Socket),
            any::<bool>().prop_map(SignalEvent::Synced),
            Just(SignalEvent::Disconnected),
            any::<bool>().prop_map(SignalEvent::UnsyncedChanges),
            any::<bool>().prop_map(SignalEvent::Editing),
            any::<bool>().prop_map(SignalEvent::SaveError),
        ]
    }

    proptest! {
        #[test]
        fn precedence_holds_for_every_signal_combination(signals in arb_signals()) {
            let status = derive_status(&signals);
            match signals.socket {
                SocketState::Disconnected => prop_assert_eq!(status, ConnectionStatus::Disconnected),
                SocketState::Connecting => prop_assert_eq!(status, ConnectionStatus::Connecting),
                SocketState::Connected if !signals.synced => {
                    prop_assert_eq!(status, ConnectionStatus::Syncing)
                }
                SocketState::Connected if signals.save_error => {
                    prop_assert_eq!(status, ConnectionStatus::Error)
                }
                SocketState::Connected => {
                    let dirty = signals.has_unsynced_changes || signals.editing;
                    prop_assert_eq!(status == ConnectionStatus::Dirty, dirty);
                    prop_assert_eq!(status == ConnectionStatus::Idle, !dirty);
                }
            }
        }

        #[test]
        fn disconnect_forces_disconnected_from_any_state(signals in arb_signals()) {
            let after = reduce(signals, SignalEvent::Disconnected);
            prop_assert_eq!(derive_status(&after), ConnectionStatus::Disconnected);
            prop_assert!(!after.synced);
            prop_assert_eq!(after.save_error, signals.save_error);
            prop_assert_eq!(after.editing, signals.editing);
        }

        #[test]
        fn reconnect_passes_through_syncing(
            signals in arb_signals(),
            events in prop::collection::vec(arb_event(), 0..16),
        ) {
            let drifted = events.into_iter().fold(signals, reduce);
            let reconnected = reduce(
                reduce(drifted, SignalEvent::Disconnected),
                SignalEvent::Socket(SocketState::Connected),
            );
            prop_assert_eq!(derive_status(&reconnected), ConnectionStatus::Syncing);
        }
    }
}
