// WebSocket transport speaking the y-sync protocol.
//
// One background task per transport owns the socket. It reconnects with
// exponential backoff, re-reading the credential on every attempt, and
// reports progress through the event sink. Local document updates reach the
// task through an unbounded channel fed by a document observer.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use yrs::encoding::read::Cursor;
use yrs::sync::{Message, MessageReader, SyncMessage};
use yrs::updates::decoder::DecoderV1;
use yrs::updates::encoder::Encode;
use yrs::Subscription;

use super::{
    ChannelSpec, EventSink, SyncTransport, TransportEvent, TransportFactory,
    STATELESS_MESSAGE_TAG, UPDATE_ACK_MESSAGE_TAG,
};
use crate::engine::SyncDoc;
use crate::session::signals::SocketState;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Creates [`WsTransport`]s. Must be used inside a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransportFactory;

impl TransportFactory for WsTransportFactory {
    type Transport = WsTransport;

    fn create(&self, spec: ChannelSpec, events: EventSink) -> Result<WsTransport> {
        validate_sync_url(&spec.base_url)?;
        Ok(WsTransport::new(spec, events))
    }
}

enum Outbound {
    Update(Vec<u8>),
    Stateless(String),
}

pub struct WsTransport {
    spec: ChannelSpec,
    events: Option<EventSink>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    task: Option<JoinHandle<()>>,
    subscription: Option<Subscription>,
}

impl WsTransport {
    fn new(spec: ChannelSpec, events: EventSink) -> Self {
        Self { spec, events: Some(events), outbound: None, task: None, subscription: None }
    }
}

impl SyncTransport for WsTransport {
    fn connect(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Ok(());
        }
        let events = self.events.take().ok_or_else(|| anyhow!("transport already destroyed"))?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        if let Some(doc) = &self.spec.document {
            let forward = outbound_tx.clone();
            let subscription = doc.observe_local_updates(move |update| {
                let _ = forward.send(Outbound::Update(update));
            })?;
            self.subscription = Some(subscription);
        }

        let spec = self.spec.clone();
        self.task = Some(tokio::spawn(run_transport(spec, events, outbound_rx)));
        self.outbound = Some(outbound_tx);
        Ok(())
    }

    fn send_stateless(&mut self, payload: &str) -> Result<()> {
        let outbound = self.outbound.as_ref().ok_or_else(|| anyhow!("transport not connected"))?;
        outbound
            .send(Outbound::Stateless(payload.to_string()))
            .map_err(|_| anyhow!("transport task has stopped"))
    }

    fn destroy(&mut self) {
        self.subscription = None;
        self.outbound = None;
        self.events = None;
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(channel = %self.spec.channel, "sync transport destroyed");
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.destroy();
    }
}

// ── Connection loop ─────────────────────────────────────────────────

enum SessionEnd {
    /// The owner dropped the outbound channel; stop for good.
    Shutdown,
    Lost(String),
    Rejected(String),
}

async fn run_transport(
    spec: ChannelSpec,
    events: EventSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let mut failures = 0u32;
    loop {
        emit(&events, TransportEvent::Status(SocketState::Connecting));

        let reason = match open_socket(&spec).await {
            Ok(socket) => {
                tracing::debug!(channel = %spec.channel, "sync socket open");
                let mut accepted = false;
                let end = run_session(socket, &spec, &events, &mut outbound, &mut accepted).await;
                // Only a session the service accepted clears the backoff.
                if accepted {
                    failures = 0;
                } else {
                    failures = failures.saturating_add(1);
                }
                match end {
                    SessionEnd::Shutdown => return,
                    SessionEnd::Lost(reason) => reason,
                    SessionEnd::Rejected(reason) => {
                        tracing::warn!(channel = %spec.channel, failures, %reason, "sync session rejected");
                        emit(&events, TransportEvent::AuthenticationFailed { reason: reason.clone() });
                        reason
                    }
                }
            }
            Err(error) => {
                failures = failures.saturating_add(1);
                tracing::warn!(channel = %spec.channel, failures, error = %format!("{error:#}"), "sync connect failed");
                format!("{error:#}")
            }
        };

        emit(&events, TransportEvent::Disconnected { reason });

        if !spec.reconnect.should_retry(failures) {
            tracing::warn!(channel = %spec.channel, failures, "sync reconnect attempts exhausted");
            return;
        }
        let delay = spec.reconnect.delay_for(failures.max(1));
        tokio::time::sleep(delay).await;
    }
}

async fn open_socket(spec: &ChannelSpec) -> Result<ClientSocket> {
    let mut request = spec.url().into_client_request().context("invalid sync request")?;
    let header = HeaderValue::from_str(&spec.credentials.authorization_header())
        .context("credential is not a valid header value")?;
    request.headers_mut().insert(AUTHORIZATION, header);

    let (socket, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request))
        .await
        .context("sync connect timed out")?
        .context("sync connect failed")?;
    Ok(socket)
}

/// Drive one socket until it ends.
///
/// `Connected` is announced once the service answers the handshake (at once
/// for channels without a document). `accepted` is set when a document
/// session reaches synced, or when a document-less session ends without
/// being refused.
async fn run_session(
    socket: ClientSocket,
    spec: &ChannelSpec,
    events: &EventSink,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    accepted: &mut bool,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();
    let doc = spec.document.as_ref();
    let mut state = SessionState::default();
    let mut announced = doc.is_none();
    if announced {
        tracing::info!(channel = %spec.channel, "sync transport connected");
        emit(events, TransportEvent::Status(SocketState::Connected));
    }
    *accepted = doc.is_none();

    // Updates queued while offline are superseded by the handshake diff.
    let mut pending_stateless = Vec::new();
    while let Ok(queued) = outbound.try_recv() {
        if let Outbound::Stateless(payload) = queued {
            pending_stateless.push(payload);
        }
    }

    let mut opening = Vec::new();
    if let Some(doc) = doc {
        opening.push(Message::Sync(SyncMessage::SyncStep1(doc.state_vector())).encode_v1());
    }
    for payload in pending_stateless {
        opening.push(Message::Custom(STATELESS_MESSAGE_TAG, payload.into_bytes()).encode_v1());
    }
    for frame in opening {
        if let Err(error) = sink.send(WsMessage::Binary(frame.into())).await {
            return SessionEnd::Lost(format!("failed to send opening frame: {error}"));
        }
    }

    loop {
        tokio::select! {
            frame = stream.next() => {
                let payload = match frame {
                    Some(Ok(WsMessage::Binary(payload))) => payload,
                    Some(Ok(WsMessage::Ping(payload))) => {
                        if sink.send(WsMessage::Pong(payload)).await.is_err() {
                            return SessionEnd::Lost("failed to answer ping".into());
                        }
                        continue;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return SessionEnd::Lost("closed by server".into());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => return SessionEnd::Lost(error.to_string()),
                };

                let outcome = match handle_frame(doc, &payload, &mut state) {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        tracing::warn!(channel = %spec.channel, error = %format!("{error:#}"), "failed to process sync frame");
                        return SessionEnd::Lost(format!("{error:#}"));
                    }
                };
                if outcome.rejected.is_none() && !announced {
                    announced = true;
                    tracing::info!(channel = %spec.channel, "sync transport connected");
                    emit(events, TransportEvent::Status(SocketState::Connected));
                }
                for event in outcome.events {
                    emit(events, event);
                }
                if state.synced {
                    *accepted = true;
                }
                if let Some(reason) = outcome.rejected {
                    *accepted = false;
                    let _ = sink.close().await;
                    return SessionEnd::Rejected(reason);
                }
                for response in outcome.responses {
                    if let Err(error) = sink.send(WsMessage::Binary(response.into())).await {
                        return SessionEnd::Lost(format!("failed to send sync response: {error}"));
                    }
                }
            }
            next = outbound.recv() => {
                let Some(next) = next else {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                };
                let frame = match next {
                    Outbound::Update(update) => {
                        state.unacked = state.unacked.saturating_add(1);
                        emit(events, TransportEvent::UnsyncedChanges(state.unacked));
                        Message::Sync(SyncMessage::Update(update)).encode_v1()
                    }
                    Outbound::Stateless(payload) => {
                        Message::Custom(STATELESS_MESSAGE_TAG, payload.into_bytes()).encode_v1()
                    }
                };
                if let Err(error) = sink.send(WsMessage::Binary(frame.into())).await {
                    return SessionEnd::Lost(format!("failed to send frame: {error}"));
                }
            }
        }
    }
}

fn emit(events: &EventSink, event: TransportEvent) {
    // The owner may already be gone during teardown.
    let _ = events.send(event);
}

// ── Frame handling ──────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SessionState {
    synced: bool,
    unacked: u32,
}

#[derive(Debug, Default)]
struct FrameOutcome {
    responses: Vec<Vec<u8>>,
    events: Vec<TransportEvent>,
    rejected: Option<String>,
}

/// Decode one binary frame and apply it. Socket I/O stays with the caller.
fn handle_frame(
    doc: Option<&SyncDoc>,
    payload: &[u8],
    state: &mut SessionState,
) -> Result<FrameOutcome> {
    let mut outcome = FrameOutcome::default();
    let mut decoder = DecoderV1::new(Cursor::new(payload));
    let reader = MessageReader::new(&mut decoder);

    for message in reader {
        let message = message.context("failed to decode y-sync message")?;
        match (message, doc) {
            (Message::Sync(SyncMessage::SyncStep1(remote_sv)), Some(doc)) => {
                let diff = doc.encode_diff(&remote_sv);
                outcome.responses.push(Message::Sync(SyncMessage::SyncStep2(diff)).encode_v1());
                state.unacked = state.unacked.saturating_add(1);
                outcome.events.push(TransportEvent::UnsyncedChanges(state.unacked));
            }
            (Message::Sync(SyncMessage::SyncStep2(update)), Some(doc)) => {
                doc.apply_remote_update(&update)?;
                outcome.events.push(TransportEvent::RemoteUpdateApplied);
                if !state.synced {
                    state.synced = true;
                    outcome.events.push(TransportEvent::Synced(true));
                }
            }
            (Message::Sync(SyncMessage::Update(update)), Some(doc)) => {
                doc.apply_remote_update(&update)?;
                outcome.events.push(TransportEvent::RemoteUpdateApplied);
            }
            (Message::Sync(_), None) => {
                tracing::debug!("ignoring document sync message on a stateless channel");
            }
            (Message::Custom(STATELESS_MESSAGE_TAG, data), _) => match String::from_utf8(data) {
                Ok(text) => outcome.events.push(TransportEvent::Stateless(text)),
                Err(error) => tracing::debug!(%error, "dropping non-utf8 stateless payload"),
            },
            (Message::Custom(UPDATE_ACK_MESSAGE_TAG, _), _) => {
                state.unacked = state.unacked.saturating_sub(1);
                outcome.events.push(TransportEvent::UnsyncedChanges(state.unacked));
            }
            (Message::Auth(Some(reason)), _) => {
                outcome.rejected = Some(reason);
                return Ok(outcome);
            }
            (Message::Custom(tag, _), _) => {
                tracing::debug!(tag, "ignoring unknown custom sync message");
            }
            (Message::Auth(None) | Message::Awareness(_) | Message::AwarenessQuery, _) => {}
        }
    }

    Ok(outcome)
}

/// Validate a sync service base URL: `wss://` required unless loopback.
pub fn validate_sync_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).with_context(|| format!("invalid sync url: {raw}"))?;
    match parsed.scheme() {
        "wss" => Ok(()),
        "ws" if crate::config::is_loopback_host(parsed.host_str()) => Ok(()),
        "ws" => bail!("sync url must use wss:// for non-loopback hosts"),
        other => bail!("unsupported sync url scheme `{other}`"),
    }
}
