// In-process synchronization service for integration tests.
//
// Speaks y-sync over axum WebSockets on `/ws/{channel}`, one shared document
// per channel. Beyond plain y-sync it writes `meta.serverInfo`, acknowledges
// every client update with custom tag 8, relays tag 5 stateless payloads to
// the other clients of a channel, and rejects credentials carrying a stale
// instance ID after `restart`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    routing::get,
    Router,
};
use coreport_client::engine::ServerInfo;
use coreport_client::SyncDoc;
use coreport_common::types::SessionCredential;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::Instant;
use yrs::encoding::read::Cursor;
use yrs::sync::{Awareness, DefaultProtocol, Message, MessageReader, Protocol, SyncMessage};
use yrs::updates::decoder::{Decode, DecoderV1};
use yrs::updates::encoder::Encode;
use yrs::{GetString, ReadTxn, Transact, Update};

const UPDATE_BUFFER_SIZE: usize = 256;
const STATELESS_TAG: u8 = 5;
const ACK_TAG: u8 = 8;

struct Room {
    doc: SyncDoc,
    awareness: Mutex<Awareness>,
    updates_tx: broadcast::Sender<(u64, Vec<u8>)>,
    connections: AtomicU64,
}

impl Room {
    fn new(instance_id: &str) -> Arc<Self> {
        let doc = SyncDoc::new();
        doc.write_server_info(&ServerInfo {
            instance_id: Some(instance_id.to_string()),
            save_error: false,
        });
        let (updates_tx, _) = broadcast::channel(UPDATE_BUFFER_SIZE);
        Arc::new(Self {
            awareness: Mutex::new(Awareness::new(doc.inner().clone())),
            doc,
            updates_tx,
            connections: AtomicU64::new(0),
        })
    }
}

struct Inner {
    rooms: Mutex<HashMap<String, Arc<Room>>>,
    instance_id: Mutex<String>,
    authorizations: Mutex<Vec<(Instant, String)>>,
    next_client_id: AtomicU64,
    generation: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct TestSyncService {
    inner: Arc<Inner>,
}

impl TestSyncService {
    pub fn new(instance_id: &str) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                rooms: Mutex::new(HashMap::new()),
                instance_id: Mutex::new(instance_id.to_string()),
                authorizations: Mutex::new(Vec::new()),
                next_client_id: AtomicU64::new(1),
                generation,
            }),
        }
    }

    /// Bind to an ephemeral loopback port; returns the base sync URL.
    pub async fn start(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("test listener should bind");
        let addr = listener.local_addr().expect("listener should expose local address");
        let router = Router::new().route("/ws/{*channel}", get(ws_route)).with_state(self.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("ws://{addr}/ws")
    }

    pub async fn instance_id(&self) -> String {
        self.inner.instance_id.lock().await.clone()
    }

    /// Every `Authorization` header received, in order.
    pub async fn authorizations(&self) -> Vec<String> {
        self.inner.authorizations.lock().await.iter().map(|(_, header)| header.clone()).collect()
    }

    /// When each connection attempt arrived, in order.
    pub async fn attempt_times(&self) -> Vec<Instant> {
        self.inner.authorizations.lock().await.iter().map(|(at, _)| *at).collect()
    }

    pub async fn connections(&self, channel: &str) -> u64 {
        match self.inner.rooms.lock().await.get(channel) {
            Some(room) => room.connections.load(Ordering::SeqCst),
            None => 0,
        }
    }

    pub async fn text(&self, channel: &str, name: &str) -> String {
        let room = self.room(channel).await;
        let awareness = room.awareness.lock().await;
        let txn = awareness.doc().transact();
        txn.get_text(name).map(|text| text.get_string(&txn)).unwrap_or_default()
    }

    /// Report a persistence failure (or recovery) to every client.
    pub async fn set_save_error(&self, channel: &str, save_error: bool) {
        let instance_id = self.instance_id().await;
        let room = self.room(channel).await;
        let update = {
            let _awareness = room.awareness.lock().await;
            let before = room.doc.state_vector();
            room.doc.write_server_info(&ServerInfo { instance_id: Some(instance_id), save_error });
            room.doc.encode_diff(&before)
        };
        let frame = Message::Sync(SyncMessage::Update(update)).encode_v1();
        let _ = room.updates_tx.send((0, frame));
    }

    /// Simulate a service restart: new instance ID, fresh documents, and
    /// every open connection dropped.
    pub async fn restart(&self, instance_id: &str) {
        *self.inner.instance_id.lock().await = instance_id.to_string();
        self.inner.rooms.lock().await.clear();
        self.inner.generation.send_modify(|generation| *generation += 1);
    }

    async fn room(&self, channel: &str) -> Arc<Room> {
        let instance_id = self.instance_id().await;
        let mut rooms = self.inner.rooms.lock().await;
        Arc::clone(rooms.entry(channel.to_string()).or_insert_with(|| Room::new(&instance_id)))
    }
}

async fn ws_route(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    headers: HeaderMap,
    State(service): State<TestSyncService>,
) -> impl IntoResponse {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    service.inner.authorizations.lock().await.push((Instant::now(), authorization.clone()));
    ws.on_upgrade(move |socket| handle_socket(socket, channel, authorization, service))
}

async fn handle_socket(
    mut socket: WebSocket,
    channel: String,
    authorization: String,
    service: TestSyncService,
) {
    let credential = SessionCredential::parse(authorization.trim_start_matches("Bearer "));
    let current = service.instance_id().await;
    if credential.instance_id.as_deref().is_some_and(|claimed| claimed != current) {
        let denied = Message::Auth(Some("instance mismatch".into())).encode_v1();
        let _ = socket.send(WsMessage::Binary(denied.into())).await;
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    }

    let room = service.room(&channel).await;
    let client_id = service.inner.next_client_id.fetch_add(1, Ordering::Relaxed);
    let mut updates_rx = room.updates_tx.subscribe();
    let mut generation = service.inner.generation.subscribe();
    generation.borrow_and_update();
    room.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else {
                    break;
                };
                match message {
                    WsMessage::Binary(payload) => {
                        if process_incoming_binary(client_id, payload.as_ref(), &room, &mut socket).await.is_err() {
                            break;
                        }
                    }
                    WsMessage::Close(_) => break,
                    WsMessage::Ping(payload) => {
                        if socket.send(WsMessage::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    WsMessage::Pong(_) | WsMessage::Text(_) => {}
                }
            }
            outbound = updates_rx.recv() => {
                match outbound {
                    Ok((sender_id, payload)) if sender_id != client_id => {
                        if socket.send(WsMessage::Binary(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = generation.changed() => break,
        }
    }

    room.connections.fetch_sub(1, Ordering::SeqCst);
    let _ = socket.send(WsMessage::Close(None)).await;
}

async fn process_incoming_binary(
    client_id: u64,
    payload: &[u8],
    room: &Room,
    socket: &mut WebSocket,
) -> anyhow::Result<()> {
    let protocol = DefaultProtocol;
    let mut responses = Vec::new();
    let mut broadcasts = Vec::new();

    {
        let awareness = room.awareness.lock().await;
        let mut decoder = DecoderV1::new(Cursor::new(payload));
        let reader = MessageReader::new(&mut decoder);

        for message in reader {
            match message.context("failed to decode y-sync message")? {
                Message::Sync(SyncMessage::SyncStep1(state_vector)) => {
                    if let Some(response) = protocol.handle_sync_step1(&awareness, state_vector)? {
                        responses.push(response.encode_v1());
                    }
                    let server_sv = awareness.doc().transact().state_vector();
                    responses.push(Message::Sync(SyncMessage::SyncStep1(server_sv)).encode_v1());
                }
                Message::Sync(SyncMessage::SyncStep2(update)) => {
                    protocol.handle_sync_step2(&awareness, Update::decode_v1(&update)?)?;
                    responses.push(Message::Custom(ACK_TAG, Vec::new()).encode_v1());
                    broadcasts.push(Message::Sync(SyncMessage::Update(update)).encode_v1());
                }
                Message::Sync(SyncMessage::Update(update)) => {
                    protocol.handle_update(&awareness, Update::decode_v1(&update)?)?;
                    responses.push(Message::Custom(ACK_TAG, Vec::new()).encode_v1());
                    broadcasts.push(Message::Sync(SyncMessage::Update(update)).encode_v1());
                }
                Message::Custom(STATELESS_TAG, data) => {
                    broadcasts.push(Message::Custom(STATELESS_TAG, data).encode_v1());
                }
                other => {
                    if let Some(response) = protocol.handle_message(&awareness, other)? {
                        responses.push(response.encode_v1());
                    }
                }
            }
        }
    }

    for response in responses {
        socket.send(WsMessage::Binary(response.into())).await.context("failed to send response")?;
    }
    for frame in broadcasts {
        let _ = room.updates_tx.send((client_id, frame));
    }
    Ok(())
}
