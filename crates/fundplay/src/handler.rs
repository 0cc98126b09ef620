//! Per-connection handler: handshake, auth, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get ParticipantId
//!   3. Send HandshakeAck
//!   4. Loop: forward room events out, route client frames in

use std::sync::Arc;

use fundplay_gateway::{Authenticator, Gateway, GatewayError};
use fundplay_protocol::{
    ClientCommand, Codec, Envelope, ParticipantId, Payload, ProtocolError, RoomId, ServerEvent,
    SystemMessage,
};
use fundplay_room::{ParticipantSender, RoomError, RoomOutbound};
use fundplay_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::server::{ServerState, PROTOCOL_VERSION};
use crate::FundplayError;

/// Drop guard that unbinds the connection when the handler exits.
///
/// The participant keeps their seat for the reconnect grace. Since `Drop`
/// is synchronous, the async unbind runs as a fire-and-forget task.
struct BindingGuard {
    connection: ConnectionId,
    gateway: Arc<Gateway>,
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        let connection = self.connection;
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            gateway.unbind(connection).await;
        });
    }
}

/// Writes envelopes to one connection, numbering them.
struct Outbox<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<C: Codec> Outbox<'_, C> {
    async fn send(&mut self, payload: Payload) -> Result<(), FundplayError> {
        let envelope = Envelope {
            seq: self.next_seq(),
            timestamp: self.start.elapsed().as_millis() as u64,
            payload,
        };
        send_envelope(self.conn, self.codec, &envelope).await
    }

    async fn system(&mut self, msg: SystemMessage) -> Result<(), FundplayError> {
        self.send(Payload::System(msg)).await
    }

    async fn error(&mut self, code: u16, message: &str) -> Result<(), FundplayError> {
        self.system(SystemMessage::Error {
            code,
            message: message.to_string(),
        })
        .await
    }

    fn server_time(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Increments and returns the next sequence number.
    fn next_seq(&mut self) -> u64 {
        let current = self.seq;
        self.seq += 1;
        current
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), FundplayError>
where
    A: Authenticator,
    C: Codec,
{
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    let start = Instant::now();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    // --- Step 1: Handshake ---
    let participant = perform_handshake(&conn, &state, start).await?;
    tracing::info!(%conn_id, %peer, %participant, "participant authenticated");

    let _guard = BindingGuard {
        connection: conn_id,
        gateway: Arc::clone(&state.gateway),
    };

    // --- Step 2: Message loop ---
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<RoomOutbound>();
    let mut out = Outbox {
        conn: &conn,
        codec: &state.codec,
        seq: 1,
        start,
    };
    let mut deadline = Instant::now() + state.idle_timeout;

    loop {
        tokio::select! {
            frame = conn.recv() => {
                let data = match frame {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%participant, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%participant, error = %e, "recv error");
                        break;
                    }
                };
                deadline = Instant::now() + state.idle_timeout;

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(
                            %participant, error = %e, "failed to decode envelope"
                        );
                        continue;
                    }
                };

                match envelope.payload {
                    Payload::System(msg) => {
                        let should_close = handle_system_message(
                            &state, &mut out, conn_id, &participant, &events_tx, msg,
                        )
                        .await?;
                        if should_close {
                            break;
                        }
                    }
                    Payload::Command { room_id, command } => {
                        handle_room_command(
                            &state.gateway, conn_id, &participant, &events_tx, room_id, command,
                        )
                        .await;
                    }
                    Payload::Event { .. } => {
                        tracing::debug!(%participant, "ignoring event sent by client");
                    }
                }
            }
            Some(outbound) = events_rx.recv() => {
                out.send(Payload::Event {
                    room_id: outbound.room_id,
                    event: outbound.event,
                })
                .await?;
            }
            _ = time::sleep_until(deadline) => {
                tracing::info!(%participant, "connection timed out");
                break;
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%participant, error = %e, "close failed");
    }
    // _guard drops here → unbind fires, grace starts.
    Ok(())
}

/// Performs the initial handshake: receive Handshake, validate, auth, send Ack.
async fn perform_handshake<A, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, C>>,
    start: Instant,
) -> Result<ParticipantId, FundplayError>
where
    A: Authenticator,
    C: Codec,
{
    let mut out = Outbox {
        conn,
        codec: &state.codec,
        seq: 0,
        start,
    };

    let data = match time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(FundplayError::Transport(e)),
        Err(_) => {
            out.error(400, "handshake timed out").await?;
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(env) => env,
        Err(e) => {
            out.error(400, "malformed handshake").await?;
            return Err(e.into());
        }
    };

    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => (version, token),
        _ => {
            out.error(400, "expected Handshake").await?;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Handshake".into(),
            )
            .into());
        }
    };

    if version != PROTOCOL_VERSION {
        out.error(
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let token_str = token.as_deref().unwrap_or("");
    let participant = match state.auth.authenticate(token_str).await {
        Ok(id) => id,
        Err(e) => {
            out.error(401, "unauthorized").await?;
            return Err(FundplayError::Gateway(e));
        }
    };

    let server_time = out.server_time();
    out.system(SystemMessage::HandshakeAck {
        participant_id: participant.clone(),
        server_time,
    })
    .await?;

    Ok(participant)
}

/// Handles a system message. Returns `true` if the connection should close.
async fn handle_system_message<A, C>(
    state: &Arc<ServerState<A, C>>,
    out: &mut Outbox<'_, C>,
    conn_id: ConnectionId,
    participant: &ParticipantId,
    events_tx: &ParticipantSender,
    msg: SystemMessage,
) -> Result<bool, FundplayError>
where
    A: Authenticator,
    C: Codec,
{
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let server_time = out.server_time();
            out.system(SystemMessage::HeartbeatAck {
                client_time,
                server_time,
            })
            .await?;
        }

        SystemMessage::CreateRoom {
            room_id,
            mode,
            host_name,
            settings,
        } => {
            let result = state
                .gateway
                .create_room(
                    conn_id,
                    room_id.clone(),
                    participant.clone(),
                    &host_name,
                    mode,
                    &settings,
                    events_tx.clone(),
                )
                .await;

            match result {
                Ok(_) => out.system(SystemMessage::RoomCreated { room_id }).await?,
                Err(e) => {
                    tracing::debug!(%participant, %room_id, error = %e, "create room failed");
                    out.error(status_code(&e), &e.to_string()).await?;
                }
            }
        }

        SystemMessage::ListRooms => {
            let rooms = state.gateway.registry().list_rooms().await;
            out.system(SystemMessage::RoomList { rooms }).await?;
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%participant, %reason, "client disconnected");
            return Ok(true);
        }

        _ => {
            tracing::debug!(
                %participant, "ignoring unexpected system message"
            );
        }
    }

    Ok(false)
}

/// Routes a room command through the gateway. `join` binds the connection;
/// everything else is dispatched to the bound room.
///
/// Refusals are queued on the connection's own event channel so they stay
/// in order with the room's events.
async fn handle_room_command(
    gateway: &Gateway,
    conn_id: ConnectionId,
    participant: &ParticipantId,
    events_tx: &ParticipantSender,
    room_id: RoomId,
    command: ClientCommand,
) {
    let kind = command.kind();
    let result = match command {
        ClientCommand::Join { name } => gateway
            .bind(conn_id, room_id.clone(), participant.clone(), name, events_tx.clone())
            .await
            .map(|_| ()),
        command => gateway.dispatch(conn_id, &room_id, command).await,
    };

    let Err(e) = result else {
        return;
    };
    tracing::debug!(%participant, %room_id, command = kind, error = %e, "room command failed");
    if let Some(reason) = e.client_rejection() {
        let _ = events_tx.send(RoomOutbound {
            room_id,
            event: ServerEvent::Rejected {
                command: kind.to_string(),
                reason,
            },
        });
    }
}

/// HTTP-like status for a failed `CreateRoom`.
fn status_code(err: &GatewayError) -> u16 {
    match err {
        GatewayError::AuthFailed(_) => 401,
        GatewayError::NotInRoom(_) | GatewayError::AlreadyBound(_) => 409,
        GatewayError::Room(RoomError::AlreadyExists(_) | RoomError::NotFinished(_)) => 409,
        GatewayError::Room(RoomError::NotFound(_) | RoomError::Unavailable(_)) => 404,
        GatewayError::Room(RoomError::InvalidConfig(_) | RoomError::Rejected(_)) => 400,
    }
}

/// Encodes and sends one envelope, as a text frame when the codec is
/// textual.
async fn send_envelope<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    envelope: &Envelope,
) -> Result<(), FundplayError> {
    let bytes = codec.encode(envelope)?;
    if C::TEXT {
        match String::from_utf8(bytes) {
            Ok(frame) => conn.send_text(&frame).await?,
            Err(e) => conn.send(e.as_bytes()).await?,
        }
    } else {
        conn.send(&bytes).await?;
    }
    Ok(())
}
