//! The gateway: async bind / unbind / dispatch / broadcast over the
//! binding table and the room registry.

use std::sync::Arc;

use fundplay_protocol::{
    ClientCommand, GameMode, ParticipantId, Role, RoomId, RoomSettings, ServerEvent,
};
use fundplay_room::{Issuer, ParticipantSender, RoomLifecycle, RoomRegistry};
use fundplay_transport::ConnectionId;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{Binding, BindingTable, GatewayConfig, GatewayError, Presence};

/// Routes connections to rooms.
///
/// Shared by every connection task (`Arc<Gateway>`). The table lock is
/// only held for table updates, never across a room call, so one slow
/// room cannot stall routing for the others.
pub struct Gateway {
    registry: Arc<RoomRegistry>,
    table: Mutex<BindingTable>,
}

impl Gateway {
    pub fn new(registry: Arc<RoomRegistry>, config: GatewayConfig) -> Self {
        Self {
            registry,
            table: Mutex::new(BindingTable::new(config)),
        }
    }

    /// The registry rooms are looked up in.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Creates a room hosted by the connection's participant and binds the
    /// connection to it as host.
    ///
    /// # Errors
    /// `AlreadyBound` if the connection is in another room; any
    /// [`RoomError`](fundplay_room::RoomError) from creation or binding.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_room(
        &self,
        connection: ConnectionId,
        room_id: RoomId,
        host: ParticipantId,
        host_name: &str,
        mode: GameMode,
        settings: &RoomSettings,
        sender: ParticipantSender,
    ) -> Result<Role, GatewayError> {
        self.table.lock().await.check_bindable(connection, &room_id)?;
        self.registry
            .create_room(room_id.clone(), host.clone(), host_name, mode, settings)?;
        self.bind(connection, room_id, host, host_name.to_owned(), sender)
            .await
    }

    /// Binds `connection` to a room as `participant`.
    ///
    /// Joins newcomers and resyncs returning participants: either way the
    /// room sends a full `roomSnapshot` on `sender` before any other event.
    ///
    /// # Errors
    /// `AlreadyBound` if the connection is in another room, `Room` if the
    /// room is missing or refuses the join (the room has then already sent
    /// `rejected` on `sender`).
    pub async fn bind(
        &self,
        connection: ConnectionId,
        room_id: RoomId,
        participant: ParticipantId,
        name: String,
        sender: ParticipantSender,
    ) -> Result<Role, GatewayError> {
        self.table.lock().await.check_bindable(connection, &room_id)?;

        let handle = self.registry.get_room(&room_id)?;
        let role = handle
            .bind(participant.clone(), name, connection, sender)
            .await?;

        let superseded = self.table.lock().await.bind(Binding {
            connection,
            room_id: room_id.clone(),
            participant: participant.clone(),
            role,
        })?;
        if let Some(old) = superseded {
            tracing::debug!(%room_id, %participant, %old, new = %connection, "binding superseded");
        }
        Ok(role)
    }

    /// Unbinds a dropped connection. The participant keeps their seat for
    /// the reconnect grace; the room marks them as in grace.
    pub async fn unbind(&self, connection: ConnectionId) -> Option<Binding> {
        let binding = self.table.lock().await.unbind(connection, Instant::now())?;

        if let Ok(handle) = self.registry.get_room(&binding.room_id) {
            if let Err(e) = handle
                .disconnected(binding.participant.clone(), connection)
                .await
            {
                tracing::debug!(room_id = %binding.room_id, error = %e, "disconnect not delivered");
            }
        }
        Some(binding)
    }

    /// Forwards a client command to the room's queue and waits for it to
    /// be applied. A successful `leave` also drops the binding.
    ///
    /// # Errors
    /// `NotInRoom` if the connection is not bound to `room_id`; `Room` if
    /// the room is gone or refused the command.
    pub async fn dispatch(
        &self,
        connection: ConnectionId,
        room_id: &RoomId,
        command: ClientCommand,
    ) -> Result<(), GatewayError> {
        let binding = self.table.lock().await.route(connection, room_id)?.clone();
        let handle = self.registry.get_room(room_id)?;
        let leaving = matches!(command, ClientCommand::Leave);

        handle
            .command(
                Issuer {
                    participant: binding.participant,
                    role: binding.role,
                },
                command,
            )
            .await?;

        if leaving {
            self.table.lock().await.forget(connection);
        }
        Ok(())
    }

    /// Delivers `event` to every connection bound to `room_id`, in the
    /// room's processing order.
    ///
    /// # Errors
    /// `Room(NotFound)` if no such room is live.
    pub async fn broadcast(&self, room_id: &RoomId, event: ServerEvent) -> Result<(), GatewayError> {
        self.registry.get_room(room_id)?.broadcast(event).await?;
        Ok(())
    }

    /// Expires seats past their grace and tells their rooms. Returns the
    /// expired seats.
    pub async fn sweep(&self) -> Vec<(RoomId, ParticipantId)> {
        let expired = {
            let mut table = self.table.lock().await;
            let expired = table.expire_stale(Instant::now());
            table.cleanup_expired();
            expired
        };

        for (room_id, participant) in &expired {
            let Ok(handle) = self.registry.get_room(room_id) else {
                continue;
            };
            if let Err(e) = handle.expire(participant.clone()).await {
                tracing::debug!(%room_id, %participant, error = %e, "expiry not delivered");
            }
        }
        expired
    }

    /// Drops every binding of a removed room.
    pub async fn forget_room(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let dropped = self.table.lock().await.forget_room(room_id);
        if !dropped.is_empty() {
            tracing::debug!(%room_id, count = dropped.len(), "bindings dropped with room");
        }
        dropped
    }

    /// Sweeps on the configured interval and drops bindings of rooms the
    /// registry removes. Runs until the registry is gone.
    pub async fn run_sweeper(self: Arc<Self>) {
        let interval = self.table.lock().await.config().sweep_interval;
        let mut lifecycle = self.registry.subscribe();
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                notice = lifecycle.recv() => match notice {
                    Ok(RoomLifecycle::Removed { room_id, reason }) => {
                        tracing::debug!(%room_id, %reason, "room removed, dropping bindings");
                        self.forget_room(&room_id).await;
                    }
                    Ok(RoomLifecycle::Created(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "gateway lagged behind room lifecycle");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    /// The binding `connection` currently has.
    pub async fn binding(&self, connection: ConnectionId) -> Option<Binding> {
        self.table.lock().await.get(connection).cloned()
    }

    /// A seat's presence.
    pub async fn presence(&self, room_id: &RoomId, participant: &ParticipantId) -> Option<Presence> {
        self.table.lock().await.presence(room_id, participant)
    }

    /// Number of bound connections.
    pub async fn bound_connections(&self) -> usize {
        self.table.lock().await.len()
    }
}
