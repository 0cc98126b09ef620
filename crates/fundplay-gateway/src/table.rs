//! The binding table: which connection speaks for which participant of
//! which room, and who is waiting out a reconnect grace.
//!
//! # Concurrency note
//!
//! `BindingTable` is NOT thread-safe by itself; it uses plain `HashMap`s.
//! The [`Gateway`](crate::Gateway) owns it behind a mutex and never holds
//! the lock across a room call.

use std::collections::HashMap;

use fundplay_protocol::{ParticipantId, RoomId};
use fundplay_transport::ConnectionId;
use tokio::time::Instant;

use crate::{Binding, GatewayConfig, GatewayError, Presence};

/// Connection → (room, participant) routing plus per-seat presence.
///
/// ## Lifecycle
///
/// ```text
/// bind() ──→ unbind() ──→ bind()            (reconnect within grace)
///               │
///               ▼
///        expire_stale() ──→ cleanup_expired()
/// ```
pub struct BindingTable {
    /// Live bindings, keyed by connection.
    connections: HashMap<ConnectionId, Binding>,

    /// Presence per seat. A seat outlives its connection while in grace.
    presence: HashMap<(RoomId, ParticipantId), Presence>,

    config: GatewayConfig,
}

impl BindingTable {
    /// Creates an empty table.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            connections: HashMap::new(),
            presence: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Checks that `connection` may bind to `room_id`.
    ///
    /// # Errors
    /// [`GatewayError::AlreadyBound`] if it is bound to a different room.
    pub fn check_bindable(
        &self,
        connection: ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), GatewayError> {
        match self.connections.get(&connection) {
            Some(existing) if existing.room_id != *room_id => {
                Err(GatewayError::AlreadyBound(existing.room_id.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Records a binding and marks the seat bound.
    ///
    /// If the participant was already bound through another connection,
    /// that connection is dropped from the table and returned: the room
    /// routes to the newest connection only.
    ///
    /// # Errors
    /// [`GatewayError::AlreadyBound`] if the connection is bound to a
    /// different room.
    pub fn bind(&mut self, binding: Binding) -> Result<Option<ConnectionId>, GatewayError> {
        self.check_bindable(binding.connection, &binding.room_id)?;

        let key = (binding.room_id.clone(), binding.participant.clone());
        let superseded = match self.presence.get(&key) {
            Some(Presence::Bound { connection }) if *connection != binding.connection => {
                Some(*connection)
            }
            _ => None,
        };
        if let Some(old) = superseded {
            self.connections.remove(&old);
        }

        tracing::info!(
            connection = %binding.connection,
            room_id = %binding.room_id,
            participant = %binding.participant,
            role = %binding.role,
            "connection bound"
        );

        self.presence.insert(
            key,
            Presence::Bound {
                connection: binding.connection,
            },
        );
        self.connections.insert(binding.connection, binding);
        Ok(superseded)
    }

    /// Removes a dropped connection and starts its seat's grace period.
    ///
    /// Returns the binding it had, or `None` if it was never bound (or
    /// has been superseded).
    pub fn unbind(&mut self, connection: ConnectionId, now: Instant) -> Option<Binding> {
        let binding = self.connections.remove(&connection)?;
        let key = (binding.room_id.clone(), binding.participant.clone());
        if self.presence.get(&key) == Some(&Presence::Bound { connection }) {
            self.presence.insert(key, Presence::Grace { since: now });
            tracing::info!(
                %connection,
                room_id = %binding.room_id,
                participant = %binding.participant,
                "connection lost, grace period started"
            );
        }
        Some(binding)
    }

    /// Removes a connection and its seat without any grace, after an
    /// explicit `leave`.
    pub fn forget(&mut self, connection: ConnectionId) -> Option<Binding> {
        let binding = self.connections.remove(&connection)?;
        let key = (binding.room_id.clone(), binding.participant.clone());
        if self.presence.get(&key) == Some(&Presence::Bound { connection }) {
            self.presence.remove(&key);
        }
        Some(binding)
    }

    /// The binding that lets `connection` address `room_id`.
    ///
    /// # Errors
    /// [`GatewayError::NotInRoom`] if the connection is unbound or bound
    /// elsewhere.
    pub fn route(
        &self,
        connection: ConnectionId,
        room_id: &RoomId,
    ) -> Result<&Binding, GatewayError> {
        self.connections
            .get(&connection)
            .filter(|binding| binding.room_id == *room_id)
            .ok_or_else(|| GatewayError::NotInRoom(room_id.clone()))
    }

    /// Looks up a connection's binding.
    pub fn get(&self, connection: ConnectionId) -> Option<&Binding> {
        self.connections.get(&connection)
    }

    /// A seat's presence, if the table knows it.
    pub fn presence(&self, room_id: &RoomId, participant: &ParticipantId) -> Option<Presence> {
        self.presence
            .get(&(room_id.clone(), participant.clone()))
            .copied()
    }

    /// Connections currently bound to `room_id`, in id order.
    pub fn connections_in(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|binding| binding.room_id == *room_id)
            .map(|binding| binding.connection)
            .collect();
        ids.sort();
        ids
    }

    /// Expires every seat whose grace has run out at `now` and returns
    /// them, sorted, so the caller can tell their rooms.
    pub fn expire_stale(&mut self, now: Instant) -> Vec<(RoomId, ParticipantId)> {
        let grace = self.config.reconnect_grace;
        let mut expired = Vec::new();

        for (key, presence) in self.presence.iter_mut() {
            if let Presence::Grace { since } = *presence {
                if now.saturating_duration_since(since) >= grace {
                    *presence = Presence::Expired;
                    tracing::info!(
                        room_id = %key.0,
                        participant = %key.1,
                        "presence expired (grace period elapsed)"
                    );
                    expired.push(key.clone());
                }
            }
        }

        expired.sort();
        expired
    }

    /// Drops expired seats. Separate from [`expire_stale`](Self::expire_stale)
    /// so the gateway can notify rooms first.
    pub fn cleanup_expired(&mut self) {
        self.presence
            .retain(|_, presence| !matches!(presence, Presence::Expired));
    }

    /// Drops every binding and seat of a removed room. Returns the
    /// connections that were bound to it.
    pub fn forget_room(&mut self, room_id: &RoomId) -> Vec<ConnectionId> {
        let dropped = self.connections_in(room_id);
        for connection in &dropped {
            self.connections.remove(connection);
        }
        self.presence.retain(|(room, _), _| room != room_id);
        dropped
    }

    /// Number of bound connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no connection is bound.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
