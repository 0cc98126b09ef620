//! Room registry: creates, tracks, and retires rooms.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fundplay_protocol::{GameMode, ParticipantId, RoomId, RoomListEntry, RoomSettings};
use fundplay_scheduler::ProgressionScheduler;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::room::spawn_room;
use crate::session::RoomSession;
use crate::{RegistryConfig, RoomConfig, RoomError, RoomHandle, RoomInfo, SettlementBridge};

/// Capacity of the lifecycle notification channel.
const LIFECYCLE_CAPACITY: usize = 256;

/// Why a room left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// `end_room` after the game finished.
    Ended,
    /// No activity for the idle timeout.
    Idle,
    /// Finished and past the linger period.
    Finished,
    /// The actor stopped answering.
    Unresponsive,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ended => "room ended",
            Self::Idle => "room idle",
            Self::Finished => "room finished",
            Self::Unresponsive => "room unresponsive",
        })
    }
}

/// Notifications about rooms coming and going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomLifecycle {
    Created(RoomId),
    Removed { room_id: RoomId, reason: RemovalReason },
}

/// All live rooms, keyed by id.
///
/// The table is the only state shared between rooms. It changes only on
/// creation (insert-if-absent) and removal; everything else goes through
/// a room's own [`RoomHandle`].
pub struct RoomRegistry {
    rooms: DashMap<RoomId, RoomHandle>,
    defaults: RoomConfig,
    config: RegistryConfig,
    settlement: Arc<dyn SettlementBridge>,
    lifecycle: broadcast::Sender<RoomLifecycle>,
}

impl RoomRegistry {
    /// Creates an empty registry. `defaults` is the base config every
    /// room's settings are merged into.
    pub fn new(
        defaults: RoomConfig,
        config: RegistryConfig,
        settlement: Arc<dyn SettlementBridge>,
    ) -> Self {
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self {
            rooms: DashMap::new(),
            defaults,
            config,
            settlement,
            lifecycle,
        }
    }

    /// Creates a room hosted by `host` and starts its actor.
    ///
    /// # Errors
    /// `AlreadyExists` if the id is taken, `InvalidConfig` if the merged
    /// settings are unusable, `Rejected(InvalidCommand)` for a bad host name.
    pub fn create_room(
        &self,
        room_id: RoomId,
        host: ParticipantId,
        host_name: &str,
        mode: GameMode,
        settings: &RoomSettings,
    ) -> Result<RoomHandle, RoomError> {
        let config = self.defaults.clone().with_settings(settings)?;

        match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(_) => Err(RoomError::AlreadyExists(room_id)),
            Entry::Vacant(slot) => {
                let scheduler = ProgressionScheduler::new(config.scheduler.clone());
                let channel_size = config.command_buffer;
                let session = RoomSession::new(
                    room_id.clone(),
                    host.clone(),
                    host_name,
                    mode,
                    config,
                    Instant::now(),
                )?;
                let handle = spawn_room(
                    session,
                    scheduler,
                    Arc::clone(&self.settlement),
                    channel_size,
                );
                slot.insert(handle.clone());

                tracing::info!(%room_id, %mode, %host, "room created");
                let _ = self.lifecycle.send(RoomLifecycle::Created(room_id));
                Ok(handle)
            }
        }
    }

    /// Looks up a live room.
    pub fn get_room(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(room_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// Removes a room whose game has finished.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `NotFinished` if the session has not
    /// reached `Ended` or `Complete`.
    pub async fn end_room(&self, room_id: &RoomId) -> Result<(), RoomError> {
        let handle = self.get_room(room_id)?;
        let info = handle.info().await?;
        if !info.phase.is_terminal() {
            return Err(RoomError::NotFinished(room_id.clone()));
        }
        self.remove(room_id, RemovalReason::Ended).await;
        Ok(())
    }

    /// Removes idle rooms, finished rooms past their linger time, and
    /// rooms whose actor has stopped. Returns the removed ids.
    pub async fn sweep(&self) -> Vec<RoomId> {
        let now = Instant::now();
        let handles: Vec<RoomHandle> = self
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut removed = Vec::new();
        for handle in handles {
            let verdict = match handle.info().await {
                Err(_) => Some(RemovalReason::Unresponsive),
                Ok(info) => match info.ended_at {
                    Some(ended) => (now.saturating_duration_since(ended)
                        >= self.config.finished_linger)
                        .then_some(RemovalReason::Finished),
                    None => (now.saturating_duration_since(info.last_activity)
                        >= self.config.idle_timeout)
                        .then_some(RemovalReason::Idle),
                },
            };
            if let Some(reason) = verdict {
                let room_id = handle.room_id().clone();
                self.remove(&room_id, reason).await;
                removed.push(room_id);
            }
        }
        removed
    }

    /// Sweeps every `sweep_interval` until the task is dropped.
    pub async fn run_sweeper(self: Arc<Self>) {
        let mut ticker = time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = self.sweep().await;
            if !removed.is_empty() {
                tracing::debug!(count = removed.len(), "registry sweep removed rooms");
            }
        }
    }

    /// Lists every live room. Rooms that fail to answer are skipped.
    pub async fn list_rooms(&self) -> Vec<RoomListEntry> {
        let handles: Vec<RoomHandle> = self
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut rooms = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = handle.info().await {
                rooms.push(list_entry(&info));
            }
        }
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Subscribes to room creation and removal.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomLifecycle> {
        self.lifecycle.subscribe()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    async fn remove(&self, room_id: &RoomId, reason: RemovalReason) {
        let Some((_, handle)) = self.rooms.remove(room_id) else {
            return;
        };
        let _ = handle.shutdown(reason.to_string()).await;
        tracing::info!(%room_id, %reason, "room removed");
        let _ = self.lifecycle.send(RoomLifecycle::Removed {
            room_id: room_id.clone(),
            reason,
        });
    }
}

fn list_entry(info: &RoomInfo) -> RoomListEntry {
    RoomListEntry {
        room_id: info.room_id.clone(),
        mode: info.mode,
        phase: info.phase,
        participant_count: info.participant_count,
        max_players: info.max_players,
    }
}
