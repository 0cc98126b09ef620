//! Server configuration, with an environment loader.

use std::str::FromStr;
use std::time::Duration;

use fundplay_gateway::GatewayConfig;
use fundplay_room::{RegistryConfig, RoomConfig};

use crate::FundplayError;

/// Everything a server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address. Default `127.0.0.1:8080`.
    pub bind_addr: String,
    /// The first frame must be a handshake within this long.
    pub handshake_timeout: Duration,
    /// A connection that sends nothing for this long is dropped.
    /// Clients keep it open with heartbeats.
    pub idle_timeout: Duration,
    /// Defaults merged with each room's settings.
    pub room: RoomConfig,
    pub registry: RegistryConfig,
    pub gateway: GatewayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(15),
            room: RoomConfig::default(),
            registry: RegistryConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `FUNDPLAY_*` variables from the process environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `FUNDPLAY_BIND_ADDR` | `bind_addr` |
    /// | `FUNDPLAY_HANDSHAKE_TIMEOUT_SECS` | `handshake_timeout` |
    /// | `FUNDPLAY_IDLE_TIMEOUT_SECS` | `idle_timeout` |
    /// | `FUNDPLAY_RECONNECT_GRACE_SECS` | `gateway.reconnect_grace` |
    /// | `FUNDPLAY_AUTOPLAY_INTERVAL_MS` | `room.autoplay_interval` |
    /// | `FUNDPLAY_MAX_PLAYERS` | `room.max_players` |
    /// | `FUNDPLAY_ROOM_IDLE_SECS` | `registry.idle_timeout` |
    /// | `FUNDPLAY_SWEEP_INTERVAL_SECS` | `registry.sweep_interval` |
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    /// [`FundplayError::Config`] for an unparsable value,
    /// [`FundplayError::Room`] if the room defaults fail validation.
    pub fn from_env() -> Result<Self, FundplayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FundplayError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("FUNDPLAY_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(secs) = parse(&lookup, "FUNDPLAY_HANDSHAKE_TIMEOUT_SECS")? {
            config.handshake_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "FUNDPLAY_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "FUNDPLAY_RECONNECT_GRACE_SECS")? {
            config.gateway.reconnect_grace = Duration::from_secs(secs);
        }
        if let Some(ms) = parse(&lookup, "FUNDPLAY_AUTOPLAY_INTERVAL_MS")? {
            config.room.autoplay_interval = Duration::from_millis(ms);
        }
        if let Some(max) = parse(&lookup, "FUNDPLAY_MAX_PLAYERS")? {
            config.room.max_players = max;
        }
        if let Some(secs) = parse(&lookup, "FUNDPLAY_ROOM_IDLE_SECS")? {
            config.registry.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, "FUNDPLAY_SWEEP_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(FundplayError::Config {
                    key: "FUNDPLAY_SWEEP_INTERVAL_SECS",
                    value: secs.to_string(),
                    reason: "must be positive".into(),
                });
            }
            config.registry.sweep_interval = Duration::from_secs(secs);
        }

        config.room.validate()?;
        Ok(config)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, FundplayError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| FundplayError::Config {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        })
}
