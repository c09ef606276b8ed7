//! # Capture-the-Flag Simulation Core
//!
//! Types and logic shared by the authoritative server and the client.
//!
//! ## State and Transitions
//!
//! The world is a [`WorldState`] value: an ordered list of entity props plus an
//! elapsed-time accumulator. The only writer is the [`reducer`], a pure
//! function from `(state, action)` to a new state. Unchanged entities are shared
//! between the old and the new state, so keeping previous states around is
//! cheap and a transition never mutates the state it was given.
//!
//! A lookup of an id that is not in the world fails with
//! [`ReduceError::EntityNotFound`]; hosts log the error and skip the action
//! rather than halting the tick.
//!
//! ## Entities and Components
//!
//! Live entities ([`GameEntity`]) are built from props by the
//! [`EntityFactory`] and carry a fixed set of [`component`]s. Components only
//! read props; writes go back through a [`Dispatcher`] into the host's action
//! queue. Deferred re-entries such as the revive timer are owned by the
//! component and cancelled when the entity is destroyed.
//!
//! ## Reconciliation
//!
//! [`EntityPool`] aligns a set of live entities with an authoritative entity
//! list, creating, updating and destroying by id.
//!
//! ## Wire Protocol
//!
//! [`Packet`] is the bincode-encoded UDP payload exchanged between client and
//! server. Snapshots carry a sequence number used by the client to estimate
//! packet loss; latency probes are echoed unchanged.

pub mod action;
pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod pool;
pub mod reducer;
pub mod state;

pub use action::{Action, ActionKind};
pub use component::{Controls, Dispatcher, InputSource};
pub use config::GameConfig;
pub use entity::{EntityFactory, GameEntity};
pub use error::{InvalidPropsError, ReduceError};
pub use pool::{EntityPool, NullRenderHost, ReconcileReport, RenderHost};
pub use reducer::{reduce, Reducer};
pub use state::{Entity, EntityKind, Facing, Snapshot, TimeState, WorldState};

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Protocol revision sent in `Connect`
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
    },
    Action {
        action: Action,
    },
    /// Client probe; the server sends the same packet back untouched
    Latency {
        timestamp: u64,
    },
    Disconnect,

    Connected {
        client_id: u32,
        player_id: String,
    },
    Snapshot {
        sequence: u32,
        snapshot: Snapshot,
    },
    Disconnected {
        reason: String,
    },
}

/// Wall clock in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u64::MAX as u128) as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: "alice".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect {
                client_version,
                name,
            } => {
                assert_eq!(client_version, PROTOCOL_VERSION);
                assert_eq!(name, "alice");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_snapshot() {
        let mut player = Entity::player("player-1", 10.0, 20.0, 100, 10);
        player.team = Some("red".to_string());
        player.color = Some("red".to_string());

        let packet = Packet::Snapshot {
            sequence: 42,
            snapshot: Snapshot {
                entities: vec![Entity::base("red", "red", 0.0, 0.0), player],
                time: TimeState { elapsed: 1600.0 },
            },
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Snapshot { sequence, snapshot } => {
                assert_eq!(sequence, 42);
                assert_eq!(snapshot.entities.len(), 2);
                assert_eq!(snapshot.entities[1].team.as_deref(), Some("red"));
                assert_eq!(snapshot.time.elapsed, 1600.0);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_action() {
        let packet = Packet::Action {
            action: Action::SetFacing {
                id: "player-1".to_string(),
                facing: Facing::Left,
            },
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_garbage_does_not_decode() {
        let garbage = [0xffu8, 0xff, 0xff, 0xff, 0x01];
        assert!(bincode::deserialize::<Packet>(&garbage).is_err());
    }

    #[test]
    fn test_now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
