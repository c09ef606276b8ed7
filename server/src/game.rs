//! Authoritative game world
//!
//! `GameWorld` owns the canonical [`WorldState`] and is its only writer: every
//! change, whether it comes from a client, from the server's own lifecycle
//! decisions or from an entity component, is an [`Action`] run through the
//! reducer. Reducer faults are logged and the offending action is skipped;
//! the rest of the tick carries on.

use log::{debug, info, warn};
use rand::Rng;
use shared::{
    Action, Dispatcher, Entity, EntityFactory, EntityPool, GameConfig, NullRenderHost, Packet,
    ReconcileReport, Reducer, Snapshot, WorldState,
};
use std::time::Duration;
use tokio::sync::mpsc;

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const RED_BASE_ID: &str = "base-red";
pub const BLUE_BASE_ID: &str = "base-blue";
pub const FLAG_ID: &str = "flag";

/// Horizontal spread applied around a team's spawn point
const SPAWN_JITTER: f32 = 24.0;

pub struct GameWorld {
    state: WorldState,
    reducer: Reducer,
    pool: EntityPool,
    dispatcher: Dispatcher,
    component_actions: mpsc::UnboundedReceiver<Action>,
    config: GameConfig,
    next_player_id: u32,
    sequence: u32,
    pub tick: u32,
}

impl GameWorld {
    /// Creates a world with a red and a blue base and a neutral flag between them
    pub fn new(config: GameConfig) -> Self {
        let (dispatcher, component_actions) = Dispatcher::channel();
        let mut world = Self {
            state: WorldState::new(),
            reducer: Reducer::new(config.spawn_offset),
            pool: EntityPool::new(EntityFactory::new(config.clone())),
            dispatcher,
            component_actions,
            config,
            next_player_id: 1,
            sequence: 0,
            tick: 0,
        };

        let mid_y = WORLD_HEIGHT / 2.0;
        for entity in [
            Entity::base(RED_BASE_ID, "red", 100.0, mid_y),
            Entity::base(BLUE_BASE_ID, "blue", WORLD_WIDTH - 100.0, mid_y),
            Entity::flag(FLAG_ID, WORLD_WIDTH / 2.0, mid_y),
        ] {
            world.apply(&Action::AddEntity { entity });
        }

        world
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn pool(&self) -> &EntityPool {
        &self.pool
    }

    /// Dispatcher feeding the world's action queue
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Runs one action through the reducer
    ///
    /// Returns false, leaving the state untouched, when the reducer rejects it.
    pub fn apply(&mut self, action: &Action) -> bool {
        match self.reducer.reduce(&self.state, action) {
            Ok(next) => {
                self.state = next;
                true
            }
            Err(e) => {
                warn!("Skipping {}: {}", action.kind(), e);
                false
            }
        }
    }

    /// Adds a player for a newly connected client and puts it on a team
    ///
    /// Returns the new player's entity id.
    pub fn spawn_player(&mut self, name: &str) -> Option<String> {
        let player_id = format!("player-{}", self.next_player_id);
        self.next_player_id += 1;

        let player = Entity::player(
            &player_id,
            0.0,
            0.0,
            self.config.player_health,
            self.config.player_damage,
        );
        if !self.apply(&Action::AddEntity { entity: player }) {
            return None;
        }
        self.apply(&Action::AssignTeam {
            id: player_id.clone(),
        });

        if let Some(spawned) = self.state.entity(&player_id) {
            let jitter = rand::thread_rng().gen_range(-SPAWN_JITTER..=SPAWN_JITTER);
            let (x, y) = (spawned.x + jitter, spawned.y);
            self.apply(&Action::SetPosition {
                id: player_id.clone(),
                x,
                y,
            });
        }

        let team = self
            .state
            .entity(&player_id)
            .and_then(|p| p.team.clone())
            .unwrap_or_default();
        info!("Spawned {} for {} on team {}", player_id, name, team);
        Some(player_id)
    }

    /// Takes a player out of its team and out of the world
    pub fn remove_player(&mut self, player_id: &str) {
        self.apply(&Action::LeaveTeam {
            id: player_id.to_string(),
        });
        self.apply(&Action::RemoveEntity {
            id: player_id.to_string(),
        });
        info!("Removed player {}", player_id);
    }

    /// Applies an action submitted by the client controlling `player_id`
    ///
    /// Clients may only act as their own player; server-side transitions
    /// (spawning, teams, death, time) are refused.
    pub fn apply_client_action(&mut self, player_id: &str, action: &Action) -> bool {
        match action.actor_id() {
            Some(actor) if actor == player_id => self.apply(action),
            Some(actor) => {
                warn!(
                    "Refusing {} for {} from client controlling {}",
                    action.kind(),
                    actor,
                    player_id
                );
                false
            }
            None => {
                warn!(
                    "Refusing server-only {} from client controlling {}",
                    action.kind(),
                    player_id
                );
                false
            }
        }
    }

    /// Advances the simulation by `dt`
    ///
    /// Applies everything components queued since the previous tick, moves the
    /// clock forward and lets the components observe the new state. Actions
    /// they emit now are applied on the next tick.
    pub fn tick(&mut self, dt: Duration) -> ReconcileReport {
        let mut applied = 0;
        while let Ok(action) = self.component_actions.try_recv() {
            if self.apply(&action) {
                applied += 1;
            }
        }
        if applied > 0 {
            debug!("Tick {}: applied {} component actions", self.tick, applied);
        }

        self.apply(&Action::AdvanceTime {
            elapsed: dt.as_secs_f64() * 1000.0,
        });
        self.tick = self.tick.wrapping_add(1);

        self.pool
            .reconcile(self.state.entities(), &self.dispatcher, &mut NullRenderHost)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.to_snapshot()
    }

    /// Builds the next snapshot packet, stamping it with a fresh sequence number
    pub fn next_snapshot_packet(&mut self) -> Packet {
        self.sequence = self.sequence.wrapping_add(1);
        Packet::Snapshot {
            sequence: self.sequence,
            snapshot: self.snapshot(),
        }
    }

    pub fn num_players(&self) -> usize {
        self.pool.num_players()
    }
}
