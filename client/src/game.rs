//! Client-side world store
//!
//! The client keeps its own copy of the world. Authoritative snapshots
//! replace it wholesale; in between, locally dispatched actions are run
//! through the shared reducer so the local player reacts without waiting
//! for the next snapshot.

use log::{debug, warn};
use shared::{Action, Reducer, Snapshot, WorldState};

/// Host-side state container the sync layer writes to
pub trait Store {
    fn dispatch(&mut self, action: Action);
    fn set_state(&mut self, snapshot: Snapshot);
    fn state(&self) -> &WorldState;
}

pub struct ClientStore {
    state: WorldState,
    reducer: Reducer,
    local_player_id: Option<String>,
    outbound: Vec<Action>,
    updates: u64,
}

impl ClientStore {
    pub fn new(reducer: Reducer) -> Self {
        Self {
            state: WorldState::new(),
            reducer,
            local_player_id: None,
            outbound: Vec::new(),
            updates: 0,
        }
    }

    pub fn set_local_player(&mut self, player_id: &str) {
        self.local_player_id = Some(player_id.to_string());
    }

    pub fn local_player_id(&self) -> Option<&str> {
        self.local_player_id.as_deref()
    }

    /// Number of times the store's state was replaced or updated
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Takes the actions that should be sent to the server
    pub fn take_outbound(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.outbound)
    }

    fn is_forwardable(&self, action: &Action) -> bool {
        match (action.actor_id(), self.local_player_id.as_deref()) {
            (Some(actor), Some(local)) => actor == local,
            _ => false,
        }
    }
}

impl Default for ClientStore {
    fn default() -> Self {
        Self::new(Reducer::default())
    }
}

impl Store for ClientStore {
    /// Predicts the action locally and, if the local player performs it,
    /// queues it for the server
    ///
    /// Transitions the server decides alone (kills, revives, teams) are only
    /// predicted; the next snapshot confirms or overrides them.
    fn dispatch(&mut self, action: Action) {
        self.updates += 1;

        match self.reducer.reduce(&self.state, &action) {
            Ok(next) => self.state = next,
            Err(e) => warn!("Skipping local {}: {}", action.kind(), e),
        }

        if self.is_forwardable(&action) {
            self.outbound.push(action);
        } else {
            debug!("Keeping {} local", action.kind());
        }
    }

    fn set_state(&mut self, snapshot: Snapshot) {
        self.updates += 1;
        self.state = WorldState::from_snapshot(snapshot);
    }

    fn state(&self) -> &WorldState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Entity, Facing, TimeState};

    fn snapshot() -> Snapshot {
        Snapshot {
            entities: vec![
                Entity::base("base-red", "red", 100.0, 300.0),
                Entity::player("player-1", 100.0, 332.0, 100, 10),
                Entity::player("player-2", 700.0, 332.0, 100, 10),
            ],
            time: TimeState { elapsed: 500.0 },
        }
    }

    #[test]
    fn test_set_state_replaces_world() {
        let mut store = ClientStore::default();
        store.set_state(snapshot());

        assert_eq!(store.state().len(), 3);
        assert_eq!(store.state().elapsed(), 500.0);
        assert_eq!(store.updates(), 1);
    }

    #[test]
    fn test_dispatch_predicts_locally() {
        let mut store = ClientStore::default();
        store.set_state(snapshot());
        store.set_local_player("player-1");

        store.dispatch(Action::SetFacing {
            id: "player-1".to_string(),
            facing: Facing::Left,
        });

        assert_eq!(
            store.state().entity("player-1").unwrap().facing,
            Facing::Left
        );
        assert_eq!(store.take_outbound().len(), 1);
        assert!(store.take_outbound().is_empty());
    }

    #[test]
    fn test_only_local_player_actions_are_forwarded() {
        let mut store = ClientStore::default();
        store.set_state(snapshot());
        store.set_local_player("player-1");

        store.dispatch(Action::EndAttack {
            id: "player-2".to_string(),
        });
        store.dispatch(Action::KillEntity {
            id: "player-1".to_string(),
            last_attacker_id: None,
        });

        assert!(store.take_outbound().is_empty());
        assert!(store.state().entity("player-1").unwrap().is_dead);
    }

    #[test]
    fn test_faulty_local_action_keeps_state() {
        let mut store = ClientStore::default();
        store.set_state(snapshot());
        let before = store.state().clone();

        store.dispatch(Action::SetPosition {
            id: "ghost".to_string(),
            x: 1.0,
            y: 1.0,
        });
        assert_eq!(store.state(), &before);
    }
}
