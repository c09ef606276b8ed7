//! World state tree: entity props, elapsed time and the snapshot payload
//!
//! `WorldState` is a value type. Cloning it copies two reference counts;
//! the reducer produces a new root through `Arc::make_mut`, which copies
//! only the entity list spine and the entities it touches. Every other
//! entity stays shared with the previous state.

use crate::error::{InvalidPropsError, ReduceError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const PLAYER: &str = "player";
pub const FLAG: &str = "flag";
pub const BASE: &str = "base";

/// Entity variants the factory knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Flag,
    Base,
}

impl EntityKind {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            PLAYER => Some(EntityKind::Player),
            FLAG => Some(EntityKind::Flag),
            BASE => Some(EntityKind::Base),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Player => PLAYER,
            EntityKind::Flag => FLAG,
            EntityKind::Base => BASE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Facing {
    Left,
    Right,
    Up,
    #[default]
    Down,
}

/// Props of a single simulated object
///
/// Team entities (bases) use `players` to hold the ids of their members;
/// players point back at their base through `team`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub animation: String,
    pub facing: Facing,
    pub is_attacking: bool,
    pub is_dead: bool,
    pub health: i32,
    pub current_health: i32,
    pub damage: i32,
    pub team: Option<String>,
    pub color: Option<String>,
    pub last_attacker_id: Option<String>,
    pub num_kills: u32,
    pub num_deaths: u32,
    pub players: Vec<String>,
    /// Revive delay in milliseconds, zero means "use the configured default"
    pub revive_duration: u64,
}

impl Default for Entity {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: String::new(),
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            animation: "idle".to_string(),
            facing: Facing::default(),
            is_attacking: false,
            is_dead: false,
            health: 0,
            current_health: 0,
            damage: 0,
            team: None,
            color: None,
            last_attacker_id: None,
            num_kills: 0,
            num_deaths: 0,
            players: Vec::new(),
            revive_duration: 0,
        }
    }
}

impl Entity {
    pub fn player(id: &str, x: f32, y: f32, health: i32, damage: i32) -> Self {
        Self {
            id: id.to_string(),
            kind: PLAYER.to_string(),
            x,
            y,
            health,
            current_health: health,
            damage,
            ..Self::default()
        }
    }

    pub fn base(id: &str, color: &str, x: f32, y: f32) -> Self {
        Self {
            id: id.to_string(),
            kind: BASE.to_string(),
            x,
            y,
            color: Some(color.to_string()),
            ..Self::default()
        }
    }

    pub fn flag(id: &str, x: f32, y: f32) -> Self {
        Self {
            id: id.to_string(),
            kind: FLAG.to_string(),
            x,
            y,
            ..Self::default()
        }
    }

    pub fn entity_kind(&self) -> Option<EntityKind> {
        EntityKind::parse(&self.kind)
    }

    pub fn is_team(&self) -> bool {
        self.entity_kind() == Some(EntityKind::Base)
    }

    /// Checks that the record can be keyed and dispatched on
    pub fn validate(&self) -> Result<(), InvalidPropsError> {
        if self.id.is_empty() {
            return Err(InvalidPropsError::MissingId);
        }
        if self.kind.is_empty() {
            return Err(InvalidPropsError::MissingType {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Returns the canonical shape stored by `ADD_ENTITY`
    pub fn normalized(mut self) -> Result<Self, InvalidPropsError> {
        self.validate()?;

        self.health = self.health.max(0);
        self.damage = self.damage.max(0);
        self.current_health = self.current_health.clamp(0, self.health);

        if self.is_dead {
            self.current_health = 0;
        } else if self.health > 0 && self.current_health == 0 {
            self.is_dead = true;
        }

        if self.is_team() {
            let mut seen = Vec::with_capacity(self.players.len());
            for player_id in self.players.drain(..) {
                if !seen.contains(&player_id) {
                    seen.push(player_id);
                }
            }
            self.players = seen;
        } else {
            self.players.clear();
        }

        Ok(self)
    }
}

/// Where a player appears when joining or reviving on a team
pub fn spawn_position(base: &Entity, offset: f32) -> (f32, f32) {
    (base.x, base.y + offset)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeState {
    pub elapsed: f64,
}

/// Authoritative payload broadcast from server to clients
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub entities: Vec<Entity>,
    pub time: TimeState,
}

/// Root of the world state tree
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    entities: Arc<Vec<Arc<Entity>>>,
    index: Arc<HashMap<String, usize>>,
    time: TimeState,
}

impl PartialEq for WorldState {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.entities == other.entities
    }
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from an authoritative snapshot
    ///
    /// Records are kept exactly as received, including malformed ones, so
    /// that the entity pool can report them. Only records with an id are
    /// indexed; the first occurrence of an id wins.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let entities: Vec<Arc<Entity>> = snapshot.entities.into_iter().map(Arc::new).collect();
        let index = build_index(&entities);

        Self {
            entities: Arc::new(entities),
            index: Arc::new(index),
            time: snapshot.time,
        }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            entities: self.entities.iter().map(|e| e.as_ref().clone()).collect(),
            time: self.time,
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().map(|e| e.as_ref())
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.index.get(id).map(|&i| self.entities[i].as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn elapsed(&self) -> f64 {
        self.time.elapsed
    }

    pub fn time(&self) -> TimeState {
        self.time
    }

    /// Team entity with the fewest assigned players, first one on ties
    pub fn weakest_team(&self) -> Option<&Entity> {
        self.weakest_team_by(|team| team.players.len())
    }

    /// Team `player_id` would join, leaving the player's current seat out of the count
    pub fn weakest_team_for(&self, player_id: &str) -> Option<&Entity> {
        self.weakest_team_by(|team| team.players.iter().filter(|p| *p != player_id).count())
    }

    fn weakest_team_by<F>(&self, size: F) -> Option<&Entity>
    where
        F: Fn(&Entity) -> usize,
    {
        self.entities()
            .filter(|e| e.is_team())
            .fold(None, |weakest: Option<(&Entity, usize)>, team| {
                let team_size = size(team);
                match weakest {
                    Some((w, n)) if n <= team_size => Some((w, n)),
                    _ => Some((team, team_size)),
                }
            })
            .map(|(team, _)| team)
    }

    /// Team entity whose `players` set contains the given id
    pub fn team_of(&self, player_id: &str) -> Option<&Entity> {
        self.entities()
            .find(|e| e.is_team() && e.players.iter().any(|p| p == player_id))
    }

    /// True when both states hold the very same allocation for `id`
    pub fn shares_entity_with(&self, other: &WorldState, id: &str) -> bool {
        match (self.index.get(id), other.index.get(id)) {
            (Some(&a), Some(&b)) => Arc::ptr_eq(&self.entities[a], &other.entities[b]),
            _ => false,
        }
    }

    pub(crate) fn index_of(&self, id: &str) -> Result<usize, ReduceError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ReduceError::EntityNotFound { id: id.to_string() })
    }

    pub(crate) fn entity_at(&self, index: usize) -> &Entity {
        self.entities[index].as_ref()
    }

    pub(crate) fn entity_at_mut(&mut self, index: usize) -> &mut Entity {
        Arc::make_mut(&mut Arc::make_mut(&mut self.entities)[index])
    }

    pub(crate) fn push(&mut self, entity: Entity) {
        let position = self.entities.len();
        Arc::make_mut(&mut self.index).insert(entity.id.clone(), position);
        Arc::make_mut(&mut self.entities).push(Arc::new(entity));
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        if !self.index.contains_key(id) {
            return false;
        }
        let entities = Arc::make_mut(&mut self.entities);
        entities.retain(|e| e.id != id);
        self.index = Arc::new(build_index(entities));
        true
    }

    pub(crate) fn time_mut(&mut self) -> &mut TimeState {
        &mut self.time
    }
}

fn build_index(entities: &[Arc<Entity>]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(entities.len());
    for (position, entity) in entities.iter().enumerate() {
        if entity.id.is_empty() {
            continue;
        }
        index.entry(entity.id.clone()).or_insert(position);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parse() {
        assert_eq!(EntityKind::parse("player"), Some(EntityKind::Player));
        assert_eq!(EntityKind::parse("flag"), Some(EntityKind::Flag));
        assert_eq!(EntityKind::parse("base"), Some(EntityKind::Base));
        assert_eq!(EntityKind::parse("dragon"), None);
        assert_eq!(EntityKind::Base.as_str(), "base");
    }

    #[test]
    fn test_normalize_rejects_missing_id() {
        let entity = Entity {
            kind: PLAYER.to_string(),
            ..Entity::default()
        };
        assert_eq!(entity.normalized(), Err(InvalidPropsError::MissingId));
    }

    #[test]
    fn test_normalize_rejects_missing_type() {
        let entity = Entity {
            id: "p1".to_string(),
            ..Entity::default()
        };
        assert_eq!(
            entity.normalized(),
            Err(InvalidPropsError::MissingType {
                id: "p1".to_string()
            })
        );
    }

    #[test]
    fn test_normalize_clamps_health() {
        let mut entity = Entity::player("p1", 0.0, 0.0, 100, 10);
        entity.current_health = 250;
        let entity = entity.normalized().unwrap();
        assert_eq!(entity.current_health, 100);
        assert!(!entity.is_dead);

        let mut entity = Entity::player("p2", 0.0, 0.0, 100, 10);
        entity.current_health = -5;
        let entity = entity.normalized().unwrap();
        assert_eq!(entity.current_health, 0);
        assert!(entity.is_dead);
    }

    #[test]
    fn test_normalize_clamps_negative_damage() {
        let entity = Entity::player("p1", 0.0, 0.0, 100, -40).normalized().unwrap();
        assert_eq!(entity.damage, 0);
    }

    #[test]
    fn test_normalize_dead_entity_has_no_health() {
        let mut entity = Entity::player("p1", 0.0, 0.0, 100, 10);
        entity.is_dead = true;
        let entity = entity.normalized().unwrap();
        assert_eq!(entity.current_health, 0);
    }

    #[test]
    fn test_normalize_players_only_on_teams() {
        let mut base = Entity::base("red", "red", 0.0, 0.0);
        base.players = vec!["a".into(), "b".into(), "a".into()];
        assert_eq!(base.normalized().unwrap().players, vec!["a", "b"]);

        let mut flag = Entity::flag("flag", 0.0, 0.0);
        flag.players = vec!["a".into()];
        assert!(flag.normalized().unwrap().players.is_empty());
    }

    #[test]
    fn test_spawn_position_is_below_base() {
        let base = Entity::base("red", "red", 100.0, 200.0);
        assert_eq!(spawn_position(&base, 32.0), (100.0, 232.0));
    }

    #[test]
    fn test_snapshot_round_trip_keeps_order() {
        let snapshot = Snapshot {
            entities: vec![
                Entity::base("red", "red", 0.0, 0.0),
                Entity::flag("flag", 5.0, 5.0),
                Entity::player("p1", 1.0, 2.0, 100, 10),
            ],
            time: TimeState { elapsed: 42.0 },
        };

        let state = WorldState::from_snapshot(snapshot.clone());
        assert_eq!(state.len(), 3);
        assert_eq!(state.elapsed(), 42.0);
        assert_eq!(state.entity("flag").unwrap().x, 5.0);
        assert_eq!(state.to_snapshot(), snapshot);
    }

    #[test]
    fn test_from_snapshot_keeps_malformed_records_unindexed() {
        let snapshot = Snapshot {
            entities: vec![Entity::default(), Entity::flag("flag", 0.0, 0.0)],
            time: TimeState::default(),
        };

        let state = WorldState::from_snapshot(snapshot);
        assert_eq!(state.len(), 2);
        assert!(state.contains("flag"));
        assert!(!state.contains(""));
    }

    #[test]
    fn test_weakest_team_prefers_first_on_tie() {
        let mut state = WorldState::new();
        state.push(Entity::base("red", "red", 0.0, 0.0));
        state.push(Entity::base("blue", "blue", 0.0, 0.0));
        assert_eq!(state.weakest_team().unwrap().id, "red");

        let index = state.index_of("red").unwrap();
        state.entity_at_mut(index).players.push("p1".to_string());
        assert_eq!(state.weakest_team().unwrap().id, "blue");
    }

    #[test]
    fn test_weakest_team_for_ignores_own_seat() {
        let mut state = WorldState::new();
        state.push(Entity::base("red", "red", 0.0, 0.0));
        state.push(Entity::base("blue", "blue", 0.0, 0.0));

        let index = state.index_of("red").unwrap();
        state.entity_at_mut(index).players.push("p1".to_string());
        assert_eq!(state.weakest_team_for("p1").unwrap().id, "red");
        assert_eq!(state.weakest_team_for("p2").unwrap().id, "blue");
    }

    #[test]
    fn test_remove_rebuilds_index() {
        let mut state = WorldState::new();
        state.push(Entity::flag("a", 0.0, 0.0));
        state.push(Entity::flag("b", 0.0, 0.0));
        state.push(Entity::flag("c", 0.0, 0.0));

        assert!(state.remove("a"));
        assert!(!state.remove("a"));
        assert_eq!(state.index_of("c").unwrap(), 1);
        assert_eq!(state.entity_at(0).id, "b");
    }

    #[test]
    fn test_clone_then_mutate_leaves_original() {
        let mut original = WorldState::new();
        original.push(Entity::flag("a", 0.0, 0.0));
        original.push(Entity::flag("b", 0.0, 0.0));

        let mut next = original.clone();
        let index = next.index_of("a").unwrap();
        next.entity_at_mut(index).x = 10.0;

        assert_eq!(original.entity("a").unwrap().x, 0.0);
        assert_eq!(next.entity("a").unwrap().x, 10.0);
        assert!(next.shares_entity_with(&original, "b"));
        assert!(!next.shares_entity_with(&original, "a"));
    }
}
