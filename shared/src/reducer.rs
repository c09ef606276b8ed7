//! The state transition function
//!
//! Every transition takes the previous [`WorldState`] by reference and
//! returns a new root; the previous state is never touched. Lookups go
//! through the id index, so an action naming an unknown id fails with
//! [`ReduceError::EntityNotFound`] instead of addressing a wrong slot.

use crate::action::Action;
use crate::config::SPAWN_OFFSET;
use crate::error::ReduceError;
use crate::state::{spawn_position, Entity, Facing, WorldState};

pub type ReduceResult = Result<WorldState, ReduceError>;

/// Applies actions to world states
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reducer {
    spawn_offset: f32,
}

impl Default for Reducer {
    fn default() -> Self {
        Self {
            spawn_offset: SPAWN_OFFSET,
        }
    }
}

impl Reducer {
    pub fn new(spawn_offset: f32) -> Self {
        Self { spawn_offset }
    }

    pub fn reduce(&self, state: &WorldState, action: &Action) -> ReduceResult {
        match action {
            Action::AddEntity { entity } => add_entity(state, entity.clone()),
            Action::RemoveEntity { id } => Ok(remove_entity(state, id)),
            Action::AssignTeam { id } => assign_team(state, id, self.spawn_offset),
            Action::LeaveTeam { id } => Ok(leave_team(state, id)),
            Action::SetPosition { id, x, y } => set_position(state, id, *x, *y),
            Action::SetVelocity { id, vx, vy } => set_velocity(state, id, *vx, *vy),
            Action::SetAnimation { id, animation } => set_animation(state, id, animation),
            Action::SetFacing { id, facing } => set_facing(state, id, *facing),
            Action::BeginAttack { id } => set_is_attacking(state, id, true),
            Action::EndAttack { id } => set_is_attacking(state, id, false),
            Action::DamageEntity { id, victim_id } => damage_entity(state, id, victim_id),
            Action::KillEntity {
                id,
                last_attacker_id,
            } => kill_entity(state, id, last_attacker_id.as_deref()),
            Action::ReviveEntity { id } => revive_entity(state, id, self.spawn_offset),
            Action::TagFlag { flag_id, player_id } => tag_flag(state, flag_id, player_id),
            Action::AdvanceTime { elapsed } => Ok(advance_time(state, *elapsed)),
        }
    }
}

/// Applies one action with the default spawn offset
pub fn reduce(state: &WorldState, action: &Action) -> ReduceResult {
    Reducer::default().reduce(state, action)
}

pub fn add_entity(state: &WorldState, entity: Entity) -> ReduceResult {
    let entity = entity.normalized()?;
    if state.contains(&entity.id) {
        return Err(ReduceError::DuplicateEntity { id: entity.id });
    }

    let mut next = state.clone();
    next.push(entity);
    Ok(next)
}

pub fn remove_entity(state: &WorldState, id: &str) -> WorldState {
    let mut next = state.clone();
    next.remove(id);
    next
}

pub fn assign_team(state: &WorldState, id: &str, spawn_offset: f32) -> ReduceResult {
    let player_index = state.index_of(id)?;
    let team = state.weakest_team_for(id).ok_or(ReduceError::NoTeams)?;
    let team_index = state.index_of(&team.id)?;
    let (x, y) = spawn_position(team, spawn_offset);
    let team_id = team.id.clone();
    let team_color = team.color.clone();

    let previous_teams: Vec<usize> = state
        .entities()
        .enumerate()
        .filter(|(i, e)| *i != team_index && e.is_team() && e.players.iter().any(|p| p == id))
        .map(|(i, _)| i)
        .collect();

    let mut next = state.clone();
    for index in previous_teams {
        next.entity_at_mut(index).players.retain(|p| p != id);
    }
    {
        let team = next.entity_at_mut(team_index);
        if !team.players.iter().any(|p| p == id) {
            team.players.push(id.to_string());
        }
    }
    let player = next.entity_at_mut(player_index);
    player.x = x;
    player.y = y;
    player.team = Some(team_id);
    player.color = team_color;
    Ok(next)
}

/// Removes the player from its team's `players` set
///
/// The player keeps its own `team` and `color` fields.
pub fn leave_team(state: &WorldState, id: &str) -> WorldState {
    let team_id = match state.team_of(id) {
        Some(team) => team.id.clone(),
        None => return state.clone(),
    };

    let mut next = state.clone();
    if let Ok(team_index) = next.index_of(&team_id) {
        next.entity_at_mut(team_index).players.retain(|p| p != id);
    }
    next
}

pub fn set_position(state: &WorldState, id: &str, x: f32, y: f32) -> ReduceResult {
    update_entity(state, id, |entity| {
        entity.x = x;
        entity.y = y;
    })
}

pub fn set_velocity(state: &WorldState, id: &str, vx: f32, vy: f32) -> ReduceResult {
    update_entity(state, id, |entity| {
        entity.vx = vx;
        entity.vy = vy;
    })
}

pub fn set_animation(state: &WorldState, id: &str, animation: &str) -> ReduceResult {
    update_entity(state, id, |entity| entity.animation = animation.to_string())
}

pub fn set_facing(state: &WorldState, id: &str, facing: Facing) -> ReduceResult {
    update_entity(state, id, |entity| entity.facing = facing)
}

pub fn set_is_attacking(state: &WorldState, id: &str, value: bool) -> ReduceResult {
    update_entity(state, id, |entity| entity.is_attacking = value)
}

/// Subtracts the attacker's damage from the victim
///
/// Entities of the same color never damage each other. The health floor is
/// left to `kill_entity`, which the victim's health component dispatches.
pub fn damage_entity(state: &WorldState, id: &str, victim_id: &str) -> ReduceResult {
    let attacker = state.entity_at(state.index_of(id)?);
    let victim_index = state.index_of(victim_id)?;
    let victim = state.entity_at(victim_index);

    if attacker.color == victim.color || victim.is_dead {
        return Ok(state.clone());
    }

    let damage = attacker.damage.max(0);
    let mut next = state.clone();
    let victim = next.entity_at_mut(victim_index);
    victim.current_health = victim.current_health.saturating_sub(damage);
    victim.last_attacker_id = Some(id.to_string());
    Ok(next)
}

pub fn kill_entity(state: &WorldState, id: &str, last_attacker_id: Option<&str>) -> ReduceResult {
    let victim_index = state.index_of(id)?;
    // An attacker that already left the world gets no credit
    let attacker_index = last_attacker_id.and_then(|attacker| state.index_of(attacker).ok());

    if state.entity_at(victim_index).is_dead {
        return Ok(state.clone());
    }

    let mut next = state.clone();
    {
        let victim = next.entity_at_mut(victim_index);
        victim.is_dead = true;
        victim.current_health = 0;
        victim.num_deaths += 1;
    }
    if let Some(attacker_index) = attacker_index {
        next.entity_at_mut(attacker_index).num_kills += 1;
    }
    Ok(next)
}

pub fn revive_entity(state: &WorldState, id: &str, spawn_offset: f32) -> ReduceResult {
    let index = state.index_of(id)?;
    let entity = state.entity_at(index);

    if !entity.is_dead {
        return Ok(state.clone());
    }

    // Without its base the entity comes back where it fell
    let spawn = entity
        .team
        .as_deref()
        .and_then(|team_id| state.entity(team_id))
        .map(|base| spawn_position(base, spawn_offset));

    let mut next = state.clone();
    let entity = next.entity_at_mut(index);
    if let Some((x, y)) = spawn {
        entity.x = x;
        entity.y = y;
    }
    entity.is_dead = false;
    entity.current_health = entity.health;
    entity.last_attacker_id = None;
    Ok(next)
}

/// Paints the flag in the tagging player's color
pub fn tag_flag(state: &WorldState, flag_id: &str, player_id: &str) -> ReduceResult {
    let player = state.entity_at(state.index_of(player_id)?);
    let flag_index = state.index_of(flag_id)?;

    if state.entity_at(flag_index).color == player.color {
        return Ok(state.clone());
    }

    let color = player.color.clone();
    let mut next = state.clone();
    next.entity_at_mut(flag_index).color = color;
    Ok(next)
}

/// Adds `elapsed` to the clock; non-finite or negative steps are ignored
pub fn advance_time(state: &WorldState, elapsed: f64) -> WorldState {
    if !elapsed.is_finite() || elapsed < 0.0 {
        return state.clone();
    }

    let mut next = state.clone();
    next.time_mut().elapsed += elapsed;
    next
}

fn update_entity<F>(state: &WorldState, id: &str, apply: F) -> ReduceResult
where
    F: FnOnce(&mut Entity),
{
    let index = state.index_of(id)?;
    let mut next = state.clone();
    apply(next.entity_at_mut(index));
    Ok(next)
}
