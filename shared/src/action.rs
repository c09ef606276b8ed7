use crate::state::{Entity, Facing};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag of an [`Action`], matching the wire names of the action vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    AddEntity,
    RemoveEntity,
    AssignTeam,
    LeaveTeam,
    SetPosition,
    SetVelocity,
    SetAnimation,
    SetFacing,
    BeginAttack,
    EndAttack,
    DamageEntity,
    KillEntity,
    ReviveEntity,
    TagFlag,
    AdvanceTime,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::AddEntity => "ADD_ENTITY",
            ActionKind::RemoveEntity => "REMOVE_ENTITY",
            ActionKind::AssignTeam => "ASSIGN_TEAM",
            ActionKind::LeaveTeam => "LEAVE_TEAM",
            ActionKind::SetPosition => "SET_POSITION",
            ActionKind::SetVelocity => "SET_VELOCITY",
            ActionKind::SetAnimation => "SET_ANIMATION",
            ActionKind::SetFacing => "SET_FACING",
            ActionKind::BeginAttack => "BEGIN_ATTACK",
            ActionKind::EndAttack => "END_ATTACK",
            ActionKind::DamageEntity => "DAMAGE_ENTITY",
            ActionKind::KillEntity => "KILL_ENTITY",
            ActionKind::ReviveEntity => "REVIVE_ENTITY",
            ActionKind::TagFlag => "TAG_FLAG",
            ActionKind::AdvanceTime => "ADVANCE_TIME",
        };
        f.write_str(name)
    }
}

/// An intended state transition
///
/// Equality is structural, which is what the client uses to suppress
/// repeated dispatches of the same intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    AddEntity { entity: Entity },
    RemoveEntity { id: String },
    AssignTeam { id: String },
    LeaveTeam { id: String },
    SetPosition { id: String, x: f32, y: f32 },
    SetVelocity { id: String, vx: f32, vy: f32 },
    SetAnimation { id: String, animation: String },
    SetFacing { id: String, facing: Facing },
    BeginAttack { id: String },
    EndAttack { id: String },
    DamageEntity { id: String, victim_id: String },
    KillEntity {
        id: String,
        last_attacker_id: Option<String>,
    },
    ReviveEntity { id: String },
    TagFlag { flag_id: String, player_id: String },
    AdvanceTime { elapsed: f64 },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::AddEntity { .. } => ActionKind::AddEntity,
            Action::RemoveEntity { .. } => ActionKind::RemoveEntity,
            Action::AssignTeam { .. } => ActionKind::AssignTeam,
            Action::LeaveTeam { .. } => ActionKind::LeaveTeam,
            Action::SetPosition { .. } => ActionKind::SetPosition,
            Action::SetVelocity { .. } => ActionKind::SetVelocity,
            Action::SetAnimation { .. } => ActionKind::SetAnimation,
            Action::SetFacing { .. } => ActionKind::SetFacing,
            Action::BeginAttack { .. } => ActionKind::BeginAttack,
            Action::EndAttack { .. } => ActionKind::EndAttack,
            Action::DamageEntity { .. } => ActionKind::DamageEntity,
            Action::KillEntity { .. } => ActionKind::KillEntity,
            Action::ReviveEntity { .. } => ActionKind::ReviveEntity,
            Action::TagFlag { .. } => ActionKind::TagFlag,
            Action::AdvanceTime { .. } => ActionKind::AdvanceTime,
        }
    }

    /// Id of the entity performing the action, if a client may submit it
    ///
    /// Lifecycle, team, death and time transitions are decided by the
    /// server alone and return `None`.
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            Action::SetPosition { id, .. }
            | Action::SetVelocity { id, .. }
            | Action::SetAnimation { id, .. }
            | Action::SetFacing { id, .. }
            | Action::BeginAttack { id }
            | Action::EndAttack { id }
            | Action::DamageEntity { id, .. } => Some(id),
            Action::TagFlag { player_id, .. } => Some(player_id),
            Action::AddEntity { .. }
            | Action::RemoveEntity { .. }
            | Action::AssignTeam { .. }
            | Action::LeaveTeam { .. }
            | Action::KillEntity { .. }
            | Action::ReviveEntity { .. }
            | Action::AdvanceTime { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display_uses_wire_names() {
        let action = Action::SetFacing {
            id: "p1".to_string(),
            facing: Facing::Left,
        };
        assert_eq!(action.kind(), ActionKind::SetFacing);
        assert_eq!(action.kind().to_string(), "SET_FACING");
        assert_eq!(ActionKind::AdvanceTime.to_string(), "ADVANCE_TIME");
    }

    #[test]
    fn test_structural_equality() {
        let a = Action::SetPosition {
            id: "p1".to_string(),
            x: 1.0,
            y: 2.0,
        };
        let b = Action::SetPosition {
            id: "p1".to_string(),
            x: 1.0,
            y: 2.0,
        };
        let c = Action::SetVelocity {
            id: "p1".to_string(),
            vx: 1.0,
            vy: 2.0,
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_actor_id() {
        let attack = Action::DamageEntity {
            id: "p1".to_string(),
            victim_id: "p2".to_string(),
        };
        assert_eq!(attack.actor_id(), Some("p1"));

        let tag = Action::TagFlag {
            flag_id: "flag".to_string(),
            player_id: "p3".to_string(),
        };
        assert_eq!(tag.actor_id(), Some("p3"));

        let kill = Action::KillEntity {
            id: "p1".to_string(),
            last_attacker_id: None,
        };
        assert_eq!(kill.actor_id(), None);
        assert_eq!(Action::AdvanceTime { elapsed: 16.0 }.actor_id(), None);
    }

    #[test]
    fn test_action_serialization() {
        let action = Action::KillEntity {
            id: "p1".to_string(),
            last_attacker_id: Some("p2".to_string()),
        };
        let bytes = bincode::serialize(&action).unwrap();
        let decoded: Action = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, action);
    }
}
