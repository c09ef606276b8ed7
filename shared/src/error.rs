use thiserror::Error;

/// A single entity record that cannot be turned into a canonical entity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPropsError {
    /// The record carries no `id`
    #[error("entity props are missing an id")]
    MissingId,

    /// The record carries an id but no `type` tag
    #[error("entity {id} is missing a type")]
    MissingType { id: String },
}

/// Faults raised by the reducer
///
/// A fault never corrupts state: the caller keeps the previous state, logs
/// the error and moves on to the next action in the tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// An action addressed an id that is not present in the world
    #[error("entity {id} not found")]
    EntityNotFound { id: String },

    /// `ADD_ENTITY` with an id that is already taken
    #[error("entity {id} already exists")]
    DuplicateEntity { id: String },

    #[error("invalid entity props: {0}")]
    InvalidProps(#[from] InvalidPropsError),

    /// `ASSIGN_TEAM` while the world holds no base
    #[error("no team available to join")]
    NoTeams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ReduceError::EntityNotFound {
            id: "p1".to_string(),
        };
        assert_eq!(err.to_string(), "entity p1 not found");

        let err: ReduceError = InvalidPropsError::MissingId.into();
        assert_eq!(
            err.to_string(),
            "invalid entity props: entity props are missing an id"
        );
    }
}
