//! Live entity objects and the type-keyed factory that builds them
//!
//! Each variant fixes its component set at construction time: players carry
//! health and attack (plus input when locally controlled), flags and bases
//! carry none.

use crate::component::{Attack, Component, Dispatcher, Health, Input, InputSource};
use crate::config::GameConfig;
use crate::pool::RenderHost;
use crate::state::{Entity, EntityKind};
use log::warn;
use std::sync::Arc;

pub struct PlayerEntity {
    props: Entity,
    input: Option<Input>,
    health: Health,
    attack: Attack,
}

impl PlayerEntity {
    fn components_mut(&mut self) -> Vec<&mut dyn Component> {
        let mut components: Vec<&mut dyn Component> = Vec::with_capacity(3);
        if let Some(input) = self.input.as_mut() {
            components.push(input);
        }
        components.push(&mut self.health);
        components.push(&mut self.attack);
        components
    }

    pub fn is_local(&self) -> bool {
        self.input.is_some()
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    pub fn attack(&self) -> &Attack {
        &self.attack
    }
}

/// Entity without behavior of its own
pub struct PropEntity {
    props: Entity,
}

pub enum GameEntity {
    Player(PlayerEntity),
    Flag(PropEntity),
    Base(PropEntity),
}

impl GameEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            GameEntity::Player(_) => EntityKind::Player,
            GameEntity::Flag(_) => EntityKind::Flag,
            GameEntity::Base(_) => EntityKind::Base,
        }
    }

    pub fn props(&self) -> &Entity {
        match self {
            GameEntity::Player(player) => &player.props,
            GameEntity::Flag(prop) | GameEntity::Base(prop) => &prop.props,
        }
    }

    pub fn id(&self) -> &str {
        &self.props().id
    }

    pub fn component_names(&mut self) -> Vec<&'static str> {
        match self {
            GameEntity::Player(player) => player
                .components_mut()
                .iter()
                .map(|component| component.name())
                .collect(),
            GameEntity::Flag(_) | GameEntity::Base(_) => Vec::new(),
        }
    }

    /// Stores the new props and runs every component once
    pub fn update(&mut self, props: &Entity, dispatch: &Dispatcher, host: &mut dyn RenderHost) {
        match self {
            GameEntity::Player(player) => {
                if player.props.animation != props.animation {
                    host.play_animation(&props.id, &props.animation);
                }
                player.props = props.clone();
                for component in player.components_mut() {
                    component.update(props, dispatch);
                }
            }
            GameEntity::Flag(prop) | GameEntity::Base(prop) => prop.props = props.clone(),
        }
    }

    /// Releases the entity's sprite; dropping the components cancels their timers
    pub fn destroy(self, host: &mut dyn RenderHost) {
        host.destroy_sprite(self.id());
    }
}

/// Builds live entities from props
#[derive(Clone)]
pub struct EntityFactory {
    config: GameConfig,
    local_player_id: Option<String>,
    input: Option<Arc<dyn InputSource>>,
}

impl EntityFactory {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            local_player_id: None,
            input: None,
        }
    }

    /// Attaches `input` to the player with the given id
    pub fn with_local_player(mut self, id: &str, input: Arc<dyn InputSource>) -> Self {
        self.local_player_id = Some(id.to_string());
        self.input = Some(input);
        self
    }

    pub fn set_local_player(&mut self, id: &str, input: Arc<dyn InputSource>) {
        self.local_player_id = Some(id.to_string());
        self.input = Some(input);
    }

    /// Returns `None` (with a warning) for types the factory does not know
    pub fn create(&self, props: &Entity) -> Option<GameEntity> {
        match props.entity_kind() {
            Some(EntityKind::Player) => Some(GameEntity::Player(self.create_player(props))),
            Some(EntityKind::Flag) => Some(GameEntity::Flag(PropEntity {
                props: props.clone(),
            })),
            Some(EntityKind::Base) => Some(GameEntity::Base(PropEntity {
                props: props.clone(),
            })),
            None => {
                warn!(
                    "Trying to create entity {} of unknown type {}",
                    props.id, props.kind
                );
                None
            }
        }
    }

    fn create_player(&self, props: &Entity) -> PlayerEntity {
        let input = match (&self.local_player_id, &self.input) {
            (Some(local_id), Some(source)) if *local_id == props.id => {
                Some(Input::new(Arc::clone(source), self.config.player_speed))
            }
            _ => None,
        };

        PlayerEntity {
            props: props.clone(),
            input,
            health: Health::new(self.config.revive_duration),
            attack: Attack::new(self.config.attack_cooldown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Controls;
    use crate::pool::NullRenderHost;

    struct Idle;

    impl InputSource for Idle {
        fn sample(&self) -> Controls {
            Controls::default()
        }
    }

    #[derive(Default)]
    struct AnimationLog(Vec<(String, String)>);

    impl RenderHost for AnimationLog {
        fn create_sprite(&mut self, _entity: &Entity) {}
        fn destroy_sprite(&mut self, _id: &str) {}
        fn play_animation(&mut self, id: &str, animation: &str) {
            self.0.push((id.to_string(), animation.to_string()));
        }
    }

    #[test]
    fn test_factory_builds_variants() {
        let factory = EntityFactory::new(GameConfig::default());

        let player = factory
            .create(&Entity::player("p1", 0.0, 0.0, 100, 10))
            .unwrap();
        assert_eq!(player.kind(), EntityKind::Player);
        assert_eq!(player.id(), "p1");

        let flag = factory.create(&Entity::flag("flag", 0.0, 0.0)).unwrap();
        assert_eq!(flag.kind(), EntityKind::Flag);

        let base = factory
            .create(&Entity::base("red", "red", 0.0, 0.0))
            .unwrap();
        assert_eq!(base.kind(), EntityKind::Base);
    }

    #[test]
    fn test_factory_skips_unknown_type() {
        let factory = EntityFactory::new(GameConfig::default());
        let props = Entity {
            id: "x".to_string(),
            kind: "dragon".to_string(),
            ..Entity::default()
        };
        assert!(factory.create(&props).is_none());
    }

    #[test]
    fn test_only_local_player_gets_input() {
        let factory =
            EntityFactory::new(GameConfig::default()).with_local_player("me", Arc::new(Idle));

        let mut local = factory
            .create(&Entity::player("me", 0.0, 0.0, 100, 10))
            .unwrap();
        let mut remote = factory
            .create(&Entity::player("them", 0.0, 0.0, 100, 10))
            .unwrap();

        assert_eq!(local.component_names(), vec!["input", "health", "attack"]);
        assert_eq!(remote.component_names(), vec!["health", "attack"]);

        let mut flag = factory.create(&Entity::flag("flag", 0.0, 0.0)).unwrap();
        assert!(flag.component_names().is_empty());
    }

    #[test]
    fn test_update_replaces_props_and_plays_animation() {
        let factory = EntityFactory::new(GameConfig::default());
        let (dispatcher, _rx) = Dispatcher::channel();
        let mut host = AnimationLog::default();

        let mut props = Entity::player("p1", 0.0, 0.0, 100, 10);
        let mut entity = factory.create(&props).unwrap();

        props.x = 42.0;
        entity.update(&props, &dispatcher, &mut host);
        assert!(host.0.is_empty());

        props.animation = "walk".to_string();
        entity.update(&props, &dispatcher, &mut host);
        assert_eq!(host.0, vec![("p1".to_string(), "walk".to_string())]);
        assert_eq!(entity.props().x, 42.0);

        entity.destroy(&mut NullRenderHost);
    }
}
