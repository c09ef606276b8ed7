//! Entity pool reconciled against authoritative entity lists
//!
//! After [`EntityPool::reconcile`] the pool holds exactly the ids of the
//! incoming list: ids new to the pool are created through the factory, ids
//! already present are updated, and pooled ids missing from the list are
//! destroyed. Absence from the list is the only removal signal.

use crate::component::Dispatcher;
use crate::entity::{EntityFactory, GameEntity};
use crate::error::InvalidPropsError;
use crate::state::{Entity, EntityKind};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Rendering collaborator notified about entity lifecycle
pub trait RenderHost {
    fn create_sprite(&mut self, entity: &Entity);
    fn destroy_sprite(&mut self, id: &str);
    fn play_animation(&mut self, id: &str, animation: &str);
}

/// Render host for headless simulation
pub struct NullRenderHost;

impl RenderHost for NullRenderHost {
    fn create_sprite(&mut self, _entity: &Entity) {}
    fn destroy_sprite(&mut self, _id: &str) {}
    fn play_animation(&mut self, _id: &str, _animation: &str) {}
}

/// What one reconciliation pass did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub destroyed: Vec<String>,
    /// Ids whose type the factory does not know
    pub skipped: Vec<String>,
    pub invalid: Vec<InvalidPropsError>,
}

impl ReconcileReport {
    pub fn is_quiet(&self) -> bool {
        self.created.is_empty()
            && self.destroyed.is_empty()
            && self.skipped.is_empty()
            && self.invalid.is_empty()
    }
}

pub struct EntityPool {
    entities: HashMap<String, GameEntity>,
    factory: EntityFactory,
    num_players: usize,
}

impl EntityPool {
    pub fn new(factory: EntityFactory) -> Self {
        Self {
            entities: HashMap::new(),
            factory,
            num_players: 0,
        }
    }

    pub fn factory_mut(&mut self) -> &mut EntityFactory {
        &mut self.factory
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn num_players(&self) -> usize {
        self.num_players
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&GameEntity> {
        self.entities.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entities.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Adds an already built entity, replacing any entity with the same id
    pub fn insert(&mut self, entity: GameEntity, host: &mut dyn RenderHost) {
        host.create_sprite(entity.props());
        if entity.kind() == EntityKind::Player {
            self.num_players += 1;
        }
        let id = entity.id().to_string();
        if let Some(previous) = self.entities.insert(id, entity) {
            self.release(previous, host);
        }
    }

    /// Aligns the pool with `entities`
    ///
    /// A malformed record is reported in `invalid` and skipped; the rest of
    /// the list is still processed. A record that has an id but no type
    /// still counts as present, so its live entity is kept.
    pub fn reconcile<'a, I>(
        &mut self,
        entities: I,
        dispatch: &Dispatcher,
        host: &mut dyn RenderHost,
    ) -> ReconcileReport
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut report = ReconcileReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        for props in entities {
            if !props.id.is_empty() && !seen.insert(props.id.clone()) {
                debug!("Ignoring repeated entity {} in snapshot", props.id);
                continue;
            }

            if let Err(err) = props.validate() {
                warn!("Skipping entity record: {}", err);
                report.invalid.push(err);
                continue;
            }

            if let Some(entity) = self.entities.get_mut(&props.id) {
                entity.update(props, dispatch, host);
                report.updated.push(props.id.clone());
                continue;
            }

            match self.factory.create(props) {
                Some(mut entity) => {
                    self.insert_created(&mut entity, props, dispatch, host);
                    self.entities.insert(props.id.clone(), entity);
                    report.created.push(props.id.clone());
                }
                None => report.skipped.push(props.id.clone()),
            }
        }

        let mut stale: Vec<String> = self
            .entities
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        stale.sort();

        for id in stale {
            if let Some(entity) = self.entities.remove(&id) {
                self.release(entity, host);
                report.destroyed.push(id);
            }
        }

        report
    }

    /// Destroys every pooled entity
    pub fn clear(&mut self, host: &mut dyn RenderHost) {
        let entities: Vec<GameEntity> = self.entities.drain().map(|(_, e)| e).collect();
        for entity in entities {
            self.release(entity, host);
        }
    }

    fn insert_created(
        &mut self,
        entity: &mut GameEntity,
        props: &Entity,
        dispatch: &Dispatcher,
        host: &mut dyn RenderHost,
    ) {
        host.create_sprite(props);
        if entity.kind() == EntityKind::Player {
            self.num_players += 1;
        }
        entity.update(props, dispatch, host);
    }

    fn release(&mut self, entity: GameEntity, host: &mut dyn RenderHost) {
        if entity.kind() == EntityKind::Player {
            self.num_players = self.num_players.saturating_sub(1);
        }
        entity.destroy(host);
    }
}
