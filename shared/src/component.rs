//! Entity components and the action dispatch capability they write through
//!
//! Components never mutate props. Each tick they observe the entity's
//! current props and submit actions through a [`Dispatcher`], which feeds
//! the same queue the host drains into the reducer. Delayed re-entries
//! (revive after death, attack reset) are owned by the component as a
//! [`DeferredAction`]; dropping the handle cancels the pending action, so
//! tearing down an entity also cancels its timers.

use crate::action::Action;
use crate::state::{Entity, Facing};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Submits actions to the host's action queue
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Action>,
}

impl Dispatcher {
    /// Creates a dispatcher along with the receiving end of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn dispatch(&self, action: Action) {
        if let Err(e) = self.tx.send(action) {
            debug!("Dropping {} after action queue closed", e.0.kind());
        }
    }
}

/// An action that will be dispatched after a delay unless cancelled first
#[derive(Debug)]
pub struct DeferredAction {
    handle: JoinHandle<()>,
}

impl DeferredAction {
    /// Schedules `action` on the current tokio runtime
    ///
    /// Returns `None` (and logs) when called outside a runtime.
    pub fn schedule(dispatcher: &Dispatcher, delay: Duration, action: Action) -> Option<Self> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No runtime available to schedule {}", action.kind());
                return None;
            }
        };

        let dispatcher = dispatcher.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            dispatcher.dispatch(action);
        });

        Some(Self { handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DeferredAction {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A behavior unit attached to an entity
pub trait Component: Send {
    fn name(&self) -> &'static str;

    /// Observes the entity's props for this tick and may dispatch actions
    ///
    /// Must not panic on props that lack the fields it watches.
    fn update(&mut self, props: &Entity, dispatch: &Dispatcher);
}

/// Detects deaths and schedules the automatic revive
///
/// One revive timer per entity: a new death replaces (and thereby cancels)
/// any timer still pending from an earlier one.
#[derive(Debug)]
pub struct Health {
    revive_duration: Duration,
    down: bool,
    revive_timer: Option<DeferredAction>,
}

impl Health {
    pub fn new(revive_duration: Duration) -> Self {
        Self {
            revive_duration,
            down: false,
            revive_timer: None,
        }
    }

    pub fn has_pending_revive(&self) -> bool {
        self.revive_timer
            .as_ref()
            .map(|timer| !timer.is_finished())
            .unwrap_or(false)
    }

    fn revive_fired(&self) -> bool {
        self.revive_timer
            .as_ref()
            .map(|timer| timer.is_finished())
            .unwrap_or(false)
    }

    /// Dispatches the kill if the entity is still alive and (re)arms the revive
    fn knock_down(&mut self, props: &Entity, dispatch: &Dispatcher) {
        if !props.is_dead {
            dispatch.dispatch(Action::KillEntity {
                id: props.id.clone(),
                last_attacker_id: props.last_attacker_id.clone(),
            });
        }

        self.revive_timer = DeferredAction::schedule(
            dispatch,
            self.revive_delay(props),
            Action::ReviveEntity {
                id: props.id.clone(),
            },
        );
    }

    fn revive_delay(&self, props: &Entity) -> Duration {
        if props.revive_duration > 0 {
            Duration::from_millis(props.revive_duration)
        } else {
            self.revive_duration
        }
    }
}

impl Component for Health {
    fn name(&self) -> &'static str {
        "health"
    }

    fn update(&mut self, props: &Entity, dispatch: &Dispatcher) {
        if props.id.is_empty() || props.health <= 0 {
            return;
        }

        let out_of_health = props.is_dead || props.current_health <= 0;

        if out_of_health && !self.down {
            self.down = true;
            if !props.is_dead {
                info!("Entity {} died", props.id);
            }
            self.knock_down(props, dispatch);
        } else if out_of_health && !props.is_dead && self.revive_fired() {
            // The kill never landed, so the revive had nothing to undo
            warn!("Entity {} is out of health but alive, killing again", props.id);
            self.knock_down(props, dispatch);
        } else if !out_of_health && self.down {
            self.down = false;
            if !self.has_pending_revive() {
                self.revive_timer = None;
            }
        }
    }
}

/// Cooldown latch returning an attacking entity to the idle state
#[derive(Debug)]
pub struct Attack {
    cooldown: Duration,
    reset_timer: Option<DeferredAction>,
}

impl Attack {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            reset_timer: None,
        }
    }

    pub fn has_pending_reset(&self) -> bool {
        self.reset_timer.is_some()
    }
}

impl Component for Attack {
    fn name(&self) -> &'static str {
        "attack"
    }

    fn update(&mut self, props: &Entity, dispatch: &Dispatcher) {
        if props.id.is_empty() {
            return;
        }

        if !props.is_attacking {
            self.reset_timer = None;
            return;
        }

        if self.reset_timer.is_none() {
            self.reset_timer = DeferredAction::schedule(
                dispatch,
                self.cooldown,
                Action::EndAttack {
                    id: props.id.clone(),
                },
            );
        }
    }
}

/// Directional and attack intent sampled from an input device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub attack: bool,
}

impl Controls {
    fn axis(negative: bool, positive: bool) -> f32 {
        match (negative, positive) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }

    pub fn direction(&self) -> (f32, f32) {
        (
            Self::axis(self.left, self.right),
            Self::axis(self.up, self.down),
        )
    }
}

/// Something the local player's input component can poll
pub trait InputSource: Send + Sync {
    fn sample(&self) -> Controls;
}

/// Translates local controls into movement and attack actions
pub struct Input {
    source: Arc<dyn InputSource>,
    speed: f32,
}

impl Input {
    pub fn new(source: Arc<dyn InputSource>, speed: f32) -> Self {
        Self { source, speed }
    }
}

impl Component for Input {
    fn name(&self) -> &'static str {
        "input"
    }

    fn update(&mut self, props: &Entity, dispatch: &Dispatcher) {
        if props.id.is_empty() {
            return;
        }

        let id = props.id.clone();

        if props.is_dead {
            if props.vx != 0.0 || props.vy != 0.0 {
                dispatch.dispatch(Action::SetVelocity {
                    id,
                    vx: 0.0,
                    vy: 0.0,
                });
            }
            return;
        }

        let controls = self.source.sample();
        let (dx, dy) = controls.direction();
        let (vx, vy) = (dx * self.speed, dy * self.speed);

        if (vx, vy) != (props.vx, props.vy) {
            dispatch.dispatch(Action::SetVelocity {
                id: id.clone(),
                vx,
                vy,
            });
        }

        let facing = if dx < 0.0 {
            Some(Facing::Left)
        } else if dx > 0.0 {
            Some(Facing::Right)
        } else if dy < 0.0 {
            Some(Facing::Up)
        } else if dy > 0.0 {
            Some(Facing::Down)
        } else {
            None
        };
        if let Some(facing) = facing.filter(|f| *f != props.facing) {
            dispatch.dispatch(Action::SetFacing {
                id: id.clone(),
                facing,
            });
        }

        let animation = if dx != 0.0 || dy != 0.0 { "walk" } else { "idle" };
        if props.animation != animation {
            dispatch.dispatch(Action::SetAnimation {
                id: id.clone(),
                animation: animation.to_string(),
            });
        }

        if controls.attack && !props.is_attacking {
            dispatch.dispatch(Action::BeginAttack { id });
        }
    }
}
