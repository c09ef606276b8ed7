//! Input sources for the local player

use shared::{Controls, InputSource};
use std::time::{Duration, Instant};

/// Deterministic controls for a headless client
///
/// Walks left and right in alternating legs and taps attack at a fixed
/// period.
pub struct ScriptedInput {
    started: Instant,
    leg: Duration,
    attack_period: Duration,
    attack_hold: Duration,
}

impl ScriptedInput {
    pub fn new(leg: Duration, attack_period: Duration) -> Self {
        Self {
            started: Instant::now(),
            leg,
            attack_period,
            attack_hold: Duration::from_millis(50),
        }
    }

    /// Controls held `elapsed` after the script started
    pub fn controls_at(&self, elapsed: Duration) -> Controls {
        let elapsed_ms = elapsed.as_millis();
        let leg_ms = self.leg.as_millis().max(1);
        let moving_left = (elapsed_ms / leg_ms) % 2 == 1;

        let period_ms = self.attack_period.as_millis().max(1);
        let attack = elapsed_ms % period_ms < self.attack_hold.as_millis();

        Controls {
            left: moving_left,
            right: !moving_left,
            attack,
            ..Controls::default()
        }
    }
}

impl Default for ScriptedInput {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(3))
    }
}

impl InputSource for ScriptedInput {
    fn sample(&self) -> Controls {
        self.controls_at(self.started.elapsed())
    }
}
