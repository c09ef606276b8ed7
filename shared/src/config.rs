//! Gameplay tunables shared by the server simulation and client prediction

use std::time::Duration;

/// Speed applied by the input component, in world units per second
pub const PLAYER_SPEED: f32 = 150.0;
/// Delay between a death and the automatic revive
pub const REVIVE_DURATION: Duration = Duration::from_secs(10);
/// Time an attack stays active before the cooldown latch resets it
pub const ATTACK_COOLDOWN: Duration = Duration::from_millis(100);
/// Minimum spacing between latency probes
pub const PING_INTERVAL: Duration = Duration::from_millis(100);
/// Nominal number of snapshots per packet-loss report
pub const PACKET_LOSS_WINDOW: usize = 100;
/// Distance below a base where its players spawn
pub const SPAWN_OFFSET: f32 = 32.0;
pub const PLAYER_HEALTH: i32 = 100;
pub const PLAYER_DAMAGE: i32 = 10;

/// Runtime configuration for a game session
///
/// Every field defaults to the constant of the same name. Binaries override
/// individual values from the command line before handing the config to the
/// server or client.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub revive_duration: Duration,
    pub attack_cooldown: Duration,
    pub ping_interval: Duration,
    pub packet_loss_window: usize,
    pub spawn_offset: f32,
    pub player_health: i32,
    pub player_damage: i32,
    pub player_speed: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            revive_duration: REVIVE_DURATION,
            attack_cooldown: ATTACK_COOLDOWN,
            ping_interval: PING_INTERVAL,
            packet_loss_window: PACKET_LOSS_WINDOW,
            spawn_offset: SPAWN_OFFSET,
            player_health: PLAYER_HEALTH,
            player_damage: PLAYER_DAMAGE,
            player_speed: PLAYER_SPEED,
        }
    }
}

impl GameConfig {
    /// Returns a copy with a different revive delay
    pub fn with_revive_duration(mut self, revive_duration: Duration) -> Self {
        self.revive_duration = revive_duration;
        self
    }

    /// Returns a copy with a different attack cooldown
    pub fn with_attack_cooldown(mut self, attack_cooldown: Duration) -> Self {
        self.attack_cooldown = attack_cooldown;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_constants() {
        let config = GameConfig::default();
        assert_eq!(config.revive_duration, REVIVE_DURATION);
        assert_eq!(config.attack_cooldown, Duration::from_millis(100));
        assert_eq!(config.ping_interval, Duration::from_millis(100));
        assert_eq!(config.packet_loss_window, 100);
        assert_eq!(config.player_health, PLAYER_HEALTH);
    }

    #[test]
    fn test_builder_overrides() {
        let config = GameConfig::default()
            .with_revive_duration(Duration::from_secs(3))
            .with_attack_cooldown(Duration::from_millis(250));

        assert_eq!(config.revive_duration, Duration::from_secs(3));
        assert_eq!(config.attack_cooldown, Duration::from_millis(250));
        assert_eq!(config.ping_interval, PING_INTERVAL);
    }
}
