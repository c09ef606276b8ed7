//! Snapshot intake, action deduplication and link measurements
//!
//! `SyncLayer` sits between the client's network loop and its [`Store`].
//! It forwards snapshots, drops an action that is identical to the one
//! dispatched just before it, and tracks round-trip time and packet loss.

use crate::game::Store;
use shared::{Action, GameConfig, Snapshot};
use std::time::Duration;

pub struct SyncLayer<S: Store> {
    store: S,
    last_action: Option<Action>,
    ping: Option<u64>,
    ping_sent_at: Option<u64>,
    packet_sequences: Vec<u32>,
    packet_loss: f64,
    ping_interval: Duration,
    packet_loss_window: usize,
}

impl<S: Store> SyncLayer<S> {
    pub fn new(store: S, config: &GameConfig) -> Self {
        Self {
            store,
            last_action: None,
            ping: None,
            ping_sent_at: None,
            packet_sequences: Vec::new(),
            packet_loss: 0.0,
            ping_interval: config.ping_interval,
            packet_loss_window: config.packet_loss_window.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Round-trip time of the latest answered probe, in milliseconds
    pub fn ping(&self) -> Option<u64> {
        self.ping
    }

    /// Most recently reported packet loss ratio
    pub fn packet_loss(&self) -> f64 {
        self.packet_loss
    }

    pub fn should_dispatch_action(&self, action: &Action) -> bool {
        self.last_action.as_ref() != Some(action)
    }

    /// Forwards `action` to the store unless it repeats the previous one
    ///
    /// Returns whether the store saw the action.
    pub fn dispatch(&mut self, action: Action) -> bool {
        if !self.should_dispatch_action(&action) {
            return false;
        }

        self.store.dispatch(action.clone());
        self.last_action = Some(action);
        true
    }

    /// Replaces the store's state with an authoritative snapshot
    ///
    /// Returns the new packet-loss figure when this snapshot closes a
    /// reporting window.
    pub fn handle_set_state(&mut self, snapshot: Snapshot, sequence: u32) -> Option<f64> {
        self.store.set_state(snapshot);
        self.packet_sequences.push(sequence);

        if self.should_update_packet_loss() {
            self.packet_loss = self.calculate_packet_loss();
            Some(self.packet_loss)
        } else {
            None
        }
    }

    /// Returns the timestamp to probe with when a probe is due
    pub fn poll_latency_probe(&mut self, now_ms: u64) -> Option<u64> {
        let due = match self.ping_sent_at {
            Some(sent_at) => now_ms.saturating_sub(sent_at) >= self.ping_interval.as_millis() as u64,
            None => true,
        };

        if due {
            self.ping_sent_at = Some(now_ms);
            Some(now_ms)
        } else {
            None
        }
    }

    /// Records the echo of a probe sent at `timestamp`
    pub fn handle_latency(&mut self, timestamp: u64, now_ms: u64) -> u64 {
        let ping = now_ms.saturating_sub(timestamp);
        self.ping = Some(ping);
        ping
    }

    /// True when the newest sequence number closes a window or the log is full
    pub fn should_update_packet_loss(&self) -> bool {
        let window = self.packet_loss_window;
        match self.packet_sequences.last() {
            Some(&sequence) => {
                sequence as usize % window == 0 || self.packet_sequences.len() >= window
            }
            None => false,
        }
    }

    /// Ratio of missing to received snapshots over the nominal window
    ///
    /// Clears the sequence log.
    pub fn calculate_packet_loss(&mut self) -> f64 {
        let received = self.packet_sequences.len();
        self.packet_sequences.clear();

        let lost = self.packet_loss_window.saturating_sub(received);
        if lost > 0 && received > 0 {
            lost as f64 / received as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ClientStore;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Entity, Facing, TimeState, WorldState};

    #[derive(Default)]
    struct CountingStore {
        state: WorldState,
        dispatched: Vec<Action>,
        snapshots: usize,
    }

    impl Store for CountingStore {
        fn dispatch(&mut self, action: Action) {
            self.dispatched.push(action);
        }

        fn set_state(&mut self, snapshot: Snapshot) {
            self.snapshots += 1;
            self.state = WorldState::from_snapshot(snapshot);
        }

        fn state(&self) -> &WorldState {
            &self.state
        }
    }

    fn sync() -> SyncLayer<CountingStore> {
        SyncLayer::new(CountingStore::default(), &GameConfig::default())
    }

    fn face(facing: Facing) -> Action {
        Action::SetFacing {
            id: "p1".to_string(),
            facing,
        }
    }

    #[test]
    fn test_repeated_action_reaches_store_once() {
        let mut sync = sync();

        assert!(sync.dispatch(face(Facing::Left)));
        assert!(!sync.dispatch(face(Facing::Left)));
        assert_eq!(sync.store().dispatched.len(), 1);
    }

    #[test]
    fn test_changed_action_is_dispatched_again() {
        let mut sync = sync();

        sync.dispatch(face(Facing::Left));
        sync.dispatch(face(Facing::Right));
        sync.dispatch(face(Facing::Left));
        sync.dispatch(Action::BeginAttack {
            id: "p1".to_string(),
        });

        assert_eq!(sync.store().dispatched.len(), 4);
    }

    #[test]
    fn test_dedup_against_client_store() {
        let mut store = ClientStore::default();
        store.set_state(Snapshot {
            entities: vec![Entity::player("p1", 0.0, 0.0, 100, 10)],
            time: TimeState::default(),
        });
        let mut sync = SyncLayer::new(store, &GameConfig::default());

        sync.dispatch(face(Facing::Left));
        sync.dispatch(face(Facing::Left));

        // One snapshot plus one action
        assert_eq!(sync.store().updates(), 2);
    }

    #[test]
    fn test_no_loss_over_full_window() {
        let mut sync = sync();
        let mut reports = Vec::new();

        for sequence in 1..=100 {
            if let Some(loss) = sync.handle_set_state(Snapshot::default(), sequence) {
                reports.push(loss);
            }
        }

        assert_eq!(reports.len(), 1);
        assert_approx_eq!(reports[0], 0.0);
        assert_eq!(sync.store().snapshots, 100);
    }

    #[test]
    fn test_loss_with_twenty_dropped() {
        let mut sync = sync();
        let mut reports = Vec::new();

        for sequence in 21..=100 {
            if let Some(loss) = sync.handle_set_state(Snapshot::default(), sequence) {
                reports.push(loss);
            }
        }

        assert_eq!(reports.len(), 1);
        assert_approx_eq!(reports[0], 0.25);
        assert_approx_eq!(sync.packet_loss(), 0.25);
    }

    #[test]
    fn test_calculate_packet_loss_directly() {
        let mut sync = sync();
        sync.packet_sequences = (1..=80).collect();
        assert_approx_eq!(sync.calculate_packet_loss(), 0.25);
        assert!(sync.packet_sequences.is_empty());

        assert_approx_eq!(sync.calculate_packet_loss(), 0.0);
    }

    #[test]
    fn test_latency_probe_cadence() {
        let mut sync = sync();

        assert_eq!(sync.poll_latency_probe(1_000), Some(1_000));
        assert_eq!(sync.poll_latency_probe(1_050), None);
        assert_eq!(sync.poll_latency_probe(1_100), Some(1_100));
    }

    #[test]
    fn test_ping_from_echo() {
        let mut sync = sync();
        assert_eq!(sync.ping(), None);

        let sent = sync.poll_latency_probe(5_000).unwrap();
        assert_eq!(sync.handle_latency(sent, 5_042), 42);
        assert_eq!(sync.ping(), Some(42));

        // Clock skew never produces a negative ping
        assert_eq!(sync.handle_latency(6_000, 5_900), 0);
    }
}
