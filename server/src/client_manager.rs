//! Client connection management and action queuing for the game server
//!
//! This module handles the server-side management of connected clients, including:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - The player entity each client controls
//! - Buffering of submitted actions in arrival order across all clients
//! - Client capacity management and address tracking

use log::info;
use shared::Action;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Time without any packet after which a client is dropped
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// An action waiting for the next tick
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    /// Server-wide arrival order
    pub sequence: u64,
    pub action: Action,
}

/// A connected client and the actions it has submitted
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Display name sent with `Connect`
    pub name: String,
    /// Id of the player entity this client controls
    pub player_id: String,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    pub pending_actions: Vec<PendingAction>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, name: &str, player_id: &str) -> Self {
        Self {
            id,
            addr,
            name: name.to_string(),
            player_id: player_id.to_string(),
            last_seen: Instant::now(),
            pending_actions: Vec::new(),
        }
    }

    /// Queues an action and marks the client as active
    pub fn add_action(&mut self, action: PendingAction) {
        self.last_seen = Instant::now();
        self.pending_actions.push(action);
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients and their queued actions
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    next_action_sequence: u64,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            next_action_sequence: 0,
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Attempts to add a new client connection
    ///
    /// Returns `None` if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, name: &str, player_id: &str) -> Option<u32> {
        if self.is_full() {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr, name, player_id);
        info!(
            "Client {} ({}) connected from {} as {}",
            client_id, name, addr, player_id
        );
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client, returning it if it was connected
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn player_id(&self, client_id: u32) -> Option<&str> {
        self.clients
            .get(&client_id)
            .map(|client| client.player_id.as_str())
    }

    /// Queues an action for a client; returns false for unknown clients
    pub fn add_action(&mut self, client_id: u32, action: Action) -> bool {
        let sequence = self.next_action_sequence;
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                self.next_action_sequence += 1;
                client.add_action(PendingAction { sequence, action });
                true
            }
            None => false,
        }
    }

    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
        }
    }

    /// Takes every queued action, paired with the submitting player id
    ///
    /// Actions from all clients are merged in the order the server received
    /// them, so the simulation applies them deterministically.
    pub fn take_pending_actions(&mut self) -> Vec<(String, Action)> {
        let mut all_actions: Vec<(String, PendingAction)> = Vec::new();

        for client in self.clients.values_mut() {
            for pending in client.pending_actions.drain(..) {
                all_actions.push((client.player_id.clone(), pending));
            }
        }

        all_actions.sort_by_key(|(_, pending)| pending.sequence);
        all_actions
            .into_iter()
            .map(|(player_id, pending)| (player_id, pending.action))
            .collect()
    }

    /// Removes clients that have been silent for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Client> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|client_id| self.remove_client(client_id))
            .collect()
    }

    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
