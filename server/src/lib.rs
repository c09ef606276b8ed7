//! # Capture-the-Flag Game Server
//!
//! The authoritative half of the game. The server owns the canonical world
//! state, applies client actions to it, runs the entity components that decide
//! deaths, revives and attack resets, and broadcasts a snapshot of the world to
//! every client on each tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every state change goes through the shared reducer. Clients submit actions,
//! never state; the server checks that each action is performed by the
//! client's own player before applying it. Spawning, team assignment, kills,
//! revives and the clock are decided by the server alone.
//!
//! ### Client Management
//! Handles the complete lifecycle of client connections including:
//! - Connection establishment and player spawning
//! - Buffering submitted actions until the next tick
//! - Disconnection and timeout cleanup, which also removes the player
//!
//! ### State Broadcasting
//! After each tick the full entity list goes out as a `Snapshot` packet with a
//! sequence number. Clients use the sequence numbers to estimate packet loss
//! and reconcile their entity pools against the snapshot contents.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, player assignment, the per-client action queue and
//! timeout detection.
//!
//! ### Game Module (`game`)
//! The `GameWorld`: world state, reducer, the server's entity pool and the
//! component action queue.
//!
//! ### Network Module (`network`)
//! UDP socket handling, packet routing, the tick loop and snapshot broadcast.
//!
//! ## Tick Order
//!
//! 1. Queued client actions are applied in the order they arrived
//! 2. Actions emitted by components since the last tick are applied
//! 3. The clock advances by the measured tick duration
//! 4. The entity pool is reconciled so components observe the new state
//! 5. A snapshot is broadcast
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::GameConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(16),
//!         16,
//!         GameConfig::default(),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
