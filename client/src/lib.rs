//! # Capture-the-Flag Game Client
//!
//! The client half of the game: it receives authoritative snapshots from the
//! server, keeps a local entity pool in line with them and sends the local
//! player's actions back.
//!
//! ## Architecture Overview
//!
//! ### Snapshot Reconciliation
//! Every snapshot replaces the client's world state. On each update the entity
//! pool is reconciled against that state: entities new to the snapshot are
//! created through the shared factory, known ones are updated, and entities
//! the snapshot no longer lists are destroyed.
//!
//! ### Local Prediction
//! Components of the local player dispatch actions that are applied to the
//! local state straight away through the same reducer the server uses. Only
//! actions performed by the local player are forwarded to the server; the
//! rest stay local until the next snapshot confirms or overrides them.
//!
//! ### Deduplication
//! A component may emit the same intent on every tick. The sync layer drops
//! an action identical to the one dispatched immediately before it.
//!
//! ### Link Measurements
//! Latency probes go out at a fixed cadence and the echoed timestamp yields
//! the round-trip time. Snapshot sequence numbers are logged and turned into
//! a packet-loss ratio once per window.
//!
//! ## Module Organization
//!
//! - `game`: the `Store` trait and `ClientStore`
//! - `sync`: `SyncLayer` with dedup, ping and packet loss
//! - `link_quality`: bounded measurement history and quality labels
//! - `input`: `ScriptedInput`, a deterministic input source
//! - `rendering`: `LogRenderHost`, a render host that logs sprite lifecycle
//! - `network`: the UDP client loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::GameConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", "alice", 0, GameConfig::default()).await?;
//!     client.run(Some(Duration::from_secs(30))).await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod link_quality;
pub mod network;
pub mod rendering;
pub mod sync;
