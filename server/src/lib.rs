//! # Pong Game Server Library
//!
//! This library provides the authoritative server implementation for a
//! two-player networked Pong match. It owns the canonical game state,
//! processes client movement intents, and broadcasts state snapshots so
//! both clients can render the same match.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the only copy of the game physics: ball trajectory,
//! paddle positions, scores, and the win condition all live here. Clients
//! are thin renderers; they send `UP`/`DOWN` intents and draw whatever the
//! server broadcasts.
//!
//! ### Session Management
//! Exactly two player slots exist. Connections are accepted sequentially,
//! each is greeted with its assigned id (0 or 1), and a dropped connection
//! mid-match is an automatic forfeit for that player.
//!
//! ### State Broadcasting
//! After every physics tick (and every countdown decrement) the server
//! serializes a full state snapshot as one newline-delimited JSON frame
//! and sends it to both connected clients.
//!
//! ## Architecture Design
//!
//! ### One Lock per Aggregate
//! All simulation state is a single `GameState` behind one
//! `tokio::sync::Mutex`. The two input listener tasks and the simulation
//! loop serialize through that lock, so a broadcast snapshot can never mix
//! fields from two different ticks.
//!
//! ### Explicit Match Life Cycle
//! A match moves through waiting-for-players, countdown, playing, game
//! over and cooldown. The in-state phases are an explicit enum
//! ([`game::MatchPhase`]); the out-of-state phases are the controller's
//! control flow in [`network::Server::run`].
//!
//! ### TCP Text Protocol
//! One TCP connection per player. Client to server: raw `UP`/`DOWN`
//! tokens. Server to client: an id greeting line, then newline-delimited
//! JSON state frames defined in the `shared` crate.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Contains the shared state aggregate and simulation logic:
//! - The single `GameState` behind the match lock
//! - The explicit match phase machine and its transitions
//! - The per-tick physics step: walls, paddles, goals, win check
//!
//! ### Session Module (`session`)
//! Manages the two player slots and their connections:
//! - Slot bookkeeping and liveness flags
//! - Per-player input listener tasks decoding movement tokens
//! - State frame broadcasting to both connected clients
//!
//! ### Network Module (`network`)
//! Contains the match controller driving the life cycle:
//! - Sequential accept loop and id greeting
//! - Countdown and fixed-tick simulation loops
//! - Post-match cooldown and slot teardown
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8082", ServerConfig::default()).await?;
//!
//!     // Runs matches back to back: accept two players, count down,
//!     // simulate at 60 Hz, broadcast every tick, cool down, repeat.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
pub mod session;
