//! Player session slots, per-player input listeners, and state broadcasting
//!
//! This module owns the server side of the two fixed player slots:
//! - Slot bookkeeping (write half, connected flag, listener task handle)
//! - The per-player read loop decoding `UP`/`DOWN` movement tokens
//! - Broadcasting newline-delimited JSON state frames to both slots
//!
//! The match controller in [`crate::network`] fills the slots, drives
//! broadcasts from its simulation loop, and tears the slots down between
//! matches.

use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::{opponent, Command, PlayerId, StateFrame, PLAYER_SLOTS};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// One connected player: the write half used for broadcasting, a liveness
/// flag, and the handle of the task reading their input stream.
#[derive(Debug)]
pub struct Session {
    pub writer: OwnedWriteHalf,
    pub connected: bool,
    pub listener: JoinHandle<()>,
}

/// The two fixed player slots of a match.
///
/// Guarded by its own `tokio::sync::Mutex`, separate from the game state
/// lock; the two are never held at the same time.
#[derive(Debug, Default)]
pub struct SessionSlots {
    slots: [Option<Session>; PLAYER_SLOTS],
}

impl SessionSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupies a slot with a freshly accepted connection.
    pub fn attach(&mut self, pid: PlayerId, writer: OwnedWriteHalf, listener: JoinHandle<()>) {
        self.slots[pid] = Some(Session {
            writer,
            connected: true,
            listener,
        });
    }

    pub fn mark_disconnected(&mut self, pid: PlayerId) {
        if let Some(session) = &mut self.slots[pid] {
            session.connected = false;
        }
    }

    pub fn is_connected(&self, pid: PlayerId) -> bool {
        self.slots[pid]
            .as_ref()
            .map(|session| session.connected)
            .unwrap_or(false)
    }

    /// Returns an occupied slot whose connection has dropped, if any. The
    /// match controller polls this every tick to catch disconnects the
    /// listener's own error path has not reported yet.
    pub fn first_disconnected(&self) -> Option<PlayerId> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(session) if !session.connected))
    }

    /// Sends one state frame to every connected slot.
    ///
    /// A send failure marks only that recipient as disconnected; the other
    /// send is still attempted and the simulation keeps running. Ending
    /// the match on a dropped connection is the controller's job.
    pub async fn broadcast(&mut self, frame: &StateFrame) {
        let line = match frame.to_line() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize state frame: {}", e);
                return;
            }
        };

        for (pid, slot) in self.slots.iter_mut().enumerate() {
            if let Some(session) = slot {
                if !session.connected {
                    continue;
                }
                if let Err(e) = session.writer.write_all(line.as_bytes()).await {
                    warn!("Send to player {} failed: {}", pid, e);
                    session.connected = false;
                }
            }
        }
    }

    /// Tears both slots down at the end of a match: aborts the listener
    /// tasks and closes the connections so clients see EOF.
    pub async fn clear(&mut self) {
        for (pid, slot) in self.slots.iter_mut().enumerate() {
            if let Some(mut session) = slot.take() {
                session.listener.abort();
                if let Err(e) = session.writer.shutdown().await {
                    debug!("Closing connection for player {}: {}", pid, e);
                }
            }
        }
    }
}

/// Spawns the read loop for one player's connection.
///
/// Each read is interpreted as a single movement token; malformed or
/// partial tokens are ignored, not fatal. A read error or EOF marks the
/// session disconnected and converts the drop into a forfeit. This is the
/// only way a listener ends the match; it never restarts one.
pub fn spawn_input_listener(
    pid: PlayerId,
    mut reader: OwnedReadHalf,
    state: Arc<Mutex<GameState>>,
    slots: Arc<Mutex<SessionSlots>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = [0u8; 64];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => {
                    debug!("Player {} closed the connection", pid);
                    break;
                }
                Ok(len) => {
                    let token = String::from_utf8_lossy(&buffer[..len]);
                    if let Some(cmd) = Command::parse(token.trim()) {
                        state.lock().await.apply_command(pid, cmd);
                    }
                }
                Err(e) => {
                    warn!("Read from player {} failed: {}", pid, e);
                    break;
                }
            }
        }

        slots.lock().await.mark_disconnected(pid);
        let mut state = state.lock().await;
        if !state.is_over() {
            state.forfeit(pid);
            info!(
                "Player {} disconnected, player {} wins by forfeit",
                pid,
                opponent(pid)
            );
        }
    })
}
