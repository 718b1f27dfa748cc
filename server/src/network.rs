//! Match controller: accept loop, countdown, fixed-tick simulation, teardown

use crate::game::GameState;
use crate::session::{self, SessionSlots};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{PlayerId, COOLDOWN, COUNTDOWN_INTERVAL, PLAYER_SLOTS, TICK_RATE_HZ};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Match timing knobs. Defaults are the wire contract; tests shrink the
/// real-time delays.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Simulation updates per second during play.
    pub tick_rate: u32,
    /// Delay between countdown decrements.
    pub countdown_interval: Duration,
    /// Post-match delay before connections are closed and slots reopen.
    pub cooldown: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            tick_rate: TICK_RATE_HZ,
            countdown_interval: COUNTDOWN_INTERVAL,
            cooldown: COOLDOWN,
        }
    }
}

/// Authoritative match server for exactly two players.
///
/// `run` loops forever through the match life cycle: wait for players,
/// countdown, play, game over, cooldown, reset. Each match gets a fresh
/// `GameState` behind a fresh lock, so a listener task left over from a
/// previous match can never touch the new match's state.
pub struct Server {
    listener: TcpListener,
    slots: Arc<Mutex<SessionSlots>>,
    config: ServerConfig,
    rng: StdRng,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            slots: Arc::new(Mutex::new(SessionSlots::new())),
            config,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs matches back to back, forever. Nothing that happens during a
    /// match is fatal; every exit path loops back to accepting players.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            self.run_match().await;
        }
    }

    async fn run_match(&mut self) {
        let state = Arc::new(Mutex::new(GameState::new(&mut self.rng)));

        self.accept_players(&state).await;
        self.run_countdown(&state).await;
        self.run_play_loop(&state).await;

        if let Some(winner) = state.lock().await.winner() {
            info!("Player {} won the match", winner);
        }

        // Give clients time to render the result screen before the
        // sockets close under them.
        sleep(self.config.cooldown).await;
        self.slots.lock().await.clear().await;
        info!("Match finished, slots cleared");
    }

    /// Fills both player slots, blocking until two connections are up.
    ///
    /// Ids are assigned in join order and sent as the greeting line before
    /// the slot's input listener starts. Accept or greeting failures
    /// before the id is assigned are transient: logged and retried for
    /// the same slot.
    async fn accept_players(&mut self, state: &Arc<Mutex<GameState>>) {
        for pid in 0..PLAYER_SLOTS {
            info!("Waiting for player {}...", pid);
            loop {
                let (stream, peer) = match self.listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Accept failed: {}, retrying", e);
                        sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                };

                let (reader, mut writer) = stream.into_split();
                if let Err(e) = writer.write_all(format!("{}\n", pid).as_bytes()).await {
                    // Dropping both halves closes the socket; the slot is
                    // still free for the next connection attempt.
                    warn!("Greeting to {} failed: {}, retrying", peer, e);
                    continue;
                }

                let listener_task = session::spawn_input_listener(
                    pid,
                    reader,
                    Arc::clone(state),
                    Arc::clone(&self.slots),
                );
                self.slots.lock().await.attach(pid, writer, listener_task);
                info!("Player {} joined from {}", pid, peer);
                break;
            }
        }
    }

    /// Pre-game countdown: one decrement and one broadcast per interval,
    /// no ball or paddle motion. Exits early on a forfeit.
    async fn run_countdown(&mut self, state: &Arc<Mutex<GameState>>) {
        loop {
            {
                let state = state.lock().await;
                if state.is_over() || state.countdown() == 0 {
                    return;
                }
            }

            sleep(self.config.countdown_interval).await;

            let dropped = self.poll_liveness().await;
            let frame = {
                let mut state = state.lock().await;
                if let Some(pid) = dropped {
                    // The winner frame goes out once, from the play
                    // loop's game-over entry path.
                    state.forfeit(pid);
                    return;
                }
                state.tick_countdown();
                state.snapshot()
            };
            self.slots.lock().await.broadcast(&frame).await;
        }
    }

    /// The fixed-tick simulation loop. One tick is one critical section:
    /// physics step, snapshot, sound-event clear; the broadcast happens
    /// right after, from this task only, so frames never interleave.
    async fn run_play_loop(&mut self, state: &Arc<Mutex<GameState>>) {
        {
            // A forfeit can decide the match during the countdown; the
            // clients still get exactly one final frame with the winner.
            let state = state.lock().await;
            if state.is_over() {
                let frame = state.snapshot();
                drop(state);
                self.slots.lock().await.broadcast(&frame).await;
                return;
            }
        }

        let mut ticker = interval(Duration::from_secs_f64(1.0 / self.config.tick_rate as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tick: u64 = 0;
        loop {
            ticker.tick().await;
            tick += 1;

            let dropped = self.poll_liveness().await;
            let (frame, over) = {
                let mut state = state.lock().await;
                if let Some(pid) = dropped {
                    state.forfeit(pid);
                }
                state.step(&mut self.rng);
                let frame = state.snapshot();
                state.clear_sound_event();
                (frame, state.is_over())
            };

            self.slots.lock().await.broadcast(&frame).await;

            if over {
                return;
            }

            if tick % u64::from(self.config.tick_rate) == 0 {
                debug!(
                    "Tick {}: ball at ({}, {}), scores {:?}",
                    tick, frame.ball.x, frame.ball.y, frame.scores
                );
            }
        }
    }

    /// Liveness poll covering disconnects the listeners have not reported
    /// synchronously (e.g. ones first noticed by a failed broadcast).
    async fn poll_liveness(&self) -> Option<PlayerId> {
        self.slots.lock().await.first_disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_contract() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.countdown_interval, Duration::from_secs(1));
        assert_eq!(config.cooldown, Duration::from_secs(5));
    }

    #[test]
    fn tick_duration_from_rate() {
        let config = ServerConfig::default();
        let tick = Duration::from_secs_f64(1.0 / config.tick_rate as f64);
        assert!(tick > Duration::from_millis(16));
        assert!(tick < Duration::from_millis(17));
    }

    #[tokio::test]
    async fn server_binds_to_ephemeral_port() {
        let server = Server::new("127.0.0.1:0", ServerConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
