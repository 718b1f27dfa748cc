use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const FIELD_WIDTH: i32 = 800;
pub const FIELD_HEIGHT: i32 = 600;
// The score strip at the top of the field; the ball and paddles stay below it.
pub const TOP_MARGIN: i32 = 60;
pub const PADDLE_HEIGHT: i32 = 100;
pub const PADDLE_SPEED: i32 = 10;
pub const PADDLE_MIN_Y: i32 = TOP_MARGIN;
pub const PADDLE_MAX_Y: i32 = FIELD_HEIGHT - PADDLE_HEIGHT;
pub const PADDLE_START_Y: i32 = 250;
pub const PADDLE_PLANE_LEFT: i32 = 40;
pub const PADDLE_PLANE_RIGHT: i32 = FIELD_WIDTH - PADDLE_PLANE_LEFT;
pub const BALL_SPEED: i32 = 5;
pub const WIN_SCORE: u32 = 10;
pub const COUNTDOWN_START: u32 = 3;
pub const TICK_RATE_HZ: u32 = 60;
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);
pub const COOLDOWN: Duration = Duration::from_secs(5);
pub const DEFAULT_PORT: u16 = 8082;

/// One of the two fixed session slots (0 = left paddle, 1 = right paddle).
pub type PlayerId = usize;

pub const PLAYER_SLOTS: usize = 2;

pub fn opponent(pid: PlayerId) -> PlayerId {
    1 - pid
}

/// Movement intent sent by a client as a raw ASCII token.
///
/// Anything that is not one of the two literal tokens is treated as
/// malformed input and ignored by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
}

impl Command {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "UP" => Some(Command::Up),
            "DOWN" => Some(Command::Down),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Command::Up => "UP",
            Command::Down => "DOWN",
        }
    }
}

/// One-tick collision hint for client-side sound playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundEvent {
    WallHit,
    PlatformHit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ball {
    pub x: i32,
    pub y: i32,
    pub vx: i32,
    pub vy: i32,
}

/// Full game state snapshot broadcast to both clients after every tick.
///
/// One frame is one JSON object followed by a `\n` delimiter. Paddle keys
/// are the stringified player ids, `winner` is null until the match is
/// decided, and `sound_event` is null on ticks without a collision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFrame {
    pub paddles: BTreeMap<String, i32>,
    pub ball: Ball,
    pub scores: [u32; 2],
    pub countdown: u32,
    pub winner: Option<PlayerId>,
    pub sound_event: Option<SoundEvent>,
}

impl StateFrame {
    /// Serializes the frame to one newline-terminated JSON line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> serde_json::Result<StateFrame> {
        serde_json::from_str(line)
    }

    pub fn paddle(&self, pid: PlayerId) -> Option<i32> {
        self.paddles.get(&pid.to_string()).copied()
    }
}

/// Reassembles state frames from an arbitrarily chunked byte stream.
///
/// Frames are concatenated on the wire, so a single read can contain a
/// partial frame, several frames, or both. Callers feed raw chunks with
/// [`push`](FrameDecoder::push) and drain complete frames with
/// [`next_frame`](FrameDecoder::next_frame).
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
    }

    /// Returns the next complete frame, or None if the buffer holds only a
    /// partial line. Blank lines are skipped.
    pub fn next_frame(&mut self) -> Option<serde_json::Result<StateFrame>> {
        loop {
            let newline = self.buffer.find('\n')?;
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Some(StateFrame::from_line(line));
        }
    }
}
