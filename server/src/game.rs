use rand::Rng;
use shared::{
    opponent, Ball, Command, PlayerId, SoundEvent, StateFrame, BALL_SPEED, COUNTDOWN_START,
    FIELD_HEIGHT, FIELD_WIDTH, PADDLE_HEIGHT, PADDLE_MAX_Y, PADDLE_MIN_Y, PADDLE_PLANE_LEFT,
    PADDLE_PLANE_RIGHT, PADDLE_SPEED, PADDLE_START_Y, TOP_MARGIN, WIN_SCORE,
};
use std::collections::BTreeMap;

/// Explicit life-cycle phase of a running match.
///
/// The waiting-for-players and post-match cooldown phases have no game
/// state to tag; they live in the match controller's control flow. A
/// `GameOver` phase is terminal: the only way out is discarding the whole
/// state and starting a new match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Countdown(u32),
    Playing,
    GameOver { winner: PlayerId },
}

/// The single shared mutable aggregate owning all simulation state.
///
/// One `tokio::sync::Mutex` guards the whole struct; input listeners
/// mutate only their paddle entry, the simulation loop mutates everything,
/// but every read-modify-write goes through the same lock so a broadcast
/// snapshot can never mix two ticks.
#[derive(Debug, Clone)]
pub struct GameState {
    pub paddles: [i32; 2],
    pub ball: Ball,
    pub scores: [u32; 2],
    pub phase: MatchPhase,
    pub sound_event: Option<SoundEvent>,
}

impl GameState {
    /// Fresh pre-match state: centered paddles, zero scores, full
    /// countdown, and a serve in a random diagonal direction.
    pub fn new(rng: &mut impl Rng) -> Self {
        GameState {
            paddles: [PADDLE_START_Y; 2],
            ball: serve(rng),
            scores: [0, 0],
            phase: MatchPhase::Countdown(COUNTDOWN_START),
            sound_event: None,
        }
    }

    /// Applies one movement command to that player's paddle, clamped to
    /// the field bounds. Called from the input listener tasks.
    pub fn apply_command(&mut self, pid: PlayerId, cmd: Command) {
        let paddle = &mut self.paddles[pid];
        *paddle = match cmd {
            Command::Up => (*paddle - PADDLE_SPEED).max(PADDLE_MIN_Y),
            Command::Down => (*paddle + PADDLE_SPEED).min(PADDLE_MAX_Y),
        };
    }

    /// Decrements the pre-game countdown; entering play once it hits zero.
    pub fn tick_countdown(&mut self) {
        if let MatchPhase::Countdown(ticks) = self.phase {
            self.phase = match ticks.saturating_sub(1) {
                0 => MatchPhase::Playing,
                left => MatchPhase::Countdown(left),
            };
        }
    }

    /// Advances the simulation by one tick. No-op outside the playing
    /// phase.
    ///
    /// Check order is part of the wire-visible contract: walls, then
    /// paddle planes, then goal lines, then the win condition. The paddle
    /// check running before the goal check means a paddle that still
    /// covers the ball row on a crossing tick bounces it back instead of
    /// conceding.
    pub fn step(&mut self, rng: &mut impl Rng) {
        if self.phase != MatchPhase::Playing {
            return;
        }

        self.ball.x += self.ball.vx;
        self.ball.y += self.ball.vy;

        if self.ball.y <= TOP_MARGIN || self.ball.y >= FIELD_HEIGHT {
            self.ball.vy = -self.ball.vy;
            self.sound_event = Some(SoundEvent::WallHit);
        }

        if (self.ball.x <= PADDLE_PLANE_LEFT && self.paddle_covers_ball(0))
            || (self.ball.x >= PADDLE_PLANE_RIGHT && self.paddle_covers_ball(1))
        {
            self.ball.vx = -self.ball.vx;
            self.sound_event = Some(SoundEvent::PlatformHit);
        }

        if self.ball.x < 0 {
            self.scores[1] += 1;
            self.ball = serve(rng);
        } else if self.ball.x > FIELD_WIDTH {
            self.scores[0] += 1;
            self.ball = serve(rng);
        }

        if self.scores[0] >= WIN_SCORE {
            self.phase = MatchPhase::GameOver { winner: 0 };
        } else if self.scores[1] >= WIN_SCORE {
            self.phase = MatchPhase::GameOver { winner: 1 };
        }
    }

    /// Ends the match with a win for the opposing player. No-op if the
    /// match is already decided, so a forfeit can never overwrite a
    /// legitimate winner.
    pub fn forfeit(&mut self, leaver: PlayerId) {
        if !self.is_over() {
            self.phase = MatchPhase::GameOver {
                winner: opponent(leaver),
            };
        }
    }

    pub fn countdown(&self) -> u32 {
        match self.phase {
            MatchPhase::Countdown(ticks) => ticks,
            _ => 0,
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, MatchPhase::GameOver { .. })
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match self.phase {
            MatchPhase::GameOver { winner } => Some(winner),
            _ => None,
        }
    }

    /// Builds the broadcast snapshot for the current tick. The caller
    /// clears the sound event afterwards, inside the same critical
    /// section, so each collision is reported exactly once.
    pub fn snapshot(&self) -> StateFrame {
        let mut paddles = BTreeMap::new();
        paddles.insert("0".to_string(), self.paddles[0]);
        paddles.insert("1".to_string(), self.paddles[1]);
        StateFrame {
            paddles,
            ball: self.ball,
            scores: self.scores,
            countdown: self.countdown(),
            winner: self.winner(),
            sound_event: self.sound_event,
        }
    }

    pub fn clear_sound_event(&mut self) {
        self.sound_event = None;
    }

    fn paddle_covers_ball(&self, pid: PlayerId) -> bool {
        let top = self.paddles[pid];
        (top..=top + PADDLE_HEIGHT).contains(&self.ball.y)
    }
}

/// Re-serves the ball from the center with unchanged speed magnitude and
/// an independently random sign on each axis.
fn serve(rng: &mut impl Rng) -> Ball {
    Ball {
        x: FIELD_WIDTH / 2,
        y: FIELD_HEIGHT / 2,
        vx: BALL_SPEED * random_sign(rng),
        vy: BALL_SPEED * random_sign(rng),
    }
}

fn random_sign(rng: &mut impl Rng) -> i32 {
    if rng.gen_bool(0.5) {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn playing_state() -> GameState {
        let mut state = GameState::new(&mut rng());
        state.phase = MatchPhase::Playing;
        state
    }

    #[test]
    fn fresh_state_is_pre_game() {
        let state = GameState::new(&mut rng());
        assert_eq!(state.paddles, [PADDLE_START_Y, PADDLE_START_Y]);
        assert_eq!(state.scores, [0, 0]);
        assert_eq!(state.countdown(), COUNTDOWN_START);
        assert!(!state.is_over());
        assert_eq!(state.winner(), None);
        assert_eq!(state.ball.x, FIELD_WIDTH / 2);
        assert_eq!(state.ball.y, FIELD_HEIGHT / 2);
        assert_eq!(state.ball.vx.abs(), BALL_SPEED);
        assert_eq!(state.ball.vy.abs(), BALL_SPEED);
    }

    #[test]
    fn reset_is_idempotent_up_to_serve_direction() {
        // Two fresh states differ at most in the serve's velocity signs.
        let a = GameState::new(&mut StdRng::seed_from_u64(1));
        let b = GameState::new(&mut StdRng::seed_from_u64(2));
        assert_eq!(a.paddles, b.paddles);
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.phase, b.phase);
        assert_eq!(a.sound_event, b.sound_event);
        assert_eq!((a.ball.x, a.ball.y), (b.ball.x, b.ball.y));
        assert_eq!(a.ball.vx.abs(), b.ball.vx.abs());
        assert_eq!(a.ball.vy.abs(), b.ball.vy.abs());
    }

    #[test]
    fn countdown_reaches_playing() {
        let mut state = GameState::new(&mut rng());
        state.tick_countdown();
        assert_eq!(state.countdown(), 2);
        assert_eq!(state.phase, MatchPhase::Countdown(2));
        state.tick_countdown();
        state.tick_countdown();
        assert_eq!(state.countdown(), 0);
        assert_eq!(state.phase, MatchPhase::Playing);
        // Further ticks are no-ops once play has started.
        state.tick_countdown();
        assert_eq!(state.phase, MatchPhase::Playing);
    }

    #[test]
    fn paddles_clamp_to_field_bounds() {
        let mut state = playing_state();
        for _ in 0..100 {
            state.apply_command(0, Command::Up);
            assert!(state.paddles[0] >= PADDLE_MIN_Y);
        }
        assert_eq!(state.paddles[0], PADDLE_MIN_Y);

        for _ in 0..100 {
            state.apply_command(1, Command::Down);
            assert!(state.paddles[1] <= PADDLE_MAX_Y);
        }
        assert_eq!(state.paddles[1], PADDLE_MAX_Y);
    }

    #[test]
    fn paddle_moves_by_fixed_step() {
        let mut state = playing_state();
        state.apply_command(0, Command::Up);
        assert_eq!(state.paddles[0], PADDLE_START_Y - PADDLE_SPEED);
        state.apply_command(0, Command::Down);
        assert_eq!(state.paddles[0], PADDLE_START_Y);
        assert_eq!(state.paddles[1], PADDLE_START_Y);
    }

    #[test]
    fn plain_advance_has_no_sound_event() {
        // Paddles at (250, 250), ball at (400, 300) moving (+5, +5).
        let mut state = playing_state();
        state.ball = Ball {
            x: 400,
            y: 300,
            vx: 5,
            vy: 5,
        };
        state.step(&mut rng());
        assert_eq!((state.ball.x, state.ball.y), (405, 305));
        assert_eq!(state.sound_event, None);
        assert_eq!(state.scores, [0, 0]);
    }

    #[test]
    fn top_wall_bounce_flips_vy() {
        // Ball at (795, 55) moving (+5, -5) flips vy and reports wall_hit.
        let mut state = playing_state();
        state.ball = Ball {
            x: 795,
            y: 55,
            vx: 5,
            vy: -5,
        };
        state.step(&mut rng());
        assert_eq!(state.ball.vy, 5);
        assert_eq!(state.sound_event, Some(SoundEvent::WallHit));
        // x lands exactly on the boundary, which is not yet a goal.
        assert_eq!(state.ball.x, 800);
        assert_eq!(state.scores, [0, 0]);
    }

    #[test]
    fn bottom_wall_bounce_flips_vy() {
        let mut state = playing_state();
        state.ball = Ball {
            x: 400,
            y: 598,
            vx: 5,
            vy: 5,
        };
        state.step(&mut rng());
        assert_eq!(state.ball.vy, -5);
        assert_eq!(state.sound_event, Some(SoundEvent::WallHit));
    }

    #[test]
    fn paddle_bounce_flips_vx() {
        let mut state = playing_state();
        state.paddles[0] = 250;
        state.ball = Ball {
            x: 42,
            y: 300,
            vx: -5,
            vy: 5,
        };
        state.step(&mut rng());
        assert_eq!(state.ball.vx, 5);
        assert_eq!(state.sound_event, Some(SoundEvent::PlatformHit));
        assert_eq!(state.scores, [0, 0]);
    }

    #[test]
    fn ball_missing_paddle_is_not_bounced() {
        let mut state = playing_state();
        state.paddles[0] = PADDLE_MIN_Y;
        state.ball = Ball {
            x: 42,
            y: 400,
            vx: -5,
            vy: 5,
        };
        state.step(&mut rng());
        assert_eq!(state.ball.vx, -5);
        assert_eq!(state.sound_event, None);
    }

    #[test]
    fn simultaneous_wall_and_paddle_hit_flips_both_axes() {
        let mut state = playing_state();
        state.paddles[1] = PADDLE_MIN_Y;
        // Lands on (762, 60): on the top margin and on the paddle plane.
        state.ball = Ball {
            x: 757,
            y: 65,
            vx: 5,
            vy: -5,
        };
        state.step(&mut rng());
        assert_eq!(state.ball.vx, -5);
        assert_eq!(state.ball.vy, 5);
        // The paddle hit is the event that survives the tick.
        assert_eq!(state.sound_event, Some(SoundEvent::PlatformHit));
    }

    #[test]
    fn grazing_save_takes_precedence_over_goal() {
        // The ball reaches x=0 exactly while the paddle covers it: the
        // paddle-plane check runs first, so it bounces instead of scoring.
        let mut state = playing_state();
        state.paddles[0] = 250;
        state.ball = Ball {
            x: 5,
            y: 300,
            vx: -5,
            vy: 5,
        };
        state.step(&mut rng());
        assert_eq!(state.ball.vx, 5);
        assert_eq!(state.scores, [0, 0]);
        assert_eq!(state.sound_event, Some(SoundEvent::PlatformHit));
    }

    #[test]
    fn crossing_the_goal_line_scores_for_the_right_player() {
        let mut state = playing_state();
        state.paddles[0] = PADDLE_MAX_Y; // out of the ball's row
        state.ball = Ball {
            x: 2,
            y: 100,
            vx: -5,
            vy: 5,
        };
        state.step(&mut rng());
        assert_eq!(state.scores, [0, 1]);
        // Ball re-served from the center at unchanged speed.
        assert_eq!(state.ball.x, FIELD_WIDTH / 2);
        assert_eq!(state.ball.y, FIELD_HEIGHT / 2);
        assert_eq!(state.ball.vx.abs(), BALL_SPEED);
        assert_eq!(state.ball.vy.abs(), BALL_SPEED);
    }

    #[test]
    fn crossing_the_right_goal_line_scores_for_the_left_player() {
        let mut state = playing_state();
        state.paddles[1] = PADDLE_MAX_Y;
        state.ball = Ball {
            x: 798,
            y: 100,
            vx: 5,
            vy: 5,
        };
        state.step(&mut rng());
        assert_eq!(state.scores, [1, 0]);
        assert_eq!(state.ball.x, FIELD_WIDTH / 2);
    }

    #[test]
    fn speed_magnitude_is_invariant_across_many_ticks() {
        let mut seed = rng();
        let mut state = playing_state();
        for _ in 0..10_000 {
            state.step(&mut seed);
            if state.is_over() {
                break;
            }
            assert_eq!(state.ball.vx.abs(), BALL_SPEED);
            assert_eq!(state.ball.vy.abs(), BALL_SPEED);
        }
    }

    #[test]
    fn tenth_goal_ends_the_match() {
        let mut state = playing_state();
        state.scores = [9, 3];
        state.paddles[0] = PADDLE_MAX_Y;
        state.paddles[1] = PADDLE_MAX_Y;
        state.ball = Ball {
            x: 798,
            y: 100,
            vx: 5,
            vy: 5,
        };
        state.step(&mut rng());
        assert_eq!(state.scores, [10, 3]);
        assert!(state.is_over());
        assert_eq!(state.winner(), Some(0));
    }

    #[test]
    fn game_over_latches_until_reset() {
        let mut state = playing_state();
        state.scores = [10, 0];
        state.phase = MatchPhase::GameOver { winner: 0 };
        let ball_before = state.ball;
        for _ in 0..10 {
            state.step(&mut rng());
        }
        assert!(state.is_over());
        assert_eq!(state.winner(), Some(0));
        assert_eq!(state.ball, ball_before);
    }

    #[test]
    fn forfeit_awards_the_other_player() {
        let mut state = playing_state();
        state.scores = [3, 5];
        state.forfeit(1);
        assert!(state.is_over());
        assert_eq!(state.winner(), Some(0));
    }

    #[test]
    fn forfeit_cannot_overwrite_a_decided_match() {
        let mut state = playing_state();
        state.phase = MatchPhase::GameOver { winner: 1 };
        state.forfeit(1);
        assert_eq!(state.winner(), Some(1));
    }

    #[test]
    fn snapshot_reflects_state_and_sound_pulse() {
        let mut state = playing_state();
        state.sound_event = Some(SoundEvent::WallHit);
        state.scores = [3, 5];

        let frame = state.snapshot();
        assert_eq!(frame.paddle(0), Some(PADDLE_START_Y));
        assert_eq!(frame.paddle(1), Some(PADDLE_START_Y));
        assert_eq!(frame.scores, [3, 5]);
        assert_eq!(frame.countdown, 0);
        assert_eq!(frame.winner, None);
        assert_eq!(frame.sound_event, Some(SoundEvent::WallHit));

        state.clear_sound_event();
        assert_eq!(state.snapshot().sound_event, None);
    }

    #[test]
    fn snapshot_carries_countdown_and_winner() {
        let mut state = GameState::new(&mut rng());
        assert_eq!(state.snapshot().countdown, COUNTDOWN_START);

        state.phase = MatchPhase::GameOver { winner: 1 };
        let frame = state.snapshot();
        assert_eq!(frame.countdown, 0);
        assert_eq!(frame.winner, Some(1));
    }
}
