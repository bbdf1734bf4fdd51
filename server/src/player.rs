use shared::{to_fixed, Coord};

/// Per-slot stage within the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    /// Connected but not part of the running round.
    Waiting,
    Playing,
    /// Dead or finished.
    Ended,
}

/// Input a client declared for the next tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub jetpack_active: bool,
}

/// Simulation state of one occupied slot. Positions are in tile units.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub velocity_y: f32,
    pub jetpack_active: bool,
    pub score: i32,
    pub alive: bool,
    pub finished: bool,
    pub phase: PlayerPhase,
}

impl PlayerState {
    pub fn new(start: Coord) -> Self {
        Self {
            x: start.x as f32,
            y: start.y as f32,
            velocity_y: 0.0,
            jetpack_active: false,
            score: 0,
            alive: true,
            finished: false,
            phase: PlayerPhase::Waiting,
        }
    }

    /// True once the player died or crossed the finish.
    pub fn is_terminal(&self) -> bool {
        !self.alive || self.finished
    }

    pub fn fixed_position(&self) -> (i32, i32) {
        (to_fixed(self.x), to_fixed(self.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_creation() {
        let player = PlayerState::new(Coord::new(3, 2));
        assert_eq!(player.x, 3.0);
        assert_eq!(player.y, 2.0);
        assert_eq!(player.velocity_y, 0.0);
        assert_eq!(player.score, 0);
        assert!(player.alive);
        assert!(!player.finished);
        assert_eq!(player.phase, PlayerPhase::Waiting);
        assert!(!player.is_terminal());
    }

    #[test]
    fn test_terminal_markers() {
        let mut player = PlayerState::new(Coord::default());
        player.alive = false;
        assert!(player.is_terminal());

        let mut player = PlayerState::new(Coord::default());
        player.finished = true;
        assert!(player.is_terminal());
    }

    #[test]
    fn test_fixed_position() {
        let mut player = PlayerState::new(Coord::new(1, 2));
        player.x = 5.256;
        assert_eq!(player.fixed_position(), (526, 200));
    }
}
