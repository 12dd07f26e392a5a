//! Robot states, the legal transition table, and turn intents.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotState {
    Idle,
    Calibrating,
    Following,
    WaitingForTurn,
    Turning,
    SearchingLeft,
    SearchingRight,
    Lost,
    Stopped,
}

impl RobotState {
    /// True while the robot is executing a run (the button pauses it).
    pub fn is_running(self) -> bool {
        !matches!(
            self,
            RobotState::Idle | RobotState::Lost | RobotState::Stopped
        )
    }

    pub fn is_searching(self) -> bool {
        matches!(self, RobotState::SearchingLeft | RobotState::SearchingRight)
    }

    /// Legal transitions. Every state may enter STOPPED.
    pub fn can_transition_to(self, next: RobotState) -> bool {
        use RobotState::*;
        if next == Stopped {
            return true;
        }
        match self {
            Idle => matches!(next, Following | Calibrating),
            Calibrating => next == Idle,
            // a timed pivot without odometry searches opposite its direction
            Following => matches!(next, WaitingForTurn | Turning | SearchingLeft | SearchingRight),
            WaitingForTurn => matches!(next, SearchingLeft | SearchingRight),
            Turning => matches!(next, Following | SearchingLeft | SearchingRight),
            SearchingLeft => matches!(next, SearchingRight | Following | Lost),
            SearchingRight => matches!(next, SearchingLeft | Following | Lost),
            Lost => next == Idle,
            Stopped => next == Following,
        }
    }
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RobotState::Idle => "IDLE",
            RobotState::Calibrating => "CALIBRATING",
            RobotState::Following => "FOLLOWING",
            RobotState::WaitingForTurn => "WAITING_FOR_TURN",
            RobotState::Turning => "TURNING",
            RobotState::SearchingLeft => "SEARCHING_LEFT",
            RobotState::SearchingRight => "SEARCHING_RIGHT",
            RobotState::Lost => "LOST",
            RobotState::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnDirection {
    #[default]
    None,
    Left,
    Right,
}

impl TurnDirection {
    pub fn opposite(self) -> Self {
        match self {
            TurnDirection::None => TurnDirection::None,
            TurnDirection::Left => TurnDirection::Right,
            TurnDirection::Right => TurnDirection::Left,
        }
    }

    /// Positive offsets mean the line is right of center.
    pub fn from_offset(offset: f32) -> Self {
        if offset > 0.0 {
            TurnDirection::Right
        } else if offset < 0.0 {
            TurnDirection::Left
        } else {
            TurnDirection::None
        }
    }

    /// Search state sweeping in this direction; `None` searches left.
    pub fn search_state(self) -> RobotState {
        match self {
            TurnDirection::Right => RobotState::SearchingRight,
            TurnDirection::Left | TurnDirection::None => RobotState::SearchingLeft,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TurnIntent {
    pub direction: TurnDirection,
    pub degrees: f32,
}

impl TurnIntent {
    pub const NONE: TurnIntent = TurnIntent {
        direction: TurnDirection::None,
        degrees: 0.0,
    };
}
