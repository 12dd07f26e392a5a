//! Single-character operator commands.

use std::fmt;

use crate::state::RobotState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Pause,
    Stop,
    Calibrate,
    Faster,
    Slower,
    QueryState,
    QueryBaseSpeed,
    Help,
}

impl Command {
    pub const HELP: &'static str = "s=start p=pause x=stop c=calibrate +=faster -=slower t=state v=speed h=help";

    /// Unknown characters map to `None` and are ignored by callers.
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            's' => Command::Start,
            'p' => Command::Pause,
            'x' => Command::Stop,
            'c' => Command::Calibrate,
            '+' => Command::Faster,
            '-' => Command::Slower,
            't' => Command::QueryState,
            'v' => Command::QueryBaseSpeed,
            'h' | '?' => Command::Help,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            Command::Start => 's',
            Command::Pause => 'p',
            Command::Stop => 'x',
            Command::Calibrate => 'c',
            Command::Faster => '+',
            Command::Slower => '-',
            Command::QueryState => 't',
            Command::QueryBaseSpeed => 'v',
            Command::Help => 'h',
        }
    }

    /// Parse every recognised character in a line, skipping the rest.
    pub fn parse_line(line: &str) -> impl Iterator<Item = Command> + '_ {
        line.chars().filter_map(Command::from_char)
    }
}

/// Outcome of executing a `Command` against the navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Accepted,
    Rejected(RobotState),
    State(RobotState),
    BaseSpeed(i32),
    Help,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Accepted => f.write_str("ok"),
            Reply::Rejected(state) => write!(f, "rejected in {state}"),
            Reply::State(state) => write!(f, "state: {state}"),
            Reply::BaseSpeed(speed) => write!(f, "base speed: {speed}"),
            Reply::Help => f.write_str(Command::HELP),
        }
    }
}
