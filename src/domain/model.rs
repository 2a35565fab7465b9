use serde::{Deserialize, Serialize};
use std::fmt;

/// Lock state as last reported by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LockState {
    Locked,
    Unlocked,
    /// Unknown: no confirmed read yet, or the link is reconnecting.
    Error,
}

impl LockState {
    /// Classify one state line emitted by the device.
    pub fn from_report(line: &str) -> Self {
        if line.trim() == "LOCKED" {
            LockState::Locked
        } else {
            LockState::Unlocked
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Locked => "LOCKED",
            LockState::Unlocked => "UNLOCKED",
            LockState::Error => "ERROR",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands understood by the actuator firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Unlock,
    Lock,
    State,
}

impl Command {
    /// Byte written to the serial link, `None` for commands answered locally.
    pub fn wire_byte(&self) -> Option<u8> {
        match self {
            Command::Unlock => Some(b'o'),
            Command::Lock => Some(b'c'),
            Command::State => None,
        }
    }

    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "open" => Some(Command::Unlock),
            "close" => Some(Command::Lock),
            "state" => Some(Command::State),
            _ => None,
        }
    }

    pub fn is_gated(&self) -> bool {
        !matches!(self, Command::State)
    }
}

/// Query parameters of one inbound request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub token: String,
}

/// Closed set of plaintext response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    State(LockState),
    Success,
    Failed,
    NotAllowed,
}

impl Reply {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reply::State(state) => state.as_str(),
            Reply::Success => "SUCCESS",
            Reply::Failed => "FAILED",
            Reply::NotAllowed => "NOT ALLOWED",
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
