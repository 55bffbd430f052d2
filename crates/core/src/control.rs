//! Control events pushed by the input collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A discrete control request drained by the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEvent {
    /// Pause the build
    Pause,
    /// Resume a paused build
    Resume,
    /// Flip between paused and running
    TogglePause,
    /// Silence alert notifications
    Mute,
    /// Re-enable alert notifications
    Unmute,
    /// Flip between muted and unmuted
    ToggleMute,
    /// Stop monitoring
    Quit,
}

impl ControlEvent {
    /// Map a single key press to a control event.
    ///
    /// `p` toggles pause, `m` toggles mute and `q` quits; case is ignored.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'p' => Some(Self::TogglePause),
            'm' => Some(Self::ToggleMute),
            'q' => Some(Self::Quit),
            _ => None,
        }
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlEvent::Pause => write!(f, "pause"),
            ControlEvent::Resume => write!(f, "resume"),
            ControlEvent::TogglePause => write!(f, "toggle-pause"),
            ControlEvent::Mute => write!(f, "mute"),
            ControlEvent::Unmute => write!(f, "unmute"),
            ControlEvent::ToggleMute => write!(f, "toggle-mute"),
            ControlEvent::Quit => write!(f, "quit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_key_maps_bindings() {
        assert_eq!(ControlEvent::from_key('p'), Some(ControlEvent::TogglePause));
        assert_eq!(ControlEvent::from_key('M'), Some(ControlEvent::ToggleMute));
        assert_eq!(ControlEvent::from_key('q'), Some(ControlEvent::Quit));
        assert_eq!(ControlEvent::from_key('x'), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ControlEvent::TogglePause.to_string(), "toggle-pause");
        assert_eq!(ControlEvent::Quit.to_string(), "quit");
    }
}
