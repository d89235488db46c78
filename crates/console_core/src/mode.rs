use std::fmt;

use serde::Serialize;
use shared::error::ConsoleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Live,
    Staging,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Staging => "staging",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeAction {
    EnterStaging,
    Commit,
    Cancel,
}

impl ModeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnterStaging => "enter staging",
            Self::Commit => "commit",
            Self::Cancel => "cancel",
        }
    }
}

/// The only legal transitions are LIVE → STAGING (enter) and
/// STAGING → LIVE (commit or cancel).
pub fn transition(from: Mode, action: ModeAction) -> Result<Mode, ConsoleError> {
    match (from, action) {
        (Mode::Live, ModeAction::EnterStaging) => Ok(Mode::Staging),
        (Mode::Staging, ModeAction::Commit | ModeAction::Cancel) => Ok(Mode::Live),
        _ => Err(ConsoleError::InvalidTransition {
            from: from.as_str(),
            action: action.as_str(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        assert_eq!(transition(Mode::Live, ModeAction::EnterStaging), Ok(Mode::Staging));
        assert_eq!(transition(Mode::Staging, ModeAction::Commit), Ok(Mode::Live));
        assert_eq!(transition(Mode::Staging, ModeAction::Cancel), Ok(Mode::Live));
    }

    #[test]
    fn self_transitions_are_rejected() {
        for (mode, action) in [
            (Mode::Live, ModeAction::Commit),
            (Mode::Live, ModeAction::Cancel),
            (Mode::Staging, ModeAction::EnterStaging),
        ] {
            let err = transition(mode, action).expect_err("must reject");
            assert_eq!(err.code(), shared::error::ErrorCode::Conflict);
        }
    }
}
