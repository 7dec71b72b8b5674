use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the update lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateKind {
    Idle,
    Poll,
    UpdateCheck,
    UpdateFetch,
    UpdateInstall,
    Installing,
    Installed,
    WaitingForReboot,
    Error,
}

impl StateKind {
    pub const ALL: [StateKind; 9] = [
        StateKind::Idle,
        StateKind::Poll,
        StateKind::UpdateCheck,
        StateKind::UpdateFetch,
        StateKind::UpdateInstall,
        StateKind::Installing,
        StateKind::Installed,
        StateKind::WaitingForReboot,
        StateKind::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StateKind::Idle => "idle",
            StateKind::Poll => "poll",
            StateKind::UpdateCheck => "update-check",
            StateKind::UpdateFetch => "update-fetch",
            StateKind::UpdateInstall => "update-install",
            StateKind::Installing => "installing",
            StateKind::Installed => "installed",
            StateKind::WaitingForReboot => "waiting-for-reboot",
            StateKind::Error => "error",
        }
    }

    /// States that act on a found update; the state-change callback may veto them.
    pub fn is_update_step(self) -> bool {
        matches!(
            self,
            StateKind::UpdateFetch
                | StateKind::UpdateInstall
                | StateKind::Installing
                | StateKind::Installed
                | StateKind::WaitingForReboot
        )
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_serde() {
        for kind in StateKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }

    #[test]
    fn waiting_states_are_not_update_steps() {
        assert!(!StateKind::Idle.is_update_step());
        assert!(!StateKind::Poll.is_update_step());
        assert!(!StateKind::UpdateCheck.is_update_step());
        assert!(!StateKind::Error.is_update_step());
        assert!(StateKind::Installing.is_update_step());
    }
}
