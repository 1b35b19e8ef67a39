use std::fmt;

use serde::Serialize;

use super::events::Phase;

/// Lifecycle of the scan engine.
///
/// ```text
/// idle ─▶ scanning(fast) ─▶ scanning(deep) ─▶ complete
///              │                  │
///              └──▶ cancelled ◀───┘        (any) ─▶ failed
/// ```
/// Terminal states accept a new start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "phase", rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Scanning(Phase),
    Complete,
    Cancelled,
    Failed,
}

impl ScanState {
    pub fn is_active(&self) -> bool {
        matches!(self, ScanState::Scanning(_))
    }

    pub fn can_transition_to(&self, next: ScanState) -> bool {
        use ScanState::*;
        match (*self, next) {
            (_, Failed) => true,
            (Idle | Complete | Cancelled | Failed, Scanning(_)) => true,
            (Scanning(Phase::Fast), Scanning(Phase::Deep)) => true,
            (Scanning(Phase::Deep), Complete) => true,
            (Scanning(_), Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Idle => write!(f, "idle"),
            ScanState::Scanning(phase) => write!(f, "scanning({})", phase.as_str()),
            ScanState::Complete => write!(f, "complete"),
            ScanState::Cancelled => write!(f, "cancelled"),
            ScanState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let fast = ScanState::Scanning(Phase::Fast);
        let deep = ScanState::Scanning(Phase::Deep);
        assert!(ScanState::Idle.can_transition_to(fast));
        assert!(fast.can_transition_to(deep));
        assert!(deep.can_transition_to(ScanState::Complete));
        assert!(ScanState::Complete.can_transition_to(fast));
    }

    #[test]
    fn illegal_transitions() {
        let fast = ScanState::Scanning(Phase::Fast);
        let deep = ScanState::Scanning(Phase::Deep);
        assert!(!fast.can_transition_to(ScanState::Complete));
        assert!(!deep.can_transition_to(fast));
        assert!(!ScanState::Idle.can_transition_to(ScanState::Cancelled));
        assert!(!fast.can_transition_to(fast));
    }

    #[test]
    fn cancel_and_fail_from_scanning() {
        for phase in [Phase::Fast, Phase::Deep] {
            let s = ScanState::Scanning(phase);
            assert!(s.is_active());
            assert!(s.can_transition_to(ScanState::Cancelled));
            assert!(s.can_transition_to(ScanState::Failed));
        }
        assert_eq!(ScanState::Scanning(Phase::Deep).to_string(), "scanning(deep)");
    }
}
