//! Trading-day phases and their legal transitions.
//!
//! Idle -> Initializing -> Armed -> Trading -> Liquidating -> Closed -> Idle
//!
//! Closed -> Idle is the rollover into the next session.

use crate::domain::error::TraderError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayPhase {
    Idle,
    Initializing,
    Armed,
    Trading,
    Liquidating,
    Closed,
}

impl DayPhase {
    pub fn next(&self) -> DayPhase {
        match self {
            DayPhase::Idle => DayPhase::Initializing,
            DayPhase::Initializing => DayPhase::Armed,
            DayPhase::Armed => DayPhase::Trading,
            DayPhase::Trading => DayPhase::Liquidating,
            DayPhase::Liquidating => DayPhase::Closed,
            DayPhase::Closed => DayPhase::Idle,
        }
    }

    pub fn can_transition_to(&self, to: DayPhase) -> bool {
        self.next() == to
    }

    /// Validated transition.
    pub fn transition(self, to: DayPhase) -> Result<DayPhase, TraderError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TraderError::InvalidTransition { from: self, to })
        }
    }

    /// New entries are only accepted while trading.
    pub fn accepts_entries(&self) -> bool {
        matches!(self, DayPhase::Trading)
    }
}

impl fmt::Display for DayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayPhase::Idle => "Idle",
            DayPhase::Initializing => "Initializing",
            DayPhase::Armed => "Armed",
            DayPhase::Trading => "Trading",
            DayPhase::Liquidating => "Liquidating",
            DayPhase::Closed => "Closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle_returns_to_idle() {
        let mut phase = DayPhase::Idle;
        let mut visited = vec![phase];
        for _ in 0..6 {
            phase = phase.transition(phase.next()).unwrap();
            visited.push(phase);
        }
        assert_eq!(
            visited,
            vec![
                DayPhase::Idle,
                DayPhase::Initializing,
                DayPhase::Armed,
                DayPhase::Trading,
                DayPhase::Liquidating,
                DayPhase::Closed,
                DayPhase::Idle,
            ]
        );
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let err = DayPhase::Idle.transition(DayPhase::Trading).unwrap_err();
        assert!(matches!(
            err,
            TraderError::InvalidTransition {
                from: DayPhase::Idle,
                to: DayPhase::Trading
            }
        ));
        assert!(!DayPhase::Trading.can_transition_to(DayPhase::Closed));
    }

    #[test]
    fn only_trading_accepts_entries() {
        assert!(DayPhase::Trading.accepts_entries());
        assert!(!DayPhase::Liquidating.accepts_entries());
        assert!(!DayPhase::Armed.accepts_entries());
    }
}
