//! Mode — the dwelling's security/activity state machine.
//!
//! The transition function is pure: given the current mode, the pending
//! transition signals, and the node readiness flag, it always yields the
//! same next mode. Side effects (signal clearing, broadcasts, counter
//! resets) belong to the driver's commit step in the app crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed set of dwelling modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Initial mode; startup wiring happens here.
    Start,
    /// Readiness gate: waits for every node to report started.
    Check,
    /// Normal occupied operation.
    Run,
    /// Night operation.
    Sleep,
    /// Grace period before arming.
    Prelock,
    /// Armed; only controller traffic and alerts may execute.
    Lock,
    /// Suspicious activity while armed.
    Warning,
    /// Intrusion declared.
    Detection,
    /// Low-activity fallback.
    Idle,
    /// Terminal mode; never left.
    Stop,
}

/// Pending transition inputs, set by executed requests and consumed by the
/// commit step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionSignals {
    /// The current mode's duration timer fired.
    pub timeout: bool,
    /// A named transition was requested (`update_fsm`, detection trip).
    pub transition: Option<Mode>,
}

impl Mode {
    /// Compute the next mode.
    ///
    /// `nodes_ready` is only consulted in [`Check`](Self::Check) — the
    /// readiness gate is vacuously satisfied when no nodes are registered.
    /// The timeout signal takes priority over the named signal everywhere
    /// except [`Start`](Self::Start), which moves on unconditionally.
    #[must_use]
    pub fn calculate(self, signals: TransitionSignals, nodes_ready: bool) -> Self {
        let named = signals.transition;
        match self {
            Self::Start => Self::Check,
            Self::Check => {
                if signals.timeout {
                    Self::Stop
                } else if nodes_ready {
                    Self::Run
                } else {
                    self
                }
            }
            Self::Run => self.next_of(signals, &[Self::Sleep, Self::Prelock], Self::Idle),
            Self::Sleep => self.next_of(signals, &[Self::Run], Self::Idle),
            Self::Prelock => self.next_of(signals, &[Self::Run], Self::Lock),
            Self::Warning => self.next_of(signals, &[Self::Run], Self::Detection),
            Self::Lock => self.next_of(
                signals,
                &[Self::Warning, Self::Detection, Self::Run],
                Self::Idle,
            ),
            Self::Detection => self.next_of(signals, &[Self::Idle], Self::Idle),
            Self::Idle => {
                if signals.timeout || named == Some(Self::Run) {
                    Self::Run
                } else {
                    self
                }
            }
            Self::Stop => Self::Stop,
        }
    }

    /// Shared shape of most transition rows: timeout wins, then the named
    /// signal if it is one of the accepted targets.
    fn next_of(self, signals: TransitionSignals, accepted: &[Self], on_timeout: Self) -> Self {
        if signals.timeout {
            on_timeout
        } else {
            match signals.transition {
                Some(named) if accepted.contains(&named) => named,
                _ => self,
            }
        }
    }

    /// Whether this mode has no outgoing transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stop)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Check => "check",
            Self::Run => "run",
            Self::Sleep => "sleep",
            Self::Prelock => "prelock",
            Self::Lock => "lock",
            Self::Warning => "warning",
            Self::Detection => "detection",
            Self::Idle => "idle",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "check" => Ok(Self::Check),
            "run" => Ok(Self::Run),
            "sleep" => Ok(Self::Sleep),
            "prelock" => Ok(Self::Prelock),
            "lock" => Ok(Self::Lock),
            "warning" => Ok(Self::Warning),
            "detection" => Ok(Self::Detection),
            "idle" => Ok(Self::Idle),
            "stop" => Ok(Self::Stop),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> TransitionSignals {
        TransitionSignals {
            timeout: true,
            transition: None,
        }
    }

    fn named(mode: Mode) -> TransitionSignals {
        TransitionSignals {
            timeout: false,
            transition: Some(mode),
        }
    }

    fn idle_signals() -> TransitionSignals {
        TransitionSignals::default()
    }

    #[test]
    fn should_leave_start_unconditionally() {
        assert_eq!(Mode::Start.calculate(idle_signals(), false), Mode::Check);
        // Start ignores the timeout signal.
        assert_eq!(Mode::Start.calculate(timeout(), false), Mode::Check);
    }

    #[test]
    fn should_gate_check_on_node_readiness() {
        assert_eq!(Mode::Check.calculate(idle_signals(), false), Mode::Check);
        assert_eq!(Mode::Check.calculate(idle_signals(), true), Mode::Run);
        assert_eq!(Mode::Check.calculate(timeout(), true), Mode::Stop);
    }

    #[test]
    fn should_follow_run_transition_row() {
        assert_eq!(Mode::Run.calculate(timeout(), true), Mode::Idle);
        assert_eq!(Mode::Run.calculate(named(Mode::Sleep), true), Mode::Sleep);
        assert_eq!(Mode::Run.calculate(named(Mode::Prelock), true), Mode::Prelock);
        // Unaccepted named signals are ignored.
        assert_eq!(Mode::Run.calculate(named(Mode::Lock), true), Mode::Run);
    }

    #[test]
    fn should_follow_lock_transition_row() {
        assert_eq!(Mode::Lock.calculate(timeout(), true), Mode::Idle);
        assert_eq!(Mode::Lock.calculate(named(Mode::Warning), true), Mode::Warning);
        assert_eq!(
            Mode::Lock.calculate(named(Mode::Detection), true),
            Mode::Detection
        );
        assert_eq!(Mode::Lock.calculate(named(Mode::Run), true), Mode::Run);
        assert_eq!(Mode::Lock.calculate(named(Mode::Sleep), true), Mode::Lock);
    }

    #[test]
    fn should_prefer_timeout_over_named_signal() {
        let both = TransitionSignals {
            timeout: true,
            transition: Some(Mode::Run),
        };
        assert_eq!(Mode::Sleep.calculate(both, true), Mode::Idle);
        assert_eq!(Mode::Prelock.calculate(both, true), Mode::Lock);
        assert_eq!(Mode::Warning.calculate(both, true), Mode::Detection);
    }

    #[test]
    fn should_return_to_run_from_idle_on_either_signal() {
        assert_eq!(Mode::Idle.calculate(timeout(), true), Mode::Run);
        assert_eq!(Mode::Idle.calculate(named(Mode::Run), true), Mode::Run);
        assert_eq!(Mode::Idle.calculate(idle_signals(), true), Mode::Idle);
    }

    #[test]
    fn should_never_leave_stop() {
        for signals in [idle_signals(), timeout(), named(Mode::Run)] {
            assert_eq!(Mode::Stop.calculate(signals, true), Mode::Stop);
        }
        assert!(Mode::Stop.is_terminal());
    }

    #[test]
    fn should_be_deterministic_for_fixed_inputs() {
        let signals = named(Mode::Prelock);
        let first = Mode::Run.calculate(signals, true);
        for _ in 0..10 {
            assert_eq!(Mode::Run.calculate(signals, true), first);
        }
    }

    #[test]
    fn should_roundtrip_mode_names() {
        for mode in [
            Mode::Start,
            Mode::Check,
            Mode::Run,
            Mode::Sleep,
            Mode::Prelock,
            Mode::Lock,
            Mode::Warning,
            Mode::Detection,
            Mode::Idle,
            Mode::Stop,
        ] {
            let parsed: Mode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert!("armed".parse::<Mode>().is_err());
    }
}
