//! Pipeline lifecycle state machine.
//!
//! A single owned [`PipelineState`] value behind a mutex replaces per-worker
//! boolean flags. The controller performs validated transitions; workers only
//! read the state to decide whether to keep looping.

use crate::error::{Result, TalkbackError};
use crate::events::{EventBus, PipelineEvent};
use serde::Serialize;
use std::sync::Mutex;

/// Lifecycle state of the streaming pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Running,
    Stopping,
    Stopped,
    Failed { reason: String },
}

impl PipelineState {
    fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Running => "Running",
            PipelineState::Stopping => "Stopping",
            PipelineState::Stopped => "Stopped",
            PipelineState::Failed { .. } => "Failed",
        }
    }
}

/// Shared, controller-owned state cell.
///
/// Valid transitions:
/// - `Idle | Stopped -> Running` (`begin_running`)
/// - `Running -> Stopping` (`begin_stopping`)
/// - `Stopping -> Stopped` (`finish_stopping`)
/// - `Running | Stopping -> Failed` (`fail`)
/// - `Failed -> Idle` (`reset`)
pub struct StateCell {
    inner: Mutex<PipelineState>,
    events: EventBus,
}

impl StateCell {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Mutex::new(PipelineState::Idle),
            events,
        }
    }

    /// Snapshot of the current state.
    pub fn get(&self) -> PipelineState {
        self.lock().clone()
    }

    /// True while workers should keep looping.
    pub fn is_running(&self) -> bool {
        matches!(*self.lock(), PipelineState::Running)
    }

    pub fn begin_running(&self) -> Result<()> {
        self.transition(
            |s| matches!(s, PipelineState::Idle | PipelineState::Stopped),
            PipelineState::Running,
        )
    }

    pub fn begin_stopping(&self) -> Result<()> {
        self.transition(
            |s| matches!(s, PipelineState::Running),
            PipelineState::Stopping,
        )
    }

    pub fn finish_stopping(&self) -> Result<()> {
        self.transition(
            |s| matches!(s, PipelineState::Stopping),
            PipelineState::Stopped,
        )
    }

    /// Record a fatal worker error. Valid from `Running` or `Stopping`;
    /// a second failure keeps the first reason.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut state = self.lock();
        if matches!(*state, PipelineState::Running | PipelineState::Stopping) {
            *state = PipelineState::Failed {
                reason: reason.into(),
            };
            let snapshot = state.clone();
            drop(state);
            self.events.emit(PipelineEvent::StateChanged { state: snapshot });
        }
    }

    /// Explicit recovery edge; no implicit auto-restart.
    pub fn reset(&self) -> Result<()> {
        self.transition(
            |s| matches!(s, PipelineState::Failed { .. }),
            PipelineState::Idle,
        )
    }

    fn transition(
        &self,
        valid_from: impl Fn(&PipelineState) -> bool,
        to: PipelineState,
    ) -> Result<()> {
        let mut state = self.lock();
        if !valid_from(&state) {
            return Err(TalkbackError::InvalidTransition {
                from: state.name().to_string(),
                to: to.name().to_string(),
            });
        }
        *state = to;
        let snapshot = state.clone();
        drop(state);
        self.events.emit(PipelineEvent::StateChanged { state: snapshot });
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PipelineState> {
        // A worker panicking while holding this lock is unrecoverable anyway.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> StateCell {
        StateCell::new(EventBus::new())
    }

    #[test]
    fn test_starts_idle() {
        assert_eq!(cell().get(), PipelineState::Idle);
    }

    #[test]
    fn test_full_lifecycle() {
        let state = cell();
        state.begin_running().unwrap();
        assert!(state.is_running());
        state.begin_stopping().unwrap();
        assert!(!state.is_running());
        state.finish_stopping().unwrap();
        assert_eq!(state.get(), PipelineState::Stopped);
        // Restart from Stopped is allowed
        state.begin_running().unwrap();
        assert!(state.is_running());
    }

    #[test]
    fn test_stop_from_idle_is_invalid() {
        let state = cell();
        let err = state.begin_stopping().unwrap_err();
        assert!(matches!(
            err,
            TalkbackError::InvalidTransition { ref from, ref to }
                if from == "Idle" && to == "Stopping"
        ));
    }

    #[test]
    fn test_start_while_running_is_invalid() {
        let state = cell();
        state.begin_running().unwrap();
        assert!(state.begin_running().is_err());
    }

    #[test]
    fn test_fail_from_running() {
        let state = cell();
        state.begin_running().unwrap();
        state.fail("device disappeared");
        assert_eq!(
            state.get(),
            PipelineState::Failed {
                reason: "device disappeared".to_string()
            }
        );
    }

    #[test]
    fn test_fail_from_stopping() {
        let state = cell();
        state.begin_running().unwrap();
        state.begin_stopping().unwrap();
        state.fail("teardown error");
        assert!(matches!(state.get(), PipelineState::Failed { .. }));
    }

    #[test]
    fn test_first_failure_reason_wins() {
        let state = cell();
        state.begin_running().unwrap();
        state.fail("first");
        state.fail("second");
        assert_eq!(
            state.get(),
            PipelineState::Failed {
                reason: "first".to_string()
            }
        );
    }

    #[test]
    fn test_fail_from_idle_is_ignored() {
        let state = cell();
        state.fail("should not stick");
        assert_eq!(state.get(), PipelineState::Idle);
    }

    #[test]
    fn test_reset_requires_failed() {
        let state = cell();
        assert!(state.reset().is_err());

        state.begin_running().unwrap();
        state.fail("boom");
        state.reset().unwrap();
        assert_eq!(state.get(), PipelineState::Idle);
        // Explicit restart after reset works
        state.begin_running().unwrap();
    }

    #[test]
    fn test_transitions_emit_state_changed_events() {
        let events = EventBus::new();
        let rx = events.subscribe();
        let state = StateCell::new(events);

        state.begin_running().unwrap();
        state.begin_stopping().unwrap();
        state.finish_stopping().unwrap();

        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                PipelineEvent::StateChanged {
                    state: PipelineState::Running
                },
                PipelineEvent::StateChanged {
                    state: PipelineState::Stopping
                },
                PipelineEvent::StateChanged {
                    state: PipelineState::Stopped
                },
            ]
        );
    }

    #[test]
    fn test_invalid_transition_emits_nothing() {
        let events = EventBus::new();
        let rx = events.subscribe();
        let state = StateCell::new(events);

        let _ = state.begin_stopping();
        assert!(rx.try_recv().is_err());
    }
}
