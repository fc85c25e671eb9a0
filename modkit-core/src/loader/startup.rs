//! Startup State Machine
//!
//! The loader moves through a fixed sequence of phases:
//!
//! ```text
//! PREPARE -> PREINIT -> BEGINGAME -> INIT -> POSTINIT -> DONE
//! ```
//!
//! A phase may only hand off to its immediate successor, and only after it has
//! been marked completed. Hooks must be registered before the classes they patch
//! are loaded: hook providers reach the parent class loader only while PREINIT
//! is active, and mod packages are added to the class path during INIT. Any
//! out-of-order call is reported as a [`StartupError`].

use std::fmt;

use super::error::StartupError;

/// A startup phase, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StartupState {
    Prepare,
    PreInit,
    BeginGame,
    Init,
    PostInit,
    Done,
}

impl StartupState {
    pub const ALL: [StartupState; 6] = [
        StartupState::Prepare,
        StartupState::PreInit,
        StartupState::BeginGame,
        StartupState::Init,
        StartupState::PostInit,
        StartupState::Done,
    ];

    /// Immediate successor. `Done` is its own successor.
    pub fn next(self) -> StartupState {
        match self {
            StartupState::Prepare => StartupState::PreInit,
            StartupState::PreInit => StartupState::BeginGame,
            StartupState::BeginGame => StartupState::Init,
            StartupState::Init => StartupState::PostInit,
            StartupState::PostInit => StartupState::Done,
            StartupState::Done => StartupState::Done,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            StartupState::Prepare => "PREPARE",
            StartupState::PreInit => "PREINIT",
            StartupState::BeginGame => "BEGINGAME",
            StartupState::Init => "INIT",
            StartupState::PostInit => "POSTINIT",
            StartupState::Done => "DONE",
        }
    }
}

impl fmt::Display for StartupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decide whether `requested` may become the active state.
///
/// Re-entering the active state is permitted and restarts it. Any other request
/// must be the active state's successor, and the active state must be completed.
pub fn check_transition(
    current: StartupState,
    current_completed: bool,
    requested: StartupState,
) -> Result<(), StartupError> {
    if requested == current {
        return Ok(());
    }

    if requested == current.next() && current_completed {
        return Ok(());
    }

    let detail = if requested != current.next() {
        format!("and expects <{}> instead", current.next())
    } else {
        "but is not completed".to_string()
    };

    Err(StartupError::IllegalTransition {
        current,
        requested,
        detail,
    })
}

/// Current phase plus a completed flag per phase.
#[derive(Debug, Clone)]
pub struct StartupStates {
    current: StartupState,
    completed: [bool; 6],
}

impl StartupStates {
    /// Start in PREPARE, active and not completed.
    pub fn new() -> Self {
        Self {
            current: StartupState::Prepare,
            completed: [false; 6],
        }
    }

    /// The active phase.
    pub fn current(&self) -> StartupState {
        self.current
    }

    pub fn is_active(&self, state: StartupState) -> bool {
        self.current == state
    }

    pub fn is_completed(&self, state: StartupState) -> bool {
        self.completed[state.index()]
    }

    /// Make `state` the active phase.
    ///
    /// Fails if the active phase may not yield to `state`. On success the
    /// previous phase is left, and `state` starts out not completed.
    pub fn enter(&mut self, state: StartupState) -> Result<(), StartupError> {
        check_transition(self.current, self.is_completed(self.current), state)?;

        if self.current != state {
            log::debug!("Leaving startup state <{}>", self.current);
        }
        self.current = state;
        self.completed[state.index()] = false;
        log::debug!("Entered startup state <{}>", state);
        Ok(())
    }

    /// Mark the work of `state` as finished so the next phase may start.
    pub fn mark_completed(&mut self, state: StartupState) -> Result<(), StartupError> {
        if self.current != state {
            return Err(StartupError::NotActive(state));
        }
        if self.completed[state.index()] {
            return Err(StartupError::AlreadyCompleted(state));
        }

        self.completed[state.index()] = true;
        Ok(())
    }

    /// Human-readable summary of `state`, for diagnostics.
    pub fn describe(&self, state: StartupState) -> String {
        format!(
            "<{}> is {} {}",
            state,
            if self.is_active(state) { "[ACTIVE]" } else { "[INACTIVE]" },
            if self.is_completed(state) {
                "and [COMPLETED]"
            } else {
                "but [INCOMPLETE]"
            }
        )
    }
}

impl Default for StartupStates {
    fn default() -> Self {
        Self::new()
    }
}
