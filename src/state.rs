//! thread-state machine gating the conversion worker across interruptions
//!
//! The conversion runs on a dedicated worker thread. Interruption
//! begin/ended events arrive on a separate notification context and must
//! pause the worker between pipeline iterations, because a fill call against
//! an interrupted hardware codec would fail. One mutex-protected state
//! variable plus a condvar covers both contexts: the worker blocks in
//! [`ThreadState::paused_check`] for the whole paused interval, and the
//! notification side flips the state and signals the `Paused → Running`
//! edge. Transitions outside the job window are absorbed as no-ops.

use std::sync::{Arc, Condvar, Mutex};

/// lifecycle of one conversion job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Initial,
    Running,
    Paused,
    Done,
}

/// monitor owning the shared state variable
///
/// One live job per instance; `Done` is terminal for a job but
/// [`set_running`](ThreadState::set_running) re-arms the same machine for
/// the next one.
pub struct ThreadState {
    state: Mutex<ConversionState>,
    changed: Condvar,
}

/// handle shared between the worker and the notification context
pub type SharedThreadState = Arc<ThreadState>;

impl ThreadState {
    pub fn new() -> SharedThreadState {
        Arc::new(ThreadState {
            state: Mutex::new(ConversionState::Initial),
            changed: Condvar::new(),
        })
    }

    /// current state; test/diagnostic use
    pub fn current(&self) -> ConversionState {
        *self.state.lock().unwrap()
    }

    /// transition to `Running` at job start
    ///
    /// # Panics
    /// Panics if a job is already in flight (`Running` or `Paused`).
    pub fn set_running(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(
            matches!(*state, ConversionState::Initial | ConversionState::Done),
            "set_running called while a job is in flight ({:?})",
            *state
        );
        *state = ConversionState::Running;
    }

    /// handle an interruption-began event: `Running → Paused`
    ///
    /// No-op in every other state, so a double begin or an interruption
    /// arriving outside the job window is safely absorbed.
    pub fn begin_interruption(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == ConversionState::Running {
            *state = ConversionState::Paused;
        }
    }

    /// handle an interruption-ended event: `Paused → Running`, waking the
    /// blocked worker; no-op otherwise
    pub fn end_interruption(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == ConversionState::Paused {
            *state = ConversionState::Running;
            self.changed.notify_one();
        }
    }

    /// block while paused; called by the worker before every iteration
    ///
    /// Returns whether an interruption was observed during this check. Note
    /// the worker need not observe `Paused` at all: if `end_interruption`
    /// completes before the next `paused_check`, the state is already
    /// `Running` again and this returns `false`. That race is fine — the
    /// edge check happens under the same monitor, so no wake-up is lost.
    ///
    /// # Panics
    /// Panics if the state is `Done` — calling this after the job finished
    /// is a caller bug, not a runtime fault.
    pub fn paused_check(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        assert!(
            *state != ConversionState::Done,
            "paused_check called after set_done"
        );

        let mut was_interrupted = false;
        while *state == ConversionState::Paused {
            state = self.changed.wait(state).unwrap();
            was_interrupted = true;
        }

        // we must be running or something bad has happened
        assert_eq!(*state, ConversionState::Running);

        was_interrupted
    }

    /// transition to `Done` at job end; wakes nothing (no one waits on Done)
    ///
    /// # Panics
    /// Panics if already `Done`.
    pub fn set_done(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(*state != ConversionState::Done, "set_done called twice");
        *state = ConversionState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_interruption_outside_job_is_noop() {
        let state = ThreadState::new();
        state.begin_interruption();
        assert_eq!(state.current(), ConversionState::Initial);

        state.set_running();
        state.set_done();
        state.begin_interruption();
        assert_eq!(state.current(), ConversionState::Done);
    }

    #[test]
    fn end_interruption_while_running_is_noop() {
        let state = ThreadState::new();
        state.set_running();
        state.end_interruption();
        assert_eq!(state.current(), ConversionState::Running);
    }

    #[test]
    fn machine_is_reusable_after_done() {
        let state = ThreadState::new();
        state.set_running();
        state.set_done();
        state.set_running();
        assert_eq!(state.current(), ConversionState::Running);
    }
}
