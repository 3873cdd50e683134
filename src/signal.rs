use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalState {
    Idle,
    /// One pending wakeup; consumed by the next `wait`
    Set,
    /// Permanently set; `wait` never blocks again
    Latched,
}

/// Sticky, single-slot wakeup primitive
///
/// A `raise` is remembered until exactly one `wait` consumes it. Raising an already set
/// signal is a no-op: pending wakeups are not counted. Each raise wakes at most one
/// blocked waiter, so a signal assumes a single logical waiter role (one consumer, or one
/// producer) at a time.
///
/// [`Signal::latch`] is the broadcast escape hatch used when a queue finishes: it moves
/// the signal into a terminal set state and wakes every waiter.
#[derive(Debug)]
pub struct Signal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl Signal {
    /// Create a new signal in the idle state
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SignalState::Idle),
            cond: Condvar::new(),
        }
    }

    /// Set the signal and wake at most one blocked waiter
    pub fn raise(&self) {
        let mut state = self.state.lock();
        if *state == SignalState::Idle {
            *state = SignalState::Set;
        }
        self.cond.notify_one();
    }

    /// Block until the signal is set, then clear it back to idle
    ///
    /// Returns immediately without clearing anything if the signal has been latched.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        loop {
            let current = *state;
            match current {
                SignalState::Idle => self.cond.wait(&mut state),
                SignalState::Set => {
                    *state = SignalState::Idle;
                    return;
                }
                SignalState::Latched => return,
            }
        }
    }

    /// Force the signal back to idle without waiting. Has no effect on a latched signal.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if *state == SignalState::Set {
            *state = SignalState::Idle;
        }
    }

    /// Set the signal permanently and wake every waiter
    pub fn latch(&self) {
        let mut state = self.state.lock();
        *state = SignalState::Latched;
        self.cond.notify_all();
    }

    /// Whether a wakeup is pending (or the signal is latched)
    pub fn is_set(&self) -> bool {
        *self.state.lock() != SignalState::Idle
    }

    /// Whether the signal has been latched
    pub fn is_latched(&self) -> bool {
        *self.state.lock() == SignalState::Latched
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
