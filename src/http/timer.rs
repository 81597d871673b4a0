use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    /// Never started; closing needs no callback.
    Unallocated,
    Idle,
    Armed(Instant),
    /// Close requested, waiting to be reaped by the driver.
    Closing,
    Closed,
}

/// One-shot connection timer.
///
/// The connection asks for transitions; the driver polls deadlines and
/// reaps closing timers. A timer with a zero timeout never arms.
#[derive(Debug)]
pub struct Timer {
    timeout: Duration,
    state: TimerState,
}

impl Timer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: TimerState::Unallocated,
        }
    }

    pub fn start(&mut self, now: Instant) {
        if self.timeout.is_zero() {
            return;
        }
        match self.state {
            TimerState::Closing | TimerState::Closed => {}
            _ => self.state = TimerState::Armed(now + self.timeout),
        }
    }

    pub fn stop(&mut self) {
        if let TimerState::Armed(_) = self.state {
            self.state = TimerState::Idle;
        }
    }

    pub fn close(&mut self) {
        self.state = match self.state {
            TimerState::Unallocated => TimerState::Closed,
            TimerState::Idle | TimerState::Armed(_) => TimerState::Closing,
            other => other,
        };
    }

    /// Finishes a pending close. Returns whether the timer is closed.
    pub fn reap(&mut self) -> bool {
        if self.state == TimerState::Closing {
            self.state = TimerState::Closed;
        }
        self.state == TimerState::Closed
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            TimerState::Armed(at) => Some(at),
            _ => None,
        }
    }

    /// Disarms and returns `true` if the deadline has passed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.state {
            TimerState::Armed(at) if at <= now => {
                self.state = TimerState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == TimerState::Closed
    }
}
