//! Bounded viewport fill.
//!
//! Once armed, each scheduled check may request one page while the list
//! leaves empty space below the viewport. The loop disarms when the budget is
//! spent, the viewport is filled or the source is exhausted, and stays
//! disarmed until something outside the loop arms it again.

use tracing::debug;

/// Inputs for one fill check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutofillGate {
    pub render_enabled: bool,
    pub visible: bool,
    pub fetch_in_flight: bool,
    pub has_more: bool,
    /// Remaining scroll extent below the viewport is within the safety margin
    pub under_filled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutofillDecision {
    /// Nothing to do right now, stay armed
    Idle,
    /// Request one more page
    Fetch,
    /// The loop finished and is now disarmed
    Disarmed,
}

#[derive(Debug, Clone)]
pub struct Autofill {
    budget: u32,
    remaining: u32,
    armed: bool,
    scheduled: bool,
}

impl Autofill {
    pub fn new(budget: u32) -> Self {
        Self { budget, remaining: budget, armed: false, scheduled: false }
    }

    /// Arm with a fresh budget
    pub fn arm(&mut self) {
        self.armed = true;
        self.remaining = self.budget;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.scheduled = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Ask for a check on the next frame
    pub fn schedule(&mut self) {
        if self.armed {
            self.scheduled = true;
        }
    }

    /// Consume a pending check request
    pub fn take_scheduled(&mut self) -> bool {
        std::mem::take(&mut self.scheduled)
    }

    pub fn decide(&mut self, gate: AutofillGate) -> AutofillDecision {
        if !self.armed || !gate.render_enabled || !gate.visible || gate.fetch_in_flight {
            return AutofillDecision::Idle;
        }

        if gate.has_more && gate.under_filled && self.remaining > 0 {
            self.remaining -= 1;
            return AutofillDecision::Fetch;
        }

        debug!(
            has_more = gate.has_more,
            under_filled = gate.under_filled,
            remaining = self.remaining,
            "autofill disarmed"
        );
        self.disarm();
        AutofillDecision::Disarmed
    }
}
