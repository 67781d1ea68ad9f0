//! Bounded step navigation for multi-step forms

/// Current position within a fixed number of steps.
///
/// Steps are 1-based. The total is fixed at construction and the current
/// step never leaves `1..=total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepNavigator {
    current: usize,
    total: usize,
}

impl StepNavigator {
    /// Start at step 1. A total of zero is treated as a single step.
    pub fn new(total: usize) -> Self {
        Self {
            current: 1,
            total: total.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_first_step(&self) -> bool {
        self.current == 1
    }

    pub fn is_last_step(&self) -> bool {
        self.current == self.total
    }

    /// Move forward one step; no-op on the last step
    pub fn next(&mut self) {
        if self.current < self.total {
            self.current += 1;
        }
    }

    /// Move back one step; no-op on the first step
    pub fn prev(&mut self) {
        if self.current > 1 {
            self.current -= 1;
        }
    }

    /// Jump to `step`. Out-of-range targets are ignored and return false.
    pub fn go_to(&mut self, step: usize) -> bool {
        if (1..=self.total).contains(&step) {
            self.current = step;
            true
        } else {
            false
        }
    }

    /// Share of steps reached, 0-100
    pub fn progress_percent(&self) -> u8 {
        ((self.current * 100) / self.total) as u8
    }

    /// Back to step 1
    pub fn reset(&mut self) {
        self.current = 1;
    }
}
