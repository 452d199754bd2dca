//! The system tick counter.

/// A monotonic tick counter.
///
/// A debugging session advances it once for every step it executes.
/// It does not raise interrupts.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct TickCounter {
    ticks: u64
}
impl TickCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances by one tick.
    pub fn tick(&mut self) {
        self.advance(1);
    }

    /// Advances by `n` ticks.
    pub fn advance(&mut self, n: u64) {
        self.ticks = self.ticks.wrapping_add(n);
    }

    /// The number of ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
