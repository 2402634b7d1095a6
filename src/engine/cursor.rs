use std::time::Duration;

/// Loop-local position within the repeating cycle.
///
/// `anchor` is the instant of step 0 of the current cycle. The read pointers
/// index the pattern and click lists and only ever move forward until the
/// anchor advances, which resets both.
///
/// Events of the following cycle that fall inside the lookahead before the
/// roll are tracked by a second pair of pointers. A roll of exactly one cycle
/// resumes from those; a longer jump discards them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingCursor {
    anchor: Duration,
    cycles: u64,
    pattern_next: usize,
    click_next: usize,
    carried_pattern: usize,
    carried_click: usize,
    resets: u64,
}

impl SchedulingCursor {
    pub fn new(anchor: Duration) -> Self {
        Self {
            anchor,
            cycles: 0,
            pattern_next: 0,
            click_next: 0,
            carried_pattern: 0,
            carried_click: 0,
            resets: 0,
        }
    }

    pub fn anchor(&self) -> Duration {
        self.anchor
    }

    /// Whole cycles the anchor has moved past since the loop started
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn pattern_next(&self) -> usize {
        self.pattern_next
    }

    pub fn click_next(&self) -> usize {
        self.click_next
    }

    /// Pointers into the next cycle's pattern and click lists
    pub fn carried(&self) -> (usize, usize) {
        (self.carried_pattern, self.carried_click)
    }

    /// How many times the pointers have been reset
    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub(crate) fn advance_pattern(&mut self) {
        self.pattern_next += 1;
    }

    pub(crate) fn advance_click(&mut self) {
        self.click_next += 1;
    }

    pub(crate) fn advance_carried_pattern(&mut self) {
        self.carried_pattern += 1;
    }

    pub(crate) fn advance_carried_click(&mut self) {
        self.carried_click += 1;
    }

    /// Move the anchor forward by the largest whole number of cycles that
    /// keeps it at or before `now`. Cycles in between are skipped, never
    /// replayed. Returns the number of cycles moved.
    ///
    /// After a single-cycle roll the pointers resume where the lookahead left
    /// them in the new cycle; otherwise they start from zero.
    pub fn catch_up(&mut self, now: Duration, cycle: Duration) -> u64 {
        if cycle.is_zero() || now < self.anchor + cycle {
            return 0;
        }

        let elapsed = (now - self.anchor).as_nanos();
        let whole = (elapsed / cycle.as_nanos()) as u64;
        let shift = cycle.as_nanos() * whole as u128;

        self.anchor += Duration::from_nanos(shift as u64);
        self.cycles += whole;
        if whole == 1 {
            self.pattern_next = self.carried_pattern;
            self.click_next = self.carried_click;
        } else {
            self.pattern_next = 0;
            self.click_next = 0;
        }
        self.carried_pattern = 0;
        self.carried_click = 0;
        self.resets += 1;

        whole
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYCLE: Duration = Duration::from_secs(4);

    #[test]
    fn test_no_move_within_cycle() {
        let mut cursor = SchedulingCursor::new(Duration::ZERO);
        cursor.advance_pattern();
        assert_eq!(cursor.catch_up(Duration::from_millis(3999), CYCLE), 0);
        assert_eq!(cursor.anchor(), Duration::ZERO);
        assert_eq!(cursor.pattern_next(), 1);
        assert_eq!(cursor.resets(), 0);
    }

    #[test]
    fn test_boundary_rolls_one_cycle() {
        let mut cursor = SchedulingCursor::new(Duration::ZERO);
        assert_eq!(cursor.catch_up(CYCLE, CYCLE), 1);
        assert_eq!(cursor.anchor(), CYCLE);
        assert_eq!(cursor.cycles(), 1);
    }

    #[test]
    fn test_single_roll_resumes_carried_pointers() {
        let mut cursor = SchedulingCursor::new(Duration::ZERO);
        cursor.advance_pattern();
        cursor.advance_carried_pattern();
        cursor.advance_carried_click();
        assert_eq!(cursor.carried(), (1, 1));

        assert_eq!(cursor.catch_up(CYCLE, CYCLE), 1);
        assert_eq!(cursor.pattern_next(), 1);
        assert_eq!(cursor.click_next(), 1);
        assert_eq!(cursor.carried(), (0, 0));
    }

    #[test]
    fn test_jump_of_three_and_a_half_cycles() {
        let start = Duration::from_millis(250);
        let mut cursor = SchedulingCursor::new(start);
        cursor.advance_pattern();
        cursor.advance_pattern();
        cursor.advance_click();
        cursor.advance_carried_pattern();

        let now = start + CYCLE * 3 + CYCLE / 2;
        assert_eq!(cursor.catch_up(now, CYCLE), 3);
        assert_eq!(cursor.anchor(), start + CYCLE * 3);
        assert_eq!(cursor.cycles(), 3);
        assert_eq!(cursor.pattern_next(), 0);
        assert_eq!(cursor.click_next(), 0);
        assert_eq!(cursor.carried(), (0, 0));
        assert_eq!(cursor.resets(), 1);

        // same instant again: nothing left to skip
        assert_eq!(cursor.catch_up(now, CYCLE), 0);
        assert_eq!(cursor.resets(), 1);
    }
}
