//! Highlight cursor over the record window.
//!
//! Exhaustion rule: on a window of length `L >= 2`, advancing from
//! `L - 2` lands on the last row and reports exhaustion in the same
//! step, so the last row is shown once while the refetch is in flight.
//! Windows with fewer than two rows never exhaust.

use crate::window::RecordWindow;

/// Result of one cursor step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub position: usize,
    pub exhausted: bool,
}

/// Index of the emphasized record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightCursor {
    position: usize,
}

impl HighlightCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self { position: 0 }
    }

    #[must_use]
    pub const fn position(self) -> usize {
        self.position
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Step forward by one over `window`.
    ///
    /// Empty windows are a no-op. A single-row window keeps the cursor
    /// on its only row.
    pub fn advance(&mut self, window: &RecordWindow) -> Advance {
        let len = window.len();

        if len <= 1 {
            self.position = 0;
            return Advance {
                position: 0,
                exhausted: false,
            };
        }

        let next = self.position.saturating_add(1);
        self.position = next.min(len - 1);

        Advance {
            position: self.position,
            exhausted: next >= len - 1,
        }
    }
}
