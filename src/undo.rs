//! Time-bounded undo for shift reopening.
//!
//! Reopening discards closed history; the operator gets one short-lived
//! chance to take it back. The slot is a single-use compensating token:
//! ownership makes it consumable exactly once, the deadline makes it
//! expire. There is no multi-level undo stack.

use chrono::{DateTime, Duration, Utc};

use crate::error::{LedgerError, Result};
use crate::models::{DailyExpense, Shift};

/// How long a reopen can be taken back, in seconds.
pub const REOPEN_UNDO_WINDOW_SECS: i64 = 10;

/// Everything a reopen removed, held so the undo can restore it verbatim.
#[derive(Debug, Clone)]
pub struct ReopenSnapshot {
    /// The removed shifts, in ended-at order.
    pub shifts: Vec<Shift>,
    /// Synthetic deficit expenses deleted alongside the shifts.
    pub deficit_expenses: Vec<DailyExpense>,
    /// The watermark as it stood before the reopen.
    pub prior_cutoff: Option<DateTime<Utc>>,
}

/// Single-slot undo token armed by `reopen_shift`.
#[derive(Debug)]
pub struct UndoSlot {
    snapshot: ReopenSnapshot,
    expires_at: DateTime<Utc>,
}

impl UndoSlot {
    pub(crate) fn arm(snapshot: ReopenSnapshot, ttl: Duration) -> Self {
        UndoSlot {
            snapshot,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Consume the slot. Fails once the window has elapsed; consuming moves
    /// the token, so a second attempt cannot compile, let alone run.
    pub(crate) fn take(self) -> Result<ReopenSnapshot> {
        if Utc::now() > self.expires_at {
            return Err(LedgerError::Validation(
                "Undo window has expired".to_string(),
            ));
        }
        Ok(self.snapshot)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
