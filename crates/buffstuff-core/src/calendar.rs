//! Game calendar.
//!
//! The manager never reads wall-clock time. It asks a [`Calendar`] for the
//! current total of elapsed game days, which only ever moves forward.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Minutes in a game day.
const MINUTES_PER_DAY: f64 = 24.0 * 60.0;
/// Default real seconds per game minute.
const DEFAULT_REAL_SECONDS_PER_MINUTE: f32 = 1.0;

/// Source of calendar time.
pub trait Calendar: Send + Sync + fmt::Debug {
    /// Total elapsed game days. Monotonically non-decreasing.
    fn total_days(&self) -> f64;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CalendarState {
    total_game_minutes: f64,
    real_seconds_per_game_minute: f32,
}

/// Shared game calendar handle.
///
/// Cloning yields another handle to the same calendar, so the host can keep
/// advancing time while the manager holds a handle for reading it.
///
/// By default, 1 real second = 1 game minute (configurable).
#[derive(Debug, Clone)]
pub struct GameCalendar {
    state: Arc<RwLock<CalendarState>>,
}

impl Default for GameCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl GameCalendar {
    /// Creates a calendar at day 0.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at_days(0.0)
    }

    /// Creates a calendar at `days` elapsed.
    #[must_use]
    pub fn starting_at_days(days: f64) -> Self {
        Self {
            state: Arc::new(RwLock::new(CalendarState {
                total_game_minutes: days.max(0.0) * MINUTES_PER_DAY,
                real_seconds_per_game_minute: DEFAULT_REAL_SECONDS_PER_MINUTE,
            })),
        }
    }

    /// Set the time scale (real seconds per game minute).
    pub fn set_time_scale(&self, seconds_per_minute: f32) {
        self.state.write().real_seconds_per_game_minute = seconds_per_minute.max(0.01);
    }

    /// Get the time scale.
    #[must_use]
    pub fn time_scale(&self) -> f32 {
        self.state.read().real_seconds_per_game_minute
    }

    /// Advance by real elapsed seconds. Returns the new total days.
    pub fn advance(&self, dt_real_seconds: f32) -> f64 {
        let mut state = self.state.write();
        let game_minutes = f64::from(dt_real_seconds.max(0.0) / state.real_seconds_per_game_minute);
        state.total_game_minutes += game_minutes;
        state.total_game_minutes / MINUTES_PER_DAY
    }

    /// Advance by whole or fractional game days.
    pub fn advance_days(&self, days: f64) -> f64 {
        let mut state = self.state.write();
        state.total_game_minutes += days.max(0.0) * MINUTES_PER_DAY;
        state.total_game_minutes / MINUTES_PER_DAY
    }

    /// Jump to `days`. Moving backwards is ignored.
    pub fn set_total_days(&self, days: f64) {
        let mut state = self.state.write();
        let minutes = days * MINUTES_PER_DAY;
        if minutes < state.total_game_minutes {
            warn!(
                "Ignoring calendar rewind from {:.4} to {days:.4} days",
                state.total_game_minutes / MINUTES_PER_DAY
            );
            return;
        }
        state.total_game_minutes = minutes;
    }

    /// Get the total elapsed game minutes.
    #[must_use]
    pub fn total_game_minutes(&self) -> f64 {
        self.state.read().total_game_minutes
    }

    /// Get the total elapsed game hours.
    #[must_use]
    pub fn total_game_hours(&self) -> f64 {
        self.total_game_minutes() / 60.0
    }
}

impl Calendar for GameCalendar {
    fn total_days(&self) -> f64 {
        self.total_game_minutes() / MINUTES_PER_DAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_requested_day() {
        let calendar = GameCalendar::starting_at_days(10.0);
        assert!((calendar.total_days() - 10.0).abs() < 1e-9);
        assert!((calendar.total_game_hours() - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_advance_uses_time_scale() {
        let calendar = GameCalendar::new();
        // 1 real second = 1 game minute
        calendar.advance(MINUTES_PER_DAY as f32);
        assert!((calendar.total_days() - 1.0).abs() < 1e-6);

        calendar.set_time_scale(0.5);
        calendar.advance(360.0);
        assert!((calendar.total_days() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_clones_share_time() {
        let host = GameCalendar::new();
        let reader = host.clone();
        host.advance_days(2.5);
        assert!((reader.total_days() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_never_moves_backwards() {
        let calendar = GameCalendar::starting_at_days(5.0);
        calendar.set_total_days(3.0);
        assert!((calendar.total_days() - 5.0).abs() < 1e-9);
        calendar.advance(-10.0);
        calendar.advance_days(-1.0);
        assert!((calendar.total_days() - 5.0).abs() < 1e-9);
        calendar.set_total_days(6.0);
        assert!((calendar.total_days() - 6.0).abs() < 1e-9);
    }
}
