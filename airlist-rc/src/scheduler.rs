//! Cycle scheduler state machine
//!
//! Gates when the engine may tick, based on the configured active
//! time-of-day window, manual pause/resume commands, and upstream error
//! conditions. Every transition is recorded with a timestamp and reason
//! in a bounded history for observability.
//!
//! States: `Initializing → Playing ⇄ Paused` (manual),
//! `Playing ⇄ OutOfHours` (wall-clock window), any state `→ Error` on
//! unrecoverable upstream-auth failure (terminal until restart).

use crate::error::{Error, Result};
use airlist_common::events::ServiceState;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

const HISTORY_CAPACITY: usize = 64;

/// One recorded state transition
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub from: ServiceState,
    pub to: ServiceState,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// One-time side effects the engine must perform for a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerSignal {
    /// Wall clock crossed into the active window (once per entry)
    SessionStarted,
    /// Wall clock crossed out of the active window (once per exit)
    SessionEnded,
    /// Date changed; reset per-day counters and send the daily summary
    DailyRollover,
}

/// Outcome of the per-tick scheduler evaluation
#[derive(Debug, Clone, Default)]
pub struct TickDecision {
    /// Whether the engine may run this tick's work
    pub permitted: bool,
    pub signals: Vec<SchedulerSignal>,
    pub transitions: Vec<Transition>,
}

pub struct CycleScheduler {
    state: ServiceState,
    /// Active window as local times of day; `None` means always active.
    /// `start > end` is an overnight window spanning midnight.
    window: Option<(NaiveTime, NaiveTime)>,
    history: VecDeque<Transition>,
    last_date: NaiveDate,
}

impl CycleScheduler {
    pub fn new(window: Option<(NaiveTime, NaiveTime)>, now: DateTime<Utc>) -> Self {
        Self {
            state: ServiceState::Initializing,
            window,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            last_date: now.date_naive(),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Recorded transitions, oldest first
    pub fn history(&self) -> Vec<Transition> {
        self.history.iter().cloned().collect()
    }

    /// Whether the given time of day falls inside the active window
    fn in_window(&self, time: NaiveTime) -> bool {
        match self.window {
            None => true,
            Some((start, end)) if start <= end => time >= start && time < end,
            // Overnight window
            Some((start, end)) => time >= start || time < end,
        }
    }

    fn transition(&mut self, to: ServiceState, reason: &str, at: DateTime<Utc>) -> Transition {
        let record = Transition {
            from: self.state,
            to,
            at,
            reason: reason.to_string(),
        };
        tracing::info!(from = %record.from, to = %record.to, reason, "Scheduler transition");
        self.state = to;
        self.history.push_back(record.clone());
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
        record
    }

    /// Leave `Initializing` once upstream auth has been confirmed
    pub fn mark_ready(&mut self, now: DateTime<Utc>) -> TickDecision {
        let mut decision = TickDecision::default();
        if self.state != ServiceState::Initializing {
            return decision;
        }
        if self.in_window(now.time()) {
            decision
                .transitions
                .push(self.transition(ServiceState::Playing, "upstream ready inside active window", now));
            decision.signals.push(SchedulerSignal::SessionStarted);
            decision.permitted = true;
        } else {
            decision.transitions.push(self.transition(
                ServiceState::OutOfHours,
                "upstream ready outside active window",
                now,
            ));
        }
        decision
    }

    /// Restore persisted state on startup
    ///
    /// Only a manual pause survives a restart; a restart IS the external
    /// intervention that clears `Error`, and window states are recomputed
    /// from the clock.
    pub fn restore(&mut self, persisted: ServiceState, now: DateTime<Utc>) {
        if persisted == ServiceState::Paused && self.state != ServiceState::Paused {
            self.transition(ServiceState::Paused, "pause restored from snapshot", now);
        }
    }

    /// Evaluate window boundaries and daily rollover for one tick
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> TickDecision {
        let mut decision = TickDecision::default();

        // Daily rollover is independent of the current state
        let today = now.date_naive();
        if today > self.last_date {
            self.last_date = today;
            decision.signals.push(SchedulerSignal::DailyRollover);
        }

        match self.state {
            ServiceState::Initializing | ServiceState::Error | ServiceState::Paused => {}
            ServiceState::Playing => {
                if self.in_window(now.time()) {
                    decision.permitted = true;
                } else {
                    decision.transitions.push(self.transition(
                        ServiceState::OutOfHours,
                        "active window ended",
                        now,
                    ));
                    decision.signals.push(SchedulerSignal::SessionEnded);
                }
            }
            ServiceState::OutOfHours => {
                if self.in_window(now.time()) {
                    decision.transitions.push(self.transition(
                        ServiceState::Playing,
                        "active window started",
                        now,
                    ));
                    decision.signals.push(SchedulerSignal::SessionStarted);
                    decision.permitted = true;
                }
            }
        }

        decision
    }

    /// Manual pause; only valid while `Playing`
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<Transition> {
        if self.state != ServiceState::Playing {
            return Err(Error::InvalidState(format!(
                "cannot pause while {}",
                self.state
            )));
        }
        Ok(self.transition(ServiceState::Paused, "paused by operator", now))
    }

    /// Manual resume; re-evaluates the window to pick the target state
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<Transition> {
        if self.state != ServiceState::Paused {
            return Err(Error::InvalidState(format!(
                "cannot resume while {}",
                self.state
            )));
        }
        let record = if self.in_window(now.time()) {
            self.transition(ServiceState::Playing, "resumed by operator", now)
        } else {
            self.transition(
                ServiceState::OutOfHours,
                "resumed by operator outside active window",
                now,
            )
        };
        Ok(record)
    }

    /// Enter the terminal `Error` state on unrecoverable upstream failure
    pub fn mark_error(&mut self, reason: &str, now: DateTime<Utc>) -> Option<Transition> {
        if self.state == ServiceState::Error {
            return None;
        }
        Some(self.transition(ServiceState::Error, reason, now))
    }
}
