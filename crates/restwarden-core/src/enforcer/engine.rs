//! Enforcement state machine.
//!
//! Wall-clock-based and caller-driven -- no internal threads. The service
//! layer calls `evaluate()` on a fixed interval and carries out the
//! returned [`Action`]s; presenter outcomes re-enter through the `on_*`
//! callbacks under the same lock that serializes evaluation.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> (GeneralReminderActive | PlannedShutdownWarning | ForcedRest) -> Idle
//! ```
//!
//! At most one blocking state exists at a time. Conditions are checked in
//! strict priority order and the first true condition wins the tick; a
//! tick that finds a blocking state already active performs only the
//! forced-shutdown check, because the active screen is resolved by its
//! completion callback, not by further ticks.

use chrono::{DateTime, Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::Config;

/// The single blocking-state value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EnforcementState {
    Idle,
    GeneralReminderActive,
    PlannedShutdownWarning {
        remaining_secs: u64,
        os_shutdown_issued: bool,
    },
    ForcedRest {
        remaining_secs: u64,
    },
}

/// Side effects for the service layer to carry out, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Zero the continuous-usage counter (forced-rest entry).
    ResetContinuousUsage,
    /// Ask the presenter for a dismissible reminder.
    ShowGeneralReminder,
    /// Ask the presenter for a cancelable shutdown countdown.
    ShowShutdownCountdown { initial_secs: u64 },
    /// Ask the presenter for the non-cancelable forced-rest screen.
    ShowForcedRest { duration_secs: u64 },
    /// Schedule a delayed OS shutdown.
    IssueShutdown { delay_secs: u64, force: bool },
    /// Abort the previously issued OS shutdown.
    AbortShutdown,
    /// Flush persistence, issue an immediate unconditional shutdown and
    /// stop the scheduler.
    ForcedShutdown,
}

/// Calendar minute, used to fire once per triggering minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MinuteStamp {
    date: NaiveDate,
    hour: u32,
    minute: u32,
}

impl MinuteStamp {
    fn of(t: DateTime<Local>) -> Self {
        Self {
            date: t.date_naive(),
            hour: t.hour(),
            minute: t.minute(),
        }
    }
}

/// Priority-ordered condition evaluator and blocking-state owner.
pub struct EnforcementEngine {
    config: Config,
    state: EnforcementState,
    /// An OS shutdown has been issued and not yet aborted.
    shutdown_ticket: bool,
    /// `None` until the first general reminder is dismissed.
    last_reminder_shown: Option<DateTime<Local>>,
    last_planned_fire: Option<MinuteStamp>,
    last_forced_fire: Option<MinuteStamp>,
}

impl EnforcementEngine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: EnforcementState::Idle,
            shutdown_ticket: false,
            last_reminder_shown: None,
            last_planned_fire: None,
            last_forced_fire: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &EnforcementState {
        &self.state
    }

    pub fn shutdown_ticket(&self) -> bool {
        self.shutdown_ticket
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Evaluation ───────────────────────────────────────────────────

    /// Run one evaluation tick. The first true condition wins; everything
    /// below it is skipped until the next tick.
    pub fn evaluate(&mut self, now: DateTime<Local>, continuous_secs: u64) -> Vec<Action> {
        // 1. Forced shutdown preempts every state, once per triggering minute.
        if self.forced_shutdown_due(now) {
            self.last_forced_fire = Some(MinuteStamp::of(now));
            info!(
                hour = self.config.forced_shutdown_hour,
                "forced shutdown time reached"
            );
            return vec![Action::ForcedShutdown];
        }

        // Blocking states resolve via their completion callbacks.
        if self.state != EnforcementState::Idle {
            debug!(state = ?self.state, "blocking state active, tick is a no-op");
            return Vec::new();
        }

        // 2. Forced rest.
        if continuous_secs > self.config.continuous_usage_threshold_secs() {
            let duration_secs = self.config.forced_rest_duration_secs();
            info!(
                continuous_secs,
                threshold_secs = self.config.continuous_usage_threshold_secs(),
                "continuous usage over threshold, forcing rest"
            );
            self.state = EnforcementState::ForcedRest {
                remaining_secs: duration_secs,
            };
            // Reset first so the threshold cannot re-fire during the rest.
            return vec![
                Action::ResetContinuousUsage,
                Action::ShowForcedRest { duration_secs },
            ];
        }

        // 3. Planned shutdown warning.
        if self.planned_shutdown_due(now) {
            let delay_secs = self.config.shutdown_delay_secs();
            self.last_planned_fire = Some(MinuteStamp::of(now));
            self.shutdown_ticket = true;
            self.state = EnforcementState::PlannedShutdownWarning {
                remaining_secs: delay_secs,
                os_shutdown_issued: true,
            };
            info!(delay_secs, "planned shutdown time reached, scheduling shutdown");
            return vec![
                Action::IssueShutdown {
                    delay_secs,
                    force: false,
                },
                Action::ShowShutdownCountdown {
                    initial_secs: delay_secs,
                },
            ];
        }

        // 4. General reminder, lowest priority.
        if self.general_reminder_due(now) {
            self.state = EnforcementState::GeneralReminderActive;
            info!("showing rest reminder");
            return vec![Action::ShowGeneralReminder];
        }

        Vec::new()
    }

    fn forced_shutdown_due(&self, now: DateTime<Local>) -> bool {
        now.hour() == self.config.forced_shutdown_hour
            && now.minute() == 0
            && self.last_forced_fire != Some(MinuteStamp::of(now))
    }

    fn planned_shutdown_due(&self, now: DateTime<Local>) -> bool {
        now.hour() == self.config.shutdown_plan_hour
            && now.minute() == self.config.shutdown_plan_minute
            && !self.shutdown_ticket
            && self.last_planned_fire != Some(MinuteStamp::of(now))
    }

    fn general_reminder_due(&self, now: DateTime<Local>) -> bool {
        if now.hour() < self.config.first_reminder_hour {
            return false;
        }
        match self.last_reminder_shown {
            None => true,
            Some(last) => {
                (now - last).num_seconds() >= self.config.reminder_interval_seconds as i64
            }
        }
    }

    // ── Presenter callbacks ──────────────────────────────────────────

    /// The user dismissed the general reminder.
    pub fn on_reminder_dismissed(&mut self, now: DateTime<Local>) {
        if self.state == EnforcementState::GeneralReminderActive {
            self.last_reminder_shown = Some(now);
            self.state = EnforcementState::Idle;
            debug!("reminder dismissed");
        }
    }

    /// The forced-rest duration elapsed.
    pub fn on_forced_rest_finished(&mut self) {
        if matches!(self.state, EnforcementState::ForcedRest { .. }) {
            info!("forced rest finished");
            self.state = EnforcementState::Idle;
        }
    }

    /// The countdown reached zero; the OS shutdown proceeds on its own and
    /// the ticket stays issued.
    pub fn on_countdown_completed(&mut self) {
        if matches!(self.state, EnforcementState::PlannedShutdownWarning { .. }) {
            info!("shutdown countdown completed, machine will power off");
            self.state = EnforcementState::Idle;
        }
    }

    /// The user cancelled the countdown. Returns the follow-up actions;
    /// a cancel arriving after the warning already resolved is a no-op.
    pub fn on_countdown_cancelled(&mut self) -> Vec<Action> {
        match self.state {
            EnforcementState::PlannedShutdownWarning {
                os_shutdown_issued, ..
            } => {
                self.state = EnforcementState::Idle;
                if os_shutdown_issued && self.shutdown_ticket {
                    self.shutdown_ticket = false;
                    info!("shutdown cancelled by user");
                    vec![Action::AbortShutdown]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    /// The OS refused the delayed shutdown. The countdown may still be on
    /// screen; the divergence is the caller's to log.
    pub fn on_shutdown_issue_failed(&mut self) {
        self.shutdown_ticket = false;
        if let EnforcementState::PlannedShutdownWarning {
            ref mut os_shutdown_issued,
            ..
        } = self.state
        {
            *os_shutdown_issued = false;
        }
    }

    /// Clear and report an outstanding abortable ticket (process-shutdown
    /// and forced-shutdown paths).
    pub fn take_outstanding_ticket(&mut self) -> bool {
        std::mem::take(&mut self.shutdown_ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn local(h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, h, mi, s).unwrap()
    }

    /// Config with every time trigger pushed out of the way.
    fn quiet_config() -> Config {
        Config {
            first_reminder_hour: 23,
            shutdown_plan_hour: 23,
            shutdown_plan_minute: 59,
            forced_shutdown_hour: 3,
            ..Config::default()
        }
    }

    #[test]
    fn idle_tick_below_every_threshold_does_nothing() {
        let mut engine = EnforcementEngine::new(quiet_config());
        assert!(engine.evaluate(local(10, 0, 0), 0).is_empty());
        assert_eq!(*engine.state(), EnforcementState::Idle);
    }

    #[test]
    fn forced_rest_fires_strictly_above_threshold() {
        let mut engine = EnforcementEngine::new(quiet_config());
        // Exactly at the threshold: not yet.
        assert!(engine.evaluate(local(10, 0, 0), 600).is_empty());

        let actions = engine.evaluate(local(10, 0, 5), 601);
        assert_eq!(
            actions,
            vec![
                Action::ResetContinuousUsage,
                Action::ShowForcedRest { duration_secs: 60 },
            ]
        );
        assert_eq!(
            *engine.state(),
            EnforcementState::ForcedRest { remaining_secs: 60 }
        );
    }

    #[test]
    fn forced_rest_completion_returns_to_idle() {
        let mut engine = EnforcementEngine::new(quiet_config());
        engine.evaluate(local(10, 0, 0), 601);
        // While resting, further ticks are no-ops even over threshold.
        assert!(engine.evaluate(local(10, 0, 5), 9999).is_empty());
        engine.on_forced_rest_finished();
        assert_eq!(*engine.state(), EnforcementState::Idle);
    }

    #[test]
    fn forced_rest_outranks_planned_shutdown() {
        let mut engine = EnforcementEngine::new(Config {
            shutdown_plan_hour: 21,
            shutdown_plan_minute: 30,
            first_reminder_hour: 23,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        // Both conditions true on the same tick.
        let actions = engine.evaluate(local(21, 30, 0), 601);
        assert!(actions.contains(&Action::ShowForcedRest { duration_secs: 60 }));
        assert!(matches!(
            engine.state(),
            EnforcementState::ForcedRest { .. }
        ));
        assert!(!engine.shutdown_ticket());
    }

    #[test]
    fn planned_shutdown_issues_ticket_and_countdown() {
        let mut engine = EnforcementEngine::new(Config {
            first_reminder_hour: 23,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        let actions = engine.evaluate(local(21, 30, 2), 0);
        assert_eq!(
            actions,
            vec![
                Action::IssueShutdown {
                    delay_secs: 300,
                    force: false,
                },
                Action::ShowShutdownCountdown { initial_secs: 300 },
            ]
        );
        assert!(engine.shutdown_ticket());
        assert_eq!(
            *engine.state(),
            EnforcementState::PlannedShutdownWarning {
                remaining_secs: 300,
                os_shutdown_issued: true,
            }
        );
    }

    #[test]
    fn cancel_aborts_exactly_once_and_second_cancel_is_noop() {
        let mut engine = EnforcementEngine::new(Config {
            first_reminder_hour: 23,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        engine.evaluate(local(21, 30, 2), 0);

        assert_eq!(engine.on_countdown_cancelled(), vec![Action::AbortShutdown]);
        assert_eq!(*engine.state(), EnforcementState::Idle);
        assert!(!engine.shutdown_ticket());

        assert!(engine.on_countdown_cancelled().is_empty());
        assert_eq!(*engine.state(), EnforcementState::Idle);
    }

    #[test]
    fn cancelled_warning_does_not_refire_within_the_minute() {
        let mut engine = EnforcementEngine::new(Config {
            first_reminder_hour: 23,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        engine.evaluate(local(21, 30, 2), 0);
        engine.on_countdown_cancelled();
        assert!(engine.evaluate(local(21, 30, 7), 0).is_empty());
    }

    #[test]
    fn completed_countdown_keeps_ticket_and_blocks_refire() {
        let mut engine = EnforcementEngine::new(Config {
            first_reminder_hour: 23,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        engine.evaluate(local(21, 30, 2), 0);
        engine.on_countdown_completed();
        assert_eq!(*engine.state(), EnforcementState::Idle);
        assert!(engine.shutdown_ticket());
        // Ticket outstanding: no new warning, today or at the next occurrence.
        assert!(engine.evaluate(local(21, 31, 0), 0).is_empty());
    }

    #[test]
    fn issue_failure_clears_ticket_and_cancel_skips_abort() {
        let mut engine = EnforcementEngine::new(Config {
            first_reminder_hour: 23,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        engine.evaluate(local(21, 30, 2), 0);
        engine.on_shutdown_issue_failed();
        assert!(!engine.shutdown_ticket());
        // The countdown is still visible; cancelling must not call abort.
        assert!(engine.on_countdown_cancelled().is_empty());
        assert_eq!(*engine.state(), EnforcementState::Idle);
    }

    #[test]
    fn forced_shutdown_fires_once_per_minute() {
        let mut engine = EnforcementEngine::new(Config {
            forced_shutdown_hour: 22,
            first_reminder_hour: 23,
            shutdown_plan_hour: 23,
            shutdown_plan_minute: 59,
            ..Config::default()
        });
        assert_eq!(
            engine.evaluate(local(22, 0, 0), 0),
            vec![Action::ForcedShutdown]
        );
        // Same minute, later ticks: nothing.
        assert!(engine.evaluate(local(22, 0, 5), 0).is_empty());
        assert!(engine.evaluate(local(22, 0, 55), 0).is_empty());
    }

    #[test]
    fn forced_shutdown_preempts_an_active_blocking_state() {
        let mut engine = EnforcementEngine::new(Config {
            forced_shutdown_hour: 22,
            first_reminder_hour: 23,
            shutdown_plan_hour: 23,
            shutdown_plan_minute: 59,
            ..Config::default()
        });
        engine.evaluate(local(21, 0, 0), 601);
        assert!(matches!(
            engine.state(),
            EnforcementState::ForcedRest { .. }
        ));
        assert_eq!(
            engine.evaluate(local(22, 0, 3), 0),
            vec![Action::ForcedShutdown]
        );
    }

    #[test]
    fn general_reminder_waits_for_hour_and_interval() {
        let mut engine = EnforcementEngine::new(Config {
            first_reminder_hour: 21,
            shutdown_plan_hour: 23,
            shutdown_plan_minute: 59,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        // Before the hour: nothing.
        assert!(engine.evaluate(local(20, 59, 55), 0).is_empty());

        // First reminder fires as soon as the hour is reached.
        assert_eq!(
            engine.evaluate(local(21, 0, 0), 0),
            vec![Action::ShowGeneralReminder]
        );
        engine.on_reminder_dismissed(local(21, 0, 30));

        // Within the interval: nothing.
        assert!(engine.evaluate(local(21, 2, 0), 0).is_empty());

        // Interval elapsed: fires again.
        assert_eq!(
            engine.evaluate(local(21, 5, 30), 0),
            vec![Action::ShowGeneralReminder]
        );
    }

    #[test]
    fn reminder_does_not_refire_while_visible() {
        let mut engine = EnforcementEngine::new(Config {
            first_reminder_hour: 21,
            shutdown_plan_hour: 23,
            shutdown_plan_minute: 59,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        engine.evaluate(local(21, 0, 0), 0);
        assert_eq!(*engine.state(), EnforcementState::GeneralReminderActive);
        // Never dismissed: later ticks stay quiet no matter how long.
        assert!(engine.evaluate(local(21, 30, 0) + Duration::hours(1), 0).is_empty());
    }

    #[test]
    fn planned_shutdown_outranks_general_reminder() {
        let mut engine = EnforcementEngine::new(Config {
            first_reminder_hour: 21,
            shutdown_plan_hour: 21,
            shutdown_plan_minute: 30,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        let actions = engine.evaluate(local(21, 30, 0), 0);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::ShowShutdownCountdown { .. })));
        assert!(!actions.contains(&Action::ShowGeneralReminder));
    }

    #[test]
    fn take_outstanding_ticket_clears_it() {
        let mut engine = EnforcementEngine::new(Config {
            first_reminder_hour: 23,
            forced_shutdown_hour: 3,
            ..Config::default()
        });
        engine.evaluate(local(21, 30, 2), 0);
        assert!(engine.take_outstanding_ticket());
        assert!(!engine.take_outstanding_ticket());
    }
}
