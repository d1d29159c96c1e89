//! Tokio runtime wiring for the enforcement scheduler.
//!
//! Three periodic tasks drive the system: a 1-second usage tick, a
//! 5-second evaluation tick, and a configurable persistence tick. None of
//! them blocks another. Presenter calls are fire-and-forget; each outcome
//! re-enters the engine through its completion channel, behind the same
//! mutex that serializes evaluation, so a cancel racing the next tick can
//! never produce two simultaneous blocking states.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::enforcer::engine::{Action, EnforcementEngine, EnforcementState};
use crate::ledger::{UsageLedger, UsageSnapshot};
use crate::power::PowerController;
use crate::presenter::{CountdownOutcome, Presenter};
use crate::storage::Config;

const USAGE_TICK: Duration = Duration::from_secs(1);
const EVALUATION_TICK: Duration = Duration::from_secs(5);

struct Shared {
    engine: Mutex<EnforcementEngine>,
    ledger: Mutex<UsageLedger>,
    clock: Arc<dyn Clock>,
    presenter: Arc<dyn Presenter>,
    power: Arc<dyn PowerController>,
    /// Gate for tick bodies; cleared first on any shutdown path.
    running: AtomicBool,
    terminated_tx: watch::Sender<bool>,
}

/// Owns the periodic tasks and the shared engine/ledger state.
///
/// Must be started from within a tokio runtime.
pub struct EnforcementService {
    shared: Arc<Shared>,
    tasks: Vec<JoinHandle<()>>,
    terminated_rx: watch::Receiver<bool>,
}

impl EnforcementService {
    /// Start the periodic ticks.
    ///
    /// Usage tracking and persistence always run; the evaluation tick is
    /// skipped entirely when the rest reminder is disabled by
    /// configuration.
    pub fn start(
        config: Config,
        ledger: UsageLedger,
        clock: Arc<dyn Clock>,
        presenter: Arc<dyn Presenter>,
        power: Arc<dyn PowerController>,
    ) -> Self {
        let (terminated_tx, terminated_rx) = watch::channel(false);
        let enabled = config.enable_rest_reminder;
        let persist_every = Duration::from_secs(config.save_stats_interval_seconds.max(1));

        let shared = Arc::new(Shared {
            engine: Mutex::new(EnforcementEngine::new(config)),
            ledger: Mutex::new(ledger),
            clock,
            presenter,
            power,
            running: AtomicBool::new(true),
            terminated_tx,
        });

        let mut tasks = vec![
            Self::spawn_usage_loop(Arc::clone(&shared)),
            Self::spawn_persist_loop(Arc::clone(&shared), persist_every),
        ];
        if enabled {
            tasks.push(Self::spawn_evaluation_loop(Arc::clone(&shared)));
            info!("enforcement scheduler started");
        } else {
            info!("rest reminder disabled by configuration, enforcement tick not started");
        }

        Self {
            shared,
            tasks,
            terminated_rx,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn usage_snapshot(&self) -> UsageSnapshot {
        self.shared.ledger.lock().snapshot()
    }

    pub fn enforcement_state(&self) -> EnforcementState {
        self.shared.engine.lock().state().clone()
    }

    /// Resolves once the scheduler has terminated, either through `stop()`
    /// or through a forced shutdown.
    pub fn terminated(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.terminated_rx.clone();
        async move {
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop the scheduler: no new tick bodies, timers cancelled, visible
    /// presentation dismissed, outstanding shutdown ticket aborted
    /// (best-effort), final persistence flushed.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        for task in self.tasks.drain(..) {
            task.abort();
        }

        self.shared.presenter.request_dismiss();

        if self.shared.engine.lock().take_outstanding_ticket() {
            if let Err(e) = self.shared.power.abort_shutdown() {
                error!(
                    error = %e,
                    "could not abort the scheduled shutdown on exit, the machine may still power off"
                );
            }
        }

        if let Err(e) = self.shared.ledger.lock().persist() {
            warn!(error = %e, "final usage persistence failed");
        }

        let _ = self.shared.terminated_tx.send(true);
        info!("enforcement scheduler stopped");
    }

    // ── Periodic tasks ───────────────────────────────────────────────

    fn spawn_usage_loop(shared: Arc<Shared>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(USAGE_TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                let now = shared.clock.now();
                shared.ledger.lock().tick(now);
            }
        })
    }

    fn spawn_persist_loop(shared: Arc<Shared>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The immediate first tick would persist an empty delta.
            interval.tick().await;
            loop {
                interval.tick().await;
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = shared.ledger.lock().persist() {
                    warn!(error = %e, "periodic usage persistence failed, will retry next tick");
                }
            }
        })
    }

    fn spawn_evaluation_loop(shared: Arc<Shared>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(EVALUATION_TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                Self::evaluate_once(&shared);
            }
        })
    }

    /// One evaluation tick. Failures inside individual actions are logged
    /// and never terminate the timer.
    fn evaluate_once(shared: &Arc<Shared>) {
        let now = shared.clock.now();
        let continuous_secs = shared.ledger.lock().continuous_usage_secs();
        let actions = shared.engine.lock().evaluate(now, continuous_secs);
        Self::execute(shared, actions);
    }

    fn execute(shared: &Arc<Shared>, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::ResetContinuousUsage => shared.ledger.lock().reset_continuous(),

                Action::ShowGeneralReminder => {
                    let (tx, rx) = oneshot::channel();
                    shared.presenter.show_general_reminder(tx);
                    let shared = Arc::clone(shared);
                    tokio::spawn(async move {
                        if rx.await.is_ok() {
                            let now = shared.clock.now();
                            shared.engine.lock().on_reminder_dismissed(now);
                        }
                    });
                }

                Action::ShowForcedRest { duration_secs } => {
                    let (tx, rx) = oneshot::channel();
                    shared.presenter.show_forced_rest(duration_secs, tx);
                    let shared = Arc::clone(shared);
                    tokio::spawn(async move {
                        if rx.await.is_ok() {
                            shared.engine.lock().on_forced_rest_finished();
                        }
                    });
                }

                Action::ShowShutdownCountdown { initial_secs } => {
                    let (tx, rx) = oneshot::channel();
                    shared.presenter.show_shutdown_countdown(initial_secs, tx);
                    let shared = Arc::clone(shared);
                    tokio::spawn(async move {
                        match rx.await {
                            Ok(CountdownOutcome::Completed) => {
                                shared.engine.lock().on_countdown_completed();
                            }
                            Ok(CountdownOutcome::Cancelled) => {
                                let follow_up = shared.engine.lock().on_countdown_cancelled();
                                Self::execute(&shared, follow_up);
                            }
                            Err(_) => debug!("countdown channel closed without an outcome"),
                        }
                    });
                }

                Action::IssueShutdown { delay_secs, force } => {
                    if let Err(e) = shared.power.issue_shutdown(delay_secs, force) {
                        // The countdown is already on screen; the machine
                        // will not actually power off.
                        error!(
                            error = %e,
                            "delayed shutdown could not be scheduled, countdown runs without an OS shutdown"
                        );
                        shared.engine.lock().on_shutdown_issue_failed();
                    }
                }

                Action::AbortShutdown => {
                    if let Err(e) = shared.power.abort_shutdown() {
                        error!(
                            error = %e,
                            "could not abort the scheduled shutdown, the machine may still power off"
                        );
                    }
                }

                Action::ForcedShutdown => Self::forced_shutdown(shared),
            }
        }
    }

    /// Terminal path: flush usage, clear any pending delayed shutdown and
    /// halt the machine immediately.
    fn forced_shutdown(shared: &Arc<Shared>) {
        shared.running.store(false, Ordering::SeqCst);

        if let Err(e) = shared.ledger.lock().persist() {
            warn!(error = %e, "could not flush usage before forced shutdown");
        }

        // An outstanding delayed shutdown makes a second request fail on
        // some platforms; clear it before issuing the immediate one.
        if shared.engine.lock().take_outstanding_ticket() {
            if let Err(e) = shared.power.abort_shutdown() {
                warn!(error = %e, "could not abort the pending delayed shutdown");
            }
        }

        shared.presenter.request_dismiss();

        if let Err(e) = shared.power.issue_shutdown(0, true) {
            error!(error = %e, "forced shutdown could not be issued");
        }

        let _ = shared.terminated_tx.send(true);
        info!("forced shutdown issued, scheduler stopped");
    }
}
