//! Presentation boundary.
//!
//! The core never renders anything. It hands the presenter an intent plus
//! a completion channel and moves on; the evaluation tick is never blocked
//! on user interaction. Outcomes re-enter the scheduler through the
//! channel, inside the engine's single lock domain.

use tokio::sync::oneshot;

/// Outcome of a cancelable shutdown countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// The countdown ran to zero; the OS shutdown proceeds on its own.
    Completed,
    /// The user asked to cancel the shutdown.
    Cancelled,
}

/// Boundary to the presentation layer.
///
/// Every call is fire-and-forget. Dropping a sender without sending is
/// treated as the screen disappearing without an outcome and is ignored.
pub trait Presenter: Send + Sync {
    /// Show a dismissible rest reminder; send once dismissed.
    fn show_general_reminder(&self, done: oneshot::Sender<()>);

    /// Show a cancelable countdown starting at `initial_secs`. The
    /// presenter owns the visual tick; the core owns only the outcome.
    fn show_shutdown_countdown(
        &self,
        initial_secs: u64,
        outcome: oneshot::Sender<CountdownOutcome>,
    );

    /// Show a forced-rest screen for `duration_secs` with no early
    /// dismissal; send once the duration elapses.
    fn show_forced_rest(&self, duration_secs: u64, done: oneshot::Sender<()>);

    /// Tear down any visible blocking screen (process shutdown path).
    fn request_dismiss(&self);
}
