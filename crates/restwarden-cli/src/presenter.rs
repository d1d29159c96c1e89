//! Headless presenter for terminal runs.
//!
//! Rendering proper lives outside the daemon; this adapter narrates the
//! enforcement screens on the terminal and resolves their outcomes on
//! plain timers so `restwarden run` works unattended. A planned shutdown
//! is cancelled by exiting the daemon (Ctrl-C), which aborts the
//! outstanding OS ticket on the way out.

use std::time::Duration;

use restwarden_core::{CountdownOutcome, Presenter};
use tokio::sync::oneshot;
use tracing::info;

pub struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn show_general_reminder(&self, done: oneshot::Sender<()>) {
        info!("time to rest -- long stretches at the computer take a toll");
        // No dialog to dismiss in a terminal; acknowledge at once.
        let _ = done.send(());
    }

    fn show_shutdown_countdown(
        &self,
        initial_secs: u64,
        outcome: oneshot::Sender<CountdownOutcome>,
    ) {
        info!(
            seconds = initial_secs,
            "the machine will shut down soon, save your work (Ctrl-C cancels and exits)"
        );
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(initial_secs)).await;
            let _ = outcome.send(CountdownOutcome::Completed);
        });
    }

    fn show_forced_rest(&self, duration_secs: u64, done: oneshot::Sender<()>) {
        info!(
            seconds = duration_secs,
            "forced rest: continuous usage limit reached, step away from the machine"
        );
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(duration_secs)).await;
            let _ = done.send(());
        });
    }

    fn request_dismiss(&self) {}
}
