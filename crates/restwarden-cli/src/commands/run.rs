use std::sync::Arc;

use restwarden_core::{
    storage, Clock, Config, EnforcementService, SystemClock, SystemPowerController, UsageLedger,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::presenter::TerminalPresenter;

/// Run the enforcement daemon in the foreground until Ctrl-C or a forced
/// shutdown terminates it.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RESTWARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let config = Config::load();
        let clock = Arc::new(SystemClock);
        let stats_path = storage::usage_stats_path()?;
        let ledger = UsageLedger::load(stats_path, clock.now());

        let mut service = EnforcementService::start(
            config,
            ledger,
            clock,
            Arc::new(TerminalPresenter),
            Arc::new(SystemPowerController),
        );

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                service.stop();
            }
            _ = service.terminated() => {}
        }
        Ok(())
    })
}
