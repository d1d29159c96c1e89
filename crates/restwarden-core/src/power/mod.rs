//! OS power control.
//!
//! The scheduler talks to the machine through [`PowerController`]; the
//! system implementation shells out to the platform shutdown command,
//! selected by capability at compile time.

use std::process::Command;

use crate::error::PowerError;

/// Issues and aborts OS-level shutdowns.
pub trait PowerController: Send + Sync {
    /// Schedule an OS shutdown after `delay_secs` (0 means immediate).
    /// `force` requests no grace period for other processes.
    ///
    /// # Errors
    ///
    /// `UnsupportedPlatform` when the host OS is unrecognized,
    /// `ExecutionFailed` when the command could not be invoked or failed.
    fn issue_shutdown(&self, delay_secs: u64, force: bool) -> Result<(), PowerError>;

    /// Cancel a previously issued, not-yet-executed shutdown. A failure
    /// here means the OS shutdown may still occur.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`PowerController::issue_shutdown`].
    fn abort_shutdown(&self) -> Result<(), PowerError>;
}

/// Shells out to the platform shutdown command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPowerController;

impl SystemPowerController {
    fn run(mut cmd: Command) -> Result<(), PowerError> {
        let command = format!("{cmd:?}");
        let status = cmd.status().map_err(|e| PowerError::ExecutionFailed {
            command: command.clone(),
            message: e.to_string(),
        })?;
        if !status.success() {
            return Err(PowerError::ExecutionFailed {
                command,
                message: format!("exit status {status}"),
            });
        }
        Ok(())
    }
}

impl PowerController for SystemPowerController {
    #[cfg(target_os = "windows")]
    fn issue_shutdown(&self, delay_secs: u64, force: bool) -> Result<(), PowerError> {
        let mut cmd = Command::new("shutdown");
        cmd.arg("/s");
        if force {
            cmd.arg("/f");
        }
        cmd.args(["/t", &delay_secs.to_string()]);
        Self::run(cmd)
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    fn issue_shutdown(&self, delay_secs: u64, _force: bool) -> Result<(), PowerError> {
        // unix shutdown takes whole minutes; sub-minute delays round up so
        // a short countdown never becomes an instant halt. There is no
        // per-process grace control to map `force` onto.
        let mut cmd = Command::new("shutdown");
        cmd.arg("-h");
        if delay_secs == 0 {
            cmd.arg("now");
        } else {
            cmd.arg(format!("+{}", delay_secs.div_ceil(60)));
        }
        Self::run(cmd)
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    fn issue_shutdown(&self, _delay_secs: u64, _force: bool) -> Result<(), PowerError> {
        Err(PowerError::UnsupportedPlatform)
    }

    #[cfg(target_os = "windows")]
    fn abort_shutdown(&self) -> Result<(), PowerError> {
        let mut cmd = Command::new("shutdown");
        cmd.arg("/a");
        Self::run(cmd)
    }

    #[cfg(target_os = "linux")]
    fn abort_shutdown(&self) -> Result<(), PowerError> {
        let mut cmd = Command::new("shutdown");
        cmd.arg("-c");
        Self::run(cmd)
    }

    #[cfg(target_os = "macos")]
    fn abort_shutdown(&self) -> Result<(), PowerError> {
        // macOS shutdown has no cancel flag; the pending command is a
        // process that can be killed before its deadline.
        let mut cmd = Command::new("killall");
        cmd.arg("shutdown");
        Self::run(cmd)
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    fn abort_shutdown(&self) -> Result<(), PowerError> {
        Err(PowerError::UnsupportedPlatform)
    }
}
