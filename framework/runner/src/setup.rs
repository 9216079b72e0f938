use std::process::Command;

use anyhow::Context;

use crate::types::StampedeResult;

/// Returned when the setup command exits unsuccessfully.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Setup command `{command}` failed with {status}")]
pub struct SetupFailedError {
    command: String,
    status: String,
}

/// Run the setup command to completion before any runs are scheduled.
///
/// The command is run through the platform shell and inherits stdout and stderr.
pub fn run_setup(command: &str) -> StampedeResult<()> {
    log::info!("Running setup command: {command}");

    let status = shell(command)
        .status()
        .with_context(|| format!("Failed to start setup command `{command}`"))?;

    if !status.success() {
        return Err(SetupFailedError {
            command: command.to_string(),
            status: status.to_string(),
        }
        .into());
    }

    log::debug!("Setup command finished");
    Ok(())
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
