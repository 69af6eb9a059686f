//! Action dispatch: turns a requested fencing action into agent calls and
//! renders the result the way the fencing framework expects it.

use std::io::Write;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{error, info};

use crate::agent::{FenceAgent, PowerAction, TargetList};
use crate::config::{Action, FenceOptions};
use crate::error::{FenceError, EC_OK, EC_STATUS_OFF};
use crate::metadata::write_metadata;
use crate::providers::Transport;
use crate::state::PowerState;

/// Interval between status polls while waiting for a power change.
pub const POLL_INTERVAL_SECS: u64 = 1;

/// Successful result of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The action completed.
    Success,
    /// `status` found the target powered off.
    TargetOff,
}

impl Outcome {
    /// Exit code the fencing framework expects.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Success => EC_OK,
            Self::TargetOff => EC_STATUS_OFF,
        }
    }
}

/// Run the action selected in `options`, writing its output to `out`.
///
/// # Errors
/// Returns the classified failure of the underlying operation.
pub async fn fence_action<T, W>(
    agent: &FenceAgent<T>,
    options: &FenceOptions,
    out: &mut W,
) -> Result<Outcome, FenceError>
where
    T: Transport,
    W: Write,
{
    info!(action = ?options.action, plug = ?options.plug, "Running fencing action");

    match options.action {
        Action::ValidateAll => Ok(Outcome::Success),
        Action::Metadata => {
            write_metadata(out)?;
            Ok(Outcome::Success)
        }
        Action::List => {
            let targets = agent.list_targets().await?;
            write_list(out, &targets, &options.separator, false)?;
            Ok(Outcome::Success)
        }
        Action::ListStatus => {
            let targets = agent.list_targets().await?;
            write_list(out, &targets, &options.separator, true)?;
            Ok(Outcome::Success)
        }
        Action::Monitor => {
            let targets = agent.list_targets().await?;
            if targets.is_empty() {
                return Err(FenceError::StatusUnavailable(
                    "no servers are visible to the API token".into(),
                ));
            }
            info!(count = targets.len(), "Monitor found servers");
            Ok(Outcome::Success)
        }
        Action::Status => {
            let plug = options.plug()?;
            let state = settled_status(agent, plug, options.power_timeout).await?;
            writeln!(out, "Status: {}", state.as_str().to_uppercase())?;
            Ok(if state == PowerState::Off {
                Outcome::TargetOff
            } else {
                Outcome::Success
            })
        }
        Action::On => switch(agent, options, PowerAction::On, out).await,
        Action::Off => {
            delay(options).await;
            switch(agent, options, PowerAction::Off, out).await
        }
        Action::Reboot => {
            delay(options).await;
            reboot(agent, options, out).await
        }
    }
}

fn write_list<W: Write>(
    out: &mut W,
    targets: &TargetList,
    separator: &str,
    with_status: bool,
) -> std::io::Result<()> {
    for (id, (name, state)) in targets {
        if with_status {
            writeln!(
                out,
                "{id}{separator}{name}{separator}{}",
                state.as_str().to_uppercase()
            )?;
        } else {
            writeln!(out, "{id}{separator}{name}")?;
        }
    }
    Ok(())
}

async fn delay(options: &FenceOptions) {
    if !options.delay.is_zero() {
        info!(delay_secs = options.delay.as_secs(), "Delay before fencing");
        sleep(options.delay).await;
    }
}

/// Read the power state, polling again while it is unknown.
async fn settled_status<T: Transport>(
    agent: &FenceAgent<T>,
    plug: &str,
    timeout: Duration,
) -> Result<PowerState, FenceError> {
    let deadline = Instant::now() + timeout;

    loop {
        let state = agent.get_power_status(plug).await?;
        if state != PowerState::Unknown {
            return Ok(state);
        }
        if Instant::now() >= deadline {
            return Err(FenceError::StatusUnavailable(format!(
                "power state of server {plug} is still unknown after {}s",
                timeout.as_secs()
            )));
        }
        sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
    }
}

/// Poll until the target reports `desired`; `false` once the timeout passes.
async fn wait_for_state<T: Transport>(
    agent: &FenceAgent<T>,
    plug: &str,
    desired: PowerState,
    timeout: Duration,
) -> Result<bool, FenceError> {
    let deadline = Instant::now() + timeout;

    loop {
        if agent.get_power_status(plug).await? == desired {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
    }
}

/// Issue a power change and wait until it is observed.
async fn apply<T: Transport>(
    agent: &FenceAgent<T>,
    options: &FenceOptions,
    plug: &str,
    action: PowerAction,
) -> Result<bool, FenceError> {
    agent.set_power_status(plug, action).await?;
    if !options.power_wait.is_zero() {
        sleep(options.power_wait).await;
    }
    wait_for_state(agent, plug, action.target_state(), options.power_timeout).await
}

fn timed_out(action: PowerAction) -> FenceError {
    match action {
        PowerAction::On => FenceError::WaitingOn,
        PowerAction::Off => FenceError::WaitingOff,
    }
}

async fn switch<T, W>(
    agent: &FenceAgent<T>,
    options: &FenceOptions,
    action: PowerAction,
    out: &mut W,
) -> Result<Outcome, FenceError>
where
    T: Transport,
    W: Write,
{
    let plug = options.plug()?;
    let label = action.target_state().as_str().to_uppercase();

    if settled_status(agent, plug, options.power_timeout).await? == action.target_state() {
        writeln!(out, "Success: Already {label}")?;
        return Ok(Outcome::Success);
    }

    if !apply(agent, options, plug, action).await? {
        return Err(timed_out(action));
    }

    writeln!(out, "Success: Powered {label}")?;
    Ok(Outcome::Success)
}

/// Power off (unless already off), then power on again.
///
/// The target counts as fenced once it is confirmed off, so a failure to
/// power it back on is logged but does not fail the reboot.
async fn reboot<T, W>(
    agent: &FenceAgent<T>,
    options: &FenceOptions,
    out: &mut W,
) -> Result<Outcome, FenceError>
where
    T: Transport,
    W: Write,
{
    let plug = options.plug()?;

    if settled_status(agent, plug, options.power_timeout).await? != PowerState::Off
        && !apply(agent, options, plug, PowerAction::Off).await?
    {
        return Err(timed_out(PowerAction::Off));
    }

    match apply(agent, options, plug, PowerAction::On).await {
        Ok(true) => {}
        Ok(false) => error!(server_id = %plug, "Timed out waiting to power ON"),
        Err(e) => error!(server_id = %plug, error = %e, "Failed to power ON after power OFF"),
    }

    writeln!(out, "Success: Rebooted")?;
    Ok(Outcome::Success)
}
