//! Watch command implementation.
//!
//! Runs the controller for the lifetime of the command: reconciles with the
//! service, optionally starts tracking, then prints every snapshot while
//! accepting `start`, `stop` and `quit` on stdin.
//!
//! Commands run on their own task so Ctrl+C and snapshot output stay live
//! while a request is in flight. Only one command runs at a time.

use std::sync::Arc;

use anyhow::{Context, Result};
use geotrack_core::{
    Config, Controller, ControllerOptions, DeviceGateway, HttpGateway, SessionSnapshot,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::cli::OutputFormat;
use crate::commands::trigger::command_error;
use crate::format::{format_snapshot_json, format_snapshot_text};

/// A line command read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchCommand {
    Start,
    Stop,
    Quit,
}

fn parse_command(line: &str) -> Option<WatchCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "start" | "on" => Some(WatchCommand::Start),
        "stop" | "off" => Some(WatchCommand::Stop),
        "quit" | "exit" | "q" => Some(WatchCommand::Quit),
        _ => None,
    }
}

/// Runs a start or stop command in the background, printing its error.
fn spawn_command<G>(controller: Arc<Controller<G>>, command: WatchCommand) -> JoinHandle<()>
where
    G: DeviceGateway + 'static,
{
    tokio::spawn(async move {
        let result = match command {
            WatchCommand::Start => controller
                .start_tracking()
                .await
                .map_err(|e| command_error("start", e)),
            WatchCommand::Stop => controller
                .stop_tracking()
                .await
                .map_err(|e| command_error("stop", e)),
            WatchCommand::Quit => Ok(()),
        };
        if let Err(e) = result {
            eprintln!("{:#}", e);
        }
    })
}

fn in_flight(pending: &Option<JoinHandle<()>>) -> bool {
    pending.as_ref().is_some_and(|handle| !handle.is_finished())
}

pub async fn cmd_watch(
    config: &Config,
    start: bool,
    format: OutputFormat,
    no_color: bool,
) -> Result<()> {
    let gateway = HttpGateway::from_config(&config.gateway)?;
    let controller = Arc::new(Controller::with_options(
        gateway,
        ControllerOptions::from(&config.polling),
    )?);
    let device_id = controller.device_id().to_string();
    let mut updates = controller.subscribe();

    match controller.reconcile().await {
        Ok(state) => eprintln!("Tracking for {} is {}", device_id, state),
        Err(e) => eprintln!("Could not read tracking status: {}", e),
    }
    if start && let Err(e) = controller.start_tracking().await {
        eprintln!("{:#}", command_error("start", e));
    }

    let show = |snapshot: &SessionSnapshot| -> Result<()> {
        let content = match format {
            OutputFormat::Text => format_snapshot_text(&device_id, snapshot, no_color),
            OutputFormat::Json => format_snapshot_json(&device_id, snapshot)?,
        };
        print!("{}", content);
        Ok(())
    };

    let initial = updates.borrow_and_update().clone();
    show(&initial)?;
    eprintln!("Type start, stop or quit. Press Ctrl+C to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Option<JoinHandle<()>> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                show(&snapshot)?;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Some(WatchCommand::Quit) => break,
                    Some(_) if in_flight(&pending) => {
                        eprintln!("Ignoring '{}': a command is already in progress.", line.trim());
                    }
                    Some(command) => {
                        pending = Some(spawn_command(Arc::clone(&controller), command));
                    }
                    None if line.trim().is_empty() => {}
                    None => eprintln!("Unknown command '{}'. Use start, stop or quit.", line.trim()),
                }
            }
        }
    }

    controller.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_core::{MockGateway, TriggerState};

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("start"), Some(WatchCommand::Start));
        assert_eq!(parse_command("  STOP \n"), Some(WatchCommand::Stop));
        assert_eq!(parse_command("q"), Some(WatchCommand::Quit));
        assert_eq!(parse_command("pause"), None);
        assert_eq!(parse_command(""), None);
    }

    #[tokio::test]
    async fn test_spawned_command_drives_controller() {
        let controller = Arc::new(Controller::new(MockGateway::new("dev-1")));

        let handle = spawn_command(Arc::clone(&controller), WatchCommand::Start);
        handle.await.unwrap();
        assert_eq!(controller.trigger_state(), TriggerState::On);

        let handle = spawn_command(Arc::clone(&controller), WatchCommand::Stop);
        handle.await.unwrap();
        assert_eq!(controller.trigger_state(), TriggerState::Off);
        assert_eq!(controller.gateway().start_calls(), 1);
        assert_eq!(controller.gateway().stop_calls(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_tracks_pending_command() {
        assert!(!in_flight(&None));

        // Remote already on, so the start is refused.
        let gateway = MockGateway::new("dev-1");
        gateway.set_remote_triggered(true);
        let controller = Arc::new(Controller::new(gateway));
        let pending = Some(spawn_command(Arc::clone(&controller), WatchCommand::Start));
        while in_flight(&pending) {
            tokio::task::yield_now().await;
        }
        assert_eq!(controller.trigger_state(), TriggerState::Off);
        assert_eq!(controller.gateway().start_calls(), 1);
    }
}
