//! Command-line entry point for vault replay.
//!
//! # Responsibility
//! - Expose vault init, log replay and sync status from a shell.
//! - Print machine-readable JSON on stdout; diagnostics go to stderr.

use notegraph_core::{
    apply_events, core_version, init_logging, init_vault, is_vault, EventLog, JsonlEventLog,
    LoggingConfig, NoteMap, ReplayService, SuperTagMap,
};
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;

const USAGE: &str = "usage: notegraph <command>

commands:
  version                  print the core version
  init <vault-dir>         create vault metadata if missing
  replay <events.jsonl>    replay a log file and print the snapshot
  status <vault-dir>       rebuild a vault and print its sync status";

fn main() -> ExitCode {
    if let Some(config) = LoggingConfig::from_env() {
        if let Err(err) = init_logging(&config) {
            eprintln!("warning: file logging disabled: {err}");
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    match args {
        [command] if command == "version" => {
            println!("notegraph_core version={}", core_version());
            Ok(())
        }
        [command, vault] if command == "init" => {
            let config = init_vault(vault)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        [command, log_file] if command == "replay" => {
            let events = JsonlEventLog::new(log_file).load_all()?;
            let outcome = apply_events(&events, &NoteMap::new(), &SuperTagMap::new());
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        [command, vault] if command == "status" => {
            if !is_vault(vault) {
                return Err(format!("not a vault: {}", Path::new(vault).display()).into());
            }
            let service = ReplayService::open(JsonlEventLog::for_vault(vault))?;
            println!("{}", serde_json::to_string_pretty(&service.sync_status())?);
            Ok(())
        }
        _ => Err(USAGE.into()),
    }
}
