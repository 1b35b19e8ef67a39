//! Line-oriented command server.
//!
//! Each stdin line is a JSON command; stdout carries scan event envelopes
//! and one response line per command. When stdin closes, a running scan
//! is allowed to finish before the server exits.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::cleaner::DeleteReport;
use crate::config::Config;
use crate::engine::{ScanEngine, ScanRequest, ScanState};

use super::EXIT_OK;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum ServeCommand {
    StartScan {
        #[serde(default)]
        root: Option<PathBuf>,
        #[serde(default)]
        skip_fast_pass: bool,
    },
    CancelScan,
    Delete {
        paths: Vec<PathBuf>,
        #[serde(default)]
        dry_run: bool,
    },
    Status,
}

#[derive(Debug, Serialize)]
#[serde(tag = "response", rename_all = "snake_case")]
enum ServeResponse {
    ScanStarted { scan_id: String },
    CancelScan { cancelled: bool },
    Delete(DeleteReport),
    Status { state: ScanState },
    Error { message: String },
}

pub fn run(config: Config) -> Result<i32> {
    let engine = ScanEngine::new(config)?;
    let (tx, rx) = crossbeam_channel::unbounded::<String>();

    let writer = thread::Builder::new()
        .name("serve-writer".to_string())
        .spawn(move || -> io::Result<()> {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for line in rx {
                writeln!(out, "{}", line)?;
                out.flush()?;
            }
            Ok(())
        })
        .context("cannot spawn output thread")?;

    let stdin = io::stdin();
    serve(&engine, stdin.lock(), tx)?;

    match writer.join() {
        Ok(result) => result.context("cannot write to stdout")?,
        Err(_) => anyhow::bail!("output thread panicked"),
    }
    Ok(EXIT_OK)
}

/// Process commands from `input` until EOF, sending output lines to `out`.
pub fn serve<R: BufRead>(engine: &ScanEngine, input: R, out: Sender<String>) -> Result<()> {
    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();

    for line in input.lines() {
        let line = line.context("cannot read command")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ServeCommand>(&line) {
            Ok(command) => {
                tracing::debug!(?command, "command");
                handle(engine, command, &out, &mut forwarders)
            }
            Err(err) => ServeResponse::Error {
                message: format!("invalid command: {err}"),
            },
        };
        send(&out, &response);
        forwarders.retain(|f| !f.is_finished());
    }

    for forwarder in forwarders {
        if forwarder.join().is_err() {
            tracing::error!("event forwarder panicked");
        }
    }
    Ok(())
}

fn handle(
    engine: &ScanEngine,
    command: ServeCommand,
    out: &Sender<String>,
    forwarders: &mut Vec<JoinHandle<()>>,
) -> ServeResponse {
    match command {
        ServeCommand::StartScan {
            root,
            skip_fast_pass,
        } => match engine.start_scan(ScanRequest {
            root,
            skip_fast_pass,
        }) {
            Ok(handle) => {
                let scan_id = handle.scan_id().to_string();
                let out = out.clone();
                let forwarder = thread::Builder::new()
                    .name("serve-events".to_string())
                    .spawn(move || {
                        for envelope in handle.events().iter() {
                            match envelope.to_json_line() {
                                Ok(line) => {
                                    let _ = out.send(line);
                                }
                                Err(err) => tracing::error!(error = %err, "cannot encode event"),
                            }
                        }
                        handle.wait();
                    });
                match forwarder {
                    Ok(f) => {
                        forwarders.push(f);
                        ServeResponse::ScanStarted { scan_id }
                    }
                    Err(err) => ServeResponse::Error {
                        message: format!("cannot spawn event forwarder: {err}"),
                    },
                }
            }
            Err(err) => ServeResponse::Error {
                message: err.to_string(),
            },
        },
        ServeCommand::CancelScan => ServeResponse::CancelScan {
            cancelled: engine.cancel_scan(),
        },
        ServeCommand::Delete { paths, dry_run } => match engine.delete(&paths, dry_run) {
            Ok(report) => ServeResponse::Delete(report),
            Err(err) => ServeResponse::Error {
                message: err.to_string(),
            },
        },
        ServeCommand::Status => ServeResponse::Status {
            state: engine.state(),
        },
    }
}

fn send(out: &Sender<String>, response: &ServeResponse) {
    match serde_json::to_string(response) {
        Ok(line) => {
            let _ = out.send(line);
        }
        Err(err) => tracing::error!(error = %err, "cannot encode response"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn engine() -> ScanEngine {
        let mut config = Config::default();
        config.locations.use_platform_defaults = false;
        config.scanner.threads = 2;
        ScanEngine::new(config).unwrap()
    }

    fn run_lines(engine: &ScanEngine, input: &str) -> Vec<Value> {
        let (tx, rx) = crossbeam_channel::unbounded();
        serve(engine, input.as_bytes(), tx).unwrap();
        rx.iter().map(|l| serde_json::from_str(&l).unwrap()).collect()
    }

    #[test]
    fn invalid_command_gets_error_response() {
        let out = run_lines(&engine(), "{\"command\":\"explode\"}\nnot json\n");
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v["response"] == "error"));
    }

    #[test]
    fn cancel_and_status_when_idle() {
        let out = run_lines(
            &engine(),
            "{\"command\":\"cancel_scan\"}\n\n{\"command\":\"status\"}\n",
        );
        assert_eq!(out[0]["cancelled"], false);
        assert_eq!(out[1]["state"]["state"], "idle");
    }

    #[test]
    fn delete_without_scan_refuses_every_path() {
        let out = run_lines(
            &engine(),
            "{\"command\":\"delete\",\"paths\":[\"/tmp/whatever\"],\"dry_run\":true}\n",
        );
        assert_eq!(out[0]["response"], "delete");
        assert_eq!(out[0]["failed"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn scan_events_are_streamed() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".npm")).unwrap();
        fs::write(tmp.path().join(".npm/x"), vec![0u8; 32]).unwrap();

        let input = format!(
            "{{\"command\":\"start_scan\",\"root\":{}}}\n",
            serde_json::to_string(tmp.path()).unwrap()
        );
        let out = run_lines(&engine(), &input);

        let started = out.iter().find(|v| v["response"] == "scan_started").unwrap();
        let events: Vec<&Value> = out.iter().filter(|v| v.get("event").is_some()).collect();
        assert_eq!(events[0]["event"], "start");
        assert_eq!(events.last().unwrap()["event"], "complete");
        assert!(events.iter().all(|e| e["scan_id"] == started["scan_id"]));
    }
}
