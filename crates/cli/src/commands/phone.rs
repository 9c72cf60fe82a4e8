//! Interactive phone session on the terminal

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing::{debug, info};
use webphone_client_core::{
    CallController, CallControllerBuilder, ConnectionState, ControllerEvent, EventStream,
};

use super::console::{status_table, ConsoleHandler};
use crate::cli::PhoneArgs;
use crate::config::AppConfig;

/// A line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect(Option<String>),
    Disconnect,
    Answer,
    Hangup,
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line; blank lines yield `Ok(None)`
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next().map(str::to_string);
        if words.next().is_some() {
            return Err(format!("too many arguments for '{}'", verb));
        }

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("connect" | "c", ext) => ConsoleCommand::Connect(ext),
            ("disconnect" | "d", None) => ConsoleCommand::Disconnect,
            ("answer" | "a", None) => ConsoleCommand::Answer,
            ("hangup" | "h", None) => ConsoleCommand::Hangup,
            ("status" | "s", None) => ConsoleCommand::Status,
            ("help" | "?", None) => ConsoleCommand::Help,
            ("quit" | "exit" | "q", None) => ConsoleCommand::Quit,
            (other, Some(_)) if is_known(other) => {
                return Err(format!("'{}' takes no arguments", other))
            }
            (other, _) => return Err(format!("unknown command '{}', type 'help'", other)),
        };
        Ok(Some(command))
    }
}

fn is_known(verb: &str) -> bool {
    matches!(
        verb,
        "disconnect" | "d" | "answer" | "a" | "hangup" | "h" | "status" | "s" | "help" | "?" | "quit"
            | "exit" | "q"
    )
}

const HELP: &str = "\
commands:
  connect [ext]   register as an extension
  disconnect      close the session
  answer          answer the ringing call
  hangup          reject or end the call
  status          show the current state
  quit            disconnect and exit";

pub async fn execute(args: PhoneArgs, mut config: AppConfig) -> Result<()> {
    args.apply(&mut config);

    let host = config
        .host
        .clone()
        .context("no host configured: pass --host or set `host` in the config file")?;
    let issuer = config.token.build_issuer()?;

    let controller = CallControllerBuilder::new()
        .host(host)
        .config(config.controller.clone())
        .token_issuer(issuer)
        .build()?;
    let _console = controller.subscribe(Arc::new(ConsoleHandler));

    info!(target = %controller.target(), "Phone ready");
    println!("{}", HELP.dimmed());

    if let Some(ext) = config.extension.as_deref() {
        connect(&controller, Some(ext), None);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    debug!("stdin closed");
                    break;
                };
                match ConsoleCommand::parse(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => run(&controller, command, config.extension.as_deref()),
                    Ok(None) => {}
                    Err(message) => println!("{} {}", "?".yellow(), message),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    shutdown(&controller).await;
    Ok(())
}

fn run(controller: &CallController, command: ConsoleCommand, default_ext: Option<&str>) {
    let outcome = match command {
        ConsoleCommand::Connect(ext) => {
            connect(controller, ext.as_deref(), default_ext);
            return;
        }
        ConsoleCommand::Disconnect => controller.request_disconnect(),
        ConsoleCommand::Answer => controller.request_answer(),
        ConsoleCommand::Hangup => controller.request_hangup(),
        ConsoleCommand::Status => {
            println!("{}", status_table(&controller.snapshot()));
            return;
        }
        ConsoleCommand::Help | ConsoleCommand::Quit => {
            println!("{}", HELP);
            return;
        }
    };
    if let Err(e) = outcome {
        println!("{} {}", "✗".red(), e);
    }
}

fn connect(controller: &CallController, ext: Option<&str>, fallback: Option<&str>) {
    let Some(ext) = ext.or(fallback) else {
        println!("{} usage: connect <ext>", "?".yellow());
        return;
    };
    match controller.request_connect(ext) {
        Ok(session) => println!("{} Connecting as {} ({})", "…".dimmed(), ext.bold(), session),
        Err(e) => println!("{} {}", "✗".red(), e),
    }
}

/// Disconnect if needed and wait for the controller to settle
async fn shutdown(controller: &CallController) {
    let mut events = controller.events();
    match controller.connection_state() {
        ConnectionState::Offline => return,
        // A disconnect is already under way
        ConnectionState::Disconnecting => {}
        ConnectionState::Connecting | ConnectionState::Connected => {
            if let Err(e) = controller.request_disconnect() {
                debug!(error = %e, "Disconnect on shutdown refused");
            }
        }
    }
    if controller.connection_state() == ConnectionState::Offline {
        return;
    }

    // The controller resolves a silent transport itself after its timeout
    let limit = controller.config().disconnect_timeout() + Duration::from_secs(1);
    if tokio::time::timeout(limit, next_disconnect(&mut events)).await.is_err() {
        debug!("Gave up waiting for disconnect");
    }
}

async fn next_disconnect(events: &mut EventStream) {
    while let Some(event) = events.next().await {
        if matches!(event, Ok(ControllerEvent::Disconnected)) {
            return;
        }
    }
}
