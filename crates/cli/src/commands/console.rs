//! Terminal presentation of controller state and notifications

use async_trait::async_trait;
use colored::Colorize;
use tabled::{Table, Tabled};
use webphone_client_core::{CallEventHandler, ControllerSnapshot, ErrorDetail, HangupReason};

/// Prints notifications as they arrive
pub struct ConsoleHandler;

#[async_trait]
impl CallEventHandler for ConsoleHandler {
    async fn on_connect(&self) {
        println!("{} Connected, waiting for calls", "●".green());
    }

    async fn on_disconnect(&self) {
        println!("{} Disconnected", "○".dimmed());
    }

    async fn on_ring(&self) {
        println!(
            "{} Incoming call: type {} or {}",
            "☎".yellow().bold(),
            "answer".bold(),
            "hangup".bold()
        );
    }

    async fn on_hangup(&self, reason: HangupReason) {
        println!("{} {}", "✆".cyan(), hangup_message(reason));
    }

    async fn on_error(&self, detail: ErrorDetail) {
        println!("{} {}", "✗".red().bold(), detail);
    }
}

pub fn hangup_message(reason: HangupReason) -> &'static str {
    match reason {
        HangupReason::Normal => "Call ended",
        HangupReason::Busy => "Busy: this extension is already in use elsewhere",
        HangupReason::Rejected => "Call rejected",
        HangupReason::Failed => "Call dropped",
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Render a snapshot as a two-column table
pub fn status_table(snapshot: &ControllerSnapshot) -> String {
    let none = || "-".to_string();
    let rows = vec![
        StatusRow {
            field: "connection",
            value: snapshot.connection.to_string(),
        },
        StatusRow {
            field: "call",
            value: snapshot.call.map(|c| c.to_string()).unwrap_or_else(none),
        },
        StatusRow {
            field: "extension",
            value: snapshot.identity.clone().unwrap_or_else(none),
        },
        StatusRow {
            field: "session",
            value: snapshot
                .session_id
                .map(|id| id.to_string())
                .unwrap_or_else(none),
        },
        StatusRow {
            field: "token expires",
            value: snapshot
                .credential_expires_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(none),
        },
        StatusRow {
            field: "protocol violations",
            value: snapshot.protocol_violations.to_string(),
        },
    ];
    Table::new(rows).to_string()
}
