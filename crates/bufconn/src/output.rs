use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bufconn_transport::Endpoint;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    size: usize,
    payload: String,
    peer: String,
    transport: &'a str,
    timestamp: String,
}

pub fn print_message(msg: &[u8], peer: &Endpoint, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                size: msg.len(),
                payload: payload_preview(msg),
                peer: peer.to_string(),
                transport: peer.transport_name(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    peer.to_string(),
                    msg.len().to_string(),
                    payload_preview(msg),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "peer={} size={} payload={}",
                peer,
                msg.len(),
                payload_preview(msg)
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(msg);
            let _ = out.write_all(b"\n");
            let _ = out.flush();
        }
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
