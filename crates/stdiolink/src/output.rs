use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use stdiolink_session::{CompletedOperation, Message};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

pub fn print_completion(done: &CompletedOperation, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&done.completion.fields).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"]);
            for (key, value) in &done.completion.fields {
                table.add_row(vec![key.clone(), value_text(value)]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let extra = done
                .completion
                .fields
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "DONE" | "DO"))
                .map(|(key, value)| format!("{key}={}", value_text(value)))
                .collect::<Vec<_>>();
            let mut line = format!(
                "{} done={}",
                done.command.verb(),
                value_text(&done.completion.done)
            );
            if !extra.is_empty() {
                line.push(' ');
                line.push_str(&extra.join(" "));
            }
            println!("{line}");
        }
    }
}

/// One line of a decoded transcript.
#[derive(Debug, Serialize, PartialEq)]
pub struct DecodedFrame {
    pub line: usize,
    pub variant: &'static str,
    pub detail: String,
    pub raw: String,
}

impl DecodedFrame {
    pub fn new(line: usize, message: &Message) -> Self {
        let (detail, raw) = match message {
            Message::Completion(done) => (
                format!("done={}", value_text(&done.done)),
                done.raw.clone(),
            ),
            Message::Report(report) => (report.tagged_line(), report.raw.clone()),
            Message::Gui(gui) => (
                match &gui.object {
                    Some(object) => format!("{} -> {object}", gui.command),
                    None => gui.command.clone(),
                },
                gui.raw.clone(),
            ),
            Message::Unrecognized(unknown) => ("no marker key".to_string(), unknown.raw.clone()),
            Message::Malformed(bad) => (bad.reason.clone(), bad.raw.clone()),
            Message::Keepalive => (String::new(), String::new()),
        };
        Self {
            line,
            variant: message.variant_name(),
            detail,
            raw,
        }
    }

    /// Something the worker should not have sent.
    pub fn is_problem(&self) -> bool {
        matches!(self.variant, "malformed" | "unrecognized" | "oversized")
    }
}

pub fn print_decoded(rows: &[DecodedFrame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["LINE", "VARIANT", "DETAIL"]);
            for row in rows {
                table.add_row(vec![row.line.to_string(), row.variant.to_string(), row.detail.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!("{:>5}  {:<12} {}", row.line, row.variant, row.detail);
            }
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
