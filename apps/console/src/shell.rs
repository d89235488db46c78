//! Line-oriented operator shell standing in for the button grid.

use std::{fmt::Write as _, str::FromStr};

use console_core::{ConfigKey, ConfigStore, Console, ConsoleSnapshot, Mode};
use engine_client::{StatusReport, WriteSubmitter};
use serde_json::{json, Value};
use shared::{
    domain::{Column, RowIndex},
    error::ConsoleError,
};
use tokio::sync::watch;

pub const HELP: &str = "\
commands:
  press <column> <row>   press a grid cell (rows start at 1)
  stage                  enter staging mode
  go                     commit staged changes
  cancel                 discard staged changes
  toggle                 switch between live and staging
  show                   print the grid
  status                 print engine link status
  set-ip <host>          point writes at another engine host
  set-port <port>        point writes at another engine port
  set-colours <json>     replace the colour set (resets selection)
  set-layers <json>      replace the layer map (resets selection)
  help                   this text
  quit                   leave the console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Press { column: Column, row: RowIndex },
    Stage,
    Go,
    Cancel,
    Toggle,
    Show,
    Status,
    SetIp(String),
    SetPort(u16),
    SetColours(Value),
    SetLayers(Value),
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'; try 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("row must be a number from 1, got '{0}'")]
    BadRow(String),
    #[error("port must be a number from 1 to 65535, got '{0}'")]
    BadPort(String),
    #[error("invalid JSON: {0}")]
    BadJson(String),
}

impl FromStr for ShellCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseError::Empty);
        };
        let rest: Vec<&str> = words.collect();
        // Everything after the verb, spacing intact.
        let tail = line
            .trim_start()
            .split_once(char::is_whitespace)
            .map(|(_, tail)| tail.trim())
            .unwrap_or_default();

        match verb.to_ascii_lowercase().as_str() {
            "press" | "p" => {
                // Column names may contain spaces; the row is always last.
                let Some((row, column)) = rest.split_last() else {
                    return Err(ParseError::Usage("press <column> <row>"));
                };
                if column.is_empty() {
                    return Err(ParseError::Usage("press <column> <row>"));
                }
                let row = row
                    .parse::<usize>()
                    .ok()
                    .and_then(|row| row.checked_sub(1))
                    .ok_or_else(|| ParseError::BadRow(row.to_string()))?;
                Ok(Self::Press {
                    column: Column::new(column.join(" ")),
                    row: RowIndex(row),
                })
            }
            "stage" => Ok(Self::Stage),
            "go" | "commit" => Ok(Self::Go),
            "cancel" => Ok(Self::Cancel),
            "toggle" | "mode" => Ok(Self::Toggle),
            "show" | "grid" => Ok(Self::Show),
            "status" => Ok(Self::Status),
            "set-ip" => match rest.as_slice() {
                [host] => Ok(Self::SetIp(host.to_string())),
                _ => Err(ParseError::Usage("set-ip <host>")),
            },
            "set-port" => match rest.as_slice() {
                [port] => port
                    .parse::<u16>()
                    .ok()
                    .filter(|port| *port > 0)
                    .map(Self::SetPort)
                    .ok_or_else(|| ParseError::BadPort(port.to_string())),
                _ => Err(ParseError::Usage("set-port <port>")),
            },
            "set-colours" | "set-colors" => {
                parse_json(tail, "set-colours <json>").map(Self::SetColours)
            }
            "set-layers" => parse_json(tail, "set-layers <json>").map(Self::SetLayers),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

fn parse_json(raw: &str, usage: &'static str) -> Result<Value, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::Usage(usage));
    }
    serde_json::from_str(raw).map_err(|err| ParseError::BadJson(err.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    Quit,
}

pub struct Shell<'a, W: WriteSubmitter> {
    console: &'a Console<W>,
    store: &'a dyn ConfigStore,
    status: watch::Receiver<Option<StatusReport>>,
}

impl<'a, W: WriteSubmitter> Shell<'a, W> {
    pub fn new(
        console: &'a Console<W>,
        store: &'a dyn ConfigStore,
        status: watch::Receiver<Option<StatusReport>>,
    ) -> Self {
        Self {
            console,
            store,
            status,
        }
    }

    pub fn execute(&self, command: ShellCommand) -> Result<Outcome, ConsoleError> {
        let reply = match command {
            ShellCommand::Press { column, row } => {
                let report = self.console.select_column(&column, row)?;
                match self.console.mode() {
                    Mode::Live if report.dropped > 0 => format!(
                        "{column} row {}: sent {}, dropped {}",
                        row.0 + 1,
                        report.submitted,
                        report.dropped
                    ),
                    Mode::Live => format!("{column} row {}: sent {}", row.0 + 1, report.submitted),
                    Mode::Staging => format!("{column} row {}: staged", row.0 + 1),
                }
            }
            ShellCommand::Stage => {
                self.console.enter_staging()?;
                "staging".to_string()
            }
            ShellCommand::Go => {
                let report = self.console.commit()?;
                format!("committed {} write(s), dropped {}", report.submitted, report.dropped)
            }
            ShellCommand::Cancel => {
                self.console.cancel()?;
                "staged changes discarded".to_string()
            }
            ShellCommand::Toggle => format!("mode: {}", self.console.toggle_mode()?),
            ShellCommand::Show => render_grid(&self.console.snapshot()),
            ShellCommand::Status => match self.status.borrow().as_ref() {
                Some(report) => format!("{} ({})", report.label(), report.latency_label()),
                None => "no heartbeat yet".to_string(),
            },
            ShellCommand::SetIp(host) => {
                self.store.set(ConfigKey::WebserverIp, json!(host));
                format!("engine host set to {host}")
            }
            ShellCommand::SetPort(port) => {
                self.store.set(ConfigKey::WebserverPort, json!(port));
                format!("engine port set to {port}")
            }
            ShellCommand::SetColours(colours) => {
                self.store.set(ConfigKey::ColourSet, colours);
                format!("colour set replaced; {} rows", self.console.snapshot().colours.len())
            }
            ShellCommand::SetLayers(layers) => {
                self.store.set(ConfigKey::LayerMap, layers);
                format!(
                    "layer map replaced; {} columns",
                    self.console.snapshot().columns.len()
                )
            }
            ShellCommand::Help => HELP.to_string(),
            ShellCommand::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Reply(reply))
    }
}

/// Text rendition of the grid. `L` marks the live row, `S` a staged row and
/// `*` the highlighted cell.
pub fn render_grid(snapshot: &ConsoleSnapshot) -> String {
    let label_width = snapshot
        .colours
        .iter()
        .map(|entry| entry.label.len())
        .max()
        .unwrap_or(0)
        .max(4);
    let column_width = snapshot
        .columns
        .iter()
        .map(|column| column.as_str().len())
        .max()
        .unwrap_or(0)
        .max(5);

    let mut out = String::new();
    let _ = writeln!(out, "mode: {}", snapshot.mode);
    let _ = write!(out, "{:label_width$}", "");
    for column in &snapshot.columns {
        let _ = write!(out, " | {:^column_width$}", column.as_str());
    }
    out.push('\n');

    for (row, entry) in snapshot.colours.iter().enumerate() {
        let _ = write!(out, "{:label_width$}", entry.label);
        for column in &snapshot.columns {
            let cell = snapshot.cell(column, RowIndex(row));
            let mark = format!(
                "{}{}{}",
                if cell.live { "L" } else { "" },
                if cell.standby { "S" } else { "" },
                if cell.selected { "*" } else { "" },
            );
            let _ = write!(out, " | {:^column_width$}", mark);
        }
        out.push('\n');
    }

    if !snapshot.queued.is_empty() {
        let queued = snapshot
            .queued
            .iter()
            .map(|(column, colour)| format!("{column}={colour}"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "queued: {queued}");
    }
    out
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
