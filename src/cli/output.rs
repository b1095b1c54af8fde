use std::fmt::Display;
use std::io::IsTerminal;
use std::time::Duration;

use chrono::{DateTime, Utc};
use colored::Colorize;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::cli::Cli;
use crate::error::{Result, SkvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Robot,
}

/// Where command results and progress go.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    mode: OutputMode,
    quiet: bool,
}

impl Output {
    #[must_use]
    pub const fn new(mode: OutputMode, quiet: bool) -> Self {
        Self { mode, quiet }
    }

    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        let mode = if cli.robot {
            OutputMode::Robot
        } else {
            OutputMode::Human
        };
        Self::new(mode, cli.quiet)
    }

    /// Human mode with progress and notes suppressed.
    #[must_use]
    pub const fn quiet() -> Self {
        Self::new(OutputMode::Human, true)
    }

    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }

    #[must_use]
    pub fn is_robot(&self) -> bool {
        self.mode == OutputMode::Robot
    }

    const fn chatty(&self) -> bool {
        matches!(self.mode, OutputMode::Human) && !self.quiet
    }

    /// Progress line for humans; silent in robot or quiet mode.
    pub fn note(&self, message: impl Display) {
        if self.chatty() {
            println!("{message}");
        }
    }

    pub fn success(&self, message: impl Display) {
        if self.chatty() {
            println!("{} {message}", "✓".green().bold());
        }
    }

    pub fn warn(&self, message: impl Display) {
        if self.chatty() {
            eprintln!("{} {message}", "warning:".yellow().bold());
        }
    }

    /// Spinner on stderr for long operations, only when a human is watching.
    #[must_use]
    pub fn spinner(&self, message: impl Into<String>) -> Option<ProgressBar> {
        if !self.chatty() || !std::io::stderr().is_terminal() {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(template);
        }
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(bar)
    }

    /// Emit `data` as a robot envelope, or render `human` for people.
    pub fn emit<T, F>(&self, data: T, human: F) -> Result<()>
    where
        T: Serialize,
        F: FnOnce(&T) -> HumanLayout,
    {
        match self.mode {
            OutputMode::Robot => emit_robot(&robot_ok(data)),
            OutputMode::Human => {
                emit_human(human(&data));
                Ok(())
            }
        }
    }
}

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
    Error { code: String, message: String },
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    RobotResponse {
        status: RobotStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

pub fn robot_error(
    code: impl Into<String>,
    message: impl Into<String>,
) -> RobotResponse<serde_json::Value> {
    RobotResponse {
        status: RobotStatus::Error {
            code: code.into(),
            message: message.into(),
        },
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data: serde_json::Value::Null,
        warnings: Vec::new(),
    }
}

pub fn emit_robot<T: Serialize>(response: &RobotResponse<T>) -> Result<()> {
    emit_json(response)
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| SkvError::Config(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let key_style = style(key).dim().to_string();
        self.lines.push(format!(
            "{key_style:width$} {value}",
            width = self.key_width
        ));
        self
    }

    /// Fixed-width columns; the last column is not padded.
    pub fn row(&mut self, cells: &[&str], widths: &[usize]) -> &mut Self {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            match widths.get(i) {
                Some(&width) if i + 1 < cells.len() => {
                    line.push_str(&format!("{cell:<width$}  "));
                }
                _ => line.push_str(cell),
            }
        }
        self.lines.push(line.trim_end().to_string());
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    if !layout.is_empty() {
        println!("{}", layout.build());
    }
}

/// Column widths that fit every row's cells.
#[must_use]
pub fn column_widths(rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths = Vec::new();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(width) if *width < len => *width = len,
                Some(_) => {}
                None => widths.push(len),
            }
        }
    }
    widths
}
