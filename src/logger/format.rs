//! Log formatting and console output with ANSI colors
//!
//! Handles:
//! - Colorized console output with tag and level formatting
//! - Timestamp prefix
//! - Broken pipe handling for piped commands

use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 7;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, level: &str, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let tag_str = format!("{:<width$}", tag.as_str(), width = TAG_WIDTH);
    let tag_str = match tag {
        LogTag::Cache => tag_str.cyan(),
        LogTag::RateLimit => tag_str.yellow(),
        LogTag::Retry => tag_str.magenta(),
        LogTag::Batch => tag_str.blue(),
        LogTag::Config => tag_str.white(),
        LogTag::Audit => tag_str.bright_red(),
    };

    let level_str = format!("{:<width$}", level, width = LEVEL_WIDTH);
    let level_str = match level {
        "ERROR" => level_str.red().bold(),
        "WARNING" => level_str.yellow().bold(),
        "INFO" => level_str.green(),
        "DEBUG" => level_str.bright_black(),
        _ => level_str.dimmed(),
    };

    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag_str,
        level_str,
        message
    );

    // Writing the log line must never take the process down: piped output
    // can close the pipe at any time.
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}
