//! Terminal text styling utilities.
//!
//! Provides clean abstractions for ANSI terminal styling, keeping escape codes
//! isolated from application code.

use crate::core::model::{BranchStatus, SyncStatus};
use std::io::IsTerminal;

/// ANSI escape code for bold text.
pub const BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text.
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// ANSI escape code to reset all styling.
pub const RESET: &str = "\x1b[0m";

/// Colors only on a terminal stdout, and never when `NO_COLOR` is set.
pub fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

fn paint(code: &str, text: &str) -> String {
    format!("{code}{text}{RESET}")
}

/// Wraps text in bold styling.
pub fn bold(text: &str) -> String {
    paint(BOLD, text)
}

pub fn dim(text: &str) -> String {
    paint(DIM, text)
}

pub fn red(text: &str) -> String {
    paint(RED, text)
}

pub fn green(text: &str) -> String {
    paint(GREEN, text)
}

pub fn yellow(text: &str) -> String {
    paint(YELLOW, text)
}

pub fn cyan(text: &str) -> String {
    paint(CYAN, text)
}

/// Merged is green, stale yellow, active left plain.
pub fn status(status: BranchStatus, use_color: bool) -> String {
    let text = status.as_str();
    if !use_color {
        return text.to_string();
    }
    match status {
        BranchStatus::Merged => green(text),
        BranchStatus::Stale => yellow(text),
        BranchStatus::Active => text.to_string(),
    }
}

pub fn sync(sync: &SyncStatus, use_color: bool) -> String {
    let text = sync.to_string();
    if !use_color {
        return text;
    }
    match sync {
        SyncStatus::Synced | SyncStatus::MergedGit | SyncStatus::MergedPr => green(&text),
        SyncStatus::Diverged { .. } => red(&text),
        SyncStatus::Behind { .. } | SyncStatus::Ahead { .. } => yellow(&text),
        SyncStatus::LocalOnly => dim(&text),
    }
}
