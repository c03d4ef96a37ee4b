//! Adapter bridging [`ProgressSink`] to the process logger.

use super::ProgressSink;
use crate::{log_debug, log_info, log_warning};

/// Forwards progress to the stderr logger.
///
/// Steps are only printed in verbose mode unless `show_steps` is set, so a
/// plain `clean` run stays quiet apart from the final table.
#[derive(Debug, Default)]
pub struct LogSink {
    pub show_steps: bool,
    warnings: usize,
}

impl LogSink {
    pub fn new(show_steps: bool) -> Self {
        Self {
            show_steps,
            warnings: 0,
        }
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }
}

impl ProgressSink for LogSink {
    fn on_step(&mut self, msg: &str) {
        if self.show_steps {
            log_info!("{msg}");
        } else {
            log_debug!("{msg}");
        }
    }

    fn on_warning(&mut self, msg: &str) {
        self.warnings += 1;
        log_warning!("{msg}");
    }
}
