//! Console sink implementation

use super::{format_body, format_timestamp};
use crate::core::{Event, Result, Sink};
#[cfg(feature = "console")]
use colored::Colorize;
use std::io::Write;

pub struct ConsoleSink {
    #[cfg_attr(not(feature = "console"), allow(dead_code))]
    use_colors: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            use_colors: cfg!(feature = "console"),
        }
    }

    /// Colors are only available with the `console` feature
    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors: use_colors && cfg!(feature = "console"),
        }
    }

    fn format(&self, event: &Event) -> String {
        let level = format!("{:5}", event.level().to_str());
        #[cfg(feature = "console")]
        let level = if self.use_colors {
            level.color(event.level().color_code()).to_string()
        } else {
            level
        };

        format!("[{}] [{}] {}", format_timestamp(event), level, format_body(event))
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn dispatch(&mut self, event: &Event) -> Result<()> {
        let output = self.format(event);

        // Route Error and Fatal levels to stderr, others to stdout
        if event.level().is_error() {
            writeln!(std::io::stderr().lock(), "{}", output)?;
        } else {
            writeln!(std::io::stdout().lock(), "{}", output)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
