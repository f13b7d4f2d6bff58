//! Diagnostic console
//!
//! Every transition and every received byte is mirrored here for field
//! debugging. Writing is fire-and-forget and never affects control flow.

use core::fmt;

/// Line-oriented diagnostic sink
pub trait Console {
    fn write_line(&mut self, line: fmt::Arguments<'_>);
}

impl<C: Console + ?Sized> Console for &mut C {
    fn write_line(&mut self, line: fmt::Arguments<'_>) {
        (**self).write_line(line)
    }
}

/// Serial console backed by `esp-println`
#[cfg(feature = "device")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConsole;

#[cfg(feature = "device")]
impl Console for SerialConsole {
    fn write_line(&mut self, line: fmt::Arguments<'_>) {
        esp_println::println!("{}", line);
    }
}

/// Console that records lines, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingConsole {
    pub lines: std::vec::Vec<std::string::String>,
}

#[cfg(test)]
impl RecordingConsole {
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

#[cfg(test)]
impl Console for RecordingConsole {
    fn write_line(&mut self, line: fmt::Arguments<'_>) {
        self.lines.push(std::format!("{}", line));
    }
}
