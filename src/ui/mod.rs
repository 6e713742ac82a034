//! Terminal output for the CLI.
//!
//! Status messages and the progress bar write to stderr so that a `fetch`
//! run's stdout stays a clean stream of JSON lines. The library listing is
//! the `libraries` command's own output and goes to stdout.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::library::Library;

/// Check if stderr is a terminal.
pub fn is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
}

/// Status icons for different outcomes.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
    }
}

/// Print a styled status message to stderr.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => eprintln!("{} {}", icon.green().bold(), msg),
        Status::Error => eprintln!("{} {}", icon.red().bold(), msg),
        Status::Warning => eprintln!("{} {}", icon.yellow().bold(), msg),
        Status::Info => eprintln!("{} {}", icon.cyan().bold(), msg),
    }
}

/// One line per library: id, name and pacing.
pub fn format_library(library: &dyn Library) -> String {
    format!(
        "{:<10} {:<24} {}",
        library.id().bold().cyan(),
        library.name(),
        library.pacing().to_string().dimmed()
    )
}

/// Print a library listing line to stdout.
pub fn print_library(library: &dyn Library) {
    println!("{}", format_library(library));
}

/// Format a number with commas.
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Progress bar for a literature run, sized by the declared maximum.
///
/// Hidden when stderr is not a terminal or output is quiet.
#[derive(Debug, Clone)]
pub struct FetchProgress {
    pb: ProgressBar,
}

impl FetchProgress {
    pub fn new(library: &str, declared_max: usize, visible: bool) -> Self {
        let pb = ProgressBar::with_draw_target(
            Some(declared_max as u64),
            if visible {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {msg} {bar:40.cyan/blue} {pos}/{len} ({per_sec}, {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ "),
        );
        pb.set_message(library.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        Self { pb }
    }

    /// Count one delivered publication.
    pub fn inc(&self) {
        self.pb.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    /// Finish the bar after a complete run.
    pub fn finish_with_success(&self) {
        self.pb.set_style(
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        self.pb.finish_with_message(format!(
            "{} {} publications",
            status_icon(Status::Success).green().bold(),
            format_number(self.pb.position() as usize)
        ));
    }

    /// Finish the bar after an aborted run, keeping the partial count.
    pub fn finish_with_error(&self, msg: &str) {
        self.pb.set_style(
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        self.pb.abandon_with_message(format!(
            "{} {} of {} publications: {}",
            status_icon(Status::Error).red().bold(),
            format_number(self.pb.position() as usize),
            format_number(self.pb.length().unwrap_or(0) as usize),
            msg
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MockLibrary;

    #[test]
    fn test_status_icon() {
        assert_eq!(status_icon(Status::Success), "✓");
        assert_eq!(status_icon(Status::Error), "✗");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(123), "123");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(776), "776");
        assert_eq!(format_number(1000000), "1,000,000");
    }

    #[test]
    fn test_format_library() {
        let library = MockLibrary::new(10);
        let line = format_library(&library);
        assert!(line.contains("mock"));
        assert!(line.contains(library.name()));
        assert!(line.contains(&library.pacing().to_string()));
    }

    #[test]
    fn test_hidden_progress_counts() {
        let progress = FetchProgress::new("mock", 3, false);
        progress.inc();
        progress.inc();
        assert_eq!(progress.position(), 2);
        progress.finish_with_error("cancelled");
    }
}
