//! Console output utilities

use colored::*;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};

/// Console helper for CLI output
pub struct CliConsole {
    verbose: bool,
    attended: bool,
    progress_bar: Option<ProgressBar>,
}

impl CliConsole {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            attended: Term::stdout().features().is_attended(),
            progress_bar: None,
        }
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".green().bold(), message.green());
    }

    pub fn warn(&self, message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message.yellow());
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    }

    pub fn print_header(&self, title: &str) {
        println!();
        println!("{}", title.bold().underline());
        println!("{}", "=".repeat(title.len()).dimmed());
    }

    /// Aligned `key: value` line
    pub fn print_field(&self, key: &str, value: impl std::fmt::Display) {
        println!("  {:<24} {}", format!("{}:", key).dimmed(), value);
    }

    pub fn print_debug(&self, message: &str) {
        if self.verbose {
            println!("{}", message.dimmed());
        }
    }

    /// Spinner shown only on an interactive terminal
    pub fn start_progress(&mut self, message: &str) {
        if !self.attended {
            return;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.blue} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        self.progress_bar = Some(pb);
    }

    pub fn update_progress(&self, message: &str) {
        if let Some(pb) = &self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    pub fn finish_progress(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_and_clear();
        }
    }
}
