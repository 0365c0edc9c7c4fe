//! Table formatting and output utilities
//!
//! This module provides functionality for formatting and displaying
//! tabular data with color support.

use crossterm::{
    style::{Color as CrosstermColor, Stylize},
    terminal::size,
};
use tabled::{
    settings::{object::Rows, Alignment, Color, Modify, Padding, Style, Width},
    Table, Tabled,
};

/// Color theme for console output
#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub header: CrosstermColor,
    pub success: CrosstermColor,
    pub warning: CrosstermColor,
    pub error: CrosstermColor,
    pub info: CrosstermColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            header: CrosstermColor::Blue,
            success: CrosstermColor::Green,
            warning: CrosstermColor::Yellow,
            error: CrosstermColor::Red,
            info: CrosstermColor::Cyan,
        }
    }
}

/// Table formatter with color support
pub struct TableFormatter {
    no_color: bool,
}

impl TableFormatter {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    /// Create a formatted table from data
    pub fn format_table<T: Tabled>(&self, data: &[T]) -> String {
        if data.is_empty() {
            return "No data to display".to_string();
        }

        let mut table = Table::new(data);
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .with(Padding::new(1, 1, 0, 0));

        if !self.no_color {
            table.with(Modify::new(Rows::first()).with(Color::FG_BLUE));
        }

        // Auto-adjust width to terminal
        if let Ok((width, _)) = size() {
            table.with(Width::wrap(width as usize));
        }

        table.to_string()
    }
}

/// Display utilities for console messages
pub struct DisplayUtils {
    theme: ColorTheme,
    no_color: bool,
}

impl DisplayUtils {
    pub fn new(no_color: bool) -> Self {
        Self {
            theme: ColorTheme::default(),
            no_color,
        }
    }

    /// Print a section header
    pub fn print_header(&self, title: &str) {
        if self.no_color {
            println!("=== {} ===", title);
        } else {
            println!("=== {} ===", title.with(self.theme.header).bold());
        }
    }

    /// Print a numbered workflow step
    pub fn print_step(&self, number: u8, message: &str) {
        let label = format!("{}.", number);
        if self.no_color {
            println!("\n{} {}", label, message);
        } else {
            println!("\n{} {}", label.with(self.theme.info).bold(), message);
        }
    }

    pub fn print_success(&self, message: &str) {
        if self.no_color {
            println!("✓ {}", message);
        } else {
            println!("✓ {}", message.with(self.theme.success));
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.no_color {
            eprintln!("⚠ {}", message);
        } else {
            eprintln!("⚠ {}", message.with(self.theme.warning));
        }
    }

    pub fn print_error(&self, message: &str) {
        if self.no_color {
            eprintln!("✗ {}", message);
        } else {
            eprintln!("✗ {}", message.with(self.theme.error));
        }
    }
}
