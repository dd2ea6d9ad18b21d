//! Display and output formatting utilities

use crate::config::OutputFormat;
use crate::extract::Extraction;
use crate::facade::FacadeResult;
use crate::solvers::SatResult;
use anyhow::Result;
use std::path::Path;

/// Format solve results for display
pub struct ResultFormatter;

impl ResultFormatter {
    /// Render a result in the requested output format
    pub fn format(result: &FacadeResult, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(Self::format_text(result)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        }
    }

    pub fn format_text(result: &FacadeResult) -> String {
        let mut output = String::new();

        output.push_str(&format!("Result: {}\n", result.result));
        output.push_str(&format!("Runtime: {:.3}s\n", result.runtime_seconds));

        if !result.witness.is_empty() {
            output.push_str(&format!("Stations packed: {}\n", result.witness.len()));
            output.push_str("Station  | Channel\n");
            output.push_str("---------|--------\n");
            for (station, channel) in &result.witness {
                output.push_str(&format!("{:8} | {}\n", station.to_string(), channel));
            }
        }

        output
    }

    /// Short colored line for the terminal
    pub fn format_headline(result: &FacadeResult) -> String {
        let line = format!("{} in {:.3}s", result.result, result.runtime_seconds);
        match result.result {
            SatResult::Sat => ColorOutput::success(&line),
            SatResult::Unsat => ColorOutput::warning(&line),
            SatResult::Timeout | SatResult::Crashed => ColorOutput::error(&line),
        }
    }

    /// Summary table of a CNF extraction run, with encoding sizes when `verbose`
    pub fn format_extractions(extractions: &[Extraction], verbose: bool) -> String {
        let mut output = String::new();

        for extraction in extractions {
            let name = extraction
                .question
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            match &extraction.outcome {
                Ok(path) => {
                    output.push_str(&format!("{} -> {}\n", name, path.display()));
                    if let (true, Some(statistics)) = (verbose, &extraction.statistics) {
                        output.push_str(&statistics.to_string());
                    }
                }
                Err(error) => output.push_str(&ColorOutput::error(&format!("{}: {}\n", name, error))),
            }
        }

        output
    }

    /// Write a result next to the others in `output_dir`
    pub fn save_result<P: AsRef<Path>>(
        result: &FacadeResult,
        output_dir: P,
        name: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)?;

        let extension = match format {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        };
        let path = output_dir.join(format!("{}.{}", name, extension));
        std::fs::write(path, Self::format(result, format)?)?;

        Ok(())
    }
}

/// Color output utilities
pub struct ColorOutput;

impl ColorOutput {
    /// Format text with color (if terminal supports it)
    pub fn colored(text: &str, color: Color) -> String {
        if Self::supports_color() {
            format!("\x1b[{}m{}\x1b[0m", color.code(), text)
        } else {
            text.to_string()
        }
    }

    fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err()
            && (std::env::var("TERM").unwrap_or_default() != "dumb")
    }

    pub fn success(text: &str) -> String {
        Self::colored(text, Color::Green)
    }

    pub fn error(text: &str) -> String {
        Self::colored(text, Color::Red)
    }

    pub fn warning(text: &str) -> String {
        Self::colored(text, Color::Yellow)
    }

    pub fn info(text: &str) -> String {
        Self::colored(text, Color::Blue)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
}

impl Color {
    fn code(self) -> u8 {
        match self {
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
        }
    }
}
