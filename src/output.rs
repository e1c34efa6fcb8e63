//! Report formatting for the terminal and for JSON consumers.

use std::time::Duration;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::passing::Passing;
use crate::validator::{AuditReport, FileOutcome, FileVerdict};

/// Formats an [`AuditReport`] for stdout
pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel) -> Self {
        Self {
            format,
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, enable: bool) -> Self {
        self.show_colors = enable;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn render(&self, report: &AuditReport) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_report(report)),
            OutputFormat::Json => serde_json::to_string_pretty(report),
        }
    }

    pub fn format_report(&self, report: &AuditReport) -> String {
        let mut output = String::new();

        for verdict in &report.files {
            let show = match self.verbosity {
                VerbosityLevel::Verbose => true,
                _ => !verdict.outcome.is_passing(),
            };
            if show {
                output.push_str(&self.format_verdict(verdict));
                output.push('\n');
            }
        }

        if self.verbosity > VerbosityLevel::Quiet {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&self.format_summary(report));
        }

        output
    }

    pub fn format_verdict(&self, verdict: &FileVerdict) -> String {
        let path_display = verdict.path.display();
        let duration_str = format_duration(verdict.duration);

        match &verdict.outcome {
            FileOutcome::Checked {
                severity: Passing::Passing,
                ..
            } => format!(
                "{}  {} ({})",
                self.colorize("✓ PASSING", "32"),
                path_display,
                duration_str
            ),
            FileOutcome::Checked {
                severity,
                error,
                causes,
            } => {
                let label = format!("✗ {}", severity);
                let mut output = format!(
                    "{}  {} ({})",
                    self.colorize(&label, severity_color(*severity)),
                    path_display,
                    duration_str
                );
                if let Some(error) = error {
                    output.push_str(&format!(" - {}", error));
                }
                if self.verbosity >= VerbosityLevel::Verbose {
                    for cause in causes {
                        output.push_str(&format!("\n    {}", cause));
                    }
                } else if let Some(cause) = causes.last() {
                    output.push_str(&format!(": {}", cause));
                }
                output
            }
            FileOutcome::Error { message } => format!(
                "{}  {} ({}) - {}",
                self.colorize("⚠ ERROR", "33"),
                path_display,
                duration_str,
                message
            ),
        }
    }

    fn format_summary(&self, report: &AuditReport) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Total files: {}\n", report.total_files));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Passing:", "32"),
            report.passing_files
        ));

        if report.failed_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Failed:", "31"),
                report.failed_files
            ));
            // Lowest rank first
            for severity in Passing::ALL {
                let count = report.count(severity);
                if severity != Passing::Passing && count > 0 {
                    output.push_str(&format!("    {}: {}\n", severity, count));
                }
            }
        }
        if report.errored_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "33"),
                report.errored_files
            ));
        }

        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(report.total_duration)
        ));
        output
    }
}

fn severity_color(severity: Passing) -> &'static str {
    match severity {
        Passing::Passing => "32",
        Passing::Rules => "35",
        _ => "31",
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report() -> AuditReport {
        let checked = |name: &str, severity: Passing, error: Option<&str>, causes: &[&str]| {
            FileVerdict {
                path: PathBuf::from(name),
                outcome: FileOutcome::Checked {
                    severity,
                    error: error.map(str::to_string),
                    causes: causes.iter().map(|c| c.to_string()).collect(),
                },
                duration: Duration::from_millis(3),
            }
        };

        AuditReport::aggregate(
            vec![
                checked("good.xml", Passing::Passing, None, &[]),
                checked(
                    "broken.xml",
                    Passing::Syntax,
                    Some("syntax validation failed"),
                    &["document is not well-formed", "Opening and ending tag mismatch"],
                ),
                checked(
                    "dvd.xml",
                    Passing::Schema,
                    Some("schema validation failed"),
                    &["Element 'dvd': This element is not expected."],
                ),
                FileVerdict {
                    path: PathBuf::from("gone.xml"),
                    outcome: FileOutcome::Error {
                        message: "File not found: gone.xml".to_string(),
                    },
                    duration: Duration::ZERO,
                },
            ],
            Duration::from_millis(40),
        )
    }

    #[test]
    fn test_normal_output_lists_failures_and_summary() {
        let output = Output::new(OutputFormat::Human, VerbosityLevel::Normal).with_colors(false);
        let formatted = output.format_report(&report());

        assert!(!formatted.contains("good.xml"));
        assert!(formatted.contains("✗ SYNTAX  broken.xml (3ms) - syntax validation failed: Opening and ending tag mismatch"));
        assert!(formatted.contains("✗ SCHEMA  dvd.xml"));
        assert!(formatted.contains("⚠ ERROR  gone.xml"));
        assert!(formatted.contains("Validation Summary:"));
        assert!(formatted.contains("    SYNTAX: 1\n"));
        assert!(formatted.contains("    SCHEMA: 1\n"));
        assert!(formatted.contains("Errors: 1"));
    }

    #[test]
    fn test_quiet_output_has_no_summary() {
        let output = Output::new(OutputFormat::Human, VerbosityLevel::Quiet).with_colors(false);
        let formatted = output.format_report(&report());

        assert!(formatted.contains("broken.xml"));
        assert!(!formatted.contains("Validation Summary:"));
    }

    #[test]
    fn test_verbose_output_shows_every_cause() {
        let output = Output::new(OutputFormat::Human, VerbosityLevel::Verbose).with_colors(false);
        let formatted = output.format_report(&report());

        assert!(formatted.contains("✓ PASSING  good.xml"));
        assert!(formatted.contains("\n    document is not well-formed\n    Opening and ending tag mismatch"));
    }

    #[test]
    fn test_json_output() {
        let output = Output::new(OutputFormat::Json, VerbosityLevel::Normal);
        let rendered = output.render(&report()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(json["total_files"], 4);
        assert_eq!(json["by_severity"]["PASSING"], 1);
        assert_eq!(json["files"][3]["outcome"]["status"], "error");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30.0s");
    }
}
