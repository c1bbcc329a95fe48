//! Terminal output: colored status lines, banners, and the final run
//! summary. JSON mode emits one line-delimited object per call instead.

use colored::Colorize;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::executor::RunSummary;

/// Per-target task outcome, as reported by a single [`crate::modules::ModuleResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Ok,
    Changed,
    Skipped,
    Failed,
}

impl TaskStatus {
    pub fn colored_string(&self) -> String {
        match self {
            TaskStatus::Ok => "ok".green().to_string(),
            TaskStatus::Changed => "changed".yellow().to_string(),
            TaskStatus::Skipped => "skipping".cyan().to_string(),
            TaskStatus::Failed => "failed".red().bold().to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Ok => "ok",
            TaskStatus::Changed => "changed",
            TaskStatus::Skipped => "skipping",
            TaskStatus::Failed => "failed",
        }
    }
}

pub struct OutputFormatter {
    use_color: bool,
    json_mode: bool,
    verbosity: u8,
    start_time: Instant,
}

impl OutputFormatter {
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        Self {
            use_color,
            json_mode,
            verbosity,
            start_time: Instant::now(),
        }
    }

    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }
        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{line}");
            println!("  {title}  ");
            println!("{line}\n");
        }
    }

    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }
        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{title}");
            println!("{}", "-".repeat(title.len()));
        }
    }

    pub fn task_header(&self, task_name: &str) {
        if self.json_mode {
            return;
        }
        let header = format!("TASK [{task_name}]");
        let stars = "*".repeat(80_usize.saturating_sub(header.len()));
        if self.use_color {
            println!("\n{} {}", header.bright_white().bold(), stars.bright_black());
        } else {
            println!("\n{header} {stars}");
        }
    }

    pub fn task_result(&self, target: &str, status: TaskStatus, message: Option<&str>) {
        if self.json_mode {
            let result = serde_json::json!({
                "target": target,
                "status": status.as_str(),
                "message": message,
            });
            println!("{}", serde_json::to_string(&result).unwrap());
            return;
        }

        let status_str = if self.use_color { status.colored_string() } else { status.as_str().to_string() };
        let target_str = if self.use_color { target.bright_white().bold().to_string() } else { target.to_string() };
        print!("{status_str}: [{target_str}]");
        if let Some(msg) = message {
            print!(" => {msg}");
        }
        println!();
    }

    /// Print the final run summary and return the process exit code (0 or 2).
    pub fn recap(&self, summary: &RunSummary, had_failure: bool) -> i32 {
        if self.json_mode {
            println!("{}", serde_json::to_string_pretty(summary).unwrap());
        } else {
            let header = "RUN RECAP";
            let stars = "*".repeat(80_usize.saturating_sub(header.len()));
            if self.use_color {
                println!("\n{} {}", header.bright_white().bold(), stars.bright_black());
            } else {
                println!("\n{header} {stars}");
            }
            println!(
                "ok={:<4} changed={:<4} failed={:<4} skipped={:<4}",
                summary.ok, summary.changed, summary.failed, summary.skipped
            );

            let duration = self.start_time.elapsed();
            let duration_str = format_duration(duration);
            if self.use_color {
                println!("{} {}", "run took".bright_black(), duration_str.bright_white());
                if had_failure {
                    println!("{}", "run failed.".red().bold());
                } else {
                    println!("{}", "run completed successfully.".green().bold());
                }
            } else {
                println!("run took {duration_str}");
                println!("{}", if had_failure { "run failed." } else { "run completed successfully." });
            }
        }
        if had_failure {
            2
        } else {
            0
        }
    }

    pub fn error(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", serde_json::json!({"type": "error", "message": message}));
            return;
        }
        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", serde_json::json!({"type": "warning", "message": message}));
            return;
        }
        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {message}");
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity < 1 {
            return;
        }
        if self.json_mode {
            println!("{}", serde_json::json!({"type": "info", "message": message}));
            return;
        }
        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {message}");
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 {
            return;
        }
        if self.json_mode {
            println!("{}", serde_json::json!({"type": "debug", "message": message}));
            return;
        }
        if self.use_color {
            println!("{} {}", "DEBUG:".magenta(), message);
        } else {
            println!("DEBUG: {message}");
        }
    }

    pub fn list(&self, title: &str, items: &[String]) {
        if self.json_mode {
            println!("{}", serde_json::json!({"type": "list", "title": title, "items": items}));
            return;
        }
        if self.use_color {
            println!("\n{}:", title.bright_white().bold());
        } else {
            println!("\n{title}:");
        }
        for item in items {
            if self.use_color {
                println!("  {} {}", "-".bright_black(), item);
            } else {
                println!("  - {item}");
            }
        }
    }

    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{secs}.{millis:03}s")
    } else {
        format!("{millis}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_strings() {
        assert_eq!(TaskStatus::Ok.as_str(), "ok");
        assert_eq!(TaskStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn format_duration_scales_units() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m 5s");
    }

    #[test]
    fn recap_reports_exit_code_from_failure_flag() {
        let formatter = OutputFormatter::new(false, true, 0);
        let summary = RunSummary { ok: 1, changed: 0, failed: 0, skipped: 0 };
        assert_eq!(formatter.recap(&summary, false), 0);
        assert_eq!(formatter.recap(&summary, true), 2);
    }
}
