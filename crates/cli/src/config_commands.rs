use std::path::Path;

use {
    anyhow::Result,
    flowrelay_config::{Diagnostic, Severity, ValidationResult, validate},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(path: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate(path);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults and environment.\n");
    }

    let lines = report_lines(&result, verbose);
    for line in &lines {
        eprintln!("  {line}");
    }
    if !lines.is_empty() {
        eprintln!();
    }
    eprintln!("{}", summary(&result));

    if result.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

fn report_lines(result: &ValidationResult, verbose: bool) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .map(format_diagnostic)
        .collect()
}

fn format_diagnostic(d: &Diagnostic) -> String {
    let (color, label) = match d.severity {
        Severity::Error => (RED, "error"),
        Severity::Warning => (YELLOW, "warning"),
        Severity::Info => (CYAN, "info"),
    };

    if d.path.is_empty() {
        format!("{BOLD}{color}{label}{RESET} {}", d.message)
    } else {
        format!("{BOLD}{color}{label}{RESET} {}: {}", d.path, d.message)
    }
}

fn summary(result: &ValidationResult) -> String {
    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        "No issues found.".into()
    } else {
        format!("{errors} error(s), {warnings} warning(s)")
    }
}
