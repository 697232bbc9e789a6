//! User-facing output: check findings, run reports, and diffs of failed
//! comparisons.

use std::io::{self, Write};
use std::path::Path;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorSpec, WriteColor};

use crate::executor::{Outcome, RunReport, Summary, TestRecord};
use crate::validation::{Findings, Level, ValidationSummary};

// ============================================================================
// CHECK
// ============================================================================

pub fn print_loaded<W: WriteColor>(
    out: &mut W,
    specs: usize,
    implementations: usize,
    tests: usize,
) -> io::Result<()> {
    writeln!(
        out,
        "Loaded {specs} specs, {implementations} implementations, {tests} tests"
    )
}

pub fn print_findings<W: WriteColor>(out: &mut W, path: &Path, findings: &Findings) -> io::Result<()> {
    writeln!(out, "Checking: {}", path.display())?;
    for finding in findings {
        write!(out, "- ")?;
        out.set_color(ColorSpec::new().set_fg(Some(level_color(finding.level))))?;
        write!(out, "{}", finding.level)?;
        out.reset()?;
        writeln!(out, ": {}: {}", finding.field, finding.message)?;
    }
    Ok(())
}

pub fn print_validation_summary<W: WriteColor>(out: &mut W, summary: &ValidationSummary) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{summary}")
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warning => Color::Yellow,
        Level::Info => Color::Blue,
    }
}

// ============================================================================
// RUN
// ============================================================================

pub fn print_report<W: WriteColor>(out: &mut W, report: &RunReport) -> io::Result<()> {
    let mut pair: Option<(&str, &str, &str)> = None;
    for record in &report.records {
        let current = (
            record.implementation.as_str(),
            record.variant.as_str(),
            record.specification.as_str(),
        );
        if pair != Some(current) {
            out.set_color(ColorSpec::new().set_bold(true))?;
            writeln!(out, "{}/{} against {}", current.0, current.1, current.2)?;
            out.reset()?;
            pair = Some(current);
        }
        print_record(out, record)?;
    }
    writeln!(out)?;
    print_summary(out, &report.summary())
}

fn print_record<W: WriteColor>(out: &mut W, record: &TestRecord) -> io::Result<()> {
    let (tag, color) = match &record.outcome {
        Outcome::Judged { verdict, .. } if verdict.pass => ("PASS", Color::Green),
        Outcome::Judged { .. } => ("FAIL", Color::Red),
        Outcome::Skipped { .. } => ("SKIP", Color::Yellow),
        Outcome::Captured { .. } => ("CAPT", Color::Cyan),
    };
    write!(out, "  ")?;
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{tag}")?;
    out.reset()?;
    write!(out, " {}", record.uid)?;
    if !record.display_name.is_empty() {
        write!(out, " ({})", record.display_name)?;
    }
    writeln!(out)?;

    match &record.outcome {
        Outcome::Skipped { reason } => writeln!(out, "      reason: {reason}")?,
        Outcome::Captured { output } => {
            writeln!(out, "      exit code: {}", output.exit_code)?;
            for line in output.stdout.lines() {
                writeln!(out, "      | {line}")?;
            }
        }
        Outcome::Judged { verdict, .. } if !verdict.pass => {
            if let Some(message) = verdict.message() {
                writeln!(out, "      {message}")?;
            }
            if let Some((expected, actual)) = verdict.comparison() {
                print_diff(out, expected, actual)?;
            }
        }
        Outcome::Judged { .. } => {}
    }
    Ok(())
}

pub fn print_summary<W: WriteColor>(out: &mut W, summary: &Summary) -> io::Result<()> {
    writeln!(
        out,
        "Results: {} Passed, {} Failed, {} Skipped, {} Captured",
        summary.passed, summary.failed, summary.skipped, summary.captured
    )
}

/// Line diff of an expected value against what the program produced.
pub fn print_diff<W: WriteColor>(out: &mut W, expected: &str, actual: &str) -> io::Result<()> {
    let changeset = Changeset::new(expected, actual, "\n");
    for diff in &changeset.diffs {
        let (sign, color, text) = match diff {
            Difference::Same(x) => (' ', None, x),
            Difference::Add(x) => ('+', Some(Color::Green), x),
            Difference::Rem(x) => ('-', Some(Color::Red), x),
        };
        out.set_color(ColorSpec::new().set_fg(color))?;
        for line in text.split('\n') {
            writeln!(out, "      {sign}{line}")?;
        }
    }
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use termcolor::NoColor;

    use crate::assertion::Verdict;
    use crate::executor::runner::ProcessOutput;

    fn render(f: impl FnOnce(&mut NoColor<Vec<u8>>) -> io::Result<()>) -> String {
        let mut out = NoColor::new(Vec::new());
        f(&mut out).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn diff_marks_changed_lines() {
        let text = render(|out| print_diff(out, "a\nb", "a\nc"));
        assert_eq!(text, "       a\n      -b\n      +c\n");
    }

    #[test]
    fn failed_verdict_shows_message_and_diff() {
        let detail: Map<String, serde_json::Value> =
            serde_json::from_value(json!({"message": "output differs", "expected": "3", "actual": "4"}))
                .unwrap();
        let report = RunReport {
            records: vec![TestRecord {
                implementation: "chibi".into(),
                variant: "default".into(),
                specification: "r7rs".into(),
                uid: "/math/tests/0".into(),
                display_name: "Addition".into(),
                outcome: Outcome::Judged {
                    verdict: Verdict { pass: false, detail },
                    output: ProcessOutput::default(),
                },
            }],
        };
        let text = render(|out| print_report(out, &report));
        assert_eq!(
            text,
            "chibi/default against r7rs\n  FAIL /math/tests/0 (Addition)\n      output differs\n      -3\n      +4\n\nResults: 0 Passed, 1 Failed, 0 Skipped, 0 Captured\n"
        );
    }
}
