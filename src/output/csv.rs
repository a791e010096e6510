//! CSV output.

use std::io::{self, Write};

use crate::report::{Body, LineRecord, Measure, Report};

const TIME_TRIALS_HEADER: &str = "run,execution_time_seconds,function_name,arguments";
const MEMORY_TRIALS_HEADER: &str = "run,memory_bytes,memory_mb,function_name,arguments";
const TIME_LINES_HEADER: &str =
    "filename,line_number,code,total_time_seconds,avg_time_seconds,execution_count";
const MEMORY_LINES_HEADER: &str =
    "filename,line_number,code,total_memory_bytes,avg_memory_bytes,execution_count";

/// Writes `report` as CSV: one row per trial, or one row per traced line.
pub(crate) fn write(report: &Report, w: &mut dyn Write) -> io::Result<()> {
    match &report.body {
        Body::Single(_) | Body::Statistical { .. } => write_trials(report, w),
        Body::PerLine { lines, .. } => write_lines(report.measure, lines, w),
    }
}

fn write_trials(report: &Report, w: &mut dyn Write) -> io::Result<()> {
    let (name, arguments) = match &report.subject {
        Some(subject) => (escape_csv(subject.name()), escape_csv(&subject.arguments_text())),
        None => (String::new(), String::new()),
    };

    match report.measure {
        Measure::Time => {
            writeln!(w, "{TIME_TRIALS_HEADER}")?;
            for (i, value) in report.trial_values().iter().enumerate() {
                writeln!(w, "{},{},{},{}", i + 1, value, name, arguments)?;
            }
        }
        Measure::Memory => {
            writeln!(w, "{MEMORY_TRIALS_HEADER}")?;
            for (i, value) in report.trial_values().iter().enumerate() {
                let mb = value / (1024.0 * 1024.0);
                writeln!(w, "{},{},{},{},{}", i + 1, value, mb, name, arguments)?;
            }
        }
    }

    Ok(())
}

fn write_lines(measure: Measure, lines: &[LineRecord], w: &mut dyn Write) -> io::Result<()> {
    let header = match measure {
        Measure::Time => TIME_LINES_HEADER,
        Measure::Memory => MEMORY_LINES_HEADER,
    };
    writeln!(w, "{header}")?;

    for r in lines {
        writeln!(
            w,
            "{},{},{},{},{},{}",
            escape_csv(&r.file),
            r.line,
            escape_csv(r.code()),
            r.total,
            r.avg,
            r.count,
        )?;
    }

    Ok(())
}

/// Quotes a field if it contains a comma, quote or newline.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
