//! Box-drawn tables.

use std::{
    io::{self, Write},
    iter::repeat,
};

use crate::{
    report::{Body, LineRecord, Measure, Report},
    stats::Stats,
    util::format_bytes,
};

/// Writes `report` as human-readable text.
pub(crate) fn write(report: &Report, w: &mut dyn Write) -> io::Result<()> {
    match &report.body {
        Body::Single(value) => match report.measure {
            Measure::Time => writeln!(w, "Elapsed time: {value:.6} seconds"),
            Measure::Memory => writeln!(w, "Total Memory Used: {}", format_bytes(*value)),
        },
        Body::Statistical { stats, .. } => {
            writeln!(w, "{}", report.title())?;
            stats_table(report.measure, stats).write(w)
        }
        Body::PerLine { lines, .. } => {
            writeln!(w, "{}", report.title())?;
            lines_table(report.measure, lines).write(w)
        }
    }
}

fn stats_table(measure: Measure, stats: &Stats) -> Table<2> {
    let mut table = Table::new(["Metric", "Value"], [Align::Left, Align::Left]);

    match measure {
        Measure::Time => {
            let secs = |value: f64| format!("{value:.6} seconds");

            table.row([
                "Total elapsed time".into(),
                format!("{:.6} seconds over {} runs", stats.total, stats.count),
            ]);
            table.row(["Average time per run".into(), secs(stats.mean)]);
            table.row(["Standard deviation".into(), secs(stats.stdev)]);
            table.row(["Median time".into(), secs(stats.median)]);
            table.row(["Interquartile range (IQR)".into(), secs(stats.iqr)]);
            table.row(["Minimum time".into(), secs(stats.min)]);
            table.row(["Maximum time".into(), secs(stats.max)]);
        }
        Measure::Memory => {
            table.row([
                "Total memory used".into(),
                format!("{} over {} runs", format_bytes(stats.total), stats.count),
            ]);
            table.row(["Average memory per run".into(), format_bytes(stats.mean)]);
            table.row(["Standard deviation".into(), format_bytes(stats.stdev)]);
            table.row(["Median memory".into(), format_bytes(stats.median)]);
            table.row(["Interquartile range (IQR)".into(), format_bytes(stats.iqr)]);
            table.row(["Minimum memory".into(), format_bytes(stats.min)]);
            table.row(["Maximum memory".into(), format_bytes(stats.max)]);
        }
    }

    table
}

fn lines_table(measure: Measure, lines: &[LineRecord]) -> Table<5> {
    let (total, avg) = match measure {
        Measure::Time => ("Total Time(s)", "Avg Time(s)"),
        Measure::Memory => ("Total Memory", "Avg Memory"),
    };

    let mut table = Table::new(
        ["Line No.", "Code", total, avg, "Count"],
        [Align::Right, Align::Left, Align::Right, Align::Right, Align::Right],
    );

    for r in lines {
        let (total, avg) = match measure {
            Measure::Time => (format!("{:.6}", r.total), format!("{:.6}", r.avg)),
            Measure::Memory => (format_bytes(r.total), format_bytes(r.avg)),
        };

        table.row([r.line.to_string(), r.code().to_owned(), total, avg, r.count.to_string()]);
    }

    table
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Table<const N: usize> {
    headers: [&'static str; N],
    align: [Align; N],
    rows: Vec<[String; N]>,
}

impl<const N: usize> Table<N> {
    fn new(headers: [&'static str; N], align: [Align; N]) -> Self {
        Self { headers, align, rows: Vec::new() }
    }

    fn row(&mut self, cells: [String; N]) {
        self.rows.push(cells);
    }

    fn column_widths(&self) -> [usize; N] {
        let mut widths = self.headers.map(|h| h.chars().count());

        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        widths
    }

    fn write(&self, w: &mut dyn Write) -> io::Result<()> {
        let widths = self.column_widths();
        let mut buf = String::new();

        rule(&mut buf, &widths, ['╭', '┬', '╮']);
        cells(&mut buf, &widths, &self.headers.map(|h| h), &[Align::Left; N]);
        rule(&mut buf, &widths, ['├', '┼', '┤']);
        for row in &self.rows {
            cells(&mut buf, &widths, &row.each_ref().map(String::as_str), &self.align);
        }
        rule(&mut buf, &widths, ['╰', '┴', '╯']);

        w.write_all(buf.as_bytes())
    }
}

/// Writes a horizontal border using `[left, middle, right]` joints.
fn rule(buf: &mut String, widths: &[usize], [left, middle, right]: [char; 3]) {
    buf.push(left);
    for (column, &width) in widths.iter().enumerate() {
        if column != 0 {
            buf.push(middle);
        }
        buf.extend(repeat('─').take(width + 2));
    }
    buf.push(right);
    buf.push('\n');
}

fn cells(buf: &mut String, widths: &[usize], values: &[&str], align: &[Align]) {
    buf.push('│');
    for ((value, &width), align) in values.iter().zip(widths).zip(align) {
        let pad = width.saturating_sub(value.chars().count());

        buf.push(' ');
        match align {
            Align::Left => {
                buf.push_str(value);
                buf.extend(repeat(' ').take(pad));
            }
            Align::Right => {
                buf.extend(repeat(' ').take(pad));
                buf.push_str(value);
            }
        }
        buf.push_str(" │");
    }
    buf.push('\n');
}
