// Tests that timing profilers emit the expected reports.

use std::{ffi::OsStr, fs, hint::black_box};

use stint::{Config, Profiler, Subject, Target};

/// Parses the seconds out of a `Metric │ <secs> seconds` table row.
fn metric(report: &str, name: &str) -> f64 {
    let row = report
        .lines()
        .find(|line| line.contains(name))
        .unwrap_or_else(|| panic!("{name}: {report}"));
    let value = row.split('│').nth(2).unwrap().trim();
    value.split_whitespace().next().unwrap().parse().unwrap()
}

#[test]
fn single_run_to_stream() {
    let mut out = Vec::new();

    let sum =
        Profiler::time().out(&mut out).run(|| (0..1000u64).map(black_box).sum::<u64>()).unwrap();
    assert_eq!(sum, 499500);

    let out = String::from_utf8(out).unwrap();
    let secs = out
        .strip_prefix("Elapsed time: ")
        .and_then(|rest| rest.strip_suffix(" seconds\n"))
        .unwrap_or_else(|| panic!("unexpected output: {out:?}"));

    let secs: f64 = secs.parse().unwrap();
    assert!(secs >= 0.0);
}

#[test]
fn repeated_runs() {
    let mut out = Vec::new();
    let mut calls = 0;

    Profiler::time()
        .repeat(5)
        .subject(Subject::new("spin").arg("n", 100))
        .out(&mut out)
        .run(|| {
            calls += 1;
            (0..100u32).map(black_box).max()
        })
        .unwrap();

    assert_eq!(calls, 5);

    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("Timing report for function spin(n=100)\n"), "{out}");
    assert!(out.contains(" over 5 runs "), "{out}");

    let min = metric(&out, "Minimum time");
    let max = metric(&out, "Maximum time");
    let median = metric(&out, "Median time");
    assert!(min <= median && median <= max, "{out}");
}

#[test]
fn csv_rows_per_trial() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("trials.csv");

    Profiler::time()
        .repeat(4)
        .subject(Subject::new("noop"))
        .out(path.clone())
        .run(|| ())
        .unwrap();

    let csv = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "run,execution_time_seconds,function_name,arguments");

    for (i, line) in lines[1..].iter().enumerate() {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], (i + 1).to_string());
        assert!(fields[1].parse::<f64>().unwrap() >= 0.0);
        assert_eq!(fields[2], "noop");
        assert_eq!(fields[3], "");
    }
}

#[test]
fn csv_extension_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("TRIALS.CSV");

    Profiler::time().out(path.as_path()).run(|| ()).unwrap();

    let csv = fs::read_to_string(&path).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.starts_with("run,execution_time_seconds,"));
}

#[test]
fn text_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");

    Profiler::time().repeat(2).out(path.clone()).run(|| ()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Timing report\n╭"), "{text}");
}

#[test]
fn scope() {
    let mut out = Vec::new();

    {
        let _scope = Profiler::time().out(&mut out).start();
        black_box((0..100).sum::<i32>());
    }

    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("Elapsed time: ") && out.ends_with(" seconds\n"), "{out}");
}

#[test]
fn config_from_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("config.csv");

    let args: [&OsStr; 5] =
        ["demo".as_ref(), "--repeat".as_ref(), "3".as_ref(), "--out".as_ref(), path.as_os_str()];
    let config = Config::try_parse_from(args).unwrap();

    Profiler::time().config(&config).run(|| ()).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 4);
}

#[test]
fn zero_repeat() {
    let result = Profiler::time().repeat(0).out(Target::Discard).run(|| ());
    assert!(matches!(result, Err(stint::Error::InvalidRepeat)));
}
