// Trace-driven TCP reassembly through the full simulator.

use advsched::config::SimulationConfig;
use advsched::simulator::Simulator;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn named(suffix: &str) -> TempFile {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let path = std::env::temp_dir().join(format!(
            "advsched_reasm_{}_{}_{suffix}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        TempFile { path }
    }

    fn with_lines(lines: &[&str]) -> TempFile {
        let file = TempFile::named("trace.csv");
        let mut out = std::fs::File::create(&file.path).unwrap();
        for line in lines {
            writeln!(out, "{line}").unwrap();
        }
        file
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Parse `(arrive, depart, estimate, actual)` tuples from a packet log.
fn read_packet_log(path: &Path) -> Vec<(f64, f64, f64, f64)> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| {
            let fields: Vec<&str> = line.split(';').collect();
            (
                fields[0].parse().unwrap(),
                fields[1].parse().unwrap(),
                fields[5].parse().unwrap(),
                fields[6].parse().unwrap(),
            )
        })
        .collect()
}

/// One TCP flow: SYN, an out-of-order segment, the gap-filling segment, FIN.
/// Flags encode `(syn << 2) | (fin << 1) | rst`.
fn ooo_trace() -> TempFile {
    TempFile::with_lines(&[
        "64,0a000001,0a000002,1f90,0050,1,4,100,101",
        "64,0a000001,0a000002,1f90,0050,1,0,201,301",
        "64,0a000001,0a000002,1f90,0050,1,0,101,201",
        "64,0a000001,0a000002,1f90,0050,1,2,301,301",
    ])
}

fn config_json(trace: &Path, heuristic: bool) -> String {
    format!(
        r#"{{
            "policy": "fcfs",
            "application": {{
                "type": "tcp_reassembly",
                "heuristic": {heuristic},
                "stsf": 1.0,
                "max_attack_job_size_ns": 10000.0
            }},
            "innocent_traffic": {{
                "type": "trace",
                "trace_fp": "{}",
                "rate_bps": 5.12e8,
                "average_packet_size_bits": 512.0
            }}
        }}"#,
        trace.display()
    )
}

#[test]
fn oracle_mode_estimates_equal_actuals() {
    let trace = ooo_trace();
    let config = SimulationConfig::from_json(&config_json(trace.path(), false)).unwrap();
    let log = TempFile::named("packets.log");

    let mut sim = Simulator::new(false, &config).unwrap();
    let report = sim.run(false, Some(log.path())).unwrap();

    // Only the two out-of-order data segments become jobs; SYN and FIN are
    // discarded before queueing.
    assert_eq!(report.num_innocent_arrivals, 2);
    assert_eq!(report.num_arrivals, 2);

    let packets = read_packet_log(log.path());
    assert_eq!(packets.len(), 2);

    // First segment: tail insert into an empty list, base cost. The SYN was
    // free, so the segment shares its timestamp (t = 0).
    let (arrive, depart, est, actual) = packets[0];
    assert_eq!(arrive, 0.0);
    assert_eq!(est, 116.0);
    assert_eq!(actual, 116.0);
    assert_eq!(depart, 116.0);

    // Second segment: head insert, then the drain releases two intervals.
    let (arrive, depart, est, actual) = packets[1];
    assert_eq!(arrive, 1000.0);
    assert_eq!(est, 124.0);
    assert_eq!(actual, 124.0);
    assert_eq!(depart, 1124.0);
}

#[test]
fn heuristic_mode_estimates_can_lag_actuals() {
    let trace = ooo_trace();
    let config = SimulationConfig::from_json(&config_json(trace.path(), true)).unwrap();
    let log = TempFile::named("packets.log");

    let mut sim = Simulator::new(false, &config).unwrap();
    let report = sim.run(false, Some(log.path())).unwrap();
    assert_eq!(report.num_innocent_arrivals, 2);

    let packets = read_packet_log(log.path());
    // The gap-filling segment was estimated against a one-interval list
    // (116 + 4) but its real insertion drained two intervals (116 + 8).
    let (_, _, est, actual) = packets[1];
    assert_eq!(est, 120.0);
    assert_eq!(actual, 124.0);
}

#[test]
fn stsf_scales_reassembly_costs_end_to_end() {
    let trace = ooo_trace();
    let config_text =
        config_json(trace.path(), false).replace("\"stsf\": 1.0", "\"stsf\": 2.0");
    let config = SimulationConfig::from_json(&config_text).unwrap();
    let log = TempFile::named("packets.log");

    let mut sim = Simulator::new(false, &config).unwrap();
    sim.run(false, Some(log.path())).unwrap();

    let packets = read_packet_log(log.path());
    assert_eq!(packets[0].3, 232.0); // 2 * 116
    assert_eq!(packets[1].3, 248.0); // 2 * 124
}

#[test]
fn in_order_trace_produces_no_jobs_and_fails_fast() {
    // A purely in-order flow yields nothing but invalid job sizes, so the
    // simulation finishes with zero innocent arrivals and reports an error
    // instead of dividing by zero.
    let trace = TempFile::with_lines(&[
        "64,0a000001,0a000002,1f90,0050,1,4,100,101",
        "64,0a000001,0a000002,1f90,0050,1,0,101,201",
        "64,0a000001,0a000002,1f90,0050,1,0,201,301",
    ]);
    let config = SimulationConfig::from_json(&config_json(trace.path(), false)).unwrap();
    let mut sim = Simulator::new(false, &config).unwrap();
    assert!(sim.run(false, None).is_err());
}
