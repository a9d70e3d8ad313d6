// Adversarial scheduling simulator binary.
//
// Parses the command line, loads the JSON configuration, runs the simulation,
// and exits non-zero with a diagnostic on any error. A dry run walks the
// workload once under FCFS with the default inter-arrival time so that
// trace-driven generators can be calibrated for the real pass.

use advsched::config::SimulationConfig;
use advsched::error::SimError;
use advsched::simulator::Simulator;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line options parsed from program arguments.
struct CliOptions {
    /// Path to the configuration file (required).
    config: PathBuf,
    /// Optional path for the output packet log.
    packets: Option<PathBuf>,
    /// Perform a calibration dry run (forces FCFS).
    dry_run: bool,
}

fn print_usage() {
    println!("Adversarial scheduling simulator:");
    println!("  --config <path>   [Required] Path to a configuration (.json) file");
    println!("  --packets <path>  [Optional] Path to an output packets file");
    println!("  --dry             [Optional] Perform a dry run (using FCFS)");
    println!("  --help            Prints this message");
}

/// Parse command-line arguments, accepting both `--key value` and
/// `--key=value` forms. Returns `None` when `--help` was requested.
fn parse_cli_options() -> Result<Option<CliOptions>, String> {
    let mut config = None;
    let mut packets = None;
    let mut dry_run = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let (key, inline_value) = match arg.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut take_value = |name: &str| {
            inline_value
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("option '{name}' requires a value"))
        };
        match key.as_str() {
            "--config" => config = Some(PathBuf::from(take_value("--config")?)),
            "--packets" => packets = Some(PathBuf::from(take_value("--packets")?)),
            "--dry" => dry_run = true,
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("unknown option '{other}'")),
        }
    }
    let config = config.ok_or_else(|| "the '--config' option is required".to_string())?;
    Ok(Some(CliOptions {
        config,
        packets,
        dry_run,
    }))
}

fn run(options: &CliOptions) -> Result<(), SimError> {
    let config = SimulationConfig::from_file(&options.config)?;
    let mut simulator = Simulator::new(options.dry_run, &config)?;
    simulator.run(true, options.packets.as_deref())?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let options = match parse_cli_options() {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("Error: {message}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = run(&options) {
        eprintln!("Error: {error}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
