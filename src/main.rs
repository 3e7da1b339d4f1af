//! EnvProvision CLI Entry Point
//!
//! # Usage
//!
//! ```bash
//! # Provision from provision.yaml in the current directory
//! envprovision
//!
//! # Name the environment and spec file on the command line
//! envprovision environment.yml --name analytics
//!
//! # Behind a proxy, stopping at the first failure
//! envprovision --name analytics --https-proxy http://proxy:8080 --on-error abort
//!
//! # Preview the manager commands
//! envprovision --name analytics --dry-run
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use log::{error, info, warn};

use envprovision::config::{load_or_default, validate_config, ConfigOverrides, ProvisionConfig};
use envprovision::console::{pause, print_banner};
use envprovision::environment::{resolve_tool, ToolLocation};
use envprovision::execution::{CommandRunner, DryRunRunner, ProvisionRun, Provisioner, SystemRunner};
use envprovision::report::RunReport;
use envprovision::{APP_NAME, VERSION};

/// Exit code when a step failed.
const EXIT_STEP_FAILED: u8 = 1;

/// Exit code for usage and configuration errors.
const EXIT_USAGE: u8 = 2;

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    report_path: Option<PathBuf>,
    verbose: bool,
    quiet: bool,
    overrides: ConfigOverrides,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: envprovision [OPTIONS] [SPEC_FILE]");
    println!();
    println!("Arguments:");
    println!("  [SPEC_FILE]            Environment spec file (default: environment.yml)");
    println!();
    println!("Options:");
    println!("  --config PATH          Settings file (default: ./provision.yaml if present)");
    println!("  -n, --name NAME        Environment to create/update and activate");
    println!("  --tool TOOL            conda, mamba or micromamba (default: conda)");
    println!("  --tool-path PATH       Use this manager binary instead of searching");
    println!("  --shell SHELL          cmd.exe, powershell, bash, zsh, fish or posix");
    println!("  --http-proxy URL       HTTP_PROXY for the manager");
    println!("  --https-proxy URL      HTTPS_PROXY for the manager");
    println!("  --ca-bundle PATH       REQUESTS_CA_BUNDLE for the manager");
    println!("  --on-error POLICY      continue (default) or abort");
    println!("  --working-dir PATH     Directory the manager runs in");
    println!("  --report PATH          Write a JSON run report");
    println!("  --no-clean             Skip clearing the package cache");
    println!("  --no-verify            Skip confirming the environment is registered");
    println!("  --prune                Remove packages no longer in the spec file");
    println!("  --no-pause             Exit without waiting for a key press");
    println!("  --dry-run              Print manager commands without running them");
    println!("  -q, --quiet            Do not echo manager output");
    println!("  -v, --verbose          Enable debug logging");
    println!("  -h, --help             Show this help message");
    println!("  -V, --version          Show version information");
    println!();
    println!("Examples:");
    println!("  envprovision --name analytics");
    println!("  envprovision envs/analytics.yml --name analytics --on-error abort");
}

/// Parses command-line arguments into a CliArgs struct.
fn parse_arguments(args: &[String]) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    let value = |i: &mut usize, flag: &str| -> Result<String, String> {
        *i += 1;
        args.get(*i)
            .cloned()
            .ok_or_else(|| format!("{} requires a value", flag))
    };

    while i < args.len() {
        let arg = args[i].as_str();

        match arg {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--config" => cli.config_path = Some(value(&mut i, arg)?.into()),
            "--working-dir" => cli.working_dir = Some(value(&mut i, arg)?.into()),
            "--report" => cli.report_path = Some(value(&mut i, arg)?.into()),
            "--name" | "-n" => cli.overrides.environment = Some(value(&mut i, arg)?),
            "--tool" => {
                cli.overrides.tool = Some(value(&mut i, arg)?.parse().map_err(|e| format!("{}", e))?)
            }
            "--tool-path" => cli.overrides.tool_path = Some(value(&mut i, arg)?.into()),
            "--shell" => {
                cli.overrides.shell = Some(value(&mut i, arg)?.parse().map_err(|e| format!("{}", e))?)
            }
            "--http-proxy" => cli.overrides.http_proxy = Some(value(&mut i, arg)?),
            "--https-proxy" => cli.overrides.https_proxy = Some(value(&mut i, arg)?),
            "--ca-bundle" => cli.overrides.ca_bundle = Some(value(&mut i, arg)?.into()),
            "--on-error" => {
                cli.overrides.on_error =
                    Some(value(&mut i, arg)?.parse().map_err(|e| format!("{}", e))?)
            }
            "--no-clean" => cli.overrides.no_clean = true,
            "--no-verify" => cli.overrides.no_verify = true,
            "--no-pause" => cli.overrides.no_pause = true,
            "--prune" => cli.overrides.prune = true,
            "--dry-run" => cli.overrides.dry_run = true,
            "--quiet" | "-q" => cli.quiet = true,
            "--verbose" | "-v" => cli.verbose = true,
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => cli.overrides.spec_file = Some(PathBuf::from(arg)),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(cli)
}

/// Validates the working directory, defaulting to the current one.
fn setup_working_directory(working_dir: Option<PathBuf>) -> Result<PathBuf, String> {
    let dir = match working_dir {
        Some(dir) => dir,
        None => env::current_dir().map_err(|e| format!("Cannot read current directory: {}", e))?,
    };

    if !dir.exists() {
        return Err(format!("Working directory does not exist: {}", dir.display()));
    }
    if !dir.is_dir() {
        return Err(format!("Path is not a directory: {}", dir.display()));
    }

    info!("Working directory: {}", dir.display());
    Ok(dir)
}

/// Loads the settings file, applies command-line overrides and validates.
fn build_config(cli: &CliArgs, work_dir: &Path) -> Result<ProvisionConfig, String> {
    let config = load_or_default(cli.config_path.as_deref(), work_dir).map_err(|e| e.to_string())?;
    let config = cli.overrides.clone().apply(config);
    validate_config(&config).map_err(|e| e.to_string())?;
    Ok(config)
}

fn provision<R: CommandRunner>(
    config: ProvisionConfig,
    tool: ToolLocation,
    runner: R,
    work_dir: &Path,
    echo_output: bool,
) -> ProvisionRun {
    let mut provisioner = Provisioner::new(config, tool, runner);
    provisioner.set_working_dir(work_dir);
    provisioner.set_echo_output(echo_output);
    provisioner.run()
}

/// Main application flow; returns the process exit code.
fn run(cli: CliArgs) -> u8 {
    print_banner();

    let work_dir = match setup_working_directory(cli.working_dir.clone()) {
        Ok(dir) => dir,
        Err(e) => {
            error!("{}", e);
            return EXIT_USAGE;
        }
    };

    let config = match build_config(&cli, &work_dir) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            if let Err(e) = pause(!cli.overrides.no_pause) {
                warn!("Pause failed: {}", e);
            }
            return EXIT_USAGE;
        }
    };

    if config.dry_run {
        info!("Mode: DRY RUN (commands will not execute)");
    }

    let tool = resolve_tool(config.tool, config.tool_path.as_deref());
    let started_at = Utc::now();
    let echo_output = !cli.quiet;

    let run = if config.dry_run {
        provision(config.clone(), tool.clone(), DryRunRunner::new(), &work_dir, false)
    } else {
        provision(config.clone(), tool.clone(), SystemRunner, &work_dir, echo_output)
    };

    let report = RunReport::new(&config, &tool, &run, started_at);
    println!("{}", report.render_table());
    if cli.verbose {
        println!("{}", run.timeline.gantt_chart());
    }

    let mut code = if run.succeeded() { 0 } else { EXIT_STEP_FAILED };

    if let Some(path) = &cli.report_path {
        let path = if path.is_relative() { work_dir.join(path) } else { path.clone() };
        if let Err(e) = report.save(&path) {
            error!("{}", e);
            code = code.max(EXIT_STEP_FAILED);
        }
    }

    if let Err(e) = pause(config.pause) {
        warn!("Pause failed: {}", e);
    }

    code
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let cli = match parse_arguments(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    setup_logging(cli.verbose);

    ExitCode::from(run(cli))
}
