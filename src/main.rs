/*!
 * nodeinfra CLI
 *
 * Loads a test ini file and works against the servers it describes.
 */

use clap::{Parser, Subcommand, ValueEnum};
use nodeinfra::{
    config::{HarnessConfig, LogLevel},
    error::{NodeInfraError, Result, EXIT_SUCCESS},
    logging, new_factory, remote::fan_out, RemoteHelperFactory, TestInputParser,
    TestInputServer,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "nodeinfra")]
#[command(version, about = "Test input loader and remote helper dispatch for cluster test runs", long_about = None)]
struct Cli {
    /// Test ini file
    #[arg(short = 'i', long = "ini", value_name = "FILE")]
    ini: PathBuf,

    /// Test parameters: key=value,key2=value2
    #[arg(short = 'p', long = "params", value_name = "PARAMS")]
    params: Option<String>,

    /// Harness configuration file (TOML)
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// SSH connect timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    timeout: Option<u64>,

    /// Log level
    #[arg(long = "log-level", value_enum)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long = "log-file", value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the parsed test input as JSON
    Show,

    /// Detect the operating system of every server
    Probe,

    /// Run a shell command on every server
    Exec {
        /// Command to run
        #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = harness_config(&cli)?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let input = TestInputParser::get_test_input(&cli.ini, cli.params.as_deref())?;
    info!(
        "Loaded {} servers from {}",
        input.servers.len(),
        cli.ini.display()
    );

    match cli.command {
        Commands::Show => {
            println!("{}", serde_json::to_string_pretty(&input)?);
            Ok(())
        }
        Commands::Probe => {
            let factory = new_factory(&config);
            let result = probe_all(&factory, &input.servers, &config);
            factory.shutdown();
            result
        }
        Commands::Exec { command } => {
            let factory = new_factory(&config);
            let result = exec_all(&factory, &input.servers, &config, &command.join(" "));
            factory.shutdown();
            result
        }
    }
}

/// File settings with command-line flags layered on top
fn harness_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };

    if let Some(timeout) = cli.timeout {
        config.connect_timeout_secs = timeout;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }
    config.verbose |= cli.verbose;

    config.validate()?;
    Ok(config)
}

fn probe_all(
    factory: &RemoteHelperFactory,
    servers: &[TestInputServer],
    config: &HarnessConfig,
) -> Result<()> {
    let results = fan_out(servers, config.workers_for(servers.len()), |server| {
        factory.fetch(&server.target())
    })?;

    let mut failed = 0;
    for (server, result) in servers.iter().zip(results) {
        match result {
            Ok(helper) => println!("{} {}", server.ip, helper.variant()),
            Err(e) => {
                failed += 1;
                error!("Probe of {} failed: {}", server.ip, e);
                println!("{} error: {}", server.ip, e);
            }
        }
    }
    finish(failed, servers.len())
}

fn exec_all(
    factory: &RemoteHelperFactory,
    servers: &[TestInputServer],
    config: &HarnessConfig,
    command: &str,
) -> Result<()> {
    let results = fan_out(servers, config.workers_for(servers.len()), |server| {
        factory
            .fetch(&server.target())
            .and_then(|helper| helper.run(command))
    })?;

    let mut failed = 0;
    for (server, result) in servers.iter().zip(results) {
        match result {
            Ok(output) => {
                println!("== {} (exit {}) ==", server.ip, output.exit_status);
                print!("{}", output.stdout);
                if !output.stderr.is_empty() {
                    eprint!("{}", output.stderr);
                }
                if !output.success() {
                    failed += 1;
                }
            }
            Err(e) => {
                failed += 1;
                println!("== {} (error) ==", server.ip);
                error!("Command on {} failed: {}", server.ip, e);
            }
        }
    }
    finish(failed, servers.len())
}

fn finish(failed: usize, total: usize) -> Result<()> {
    if failed == 0 {
        Ok(())
    } else {
        Err(NodeInfraError::PartialFailure { failed, total })
    }
}
