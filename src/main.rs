use anyhow::Result;
use clap::{Parser, Subcommand};
use depdoctor::{
    cache::Cache,
    config::Config,
    logging,
    model::{ScanOutcome, ScanResult},
    output::{print_json, print_result, OutputFormat},
    server::{self, AppState, StatusResponse},
    Doctor, ScanOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const VULNS_FOUND: u8 = 2;
}

#[derive(Parser)]
#[command(name = "depdoctor")]
#[command(
    author,
    version,
    about = "Check a Python project's dependencies for updates and vulnerabilities"
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RepoArgs {
    /// GitHub repository URL (e.g. https://github.com/psf/black)
    #[arg(short, long)]
    url: String,

    /// Branch to read manifests from
    #[arg(short, long)]
    branch: Option<String>,

    /// Output format (table, json)
    #[arg(short, long)]
    format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version and environment
    Status {
        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// List the direct dependencies of a repository
    Deps {
        #[command(flatten)]
        repo: RepoArgs,
    },

    /// Check direct dependencies for newer releases
    CheckUpdates {
        #[command(flatten)]
        repo: RepoArgs,
    },

    /// Scan direct dependencies for known vulnerabilities
    SecurityScan {
        #[command(flatten)]
        repo: RepoArgs,

        /// Exit with code 2 if vulnerabilities are found
        #[arg(long)]
        fail_on_vulns: bool,
    },

    /// Run update and vulnerability checks together
    Scan {
        #[command(flatten)]
        repo: RepoArgs,

        /// Exit with code 2 if vulnerabilities are found
        #[arg(long)]
        fail_on_vulns: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear the registry cache
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Serve { .. }) {
        logging::init_server(cli.verbose);
    } else {
        logging::init(cli.verbose);
    }

    // `config` and `clear-cache` must keep working with a broken config file.
    let config = Config::load();

    match cli.command {
        Commands::Status { format } => {
            let config = config?;
            let status = StatusResponse::new(config.environment.clone());
            match parse_format(format, &config)? {
                OutputFormat::Json => print_json(&status)?,
                OutputFormat::Table => {
                    println!("depdoctor {}", status.version);
                    println!("Built with rustc {}", status.runtime_version);
                    println!("Environment: {}", status.environment);
                }
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Deps { repo } => {
            let options = ScanOptions {
                check_updates: false,
                security_scan: false,
            };
            run_scan(&config?, repo, options).await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::CheckUpdates { repo } => {
            let options = ScanOptions {
                check_updates: true,
                security_scan: false,
            };
            run_scan(&config?, repo, options).await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::SecurityScan {
            repo,
            fail_on_vulns,
        } => {
            let options = ScanOptions {
                check_updates: false,
                security_scan: true,
            };
            let result = run_scan(&config?, repo, options).await?;
            Ok(determine_exit_code(&result, fail_on_vulns))
        }
        Commands::Scan {
            repo,
            fail_on_vulns,
        } => {
            let result = run_scan(&config?, repo, ScanOptions::default()).await?;
            Ok(determine_exit_code(&result, fail_on_vulns))
        }
        Commands::Serve { bind } => {
            let config = config?;
            let doctor = Doctor::from_config(&config)?;
            server::serve(bind, AppState::new(doctor, config.environment.clone())).await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            let cache = Cache::new();
            cache.clear()?;
            println!("Cache cleared: {}", cache.dir().display());
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_scan(config: &Config, repo: RepoArgs, options: ScanOptions) -> Result<ScanResult> {
    let format = parse_format(repo.format, config)?;
    let is_interactive = format == OutputFormat::Table;
    let doctor = Doctor::from_config(config)?;

    let message = match (options.check_updates, options.security_scan) {
        (false, false) => "Reading dependency manifests...",
        (true, false) => "Checking for updates...",
        (false, true) => "Scanning for vulnerabilities...",
        (true, true) => "Checking for updates and vulnerabilities...",
    };
    let progress = spinner(is_interactive, message);
    let result = doctor.scan(&repo.url, repo.branch.as_deref(), options).await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let result = result?;
    print_result(&result, format)?;
    Ok(result)
}

fn spinner(is_interactive: bool, message: &'static str) -> Option<ProgressBar> {
    if !is_interactive {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Some(pb)
}

fn parse_format(format: Option<String>, config: &Config) -> Result<OutputFormat> {
    let format = format.unwrap_or_else(|| config.default_format.clone());
    OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))
}

/// A failed scan counts as an error; findings only matter with `--fail-on-vulns`.
fn determine_exit_code(result: &ScanResult, fail_on_vulns: bool) -> u8 {
    if !fail_on_vulns {
        return exit_codes::SUCCESS;
    }
    match result.security.as_ref().map(|s| &s.outcome) {
        Some(ScanOutcome::Failed { .. }) => exit_codes::ERROR,
        _ if result.has_vulnerabilities() => exit_codes::VULNS_FOUND,
        _ => exit_codes::SUCCESS,
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'depdoctor config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
