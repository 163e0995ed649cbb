mod simulate;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use shiftline_core::RestaurantConfig;
use shiftline_engine::resolve;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Shiftline shift-operations toolchain.
#[derive(Parser)]
#[command(name = "shiftline", version, about = "Restaurant shift-operations toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a restaurant configuration file
    Validate {
        /// Path to the restaurant JSON configuration
        config: PathBuf,
    },

    /// Resolve the current and next service period
    Resolve {
        /// Path to the restaurant JSON configuration
        config: PathBuf,
        /// Instant to resolve at (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Replay a scripted business day through the engine
    Simulate {
        /// Path to the restaurant JSON configuration
        config: PathBuf,
        /// Path to the simulation script JSON
        script: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => {
            cmd_validate(&config, cli.output, cli.quiet);
        }
        Commands::Resolve { config, at } => {
            cmd_resolve(&config, at.as_deref(), cli.output, cli.quiet);
        }
        Commands::Simulate { config, script } => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    report_error(&format!("failed to create tokio runtime: {}", e), cli.output, cli.quiet);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(simulate::cmd_simulate(&config, &script, cli.output)) {
                report_error(&e, cli.output, cli.quiet);
                process::exit(1);
            }
        }
    }
}

pub(crate) fn load_config(path: &Path, output: OutputFormat, quiet: bool) -> RestaurantConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            report_error(
                &format!("error reading file '{}': {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    match RestaurantConfig::from_json_str(&text) {
        Ok(config) => config,
        Err(e) => {
            report_error(
                &format!("error parsing '{}': {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

fn cmd_validate(path: &Path, output: OutputFormat, quiet: bool) {
    let config = load_config(path, output, quiet);
    match config.validate() {
        Ok(()) => match output {
            OutputFormat::Json => {
                println!(r#"{{"valid": true, "errors": []}}"#);
            }
            OutputFormat::Text => {
                if !quiet {
                    println!(
                        "{}: {} periods, {} tasks, reset at {:02}:00 OK",
                        config.restaurant,
                        config.periods.periods().len(),
                        config.tasks.tasks().len(),
                        config.reset_hour,
                    );
                }
            }
        },
        Err(errors) => {
            match output {
                OutputFormat::Json => {
                    let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                    let body = serde_json::json!({"valid": false, "errors": msgs});
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&body)
                            .unwrap_or_else(|e| format!("serialization error: {}", e))
                    );
                }
                OutputFormat::Text => {
                    for error in &errors {
                        eprintln!("error: {}", error);
                    }
                    eprintln!("{} error(s) found", errors.len());
                }
            }
            process::exit(1);
        }
    }
}

fn cmd_resolve(path: &Path, at: Option<&str>, output: OutputFormat, quiet: bool) {
    let config = load_config(path, output, quiet);
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("error: {}", error);
        }
        process::exit(1);
    }

    let now = match at {
        Some(s) => match OffsetDateTime::parse(s, &Rfc3339) {
            Ok(t) => t.to_offset(config.utc_offset()),
            Err(e) => {
                report_error(&format!("invalid --at instant '{}': {}", s, e), output, quiet);
                process::exit(1);
            }
        },
        None => OffsetDateTime::now_utc().to_offset(config.utc_offset()),
    };

    let resolution = resolve(&config.periods, config.reset_hour, now);
    match output {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "current": resolution.current,
                "next": resolution.next,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&body)
                    .unwrap_or_else(|e| format!("serialization error: {}", e))
            );
        }
        OutputFormat::Text => {
            match &resolution.current {
                Some(p) => println!("current: {} ({})", p.name, p.id),
                None => println!("current: none"),
            }
            match &resolution.next {
                Some(p) => println!("next:    {} ({})", p.name, p.id),
                None => println!("next:    none"),
            }
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let body = serde_json::json!({"error": msg});
            eprintln!(
                "{}",
                serde_json::to_string(&body).unwrap_or_else(|_| format!("{{\"error\": {:?}}}", msg))
            );
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", msg);
            }
        }
    }
}
