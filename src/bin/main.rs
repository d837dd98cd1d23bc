use clap::{Parser, Subcommand};
use parse_overlay::config::{self, defaults};
use parse_overlay::replay;
use std::path::PathBuf;

/// Visibility-gated parse overlay for OCR'd manga reader pages
#[derive(Parser)]
#[command(name = "parse-overlay")]
#[command(version)]
#[command(about = "Visibility-gated parse overlay for OCR'd manga reader pages")]
struct Cli {
    /// Settings file (default: the user config, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded page session and print the final region states as JSON
    Replay {
        /// Trace file in JSON format
        trace: PathBuf,
    },
    /// Manage the settings file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the default settings as TOML
    Init,
    /// Print where the user settings file is looked up
    Path,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { trace } => {
            let settings = match config::resolve_settings(cli.config.as_deref()) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let trace = match std::fs::read_to_string(&trace)
                .map_err(Into::into)
                .and_then(|contents| replay::parse_trace(&contents))
            {
                Ok(trace) => trace,
                Err(e) => {
                    eprintln!("Error: cannot load {}: {}", trace.display(), e);
                    std::process::exit(1);
                }
            };

            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("Error: cannot start runtime: {}", e);
                    std::process::exit(1);
                }
            };
            let report = runtime.block_on(replay::replay(&trace, &settings));

            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
            if !report.started {
                std::process::exit(2);
            }
        }
        Commands::Config {
            command: ConfigCommands::Init,
        } => match defaults::default_settings_toml() {
            Ok(toml) => print!("{}", toml),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Config {
            command: ConfigCommands::Path,
        } => match cli.config.or_else(config::user_config_path) {
            Some(path) => println!("{}", path.display()),
            None => {
                eprintln!("Error: Could not determine config directory. Please specify --config.");
                std::process::exit(1);
            }
        },
    }
}
