use std::path::PathBuf;
use std::process::ExitCode;
use tabload::{config, loader};
use tracing::{error, info};

const USAGE: &str = "Usage: tabload [CONFIG]\n\nLoads a CSV file or API response into a database table as described by CONFIG\n(default: <config dir>/tabload/config.toml).";

fn main() -> ExitCode {
    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt::init();

    info!("Starting tabload...");

    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();
    let config_path = match args.len() {
        1 => match config::default_config_path() {
            Some(path) => path,
            None => {
                eprintln!("No configuration given and no config directory available.\n\n{}", USAGE);
                return ExitCode::FAILURE;
            }
        },
        2 if args[1] == "-h" || args[1] == "--help" => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        2 => PathBuf::from(&args[1]),
        _ => {
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    println!("Using configuration: {}", config_path.display());
    let config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match loader::run(&config) {
        Ok(report) => {
            println!(
                "Inserted {} of {} rows into {} (run {})",
                report.rows_inserted, report.rows_fetched, report.table, report.run_id
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "load failed");
            eprintln!("Load failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
