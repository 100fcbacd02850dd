//! Config validation CLI tool
//!
//! Validates a medminderd configuration file and reports any errors.

use medminder_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a medminderd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match medminder_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", medminder_config::CURRENT_CONFIG_VERSION);
            println!("  User: {}", settings.service.user_id);
            println!("  Data dir: {}", settings.service.data_dir.display());
            println!(
                "  Poll interval: {}s",
                settings.scheduler.poll_interval.as_secs()
            );
            println!(
                "  Refill settle delay: {}s",
                settings.scheduler.settle_delay.as_secs()
            );
            println!();
            println!("Preferences:");
            println!("  Default time: {}", settings.preferences.default_time);
            println!("  Snooze: {} min", settings.preferences.snooze_minutes);
            println!(
                "  Refill reminder: {} day(s) before",
                settings.preferences.refill_reminder_days_before
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                medminder_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                medminder_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                medminder_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                medminder_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        medminder_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
