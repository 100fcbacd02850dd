//! medminderd - The medminder reminder service
//!
//! This is the main entry point for the medminderd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Notification engine
//! - JSON-lines command/event bridge on stdin/stdout

use anyhow::{Context, Result};
use clap::Parser;
use medminder_api::{
    API_VERSION, Command, ErrorCode, ErrorInfo, Event, EventPayload, FeedDelta, IntentOutcome,
    MedicationFilter, Request, Response, ResponsePayload, WriteStatus,
};
use medminder_config::{RawPreferences, Settings, load_config, validate_preferences};
use medminder_core::NotificationEngine;
use medminder_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use medminder_util::{
    DATABASE_FILENAME, MedminderError, UserId, default_config_path, is_mock_time_active,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// medminderd - Medication reminder service
#[derive(Parser, Debug)]
#[command(name = "medminderd")]
#[command(about = "Medication dose and refill reminder service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/medminder/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set MEDMINDER_DATA_DIR env var)
    #[arg(short, long, env = "MEDMINDER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

/// Main service state
struct Service {
    settings: Settings,
    engine: NotificationEngine,
    store: Arc<dyn Store>,
    user_id: UserId,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        let settings = if args.config.exists() {
            let settings = load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?;
            info!(config_path = %args.config.display(), "Configuration loaded");
            settings
        } else {
            warn!(
                config_path = %args.config.display(),
                "Config file not found, using defaults"
            );
            Settings::default()
        };

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(DATABASE_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        Self::with_store(settings, store)
    }

    fn with_store(settings: Settings, store: Arc<dyn Store>) -> Result<Self> {
        let user_id = settings.service.user_id.clone();

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;
        store.append_audit(AuditEvent::new(AuditEventType::ConfigLoaded {
            user_id: user_id.to_string(),
        }))?;

        // Config preferences only seed a store that has none
        if store.get_preferences(&user_id)?.is_none() {
            store.save_preferences(&user_id, &settings.preferences)?;
            info!(user_id = %user_id, "Seeded preferences from config");
        }

        if is_mock_time_active() {
            warn!(now = %medminder_util::now(), "Mock time is active");
        }

        let engine =
            NotificationEngine::new(settings.scheduler, store.clone(), medminder_util::now());

        Ok(Self {
            settings,
            engine,
            store,
            user_id,
        })
    }

    /// Read the latest medications and preferences and run one engine pass.
    ///
    /// Store failures fall back to the previous snapshot so timers keep firing.
    fn tick(&mut self, now: chrono::DateTime<chrono::Local>) -> FeedDelta {
        let medications = match self
            .store
            .list_medications(&self.user_id, &MedicationFilter::default())
        {
            Ok(medications) => medications,
            Err(e) => {
                warn!(error = %e, "Failed to list medications, using last snapshot");
                self.engine.medications().to_vec()
            }
        };

        let preferences = match self.store.get_preferences(&self.user_id) {
            Ok(Some(preferences)) => preferences,
            Ok(None) => self.settings.preferences.clone(),
            Err(e) => {
                warn!(error = %e, "Failed to read preferences, using last known");
                self.engine.preferences().clone()
            }
        };

        self.engine.tick(now, &medications, &preferences)
    }

    async fn run(mut self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        let mut stdin_open = true;

        let poll_interval = self.settings.scheduler.poll_interval;
        let mut poll_timer = tokio::time::interval(poll_interval);
        poll_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            user_id = %self.user_id,
            poll_interval_secs = poll_interval.as_secs(),
            "Service running"
        );

        loop {
            let wake = self.sleep_until_next_timer(poll_interval);

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // Periodic dose check
                _ = poll_timer.tick() => {
                    let delta = self.tick(medminder_util::now());
                    emit_delta(&mut stdout, delta).await?;
                }

                // Snooze, settle or midnight timer due before the next poll
                _ = tokio::time::sleep(wake) => {
                    let delta = self.tick(medminder_util::now());
                    emit_delta(&mut stdout, delta).await?;
                }

                line = lines.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) if line.trim().is_empty() => {}
                        Ok(Some(line)) => {
                            let response = self.handle_line(&line, medminder_util::now());
                            write_line(&mut stdout, &response).await?;
                        }
                        Ok(None) => {
                            info!("Command input closed, continuing without it");
                            stdin_open = false;
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to read command line");
                            stdin_open = false;
                        }
                    }
                }
            }
        }

        info!("Shutting down medminderd");

        write_line(&mut stdout, &Event::new(EventPayload::Shutdown)).await?;

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }

    fn sleep_until_next_timer(&self, fallback: Duration) -> Duration {
        let now = medminder_util::now();
        self.engine
            .next_deadline()
            .map(|deadline| (deadline - now).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or(fallback)
    }

    fn handle_line(&mut self, line: &str, now: chrono::DateTime<chrono::Local>) -> Response {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Malformed request");
                return Response::error(
                    0,
                    ErrorInfo::new(ErrorCode::InvalidRequest, format!("Malformed request: {}", e)),
                );
            }
        };

        if request.api_version != API_VERSION {
            return Response::error(
                request.request_id,
                ErrorInfo::new(
                    ErrorCode::InvalidRequest,
                    format!(
                        "Unsupported API version {} (expected {})",
                        request.api_version, API_VERSION
                    ),
                ),
            );
        }

        self.handle_command(request.request_id, request.command, now)
    }

    fn handle_command(
        &mut self,
        request_id: u64,
        command: Command,
        now: chrono::DateTime<chrono::Local>,
    ) -> Response {
        debug!(request_id, command = ?command, "Handling command");

        let outcome = match command {
            Command::Ping => return Response::success(request_id, ResponsePayload::Pong),
            Command::UpdatePreferences {
                default_time,
                snooze_minutes,
                refill_reminder_days_before,
            } => {
                return self.update_preferences(
                    request_id,
                    RawPreferences {
                        default_time,
                        snooze_minutes,
                        refill_reminder_days_before,
                    },
                );
            }
            Command::GetFeed => Ok(IntentOutcome {
                feed: self.engine.feed().to_vec(),
                write: WriteStatus::NotRequired,
            }),
            Command::Dismiss { entry_id } => self.engine.dismiss(entry_id, now),
            Command::SnoozeDose {
                medication_id,
                minutes,
            } => self.engine.snooze_dose(&medication_id, minutes, now),
            Command::MarkTaken { medication_id } => self.engine.mark_taken(&medication_id, now),
            Command::SnoozeRefill { medication_id } => {
                self.engine.snooze_refill(&medication_id, now)
            }
            Command::MarkRefilled { medication_id } => {
                self.engine.mark_refilled(&medication_id, now)
            }
            Command::NoLongerTaking { medication_id } => {
                self.engine.no_longer_taking(&medication_id, now)
            }
            Command::ConfirmNoLongerTaking { medication_id } => {
                self.engine.confirm_no_longer_taking(&medication_id, now)
            }
            Command::CancelNoLongerTaking { medication_id } => {
                self.engine.cancel_no_longer_taking(&medication_id, now)
            }
        };

        match outcome {
            Ok(outcome) => Response::success(
                request_id,
                ResponsePayload::Feed {
                    entries: outcome.feed,
                    write: outcome.write,
                },
            ),
            Err(e) => Response::error(request_id, error_info(&e)),
        }
    }

    fn update_preferences(&mut self, request_id: u64, raw: RawPreferences) -> Response {
        let preferences = match validate_preferences(&raw) {
            Ok(preferences) => preferences,
            Err(errors) => {
                let message = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::ValidationFailed, message),
                );
            }
        };

        if let Err(e) = self.store.save_preferences(&self.user_id, &preferences) {
            warn!(error = %e, "Failed to save preferences");
            return Response::error(
                request_id,
                ErrorInfo::new(ErrorCode::StoreError, e.to_string()),
            );
        }

        info!(
            user_id = %self.user_id,
            default_time = %preferences.default_time,
            snooze_minutes = preferences.snooze_minutes,
            refill_reminder_days_before = preferences.refill_reminder_days_before,
            "Preferences updated"
        );

        Response::success(
            request_id,
            ResponsePayload::PreferencesUpdated { preferences },
        )
    }
}

fn error_info(e: &MedminderError) -> ErrorInfo {
    let code = match e {
        MedminderError::MedicationNotFound(_) => ErrorCode::MedicationNotFound,
        MedminderError::NotificationNotFound(_) => ErrorCode::NotificationNotFound,
        MedminderError::NothingToConfirm(_) => ErrorCode::NothingToConfirm,
        MedminderError::ValidationError(_) | MedminderError::ConfigError(_) => {
            ErrorCode::ValidationFailed
        }
        MedminderError::StoreError(_) => ErrorCode::StoreError,
        MedminderError::Internal(_) => ErrorCode::InternalError,
    };
    ErrorInfo::new(code, e.to_string())
}

async fn emit_delta(stdout: &mut tokio::io::Stdout, delta: FeedDelta) -> Result<()> {
    if delta.is_empty() {
        return Ok(());
    }
    write_line(stdout, &Event::new(EventPayload::from(delta))).await
}

async fn write_line<T: Serialize>(stdout: &mut tokio::io::Stdout, value: &T) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout carries the event stream
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "medminderd starting"
    );

    let service = Service::new(&args)?;
    service.run().await
}
