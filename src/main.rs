//! EV Booking Service
//!
//! Reservation backend for EV charging stations.
//! Reads configuration from TOML file (~/.config/ev-booking/config.toml).

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use ev_booking::application::AppServices;
use ev_booking::config::LoggingConfig;
use ev_booking::domain::RepositoryProvider;
use ev_booking::infrastructure::{LogNotificationSender, PngQrEncoder};
use ev_booking::shared::shutdown::listen_for_shutdown_signals;
use ev_booking::shared::{SharedClock, ShutdownSignal, SystemClock};
use ev_booking::{connect_and_migrate, default_config_path, AppConfig, SeaOrmRepositoryProvider};

/// Interval between sweeps of idle slot-lock entries
const LOCK_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = default_config_path();
    let (app_cfg, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_tracing(&app_cfg.logging);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => error!("Failed to load config: {}. Using defaults.", e),
    }

    info!("Starting EV Booking Service...");

    // ── Prometheus metrics recorder (must be installed before any metrics calls) ──
    if app_cfg.metrics.enabled {
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(app_cfg.metrics.listen)
            .install()
        {
            Ok(()) => info!("📊 Prometheus metrics on http://{}/metrics", app_cfg.metrics.listen),
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    }

    // ── Database ───────────────────────────────────────────────
    info!("Database: {}", app_cfg.database.url);
    let db = match connect_and_migrate(&app_cfg.database).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to prepare database: {}", e);
            return Err(e.into());
        }
    };
    info!("Migrations completed");

    let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
    let clock: SharedClock = Arc::new(SystemClock);
    let policy = app_cfg.booking.policy();
    let zone = app_cfg.booking.zone();
    info!(
        max_advance_days = policy.max_advance_days(),
        cutoff_hours = policy.modification_cutoff.num_hours(),
        offset = %zone.offset(),
        "Booking policy configured"
    );

    // ── Services ───────────────────────────────────────────────
    let services = AppServices::new(
        repos,
        clock,
        Arc::new(PngQrEncoder::default()),
        Arc::new(LogNotificationSender),
        policy,
        zone,
    );

    // Create default admin user if not exists
    match services
        .users
        .ensure_bootstrap_admin(
            &app_cfg.admin.email,
            &app_cfg.admin.password,
            &app_cfg.admin.full_name,
        )
        .await
    {
        Ok(true) => {}
        Ok(false) => info!("Users exist, skipping default admin creation"),
        Err(e) => error!("Failed to create admin user: {}", e),
    }

    // ── Shutdown handling ──────────────────────────────────────
    let shutdown = ShutdownSignal::new();
    tokio::spawn(listen_for_shutdown_signals(shutdown.clone()));

    let pruner = {
        let locks = services.locks.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LOCK_PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => locks.prune_idle(),
                    _ = shutdown.wait() => break,
                }
            }
        })
    };

    info!("🚀 Services ready. Press Ctrl+C to shutdown gracefully.");
    shutdown.wait().await;

    // ── Final cleanup ──────────────────────────────────────────
    info!("🧹 Performing final cleanup...");
    let grace = Duration::from_secs(app_cfg.server.shutdown_timeout);
    if tokio::time::timeout(grace, pruner).await.is_err() {
        warn!("Background tasks did not stop within {}s", grace.as_secs());
    }

    if let Err(e) = db.close().await {
        warn!("Error closing database connection: {}", e);
    } else {
        info!("✅ Database connection closed");
    }

    info!("👋 EV Booking Service shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
