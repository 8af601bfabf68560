//! # funnel: Marketing Funnel Service
//!
//! `funnel` runs the lead journey of a small services business: a landing page captures a lead,
//! the lead watches a gated video, books a call into the owner's calendar, receives reminders
//! before the call, and later pays an invoice online. An admin API and dashboard sit alongside.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses SQLite (through SQLx) for all persistence. External systems are reached through adapter
//! traits so each can be swapped for an in-process stand-in during development and tests:
//!
//! - **Calendar** ([`calendar`]): Google Calendar free/busy and event creation
//! - **Payments** ([`payment_providers`]): Stripe PaymentIntents and signed webhooks
//! - **Email** ([`email`]): SMTP or file output through `lettre`, rendered with `minijinja`
//! - **SMS** ([`sms`]): Twilio Messages API
//!
//! ### Request Flow
//!
//! Public funnel requests (`/api/*`) identify the lead by the access token issued at capture
//! time; there is no login. Admin requests (`/admin/api/v1/*`) carry a signed session JWT, as a
//! cookie or bearer header, checked by the [`CurrentAdmin`](api::models::auth::CurrentAdmin)
//! extractor. Handlers take a pooled connection or transaction, call repositories in [`db`], call
//! adapters through [`AppState`], and send notifications through the [`notifications::Notifier`],
//! which applies the lead's preferences and logs every attempt.
//!
//! ### Background Services
//!
//! The [`reminders::ReminderScheduler`] polls for due reminders and sends them by
//! email or SMS. A tick never overlaps the previous one; admins can trigger a tick by hand.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use funnel::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = funnel::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     funnel::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod notifications;
mod openapi;
pub mod payment_providers;
pub mod reminders;
pub mod sms;
mod static_assets;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test;
#[cfg(test)]
pub mod test_utils;

use std::{str::FromStr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{self, HeaderValue, Method},
    routing::{get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers,
    auth::password,
    calendar::CalendarProvider,
    db::handlers::AdminUsers,
    email::EmailService,
    errors::Error,
    notifications::Notifier,
    openapi::{AdminApiDoc, PublicApiDoc},
    payment_providers::PaymentProvider,
    reminders::ReminderScheduler,
    types::AdminUserId,
};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `db`: SQLite connection pool
/// - `config`: Application configuration loaded from file and environment
/// - `notifier`: Email/SMS dispatch with preference checks and logging
/// - `calendar`: Calendar adapter used for availability and events
/// - `payments`: Payment adapter, `None` when no processor is configured
/// - `reminders`: Reminder scheduler, shared with the background task
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub notifier: Arc<Notifier>,
    pub calendar: Arc<dyn CalendarProvider>,
    pub payments: Option<Arc<dyn PaymentProvider>>,
    pub reminders: Arc<ReminderScheduler>,
}

impl AppState {
    /// Wire up adapters and services for `config` on top of an existing pool.
    pub fn from_config(pool: SqlitePool, config: Arc<Config>) -> Result<Self, Error> {
        let email = EmailService::new(&config)?;
        let sms = sms::create_provider(config.sms.clone())?;
        let notifier = Arc::new(Notifier::new(pool.clone(), config.clone(), email, sms));
        let reminders = Arc::new(ReminderScheduler::new(pool.clone(), notifier.clone(), config.clone()));
        let calendar = calendar::create_provider(config.calendar.clone())?;
        let payments: Option<Arc<dyn PaymentProvider>> = config
            .payment
            .clone()
            .map(|payment_config| Arc::from(payment_providers::create_provider(payment_config)));

        Ok(Self::builder()
            .db(pool)
            .config(config)
            .notifier(notifier)
            .calendar(calendar)
            .maybe_payments(payments)
            .reminders(reminders)
            .build())
    }
}

/// Get the funnel database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the configured admin account, or refresh its password if it exists.
///
/// The email is stored lowercased. With `password: None` an existing password is kept, and a new
/// account is created without one (it cannot log in until a password is configured).
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &SqlitePool) -> Result<AdminUserId, Error> {
    let password_hash = password.map(password::hash_string).transpose()?;

    let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let admin = AdminUsers::new(&mut conn)
        .upsert(&email.trim().to_lowercase(), password_hash.as_deref())
        .await?;

    Ok(admin.id)
}

/// Open the SQLite pool and apply migrations
async fn setup_database(config: &Config) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database.url)?
        .create_if_missing(config.database.create_if_missing)
        .foreign_keys(true);

    info!("Opening database at {}", config.database.url);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .expose_headers([http::header::LOCATION]);

    if cors_config.allowed_origins.iter().any(|origin| origin == "*") {
        // Browsers reject credentialed responses for a wildcard origin
        if cors_config.allow_credentials {
            warn!("cors.allowed_origins contains '*'; credentials will not be allowed");
        }
        cors = cors.allow_origin(AllowOrigin::any());
    } else {
        let origins = cors_config
            .allowed_origins
            .iter()
            .map(|origin| origin.trim_end_matches('/').parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        cors = cors.allow_origin(origins).allow_credentials(cors_config.allow_credentials);
    }

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// This function constructs the complete Axum router with:
/// - Public funnel routes under `/api` and the payment webhook
/// - Admin API routes under `/admin/api/v1`
/// - API reference pages at `/docs` and `/admin/docs`
/// - Embedded landing pages as the fallback
/// - Optional Prometheus metrics at `/internal/metrics`
/// - CORS and tracing middleware
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let public_routes = Router::new()
        // Leads
        .route("/api/leads", post(handlers::leads::capture_lead))
        .route("/api/leads/me", get(handlers::leads::get_lead_progress))
        // Videos
        .route("/api/videos", get(handlers::videos::list_videos))
        .route("/api/videos/{id}", get(handlers::videos::get_video))
        .route("/api/videos/{id}/progress", post(handlers::videos::record_progress))
        // Booking
        .route("/api/calendar/availability", get(handlers::calendar::get_availability))
        .route("/api/appointments", post(handlers::appointments::book_appointment))
        .route("/api/appointments/{id}/cancel", post(handlers::appointments::cancel_appointment))
        // Payment page
        .route("/api/invoices/{public_token}", get(handlers::invoices::get_public_invoice))
        // Email preferences
        .route(
            "/api/preferences/{token}",
            get(handlers::preferences::get_preferences).put(handlers::preferences::update_preferences),
        )
        .route("/api/preferences/{token}/unsubscribe", post(handlers::preferences::unsubscribe))
        // Webhook routes (external services, not part of the page API)
        .route("/webhooks/payments", post(handlers::payments::webhook_handler))
        .with_state(state.clone());

    let admin_routes = Router::new()
        // Authentication
        .route("/authentication/login", post(handlers::auth::login))
        .route("/authentication/logout", post(handlers::auth::logout))
        .route("/authentication/me", get(handlers::auth::me))
        .route("/dashboard", get(handlers::dashboard::get_dashboard))
        // Leads
        .route("/leads", get(handlers::leads::list_leads))
        .route(
            "/leads/{id}",
            get(handlers::leads::get_lead)
                .patch(handlers::leads::update_lead)
                .delete(handlers::leads::delete_lead),
        )
        // Appointments and reminders
        .route("/appointments", get(handlers::appointments::list_appointments))
        .route("/appointments/{id}", patch(handlers::appointments::update_appointment))
        .route("/reminders", get(handlers::reminders::list_reminders))
        .route("/reminders/process", post(handlers::reminders::process_reminders))
        // Invoices
        .route(
            "/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route("/invoices/{id}", get(handlers::invoices::get_invoice))
        .route("/invoices/{id}/send", post(handlers::invoices::send_invoice))
        .route("/invoices/{id}/void", post(handlers::invoices::void_invoice))
        // Notifications
        .route("/notifications", get(handlers::notifications::list_notifications))
        .route("/notifications/email", post(handlers::notifications::send_email))
        .route("/notifications/sms", post(handlers::notifications::send_sms))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(public_routes)
        .nest("/admin/api/v1", admin_routes)
        .merge(Scalar::with_url("/docs", PublicApiDoc::openapi()))
        .merge(Scalar::with_url("/admin/docs", AdminApiDoc::openapi()))
        .fallback(handlers::static_assets::serve_embedded_asset);

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    // Add Prometheus metrics if enabled
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Container for background services and their lifecycle management.
///
/// Currently this is the reminder scheduler loop. When dropped, the `drop_guard` cancels the
/// shutdown token, signalling all tasks to stop.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: tokio_util::sync::CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Start the reminder scheduler (when enabled)
fn setup_background_services(state: &AppState, shutdown_token: tokio_util::sync::CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    if state.config.reminders.enabled {
        let scheduler = state.reminders.clone();
        let scheduler_shutdown = shutdown_token.clone();
        background_tasks.push(tokio::spawn(async move {
            scheduler.run(scheduler_shutdown).await;
        }));
    } else {
        info!("Reminder scheduler disabled; reminders are only sent via /admin/api/v1/reminders/process");
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] opens the database, runs migrations, creates the admin
///    account and starts background services
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, stops the scheduler and closes the pool
pub struct Application {
    router: Router,
    app_state: AppState,
    pool: SqlitePool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application on an existing pool (tests), or open one from config when `None`
    pub async fn new_with_pool(config: Config, pool: Option<SqlitePool>) -> anyhow::Result<Self> {
        debug!("Starting funnel with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => pool,
            None => setup_database(&config).await?,
        };
        migrator().run(&pool).await?;

        create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

        let app_state = AppState::from_config(pool.clone(), Arc::new(config))?;

        let shutdown_token = tokio_util::sync::CancellationToken::new();
        let bg_services = setup_background_services(&app_state, shutdown_token);

        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            app_state,
            pool,
            bg_services,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let config = &self.app_state.config;
        let bind_addr = config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Funnel listening on http://{}, public URL {}", bind_addr, config.public_url);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Shutdown background services and wait for tasks to complete
        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
