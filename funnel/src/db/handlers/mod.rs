//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed SQLite connection and exposes strongly typed operations over
//! one table. [`Leads`] and [`Invoices`] implement the generic [`Repository`] trait; the others
//! expose only the operations their callers need.
//!
//! # Available Repositories
//!
//! - [`Leads`]: Lead capture, lookup and funnel status
//! - [`EmailPreferences`]: Per-lead email/SMS opt-ins, addressed by preference token
//! - [`VideoViews`]: Video watch progress
//! - [`Appointments`]: Booked calendar slots
//! - [`Reminders`]: Scheduled appointment reminders
//! - [`Invoices`]: Invoice lifecycle
//! - [`Notifications`]: Outbound email/SMS log
//! - [`WebhookEvents`]: Processed payment webhook ids
//! - [`AdminUsers`]: Dashboard accounts
//! - [`Dashboard`]: Aggregate counts

pub mod admin_users;
pub mod appointments;
pub mod dashboard;
pub mod email_preferences;
pub mod invoices;
pub mod leads;
pub mod notifications;
pub mod reminders;
pub mod repository;
pub mod video_views;
pub mod webhook_events;

pub use admin_users::AdminUsers;
pub use appointments::Appointments;
pub use dashboard::Dashboard;
pub use email_preferences::EmailPreferences;
pub use invoices::Invoices;
pub use leads::Leads;
pub use notifications::Notifications;
pub use reminders::Reminders;
pub use repository::Repository;
pub use video_views::VideoViews;
pub use webhook_events::WebhookEvents;
